//! Systematic-shift contract.

use sp_core::Record;

use crate::restorer::Restorer;

/// A reversible perturbation of record fields, modeling one systematic
/// universe.
///
/// Implementations must capture every field they are about to mutate into
/// the provided [`Restorer`] *before* mutating it; the loader drains the
/// ledger after evaluating the universe, so a conforming shift leaves no
/// trace on the record. Concrete shift definitions are an analysis concern
/// and live outside this crate.
pub trait SystShift: Send + Sync {
    /// Stable name of this shift; shifts with equal names are treated as
    /// the same variation when grouping registrations.
    fn name(&self) -> &str;

    /// Apply the perturbation to `rec` in place, logging prior values.
    fn shift(&self, rec: &mut Record, rest: &mut Restorer);
}
