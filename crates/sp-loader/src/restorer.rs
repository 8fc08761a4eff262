//! Undo ledger for in-place systematic mutations.

use sp_core::{Field, Record};

/// Records prior field values before a systematic shift mutates a record in
/// place, and restores them afterwards.
///
/// One ledger is scoped to one (record, variation) evaluation: the loader
/// hands a shift a fresh ledger, the shift captures each field before
/// touching it, and [`Restorer::drain`] puts every captured field back so
/// the record is bit-identical to its pre-shift state. This is what lets
/// many systematic universes share one record buffer instead of copying the
/// record per universe.
#[derive(Debug, Default)]
pub struct Restorer {
    entries: Vec<(Field, f64)>,
}

impl Restorer {
    /// An empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture `field`'s current value.
    ///
    /// Idempotent per field per ledger: only the first capture is retained,
    /// so a shift that touches the same field twice still restores the
    /// original value.
    pub fn add(&mut self, rec: &Record, field: Field) {
        if self.entries.iter().any(|(f, _)| *f == field) {
            return;
        }
        self.entries.push((field, rec.get(field)));
    }

    /// Restore every captured field and clear the ledger.
    pub fn drain(&mut self, rec: &mut Record) {
        for (field, value) in self.entries.drain(..) {
            rec.set(field, value);
        }
    }

    /// Number of fields currently captured.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the ledger is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
