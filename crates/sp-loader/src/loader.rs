//! The single-pass executor and its registration surface.

use std::sync::Arc;

use sp_core::{Error, Result};
use tracing::{debug, info, warn};

use crate::cut::Cut;
use crate::restorer::Restorer;
use crate::source::{JsonFileSource, RecordSource};
use crate::spectrum::{Binning, Spectrum};
use crate::syst::SystShift;
use crate::var::{Var, Weight};

/// Opaque handle to a spectrum registered with a loader.
///
/// Returned by [`LoaderBase::register`]; redeem it after
/// [`LoaderBase::execute`] to read the filled spectrum. Handles carry the
/// identity of the loader that minted them, so redeeming one against a
/// different loader is a configuration error rather than a silent read of
/// the wrong spectrum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpectrumHandle {
    loader: u64,
    index: usize,
}

/// Process-unique id for each loader instance; stamps the handles it mints.
fn next_loader_id() -> u64 {
    use std::sync::atomic::{AtomicU64, Ordering};
    static NEXT: AtomicU64 = AtomicU64::new(0);
    NEXT.fetch_add(1, Ordering::Relaxed)
}

/// One aggregation request: where to bin, what to select, what to project,
/// how to weight, and under which systematic universe.
pub struct SpectrumRequest {
    /// Bin edges of the target spectrum.
    pub binning: Binning,
    /// Selection predicate.
    pub cut: Cut,
    /// Fill coordinate.
    pub var: Var,
    /// Fill amplitude.
    pub weight: Weight,
    /// Systematic universe; `None` is the nominal (unshifted) case.
    pub shift: Option<Arc<dyn SystShift>>,
}

impl SpectrumRequest {
    /// A nominal (unshifted) request.
    pub fn new(binning: Binning, cut: Cut, var: Var, weight: Weight) -> Self {
        Self { binning, cut, var, weight, shift: None }
    }

    /// Evaluate this request under a systematic universe.
    pub fn with_shift(mut self, shift: Arc<dyn SystShift>) -> Self {
        self.shift = Some(shift);
        self
    }
}

/// Registration surface shared by every executor.
///
/// Registrations are only valid before execution; [`execute`] runs the
/// single pass and is valid exactly once.
///
/// [`execute`]: LoaderBase::execute
pub trait LoaderBase: Send {
    /// Register an aggregation request; returns the handle to redeem after
    /// execution.
    fn register(&mut self, req: SpectrumRequest) -> Result<SpectrumHandle>;

    /// Perform the single pass, filling every registered spectrum.
    fn execute(&mut self) -> Result<()>;

    /// Borrow a filled spectrum.
    fn spectrum(&self, handle: SpectrumHandle) -> Result<&Spectrum>;

    /// Remove and return a filled spectrum.
    fn take_spectrum(&mut self, handle: SpectrumHandle) -> Result<Spectrum>;
}

/// No-op stand-in for a loader slot with no data source.
///
/// Accepts registrations silently, so analyses can be declared against a
/// detector/sample combination that turns out to be absent; the failure
/// surfaces only when results are actually requested.
#[derive(Debug)]
pub struct NullLoader {
    id: u64,
    n_registered: usize,
}

impl NullLoader {
    /// A fresh sentinel.
    pub fn new() -> Self {
        Self { id: next_loader_id(), n_registered: 0 }
    }
}

impl Default for NullLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl LoaderBase for NullLoader {
    fn register(&mut self, _req: SpectrumRequest) -> Result<SpectrumHandle> {
        let h = SpectrumHandle { loader: self.id, index: self.n_registered };
        self.n_registered += 1;
        Ok(h)
    }

    fn execute(&mut self) -> Result<()> {
        Err(Error::NotConfigured("no record source configured for this loader".into()))
    }

    fn spectrum(&self, _handle: SpectrumHandle) -> Result<&Spectrum> {
        Err(Error::NotConfigured("no record source configured for this loader".into()))
    }

    fn take_spectrum(&mut self, _handle: SpectrumHandle) -> Result<Spectrum> {
        Err(Error::NotConfigured("no record source configured for this loader".into()))
    }
}

struct Registration {
    cut: Cut,
    var: Var,
    weight: Weight,
    shift: Option<Arc<dyn SystShift>>,
    /// `None` once taken by the caller.
    spectrum: Option<Spectrum>,
}

/// Cuts deduplicated within one systematic universe, mapped to the
/// registrations filled when each cut passes.
struct VariationGroup {
    shift: Option<Arc<dyn SystShift>>,
    /// (index into the global unique-cut set, registration indices).
    cuts: Vec<(usize, Vec<usize>)>,
}

/// Concrete single-pass executor over one record source.
///
/// Lifecycle: construct, register every spectrum, call
/// [`execute`](LoaderBase::execute) once, then read the spectra. Both
/// registration after execution and a second execution fail with
/// [`Error::AlreadyExecuted`]: exposure accounting requires the complete
/// registrant set before the scan starts, and the scan consumes the source.
pub struct SpectrumLoader {
    id: u64,
    source: Box<dyn RecordSource>,
    registrations: Vec<Registration>,
    executed: bool,
    /// Stop the scan after this many records; 0 means unlimited.
    max_entries: usize,
    skipped_containers: usize,
}

impl SpectrumLoader {
    /// Loader over a single container file.
    ///
    /// Wildcard and dataset-catalog resolution belong to an external
    /// collaborator; a path here names exactly one file.
    pub fn from_path(path: impl Into<std::path::PathBuf>) -> Self {
        Self::from_source(Box::new(JsonFileSource::single(path)))
    }

    /// Loader over an explicit container file list.
    pub fn from_files(paths: Vec<std::path::PathBuf>) -> Self {
        Self::from_source(Box::new(JsonFileSource::new(paths)))
    }

    /// Loader over any record source.
    pub fn from_source(source: Box<dyn RecordSource>) -> Self {
        Self {
            id: next_loader_id(),
            source,
            registrations: Vec::new(),
            executed: false,
            max_entries: 0,
            skipped_containers: 0,
        }
    }

    /// Cooperative early stop after `max` records (0 = unlimited).
    ///
    /// Checked once per record; this is static configuration, not a
    /// runtime cancellation signal.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    /// Containers skipped because they could not be read.
    pub fn skipped_containers(&self) -> usize {
        self.skipped_containers
    }

    /// The globally deduplicated cut set, in first-registration order,
    /// with each registration's index into it.
    fn dedup_cuts(&self) -> (Vec<Cut>, Vec<usize>) {
        let mut all_cuts: Vec<Cut> = Vec::new();
        let mut cut_of_reg = Vec::with_capacity(self.registrations.len());
        for reg in &self.registrations {
            let idx = match all_cuts.iter().position(|c| c == &reg.cut) {
                Some(i) => i,
                None => {
                    all_cuts.push(reg.cut.clone());
                    all_cuts.len() - 1
                }
            };
            cut_of_reg.push(idx);
        }
        (all_cuts, cut_of_reg)
    }

    /// Group registrations by systematic universe (nominal first, then
    /// shifts in first-registration order), deduplicating cuts within
    /// each universe.
    fn group_by_variation(&self, cut_of_reg: &[usize]) -> Vec<VariationGroup> {
        let mut groups: Vec<VariationGroup> = Vec::new();
        for (ri, reg) in self.registrations.iter().enumerate() {
            let key = reg.shift.as_ref().map(|s| s.name().to_owned());
            let gi = match groups
                .iter()
                .position(|g| g.shift.as_ref().map(|s| s.name()) == key.as_deref())
            {
                Some(i) => i,
                None => {
                    groups.push(VariationGroup { shift: reg.shift.clone(), cuts: Vec::new() });
                    groups.len() - 1
                }
            };
            let group = &mut groups[gi];
            let ci = cut_of_reg[ri];
            match group.cuts.iter_mut().find(|(c, _)| *c == ci) {
                Some((_, regs)) => regs.push(ri),
                None => group.cuts.push((ci, vec![ri])),
            }
        }
        // Nominal universe is evaluated first.
        groups.sort_by_key(|g| g.shift.is_some());
        groups
    }

    fn report_exposures(&self, all_cuts: &[Cut], pot: &[f64], livetime: &[f64]) {
        for (i, cut) in all_cuts.iter().enumerate() {
            info!(
                cut = cut.identity(),
                pot = pot[i],
                livetime = livetime[i],
                "exposure accumulated"
            );
        }
        if self.skipped_containers > 0 {
            warn!(skipped = self.skipped_containers, "containers skipped as unreadable");
        }
    }
}

impl LoaderBase for SpectrumLoader {
    fn register(&mut self, req: SpectrumRequest) -> Result<SpectrumHandle> {
        if self.executed {
            return Err(Error::AlreadyExecuted(
                "cannot register spectra after the loader has run".into(),
            ));
        }
        let spectrum = Spectrum::new(req.var.label(), req.binning);
        self.registrations.push(Registration {
            cut: req.cut,
            var: req.var,
            weight: req.weight,
            shift: req.shift,
            spectrum: Some(spectrum),
        });
        Ok(SpectrumHandle { loader: self.id, index: self.registrations.len() - 1 })
    }

    fn execute(&mut self) -> Result<()> {
        if self.executed {
            return Err(Error::AlreadyExecuted("loader may only run once".into()));
        }
        // The loader is consumed even if the scan fails partway: partial
        // accumulator state is unreliable and must not be topped up.
        self.executed = true;

        let (all_cuts, cut_of_reg) = self.dedup_cuts();
        let groups = self.group_by_variation(&cut_of_reg);
        let mut pot_by_cut = vec![0.0_f64; all_cuts.len()];
        let mut livetime_by_cut = vec![0.0_f64; all_cuts.len()];

        let mut n_records = 0usize;

        let mut containers = self.source.containers();
        'scan: for item in containers.by_ref() {
            let container = match item {
                Ok(c) => c,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable container");
                    self.skipped_containers += 1;
                    continue;
                }
            };

            // Container-level exposure is credited to every cut whether or
            // not any of its records pass: these sums mean total delivered
            // exposure, not exposure of the selected subset.
            for (pot, livetime) in pot_by_cut.iter_mut().zip(livetime_by_cut.iter_mut()) {
                *pot += container.header.pot;
                *livetime += container.header.livetime;
            }

            for mut rec in container.records {
                if self.max_entries != 0 && n_records >= self.max_entries {
                    debug!(max = self.max_entries, "record limit reached, stopping scan");
                    break 'scan;
                }
                n_records += 1;

                for group in &groups {
                    let mut rest = Restorer::new();
                    if let Some(shift) = &group.shift {
                        shift.shift(&mut rec, &mut rest);
                    }
                    for (ci, reg_idxs) in &group.cuts {
                        if !all_cuts[*ci].passes(&rec) {
                            continue;
                        }
                        for &ri in reg_idxs {
                            let reg = &mut self.registrations[ri];
                            let val = reg.var.eval(&rec);
                            let w = reg.weight.eval(&rec);
                            if !val.is_finite() || !w.is_finite() {
                                return Err(Error::Evaluation(format!(
                                    "non-finite fill for '{}' at run {} event {}: val={val}, weight={w}",
                                    reg.var.label(),
                                    rec.run,
                                    rec.event,
                                )));
                            }
                            if let Some(s) = reg.spectrum.as_mut() {
                                s.fill(val, w);
                            }
                        }
                    }
                    rest.drain(&mut rec);
                }
            }
        }
        drop(containers);

        // Store the per-cut exposure sums into every spectrum registered
        // under that cut, then report them.
        for (ri, reg) in self.registrations.iter_mut().enumerate() {
            let ci = cut_of_reg[ri];
            if let Some(s) = reg.spectrum.as_mut() {
                s.add_exposure(pot_by_cut[ci], livetime_by_cut[ci]);
            }
        }
        info!(records = n_records, cuts = all_cuts.len(), "scan complete");
        self.report_exposures(&all_cuts, &pot_by_cut, &livetime_by_cut);
        Ok(())
    }

    fn spectrum(&self, handle: SpectrumHandle) -> Result<&Spectrum> {
        if handle.loader != self.id {
            return Err(Error::Configuration(
                "spectrum handle was issued by a different loader".into(),
            ));
        }
        self.registrations
            .get(handle.index)
            .and_then(|r| r.spectrum.as_ref())
            .ok_or_else(|| {
                Error::Configuration(format!("invalid spectrum handle {}", handle.index))
            })
    }

    fn take_spectrum(&mut self, handle: SpectrumHandle) -> Result<Spectrum> {
        if handle.loader != self.id {
            return Err(Error::Configuration(
                "spectrum handle was issued by a different loader".into(),
            ));
        }
        self.registrations
            .get_mut(handle.index)
            .and_then(|r| r.spectrum.take())
            .ok_or_else(|| {
                Error::Configuration(format!("invalid spectrum handle {}", handle.index))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Container, MemorySource};
    use sp_core::{ExposureHeader, Field, Record};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn feed(energies: &[f64], pot: f64) -> Box<MemorySource> {
        let records = energies
            .iter()
            .enumerate()
            .map(|(i, &e)| Record::new(1, 0, i as u32).with(Field::Energy, e))
            .collect();
        Box::new(MemorySource::new(vec![Container::new(
            ExposureHeader::new(pot, 0.0),
            records,
        )]))
    }

    fn energy_var() -> Var {
        Var::new("energy", |r| r.get(Field::Energy))
    }

    fn counted_cut(identity: &str, counter: Arc<AtomicUsize>) -> Cut {
        Cut::new(identity, move |r| {
            counter.fetch_add(1, Ordering::Relaxed);
            r.get(Field::Energy) > 1.0
        })
    }

    #[test]
    fn identical_cuts_evaluated_once_per_record() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut loader = SpectrumLoader::from_source(feed(&[0.5, 1.5, 2.5], 10.0));

        // Same definition, different instances; the second closure never
        // runs because dedup keeps only the first.
        let t1 = loader
            .register(SpectrumRequest::new(
                Binning::simple(5, 0.0, 5.0),
                counted_cut("energy > 1.0", count.clone()),
                energy_var(),
                Weight::unity(),
            ))
            .unwrap();
        let t2 = loader
            .register(SpectrumRequest::new(
                Binning::simple(5, 0.0, 5.0),
                counted_cut("energy > 1.0", count.clone()),
                energy_var(),
                Weight::unity(),
            ))
            .unwrap();

        loader.execute().unwrap();
        assert_eq!(count.load(Ordering::Relaxed), 3, "one evaluation per record, not per target");

        for h in [t1, t2] {
            let s = loader.spectrum(h).unwrap();
            assert_eq!(s.entries(), 2);
            assert_eq!(s.pot(), 10.0);
        }
    }

    #[test]
    fn register_after_execute_fails() {
        let mut loader = SpectrumLoader::from_source(feed(&[1.5], 1.0));
        loader.execute().unwrap();
        let err = loader
            .register(SpectrumRequest::new(
                Binning::simple(1, 0.0, 5.0),
                Cut::everything(),
                energy_var(),
                Weight::unity(),
            ))
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExecuted(_)));
    }

    #[test]
    fn execute_twice_fails() {
        let mut loader = SpectrumLoader::from_source(feed(&[], 0.0));
        loader.execute().unwrap();
        assert!(matches!(loader.execute(), Err(Error::AlreadyExecuted(_))));
    }

    #[test]
    fn max_entries_stops_scan() {
        let mut loader =
            SpectrumLoader::from_source(feed(&[2.0, 2.0, 2.0, 2.0], 1.0)).with_max_entries(2);
        let h = loader
            .register(SpectrumRequest::new(
                Binning::simple(1, 0.0, 5.0),
                Cut::everything(),
                energy_var(),
                Weight::unity(),
            ))
            .unwrap();
        loader.execute().unwrap();
        assert_eq!(loader.spectrum(h).unwrap().entries(), 2);
    }

    #[test]
    fn non_finite_projection_is_fatal() {
        let mut loader = SpectrumLoader::from_source(feed(&[2.0], 1.0));
        loader
            .register(SpectrumRequest::new(
                Binning::simple(1, 0.0, 5.0),
                Cut::everything(),
                Var::new("bad", |r| r.get(Field::Energy) / 0.0 * 0.0),
                Weight::unity(),
            ))
            .unwrap();
        let err = loader.execute().unwrap_err();
        assert!(matches!(err, Error::Evaluation(_)));
        // The loader is consumed by the failed scan.
        assert!(matches!(loader.execute(), Err(Error::AlreadyExecuted(_))));
    }

    #[test]
    fn null_loader_defers_failure_to_execute() {
        let mut null = NullLoader::new();
        let h = null
            .register(SpectrumRequest::new(
                Binning::simple(1, 0.0, 5.0),
                Cut::everything(),
                energy_var(),
                Weight::unity(),
            ))
            .unwrap();
        assert!(matches!(null.execute(), Err(Error::NotConfigured(_))));
        assert!(matches!(null.spectrum(h), Err(Error::NotConfigured(_))));
    }

    #[test]
    fn handle_from_another_loader_is_rejected() {
        let mut a = SpectrumLoader::from_source(feed(&[1.5], 1.0));
        let mut b = SpectrumLoader::from_source(feed(&[2.5], 1.0));
        let req = || {
            SpectrumRequest::new(
                Binning::simple(5, 0.0, 5.0),
                Cut::everything(),
                energy_var(),
                Weight::unity(),
            )
        };
        let ha = a.register(req()).unwrap();
        let hb = b.register(req()).unwrap();
        a.execute().unwrap();
        b.execute().unwrap();

        // Same index, wrong loader: must not silently read b's spectrum.
        assert!(matches!(a.spectrum(hb), Err(Error::Configuration(_))));
        assert!(matches!(b.take_spectrum(ha), Err(Error::Configuration(_))));
        assert!(a.spectrum(ha).is_ok());
        assert!(b.spectrum(hb).is_ok());
    }

    #[test]
    fn take_spectrum_removes_target() {
        let mut loader = SpectrumLoader::from_source(feed(&[1.5], 2.0));
        let h = loader
            .register(SpectrumRequest::new(
                Binning::simple(5, 0.0, 5.0),
                Cut::everything(),
                energy_var(),
                Weight::unity(),
            ))
            .unwrap();
        loader.execute().unwrap();
        let s = loader.take_spectrum(h).unwrap();
        assert_eq!(s.entries(), 1);
        assert!(loader.spectrum(h).is_err());
    }
}
