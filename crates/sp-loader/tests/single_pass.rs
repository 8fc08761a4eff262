//! End-to-end scenarios for the single-pass executor.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use sp_core::{ExposureHeader, Field, Record};
use sp_loader::{
    Binning, Container, Cut, LoaderBase, MemorySource, Restorer, SpectrumLoader, SpectrumRequest,
    SystShift, Var, Weight,
};

fn container(pot: f64, energies: &[f64]) -> Container {
    let records = energies
        .iter()
        .enumerate()
        .map(|(i, &e)| Record::new(1, 0, i as u32).with(Field::Energy, e))
        .collect();
    Container::new(ExposureHeader::new(pot, pot / 10.0), records)
}

fn loader_over(containers: Vec<Container>) -> SpectrumLoader {
    SpectrumLoader::from_source(Box::new(MemorySource::new(containers)))
}

fn energy_var() -> Var {
    Var::new("energy", |r| r.get(Field::Energy))
}

struct DoubleEnergy;

impl SystShift for DoubleEnergy {
    fn name(&self) -> &str {
        "double_energy"
    }

    fn shift(&self, rec: &mut Record, rest: &mut Restorer) {
        rest.add(rec, Field::Energy);
        rec.set(Field::Energy, rec.get(Field::Energy) * 2.0);
    }
}

struct BumpEnergy;

impl SystShift for BumpEnergy {
    fn name(&self) -> &str {
        "bump_energy"
    }

    fn shift(&self, rec: &mut Record, rest: &mut Restorer) {
        rest.add(rec, Field::Energy);
        rec.set(Field::Energy, rec.get(Field::Energy) + 1.0);
    }
}

#[test]
fn duplicate_cut_definitions_share_one_evaluation() {
    // Two registrations with the same cut definition built independently:
    // the predicate runs once per record, both targets get every fill.
    let count = Arc::new(AtomicUsize::new(0));
    let make_cut = |counter: Arc<AtomicUsize>| {
        Cut::new("energy > 1.0", move |r| {
            counter.fetch_add(1, Ordering::Relaxed);
            r.get(Field::Energy) > 1.0
        })
    };

    let mut loader = loader_over(vec![container(10.0, &[0.5, 1.5, 2.5])]);
    let t1 = loader
        .register(SpectrumRequest::new(
            Binning::simple(10, 0.0, 5.0),
            make_cut(count.clone()),
            energy_var(),
            Weight::unity(),
        ))
        .unwrap();
    let t2 = loader
        .register(SpectrumRequest::new(
            Binning::simple(10, 0.0, 5.0),
            make_cut(count.clone()),
            energy_var(),
            Weight::unity(),
        ))
        .unwrap();

    loader.execute().unwrap();

    assert_eq!(count.load(Ordering::Relaxed), 3);
    for h in [t1, t2] {
        let s = loader.spectrum(h).unwrap();
        assert_eq!(s.entries(), 2);
        assert_relative_eq!(s.integral(), 2.0);
        assert_relative_eq!(s.pot(), 10.0);
    }
}

#[test]
fn shifted_fill_reflects_mutation_and_restores_between_universes() {
    // One record with energy 4.0. The doubling universe must fill at 8.0;
    // the +1 universe, evaluated on the same record buffer afterwards, must
    // see the restored 4.0 and fill at 5.0; nominal fills at 4.0.
    let mut loader = loader_over(vec![container(1.0, &[4.0])]);
    let binning = Binning::simple(10, 0.0, 10.0);

    let doubled = loader
        .register(
            SpectrumRequest::new(binning.clone(), Cut::everything(), energy_var(), Weight::unity())
                .with_shift(Arc::new(DoubleEnergy)),
        )
        .unwrap();
    let bumped = loader
        .register(
            SpectrumRequest::new(binning.clone(), Cut::everything(), energy_var(), Weight::unity())
                .with_shift(Arc::new(BumpEnergy)),
        )
        .unwrap();
    let nominal = loader
        .register(SpectrumRequest::new(
            binning,
            Cut::everything(),
            energy_var(),
            Weight::unity(),
        ))
        .unwrap();

    loader.execute().unwrap();

    // Bin i covers [i, i+1).
    assert_relative_eq!(loader.spectrum(doubled).unwrap().contents()[8], 1.0);
    assert_relative_eq!(loader.spectrum(bumped).unwrap().contents()[5], 1.0);
    assert_relative_eq!(loader.spectrum(nominal).unwrap().contents()[4], 1.0);
}

#[test]
fn exposure_equals_sum_of_container_headers() {
    // Delivered exposure is credited per container to every cut, including
    // a cut that rejects every record.
    let mut loader = loader_over(vec![
        container(10.0, &[0.5]),
        container(20.0, &[]),
        container(30.0, &[2.0, 3.0]),
    ]);
    let accept_all = loader
        .register(SpectrumRequest::new(
            Binning::simple(10, 0.0, 5.0),
            Cut::everything(),
            energy_var(),
            Weight::unity(),
        ))
        .unwrap();
    let reject_all = loader
        .register(SpectrumRequest::new(
            Binning::simple(10, 0.0, 5.0),
            Cut::new("nothing", |_| false),
            energy_var(),
            Weight::unity(),
        ))
        .unwrap();

    loader.execute().unwrap();

    let all = loader.spectrum(accept_all).unwrap();
    assert_eq!(all.entries(), 3);
    assert_relative_eq!(all.pot(), 60.0);
    assert_relative_eq!(all.livetime(), 6.0);

    let none = loader.spectrum(reject_all).unwrap();
    assert_eq!(none.entries(), 0);
    assert_relative_eq!(none.pot(), 60.0);
    assert_relative_eq!(none.livetime(), 6.0);
}

#[test]
fn weight_scales_fill_amplitude() {
    let mut loader = loader_over(vec![container(1.0, &[1.5, 2.5])]);
    let h = loader
        .register(SpectrumRequest::new(
            Binning::simple(5, 0.0, 5.0),
            Cut::everything(),
            energy_var(),
            Weight::new("2x_energy", |r| 2.0 * r.get(Field::Energy)),
        ))
        .unwrap();
    loader.execute().unwrap();

    let s = loader.spectrum(h).unwrap();
    assert_relative_eq!(s.contents()[1], 3.0);
    assert_relative_eq!(s.contents()[2], 5.0);
}

#[test]
fn cut_is_evaluated_against_the_shifted_record() {
    // energy 0.6 fails "energy > 1.0" nominally but passes once doubled.
    let mut loader = loader_over(vec![container(1.0, &[0.6])]);
    let cut = Cut::new("energy > 1.0", |r| r.get(Field::Energy) > 1.0);

    let nominal = loader
        .register(SpectrumRequest::new(
            Binning::simple(10, 0.0, 5.0),
            cut.clone(),
            energy_var(),
            Weight::unity(),
        ))
        .unwrap();
    let shifted = loader
        .register(
            SpectrumRequest::new(Binning::simple(10, 0.0, 5.0), cut, energy_var(), Weight::unity())
                .with_shift(Arc::new(DoubleEnergy)),
        )
        .unwrap();

    loader.execute().unwrap();

    assert_eq!(loader.spectrum(nominal).unwrap().entries(), 0);
    assert_eq!(loader.spectrum(shifted).unwrap().entries(), 1);
}

#[test]
fn unreadable_container_is_skipped_with_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.json");
    let bad = dir.path().join("bad.json");
    std::fs::write(&good, serde_json::to_vec(&container(5.0, &[1.0, 2.0])).unwrap()).unwrap();
    std::fs::write(&bad, b"definitely not a container").unwrap();

    let mut loader = SpectrumLoader::from_files(vec![bad, good]);
    let h = loader
        .register(SpectrumRequest::new(
            Binning::simple(5, 0.0, 5.0),
            Cut::everything(),
            energy_var(),
            Weight::unity(),
        ))
        .unwrap();
    loader.execute().unwrap();

    assert_eq!(loader.skipped_containers(), 1);
    let s = loader.spectrum(h).unwrap();
    assert_eq!(s.entries(), 2);
    assert_relative_eq!(s.pot(), 5.0);
}
