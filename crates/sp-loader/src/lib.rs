//! # sp-loader
//!
//! Single-pass spectrum aggregation engine.
//!
//! Client code registers (cut, projection, weight) requests against a
//! [`SpectrumLoader`] obtained from a [`Loaders`] registry; one call to
//! [`Loaders::execute_all`] scans every configured record source exactly
//! once, filling every registered [`Spectrum`] and crediting per-cut
//! exposure (POT and livetime) back to each of them.
//!
//! ## Example
//!
//! ```no_run
//! use sp_core::Field;
//! use sp_loader::{Binning, Cut, SpectrumLoader, SpectrumRequest, Var, Weight, LoaderBase};
//!
//! let mut loader = SpectrumLoader::from_path("containers/nd_data.json");
//! let handle = loader
//!     .register(SpectrumRequest::new(
//!         Binning::simple(10, 0.0, 5.0),
//!         Cut::new("energy_gt_1", |r| r.get(Field::Energy) > 1.0),
//!         Var::new("energy", |r| r.get(Field::Energy)),
//!         Weight::unity(),
//!     ))
//!     .unwrap();
//! loader.execute().unwrap();
//! let spectrum = loader.spectrum(handle).unwrap();
//! println!("selected entries: {}, pot: {}", spectrum.entries(), spectrum.pot());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cut;
pub mod loader;
pub mod registry;
pub mod restorer;
pub mod save;
pub mod source;
pub mod spectrum;
pub mod syst;
pub mod var;

pub use cut::Cut;
pub use loader::{LoaderBase, NullLoader, SpectrumHandle, SpectrumLoader, SpectrumRequest};
pub use registry::{Loaders, SharedLoader};
pub use restorer::Restorer;
pub use save::{load_any, LoadedObject, SaveDir, SaveEntry, Saveable};
pub use source::{Container, JsonFileSource, MemorySource, RecordSource};
pub use spectrum::{Binning, Spectrum};
pub use syst::SystShift;
pub use var::{Var, Weight};
