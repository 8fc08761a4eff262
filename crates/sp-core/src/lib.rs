//! # sp-core
//!
//! Core types shared across the spectra workspace: the error enum, the
//! detector/sample configuration keys, and the flat event record that the
//! single-pass loader iterates over.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod record;
pub mod types;

pub use error::{Error, Result};
pub use record::{Field, Record};
pub use types::{Detector, ExposureHeader, RegistryKey, SampleKind, SwapConfig};
