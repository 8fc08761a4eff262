//! Detector/sample configuration keys and exposure accounting types.

use serde::{Deserialize, Serialize};

/// Which detector a sample was recorded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Detector {
    /// Near detector.
    Near,
    /// Far detector.
    Far,
}

/// Whether a sample is recorded data or simulated truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleKind {
    /// Recorded detector data.
    Data,
    /// Simulation with truth information.
    SimulatedTruth,
}

/// Flavor-swap configuration of a simulated sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapConfig {
    /// Unswapped sample.
    None,
    /// Electron-neutrino appearance swap.
    ElectronSwap,
    /// Tau-neutrino appearance swap.
    TauSwap,
}

/// Key identifying one loader slot in a [`registry`](../index.html).
///
/// Only equality and hashing are required of this key; slot lookup is by
/// insertion-ordered scan, not by ordered map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistryKey {
    /// Detector the sample belongs to.
    pub detector: Detector,
    /// Data or simulation.
    pub sample: SampleKind,
    /// Flavor-swap configuration.
    pub swap: SwapConfig,
}

impl RegistryKey {
    /// Construct a key.
    pub fn new(detector: Detector, sample: SampleKind, swap: SwapConfig) -> Self {
        Self { detector, sample, swap }
    }
}

/// Per-container exposure header.
///
/// Exposure is accounted at container granularity, independent of whether
/// any record in the container passes any selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExposureHeader {
    /// Protons-on-target delivered for this container.
    pub pot: f64,
    /// Live detector time for this container, in seconds.
    pub livetime: f64,
}

impl ExposureHeader {
    /// Construct an exposure header.
    pub fn new(pot: f64, livetime: f64) -> Self {
        Self { pot, livetime }
    }
}
