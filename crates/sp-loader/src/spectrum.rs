//! Weighted binned spectra with exposure accounting.

use serde::{Deserialize, Serialize};
use sp_core::{Error, Result};

/// Bin-edge definition for a [`Spectrum`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    edges: Vec<f64>,
}

impl Binning {
    /// `n` equal-width bins spanning `[lo, hi)`.
    pub fn simple(n: usize, lo: f64, hi: f64) -> Self {
        let width = (hi - lo) / n as f64;
        let edges = (0..=n).map(|i| lo + width * i as f64).collect();
        Self { edges }
    }

    /// Arbitrary sorted bin edges (length = n_bins + 1).
    pub fn custom(edges: Vec<f64>) -> Result<Self> {
        if edges.len() < 2 {
            return Err(Error::Configuration(format!(
                "binning needs at least 2 edges, got {}",
                edges.len()
            )));
        }
        // A NaN edge would also slip past the monotonicity check below,
        // since comparisons against NaN are always false.
        if edges.iter().any(|e| !e.is_finite()) {
            return Err(Error::Configuration("bin edges must be finite".into()));
        }
        if edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(Error::Configuration("bin edges must be strictly increasing".into()));
        }
        Ok(Self { edges })
    }

    /// Number of bins (excluding under/overflow).
    pub fn n_bins(&self) -> usize {
        self.edges.len() - 1
    }

    /// The bin edges.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Bin index for `val`, or `None` for under/overflow and NaN.
    pub fn find_bin(&self, val: f64) -> Option<usize> {
        let edges = &self.edges;
        if val.is_nan() || val < edges[0] || val >= edges[edges.len() - 1] {
            return None;
        }
        match edges.binary_search_by(|e| e.total_cmp(&val)) {
            Ok(i) => {
                if i >= edges.len() - 1 {
                    None
                } else {
                    Some(i)
                }
            }
            Err(i) => {
                if i == 0 || i >= edges.len() {
                    None
                } else {
                    Some(i - 1)
                }
            }
        }
    }
}

/// A weighted histogram plus the exposure it was accumulated over.
///
/// Exposure (POT and livetime) is tracked independently of histogram
/// content: a spectrum whose cut rejected every record still carries the
/// full delivered exposure of the scanned containers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Spectrum {
    label: String,
    binning: Binning,
    contents: Vec<f64>,
    underflow: f64,
    overflow: f64,
    entries: u64,
    pot: f64,
    livetime: f64,
}

impl Spectrum {
    /// An empty spectrum.
    pub fn new(label: impl Into<String>, binning: Binning) -> Self {
        let n = binning.n_bins();
        Self {
            label: label.into(),
            binning,
            contents: vec![0.0; n],
            underflow: 0.0,
            overflow: 0.0,
            entries: 0,
            pot: 0.0,
            livetime: 0.0,
        }
    }

    /// Reassemble a spectrum from persisted parts.
    ///
    /// Used by the save/load protocol; `contents` length must match the
    /// binning (callers validate before constructing).
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        label: String,
        binning: Binning,
        contents: Vec<f64>,
        underflow: f64,
        overflow: f64,
        entries: u64,
        pot: f64,
        livetime: f64,
    ) -> Self {
        Self { label, binning, contents, underflow, overflow, entries, pot, livetime }
    }

    /// Accumulate `weight` at coordinate `val`.
    ///
    /// Out-of-range values land in the under/overflow sums; a NaN
    /// coordinate counts as overflow (the ROOT convention), never a panic.
    pub fn fill(&mut self, val: f64, weight: f64) {
        self.entries += 1;
        match self.binning.find_bin(val) {
            Some(b) => self.contents[b] += weight,
            None => {
                if val < self.binning.edges()[0] {
                    self.underflow += weight;
                } else {
                    self.overflow += weight;
                }
            }
        }
    }

    /// Credit delivered exposure to this spectrum.
    pub fn add_exposure(&mut self, pot: f64, livetime: f64) {
        self.pot += pot;
        self.livetime += livetime;
    }

    /// Spectrum label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The binning.
    pub fn binning(&self) -> &Binning {
        &self.binning
    }

    /// Per-bin sums of weights (excluding under/overflow).
    pub fn contents(&self) -> &[f64] {
        &self.contents
    }

    /// Sum of weights below the first bin edge.
    pub fn underflow(&self) -> f64 {
        self.underflow
    }

    /// Sum of weights at or above the last bin edge.
    pub fn overflow(&self) -> f64 {
        self.overflow
    }

    /// Number of fill calls, including under/overflow.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Accumulated protons-on-target.
    pub fn pot(&self) -> f64 {
        self.pot
    }

    /// Accumulated livetime, seconds.
    pub fn livetime(&self) -> f64 {
        self.livetime
    }

    /// Integral of bin contents (excluding under/overflow).
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }
}
