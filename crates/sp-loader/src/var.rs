//! Projections and weights over event records.

use std::fmt;
use std::sync::Arc;

use sp_core::Record;

/// A numeric projection over one event record, used as the histogram-fill
/// coordinate.
#[derive(Clone)]
pub struct Var {
    label: Arc<str>,
    func: Arc<dyn Fn(&Record) -> f64 + Send + Sync>,
}

impl Var {
    /// Build a projection from a label and a function.
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record) -> f64 + Send + Sync + 'static,
    {
        Self { label: Arc::from(label.into()), func: Arc::new(func) }
    }

    /// Evaluate against one record.
    pub fn eval(&self, rec: &Record) -> f64 {
        (self.func)(rec)
    }

    /// Human-readable label; also names the spectrum filled from it.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var").field("label", &self.label).finish()
    }
}

/// A numeric weight over one event record, used as the histogram-fill
/// amplitude.
#[derive(Clone)]
pub struct Weight {
    label: Arc<str>,
    func: Arc<dyn Fn(&Record) -> f64 + Send + Sync>,
}

impl Weight {
    /// Build a weight from a label and a function.
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record) -> f64 + Send + Sync + 'static,
    {
        Self { label: Arc::from(label.into()), func: Arc::new(func) }
    }

    /// The constant weight 1.
    pub fn unity() -> Self {
        Weight::new("unity", |_| 1.0)
    }

    /// Evaluate against one record.
    pub fn eval(&self, rec: &Record) -> f64 {
        (self.func)(rec)
    }

    /// Human-readable label.
    pub fn label(&self) -> &str {
        &self.label
    }
}

impl fmt::Debug for Weight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Weight").field("label", &self.label).finish()
    }
}
