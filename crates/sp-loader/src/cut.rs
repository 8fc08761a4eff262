//! Selection predicates over event records.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use sp_core::Record;

/// A boolean selection over one event record.
///
/// Cuts are pure with respect to record content: only the systematic-shift
/// step of the scan may mutate a record. Equality and hashing go through the
/// identity string, so two cuts built independently from the same definition
/// deduplicate: the loader evaluates each distinct identity exactly once
/// per (record, variation).
#[derive(Clone)]
pub struct Cut {
    identity: Arc<str>,
    func: Arc<dyn Fn(&Record) -> bool + Send + Sync>,
}

impl Cut {
    /// Build a cut from an identity string and a predicate function.
    ///
    /// The identity must be a stable description of the definition: cuts
    /// with equal identities are assumed interchangeable.
    pub fn new<F>(identity: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record) -> bool + Send + Sync + 'static,
    {
        Self { identity: Arc::from(identity.into()), func: Arc::new(func) }
    }

    /// A cut that accepts every record.
    pub fn everything() -> Self {
        Cut::new("everything", |_| true)
    }

    /// Evaluate against one record.
    pub fn passes(&self, rec: &Record) -> bool {
        (self.func)(rec)
    }

    /// The identity string used for deduplication.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Conjunction, with a derived identity.
    pub fn and(&self, other: &Cut) -> Cut {
        let (a, b) = (self.clone(), other.clone());
        Cut::new(format!("({} && {})", self.identity, other.identity), move |r| {
            a.passes(r) && b.passes(r)
        })
    }

    /// Disjunction, with a derived identity.
    pub fn or(&self, other: &Cut) -> Cut {
        let (a, b) = (self.clone(), other.clone());
        Cut::new(format!("({} || {})", self.identity, other.identity), move |r| {
            a.passes(r) || b.passes(r)
        })
    }

    /// Negation, with a derived identity.
    pub fn not(&self) -> Cut {
        let a = self.clone();
        Cut::new(format!("!{}", self.identity), move |r| !a.passes(r))
    }
}

impl PartialEq for Cut {
    fn eq(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl Eq for Cut {}

impl Hash for Cut {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity.hash(state);
    }
}

impl fmt::Debug for Cut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cut").field("identity", &self.identity).finish()
    }
}
