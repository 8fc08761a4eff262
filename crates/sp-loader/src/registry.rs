//! Registry of loaders keyed by detector/sample configuration.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use sp_core::{Detector, Error, RegistryKey, Result, SampleKind, SwapConfig};
use tracing::info;

use crate::loader::{LoaderBase, NullLoader, SpectrumLoader};

/// A loader shared between the registry and its clients (and possibly
/// between several registry slots, when one physical sample serves more
/// than one configuration).
pub type SharedLoader = Arc<Mutex<dyn LoaderBase + Send>>;

/// How one slot's data source was declared, before reification.
enum SlotState {
    /// Declared by path; resolved to a loader on first access.
    Path(String),
    /// Declared by explicit file list; resolved on first access.
    Files(Vec<PathBuf>),
    /// Declared by both path and file list; reported on access.
    Conflicting,
    /// Live loader, constructed at most once.
    Reified(SharedLoader),
    /// Explicitly disabled: resolves to the shared sentinel.
    Disabled,
}

struct Slot {
    key: RegistryKey,
    state: SlotState,
}

/// Collection of spectrum loaders for many detector/sample configurations.
///
/// Data sources are declared up front (by path or file list) and reified
/// into live loaders lazily, on first [`get_loader`](Loaders::get_loader).
/// [`execute_all`](Loaders::execute_all) then runs every reified loader's
/// single pass.
pub struct Loaders {
    slots: Vec<Slot>,
    /// Reification order, as indices into `slots`; execution follows it.
    exec_order: Vec<usize>,
    /// Shared no-op sentinel handed out for disabled or unset keys.
    sentinel: SharedLoader,
    near_detector_mode: bool,
}

impl Default for Loaders {
    fn default() -> Self {
        Self::new()
    }
}

impl Loaders {
    /// No loaders configured.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            exec_order: Vec::new(),
            sentinel: Arc::new(Mutex::new(NullLoader::new())),
            near_detector_mode: false,
        }
    }

    /// Interpret configurations as near-detector by default.
    ///
    /// An instance field, not process-global state, so registries in one
    /// process stay independently testable. Does not alter the execution
    /// algorithm.
    pub fn set_near_detector_mode(&mut self, nd: bool) {
        self.near_detector_mode = nd;
    }

    /// Whether near-detector interpretation defaults are active.
    pub fn near_detector_mode(&self) -> bool {
        self.near_detector_mode
    }

    fn slot_index(&self, key: RegistryKey) -> Option<usize> {
        self.slots.iter().position(|s| s.key == key)
    }

    fn declare(&mut self, key: RegistryKey, state: SlotState) -> Result<()> {
        match self.slot_index(key) {
            None => {
                self.slots.push(Slot { key, state });
                Ok(())
            }
            Some(i) => {
                let reified = matches!(self.slots[i].state, SlotState::Reified(_));
                if reified {
                    return Err(Error::Configuration(format!(
                        "loader for {key:?} already constructed; sources are fixed at reification"
                    )));
                }
                // Declaring by path and by file list for one key is
                // contradictory; remember that and fail on access.
                let conflict = matches!(
                    (&self.slots[i].state, &state),
                    (SlotState::Path(_), SlotState::Files(_))
                        | (SlotState::Files(_), SlotState::Path(_))
                );
                self.slots[i].state = if conflict { SlotState::Conflicting } else { state };
                Ok(())
            }
        }
    }

    /// Declare a data source for `(det, sample, swap)` by path.
    pub fn set_loader_path(
        &mut self,
        path: impl Into<String>,
        det: Detector,
        sample: SampleKind,
        swap: SwapConfig,
    ) -> Result<()> {
        self.declare(RegistryKey::new(det, sample, swap), SlotState::Path(path.into()))
    }

    /// Declare a data source for `(det, sample, swap)` by explicit file list.
    pub fn set_loader_files(
        &mut self,
        files: Vec<PathBuf>,
        det: Detector,
        sample: SampleKind,
        swap: SwapConfig,
    ) -> Result<()> {
        self.declare(RegistryKey::new(det, sample, swap), SlotState::Files(files))
    }

    /// Install a caller-constructed loader directly.
    ///
    /// Bypasses path resolution; the same instance may be installed under
    /// several keys when they resolve to the same physical sample (e.g. one
    /// swapped-flavor file set serving both appearance configurations).
    pub fn add_loader(
        &mut self,
        loader: SharedLoader,
        det: Detector,
        sample: SampleKind,
        swap: SwapConfig,
    ) -> Result<()> {
        let key = RegistryKey::new(det, sample, swap);
        self.declare(key, SlotState::Reified(loader))?;
        if let Some(i) = self.slot_index(key) {
            if !self.exec_order.contains(&i) {
                self.exec_order.push(i);
            }
        }
        Ok(())
    }

    /// Mark `(det, sample, swap)` as having no data on purpose.
    ///
    /// Clients registering against it get the silent sentinel instead of a
    /// configuration fault; the mistake surfaces only if its results are
    /// actually requested.
    pub fn disable_loader(
        &mut self,
        det: Detector,
        sample: SampleKind,
        swap: SwapConfig,
    ) -> Result<()> {
        self.declare(RegistryKey::new(det, sample, swap), SlotState::Disabled)
    }

    /// Fetch the loader for `(det, sample, swap)`, constructing it from its
    /// declared source on first access.
    ///
    /// Unset and disabled keys resolve to a shared no-op sentinel that
    /// accepts registrations but fails on execution.
    pub fn get_loader(
        &mut self,
        det: Detector,
        sample: SampleKind,
        swap: SwapConfig,
    ) -> Result<SharedLoader> {
        let key = RegistryKey::new(det, sample, swap);
        let i = match self.slot_index(key) {
            Some(i) => i,
            None => return Ok(self.sentinel.clone()),
        };
        match &self.slots[i].state {
            SlotState::Reified(l) => Ok(l.clone()),
            SlotState::Disabled => Ok(self.sentinel.clone()),
            SlotState::Conflicting => Err(Error::Configuration(format!(
                "{key:?} declared by both path and file list"
            ))),
            SlotState::Path(path) => {
                info!(?key, path, "reifying loader from path");
                let loader: SharedLoader =
                    Arc::new(Mutex::new(SpectrumLoader::from_path(path.clone())));
                self.slots[i].state = SlotState::Reified(loader.clone());
                self.exec_order.push(i);
                Ok(loader)
            }
            SlotState::Files(files) => {
                info!(?key, n_files = files.len(), "reifying loader from file list");
                let loader: SharedLoader =
                    Arc::new(Mutex::new(SpectrumLoader::from_files(files.clone())));
                self.slots[i].state = SlotState::Reified(loader.clone());
                self.exec_order.push(i);
                Ok(loader)
            }
        }
    }

    /// Execute every reified loader, in the order they were first reified.
    ///
    /// A loader installed under several keys runs exactly once: a second
    /// execution of the same instance would be `AlreadyExecuted` by design.
    /// Independent loaders have no ordering dependency; the fixed order
    /// only keeps exposure logging reproducible.
    pub fn execute_all(&mut self) -> Result<()> {
        let mut ran: Vec<SharedLoader> = Vec::new();
        for &i in &self.exec_order {
            let loader = match &self.slots[i].state {
                SlotState::Reified(l) => l.clone(),
                _ => continue,
            };
            if ran.iter().any(|r| Arc::ptr_eq(r, &loader)) {
                continue;
            }
            info!(key = ?self.slots[i].key, "executing loader");
            loader
                .lock()
                .map_err(|_| Error::Evaluation("loader mutex poisoned".into()))?
                .execute()?;
            ran.push(loader);
        }
        Ok(())
    }
}
