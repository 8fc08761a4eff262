//! Record sources: ordered sequences of physical containers.
//!
//! The loader treats a source as an opaque iterable of containers, each
//! carrying an exposure header and a batch of records. Wildcard and dataset
//! catalog resolution are an external collaborator's concern; the bundled
//! implementations cover in-memory feeds and one-JSON-file-per-container
//! inputs.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sp_core::{Error, ExposureHeader, Record, Result};

/// One physical container: an exposure header plus its records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Container {
    /// Exposure delivered with this container, independent of selection.
    pub header: ExposureHeader,
    /// The event records.
    pub records: Vec<Record>,
}

impl Container {
    /// Construct a container.
    pub fn new(header: ExposureHeader, records: Vec<Record>) -> Self {
        Self { header, records }
    }
}

/// An ordered sequence of containers.
///
/// A per-container `Err` marks that container unreadable; the loader skips
/// it, counts it, and continues the scan.
pub trait RecordSource: Send {
    /// Iterate the containers in order.
    fn containers(&mut self) -> Box<dyn Iterator<Item = Result<Container>> + '_>;
}

/// In-process source backed by pre-built containers.
#[derive(Debug, Default)]
pub struct MemorySource {
    containers: Vec<Container>,
}

impl MemorySource {
    /// Source yielding `containers` in order.
    pub fn new(containers: Vec<Container>) -> Self {
        Self { containers }
    }
}

impl RecordSource for MemorySource {
    fn containers(&mut self) -> Box<dyn Iterator<Item = Result<Container>> + '_> {
        Box::new(self.containers.iter().cloned().map(Ok))
    }
}

/// File-backed source: each path holds one JSON-encoded [`Container`].
#[derive(Debug)]
pub struct JsonFileSource {
    paths: Vec<PathBuf>,
}

impl JsonFileSource {
    /// Source over an explicit file list.
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths }
    }

    /// Source over a single file.
    pub fn single(path: impl Into<PathBuf>) -> Self {
        Self { paths: vec![path.into()] }
    }

    fn read_container(path: &Path) -> Result<Container> {
        let file = File::open(path)
            .map_err(|e| Error::SourceRead(format!("{}: {e}", path.display())))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::SourceRead(format!("{}: {e}", path.display())))
    }
}

impl RecordSource for JsonFileSource {
    fn containers(&mut self) -> Box<dyn Iterator<Item = Result<Container>> + '_> {
        Box::new(self.paths.iter().map(|p| Self::read_container(p)))
    }
}
