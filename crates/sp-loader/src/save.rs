//! Hierarchical tag-dispatch persistence for aggregate results.
//!
//! Saved objects write a string tag naming their concrete kind into the
//! well-known `"type"` entry of a directory, then write payload entries and
//! recurse into named child directories. Loading dispatches on the tag.
//! Only externally observable aggregate content (histograms, exposure) is
//! persisted; scan-time state (cut dedup tables, restorer ledgers) never is.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};
use sp_core::{Error, Result};

use crate::spectrum::{Binning, Spectrum};

/// Slot every saved object writes its kind tag into.
pub const TAG_ENTRY: &str = "type";

/// One payload entry in a [`SaveDir`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SaveEntry {
    /// A string (tags, labels).
    Text(String),
    /// A scalar.
    Scalar(f64),
    /// A numeric array (bin edges, bin contents).
    Values(Vec<f64>),
    /// A named child directory.
    Dir(SaveDir),
}

/// A directory-like store: named entries, possibly nested.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SaveDir {
    entries: BTreeMap<String, SaveEntry>,
}

impl SaveDir {
    /// An empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write an entry, replacing any previous one of the same name.
    pub fn put(&mut self, name: impl Into<String>, entry: SaveEntry) {
        self.entries.insert(name.into(), entry);
    }

    /// Read an entry.
    pub fn get(&self, name: &str) -> Option<&SaveEntry> {
        self.entries.get(name)
    }

    /// The kind tag, if this directory holds a saved object.
    pub fn tag(&self) -> Option<&str> {
        match self.entries.get(TAG_ENTRY) {
            Some(SaveEntry::Text(t)) => Some(t),
            _ => None,
        }
    }

    fn require_text(&self, name: &str) -> Result<&str> {
        match self.get(name) {
            Some(SaveEntry::Text(t)) => Ok(t),
            _ => Err(Error::Configuration(format!("missing text entry '{name}'"))),
        }
    }

    fn require_scalar(&self, name: &str) -> Result<f64> {
        match self.get(name) {
            Some(SaveEntry::Scalar(v)) => Ok(*v),
            _ => Err(Error::Configuration(format!("missing scalar entry '{name}'"))),
        }
    }

    fn require_values(&self, name: &str) -> Result<&[f64]> {
        match self.get(name) {
            Some(SaveEntry::Values(v)) => Ok(v),
            _ => Err(Error::Configuration(format!("missing values entry '{name}'"))),
        }
    }

    /// Write this directory tree to a JSON file.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(BufWriter::new(file), self)?;
        Ok(())
    }

    /// Read a directory tree from a JSON file.
    pub fn read_json(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

/// Objects that can write themselves into a [`SaveDir`].
pub trait Saveable {
    /// Kind tag written into the [`TAG_ENTRY`] slot.
    fn tag(&self) -> &'static str;

    /// Serialize into a fresh directory.
    fn save(&self) -> SaveDir;
}

/// Any object reconstructed by tag dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedObject {
    /// A saved spectrum.
    Spectrum(Spectrum),
}

/// Reconstruct whatever object `dir` holds, dispatching on its tag.
pub fn load_any(dir: &SaveDir) -> Result<LoadedObject> {
    match dir.tag() {
        Some("spectrum") => Ok(LoadedObject::Spectrum(load_spectrum(dir)?)),
        Some(other) => Err(Error::Configuration(format!("unknown saved object tag '{other}'"))),
        None => Err(Error::Configuration("directory has no kind tag".into())),
    }
}

impl Saveable for Spectrum {
    fn tag(&self) -> &'static str {
        "spectrum"
    }

    fn save(&self) -> SaveDir {
        let mut dir = SaveDir::new();
        dir.put(TAG_ENTRY, SaveEntry::Text(self.tag().into()));
        dir.put("label", SaveEntry::Text(self.label().into()));
        dir.put("edges", SaveEntry::Values(self.binning().edges().to_vec()));
        dir.put("contents", SaveEntry::Values(self.contents().to_vec()));
        dir.put("underflow", SaveEntry::Scalar(self.underflow()));
        dir.put("overflow", SaveEntry::Scalar(self.overflow()));
        dir.put("entries", SaveEntry::Scalar(self.entries() as f64));
        let mut exposure = SaveDir::new();
        exposure.put("pot", SaveEntry::Scalar(self.pot()));
        exposure.put("livetime", SaveEntry::Scalar(self.livetime()));
        dir.put("exposure", SaveEntry::Dir(exposure));
        dir
    }
}

fn load_spectrum(dir: &SaveDir) -> Result<Spectrum> {
    let label = dir.require_text("label")?;
    let edges = dir.require_values("edges")?.to_vec();
    let contents = dir.require_values("contents")?;
    let underflow = dir.require_scalar("underflow")?;
    let overflow = dir.require_scalar("overflow")?;
    let entries = dir.require_scalar("entries")? as u64;
    let exposure = match dir.get("exposure") {
        Some(SaveEntry::Dir(d)) => d,
        _ => return Err(Error::Configuration("missing 'exposure' subdirectory".into())),
    };
    let pot = exposure.require_scalar("pot")?;
    let livetime = exposure.require_scalar("livetime")?;

    let binning = Binning::custom(edges)?;
    if contents.len() != binning.n_bins() {
        return Err(Error::Configuration(format!(
            "contents length {} does not match {} bins",
            contents.len(),
            binning.n_bins()
        )));
    }
    Ok(Spectrum::from_parts(
        label.to_owned(),
        binning,
        contents.to_vec(),
        underflow,
        overflow,
        entries,
        pot,
        livetime,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled_spectrum() -> Spectrum {
        let mut s = Spectrum::new("energy", Binning::simple(3, 0.0, 3.0));
        s.fill(0.5, 2.0);
        s.fill(1.5, 1.0);
        s.fill(-1.0, 0.5);
        s.fill(9.0, 0.25);
        s.add_exposure(1.5e20, 250.0);
        s
    }

    #[test]
    fn spectrum_roundtrip() {
        let s = filled_spectrum();
        let dir = s.save();
        assert_eq!(dir.tag(), Some("spectrum"));
        match load_any(&dir).unwrap() {
            LoadedObject::Spectrum(back) => assert_eq!(back, s),
        }
    }

    #[test]
    fn json_file_roundtrip() {
        let s = filled_spectrum();
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("spectrum.json");
        s.save().write_json(&path).unwrap();
        let dir = SaveDir::read_json(&path).unwrap();
        match load_any(&dir).unwrap() {
            LoadedObject::Spectrum(back) => assert_eq!(back, s),
        }
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut dir = SaveDir::new();
        dir.put(TAG_ENTRY, SaveEntry::Text("prediction".into()));
        assert!(load_any(&dir).is_err());
    }

    #[test]
    fn missing_tag_is_rejected() {
        assert!(load_any(&SaveDir::new()).is_err());
    }
}
