//! On-disk layout of the local bucket tree.
//!
//! ```text
//! <base>/<bucket>/config.json
//! <base>/<bucket>/<design>/<view>.js
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::model::{DesignDocument, LocalBucketConfiguration};

pub const CONFIG_FILE: &str = "config.json";
pub const VIEW_EXTENSION: &str = "js";

/// Result of looking for `config.json` in a bucket directory.
#[derive(Debug)]
pub enum ConfigFile {
    Missing,
    Loaded(LocalBucketConfiguration),
    /// A JSON object with some unreadable fields; those fields hold their defaults.
    Partial {
        config: LocalBucketConfiguration,
        problems: Vec<String>,
    },
    /// Not a JSON object at all.
    Malformed(serde_json::Error),
}

/// Immediate subdirectories of `dir`, sorted by name.
pub fn list_subdirectories(dir: &Path) -> io::Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Final path component as a string.
pub fn dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

pub fn read_bucket_config(bucket_dir: &Path) -> io::Result<ConfigFile> {
    let path = bucket_dir.join(CONFIG_FILE);
    let content = match fs::read_to_string(&path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ConfigFile::Missing),
        Err(e) => return Err(e),
    };
    let value: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => return Ok(ConfigFile::Malformed(e)),
    };
    match serde_json::from_value::<LocalBucketConfiguration>(value.clone()) {
        Ok(config) => Ok(ConfigFile::Loaded(config)),
        Err(e) => match value.as_object() {
            Some(fields) => {
                let (config, problems) = LocalBucketConfiguration::from_json_fields(fields);
                Ok(ConfigFile::Partial { config, problems })
            }
            None => Ok(ConfigFile::Malformed(e)),
        },
    }
}

/// Reads every `*.js` file directly under `design_dir` into a design document
/// named after the directory. Sources are kept byte for byte.
pub fn read_design_document(design_dir: &Path) -> io::Result<DesignDocument> {
    let mut doc = DesignDocument::new(dir_name(design_dir));
    for entry in fs::read_dir(design_dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) != Some(VIEW_EXTENSION) {
            continue;
        }
        let Some(view) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            continue;
        };
        let source = fs::read_to_string(&path)?;
        debug!(design = %doc.name, view = %view, "Read local view");
        doc.views.insert(view, source);
    }
    Ok(doc)
}

/// In-memory image of one bucket directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalBucketTree {
    pub config: LocalBucketConfiguration,
    pub design_documents: BTreeMap<String, DesignDocument>,
}

impl LocalBucketTree {
    pub fn new(config: LocalBucketConfiguration) -> Self {
        Self {
            config,
            design_documents: BTreeMap::new(),
        }
    }

    pub fn view_count(&self) -> usize {
        self.design_documents.values().map(|d| d.views.len()).sum()
    }

    /// Writes `config.json` and one `<view>.js` per view under `<base>/<dir_name>`.
    /// Existing files are overwritten; files not in the tree are left alone.
    pub fn write_to(&self, base: &Path, dir_name: &str) -> io::Result<PathBuf> {
        let bucket_dir = base.join(dir_name);
        fs::create_dir_all(&bucket_dir)?;

        let config = serde_json::to_string_pretty(&self.config)?;
        fs::write(bucket_dir.join(CONFIG_FILE), config)?;

        for design in self.design_documents.values() {
            let design_dir = bucket_dir.join(&design.name);
            fs::create_dir_all(&design_dir)?;
            for (view, source) in &design.views {
                fs::write(design_dir.join(format!("{view}.{VIEW_EXTENSION}")), source)?;
            }
        }
        Ok(bucket_dir)
    }
}
