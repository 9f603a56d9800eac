//! Example circuit library

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{EXAMPLE_EXTENSION, MAX_EXAMPLE_SIZE};
use crate::error::{Error, Result};

/// A directory of example circuit files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Library {
    pub dir: PathBuf,
    /// Extension without the dot
    pub extension: String,
    /// Files of this size or larger are not listed
    pub max_size: u64,
}

impl Default for Library {
    fn default() -> Self {
        Self::new("examples/input")
    }
}

impl Library {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: EXAMPLE_EXTENSION.into(),
            max_size: MAX_EXAMPLE_SIZE,
        }
    }

    /// Sorted names of listable example files
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir)
            .map_err(|e| Error::Io(format!("{}: {}", self.dir.display(), e)))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !self.has_extension(&name) {
                continue;
            }
            let metadata = entry.metadata()?;
            if metadata.is_file() && metadata.len() < self.max_size {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Contents of one example, `None` when it does not exist
    pub fn fetch(&self, name: &str) -> Result<Option<String>> {
        validate_name(name)?;
        let path = self.dir.join(name);
        if !path.is_file() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(&path)?))
    }

    fn has_extension(&self, name: &str) -> bool {
        name.len() > self.extension.len() + 1 && name.ends_with(&format!(".{}", self.extension))
    }
}

/// Reject anything that could leave the library directory
fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(Error::InvalidInput(format!("invalid example name '{}'", name)));
    }
    Ok(())
}
