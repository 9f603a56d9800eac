//! Persisted settings (RON)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{IMPORT_TIMEOUT_SECS, MERGE_TOLERANCE};
use crate::error::{Error, Result};
use crate::library::Library;
use crate::model::ReductionOptions;
use crate::solver::SolverConfig;

/// Geometry import settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportSettings {
    /// Worker wall-clock bound in seconds
    pub timeout_secs: u64,
    /// Kernel to use; the preferred available one when unset
    pub backend: Option<String>,
    pub merge_tolerance: f64,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            timeout_secs: IMPORT_TIMEOUT_SECS,
            backend: None,
            merge_tolerance: MERGE_TOLERANCE,
        }
    }
}

impl ImportSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn reduction(&self) -> ReductionOptions {
        ReductionOptions {
            merge_tolerance: self.merge_tolerance,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub solver: SolverConfig,
    pub import: ImportSettings,
    pub library: Library,
}

impl Settings {
    /// Load settings from a file; a missing file yields the defaults
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Io(format!("{}: {}", path.display(), e)))?;
        Self::from_ron(&content)
    }

    pub fn from_ron(content: &str) -> Result<Self> {
        ron::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save settings to a file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
