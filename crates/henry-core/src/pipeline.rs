//! End-to-end geometry import: kernel → extract → merge → assemble

use henry_cad::{CadKernel, GeometryScan, default_kernel, detect_kernel, kernel_by_name};
use serde::{Deserialize, Serialize};

use crate::assemble::assemble;
use crate::error::{Error, Result};
use crate::extract::extract;
use crate::merge::NodeMerger;
use crate::model::{ImportResult, ReductionOptions};

/// Result of the backend availability probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendProbe {
    pub available: bool,
    pub backend: Option<String>,
}

/// Report the first available kernel in preference order
pub fn probe() -> BackendProbe {
    let backend = detect_kernel();
    BackendProbe {
        available: backend.is_some(),
        backend: backend.map(str::to_string),
    }
}

/// Resolve a backend name, or the preferred kernel when `None`
pub fn select_kernel(backend: Option<&str>) -> Result<Box<dyn CadKernel>> {
    let kernel = match backend {
        Some(name) => kernel_by_name(name).ok_or_else(|| {
            Error::BackendUnavailable(format!("backend '{}' is not compiled in", name))
        })?,
        None => default_kernel(),
    };
    if !kernel.is_available() {
        return Err(Error::BackendUnavailable(format!(
            "no CAD kernel available (tried '{}')",
            kernel.name()
        )));
    }
    Ok(kernel)
}

/// Reduce one geometry file to canonical nodes and filaments
///
/// Either a complete result or an error is returned, never a partial model.
pub fn import_geometry(
    data: &[u8],
    backend: Option<&str>,
    options: &ReductionOptions,
) -> Result<ImportResult> {
    if data.is_empty() {
        return Err(Error::InvalidInput("empty geometry file".into()));
    }

    let kernel = select_kernel(backend)?;
    tracing::info!(
        "Importing {} byte(s) with the {} kernel",
        data.len(),
        kernel.name()
    );

    let document = kernel.load(data)?;
    let scan = GeometryScan::collect(kernel.name(), document.as_ref())?;
    if scan.is_empty() {
        tracing::warn!("No solids or standalone edges found");
    } else {
        tracing::debug!(
            "{} of {} edge(s) are standalone",
            scan.standalone_edges.len(),
            scan.total_edges
        );
    }
    Ok(reduce(&scan, options))
}

/// Run extraction, merge and assembly on an already collected scan
pub fn reduce(scan: &GeometryScan, options: &ReductionOptions) -> ImportResult {
    let extraction = extract(scan);
    let merged = NodeMerger::new(options.merge_tolerance).merge(&extraction.nodes);
    let result = assemble(extraction, merged, &scan.backend);
    tracing::info!("{}", result.info);
    result
}
