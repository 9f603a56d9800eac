//! CAD Kernel Abstraction for Filament Extraction
//!
//! This crate provides:
//! - Abstract CAD kernel traits for loading geometry files
//! - A pure Rust STEP (ISO 10303-21) reader with B-rep topology
//! - An optional OpenCASCADE backend
//! - A backend-independent [`GeometryScan`] of solids and standalone edges

pub mod kernel;

// Re-exports for convenience
pub use kernel::{
    BoundingBox, CadError, CadKernel, CadResult, EdgeEndpoints, EdgeRecord, EntityId,
    GeometryDocument, GeometryScan, KERNEL_PREFERENCE, NullKernel, SolidRecord,
    available_kernels, default_kernel, detect_kernel, kernel_by_name,
};
