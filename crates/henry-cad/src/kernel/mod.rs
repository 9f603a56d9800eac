//! CAD kernel backends and selection

mod bounds;
mod scan;
mod traits;

#[cfg(feature = "native")]
pub mod native;

#[cfg(feature = "opencascade")]
mod opencascade;

pub use bounds::BoundingBox;
pub use scan::{EdgeRecord, GeometryScan, SolidRecord};
pub use traits::{
    CadError, CadKernel, CadResult, EdgeEndpoints, EntityId, GeometryDocument, NullKernel,
};

#[cfg(feature = "native")]
pub use native::NativeStepKernel;

#[cfg(feature = "opencascade")]
pub use opencascade::OpenCascadeKernel;

/// Backend names in order of preference
pub const KERNEL_PREFERENCE: &[&str] = &["opencascade", "native"];

/// Look up a compiled-in kernel by name
pub fn kernel_by_name(name: &str) -> Option<Box<dyn CadKernel>> {
    match name {
        #[cfg(feature = "opencascade")]
        "opencascade" => Some(Box::new(OpenCascadeKernel::new())),
        #[cfg(feature = "native")]
        "native" => Some(Box::new(NativeStepKernel::new())),
        _ => None,
    }
}

/// Names of the kernels compiled into this build, in preference order
pub fn available_kernels() -> Vec<&'static str> {
    KERNEL_PREFERENCE
        .iter()
        .copied()
        .filter(|name| kernel_by_name(name).is_some_and(|kernel| kernel.is_available()))
        .collect()
}

/// Get the preferred available kernel, falling back to [`NullKernel`]
pub fn default_kernel() -> Box<dyn CadKernel> {
    KERNEL_PREFERENCE
        .iter()
        .filter_map(|name| kernel_by_name(name))
        .find(|kernel| kernel.is_available())
        .unwrap_or_else(|| Box::new(NullKernel))
}

/// Name of the preferred available kernel, if any
pub fn detect_kernel() -> Option<&'static str> {
    available_kernels().first().copied()
}
