//! CAD Kernel trait definitions
//!
//! These traits define the interface that all CAD kernels must implement.
//! A kernel turns the bytes of a geometry file into a [`GeometryDocument`],
//! and the document answers the topology queries the filament extractor needs.

use std::collections::HashSet;
use std::fmt;

use glam::DVec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::BoundingBox;

/// Identifier of a topological entity within one loaded document
///
/// Identity is topological: two references denote the same entity iff the
/// kernel resolves them to the same underlying edge/solid record, never by
/// comparing coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl EntityId {
    /// Create a new entity ID
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw numeric value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// First and last vertex of an edge
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeEndpoints {
    /// Start vertex
    pub start: DVec3,
    /// End vertex
    pub end: DVec3,
}

impl EdgeEndpoints {
    /// Create new endpoints
    pub fn new(start: DVec3, end: DVec3) -> Self {
        Self { start, end }
    }

    /// Straight-line distance between the two vertices
    pub fn length(&self) -> f64 {
        self.start.distance(self.end)
    }
}

/// Error type for CAD kernel operations
#[derive(Debug, Clone, Error)]
pub enum CadError {
    #[error("Kernel not available: {0}")]
    KernelNotAvailable(String),

    #[error("Invalid geometry file: {0}")]
    InvalidFormat(String),

    #[error("Unresolved entity reference {0}")]
    MissingEntity(EntityId),

    #[error("Unexpected entity {id}: {reason}")]
    UnexpectedEntity { id: EntityId, reason: String },

    #[error("Operation failed: {0}")]
    OperationFailed(String),

    #[error("File I/O error: {0}")]
    FileIo(String),

    #[error("STEP import failed: {0}")]
    StepImport(String),
}

/// Result type for CAD operations
pub type CadResult<T> = Result<T, CadError>;

/// A loaded geometry file
///
/// Enumeration order of `solids()` and `edges()` is stable for a given input
/// and drives the numbering of everything downstream.
pub trait GeometryDocument {
    /// All solid bodies, in kernel enumeration order
    fn solids(&self) -> Vec<EntityId>;

    /// All edge (curve) entities, in kernel enumeration order
    fn edges(&self) -> Vec<EntityId>;

    /// Edges that lie on the boundary of at least one solid
    fn solid_boundary_edges(&self) -> CadResult<HashSet<EntityId>>;

    /// Axis-aligned bounding box of a solid or an edge
    fn bounding_box(&self, entity: EntityId) -> CadResult<BoundingBox>;

    /// First and last vertex of an edge, `None` when the edge has fewer than
    /// two vertices
    fn edge_endpoints(&self, edge: EntityId) -> CadResult<Option<EdgeEndpoints>>;

    /// Edges minus solid-boundary edges, in `edges()` order
    fn standalone_edges(&self) -> CadResult<Vec<EntityId>> {
        let bound = self.solid_boundary_edges()?;
        Ok(self
            .edges()
            .into_iter()
            .filter(|edge| !bound.contains(edge))
            .collect())
    }
}

/// The main CAD kernel trait
///
/// Implementations of this trait read geometry using different backends
/// (OpenCASCADE, the native STEP reader, ...)
pub trait CadKernel: Send + Sync {
    /// Get the name of this kernel
    fn name(&self) -> &str;

    /// Check if the kernel is available
    fn is_available(&self) -> bool;

    /// Parse a geometry file
    ///
    /// # Arguments
    /// * `data` - Raw file contents
    fn load(&self, data: &[u8]) -> CadResult<Box<dyn GeometryDocument>>;
}

/// A null kernel that always returns errors (used when no kernel is available)
#[derive(Debug, Default)]
pub struct NullKernel;

impl CadKernel for NullKernel {
    fn name(&self) -> &str {
        "null"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn load(&self, _data: &[u8]) -> CadResult<Box<dyn GeometryDocument>> {
        Err(CadError::KernelNotAvailable(
            "No CAD kernel available".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedDocument;

    impl GeometryDocument for FixedDocument {
        fn solids(&self) -> Vec<EntityId> {
            vec![EntityId(1)]
        }

        fn edges(&self) -> Vec<EntityId> {
            vec![EntityId(10), EntityId(11), EntityId(12), EntityId(13)]
        }

        fn solid_boundary_edges(&self) -> CadResult<HashSet<EntityId>> {
            // 99 is not an edge of this document; the difference must ignore it
            Ok([EntityId(11), EntityId(13), EntityId(99)].into_iter().collect())
        }

        fn bounding_box(&self, entity: EntityId) -> CadResult<BoundingBox> {
            Err(CadError::MissingEntity(entity))
        }

        fn edge_endpoints(&self, _edge: EntityId) -> CadResult<Option<EdgeEndpoints>> {
            Ok(None)
        }
    }

    #[test]
    fn test_standalone_edges_keep_enumeration_order() {
        let standalone = FixedDocument.standalone_edges().unwrap();
        assert_eq!(standalone, vec![EntityId(10), EntityId(12)]);
    }

    #[test]
    fn test_null_kernel_unavailable() {
        let kernel = NullKernel;
        assert!(!kernel.is_available());
        assert!(matches!(
            kernel.load(b"ISO-10303-21;"),
            Err(CadError::KernelNotAvailable(_))
        ));
    }

    #[test]
    fn test_edge_length() {
        let edge = EdgeEndpoints::new(DVec3::ZERO, DVec3::new(3.0, 4.0, 0.0));
        assert_eq!(edge.length(), 5.0);
    }

    #[test]
    fn test_entity_id_display() {
        assert_eq!(EntityId::new(42).to_string(), "#42");
    }
}
