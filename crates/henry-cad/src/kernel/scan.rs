//! Backend-independent snapshot of a loaded document
//!
//! Every kernel funnels into [`GeometryScan`], so the reduction downstream
//! never sees which backend produced the data.

use serde::{Deserialize, Serialize};

use super::{BoundingBox, CadError, CadResult, EdgeEndpoints, EntityId, GeometryDocument};

/// A solid body reduced to its bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolidRecord {
    pub id: EntityId,
    pub bounds: BoundingBox,
}

/// An edge that is not part of any solid boundary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeRecord {
    pub id: EntityId,
    pub endpoints: EdgeEndpoints,
}

/// Solids and standalone edges of one document, in enumeration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeometryScan {
    /// Name of the kernel that produced this scan
    pub backend: String,
    /// Solids in kernel enumeration order
    pub solids: Vec<SolidRecord>,
    /// Standalone edges with two distinct vertices, in kernel enumeration order
    pub standalone_edges: Vec<EdgeRecord>,
    /// Number of edge entities in the document, boundary edges included
    pub total_edges: usize,
}

impl GeometryScan {
    /// Query a document through the kernel capability set
    pub fn collect(backend: &str, document: &dyn GeometryDocument) -> CadResult<Self> {
        let mut solids = Vec::new();
        for id in document.solids() {
            let bounds = document.bounding_box(id)?;
            if !bounds.is_valid() {
                return Err(CadError::UnexpectedEntity {
                    id,
                    reason: "solid has no bounded geometry".into(),
                });
            }
            solids.push(SolidRecord { id, bounds });
        }

        let mut standalone_edges = Vec::new();
        for id in document.standalone_edges()? {
            match document.edge_endpoints(id)? {
                Some(endpoints) => standalone_edges.push(EdgeRecord { id, endpoints }),
                None => tracing::debug!("Skipping edge {} with fewer than two vertices", id),
            }
        }

        Ok(Self {
            backend: backend.to_string(),
            solids,
            standalone_edges,
            total_edges: document.edges().len(),
        })
    }

    /// True when there is nothing to reduce
    pub fn is_empty(&self) -> bool {
        self.solids.is_empty() && self.standalone_edges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use glam::DVec3;

    use super::*;

    struct TwoEdgeDocument {
        solid_bounds: BoundingBox,
    }

    impl GeometryDocument for TwoEdgeDocument {
        fn solids(&self) -> Vec<EntityId> {
            vec![EntityId(1)]
        }

        fn edges(&self) -> Vec<EntityId> {
            vec![EntityId(2), EntityId(3), EntityId(4)]
        }

        fn solid_boundary_edges(&self) -> CadResult<HashSet<EntityId>> {
            Ok([EntityId(2)].into_iter().collect())
        }

        fn bounding_box(&self, entity: EntityId) -> CadResult<BoundingBox> {
            match entity {
                EntityId(1) => Ok(self.solid_bounds),
                other => Err(CadError::MissingEntity(other)),
            }
        }

        fn edge_endpoints(&self, edge: EntityId) -> CadResult<Option<EdgeEndpoints>> {
            match edge {
                EntityId(3) => Ok(Some(EdgeEndpoints::new(DVec3::ZERO, DVec3::X))),
                _ => Ok(None),
            }
        }
    }

    #[test]
    fn test_collect_filters_boundary_and_degenerate_edges() {
        let document = TwoEdgeDocument {
            solid_bounds: BoundingBox::new(DVec3::ZERO, DVec3::ONE),
        };
        let scan = GeometryScan::collect("test", &document).unwrap();

        assert_eq!(scan.backend, "test");
        assert_eq!(scan.solids.len(), 1);
        assert_eq!(scan.standalone_edges.len(), 1);
        assert_eq!(scan.standalone_edges[0].id, EntityId(3));
        assert_eq!(scan.total_edges, 3);
        assert!(!scan.is_empty());
    }

    #[test]
    fn test_collect_rejects_unbounded_solid() {
        let document = TwoEdgeDocument {
            solid_bounds: BoundingBox::empty(),
        };
        assert!(matches!(
            GeometryScan::collect("test", &document),
            Err(CadError::UnexpectedEntity { .. })
        ));
    }
}
