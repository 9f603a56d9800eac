//! Solid and edge to filament rules
//!
//! Solids are processed first, then standalone edges, each in kernel
//! enumeration order. Every segment appends its two endpoints together, so
//! segment `k` always references raw nodes `2k` and `2k + 1`.

use glam::DVec3;
use henry_cad::{BoundingBox, EdgeEndpoints, GeometryScan};

use crate::constants::{EDGE_SECTION_RATIO, MIN_CROSS_SECTION};
use crate::model::{RawNode, RawSegment};

/// Raw filaments of one geometry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub nodes: Vec<RawNode>,
    pub segments: Vec<RawSegment>,
    /// Number of solids reduced
    pub solids: usize,
    /// Number of standalone edges reduced
    pub edges: usize,
}

impl Extraction {
    fn push(&mut self, start: DVec3, end: DVec3, w: f64, h: f64) {
        let node1_idx = self.nodes.len();
        self.nodes.push(start.into());
        self.nodes.push(end.into());
        self.segments.push(RawSegment {
            name: format!("E{}", self.segments.len()),
            node1_idx,
            node2_idx: node1_idx + 1,
            w,
            h,
        });
    }
}

/// Apply the filament rules to every solid and standalone edge of a scan
pub fn extract(scan: &GeometryScan) -> Extraction {
    let mut out = Extraction::default();

    for solid in &scan.solids {
        let (start, end, w, h) = solid_filament(&solid.bounds);
        out.push(start, end, w, h);
        out.solids += 1;
    }

    for edge in &scan.standalone_edges {
        let side = edge_section(&edge.endpoints);
        out.push(edge.endpoints.start, edge.endpoints.end, side, side);
        out.edges += 1;
    }

    tracing::debug!(
        "Extracted {} segment(s) from {} solid(s) and {} edge(s)",
        out.segments.len(),
        out.solids,
        out.edges
    );
    out
}

/// Filament along the longest box axis through the centre of the other two
///
/// Returns `(start, end, w, h)`; ties between extents keep x, y, z order.
pub fn solid_filament(bounds: &BoundingBox) -> (DVec3, DVec3, f64, f64) {
    let size = bounds.size();
    let mut axes = [(0usize, size.x), (1, size.y), (2, size.z)];
    axes.sort_by(|a, b| b.1.total_cmp(&a.1));
    let principal = axes[0].0;

    let center = bounds.center();
    let mut start = center;
    let mut end = center;
    start[principal] = bounds.min[principal];
    end[principal] = bounds.max[principal];

    (
        start,
        end,
        axes[1].1.max(MIN_CROSS_SECTION),
        axes[2].1.max(MIN_CROSS_SECTION),
    )
}

/// Square side of a standalone-edge filament
pub fn edge_section(endpoints: &EdgeEndpoints) -> f64 {
    (endpoints.length() * EDGE_SECTION_RATIO).max(MIN_CROSS_SECTION)
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use henry_cad::{EdgeRecord, EntityId, SolidRecord};

    use super::*;

    fn scan(solids: &[BoundingBox], edges: &[(DVec3, DVec3)]) -> GeometryScan {
        GeometryScan {
            backend: "test".into(),
            solids: solids
                .iter()
                .enumerate()
                .map(|(i, bounds)| SolidRecord {
                    id: EntityId(i as u64),
                    bounds: *bounds,
                })
                .collect(),
            standalone_edges: edges
                .iter()
                .enumerate()
                .map(|(i, (start, end))| EdgeRecord {
                    id: EntityId(100 + i as u64),
                    endpoints: EdgeEndpoints::new(*start, *end),
                })
                .collect(),
            total_edges: edges.len(),
        }
    }

    #[test]
    fn test_box_along_x() {
        let bounds = BoundingBox::new(DVec3::ZERO, DVec3::new(10.0, 2.0, 1.0));
        let (start, end, w, h) = solid_filament(&bounds);
        assert_eq!(start, DVec3::new(0.0, 1.0, 0.5));
        assert_eq!(end, DVec3::new(10.0, 1.0, 0.5));
        assert_eq!(w, 2.0);
        assert_eq!(h, 1.0);
    }

    #[test]
    fn test_box_along_z_with_offset() {
        let bounds = BoundingBox::new(DVec3::new(-1.0, 4.0, 2.0), DVec3::new(1.0, 5.0, 8.0));
        let (start, end, w, h) = solid_filament(&bounds);
        assert_eq!(start, DVec3::new(0.0, 4.5, 2.0));
        assert_eq!(end, DVec3::new(0.0, 4.5, 8.0));
        assert_eq!(w, 2.0);
        assert_eq!(h, 1.0);
    }

    #[test]
    fn test_cube_ties_pick_x() {
        let bounds = BoundingBox::new(DVec3::ZERO, DVec3::ONE);
        let (start, end, _, _) = solid_filament(&bounds);
        assert_eq!(start, DVec3::new(0.0, 0.5, 0.5));
        assert_eq!(end, DVec3::new(1.0, 0.5, 0.5));
    }

    #[test]
    fn test_flat_solid_is_floored() {
        let bounds = BoundingBox::new(DVec3::ZERO, DVec3::new(3.0, 0.0, 0.0));
        let (_, _, w, h) = solid_filament(&bounds);
        assert_eq!(w, MIN_CROSS_SECTION);
        assert_eq!(h, MIN_CROSS_SECTION);
    }

    #[test]
    fn test_edge_section() {
        let unit = EdgeEndpoints::new(DVec3::ZERO, DVec3::X);
        assert_relative_eq!(edge_section(&unit), 0.05);

        let tiny = EdgeEndpoints::new(DVec3::ZERO, DVec3::new(1e-9, 0.0, 0.0));
        assert_eq!(edge_section(&tiny), MIN_CROSS_SECTION);
    }

    #[test]
    fn test_solids_before_edges_with_consecutive_nodes() {
        let geometry = scan(
            &[BoundingBox::new(DVec3::ZERO, DVec3::new(10.0, 2.0, 1.0))],
            &[(DVec3::ZERO, DVec3::X), (DVec3::Y, DVec3::Z)],
        );
        let out = extract(&geometry);

        assert_eq!(out.solids, 1);
        assert_eq!(out.edges, 2);
        assert_eq!(out.nodes.len(), 6);
        let names: Vec<&str> = out.segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["E0", "E1", "E2"]);
        for (k, segment) in out.segments.iter().enumerate() {
            assert_eq!(segment.node1_idx, 2 * k);
            assert_eq!(segment.node2_idx, 2 * k + 1);
        }
        assert_eq!(out.nodes[2].position(), DVec3::ZERO);
        assert_eq!(out.nodes[3].position(), DVec3::X);
    }

    #[test]
    fn test_empty_scan() {
        let out = extract(&GeometryScan::default());
        assert!(out.nodes.is_empty());
        assert!(out.segments.is_empty());
    }
}
