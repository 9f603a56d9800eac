//! Deduplication of raw nodes by proximity
//!
//! Each raw node, in input order, joins the first canonical node (in creation
//! order) that lies strictly closer than the tolerance, or starts a new one.
//! Canonical nodes keep the coordinates of the raw node that created them and
//! are named `N0, N1, …` in creation order.

use std::collections::HashMap;

use glam::DVec3;

use crate::constants::{GRID_MERGE_THRESHOLD, MERGE_TOLERANCE};
use crate::model::{CanonicalNode, RawNode};

/// How candidate canonical nodes are found
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Scan every canonical node; O(n²)
    Linear,
    /// Hash grid with cells one tolerance wide
    Grid,
    /// `Linear` for small inputs, `Grid` above the threshold
    #[default]
    Auto,
}

/// Canonical nodes plus the raw → canonical index map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedNodes {
    pub nodes: Vec<CanonicalNode>,
    /// `index_map[raw] = canonical`; total over the raw input
    pub index_map: Vec<usize>,
}

/// Proximity-based node deduplication
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeMerger {
    tolerance: f64,
    strategy: MergeStrategy,
}

impl Default for NodeMerger {
    fn default() -> Self {
        Self::new(MERGE_TOLERANCE)
    }
}

impl NodeMerger {
    pub fn new(tolerance: f64) -> Self {
        Self {
            tolerance,
            strategy: MergeStrategy::Auto,
        }
    }

    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn merge(&self, raw: &[RawNode]) -> MergedNodes {
        // The grid needs a finite positive cell size
        let grid_usable = self.tolerance.is_finite() && self.tolerance > 0.0;
        let use_grid = grid_usable
            && match self.strategy {
                MergeStrategy::Linear => false,
                MergeStrategy::Grid => true,
                MergeStrategy::Auto => raw.len() > GRID_MERGE_THRESHOLD,
            };

        let (positions, index_map) = if use_grid {
            if self.strategy == MergeStrategy::Auto {
                tracing::info!("Merging {} nodes with the spatial grid", raw.len());
            }
            self.merge_grid(raw)
        } else {
            self.merge_linear(raw)
        };

        let nodes = positions
            .into_iter()
            .enumerate()
            .map(|(i, p)| CanonicalNode {
                name: format!("N{}", i),
                x: p.x,
                y: p.y,
                z: p.z,
            })
            .collect();

        MergedNodes { nodes, index_map }
    }

    fn merge_linear(&self, raw: &[RawNode]) -> (Vec<DVec3>, Vec<usize>) {
        let mut canonical: Vec<DVec3> = Vec::new();
        let mut index_map = Vec::with_capacity(raw.len());

        for node in raw {
            let p = node.position();
            let index = match canonical.iter().position(|c| c.distance(p) < self.tolerance) {
                Some(existing) => existing,
                None => {
                    canonical.push(p);
                    canonical.len() - 1
                }
            };
            index_map.push(index);
        }

        (canonical, index_map)
    }

    fn merge_grid(&self, raw: &[RawNode]) -> (Vec<DVec3>, Vec<usize>) {
        let mut canonical: Vec<DVec3> = Vec::new();
        let mut cells: HashMap<[i64; 3], Vec<usize>> = HashMap::new();
        let mut index_map = Vec::with_capacity(raw.len());

        for node in raw {
            let p = node.position();
            let key = self.cell(p);

            // Within tolerance means at most one cell away on every axis
            let mut found: Option<usize> = None;
            for dx in -1..=1 {
                for dy in -1..=1 {
                    for dz in -1..=1 {
                        let neighbour = [
                            key[0].saturating_add(dx),
                            key[1].saturating_add(dy),
                            key[2].saturating_add(dz),
                        ];
                        let Some(members) = cells.get(&neighbour) else {
                            continue;
                        };
                        for &index in members {
                            if canonical[index].distance(p) < self.tolerance
                                && found.is_none_or(|f| index < f)
                            {
                                found = Some(index);
                            }
                        }
                    }
                }
            }

            let index = match found {
                Some(existing) => existing,
                None => {
                    canonical.push(p);
                    let index = canonical.len() - 1;
                    cells.entry(key).or_default().push(index);
                    index
                }
            };
            index_map.push(index);
        }

        (canonical, index_map)
    }

    fn cell(&self, p: DVec3) -> [i64; 3] {
        let scaled = (p / self.tolerance).floor();
        [scaled.x as i64, scaled.y as i64, scaled.z as i64]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(x: f64, y: f64, z: f64) -> RawNode {
        RawNode { x, y, z }
    }

    fn both(raw: &[RawNode], tolerance: f64) -> MergedNodes {
        let linear = NodeMerger::new(tolerance)
            .with_strategy(MergeStrategy::Linear)
            .merge(raw);
        let grid = NodeMerger::new(tolerance)
            .with_strategy(MergeStrategy::Grid)
            .merge(raw);
        assert_eq!(linear, grid);
        linear
    }

    #[test]
    fn test_first_match_wins_and_names() {
        let raw = [
            node(0.0, 0.0, 0.0),
            node(1.0, 0.0, 0.0),
            node(1.0 + 4e-7, 0.0, 0.0),
            node(0.0, 0.0, 5e-7),
        ];
        let merged = both(&raw, 1e-6);
        assert_eq!(merged.index_map, vec![0, 1, 1, 0]);
        assert_eq!(merged.nodes.len(), 2);
        assert_eq!(merged.nodes[0].name, "N0");
        assert_eq!(merged.nodes[1].name, "N1");
        // Coordinates of the creating node are kept
        assert_eq!(merged.nodes[1].x, 1.0);
    }

    #[test]
    fn test_tolerance_is_strict() {
        let at = both(&[node(0.0, 0.0, 0.0), node(0.5, 0.0, 0.0)], 0.5);
        assert_eq!(at.nodes.len(), 2);

        let inside = both(&[node(0.0, 0.0, 0.0), node(0.5 - 1e-9, 0.0, 0.0)], 0.5);
        assert_eq!(inside.nodes.len(), 1);
    }

    #[test]
    fn test_lowest_canonical_index_across_cells() {
        // Canonical 0 and 1 are both within tolerance of the third node,
        // in different grid cells; the older one must win.
        let raw = [
            node(0.95, 0.0, 0.0),
            node(2.05, 0.0, 0.0),
            node(1.5, 0.0, 0.0),
        ];
        let merged = both(&raw, 1.0);
        assert_eq!(merged.index_map, vec![0, 1, 0]);
    }

    #[test]
    fn test_map_is_total_and_contiguous() {
        let raw: Vec<RawNode> = (0..200)
            .map(|i| node((i % 37) as f64 * 0.25, (i % 5) as f64, 0.0))
            .collect();
        let merged = both(&raw, 0.3);
        assert_eq!(merged.index_map.len(), raw.len());
        let max = merged.index_map.iter().copied().max().unwrap();
        assert_eq!(max + 1, merged.nodes.len());
        for k in 0..merged.nodes.len() {
            assert!(merged.index_map.contains(&k));
        }
    }

    #[test]
    fn test_merge_is_idempotent() {
        let raw = [
            node(0.0, 0.0, 0.0),
            node(0.0, 0.0, 0.0),
            node(3.0, 1.0, 2.0),
            node(3.0, 1.0 + 1e-8, 2.0),
        ];
        let merger = NodeMerger::default();
        let first = merger.merge(&raw);
        let again: Vec<RawNode> = first
            .nodes
            .iter()
            .map(|n| RawNode::from(n.position()))
            .collect();
        let second = merger.merge(&again);

        assert_eq!(second.nodes, first.nodes);
        assert_eq!(second.index_map, (0..first.nodes.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_zero_tolerance_never_merges() {
        let raw = [node(1.0, 1.0, 1.0), node(1.0, 1.0, 1.0)];
        let merged = NodeMerger::new(0.0)
            .with_strategy(MergeStrategy::Grid)
            .merge(&raw);
        assert_eq!(merged.nodes.len(), 2);
    }

    #[test]
    fn test_auto_switches_on_large_input() {
        let raw: Vec<RawNode> = (0..GRID_MERGE_THRESHOLD + 10)
            .map(|i| node(i as f64 * 1e-3, 0.0, 0.0))
            .collect();
        let auto = NodeMerger::new(2e-3).merge(&raw);
        let linear = NodeMerger::new(2e-3)
            .with_strategy(MergeStrategy::Linear)
            .merge(&raw);
        assert_eq!(auto, linear);
    }
}
