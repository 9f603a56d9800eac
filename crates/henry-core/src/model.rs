//! Node and segment records flowing through the reduction

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// An extracted filament endpoint, before deduplication
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawNode {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl RawNode {
    pub fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

impl From<DVec3> for RawNode {
    fn from(p: DVec3) -> Self {
        Self {
            x: p.x,
            y: p.y,
            z: p.z,
        }
    }
}

/// A filament referencing raw node positions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    pub name: String,
    pub node1_idx: usize,
    pub node2_idx: usize,
    pub w: f64,
    pub h: f64,
}

/// A deduplicated node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalNode {
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CanonicalNode {
    pub fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

/// A filament between two canonical nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalSegment {
    pub name: String,
    pub node1: String,
    pub node2: String,
    pub w: f64,
    pub h: f64,
}

/// Output of one geometry import
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportResult {
    pub nodes: Vec<CanonicalNode>,
    pub segments: Vec<FinalSegment>,
    pub info: String,
}

impl ImportResult {
    /// Look up a node by name
    pub fn node(&self, name: &str) -> Option<&CanonicalNode> {
        self.nodes.iter().find(|node| node.name == name)
    }
}

/// Tunables of one reduction run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReductionOptions {
    /// Raw nodes strictly closer than this are merged
    pub merge_tolerance: f64,
}

impl Default for ReductionOptions {
    fn default() -> Self {
        Self {
            merge_tolerance: crate::constants::MERGE_TOLERANCE,
        }
    }
}
