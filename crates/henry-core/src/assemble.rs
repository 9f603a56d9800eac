//! Final node/segment records and the import summary

use crate::constants::ROUND_DIGITS;
use crate::extract::Extraction;
use crate::merge::MergedNodes;
use crate::model::{FinalSegment, ImportResult};

/// Round to a fixed number of decimal places, half away from zero
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    let rounded = (value * scale).round() / scale;
    if rounded.is_finite() { rounded } else { value }
}

/// One-line description of an import
pub fn summary(solids: usize, edges: usize, nodes: usize, segments: usize, backend: &str) -> String {
    format!(
        "Imported {} solid(s) and {} standalone edge(s) → {} node(s), {} segment(s) [{}]",
        solids, edges, nodes, segments, backend
    )
}

/// Resolve raw segment endpoints to canonical node names
pub fn assemble(extraction: Extraction, merged: MergedNodes, backend: &str) -> ImportResult {
    let name_of = |raw: usize| -> String {
        merged
            .index_map
            .get(raw)
            .and_then(|&canonical| merged.nodes.get(canonical))
            .map(|node| node.name.clone())
            .unwrap_or_default()
    };

    let segments: Vec<FinalSegment> = extraction
        .segments
        .into_iter()
        .map(|segment| FinalSegment {
            node1: name_of(segment.node1_idx),
            node2: name_of(segment.node2_idx),
            w: round_to(segment.w, ROUND_DIGITS),
            h: round_to(segment.h, ROUND_DIGITS),
            name: segment.name,
        })
        .collect();

    let info = summary(
        extraction.solids,
        extraction.edges,
        merged.nodes.len(),
        segments.len(),
        backend,
    );

    ImportResult {
        nodes: merged.nodes,
        segments,
        info,
    }
}
