//! Assembly placements.
//!
//! A shape representation is positioned inside its parent either by a
//! `REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION` carrying an
//! `ITEM_DEFINED_TRANSFORMATION`, or by a `MAPPED_ITEM` of its
//! `REPRESENTATION_MAP`. A relationship without a transformation puts both
//! representations in one coordinate frame. Every solid and edge reachable
//! from a representation's items gets one occurrence per placement of that
//! frame in the model root.

use std::collections::{BTreeMap, HashMap, HashSet};

use glam::DAffine3;

use super::parser::{Instance, Param, Record, StepFile};
use super::{SOLID_ENTITIES, placement, ref_param, require, unexpected};
use crate::kernel::{CadResult, EntityId};

/// Deepest chain of nested representations followed
const MAX_ASSEMBLY_DEPTH: usize = 64;

/// Most placements of a single frame
const MAX_OCCURRENCES: usize = 1 << 16;

/// One placed copy of an entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Occurrence {
    /// Frame the entity was reached through, and which of its placements
    pub frame: (u64, usize),
    /// Entity coordinates to model coordinates
    pub transform: DAffine3,
}

/// Entities outside every shape representation sit once at the root
const ROOT: &[Occurrence] = &[Occurrence {
    frame: (0, 0),
    transform: DAffine3::IDENTITY,
}];

/// Occurrences of every solid and edge of a file
#[derive(Debug, Default)]
pub struct Placements {
    occurrences: HashMap<EntityId, Vec<Occurrence>>,
}

impl Placements {
    pub fn resolve(file: &StepFile) -> CadResult<Self> {
        let representations: BTreeMap<u64, Vec<EntityId>> = file
            .instances
            .iter()
            .filter_map(|(&id, instance)| items(instance).map(|items| (id, items)))
            .collect();
        if representations.is_empty() {
            return Ok(Self::default());
        }

        // (child representation, parent representation, child → parent)
        let mut links = Vec::new();
        let mut frames = Frames::default();
        for (&id, instance) in &file.instances {
            let id = EntityId(id);
            let Some(record) = relationship(instance) else {
                continue;
            };
            let child = ref_param(id, record, 2)?;
            let parent = ref_param(id, record, 3)?;
            match instance.record("REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION") {
                Some(with) => {
                    let transform = item_transformation(file, ref_param(id, with, 0)?)?;
                    links.push((child.0, parent.0, transform));
                }
                None => frames.join(child.0, parent.0),
            }
        }
        for (&parent, items) in &representations {
            for &item in items {
                let Some(record) = file.get(item)?.record("MAPPED_ITEM") else {
                    continue;
                };
                let source = ref_param(item, record, 1)?;
                let map = require(file, source, "REPRESENTATION_MAP")?;
                let origin = placement(file, ref_param(source, map, 0)?)?;
                let child = ref_param(source, map, 1)?;
                let target = placement(file, ref_param(item, record, 2)?)?;
                links.push((
                    child.0,
                    parent,
                    target.to_affine() * origin.to_affine().inverse(),
                ));
            }
        }

        let mut parents: BTreeMap<u64, Vec<(u64, DAffine3)>> = BTreeMap::new();
        for (child, parent, transform) in links {
            parents
                .entry(frames.find(child))
                .or_default()
                .push((frames.find(parent), transform));
        }

        let mut world = World {
            parents: &parents,
            resolved: HashMap::new(),
        };
        let mut reached: BTreeMap<EntityId, Vec<u64>> = BTreeMap::new();
        for (&id, items) in &representations {
            let frame = frames.find(id);
            for entity in reachable(file, items) {
                let seen_in = reached.entry(entity).or_default();
                if !seen_in.contains(&frame) {
                    seen_in.push(frame);
                }
            }
        }

        let mut occurrences = HashMap::with_capacity(reached.len());
        for (entity, entity_frames) in reached {
            let mut placed = Vec::new();
            for frame in entity_frames {
                for (index, transform) in world.placements(frame, 0)?.iter().enumerate() {
                    placed.push(Occurrence {
                        frame: (frame, index),
                        transform: *transform,
                    });
                }
            }
            occurrences.insert(entity, placed);
        }

        tracing::debug!(
            "Resolved {} representation(s), {} placed entity(ies)",
            representations.len(),
            occurrences.len()
        );
        Ok(Self { occurrences })
    }

    /// Placed copies of a solid or edge, in a stable order
    pub fn of(&self, entity: EntityId) -> &[Occurrence] {
        self.occurrences
            .get(&entity)
            .map(Vec::as_slice)
            .unwrap_or(ROOT)
    }
}

/// Items of a shape representation
fn items(instance: &Instance) -> Option<Vec<EntityId>> {
    let is_shape = instance
        .records()
        .iter()
        .any(|record| record.name.ends_with("SHAPE_REPRESENTATION"));
    if !is_shape {
        return None;
    }
    instance
        .records()
        .iter()
        .filter(|record| {
            record.name == "REPRESENTATION" || record.name.ends_with("SHAPE_REPRESENTATION")
        })
        .find_map(|record| record.param(1).filter(|p| p.as_list().is_some()))
        .map(Param::refs)
}

/// The attribute-carrying record of a representation relationship
fn relationship(instance: &Instance) -> Option<&Record> {
    instance.records().iter().find(|record| {
        matches!(
            record.name.as_str(),
            "REPRESENTATION_RELATIONSHIP" | "SHAPE_REPRESENTATION_RELATIONSHIP"
        ) && record.params.len() >= 4
    })
}

/// Maps the first item's frame onto the second's
fn item_transformation(file: &StepFile, id: EntityId) -> CadResult<DAffine3> {
    let record = require(file, id, "ITEM_DEFINED_TRANSFORMATION")?;
    let from = placement(file, ref_param(id, record, 2)?)?;
    let to = placement(file, ref_param(id, record, 3)?)?;
    Ok(to.to_affine() * from.to_affine().inverse())
}

/// Solids and edges reachable from a set of representation items, without
/// crossing into mapped or nested representations
fn reachable(file: &StepFile, roots: &[EntityId]) -> Vec<EntityId> {
    let mut found = Vec::new();
    let mut seen: HashSet<EntityId> = roots.iter().copied().collect();
    let mut stack = roots.to_vec();
    while let Some(id) = stack.pop() {
        // Dangling references surface in the topology walk
        let Ok(instance) = file.get(id) else {
            continue;
        };
        if instance.has("MAPPED_ITEM") || items(instance).is_some() {
            continue;
        }
        if instance.has("EDGE_CURVE") || SOLID_ENTITIES.iter().any(|name| instance.has(name)) {
            found.push(id);
        }
        let mut refs = Vec::new();
        for record in instance.records() {
            record.params.iter().for_each(|param| param.collect_refs(&mut refs));
        }
        stack.extend(refs.into_iter().filter(|r| seen.insert(*r)));
    }
    found
}

/// Union-find over representations sharing a coordinate frame
#[derive(Debug, Default)]
struct Frames {
    parent: HashMap<u64, u64>,
}

impl Frames {
    fn find(&self, mut id: u64) -> u64 {
        while let Some(&next) = self.parent.get(&id) {
            id = next;
        }
        id
    }

    fn join(&mut self, a: u64, b: u64) {
        let (a, b) = (self.find(a), self.find(b));
        if a != b {
            // The lower instance name names the frame
            self.parent.insert(a.max(b), a.min(b));
        }
    }
}

/// Placements of each frame in the model root
struct World<'a> {
    parents: &'a BTreeMap<u64, Vec<(u64, DAffine3)>>,
    resolved: HashMap<u64, Vec<DAffine3>>,
}

impl World<'_> {
    fn placements(&mut self, frame: u64, depth: usize) -> CadResult<Vec<DAffine3>> {
        if let Some(done) = self.resolved.get(&frame) {
            return Ok(done.clone());
        }
        if depth > MAX_ASSEMBLY_DEPTH {
            return Err(unexpected(
                EntityId(frame),
                "representations nested too deep or placed inside themselves",
            ));
        }

        let placements = match self.parents.get(&frame) {
            None => vec![DAffine3::IDENTITY],
            Some(parents) => {
                let mut placements = Vec::new();
                for &(parent, local) in parents {
                    for above in self.placements(parent, depth + 1)? {
                        placements.push(above * local);
                    }
                    if placements.len() > MAX_OCCURRENCES {
                        return Err(unexpected(EntityId(frame), "too many assembly occurrences"));
                    }
                }
                placements
            }
        };
        self.resolved.insert(frame, placements.clone());
        Ok(placements)
    }
}
