//! Native STEP Kernel Backend
//!
//! Pure Rust reader for ISO 10303-21 boundary representations.
//!
//! Solids are `MANIFOLD_SOLID_BREP`, `BREP_WITH_VOIDS` and `FACETED_BREP`
//! instances; edges are `EDGE_CURVE` instances. An edge belongs to a solid
//! when the solid's shell → face → loop → oriented edge chain reaches that
//! exact instance, so identity is the instance name and never the position.
//!
//! Bounding boxes are built from vertex points plus the exact extremes of
//! circle and ellipse arcs, B-spline control polygons (which enclose the
//! curve) and whole spheres for spherical faces.

mod assembly;
mod curve;
mod lexer;
mod parser;

use std::collections::{HashMap, HashSet};

use glam::{DAffine3, DVec3};

pub use parser::{Instance, Param, Record, StepFile};

use self::assembly::Placements;
use self::curve::{Conic, Frame};
use super::{
    BoundingBox, CadError, CadKernel, CadResult, EdgeEndpoints, EntityId, GeometryDocument,
};

/// Entity names that denote a solid body
const SOLID_ENTITIES: &[&str] = &["MANIFOLD_SOLID_BREP", "BREP_WITH_VOIDS", "FACETED_BREP"];

/// Ids of repeated assembly occurrences are offset by multiples of this
const OCCURRENCE_STRIDE: u64 = 1 << 40;

/// Curves that only trim or annotate another curve, with the attribute
/// holding it
const CURVE_WRAPPERS: &[(&str, usize)] = &[
    ("SURFACE_CURVE", 1),
    ("SEAM_CURVE", 1),
    ("INTERSECTION_CURVE", 1),
    ("TRIMMED_CURVE", 1),
];

/// Native STEP reader kernel
#[derive(Debug, Default)]
pub struct NativeStepKernel;

impl NativeStepKernel {
    /// Create a new native kernel
    pub fn new() -> Self {
        Self
    }
}

impl CadKernel for NativeStepKernel {
    fn name(&self) -> &str {
        "native"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(&self, data: &[u8]) -> CadResult<Box<dyn GeometryDocument>> {
        Ok(Box::new(StepDocument::from_bytes(data)?))
    }
}

/// Edges and extent of one solid
#[derive(Debug, Clone)]
struct SolidTopology {
    edges: Vec<EntityId>,
    bounds: BoundingBox,
}

/// A parsed STEP file with precomputed solid topology
///
/// Each assembly occurrence of a solid or edge is reported under its own
/// id: the instance name for the first, offset by multiples of
/// [`OCCURRENCE_STRIDE`] for the rest.
#[derive(Debug)]
pub struct StepDocument {
    file: StepFile,
    solids: Vec<EntityId>,
    edges: Vec<EntityId>,
    /// Source instance and placement of every reported edge
    edge_placements: HashMap<EntityId, (EntityId, DAffine3)>,
    topology: HashMap<EntityId, SolidTopology>,
}

impl StepDocument {
    /// Parse raw file bytes
    pub fn from_bytes(data: &[u8]) -> CadResult<Self> {
        Self::parse(&String::from_utf8_lossy(data))
    }

    /// Parse file text, resolve assembly placements and walk every solid
    /// boundary
    pub fn parse(text: &str) -> CadResult<Self> {
        let file = StepFile::parse(text)?;
        let placements = Placements::resolve(&file)?;

        let mut edges = Vec::new();
        let mut edge_placements = HashMap::new();
        for (&id, instance) in &file.instances {
            if !instance.has("EDGE_CURVE") {
                continue;
            }
            let edge = EntityId(id);
            for (index, occurrence) in placements.of(edge).iter().enumerate() {
                let placed = occurrence_id(edge, index)?;
                edge_placements.insert(placed, (edge, occurrence.transform));
                edges.push(placed);
            }
        }

        let mut solids = Vec::new();
        let mut topology = HashMap::new();
        for (&id, instance) in &file.instances {
            if !SOLID_ENTITIES.iter().any(|name| instance.has(name)) {
                continue;
            }
            let solid = EntityId(id);
            for (index, occurrence) in placements.of(solid).iter().enumerate() {
                let walked = walk_solid(&file, solid, occurrence.transform)?;
                // Boundary edges take the occurrence reached through the same frame
                let boundary = walked
                    .edges
                    .into_iter()
                    .map(|edge| {
                        let at = placements
                            .of(edge)
                            .iter()
                            .position(|o| o.frame == occurrence.frame)
                            .unwrap_or(0);
                        occurrence_id(edge, at)
                    })
                    .collect::<CadResult<Vec<_>>>()?;

                let placed = occurrence_id(solid, index)?;
                solids.push(placed);
                topology.insert(
                    placed,
                    SolidTopology {
                        edges: boundary,
                        bounds: walked.bounds,
                    },
                );
            }
        }

        tracing::debug!(
            "Parsed STEP file: {} instances, {} solid(s), {} edge(s)",
            file.instances.len(),
            solids.len(),
            edges.len()
        );

        Ok(Self {
            file,
            solids,
            edges,
            edge_placements,
            topology,
        })
    }

    /// Source instance and placement of a reported edge id
    fn locate(&self, edge: EntityId) -> (EntityId, DAffine3) {
        self.edge_placements
            .get(&edge)
            .copied()
            .unwrap_or((edge, DAffine3::IDENTITY))
    }
}

impl GeometryDocument for StepDocument {
    fn solids(&self) -> Vec<EntityId> {
        self.solids.clone()
    }

    fn edges(&self) -> Vec<EntityId> {
        self.edges.clone()
    }

    fn solid_boundary_edges(&self) -> CadResult<HashSet<EntityId>> {
        Ok(self
            .topology
            .values()
            .flat_map(|topology| topology.edges.iter().copied())
            .collect())
    }

    fn bounding_box(&self, entity: EntityId) -> CadResult<BoundingBox> {
        if let Some(topology) = self.topology.get(&entity) {
            return Ok(topology.bounds);
        }
        let (source, transform) = self.locate(entity);
        if self.file.get(source)?.has("EDGE_CURVE") {
            return edge_bounds(&self.file, source, &transform);
        }
        Err(CadError::UnexpectedEntity {
            id: entity,
            reason: "not a solid or an edge".into(),
        })
    }

    fn edge_endpoints(&self, edge: EntityId) -> CadResult<Option<EdgeEndpoints>> {
        let (source, transform) = self.locate(edge);
        let record = require(&self.file, source, "EDGE_CURVE")?;
        let start = ref_param(source, record, 1)?;
        let end = ref_param(source, record, 2)?;
        // A closed edge has a single vertex
        if start == end {
            return Ok(None);
        }
        Ok(Some(EdgeEndpoints::new(
            transform.transform_point3(vertex_point(&self.file, start)?),
            transform.transform_point3(vertex_point(&self.file, end)?),
        )))
    }
}

fn occurrence_id(entity: EntityId, index: usize) -> CadResult<EntityId> {
    if index == 0 {
        return Ok(entity);
    }
    if entity.0 >= OCCURRENCE_STRIDE {
        return Err(CadError::InvalidFormat(format!(
            "instance name {} too large for a repeated assembly occurrence",
            entity
        )));
    }
    Ok(EntityId(entity.0 + OCCURRENCE_STRIDE * index as u64))
}

fn walk_solid(file: &StepFile, id: EntityId, transform: DAffine3) -> CadResult<SolidTopology> {
    let instance = file.get(id)?;
    let record = SOLID_ENTITIES
        .iter()
        .find_map(|name| instance.record(name))
        .ok_or_else(|| unexpected(id, "not a solid"))?;

    let mut walk = Walk {
        file,
        transform,
        edges: Vec::new(),
        seen: HashSet::new(),
        bounds: BoundingBox::empty(),
    };
    walk.shell(ref_param(id, record, 1)?)?;
    if record.name == "BREP_WITH_VOIDS" {
        for void in record.param(2).map(Param::refs).unwrap_or_default() {
            walk.shell(void)?;
        }
    }

    Ok(SolidTopology {
        edges: walk.edges,
        bounds: walk.bounds,
    })
}

/// Depth-first traversal of one placed solid boundary
struct Walk<'a> {
    file: &'a StepFile,
    transform: DAffine3,
    edges: Vec<EntityId>,
    seen: HashSet<EntityId>,
    bounds: BoundingBox,
}

impl Walk<'_> {
    fn shell(&mut self, id: EntityId) -> CadResult<()> {
        let (id, instance) = follow(
            self.file,
            id,
            &[("ORIENTED_CLOSED_SHELL", 2), ("ORIENTED_OPEN_SHELL", 2)],
        )?;
        let record = instance
            .record("CLOSED_SHELL")
            .or_else(|| instance.record("OPEN_SHELL"))
            .ok_or_else(|| {
                unexpected(id, &format!("expected a shell, found {}", instance.name()))
            })?;
        for face in record.param(1).map(Param::refs).unwrap_or_default() {
            self.face(face)?;
        }
        Ok(())
    }

    fn face(&mut self, id: EntityId) -> CadResult<()> {
        let (id, instance) = follow(self.file, id, &[("ORIENTED_FACE", 2)])?;
        let record = instance
            .record("ADVANCED_FACE")
            .or_else(|| instance.record("FACE_SURFACE"))
            .ok_or_else(|| {
                unexpected(id, &format!("expected a face, found {}", instance.name()))
            })?;
        for bound in record.param(1).map(Param::refs).unwrap_or_default() {
            self.face_bound(bound)?;
        }
        if let Some(surface) = record.param(2).and_then(Param::as_entity) {
            self.surface(surface)?;
        }
        Ok(())
    }

    fn face_bound(&mut self, id: EntityId) -> CadResult<()> {
        let instance = self.file.get(id)?;
        let record = instance
            .record("FACE_OUTER_BOUND")
            .or_else(|| instance.record("FACE_BOUND"))
            .ok_or_else(|| unexpected(id, "expected a face bound"))?;
        self.face_loop(ref_param(id, record, 1)?)
    }

    fn face_loop(&mut self, id: EntityId) -> CadResult<()> {
        let instance = self.file.get(id)?;
        if let Some(record) = instance.record("EDGE_LOOP") {
            for edge in record.param(1).map(Param::refs).unwrap_or_default() {
                self.oriented_edge(edge)?;
            }
        } else if let Some(record) = instance.record("VERTEX_LOOP") {
            let point = vertex_point(self.file, ref_param(id, record, 1)?)?;
            self.include(point);
        } else if let Some(record) = instance.record("POLY_LOOP") {
            for point in record.param(1).map(Param::refs).unwrap_or_default() {
                let point = cartesian_point(self.file, point)?;
                self.include(point);
            }
        } else {
            return Err(unexpected(id, &format!("expected a loop, found {}", instance.name())));
        }
        Ok(())
    }

    fn oriented_edge(&mut self, id: EntityId) -> CadResult<()> {
        let (id, instance) = follow(self.file, id, &[("ORIENTED_EDGE", 3)])?;
        if !instance.has("EDGE_CURVE") {
            return Err(unexpected(id, &format!("expected an edge, found {}", instance.name())));
        }
        if self.seen.insert(id) {
            self.edges.push(id);
            self.bounds = self.bounds.union(&edge_bounds(self.file, id, &self.transform)?);
        }
        Ok(())
    }

    fn surface(&mut self, id: EntityId) -> CadResult<()> {
        let instance = self.file.get(id)?;
        if let Some(record) = instance.record("SPHERICAL_SURFACE") {
            let centre = self
                .transform
                .transform_point3(placement(self.file, ref_param(id, record, 1)?)?.origin);
            let radius = real_param(id, record, 2)?;
            self.bounds = self.bounds.union(&BoundingBox::new(
                centre - DVec3::splat(radius),
                centre + DVec3::splat(radius),
            ));
        }
        Ok(())
    }

    fn include(&mut self, point: DVec3) {
        self.bounds = self
            .bounds
            .expand_to_include(self.transform.transform_point3(point));
    }
}

/// Follow wrapper records (entity name, attribute holding the wrapped
/// instance) down to the first instance that is none of them
fn follow<'a>(
    file: &'a StepFile,
    id: EntityId,
    wrappers: &[(&str, usize)],
) -> CadResult<(EntityId, &'a Instance)> {
    let mut visited = HashSet::new();
    let mut current = id;
    loop {
        if !visited.insert(current) {
            return Err(unexpected(current, "cyclic reference"));
        }
        let instance = file.get(current)?;
        let wrapped = wrappers
            .iter()
            .find_map(|&(name, index)| instance.record(name).map(|record| (record, index)));
        match wrapped {
            Some((record, index)) => current = ref_param(current, record, index)?,
            None => return Ok((current, instance)),
        }
    }
}

/// Bounds of a placed EDGE_CURVE: its vertices plus whatever its curve adds
fn edge_bounds(file: &StepFile, id: EntityId, transform: &DAffine3) -> CadResult<BoundingBox> {
    let record = require(file, id, "EDGE_CURVE")?;
    let start = transform.transform_point3(vertex_point(file, ref_param(id, record, 1)?)?);
    let end = transform.transform_point3(vertex_point(file, ref_param(id, record, 2)?)?);
    let same_sense = record.param(4).and_then(Param::as_bool).unwrap_or(true);
    let (from, to) = if same_sense { (start, end) } else { (end, start) };

    let bounds = BoundingBox::from_points([start, end]);
    match ref_param(id, record, 3) {
        Ok(curve) => Ok(match curve_bounds(file, curve, from, to, transform)? {
            Some(extra) => bounds.union(&extra),
            None => bounds,
        }),
        Err(_) => Ok(bounds),
    }
}

fn curve_bounds(
    file: &StepFile,
    id: EntityId,
    from: DVec3,
    to: DVec3,
    transform: &DAffine3,
) -> CadResult<Option<BoundingBox>> {
    let (id, instance) = follow(file, id, CURVE_WRAPPERS)?;

    if let Some(record) = instance.record("CIRCLE") {
        let frame = placement(file, ref_param(id, record, 1)?)?.transformed(transform);
        let conic = Conic::circle(frame, real_param(id, record, 2)?);
        return Ok(Some(conic.arc_bounds(from, to)));
    }
    if let Some(record) = instance.record("ELLIPSE") {
        let frame = placement(file, ref_param(id, record, 1)?)?.transformed(transform);
        let conic = Conic::ellipse(frame, real_param(id, record, 2)?, real_param(id, record, 3)?);
        return Ok(Some(conic.arc_bounds(from, to)));
    }

    // Control polygons enclose the curve. Partial records of a complex
    // instance carry no name attribute, so the list sits one slot earlier.
    let control_points = if let Some(record) = instance.record("B_SPLINE_CURVE") {
        record.param(1)
    } else if let Some(record) = instance.record("B_SPLINE_CURVE_WITH_KNOTS") {
        record.param(2)
    } else if let Some(record) = instance.record("POLYLINE") {
        record.param(1)
    } else {
        return Ok(None);
    };
    let points = control_points
        .map(Param::refs)
        .unwrap_or_default()
        .into_iter()
        .map(|point| cartesian_point(file, point).map(|p| transform.transform_point3(p)))
        .collect::<CadResult<Vec<DVec3>>>()?;
    Ok(Some(BoundingBox::from_points(points)))
}

fn placement(file: &StepFile, id: EntityId) -> CadResult<Frame> {
    let record = require(file, id, "AXIS2_PLACEMENT_3D")?;
    let origin = cartesian_point(file, ref_param(id, record, 1)?)?;
    let axis = match record.param(2).and_then(Param::as_entity) {
        Some(dir) => Some(direction(file, dir)?),
        None => None,
    };
    let ref_direction = match record.param(3).and_then(Param::as_entity) {
        Some(dir) => Some(direction(file, dir)?),
        None => None,
    };
    Ok(Frame::from_axes(origin, axis, ref_direction))
}

fn vertex_point(file: &StepFile, id: EntityId) -> CadResult<DVec3> {
    let record = require(file, id, "VERTEX_POINT")?;
    cartesian_point(file, ref_param(id, record, 1)?)
}

fn cartesian_point(file: &StepFile, id: EntityId) -> CadResult<DVec3> {
    let record = require(file, id, "CARTESIAN_POINT")?;
    record
        .param(1)
        .and_then(Param::as_vec3)
        .ok_or_else(|| unexpected(id, "malformed coordinates"))
}

fn direction(file: &StepFile, id: EntityId) -> CadResult<DVec3> {
    let record = require(file, id, "DIRECTION")?;
    record
        .param(1)
        .and_then(Param::as_vec3)
        .ok_or_else(|| unexpected(id, "malformed direction ratios"))
}

fn require<'a>(file: &'a StepFile, id: EntityId, name: &str) -> CadResult<&'a Record> {
    let instance = file.get(id)?;
    instance
        .record(name)
        .ok_or_else(|| unexpected(id, &format!("expected {}, found {}", name, instance.name())))
}

fn ref_param(id: EntityId, record: &Record, index: usize) -> CadResult<EntityId> {
    record
        .param(index)
        .and_then(Param::as_entity)
        .ok_or_else(|| unexpected(id, &format!("attribute {} of {} is not a reference", index, record.name)))
}

fn real_param(id: EntityId, record: &Record, index: usize) -> CadResult<f64> {
    record
        .param(index)
        .and_then(Param::as_real)
        .ok_or_else(|| unexpected(id, &format!("attribute {} of {} is not a number", index, record.name)))
}

fn unexpected(id: EntityId, reason: &str) -> CadError {
    CadError::UnexpectedEntity {
        id,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(data: &str) -> String {
        format!(
            "ISO-10303-21;\nHEADER;\nFILE_SCHEMA(('CONFIG_CONTROL_DESIGN'));\nENDSEC;\nDATA;\n{}ENDSEC;\nEND-ISO-10303-21;\n",
            data
        )
    }

    /// One free line edge from (0,0,0) to (1,0,0) and one closed circle edge
    const FREE_EDGES: &str = "\
#1 = CARTESIAN_POINT('',(0.,0.,0.));
#2 = CARTESIAN_POINT('',(1.,0.,0.));
#3 = VERTEX_POINT('',#1);
#4 = VERTEX_POINT('',#2);
#5 = DIRECTION('',(1.,0.,0.));
#6 = VECTOR('',#5,1.);
#7 = LINE('',#1,#6);
#8 = EDGE_CURVE('',#3,#4,#7,.T.);
#9 = AXIS2_PLACEMENT_3D('',#1,$,$);
#10 = CIRCLE('',#9,1.);
#11 = EDGE_CURVE('',#4,#4,#10,.T.);
";

    #[test]
    fn test_free_edges_are_standalone() {
        let document = StepDocument::parse(&wrap(FREE_EDGES)).unwrap();
        assert!(document.solids().is_empty());
        assert_eq!(document.edges(), vec![EntityId(8), EntityId(11)]);
        assert_eq!(
            document.standalone_edges().unwrap(),
            vec![EntityId(8), EntityId(11)]
        );

        let line = document.edge_endpoints(EntityId(8)).unwrap().unwrap();
        assert_eq!(line.start, DVec3::ZERO);
        assert_eq!(line.end, DVec3::X);

        // Closed circle: one vertex, no filament
        assert!(document.edge_endpoints(EntityId(11)).unwrap().is_none());
    }

    #[test]
    fn test_circle_edge_bounds() {
        let document = StepDocument::parse(&wrap(FREE_EDGES)).unwrap();
        let bounds = document.bounding_box(EntityId(11)).unwrap();
        assert!(bounds.min.abs_diff_eq(DVec3::new(-1.0, -1.0, 0.0), 1e-12));
        assert!(bounds.max.abs_diff_eq(DVec3::new(1.0, 1.0, 0.0), 1e-12));
    }

    #[test]
    fn test_dangling_reference_is_reported() {
        let broken = FREE_EDGES.replace("#8 = EDGE_CURVE('',#3,#4", "#8 = EDGE_CURVE('',#3,#40");
        let document = StepDocument::parse(&wrap(&broken)).unwrap();
        assert!(matches!(
            document.edge_endpoints(EntityId(8)),
            Err(CadError::MissingEntity(EntityId(40)))
        ));
    }

    #[test]
    fn test_wrong_entity_kind_is_reported() {
        let document = StepDocument::parse(&wrap(FREE_EDGES)).unwrap();
        assert!(matches!(
            document.edge_endpoints(EntityId(7)),
            Err(CadError::UnexpectedEntity { .. })
        ));
        assert!(matches!(
            document.bounding_box(EntityId(1)),
            Err(CadError::UnexpectedEntity { .. })
        ));
    }

    #[test]
    fn test_kernel_rejects_garbage() {
        let kernel = NativeStepKernel::new();
        assert!(kernel.is_available());
        assert!(matches!(
            kernel.load(&[0x89, b'P', b'N', b'G']),
            Err(CadError::InvalidFormat(_))
        ));
    }

    fn face_around(edge_ref: &str) -> String {
        format!(
            "\
#21 = EDGE_LOOP('',({}));
#22 = FACE_OUTER_BOUND('',#21,.T.);
#23 = ADVANCED_FACE('',(#22),$,.T.);
#24 = CLOSED_SHELL('',(#23));
#25 = MANIFOLD_SOLID_BREP('',#24);
",
            edge_ref
        )
    }

    #[test]
    fn test_cyclic_oriented_edges_are_rejected() {
        let looped = format!(
            "{}#20 = ORIENTED_EDGE('',*,*,#20,.T.);\n{}",
            FREE_EDGES,
            face_around("#20")
        );
        assert!(matches!(
            StepDocument::parse(&wrap(&looped)),
            Err(CadError::UnexpectedEntity { id: EntityId(20), .. })
        ));

        let pair = format!(
            "{}#19 = ORIENTED_EDGE('',*,*,#20,.T.);\n#20 = ORIENTED_EDGE('',*,*,#19,.F.);\n{}",
            FREE_EDGES,
            face_around("#20")
        );
        assert!(matches!(
            StepDocument::parse(&wrap(&pair)),
            Err(CadError::UnexpectedEntity { .. })
        ));
    }

    #[test]
    fn test_cyclic_curve_wrapper_is_rejected() {
        let data = format!(
            "{}#30 = SURFACE_CURVE('',#30,(),.CURVE_3D.);\n#31 = EDGE_CURVE('',#3,#4,#30,.T.);\n",
            FREE_EDGES
        );
        let document = StepDocument::parse(&wrap(&data)).unwrap();
        assert!(matches!(
            document.bounding_box(EntityId(31)),
            Err(CadError::UnexpectedEntity { id: EntityId(30), .. })
        ));
    }

    #[test]
    fn test_mapped_solid_occurrences() {
        let data = format!(
            "{}#20 = ORIENTED_EDGE('',*,*,#8,.T.);\n{}\
#26 = ADVANCED_BREP_SHAPE_REPRESENTATION('',(#25),$);
#27 = REPRESENTATION_MAP(#9,#26);
#28 = CARTESIAN_POINT('',(0.,5.,0.));
#29 = AXIS2_PLACEMENT_3D('',#28,$,$);
#30 = MAPPED_ITEM('',#27,#9);
#31 = MAPPED_ITEM('',#27,#29);
#32 = SHAPE_REPRESENTATION('',(#30,#31),$);
",
            FREE_EDGES,
            face_around("#20")
        );
        let document = StepDocument::parse(&wrap(&data)).unwrap();

        let second = EntityId(25 + OCCURRENCE_STRIDE);
        assert_eq!(document.solids(), vec![EntityId(25), second]);
        let bounds = document.bounding_box(second).unwrap();
        assert_eq!(bounds.min, DVec3::new(0.0, 5.0, 0.0));
        assert_eq!(bounds.max, DVec3::new(1.0, 5.0, 0.0));

        // Both copies of the line bound a solid; only the circle is left
        let moved_line = EntityId(8 + OCCURRENCE_STRIDE);
        assert_eq!(
            document.edges(),
            vec![EntityId(8), moved_line, EntityId(11)]
        );
        assert_eq!(document.standalone_edges().unwrap(), vec![EntityId(11)]);

        let endpoints = document.edge_endpoints(moved_line).unwrap().unwrap();
        assert_eq!(endpoints.start, DVec3::new(0.0, 5.0, 0.0));
        assert_eq!(endpoints.end, DVec3::new(1.0, 5.0, 0.0));
    }
}
