//! OpenCASCADE CAD Kernel Backend
//!
//! Reads STEP data through the OpenCASCADE geometry kernel via opencascade-sys.
//!
//! The reader only accepts a path, so the bytes go through a scoped temporary
//! file. All topology is resolved while the shape is alive and cached as
//! plain data; no OCCT handle outlives [`OpenCascadeKernel::load`].

use std::collections::HashSet;
use std::io::Write;

use glam::DVec3;
use opencascade_sys::ffi;

use super::{
    BoundingBox, CadError, CadKernel, CadResult, EdgeEndpoints, EntityId, GeometryDocument,
};

/// Edge ids live above solid ids
const EDGE_ID_OFFSET: u64 = 1 << 32;

/// Curve samples per edge when bounding a solid
const CURVE_SAMPLES: usize = 16;

/// Endpoints closer than this belong to a closed edge
const CLOSED_EDGE_TOLERANCE: f64 = 1e-7;

/// OpenCASCADE-based CAD kernel
#[derive(Debug, Default)]
pub struct OpenCascadeKernel;

impl OpenCascadeKernel {
    /// Create a new OpenCASCADE kernel
    pub fn new() -> Self {
        Self
    }
}

impl CadKernel for OpenCascadeKernel {
    fn name(&self) -> &str {
        "opencascade"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn load(&self, data: &[u8]) -> CadResult<Box<dyn GeometryDocument>> {
        let mut file = tempfile::Builder::new()
            .prefix("henry-")
            .suffix(".step")
            .tempfile()
            .map_err(|e| CadError::FileIo(e.to_string()))?;
        file.write_all(data)
            .and_then(|_| file.flush())
            .map_err(|e| CadError::FileIo(e.to_string()))?;

        let path_str = file.path().to_string_lossy().to_string();

        // Create STEP reader
        let mut reader = ffi::STEPControl_Reader_ctor();
        let status = ffi::read_step(reader.pin_mut(), path_str);
        if status != ffi::IFSelect_ReturnStatus::IFSelect_RetDone {
            return Err(CadError::InvalidFormat(format!(
                "OpenCASCADE could not read STEP data: {:?}",
                status
            )));
        }

        // Transfer roots to shapes
        let progress = ffi::Message_ProgressRange_ctor();
        let num_roots = reader.pin_mut().TransferRoots(&progress);
        tracing::debug!("OpenCASCADE transferred {} root(s)", num_roots);

        let shape = ffi::one_shape(&reader);
        Ok(Box::new(OccDocument::from_shape(&shape)))
    }
}

/// Cached topology of one edge occurrence
#[derive(Debug, Clone)]
struct OccEdge {
    endpoints: Option<EdgeEndpoints>,
    bounds: BoundingBox,
    on_solid: bool,
}

/// Topology snapshot of a transferred shape
///
/// The edge explorer reports an edge once per parent face, so shared solid
/// edges appear several times in `edges()`. Standalone edges have no face
/// parents and appear once.
#[derive(Debug, Clone, Default)]
pub struct OccDocument {
    solids: Vec<BoundingBox>,
    edges: Vec<OccEdge>,
}

impl OccDocument {
    fn from_shape(shape: &ffi::TopoDS_Shape) -> Self {
        let mut document = Self::default();

        let mut explorer = ffi::TopExp_Explorer_ctor(shape, ffi::TopAbs_ShapeEnum::TopAbs_SOLID);
        while ffi::TopExp_Explorer_More(&explorer) {
            let solid_shape = ffi::TopExp_Explorer_Current(&explorer);
            let mut bounds = BoundingBox::empty();

            let mut edges =
                ffi::TopExp_Explorer_ctor(&solid_shape, ffi::TopAbs_ShapeEnum::TopAbs_EDGE);
            while ffi::TopExp_Explorer_More(&edges) {
                let edge_shape = ffi::TopExp_Explorer_Current(&edges);
                if let Some(points) = sample_edge(&edge_shape) {
                    bounds = bounds.union(&BoundingBox::from_points(points));
                }
                ffi::TopExp_Explorer_Next(&mut edges);
            }

            document.solids.push(bounds);
            ffi::TopExp_Explorer_Next(&mut explorer);
        }

        // Build edge-solid map
        let mut edge_solid_map = ffi::TopTools_IndexedDataMapOfShapeListOfShape_ctor();
        ffi::TopExp_MapShapesAndAncestors(
            shape,
            ffi::TopAbs_ShapeEnum::TopAbs_EDGE,
            ffi::TopAbs_ShapeEnum::TopAbs_SOLID,
            &mut edge_solid_map,
        );

        let mut explorer = ffi::TopExp_Explorer_ctor(shape, ffi::TopAbs_ShapeEnum::TopAbs_EDGE);
        while ffi::TopExp_Explorer_More(&explorer) {
            let edge_shape = ffi::TopExp_Explorer_Current(&explorer);

            let solid_list =
                ffi::TopTools_IndexedDataMapOfShapeListOfShape_FindFromKey(&edge_solid_map, &edge_shape);
            let on_solid = !ffi::TopTools_ListOfShape_IsEmpty(&solid_list);

            let points = sample_edge(&edge_shape).unwrap_or_default();
            let endpoints = match (points.first(), points.last()) {
                (Some(&start), Some(&end)) if start.distance(end) > CLOSED_EDGE_TOLERANCE => {
                    Some(EdgeEndpoints::new(start, end))
                }
                _ => None,
            };

            document.edges.push(OccEdge {
                endpoints,
                bounds: BoundingBox::from_points(points),
                on_solid,
            });
            ffi::TopExp_Explorer_Next(&mut explorer);
        }

        tracing::debug!(
            "OpenCASCADE shape: {} solid(s), {} edge occurrence(s)",
            document.solids.len(),
            document.edges.len()
        );
        document
    }

    fn edge(&self, id: EntityId) -> CadResult<&OccEdge> {
        id.raw()
            .checked_sub(EDGE_ID_OFFSET)
            .and_then(|index| self.edges.get(index as usize))
            .ok_or(CadError::MissingEntity(id))
    }
}

impl GeometryDocument for OccDocument {
    fn solids(&self) -> Vec<EntityId> {
        (0..self.solids.len() as u64).map(EntityId).collect()
    }

    fn edges(&self) -> Vec<EntityId> {
        (0..self.edges.len() as u64)
            .map(|index| EntityId(EDGE_ID_OFFSET + index))
            .collect()
    }

    fn solid_boundary_edges(&self) -> CadResult<HashSet<EntityId>> {
        Ok(self
            .edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.on_solid)
            .map(|(index, _)| EntityId(EDGE_ID_OFFSET + index as u64))
            .collect())
    }

    fn bounding_box(&self, entity: EntityId) -> CadResult<BoundingBox> {
        if entity.raw() < EDGE_ID_OFFSET {
            return self
                .solids
                .get(entity.raw() as usize)
                .copied()
                .ok_or(CadError::MissingEntity(entity));
        }
        self.edge(entity).map(|edge| edge.bounds)
    }

    fn edge_endpoints(&self, edge: EntityId) -> CadResult<Option<EdgeEndpoints>> {
        self.edge(edge).map(|edge| edge.endpoints)
    }
}

/// Evenly spaced points along an edge's 3D curve, first and last included
fn sample_edge(edge_shape: &ffi::TopoDS_Shape) -> Option<Vec<DVec3>> {
    let edge = ffi::TopoDS_cast_to_edge(edge_shape);

    // Get edge curve and parameters
    let mut first = 0.0f64;
    let mut last = 0.0f64;
    let curve = ffi::BRep_Tool_Curve(&edge, &mut first, &mut last);
    if curve.is_null() {
        return None;
    }

    Some(
        (0..=CURVE_SAMPLES)
            .map(|i| {
                let t = first + (last - first) * i as f64 / CURVE_SAMPLES as f64;
                let pnt = ffi::Geom_Curve_Value(&curve, t);
                DVec3::new(ffi::gp_Pnt_X(&pnt), ffi::gp_Pnt_Y(&pnt), ffi::gp_Pnt_Z(&pnt))
            })
            .collect(),
    )
}
