//! Hand-built STEP fixtures

#![allow(dead_code)]

/// Writes B-rep entities into an ISO 10303-21 exchange structure
#[derive(Debug, Default)]
pub struct StepBuilder {
    lines: Vec<String>,
}

impl StepBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an arbitrary entity body
    pub fn add_raw(&mut self, body: String) -> u64 {
        self.add(body)
    }

    fn add(&mut self, body: String) -> u64 {
        let id = self.lines.len() as u64 + 1;
        self.lines.push(format!("#{} = {};", id, body));
        id
    }

    fn real(v: f64) -> String {
        // Debug formatting always carries a '.' or an exponent
        format!("{:?}", v)
    }

    pub fn point(&mut self, p: [f64; 3]) -> u64 {
        self.add(format!(
            "CARTESIAN_POINT('',({},{},{}))",
            Self::real(p[0]),
            Self::real(p[1]),
            Self::real(p[2])
        ))
    }

    pub fn vertex(&mut self, p: [f64; 3]) -> u64 {
        let point = self.point(p);
        self.add(format!("VERTEX_POINT('',#{})", point))
    }

    /// Straight EDGE_CURVE between two existing vertices
    pub fn line_edge(&mut self, v1: u64, v2: u64, origin: [f64; 3], dir: [f64; 3]) -> u64 {
        let origin = self.point(origin);
        let direction = self.add(format!(
            "DIRECTION('',({},{},{}))",
            Self::real(dir[0]),
            Self::real(dir[1]),
            Self::real(dir[2])
        ));
        let vector = self.add(format!("VECTOR('',#{},1.)", direction));
        let line = self.add(format!("LINE('',#{},#{})", origin, vector));
        self.add(format!("EDGE_CURVE('',#{},#{},#{},.T.)", v1, v2, line))
    }

    /// A free-standing straight edge
    pub fn free_edge(&mut self, a: [f64; 3], b: [f64; 3]) -> u64 {
        let v1 = self.vertex(a);
        let v2 = self.vertex(b);
        self.line_edge(v1, v2, a, [b[0] - a[0], b[1] - a[1], b[2] - a[2]])
    }

    /// Axis-aligned box solid with full shell/face/loop topology
    pub fn box_solid(&mut self, min: [f64; 3], max: [f64; 3]) -> u64 {
        let corner = |bits: usize| -> [f64; 3] {
            [
                if bits & 1 == 0 { min[0] } else { max[0] },
                if bits & 2 == 0 { min[1] } else { max[1] },
                if bits & 4 == 0 { min[2] } else { max[2] },
            ]
        };

        let vertices: Vec<u64> = (0..8).map(|bits| self.vertex(corner(bits))).collect();

        // (from, to, edge id) for every pair of corners differing in one bit
        let mut edges = Vec::new();
        for from in 0..8usize {
            for axis in 0..3 {
                if from & (1 << axis) == 0 {
                    let to = from | (1 << axis);
                    let mut dir = [0.0; 3];
                    dir[axis] = 1.0;
                    let id = self.line_edge(vertices[from], vertices[to], corner(from), dir);
                    edges.push((from, to, id));
                }
            }
        }

        let mut faces = Vec::new();
        for axis in 0..3 {
            for side in [0, 1 << axis] {
                let on_face = |bits: usize| bits & (1 << axis) == side;
                let oriented: Vec<u64> = edges
                    .iter()
                    .filter(|(from, to, _)| on_face(*from) && on_face(*to))
                    .map(|&(_, _, id)| id)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .map(|id| self.add(format!("ORIENTED_EDGE('',*,*,#{},.T.)", id)))
                    .collect();
                let refs: Vec<String> = oriented.iter().map(|id| format!("#{}", id)).collect();
                let edge_loop = self.add(format!("EDGE_LOOP('',({}))", refs.join(",")));
                let bound = self.add(format!("FACE_OUTER_BOUND('',#{},.T.)", edge_loop));

                let location = self.point(corner(side));
                let mut normal = [0.0; 3];
                normal[axis] = 1.0;
                let axis_dir = self.add(format!(
                    "DIRECTION('',({},{},{}))",
                    Self::real(normal[0]),
                    Self::real(normal[1]),
                    Self::real(normal[2])
                ));
                let placement =
                    self.add(format!("AXIS2_PLACEMENT_3D('',#{},#{},$)", location, axis_dir));
                let plane = self.add(format!("PLANE('',#{})", placement));
                faces.push(self.add(format!("ADVANCED_FACE('',(#{}),#{},.T.)", bound, plane)));
            }
        }

        let refs: Vec<String> = faces.iter().map(|id| format!("#{}", id)).collect();
        let shell = self.add(format!("CLOSED_SHELL('',({}))", refs.join(",")));
        self.add(format!("MANIFOLD_SOLID_BREP('box',#{})", shell))
    }

    /// AXIS2_PLACEMENT_3D at `origin`; `axes` is (axis, ref_direction)
    pub fn placement(&mut self, origin: [f64; 3], axes: Option<([f64; 3], [f64; 3])>) -> u64 {
        let location = self.point(origin);
        match axes {
            None => self.add(format!("AXIS2_PLACEMENT_3D('',#{},$,$)", location)),
            Some((axis, ref_direction)) => {
                let axis = self.direction(axis);
                let ref_direction = self.direction(ref_direction);
                self.add(format!(
                    "AXIS2_PLACEMENT_3D('',#{},#{},#{})",
                    location, axis, ref_direction
                ))
            }
        }
    }

    fn direction(&mut self, d: [f64; 3]) -> u64 {
        self.add(format!(
            "DIRECTION('',({},{},{}))",
            Self::real(d[0]),
            Self::real(d[1]),
            Self::real(d[2])
        ))
    }

    pub fn shape_representation(&mut self, entity: &str, items: &[u64]) -> u64 {
        let refs: Vec<String> = items.iter().map(|id| format!("#{}", id)).collect();
        self.add(format!("{}('',({}),$)", entity, refs.join(",")))
    }

    /// Position `child` inside `parent` by moving frame `from` onto `to`
    pub fn place(&mut self, child: u64, parent: u64, from: u64, to: u64) -> u64 {
        let transform = self.add(format!(
            "ITEM_DEFINED_TRANSFORMATION('','',#{},#{})",
            from, to
        ));
        self.add(format!(
            "( REPRESENTATION_RELATIONSHIP('','',#{},#{}) \
             REPRESENTATION_RELATIONSHIP_WITH_TRANSFORMATION(#{}) \
             SHAPE_REPRESENTATION_RELATIONSHIP() )",
            child, parent, transform
        ))
    }

    /// MAPPED_ITEM of `representation` moving frame `origin` onto `target`
    pub fn mapped_item(&mut self, representation: u64, origin: u64, target: u64) -> u64 {
        let map = self.add(format!("REPRESENTATION_MAP(#{},#{})", origin, representation));
        self.add(format!("MAPPED_ITEM('',#{},#{})", map, target))
    }

    pub fn finish(&self) -> String {
        format!(
            "ISO-10303-21;\n\
             HEADER;\n\
             FILE_DESCRIPTION(('fixture'),'2;1');\n\
             FILE_NAME('fixture.step','2024-01-01T00:00:00',(''),(''),'','','');\n\
             FILE_SCHEMA(('AUTOMOTIVE_DESIGN'));\n\
             ENDSEC;\n\
             DATA;\n\
             {}\n\
             ENDSEC;\n\
             END-ISO-10303-21;\n",
            self.lines.join("\n")
        )
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.finish().into_bytes()
    }
}
