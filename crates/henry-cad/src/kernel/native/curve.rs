//! Exact bounds of conic arcs.

use std::f64::consts::{PI, TAU};

use glam::{DAffine3, DVec3};

use crate::kernel::BoundingBox;

/// Right-handed local frame of an AXIS2_PLACEMENT_3D
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub origin: DVec3,
    pub x: DVec3,
    pub y: DVec3,
    pub z: DVec3,
}

impl Frame {
    /// Build a frame from an optional axis and reference direction.
    ///
    /// A missing axis defaults to +Z. A missing reference direction is +X
    /// (+Z when the axis lies along x), projected onto the plane normal to
    /// the axis; a parallel one falls back to any orthogonal vector.
    pub fn from_axes(origin: DVec3, axis: Option<DVec3>, ref_direction: Option<DVec3>) -> Self {
        let z = axis.and_then(|a| a.try_normalize()).unwrap_or(DVec3::Z);
        let fallback = if z.abs_diff_eq(DVec3::X, 1e-12) { DVec3::Z } else { DVec3::X };
        let reference = ref_direction.unwrap_or(fallback);
        let x = (reference - z * reference.dot(z))
            .try_normalize()
            .unwrap_or_else(|| z.any_orthonormal_vector());
        let y = z.cross(x);
        Self { origin, x, y, z }
    }

    /// Maps frame-local coordinates into the frame's parent space
    pub fn to_affine(&self) -> DAffine3 {
        DAffine3::from_cols(self.x, self.y, self.z, self.origin)
    }

    /// The same frame seen through a rigid placement
    pub fn transformed(&self, transform: &DAffine3) -> Self {
        Self {
            origin: transform.transform_point3(self.origin),
            x: transform.transform_vector3(self.x),
            y: transform.transform_vector3(self.y),
            z: transform.transform_vector3(self.z),
        }
    }
}

/// Circle (a == b) or ellipse in a local frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conic {
    pub frame: Frame,
    pub a: f64,
    pub b: f64,
}

impl Conic {
    pub fn circle(frame: Frame, radius: f64) -> Self {
        Self {
            frame,
            a: radius,
            b: radius,
        }
    }

    pub fn ellipse(frame: Frame, semi_axis_1: f64, semi_axis_2: f64) -> Self {
        Self {
            frame,
            a: semi_axis_1,
            b: semi_axis_2,
        }
    }

    pub fn point(&self, angle: f64) -> DVec3 {
        self.frame.origin
            + self.frame.x * (self.a * angle.cos())
            + self.frame.y * (self.b * angle.sin())
    }

    /// Parameter angle of a point on (or projected onto) the conic
    pub fn angle_of(&self, point: DVec3) -> f64 {
        let local = point - self.frame.origin;
        (local.dot(self.frame.y) / self.b).atan2(local.dot(self.frame.x) / self.a)
    }

    /// Bounds of the arc running counter-clockwise about the frame axis from
    /// `from` to `to`; coincident endpoints denote the full curve.
    pub fn arc_bounds(&self, from: DVec3, to: DVec3) -> BoundingBox {
        let start = self.angle_of(from);
        let closed = from.distance(to) <= 1e-9 * self.a.abs().max(self.b.abs()).max(1.0);
        let sweep = if closed {
            TAU
        } else {
            match (self.angle_of(to) - start).rem_euclid(TAU) {
                s if s == 0.0 => TAU,
                s => s,
            }
        };

        let mut bounds = BoundingBox::from_points([from, to]);
        for k in 0..3 {
            // d/dφ (a cosφ x_k + b sinφ y_k) = 0
            let extreme = (self.b * self.frame.y[k]).atan2(self.a * self.frame.x[k]);
            for angle in [extreme, extreme + PI] {
                if (angle - start).rem_euclid(TAU) <= sweep {
                    bounds = bounds.expand_to_include(self.point(angle));
                }
            }
        }
        bounds
    }
}
