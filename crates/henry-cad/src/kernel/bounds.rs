//! Axis-aligned bounding boxes in model units.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Minimum corner of the bounding box.
    pub min: DVec3,
    /// Maximum corner of the bounding box.
    pub max: DVec3,
}

impl BoundingBox {
    /// Creates a new bounding box from min and max points.
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    /// Creates an empty (inverted) bounding box.
    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    /// Creates a bounding box that contains all given points.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut bbox = Self::empty();
        for point in points {
            bbox = bbox.expand_to_include(point);
        }
        bbox
    }

    /// Returns the center of the bounding box.
    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Returns the size (full extents) of the bounding box.
    pub fn size(&self) -> DVec3 {
        self.max - self.min
    }

    /// Returns the union of two bounding boxes.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Returns a new bounding box expanded to include the given point.
    pub fn expand_to_include(&self, point: DVec3) -> BoundingBox {
        BoundingBox {
            min: self.min.min(point),
            max: self.max.max(point),
        }
    }

    /// Returns true if the bounding box is valid (non-empty).
    pub fn is_valid(&self) -> bool {
        self.min.cmple(self.max).all()
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_center() {
        let bbox = BoundingBox::new(DVec3::new(-1.0, -2.0, -3.0), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(bbox.center(), DVec3::ZERO);
        assert_eq!(bbox.size(), DVec3::new(2.0, 4.0, 6.0));
    }

    #[test]
    fn test_bounding_box_from_points() {
        let bbox = BoundingBox::from_points([
            DVec3::new(0.0, 5.0, 1.0),
            DVec3::new(10.0, 3.0, 0.0),
            DVec3::new(4.0, 4.0, 0.5),
        ]);
        assert_eq!(bbox.min, DVec3::new(0.0, 3.0, 0.0));
        assert_eq!(bbox.max, DVec3::new(10.0, 5.0, 1.0));
    }

    #[test]
    fn test_empty_bounding_box_is_invalid() {
        assert!(!BoundingBox::empty().is_valid());
        assert!(BoundingBox::empty().expand_to_include(DVec3::ONE).is_valid());
    }

    #[test]
    fn test_bounding_box_union() {
        let a = BoundingBox::new(DVec3::new(-1.0, -1.0, -1.0), DVec3::ZERO);
        let b = BoundingBox::new(DVec3::ZERO, DVec3::ONE);
        let u = a.union(&b);
        assert_eq!(u.min, DVec3::new(-1.0, -1.0, -1.0));
        assert_eq!(u.max, DVec3::ONE);
    }
}
