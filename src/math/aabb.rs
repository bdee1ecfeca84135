use crate::math::{Segment, Vector2, EPSILON};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Axis-Aligned Bounding Box (AABB) for efficient collision detection
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Aabb {
    /// Minimum corner of the AABB
    pub min: Vector2,

    /// Maximum corner of the AABB
    pub max: Vector2,
}

impl Aabb {
    /// Creates a new AABB from minimum and maximum points
    #[inline]
    pub fn new(min: Vector2, max: Vector2) -> Self {
        Self { min, max }
    }

    /// Creates an AABB centered at a position with the given half extents
    #[inline]
    pub fn from_center_half_extents(center: Vector2, half_extents: Vector2) -> Self {
        Self {
            min: center - half_extents,
            max: center + half_extents,
        }
    }

    /// Creates an AABB from a set of points
    pub fn from_points(points: &[Vector2]) -> Option<Self> {
        let (first, rest) = points.split_first()?;

        let mut min = *first;
        let mut max = *first;

        for point in rest {
            min = min.min(point);
            max = max.max(point);
        }

        Some(Self { min, max })
    }

    /// Returns true when the bounds are ordered and finite
    #[inline]
    pub fn is_valid(&self) -> bool {
        let d = self.max - self.min;
        d.x >= 0.0 && d.y >= 0.0 && self.min.is_valid() && self.max.is_valid()
    }

    /// Returns the center of the AABB
    #[inline]
    pub fn center(&self) -> Vector2 {
        (self.min + self.max) * 0.5
    }

    /// Returns the extents of the AABB in each dimension
    #[inline]
    pub fn extents(&self) -> Vector2 {
        self.max - self.min
    }

    /// Returns half the extents of the AABB in each dimension
    #[inline]
    pub fn half_extents(&self) -> Vector2 {
        self.extents() * 0.5
    }

    /// Returns the area of the AABB
    #[inline]
    pub fn area(&self) -> f32 {
        let extents = self.extents();
        extents.x * extents.y
    }

    /// Checks if this AABB contains a point
    #[inline]
    pub fn contains_point(&self, point: Vector2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x &&
        point.y >= self.min.y && point.y <= self.max.y
    }

    /// Checks if this AABB fully contains another AABB
    #[inline]
    pub fn contains_aabb(&self, other: &Self) -> bool {
        self.min.x <= other.min.x && self.max.x >= other.max.x &&
        self.min.y <= other.min.y && self.max.y >= other.max.y
    }

    /// Checks if this AABB intersects with another AABB
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y
    }

    /// Returns the smallest AABB containing both boxes
    #[inline]
    pub fn combine(&self, other: &Self) -> Self {
        Self::new(self.min.min(&other.min), self.max.max(&other.max))
    }

    /// Expands the AABB by a margin on every side
    #[inline]
    pub fn expand(&self, margin: f32) -> Self {
        let m = Vector2::new(margin, margin);
        Self::new(self.min - m, self.max + m)
    }

    /// Intersects a segment with the box using the slab method
    ///
    /// Returns the entry fraction along the segment in `[0, 1]`.
    pub fn intersects_segment(&self, segment: &Segment) -> Option<f32> {
        let d = segment.p2 - segment.p1;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for axis in 0..2 {
            let origin = segment.p1[axis];
            let direction = d[axis];
            let (low, high) = (self.min[axis], self.max[axis]);

            if direction.abs() < EPSILON {
                // Parallel to this slab
                if origin < low || origin > high {
                    return None;
                }
            } else {
                let inv_d = 1.0 / direction;
                let mut t1 = (low - origin) * inv_d;
                let mut t2 = (high - origin) * inv_d;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }
                t_min = t_min.max(t1);
                t_max = t_max.min(t2);
                if t_min > t_max {
                    return None;
                }
            }
        }

        Some(t_min)
    }
}
