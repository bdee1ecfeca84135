use crate::math::{Vector2, EPSILON};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// A line segment between two points, used for ray casts
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Segment {
    /// Start of the segment
    pub p1: Vector2,

    /// End of the segment
    pub p2: Vector2,
}

impl Segment {
    /// Creates a new segment
    #[inline]
    pub fn new(p1: Vector2, p2: Vector2) -> Self {
        Self { p1, p2 }
    }

    /// Returns the point at fraction `t` along the segment
    #[inline]
    pub fn point_at(&self, t: f32) -> Vector2 {
        self.p1 + (self.p2 - self.p1) * t
    }

    /// Returns the length of the segment
    #[inline]
    pub fn length(&self) -> f32 {
        self.p1.distance(&self.p2)
    }

    /// Intersects `other` against this segment treated as an infinitely thin wall
    ///
    /// Returns the fraction along `other` and the wall normal facing the
    /// start of `other`, or `None` when `other` misses or stays parallel.
    pub fn test_segment(&self, other: &Segment, max_lambda: f32) -> Option<(f32, Vector2)> {
        let s = other.p1;
        let r = other.p2 - s;
        let d = self.p2 - self.p1;
        let mut n = d.cross_scalar(1.0);

        let k_slop = 100.0 * f32::EPSILON;
        let denom = -r.dot(&n);

        // Cull back facing collision and ignore parallel segments.
        if denom > k_slop {
            // Does the segment intersect the infinite line associated with this segment?
            let b = s - self.p1;
            let mut a = b.dot(&n);

            if 0.0 <= a && a <= max_lambda * denom {
                let mu2 = -r.x * b.y + r.y * b.x;

                // Does the segment intersect this segment?
                if -k_slop * denom <= mu2 && mu2 <= denom * (1.0 + k_slop) {
                    a /= denom;
                    n.normalize_mut();
                    return Some((a, n));
                }
            }
        }

        None
    }

    /// Returns the closest point on the segment to `point`
    pub fn closest_point(&self, point: Vector2) -> Vector2 {
        let d = self.p2 - self.p1;
        let length_sq = d.length_squared();
        if length_sq < EPSILON * EPSILON {
            return self.p1;
        }
        let t = ((point - self.p1).dot(&d) / length_sq).clamp(0.0, 1.0);
        self.p1 + d * t
    }
}
