use crate::collision::DistanceProxy;
use crate::core::config::LINEAR_SLOP;
use crate::error::PhysicsError;
use crate::math::{Aabb, Segment, Transform2, Vector2, EPSILON};
use crate::shapes::polygon::polygon_mass;
use crate::shapes::{Geometry, MassData, PolygonShape, SegmentCollide, ShapeType};
use crate::Result;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// A convex polygon with a circular bite taken out of its closing edge
///
/// The closing edge runs from the last vertex back to the first. It is
/// replaced by a circular arc whose center lies outside the polygon, so the
/// solid region is the hull minus the arc's disk.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ConcaveArcShape {
    hull: PolygonShape,
    arc_center: Vector2,
    arc_radius: f32,
    /// Half of the angle subtended by the arc
    half_angle: f32,
}

impl ConcaveArcShape {
    /// Creates the shape from hull vertices and an arc radius
    ///
    /// The radius must be at least half the closing edge, and the arc disk
    /// may only touch the hull at the closing edge's endpoints.
    pub fn new(vertices: &[Vector2], arc_radius: f32) -> Result<Self> {
        let hull = PolygonShape::new(vertices)?;
        let count = hull.get_vertex_count();

        let v_start = hull.get_vertices()[count - 1];
        let v_end = hull.get_vertices()[0];
        let chord = v_end - v_start;
        let half_chord = 0.5 * chord.length();

        if !(arc_radius.is_finite() && arc_radius >= half_chord) {
            return Err(PhysicsError::InvalidGeometry(format!(
                "arc radius {} is shorter than half the chord {}",
                arc_radius, half_chord
            )));
        }

        // The center sits on the outward side of the chord.
        let outward = hull.get_normals()[count - 1];
        let offset = (arc_radius * arc_radius - half_chord * half_chord).max(0.0).sqrt();
        let arc_center = (v_start + v_end) * 0.5 + outward * offset;

        for (i, v) in hull.get_vertices().iter().enumerate().take(count - 1).skip(1) {
            if (*v - arc_center).length() <= arc_radius + LINEAR_SLOP {
                return Err(PhysicsError::InvalidGeometry(format!(
                    "arc cuts through hull vertex {}",
                    i
                )));
            }
        }

        let half_angle = (half_chord / arc_radius).clamp(-1.0, 1.0).asin();

        Ok(Self {
            hull,
            arc_center,
            arc_radius,
            half_angle,
        })
    }

    /// Returns the convex hull of the shape
    pub fn get_hull(&self) -> &PolygonShape {
        &self.hull
    }

    /// Returns the arc center in body coordinates
    pub fn get_arc_center(&self) -> Vector2 {
        self.arc_center
    }

    /// Returns the arc radius
    pub fn get_arc_radius(&self) -> f32 {
        self.arc_radius
    }

    /// Index of the hull edge replaced by the arc
    pub fn get_chord_index(&self) -> usize {
        self.hull.get_vertex_count() - 1
    }

    /// Returns true if a local point lies inside the carved-out disk
    #[inline]
    pub fn is_in_bite(&self, p_local: Vector2) -> bool {
        (p_local - self.arc_center).length_squared() < self.arc_radius * self.arc_radius
    }

    /// Returns true if a local direction, measured from the arc center, points at the arc
    pub fn arc_spans(&self, direction: Vector2) -> bool {
        let count = self.hull.get_vertex_count();
        let a0 = self.hull.get_vertices()[count - 1] - self.arc_center;
        let a1 = self.hull.get_vertices()[0] - self.arc_center;
        let bisector = -self.hull.get_normals()[count - 1];

        let orientation = a0.cross(&a1);
        direction.dot(&bisector) > 0.0
            && a0.cross(&direction) * orientation >= 0.0
            && direction.cross(&a1) * orientation >= 0.0
    }

    /// Area, centroid and origin inertia of the disk segment removed from the hull
    fn bite_mass(&self) -> (f32, Vector2, f32) {
        let r = self.arc_radius;
        let theta = self.half_angle;
        let two_theta = 2.0 * theta;

        let area = 0.5 * r * r * (two_theta - two_theta.sin());
        if area <= EPSILON {
            return (0.0, self.arc_center, 0.0);
        }

        // Centroid distance from the arc center along the bisector.
        let count = self.hull.get_vertex_count();
        let bisector = -self.hull.get_normals()[count - 1];
        let distance = 4.0 * r * theta.sin().powi(3) / (3.0 * (two_theta - two_theta.sin()));
        let centroid = self.arc_center + bisector * distance;

        // Polar moment about the arc center: sector minus the inner triangle.
        let sector = 0.5 * r.powi(4) * theta;
        let triangle = r.powi(4) * two_theta.sin() * (2.0 + two_theta.cos()) / 12.0;
        let about_center = sector - triangle;

        // Shift to the centroid, then out to the shape origin.
        let about_centroid = about_center - area * distance * distance;
        let about_origin = about_centroid + area * centroid.length_squared();

        (area, centroid, about_origin)
    }
}

impl Geometry for ConcaveArcShape {
    fn shape_type(&self) -> ShapeType {
        ShapeType::ConcaveArc
    }

    fn test_point(&self, xf: &Transform2, p: Vector2) -> bool {
        self.hull.test_point(xf, p) && !self.is_in_bite(xf.inverse_transform_point(p))
    }

    fn test_segment(&self, xf: &Transform2, segment: &Segment, max_lambda: f32) -> SegmentCollide {
        let p1 = xf.inverse_transform_point(segment.p1);
        let p2 = xf.inverse_transform_point(segment.p2);
        let d = p2 - p1;

        let (lower, upper, index) = match self.hull.clip_local_ray(p1, d, max_lambda) {
            Some(interval) => interval,
            None => return SegmentCollide::Miss,
        };

        let entry = p1 + d * lower;
        match index {
            Some(i) if !self.is_in_bite(entry) => {
                return SegmentCollide::Hit {
                    lambda: lower,
                    normal: xf.transform_vector(self.hull.get_normals()[i]),
                };
            }
            None if !self.is_in_bite(p1) => return SegmentCollide::StartsInside,
            _ => {}
        }

        // The ray is inside the bite: find where it leaves the disk.
        let m = p1 - self.arc_center;
        let a = d.length_squared();
        let b = 2.0 * d.dot(&m);
        let c = m.length_squared() - self.arc_radius * self.arc_radius;
        let discriminant = b * b - 4.0 * a * c;
        if a < EPSILON || discriminant < 0.0 {
            return SegmentCollide::Miss;
        }

        let t = (-b + discriminant.sqrt()) / (2.0 * a);
        if t < lower || t > upper {
            return SegmentCollide::Miss;
        }

        let hit = p1 + d * t;
        SegmentCollide::Hit {
            lambda: t,
            normal: xf.transform_vector((self.arc_center - hit).normalize()),
        }
    }

    fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        self.hull.compute_aabb(xf)
    }

    fn compute_mass(&self, density: f32) -> MassData {
        let (hull_area, hull_center, hull_inertia) = polygon_mass(self.hull.get_vertices());
        let (bite_area, bite_center, bite_inertia) = self.bite_mass();

        let area = hull_area - bite_area;
        let center = if area > EPSILON {
            (hull_center * hull_area - bite_center * bite_area) * (1.0 / area)
        } else {
            hull_center
        };

        MassData {
            mass: density * area,
            center,
            inertia: density * (hull_inertia - bite_inertia),
        }
    }

    fn sweep_radius(&self, center: Vector2) -> f32 {
        self.hull.sweep_radius(center)
    }

    fn distance_proxy(&self) -> DistanceProxy {
        self.hull.distance_proxy()
    }

    fn core_proxy(&self) -> DistanceProxy {
        self.hull.core_proxy()
    }
}
