use crate::collision::DistanceProxy;
use crate::core::config::TOI_SLOP;
use crate::error::PhysicsError;
use crate::math::{Aabb, Segment, Transform2, Vector2, EPSILON};
use crate::shapes::{Geometry, MassData, SegmentCollide, ShapeType};
use crate::Result;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// A circular collision shape
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct CircleShape {
    /// Center of the circle in body coordinates
    local_position: Vector2,

    /// The radius of the circle
    radius: f32,
}

impl CircleShape {
    /// Creates a new circle; the radius must be positive and finite
    pub fn new(local_position: Vector2, radius: f32) -> Result<Self> {
        if !(radius > 0.0 && radius.is_finite()) {
            return Err(PhysicsError::InvalidGeometry(format!(
                "circle radius must be positive, got {}",
                radius
            )));
        }
        if !local_position.is_valid() {
            return Err(PhysicsError::InvalidGeometry(
                "circle position is not finite".to_string(),
            ));
        }
        Ok(Self { local_position, radius })
    }

    /// Returns the center in body coordinates
    pub fn get_local_position(&self) -> Vector2 {
        self.local_position
    }

    /// Returns the radius of the circle
    pub fn get_radius(&self) -> f32 {
        self.radius
    }
}

impl Geometry for CircleShape {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Circle
    }

    fn test_point(&self, xf: &Transform2, p: Vector2) -> bool {
        let center = xf.transform_point(self.local_position);
        (p - center).length_squared() <= self.radius * self.radius
    }

    // Collision detection in Real-Time Rendering, 3rd edition, section 16.6.2
    fn test_segment(&self, xf: &Transform2, segment: &Segment, max_lambda: f32) -> SegmentCollide {
        let position = xf.transform_point(self.local_position);
        let s = segment.p1 - position;
        let b = s.length_squared() - self.radius * self.radius;

        // Does the segment start inside the circle?
        if b < 0.0 {
            return SegmentCollide::StartsInside;
        }

        // Solve quadratic equation.
        let r = segment.p2 - segment.p1;
        let c = s.dot(&r);
        let rr = r.length_squared();
        let sigma = c * c - rr * b;

        // Check for negative discriminant and short segment.
        if sigma < 0.0 || rr < EPSILON {
            return SegmentCollide::Miss;
        }

        // Find the point of intersection of the line with the circle.
        let a = -(c + sigma.sqrt());

        // Is the intersection point on the segment?
        if 0.0 <= a && a <= max_lambda * rr {
            let lambda = a / rr;
            let normal = (s + r * lambda).normalize();
            return SegmentCollide::Hit { lambda, normal };
        }

        SegmentCollide::Miss
    }

    fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        let p = xf.transform_point(self.local_position);
        Aabb::from_center_half_extents(p, Vector2::new(self.radius, self.radius))
    }

    fn compute_mass(&self, density: f32) -> MassData {
        let mass = density * std::f32::consts::PI * self.radius * self.radius;

        // Inertia about the local origin.
        let inertia = mass
            * (0.5 * self.radius * self.radius + self.local_position.length_squared());

        MassData {
            mass,
            center: self.local_position,
            inertia,
        }
    }

    fn sweep_radius(&self, center: Vector2) -> f32 {
        (self.local_position - center).length() + self.radius
    }

    fn distance_proxy(&self) -> DistanceProxy {
        DistanceProxy::new(&[self.local_position], self.radius)
    }

    fn core_proxy(&self) -> DistanceProxy {
        DistanceProxy::new(&[self.local_position], (self.radius - TOI_SLOP).max(0.0))
    }
}
