use crate::collision::DistanceProxy;
use crate::core::config::{MAX_POLYGON_VERTICES, TOI_SLOP};
use crate::error::PhysicsError;
use crate::math::{Aabb, Mat22, Rotation2, Segment, Transform2, Vector2, EPSILON};
use crate::shapes::{Geometry, MassData, SegmentCollide, ShapeType};
use crate::Result;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// A convex polygon with counter-clockwise winding
///
/// Edge `i` runs from vertex `i` to vertex `i + 1` and has outward normal `normals[i]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct PolygonShape {
    vertices: Vec<Vector2>,
    normals: Vec<Vector2>,
    core_vertices: Vec<Vector2>,
    centroid: Vector2,
}

impl PolygonShape {
    /// Creates a convex polygon, validating winding and convexity
    pub fn new(vertices: &[Vector2]) -> Result<Self> {
        let count = vertices.len();
        if !(3..=MAX_POLYGON_VERTICES).contains(&count) {
            return Err(PhysicsError::InvalidGeometry(format!(
                "polygon needs 3 to {} vertices, got {}",
                MAX_POLYGON_VERTICES, count
            )));
        }
        if vertices.iter().any(|v| !v.is_valid()) {
            return Err(PhysicsError::InvalidGeometry(
                "polygon vertex is not finite".to_string(),
            ));
        }

        // Compute normals. Ensure the edges have non-zero length.
        let mut normals = Vec::with_capacity(count);
        for i in 0..count {
            let edge = vertices[(i + 1) % count] - vertices[i];
            if edge.length_squared() <= EPSILON * EPSILON {
                return Err(PhysicsError::InvalidGeometry(format!(
                    "polygon edge {} is degenerate",
                    i
                )));
            }
            normals.push(edge.cross_scalar(1.0).normalize());
        }

        // Ensure the polygon is convex and the interior is to the left of each edge.
        for i in 0..count {
            let edge = vertices[(i + 1) % count] - vertices[i];
            for (j, v) in vertices.iter().enumerate() {
                if j == i || j == (i + 1) % count {
                    continue;
                }
                if edge.cross(&(*v - vertices[i])) <= 0.0 {
                    return Err(PhysicsError::InvalidGeometry(
                        "polygon must be convex with counter-clockwise winding".to_string(),
                    ));
                }
            }
        }

        let (area, centroid, _) = polygon_mass(vertices);
        if area <= EPSILON {
            return Err(PhysicsError::InvalidGeometry(
                "polygon area is too small".to_string(),
            ));
        }

        let core_vertices = compute_core_vertices(vertices, &normals, centroid);

        Ok(Self {
            vertices: vertices.to_vec(),
            normals,
            core_vertices,
            centroid,
        })
    }

    /// Creates an axis-aligned box centered on the origin
    pub fn new_box(half_width: f32, half_height: f32) -> Result<Self> {
        Self::new_oriented_box(half_width, half_height, Vector2::zero(), 0.0)
    }

    /// Creates a box with a local center and rotation
    pub fn new_oriented_box(half_width: f32, half_height: f32, center: Vector2, angle: f32) -> Result<Self> {
        if !(half_width > 0.0 && half_height > 0.0) {
            return Err(PhysicsError::InvalidGeometry(format!(
                "box extents must be positive, got {} x {}",
                half_width, half_height
            )));
        }

        let xf = Transform2::new(center, Rotation2::new(angle));
        let corners = [
            Vector2::new(-half_width, -half_height),
            Vector2::new(half_width, -half_height),
            Vector2::new(half_width, half_height),
            Vector2::new(-half_width, half_height),
        ];
        let vertices: Vec<Vector2> = corners.iter().map(|v| xf.transform_point(*v)).collect();
        Self::new(&vertices)
    }

    /// Returns the vertices in counter-clockwise order
    pub fn get_vertices(&self) -> &[Vector2] {
        &self.vertices
    }

    /// Returns the outward edge normals
    pub fn get_normals(&self) -> &[Vector2] {
        &self.normals
    }

    /// Returns the vertices shrunk by the TOI slop
    pub fn get_core_vertices(&self) -> &[Vector2] {
        &self.core_vertices
    }

    /// Returns the number of vertices
    pub fn get_vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns the area centroid in local coordinates
    pub fn get_centroid(&self) -> Vector2 {
        self.centroid
    }

    /// Returns the `[enter, exit]` interval of a local ray against the polygon
    ///
    /// `max_lambda` bounds the exit. The returned index is the entry edge,
    /// or `None` when the ray starts inside.
    pub(crate) fn clip_local_ray(
        &self,
        p1: Vector2,
        d: Vector2,
        max_lambda: f32,
    ) -> Option<(f32, f32, Option<usize>)> {
        let mut lower = 0.0f32;
        let mut upper = max_lambda;
        let mut index = None;

        for (i, (vertex, normal)) in self.vertices.iter().zip(self.normals.iter()).enumerate() {
            let numerator = normal.dot(&(*vertex - p1));
            let denominator = normal.dot(&d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // lower < numerator / denominator, where denominator < 0
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // upper > numerator / denominator, where denominator > 0
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        Some((lower, upper, index))
    }
}

/// Area, centroid and inertia about the origin of a unit-density polygon fan
pub(crate) fn polygon_mass(vertices: &[Vector2]) -> (f32, Vector2, f32) {
    let count = vertices.len();
    let mut center = Vector2::zero();
    let mut area = 0.0;
    let mut inertia = 0.0;

    // The reference point is the origin so the inertia comes out about it.
    let p_ref = Vector2::zero();
    let inv3 = 1.0 / 3.0;

    for i in 0..count {
        // Triangle vertices.
        let p1 = p_ref;
        let p2 = vertices[i];
        let p3 = vertices[(i + 1) % count];

        let e1 = p2 - p1;
        let e2 = p3 - p1;
        let d = e1.cross(&e2);

        let triangle_area = 0.5 * d;
        area += triangle_area;

        // Area weighted centroid
        center += (p1 + p2 + p3) * (triangle_area * inv3);

        let (px, py) = (p1.x, p1.y);
        let (ex1, ey1) = (e1.x, e1.y);
        let (ex2, ey2) = (e2.x, e2.y);

        let intx2 = inv3 * (0.25 * (ex1 * ex1 + ex2 * ex1 + ex2 * ex2) + (px * ex1 + px * ex2))
            + 0.5 * px * px;
        let inty2 = inv3 * (0.25 * (ey1 * ey1 + ey2 * ey1 + ey2 * ey2) + (py * ey1 + py * ey2))
            + 0.5 * py * py;

        inertia += d * (intx2 + inty2);
    }

    if area > EPSILON {
        center *= 1.0 / area;
    }

    (area, center, inertia)
}

/// Moves every edge inward by the TOI slop
///
/// Polygons thinner than twice the slop clamp the offset so the core never
/// inverts past the centroid.
fn compute_core_vertices(vertices: &[Vector2], normals: &[Vector2], centroid: Vector2) -> Vec<Vector2> {
    let count = vertices.len();
    (0..count)
        .map(|i| {
            let n1 = normals[(i + count - 1) % count];
            let n2 = normals[i];
            let v = vertices[i] - centroid;

            let d = Vector2::new(
                (n1.dot(&v) - TOI_SLOP).max(0.0),
                (n2.dot(&v) - TOI_SLOP).max(0.0),
            );

            let a = Mat22::from_elements(n1.x, n1.y, n2.x, n2.y);
            a.solve(d) + centroid
        })
        .collect()
}

impl Geometry for PolygonShape {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Polygon
    }

    fn test_point(&self, xf: &Transform2, p: Vector2) -> bool {
        let p_local = xf.inverse_transform_point(p);

        self.vertices
            .iter()
            .zip(self.normals.iter())
            .all(|(v, n)| n.dot(&(p_local - *v)) <= 0.0)
    }

    fn test_segment(&self, xf: &Transform2, segment: &Segment, max_lambda: f32) -> SegmentCollide {
        let p1 = xf.inverse_transform_point(segment.p1);
        let p2 = xf.inverse_transform_point(segment.p2);
        let d = p2 - p1;

        match self.clip_local_ray(p1, d, max_lambda) {
            None => SegmentCollide::Miss,
            Some((lower, _, Some(index))) => SegmentCollide::Hit {
                lambda: lower,
                normal: xf.transform_vector(self.normals[index]),
            },
            Some((_, _, None)) => SegmentCollide::StartsInside,
        }
    }

    fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        let mut lower = xf.transform_point(self.vertices[0]);
        let mut upper = lower;

        for v in self.vertices.iter().skip(1) {
            let p = xf.transform_point(*v);
            lower = lower.min(&p);
            upper = upper.max(&p);
        }

        Aabb::new(lower, upper)
    }

    fn compute_mass(&self, density: f32) -> MassData {
        let (area, center, inertia) = polygon_mass(&self.vertices);

        MassData {
            mass: density * area,
            center,
            inertia: density * inertia,
        }
    }

    fn sweep_radius(&self, center: Vector2) -> f32 {
        self.vertices
            .iter()
            .map(|v| (*v - center).length())
            .fold(0.0, f32::max)
    }

    fn distance_proxy(&self) -> DistanceProxy {
        DistanceProxy::new(&self.vertices, 0.0)
    }

    fn core_proxy(&self) -> DistanceProxy {
        DistanceProxy::new(&self.core_vertices, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_box_mass() {
        let poly = PolygonShape::new_box(1.0, 0.5).unwrap();
        let mass = poly.compute_mass(2.0);

        // 2 x 1 box with density 2
        assert_relative_eq!(mass.mass, 4.0, epsilon = 1e-5);
        assert_relative_eq!(mass.center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(mass.inertia, 4.0 * (4.0 + 1.0) / 12.0, epsilon = 1e-4);
    }

    #[test]
    fn test_rejects_clockwise() {
        let vertices = [
            Vector2::new(0.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 0.0),
        ];
        assert!(PolygonShape::new(&vertices).is_err());
    }

    #[test]
    fn test_core_is_inset() {
        let poly = PolygonShape::new_box(1.0, 1.0).unwrap();
        for core in poly.get_core_vertices() {
            assert_relative_eq!(core.x.abs(), 1.0 - TOI_SLOP, epsilon = 1e-5);
            assert_relative_eq!(core.y.abs(), 1.0 - TOI_SLOP, epsilon = 1e-5);
        }
    }
}
