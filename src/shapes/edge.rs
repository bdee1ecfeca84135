use crate::collision::DistanceProxy;
use crate::error::PhysicsError;
use crate::math::{Aabb, Segment, Transform2, Vector2, EPSILON};
use crate::shapes::{Geometry, MassData, SegmentCollide, ShapeType};
use crate::Result;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// A two-sided line segment with no thickness and no mass
///
/// Edges are meant for static scenery; a chain of edges forms a terrain
/// outline that would be concave as a single polygon.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct EdgeShape {
    /// `[v1, v2]` in body coordinates
    vertices: [Vector2; 2],

    /// `[n, -n]` where `n` is the right-hand normal of `v2 - v1`
    normals: [Vector2; 2],

    length: f32,
}

impl EdgeShape {
    /// Creates an edge between two distinct points
    pub fn new(v1: Vector2, v2: Vector2) -> Result<Self> {
        let direction = v2 - v1;
        let length = direction.length();
        if !(length > EPSILON) || !v1.is_valid() || !v2.is_valid() {
            return Err(PhysicsError::InvalidGeometry(
                "edge endpoints must be distinct and finite".to_string(),
            ));
        }

        let normal = direction.cross_scalar(1.0) * (1.0 / length);
        Ok(Self {
            vertices: [v1, v2],
            normals: [normal, -normal],
            length,
        })
    }

    /// Returns the first endpoint
    pub fn get_vertex1(&self) -> Vector2 {
        self.vertices[0]
    }

    /// Returns the second endpoint
    pub fn get_vertex2(&self) -> Vector2 {
        self.vertices[1]
    }

    /// Returns both endpoints as a two-vertex polygon
    pub fn get_vertices(&self) -> &[Vector2] {
        &self.vertices
    }

    /// Returns the normals of the two faces
    pub fn get_normals(&self) -> &[Vector2] {
        &self.normals
    }

    /// Returns the right-hand face normal
    pub fn get_normal(&self) -> Vector2 {
        self.normals[0]
    }

    /// Returns the length of the edge
    pub fn get_length(&self) -> f32 {
        self.length
    }
}

impl Geometry for EdgeShape {
    fn shape_type(&self) -> ShapeType {
        ShapeType::Edge
    }

    fn test_point(&self, _xf: &Transform2, _p: Vector2) -> bool {
        false
    }

    fn test_segment(&self, xf: &Transform2, segment: &Segment, max_lambda: f32) -> SegmentCollide {
        let v1 = xf.transform_point(self.vertices[0]);
        let v2 = xf.transform_point(self.vertices[1]);

        // One face culls back-facing hits, so test both windings.
        let front = Segment::new(v1, v2).test_segment(segment, max_lambda);
        let back = Segment::new(v2, v1).test_segment(segment, max_lambda);

        match front.or(back) {
            Some((lambda, normal)) => SegmentCollide::Hit { lambda, normal },
            None => SegmentCollide::Miss,
        }
    }

    fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        let v1 = xf.transform_point(self.vertices[0]);
        let v2 = xf.transform_point(self.vertices[1]);
        Aabb::new(v1.min(&v2), v1.max(&v2))
    }

    fn compute_mass(&self, _density: f32) -> MassData {
        MassData {
            mass: 0.0,
            center: (self.vertices[0] + self.vertices[1]) * 0.5,
            inertia: 0.0,
        }
    }

    fn sweep_radius(&self, center: Vector2) -> f32 {
        (self.vertices[0] - center)
            .length()
            .max((self.vertices[1] - center).length())
    }

    fn distance_proxy(&self) -> DistanceProxy {
        DistanceProxy::new(&self.vertices, 0.0)
    }

    fn core_proxy(&self) -> DistanceProxy {
        DistanceProxy::new(&self.vertices, 0.0)
    }
}
