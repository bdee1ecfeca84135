use crate::core::config::{MAX_MANIFOLDS, MAX_MANIFOLD_POINTS};
use crate::math::Vector2;

/// Feature index meaning "no feature"
pub const NULL_FEATURE: u8 = u8::MAX;

/// Reference feature used by contacts against a concave arc
pub const ARC_FEATURE: u8 = u8::MAX - 1;

/// Identifies the geometric features that produced a contact point
///
/// Two points from consecutive steps describe the same physical contact
/// exactly when their keys are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContactId {
    /// The edge that defines the outward contact normal
    pub reference_edge: u8,

    /// The edge most anti-parallel to the reference edge
    pub incident_edge: u8,

    /// The vertex (0 or 1) on the incident edge that was clipped
    pub incident_vertex: u8,

    /// Set when the reference edge belongs to the second shape
    pub flip: u8,
}

impl ContactId {
    /// Creates an id from its features
    pub fn new(reference_edge: u8, incident_edge: u8, incident_vertex: u8, flip: u8) -> Self {
        Self {
            reference_edge,
            incident_edge,
            incident_vertex,
            flip,
        }
    }

    /// Packs the features into a single comparable key
    #[inline]
    pub fn key(&self) -> u32 {
        u32::from(self.reference_edge)
            | u32::from(self.incident_edge) << 8
            | u32::from(self.incident_vertex) << 16
            | u32::from(self.flip) << 24
    }
}

/// A contact point with the anchors on both shapes
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ManifoldPoint {
    /// Contact point in the first body's frame
    pub local_point1: Vector2,

    /// Contact point in the second body's frame
    pub local_point2: Vector2,

    /// Signed distance along the normal, negative when penetrating
    pub separation: f32,

    /// Accumulated non-penetration impulse
    pub normal_impulse: f32,

    /// Accumulated friction impulse
    pub tangent_impulse: f32,

    /// Feature id used to match points across steps
    pub id: ContactId,
}

/// Up to two contact points sharing one world normal
///
/// The normal points from the first shape to the second.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Manifold {
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    pub normal: Vector2,
    pub point_count: usize,
}

impl Manifold {
    /// Returns the live points
    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    /// Returns the live points mutably
    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }

    /// Appends a point, ignoring it when the manifold is full
    pub fn push(&mut self, point: ManifoldPoint) -> bool {
        if self.point_count >= MAX_MANIFOLD_POINTS {
            return false;
        }
        self.points[self.point_count] = point;
        self.point_count += 1;
        true
    }

    /// Smallest separation among the points
    pub fn min_separation(&self) -> f32 {
        self.points()
            .iter()
            .map(|p| p.separation)
            .fold(f32::MAX, f32::min)
    }

    /// Reverses the roles of the two shapes
    pub fn flip(&mut self) {
        self.normal = -self.normal;
        for point in self.points_mut() {
            std::mem::swap(&mut point.local_point1, &mut point.local_point2);
        }
    }
}

/// The fixed-capacity set of manifolds a contact holds
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContactManifolds {
    manifolds: [Manifold; MAX_MANIFOLDS],
    count: usize,
}

impl ContactManifolds {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of manifolds
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns true when no manifold is present
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Removes every manifold
    #[inline]
    pub fn clear(&mut self) {
        self.count = 0;
    }

    /// Adds a manifold with at least one point; returns false at capacity
    pub fn push(&mut self, manifold: Manifold) -> bool {
        if manifold.point_count == 0 || self.count >= MAX_MANIFOLDS {
            return false;
        }
        self.manifolds[self.count] = manifold;
        self.count += 1;
        true
    }

    /// Returns the manifolds
    #[inline]
    pub fn as_slice(&self) -> &[Manifold] {
        &self.manifolds[..self.count]
    }

    /// Returns the manifolds mutably
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Manifold] {
        &mut self.manifolds[..self.count]
    }

    /// Iterates over the manifolds
    pub fn iter(&self) -> std::slice::Iter<'_, Manifold> {
        self.as_slice().iter()
    }

    /// Total number of points across all manifolds
    pub fn point_count(&self) -> usize {
        self.iter().map(|m| m.point_count).sum()
    }

    /// Smallest separation across all manifolds
    pub fn min_separation(&self) -> f32 {
        self.iter().map(Manifold::min_separation).fold(f32::MAX, f32::min)
    }

    /// Reverses the roles of the two shapes in every manifold
    pub fn flip(&mut self) {
        for manifold in self.as_mut_slice() {
            manifold.flip();
        }
    }

    /// Returns true if any point was produced against a concave arc
    pub fn uses_arc(&self) -> bool {
        self.iter()
            .flat_map(|m| m.points().iter())
            .any(|p| p.id.reference_edge == ARC_FEATURE)
    }
}

impl<'a> IntoIterator for &'a ContactManifolds {
    type Item = &'a Manifold;
    type IntoIter = std::slice::Iter<'a, Manifold>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
