use crate::collision::{DistanceProxy, FilterData};
use crate::core::BodyHandle;
use crate::math::{Aabb, Segment, Transform2, Vector2};
use crate::shapes::{CircleShape, ConcaveArcShape, EdgeShape, PolygonShape};
use crate::Result;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Tag identifying the geometry of a shape
///
/// The discriminant doubles as the row/column index of the collision registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ShapeType {
    Circle = 0,
    Polygon = 1,
    Edge = 2,
    ConcaveArc = 3,
}

impl ShapeType {
    /// Number of shape types
    pub const COUNT: usize = 4;

    /// All shape types in registry order
    pub const ALL: [ShapeType; Self::COUNT] = [
        ShapeType::Circle,
        ShapeType::Polygon,
        ShapeType::Edge,
        ShapeType::ConcaveArc,
    ];

    /// Returns the registry index of this type
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Mass properties of a shape or body
///
/// `inertia` is the rotational inertia about the shape's local origin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct MassData {
    /// The mass of the shape, usually in kilograms
    pub mass: f32,

    /// The position of the shape's centroid relative to the shape's origin
    pub center: Vector2,

    /// The rotational inertia of the shape
    pub inertia: f32,
}

/// Result of a segment test against a shape
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentCollide {
    /// The segment misses the shape
    Miss,

    /// The segment enters the shape at `lambda` with the given outward normal
    Hit { lambda: f32, normal: Vector2 },

    /// The segment starts inside the shape
    StartsInside,
}

/// Geometric queries every shape kind supports
pub trait Geometry {
    /// Returns the type tag of the shape
    fn shape_type(&self) -> ShapeType;

    /// Tests a world point for containment
    fn test_point(&self, xf: &Transform2, p: Vector2) -> bool;

    /// Casts a world segment against the shape
    fn test_segment(&self, xf: &Transform2, segment: &Segment, max_lambda: f32) -> SegmentCollide;

    /// Returns the world bounding box for a transform
    fn compute_aabb(&self, xf: &Transform2) -> Aabb;

    /// Returns the bounding box covering the motion from `xf1` to `xf2`
    fn compute_swept_aabb(&self, xf1: &Transform2, xf2: &Transform2) -> Aabb {
        self.compute_aabb(xf1).combine(&self.compute_aabb(xf2))
    }

    /// Computes the mass properties for a density
    fn compute_mass(&self, density: f32) -> MassData;

    /// Returns the maximum distance from a local point to the shape boundary
    fn sweep_radius(&self, center: Vector2) -> f32;

    /// Returns the support-point proxy used by distance queries
    fn distance_proxy(&self) -> DistanceProxy;

    /// Returns the shrunken proxy used by time-of-impact queries
    fn core_proxy(&self) -> DistanceProxy;
}

/// The closed set of shape geometries
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub enum ShapeKind {
    Circle(CircleShape),
    Polygon(PolygonShape),
    Edge(EdgeShape),
    ConcaveArc(ConcaveArcShape),
}

macro_rules! dispatch {
    ($self:expr, $shape:ident => $body:expr) => {
        match $self {
            ShapeKind::Circle($shape) => $body,
            ShapeKind::Polygon($shape) => $body,
            ShapeKind::Edge($shape) => $body,
            ShapeKind::ConcaveArc($shape) => $body,
        }
    };
}

impl Geometry for ShapeKind {
    fn shape_type(&self) -> ShapeType {
        dispatch!(self, s => s.shape_type())
    }

    fn test_point(&self, xf: &Transform2, p: Vector2) -> bool {
        dispatch!(self, s => s.test_point(xf, p))
    }

    fn test_segment(&self, xf: &Transform2, segment: &Segment, max_lambda: f32) -> SegmentCollide {
        dispatch!(self, s => s.test_segment(xf, segment, max_lambda))
    }

    fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        dispatch!(self, s => s.compute_aabb(xf))
    }

    fn compute_swept_aabb(&self, xf1: &Transform2, xf2: &Transform2) -> Aabb {
        dispatch!(self, s => s.compute_swept_aabb(xf1, xf2))
    }

    fn compute_mass(&self, density: f32) -> MassData {
        dispatch!(self, s => s.compute_mass(density))
    }

    fn sweep_radius(&self, center: Vector2) -> f32 {
        dispatch!(self, s => s.sweep_radius(center))
    }

    fn distance_proxy(&self) -> DistanceProxy {
        dispatch!(self, s => s.distance_proxy())
    }

    fn core_proxy(&self) -> DistanceProxy {
        dispatch!(self, s => s.core_proxy())
    }
}

impl ShapeKind {
    /// Returns true when the shape takes part in time-of-impact sub-stepping
    pub fn supports_toi(&self) -> bool {
        !matches!(self, ShapeKind::ConcaveArc(_))
    }
}

/// Value object describing a shape to attach to a body
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct ShapeDef {
    /// The geometry of the shape
    pub kind: ShapeKind,

    /// Density in kg/m^2, zero means no mass contribution
    pub density: f32,

    /// Coulomb friction coefficient
    pub friction: f32,

    /// Restitution (bounciness), usually in `[0, 1]`
    pub restitution: f32,

    /// Sensors report overlaps but never generate a collision response
    pub is_sensor: bool,

    /// Collision filtering data
    pub filter: FilterData,

    /// Application data stored alongside the shape
    pub user_data: u64,
}

impl ShapeDef {
    /// Creates a definition with default material values for some geometry
    pub fn new(kind: ShapeKind) -> Self {
        Self {
            kind,
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
            is_sensor: false,
            filter: FilterData::default(),
            user_data: 0,
        }
    }

    /// A circle centered on the body origin
    pub fn circle(radius: f32) -> Result<Self> {
        Ok(Self::new(ShapeKind::Circle(CircleShape::new(Vector2::zero(), radius)?)))
    }

    /// A circle at a local offset
    pub fn circle_at(local_position: Vector2, radius: f32) -> Result<Self> {
        Ok(Self::new(ShapeKind::Circle(CircleShape::new(local_position, radius)?)))
    }

    /// A convex polygon, vertices in counter-clockwise order
    pub fn polygon(vertices: &[Vector2]) -> Result<Self> {
        Ok(Self::new(ShapeKind::Polygon(PolygonShape::new(vertices)?)))
    }

    /// An axis-aligned box centered on the body origin
    pub fn boxed(half_width: f32, half_height: f32) -> Result<Self> {
        Ok(Self::new(ShapeKind::Polygon(PolygonShape::new_box(half_width, half_height)?)))
    }

    /// A box with a local center and rotation
    pub fn oriented_box(half_width: f32, half_height: f32, center: Vector2, angle: f32) -> Result<Self> {
        Ok(Self::new(ShapeKind::Polygon(PolygonShape::new_oriented_box(
            half_width,
            half_height,
            center,
            angle,
        )?)))
    }

    /// A two-sided line segment
    pub fn edge(v1: Vector2, v2: Vector2) -> Result<Self> {
        Ok(Self::new(ShapeKind::Edge(EdgeShape::new(v1, v2)?)))
    }

    /// A convex polygon whose closing edge is carved by an inward arc
    pub fn concave_arc(vertices: &[Vector2], arc_radius: f32) -> Result<Self> {
        Ok(Self::new(ShapeKind::ConcaveArc(ConcaveArcShape::new(vertices, arc_radius)?)))
    }

    /// Sets the density
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Sets the friction coefficient
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Sets the restitution
    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    /// Marks the shape as a sensor
    pub fn with_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    /// Sets the collision filter
    pub fn with_filter(mut self, filter: FilterData) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the application data
    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

/// A shape attached to a body
#[derive(Debug, Clone)]
pub struct Shape {
    kind: ShapeKind,
    body: BodyHandle,
    density: f32,
    friction: f32,
    restitution: f32,
    is_sensor: bool,
    filter: FilterData,
    user_data: u64,
    pub(crate) proxy_id: Option<u16>,
    pub(crate) sweep_radius: f32,
}

impl Shape {
    pub(crate) fn new(def: &ShapeDef, body: BodyHandle) -> Self {
        Self {
            kind: def.kind.clone(),
            body,
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            is_sensor: def.is_sensor,
            filter: def.filter,
            user_data: def.user_data,
            proxy_id: None,
            sweep_radius: 0.0,
        }
    }

    /// Returns the geometry
    pub fn get_kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Returns the type tag
    pub fn get_type(&self) -> ShapeType {
        self.kind.shape_type()
    }

    /// Returns the owning body
    pub fn get_body(&self) -> BodyHandle {
        self.body
    }

    /// Returns the density
    pub fn get_density(&self) -> f32 {
        self.density
    }

    /// Sets the density; the body mass is not updated until `set_mass_from_shapes`
    pub fn set_density(&mut self, density: f32) {
        self.density = density;
    }

    /// Returns the friction coefficient
    pub fn get_friction(&self) -> f32 {
        self.friction
    }

    /// Sets the friction coefficient for future contacts
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    /// Returns the restitution
    pub fn get_restitution(&self) -> f32 {
        self.restitution
    }

    /// Sets the restitution for future contacts
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    /// Returns true if the shape is a sensor
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Returns the collision filter
    pub fn get_filter(&self) -> FilterData {
        self.filter
    }

    pub(crate) fn set_filter(&mut self, filter: FilterData) {
        self.filter = filter;
    }

    /// Returns the application data
    pub fn get_user_data(&self) -> u64 {
        self.user_data
    }

    /// Sets the application data
    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    /// Returns true while the shape is registered with the broad phase
    pub fn has_proxy(&self) -> bool {
        self.proxy_id.is_some()
    }

    /// Returns the cached sweep radius about the body's center of mass
    pub fn get_sweep_radius(&self) -> f32 {
        self.sweep_radius
    }

    /// Tests a world point against the shape
    pub fn test_point(&self, xf: &Transform2, p: Vector2) -> bool {
        self.kind.test_point(xf, p)
    }

    /// Casts a world segment against the shape
    pub fn test_segment(&self, xf: &Transform2, segment: &Segment, max_lambda: f32) -> SegmentCollide {
        self.kind.test_segment(xf, segment, max_lambda)
    }

    /// Computes the world bounding box
    pub fn compute_aabb(&self, xf: &Transform2) -> Aabb {
        self.kind.compute_aabb(xf)
    }

    /// Computes the mass properties using the shape's density
    pub fn compute_mass(&self) -> MassData {
        self.kind.compute_mass(self.density)
    }

    pub(crate) fn update_sweep_radius(&mut self, center: Vector2) {
        self.sweep_radius = self.kind.sweep_radius(center);
    }
}
