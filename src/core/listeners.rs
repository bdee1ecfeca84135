use crate::collision::ContactId;
use crate::core::{BodyHandle, JointHandle, ShapeHandle};
use crate::math::Vector2;

/// A contact point reported to a [`ContactListener`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactPoint {
    pub shape1: ShapeHandle,
    pub shape2: ShapeHandle,

    /// World position of the point
    pub position: Vector2,

    /// Velocity of the point on shape2 relative to shape1
    pub velocity: Vector2,

    /// Points from shape1 to shape2
    pub normal: Vector2,

    /// Negative when penetrating
    pub separation: f32,

    /// Combined friction of the contact
    pub friction: f32,

    /// Combined restitution of the contact
    pub restitution: f32,

    pub id: ContactId,
}

/// Solved impulses for one contact point, reported after the position pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactResult {
    pub shape1: ShapeHandle,
    pub shape2: ShapeHandle,
    pub position: Vector2,
    pub normal: Vector2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub id: ContactId,
}

/// Receives contact point events during a step
///
/// Callbacks run while the world is locked; they only see copies of the
/// contact data.
pub trait ContactListener {
    /// A point was created
    fn add(&mut self, _point: &ContactPoint) {}

    /// A point persisted from the previous step
    fn persist(&mut self, _point: &ContactPoint) {}

    /// A point was removed
    fn remove(&mut self, _point: &ContactPoint) {}

    /// The solver finished with a point
    fn result(&mut self, _result: &ContactResult) {}
}

/// Notified when joints and shapes are destroyed implicitly with their body
pub trait DestructionListener {
    fn joint_destroyed(&mut self, _joint: JointHandle) {}

    fn shape_destroyed(&mut self, _shape: ShapeHandle) {}
}

/// Notified when a body leaves the world bounds and is frozen
pub trait BoundaryListener {
    fn violation(&mut self, body: BodyHandle);
}

/// A borrowed contact listener, if one is installed
pub(crate) type ListenerSlot<'a> = Option<&'a mut (dyn ContactListener + 'static)>;
