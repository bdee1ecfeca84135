use std::any::Any;

use crate::bodies::Body;
use crate::constraints::{
    DistanceJoint, DistanceJointDef, PrismaticJoint, PrismaticJointDef, PulleyJoint, PulleyJointDef,
};
use crate::core::config::{SimulationConfig, TimeStep};
use crate::core::BodyHandle;
use crate::error::PhysicsError;
use crate::math::Vector2;
use crate::Result;

/// The kinds of joint the world can create
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JointType {
    Distance,
    Prismatic,
    Pulley,
}

/// State of a one-sided or two-sided joint limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitState {
    #[default]
    Inactive,
    AtLower,
    AtUpper,
    Equal,
}

/// A joint definition, one variant per joint type
#[derive(Debug, Clone, PartialEq)]
pub enum JointDef {
    Distance(DistanceJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
}

impl JointDef {
    /// The bodies the joint connects
    pub fn bodies(&self) -> (BodyHandle, BodyHandle) {
        match self {
            JointDef::Distance(def) => (def.body1, def.body2),
            JointDef::Prismatic(def) => (def.body1, def.body2),
            JointDef::Pulley(def) => (def.body1, def.body2),
        }
    }

    /// Whether the connected bodies still collide with each other
    pub fn collide_connected(&self) -> bool {
        match self {
            JointDef::Distance(def) => def.collide_connected,
            JointDef::Prismatic(def) => def.collide_connected,
            JointDef::Pulley(def) => def.collide_connected,
        }
    }
}

impl From<DistanceJointDef> for JointDef {
    fn from(def: DistanceJointDef) -> Self {
        JointDef::Distance(def)
    }
}

impl From<PrismaticJointDef> for JointDef {
    fn from(def: PrismaticJointDef) -> Self {
        JointDef::Prismatic(def)
    }
}

impl From<PulleyJointDef> for JointDef {
    fn from(def: PulleyJointDef) -> Self {
        JointDef::Pulley(def)
    }
}

/// Data shared by every joint
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointBase {
    pub body1: BodyHandle,
    pub body2: BodyHandle,
    pub collide_connected: bool,
    pub(crate) island: bool,
    pub user_data: u64,
}

impl JointBase {
    pub(crate) fn new(body1: BodyHandle, body2: BodyHandle, collide_connected: bool) -> Self {
        Self {
            body1,
            body2,
            collide_connected,
            island: false,
            user_data: 0,
        }
    }
}

/// Velocity Jacobian of a scalar constraint between two bodies
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Jacobian {
    pub linear1: Vector2,
    pub angular1: f32,
    pub linear2: Vector2,
    pub angular2: f32,
}

impl Jacobian {
    pub fn new(linear1: Vector2, angular1: f32, linear2: Vector2, angular2: f32) -> Self {
        Self { linear1, angular1, linear2, angular2 }
    }

    /// Applies the Jacobian to both body velocities
    pub fn compute(&self, v1: Vector2, w1: f32, v2: Vector2, w2: f32) -> f32 {
        self.linear1.dot(&v1) + self.angular1 * w1 + self.linear2.dot(&v2) + self.angular2 * w2
    }

    /// Effective mass `1 / (J M^-1 J^T)` for two bodies, zero when degenerate
    pub(crate) fn effective_mass(&self, b1: &Body, b2: &Body) -> f32 {
        let k = b1.inv_mass + b1.inv_inertia * self.angular1 * self.angular1
            + b2.inv_mass + b2.inv_inertia * self.angular2 * self.angular2;
        if k > 0.0 {
            1.0 / k
        } else {
            0.0
        }
    }

    /// Adds `impulse` times the Jacobian to the body velocities
    pub(crate) fn apply_velocity(&self, b1: &mut Body, b2: &mut Body, impulse: f32) {
        b1.linear_velocity += self.linear1 * (b1.inv_mass * impulse);
        b1.angular_velocity += b1.inv_inertia * impulse * self.angular1;
        b2.linear_velocity += self.linear2 * (b2.inv_mass * impulse);
        b2.angular_velocity += b2.inv_inertia * impulse * self.angular2;
    }

    /// Adds `impulse` times the Jacobian to the body sweeps
    pub(crate) fn apply_position(&self, b1: &mut Body, b2: &mut Body, impulse: f32) {
        b1.sweep.c += self.linear1 * (b1.inv_mass * impulse);
        b1.sweep.a += b1.inv_inertia * impulse * self.angular1;
        b2.sweep.c += self.linear2 * (b2.inv_mass * impulse);
        b2.sweep.a += b2.inv_inertia * impulse * self.angular2;
    }
}

/// Base trait for joints between two bodies
///
/// The island solver drives every joint through the same two-phase contract
/// as contacts: velocity constraints each iteration, then position
/// constraints until they report being satisfied.
pub trait Joint: Send + Sync + 'static {
    /// Returns the type of the joint
    fn joint_type(&self) -> JointType;

    /// Returns the shared joint data
    fn base(&self) -> &JointBase;

    /// Returns the shared joint data mutably
    fn base_mut(&mut self) -> &mut JointBase;

    /// Returns the first body
    fn get_body1(&self) -> BodyHandle {
        self.base().body1
    }

    /// Returns the second body
    fn get_body2(&self) -> BodyHandle {
        self.base().body2
    }

    /// Checks if the joint involves a specific body
    fn involves_body(&self, body: BodyHandle) -> bool {
        self.get_body1() == body || self.get_body2() == body
    }

    /// Returns the anchor on the first body in world coordinates
    fn get_anchor1(&self, body1: &Body) -> Vector2;

    /// Returns the anchor on the second body in world coordinates
    fn get_anchor2(&self, body2: &Body) -> Vector2;

    /// Returns the reaction force on the second body at its anchor
    fn get_reaction_force(&self, inv_dt: f32) -> Vector2;

    /// Returns the reaction torque on the second body
    fn get_reaction_torque(&self, inv_dt: f32) -> f32;

    /// Computes effective masses and applies warm-start impulses
    fn init_velocity_constraints(&mut self, step: &TimeStep, config: &SimulationConfig, b1: &mut Body, b2: &mut Body);

    /// Runs one velocity iteration
    fn solve_velocity_constraints(&mut self, step: &TimeStep, b1: &mut Body, b2: &mut Body);

    /// Resets state accumulated by the position pass
    fn init_position_constraints(&mut self) {}

    /// Runs one position iteration; returns true when the error is within tolerance
    fn solve_position_constraints(&mut self, config: &SimulationConfig, b1: &mut Body, b2: &mut Body) -> bool;

    /// Returns a dynamic reference to any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Returns a dynamic mutable reference to any for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl dyn Joint {
    /// Downcasts to a concrete joint type
    pub fn downcast_ref<T: Joint>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    /// Downcasts mutably to a concrete joint type
    pub fn downcast_mut<T: Joint>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Creates the joint described by `def`
pub(crate) fn create_joint(def: &JointDef) -> Result<Box<dyn Joint>> {
    let (body1, body2) = def.bodies();
    if body1 == body2 {
        return Err(PhysicsError::InvalidParameter(
            "a joint must connect two different bodies".to_string(),
        ));
    }

    let joint: Box<dyn Joint> = match def {
        JointDef::Distance(def) => Box::new(DistanceJoint::new(def)?),
        JointDef::Prismatic(def) => Box::new(PrismaticJoint::new(def)?),
        JointDef::Pulley(def) => Box::new(PulleyJoint::new(def)?),
    };
    Ok(joint)
}
