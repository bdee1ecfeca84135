use std::any::Any;
use std::f32::consts::PI;

use crate::bodies::Body;
use crate::constraints::{Joint, JointBase, JointType};
use crate::core::config::{SimulationConfig, TimeStep};
use crate::core::BodyHandle;
use crate::error::PhysicsError;
use crate::math::{clamp, Vector2};
use crate::Result;

/// Definition of a distance joint
///
/// The anchors are in the local frames of their bodies. A positive
/// `frequency_hz` turns the rigid rod into a damped spring.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceJointDef {
    pub body1: BodyHandle,
    pub body2: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor1: Vector2,
    pub local_anchor2: Vector2,

    /// Natural length between the anchors
    pub length: f32,

    /// Mass-spring-damper frequency in Hertz, zero for a rigid rod
    pub frequency_hz: f32,

    /// Damping ratio, one is critical damping
    pub damping_ratio: f32,
}

impl DistanceJointDef {
    /// Builds a definition from two world anchors; the current distance becomes the length
    pub fn initialize(
        body1: BodyHandle,
        b1: &Body,
        body2: BodyHandle,
        b2: &Body,
        anchor1: Vector2,
        anchor2: Vector2,
    ) -> Self {
        Self {
            body1,
            body2,
            collide_connected: false,
            local_anchor1: b1.get_local_point(anchor1),
            local_anchor2: b2.get_local_point(anchor2),
            length: (anchor2 - anchor1).length(),
            frequency_hz: 0.0,
            damping_ratio: 0.0,
        }
    }

    /// Turns the joint into a spring
    pub fn with_spring(mut self, frequency_hz: f32, damping_ratio: f32) -> Self {
        self.frequency_hz = frequency_hz;
        self.damping_ratio = damping_ratio;
        self
    }
}

/// Keeps two anchor points at a fixed distance
#[derive(Debug, Clone)]
pub struct DistanceJoint {
    base: JointBase,
    local_anchor1: Vector2,
    local_anchor2: Vector2,
    length: f32,
    frequency_hz: f32,
    damping_ratio: f32,

    u: Vector2,
    r1: Vector2,
    r2: Vector2,
    mass: f32,
    gamma: f32,
    bias: f32,
    impulse: f32,
}

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> Result<Self> {
        if !def.length.is_finite() || def.length < 0.0 {
            return Err(PhysicsError::InvalidParameter(format!(
                "distance joint length must be non-negative, got {}",
                def.length
            )));
        }
        if def.frequency_hz < 0.0 || def.damping_ratio < 0.0 {
            return Err(PhysicsError::InvalidParameter(
                "distance joint spring parameters must be non-negative".to_string(),
            ));
        }

        Ok(Self {
            base: JointBase::new(def.body1, def.body2, def.collide_connected),
            local_anchor1: def.local_anchor1,
            local_anchor2: def.local_anchor2,
            length: def.length,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            u: Vector2::zero(),
            r1: Vector2::zero(),
            r2: Vector2::zero(),
            mass: 0.0,
            gamma: 0.0,
            bias: 0.0,
            impulse: 0.0,
        })
    }

    /// Returns the natural length
    pub fn get_length(&self) -> f32 {
        self.length
    }

    /// Sets the natural length
    pub fn set_length(&mut self, length: f32) {
        self.length = length.max(0.0);
    }

    pub fn get_frequency(&self) -> f32 {
        self.frequency_hz
    }

    pub fn get_damping_ratio(&self) -> f32 {
        self.damping_ratio
    }
}

impl Joint for DistanceJoint {
    fn joint_type(&self) -> JointType {
        JointType::Distance
    }

    fn base(&self) -> &JointBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut JointBase {
        &mut self.base
    }

    fn get_anchor1(&self, body1: &Body) -> Vector2 {
        body1.get_world_point(self.local_anchor1)
    }

    fn get_anchor2(&self, body2: &Body) -> Vector2 {
        body2.get_world_point(self.local_anchor2)
    }

    fn get_reaction_force(&self, inv_dt: f32) -> Vector2 {
        self.u * (inv_dt * self.impulse)
    }

    fn get_reaction_torque(&self, _inv_dt: f32) -> f32 {
        0.0
    }

    fn init_velocity_constraints(&mut self, step: &TimeStep, config: &SimulationConfig, b1: &mut Body, b2: &mut Body) {
        // Compute the effective mass matrix.
        self.r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
        self.r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);
        self.u = b2.sweep.c + self.r2 - b1.sweep.c - self.r1;

        // Handle singularity.
        let length = self.u.length();
        if length > config.linear_slop {
            self.u = self.u * (1.0 / length);
        } else {
            self.u = Vector2::zero();
        }

        let cr1u = self.r1.cross(&self.u);
        let cr2u = self.r2.cross(&self.u);
        let inv_mass = b1.inv_mass + b1.inv_inertia * cr1u * cr1u + b2.inv_mass + b2.inv_inertia * cr2u * cr2u;
        self.mass = if inv_mass > 0.0 { 1.0 / inv_mass } else { 0.0 };
        self.gamma = 0.0;
        self.bias = 0.0;

        if self.frequency_hz > 0.0 && inv_mass > 0.0 {
            let c = length - self.length;

            let omega = 2.0 * PI * self.frequency_hz;
            // Damping coefficient
            let d = 2.0 * self.mass * self.damping_ratio * omega;
            // Spring stiffness
            let k = self.mass * omega * omega;

            self.gamma = 1.0 / (step.dt * (d + step.dt * k));
            self.bias = c * step.dt * k * self.gamma;
            self.mass = 1.0 / (inv_mass + self.gamma);
        }

        if step.warm_starting {
            self.impulse *= step.dt_ratio;
            let p = self.u * self.impulse;
            b1.linear_velocity -= p * b1.inv_mass;
            b1.angular_velocity -= b1.inv_inertia * self.r1.cross(&p);
            b2.linear_velocity += p * b2.inv_mass;
            b2.angular_velocity += b2.inv_inertia * self.r2.cross(&p);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, _step: &TimeStep, b1: &mut Body, b2: &mut Body) {
        // Cdot = dot(u, v + cross(w, r))
        let v1 = b1.linear_velocity + Vector2::scalar_cross(b1.angular_velocity, &self.r1);
        let v2 = b2.linear_velocity + Vector2::scalar_cross(b2.angular_velocity, &self.r2);
        let cdot = self.u.dot(&(v2 - v1));

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = self.u * impulse;
        b1.linear_velocity -= p * b1.inv_mass;
        b1.angular_velocity -= b1.inv_inertia * self.r1.cross(&p);
        b2.linear_velocity += p * b2.inv_mass;
        b2.angular_velocity += b2.inv_inertia * self.r2.cross(&p);
    }

    fn solve_position_constraints(&mut self, config: &SimulationConfig, b1: &mut Body, b2: &mut Body) -> bool {
        // Springs are soft and never corrected here.
        if self.frequency_hz > 0.0 {
            return true;
        }

        let r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
        let r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);

        let mut d = b2.sweep.c + r2 - b1.sweep.c - r1;
        let length = d.normalize_mut();
        let c = clamp(length - self.length, -config.max_linear_correction, config.max_linear_correction);

        let impulse = -self.mass * c;
        self.u = d;
        let p = self.u * impulse;

        b1.sweep.c -= p * b1.inv_mass;
        b1.sweep.a -= b1.inv_inertia * r1.cross(&p);
        b2.sweep.c += p * b2.inv_mass;
        b2.sweep.a += b2.inv_inertia * r2.cross(&p);

        b1.synchronize_transform();
        b2.synchronize_transform();

        c.abs() < config.linear_slop
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
