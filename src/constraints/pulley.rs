use std::any::Any;

use crate::bodies::Body;
use crate::constraints::{Joint, JointBase, JointType, LimitState};
use crate::core::config::{SimulationConfig, TimeStep, MIN_PULLEY_LENGTH};
use crate::core::BodyHandle;
use crate::error::PhysicsError;
use crate::math::{clamp, Vector2, EPSILON};
use crate::Result;

/// Definition of a pulley joint
///
/// Each body hangs from a fixed ground anchor. The rope satisfies
/// `length1 + ratio * length2 <= length1_0 + ratio * length2_0`, and each
/// side is additionally capped by its own maximum length.
#[derive(Debug, Clone, PartialEq)]
pub struct PulleyJointDef {
    pub body1: BodyHandle,
    pub body2: BodyHandle,
    pub collide_connected: bool,

    /// World position of the first pulley wheel
    pub ground_anchor1: Vector2,

    /// World position of the second pulley wheel
    pub ground_anchor2: Vector2,

    pub local_anchor1: Vector2,
    pub local_anchor2: Vector2,

    /// Rest length of the first segment
    pub length1: f32,

    /// Rest length of the second segment
    pub length2: f32,

    pub max_length1: f32,
    pub max_length2: f32,

    /// Block and tackle ratio
    pub ratio: f32,
}

impl PulleyJointDef {
    /// Builds a definition from world anchors; the current lengths become the rest lengths
    #[allow(clippy::too_many_arguments)]
    pub fn initialize(
        body1: BodyHandle,
        b1: &Body,
        body2: BodyHandle,
        b2: &Body,
        ground_anchor1: Vector2,
        ground_anchor2: Vector2,
        anchor1: Vector2,
        anchor2: Vector2,
        ratio: f32,
    ) -> Self {
        let length1 = (anchor1 - ground_anchor1).length();
        let length2 = (anchor2 - ground_anchor2).length();
        let constant = length1 + ratio * length2;

        Self {
            body1,
            body2,
            collide_connected: true,
            ground_anchor1,
            ground_anchor2,
            local_anchor1: b1.get_local_point(anchor1),
            local_anchor2: b2.get_local_point(anchor2),
            length1,
            length2,
            max_length1: constant - ratio * MIN_PULLEY_LENGTH,
            max_length2: if ratio > EPSILON { (constant - MIN_PULLEY_LENGTH) / ratio } else { 0.0 },
            ratio,
        }
    }
}

/// Connects two bodies through a rope over two fixed pulleys
#[derive(Debug, Clone)]
pub struct PulleyJoint {
    base: JointBase,
    ground_anchor1: Vector2,
    ground_anchor2: Vector2,
    local_anchor1: Vector2,
    local_anchor2: Vector2,

    u1: Vector2,
    u2: Vector2,
    r1: Vector2,
    r2: Vector2,

    constant: f32,
    ratio: f32,

    max_length1: f32,
    max_length2: f32,

    // Effective masses
    pulley_mass: f32,
    limit_mass1: f32,
    limit_mass2: f32,

    // Impulses for accumulation/warm starting.
    impulse: f32,
    limit_impulse1: f32,
    limit_impulse2: f32,

    // Position impulses for accumulation.
    position_impulse: f32,
    limit_position_impulse1: f32,
    limit_position_impulse2: f32,

    state: LimitState,
    limit_state1: LimitState,
    limit_state2: LimitState,
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> Result<Self> {
        if def.ratio.is_nan() || def.ratio <= EPSILON {
            return Err(PhysicsError::InvalidParameter(format!(
                "pulley ratio must be positive, got {}",
                def.ratio
            )));
        }

        let constant = def.length1 + def.ratio * def.length2;
        Ok(Self {
            base: JointBase::new(def.body1, def.body2, def.collide_connected),
            ground_anchor1: def.ground_anchor1,
            ground_anchor2: def.ground_anchor2,
            local_anchor1: def.local_anchor1,
            local_anchor2: def.local_anchor2,
            u1: Vector2::zero(),
            u2: Vector2::zero(),
            r1: Vector2::zero(),
            r2: Vector2::zero(),
            constant,
            ratio: def.ratio,
            max_length1: def.max_length1.min(constant - def.ratio * MIN_PULLEY_LENGTH),
            max_length2: def.max_length2.min((constant - MIN_PULLEY_LENGTH) / def.ratio),
            pulley_mass: 0.0,
            limit_mass1: 0.0,
            limit_mass2: 0.0,
            impulse: 0.0,
            limit_impulse1: 0.0,
            limit_impulse2: 0.0,
            position_impulse: 0.0,
            limit_position_impulse1: 0.0,
            limit_position_impulse2: 0.0,
            state: LimitState::Inactive,
            limit_state1: LimitState::Inactive,
            limit_state2: LimitState::Inactive,
        })
    }

    pub fn get_ground_anchor1(&self) -> Vector2 {
        self.ground_anchor1
    }

    pub fn get_ground_anchor2(&self) -> Vector2 {
        self.ground_anchor2
    }

    /// Current length of the first segment
    pub fn get_length1(&self, b1: &Body) -> f32 {
        (b1.get_world_point(self.local_anchor1) - self.ground_anchor1).length()
    }

    /// Current length of the second segment
    pub fn get_length2(&self, b2: &Body) -> f32 {
        (b2.get_world_point(self.local_anchor2) - self.ground_anchor2).length()
    }

    pub fn get_ratio(&self) -> f32 {
        self.ratio
    }

    /// `length1 + ratio * length2` at rest
    pub fn get_constant(&self) -> f32 {
        self.constant
    }

    pub fn get_max_length1(&self) -> f32 {
        self.max_length1
    }

    pub fn get_max_length2(&self) -> f32 {
        self.max_length2
    }
}

/// Unit vector along `u`, or zero when shorter than the slop
fn rope_axis(u: Vector2, length: f32, linear_slop: f32) -> Vector2 {
    if length > linear_slop {
        u * (1.0 / length)
    } else {
        Vector2::zero()
    }
}

impl Joint for PulleyJoint {
    fn joint_type(&self) -> JointType {
        JointType::Pulley
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
        self.u2 * (inv_dt * self.impulse)
    }

    fn get_reaction_torque(&self, _inv_dt: f32) -> f32 {
        0.0
    }

    fn init_velocity_constraints(&mut self, step: &TimeStep, config: &SimulationConfig, b1: &mut Body, b2: &mut Body) {
        self.r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
        self.r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);

        let p1 = b1.sweep.c + self.r1;
        let p2 = b2.sweep.c + self.r2;

        // Get the pulley axes.
        let u1 = p1 - self.ground_anchor1;
        let u2 = p2 - self.ground_anchor2;
        let length1 = u1.length();
        let length2 = u2.length();
        self.u1 = rope_axis(u1, length1, config.linear_slop);
        self.u2 = rope_axis(u2, length2, config.linear_slop);

        let c = self.constant - length1 - self.ratio * length2;
        if c > 0.0 {
            self.state = LimitState::Inactive;
            self.impulse = 0.0;
        } else {
            self.state = LimitState::AtUpper;
            self.position_impulse = 0.0;
        }

        if length1 < self.max_length1 {
            self.limit_state1 = LimitState::Inactive;
            self.limit_impulse1 = 0.0;
        } else {
            self.limit_state1 = LimitState::AtUpper;
            self.limit_position_impulse1 = 0.0;
        }

        if length2 < self.max_length2 {
            self.limit_state2 = LimitState::Inactive;
            self.limit_impulse2 = 0.0;
        } else {
            self.limit_state2 = LimitState::AtUpper;
            self.limit_position_impulse2 = 0.0;
        }

        // Compute effective mass.
        let cr1u1 = self.r1.cross(&self.u1);
        let cr2u2 = self.r2.cross(&self.u2);

        let k1 = b1.inv_mass + b1.inv_inertia * cr1u1 * cr1u1;
        let k2 = b2.inv_mass + b2.inv_inertia * cr2u2 * cr2u2;
        let kp = k1 + self.ratio * self.ratio * k2;
        self.limit_mass1 = if k1 > 0.0 { 1.0 / k1 } else { 0.0 };
        self.limit_mass2 = if k2 > 0.0 { 1.0 / k2 } else { 0.0 };
        self.pulley_mass = if kp > 0.0 { 1.0 / kp } else { 0.0 };

        if step.warm_starting {
            // Scale impulses to support variable time steps.
            self.impulse *= step.dt_ratio;
            self.limit_impulse1 *= step.dt_ratio;
            self.limit_impulse2 *= step.dt_ratio;

            // Warm starting.
            let p1 = self.u1 * -(self.impulse + self.limit_impulse1);
            let p2 = self.u2 * (-self.ratio * self.impulse - self.limit_impulse2);
            b1.linear_velocity += p1 * b1.inv_mass;
            b1.angular_velocity += b1.inv_inertia * self.r1.cross(&p1);
            b2.linear_velocity += p2 * b2.inv_mass;
            b2.angular_velocity += b2.inv_inertia * self.r2.cross(&p2);
        } else {
            self.impulse = 0.0;
            self.limit_impulse1 = 0.0;
            self.limit_impulse2 = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, _step: &TimeStep, b1: &mut Body, b2: &mut Body) {
        if self.state == LimitState::AtUpper {
            let v1 = b1.linear_velocity + Vector2::scalar_cross(b1.angular_velocity, &self.r1);
            let v2 = b2.linear_velocity + Vector2::scalar_cross(b2.angular_velocity, &self.r2);

            let cdot = -self.u1.dot(&v1) - self.ratio * self.u2.dot(&v2);
            let impulse = self.pulley_mass * -cdot;
            let old_impulse = self.impulse;
            self.impulse = (self.impulse + impulse).max(0.0);
            let impulse = self.impulse - old_impulse;

            let p1 = self.u1 * -impulse;
            let p2 = self.u2 * (-self.ratio * impulse);
            b1.linear_velocity += p1 * b1.inv_mass;
            b1.angular_velocity += b1.inv_inertia * self.r1.cross(&p1);
            b2.linear_velocity += p2 * b2.inv_mass;
            b2.angular_velocity += b2.inv_inertia * self.r2.cross(&p2);
        }

        if self.limit_state1 == LimitState::AtUpper {
            let v1 = b1.linear_velocity + Vector2::scalar_cross(b1.angular_velocity, &self.r1);

            let cdot = -self.u1.dot(&v1);
            let impulse = -self.limit_mass1 * cdot;
            let old_impulse = self.limit_impulse1;
            self.limit_impulse1 = (self.limit_impulse1 + impulse).max(0.0);
            let impulse = self.limit_impulse1 - old_impulse;

            let p1 = self.u1 * -impulse;
            b1.linear_velocity += p1 * b1.inv_mass;
            b1.angular_velocity += b1.inv_inertia * self.r1.cross(&p1);
        }

        if self.limit_state2 == LimitState::AtUpper {
            let v2 = b2.linear_velocity + Vector2::scalar_cross(b2.angular_velocity, &self.r2);

            let cdot = -self.u2.dot(&v2);
            let impulse = -self.limit_mass2 * cdot;
            let old_impulse = self.limit_impulse2;
            self.limit_impulse2 = (self.limit_impulse2 + impulse).max(0.0);
            let impulse = self.limit_impulse2 - old_impulse;

            let p2 = self.u2 * -impulse;
            b2.linear_velocity += p2 * b2.inv_mass;
            b2.angular_velocity += b2.inv_inertia * self.r2.cross(&p2);
        }
    }

    fn solve_position_constraints(&mut self, config: &SimulationConfig, b1: &mut Body, b2: &mut Body) -> bool {
        let slop = config.linear_slop;
        let max_correction = config.max_linear_correction;
        let mut linear_error = 0.0f32;

        if self.state == LimitState::AtUpper {
            let r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
            let r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);

            let u1 = b1.sweep.c + r1 - self.ground_anchor1;
            let u2 = b2.sweep.c + r2 - self.ground_anchor2;
            let length1 = u1.length();
            let length2 = u2.length();
            self.u1 = rope_axis(u1, length1, slop);
            self.u2 = rope_axis(u2, length2, slop);

            let c = self.constant - length1 - self.ratio * length2;
            linear_error = linear_error.max(-c);

            let c = clamp(c + slop, -max_correction, 0.0);
            let impulse = -self.pulley_mass * c;
            let old_impulse = self.position_impulse;
            self.position_impulse = (self.position_impulse + impulse).max(0.0);
            let impulse = self.position_impulse - old_impulse;

            let p1 = self.u1 * -impulse;
            let p2 = self.u2 * (-self.ratio * impulse);

            b1.sweep.c += p1 * b1.inv_mass;
            b1.sweep.a += b1.inv_inertia * r1.cross(&p1);
            b2.sweep.c += p2 * b2.inv_mass;
            b2.sweep.a += b2.inv_inertia * r2.cross(&p2);

            b1.synchronize_transform();
            b2.synchronize_transform();
        }

        if self.limit_state1 == LimitState::AtUpper {
            let r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
            let u1 = b1.sweep.c + r1 - self.ground_anchor1;
            let length1 = u1.length();
            self.u1 = rope_axis(u1, length1, slop);

            let c = self.max_length1 - length1;
            linear_error = linear_error.max(-c);
            let c = clamp(c + slop, -max_correction, 0.0);
            let impulse = -self.limit_mass1 * c;
            let old = self.limit_position_impulse1;
            self.limit_position_impulse1 = (self.limit_position_impulse1 + impulse).max(0.0);
            let impulse = self.limit_position_impulse1 - old;

            let p1 = self.u1 * -impulse;
            b1.sweep.c += p1 * b1.inv_mass;
            b1.sweep.a += b1.inv_inertia * r1.cross(&p1);
            b1.synchronize_transform();
        }

        if self.limit_state2 == LimitState::AtUpper {
            let r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);
            let u2 = b2.sweep.c + r2 - self.ground_anchor2;
            let length2 = u2.length();
            self.u2 = rope_axis(u2, length2, slop);

            let c = self.max_length2 - length2;
            linear_error = linear_error.max(-c);
            let c = clamp(c + slop, -max_correction, 0.0);
            let impulse = -self.limit_mass2 * c;
            let old = self.limit_position_impulse2;
            self.limit_position_impulse2 = (self.limit_position_impulse2 + impulse).max(0.0);
            let impulse = self.limit_position_impulse2 - old;

            let p2 = self.u2 * -impulse;
            b2.sweep.c += p2 * b2.inv_mass;
            b2.sweep.a += b2.inv_inertia * r2.cross(&p2);
            b2.synchronize_transform();
        }

        linear_error < slop
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::BodyDef;
    use crate::core::ArenaHandle;
    use approx::assert_relative_eq;

    #[test]
    fn test_max_lengths_leave_minimum_rope() {
        let b1 = Body::new(&BodyDef::at(Vector2::new(-2.0, 5.0)));
        let b2 = Body::new(&BodyDef::at(Vector2::new(2.0, 6.0)));
        let def = PulleyJointDef::initialize(
            BodyHandle::from_parts(0, 0),
            &b1,
            BodyHandle::from_parts(1, 0),
            &b2,
            Vector2::new(-2.0, 10.0),
            Vector2::new(2.0, 10.0),
            Vector2::new(-2.0, 5.0),
            Vector2::new(2.0, 6.0),
            2.0,
        );

        let joint = PulleyJoint::new(&def).unwrap();
        assert_relative_eq!(joint.get_constant(), 13.0);
        assert_relative_eq!(joint.get_max_length1(), 13.0 - 2.0 * MIN_PULLEY_LENGTH);
        assert_relative_eq!(joint.get_max_length2(), (13.0 - MIN_PULLEY_LENGTH) / 2.0);
        assert_relative_eq!(joint.get_length1(&b1), 5.0);
    }

    #[test]
    fn test_non_positive_ratio_is_rejected() {
        let b = Body::new(&BodyDef::default());
        let mut def = PulleyJointDef::initialize(
            BodyHandle::from_parts(0, 0),
            &b,
            BodyHandle::from_parts(1, 0),
            &b,
            Vector2::new(0.0, 1.0),
            Vector2::new(1.0, 1.0),
            Vector2::zero(),
            Vector2::new(1.0, 0.0),
            1.0,
        );
        def.ratio = 0.0;
        assert!(PulleyJoint::new(&def).is_err());
    }
}
