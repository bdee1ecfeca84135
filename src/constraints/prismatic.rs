use std::any::Any;

use crate::bodies::Body;
use crate::constraints::{Jacobian, Joint, JointBase, JointType, LimitState};
use crate::core::config::{SimulationConfig, TimeStep};
use crate::core::BodyHandle;
use crate::error::PhysicsError;
use crate::math::{clamp, Vector2, EPSILON};
use crate::Result;

/// Definition of a prismatic joint
///
/// The second body may only translate along `local_axis1`, fixed in the
/// first body's frame, and may not rotate relative to the first body.
#[derive(Debug, Clone, PartialEq)]
pub struct PrismaticJointDef {
    pub body1: BodyHandle,
    pub body2: BodyHandle,
    pub collide_connected: bool,
    pub local_anchor1: Vector2,
    pub local_anchor2: Vector2,

    /// Translation axis in the first body's frame
    pub local_axis1: Vector2,

    /// Angle of the second body relative to the first at rest
    pub reference_angle: f32,

    pub enable_limit: bool,
    pub lower_translation: f32,
    pub upper_translation: f32,

    pub enable_motor: bool,

    /// Maximum motor force in N
    pub max_motor_force: f32,

    /// Desired motor speed in m/s
    pub motor_speed: f32,
}

impl PrismaticJointDef {
    /// Builds a definition from a shared world anchor and a world axis
    pub fn initialize(
        body1: BodyHandle,
        b1: &Body,
        body2: BodyHandle,
        b2: &Body,
        anchor: Vector2,
        axis: Vector2,
    ) -> Self {
        Self {
            body1,
            body2,
            collide_connected: false,
            local_anchor1: b1.get_local_point(anchor),
            local_anchor2: b2.get_local_point(anchor),
            local_axis1: b1.get_local_vector(axis),
            reference_angle: b2.get_angle() - b1.get_angle(),
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
        }
    }

    /// Enables the translation limits
    pub fn with_limits(mut self, lower: f32, upper: f32) -> Self {
        self.enable_limit = true;
        self.lower_translation = lower;
        self.upper_translation = upper;
        self
    }

    /// Enables the motor
    pub fn with_motor(mut self, speed: f32, max_force: f32) -> Self {
        self.enable_motor = true;
        self.motor_speed = speed;
        self.max_motor_force = max_force;
        self
    }
}

/// Constrains two bodies to slide along a single axis
#[derive(Debug, Clone)]
pub struct PrismaticJoint {
    base: JointBase,
    local_anchor1: Vector2,
    local_anchor2: Vector2,
    local_x_axis1: Vector2,
    local_y_axis1: Vector2,
    reference_angle: f32,

    linear_jacobian: Jacobian,
    linear_mass: f32,
    linear_impulse: f32,

    angular_mass: f32,
    angular_impulse: f32,

    motor_jacobian: Jacobian,
    motor_mass: f32,
    motor_impulse: f32,
    limit_impulse: f32,
    limit_position_impulse: f32,

    x_axis: Vector2,
    y_axis: Vector2,

    lower_translation: f32,
    upper_translation: f32,
    max_motor_force: f32,
    motor_speed: f32,

    enable_limit: bool,
    enable_motor: bool,
    limit_state: LimitState,
}

impl PrismaticJoint {
    pub(crate) fn new(def: &PrismaticJointDef) -> Result<Self> {
        let mut axis = def.local_axis1;
        if axis.normalize_mut() < EPSILON {
            return Err(PhysicsError::InvalidParameter(
                "prismatic joint axis must be non-zero".to_string(),
            ));
        }
        if def.enable_limit && def.lower_translation > def.upper_translation {
            return Err(PhysicsError::InvalidParameter(format!(
                "prismatic joint lower limit {} exceeds upper limit {}",
                def.lower_translation, def.upper_translation
            )));
        }

        Ok(Self {
            base: JointBase::new(def.body1, def.body2, def.collide_connected),
            local_anchor1: def.local_anchor1,
            local_anchor2: def.local_anchor2,
            local_x_axis1: axis,
            local_y_axis1: Vector2::scalar_cross(1.0, &axis),
            reference_angle: def.reference_angle,
            linear_jacobian: Jacobian::default(),
            linear_mass: 0.0,
            linear_impulse: 0.0,
            angular_mass: 0.0,
            angular_impulse: 0.0,
            motor_jacobian: Jacobian::default(),
            motor_mass: 0.0,
            motor_impulse: 0.0,
            limit_impulse: 0.0,
            limit_position_impulse: 0.0,
            x_axis: Vector2::zero(),
            y_axis: Vector2::zero(),
            lower_translation: def.lower_translation,
            upper_translation: def.upper_translation,
            max_motor_force: def.max_motor_force,
            motor_speed: def.motor_speed,
            enable_limit: def.enable_limit,
            enable_motor: def.enable_motor,
            limit_state: LimitState::Inactive,
        })
    }

    /// Current translation along the axis
    pub fn get_joint_translation(&self, b1: &Body, b2: &Body) -> f32 {
        let p1 = b1.get_world_point(self.local_anchor1);
        let p2 = b2.get_world_point(self.local_anchor2);
        let axis = b1.get_world_vector(self.local_x_axis1);
        axis.dot(&(p2 - p1))
    }

    /// Current translation speed along the axis
    pub fn get_joint_speed(&self, b1: &Body, b2: &Body) -> f32 {
        let r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
        let r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);
        let p1 = b1.sweep.c + r1;
        let p2 = b2.sweep.c + r2;
        let d = p2 - p1;
        let axis = b1.get_world_vector(self.local_x_axis1);

        let v1 = b1.linear_velocity;
        let v2 = b2.linear_velocity;
        let w1 = b1.angular_velocity;
        let w2 = b2.angular_velocity;

        d.dot(&Vector2::scalar_cross(w1, &axis))
            + axis.dot(&(v2 + Vector2::scalar_cross(w2, &r2) - v1 - Vector2::scalar_cross(w1, &r1)))
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, flag: bool) {
        self.enable_limit = flag;
    }

    pub fn get_lower_limit(&self) -> f32 {
        self.lower_translation
    }

    pub fn get_upper_limit(&self) -> f32 {
        self.upper_translation
    }

    /// Sets the translation limits; `lower` must not exceed `upper`
    pub fn set_limits(&mut self, lower: f32, upper: f32) -> Result<()> {
        if lower > upper {
            return Err(PhysicsError::InvalidParameter(format!(
                "prismatic joint lower limit {lower} exceeds upper limit {upper}"
            )));
        }
        self.lower_translation = lower;
        self.upper_translation = upper;
        Ok(())
    }

    pub fn get_limit_state(&self) -> LimitState {
        self.limit_state
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    pub fn get_motor_speed(&self) -> f32 {
        self.motor_speed
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    pub fn set_max_motor_force(&mut self, force: f32) {
        self.max_motor_force = force.max(0.0);
    }

    /// Motor force applied during the last step
    pub fn get_motor_force(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }
}

impl Joint for PrismaticJoint {
    fn joint_type(&self) -> JointType {
        JointType::Prismatic
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
        (self.y_axis * self.linear_impulse + self.x_axis * (self.motor_impulse + self.limit_impulse)) * inv_dt
    }

    fn get_reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.angular_impulse
    }

    fn init_velocity_constraints(&mut self, step: &TimeStep, config: &SimulationConfig, b1: &mut Body, b2: &mut Body) {
        // Compute the effective masses.
        let r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
        let r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);
        let e = b2.sweep.c + r2 - b1.sweep.c;

        // Compute point to line constraint effective mass.
        // J = [-ay1 -cross(d + r1, ay1) ay1 cross(r2, ay1)]
        self.y_axis = b1.xf.rotation.rotate(self.local_y_axis1);
        self.linear_jacobian = Jacobian::new(-self.y_axis, -e.cross(&self.y_axis), self.y_axis, r2.cross(&self.y_axis));
        self.linear_mass = self.linear_jacobian.effective_mass(b1, b2);

        // Prismatic constraint.
        let k = b1.inv_inertia + b2.inv_inertia;
        self.angular_mass = if k > EPSILON { 1.0 / k } else { 0.0 };

        // Compute motor and limit terms.
        self.x_axis = b1.xf.rotation.rotate(self.local_x_axis1);
        if self.enable_limit || self.enable_motor {
            // The motor and limit share a Jacobian and effective mass.
            self.motor_jacobian = Jacobian::new(-self.x_axis, -e.cross(&self.x_axis), self.x_axis, r2.cross(&self.x_axis));
            self.motor_mass = self.motor_jacobian.effective_mass(b1, b2);

            if self.enable_limit {
                let d = e - r1;
                let joint_translation = self.x_axis.dot(&d);
                if (self.upper_translation - self.lower_translation).abs() < 2.0 * config.linear_slop {
                    self.limit_state = LimitState::Equal;
                } else if joint_translation <= self.lower_translation {
                    if self.limit_state != LimitState::AtLower {
                        self.limit_impulse = 0.0;
                    }
                    self.limit_state = LimitState::AtLower;
                } else if joint_translation >= self.upper_translation {
                    if self.limit_state != LimitState::AtUpper {
                        self.limit_impulse = 0.0;
                    }
                    self.limit_state = LimitState::AtUpper;
                } else {
                    self.limit_state = LimitState::Inactive;
                    self.limit_impulse = 0.0;
                }
            }
        }

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }
        if !self.enable_limit {
            self.limit_state = LimitState::Inactive;
            self.limit_impulse = 0.0;
        }

        if step.warm_starting {
            self.linear_impulse *= step.dt_ratio;
            self.angular_impulse *= step.dt_ratio;
            self.motor_impulse *= step.dt_ratio;
            self.limit_impulse *= step.dt_ratio;

            let axial = self.motor_impulse + self.limit_impulse;
            let lj = &self.linear_jacobian;
            let mj = &self.motor_jacobian;
            let p1 = lj.linear1 * self.linear_impulse + mj.linear1 * axial;
            let p2 = lj.linear2 * self.linear_impulse + mj.linear2 * axial;
            let l1 = self.linear_impulse * lj.angular1 - self.angular_impulse + axial * mj.angular1;
            let l2 = self.linear_impulse * lj.angular2 + self.angular_impulse + axial * mj.angular2;

            b1.linear_velocity += p1 * b1.inv_mass;
            b1.angular_velocity += b1.inv_inertia * l1;
            b2.linear_velocity += p2 * b2.inv_mass;
            b2.angular_velocity += b2.inv_inertia * l2;
        } else {
            self.linear_impulse = 0.0;
            self.angular_impulse = 0.0;
            self.limit_impulse = 0.0;
            self.motor_impulse = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, step: &TimeStep, b1: &mut Body, b2: &mut Body) {
        // Solve linear constraint.
        let linear_cdot = self.linear_jacobian.compute(
            b1.linear_velocity,
            b1.angular_velocity,
            b2.linear_velocity,
            b2.angular_velocity,
        );
        let impulse = -self.linear_mass * linear_cdot;
        self.linear_impulse += impulse;
        self.linear_jacobian.apply_velocity(b1, b2, impulse);

        // Solve angular constraint.
        let angular_cdot = b2.angular_velocity - b1.angular_velocity;
        let impulse = -self.angular_mass * angular_cdot;
        self.angular_impulse += impulse;
        b1.angular_velocity -= b1.inv_inertia * impulse;
        b2.angular_velocity += b2.inv_inertia * impulse;

        // Solve linear motor constraint.
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let motor_cdot = self.motor_jacobian.compute(
                b1.linear_velocity,
                b1.angular_velocity,
                b2.linear_velocity,
                b2.angular_velocity,
            ) - self.motor_speed;
            let impulse = -self.motor_mass * motor_cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = step.dt * self.max_motor_force;
            self.motor_impulse = clamp(self.motor_impulse + impulse, -max_impulse, max_impulse);
            let impulse = self.motor_impulse - old_impulse;
            self.motor_jacobian.apply_velocity(b1, b2, impulse);
        }

        // Solve linear limit constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let limit_cdot = self.motor_jacobian.compute(
                b1.linear_velocity,
                b1.angular_velocity,
                b2.linear_velocity,
                b2.angular_velocity,
            );
            let mut impulse = -self.motor_mass * limit_cdot;

            match self.limit_state {
                LimitState::Equal => {
                    self.limit_impulse += impulse;
                }
                LimitState::AtLower => {
                    let old_impulse = self.limit_impulse;
                    self.limit_impulse = (self.limit_impulse + impulse).max(0.0);
                    impulse = self.limit_impulse - old_impulse;
                }
                LimitState::AtUpper => {
                    let old_impulse = self.limit_impulse;
                    self.limit_impulse = (self.limit_impulse + impulse).min(0.0);
                    impulse = self.limit_impulse - old_impulse;
                }
                LimitState::Inactive => {}
            }

            self.motor_jacobian.apply_velocity(b1, b2, impulse);
        }
    }

    fn init_position_constraints(&mut self) {
        self.limit_position_impulse = 0.0;
    }

    fn solve_position_constraints(&mut self, config: &SimulationConfig, b1: &mut Body, b2: &mut Body) -> bool {
        let max_linear = config.max_linear_correction;
        let max_angular = config.max_angular_correction;

        // Solve linear (point-to-line) constraint.
        let r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
        let r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);
        let d = b2.sweep.c + r2 - b1.sweep.c - r1;
        let y_axis = b1.xf.rotation.rotate(self.local_y_axis1);

        let linear_c = clamp(y_axis.dot(&d), -max_linear, max_linear);
        let linear_impulse = -self.linear_mass * linear_c;
        self.linear_jacobian.apply_position(b1, b2, linear_impulse);
        let mut position_error = linear_c.abs();

        // Solve angular constraint.
        let angular_c = clamp(b2.sweep.a - b1.sweep.a - self.reference_angle, -max_angular, max_angular);
        let angular_impulse = -self.angular_mass * angular_c;
        b1.sweep.a -= b1.inv_inertia * angular_impulse;
        b2.sweep.a += b2.inv_inertia * angular_impulse;

        b1.synchronize_transform();
        b2.synchronize_transform();

        let angular_error = angular_c.abs();

        // Solve linear limit constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive {
            let r1 = b1.xf.rotation.rotate(self.local_anchor1 - b1.sweep.local_center);
            let r2 = b2.xf.rotation.rotate(self.local_anchor2 - b2.sweep.local_center);
            let d = b2.sweep.c + r2 - b1.sweep.c - r1;
            let x_axis = b1.xf.rotation.rotate(self.local_x_axis1);

            let translation = x_axis.dot(&d);
            let mut limit_impulse = 0.0;

            match self.limit_state {
                LimitState::Equal => {
                    // Prevent large angular corrections.
                    let limit_c = clamp(translation - self.lower_translation, -max_linear, max_linear);
                    limit_impulse = -self.motor_mass * limit_c;
                    position_error = position_error.max(limit_c.abs());
                }
                LimitState::AtLower => {
                    let limit_c = translation - self.lower_translation;
                    position_error = position_error.max(-limit_c);

                    // Prevent large linear corrections and allow some slop.
                    let limit_c = clamp(limit_c + config.linear_slop, -max_linear, 0.0);
                    limit_impulse = -self.motor_mass * limit_c;
                    let old = self.limit_position_impulse;
                    self.limit_position_impulse = (self.limit_position_impulse + limit_impulse).max(0.0);
                    limit_impulse = self.limit_position_impulse - old;
                }
                LimitState::AtUpper => {
                    let limit_c = translation - self.upper_translation;
                    position_error = position_error.max(limit_c);

                    // Prevent large linear corrections and allow some slop.
                    let limit_c = clamp(limit_c - config.linear_slop, 0.0, max_linear);
                    limit_impulse = -self.motor_mass * limit_c;
                    let old = self.limit_position_impulse;
                    self.limit_position_impulse = (self.limit_position_impulse + limit_impulse).min(0.0);
                    limit_impulse = self.limit_position_impulse - old;
                }
                LimitState::Inactive => {}
            }

            self.motor_jacobian.apply_position(b1, b2, limit_impulse);
            b1.synchronize_transform();
            b2.synchronize_transform();
        }

        position_error <= config.linear_slop && angular_error <= config.angular_slop
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
