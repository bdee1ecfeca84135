use crate::bodies::{BodyFlags, BodyType};
use crate::core::{BodyHandle, ContactHandle, JointHandle, ShapeHandle};
use crate::math::{Rotation2, Sweep, Transform2, Vector2};
use crate::shapes::MassData;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

/// Describes a body to be created by the world
///
/// Bodies start static; give them mass through `mass_data` or by attaching
/// shapes with density and calling `World::set_mass_from_shapes`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct BodyDef {
    /// World position of the body origin
    pub position: Vector2,

    /// World angle in radians
    pub angle: f32,

    /// Reduces linear velocity; zero means no damping
    pub linear_damping: f32,

    /// Reduces angular velocity; zero means no damping
    pub angular_damping: f32,

    /// Whether the body may fall asleep when at rest
    pub allow_sleep: bool,

    /// Whether the body starts asleep
    pub is_sleeping: bool,

    /// Prevents the body from rotating
    pub fixed_rotation: bool,

    /// Enables continuous collision against other dynamic bodies
    pub is_bullet: bool,

    /// Mass properties applied at creation, inertia about the body origin
    pub mass_data: Option<MassData>,

    /// Application-specific data
    pub user_data: u64,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            position: Vector2::zero(),
            angle: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            is_sleeping: false,
            fixed_rotation: false,
            is_bullet: false,
            mass_data: None,
            user_data: 0,
        }
    }
}

impl BodyDef {
    /// Creates a definition at the given position
    pub fn at(position: Vector2) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Sets the initial angle
    pub fn with_angle(mut self, angle: f32) -> Self {
        self.angle = angle;
        self
    }

    /// Supplies mass properties directly
    pub fn with_mass(mut self, mass_data: MassData) -> Self {
        self.mass_data = Some(mass_data);
        self
    }

    /// Marks the body as a bullet
    pub fn with_bullet(mut self, is_bullet: bool) -> Self {
        self.is_bullet = is_bullet;
        self
    }

    /// Sets the damping coefficients
    pub fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }
}

/// A contact touching a body, with the body on the other side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContactEdge {
    pub contact: ContactHandle,
    pub other: BodyHandle,
}

/// A joint attached to a body, with the body on the other side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JointEdge {
    pub joint: JointHandle,
    pub other: BodyHandle,
}

/// A rigid body for physics simulation
///
/// Bodies are owned by the world and addressed through a `BodyHandle`.
/// Shapes, contacts and joints refer back to them by handle.
#[derive(Debug, Clone)]
pub struct Body {
    pub(crate) flags: BodyFlags,

    /// Transform of the body origin
    pub(crate) xf: Transform2,

    /// Center-of-mass motion over the current step
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vector2,
    pub(crate) angular_velocity: f32,

    /// Force and torque accumulated until the next step
    pub(crate) force: Vector2,
    pub(crate) torque: f32,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,

    /// Rotational inertia about the center of mass
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,

    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,

    /// How long the body has been inactive
    pub(crate) sleep_time: f32,

    pub(crate) shapes: Vec<ShapeHandle>,
    pub(crate) contact_edges: Vec<ContactEdge>,
    pub(crate) joint_edges: Vec<JointEdge>,

    user_data: u64,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let mut flags = BodyFlags::empty();
        if def.allow_sleep {
            flags.insert(BodyFlags::ALLOW_SLEEP);
        }
        if def.is_sleeping {
            flags.insert(BodyFlags::SLEEPING);
        }
        if def.fixed_rotation {
            flags.insert(BodyFlags::FIXED_ROTATION);
        }
        if def.is_bullet {
            flags.insert(BodyFlags::BULLET);
        }

        let xf = Transform2::from_position_angle(def.position, def.angle);
        let mut body = Self {
            flags,
            xf,
            sweep: Sweep::at_rest(Vector2::zero(), &xf),
            linear_velocity: Vector2::zero(),
            angular_velocity: 0.0,
            force: Vector2::zero(),
            torque: 0.0,
            mass: 0.0,
            inv_mass: 0.0,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            sleep_time: 0.0,
            shapes: Vec::new(),
            contact_edges: Vec::new(),
            joint_edges: Vec::new(),
            user_data: def.user_data,
        };

        if let Some(mass_data) = def.mass_data {
            body.set_mass_data(&mass_data);
        }

        body
    }

    /// Applies mass properties whose inertia is about the body origin
    ///
    /// A non-positive mass makes the body static.
    pub(crate) fn set_mass_data(&mut self, mass_data: &MassData) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;

        let mut center = Vector2::zero();
        if mass_data.mass > 0.0 && mass_data.mass.is_finite() {
            self.mass = mass_data.mass;
            self.inv_mass = 1.0 / self.mass;
            center = mass_data.center;

            // Shift the inertia to the center of mass.
            let inertia = mass_data.inertia - self.mass * center.length_squared();
            if inertia > 0.0 && !self.flags.contains(BodyFlags::FIXED_ROTATION) {
                self.inertia = inertia;
                self.inv_inertia = 1.0 / inertia;
            }
        }

        // Move center of mass.
        self.sweep.local_center = center;
        let c = self.xf.transform_point(center);
        self.sweep.c0 = c;
        self.sweep.c = c;

        if self.is_static() {
            self.linear_velocity = Vector2::zero();
            self.angular_velocity = 0.0;
        }
    }

    /// Recomputes the transform from the end of the sweep
    pub(crate) fn synchronize_transform(&mut self) {
        let rotation = Rotation2::new(self.sweep.a);
        self.xf = Transform2::new(self.sweep.c - rotation.rotate(self.sweep.local_center), rotation);
    }

    /// Moves the body to fraction `t` of the step and collapses the sweep there
    pub(crate) fn advance(&mut self, t: f32) {
        self.sweep.advance(t);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    /// Places the body origin without touching velocities
    pub(crate) fn set_transform_internal(&mut self, position: Vector2, angle: f32) {
        self.xf = Transform2::from_position_angle(position, angle);
        let c = self.xf.transform_point(self.sweep.local_center);
        self.sweep.c0 = c;
        self.sweep.c = c;
        self.sweep.a0 = angle;
        self.sweep.a = angle;
    }

    /// Stops the body and takes it out of the simulation
    pub(crate) fn freeze(&mut self) {
        self.flags.insert(BodyFlags::FROZEN);
        self.linear_velocity = Vector2::zero();
        self.angular_velocity = 0.0;
    }

    /// Returns the body type implied by the mass
    pub fn get_type(&self) -> BodyType {
        if self.inv_mass == 0.0 {
            BodyType::Static
        } else {
            BodyType::Dynamic
        }
    }

    /// Checks if the body is static
    #[inline]
    pub fn is_static(&self) -> bool {
        self.inv_mass == 0.0
    }

    /// Checks if the body is dynamic
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.inv_mass > 0.0
    }

    /// Gets the transform of the body origin
    pub fn get_transform(&self) -> Transform2 {
        self.xf
    }

    /// Gets the position of the body origin
    pub fn get_position(&self) -> Vector2 {
        self.xf.position
    }

    /// Gets the body angle in radians
    pub fn get_angle(&self) -> f32 {
        self.sweep.a
    }

    /// Gets the world position of the center of mass
    pub fn get_world_center(&self) -> Vector2 {
        self.sweep.c
    }

    /// Gets the center of mass in body coordinates
    pub fn get_local_center(&self) -> Vector2 {
        self.sweep.local_center
    }

    /// Gets the sweep of the current step
    pub fn get_sweep(&self) -> &Sweep {
        &self.sweep
    }

    /// Gets the linear velocity of the center of mass
    pub fn get_linear_velocity(&self) -> Vector2 {
        self.linear_velocity
    }

    /// Sets the linear velocity of the center of mass
    pub fn set_linear_velocity(&mut self, velocity: Vector2) {
        if self.is_dynamic() {
            self.linear_velocity = velocity;
        }
    }

    /// Gets the angular velocity in radians per second
    pub fn get_angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    /// Sets the angular velocity in radians per second
    pub fn set_angular_velocity(&mut self, omega: f32) {
        if self.is_dynamic() {
            self.angular_velocity = omega;
        }
    }

    /// Gets the mass of the body
    pub fn get_mass(&self) -> f32 {
        self.mass
    }

    /// Gets the inverse mass of the body
    pub fn get_inverse_mass(&self) -> f32 {
        self.inv_mass
    }

    /// Gets the rotational inertia about the center of mass
    pub fn get_inertia(&self) -> f32 {
        self.inertia
    }

    /// Gets the inverse rotational inertia
    pub fn get_inverse_inertia(&self) -> f32 {
        self.inv_inertia
    }

    /// Gets the linear damping coefficient
    pub fn get_linear_damping(&self) -> f32 {
        self.linear_damping
    }

    /// Sets the linear damping coefficient
    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    /// Gets the angular damping coefficient
    pub fn get_angular_damping(&self) -> f32 {
        self.angular_damping
    }

    /// Sets the angular damping coefficient
    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping;
    }

    /// Gets the user data
    pub fn get_user_data(&self) -> u64 {
        self.user_data
    }

    /// Sets the user data
    pub fn set_user_data(&mut self, user_data: u64) {
        self.user_data = user_data;
    }

    /// Gets the shapes attached to the body
    pub fn get_shapes(&self) -> &[ShapeHandle] {
        &self.shapes
    }

    /// Gets the contacts touching the body
    pub fn get_contact_edges(&self) -> &[ContactEdge] {
        &self.contact_edges
    }

    /// Gets the joints attached to the body
    pub fn get_joint_edges(&self) -> &[JointEdge] {
        &self.joint_edges
    }

    /// Gets the body flags
    pub fn get_flags(&self) -> BodyFlags {
        self.flags
    }

    /// Checks if the body is a bullet
    pub fn is_bullet(&self) -> bool {
        self.flags.contains(BodyFlags::BULLET)
    }

    /// Marks the body as a bullet
    pub fn set_bullet(&mut self, flag: bool) {
        self.flags.set(BodyFlags::BULLET, flag);
    }

    /// Checks if the body is sleeping
    pub fn is_sleeping(&self) -> bool {
        self.flags.contains(BodyFlags::SLEEPING)
    }

    /// Checks if the body left the world and was frozen
    pub fn is_frozen(&self) -> bool {
        self.flags.contains(BodyFlags::FROZEN)
    }

    /// Checks if the body never rotates
    pub fn is_fixed_rotation(&self) -> bool {
        self.flags.contains(BodyFlags::FIXED_ROTATION)
    }

    /// Checks if the body may sleep
    pub fn can_sleep(&self) -> bool {
        self.flags.contains(BodyFlags::ALLOW_SLEEP)
    }

    /// Allows or forbids sleeping; forbidding also wakes the body
    pub fn set_can_sleep(&mut self, flag: bool) {
        self.flags.set(BodyFlags::ALLOW_SLEEP, flag);
        if !flag {
            self.wake_up();
        }
    }

    /// Wakes the body so it is simulated again
    pub fn wake_up(&mut self) {
        self.flags.remove(BodyFlags::SLEEPING);
        self.sleep_time = 0.0;
    }

    /// Puts the body to sleep, zeroing its motion
    pub fn put_to_sleep(&mut self) {
        self.flags.insert(BodyFlags::SLEEPING);
        self.sleep_time = 0.0;
        self.linear_velocity = Vector2::zero();
        self.angular_velocity = 0.0;
        self.force = Vector2::zero();
        self.torque = 0.0;
    }

    /// Applies a force at a world point, waking the body
    pub fn apply_force(&mut self, force: Vector2, point: Vector2) {
        if !self.is_dynamic() {
            return;
        }
        self.wake_up();
        self.force += force;
        self.torque += (point - self.sweep.c).cross(&force);
    }

    /// Applies a torque, waking the body
    pub fn apply_torque(&mut self, torque: f32) {
        if !self.is_dynamic() {
            return;
        }
        self.wake_up();
        self.torque += torque;
    }

    /// Applies an impulse at a world point, changing the velocity immediately
    pub fn apply_impulse(&mut self, impulse: Vector2, point: Vector2) {
        if !self.is_dynamic() {
            return;
        }
        self.wake_up();
        self.linear_velocity += impulse * self.inv_mass;
        self.angular_velocity += self.inv_inertia * (point - self.sweep.c).cross(&impulse);
    }

    /// Converts a body point to world coordinates
    pub fn get_world_point(&self, local_point: Vector2) -> Vector2 {
        self.xf.transform_point(local_point)
    }

    /// Converts a body vector to world coordinates
    pub fn get_world_vector(&self, local_vector: Vector2) -> Vector2 {
        self.xf.transform_vector(local_vector)
    }

    /// Converts a world point to body coordinates
    pub fn get_local_point(&self, world_point: Vector2) -> Vector2 {
        self.xf.inverse_transform_point(world_point)
    }

    /// Converts a world vector to body coordinates
    pub fn get_local_vector(&self, world_vector: Vector2) -> Vector2 {
        self.xf.inverse_transform_vector(world_vector)
    }

    /// Gets the velocity of a world point attached to the body
    pub fn get_linear_velocity_from_world_point(&self, world_point: Vector2) -> Vector2 {
        self.linear_velocity + Vector2::scalar_cross(self.angular_velocity, &(world_point - self.sweep.c))
    }

    /// Gets the velocity of a body point
    pub fn get_linear_velocity_from_local_point(&self, local_point: Vector2) -> Vector2 {
        self.get_linear_velocity_from_world_point(self.get_world_point(local_point))
    }

    /// Kinetic energy of the body
    pub fn get_kinetic_energy(&self) -> f32 {
        0.5 * self.mass * self.linear_velocity.length_squared()
            + 0.5 * self.inertia * self.angular_velocity * self.angular_velocity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mass_shift_to_center() {
        // A unit point mass one meter from the origin has no inertia about its center.
        let def = BodyDef::default().with_mass(MassData {
            mass: 2.0,
            center: Vector2::new(1.0, 0.0),
            inertia: 2.5,
        });
        let body = Body::new(&def);

        assert!(body.is_dynamic());
        assert_relative_eq!(body.get_inertia(), 0.5);
        assert_relative_eq!(body.get_world_center().x, 1.0);
    }

    #[test]
    fn test_fixed_rotation_has_no_inverse_inertia() {
        let mut def = BodyDef::default().with_mass(MassData {
            mass: 1.0,
            center: Vector2::zero(),
            inertia: 1.0,
        });
        def.fixed_rotation = true;
        let mut body = Body::new(&def);

        assert_eq!(body.get_inverse_inertia(), 0.0);
        body.apply_impulse(Vector2::new(0.0, 1.0), Vector2::new(1.0, 0.0));
        assert_eq!(body.get_angular_velocity(), 0.0);
        assert_relative_eq!(body.get_linear_velocity().y, 1.0);
    }

    #[test]
    fn test_static_ignores_forces() {
        let mut body = Body::new(&BodyDef::default());
        assert!(body.is_static());
        body.apply_force(Vector2::new(10.0, 0.0), Vector2::zero());
        assert_eq!(body.force, Vector2::zero());
        assert_eq!(body.get_type(), BodyType::Static);
    }
}
