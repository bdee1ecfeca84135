use crate::bodies::{Body, BodyFlags};
use crate::collision::ContactSolver;
use crate::constraints::Joint;
use crate::core::config::{SimulationConfig, TimeStep};
use crate::core::listeners::{ContactResult, ListenerSlot};
use crate::core::{Arena, BodyHandle, Contact, ContactHandle, JointHandle, Storage};
use crate::math::{clamp, Vector2};

/// The arenas an island solve reads and writes
pub(crate) struct SolverSet<'a> {
    pub bodies: &'a mut Arena<Body, BodyHandle>,
    pub contacts: &'a mut Arena<Contact, ContactHandle>,
    pub joints: &'a mut Arena<Box<dyn Joint>, JointHandle>,
    pub config: &'a SimulationConfig,
}

/// A group of bodies connected through touching contacts and joints
///
/// Islands are built once per step and solved independently.
#[derive(Debug, Default, Clone)]
pub(crate) struct Island {
    pub bodies: Vec<BodyHandle>,
    pub contacts: Vec<ContactHandle>,
    pub joints: Vec<JointHandle>,

    /// Maximum number of contacts, unbounded when `None`
    contact_capacity: Option<usize>,
}

impl Island {
    /// Creates an island that accepts at most `capacity` contacts
    pub fn with_contact_capacity(capacity: usize) -> Self {
        Self {
            contact_capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// Returns true when no more contacts fit
    pub fn is_contact_full(&self) -> bool {
        self.contact_capacity.map_or(false, |cap| self.contacts.len() >= cap)
    }

    /// Integrates, solves constraints and updates sleep state for one step
    pub fn solve(&self, set: &mut SolverSet<'_>, step: &TimeStep, listener: ListenerSlot<'_>) {
        let config = set.config;

        // Integrate velocities and apply damping.
        for &handle in &self.bodies {
            let Some(b) = set.bodies.get_mut(handle) else { continue };
            if b.is_static() {
                continue;
            }

            b.linear_velocity += (config.gravity + b.force * b.inv_mass) * step.dt;
            b.angular_velocity += step.dt * b.inv_inertia * b.torque;

            // Reset forces.
            b.force = Vector2::zero();
            b.torque = 0.0;

            // Apply damping.
            b.linear_velocity *= clamp(1.0 - step.dt * b.linear_damping, 0.0, 1.0);
            b.angular_velocity *= clamp(1.0 - step.dt * b.angular_damping, 0.0, 1.0);

            clamp_velocities(b, config);
        }

        let mut contact_solver = ContactSolver::new(step, &self.contacts, set.contacts, set.bodies, config);

        // Initialize velocity constraints.
        contact_solver.init_velocity_constraints(step, set.bodies);
        for &handle in &self.joints {
            with_joint(set, handle, |joint, b1, b2| joint.init_velocity_constraints(step, config, b1, b2));
        }

        // Solve velocity constraints.
        for _ in 0..step.velocity_iterations {
            contact_solver.solve_velocity_constraints(set.bodies);
            for &handle in &self.joints {
                with_joint(set, handle, |joint, b1, b2| joint.solve_velocity_constraints(step, b1, b2));
            }
        }

        // Post-solve (store impulses for warm starting).
        contact_solver.finalize_velocity_constraints(set.contacts);

        // Integrate positions.
        integrate_positions(&self.bodies, set.bodies, step.dt);

        if config.position_correction {
            for &handle in &self.joints {
                if let Some(joint) = set.joints.get_mut(handle) {
                    joint.init_position_constraints();
                }
            }

            for _ in 0..step.position_iterations {
                let contacts_okay = contact_solver.solve_position_constraints(set.bodies, config.contact_baumgarte);

                let mut joints_okay = true;
                for &handle in &self.joints {
                    let joint_okay = with_joint(set, handle, |joint, b1, b2| {
                        joint.solve_position_constraints(config, b1, b2)
                    })
                    .unwrap_or(true);
                    joints_okay = joints_okay && joint_okay;
                }

                if contacts_okay && joints_okay {
                    break;
                }
            }
        }

        report(&contact_solver, set, listener);

        if config.allow_sleep {
            self.update_sleep(set.bodies, config, step.dt);
        }
    }

    /// Solves a time-of-impact sub-step without warm starting
    pub fn solve_toi(&self, set: &mut SolverSet<'_>, sub_step: &TimeStep, listener: ListenerSlot<'_>) {
        let config = set.config;
        let mut contact_solver = ContactSolver::new(sub_step, &self.contacts, set.contacts, set.bodies, config);

        // No warm starting is needed for TOI events.
        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(set.bodies);
        }

        // Don't store the TOI contact impulses for warm starting
        // because they can be quite large.

        integrate_positions(&self.bodies, set.bodies, sub_step.dt);

        for _ in 0..sub_step.position_iterations {
            if contact_solver.solve_position_constraints(set.bodies, config.toi_baumgarte) {
                break;
            }
        }

        report(&contact_solver, set, listener);
    }

    /// Puts the island to sleep once every body has rested long enough
    fn update_sleep(&self, bodies: &mut Arena<Body, BodyHandle>, config: &SimulationConfig, dt: f32) {
        let mut min_sleep_time = f32::MAX;

        let lin_tol_sqr = config.linear_sleep_tolerance * config.linear_sleep_tolerance;
        let ang_tol_sqr = config.angular_sleep_tolerance * config.angular_sleep_tolerance;

        for &handle in &self.bodies {
            let Some(b) = bodies.get_mut(handle) else { continue };
            if b.is_static() {
                continue;
            }

            if !b.flags.contains(BodyFlags::ALLOW_SLEEP)
                || b.angular_velocity * b.angular_velocity > ang_tol_sqr
                || b.linear_velocity.length_squared() > lin_tol_sqr
            {
                b.sleep_time = 0.0;
                min_sleep_time = 0.0;
            } else {
                b.sleep_time += dt;
                min_sleep_time = min_sleep_time.min(b.sleep_time);
            }
        }

        if min_sleep_time >= config.time_to_sleep {
            for &handle in &self.bodies {
                if let Some(b) = bodies.get_mut(handle) {
                    b.flags.insert(BodyFlags::SLEEPING);
                    b.linear_velocity = Vector2::zero();
                    b.angular_velocity = 0.0;
                }
            }
        }
    }
}

/// Caps linear and angular speed
fn clamp_velocities(b: &mut Body, config: &SimulationConfig) {
    let max_linear = config.max_linear_velocity;
    if b.linear_velocity.length_squared() > max_linear * max_linear {
        b.linear_velocity = b.linear_velocity.normalize() * max_linear;
    }

    let max_angular = config.max_angular_velocity;
    if b.angular_velocity * b.angular_velocity > max_angular * max_angular {
        b.angular_velocity = max_angular.copysign(b.angular_velocity);
    }
}

/// Stores the sweep start and moves every dynamic body by its velocity
fn integrate_positions(handles: &[BodyHandle], bodies: &mut Arena<Body, BodyHandle>, dt: f32) {
    for &handle in handles {
        let Some(b) = bodies.get_mut(handle) else { continue };
        if b.is_static() {
            continue;
        }

        b.sweep.c0 = b.sweep.c;
        b.sweep.a0 = b.sweep.a;

        b.sweep.c += b.linear_velocity * dt;
        b.sweep.a += dt * b.angular_velocity;

        // Shapes are synchronized later.
        b.synchronize_transform();
    }
}

/// Runs `f` on a joint with both of its bodies borrowed mutably
fn with_joint<R>(
    set: &mut SolverSet<'_>,
    handle: JointHandle,
    f: impl FnOnce(&mut dyn Joint, &mut Body, &mut Body) -> R,
) -> Option<R> {
    let joint = set.joints.get_mut(handle)?;
    let (b1, b2) = set.bodies.get2_mut(joint.get_body1(), joint.get_body2())?;
    Some(f(&mut **joint, b1, b2))
}

/// Sends the solved impulses to the listener
fn report(solver: &ContactSolver, set: &SolverSet<'_>, listener: ListenerSlot<'_>) {
    let Some(listener) = listener else { return };

    for solved in solver.solved_points() {
        let Some(contact) = set.contacts.get(solved.contact) else { continue };
        let Some(b1) = set.bodies.get(contact.body1) else { continue };
        let Some(manifold) = contact.manifolds.as_slice().get(solved.manifold_index) else { continue };
        let Some(point) = manifold.points().get(solved.point_index) else { continue };

        listener.result(&ContactResult {
            shape1: contact.shape1,
            shape2: contact.shape2,
            position: b1.get_world_point(point.local_point1),
            normal: solved.normal,
            normal_impulse: solved.normal_impulse,
            tangent_impulse: solved.tangent_impulse,
            id: point.id,
        });
    }
}
