use crate::bodies::Body;
use crate::core::config::{SimulationConfig, TimeStep, MAX_MANIFOLD_POINTS};
use crate::core::{Arena, BodyHandle, Contact, ContactHandle, Storage};
use crate::math::{clamp, Vector2};

/// Per-point data of a contact constraint
#[derive(Debug, Clone, Copy, Default)]
struct ContactConstraintPoint {
    /// Anchors relative to each body origin
    local_anchor1: Vector2,
    local_anchor2: Vector2,

    /// Anchors relative to each center of mass, in world orientation
    r1: Vector2,
    r2: Vector2,

    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,

    /// Mass used by the position pass, treating every dynamic body as unit mass
    equalized_mass: f32,

    separation: f32,
    velocity_bias: f32,
}

/// A manifold prepared for solving
#[derive(Debug, Clone, Copy)]
struct ContactConstraint {
    points: [ContactConstraintPoint; MAX_MANIFOLD_POINTS],
    point_count: usize,
    normal: Vector2,
    body1: BodyHandle,
    body2: BodyHandle,
    contact: ContactHandle,
    manifold_index: usize,
    friction: f32,
    restitution: f32,
}

/// Sequential impulse solver for the contacts of one island
///
/// Each manifold becomes one constraint. Normal impulses are clamped to stay
/// non-negative and friction impulses to the box `±friction * normal_impulse`.
pub(crate) struct ContactSolver {
    constraints: Vec<ContactConstraint>,
    velocity_threshold: f32,
    linear_slop: f32,
    max_linear_correction: f32,
}

impl ContactSolver {
    /// Builds constraints for every solid manifold of the given contacts
    pub(crate) fn new(
        step: &TimeStep,
        contact_handles: &[ContactHandle],
        contacts: &Arena<Contact, ContactHandle>,
        bodies: &Arena<Body, BodyHandle>,
        config: &SimulationConfig,
    ) -> Self {
        let mut solver = Self {
            constraints: Vec::with_capacity(contact_handles.len()),
            velocity_threshold: config.velocity_threshold,
            linear_slop: config.linear_slop,
            max_linear_correction: config.max_linear_correction,
        };

        for &handle in contact_handles {
            let Some(contact) = contacts.get(handle) else { continue };
            let (Some(b1), Some(b2)) = (bodies.get(contact.body1), bodies.get(contact.body2)) else {
                continue;
            };

            for (manifold_index, manifold) in contact.manifolds.iter().enumerate() {
                let normal = manifold.normal;
                let tangent = normal.cross_scalar(1.0);
                let mut constraint = ContactConstraint {
                    points: [ContactConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                    point_count: manifold.point_count,
                    normal,
                    body1: contact.body1,
                    body2: contact.body2,
                    contact: handle,
                    manifold_index,
                    friction: contact.friction,
                    restitution: contact.restitution,
                };

                for (cp, mp) in constraint.points.iter_mut().zip(manifold.points()) {
                    let r1 = b1.xf.rotation.rotate(mp.local_point1 - b1.sweep.local_center);
                    let r2 = b2.xf.rotation.rotate(mp.local_point2 - b2.sweep.local_center);

                    let rn1 = r1.cross(&normal);
                    let rn2 = r2.cross(&normal);
                    let k_normal = b1.inv_mass + b2.inv_mass + b1.inv_inertia * rn1 * rn1 + b2.inv_inertia * rn2 * rn2;

                    let k_equalized = b1.mass * b1.inv_mass
                        + b2.mass * b2.inv_mass
                        + b1.mass * b1.inv_inertia * rn1 * rn1
                        + b2.mass * b2.inv_inertia * rn2 * rn2;

                    let rt1 = r1.cross(&tangent);
                    let rt2 = r2.cross(&tangent);
                    let k_tangent = b1.inv_mass + b2.inv_mass + b1.inv_inertia * rt1 * rt1 + b2.inv_inertia * rt2 * rt2;

                    // Relative velocity at the contact, used for restitution.
                    let dv = b2.linear_velocity + Vector2::scalar_cross(b2.angular_velocity, &r2)
                        - b1.linear_velocity
                        - Vector2::scalar_cross(b1.angular_velocity, &r1);
                    let v_rel = normal.dot(&dv);

                    let mut velocity_bias = 0.0;
                    if mp.separation > 0.0 {
                        velocity_bias = -step.inv_dt * mp.separation;
                    }
                    if v_rel < -solver.velocity_threshold {
                        velocity_bias += -constraint.restitution * v_rel;
                    }

                    *cp = ContactConstraintPoint {
                        local_anchor1: mp.local_point1,
                        local_anchor2: mp.local_point2,
                        r1,
                        r2,
                        normal_impulse: mp.normal_impulse,
                        tangent_impulse: mp.tangent_impulse,
                        normal_mass: inverse_or_zero(k_normal),
                        tangent_mass: inverse_or_zero(k_tangent),
                        equalized_mass: inverse_or_zero(k_equalized),
                        separation: mp.separation,
                        velocity_bias,
                    };
                }

                solver.constraints.push(constraint);
            }
        }

        solver
    }

    /// Number of manifold constraints
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// Applies the carried impulses, or clears them when warm starting is off
    pub(crate) fn init_velocity_constraints(&mut self, step: &TimeStep, bodies: &mut Arena<Body, BodyHandle>) {
        for c in &mut self.constraints {
            let Some((b1, b2)) = bodies.get2_mut(c.body1, c.body2) else { continue };
            let normal = c.normal;
            let tangent = normal.cross_scalar(1.0);

            for cp in &mut c.points[..c.point_count] {
                if step.warm_starting {
                    cp.normal_impulse *= step.dt_ratio;
                    cp.tangent_impulse *= step.dt_ratio;

                    let p = normal * cp.normal_impulse + tangent * cp.tangent_impulse;
                    apply_impulse(b1, b2, cp.r1, cp.r2, p);
                } else {
                    cp.normal_impulse = 0.0;
                    cp.tangent_impulse = 0.0;
                }
            }
        }
    }

    /// Runs one sequential impulse sweep over all constraints
    pub(crate) fn solve_velocity_constraints(&mut self, bodies: &mut Arena<Body, BodyHandle>) {
        for c in &mut self.constraints {
            let Some((b1, b2)) = bodies.get2_mut(c.body1, c.body2) else { continue };
            let normal = c.normal;
            let tangent = normal.cross_scalar(1.0);

            // Solve normal constraints.
            for cp in &mut c.points[..c.point_count] {
                let dv = relative_velocity(b1, b2, cp.r1, cp.r2);
                let vn = dv.dot(&normal);
                let lambda = -cp.normal_mass * (vn - cp.velocity_bias);

                // Clamp the accumulated impulse.
                let new_impulse = (cp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - cp.normal_impulse;

                apply_impulse(b1, b2, cp.r1, cp.r2, normal * lambda);
                cp.normal_impulse = new_impulse;
            }

            // Solve tangent constraints.
            for cp in &mut c.points[..c.point_count] {
                let dv = relative_velocity(b1, b2, cp.r1, cp.r2);
                let vt = dv.dot(&tangent);
                let lambda = cp.tangent_mass * -vt;

                let max_friction = c.friction * cp.normal_impulse;
                let new_impulse = clamp(cp.tangent_impulse + lambda, -max_friction, max_friction);
                let lambda = new_impulse - cp.tangent_impulse;

                apply_impulse(b1, b2, cp.r1, cp.r2, tangent * lambda);
                cp.tangent_impulse = new_impulse;
            }
        }
    }

    /// Stores the accumulated impulses back into the manifolds for the next step
    pub(crate) fn finalize_velocity_constraints(&self, contacts: &mut Arena<Contact, ContactHandle>) {
        for c in &self.constraints {
            let Some(contact) = contacts.get_mut(c.contact) else { continue };
            let Some(manifold) = contact.manifolds.as_mut_slice().get_mut(c.manifold_index) else {
                continue;
            };
            for (mp, cp) in manifold.points_mut().iter_mut().zip(&c.points[..c.point_count]) {
                mp.normal_impulse = cp.normal_impulse;
                mp.tangent_impulse = cp.tangent_impulse;
            }
        }
    }

    /// Pushes penetrating bodies apart directly on their sweeps
    ///
    /// Returns true when the deepest remaining penetration is within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, bodies: &mut Arena<Body, BodyHandle>, baumgarte: f32) -> bool {
        let mut min_separation = 0.0f32;

        for c in &self.constraints {
            let Some((b1, b2)) = bodies.get2_mut(c.body1, c.body2) else { continue };
            let inv_mass1 = b1.mass * b1.inv_mass;
            let inv_i1 = b1.mass * b1.inv_inertia;
            let inv_mass2 = b2.mass * b2.inv_mass;
            let inv_i2 = b2.mass * b2.inv_inertia;
            let normal = c.normal;

            // Solve normal constraints.
            for cp in &c.points[..c.point_count] {
                let r1 = b1.xf.rotation.rotate(cp.local_anchor1 - b1.sweep.local_center);
                let r2 = b2.xf.rotation.rotate(cp.local_anchor2 - b2.sweep.local_center);

                let p1 = b1.sweep.c + r1;
                let p2 = b2.sweep.c + r2;
                let separation = (p2 - p1).dot(&normal) + cp.separation;

                // Track max constraint error.
                min_separation = min_separation.min(separation);

                // Prevent large corrections and allow slop.
                let correction = baumgarte * clamp(separation + self.linear_slop, -self.max_linear_correction, 0.0);
                let impulse = -cp.equalized_mass * correction;
                let p = normal * impulse;

                b1.sweep.c -= p * inv_mass1;
                b1.sweep.a -= inv_i1 * r1.cross(&p);
                b1.synchronize_transform();

                b2.sweep.c += p * inv_mass2;
                b2.sweep.a += inv_i2 * r2.cross(&p);
                b2.synchronize_transform();
            }
        }

        // We can't expect min_separation >= -linear_slop because we don't
        // push the separation above -linear_slop.
        min_separation >= -1.5 * self.linear_slop
    }

    /// Iterates over the solved points as (contact, manifold index, point index, normal, impulses)
    pub(crate) fn solved_points(&self) -> impl Iterator<Item = SolvedPoint> + '_ {
        self.constraints.iter().flat_map(|c| {
            c.points[..c.point_count].iter().enumerate().map(move |(i, cp)| SolvedPoint {
                contact: c.contact,
                manifold_index: c.manifold_index,
                point_index: i,
                normal: c.normal,
                normal_impulse: cp.normal_impulse,
                tangent_impulse: cp.tangent_impulse,
            })
        })
    }
}

/// Final impulses of one constraint point
#[derive(Debug, Clone, Copy)]
pub(crate) struct SolvedPoint {
    pub contact: ContactHandle,
    pub manifold_index: usize,
    pub point_index: usize,
    pub normal: Vector2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
}

#[inline]
fn inverse_or_zero(k: f32) -> f32 {
    if k > 0.0 {
        1.0 / k
    } else {
        0.0
    }
}

#[inline]
fn relative_velocity(b1: &Body, b2: &Body, r1: Vector2, r2: Vector2) -> Vector2 {
    b2.linear_velocity + Vector2::scalar_cross(b2.angular_velocity, &r2)
        - b1.linear_velocity
        - Vector2::scalar_cross(b1.angular_velocity, &r1)
}

/// Applies `p` to body2 and `-p` to body1 at the given arms
#[inline]
fn apply_impulse(b1: &mut Body, b2: &mut Body, r1: Vector2, r2: Vector2, p: Vector2) {
    b1.linear_velocity -= p * b1.inv_mass;
    b1.angular_velocity -= b1.inv_inertia * r1.cross(&p);

    b2.linear_velocity += p * b2.inv_mass;
    b2.angular_velocity += b2.inv_inertia * r2.cross(&p);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bodies::BodyDef;
    use crate::collision::{ContactId, Manifold, ManifoldPoint};
    use crate::shapes::{MassData, Shape, ShapeDef};
    use approx::assert_relative_eq;

    fn falling_pair() -> (Arena<Body, BodyHandle>, Arena<Contact, ContactHandle>, ContactHandle) {
        let mut bodies: Arena<Body, BodyHandle> = Arena::new();
        let ground = bodies.add(Body::new(&BodyDef::default()));
        let ball = bodies.add(Body::new(
            &BodyDef::at(Vector2::new(0.0, 1.0)).with_mass(MassData { mass: 1.0, center: Vector2::zero(), inertia: 1.0 }),
        ));
        if let Some(body) = bodies.get_mut(ball) {
            body.linear_velocity = Vector2::new(0.0, -3.0);
        }

        let def = ShapeDef::circle(1.0).unwrap().with_restitution(0.5);
        let s1 = Shape::new(&def, ground);
        let s2 = Shape::new(&def, ball);

        let mut shapes: Arena<Shape, crate::core::ShapeHandle> = Arena::new();
        let h1 = shapes.add(s1.clone());
        let h2 = shapes.add(s2.clone());

        let mut contact = Contact::new(h1, &s1, h2, &s2);
        let mut manifold = Manifold { normal: Vector2::new(0.0, 1.0), ..Manifold::default() };
        manifold.push(ManifoldPoint {
            local_point1: Vector2::zero(),
            local_point2: Vector2::new(0.0, -1.0),
            separation: 0.0,
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
            id: ContactId::default(),
        });
        contact.manifolds.push(manifold);

        let mut contacts: Arena<Contact, ContactHandle> = Arena::new();
        let handle = contacts.add(contact);
        (bodies, contacts, handle)
    }

    #[test]
    fn test_restitution_reverses_approach() {
        let (mut bodies, mut contacts, handle) = falling_pair();
        let step = TimeStep::new(1.0 / 60.0, 10, 8);
        let config = SimulationConfig::default();

        let mut solver = ContactSolver::new(&step, &[handle], &contacts, &bodies, &config);
        solver.init_velocity_constraints(&step, &mut bodies);
        for _ in 0..step.velocity_iterations {
            solver.solve_velocity_constraints(&mut bodies);
        }
        solver.finalize_velocity_constraints(&mut contacts);

        let ball = bodies.iter().map(|(_, b)| b).find(|b| b.is_dynamic()).unwrap();
        assert_relative_eq!(ball.linear_velocity.y, 1.5, epsilon = 1e-4);

        let stored = contacts.get(handle).unwrap().manifolds.as_slice()[0].points[0].normal_impulse;
        assert_relative_eq!(stored, 4.5, epsilon = 1e-4);
    }

    #[test]
    fn test_position_pass_separates() {
        let (mut bodies, mut contacts, handle) = falling_pair();
        if let Some(c) = contacts.get_mut(handle) {
            c.manifolds.as_mut_slice()[0].points[0].separation = -0.1;
        }
        let step = TimeStep::new(1.0 / 60.0, 10, 8);
        let config = SimulationConfig::default();
        let mut solver = ContactSolver::new(&step, &[handle], &contacts, &bodies, &config);

        let mut done = false;
        for _ in 0..50 {
            done = solver.solve_position_constraints(&mut bodies, config.contact_baumgarte);
            if done {
                break;
            }
        }
        assert!(done);

        let ball = bodies.iter().map(|(_, b)| b).find(|b| b.is_dynamic()).unwrap();
        assert!(ball.sweep.c.y > 1.09);
    }
}
