use bitflags::bitflags;

use crate::bodies::Body;
use crate::collision::{CollisionRegistry, ContactManifolds, ManifoldPoint};
use crate::core::config::{MAX_MANIFOLDS, MAX_MANIFOLD_POINTS};
use crate::core::listeners::{ContactListener, ContactPoint, ListenerSlot};
use crate::core::{BodyHandle, ShapeHandle};
use crate::math::Vector2;
use crate::shapes::Shape;

bitflags! {
    /// State bits of a contact
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct ContactFlags: u8 {
        /// One of the shapes is a sensor; the contact is reported but never solved
        const NON_SOLID = 0x01;

        /// Neither body is static or a bullet, so no time of impact is computed
        const SLOW = 0x02;

        /// Already added to the island under construction
        const ISLAND = 0x04;

        /// `toi` holds a valid cached time of impact
        const TOI = 0x08;
    }
}

/// A live pairing of two shapes whose proxies overlap
///
/// Contacts are created and destroyed by the broad phase; they hold the
/// manifolds of the current step and the impulses carried to the next one.
#[derive(Debug, Clone)]
pub struct Contact {
    pub(crate) flags: ContactFlags,
    pub(crate) shape1: ShapeHandle,
    pub(crate) shape2: ShapeHandle,
    pub(crate) body1: BodyHandle,
    pub(crate) body2: BodyHandle,
    pub(crate) manifolds: ContactManifolds,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) toi: f32,
}

impl Contact {
    pub(crate) fn new(
        shape1_handle: ShapeHandle,
        shape1: &Shape,
        shape2_handle: ShapeHandle,
        shape2: &Shape,
    ) -> Self {
        let mut flags = ContactFlags::empty();
        if shape1.is_sensor() || shape2.is_sensor() {
            flags.insert(ContactFlags::NON_SOLID);
        }

        Self {
            flags,
            shape1: shape1_handle,
            shape2: shape2_handle,
            body1: shape1.get_body(),
            body2: shape2.get_body(),
            manifolds: ContactManifolds::new(),
            friction: (shape1.get_friction() * shape2.get_friction()).sqrt(),
            restitution: shape1.get_restitution().max(shape2.get_restitution()),
            toi: 1.0,
        }
    }

    /// Returns the first shape
    pub fn get_shape1(&self) -> ShapeHandle {
        self.shape1
    }

    /// Returns the second shape
    pub fn get_shape2(&self) -> ShapeHandle {
        self.shape2
    }

    /// Returns the body of the first shape
    pub fn get_body1(&self) -> BodyHandle {
        self.body1
    }

    /// Returns the body of the second shape
    pub fn get_body2(&self) -> BodyHandle {
        self.body2
    }

    /// Returns the manifolds of the last update
    pub fn get_manifolds(&self) -> &ContactManifolds {
        &self.manifolds
    }

    pub fn get_flags(&self) -> ContactFlags {
        self.flags
    }

    pub fn get_friction(&self) -> f32 {
        self.friction
    }

    pub fn get_restitution(&self) -> f32 {
        self.restitution
    }

    /// Returns false for sensor contacts
    pub fn is_solid(&self) -> bool {
        !self.flags.contains(ContactFlags::NON_SOLID)
    }

    /// Returns true when the shapes produced at least one point
    pub fn is_touching(&self) -> bool {
        !self.manifolds.is_empty()
    }

    /// Recomputes the manifolds and carries impulses over matching feature ids
    pub(crate) fn update(
        &mut self,
        shape1: &Shape,
        body1: &mut Body,
        shape2: &Shape,
        body2: &mut Body,
        registry: &CollisionRegistry,
        mut listener: ListenerSlot<'_>,
    ) {
        let old_count = self.manifolds.len();
        let previous = self.manifolds;

        registry.collide(
            shape1.get_kind(),
            &body1.xf,
            shape2.get_kind(),
            &body2.xf,
            &previous,
            &mut self.manifolds,
        );

        let reporter = self.reporter();
        let mut matched = [false; MAX_MANIFOLDS * MAX_MANIFOLD_POINTS];
        for manifold in self.manifolds.as_mut_slice() {
            let normal = manifold.normal;
            let count = manifold.point_count;
            for point in &mut manifold.points[..count] {
                let old = previous
                    .iter()
                    .flat_map(|m| m.points().iter())
                    .enumerate()
                    .find(|(k, old)| !matched[*k] && old.id.key() == point.id.key());

                match old {
                    Some((k, old)) => {
                        matched[k] = true;
                        point.normal_impulse = old.normal_impulse;
                        point.tangent_impulse = old.tangent_impulse;
                        if let Some(listener) = listener.as_deref_mut() {
                            listener.persist(&reporter.point(normal, point, body1, body2));
                        }
                    }
                    None => {
                        point.normal_impulse = 0.0;
                        point.tangent_impulse = 0.0;
                        if let Some(listener) = listener.as_deref_mut() {
                            listener.add(&reporter.point(normal, point, body1, body2));
                        }
                    }
                }
            }
        }

        if let Some(listener) = listener.as_deref_mut() {
            let stale = previous.iter().flat_map(|m| m.points().iter().map(move |p| (m, p)));
            for (k, (manifold, point)) in stale.enumerate() {
                if !matched[k] {
                    listener.remove(&reporter.point(manifold.normal, point, body1, body2));
                }
            }
        }

        if self.manifolds.is_empty() && old_count > 0 {
            body1.wake_up();
            body2.wake_up();
        }

        // Slow contacts don't generate time of impact events.
        let eligible = shape1.get_kind().supports_toi() && shape2.get_kind().supports_toi();
        if eligible && (body1.is_static() || body1.is_bullet() || body2.is_static() || body2.is_bullet()) {
            self.flags.remove(ContactFlags::SLOW);
        } else {
            self.flags.insert(ContactFlags::SLOW);
        }
    }

    /// Reports every current point as removed
    pub(crate) fn report_removed(&self, body1: &Body, body2: &Body, listener: &mut dyn ContactListener) {
        let reporter = self.reporter();
        for manifold in self.manifolds.iter() {
            for point in manifold.points() {
                listener.remove(&reporter.point(manifold.normal, point, body1, body2));
            }
        }
    }

    fn reporter(&self) -> PointReporter {
        PointReporter {
            shape1: self.shape1,
            shape2: self.shape2,
            friction: self.friction,
            restitution: self.restitution,
        }
    }
}

/// Builds listener points for one contact
#[derive(Clone, Copy)]
struct PointReporter {
    shape1: ShapeHandle,
    shape2: ShapeHandle,
    friction: f32,
    restitution: f32,
}

impl PointReporter {
    fn point(&self, normal: Vector2, point: &ManifoldPoint, body1: &Body, body2: &Body) -> ContactPoint {
        let position = body1.get_world_point(point.local_point1);
        let v1 = body1.get_linear_velocity_from_world_point(position);
        let v2 = body2.get_linear_velocity_from_world_point(position);
        ContactPoint {
            shape1: self.shape1,
            shape2: self.shape2,
            position,
            velocity: v2 - v1,
            normal,
            separation: point.separation,
            friction: self.friction,
            restitution: self.restitution,
            id: point.id,
        }
    }
}
