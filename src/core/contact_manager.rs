use crate::bodies::{Body, ContactEdge};
use crate::collision::{CollisionRegistry, ContactFilter, PairCallback};
use crate::constraints::Joint;
use crate::core::listeners::ListenerSlot;
use crate::core::{Arena, BodyHandle, Contact, ContactHandle, JointHandle, ShapeHandle, Storage};
use crate::shapes::Shape;

/// Creates and destroys contacts on behalf of the broad phase
///
/// Borrows the parts of the world that contact bookkeeping touches, so it can
/// be handed to the broad phase as its pair callback.
pub(crate) struct ContactManager<'a> {
    pub shapes: &'a Arena<Shape, ShapeHandle>,
    pub bodies: &'a mut Arena<Body, BodyHandle>,
    pub contacts: &'a mut Arena<Contact, ContactHandle>,
    pub joints: &'a Arena<Box<dyn Joint>, JointHandle>,
    pub registry: &'a CollisionRegistry,
    pub filter: &'a dyn ContactFilter,
    pub listener: ListenerSlot<'a>,
}

impl<'a> ContactManager<'a> {
    /// Returns true when a joint between the bodies disables their collision
    fn joint_prevents_collision(&self, body1: &Body, body2: BodyHandle) -> bool {
        body1.joint_edges.iter().any(|edge| {
            edge.other == body2
                && self
                    .joints
                    .get(edge.joint)
                    .map_or(false, |joint| !joint.base().collide_connected)
        })
    }

    /// Removes a contact, reporting its points as removed
    pub fn destroy(&mut self, handle: ContactHandle) {
        let Some(contact) = self.contacts.remove(handle) else { return };

        if let Some(listener) = self.listener.as_deref_mut() {
            if contact.is_touching() {
                if let (Some(b1), Some(b2)) = (self.bodies.get(contact.body1), self.bodies.get(contact.body2)) {
                    contact.report_removed(b1, b2, listener);
                }
            }
        }

        for body in [contact.body1, contact.body2] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.contact_edges.retain(|edge| edge.contact != handle);
            }
        }
    }

    /// Refreshes the manifolds of one contact
    pub fn update(&mut self, handle: ContactHandle) {
        let Some(contact) = self.contacts.get_mut(handle) else { return };
        let (Some(s1), Some(s2)) = (self.shapes.get(contact.shape1), self.shapes.get(contact.shape2)) else {
            return;
        };
        let Some((b1, b2)) = self.bodies.get2_mut(contact.body1, contact.body2) else { return };

        contact.update(s1, b1, s2, b2, self.registry, self.listener.as_deref_mut());
    }

    /// Refreshes every contact with at least one awake body
    pub fn collide(&mut self) {
        for (_, contact) in self.contacts.iter_mut() {
            let (Some(s1), Some(s2)) = (self.shapes.get(contact.shape1), self.shapes.get(contact.shape2)) else {
                continue;
            };
            let Some((b1, b2)) = self.bodies.get2_mut(contact.body1, contact.body2) else { continue };
            if b1.is_sleeping() && b2.is_sleeping() {
                continue;
            }

            contact.update(s1, b1, s2, b2, self.registry, self.listener.as_deref_mut());
        }
    }
}

impl<'a> PairCallback<ShapeHandle, ContactHandle> for ContactManager<'a> {
    fn pair_added(&mut self, shape1: ShapeHandle, shape2: ShapeHandle) -> Option<ContactHandle> {
        let s1 = self.shapes.get(shape1)?;
        let s2 = self.shapes.get(shape2)?;
        let (body1, body2) = (s1.get_body(), s2.get_body());
        if body1 == body2 {
            return None;
        }

        let b1 = self.bodies.get(body1)?;
        let b2 = self.bodies.get(body2)?;
        if b1.is_static() && b2.is_static() {
            return None;
        }
        if self.joint_prevents_collision(b2, body1) {
            return None;
        }
        if !self.filter.should_collide(s1, s2) {
            return None;
        }
        if !self.registry.is_registered(s1.get_type(), s2.get_type()) {
            return None;
        }

        let handle = self.contacts.add(Contact::new(shape1, s1, shape2, s2));

        // Connect to both bodies.
        if let Some(b1) = self.bodies.get_mut(body1) {
            b1.contact_edges.push(ContactEdge { contact: handle, other: body2 });
        }
        if let Some(b2) = self.bodies.get_mut(body2) {
            b2.contact_edges.push(ContactEdge { contact: handle, other: body1 });
        }

        Some(handle)
    }

    fn pair_removed(&mut self, _shape1: ShapeHandle, _shape2: ShapeHandle, pair_data: Option<ContactHandle>) {
        if let Some(handle) = pair_data {
            self.destroy(handle);
        }
    }
}
