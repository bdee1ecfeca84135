use std::collections::VecDeque;

use log::{debug, trace, warn};

use crate::bodies::{Body, BodyDef, BodyFlags, JointEdge};
use crate::collision::{
    time_of_impact, BroadPhase, CollisionRegistry, ContactFilter, FilterData, GroupMaskFilter,
    ToiProxy,
};
use crate::constraints::{create_joint, Joint, JointDef};
use crate::core::config::{SimulationConfig, TimeStep};
use crate::core::contact_manager::ContactManager;
use crate::core::island::{Island, SolverSet};
use crate::core::listeners::{BoundaryListener, ContactListener, DestructionListener};
use crate::core::{
    Arena, BodyHandle, Contact, ContactFlags, ContactHandle, JointHandle, ShapeHandle, Storage,
};
use crate::error::PhysicsError;
use crate::math::{Aabb, Segment, Transform2, Vector2};
use crate::shapes::{Geometry, MassData, SegmentCollide, Shape, ShapeDef};
use crate::Result;

/// A shape hit by a segment query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RaycastHit {
    pub shape: ShapeHandle,

    /// Fraction along the segment where the hit occurs
    pub lambda: f32,

    /// Surface normal at the hit, zero when the segment starts inside
    pub normal: Vector2,
}

/// The physics world that owns bodies, shapes, joints and contacts
///
/// All mutation happens through the world. While a step is running the world
/// is locked and structural calls return [`PhysicsError::WorldLocked`].
pub struct World {
    config: SimulationConfig,

    bodies: Arena<Body, BodyHandle>,
    shapes: Arena<Shape, ShapeHandle>,
    joints: Arena<Box<dyn Joint>, JointHandle>,
    contacts: Arena<Contact, ContactHandle>,

    broad_phase: BroadPhase<ShapeHandle, ContactHandle>,
    registry: CollisionRegistry,
    contact_filter: Box<dyn ContactFilter>,

    contact_listener: Option<Box<dyn ContactListener>>,
    destruction_listener: Option<Box<dyn DestructionListener>>,
    boundary_listener: Option<Box<dyn BoundaryListener>>,

    /// Inverse of the previous time step, for warm-start rescaling
    inv_dt0: f32,
    locked: bool,
}

impl World {
    /// Creates a world whose broad phase covers `world_aabb`
    pub fn new(world_aabb: Aabb, gravity: Vector2, allow_sleep: bool) -> Result<Self> {
        Self::with_config(world_aabb, SimulationConfig::new(gravity, allow_sleep))
    }

    /// Creates a world with the given configuration
    pub fn with_config(world_aabb: Aabb, config: SimulationConfig) -> Result<Self> {
        if !world_aabb.is_valid() {
            return Err(PhysicsError::InvalidParameter(format!(
                "world bounds are inverted: {:?}",
                world_aabb
            )));
        }

        let broad_phase = BroadPhase::new(world_aabb, config.max_proxies, config.max_pairs)?;

        debug!(
            "created world: bounds {:?}, gravity {:?}, {} proxies",
            world_aabb, config.gravity, config.max_proxies
        );

        Ok(Self {
            config,
            bodies: Arena::new(),
            shapes: Arena::new(),
            joints: Arena::new(),
            contacts: Arena::new(),
            broad_phase,
            registry: CollisionRegistry::new(),
            contact_filter: Box::new(GroupMaskFilter),
            contact_listener: None,
            destruction_listener: None,
            boundary_listener: None,
            inv_dt0: 0.0,
            locked: false,
        })
    }

    /// Returns a reference to the simulation configuration
    pub fn get_config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Returns a mutable reference to the simulation configuration
    pub fn get_config_mut(&mut self) -> &mut SimulationConfig {
        &mut self.config
    }

    pub fn get_gravity(&self) -> Vector2 {
        self.config.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vector2) {
        self.config.gravity = gravity;
    }

    /// Returns true while a step is in progress
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.contact_listener = Some(listener);
    }

    pub fn set_destruction_listener(&mut self, listener: Box<dyn DestructionListener>) {
        self.destruction_listener = Some(listener);
    }

    pub fn set_boundary_listener(&mut self, listener: Box<dyn BoundaryListener>) {
        self.boundary_listener = Some(listener);
    }

    /// Replaces the filter consulted when new pairs are found
    ///
    /// Existing contacts are kept until their shapes are refiltered.
    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.contact_filter = filter;
    }

    /// Gives access to the collision handler table
    pub fn get_registry_mut(&mut self) -> &mut CollisionRegistry {
        &mut self.registry
    }

    fn check_unlocked(&self) -> Result<()> {
        if self.locked {
            Err(PhysicsError::WorldLocked)
        } else {
            Ok(())
        }
    }

    /// Borrows the broad phase together with a contact manager over the other fields
    fn split(&mut self) -> (&mut BroadPhase<ShapeHandle, ContactHandle>, ContactManager<'_>) {
        let manager = ContactManager {
            shapes: &self.shapes,
            bodies: &mut self.bodies,
            contacts: &mut self.contacts,
            joints: &self.joints,
            registry: &self.registry,
            filter: &*self.contact_filter,
            listener: self.contact_listener.as_deref_mut(),
        };
        (&mut self.broad_phase, manager)
    }

    // ---- Bodies ----

    /// Creates a body; it has no shapes and is static until given mass
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyHandle> {
        self.check_unlocked()?;

        if !def.position.x.is_finite() || !def.position.y.is_finite() || !def.angle.is_finite() {
            return Err(PhysicsError::InvalidParameter(format!(
                "body placed at a non-finite transform: {:?}, {}",
                def.position, def.angle
            )));
        }

        Ok(self.bodies.add(Body::new(def)))
    }

    /// Destroys a body together with its joints, shapes and contacts
    ///
    /// The destruction listener hears about every joint and shape removed
    /// as a side effect.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> Result<()> {
        self.check_unlocked()?;

        let body = self.bodies.get(handle).ok_or_else(|| body_not_found(handle))?;
        let joints: Vec<JointHandle> = body.joint_edges.iter().map(|edge| edge.joint).collect();
        let shapes = body.shapes.clone();

        for joint in joints {
            if let Some(listener) = self.destruction_listener.as_deref_mut() {
                listener.joint_destroyed(joint);
            }
            self.remove_joint(joint);
        }

        for shape in shapes {
            if let Some(listener) = self.destruction_listener.as_deref_mut() {
                listener.shape_destroyed(shape);
            }
            self.remove_shape(shape);
        }

        // Contacts of a frozen body have no proxy left to remove them.
        let leftover: Vec<ContactHandle> = self
            .bodies
            .get(handle)
            .map(|b| b.contact_edges.iter().map(|edge| edge.contact).collect())
            .unwrap_or_default();
        if !leftover.is_empty() {
            let (_, mut manager) = self.split();
            for contact in leftover {
                manager.destroy(contact);
            }
        }

        self.bodies.remove(handle);
        Ok(())
    }

    pub fn get_body(&self, handle: BodyHandle) -> Result<&Body> {
        self.bodies.get(handle).ok_or_else(|| body_not_found(handle))
    }

    pub fn get_body_mut(&mut self, handle: BodyHandle) -> Result<&mut Body> {
        self.bodies.get_mut(handle).ok_or_else(|| body_not_found(handle))
    }

    /// Iterates over every body
    pub fn bodies(&self) -> impl Iterator<Item = (BodyHandle, &Body)> + '_ {
        self.bodies.iter()
    }

    /// Sets the mass properties directly; inertia is about the body origin
    pub fn set_mass(&mut self, handle: BodyHandle, mass_data: &MassData) -> Result<()> {
        self.check_unlocked()?;
        self.apply_mass(handle, mass_data)
    }

    /// Recomputes the body mass from the density of its shapes
    ///
    /// A body whose shapes have no density becomes static.
    pub fn set_mass_from_shapes(&mut self, handle: BodyHandle) -> Result<()> {
        self.check_unlocked()?;

        let body = self.bodies.get(handle).ok_or_else(|| body_not_found(handle))?;

        let mut total = MassData::default();
        let mut weighted_center = Vector2::zero();
        for shape in body.shapes.iter().filter_map(|&s| self.shapes.get(s)) {
            let mass_data = shape.compute_mass();
            total.mass += mass_data.mass;
            weighted_center += mass_data.center * mass_data.mass;
            total.inertia += mass_data.inertia;
        }

        if total.mass > 0.0 {
            total.center = weighted_center * (1.0 / total.mass);
        }

        self.apply_mass(handle, &total)
    }

    fn apply_mass(&mut self, handle: BodyHandle, mass_data: &MassData) -> Result<()> {
        let body = self.bodies.get_mut(handle).ok_or_else(|| body_not_found(handle))?;

        let was_static = body.is_static();
        body.set_mass_data(mass_data);
        let center = body.sweep.local_center;
        let type_changed = was_static != body.is_static();
        let shapes = body.shapes.clone();

        for &shape in &shapes {
            if let Some(shape) = self.shapes.get_mut(shape) {
                shape.update_sweep_radius(center);
            }
        }

        // Static/dynamic changes alter which pairs are allowed.
        if type_changed {
            for shape in shapes {
                self.refilter_proxy(shape);
            }
        }

        Ok(())
    }

    /// Teleports a body, moving its shapes in the broad phase
    ///
    /// Returns `Ok(false)` when the body is frozen or ends up outside the
    /// world bounds, in which case it is frozen.
    pub fn set_transform(&mut self, handle: BodyHandle, position: Vector2, angle: f32) -> Result<bool> {
        self.check_unlocked()?;

        let body = self.bodies.get_mut(handle).ok_or_else(|| body_not_found(handle))?;
        if body.is_frozen() {
            return Ok(false);
        }

        body.set_transform_internal(position, angle);
        let xf = body.xf;

        if !self.synchronize_shapes(handle, &xf, &xf) {
            self.freeze_body(handle);
            return Ok(false);
        }

        let (broad_phase, mut manager) = self.split();
        broad_phase.commit(&mut manager);
        Ok(true)
    }

    /// Moves every proxy of a body to cover the motion from `xf1` to `xf2`
    ///
    /// Returns false as soon as one shape leaves the world bounds.
    fn synchronize_shapes(&mut self, handle: BodyHandle, xf1: &Transform2, xf2: &Transform2) -> bool {
        let Some(body) = self.bodies.get(handle) else { return true };

        for &shape_handle in &body.shapes {
            let Some(shape) = self.shapes.get(shape_handle) else { continue };
            let Some(proxy_id) = shape.proxy_id else { return false };

            let aabb = shape.get_kind().compute_swept_aabb(xf1, xf2);
            if !self.broad_phase.in_range(&aabb) {
                return false;
            }
            self.broad_phase.move_proxy(proxy_id, &aabb);
        }

        true
    }

    /// Stops a body and removes its shapes from the broad phase
    fn freeze_body(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get_mut(handle) else { return };
        body.freeze();
        let shapes = body.shapes.clone();

        debug!("body {:?} left the world bounds and was frozen", handle);

        for shape in shapes {
            self.destroy_proxy(shape);
        }
    }

    /// Freezes a body that moved out of range and tells the boundary listener
    fn report_violation(&mut self, handle: BodyHandle) {
        self.freeze_body(handle);
        if let Some(listener) = self.boundary_listener.as_deref_mut() {
            listener.violation(handle);
        }
    }

    // ---- Shapes ----

    /// Attaches a shape to a body
    ///
    /// The body mass is unchanged until [`World::set_mass_from_shapes`] is called.
    /// A shape outside the world bounds is kept but gets no proxy.
    pub fn create_shape(&mut self, body: BodyHandle, def: &ShapeDef) -> Result<ShapeHandle> {
        self.check_unlocked()?;

        if !(def.density >= 0.0 && def.density.is_finite()) {
            return Err(PhysicsError::InvalidParameter(format!("invalid density {}", def.density)));
        }
        if !(def.friction >= 0.0 && def.friction.is_finite()) {
            return Err(PhysicsError::InvalidParameter(format!("invalid friction {}", def.friction)));
        }
        if !(def.restitution >= 0.0 && def.restitution.is_finite()) {
            return Err(PhysicsError::InvalidParameter(format!(
                "invalid restitution {}",
                def.restitution
            )));
        }

        let b = self.bodies.get(body).ok_or_else(|| body_not_found(body))?;
        let xf = b.xf;

        let mut shape = Shape::new(def, body);
        shape.update_sweep_radius(b.sweep.local_center);

        let handle = self.shapes.add(shape);
        if let Some(b) = self.bodies.get_mut(body) {
            b.shapes.push(handle);
        }

        self.create_proxy(handle, &xf);
        Ok(handle)
    }

    /// Attaches a chain of edge shapes through consecutive vertices
    ///
    /// `template` supplies the material and filter of every edge; its geometry
    /// is ignored. Repeat the first vertex at the end to close the chain.
    pub fn create_edge_chain(
        &mut self,
        body: BodyHandle,
        vertices: &[Vector2],
        template: &ShapeDef,
    ) -> Result<Vec<ShapeHandle>> {
        self.check_unlocked()?;

        if vertices.len() < 2 {
            return Err(PhysicsError::InvalidGeometry(format!(
                "an edge chain needs at least 2 vertices, got {}",
                vertices.len()
            )));
        }

        // Validate every edge before attaching any.
        let defs = vertices
            .windows(2)
            .map(|pair| {
                let edge = ShapeDef::edge(pair[0], pair[1])?;
                Ok(ShapeDef {
                    kind: edge.kind,
                    ..template.clone()
                })
            })
            .collect::<Result<Vec<_>>>()?;

        defs.iter().map(|def| self.create_shape(body, def)).collect()
    }

    /// Detaches and destroys a shape
    pub fn destroy_shape(&mut self, handle: ShapeHandle) -> Result<()> {
        self.check_unlocked()?;

        if !self.shapes.contains(handle) {
            return Err(shape_not_found(handle));
        }

        self.remove_shape(handle);
        Ok(())
    }

    fn remove_shape(&mut self, handle: ShapeHandle) {
        self.destroy_proxy(handle);

        if let Some(shape) = self.shapes.remove(handle) {
            if let Some(body) = self.bodies.get_mut(shape.get_body()) {
                body.shapes.retain(|&s| s != handle);
            }
        }
    }

    pub fn get_shape(&self, handle: ShapeHandle) -> Result<&Shape> {
        self.shapes.get(handle).ok_or_else(|| shape_not_found(handle))
    }

    pub fn get_shape_mut(&mut self, handle: ShapeHandle) -> Result<&mut Shape> {
        self.shapes.get_mut(handle).ok_or_else(|| shape_not_found(handle))
    }

    /// Replaces the collision filter of a shape and refilters it
    pub fn set_filter_data(&mut self, handle: ShapeHandle, filter: FilterData) -> Result<()> {
        self.check_unlocked()?;

        self.shapes
            .get_mut(handle)
            .ok_or_else(|| shape_not_found(handle))?
            .set_filter(filter);
        self.refilter_proxy(handle);
        Ok(())
    }

    /// Re-evaluates the contacts of a shape against the current filter
    pub fn refilter(&mut self, handle: ShapeHandle) -> Result<()> {
        self.check_unlocked()?;

        if !self.shapes.contains(handle) {
            return Err(shape_not_found(handle));
        }

        self.refilter_proxy(handle);
        Ok(())
    }

    fn create_proxy(&mut self, handle: ShapeHandle, xf: &Transform2) {
        let Some(shape) = self.shapes.get(handle) else { return };
        let aabb = shape.compute_aabb(xf);

        let proxy_id = if self.broad_phase.in_range(&aabb) {
            let (broad_phase, mut manager) = self.split();
            broad_phase.create_proxy(&aabb, handle, &mut manager)
        } else {
            warn!("shape {:?} is outside the world bounds and gets no proxy", handle);
            None
        };

        if let Some(shape) = self.shapes.get_mut(handle) {
            shape.proxy_id = proxy_id;
        }
    }

    fn destroy_proxy(&mut self, handle: ShapeHandle) {
        let Some(proxy_id) = self.shapes.get_mut(handle).and_then(|s| s.proxy_id.take()) else {
            return;
        };

        let (broad_phase, mut manager) = self.split();
        if let Err(err) = broad_phase.destroy_proxy(proxy_id, &mut manager) {
            warn!("failed to destroy proxy of shape {:?}: {}", handle, err);
        }
    }

    /// Recreates the proxy of a shape so its pairs are filtered again
    fn refilter_proxy(&mut self, handle: ShapeHandle) {
        let Some(shape) = self.shapes.get(handle) else { return };
        if shape.proxy_id.is_none() {
            return;
        }
        let Some(xf) = self.bodies.get(shape.get_body()).map(|b| b.xf) else { return };

        self.destroy_proxy(handle);
        self.create_proxy(handle, &xf);
    }

    // ---- Joints ----

    /// Creates a joint between two bodies
    ///
    /// When the joint disables collision between its bodies, their existing
    /// contacts are dropped.
    pub fn create_joint(&mut self, def: &JointDef) -> Result<JointHandle> {
        self.check_unlocked()?;

        let (body1, body2) = def.bodies();
        for body in [body1, body2] {
            if !self.bodies.contains(body) {
                return Err(body_not_found(body));
            }
        }

        let joint = create_joint(def)?;
        let collide_connected = joint.base().collide_connected;
        let handle = self.joints.add(joint);

        if let Some(b1) = self.bodies.get_mut(body1) {
            b1.joint_edges.push(JointEdge { joint: handle, other: body2 });
        }
        if let Some(b2) = self.bodies.get_mut(body2) {
            b2.joint_edges.push(JointEdge { joint: handle, other: body1 });
        }

        if !collide_connected {
            self.refilter_smaller_body(body1, body2);
        }

        Ok(handle)
    }

    /// Destroys a joint and wakes its bodies
    pub fn destroy_joint(&mut self, handle: JointHandle) -> Result<()> {
        self.check_unlocked()?;

        if !self.joints.contains(handle) {
            return Err(joint_not_found(handle));
        }

        self.remove_joint(handle);
        Ok(())
    }

    fn remove_joint(&mut self, handle: JointHandle) {
        let Some(joint) = self.joints.remove(handle) else { return };
        let (body1, body2) = (joint.get_body1(), joint.get_body2());

        for body in [body1, body2] {
            if let Some(body) = self.bodies.get_mut(body) {
                body.joint_edges.retain(|edge| edge.joint != handle);
                body.wake_up();
            }
        }

        // The bodies may collide again.
        if !joint.base().collide_connected {
            self.refilter_smaller_body(body1, body2);
        }
    }

    /// Refilters the shapes of whichever body has fewer of them
    fn refilter_smaller_body(&mut self, body1: BodyHandle, body2: BodyHandle) {
        let count = |handle| self.bodies.get(handle).map_or(0, |b: &Body| b.shapes.len());
        let body = if count(body1) < count(body2) { body1 } else { body2 };

        let shapes = self.bodies.get(body).map(|b| b.shapes.clone()).unwrap_or_default();
        for shape in shapes {
            self.refilter_proxy(shape);
        }
    }

    pub fn get_joint(&self, handle: JointHandle) -> Result<&(dyn Joint + 'static)> {
        self.joints
            .get(handle)
            .map(|joint| &**joint)
            .ok_or_else(|| joint_not_found(handle))
    }

    pub fn get_joint_mut(&mut self, handle: JointHandle) -> Result<&mut (dyn Joint + 'static)> {
        match self.joints.get_mut(handle) {
            Some(joint) => Ok(&mut **joint),
            None => Err(joint_not_found(handle)),
        }
    }

    /// Iterates over every joint
    pub fn joints(&self) -> impl Iterator<Item = (JointHandle, &(dyn Joint + 'static))> + '_ {
        self.joints.iter().map(|(handle, joint)| (handle, &**joint))
    }

    // ---- Contacts ----

    pub fn get_contact(&self, handle: ContactHandle) -> Result<&Contact> {
        self.contacts
            .get(handle)
            .ok_or_else(|| PhysicsError::ResourceNotFound(format!("contact {:?}", handle)))
    }

    /// Iterates over every live contact, touching or not
    pub fn contacts(&self) -> impl Iterator<Item = (ContactHandle, &Contact)> + '_ {
        self.contacts.iter()
    }

    // ---- Statistics ----

    pub fn get_body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn get_shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn get_joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn get_contact_count(&self) -> usize {
        self.contacts.len()
    }

    pub fn get_proxy_count(&self) -> usize {
        self.broad_phase.proxy_count()
    }

    pub fn get_pair_count(&self) -> usize {
        self.broad_phase.pair_count()
    }

    /// Checks the broad-phase invariants
    pub fn validate(&self) -> Result<()> {
        self.broad_phase.validate()
    }

    // ---- Queries ----

    /// Returns up to `max_count` shapes whose proxies overlap `aabb`
    pub fn query_aabb(&mut self, aabb: &Aabb, max_count: usize) -> Vec<ShapeHandle> {
        self.broad_phase.query_aabb(aabb, max_count)
    }

    /// Casts a segment and returns up to `max_count` hits, nearest first
    ///
    /// With `solid_shapes` set, shapes containing the segment start are
    /// reported at fraction zero.
    pub fn raycast(&mut self, segment: &Segment, max_count: usize, solid_shapes: bool) -> Vec<RaycastHit> {
        self.raycast_filtered(segment, max_count, solid_shapes, |_| true)
    }

    /// Like [`World::raycast`], keeping only shapes accepted by `filter`
    pub fn raycast_filtered<F>(
        &mut self,
        segment: &Segment,
        max_count: usize,
        solid_shapes: bool,
        mut filter: F,
    ) -> Vec<RaycastHit>
    where
        F: FnMut(&Shape) -> bool,
    {
        let candidates = self
            .broad_phase
            .query_segment(segment, self.broad_phase.proxy_count(), true);

        let mut hits = Vec::new();
        for (handle, _) in candidates {
            let Some(shape) = self.shapes.get(handle) else { continue };
            if !filter(shape) {
                continue;
            }
            let Some(body) = self.bodies.get(shape.get_body()) else { continue };

            match shape.test_segment(&body.xf, segment, 1.0) {
                SegmentCollide::Hit { lambda, normal } => hits.push(RaycastHit { shape: handle, lambda, normal }),
                SegmentCollide::StartsInside if solid_shapes => hits.push(RaycastHit {
                    shape: handle,
                    lambda: 0.0,
                    normal: Vector2::zero(),
                }),
                _ => {}
            }
        }

        hits.sort_by(|a, b| a.lambda.total_cmp(&b.lambda));
        hits.truncate(max_count);
        hits
    }

    /// Returns the nearest hit of a segment, if any
    pub fn raycast_one(&mut self, segment: &Segment, solid_shapes: bool) -> Option<RaycastHit> {
        self.raycast(segment, 1, solid_shapes).into_iter().next()
    }

    // ---- Simulation ----

    /// Advances the world by `dt` seconds
    ///
    /// Refreshes contacts, solves every awake island, then resolves
    /// time-of-impact events when continuous physics is enabled.
    pub fn step(&mut self, dt: f32, velocity_iterations: u32, position_iterations: u32) -> Result<()> {
        self.check_unlocked()?;

        if !(dt >= 0.0 && dt.is_finite()) {
            return Err(PhysicsError::InvalidParameter(format!("invalid time step {}", dt)));
        }

        self.locked = true;

        let mut step = TimeStep::new(dt, velocity_iterations, position_iterations);
        step.dt_ratio = self.inv_dt0 * dt;
        step.warm_starting = self.config.warm_starting;

        // Update contacts.
        {
            let (_, mut manager) = self.split();
            manager.collide();
        }

        // Integrate velocities, solve velocity constraints, and integrate positions.
        if step.dt > 0.0 {
            self.solve(&step);
        }

        // Handle TOI events.
        if self.config.continuous_physics && step.dt > 0.0 {
            self.solve_toi(&step);
        }

        self.inv_dt0 = step.inv_dt;
        self.locked = false;
        Ok(())
    }

    /// Builds islands over the contact graph and solves each one
    fn solve(&mut self, step: &TimeStep) {
        // Clear all the island flags.
        for (_, body) in self.bodies.iter_mut() {
            body.flags.remove(BodyFlags::ISLAND);
        }
        for (_, contact) in self.contacts.iter_mut() {
            contact.flags.remove(ContactFlags::ISLAND);
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.base_mut().island = false;
        }

        let mut island = Island::default();
        let mut stack: Vec<BodyHandle> = Vec::with_capacity(self.bodies.len());
        let mut island_count = 0usize;

        for seed in self.bodies.handles() {
            let Some(body) = self.bodies.get_mut(seed) else { continue };
            if body.flags.intersects(BodyFlags::ISLAND | BodyFlags::SLEEPING | BodyFlags::FROZEN) {
                continue;
            }
            if body.is_static() {
                continue;
            }

            // Reset island and stack.
            island.clear();
            stack.clear();
            stack.push(seed);
            body.flags.insert(BodyFlags::ISLAND);

            // Perform a depth first search (DFS) on the constraint graph.
            while let Some(handle) = stack.pop() {
                let Some(body) = self.bodies.get_mut(handle) else { continue };
                island.bodies.push(handle);

                // Make sure the body is awake.
                body.flags.remove(BodyFlags::SLEEPING);

                // Don't propagate islands across static bodies.
                if body.is_static() {
                    continue;
                }

                let contact_edges = body.contact_edges.clone();
                let joint_edges = body.joint_edges.clone();

                for edge in contact_edges {
                    let Some(contact) = self.contacts.get_mut(edge.contact) else { continue };
                    if contact.flags.intersects(ContactFlags::ISLAND | ContactFlags::NON_SOLID) {
                        continue;
                    }
                    // Is this contact touching?
                    if contact.manifolds.is_empty() {
                        continue;
                    }

                    island.contacts.push(edge.contact);
                    contact.flags.insert(ContactFlags::ISLAND);

                    push_unvisited(&mut self.bodies, edge.other, &mut stack);
                }

                for edge in joint_edges {
                    let Some(joint) = self.joints.get_mut(edge.joint) else { continue };
                    if joint.base().island {
                        continue;
                    }

                    island.joints.push(edge.joint);
                    joint.base_mut().island = true;

                    push_unvisited(&mut self.bodies, edge.other, &mut stack);
                }
            }

            let mut set = SolverSet {
                bodies: &mut self.bodies,
                contacts: &mut self.contacts,
                joints: &mut self.joints,
                config: &self.config,
            };
            island.solve(&mut set, step, self.contact_listener.as_deref_mut());
            island_count += 1;

            // Allow static bodies to participate in other islands.
            for &handle in &island.bodies {
                if let Some(body) = self.bodies.get_mut(handle) {
                    if body.is_static() {
                        body.flags.remove(BodyFlags::ISLAND);
                    }
                }
            }
        }

        trace!("solved {} islands over {} bodies", island_count, self.bodies.len());

        // Synchronize shapes, check for out of range bodies.
        for handle in self.bodies.handles() {
            let Some(body) = self.bodies.get(handle) else { continue };
            if body.flags.intersects(BodyFlags::SLEEPING | BodyFlags::FROZEN) || body.is_static() {
                continue;
            }

            let xf1 = body.sweep.start_transform();
            let xf2 = body.xf;
            if !self.synchronize_shapes(handle, &xf1, &xf2) {
                self.report_violation(handle);
            }
        }

        // Commit shape proxy movements to the broad-phase so that new contacts are created.
        let (broad_phase, mut manager) = self.split();
        broad_phase.commit(&mut manager);
    }

    /// Computes the time of impact of one contact on the common sweep interval
    fn contact_toi(&mut self, handle: ContactHandle) -> Option<f32> {
        let contact = self.contacts.get(handle)?;
        let (s1, s2) = (self.shapes.get(contact.shape1)?, self.shapes.get(contact.shape2)?);
        let (b1, b2) = self.bodies.get2_mut(contact.body1, contact.body2)?;

        // Is there a sweep to compute?
        if (b1.is_static() || b1.is_sleeping()) && (b2.is_static() || b2.is_sleeping()) {
            return None;
        }

        // Put the sweeps onto the same time interval.
        let mut t0 = b1.sweep.t0;
        if b1.sweep.t0 < b2.sweep.t0 {
            t0 = b2.sweep.t0;
            b1.sweep.advance(t0);
        } else if b2.sweep.t0 < b1.sweep.t0 {
            t0 = b1.sweep.t0;
            b2.sweep.advance(t0);
        }

        let core1 = s1.get_kind().core_proxy();
        let core2 = s2.get_kind().core_proxy();
        let proxy1 = ToiProxy { proxy: &core1, sweep: &b1.sweep, sweep_radius: s1.sweep_radius };
        let proxy2 = ToiProxy { proxy: &core2, sweep: &b2.sweep, sweep_radius: s2.sweep_radius };

        let mut toi = time_of_impact(&proxy1, &proxy2, self.config.toi_slop);
        if 0.0 < toi && toi < 1.0 {
            // Map the fraction of the remaining interval back to the full step.
            toi = ((1.0 - toi) * t0 + toi).min(1.0);
        }

        Some(toi)
    }

    /// Finds and resolves time-of-impact events in order
    fn solve_toi(&mut self, step: &TimeStep) {
        // Reserve an island for the TOI bodies and their contacts.
        let mut island = Island::with_contact_capacity(self.config.max_toi_contacts_per_island);
        let mut queue: VecDeque<BodyHandle> = VecDeque::with_capacity(self.bodies.len());

        for (_, body) in self.bodies.iter_mut() {
            body.flags.remove(BodyFlags::ISLAND);
            body.sweep.t0 = 0.0;
        }
        for (_, contact) in self.contacts.iter_mut() {
            // Invalidate TOI
            contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
        }

        let mut iterations = 0usize;
        loop {
            if iterations >= self.config.max_toi_iterations_per_step {
                warn!(
                    "time of impact loop stopped after {} events; some contacts may tunnel",
                    iterations
                );
                break;
            }
            iterations += 1;

            // Find the first TOI.
            let mut min_contact = None;
            let mut min_toi = 1.0f32;

            for handle in self.contacts.handles() {
                let Some(contact) = self.contacts.get(handle) else { continue };
                if contact.flags.intersects(ContactFlags::SLOW | ContactFlags::NON_SOLID) {
                    continue;
                }

                let toi = if contact.flags.contains(ContactFlags::TOI) {
                    // This contact has a valid cached TOI.
                    contact.toi
                } else {
                    let Some(toi) = self.contact_toi(handle) else { continue };
                    if let Some(contact) = self.contacts.get_mut(handle) {
                        contact.toi = toi;
                        contact.flags.insert(ContactFlags::TOI);
                    }
                    toi
                };

                if f32::EPSILON < toi && toi < min_toi {
                    // This is the minimum TOI found so far.
                    min_contact = Some(handle);
                    min_toi = toi;
                }
            }

            let Some(min_contact) = min_contact else { break };
            if 1.0 - 100.0 * f32::EPSILON < min_toi {
                // No more TOI events. Done!
                break;
            }

            // Advance the bodies to the TOI.
            let Some(contact) = self.contacts.get(min_contact) else { break };
            let (body1, body2) = (contact.body1, contact.body2);
            let Some((b1, b2)) = self.bodies.get2_mut(body1, body2) else { break };
            b1.advance(min_toi);
            b2.advance(min_toi);
            let seed = if b1.is_static() { body2 } else { body1 };

            trace!("time of impact {:.4} between {:?} and {:?}", min_toi, body1, body2);

            // The contact likely has some new contact points.
            {
                let (_, mut manager) = self.split();
                manager.update(min_contact);
            }

            let Some(contact) = self.contacts.get_mut(min_contact) else { continue };
            contact.flags.remove(ContactFlags::TOI);
            if contact.manifolds.is_empty() {
                // This shouldn't happen. Numerical error?
                continue;
            }

            // Build the TOI island. We need a dynamic seed.
            island.clear();
            queue.clear();
            queue.push_back(seed);
            if let Some(body) = self.bodies.get_mut(seed) {
                body.flags.insert(BodyFlags::ISLAND);
            }

            // Perform a breadth first search (BFS) on the contact graph.
            let mut capped = false;
            while let Some(handle) = queue.pop_front() {
                let Some(body) = self.bodies.get_mut(handle) else { continue };
                island.bodies.push(handle);

                // Make sure the body is awake.
                body.flags.remove(BodyFlags::SLEEPING);

                // Don't propagate islands across static bodies.
                if body.is_static() {
                    continue;
                }

                let contact_edges = body.contact_edges.clone();
                for edge in contact_edges {
                    // Does the TOI island still have space for contacts?
                    if island.is_contact_full() {
                        capped = true;
                        break;
                    }

                    let Some(contact) = self.contacts.get_mut(edge.contact) else { continue };

                    // Has this contact already been added to an island? Skip slow or non-solid contacts.
                    if contact
                        .flags
                        .intersects(ContactFlags::ISLAND | ContactFlags::SLOW | ContactFlags::NON_SOLID)
                    {
                        continue;
                    }

                    // Is this contact touching? For performance we are not updating this contact.
                    if contact.manifolds.is_empty() {
                        continue;
                    }

                    island.contacts.push(edge.contact);
                    contact.flags.insert(ContactFlags::ISLAND);

                    let Some(other) = self.bodies.get_mut(edge.other) else { continue };
                    if other.flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    // March forward, this can do no harm since this is the min TOI.
                    if !other.is_static() {
                        other.advance(min_toi);
                        other.wake_up();
                    }

                    other.flags.insert(BodyFlags::ISLAND);
                    queue.push_back(edge.other);
                }
            }

            if capped {
                warn!(
                    "time of impact island reached {} contacts; remaining contacts wait for the next event",
                    self.config.max_toi_contacts_per_island
                );
            }

            let mut sub_step = TimeStep::new(
                (1.0 - min_toi) * step.dt,
                step.velocity_iterations,
                step.position_iterations,
            );
            sub_step.dt_ratio = 0.0;
            sub_step.warm_starting = false;

            let mut set = SolverSet {
                bodies: &mut self.bodies,
                contacts: &mut self.contacts,
                joints: &mut self.joints,
                config: &self.config,
            };
            island.solve_toi(&mut set, &sub_step, self.contact_listener.as_deref_mut());

            // Post solve cleanup.
            for &handle in &island.bodies {
                let Some(body) = self.bodies.get_mut(handle) else { continue };

                // Allow bodies to participate in future TOI islands.
                body.flags.remove(BodyFlags::ISLAND);

                if body.flags.intersects(BodyFlags::SLEEPING | BodyFlags::FROZEN) || body.is_static() {
                    continue;
                }

                // Update shapes (for broad-phase). If the shapes go out of
                // the world AABB then shapes and contacts may be destroyed.
                let xf1 = body.sweep.start_transform();
                let xf2 = body.xf;
                if !self.synchronize_shapes(handle, &xf1, &xf2) {
                    self.report_violation(handle);
                }

                // Invalidate all contact TOIs associated with this body. Some of these
                // may not be in the island because they were not touching.
                let Some(body) = self.bodies.get(handle) else { continue };
                for edge in &body.contact_edges {
                    if let Some(contact) = self.contacts.get_mut(edge.contact) {
                        contact.flags.remove(ContactFlags::TOI);
                    }
                }
            }

            for &handle in &island.contacts {
                if let Some(contact) = self.contacts.get_mut(handle) {
                    // Allow contacts to participate in future TOI islands.
                    contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                }
            }

            // Commit shape proxy movements to the broad-phase so that new contacts are created.
            // Also, some contacts can be destroyed.
            let (broad_phase, mut manager) = self.split();
            broad_phase.commit(&mut manager);
        }
    }
}

/// Marks a body as visited and queues it for the island search
fn push_unvisited(bodies: &mut Arena<Body, BodyHandle>, handle: BodyHandle, stack: &mut Vec<BodyHandle>) {
    if let Some(other) = bodies.get_mut(handle) {
        if !other.flags.contains(BodyFlags::ISLAND) {
            other.flags.insert(BodyFlags::ISLAND);
            stack.push(handle);
        }
    }
}

fn body_not_found(handle: BodyHandle) -> PhysicsError {
    PhysicsError::ResourceNotFound(format!("body {:?}", handle))
}

fn shape_not_found(handle: ShapeHandle) -> PhysicsError {
    PhysicsError::ResourceNotFound(format!("shape {:?}", handle))
}

fn joint_not_found(handle: JointHandle) -> PhysicsError {
    PhysicsError::ResourceNotFound(format!("joint {:?}", handle))
}
