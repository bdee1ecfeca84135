use std::sync::{Arc, Mutex};

use sweep2d::collision::{CollisionCategory, FilterData};
use sweep2d::core::{BoundaryListener, ContactListener, ContactPoint, ContactResult, DestructionListener};
use sweep2d::{Aabb, BodyDef, BodyHandle, JointHandle, ShapeDef, ShapeHandle, SimulationConfig, Vector2, World};
use sweep2d::{DistanceJointDef, JointDef};
use approx::assert_relative_eq;

const DT: f32 = 1.0 / 60.0;
const VELOCITY_ITERATIONS: u32 = 10;
const POSITION_ITERATIONS: u32 = 8;

fn bounds() -> Aabb {
    Aabb::new(Vector2::new(-100.0, -100.0), Vector2::new(100.0, 100.0))
}

fn make_world(gravity: Vector2) -> World {
    World::new(bounds(), gravity, true).unwrap()
}

/// A static ground box whose top surface is at y = 0
fn add_ground(world: &mut World) -> BodyHandle {
    let ground = world.create_body(&BodyDef::at(Vector2::new(0.0, -1.0))).unwrap();
    world.create_shape(ground, &ShapeDef::boxed(50.0, 1.0).unwrap()).unwrap();
    ground
}

fn add_dynamic(world: &mut World, position: Vector2, def: ShapeDef) -> BodyHandle {
    let body = world.create_body(&BodyDef::at(position)).unwrap();
    world.create_shape(body, &def.with_density(1.0)).unwrap();
    world.set_mass_from_shapes(body).unwrap();
    body
}

fn run(world: &mut World, steps: usize) {
    for _ in 0..steps {
        world.step(DT, VELOCITY_ITERATIONS, POSITION_ITERATIONS).unwrap();
    }
}

#[test]
fn test_free_fall_matches_semi_implicit_euler() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let body = add_dynamic(&mut world, Vector2::new(0.0, 10.0), ShapeDef::circle(0.5).unwrap());

    run(&mut world, 60);

    // v_n = -g n dt, y_n = y_0 - g dt^2 n (n + 1) / 2
    let b = world.get_body(body).unwrap();
    assert_relative_eq!(b.get_linear_velocity().y, -10.0, epsilon = 1.0e-3);
    assert_relative_eq!(b.get_position().y, 10.0 - 10.0 * DT * DT * 1830.0, epsilon = 1.0e-3);
    assert_eq!(b.get_position().x, 0.0);
}

#[test]
fn test_static_body_never_moves() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let ground = add_ground(&mut world);
    add_dynamic(&mut world, Vector2::new(0.0, 0.5), ShapeDef::boxed(0.5, 0.5).unwrap());

    run(&mut world, 120);

    let g = world.get_body(ground).unwrap();
    assert!(g.is_static());
    assert_eq!(g.get_position(), Vector2::new(0.0, -1.0));
    assert_eq!(g.get_linear_velocity(), Vector2::zero());
}

#[test]
fn test_resting_stack_settles() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    add_ground(&mut world);

    let boxes: Vec<BodyHandle> = (0..3)
        .map(|i| {
            let shape = ShapeDef::boxed(0.5, 0.5).unwrap().with_friction(0.6);
            add_dynamic(&mut world, Vector2::new(0.0, 0.5 + i as f32), shape)
        })
        .collect();

    // Five seconds at 60 Hz.
    run(&mut world, 300);

    let tolerance = world.get_config().linear_sleep_tolerance;
    for (i, &handle) in boxes.iter().enumerate() {
        let b = world.get_body(handle).unwrap();
        assert!(b.is_sleeping() || b.get_linear_velocity().length() < tolerance);
        assert!(b.get_position().x.abs() < 0.01, "box {} drifted to {:?}", i, b.get_position());
        assert!((b.get_position().y - (0.5 + i as f32)).abs() < 0.05);
    }
}

#[test]
fn test_elastic_circle_bounce() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    add_ground(&mut world);

    let height = 5.0;
    let radius = 0.5;
    let ball = add_dynamic(
        &mut world,
        Vector2::new(0.0, height + radius),
        ShapeDef::circle(radius).unwrap().with_restitution(1.0),
    );

    let mut bounced = false;
    let mut apex = 0.0f32;
    for _ in 0..300 {
        world.step(DT, VELOCITY_ITERATIONS, POSITION_ITERATIONS).unwrap();
        let b = world.get_body(ball).unwrap();
        let vy = b.get_linear_velocity().y;
        let bottom = b.get_position().y - radius;

        if !bounced {
            bounced = vy > 0.0;
        } else if vy > 0.0 {
            apex = apex.max(bottom);
        } else {
            apex = apex.max(bottom);
            break;
        }
    }

    assert!(bounced);
    assert!((apex - height).abs() < 0.05 * height, "apex {} for drop height {}", apex, height);
}

fn kinetic_energy(world: &World) -> f32 {
    world.bodies().map(|(_, b)| b.get_kinetic_energy()).sum()
}

/// Kinetic plus gravitational energy, measured from the floor of the closed box
fn total_energy(world: &World, g: f32) -> f32 {
    world
        .bodies()
        .map(|(_, b)| b.get_kinetic_energy() + b.get_mass() * g * (b.get_world_center().y + 10.0))
        .sum()
}

/// A closed 20 x 20 box of elastic static walls with four elastic balls inside
fn closed_box_with_balls(gravity: Vector2) -> World {
    let mut world = World::with_config(bounds(), SimulationConfig::new(gravity, false)).unwrap();

    let walls = world.create_body(&BodyDef::default()).unwrap();
    for (center, half) in [
        (Vector2::new(0.0, -10.5), Vector2::new(11.0, 0.5)),
        (Vector2::new(0.0, 10.5), Vector2::new(11.0, 0.5)),
        (Vector2::new(-10.5, 0.0), Vector2::new(0.5, 11.0)),
        (Vector2::new(10.5, 0.0), Vector2::new(0.5, 11.0)),
    ] {
        let wall = ShapeDef::oriented_box(half.x, half.y, center, 0.0).unwrap().with_restitution(1.0);
        world.create_shape(walls, &wall).unwrap();
    }

    let starts = [
        (Vector2::new(-5.0, -5.0), Vector2::new(4.0, 3.0)),
        (Vector2::new(5.0, -4.0), Vector2::new(-3.0, 5.0)),
        (Vector2::new(-4.0, 5.0), Vector2::new(5.0, -2.0)),
        (Vector2::new(4.0, 4.0), Vector2::new(-2.0, -6.0)),
    ];
    for (position, velocity) in starts {
        let shape = ShapeDef::circle(0.8).unwrap().with_restitution(1.0).with_friction(0.0);
        let ball = add_dynamic(&mut world, position, shape);
        world.get_body_mut(ball).unwrap().set_linear_velocity(velocity);
    }

    world
}

#[test]
fn test_energy_is_not_created() {
    let mut world = closed_box_with_balls(Vector2::zero());

    let initial = kinetic_energy(&world);
    for step in 0..240 {
        world.step(DT, VELOCITY_ITERATIONS, POSITION_ITERATIONS).unwrap();
        let energy = kinetic_energy(&world);
        assert!(energy <= initial * 1.01, "step {}: energy {} exceeds initial {}", step, energy, initial);
    }
}

#[test]
fn test_energy_is_not_created_under_gravity() {
    let g = 10.0;
    let mut world = closed_box_with_balls(Vector2::new(0.0, -g));

    let initial = total_energy(&world, g);
    for step in 0..240 {
        world.step(DT, VELOCITY_ITERATIONS, POSITION_ITERATIONS).unwrap();
        let energy = total_energy(&world, g);
        assert!(energy <= initial * 1.01, "step {}: energy {} exceeds initial {}", step, energy, initial);
    }
}

#[test]
fn test_warm_started_equilibrium_is_idempotent() {
    let mut world = World::new(bounds(), Vector2::zero(), false).unwrap();
    add_ground(&mut world);

    // Start slightly overlapping the ground so the position pass has work to do.
    let boxes: Vec<BodyHandle> = (0..2)
        .map(|i| add_dynamic(&mut world, Vector2::new(0.0, 0.48 + 0.98 * i as f32), ShapeDef::boxed(0.5, 0.5).unwrap()))
        .collect();

    run(&mut world, 120);
    let settled: Vec<Vector2> = boxes.iter().map(|&b| world.get_body(b).unwrap().get_position()).collect();

    run(&mut world, 120);
    let slop = world.get_config().linear_slop;
    for (&handle, before) in boxes.iter().zip(settled) {
        let after = world.get_body(handle).unwrap().get_position();
        assert!((after - before).length() < slop, "moved from {:?} to {:?}", before, after);
    }
}

#[test]
fn test_resting_body_falls_asleep_and_wakes() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    add_ground(&mut world);
    let body = add_dynamic(&mut world, Vector2::new(0.0, 0.5), ShapeDef::boxed(0.5, 0.5).unwrap());

    run(&mut world, 120);
    assert!(world.get_body(body).unwrap().is_sleeping());

    let b = world.get_body_mut(body).unwrap();
    let center = b.get_world_center();
    b.wake_up();
    b.apply_impulse(Vector2::new(0.0, 5.0), center);
    run(&mut world, 1);

    let b = world.get_body(body).unwrap();
    assert!(!b.is_sleeping());
    assert!(b.get_position().y > 0.5);
}

#[test]
fn test_sleeping_disabled_per_body() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    add_ground(&mut world);
    let body = add_dynamic(&mut world, Vector2::new(0.0, 0.5), ShapeDef::boxed(0.5, 0.5).unwrap());
    world.get_body_mut(body).unwrap().set_can_sleep(false);

    run(&mut world, 120);
    assert!(!world.get_body(body).unwrap().is_sleeping());
}

#[derive(Default)]
struct ContactLog {
    added: usize,
    persisted: usize,
    removed: usize,
    results: usize,
    max_normal_impulse: f32,
}

struct SharedContactLog(Arc<Mutex<ContactLog>>);

impl ContactListener for SharedContactLog {
    fn add(&mut self, _point: &ContactPoint) {
        self.0.lock().unwrap().added += 1;
    }

    fn persist(&mut self, _point: &ContactPoint) {
        self.0.lock().unwrap().persisted += 1;
    }

    fn remove(&mut self, _point: &ContactPoint) {
        self.0.lock().unwrap().removed += 1;
    }

    fn result(&mut self, result: &ContactResult) {
        let mut log = self.0.lock().unwrap();
        log.results += 1;
        log.max_normal_impulse = log.max_normal_impulse.max(result.normal_impulse);
    }
}

#[test]
fn test_contact_listener_reports_lifecycle() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let log = Arc::new(Mutex::new(ContactLog::default()));
    world.set_contact_listener(Box::new(SharedContactLog(log.clone())));

    add_ground(&mut world);
    let ball = add_dynamic(&mut world, Vector2::new(0.0, 2.0), ShapeDef::circle(0.5).unwrap());

    run(&mut world, 90);
    {
        let log = log.lock().unwrap();
        assert!(log.added >= 1);
        assert!(log.persisted > 0);
        assert!(log.results > 0);
        assert!(log.max_normal_impulse > 0.0);
    }

    world.destroy_body(ball).unwrap();
    assert!(log.lock().unwrap().removed >= 1);
}

#[test]
fn test_sensor_reports_but_does_not_block() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let log = Arc::new(Mutex::new(ContactLog::default()));
    world.set_contact_listener(Box::new(SharedContactLog(log.clone())));

    let sensor_body = world.create_body(&BodyDef::at(Vector2::new(0.0, 5.0))).unwrap();
    world
        .create_shape(sensor_body, &ShapeDef::boxed(2.0, 0.5).unwrap().with_sensor(true))
        .unwrap();

    let ball = add_dynamic(&mut world, Vector2::new(0.0, 7.0), ShapeDef::circle(0.5).unwrap());
    run(&mut world, 90);

    assert!(world.get_body(ball).unwrap().get_position().y < 3.0);
    assert!(log.lock().unwrap().added >= 1);
    assert_eq!(log.lock().unwrap().results, 0);
}

#[test]
fn test_negative_group_never_collides() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let filter = FilterData::new(CollisionCategory::DEFAULT, CollisionCategory::ALL, -1);

    let ground = world.create_body(&BodyDef::at(Vector2::new(0.0, -1.0))).unwrap();
    world
        .create_shape(ground, &ShapeDef::boxed(50.0, 1.0).unwrap().with_filter(filter))
        .unwrap();
    let ball = add_dynamic(
        &mut world,
        Vector2::new(0.0, 1.0),
        ShapeDef::circle(0.5).unwrap().with_filter(filter),
    );

    run(&mut world, 60);
    assert_eq!(world.get_contact_count(), 0);
    assert!(world.get_body(ball).unwrap().get_position().y < -1.0);
}

#[test]
fn test_refilter_drops_existing_contact() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    add_ground(&mut world);
    let ball = add_dynamic(&mut world, Vector2::new(0.0, 0.5), ShapeDef::circle(0.5).unwrap());
    run(&mut world, 10);
    assert_eq!(world.get_contact_count(), 1);

    let shape = world.get_body(ball).unwrap().get_shapes()[0];
    let filter = FilterData::new(CollisionCategory::DEFAULT, CollisionCategory::empty(), 0);
    world.set_filter_data(shape, filter).unwrap();
    assert_eq!(world.get_contact_count(), 0);
}

struct BoundaryLog(Arc<Mutex<Vec<BodyHandle>>>);

impl BoundaryListener for BoundaryLog {
    fn violation(&mut self, body: BodyHandle) {
        self.0.lock().unwrap().push(body);
    }
}

#[test]
fn test_leaving_world_freezes_body() {
    let small = Aabb::new(Vector2::new(-10.0, -10.0), Vector2::new(10.0, 10.0));
    let mut world = World::new(small, Vector2::zero(), true).unwrap();
    let violations = Arc::new(Mutex::new(Vec::new()));
    world.set_boundary_listener(Box::new(BoundaryLog(violations.clone())));

    let body = add_dynamic(&mut world, Vector2::new(8.0, 0.0), ShapeDef::circle(0.5).unwrap());
    world.get_body_mut(body).unwrap().set_linear_velocity(Vector2::new(120.0, 0.0));
    assert_eq!(world.get_proxy_count(), 1);

    run(&mut world, 2);

    let b = world.get_body(body).unwrap();
    assert!(b.is_frozen());
    assert_eq!(b.get_linear_velocity(), Vector2::zero());
    assert_eq!(world.get_proxy_count(), 0);
    assert_eq!(violations.lock().unwrap().as_slice(), &[body]);
}

#[test]
fn test_set_transform_moves_proxies() {
    let mut world = make_world(Vector2::zero());
    let body = add_dynamic(&mut world, Vector2::zero(), ShapeDef::circle(0.5).unwrap());

    assert!(world.set_transform(body, Vector2::new(20.0, 20.0), 0.5).unwrap());
    let found = world.query_aabb(&Aabb::new(Vector2::new(19.0, 19.0), Vector2::new(21.0, 21.0)), 8);
    assert_eq!(found.len(), 1);
    assert!(world.query_aabb(&Aabb::new(Vector2::new(-1.0, -1.0), Vector2::new(1.0, 1.0)), 8).is_empty());
    assert_relative_eq!(world.get_body(body).unwrap().get_angle(), 0.5);

    // Outside the world the body freezes.
    assert!(!world.set_transform(body, Vector2::new(500.0, 0.0), 0.0).unwrap());
    assert!(world.get_body(body).unwrap().is_frozen());
    world.validate().unwrap();
}

#[derive(Default)]
struct DestructionLog {
    joints: Vec<JointHandle>,
    shapes: Vec<ShapeHandle>,
}

struct SharedDestructionLog(Arc<Mutex<DestructionLog>>);

impl DestructionListener for SharedDestructionLog {
    fn joint_destroyed(&mut self, joint: JointHandle) {
        self.0.lock().unwrap().joints.push(joint);
    }

    fn shape_destroyed(&mut self, shape: ShapeHandle) {
        self.0.lock().unwrap().shapes.push(shape);
    }
}

#[test]
fn test_destroy_body_notifies_listener() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let log = Arc::new(Mutex::new(DestructionLog::default()));
    world.set_destruction_listener(Box::new(SharedDestructionLog(log.clone())));

    let anchor = world.create_body(&BodyDef::at(Vector2::new(0.0, 10.0))).unwrap();
    let body = add_dynamic(&mut world, Vector2::new(0.0, 7.0), ShapeDef::circle(0.5).unwrap());
    let shape = world.get_body(body).unwrap().get_shapes()[0];

    let def = DistanceJointDef::initialize(
        anchor,
        world.get_body(anchor).unwrap(),
        body,
        world.get_body(body).unwrap(),
        Vector2::new(0.0, 10.0),
        Vector2::new(0.0, 7.0),
    );
    let joint = world.create_joint(&JointDef::from(def)).unwrap();
    run(&mut world, 10);

    world.destroy_body(body).unwrap();

    let log = log.lock().unwrap();
    assert_eq!(log.joints, vec![joint]);
    assert_eq!(log.shapes, vec![shape]);
    assert_eq!(world.get_joint_count(), 0);
    assert!(world.get_body(anchor).unwrap().get_joint_edges().is_empty());
    assert!(world.get_joint(joint).is_err());
}

#[test]
fn test_edge_chain_supports_ball() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let vertices = [
        Vector2::new(-10.0, 2.0),
        Vector2::new(-3.0, 0.0),
        Vector2::new(3.0, 0.0),
        Vector2::new(10.0, 2.0),
    ];
    let edges = world
        .create_edge_chain(ground, &vertices, &ShapeDef::edge(Vector2::zero(), Vector2::new(1.0, 0.0)).unwrap())
        .unwrap();
    assert_eq!(edges.len(), 3);
    assert!(world.create_edge_chain(ground, &vertices[..1], &ShapeDef::circle(1.0).unwrap()).is_err());

    let ball = add_dynamic(&mut world, Vector2::new(0.0, 3.0), ShapeDef::circle(0.5).unwrap());
    run(&mut world, 180);

    let y = world.get_body(ball).unwrap().get_position().y;
    assert!(y > 0.4 && y < 0.6, "ball rests at {}", y);
}

#[test]
fn test_raycast_solid_shapes() {
    let mut world = make_world(Vector2::zero());
    let body = world.create_body(&BodyDef::default()).unwrap();
    world.create_shape(body, &ShapeDef::boxed(1.0, 1.0).unwrap()).unwrap();

    let inside = sweep2d::Segment::new(Vector2::zero(), Vector2::new(5.0, 0.0));
    assert!(world.raycast(&inside, 4, false).is_empty());

    let hits = world.raycast(&inside, 4, true);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].lambda, 0.0);

    let outside = sweep2d::Segment::new(Vector2::new(-5.0, 0.0), Vector2::new(5.0, 0.0));
    let hit = world.raycast_one(&outside, false).unwrap();
    assert_relative_eq!(hit.lambda, 0.4, epsilon = 1.0e-4);
    assert_relative_eq!(hit.normal, Vector2::new(-1.0, 0.0), epsilon = 1.0e-5);

    let rejected = world.raycast_filtered(&outside, 4, false, |shape| shape.get_user_data() == 7);
    assert!(rejected.is_empty());
}

#[test]
fn test_stale_handles_are_errors() {
    let mut world = make_world(Vector2::zero());
    let body = world.create_body(&BodyDef::default()).unwrap();
    world.destroy_body(body).unwrap();

    assert!(world.get_body(body).is_err());
    assert!(world.destroy_body(body).is_err());
    assert!(world.create_shape(body, &ShapeDef::circle(1.0).unwrap()).is_err());
    assert!(world.step(-1.0, 10, 8).is_err());
}
