use sweep2d::constraints::{DistanceJoint, Joint, JointType, LimitState, PrismaticJoint, PulleyJoint};
use sweep2d::{Aabb, BodyDef, BodyHandle, MassData, Vector2, World};
use sweep2d::{DistanceJointDef, JointDef, PrismaticJointDef, PulleyJointDef};
use approx::assert_relative_eq;

const DT: f32 = 1.0 / 60.0;

fn make_world(gravity: Vector2) -> World {
    let bounds = Aabb::new(Vector2::new(-100.0, -100.0), Vector2::new(100.0, 100.0));
    World::new(bounds, gravity, false).unwrap()
}

fn add_point_mass(world: &mut World, position: Vector2, mass: f32) -> BodyHandle {
    let body = world.create_body(&BodyDef::at(position)).unwrap();
    let mass_data = MassData { mass, center: Vector2::zero(), inertia: mass * 0.1 };
    world.set_mass(body, &mass_data).unwrap();
    body
}

fn step(world: &mut World) {
    world.step(DT, 10, 8).unwrap();
}

#[test]
fn test_pulley_keeps_rope_length() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let body1 = add_point_mass(&mut world, Vector2::new(-2.0, 5.0), 1.0);
    let body2 = add_point_mass(&mut world, Vector2::new(2.0, 7.0), 2.5);

    let def = PulleyJointDef::initialize(
        body1,
        world.get_body(body1).unwrap(),
        body2,
        world.get_body(body2).unwrap(),
        Vector2::new(-2.0, 10.0),
        Vector2::new(2.0, 10.0),
        Vector2::new(-2.0, 5.0),
        Vector2::new(2.0, 7.0),
        2.0,
    );
    assert!(def.collide_connected);
    let joint = world.create_joint(&JointDef::from(def)).unwrap();
    assert_eq!(world.get_joint(joint).unwrap().joint_type(), JointType::Pulley);

    let constant = world.get_joint(joint).unwrap().downcast_ref::<PulleyJoint>().unwrap().get_constant();
    assert_relative_eq!(constant, 11.0, epsilon = 1.0e-5);

    for _ in 0..90 {
        step(&mut world);

        let pulley = world.get_joint(joint).unwrap().downcast_ref::<PulleyJoint>().unwrap();
        let length1 = pulley.get_length1(world.get_body(body1).unwrap());
        let length2 = pulley.get_length2(world.get_body(body2).unwrap());
        let error = length1 + 2.0 * length2 - constant;
        assert!(error.abs() < 0.02, "rope length off by {}", error);
    }

    // The heavier side wins because 2.5 > 2 * 1.
    let y2 = world.get_body(body2).unwrap().get_position().y;
    assert!(y2 < 7.0 - 0.3, "body2 only fell to {}", y2);
    assert!(world.get_body(body1).unwrap().get_position().y > 5.0);
}

#[test]
fn test_distance_pendulum_holds_length() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let pivot = world.create_body(&BodyDef::at(Vector2::new(0.0, 10.0))).unwrap();
    let bob = add_point_mass(&mut world, Vector2::new(3.0, 10.0), 1.0);

    let def = DistanceJointDef::initialize(
        pivot,
        world.get_body(pivot).unwrap(),
        bob,
        world.get_body(bob).unwrap(),
        Vector2::new(0.0, 10.0),
        Vector2::new(3.0, 10.0),
    );
    let joint = world.create_joint(&def.into()).unwrap();
    assert_relative_eq!(
        world.get_joint(joint).unwrap().downcast_ref::<DistanceJoint>().unwrap().get_length(),
        3.0
    );

    let mut lowest = f32::MAX;
    for _ in 0..120 {
        step(&mut world);
        let p = world.get_body(bob).unwrap().get_position();
        let length = (p - Vector2::new(0.0, 10.0)).length();
        assert!((length - 3.0).abs() < 0.05, "pendulum length {}", length);
        lowest = lowest.min(p.y);
    }

    // The bob swung through the bottom of its arc.
    assert!(lowest < 7.2);
}

#[test]
fn test_distance_spring_oscillates() {
    let mut world = make_world(Vector2::zero());
    let anchor = world.create_body(&BodyDef::default()).unwrap();
    let body = add_point_mass(&mut world, Vector2::new(2.0, 0.0), 1.0);

    let def = DistanceJointDef::initialize(
        anchor,
        world.get_body(anchor).unwrap(),
        body,
        world.get_body(body).unwrap(),
        Vector2::zero(),
        Vector2::new(2.0, 0.0),
    )
    .with_spring(2.0, 0.1);
    world.create_joint(&def.into()).unwrap();

    // Stretch the spring and let it pull back.
    world.get_body_mut(body).unwrap().set_linear_velocity(Vector2::new(3.0, 0.0));
    let mut longest = 0.0f32;
    let mut pulled_back = false;
    for _ in 0..60 {
        step(&mut world);
        let b = world.get_body(body).unwrap();
        longest = longest.max(b.get_position().x);
        pulled_back = pulled_back || b.get_linear_velocity().x < 0.0;
    }

    assert!(longest > 2.05);
    assert!(pulled_back);
}

#[test]
fn test_prismatic_stops_at_lower_limit() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let slider = add_point_mass(&mut world, Vector2::new(0.0, 5.0), 1.0);

    let def = PrismaticJointDef::initialize(
        ground,
        world.get_body(ground).unwrap(),
        slider,
        world.get_body(slider).unwrap(),
        Vector2::new(0.0, 5.0),
        Vector2::new(0.0, 1.0),
    )
    .with_limits(-1.0, 1.0);
    let joint = world.create_joint(&def.into()).unwrap();

    for _ in 0..120 {
        step(&mut world);
    }

    let b1 = world.get_body(ground).unwrap();
    let b2 = world.get_body(slider).unwrap();
    let prismatic = world.get_joint(joint).unwrap().downcast_ref::<PrismaticJoint>().unwrap();

    assert_relative_eq!(prismatic.get_joint_translation(b1, b2), -1.0, epsilon = 0.02);
    assert_eq!(prismatic.get_limit_state(), LimitState::AtLower);
    assert!(b2.get_position().x.abs() < 1.0e-3);
    assert!(b2.get_angle().abs() < 1.0e-3);
    assert!(b2.get_linear_velocity().length() < 0.1);
}

#[test]
fn test_prismatic_motor_reaches_speed() {
    let mut world = make_world(Vector2::zero());
    let ground = world.create_body(&BodyDef::default()).unwrap();
    let slider = add_point_mass(&mut world, Vector2::new(0.0, 0.0), 1.0);

    let def = PrismaticJointDef::initialize(
        ground,
        world.get_body(ground).unwrap(),
        slider,
        world.get_body(slider).unwrap(),
        Vector2::zero(),
        Vector2::new(1.0, 0.0),
    )
    .with_motor(1.0, 1000.0);
    let joint = world.create_joint(&def.into()).unwrap();

    for _ in 0..30 {
        step(&mut world);
    }

    let b1 = world.get_body(ground).unwrap();
    let b2 = world.get_body(slider).unwrap();
    let prismatic = world.get_joint(joint).unwrap().downcast_ref::<PrismaticJoint>().unwrap();
    assert_relative_eq!(prismatic.get_joint_speed(b1, b2), 1.0, epsilon = 0.01);
    assert!(b2.get_position().y.abs() < 1.0e-3);
}

#[test]
fn test_destroy_joint_releases_bodies() {
    let mut world = make_world(Vector2::new(0.0, -10.0));
    let pivot = world.create_body(&BodyDef::at(Vector2::new(0.0, 10.0))).unwrap();
    let bob = add_point_mass(&mut world, Vector2::new(0.0, 7.0), 1.0);

    let def = DistanceJointDef::initialize(
        pivot,
        world.get_body(pivot).unwrap(),
        bob,
        world.get_body(bob).unwrap(),
        Vector2::new(0.0, 10.0),
        Vector2::new(0.0, 7.0),
    );
    let joint = world.create_joint(&def.into()).unwrap();
    for _ in 0..30 {
        step(&mut world);
    }
    assert_relative_eq!(world.get_body(bob).unwrap().get_position().y, 7.0, epsilon = 0.05);

    world.destroy_joint(joint).unwrap();
    assert!(world.get_joint(joint).is_err());
    assert!(world.get_body(bob).unwrap().get_joint_edges().is_empty());

    for _ in 0..30 {
        step(&mut world);
    }
    assert!(world.get_body(bob).unwrap().get_position().y < 6.0);
}

#[test]
fn test_joint_with_missing_body_is_rejected() {
    let mut world = make_world(Vector2::zero());
    let a = world.create_body(&BodyDef::default()).unwrap();
    let b = add_point_mass(&mut world, Vector2::new(1.0, 0.0), 1.0);

    let def = DistanceJointDef::initialize(
        a,
        world.get_body(a).unwrap(),
        b,
        world.get_body(b).unwrap(),
        Vector2::zero(),
        Vector2::new(1.0, 0.0),
    );
    world.destroy_body(b).unwrap();

    assert!(world.create_joint(&def.into()).is_err());
    assert_eq!(world.get_joint_count(), 0);
}
