use sweep2d::{Aabb, BodyDef, BodyHandle, ShapeDef, SimulationConfig, Vector2, World};

const DT: f32 = 1.0 / 60.0;

fn make_world(continuous_physics: bool) -> World {
    let bounds = Aabb::new(Vector2::new(-100.0, -100.0), Vector2::new(100.0, 100.0));
    let mut config = SimulationConfig::new(Vector2::zero(), false);
    config.continuous_physics = continuous_physics;
    World::with_config(bounds, config).unwrap()
}

/// A thin static wall centered on x = 5
fn add_wall(world: &mut World) {
    let wall = world.create_body(&BodyDef::at(Vector2::new(5.0, 0.0))).unwrap();
    world.create_shape(wall, &ShapeDef::boxed(0.05, 5.0).unwrap()).unwrap();
}

fn add_bullet(world: &mut World, speed: f32) -> BodyHandle {
    let bullet = world
        .create_body(&BodyDef::at(Vector2::zero()).with_bullet(true))
        .unwrap();
    world
        .create_shape(bullet, &ShapeDef::circle(0.1).unwrap().with_density(1.0))
        .unwrap();
    world.set_mass_from_shapes(bullet).unwrap();
    world.get_body_mut(bullet).unwrap().set_linear_velocity(Vector2::new(speed, 0.0));
    bullet
}

#[test]
fn test_fast_circle_does_not_tunnel_static_wall() {
    let mut world = make_world(true);
    add_wall(&mut world);
    let bullet = add_bullet(&mut world, 200.0);

    let slop = world.get_config().toi_slop;
    for _ in 0..60 {
        world.step(DT, 10, 8).unwrap();
        let x = world.get_body(bullet).unwrap().get_position().x;
        // The circle's leading edge never sinks deeper than the slop.
        assert!(x + 0.1 <= 4.95 + slop, "bullet at {}", x);
    }

    assert!(world.get_body(bullet).unwrap().get_linear_velocity().x < 200.0);
}

#[test]
fn test_large_steps_still_stop_at_wall() {
    let mut world = make_world(true);
    add_wall(&mut world);
    let bullet = add_bullet(&mut world, 150.0);

    let slop = world.get_config().toi_slop;
    for dt in [0.1, 0.25, 0.5] {
        world.step(dt, 10, 8).unwrap();
        let x = world.get_body(bullet).unwrap().get_position().x;
        assert!(x + 0.1 <= 4.95 + slop, "bullet at {} after dt {}", x, dt);
    }
}

#[test]
fn test_discrete_stepping_tunnels() {
    let mut world = make_world(false);
    add_wall(&mut world);
    let bullet = add_bullet(&mut world, 200.0);

    for _ in 0..3 {
        world.step(DT, 10, 8).unwrap();
    }

    // Without the continuous pass nothing catches the crossing.
    assert!(world.get_body(bullet).unwrap().get_position().x > 5.0);
}

#[test]
fn test_bullet_does_not_pass_dynamic_plank() {
    let mut world = make_world(true);

    let plank = world.create_body(&BodyDef::at(Vector2::new(5.0, 0.0))).unwrap();
    world
        .create_shape(plank, &ShapeDef::boxed(0.05, 1.0).unwrap().with_density(1.0))
        .unwrap();
    world.set_mass_from_shapes(plank).unwrap();

    let bullet = add_bullet(&mut world, 200.0);

    for _ in 0..30 {
        world.step(DT, 10, 8).unwrap();
        let bullet_x = world.get_body(bullet).unwrap().get_position().x;
        let plank_x = world.get_body(plank).unwrap().get_position().x;
        assert!(bullet_x < plank_x, "bullet at {} passed plank at {}", bullet_x, plank_x);
    }

    // The plank was hit.
    assert!(world.get_body(plank).unwrap().get_linear_velocity().x > 0.0);
}
