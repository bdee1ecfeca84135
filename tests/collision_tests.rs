use sweep2d::collision::{distance, CollisionRegistry, ContactManifolds};
use sweep2d::math::{Transform2, Vector2};
use sweep2d::shapes::{
    CircleShape, ConcaveArcShape, EdgeShape, Geometry, PolygonShape, ShapeKind, ShapeType,
};
use approx::assert_relative_eq;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn circle() -> ShapeKind {
    ShapeKind::Circle(CircleShape::new(Vector2::zero(), 0.5).unwrap())
}

fn small_box() -> ShapeKind {
    ShapeKind::Polygon(PolygonShape::new_box(0.5, 0.5).unwrap())
}

fn edge() -> ShapeKind {
    ShapeKind::Edge(EdgeShape::new(Vector2::new(-0.5, 0.0), Vector2::new(0.5, 0.0)).unwrap())
}

/// A unit-half-width square whose left side is bitten by an arc of radius 2
fn arc_square() -> ShapeKind {
    let vertices = [
        Vector2::new(-1.0, -1.0),
        Vector2::new(1.0, -1.0),
        Vector2::new(1.0, 1.0),
        Vector2::new(-1.0, 1.0),
    ];
    ShapeKind::ConcaveArc(ConcaveArcShape::new(&vertices, 2.0).unwrap())
}

/// Overlapping placements for every registered pair, the first shape at the origin
fn overlapping_cases() -> Vec<(ShapeKind, ShapeKind, Transform2)> {
    let at = |x: f32, y: f32| Transform2::from_position_angle(Vector2::new(x, y), 0.0);
    vec![
        (circle(), circle(), at(0.8, 0.1)),
        (small_box(), circle(), at(0.8, 0.1)),
        (small_box(), small_box(), at(0.8, 0.1)),
        (circle(), edge(), at(0.2, 0.4)),
        (small_box(), edge(), at(0.3, 0.45)),
        (arc_square(), circle(), at(1.3, 0.1)),
        (arc_square(), small_box(), at(1.3, 0.1)),
        (arc_square(), edge(), at(0.8, 0.95)),
    ]
}

fn collide(
    registry: &CollisionRegistry,
    a: &ShapeKind,
    xf_a: &Transform2,
    b: &ShapeKind,
    xf_b: &Transform2,
) -> ContactManifolds {
    let mut out = ContactManifolds::new();
    assert!(registry.collide(a, xf_a, b, xf_b, &ContactManifolds::new(), &mut out));
    out
}

#[test]
fn test_manifold_normals_are_antisymmetric() {
    let registry = CollisionRegistry::new();
    let origin = Transform2::identity();

    for (a, b, xf_b) in overlapping_cases() {
        let ab = collide(&registry, &a, &origin, &b, &xf_b);
        let ba = collide(&registry, &b, &xf_b, &a, &origin);

        assert!(!ab.is_empty(), "{:?} vs {:?} should touch", a.shape_type(), b.shape_type());
        assert_eq!(ab.len(), ba.len());
        assert_eq!(ab.point_count(), ba.point_count());

        for (m1, m2) in ab.iter().zip(ba.iter()) {
            assert_relative_eq!(m1.normal, -m2.normal, epsilon = 1.0e-5);
            assert_relative_eq!(m1.min_separation(), m2.min_separation(), epsilon = 1.0e-5);
        }
    }
}

fn assert_antisymmetric(registry: &CollisionRegistry, a: &ShapeKind, b: &ShapeKind, xf_b: &Transform2) {
    let origin = Transform2::identity();
    let ab = collide(registry, a, &origin, b, xf_b);
    let ba = collide(registry, b, xf_b, a, &origin);

    assert_eq!(ab.len(), ba.len(), "{:?} vs {:?} at {:?}", a.shape_type(), b.shape_type(), xf_b.position);
    assert_eq!(ab.point_count(), ba.point_count());
    for (m1, m2) in ab.iter().zip(ba.iter()) {
        assert!(
            (m1.normal + m2.normal).length() < 1.0e-5,
            "{:?} vs {:?} at {:?}: {:?} and {:?}",
            a.shape_type(),
            b.shape_type(),
            xf_b.position,
            m1.normal,
            m2.normal
        );
        assert_relative_eq!(m1.min_separation(), m2.min_separation(), epsilon = 1.0e-5);
    }
}

#[test]
fn test_equal_boxes_touching_at_corner() {
    let registry = CollisionRegistry::new();
    let xf = Transform2::from_position_angle(Vector2::new(0.9, 0.9), 0.0);

    let ab = collide(&registry, &small_box(), &Transform2::identity(), &small_box(), &xf);
    assert_eq!(ab.len(), 1);
    assert_antisymmetric(&registry, &small_box(), &small_box(), &xf);
}

#[test]
fn test_antisymmetry_at_tied_and_random_placements() {
    let registry = CollisionRegistry::new();
    let pairs = [(small_box(), small_box()), (small_box(), circle()), (small_box(), edge())];

    // Axis-aligned and diagonal offsets put separations on exact ties.
    let mut placements = Vec::new();
    for d in [0.3f32, 0.6, 0.9, 0.95] {
        for (x, y) in [(d, 0.0), (0.0, d), (-d, 0.0), (0.0, -d), (d, d), (-d, d), (d, -d), (-d, -d)] {
            placements.push(Transform2::from_position_angle(Vector2::new(x, y), 0.0));
        }
    }

    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let position = Vector2::new(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0));
        let angle = if rng.gen_bool(0.5) { 0.0 } else { rng.gen_range(-3.0..3.0) };
        placements.push(Transform2::from_position_angle(position, angle));
    }

    for (a, b) in &pairs {
        for xf in &placements {
            assert_antisymmetric(&registry, a, b, xf);
        }
    }
}

#[test]
fn test_separated_shapes_produce_no_manifold() {
    let registry = CollisionRegistry::new();
    let origin = Transform2::identity();
    let far = Transform2::from_position_angle(Vector2::new(5.0, 5.0), 0.3);

    for (a, b, _) in overlapping_cases() {
        assert!(collide(&registry, &a, &origin, &b, &far).is_empty());
        assert!(collide(&registry, &b, &far, &a, &origin).is_empty());
    }
}

#[test]
fn test_manifold_point_cap() {
    let registry = CollisionRegistry::new();
    let origin = Transform2::identity();
    let resting = Transform2::from_position_angle(Vector2::new(0.0, 0.99), 0.0);

    let manifolds = collide(&registry, &small_box(), &origin, &small_box(), &resting);
    assert_eq!(manifolds.len(), 1);
    assert_eq!(manifolds.as_slice()[0].point_count, 2);
    assert_relative_eq!(manifolds.as_slice()[0].normal, Vector2::new(0.0, 1.0), epsilon = 1.0e-6);
}

#[test]
fn test_distance_is_symmetric() {
    let shapes = [circle(), small_box(), edge(), arc_square()];
    let origin = Transform2::identity();
    let xf = Transform2::from_position_angle(Vector2::new(4.0, 1.5), 0.7);

    for a in &shapes {
        for b in &shapes {
            let (pa, pb) = (a.distance_proxy(), b.distance_proxy());
            let ab = distance(&pa, &origin, &pb, &xf);
            let ba = distance(&pb, &xf, &pa, &origin);

            assert!(ab.distance > 0.0);
            assert_relative_eq!(ab.distance, ba.distance, epsilon = 1.0e-4);
            assert_relative_eq!(ab.point_a, ba.point_b, epsilon = 1.0e-3);
        }
    }
}

#[test]
fn test_unregistered_pairs() {
    let registry = CollisionRegistry::new();
    assert!(!registry.is_registered(ShapeType::Edge, ShapeType::Edge));
    assert!(!registry.is_registered(ShapeType::ConcaveArc, ShapeType::ConcaveArc));

    for a in ShapeType::ALL {
        for b in ShapeType::ALL {
            assert_eq!(registry.is_registered(a, b), registry.is_registered(b, a));
        }
    }

    let empty = CollisionRegistry::empty();
    let mut out = ContactManifolds::new();
    let origin = Transform2::identity();
    assert!(!empty.collide(&circle(), &origin, &circle(), &origin, &ContactManifolds::new(), &mut out));
    assert!(out.is_empty());
}
