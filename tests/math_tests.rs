use sweep2d::math::{Aabb, Mat22, Rotation2, Segment, Sweep, Transform2, Vector2};
use std::f32::consts::PI;
use approx::{assert_abs_diff_eq, assert_relative_eq};

#[test]
fn test_vector2_operations() {
    let v1 = Vector2::new(1.0, 2.0);
    let v2 = Vector2::new(3.0, -4.0);

    assert_eq!(v1 + v2, Vector2::new(4.0, -2.0));
    assert_eq!(v2 - v1, Vector2::new(2.0, -6.0));
    assert_eq!(v1 * 2.0, Vector2::new(2.0, 4.0));
    assert_eq!(-v1, Vector2::new(-1.0, -2.0));

    assert_eq!(v1.dot(&v2), 3.0 - 8.0);
    assert_eq!(v1.cross(&v2), 1.0 * -4.0 - 2.0 * 3.0);
    assert_relative_eq!(v2.length(), 5.0);

    // v x s and s x v are perpendicular to v with opposite signs.
    let a = v1.cross_scalar(2.0);
    let b = Vector2::scalar_cross(2.0, &v1);
    assert_eq!(a, Vector2::new(4.0, -2.0));
    assert_eq!(b, Vector2::new(-4.0, 2.0));
    assert_eq!(a.dot(&v1), 0.0);
}

#[test]
fn test_normalize_degenerate() {
    let mut v = Vector2::new(1.0e-9, 0.0);
    assert_eq!(v.normalize_mut(), 0.0);
    assert!(v.is_valid());

    let mut w = Vector2::new(0.0, 3.0);
    assert_relative_eq!(w.normalize_mut(), 3.0);
    assert_relative_eq!(w, Vector2::new(0.0, 1.0));
}

#[test]
fn test_nalgebra_conversion() {
    let v = Vector2::new(1.5, -2.5);
    let na = v.to_nalgebra();
    assert_eq!(na.x, 1.5);
    assert_eq!(Vector2::from_nalgebra(&na), v);
}

#[test]
fn test_mat22_solve() {
    let m = Mat22::from_elements(2.0, 1.0, 1.0, 3.0);
    let x = m.solve(Vector2::new(3.0, 5.0));
    assert_relative_eq!(m.mul_vec(x), Vector2::new(3.0, 5.0), epsilon = 1.0e-5);

    // Singular matrices solve to zero instead of dividing by zero.
    let singular = Mat22::from_elements(1.0, 2.0, 2.0, 4.0);
    assert!(singular.solve(Vector2::new(1.0, 1.0)).is_valid());
}

#[test]
fn test_rotation_and_transform() {
    let r = Rotation2::new(PI / 2.0);
    assert_abs_diff_eq!(r.rotate(Vector2::new(1.0, 0.0)), Vector2::new(0.0, 1.0), epsilon = 1.0e-6);
    assert_abs_diff_eq!(r.inverse_rotate(Vector2::new(0.0, 1.0)), Vector2::new(1.0, 0.0), epsilon = 1.0e-6);

    let xf = Transform2::from_position_angle(Vector2::new(2.0, 3.0), PI / 2.0);
    let p = xf.transform_point(Vector2::new(1.0, 0.0));
    assert_abs_diff_eq!(p, Vector2::new(2.0, 4.0), epsilon = 1.0e-6);
    assert_abs_diff_eq!(xf.inverse_transform_point(p), Vector2::new(1.0, 0.0), epsilon = 1.0e-6);
    assert_relative_eq!(xf.angle(), PI / 2.0, epsilon = 1.0e-6);
}

#[test]
fn test_aabb() {
    let a = Aabb::new(Vector2::new(0.0, 0.0), Vector2::new(2.0, 2.0));
    let b = Aabb::new(Vector2::new(1.0, 1.0), Vector2::new(3.0, 3.0));
    let c = Aabb::new(Vector2::new(5.0, 5.0), Vector2::new(6.0, 6.0));

    assert!(a.is_valid());
    assert!(a.intersects(&b));
    assert!(!a.intersects(&c));
    assert_eq!(a.combine(&c), Aabb::new(Vector2::new(0.0, 0.0), Vector2::new(6.0, 6.0)));
    assert!(!Aabb::new(Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0)).is_valid());
}

#[test]
fn test_segment_intersection() {
    let s1 = Segment::new(Vector2::new(0.0, -1.0), Vector2::new(0.0, 1.0));
    let s2 = Segment::new(Vector2::new(-1.0, 0.0), Vector2::new(1.0, 0.0));

    let (lambda, normal) = s2.test_segment(&s1, 1.0).unwrap();
    assert_relative_eq!(lambda, 0.5, epsilon = 1.0e-6);
    assert_relative_eq!(normal.dot(&Vector2::new(0.0, 1.0)).abs(), 1.0, epsilon = 1.0e-6);

    let far = Segment::new(Vector2::new(5.0, -1.0), Vector2::new(5.0, 1.0));
    assert!(s2.test_segment(&far, 1.0).is_none());
}

#[test]
fn test_sweep_interpolation() {
    let xf = Transform2::from_position_angle(Vector2::zero(), 0.0);
    let mut sweep = Sweep::at_rest(Vector2::zero(), &xf);
    sweep.c = Vector2::new(4.0, 0.0);
    sweep.a = 1.0;

    let mid = sweep.get_transform(0.5);
    assert_relative_eq!(mid.position, Vector2::new(2.0, 0.0), epsilon = 1.0e-6);
    assert_relative_eq!(mid.angle(), 0.5, epsilon = 1.0e-6);

    sweep.advance(0.25);
    assert_relative_eq!(sweep.c0, Vector2::new(1.0, 0.0), epsilon = 1.0e-6);
    assert_relative_eq!(sweep.t0, 0.25);

    // The end of the sweep is unchanged.
    assert_relative_eq!(sweep.get_transform(1.0).position, Vector2::new(4.0, 0.0), epsilon = 1.0e-6);
}
