use crate::collision::distance::{distance, DistanceProxy};
use crate::core::config::MAX_TOI_ITERATIONS;
use crate::math::{Sweep, EPSILON};

/// One swept shape taking part in a time-of-impact query
#[derive(Debug, Clone, Copy)]
pub struct ToiProxy<'a> {
    /// Core proxy of the shape
    pub proxy: &'a DistanceProxy,

    /// Motion of the owning body over the step
    pub sweep: &'a Sweep,

    /// Furthest distance from the body's center of mass to the shape
    pub sweep_radius: f32,
}

/// Finds the first fraction of the step at which two swept shapes come within `toi_slop`
///
/// Uses conservative advancement: at each candidate time the distance is
/// divided by an upper bound on the closing speed, so the shapes never pass
/// through each other. Returns 1 when they do not meet within the step.
/// Both sweeps must share the same `t0`.
pub fn time_of_impact(a: &ToiProxy<'_>, b: &ToiProxy<'_>, toi_slop: f32) -> f32 {
    let sweep1 = a.sweep;
    let sweep2 = b.sweep;

    let r1 = a.sweep_radius;
    let r2 = b.sweep_radius;

    let t0 = sweep1.t0;
    let v1 = sweep1.linear_motion();
    let v2 = sweep2.linear_motion();
    let omega1 = sweep1.angular_motion();
    let omega2 = sweep2.angular_motion();

    let mut alpha = 0.0f32;
    let mut target_distance = 0.0f32;

    let mut iter = 0;
    loop {
        let t = (1.0 - alpha) * t0 + alpha;
        let xf1 = sweep1.get_transform(t);
        let xf2 = sweep2.get_transform(t);

        // Get the distance between shapes.
        let output = distance(a.proxy, &xf1, b.proxy, &xf2);
        let dist = output.distance;

        if iter == 0 {
            // Compute a reasonable target distance to give some breathing room
            // for conservative advancement.
            target_distance = if dist > 2.0 * toi_slop {
                1.5 * toi_slop
            } else {
                (0.05 * toi_slop).max(dist - 0.5 * toi_slop)
            };
        }

        if dist - target_distance < 0.05 * toi_slop || iter == MAX_TOI_ITERATIONS {
            break;
        }

        let normal = (output.point_b - output.point_a).normalize();

        // Compute upper bound on remaining movement.
        let approach_velocity_bound = normal.dot(&(v1 - v2)) + omega1.abs() * r1 + omega2.abs() * r2;
        if approach_velocity_bound.abs() < EPSILON {
            alpha = 1.0;
            break;
        }

        // Get the conservative time increment. Don't advance all the way.
        let d_alpha = (dist - target_distance) / approach_velocity_bound;
        let new_alpha = alpha + d_alpha;

        // The shapes may be moving apart or a safety factor may be too small.
        if !(0.0..=1.0).contains(&new_alpha) {
            alpha = 1.0;
            break;
        }

        // Ensure significant advancement.
        if new_alpha < (1.0 + 100.0 * f32::EPSILON) * alpha {
            break;
        }

        alpha = new_alpha;
        iter += 1;
    }

    alpha
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::TOI_SLOP;
    use crate::math::Vector2;
    use approx::assert_relative_eq;

    fn linear_sweep(from: Vector2, to: Vector2) -> Sweep {
        Sweep {
            local_center: Vector2::zero(),
            c0: from,
            c: to,
            a0: 0.0,
            a: 0.0,
            t0: 0.0,
        }
    }

    #[test]
    fn test_bullet_meets_wall() {
        let bullet = DistanceProxy::new(&[Vector2::zero()], 0.1);
        let wall = DistanceProxy::new(&[Vector2::new(0.0, -5.0), Vector2::new(0.0, 5.0)], 0.0);

        let bullet_sweep = linear_sweep(Vector2::new(-10.0, 0.0), Vector2::new(10.0, 0.0));
        let wall_sweep = linear_sweep(Vector2::zero(), Vector2::zero());

        let toi = time_of_impact(
            &ToiProxy { proxy: &bullet, sweep: &bullet_sweep, sweep_radius: 0.1 },
            &ToiProxy { proxy: &wall, sweep: &wall_sweep, sweep_radius: 5.0 },
            TOI_SLOP,
        );

        // The bullet stops just short of the wall.
        let x = -10.0 + 20.0 * toi;
        assert!(toi < 1.0);
        assert_relative_eq!(x, -0.1 - 1.5 * TOI_SLOP, epsilon = 0.5 * TOI_SLOP);
    }

    #[test]
    fn test_separating_shapes_do_not_impact() {
        let a = DistanceProxy::new(&[Vector2::zero()], 0.5);
        let sweep_a = linear_sweep(Vector2::zero(), Vector2::new(-5.0, 0.0));
        let sweep_b = linear_sweep(Vector2::new(2.0, 0.0), Vector2::new(2.0, 0.0));

        let toi = time_of_impact(
            &ToiProxy { proxy: &a, sweep: &sweep_a, sweep_radius: 0.5 },
            &ToiProxy { proxy: &a, sweep: &sweep_b, sweep_radius: 0.5 },
            TOI_SLOP,
        );
        assert_eq!(toi, 1.0);
    }
}
