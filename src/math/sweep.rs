#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

use super::{Rotation2, Transform2, Vector2, EPSILON};

/// Describes the motion of a body over one time step
///
/// The center of mass moves from `c0` to `c` and the angle from `a0` to `a`.
/// `t0` is the fraction of the step already consumed by earlier
/// time-of-impact sub-steps.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Sweep {
    /// Center of mass in body-local coordinates
    pub local_center: Vector2,
    /// World center of mass at `t0`
    pub c0: Vector2,
    /// World center of mass at the end of the step
    pub c: Vector2,
    /// Angle at `t0`
    pub a0: f32,
    /// Angle at the end of the step
    pub a: f32,
    /// Time interval start in `[0, 1]`
    pub t0: f32,
}

impl Sweep {
    /// Creates a sweep resting at a single body transform
    pub fn at_rest(local_center: Vector2, xf: &Transform2) -> Self {
        let c = xf.transform_point(local_center);
        let a = xf.angle();
        Self {
            local_center,
            c0: c,
            c,
            a0: a,
            a,
            t0: 0.0,
        }
    }

    /// Returns the body transform at fraction `t` of the step
    pub fn get_transform(&self, t: f32) -> Transform2 {
        let (c, a) = if 1.0 - self.t0 > EPSILON {
            let alpha = (t - self.t0) / (1.0 - self.t0);
            (
                self.c0 * (1.0 - alpha) + self.c * alpha,
                (1.0 - alpha) * self.a0 + alpha * self.a,
            )
        } else {
            (self.c, self.a)
        };

        let rotation = Rotation2::new(a);
        Transform2::new(c - rotation.rotate(self.local_center), rotation)
    }

    /// Returns the body transform at the start of the sweep
    pub fn start_transform(&self) -> Transform2 {
        let rotation = Rotation2::new(self.a0);
        Transform2::new(self.c0 - rotation.rotate(self.local_center), rotation)
    }

    /// Advances the start of the sweep to time `t`, keeping the end unchanged
    pub fn advance(&mut self, t: f32) {
        if self.t0 < t && 1.0 - self.t0 > EPSILON {
            let alpha = (t - self.t0) / (1.0 - self.t0);
            self.c0 = self.c0 * (1.0 - alpha) + self.c * alpha;
            self.a0 = (1.0 - alpha) * self.a0 + alpha * self.a;
            self.t0 = t;
        }
    }

    /// Linear displacement over the remaining interval
    #[inline]
    pub fn linear_motion(&self) -> Vector2 {
        self.c - self.c0
    }

    /// Angular displacement over the remaining interval
    #[inline]
    pub fn angular_motion(&self) -> f32 {
        self.a - self.a0
    }
}
