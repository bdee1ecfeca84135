use std::ops::Mul;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

use super::{Mat22, Vector2};

/// A 2D rotation stored as its cosine and sine
///
/// Keeping the pair around instead of an angle means rotating points never
/// has to call back into trigonometry.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Rotation2 {
    /// Cosine of the angle
    pub c: f32,
    /// Sine of the angle
    pub s: f32,
}

impl Default for Rotation2 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Rotation2 {
    /// Creates a rotation from an angle in radians
    #[inline]
    pub fn new(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { c, s }
    }

    /// The identity rotation
    #[inline]
    pub const fn identity() -> Self {
        Self { c: 1.0, s: 0.0 }
    }

    /// Creates a rotation from a direction, which does not need to be normalized
    ///
    /// A zero direction yields the identity.
    pub fn from_direction(direction: Vector2) -> Self {
        let length = direction.length();
        if length <= super::EPSILON {
            return Self::identity();
        }
        Self {
            c: direction.x / length,
            s: direction.y / length,
        }
    }

    /// Sets the rotation from an angle in radians
    #[inline]
    pub fn set(&mut self, angle: f32) {
        let (s, c) = angle.sin_cos();
        self.c = c;
        self.s = s;
    }

    /// Returns the angle of the rotation in radians
    #[inline]
    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// The rotated x axis
    #[inline]
    pub fn x_axis(&self) -> Vector2 {
        Vector2::new(self.c, self.s)
    }

    /// The rotated y axis
    #[inline]
    pub fn y_axis(&self) -> Vector2 {
        Vector2::new(-self.s, self.c)
    }

    /// Rotates a vector
    #[inline]
    pub fn rotate(&self, v: Vector2) -> Vector2 {
        Vector2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Rotates a vector by the inverse rotation
    #[inline]
    pub fn inverse_rotate(&self, v: Vector2) -> Vector2 {
        Vector2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Returns the inverse rotation
    #[inline]
    pub fn inverse(&self) -> Self {
        Self { c: self.c, s: -self.s }
    }

    /// Composes two rotations: `self * other`
    #[inline]
    pub fn mul_rot(&self, other: &Self) -> Self {
        Self {
            c: self.c * other.c - self.s * other.s,
            s: self.s * other.c + self.c * other.s,
        }
    }

    /// Composes the inverse of this rotation with another: `self^T * other`
    #[inline]
    pub fn mul_t_rot(&self, other: &Self) -> Self {
        Self {
            c: self.c * other.c + self.s * other.s,
            s: self.c * other.s - self.s * other.c,
        }
    }

    /// Returns the equivalent rotation matrix
    #[inline]
    pub fn to_matrix(&self) -> Mat22 {
        Mat22::from_elements(self.c, -self.s, self.s, self.c)
    }
}

impl Mul<Vector2> for Rotation2 {
    type Output = Vector2;

    #[inline]
    fn mul(self, v: Vector2) -> Vector2 {
        self.rotate(v)
    }
}

impl Mul for Rotation2 {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        self.mul_rot(&other)
    }
}
