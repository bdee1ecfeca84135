use std::ops::Mul;

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

use super::{Rotation2, Vector2};

/// A rigid 2D transform made of a translation and a rotation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Transform2 {
    pub position: Vector2,
    pub rotation: Rotation2,
}

impl Transform2 {
    /// Creates a new transform
    #[inline]
    pub fn new(position: Vector2, rotation: Rotation2) -> Self {
        Self { position, rotation }
    }

    /// Creates a transform from a position and an angle in radians
    #[inline]
    pub fn from_position_angle(position: Vector2, angle: f32) -> Self {
        Self::new(position, Rotation2::new(angle))
    }

    /// Creates a pure translation
    #[inline]
    pub fn from_position(position: Vector2) -> Self {
        Self::new(position, Rotation2::identity())
    }

    /// The identity transform
    #[inline]
    pub fn identity() -> Self {
        Self::new(Vector2::zero(), Rotation2::identity())
    }

    /// Sets the position and angle
    #[inline]
    pub fn set(&mut self, position: Vector2, angle: f32) {
        self.position = position;
        self.rotation.set(angle);
    }

    /// Returns the angle of the rotation part
    #[inline]
    pub fn angle(&self) -> f32 {
        self.rotation.angle()
    }

    /// Transforms a local point into world space
    #[inline]
    pub fn transform_point(&self, p: Vector2) -> Vector2 {
        self.position + self.rotation.rotate(p)
    }

    /// Transforms a world point into local space
    #[inline]
    pub fn inverse_transform_point(&self, p: Vector2) -> Vector2 {
        self.rotation.inverse_rotate(p - self.position)
    }

    /// Rotates a local vector into world space
    #[inline]
    pub fn transform_vector(&self, v: Vector2) -> Vector2 {
        self.rotation.rotate(v)
    }

    /// Rotates a world vector into local space
    #[inline]
    pub fn inverse_transform_vector(&self, v: Vector2) -> Vector2 {
        self.rotation.inverse_rotate(v)
    }

    /// Returns the transform that maps this frame's local points into `other`'s frame
    pub fn relative_to(&self, other: &Self) -> Self {
        Self::new(
            other.inverse_transform_point(self.position),
            other.rotation.mul_t_rot(&self.rotation),
        )
    }
}

impl Mul<Vector2> for Transform2 {
    type Output = Vector2;

    #[inline]
    fn mul(self, p: Vector2) -> Vector2 {
        self.transform_point(p)
    }
}
