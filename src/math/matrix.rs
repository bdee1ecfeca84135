use nalgebra as na;
use std::ops::{Add, Mul};

#[cfg(feature = "serialize")]
use serde::{Serialize, Deserialize};

use super::Vector2;

/// A 2x2 matrix stored as two column vectors
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
pub struct Mat22 {
    pub col1: Vector2,
    pub col2: Vector2,
}

impl Default for Mat22 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat22 {
    /// Creates a matrix from two columns
    #[inline]
    pub const fn new(col1: Vector2, col2: Vector2) -> Self {
        Self { col1, col2 }
    }

    /// Creates a matrix from its four components in row-major order
    #[inline]
    pub fn from_elements(a11: f32, a12: f32, a21: f32, a22: f32) -> Self {
        Self::new(Vector2::new(a11, a21), Vector2::new(a12, a22))
    }

    /// The identity matrix
    #[inline]
    pub const fn identity() -> Self {
        Self::new(Vector2::new(1.0, 0.0), Vector2::new(0.0, 1.0))
    }

    /// The zero matrix
    #[inline]
    pub const fn zero() -> Self {
        Self::new(Vector2::zero(), Vector2::zero())
    }

    /// Builds a rotation matrix from an angle in radians
    #[inline]
    pub fn from_angle(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self::from_elements(c, -s, s, c)
    }

    /// Returns the determinant
    #[inline]
    pub fn determinant(&self) -> f32 {
        self.col1.x * self.col2.y - self.col2.x * self.col1.y
    }

    /// Returns the matrix transpose
    #[inline]
    pub fn transpose(&self) -> Self {
        Self::from_elements(self.col1.x, self.col1.y, self.col2.x, self.col2.y)
    }

    /// Returns the inverse, or the zero matrix if the matrix is singular
    pub fn inverse(&self) -> Self {
        let (a, b, c, d) = (self.col1.x, self.col2.x, self.col1.y, self.col2.y);
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = 1.0 / det;
        }
        Self::from_elements(det * d, -det * b, -det * c, det * a)
    }

    /// Solves `A * x = b` for x; a singular matrix yields the zero vector
    pub fn solve(&self, b: Vector2) -> Vector2 {
        let mut det = self.determinant();
        if det != 0.0 {
            det = 1.0 / det;
        }
        Vector2::new(
            det * (self.col2.y * b.x - self.col2.x * b.y),
            det * (self.col1.x * b.y - self.col1.y * b.x),
        )
    }

    /// Multiplies a vector by this matrix
    #[inline]
    pub fn mul_vec(&self, v: Vector2) -> Vector2 {
        Vector2::new(
            self.col1.x * v.x + self.col2.x * v.y,
            self.col1.y * v.x + self.col2.y * v.y,
        )
    }

    /// Multiplies a vector by the transpose of this matrix
    #[inline]
    pub fn mul_t_vec(&self, v: Vector2) -> Vector2 {
        Vector2::new(v.dot(&self.col1), v.dot(&self.col2))
    }

    /// Component-wise absolute value
    #[inline]
    pub fn abs(&self) -> Self {
        Self::new(self.col1.abs(), self.col2.abs())
    }

    /// Converts to a nalgebra matrix
    pub fn to_nalgebra(&self) -> na::Matrix2<f32> {
        na::Matrix2::new(self.col1.x, self.col2.x, self.col1.y, self.col2.y)
    }

    /// Creates from a nalgebra matrix
    pub fn from_nalgebra(m: &na::Matrix2<f32>) -> Self {
        Self::from_elements(m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)])
    }
}

impl Add for Mat22 {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.col1 + other.col1, self.col2 + other.col2)
    }
}

impl Mul for Mat22 {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        Self::new(self.mul_vec(other.col1), self.mul_vec(other.col2))
    }
}

impl Mul<Vector2> for Mat22 {
    type Output = Vector2;

    #[inline]
    fn mul(self, v: Vector2) -> Vector2 {
        self.mul_vec(v)
    }
}
