mod vector;
mod matrix;
mod transform;
mod rotation;
mod aabb;
mod segment;
mod sweep;

pub use vector::Vector2;
pub use matrix::Mat22;
pub use transform::Transform2;
pub use rotation::Rotation2;
pub use aabb::Aabb;
pub use segment::Segment;
pub use sweep::Sweep;

/// Constant for a very small number, used for comparisons
pub const EPSILON: f32 = 1.0e-6;

/// Clamps a value between a minimum and maximum value
#[inline]
pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
    value.max(min).min(max)
}

/// Converts degrees to radians
#[inline]
pub fn to_radians(degrees: f32) -> f32 {
    degrees * std::f32::consts::PI / 180.0
}

