pub mod math;
pub mod core;
pub mod bodies;
pub mod shapes;
pub mod collision;
pub mod constraints;

/// Re-export common types for easier usage
pub use crate::core::{
    BodyHandle, ContactHandle, JointHandle, RaycastHit, ShapeHandle, SimulationConfig, World,
};
pub use crate::bodies::{Body, BodyDef, BodyType};
pub use crate::shapes::{MassData, ShapeDef, ShapeKind};
pub use crate::constraints::{DistanceJointDef, JointDef, PrismaticJointDef, PulleyJointDef};
pub use crate::math::{Aabb, Segment, Vector2};

/// Error types for the physics engine
pub mod error {
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum PhysicsError {
        #[error("Invalid parameter: {0}")]
        InvalidParameter(String),

        #[error("Resource not found: {0}")]
        ResourceNotFound(String),

        #[error("Invalid geometry: {0}")]
        InvalidGeometry(String),

        #[error("The world is locked while a step is in progress")]
        WorldLocked,

        #[error("Internal error: {0}")]
        InternalError(String),
    }
}

/// Result type for physics engine operations
pub type Result<T> = std::result::Result<T, error::PhysicsError>;

/// Engine version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
