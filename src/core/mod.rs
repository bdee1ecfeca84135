pub mod world;
pub mod config;
pub mod storage;
pub mod listeners;
pub mod contact;
mod contact_manager;
mod island;

pub use self::world::{World, RaycastHit};
pub use self::config::{SimulationConfig, TimeStep};
pub use self::storage::{Arena, ArenaHandle, Storage};
pub use self::listeners::{
    BoundaryListener, ContactListener, ContactPoint, ContactResult, DestructionListener,
};
pub use self::contact::{Contact, ContactFlags};

macro_rules! define_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            pub(crate) index: u32,
            pub(crate) generation: u32,
        }

        impl ArenaHandle for $name {
            #[inline]
            fn from_parts(index: u32, generation: u32) -> Self {
                Self { index, generation }
            }

            #[inline]
            fn index(&self) -> u32 {
                self.index
            }

            #[inline]
            fn generation(&self) -> u32 {
                self.generation
            }
        }
    };
}

define_handle!(
    /// A unique identifier for a body in the physics world
    BodyHandle
);

define_handle!(
    /// A unique identifier for a shape attached to a body
    ShapeHandle
);

define_handle!(
    /// A unique identifier for a joint in the physics world
    JointHandle
);

define_handle!(
    /// A unique identifier for a live contact between two shapes
    ContactHandle
);
