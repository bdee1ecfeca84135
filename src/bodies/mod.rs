mod body;
mod body_type;

pub use self::body::{Body, BodyDef, ContactEdge, JointEdge};
pub use self::body_type::BodyType;
pub use self::body_flags::BodyFlags;

/// Flags for controlling body behavior
pub mod body_flags {
    use bitflags::bitflags;

    bitflags! {
        /// Flags for controlling the behavior of bodies
        #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
        pub struct BodyFlags: u16 {
            /// Body has been visited by the current island search
            const ISLAND = 0x0001;

            /// Body is currently sleeping
            const SLEEPING = 0x0002;

            /// Body can go to sleep when inactive
            const ALLOW_SLEEP = 0x0004;

            /// Body takes part in continuous collision against dynamic bodies
            const BULLET = 0x0008;

            /// Body never rotates
            const FIXED_ROTATION = 0x0010;

            /// Body left the world AABB and no longer simulates
            const FROZEN = 0x0020;
        }
    }
}
