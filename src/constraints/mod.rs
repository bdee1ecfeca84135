mod joint;
mod distance;
mod prismatic;
mod pulley;

pub use self::joint::{Jacobian, Joint, JointBase, JointDef, JointType, LimitState};
pub(crate) use self::joint::create_joint;
pub use self::distance::{DistanceJoint, DistanceJointDef};
pub use self::prismatic::{PrismaticJoint, PrismaticJointDef};
pub use self::pulley::{PulleyJoint, PulleyJointDef};
