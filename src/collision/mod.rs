mod broad_phase;
mod collide_arc;
mod collide_circle;
mod collide_polygon;
mod collision_filter;
mod contact_solver;
mod distance;
mod manifold;
mod pair_manager;
mod registry;
mod toi;

pub use self::broad_phase::{BoundValues, BroadPhase};
pub use self::collide_arc::{collide_arc_and_circle, collide_arc_and_polygon};
pub use self::collide_circle::{collide_circles, collide_polygon_and_circle};
pub use self::collide_polygon::{collide_polygons, PolygonView};
pub use self::collision_filter::{CollisionCategory, ContactFilter, FilterData, GroupMaskFilter};
pub(crate) use self::contact_solver::ContactSolver;
pub use self::distance::{distance, DistanceOutput, DistanceProxy};
pub use self::manifold::{ContactId, ContactManifolds, Manifold, ManifoldPoint, ARC_FEATURE, NULL_FEATURE};
pub use self::pair_manager::PairCallback;
pub use self::registry::{CollideFn, CollisionRegistry};
pub use self::toi::{time_of_impact, ToiProxy};
