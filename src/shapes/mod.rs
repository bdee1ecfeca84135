mod shape;
mod circle;
mod polygon;
mod edge;
mod concave_arc;

pub use self::shape::{Geometry, MassData, SegmentCollide, Shape, ShapeDef, ShapeKind, ShapeType};
pub use self::circle::CircleShape;
pub use self::polygon::PolygonShape;
pub use self::edge::EdgeShape;
pub use self::concave_arc::ConcaveArcShape;
