use crate::collision::collide_arc::{collide_arc_and_circle, collide_arc_and_polygon};
use crate::collision::collide_circle::{collide_circles, collide_polygon_and_circle};
use crate::collision::collide_polygon::{collide_polygons, PolygonView};
use crate::collision::manifold::ContactManifolds;
use crate::math::Transform2;
use crate::shapes::{Geometry, ShapeKind, ShapeType};

/// Signature of a narrow-phase handler
///
/// `previous` holds last step's manifolds for the pair, in the handler's
/// argument order. The handler replaces the contents of `out`.
pub type CollideFn = fn(
    &ShapeKind,
    &Transform2,
    &ShapeKind,
    &Transform2,
    &ContactManifolds,
    &mut ContactManifolds,
);

#[derive(Clone, Copy)]
struct RegistryEntry {
    handler: CollideFn,
    flipped: bool,
}

/// Table of narrow-phase handlers indexed by ordered shape-type pair
///
/// Registering `(a, b)` also serves `(b, a)` by swapping the arguments and
/// flipping the resulting manifolds. Each world owns its own registry.
#[derive(Clone)]
pub struct CollisionRegistry {
    table: [[Option<RegistryEntry>; ShapeType::COUNT]; ShapeType::COUNT],
}

impl CollisionRegistry {
    /// Creates a registry with no handlers
    pub fn empty() -> Self {
        Self {
            table: [[None; ShapeType::COUNT]; ShapeType::COUNT],
        }
    }

    /// Creates a registry with the built-in handlers
    ///
    /// Edge-edge and arc-arc pairs have no handler and never make contact.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(ShapeType::Circle, ShapeType::Circle, circle_circle);
        registry.register(ShapeType::Polygon, ShapeType::Circle, polygon_circle);
        registry.register(ShapeType::Polygon, ShapeType::Polygon, polygon_polygon);
        registry.register(ShapeType::Edge, ShapeType::Circle, edge_circle);
        registry.register(ShapeType::Polygon, ShapeType::Edge, polygon_edge);
        registry.register(ShapeType::ConcaveArc, ShapeType::Circle, arc_circle);
        registry.register(ShapeType::ConcaveArc, ShapeType::Polygon, arc_polygon);
        registry.register(ShapeType::ConcaveArc, ShapeType::Edge, arc_edge);
        registry
    }

    /// Registers a handler for shapes of type `type1` colliding with `type2`
    ///
    /// The reverse order is filled in as a flipped entry unless it has its
    /// own handler.
    pub fn register(&mut self, type1: ShapeType, type2: ShapeType, handler: CollideFn) {
        self.table[type1.index()][type2.index()] = Some(RegistryEntry {
            handler,
            flipped: false,
        });

        if type1 != type2 {
            let reverse = &mut self.table[type2.index()][type1.index()];
            if reverse.map_or(true, |entry| entry.flipped) {
                *reverse = Some(RegistryEntry {
                    handler,
                    flipped: true,
                });
            }
        }
    }

    /// Returns true if a pair of types has a handler in either order
    pub fn is_registered(&self, type1: ShapeType, type2: ShapeType) -> bool {
        self.table[type1.index()][type2.index()].is_some()
    }

    /// Runs the handler for a pair of shapes, writing into `out`
    ///
    /// Returns false and clears `out` when the pair has no handler.
    pub fn collide(
        &self,
        shape1: &ShapeKind,
        xf1: &Transform2,
        shape2: &ShapeKind,
        xf2: &Transform2,
        previous: &ContactManifolds,
        out: &mut ContactManifolds,
    ) -> bool {
        out.clear();
        let entry = match self.table[shape1.shape_type().index()][shape2.shape_type().index()] {
            Some(entry) => entry,
            None => return false,
        };

        if entry.flipped {
            let mut swapped = *previous;
            swapped.flip();
            (entry.handler)(shape2, xf2, shape1, xf1, &swapped, out);
            out.flip();
        } else {
            (entry.handler)(shape1, xf1, shape2, xf2, previous, out);
        }
        true
    }
}

impl Default for CollisionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollisionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut pairs = Vec::new();
        for t1 in ShapeType::ALL {
            for t2 in ShapeType::ALL {
                if self.is_registered(t1, t2) {
                    pairs.push((t1, t2));
                }
            }
        }
        f.debug_struct("CollisionRegistry").field("pairs", &pairs).finish()
    }
}

// Adapters from the tagged shape kinds to the geometric routines. The
// registry only calls them with the kinds they were registered for.

fn circle_circle(
    s1: &ShapeKind,
    xf1: &Transform2,
    s2: &ShapeKind,
    xf2: &Transform2,
    _previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    if let (ShapeKind::Circle(c1), ShapeKind::Circle(c2)) = (s1, s2) {
        out.push(collide_circles(c1, xf1, c2, xf2));
    }
}

fn polygon_circle(
    s1: &ShapeKind,
    xf1: &Transform2,
    s2: &ShapeKind,
    xf2: &Transform2,
    _previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    if let (ShapeKind::Polygon(p), ShapeKind::Circle(c)) = (s1, s2) {
        let view = PolygonView::new(p.get_vertices(), p.get_normals());
        out.push(collide_polygon_and_circle(&view, xf1, c, xf2));
    }
}

fn polygon_polygon(
    s1: &ShapeKind,
    xf1: &Transform2,
    s2: &ShapeKind,
    xf2: &Transform2,
    _previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    if let (ShapeKind::Polygon(p1), ShapeKind::Polygon(p2)) = (s1, s2) {
        let view1 = PolygonView::new(p1.get_vertices(), p1.get_normals());
        let view2 = PolygonView::new(p2.get_vertices(), p2.get_normals());
        out.push(collide_polygons(&view1, xf1, &view2, xf2));
    }
}

fn edge_circle(
    s1: &ShapeKind,
    xf1: &Transform2,
    s2: &ShapeKind,
    xf2: &Transform2,
    _previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    if let (ShapeKind::Edge(e), ShapeKind::Circle(c)) = (s1, s2) {
        let view = PolygonView::new(e.get_vertices(), e.get_normals());
        out.push(collide_polygon_and_circle(&view, xf1, c, xf2));
    }
}

fn polygon_edge(
    s1: &ShapeKind,
    xf1: &Transform2,
    s2: &ShapeKind,
    xf2: &Transform2,
    _previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    if let (ShapeKind::Polygon(p), ShapeKind::Edge(e)) = (s1, s2) {
        let view1 = PolygonView::new(p.get_vertices(), p.get_normals());
        let view2 = PolygonView::new(e.get_vertices(), e.get_normals());
        out.push(collide_polygons(&view1, xf1, &view2, xf2));
    }
}

fn arc_circle(
    s1: &ShapeKind,
    xf1: &Transform2,
    s2: &ShapeKind,
    xf2: &Transform2,
    previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    if let (ShapeKind::ConcaveArc(a), ShapeKind::Circle(c)) = (s1, s2) {
        collide_arc_and_circle(a, xf1, c, xf2, previous, out);
    }
}

fn arc_polygon(
    s1: &ShapeKind,
    xf1: &Transform2,
    s2: &ShapeKind,
    xf2: &Transform2,
    previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    if let (ShapeKind::ConcaveArc(a), ShapeKind::Polygon(p)) = (s1, s2) {
        let view = PolygonView::new(p.get_vertices(), p.get_normals());
        collide_arc_and_polygon(a, xf1, &view, xf2, previous, out);
    }
}

fn arc_edge(
    s1: &ShapeKind,
    xf1: &Transform2,
    s2: &ShapeKind,
    xf2: &Transform2,
    previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    if let (ShapeKind::ConcaveArc(a), ShapeKind::Edge(e)) = (s1, s2) {
        let view = PolygonView::new(e.get_vertices(), e.get_normals());
        collide_arc_and_polygon(a, xf1, &view, xf2, previous, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vector2;
    use crate::shapes::{CircleShape, EdgeShape, PolygonShape};
    use approx::assert_relative_eq;

    #[test]
    fn test_flipped_pair_negates_normal() {
        let registry = CollisionRegistry::new();
        let circle = ShapeKind::Circle(CircleShape::new(Vector2::zero(), 0.5).unwrap());
        let square = ShapeKind::Polygon(PolygonShape::new_box(1.0, 1.0).unwrap());
        let xf_circle = Transform2::from_position(Vector2::new(0.0, 1.4));
        let xf_square = Transform2::identity();
        let empty = ContactManifolds::new();

        let mut forward = ContactManifolds::new();
        assert!(registry.collide(&square, &xf_square, &circle, &xf_circle, &empty, &mut forward));
        let mut reverse = ContactManifolds::new();
        assert!(registry.collide(&circle, &xf_circle, &square, &xf_square, &empty, &mut reverse));

        let n1 = forward.as_slice()[0].normal;
        let n2 = reverse.as_slice()[0].normal;
        assert_relative_eq!(n1.x, -n2.x, epsilon = 1e-6);
        assert_relative_eq!(n1.y, -n2.y, epsilon = 1e-6);
        assert_relative_eq!(
            forward.as_slice()[0].points[0].local_point1.y,
            reverse.as_slice()[0].points[0].local_point2.y,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_edge_pair_is_unregistered() {
        let registry = CollisionRegistry::new();
        assert!(!registry.is_registered(ShapeType::Edge, ShapeType::Edge));
        assert!(!registry.is_registered(ShapeType::ConcaveArc, ShapeType::ConcaveArc));
        assert!(registry.is_registered(ShapeType::Edge, ShapeType::Polygon));

        let edge = ShapeKind::Edge(EdgeShape::new(Vector2::new(-1.0, 0.0), Vector2::new(1.0, 0.0)).unwrap());
        let xf = Transform2::identity();
        let mut out = ContactManifolds::new();
        assert!(!registry.collide(&edge, &xf, &edge, &xf, &ContactManifolds::new(), &mut out));
        assert!(out.is_empty());
    }
}
