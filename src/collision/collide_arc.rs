//! Contacts against a concave arc shape
//!
//! Each step the contact is interpreted two ways. The polygon reading
//! collides the convex hull and drops points that fall inside the bite. The
//! arc reading pushes material out of the bite along the arc's radial
//! direction, one manifold per penetrating feature. The least penetrating
//! reading wins; near ties keep last step's reading so warm starting is not
//! thrown away.

use crate::collision::collide_circle::collide_polygon_and_circle;
use crate::collision::collide_polygon::{collide_polygons, PolygonView};
use crate::collision::manifold::{
    ContactId, ContactManifolds, Manifold, ManifoldPoint, ARC_FEATURE, NULL_FEATURE,
};
use crate::core::config::{LINEAR_SLOP, MAX_MANIFOLDS, MAX_POLYGON_VERTICES};
use crate::math::{Transform2, Vector2, EPSILON};
use crate::shapes::{CircleShape, ConcaveArcShape, Geometry};

/// Separations closer than this are treated as a tie between readings
const INTERPRETATION_TOLERANCE: f32 = 0.5 * LINEAR_SLOP;

fn hull_view(arc: &ConcaveArcShape) -> PolygonView<'_> {
    PolygonView::new(arc.get_hull().get_vertices(), arc.get_hull().get_normals())
}

/// Removes the points of a hull manifold that lie inside the bite
fn trim_bite(arc: &ConcaveArcShape, manifold: Manifold) -> Manifold {
    let mut trimmed = Manifold {
        normal: manifold.normal,
        ..Manifold::default()
    };
    for point in manifold.points() {
        if !arc.is_in_bite(point.local_point1) {
            trimmed.push(*point);
        }
    }
    trimmed
}

fn arc_manifold(
    xf1: &Transform2,
    xf2: &Transform2,
    local_normal: Vector2,
    local_position: Vector2,
    separation: f32,
    incident_vertex: u8,
) -> Manifold {
    let position = xf1.transform_point(local_position);
    let mut manifold = Manifold {
        normal: xf1.transform_vector(local_normal),
        ..Manifold::default()
    };
    manifold.push(ManifoldPoint {
        local_point1: local_position,
        local_point2: xf2.inverse_transform_point(position),
        separation,
        normal_impulse: 0.0,
        tangent_impulse: 0.0,
        id: ContactId::new(ARC_FEATURE, NULL_FEATURE, incident_vertex, 0),
    });
    manifold
}

/// Picks between the two readings and writes the winner into `out`
fn choose(
    polygon: Manifold,
    arc: &[Manifold],
    previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    out.clear();

    let polygon_sep = if polygon.point_count > 0 {
        Some(polygon.min_separation())
    } else {
        None
    };
    let arc_sep = arc
        .iter()
        .map(Manifold::min_separation)
        .fold(None, |acc: Option<f32>, s| Some(acc.map_or(s, |a| a.min(s))));

    let use_arc = match (polygon_sep, arc_sep) {
        (None, None) => return,
        (Some(_), None) => false,
        (None, Some(_)) => true,
        (Some(p), Some(a)) => {
            if (a - p).abs() < INTERPRETATION_TOLERANCE && !previous.is_empty() {
                previous.uses_arc()
            } else {
                a > p
            }
        }
    };

    if use_arc {
        for manifold in arc.iter().take(MAX_MANIFOLDS) {
            out.push(*manifold);
        }
    } else {
        out.push(polygon);
    }
}

/// Collides a concave arc shape with a circle
pub fn collide_arc_and_circle(
    arc: &ConcaveArcShape,
    xf1: &Transform2,
    circle: &CircleShape,
    xf2: &Transform2,
    previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    let polygon = trim_bite(arc, collide_polygon_and_circle(&hull_view(arc), xf1, circle, xf2));

    let mut arc_manifolds = Vec::with_capacity(1);
    let center = xf1.inverse_transform_point(xf2.transform_point(circle.get_local_position()));
    let radius = circle.get_radius();
    let arc_radius = arc.get_arc_radius();

    let mut u = center - arc.get_arc_center();
    let dist = u.normalize_mut();
    if dist > EPSILON && dist < arc_radius && dist + radius > arc_radius && arc.arc_spans(u) {
        let arc_point = arc.get_arc_center() + u * arc_radius;
        let deepest = center + u * radius;
        arc_manifolds.push(arc_manifold(
            xf1,
            xf2,
            -u,
            (arc_point + deepest) * 0.5,
            arc_radius - dist - radius,
            NULL_FEATURE,
        ));
    }

    choose(polygon, &arc_manifolds, previous, out);
}

/// Collides a concave arc shape with a convex outline, such as a polygon or an edge
pub fn collide_arc_and_polygon(
    arc: &ConcaveArcShape,
    xf1: &Transform2,
    polygon: &PolygonView<'_>,
    xf2: &Transform2,
    previous: &ContactManifolds,
    out: &mut ContactManifolds,
) {
    let hull = trim_bite(arc, collide_polygons(&hull_view(arc), xf1, polygon, xf2));

    let arc_radius = arc.get_arc_radius();
    let identity = Transform2::identity();

    // Vertices of the other shape that sit in the solid behind the arc.
    let mut candidates: Vec<(f32, Manifold)> = Vec::with_capacity(MAX_POLYGON_VERTICES);
    for (i, v) in polygon.vertices.iter().enumerate() {
        let local = xf1.inverse_transform_point(xf2.transform_point(*v));
        let mut u = local - arc.get_arc_center();
        let dist = u.normalize_mut();
        if dist <= arc_radius || !arc.arc_spans(u) || !arc.get_hull().test_point(&identity, local) {
            continue;
        }

        let separation = arc_radius - dist;
        candidates.push((separation, arc_manifold(xf1, xf2, -u, local, separation, i as u8)));
    }

    candidates.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
    let arc_manifolds: Vec<Manifold> = candidates
        .into_iter()
        .take(MAX_MANIFOLDS)
        .map(|(_, m)| m)
        .collect();

    choose(hull, &arc_manifolds, previous, out);
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// A 4x4 block whose top face is carved by a radius 2 arc
    fn bowl() -> ConcaveArcShape {
        let vertices = [
            Vector2::new(2.0, 2.0),
            Vector2::new(-2.0, 2.0),
            Vector2::new(-2.0, -2.0),
            Vector2::new(2.0, -2.0),
        ];
        // Rotate the winding so the closing edge is the top face.
        let top_last = [vertices[1], vertices[2], vertices[3], vertices[0]];
        ConcaveArcShape::new(&top_last, 2.0).unwrap()
    }

    #[test]
    fn test_circle_resting_in_bowl_uses_arc() {
        let arc = bowl();
        let circle = CircleShape::new(Vector2::zero(), 0.5).unwrap();
        let xf_arc = Transform2::identity();
        let xf_circle = Transform2::from_position(Vector2::new(0.0, 0.4));

        let mut out = ContactManifolds::new();
        collide_arc_and_circle(&arc, &xf_arc, &circle, &xf_circle, &ContactManifolds::new(), &mut out);

        assert_eq!(out.len(), 1);
        assert!(out.uses_arc());
        let manifold = &out.as_slice()[0];
        assert_relative_eq!(manifold.normal.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(manifold.points[0].separation, -0.1, epsilon = 1e-5);
    }

    #[test]
    fn test_circle_inside_bite_is_free() {
        let arc = bowl();
        let circle = CircleShape::new(Vector2::zero(), 0.5).unwrap();
        let xf_circle = Transform2::from_position(Vector2::new(0.0, 1.5));

        let mut out = ContactManifolds::new();
        collide_arc_and_circle(
            &arc,
            &Transform2::identity(),
            &circle,
            &xf_circle,
            &ContactManifolds::new(),
            &mut out,
        );
        assert!(out.is_empty());
    }
}
