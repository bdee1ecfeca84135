use crate::collision::collide_polygon::PolygonView;
use crate::collision::manifold::{ContactId, Manifold, ManifoldPoint, NULL_FEATURE};
use crate::math::{Transform2, Vector2, EPSILON};
use crate::shapes::CircleShape;

fn single_point(xf1: &Transform2, xf2: &Transform2, normal: Vector2, position: Vector2, separation: f32, id: ContactId) -> Manifold {
    let mut manifold = Manifold {
        normal,
        ..Manifold::default()
    };
    manifold.push(ManifoldPoint {
        local_point1: xf1.inverse_transform_point(position),
        local_point2: xf2.inverse_transform_point(position),
        separation,
        normal_impulse: 0.0,
        tangent_impulse: 0.0,
        id,
    });
    manifold
}

/// Collides two circles by center distance
///
/// Coincident centers produce the fixed normal `(0, 1)`. The contact point is
/// halfway between the two surface points.
pub fn collide_circles(
    circle1: &CircleShape,
    xf1: &Transform2,
    circle2: &CircleShape,
    xf2: &Transform2,
) -> Manifold {
    let p1 = xf1.transform_point(circle1.get_local_position());
    let p2 = xf2.transform_point(circle2.get_local_position());

    let d = p2 - p1;
    let dist_sqr = d.length_squared();
    let r1 = circle1.get_radius();
    let r2 = circle2.get_radius();
    let radius_sum = r1 + r2;
    if dist_sqr > radius_sum * radius_sum {
        return Manifold::default();
    }

    let (separation, normal) = if dist_sqr < EPSILON * EPSILON {
        (-radius_sum, Vector2::new(0.0, 1.0))
    } else {
        let dist = dist_sqr.sqrt();
        (dist - radius_sum, d * (1.0 / dist))
    };

    let surface1 = p1 + normal * r1;
    let surface2 = p2 - normal * r2;
    let position = (surface1 + surface2) * 0.5;

    single_point(xf1, xf2, normal, position, separation, ContactId::default())
}

/// Collides a convex outline with a circle
///
/// The face of maximum separation is found first. A center inside the outline
/// pushes out along that face; otherwise the center is projected onto the
/// face's edge and collides with the nearest vertex or the edge interior.
pub fn collide_polygon_and_circle(
    polygon: &PolygonView<'_>,
    xf1: &Transform2,
    circle: &CircleShape,
    xf2: &Transform2,
) -> Manifold {
    // Compute circle position in the frame of the polygon.
    let c = xf2.transform_point(circle.get_local_position());
    let c_local = xf1.inverse_transform_point(c);
    let radius = circle.get_radius();

    // Find the min separating edge.
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    for (i, (v, n)) in polygon.vertices.iter().zip(polygon.normals.iter()).enumerate() {
        let s = n.dot(&(c_local - *v));
        if s > radius {
            // Early out.
            return Manifold::default();
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    // If the center is inside the polygon ...
    if separation < EPSILON {
        let normal = xf1.transform_vector(polygon.normals[normal_index]);
        let position = c - normal * radius;
        let id = ContactId::new(normal_index as u8, NULL_FEATURE, NULL_FEATURE, 0);
        return single_point(xf1, xf2, normal, position, separation - radius, id);
    }

    // Project the circle center onto the edge segment.
    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < polygon.vertices.len() { vert_index1 + 1 } else { 0 };
    let v1 = polygon.vertices[vert_index1];
    let v2 = polygon.vertices[vert_index2];
    let mut e = v2 - v1;
    let length = e.normalize_mut();
    if length == 0.0 {
        return Manifold::default();
    }

    // If the center is past either endpoint the closest feature is a vertex.
    let u = (c_local - v1).dot(&e);
    let (p, id) = if u <= 0.0 {
        (v1, ContactId::new(0, NULL_FEATURE, vert_index1 as u8, 0))
    } else if u >= length {
        (v2, ContactId::new(0, NULL_FEATURE, vert_index2 as u8, 0))
    } else {
        (v1 + e * u, ContactId::new(0, vert_index1 as u8, NULL_FEATURE, 0))
    };

    let mut d = c_local - p;
    let dist = d.normalize_mut();
    if dist > radius || dist == 0.0 {
        return Manifold::default();
    }

    let normal = xf1.transform_vector(d);
    let position = c - normal * radius;
    single_point(xf1, xf2, normal, position, dist - radius, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_overlapping_circles() {
        let a = CircleShape::new(Vector2::zero(), 1.0).unwrap();
        let b = CircleShape::new(Vector2::zero(), 0.5).unwrap();
        let xf_a = Transform2::identity();
        let xf_b = Transform2::from_position(Vector2::new(1.25, 0.0));

        let manifold = collide_circles(&a, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 1);
        assert_relative_eq!(manifold.normal.x, 1.0);
        assert_relative_eq!(manifold.points[0].separation, -0.25, epsilon = 1e-6);
        assert_relative_eq!(manifold.points[0].local_point1.x, 0.875, epsilon = 1e-6);
    }

    #[test]
    fn test_coincident_circles_use_up_normal() {
        let a = CircleShape::new(Vector2::zero(), 1.0).unwrap();
        let xf = Transform2::identity();
        let manifold = collide_circles(&a, &xf, &a, &xf);
        assert_eq!(manifold.normal, Vector2::new(0.0, 1.0));
        assert_relative_eq!(manifold.points[0].separation, -2.0);
    }

    #[test]
    fn test_circle_near_polygon_vertex() {
        let vertices = [
            Vector2::new(-1.0, -1.0),
            Vector2::new(1.0, -1.0),
            Vector2::new(1.0, 1.0),
            Vector2::new(-1.0, 1.0),
        ];
        let normals = [
            Vector2::new(0.0, -1.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.0, 1.0),
            Vector2::new(-1.0, 0.0),
        ];
        let view = PolygonView::new(&vertices, &normals);
        let circle = CircleShape::new(Vector2::zero(), 0.5).unwrap();
        let xf_circle = Transform2::from_position(Vector2::new(1.3, 1.3));

        let manifold = collide_polygon_and_circle(&view, &Transform2::identity(), &circle, &xf_circle);
        assert_eq!(manifold.point_count, 1);
        let expected = 0.3 * std::f32::consts::SQRT_2 - 0.5;
        assert_relative_eq!(manifold.points[0].separation, expected, epsilon = 1e-5);
        assert_relative_eq!(manifold.normal.x, manifold.normal.y, epsilon = 1e-5);
        assert_eq!(manifold.points[0].id.incident_edge, NULL_FEATURE);
    }
}
