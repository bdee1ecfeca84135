use crate::collision::manifold::{ContactId, Manifold, ManifoldPoint};
use crate::math::{Transform2, Vector2};

/// Borrowed convex outline used by the clipping routines
///
/// Edges and polygons share this view; an edge is a two-vertex outline
/// with one normal per face.
#[derive(Debug, Clone, Copy)]
pub struct PolygonView<'a> {
    pub vertices: &'a [Vector2],
    pub normals: &'a [Vector2],
}

impl<'a> PolygonView<'a> {
    /// Creates a view over matching vertex and normal slices
    pub fn new(vertices: &'a [Vector2], normals: &'a [Vector2]) -> Self {
        Self { vertices, normals }
    }

    #[inline]
    fn count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    fn next(&self, i: usize) -> usize {
        if i + 1 < self.count() {
            i + 1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct ClipVertex {
    v: Vector2,
    id: ContactId,
}

/// Keeps the part of a segment behind the plane `dot(normal, x) = offset`
fn clip_segment_to_line(v_in: &[ClipVertex; 2], normal: Vector2, offset: f32) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut num_out = 0;

    // Calculate the distance of end points to the line
    let distance0 = normal.dot(&v_in[0].v) - offset;
    let distance1 = normal.dot(&v_in[1].v) - offset;

    // If the points are behind the plane
    if distance0 <= 0.0 {
        v_out[num_out] = v_in[0];
        num_out += 1;
    }
    if distance1 <= 0.0 {
        v_out[num_out] = v_in[1];
        num_out += 1;
    }

    // If the points are on different sides of the plane
    if distance0 * distance1 < 0.0 && num_out < 2 {
        // Find intersection point of edge and plane
        let interp = distance0 / (distance0 - distance1);
        v_out[num_out].v = v_in[0].v + (v_in[1].v - v_in[0].v) * interp;
        v_out[num_out].id = if distance0 > 0.0 { v_in[0].id } else { v_in[1].id };
        num_out += 1;
    }

    (v_out, num_out)
}

/// Separation of `poly2` from edge `edge1` of `poly1`, both in world space
fn edge_separation(
    poly1: &PolygonView<'_>,
    xf1: &Transform2,
    edge1: usize,
    poly2: &PolygonView<'_>,
    xf2: &Transform2,
) -> f32 {
    // Convert normal from poly1's frame into poly2's frame.
    let normal1_world = xf1.transform_vector(poly1.normals[edge1]);
    let normal1 = xf2.inverse_transform_vector(normal1_world);

    // Find support vertex on poly2 for -normal.
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, v) in poly2.vertices.iter().enumerate() {
        let dot = v.dot(&normal1);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let v1 = xf1.transform_point(poly1.vertices[edge1]);
    let v2 = xf2.transform_point(poly2.vertices[index]);
    (v2 - v1).dot(&normal1_world)
}

/// Finds the edge of `poly1` with the largest separation from `poly2`
fn find_max_separation(
    poly1: &PolygonView<'_>,
    xf1: &Transform2,
    poly2: &PolygonView<'_>,
    xf2: &Transform2,
) -> (usize, f32) {
    let mut best_edge = 0;
    let mut max_separation = f32::MIN;

    for edge in 0..poly1.count() {
        let s = edge_separation(poly1, xf1, edge, poly2, xf2);
        if s > max_separation {
            max_separation = s;
            best_edge = edge;
        }
    }

    (best_edge, max_separation)
}

/// Finds the edge of `poly2` most anti-parallel to reference edge `edge1`
fn find_incident_edge(
    poly1: &PolygonView<'_>,
    xf1: &Transform2,
    edge1: usize,
    poly2: &PolygonView<'_>,
    xf2: &Transform2,
) -> [ClipVertex; 2] {
    // Get the normal of the reference edge in poly2's frame.
    let normal1 = xf2.inverse_transform_vector(xf1.transform_vector(poly1.normals[edge1]));

    // Find the incident edge on poly2.
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for (i, n) in poly2.normals.iter().enumerate() {
        let dot = normal1.dot(n);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    // Build the clip vertices for the incident edge.
    let i1 = index;
    let i2 = poly2.next(i1);

    [
        ClipVertex {
            v: xf2.transform_point(poly2.vertices[i1]),
            id: ContactId::new(edge1 as u8, i1 as u8, 0, 0),
        },
        ClipVertex {
            v: xf2.transform_point(poly2.vertices[i2]),
            id: ContactId::new(edge1 as u8, i2 as u8, 1, 0),
        },
    ]
}

/// Orders faces by world normal, then by world start vertex
fn face_key(poly: &PolygonView<'_>, xf: &Transform2, edge: usize) -> [f32; 4] {
    let n = xf.transform_vector(poly.normals[edge]);
    let v = xf.transform_point(poly.vertices[edge]);
    [n.x, n.y, v.x, v.y]
}

/// Collides two convex outlines with the separating axis test and clipping
///
/// Find the edge normal of max separation on A, then on B. The reference
/// face is the one with the clearly larger separation; near ties are broken
/// by face geometry so the result does not depend on argument order. The
/// incident edge is clipped against the reference face's side planes, giving
/// up to two points whose ids combine reference edge, incident edge, clipped
/// vertex and the flip bit.
pub fn collide_polygons(
    poly_a: &PolygonView<'_>,
    xf_a: &Transform2,
    poly_b: &PolygonView<'_>,
    xf_b: &Transform2,
) -> Manifold {
    let mut manifold = Manifold::default();

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > 0.0 {
        return manifold;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > 0.0 {
        return manifold;
    }

    const RELATIVE_TOL: f32 = 0.98;
    const ABSOLUTE_TOL: f32 = 0.001;

    let prefer_a = separation_a > RELATIVE_TOL * separation_b + ABSOLUTE_TOL;
    let prefer_b = separation_b > RELATIVE_TOL * separation_a + ABSOLUTE_TOL;
    let use_b = if prefer_a == prefer_b {
        // Near tie: pick by face geometry so swapping the arguments picks the same face.
        face_key(poly_b, xf_b, edge_b) > face_key(poly_a, xf_a, edge_a)
    } else {
        prefer_b
    };

    // Find incident edge
    let (poly1, xf1, poly2, xf2, edge1, flip) = if use_b {
        (poly_b, xf_b, poly_a, xf_a, edge_b, 1u8)
    } else {
        (poly_a, xf_a, poly_b, xf_b, edge_a, 0u8)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let local_v11 = poly1.vertices[edge1];
    let local_v12 = poly1.vertices[poly1.next(edge1)];

    let side_normal = xf1.transform_vector(local_v12 - local_v11).normalize();
    let front_normal = side_normal.cross_scalar(1.0);

    let v11 = xf1.transform_point(local_v11);
    let v12 = xf1.transform_point(local_v12);

    let front_offset = front_normal.dot(&v11);
    let side_offset1 = -side_normal.dot(&v11);
    let side_offset2 = side_normal.dot(&v12);

    // Clip incident edge against extruded edge1 side edges.
    let (clip_points1, np) = clip_segment_to_line(&incident_edge, -side_normal, side_offset1);
    if np < 2 {
        return manifold;
    }

    let (clip_points2, np) = clip_segment_to_line(&clip_points1, side_normal, side_offset2);
    if np < 2 {
        return manifold;
    }

    // Now clip_points2 contains the clipped points.
    manifold.normal = if flip == 1 { -front_normal } else { front_normal };

    for clip in clip_points2.iter() {
        let separation = front_normal.dot(&clip.v) - front_offset;

        if separation <= 0.0 {
            let mut id = clip.id;
            id.flip = flip;
            manifold.push(ManifoldPoint {
                local_point1: xf_a.inverse_transform_point(clip.v),
                local_point2: xf_b.inverse_transform_point(clip.v),
                separation,
                normal_impulse: 0.0,
                tangent_impulse: 0.0,
                id,
            });
        }
    }

    manifold
}
