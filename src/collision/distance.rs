use crate::core::config::{MAX_GJK_ITERATIONS, MAX_POLYGON_VERTICES};
use crate::math::{Transform2, Vector2, EPSILON};

/// Support-point representation of a convex shape for distance queries
///
/// A shape is the convex hull of `vertices` inflated by `radius`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceProxy {
    vertices: [Vector2; MAX_POLYGON_VERTICES],
    count: usize,
    radius: f32,
}

impl DistanceProxy {
    /// Creates a proxy from up to `MAX_POLYGON_VERTICES` local vertices
    pub fn new(vertices: &[Vector2], radius: f32) -> Self {
        let count = vertices.len().min(MAX_POLYGON_VERTICES);
        let mut storage = [Vector2::zero(); MAX_POLYGON_VERTICES];
        storage[..count].copy_from_slice(&vertices[..count]);
        Self {
            vertices: storage,
            count,
            radius,
        }
    }

    /// Returns the index of the vertex furthest along `direction`
    pub fn support(&self, direction: Vector2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(&direction);
        for i in 1..self.count {
            let value = self.vertices[i].dot(&direction);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }

    /// Returns a vertex by index
    #[inline]
    pub fn vertex(&self, index: usize) -> Vector2 {
        self.vertices[index]
    }

    /// Returns the number of vertices
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.count
    }

    /// Returns the inflation radius
    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }
}

/// Result of a distance query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on the first shape
    pub point_a: Vector2,

    /// Closest point on the second shape
    pub point_b: Vector2,

    /// Distance between the shapes, zero when they overlap
    pub distance: f32,

    /// Number of GJK iterations used
    pub iterations: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point on shape A
    wa: Vector2,
    /// Support point on shape B
    wb: Vector2,
    /// Minkowski difference point `wb - wa`
    w: Vector2,
    /// Barycentric coordinate of the closest point
    a: f32,
    index_a: usize,
    index_b: usize,
}

/// The GJK simplex of the Minkowski difference `B - A`
#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn closest_point(&self) -> Vector2 {
        match self.count {
            1 => self.v[0].w,
            2 => self.v[0].w * self.v[0].a + self.v[1].w * self.v[1].a,
            _ => Vector2::zero(),
        }
    }

    fn witness_points(&self) -> (Vector2, Vector2) {
        match self.count {
            1 => (self.v[0].wa, self.v[0].wb),
            2 => (
                self.v[0].wa * self.v[0].a + self.v[1].wa * self.v[1].a,
                self.v[0].wb * self.v[0].a + self.v[1].wb * self.v[1].a,
            ),
            _ => {
                let p = self.v[0].wa * self.v[0].a
                    + self.v[1].wa * self.v[1].a
                    + self.v[2].wa * self.v[2].a;
                (p, p)
            }
        }
    }

    // Closest point on the segment w1-w2 to the origin, using barycentric
    // coordinates. The simplex shrinks to a vertex outside the edge region.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(&e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(&e12);
        if d12_1 <= 0.0 {
            self.v[1].a = 1.0;
            self.v[0] = self.v[1];
            self.count = 1;
            return;
        }

        // Must be in e12 region.
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    // Voronoi region test of the origin against the triangle w1-w2-w3.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        // Edge12
        let e12 = w2 - w1;
        let d12_1 = w2.dot(&e12);
        let d12_2 = -w1.dot(&e12);

        // Edge13
        let e13 = w3 - w1;
        let d13_1 = w3.dot(&e13);
        let d13_2 = -w1.dot(&e13);

        // Edge23
        let e23 = w3 - w2;
        let d23_1 = w3.dot(&e23);
        let d23_2 = -w2.dot(&e23);

        // Triangle123
        let n123 = e12.cross(&e13);
        let d123_1 = n123 * w2.cross(&w3);
        let d123_2 = n123 * w3.cross(&w1);
        let d123_3 = n123 * w1.cross(&w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv_d12;
            self.v[1].a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv_d13;
            self.v[2].a = d13_2 * inv_d13;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv_d23;
            self.v[2].a = d23_2 * inv_d23;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Must be in triangle123
        let sum = d123_1 + d123_2 + d123_3;
        if sum.abs() <= EPSILON {
            // Degenerate triangle: keep the closest edge solution.
            self.count = 2;
            self.solve2();
            return;
        }
        let inv_d123 = 1.0 / sum;
        self.v[0].a = d123_1 * inv_d123;
        self.v[1].a = d123_2 * inv_d123;
        self.v[2].a = d123_3 * inv_d123;
        self.count = 3;
    }
}

/// Computes the closest points between two convex proxies with GJK
///
/// Iteration stops after `MAX_GJK_ITERATIONS`, when a support point repeats,
/// when the duality gap `v.v - v.w` drops below 1% of `v.v`, or when the
/// simplex encloses the origin. Overlapping shapes report distance zero.
pub fn distance(
    proxy_a: &DistanceProxy,
    xf_a: &Transform2,
    proxy_b: &DistanceProxy,
    xf_b: &Transform2,
) -> DistanceOutput {
    let mut simplex = Simplex::default();
    {
        let wa = xf_a.transform_point(proxy_a.vertex(0));
        let wb = xf_b.transform_point(proxy_b.vertex(0));
        simplex.v[0] = SimplexVertex {
            wa,
            wb,
            w: wb - wa,
            a: 1.0,
            index_a: 0,
            index_b: 0,
        };
        simplex.count = 1;
    }

    let mut iterations = 0;
    let mut saved_a = [0usize; 3];
    let mut saved_b = [0usize; 3];

    while iterations < MAX_GJK_ITERATIONS {
        // Copy the simplex so that we can identify duplicates.
        let saved_count = simplex.count;
        for i in 0..saved_count {
            saved_a[i] = simplex.v[i].index_a;
            saved_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        // The origin is enclosed: the shapes overlap.
        if simplex.count == 3 {
            break;
        }

        let v = simplex.closest_point();
        let v_sqr = v.length_squared();

        // Touching or overlapping within numerical precision.
        if v_sqr < EPSILON * EPSILON {
            break;
        }

        // Support of B - A in direction -v.
        let index_a = proxy_a.support(xf_a.inverse_transform_vector(v));
        let index_b = proxy_b.support(xf_b.inverse_transform_vector(-v));
        let wa = xf_a.transform_point(proxy_a.vertex(index_a));
        let wb = xf_b.transform_point(proxy_b.vertex(index_b));
        let w = wb - wa;

        iterations += 1;

        // A repeated support point means no more progress is possible.
        let duplicate = (0..saved_count).any(|i| saved_a[i] == index_a && saved_b[i] == index_b);
        if duplicate {
            break;
        }

        // Converged when the duality gap is under 1% of |v|^2.
        if v_sqr - v.dot(&w) <= 0.01 * v_sqr {
            break;
        }

        simplex.v[simplex.count] = SimplexVertex {
            wa,
            wb,
            w,
            a: 0.0,
            index_a,
            index_b,
        };
        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut distance = point_a.distance(&point_b);

    // Apply the radii.
    let ra = proxy_a.radius();
    let rb = proxy_b.radius();
    if distance > ra + rb && distance > EPSILON {
        distance -= ra + rb;
        let normal = (point_b - point_a).normalize();
        point_a += normal * ra;
        point_b -= normal * rb;
    } else {
        let p = (point_a + point_b) * 0.5;
        point_a = p;
        point_b = p;
        distance = 0.0;
    }

    DistanceOutput {
        point_a,
        point_b,
        distance,
        iterations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> DistanceProxy {
        DistanceProxy::new(
            &[
                Vector2::new(-1.0, -1.0),
                Vector2::new(1.0, -1.0),
                Vector2::new(1.0, 1.0),
                Vector2::new(-1.0, 1.0),
            ],
            0.0,
        )
    }

    #[test]
    fn test_separated_squares() {
        let a = square();
        let b = square();
        let xf_a = Transform2::identity();
        let xf_b = Transform2::from_position(Vector2::new(5.0, 0.5));

        let output = distance(&a, &xf_a, &b, &xf_b);
        assert_relative_eq!(output.distance, 3.0, epsilon = 1e-4);
        assert_relative_eq!(output.point_a.x, 1.0, epsilon = 1e-4);
        assert_relative_eq!(output.point_b.x, 4.0, epsilon = 1e-4);
    }

    #[test]
    fn test_overlap_reports_zero() {
        let a = square();
        let b = DistanceProxy::new(&[Vector2::zero()], 0.5);
        let output = distance(&a, &Transform2::identity(), &b, &Transform2::from_position(Vector2::new(0.5, 0.0)));
        assert_eq!(output.distance, 0.0);
    }

    #[test]
    fn test_circle_radii_applied() {
        let a = DistanceProxy::new(&[Vector2::zero()], 1.0);
        let b = DistanceProxy::new(&[Vector2::zero()], 0.5);
        let output = distance(&a, &Transform2::identity(), &b, &Transform2::from_position(Vector2::new(0.0, 4.0)));
        assert_relative_eq!(output.distance, 2.5, epsilon = 1e-5);
        assert_relative_eq!(output.point_a.y, 1.0, epsilon = 1e-5);
        assert_relative_eq!(output.point_b.y, 3.5, epsilon = 1e-5);
    }
}
