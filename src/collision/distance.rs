//! Gilbert-Johnson-Keerthi (GJK) closest-point computation between two convex proxies.
//!
//! Works on the core polytopes; rounding radii are only applied when requested through
//! [`DistanceInput::use_radii`].

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::shapes::Shape;
use crate::{
    config::{DEFAULT_GJK_MAX_ITERATIONS, MAX_POLYGON_VERTICES},
    core::types::Transform,
    utils::math::{cross, cross_sv, cross_vs},
};

/// Convex vertex cloud plus rounding radius, built from a shape child for one query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceProxy {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
    radius: f32,
}

impl DistanceProxy {
    pub fn new(vertices: &[Vec2], radius: f32) -> Self {
        debug_assert!(
            !vertices.is_empty() && vertices.len() <= MAX_POLYGON_VERTICES,
            "proxy vertex count out of range"
        );
        let count = vertices.len().min(MAX_POLYGON_VERTICES);
        let mut buffer = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        buffer[..count].copy_from_slice(&vertices[..count]);
        Self {
            vertices: buffer,
            count,
            radius,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    /// Index of the vertex furthest along `d`; ties keep the lowest index.
    pub fn support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for i in 1..self.count {
            let value = self.vertices[i].dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }

    /// Largest distance from `center` to any core vertex; used to bound rotational sweep.
    pub fn max_extent(&self, center: Vec2) -> f32 {
        self.vertices()
            .iter()
            .map(|v| v.distance(center))
            .fold(0.0, f32::max)
    }
}

/// Warm-start data for GJK, persisted per contact between steps.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SimplexCache {
    /// Length or area of the cached simplex, used to detect drastic configuration changes.
    pub metric: f32,
    pub count: usize,
    pub index_a: [usize; 3],
    pub index_b: [usize; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceInput {
    pub proxy_a: DistanceProxy,
    pub proxy_b: DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub use_radii: bool,
    pub max_iterations: u32,
}

impl DistanceInput {
    pub fn new(
        proxy_a: DistanceProxy,
        transform_a: Transform,
        proxy_b: DistanceProxy,
        transform_b: Transform,
    ) -> Self {
        Self {
            proxy_a,
            proxy_b,
            transform_a,
            transform_b,
            use_radii: false,
            max_iterations: DEFAULT_GJK_MAX_ITERATIONS,
        }
    }

    pub fn with_radii(mut self, use_radii: bool) -> Self {
        self.use_radii = use_radii;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// Why the GJK loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GjkTermination {
    /// The simplex enclosed the origin: the cores overlap.
    Overlap,
    /// The origin lies on the simplex; the cores touch or overlap.
    ZeroDirection,
    /// A support pair repeated, so the simplex cannot improve.
    DuplicateVertex,
    /// Iteration cap reached; the result is the best found so far.
    MaxIterations,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on shape A (world space).
    pub point_a: Vec2,
    /// Closest point on shape B (world space).
    pub point_b: Vec2,
    pub distance: f32,
    pub iterations: u32,
    pub termination: GjkTermination,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    w_a: Vec2,
    w_b: Vec2,
    /// `w_b - w_a`
    w: Vec2,
    /// Barycentric coordinate of the closest point.
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) -> Self {
        let mut simplex = Simplex::default();
        let indices_valid = cache.count <= 3
            && (0..cache.count)
                .all(|i| cache.index_a[i] < proxy_a.count() && cache.index_b[i] < proxy_b.count());

        if indices_valid {
            simplex.count = cache.count;
            for i in 0..cache.count {
                let v = &mut simplex.v[i];
                v.index_a = cache.index_a[i];
                v.index_b = cache.index_b[i];
                v.w_a = xf_a.apply(proxy_a.vertex(v.index_a));
                v.w_b = xf_b.apply(proxy_b.vertex(v.index_b));
                v.w = v.w_b - v.w_a;
                v.a = 0.0;
            }

            // Flush the cache if the metric changed drastically.
            if simplex.count > 1 {
                let metric1 = cache.metric;
                let metric2 = simplex.metric();
                if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                    simplex.count = 0;
                }
            }
        }

        if simplex.count == 0 {
            let v = &mut simplex.v[0];
            v.index_a = 0;
            v.index_b = 0;
            v.w_a = xf_a.apply(proxy_a.vertex(0));
            v.w_b = xf_b.apply(proxy_b.vertex(0));
            v.w = v.w_b - v.w_a;
            v.a = 1.0;
            simplex.count = 1;
        }
        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count;
        for i in 0..self.count {
            cache.index_a[i] = self.v[i].index_a;
            cache.index_b[i] = self.v[i].index_b;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    cross_sv(1.0, e12)
                } else {
                    cross_vs(e12, 1.0)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        let v = &self.v;
        match self.count {
            1 => (v[0].w_a, v[0].w_b),
            2 => (
                v[0].a * v[0].w_a + v[1].a * v[1].w_a,
                v[0].a * v[0].w_b + v[1].a * v[1].w_b,
            ),
            _ => {
                let p = v[0].a * v[0].w_a + v[1].a * v[1].w_a + v[2].a * v[2].w_a;
                (p, p)
            }
        }
    }

    fn metric(&self) -> f32 {
        let v = &self.v;
        match self.count {
            2 => v[0].w.distance(v[1].w),
            3 => cross(v[1].w - v[0].w, v[2].w - v[0].w),
            _ => 0.0,
        }
    }

    /// Closest point on a segment to the origin, via barycentric coordinates.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        let inv = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv;
        self.v[1].a = d12_2 * inv;
        self.count = 2;
    }

    /// Closest feature of a triangle to the origin: a vertex, an edge or the interior.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
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
            let inv = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Must be in triangle123
        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }
}

/// Computes the closest points between two proxies, warm-starting from and updating `cache`.
pub fn distance(input: &DistanceInput, cache: &mut SimplexCache) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);

    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];
    let mut iterations = 0;
    let mut termination = GjkTermination::MaxIterations;

    while iterations < input.max_iterations {
        // Copy the simplex so duplicates can be detected.
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        if simplex.count == 3 {
            termination = GjkTermination::Overlap;
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin is probably contained by a line segment or triangle.
            termination = GjkTermination::ZeroDirection;
            break;
        }

        let index_a = proxy_a.support(xf_a.rotation.apply_inverse(-d));
        let index_b = proxy_b.support(xf_b.rotation.apply_inverse(d));
        let vertex = &mut simplex.v[simplex.count];
        vertex.index_a = index_a;
        vertex.w_a = xf_a.apply(proxy_a.vertex(index_a));
        vertex.index_b = index_b;
        vertex.w_b = xf_b.apply(proxy_b.vertex(index_b));
        vertex.w = vertex.w_b - vertex.w_a;

        iterations += 1;

        // Main termination criterion: a repeated support point means no progress.
        let duplicate = (0..save_count).any(|i| index_a == save_a[i] && index_b == save_b[i]);
        if duplicate {
            termination = GjkTermination::DuplicateVertex;
            break;
        }

        simplex.count += 1;
    }

    if termination == GjkTermination::MaxIterations {
        log::trace!("gjk hit iteration cap ({})", input.max_iterations);
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = point_a.distance(point_b);
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius();
        let r_b = proxy_b.radius();
        if dist > r_a + r_b && dist > f32::EPSILON {
            // Shapes are still not overlapped: move the witness points to the outer surfaces.
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalize_or_zero();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations,
        termination,
    }
}

/// Whether two shape children overlap once rounding radii are included.
pub fn test_overlap(
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    child_b: usize,
    xf_b: &Transform,
    cache: &mut SimplexCache,
) -> bool {
    let input = DistanceInput::new(
        shape_a.distance_proxy(child_a),
        *xf_a,
        shape_b.distance_proxy(child_b),
        *xf_b,
    )
    .with_radii(true);
    distance(&input, cache).distance < 10.0 * f32::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::shapes::PolygonShape;
    use approx::assert_relative_eq;

    fn box_proxy(hx: f32, hy: f32) -> DistanceProxy {
        let polygon = PolygonShape::new_box(hx, hy);
        DistanceProxy::new(polygon.vertices(), polygon.radius)
    }

    #[test]
    fn separated_boxes_report_gap_between_cores() {
        let a = box_proxy(1.0, 1.0);
        let b = box_proxy(0.5, 0.5);
        let input = DistanceInput::new(
            a,
            Transform::IDENTITY,
            b,
            Transform::new(Vec2::new(4.0, 0.25), 0.0),
        );
        let mut cache = SimplexCache::default();
        let output = distance(&input, &mut cache);
        assert_relative_eq!(output.distance, 2.5, epsilon = 1e-5);
        assert_relative_eq!(output.point_a.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(output.point_b.x, 3.5, epsilon = 1e-5);
        assert!(cache.count >= 1);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = box_proxy(1.0, 0.5);
        let b = DistanceProxy::new(&[Vec2::ZERO], 0.75);
        let xf_a = Transform::new(Vec2::new(-0.5, 1.0), 0.4);
        let xf_b = Transform::new(Vec2::new(3.0, -2.0), -1.1);

        let ab = distance(&DistanceInput::new(a, xf_a, b, xf_b), &mut SimplexCache::default());
        let ba = distance(&DistanceInput::new(b, xf_b, a, xf_a), &mut SimplexCache::default());
        assert_relative_eq!(ab.distance, ba.distance, epsilon = 1e-4);
        assert_relative_eq!(ab.point_a.distance(ba.point_b), 0.0, epsilon = 1e-4);
    }

    #[test]
    fn coincident_shapes_have_zero_distance() {
        let a = box_proxy(1.0, 1.0);
        let xf = Transform::new(Vec2::new(2.0, 3.0), 0.3);
        let output = distance(
            &DistanceInput::new(a, xf, a, xf).with_radii(true),
            &mut SimplexCache::default(),
        );
        assert_eq!(output.distance, 0.0);
        assert_ne!(output.termination, GjkTermination::MaxIterations);
    }

    #[test]
    fn use_radii_moves_witness_points_to_surfaces() {
        let a = DistanceProxy::new(&[Vec2::ZERO], 1.0);
        let b = DistanceProxy::new(&[Vec2::ZERO], 1.0);
        let input = DistanceInput::new(a, Transform::IDENTITY, b, Transform::new(Vec2::new(5.0, 0.0), 0.0))
            .with_radii(true);
        let output = distance(&input, &mut SimplexCache::default());
        assert_relative_eq!(output.distance, 3.0, epsilon = 1e-5);
        assert_relative_eq!(output.point_a.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(output.point_b.x, 4.0, epsilon = 1e-5);
    }

    #[test]
    fn warm_cache_converges_without_extra_iterations() {
        let a = box_proxy(1.0, 1.0);
        let b = box_proxy(1.0, 1.0);
        let input = DistanceInput::new(
            a,
            Transform::IDENTITY,
            b,
            Transform::new(Vec2::new(3.0, 0.5), 0.2),
        );
        let mut cache = SimplexCache::default();
        let cold = distance(&input, &mut cache);
        let warm = distance(&input, &mut cache);
        assert_relative_eq!(cold.distance, warm.distance, epsilon = 1e-5);
        assert!(warm.iterations <= cold.iterations);
    }

    #[test]
    fn stale_cache_indices_fall_back_to_single_point() {
        let a = DistanceProxy::new(&[Vec2::ZERO], 0.5);
        let b = box_proxy(1.0, 1.0);
        let mut cache = SimplexCache {
            metric: 1.0,
            count: 2,
            index_a: [3, 7, 0],
            index_b: [0, 1, 0],
        };
        let output = distance(
            &DistanceInput::new(a, Transform::IDENTITY, b, Transform::new(Vec2::new(3.0, 0.0), 0.0)),
            &mut cache,
        );
        assert_relative_eq!(output.distance, 2.0, epsilon = 1e-5);
        assert!(cache.index_a[..cache.count].iter().all(|&i| i == 0));
    }

    #[test]
    fn overlap_test_includes_radii() {
        let a = Shape::circle(1.0);
        let b = Shape::circle(1.0);
        let mut cache = SimplexCache::default();
        let near = Transform::new(Vec2::new(1.9, 0.0), 0.0);
        let far = Transform::new(Vec2::new(2.1, 0.0), 0.0);
        assert!(test_overlap(&a, 0, &Transform::IDENTITY, &b, 0, &near, &mut cache));
        assert!(!test_overlap(&a, 0, &Transform::IDENTITY, &b, 0, &far, &mut cache));
    }
}
