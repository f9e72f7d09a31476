//! Collision geometry: circles, convex polygons, segments and chains.
//!
//! Every shape exposes the same capability set (bounds, distance proxy, ray cast, mass) through
//! the closed [`Shape`] enum. Chains are containers of one-sided edges and are addressed per child.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{
    aabb::{Aabb, RayCastInput, RayCastOutput},
    distance::DistanceProxy,
};
use crate::{
    config::{LINEAR_SLOP, MAX_POLYGON_VERTICES, POLYGON_RADIUS},
    core::types::{MassData, Transform},
    error::{PhysicsError, PhysicsResult},
    utils::math::{cross, cross_vs},
};

/// Tag used by the narrow-phase dispatch table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ShapeType {
    Circle,
    Edge,
    Polygon,
    Chain,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleShape {
    /// Center in body coordinates.
    pub center: Vec2,
    pub radius: f32,
}

impl CircleShape {
    pub fn new(radius: f32) -> Self {
        Self {
            center: Vec2::ZERO,
            radius,
        }
    }

    pub fn with_center(mut self, center: Vec2) -> Self {
        self.center = center;
        self
    }
}

/// Segment `vertex1 -> vertex2`. One-sided edges also carry the neighboring ghost vertices
/// `vertex0`/`vertex3` and only collide on the right side of the segment direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeShape {
    pub vertex0: Vec2,
    pub vertex1: Vec2,
    pub vertex2: Vec2,
    pub vertex3: Vec2,
    pub one_sided: bool,
}

impl EdgeShape {
    /// Two-sided segment.
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        Self {
            vertex0: v1,
            vertex1: v1,
            vertex2: v2,
            vertex3: v2,
            one_sided: false,
        }
    }

    /// One-sided segment `v1 -> v2` with ghost neighbors `v0` and `v3`.
    pub fn new_one_sided(v0: Vec2, v1: Vec2, v2: Vec2, v3: Vec2) -> Self {
        Self {
            vertex0: v0,
            vertex1: v1,
            vertex2: v2,
            vertex3: v3,
            one_sided: true,
        }
    }

    /// Unit normal on the collision side of a one-sided edge.
    pub fn normal(&self) -> Vec2 {
        let e = self.vertex2 - self.vertex1;
        Vec2::new(e.y, -e.x).normalize_or_zero()
    }

    fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let p1 = xf.apply_inverse(input.p1);
        let p2 = xf.apply_inverse(input.p2);
        let d = p2 - p1;

        let v1 = self.vertex1;
        let v2 = self.vertex2;
        let normal = self.normal();

        // q = p1 + t * d, dot(normal, q - v1) = 0
        let numerator = normal.dot(v1 - p1);
        if self.one_sided && numerator > 0.0 {
            return None;
        }
        let denominator = normal.dot(d);
        if denominator == 0.0 {
            return None;
        }
        let t = numerator / denominator;
        if t < 0.0 || input.max_fraction < t {
            return None;
        }

        let q = p1 + t * d;
        let r = v2 - v1;
        let rr = r.dot(r);
        if rr == 0.0 {
            return None;
        }
        let s = (q - v1).dot(r) / rr;
        if !(0.0..=1.0).contains(&s) {
            return None;
        }

        let world_normal = xf.rotation.apply(normal);
        Some(RayCastOutput {
            normal: if numerator > 0.0 { -world_normal } else { world_normal },
            fraction: t,
        })
    }
}

/// Convex polygon with counter-clockwise winding and a small skin radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PolygonShape {
    pub vertices: [Vec2; MAX_POLYGON_VERTICES],
    pub normals: [Vec2; MAX_POLYGON_VERTICES],
    pub count: usize,
    pub centroid: Vec2,
    pub radius: f32,
}

impl PolygonShape {
    /// Builds the convex hull of `points`. Nearly coincident points are welded.
    pub fn new(points: &[Vec2]) -> PhysicsResult<Self> {
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return Err(PhysicsError::InvalidShape(format!(
                "polygon needs 3..={MAX_POLYGON_VERTICES} points, got {}",
                points.len()
            )));
        }

        let weld = (0.5 * LINEAR_SLOP) * (0.5 * LINEAR_SLOP);
        let mut ps: Vec<Vec2> = Vec::with_capacity(points.len());
        for &p in points {
            if !p.is_finite() {
                return Err(PhysicsError::InvalidShape("non-finite polygon vertex".into()));
            }
            if ps.iter().all(|q| q.distance_squared(p) >= weld) {
                ps.push(p);
            }
        }
        if ps.len() < 3 {
            return Err(PhysicsError::InvalidShape("polygon vertices are welded together".into()));
        }

        // Gift wrapping, starting at the right-most (then lowest) point.
        let mut i0 = 0;
        for (i, p) in ps.iter().enumerate().skip(1) {
            let best = ps[i0];
            if p.x > best.x || (p.x == best.x && p.y < best.y) {
                i0 = i;
            }
        }

        let mut hull = Vec::with_capacity(MAX_POLYGON_VERTICES);
        let mut ih = i0;
        loop {
            if hull.len() >= MAX_POLYGON_VERTICES {
                break;
            }
            hull.push(ih);
            let current = ps[ih];
            let mut ie = 0;
            for j in 1..ps.len() {
                if ie == ih {
                    ie = j;
                    continue;
                }
                let r = ps[ie] - current;
                let v = ps[j] - current;
                let c = cross(r, v);
                if c < 0.0 || (c == 0.0 && v.length_squared() > r.length_squared()) {
                    ie = j;
                }
            }
            ih = ie;
            if ie == i0 {
                break;
            }
        }

        if hull.len() < 3 {
            return Err(PhysicsError::InvalidShape("polygon is degenerate (collinear points)".into()));
        }

        let hull_points: Vec<Vec2> = hull.iter().map(|&i| ps[i]).collect();
        Ok(Self::from_hull(&hull_points))
    }

    /// Assumes `hull` is convex, counter-clockwise and has 3..=8 points.
    fn from_hull(hull: &[Vec2]) -> Self {
        let count = hull.len();
        let mut vertices = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        let mut normals = [Vec2::ZERO; MAX_POLYGON_VERTICES];
        vertices[..count].copy_from_slice(hull);
        for i in 0..count {
            let edge = vertices[(i + 1) % count] - vertices[i];
            debug_assert!(edge.length_squared() > f32::EPSILON * f32::EPSILON);
            normals[i] = cross_vs(edge, 1.0).normalize_or_zero();
        }
        Self {
            vertices,
            normals,
            count,
            centroid: compute_centroid(&vertices[..count]),
            radius: POLYGON_RADIUS,
        }
    }

    /// Axis-aligned box centered on the body origin.
    pub fn new_box(hx: f32, hy: f32) -> Self {
        Self::from_hull(&[
            Vec2::new(-hx, -hy),
            Vec2::new(hx, -hy),
            Vec2::new(hx, hy),
            Vec2::new(-hx, hy),
        ])
    }

    pub fn new_oriented_box(hx: f32, hy: f32, center: Vec2, angle: f32) -> Self {
        let mut shape = Self::new_box(hx, hy);
        let xf = Transform::new(center, angle);
        for i in 0..shape.count {
            shape.vertices[i] = xf.apply(shape.vertices[i]);
            shape.normals[i] = xf.rotation.apply(shape.normals[i]);
        }
        shape.centroid = center;
        shape
    }

    pub fn vertices(&self) -> &[Vec2] {
        &self.vertices[..self.count]
    }

    pub fn normals(&self) -> &[Vec2] {
        &self.normals[..self.count]
    }

    fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        let local = xf.apply_inverse(p);
        (0..self.count).all(|i| self.normals[i].dot(local - self.vertices[i]) <= 0.0)
    }

    fn ray_cast(&self, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
        let p1 = xf.apply_inverse(input.p1);
        let p2 = xf.apply_inverse(input.p2);
        let d = p2 - p1;

        let mut lower = 0.0;
        let mut upper = input.max_fraction;
        let mut index = None;

        for i in 0..self.count {
            // p = p1 + a * d, dot(normal, p - v) = 0
            let numerator = self.normals[i].dot(self.vertices[i] - p1);
            let denominator = self.normals[i].dot(d);

            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 && numerator < lower * denominator {
                // Entering this half-space.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                upper = numerator / denominator;
            }

            if upper < lower {
                return None;
            }
        }

        index.map(|i| RayCastOutput {
            normal: xf.rotation.apply(self.normals[i]),
            fraction: lower,
        })
    }

    fn compute_mass(&self, density: f32) -> MassData {
        // Triangle fan about the first vertex keeps the integrals well-conditioned.
        const INV3: f32 = 1.0 / 3.0;
        let s = self.vertices[0];
        let mut center = Vec2::ZERO;
        let mut area = 0.0;
        let mut inertia = 0.0;

        for i in 0..self.count {
            let e1 = self.vertices[i] - s;
            let e2 = self.vertices[(i + 1) % self.count] - s;
            let d = cross(e1, e2);
            let triangle_area = 0.5 * d;
            area += triangle_area;
            center += triangle_area * INV3 * (e1 + e2);

            let int_x2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
            let int_y2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
            inertia += (0.25 * INV3 * d) * (int_x2 + int_y2);
        }

        debug_assert!(area > f32::EPSILON);
        let mass = density * area;
        center /= area;
        let world_center = center + s;
        // Shift inertia from the fan origin to the body origin.
        let inertia = density * inertia + mass * (world_center.dot(world_center) - center.dot(center));
        MassData {
            mass,
            center: world_center,
            inertia,
        }
    }
}

fn compute_centroid(vs: &[Vec2]) -> Vec2 {
    const INV3: f32 = 1.0 / 3.0;
    let origin = vs[0];
    let mut c = Vec2::ZERO;
    let mut area = 0.0;
    for i in 1..vs.len() - 1 {
        let e1 = vs[i] - origin;
        let e2 = vs[i + 1] - origin;
        let a = 0.5 * cross(e1, e2);
        c += a * INV3 * (e1 + e2);
        area += a;
    }
    debug_assert!(area > f32::EPSILON);
    c / area + origin
}

/// Polyline of one-sided edges, either closed (loop) or open with explicit ghost vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainShape {
    /// For loops the first vertex is repeated at the end.
    pub vertices: Vec<Vec2>,
    pub prev_vertex: Vec2,
    pub next_vertex: Vec2,
}

impl ChainShape {
    /// Closed loop; winding should be counter-clockwise so edge normals point outward.
    pub fn new_loop(points: &[Vec2]) -> PhysicsResult<Self> {
        if points.len() < 3 {
            return Err(PhysicsError::InvalidShape("chain loop needs at least 3 vertices".into()));
        }
        check_vertex_spacing(points)?;
        if points[0].distance_squared(points[points.len() - 1]) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(PhysicsError::InvalidShape("chain loop end points coincide".into()));
        }
        let mut vertices = points.to_vec();
        vertices.push(points[0]);
        Ok(Self {
            prev_vertex: points[points.len() - 1],
            next_vertex: points[1],
            vertices,
        })
    }

    /// Open chain; `prev_vertex`/`next_vertex` are the ghost neighbors beyond both ends.
    pub fn new_open(points: &[Vec2], prev_vertex: Vec2, next_vertex: Vec2) -> PhysicsResult<Self> {
        if points.len() < 2 {
            return Err(PhysicsError::InvalidShape("chain needs at least 2 vertices".into()));
        }
        check_vertex_spacing(points)?;
        Ok(Self {
            vertices: points.to_vec(),
            prev_vertex,
            next_vertex,
        })
    }

    pub fn edge_count(&self) -> usize {
        self.vertices.len().saturating_sub(1)
    }

    /// One-sided edge for child `index`, with ghost vertices taken from the neighbors.
    pub fn child_edge(&self, index: usize) -> EdgeShape {
        debug_assert!(index < self.edge_count());
        let vs = &self.vertices;
        let v0 = if index > 0 { vs[index - 1] } else { self.prev_vertex };
        let v3 = if index + 2 < vs.len() { vs[index + 2] } else { self.next_vertex };
        EdgeShape::new_one_sided(v0, vs[index], vs[index + 1], v3)
    }
}

fn check_vertex_spacing(points: &[Vec2]) -> PhysicsResult<()> {
    for pair in points.windows(2) {
        if !pair[0].is_finite() || !pair[1].is_finite() {
            return Err(PhysicsError::InvalidShape("non-finite chain vertex".into()));
        }
        if pair[0].distance_squared(pair[1]) <= LINEAR_SLOP * LINEAR_SLOP {
            return Err(PhysicsError::InvalidShape("chain vertices are too close".into()));
        }
    }
    Ok(())
}

/// Closed set of collision shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Circle(CircleShape),
    Edge(EdgeShape),
    Polygon(PolygonShape),
    Chain(ChainShape),
}

impl Shape {
    pub fn circle(radius: f32) -> Self {
        Shape::Circle(CircleShape::new(radius))
    }

    pub fn cuboid(hx: f32, hy: f32) -> Self {
        Shape::Polygon(PolygonShape::new_box(hx, hy))
    }

    pub fn segment(v1: Vec2, v2: Vec2) -> Self {
        Shape::Edge(EdgeShape::new(v1, v2))
    }

    pub fn polygon(points: &[Vec2]) -> PhysicsResult<Self> {
        PolygonShape::new(points).map(Shape::Polygon)
    }

    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// Rounding radius around the core geometry.
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(circle) => circle.radius,
            Shape::Polygon(polygon) => polygon.radius,
            Shape::Edge(_) | Shape::Chain(_) => POLYGON_RADIUS,
        }
    }

    /// Number of independently collidable children (edges of a chain, otherwise one).
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.edge_count(),
            _ => 1,
        }
    }

    pub fn compute_aabb(&self, xf: &Transform, child: usize) -> Aabb {
        match self {
            Shape::Circle(circle) => {
                Aabb::from_center(xf.apply(circle.center), Vec2::splat(circle.radius))
            }
            Shape::Polygon(polygon) => {
                let mut min = xf.apply(polygon.vertices[0]);
                let mut max = min;
                for &v in &polygon.vertices()[1..] {
                    let w = xf.apply(v);
                    min = min.min(w);
                    max = max.max(w);
                }
                Aabb::new(min, max).fattened(polygon.radius)
            }
            Shape::Edge(edge) => {
                Aabb::from_points(&[xf.apply(edge.vertex1), xf.apply(edge.vertex2)]).fattened(POLYGON_RADIUS)
            }
            Shape::Chain(chain) => {
                let edge = chain.child_edge(child);
                Aabb::from_points(&[xf.apply(edge.vertex1), xf.apply(edge.vertex2)]).fattened(POLYGON_RADIUS)
            }
        }
    }

    pub fn distance_proxy(&self, child: usize) -> DistanceProxy {
        match self {
            Shape::Circle(circle) => DistanceProxy::new(&[circle.center], circle.radius),
            Shape::Polygon(polygon) => DistanceProxy::new(polygon.vertices(), polygon.radius),
            Shape::Edge(edge) => DistanceProxy::new(&[edge.vertex1, edge.vertex2], POLYGON_RADIUS),
            Shape::Chain(chain) => {
                let edge = chain.child_edge(child);
                DistanceProxy::new(&[edge.vertex1, edge.vertex2], POLYGON_RADIUS)
            }
        }
    }

    /// Ray cast against the core geometry (polygon skin is ignored).
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Transform, child: usize) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(circle) => ray_cast_circle(circle, input, xf),
            Shape::Polygon(polygon) => polygon.ray_cast(input, xf),
            Shape::Edge(edge) => edge.ray_cast(input, xf),
            Shape::Chain(chain) => chain.child_edge(child).ray_cast(input, xf),
        }
    }

    /// Whether the world point lies inside the shape. Edges and chains have no area.
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(circle) => {
                let center = xf.apply(circle.center);
                center.distance_squared(p) <= circle.radius * circle.radius
            }
            Shape::Polygon(polygon) => polygon.test_point(xf, p),
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    /// Mass properties about the body origin. Edges and chains are massless.
    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(circle) => {
                let mass = density * std::f32::consts::PI * circle.radius * circle.radius;
                MassData {
                    mass,
                    center: circle.center,
                    inertia: mass * (0.5 * circle.radius * circle.radius + circle.center.dot(circle.center)),
                }
            }
            Shape::Polygon(polygon) => polygon.compute_mass(density),
            Shape::Edge(edge) => MassData {
                mass: 0.0,
                center: 0.5 * (edge.vertex1 + edge.vertex2),
                inertia: 0.0,
            },
            Shape::Chain(_) => MassData::default(),
        }
    }
}

fn ray_cast_circle(circle: &CircleShape, input: &RayCastInput, xf: &Transform) -> Option<RayCastOutput> {
    let position = xf.apply(circle.center);
    let s = input.p1 - position;
    let b = s.dot(s) - circle.radius * circle.radius;

    // Solve quadratic equation.
    let r = input.p2 - input.p1;
    let c = s.dot(r);
    let rr = r.dot(r);
    let sigma = c * c - rr * b;

    if sigma < 0.0 || rr < f32::EPSILON {
        return None;
    }

    // Smallest root.
    let a = -(c + sigma.sqrt());
    if 0.0 <= a && a <= input.max_fraction * rr {
        let fraction = a / rr;
        return Some(RayCastOutput {
            normal: (s + fraction * r).normalize_or_zero(),
            fraction,
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn hull_orders_points_counter_clockwise() {
        let points = [
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, -1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(-1.0, 1.0),
        ];
        let polygon = PolygonShape::new(&points).expect("valid hull");
        assert_eq!(polygon.count, 4);
        for i in 0..polygon.count {
            let a = polygon.vertices[i];
            let b = polygon.vertices[(i + 1) % polygon.count];
            let c = polygon.vertices[(i + 2) % polygon.count];
            assert!(cross(b - a, c - b) > 0.0);
        }
        assert_relative_eq!(polygon.centroid.length(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn collinear_points_are_rejected() {
        let points = [Vec2::ZERO, Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)];
        assert!(matches!(PolygonShape::new(&points), Err(PhysicsError::InvalidShape(_))));
    }

    #[test]
    fn box_mass_matches_closed_form() {
        let shape = Shape::cuboid(1.0, 0.5);
        let mass = shape.compute_mass(2.0);
        assert_relative_eq!(mass.mass, 4.0, epsilon = 1e-5);
        assert_relative_eq!(mass.center.length(), 0.0, epsilon = 1e-6);
        // m * (w^2 + h^2) / 12 with w = 2, h = 1
        assert_relative_eq!(mass.inertia, 4.0 * 5.0 / 12.0, epsilon = 1e-4);

        let offset = Shape::Polygon(PolygonShape::new_oriented_box(1.0, 0.5, Vec2::new(2.0, 0.0), 0.0));
        let shifted = offset.compute_mass(2.0);
        assert_relative_eq!(shifted.center.x, 2.0, epsilon = 1e-5);
        assert_relative_eq!(shifted.inertia, mass.inertia + 4.0 * 4.0, epsilon = 1e-3);
    }

    #[test]
    fn circle_ray_cast_reports_entry_point() {
        let shape = Shape::circle(1.0);
        let xf = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        let input = RayCastInput {
            p1: Vec2::ZERO,
            p2: Vec2::new(10.0, 0.0),
            max_fraction: 1.0,
        };
        let hit = shape.ray_cast(&input, &xf, 0).expect("hit");
        assert_relative_eq!(hit.fraction, 0.4, epsilon = 1e-5);
        assert_relative_eq!(hit.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn one_sided_edge_ignores_rays_from_back() {
        let edge = EdgeShape::new_one_sided(
            Vec2::new(-2.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 0.0),
        );
        let shape = Shape::Edge(edge);
        // Normal is (0, -1): only rays coming from below hit.
        let from_below = RayCastInput {
            p1: Vec2::new(0.0, -1.0),
            p2: Vec2::new(0.0, 1.0),
            max_fraction: 1.0,
        };
        let hit = shape.ray_cast(&from_below, &Transform::IDENTITY, 0).expect("front hit");
        assert_relative_eq!(hit.fraction, 0.5, epsilon = 1e-6);
        assert_relative_eq!(hit.normal.y, -1.0, epsilon = 1e-6);

        let from_above = RayCastInput {
            p1: Vec2::new(0.0, 1.0),
            p2: Vec2::new(0.0, -1.0),
            max_fraction: 1.0,
        };
        assert!(shape.ray_cast(&from_above, &Transform::IDENTITY, 0).is_none());
    }

    #[test]
    fn chain_children_share_ghost_vertices() {
        let chain = ChainShape::new_loop(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(4.0, 0.0),
            Vec2::new(4.0, 4.0),
            Vec2::new(0.0, 4.0),
        ])
        .expect("valid loop");
        let shape = Shape::Chain(chain.clone());
        assert_eq!(shape.child_count(), 4);

        let first = chain.child_edge(0);
        let last = chain.child_edge(3);
        assert_eq!(first.vertex0, last.vertex1);
        assert_eq!(first.vertex1, last.vertex2);
        assert_eq!(last.vertex3, first.vertex2);
        // Counter-clockwise loop: the bottom edge faces down and out.
        assert_relative_eq!(first.normal().y, -1.0, epsilon = 1e-6);
    }

    #[test]
    fn empty_chain_has_no_children() {
        let chain = ChainShape {
            vertices: Vec::new(),
            prev_vertex: Vec2::ZERO,
            next_vertex: Vec2::ZERO,
        };
        assert_eq!(chain.edge_count(), 0);
        assert_eq!(Shape::Chain(chain).child_count(), 0);
    }
}
