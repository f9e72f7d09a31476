//! Narrow phase: per shape-pair manifold generation.
//!
//! Every routine returns a [`Manifold`] whose normal, once mapped to world space through
//! [`super::manifold::WorldManifold`], points from shape A to shape B.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::{
    clipping::{clip_segment_to_line, ClipVertex},
    manifold::{ContactFeature, ContactFeatureType, Manifold, ManifoldType},
    shapes::{CircleShape, EdgeShape, PolygonShape, Shape, ShapeType},
};
use crate::{
    config::{LINEAR_SLOP, MAX_MANIFOLD_POINTS, MAX_POLYGON_VERTICES, POLYGON_RADIUS},
    core::types::Transform,
    utils::math::{cross, cross_vs},
};

/// Supported shape pairings. Shape A always holds the first-named type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContactKind {
    CircleCircle,
    PolygonCircle,
    PolygonPolygon,
    EdgeCircle,
    EdgePolygon,
    ChainCircle,
    ChainPolygon,
}

impl ContactKind {
    pub const ALL: [ContactKind; 7] = [
        ContactKind::CircleCircle,
        ContactKind::PolygonCircle,
        ContactKind::PolygonPolygon,
        ContactKind::EdgeCircle,
        ContactKind::EdgePolygon,
        ContactKind::ChainCircle,
        ContactKind::ChainPolygon,
    ];

    /// Dispatch table. Returns the kind and whether the two fixtures must be swapped so that A
    /// carries the first-named shape. Edge/chain against edge/chain never collides.
    pub fn resolve(type_a: ShapeType, type_b: ShapeType) -> Option<(ContactKind, bool)> {
        use ShapeType::*;
        let entry = match (type_a, type_b) {
            (Circle, Circle) => (ContactKind::CircleCircle, false),
            (Polygon, Circle) => (ContactKind::PolygonCircle, false),
            (Circle, Polygon) => (ContactKind::PolygonCircle, true),
            (Polygon, Polygon) => (ContactKind::PolygonPolygon, false),
            (Edge, Circle) => (ContactKind::EdgeCircle, false),
            (Circle, Edge) => (ContactKind::EdgeCircle, true),
            (Edge, Polygon) => (ContactKind::EdgePolygon, false),
            (Polygon, Edge) => (ContactKind::EdgePolygon, true),
            (Chain, Circle) => (ContactKind::ChainCircle, false),
            (Circle, Chain) => (ContactKind::ChainCircle, true),
            (Chain, Polygon) => (ContactKind::ChainPolygon, false),
            (Polygon, Chain) => (ContactKind::ChainPolygon, true),
            (Edge | Chain, Edge | Chain) => return None,
        };
        Some(entry)
    }
}

/// Evaluates the manifold for `kind`. Shapes must already be ordered as the kind names them.
pub fn collide(
    kind: ContactKind,
    shape_a: &Shape,
    child_a: usize,
    xf_a: &Transform,
    shape_b: &Shape,
    xf_b: &Transform,
) -> Manifold {
    match (kind, shape_a, shape_b) {
        (ContactKind::CircleCircle, Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (ContactKind::PolygonCircle, Shape::Polygon(a), Shape::Circle(b)) => {
            collide_polygon_and_circle(a, xf_a, b, xf_b)
        }
        (ContactKind::PolygonPolygon, Shape::Polygon(a), Shape::Polygon(b)) => {
            collide_polygons(a, xf_a, b, xf_b)
        }
        (ContactKind::EdgeCircle, Shape::Edge(a), Shape::Circle(b)) => collide_edge_and_circle(a, xf_a, b, xf_b),
        (ContactKind::EdgePolygon, Shape::Edge(a), Shape::Polygon(b)) => {
            collide_edge_and_polygon(a, xf_a, b, xf_b)
        }
        (ContactKind::ChainCircle, Shape::Chain(a), Shape::Circle(b)) => {
            collide_edge_and_circle(&a.child_edge(child_a), xf_a, b, xf_b)
        }
        (ContactKind::ChainPolygon, Shape::Chain(a), Shape::Polygon(b)) => {
            collide_edge_and_polygon(&a.child_edge(child_a), xf_a, b, xf_b)
        }
        _ => {
            log::warn!("contact kind {kind:?} does not match shapes {:?}/{:?}", shape_a.shape_type(), shape_b.shape_type());
            Manifold::default()
        }
    }
}

pub fn collide_circles(circle_a: &CircleShape, xf_a: &Transform, circle_b: &CircleShape, xf_b: &Transform) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.apply(circle_a.center);
    let p_b = xf_b.apply(circle_b.center);
    let radius = circle_a.radius + circle_b.radius;
    if p_a.distance_squared(p_b) > radius * radius {
        return manifold;
    }

    manifold.kind = ManifoldType::Circles;
    manifold.local_point = circle_a.center;
    manifold.local_normal = Vec2::ZERO;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.center;
    manifold.points[0].id = ContactFeature::default();
    manifold
}

pub fn collide_polygon_and_circle(
    polygon_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the polygon frame.
    let c = xf_b.apply(circle_b.center);
    let c_local = xf_a.apply_inverse(c);

    // Find the min separating edge.
    let radius = polygon_a.radius + circle_b.radius;
    let vertices = polygon_a.vertices();
    let normals = polygon_a.normals();
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    for i in 0..polygon_a.count {
        let s = normals[i].dot(c_local - vertices[i]);
        if s > radius {
            // Early out.
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    let v1 = vertices[normal_index];
    let v2 = vertices[(normal_index + 1) % polygon_a.count];

    manifold.kind = ManifoldType::FaceA;
    manifold.point_count = 1;
    manifold.points[0].local_point = circle_b.center;
    manifold.points[0].id = ContactFeature::default();

    // Center inside the polygon.
    if separation < f32::EPSILON {
        manifold.local_normal = normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        return manifold;
    }

    // Voronoi region of the closest edge.
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if c_local.distance_squared(v1) > radius * radius {
            return Manifold::default();
        }
        manifold.local_normal = (c_local - v1).normalize_or_zero();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if c_local.distance_squared(v2) > radius * radius {
            return Manifold::default();
        }
        manifold.local_normal = (c_local - v2).normalize_or_zero();
        manifold.local_point = v2;
    } else {
        let face_center = 0.5 * (v1 + v2);
        let s = (c_local - face_center).dot(normals[normal_index]);
        if s > radius {
            return Manifold::default();
        }
        manifold.local_normal = normals[normal_index];
        manifold.local_point = face_center;
    }
    manifold
}

/// Largest separation of `poly2` from the face normals of `poly1`, with the face index.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (usize, f32) {
    let xf = xf2.inverse_combine(xf1);
    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for i in 0..poly1.count {
        // Poly1 normal and vertex in poly2's frame.
        let n = xf.rotation.apply(poly1.normals[i]);
        let v1 = xf.apply(poly1.vertices[i]);

        let si = poly2
            .vertices()
            .iter()
            .map(|&v2| n.dot(v2 - v1))
            .fold(f32::MAX, f32::min);

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }
    (best_index, max_separation)
}

/// Edge of `poly2` most anti-parallel to reference face `edge1` of `poly1`, in world space.
fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    debug_assert!(edge1 < poly1.count);
    let normal1 = xf2.rotation.apply_inverse(xf1.rotation.apply(poly1.normals[edge1]));

    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..poly2.count {
        let dot = normal1.dot(poly2.normals[i]);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    let i1 = index;
    let i2 = if i1 + 1 < poly2.count { i1 + 1 } else { 0 };
    [
        ClipVertex {
            v: xf2.apply(poly2.vertices[i1]),
            id: ContactFeature::new(edge1, ContactFeatureType::Face, i1, ContactFeatureType::Vertex),
        },
        ClipVertex {
            v: xf2.apply(poly2.vertices[i2]),
            id: ContactFeature::new(edge1, ContactFeatureType::Face, i2, ContactFeatureType::Vertex),
        },
    ]
}

/// Separating-axis test over both polygons, then clipping of the incident edge against the
/// side planes of the reference face.
///
/// The reference face is the one on A unless B's axis is clearly better, which keeps the
/// choice stable when both separations are nearly equal.
pub fn collide_polygons(poly_a: &PolygonShape, xf_a: &Transform, poly_b: &PolygonShape, xf_b: &Transform) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = poly_a.radius + poly_b.radius;

    let (edge_a, separation_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (edge_b, separation_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    let tolerance = 0.1 * LINEAR_SLOP;
    let (poly1, poly2, xf1, xf2, edge1, flip) = if separation_b > separation_a + tolerance {
        manifold.kind = ManifoldType::FaceB;
        (poly_b, poly_a, xf_b, xf_a, edge_b, true)
    } else {
        manifold.kind = ManifoldType::FaceA;
        (poly_a, poly_b, xf_a, xf_b, edge_a, false)
    };

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let iv1 = edge1;
    let iv2 = if edge1 + 1 < poly1.count { edge1 + 1 } else { 0 };
    let mut v11 = poly1.vertices[iv1];
    let mut v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalize_or_zero();
    let local_normal = cross_vs(local_tangent, 1.0);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.rotation.apply(local_tangent);
    let normal = cross_vs(tangent, 1.0);

    v11 = xf1.apply(v11);
    v12 = xf1.apply(v12);

    // Face offset.
    let front_offset = normal.dot(v11);

    // Side offsets, extended by polygon skin thickness.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    let (clip_points1, np) = clip_segment_to_line(&incident_edge, -tangent, side_offset1, iv1);
    if np < 2 {
        return manifold;
    }
    let (clip_points2, np) = clip_segment_to_line(&clip_points1, tangent, side_offset2, iv2);
    if np < 2 {
        return manifold;
    }

    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for clip in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(clip.v) - front_offset;
        if separation <= total_radius {
            let cp = &mut manifold.points[point_count];
            cp.local_point = xf2.apply_inverse(clip.v);
            cp.id = if flip { clip.id.swapped() } else { clip.id };
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
    manifold
}

/// Circle against a segment. One-sided edges use their ghost vertices to hand vertex regions
/// to the neighboring edge.
pub fn collide_edge_and_circle(edge_a: &EdgeShape, xf_a: &Transform, circle_b: &CircleShape, xf_b: &Transform) -> Manifold {
    let mut manifold = Manifold::default();

    // Circle center in the frame of the edge.
    let q = xf_a.apply_inverse(xf_b.apply(circle_b.center));

    let a = edge_a.vertex1;
    let b = edge_a.vertex2;
    let e = b - a;

    // Normal points to the right.
    let mut n = Vec2::new(e.y, -e.x);
    let offset = n.dot(q - a);

    let one_sided = edge_a.one_sided;
    if one_sided && offset < 0.0 {
        return manifold;
    }

    // Barycentric coordinates.
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = POLYGON_RADIUS + circle_b.radius;

    let vertex_contact = |point: Vec2, index_a: usize| {
        let mut m = Manifold {
            kind: ManifoldType::Circles,
            local_normal: Vec2::ZERO,
            local_point: point,
            point_count: 1,
            ..Default::default()
        };
        m.points[0].id = ContactFeature::new(index_a, ContactFeatureType::Vertex, 0, ContactFeatureType::Vertex);
        m.points[0].local_point = circle_b.center;
        m
    };

    // Region A
    if v <= 0.0 {
        if q.distance_squared(a) > radius * radius {
            return manifold;
        }
        // Is the circle in region AB of the previous edge?
        if one_sided {
            let a1 = edge_a.vertex0;
            let b1 = a;
            let u1 = (b1 - a1).dot(b1 - q);
            if u1 > 0.0 {
                return manifold;
            }
        }
        return vertex_contact(a, 0);
    }

    // Region B
    if u <= 0.0 {
        if q.distance_squared(b) > radius * radius {
            return manifold;
        }
        // Is the circle in region AB of the next edge?
        if one_sided {
            let b2 = edge_a.vertex3;
            let a2 = b;
            let v2 = (b2 - a2).dot(q - a2);
            if v2 > 0.0 {
                return manifold;
            }
        }
        return vertex_contact(b, 1);
    }

    // Region AB
    let den = e.dot(e);
    debug_assert!(den > 0.0);
    let p = (1.0 / den) * (u * a + v * b);
    if q.distance_squared(p) > radius * radius {
        return manifold;
    }

    if offset < 0.0 {
        n = -n;
    }
    n = n.normalize_or_zero();

    manifold.kind = ManifoldType::FaceA;
    manifold.local_normal = n;
    manifold.local_point = a;
    manifold.point_count = 1;
    manifold.points[0].id = ContactFeature::new(0, ContactFeatureType::Face, 0, ContactFeatureType::Vertex);
    manifold.points[0].local_point = circle_b.center;
    manifold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AxisKind {
    EdgeA,
    EdgeB,
}

#[derive(Debug, Clone, Copy)]
struct SeparationAxis {
    kind: AxisKind,
    index: usize,
    separation: f32,
    normal: Vec2,
}

/// Polygon B expressed in the edge's frame.
struct TempPolygon {
    vertices: [Vec2; MAX_POLYGON_VERTICES],
    normals: [Vec2; MAX_POLYGON_VERTICES],
    count: usize,
}

fn edge_separation(polygon_b: &TempPolygon, v1: Vec2, normal1: Vec2) -> SeparationAxis {
    let mut axis = SeparationAxis {
        kind: AxisKind::EdgeA,
        index: 0,
        separation: f32::MIN,
        normal: Vec2::ZERO,
    };
    // Both sides of the edge; the deepest polygon vertex decides each.
    for (j, candidate) in [normal1, -normal1].into_iter().enumerate() {
        let sj = polygon_b.vertices[..polygon_b.count]
            .iter()
            .map(|&v| candidate.dot(v - v1))
            .fold(f32::MAX, f32::min);
        if sj > axis.separation {
            axis.index = j;
            axis.separation = sj;
            axis.normal = candidate;
        }
    }
    axis
}

fn polygon_separation(polygon_b: &TempPolygon, v1: Vec2, v2: Vec2) -> SeparationAxis {
    let mut axis = SeparationAxis {
        kind: AxisKind::EdgeB,
        index: 0,
        separation: f32::MIN,
        normal: Vec2::ZERO,
    };
    for i in 0..polygon_b.count {
        let n = -polygon_b.normals[i];
        let s1 = n.dot(polygon_b.vertices[i] - v1);
        let s2 = n.dot(polygon_b.vertices[i] - v2);
        let s = s1.min(s2);
        if s > axis.separation {
            axis.index = i;
            axis.separation = s;
            axis.normal = n;
        }
    }
    axis
}

struct ReferenceFace {
    i1: usize,
    i2: usize,
    v1: Vec2,
    v2: Vec2,
    normal: Vec2,
    side_normal1: Vec2,
    side_offset1: f32,
    side_normal2: Vec2,
    side_offset2: f32,
}

/// Segment against polygon with hysteresis on the axis choice. For one-sided edges the
/// Gauss map of the neighbors decides whether a normal is admitted, skipped (owned by the
/// neighbor) or snapped to the edge normal, so a polygon sliding across chain vertices gets
/// neither duplicate nor missing contacts.
pub fn collide_edge_and_polygon(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let xf = xf_a.inverse_combine(xf_b);
    let centroid_b = xf.apply(polygon_b.centroid);

    let v1 = edge_a.vertex1;
    let v2 = edge_a.vertex2;
    let edge1 = (v2 - v1).normalize_or_zero();

    // Normal points to the right for a CCW winding.
    let normal1 = Vec2::new(edge1.y, -edge1.x);
    let offset1 = normal1.dot(centroid_b - v1);

    let one_sided = edge_a.one_sided;
    if one_sided && offset1 < 0.0 {
        return manifold;
    }

    let mut temp = TempPolygon {
        vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
        count: polygon_b.count,
    };
    for i in 0..polygon_b.count {
        temp.vertices[i] = xf.apply(polygon_b.vertices[i]);
        temp.normals[i] = xf.rotation.apply(polygon_b.normals[i]);
    }

    let radius = polygon_b.radius + POLYGON_RADIUS;

    let edge_axis = edge_separation(&temp, v1, normal1);
    if edge_axis.separation > radius {
        return manifold;
    }

    let polygon_axis = polygon_separation(&temp, v1, v2);
    if polygon_axis.separation > radius {
        return manifold;
    }

    // Hysteresis for jitter reduction.
    const RELATIVE_TOL: f32 = 0.98;
    const ABSOLUTE_TOL: f32 = 0.001;
    let mut primary = if polygon_axis.separation - radius
        > RELATIVE_TOL * (edge_axis.separation - radius) + ABSOLUTE_TOL
    {
        polygon_axis
    } else {
        edge_axis
    };

    if one_sided {
        let edge0 = (v1 - edge_a.vertex0).normalize_or_zero();
        let normal0 = Vec2::new(edge0.y, -edge0.x);
        let convex1 = cross(edge0, edge1) >= 0.0;

        let edge2 = (edge_a.vertex3 - v2).normalize_or_zero();
        let normal2 = Vec2::new(edge2.y, -edge2.x);
        let convex2 = cross(edge1, edge2) >= 0.0;

        const SIN_TOL: f32 = 0.1;
        let side1 = primary.normal.dot(edge1) <= 0.0;

        // Check the Gauss map.
        if side1 {
            if convex1 {
                if cross(primary.normal, normal0) > SIN_TOL {
                    // Skip region
                    return manifold;
                }
                // Admit region
            } else {
                // Snap region
                primary = edge_axis;
            }
        } else if convex2 {
            if cross(normal2, primary.normal) > SIN_TOL {
                return manifold;
            }
        } else {
            primary = edge_axis;
        }
    }

    let mut clip_points = [ClipVertex::default(); 2];
    let mut reference = if primary.kind == AxisKind::EdgeA {
        manifold.kind = ManifoldType::FaceA;

        // Polygon normal most anti-parallel to the edge normal.
        let mut best_index = 0;
        let mut best_value = primary.normal.dot(temp.normals[0]);
        for i in 1..temp.count {
            let value = primary.normal.dot(temp.normals[i]);
            if value < best_value {
                best_value = value;
                best_index = i;
            }
        }

        let i1 = best_index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };
        clip_points[0] = ClipVertex {
            v: temp.vertices[i1],
            id: ContactFeature::new(0, ContactFeatureType::Face, i1, ContactFeatureType::Vertex),
        };
        clip_points[1] = ClipVertex {
            v: temp.vertices[i2],
            id: ContactFeature::new(0, ContactFeatureType::Face, i2, ContactFeatureType::Vertex),
        };

        ReferenceFace {
            i1: 0,
            i2: 1,
            v1,
            v2,
            normal: primary.normal,
            side_normal1: -edge1,
            side_offset1: 0.0,
            side_normal2: edge1,
            side_offset2: 0.0,
        }
    } else {
        manifold.kind = ManifoldType::FaceB;

        clip_points[0] = ClipVertex {
            v: v2,
            id: ContactFeature::new(1, ContactFeatureType::Vertex, primary.index, ContactFeatureType::Face),
        };
        clip_points[1] = ClipVertex {
            v: v1,
            id: ContactFeature::new(0, ContactFeatureType::Vertex, primary.index, ContactFeatureType::Face),
        };

        let i1 = primary.index;
        let i2 = if i1 + 1 < temp.count { i1 + 1 } else { 0 };
        let normal = temp.normals[i1];
        // CCW winding
        let side_normal1 = Vec2::new(normal.y, -normal.x);
        ReferenceFace {
            i1,
            i2,
            v1: temp.vertices[i1],
            v2: temp.vertices[i2],
            normal,
            side_normal1,
            side_offset1: 0.0,
            side_normal2: -side_normal1,
            side_offset2: 0.0,
        }
    };

    reference.side_offset1 = reference.side_normal1.dot(reference.v1);
    reference.side_offset2 = reference.side_normal2.dot(reference.v2);

    // Clip incident edge against reference face side planes.
    let (clip_points1, np) =
        clip_segment_to_line(&clip_points, reference.side_normal1, reference.side_offset1, reference.i1);
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }
    let (clip_points2, np) =
        clip_segment_to_line(&clip_points1, reference.side_normal2, reference.side_offset2, reference.i2);
    if np < MAX_MANIFOLD_POINTS {
        return manifold;
    }

    if primary.kind == AxisKind::EdgeA {
        manifold.local_normal = reference.normal;
        manifold.local_point = reference.v1;
    } else {
        manifold.local_normal = polygon_b.normals[reference.i1];
        manifold.local_point = polygon_b.vertices[reference.i1];
    }

    let mut point_count = 0;
    for clip in clip_points2.iter() {
        let separation = reference.normal.dot(clip.v - reference.v1);
        if separation <= radius {
            let cp = &mut manifold.points[point_count];
            if primary.kind == AxisKind::EdgeA {
                cp.local_point = xf.apply_inverse(clip.v);
                cp.id = clip.id;
            } else {
                cp.local_point = clip.v;
                cp.id = clip.id.swapped();
            }
            point_count += 1;
        }
    }
    manifold.point_count = point_count;
    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{manifold::WorldManifold, shapes::ChainShape};
    use approx::assert_relative_eq;

    fn world(manifold: &Manifold, shape_a: &Shape, xf_a: &Transform, shape_b: &Shape, xf_b: &Transform) -> WorldManifold {
        WorldManifold::new(manifold, xf_a, shape_a.radius(), xf_b, shape_b.radius())
    }

    #[test]
    fn overlapping_boxes_produce_two_points_along_x() {
        let a = Shape::cuboid(1.0, 1.0);
        let b = Shape::cuboid(1.0, 1.0);
        let xf_a = Transform::IDENTITY;
        let xf_b = Transform::new(Vec2::new(1.5, 0.0), 0.0);
        let manifold = collide(ContactKind::PolygonPolygon, &a, 0, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 2);

        let wm = world(&manifold, &a, &xf_a, &b, &xf_b);
        assert_relative_eq!(wm.normal.x, 1.0, epsilon = 1e-5);
        assert_relative_eq!(wm.normal.y, 0.0, epsilon = 1e-5);
        // Skin radii make the reported overlap slightly deeper than the core overlap.
        for &separation in &wm.separations[..2] {
            assert_relative_eq!(separation, -0.5 - 2.0 * POLYGON_RADIUS, epsilon = 1e-4);
        }
    }

    #[test]
    fn feature_ids_are_stable_under_small_motion() {
        let a = Shape::cuboid(1.0, 1.0);
        let b = Shape::cuboid(0.5, 0.5);
        let xf_a = Transform::IDENTITY;
        let m1 = collide(ContactKind::PolygonPolygon, &a, 0, &xf_a, &b, &Transform::new(Vec2::new(0.2, 1.45), 0.0));
        let m2 = collide(ContactKind::PolygonPolygon, &a, 0, &xf_a, &b, &Transform::new(Vec2::new(0.25, 1.46), 0.01));
        assert_eq!(m1.point_count, 2);
        assert_eq!(m2.point_count, 2);
        let keys1: Vec<u32> = m1.points().iter().map(|p| p.id.key()).collect();
        let keys2: Vec<u32> = m2.points().iter().map(|p| p.id.key()).collect();
        assert_eq!(keys1, keys2);
    }

    #[test]
    fn every_pair_kind_reports_normal_from_a_to_b() {
        let circle = Shape::circle(0.5);
        let square = Shape::cuboid(0.5, 0.5);
        let edge = Shape::segment(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0));
        let chain = Shape::Chain(
            ChainShape::new_open(
                &[Vec2::new(2.0, 0.0), Vec2::new(-2.0, 0.0)],
                Vec2::new(3.0, 0.0),
                Vec2::new(-3.0, 0.0),
            )
            .expect("chain"),
        );
        // B sits above A, slightly overlapping.
        let xf_a = Transform::IDENTITY;
        let above = |h: f32| Transform::new(Vec2::new(0.1, h), 0.0);

        let cases: [(ContactKind, &Shape, &Shape, Transform); 7] = [
            (ContactKind::CircleCircle, &circle, &circle, above(0.9)),
            (ContactKind::PolygonCircle, &square, &circle, above(0.9)),
            (ContactKind::PolygonPolygon, &square, &square, above(0.9)),
            (ContactKind::EdgeCircle, &edge, &circle, above(0.45)),
            (ContactKind::EdgePolygon, &edge, &square, above(0.45)),
            (ContactKind::ChainCircle, &chain, &circle, above(0.45)),
            (ContactKind::ChainPolygon, &chain, &square, above(0.45)),
        ];
        for (kind, a, b, xf_b) in cases {
            let manifold = collide(kind, a, 0, &xf_a, b, &xf_b);
            assert!(manifold.point_count > 0, "{kind:?} found no contact");
            let wm = world(&manifold, a, &xf_a, b, &xf_b);
            assert!(wm.normal.y > 0.99, "{kind:?} normal {:?}", wm.normal);
        }
    }

    #[test]
    fn dispatch_table_swaps_reversed_pairs() {
        assert_eq!(
            ContactKind::resolve(ShapeType::Circle, ShapeType::Polygon),
            Some((ContactKind::PolygonCircle, true))
        );
        assert_eq!(
            ContactKind::resolve(ShapeType::Chain, ShapeType::Polygon),
            Some((ContactKind::ChainPolygon, false))
        );
        assert_eq!(ContactKind::resolve(ShapeType::Edge, ShapeType::Chain), None);
        assert_eq!(ContactKind::resolve(ShapeType::Chain, ShapeType::Chain), None);
    }

    #[test]
    fn circle_on_shared_chain_vertex_gets_one_contact() {
        let chain = ChainShape::new_open(
            &[Vec2::new(2.0, 0.0), Vec2::new(0.0, 0.0), Vec2::new(-2.0, 0.0)],
            Vec2::new(4.0, 0.0),
            Vec2::new(-4.0, 0.0),
        )
        .expect("chain");
        let shape = Shape::Chain(chain);
        let circle = Shape::circle(0.5);
        // Just past the shared vertex (0, 0), over the first edge.
        let xf_b = Transform::new(Vec2::new(0.1, 0.45), 0.0);
        let counts: Vec<usize> = (0..shape.child_count())
            .map(|child| collide(ContactKind::ChainCircle, &shape, child, &Transform::IDENTITY, &circle, &xf_b).point_count)
            .collect();
        assert_eq!(counts, vec![1, 0]);
    }

    #[test]
    fn one_sided_edge_ignores_shapes_behind_it() {
        let edge = Shape::Edge(EdgeShape::new_one_sided(
            Vec2::new(3.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(-2.0, 0.0),
            Vec2::new(-3.0, 0.0),
        ));
        let circle = Shape::circle(0.5);
        let square = Shape::cuboid(0.5, 0.5);
        let below = Transform::new(Vec2::new(0.0, -0.4), 0.0);
        assert!(collide(ContactKind::EdgeCircle, &edge, 0, &Transform::IDENTITY, &circle, &below).is_empty());
        assert!(collide(ContactKind::EdgePolygon, &edge, 0, &Transform::IDENTITY, &square, &below).is_empty());
    }

    #[test]
    fn separated_shapes_produce_empty_manifolds() {
        let a = Shape::cuboid(1.0, 1.0);
        let c = Shape::circle(1.0);
        let far = Transform::new(Vec2::new(5.0, 0.0), 0.0);
        for kind in [ContactKind::PolygonPolygon, ContactKind::PolygonCircle] {
            let b = if kind == ContactKind::PolygonPolygon { &a } else { &c };
            assert!(collide(kind, &a, 0, &Transform::IDENTITY, b, &far).is_empty());
        }
        assert!(collide(ContactKind::CircleCircle, &c, 0, &Transform::IDENTITY, &c, &far).is_empty());
    }
}
