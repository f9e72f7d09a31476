use glam::Vec2;

use super::manifold::{ContactFeature, ContactFeatureType};

/// Incident-edge vertex carried through clipping together with its feature id.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactFeature,
}

/// Clips a segment against the half-plane `dot(normal, x) <= offset`.
///
/// Returns the kept vertices and how many are valid. A vertex created by the clip is tagged as
/// reference vertex `vertex_index_a` against the incident face.
pub fn clip_segment_to_line(
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> ([ClipVertex; 2], usize) {
    let mut v_out = [ClipVertex::default(); 2];
    let mut count = 0;

    // Distance of end points to the line
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // Points behind the plane are kept.
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // Points on different sides of the plane.
    if distance0 * distance1 < 0.0 && count < 2 {
        let interp = distance0 / (distance0 - distance1);
        v_out[count] = ClipVertex {
            v: v_in[0].v + interp * (v_in[1].v - v_in[0].v),
            id: ContactFeature {
                index_a: vertex_index_a as u8,
                index_b: v_in[0].id.index_b,
                type_a: ContactFeatureType::Vertex,
                type_b: ContactFeatureType::Face,
            },
        };
        count += 1;
    }

    (v_out, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(x: f32, y: f32, index_b: u8) -> ClipVertex {
        ClipVertex {
            v: Vec2::new(x, y),
            id: ContactFeature {
                index_a: 0,
                index_b,
                type_a: ContactFeatureType::Face,
                type_b: ContactFeatureType::Vertex,
            },
        }
    }

    #[test]
    fn crossing_segment_is_cut_at_the_plane() {
        let input = [vertex(-2.0, 0.0, 1), vertex(2.0, 1.0, 2)];
        let (out, count) = clip_segment_to_line(&input, Vec2::X, 1.0, 3);
        assert_eq!(count, 2);
        assert_eq!(out[0], input[0]);
        assert!((out[1].v - Vec2::new(1.0, 0.75)).length() < 1e-6);
        assert_eq!(out[1].id.index_a, 3);
        assert_eq!(out[1].id.type_a, ContactFeatureType::Vertex);
    }

    #[test]
    fn segment_fully_outside_is_dropped() {
        let input = [vertex(2.0, 0.0, 1), vertex(3.0, 0.0, 2)];
        let (_, count) = clip_segment_to_line(&input, Vec2::X, 1.0, 0);
        assert_eq!(count, 0);
    }
}
