//! Sequential-impulse contact solver.
//!
//! Velocity constraints are solved with projected Gauss-Seidel: friction is clamped to the
//! Coulomb cone of the current normal impulse, then the accumulated normal impulse is clamped to
//! stay non-negative. Two-point manifolds use a block solver while the effective-mass matrix is
//! well conditioned. Position drift is removed afterwards by non-linear Gauss-Seidel.

use glam::{Mat2, Vec2};

use crate::{
    collision::{
        contact::ContactImpulse,
        manifold::{Manifold, ManifoldType},
    },
    config::{SimulationConfig, MAX_MANIFOLD_POINTS},
    core::types::{Position, Rot, Transform, Velocity},
    utils::{
        allocator::ContactKey,
        math::{cross, cross_sv, cross_vs},
    },
};

/// Upper bound on the condition number of the block solver's effective-mass matrix.
const MAX_CONDITION_NUMBER: f32 = 1000.0;

/// Parameters of one solver pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStep {
    pub dt: f32,
    pub inv_dt: f32,
    /// `dt` of this step times `1 / dt` of the previous one; rescales warm-start impulses.
    pub dt_ratio: f32,
    pub velocity_iterations: u32,
    pub position_iterations: u32,
    pub warm_starting: bool,
}

impl TimeStep {
    pub fn new(dt: f32, previous_inv_dt: f32, config: &SimulationConfig) -> Self {
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        Self {
            dt,
            inv_dt,
            dt_ratio: previous_inv_dt * dt,
            velocity_iterations: config.velocity_iterations,
            position_iterations: config.position_iterations,
            warm_starting: config.warm_starting,
        }
    }
}

/// Mass properties of an island body, indexed like the position and velocity arrays.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SolverBody {
    pub local_center: Vec2,
    pub inv_mass: f32,
    pub inv_inertia: f32,
}

/// Island-local state handed to joints.
pub struct SolverData<'a> {
    pub step: TimeStep,
    pub config: &'a SimulationConfig,
    pub bodies: &'a [SolverBody],
    pub positions: &'a mut [Position],
    pub velocities: &'a mut [Velocity],
}

/// Snapshot of one contact as seen by the solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactConstraintDef {
    pub key: ContactKey,
    pub index_a: usize,
    pub index_b: usize,
    pub friction: f32,
    pub restitution: f32,
    pub restitution_threshold: f32,
    pub tangent_speed: f32,
    pub radius_a: f32,
    pub radius_b: f32,
    pub manifold: Manifold,
}

#[derive(Debug, Clone, Copy, Default)]
struct ConstraintPoint {
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
    local_point: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct ContactConstraint {
    points: [ConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    normal_mass: Mat2,
    k: Mat2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    friction: f32,
    restitution: f32,
    restitution_threshold: f32,
    tangent_speed: f32,
    /// Points used by the velocity solver; may drop to one for ill-conditioned pairs.
    point_count: usize,
    /// Points used by the position solver.
    manifold_point_count: usize,
    local_normal: Vec2,
    local_point: Vec2,
    kind: ManifoldType,
    radius_a: f32,
    radius_b: f32,
}

/// Normal, contact point and separation for one manifold point at the current positions.
struct PositionManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionManifold {
    fn new(c: &ContactConstraint, xf_a: &Transform, xf_b: &Transform, index: usize) -> Self {
        match c.kind {
            ManifoldType::Circles => {
                let point_a = xf_a.apply(c.local_point);
                let point_b = xf_b.apply(c.points[0].local_point);
                let normal = (point_b - point_a).normalize_or_zero();
                Self {
                    normal,
                    point: 0.5 * (point_a + point_b),
                    separation: (point_b - point_a).dot(normal) - c.radius_a - c.radius_b,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.rotation.apply(c.local_normal);
                let plane_point = xf_a.apply(c.local_point);
                let clip_point = xf_b.apply(c.points[index].local_point);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - c.radius_a - c.radius_b,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.rotation.apply(c.local_normal);
                let plane_point = xf_b.apply(c.local_point);
                let clip_point = xf_a.apply(c.points[index].local_point);
                // Flip so the normal points from A to B.
                Self {
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - c.radius_a - c.radius_b,
                }
            }
        }
    }
}

fn body_transform(position: &Position, local_center: Vec2) -> Transform {
    let rotation = Rot::from_angle(position.angle);
    Transform {
        position: position.center - rotation.apply(local_center),
        rotation,
    }
}

/// Contact constraints of one island.
pub struct ContactSolver {
    step: TimeStep,
    constraints: Vec<ContactConstraint>,
    linear_slop: f32,
    max_linear_correction: f32,
    baumgarte: f32,
    toi_baumgarte: f32,
}

impl ContactSolver {
    pub fn new(step: TimeStep, defs: &[ContactConstraintDef], bodies: &[SolverBody], config: &SimulationConfig) -> Self {
        let constraints = defs
            .iter()
            .map(|def| {
                let body_a = bodies[def.index_a];
                let body_b = bodies[def.index_b];
                let manifold = &def.manifold;
                debug_assert!(manifold.point_count > 0);

                let mut points = [ConstraintPoint::default(); MAX_MANIFOLD_POINTS];
                for (point, mp) in points.iter_mut().zip(manifold.points()) {
                    if step.warm_starting {
                        point.normal_impulse = step.dt_ratio * mp.normal_impulse;
                        point.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                    }
                    point.local_point = mp.local_point;
                }

                ContactConstraint {
                    points,
                    normal: Vec2::ZERO,
                    normal_mass: Mat2::ZERO,
                    k: Mat2::ZERO,
                    index_a: def.index_a,
                    index_b: def.index_b,
                    inv_mass_a: body_a.inv_mass,
                    inv_mass_b: body_b.inv_mass,
                    inv_i_a: body_a.inv_inertia,
                    inv_i_b: body_b.inv_inertia,
                    local_center_a: body_a.local_center,
                    local_center_b: body_b.local_center,
                    friction: def.friction,
                    restitution: def.restitution,
                    restitution_threshold: def.restitution_threshold,
                    tangent_speed: def.tangent_speed,
                    point_count: manifold.point_count,
                    manifold_point_count: manifold.point_count,
                    local_normal: manifold.local_normal,
                    local_point: manifold.local_point,
                    kind: manifold.kind,
                    radius_a: def.radius_a,
                    radius_b: def.radius_b,
                }
            })
            .collect();

        Self {
            step,
            constraints,
            linear_slop: config.linear_slop,
            max_linear_correction: config.max_linear_correction,
            baumgarte: config.baumgarte,
            toi_baumgarte: config.toi_baumgarte,
        }
    }

    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Computes anchors, effective masses and restitution bias from the current state.
    pub fn initialize_velocity_constraints(&mut self, positions: &[Position], velocities: &[Velocity]) {
        for c in &mut self.constraints {
            let (m_a, m_b, i_a, i_b) = (c.inv_mass_a, c.inv_mass_b, c.inv_i_a, c.inv_i_b);
            let pos_a = positions[c.index_a];
            let pos_b = positions[c.index_b];
            let vel_a = velocities[c.index_a];
            let vel_b = velocities[c.index_b];

            let xf_a = body_transform(&pos_a, c.local_center_a);
            let xf_b = body_transform(&pos_b, c.local_center_b);

            let manifold = constraint_manifold(c);
            let world = crate::collision::manifold::WorldManifold::new(&manifold, &xf_a, c.radius_a, &xf_b, c.radius_b);
            c.normal = world.normal;
            let tangent = cross_vs(c.normal, 1.0);

            for j in 0..c.point_count {
                let point = &mut c.points[j];
                point.r_a = world.points[j] - pos_a.center;
                point.r_b = world.points[j] - pos_b.center;

                let rn_a = cross(point.r_a, c.normal);
                let rn_b = cross(point.r_b, c.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                point.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = cross(point.r_a, tangent);
                let rt_b = cross(point.r_b, tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                point.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Restitution only above the threshold speed.
                point.velocity_bias = 0.0;
                let v_rel = c.normal.dot(
                    vel_b.linear + cross_sv(vel_b.angular, point.r_b) - vel_a.linear - cross_sv(vel_a.angular, point.r_a),
                );
                if v_rel < -c.restitution_threshold {
                    point.velocity_bias = -c.restitution * v_rel;
                }
            }

            if c.point_count == 2 {
                let p1 = c.points[0];
                let p2 = c.points[1];
                let rn1_a = cross(p1.r_a, c.normal);
                let rn1_b = cross(p1.r_b, c.normal);
                let rn2_a = cross(p2.r_a, c.normal);
                let rn2_b = cross(p2.r_b, c.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    c.k = Mat2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    c.normal_mass = c.k.inverse();
                } else {
                    // Nearly redundant points: keep one.
                    c.point_count = 1;
                }
            }
        }
    }

    pub fn warm_start(&self, velocities: &mut [Velocity]) {
        for c in &self.constraints {
            let tangent = cross_vs(c.normal, 1.0);
            let mut vel_a = velocities[c.index_a];
            let mut vel_b = velocities[c.index_b];
            for point in &c.points[..c.point_count] {
                let p = point.normal_impulse * c.normal + point.tangent_impulse * tangent;
                vel_a.angular -= c.inv_i_a * cross(point.r_a, p);
                vel_a.linear -= c.inv_mass_a * p;
                vel_b.angular += c.inv_i_b * cross(point.r_b, p);
                vel_b.linear += c.inv_mass_b * p;
            }
            velocities[c.index_a] = vel_a;
            velocities[c.index_b] = vel_b;
        }
    }

    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for c in &mut self.constraints {
            let (m_a, m_b, i_a, i_b) = (c.inv_mass_a, c.inv_mass_b, c.inv_i_a, c.inv_i_b);
            let Velocity {
                linear: mut v_a,
                angular: mut w_a,
            } = velocities[c.index_a];
            let Velocity {
                linear: mut v_b,
                angular: mut w_b,
            } = velocities[c.index_b];

            let normal = c.normal;
            let tangent = cross_vs(normal, 1.0);

            // Friction first: normal impulses bound it.
            for point in &mut c.points[..c.point_count] {
                let dv = v_b + cross_sv(w_b, point.r_b) - v_a - cross_sv(w_a, point.r_a);
                let vt = dv.dot(tangent) - c.tangent_speed;
                let lambda = point.tangent_mass * -vt;

                let max_friction = c.friction * point.normal_impulse;
                let new_impulse = (point.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - point.tangent_impulse;
                point.tangent_impulse = new_impulse;

                let p = lambda * tangent;
                v_a -= m_a * p;
                w_a -= i_a * cross(point.r_a, p);
                v_b += m_b * p;
                w_b += i_b * cross(point.r_b, p);
            }

            if c.point_count == 1 {
                let point = &mut c.points[0];
                let dv = v_b + cross_sv(w_b, point.r_b) - v_a - cross_sv(w_a, point.r_a);
                let vn = dv.dot(normal);
                let lambda = -point.normal_mass * (vn - point.velocity_bias);

                let new_impulse = (point.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - point.normal_impulse;
                point.normal_impulse = new_impulse;

                let p = lambda * normal;
                v_a -= m_a * p;
                w_a -= i_a * cross(point.r_a, p);
                v_b += m_b * p;
                w_b += i_b * cross(point.r_b, p);
            } else {
                // Block solver: find the accumulated impulse x satisfying the linear
                // complementarity problem vn = K x + b, x >= 0, vn >= 0, x_i * vn_i = 0,
                // by enumerating the four active sets.
                let (cp1, cp2) = (c.points[0], c.points[1]);
                let a = Vec2::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                let dv1 = v_b + cross_sv(w_b, cp1.r_b) - v_a - cross_sv(w_a, cp1.r_a);
                let dv2 = v_b + cross_sv(w_b, cp2.r_b) - v_a - cross_sv(w_a, cp2.r_a);
                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                let b = Vec2::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias) - c.k * a;

                let candidates = [
                    // Both points active.
                    {
                        let x = -(c.normal_mass * b);
                        (x.x >= 0.0 && x.y >= 0.0).then_some(x)
                    },
                    // Only the first point active.
                    {
                        let x = Vec2::new(-cp1.normal_mass * b.x, 0.0);
                        let vn2 = c.k.x_axis.y * x.x + b.y;
                        (x.x >= 0.0 && vn2 >= 0.0).then_some(x)
                    },
                    // Only the second point active.
                    {
                        let x = Vec2::new(0.0, -cp2.normal_mass * b.y);
                        let vn1 = c.k.y_axis.x * x.y + b.x;
                        (x.y >= 0.0 && vn1 >= 0.0).then_some(x)
                    },
                    // Neither point active.
                    (b.x >= 0.0 && b.y >= 0.0).then_some(Vec2::ZERO),
                ];

                if let Some(x) = candidates.into_iter().flatten().next() {
                    let d = x - a;
                    let p1 = d.x * normal;
                    let p2 = d.y * normal;
                    v_a -= m_a * (p1 + p2);
                    w_a -= i_a * (cross(cp1.r_a, p1) + cross(cp2.r_a, p2));
                    v_b += m_b * (p1 + p2);
                    w_b += i_b * (cross(cp1.r_b, p1) + cross(cp2.r_b, p2));
                    c.points[0].normal_impulse = x.x;
                    c.points[1].normal_impulse = x.y;
                }
                // No solution: degenerate configuration, keep the previous impulses.
            }

            velocities[c.index_a] = Velocity {
                linear: v_a,
                angular: w_a,
            };
            velocities[c.index_b] = Velocity {
                linear: v_b,
                angular: w_b,
            };
        }
    }

    /// Writes accumulated impulses back into the manifolds for warm starting next step.
    pub fn store_impulses(&self, defs: &mut [ContactConstraintDef]) {
        for (c, def) in self.constraints.iter().zip(defs.iter_mut()) {
            for (j, point) in def.manifold.points_mut().iter_mut().enumerate() {
                // Points dropped from the velocity solve carry no impulse forward.
                let (normal, tangent) = if j < c.point_count {
                    (c.points[j].normal_impulse, c.points[j].tangent_impulse)
                } else {
                    (0.0, 0.0)
                };
                point.normal_impulse = normal;
                point.tangent_impulse = tangent;
            }
        }
    }

    /// Impulses applied per contact, in constraint order.
    pub fn impulses(&self) -> Vec<ContactImpulse> {
        self.constraints
            .iter()
            .map(|c| {
                let mut impulse = ContactImpulse {
                    count: c.point_count,
                    ..Default::default()
                };
                for j in 0..c.point_count {
                    impulse.normal_impulses[j] = c.points[j].normal_impulse;
                    impulse.tangent_impulses[j] = c.points[j].tangent_impulse;
                }
                impulse
            })
            .collect()
    }

    /// One non-linear Gauss-Seidel pass. Returns true once overlap is within `3 * linear_slop`.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let min_separation = self.solve_positions(positions, self.baumgarte, None);
        min_separation >= -3.0 * self.linear_slop
    }

    /// Position pass for a TOI sub-step: only the two TOI bodies move.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let min_separation = self.solve_positions(positions, self.toi_baumgarte, Some((toi_index_a, toi_index_b)));
        min_separation >= -1.5 * self.linear_slop
    }

    fn solve_positions(&self, positions: &mut [Position], baumgarte: f32, toi: Option<(usize, usize)>) -> f32 {
        let mut min_separation = 0.0_f32;
        let movable = |index: usize| toi.map_or(true, |(a, b)| index == a || index == b);

        for c in &self.constraints {
            let (m_a, i_a) = if movable(c.index_a) {
                (c.inv_mass_a, c.inv_i_a)
            } else {
                (0.0, 0.0)
            };
            let (m_b, i_b) = if movable(c.index_b) {
                (c.inv_mass_b, c.inv_i_b)
            } else {
                (0.0, 0.0)
            };

            let mut pos_a = positions[c.index_a];
            let mut pos_b = positions[c.index_b];

            for j in 0..c.manifold_point_count {
                let xf_a = body_transform(&pos_a, c.local_center_a);
                let xf_b = body_transform(&pos_b, c.local_center_b);
                let psm = PositionManifold::new(c, &xf_a, &xf_b, j);

                let r_a = psm.point - pos_a.center;
                let r_b = psm.point - pos_b.center;
                min_separation = min_separation.min(psm.separation);

                // Prevent large corrections and allow slop.
                let correction =
                    (baumgarte * (psm.separation + self.linear_slop)).clamp(-self.max_linear_correction, 0.0);

                let rn_a = cross(r_a, psm.normal);
                let rn_b = cross(r_b, psm.normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                let impulse = if k > 0.0 { -correction / k } else { 0.0 };

                let p = impulse * psm.normal;
                pos_a.center -= m_a * p;
                pos_a.angle -= i_a * cross(r_a, p);
                pos_b.center += m_b * p;
                pos_b.angle += i_b * cross(r_b, p);
            }

            positions[c.index_a] = pos_a;
            positions[c.index_b] = pos_b;
        }
        min_separation
    }

    pub fn step(&self) -> &TimeStep {
        &self.step
    }
}

/// Rebuilds a manifold view of the constraint for world-space evaluation.
fn constraint_manifold(c: &ContactConstraint) -> Manifold {
    let mut manifold = Manifold {
        local_normal: c.local_normal,
        local_point: c.local_point,
        kind: c.kind,
        point_count: c.manifold_point_count,
        ..Default::default()
    };
    for (point, source) in manifold.points.iter_mut().zip(&c.points) {
        point.local_point = source.local_point;
    }
    manifold
}

/// Per-step solver counters, merged across islands.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SolverStepMetrics {
    pub islands_solved: usize,
    pub contacts_solved: usize,
    pub joints_solved: usize,
    pub normal_impulse_sum: f32,
    pub tangent_impulse_sum: f32,
}

impl SolverStepMetrics {
    pub fn record_island(&mut self, impulses: &[ContactImpulse], joint_count: usize) {
        self.islands_solved += 1;
        self.contacts_solved += impulses.len();
        self.joints_solved += joint_count;
        for impulse in impulses {
            for j in 0..impulse.count {
                self.normal_impulse_sum += impulse.normal_impulses[j].abs();
                self.tangent_impulse_sum += impulse.tangent_impulses[j].abs();
            }
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.islands_solved += other.islands_solved;
        self.contacts_solved += other.contacts_solved;
        self.joints_solved += other.joints_solved;
        self.normal_impulse_sum += other.normal_impulse_sum;
        self.tangent_impulse_sum += other.tangent_impulse_sum;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{
        narrowphase::collide_polygons,
        shapes::PolygonShape,
    };
    use crate::config::POLYGON_RADIUS;

    fn resting_box_setup(gap: f32) -> (Vec<SolverBody>, Vec<Position>, Vec<Velocity>, ContactConstraintDef) {
        let ground = PolygonShape::new_box(5.0, 0.5);
        let crate_box = PolygonShape::new_box(0.5, 0.5);
        let xf_ground = Transform::IDENTITY;
        let xf_box = Transform::new(Vec2::new(0.0, 1.0 + gap), 0.0);
        let manifold = collide_polygons(&ground, &xf_ground, &crate_box, &xf_box);
        assert_eq!(manifold.point_count, 2);

        let bodies = vec![
            SolverBody::default(),
            SolverBody {
                local_center: Vec2::ZERO,
                inv_mass: 1.0,
                inv_inertia: 6.0,
            },
        ];
        let positions = vec![
            Position::default(),
            Position {
                center: xf_box.position,
                angle: 0.0,
            },
        ];
        let velocities = vec![
            Velocity::default(),
            Velocity {
                linear: Vec2::new(0.0, -2.0),
                angular: 0.0,
            },
        ];
        let def = ContactConstraintDef {
            key: ContactKey::default(),
            index_a: 0,
            index_b: 1,
            friction: 0.5,
            restitution: 0.0,
            restitution_threshold: 1.0,
            tangent_speed: 0.0,
            radius_a: POLYGON_RADIUS,
            radius_b: POLYGON_RADIUS,
            manifold,
        };
        (bodies, positions, velocities, def)
    }

    fn step() -> TimeStep {
        TimeStep::new(1.0 / 60.0, 60.0, &SimulationConfig::default())
    }

    #[test]
    fn approaching_box_is_stopped_without_bounce() {
        let (bodies, positions, mut velocities, def) = resting_box_setup(-0.01);
        let mut solver = ContactSolver::new(step(), &[def], &bodies, &SimulationConfig::default());
        solver.initialize_velocity_constraints(&positions, &velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }
        assert!(velocities[1].linear.y.abs() < 1e-4);
        assert!(velocities[1].angular.abs() < 1e-4);
        let impulses = solver.impulses();
        assert_eq!(impulses[0].count, 2);
        let total: f32 = impulses[0].normal_impulses.iter().sum();
        assert!((total - 2.0).abs() < 1e-3);
    }

    #[test]
    fn restitution_above_threshold_reflects_velocity() {
        let (bodies, positions, mut velocities, mut def) = resting_box_setup(-0.01);
        def.restitution = 1.0;
        let mut solver = ContactSolver::new(step(), &[def], &bodies, &SimulationConfig::default());
        solver.initialize_velocity_constraints(&positions, &velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }
        assert!((velocities[1].linear.y - 2.0).abs() < 1e-3);
    }

    #[test]
    fn position_pass_pushes_overlap_out() {
        let (bodies, mut positions, _, def) = resting_box_setup(-0.1);
        let config = SimulationConfig::default();
        let solver = ContactSolver::new(step(), &[def], &bodies, &config);
        let start = positions[1].center.y;
        let mut solved = false;
        for _ in 0..50 {
            if solver.solve_position_constraints(&mut positions) {
                solved = true;
                break;
            }
        }
        assert!(solved);
        assert!(positions[1].center.y > start);
        assert_eq!(positions[0], Position::default());
    }

    #[test]
    fn warm_start_scales_cached_impulses() {
        let (bodies, positions, _, mut def) = resting_box_setup(0.0);
        for point in def.manifold.points_mut() {
            point.normal_impulse = 1.0;
        }
        let mut solver = ContactSolver::new(step(), &[def], &bodies, &SimulationConfig::default());
        solver.initialize_velocity_constraints(&positions, &[Velocity::default(); 2]);
        let mut velocities = vec![Velocity::default(); 2];
        solver.warm_start(&mut velocities);
        assert!((velocities[1].linear.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn redundant_point_keeps_no_impulse_for_next_step() {
        let (bodies, positions, mut velocities, def) = resting_box_setup(-0.01);
        let mut def = def;
        let first = def.manifold.points()[0].local_point;
        for point in def.manifold.points_mut() {
            point.local_point = first;
            point.normal_impulse = 1.0;
        }
        let mut defs = [def];
        let mut solver = ContactSolver::new(step(), &defs, &bodies, &SimulationConfig::default());
        solver.initialize_velocity_constraints(&positions, &velocities);
        assert_eq!(solver.constraints[0].point_count, 1);

        solver.warm_start(&mut velocities);
        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }
        solver.store_impulses(&mut defs);

        let points = defs[0].manifold.points();
        assert_eq!(points.len(), 2);
        assert!(points[0].normal_impulse > 0.0);
        assert_eq!(points[1].normal_impulse, 0.0);
        assert_eq!(points[1].tangent_impulse, 0.0);
    }
}
