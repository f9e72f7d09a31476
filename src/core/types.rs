use serde::{Deserialize, Serialize};
use std::ops::Mul;

/// Common math types re-exported for convenience.
pub use glam::{Mat2, Vec2};

/// Rotation stored as sine/cosine so repeated application never calls trig functions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rot {
    pub s: f32,
    pub c: f32,
}

impl Default for Rot {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rot {
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    pub fn from_angle(angle: f32) -> Self {
        let (s, c) = angle.sin_cos();
        Self { s, c }
    }

    pub fn angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    pub fn x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    pub fn y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Rotates `v`.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x - self.s * v.y, self.s * v.x + self.c * v.y)
    }

    /// Inverse-rotates `v`.
    #[inline]
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// `self^T * other`
    pub fn inverse_mul(&self, other: Rot) -> Rot {
        Rot {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

impl Mul for Rot {
    type Output = Rot;

    fn mul(self, other: Rot) -> Rot {
        Rot {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }
}

/// Position and orientation of a body frame.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec2,
    pub rotation: Rot,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec2::ZERO,
        rotation: Rot::IDENTITY,
    };

    pub fn new(position: Vec2, angle: f32) -> Self {
        Self {
            position,
            rotation: Rot::from_angle(angle),
        }
    }

    /// Maps a local point into world space.
    #[inline]
    pub fn apply(&self, v: Vec2) -> Vec2 {
        self.rotation.apply(v) + self.position
    }

    /// Maps a world point into this frame.
    #[inline]
    pub fn apply_inverse(&self, v: Vec2) -> Vec2 {
        self.rotation.apply_inverse(v - self.position)
    }

    /// Applies another transform on top of this one, returning the composition.
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.rotation.apply(other.position) + self.position,
            rotation: self.rotation * other.rotation,
        }
    }

    /// Expresses `other` relative to this frame (`self^-1 * other`).
    pub fn inverse_combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.rotation.apply_inverse(other.position - self.position),
            rotation: self.rotation.inverse_mul(other.rotation),
        }
    }
}

/// Motion of a body over one step, used by continuous collision.
///
/// `c0`/`a0` describe the center of mass at `alpha0`, `c`/`a` at the end of the step. The body
/// origin is recovered through `local_center`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Sweep {
    pub local_center: Vec2,
    pub c0: Vec2,
    pub c: Vec2,
    pub a0: f32,
    pub a: f32,
    /// Fraction of the current step already consumed, in `[0, 1)`.
    pub alpha0: f32,
}

impl Sweep {
    /// Interpolated body transform at `beta` in `[0, 1]`, measured over the full step.
    pub fn transform_at(&self, beta: f32) -> Transform {
        let center = (1.0 - beta) * self.c0 + beta * self.c;
        let angle = (1.0 - beta) * self.a0 + beta * self.a;
        let rotation = Rot::from_angle(angle);
        Transform {
            position: center - rotation.apply(self.local_center),
            rotation,
        }
    }

    /// Moves the start of the sweep forward to `alpha`; the end pose is unchanged.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Wraps angles back into `[-pi, pi]` without changing the swept motion.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * std::f32::consts::PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

/// Linear and angular velocity of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub linear: Vec2,
    pub angular: f32,
}

/// Center-of-mass position and angle; the solver works on these instead of transforms.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub center: Vec2,
    pub angle: f32,
}

/// Mass, center of mass and rotational inertia about the shape origin.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MassData {
    pub mass: f32,
    pub center: Vec2,
    pub inertia: f32,
}

/// Material coefficients that affect interactions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Material {
    pub density: f32,
    pub friction: f32,
    pub restitution: f32,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            density: 1.0,
            friction: 0.2,
            restitution: 0.0,
        }
    }
}

impl Material {
    pub fn rubber() -> Self {
        Self {
            density: 1.4,
            friction: 1.0,
            restitution: 0.8,
        }
    }

    pub fn steel() -> Self {
        Self {
            density: 7.8,
            friction: 0.44,
            restitution: 0.4,
        }
    }

    pub fn ice() -> Self {
        Self {
            density: 0.9,
            friction: 0.03,
            restitution: 0.05,
        }
    }
}

/// How two fixtures' coefficients are blended into one contact coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum MixingMode {
    #[default]
    Average,
    Min,
    Max,
    GeometricMean,
}

impl MixingMode {
    /// Symmetric in its arguments, so the result never depends on fixture order.
    pub fn combine(self, a: f32, b: f32) -> f32 {
        match self {
            MixingMode::Average => 0.5 * (a + b),
            MixingMode::Min => a.min(b),
            MixingMode::Max => a.max(b),
            MixingMode::GeometricMean => (a.abs() * b.abs()).sqrt(),
        }
    }
}
