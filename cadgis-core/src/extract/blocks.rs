//! Affine transforms for block-insert resolution.
//!
//! A block insert places a reusable entity group with its own translation,
//! rotation, and (possibly non-uniform) scale. Nested inserts compose
//! innermost-first: a point in block-local coordinates passes through the
//! inner insert's transform before the outer one.

/// 2D affine transform: `world = M * local + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    /// Linear part, row-major.
    pub m: [[f64; 2]; 2],
    /// Translation.
    pub t: [f64; 2],
}

impl Affine2 {
    /// The identity transform.
    pub const IDENTITY: Affine2 = Affine2 {
        m: [[1.0, 0.0], [0.0, 1.0]],
        t: [0.0, 0.0],
    };

    /// Build the transform for one INSERT: rotate by `rotation_deg`, scale by
    /// `(sx, sy)`, and place the block's base point at `location`.
    pub fn from_insert(
        location: (f64, f64),
        rotation_deg: f64,
        sx: f64,
        sy: f64,
        base_point: (f64, f64),
    ) -> Self {
        let r = rotation_deg.to_radians();
        let (sin, cos) = r.sin_cos();
        // M = R(rotation) * S(sx, sy)
        let m = [[cos * sx, -sin * sy], [sin * sx, cos * sy]];
        // world = location + M * (p - base_point)
        let t = [
            location.0 - (m[0][0] * base_point.0 + m[0][1] * base_point.1),
            location.1 - (m[1][0] * base_point.0 + m[1][1] * base_point.1),
        ];
        Self { m, t }
    }

    /// Apply the transform to a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.m[0][0] * x + self.m[0][1] * y + self.t[0],
            self.m[1][0] * x + self.m[1][1] * y + self.t[1],
        )
    }

    /// Compose with an inner transform: `(self ∘ inner)(p) = self(inner(p))`.
    pub fn compose(&self, inner: &Affine2) -> Self {
        let a = &self.m;
        let b = &inner.m;
        let m = [
            [
                a[0][0] * b[0][0] + a[0][1] * b[1][0],
                a[0][0] * b[0][1] + a[0][1] * b[1][1],
            ],
            [
                a[1][0] * b[0][0] + a[1][1] * b[1][0],
                a[1][0] * b[0][1] + a[1][1] * b[1][1],
            ],
        ];
        let t = [
            a[0][0] * inner.t[0] + a[0][1] * inner.t[1] + self.t[0],
            a[1][0] * inner.t[0] + a[1][1] * inner.t[1] + self.t[1],
        ];
        Self { m, t }
    }

    /// Determinant of the linear part.
    pub fn det(&self) -> f64 {
        self.m[0][0] * self.m[1][1] - self.m[0][1] * self.m[1][0]
    }

    /// Whether this transform preserves circles: orthogonal columns of equal
    /// length and positive orientation. Arcs and circles keep their exact
    /// form under a similarity; anything else forces tessellation before
    /// transforming.
    pub fn is_similarity(&self) -> bool {
        let col0 = (self.m[0][0], self.m[1][0]);
        let col1 = (self.m[0][1], self.m[1][1]);
        let n0 = (col0.0 * col0.0 + col0.1 * col0.1).sqrt();
        let n1 = (col1.0 * col1.0 + col1.1 * col1.1).sqrt();
        let dot = col0.0 * col1.0 + col0.1 * col1.1;
        let scale = n0.max(n1).max(1.0);
        (n0 - n1).abs() < 1e-9 * scale && dot.abs() < 1e-9 * scale * scale && self.det() > 0.0
    }

    /// Uniform scale factor; meaningful when [`Self::is_similarity`] holds.
    pub fn uniform_scale(&self) -> f64 {
        let col0 = (self.m[0][0], self.m[1][0]);
        (col0.0 * col0.0 + col0.1 * col0.1).sqrt()
    }

    /// Rotation in degrees; meaningful when [`Self::is_similarity`] holds.
    pub fn rotation_deg(&self) -> f64 {
        self.m[1][0].atan2(self.m[0][0]).to_degrees()
    }
}
