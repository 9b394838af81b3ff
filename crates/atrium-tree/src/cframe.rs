//! Vector/rotation math for the scene tree.
//!
//! A [`CFrame`] is position plus a 3x3 rotation matrix, matching the wire
//! representation scripts read and write (§3, §8 "CFrame rotation" round-trip
//! law). Internally the physics world wants a quaternion, so [`Rotation`]
//! converts to/from one using Shepperd's method (§4.1), which is numerically
//! stable across all rotation matrices including those with a negative trace.

use serde::{Deserialize, Serialize};

/// A 3D vector. Used for position, size, and velocity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// A row-major 3x3 rotation matrix, the wire shape scripts read and write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    /// Rows of the matrix, `m[row][col]`.
    pub m: [[f64; 3]; 3],
}

impl Rotation {
    /// The identity rotation.
    pub const IDENTITY: Rotation = Rotation {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Build a rotation about the Y axis by `radians`, the shape used by the
    /// "rotation sync" scenario (§8 scenario 1).
    pub fn from_y_rotation(radians: f64) -> Self {
        let (s, c) = radians.sin_cos();
        Rotation {
            m: [[c, 0.0, s], [0.0, 1.0, 0.0], [-s, 0.0, c]],
        }
    }

    /// Convert to a unit quaternion `(x, y, z, w)` using Shepperd's method,
    /// which picks the numerically largest of the four possible formulas
    /// instead of always dividing by `w` (which degenerates near a 180
    /// degree rotation).
    pub fn to_quaternion(&self) -> (f64, f64, f64, f64) {
        let m = &self.m;
        let trace = m[0][0] + m[1][1] + m[2][2];

        if trace > 0.0 {
            let s = (trace + 1.0).sqrt() * 2.0;
            let w = 0.25 * s;
            let x = (m[2][1] - m[1][2]) / s;
            let y = (m[0][2] - m[2][0]) / s;
            let z = (m[1][0] - m[0][1]) / s;
            (x, y, z, w)
        } else if m[0][0] > m[1][1] && m[0][0] > m[2][2] {
            let s = (1.0 + m[0][0] - m[1][1] - m[2][2]).sqrt() * 2.0;
            let w = (m[2][1] - m[1][2]) / s;
            let x = 0.25 * s;
            let y = (m[0][1] + m[1][0]) / s;
            let z = (m[0][2] + m[2][0]) / s;
            (x, y, z, w)
        } else if m[1][1] > m[2][2] {
            let s = (1.0 + m[1][1] - m[0][0] - m[2][2]).sqrt() * 2.0;
            let w = (m[0][2] - m[2][0]) / s;
            let x = (m[0][1] + m[1][0]) / s;
            let y = 0.25 * s;
            let z = (m[1][2] + m[2][1]) / s;
            (x, y, z, w)
        } else {
            let s = (1.0 + m[2][2] - m[0][0] - m[1][1]).sqrt() * 2.0;
            let w = (m[1][0] - m[0][1]) / s;
            let x = (m[0][2] + m[2][0]) / s;
            let y = (m[1][2] + m[2][1]) / s;
            let z = 0.25 * s;
            (x, y, z, w)
        }
    }

    /// Rebuild a rotation matrix from a unit quaternion `(x, y, z, w)`.
    pub fn from_quaternion(x: f64, y: f64, z: f64, w: f64) -> Self {
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);
        Rotation {
            m: [
                [1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz), 2.0 * (xz + wy)],
                [2.0 * (xy + wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx)],
                [2.0 * (xz - wy), 2.0 * (yz + wx), 1.0 - 2.0 * (xx + yy)],
            ],
        }
    }

    /// Approximate equality within `eps`, used by round-trip tests (§8).
    pub fn approx_eq(&self, other: &Rotation, eps: f64) -> bool {
        for r in 0..3 {
            for c in 0..3 {
                if (self.m[r][c] - other.m[r][c]).abs() > eps {
                    return false;
                }
            }
        }
        true
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::IDENTITY
    }
}

/// Position plus orientation -- the value scripts set and observe for a Part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct CFrame {
    pub position: Vec3,
    pub rotation: Rotation,
}

impl CFrame {
    pub fn new(position: Vec3, rotation: Rotation) -> Self {
        Self { position, rotation }
    }

    pub fn identity_at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Rotation::IDENTITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_round_trips_through_quaternion() {
        let r = Rotation::IDENTITY;
        let (x, y, z, w) = r.to_quaternion();
        let back = Rotation::from_quaternion(x, y, z, w);
        assert!(r.approx_eq(&back, 1e-9));
    }

    #[test]
    fn y_rotation_round_trips_through_quaternion() {
        let r = Rotation::from_y_rotation(3.0);
        let (x, y, z, w) = r.to_quaternion();
        let back = Rotation::from_quaternion(x, y, z, w);
        assert!(
            r.approx_eq(&back, 1e-9),
            "expected {:?} ~= {:?}",
            r,
            back
        );
    }

    #[test]
    fn near_180_degree_rotation_is_stable() {
        // Negative-trace matrix: this is exactly the case Shepperd's method
        // exists for -- a naive w-divide formula loses precision here.
        let r = Rotation::from_y_rotation(std::f64::consts::PI - 1e-6);
        let (x, y, z, w) = r.to_quaternion();
        let norm = (x * x + y * y + z * z + w * w).sqrt();
        assert!((norm - 1.0).abs() < 1e-6, "quaternion should be unit length, got {norm}");
        let back = Rotation::from_quaternion(x, y, z, w);
        assert!(r.approx_eq(&back, 1e-5));
    }

    #[test]
    fn six_ticks_of_half_radian_y_rotation_equals_three_radians() {
        // Scenario 1 (§8): rotate 0.5 rad about Y six times.
        let mut cframe = CFrame::identity_at(Vec3::new(20.0, 2.0, -20.0));
        for _ in 0..6 {
            let delta = Rotation::from_y_rotation(0.5);
            // Compose delta * current (rotate about world Y each tick).
            cframe.rotation = compose(&delta, &cframe.rotation);
        }
        let expected = Rotation::from_y_rotation(3.0);
        assert!(
            cframe.rotation.approx_eq(&expected, 1e-5),
            "got {:?}, expected {:?}",
            cframe.rotation,
            expected
        );
    }

    fn compose(a: &Rotation, b: &Rotation) -> Rotation {
        let mut out = [[0.0; 3]; 3];
        for r in 0..3 {
            for c in 0..3 {
                out[r][c] = (0..3).map(|k| a.m[r][k] * b.m[k][c]).sum();
            }
        }
        Rotation { m: out }
    }
}
