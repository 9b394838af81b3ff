//! Conversions between the tree crate's plain math types and nalgebra/rapier3d's.

use atrium_tree::prelude::{CFrame, Rotation, Vec3};
use nalgebra::{Isometry3, Quaternion, Translation3, UnitQuaternion, Vector3};
use rapier3d::prelude::Real;

pub fn vec3_to_nalgebra(v: Vec3) -> Vector3<Real> {
    Vector3::new(v.x as Real, v.y as Real, v.z as Real)
}

pub fn vec3_from_nalgebra(v: &Vector3<Real>) -> Vec3 {
    Vec3::new(v.x as f64, v.y as f64, v.z as f64)
}

pub fn rotation_to_unit_quaternion(rotation: &Rotation) -> UnitQuaternion<Real> {
    let (x, y, z, w) = rotation.to_quaternion();
    UnitQuaternion::from_quaternion(Quaternion::new(w as Real, x as Real, y as Real, z as Real))
}

pub fn unit_quaternion_to_rotation(q: &UnitQuaternion<Real>) -> Rotation {
    Rotation::from_quaternion(q.i as f64, q.j as f64, q.k as f64, q.w as f64)
}

pub fn cframe_to_isometry(cframe: &CFrame) -> Isometry3<Real> {
    Isometry3::from_parts(
        Translation3::from(vec3_to_nalgebra(cframe.position)),
        rotation_to_unit_quaternion(&cframe.rotation),
    )
}

pub fn isometry_to_cframe(iso: &Isometry3<Real>) -> CFrame {
    CFrame::new(
        vec3_from_nalgebra(&iso.translation.vector),
        unit_quaternion_to_rotation(&iso.rotation),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cframe_round_trips_through_isometry() {
        let cframe = CFrame::new(Vec3::new(1.0, 2.0, 3.0), Rotation::from_y_rotation(0.75));
        let iso = cframe_to_isometry(&cframe);
        let back = isometry_to_cframe(&iso);
        assert!((back.position.x - cframe.position.x).abs() < 1e-4);
        assert!(back.rotation.approx_eq(&cframe.rotation, 1e-4));
    }
}
