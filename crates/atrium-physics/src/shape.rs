//! Shape construction, including the wedge convex hull (§4.1: "Wedge is a
//! 6-vertex convex shape -- a box with the front top edge collapsed").

use atrium_tree::prelude::{PartShape, Vec3};
use nalgebra::Point3;
use rapier3d::prelude::{Real, SharedShape};

/// Build a rapier3d collider shape for `shape` with half-extents/radius
/// derived from `size` (the node's full-extent size, matching how scripts
/// set it).
pub fn build_shape(shape: PartShape, size: Vec3) -> SharedShape {
    let hx = (size.x / 2.0) as Real;
    let hy = (size.y / 2.0) as Real;
    let hz = (size.z / 2.0) as Real;

    match shape {
        PartShape::Box => SharedShape::cuboid(hx, hy, hz),
        PartShape::Ball => SharedShape::ball(hx.max(hy).max(hz)),
        PartShape::Cylinder => SharedShape::cylinder(hy, hx),
        PartShape::Wedge => wedge_hull(hx, hy, hz),
    }
}

/// A 6-vertex convex hull: the bottom face of a box plus a top ridge along
/// the back edge, sloping down to the front.
fn wedge_hull(hx: Real, hy: Real, hz: Real) -> SharedShape {
    let points = [
        Point3::new(-hx, -hy, -hz),
        Point3::new(hx, -hy, -hz),
        Point3::new(hx, -hy, hz),
        Point3::new(-hx, -hy, hz),
        Point3::new(-hx, hy, -hz),
        Point3::new(hx, hy, -hz),
    ];
    SharedShape::convex_hull(&points).expect("wedge vertices must form a valid convex hull")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wedge_hull_builds_from_six_points() {
        let _shape = build_shape(PartShape::Wedge, Vec3::new(4.0, 2.0, 4.0));
    }

    #[test]
    fn box_shape_has_expected_half_extents() {
        let shape = build_shape(PartShape::Box, Vec3::new(4.0, 2.0, 6.0));
        let cuboid = shape.as_cuboid().expect("box shape should be a cuboid");
        assert!((cuboid.half_extents.x - 2.0).abs() < 1e-6);
        assert!((cuboid.half_extents.y - 1.0).abs() < 1e-6);
        assert!((cuboid.half_extents.z - 3.0).abs() < 1e-6);
    }
}
