//! `Part` node data (§3, §4.1, §4.4 step 8 "physics -> data-model sync").

use serde::{Deserialize, Serialize};

use crate::cframe::{CFrame, Vec3};
use crate::value::Color;

/// Collision shape. `Wedge` is realized in the physics world as a convex
/// hull (§4.1: "Wedge is a 6-vertex convex shape").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartShape {
    Box,
    Ball,
    Cylinder,
    Wedge,
}

/// A physically-simulated block of geometry. One `PartData` maps to at most
/// one rigid body/collider pair in `atrium-physics` once the part is
/// attached under Workspace (§4.1: "a part becomes physics-tracked when its
/// parent chain reaches the Workspace root").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartData {
    pub shape: PartShape,
    pub size: Vec3,
    pub cframe: CFrame,
    pub color: Color,
    pub material: String,
    pub anchored: bool,
    pub can_collide: bool,
    pub velocity: Vec3,
    /// Optional `asset://` reference used for spectator rendering.
    pub model_url: Option<String>,

    // Dirty flags, cleared by the tick pipeline's physics-sync steps once
    // consumed (§4.4 step 3 "script -> physics sync", step 8 reverse sync).
    pub size_dirty: bool,
    pub rotation_dirty: bool,
    pub anchored_dirty: bool,
    pub can_collide_dirty: bool,
    pub shape_dirty: bool,
    pub velocity_dirty: bool,
}

impl PartData {
    pub fn new(shape: PartShape, size: Vec3, cframe: CFrame) -> Self {
        Self {
            shape,
            size,
            cframe,
            color: Color::WHITE,
            material: "plastic".to_owned(),
            anchored: false,
            can_collide: true,
            velocity: Vec3::ZERO,
            model_url: None,
            size_dirty: false,
            rotation_dirty: false,
            anchored_dirty: false,
            can_collide_dirty: false,
            shape_dirty: false,
            velocity_dirty: false,
        }
    }

    pub fn set_size(&mut self, size: Vec3) {
        self.size = size;
        self.size_dirty = true;
    }

    pub fn set_shape(&mut self, shape: PartShape) {
        self.shape = shape;
        self.shape_dirty = true;
    }

    pub fn set_anchored(&mut self, anchored: bool) {
        self.anchored = anchored;
        self.anchored_dirty = true;
    }

    pub fn set_can_collide(&mut self, can_collide: bool) {
        self.can_collide = can_collide;
        self.can_collide_dirty = true;
    }

    pub fn set_cframe(&mut self, cframe: CFrame) {
        self.cframe = cframe;
        self.rotation_dirty = true;
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
        self.velocity_dirty = true;
    }

    /// Clear all dirty flags; called once the physics sync has consumed them.
    pub fn clear_dirty(&mut self) {
        self.size_dirty = false;
        self.rotation_dirty = false;
        self.anchored_dirty = false;
        self.can_collide_dirty = false;
        self.shape_dirty = false;
        self.velocity_dirty = false;
    }

    pub fn is_dirty(&self) -> bool {
        self.size_dirty
            || self.rotation_dirty
            || self.anchored_dirty
            || self.can_collide_dirty
            || self.shape_dirty
            || self.velocity_dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setters_mark_dirty_independently() {
        let mut part = PartData::new(PartShape::Box, Vec3::new(4.0, 1.0, 2.0), CFrame::default());
        assert!(!part.is_dirty());
        part.set_size(Vec3::new(2.0, 2.0, 2.0));
        assert!(part.size_dirty && !part.anchored_dirty);
        part.clear_dirty();
        assert!(!part.is_dirty());
    }
}
