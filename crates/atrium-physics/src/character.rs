//! Character movement against the physics world (§4.4 step 7).
//!
//! Humanoids don't get a plain rigid body: they're driven by
//! `KinematicCharacterController`, which resolves a desired translation
//! against the collider set (slides along walls, climbs small steps, reports
//! whether the result is grounded) without the Part setters above.

use std::collections::HashMap;

use rapier3d::control::{CharacterLength, KinematicCharacterController};
use rapier3d::prelude::*;

use atrium_tree::prelude::{CFrame, NodeId, Vec3};

use crate::convert::{cframe_to_isometry, isometry_to_cframe, vec3_to_nalgebra, vec3_from_nalgebra};

pub struct CharacterMoveResult {
    pub cframe: CFrame,
    pub grounded: bool,
}

struct CharacterEntry {
    collider: ColliderHandle,
}

/// Owns the kinematic colliders backing humanoid movement. Kept separate
/// from [`crate::world::PhysicsWorld`]'s part map so character capsules
/// never collide with each other the way two parts would.
pub struct CharacterWorld {
    controller: KinematicCharacterController,
    characters: HashMap<NodeId, CharacterEntry>,
}

impl CharacterWorld {
    pub fn new() -> Self {
        let mut controller = KinematicCharacterController::default();
        controller.max_slope_climb_angle = 45f32.to_radians();
        controller.min_slope_slide_angle = 30f32.to_radians();
        controller.autostep = Some(rapier3d::control::CharacterAutostep {
            max_height: CharacterLength::Absolute(0.3),
            min_width: CharacterLength::Absolute(0.2),
            include_dynamic_bodies: false,
        });
        controller.snap_to_ground = Some(CharacterLength::Absolute(0.2));
        Self {
            controller,
            characters: HashMap::new(),
        }
    }

    pub fn add_character(
        &mut self,
        id: NodeId,
        collider_set: &mut ColliderSet,
        radius: f64,
        half_height: f64,
        cframe: CFrame,
    ) {
        if self.characters.contains_key(&id) {
            return;
        }
        let shape = SharedShape::capsule_y(half_height as Real, radius as Real);
        let collider = ColliderBuilder::new(shape)
            .position(cframe_to_isometry(&cframe))
            .build();
        let handle = collider_set.insert(collider);
        self.characters.insert(id, CharacterEntry { collider: handle });
    }

    pub fn remove_character(&mut self, id: NodeId, collider_set: &mut ColliderSet) {
        if let Some(entry) = self.characters.remove(&id) {
            collider_set.remove(entry.collider, &mut IslandManager::new(), &mut RigidBodySet::new(), false);
        }
    }

    /// Resolve a desired translation for `id` against `collider_set`,
    /// returning the new cframe and whether the character ended up grounded.
    pub fn move_character(
        &mut self,
        id: NodeId,
        collider_set: &mut ColliderSet,
        rigid_body_set: &RigidBodySet,
        query_pipeline: &QueryPipeline,
        current: CFrame,
        desired_translation: Vec3,
        dt: f64,
    ) -> Option<CharacterMoveResult> {
        let entry = self.characters.get(&id)?;
        let collider = collider_set.get(entry.collider)?;
        let filter = QueryFilter::default().exclude_collider(entry.collider);

        let corrected = self.controller.move_shape(
            dt as Real,
            rigid_body_set,
            collider_set,
            query_pipeline,
            collider.shape(),
            collider.position(),
            vec3_to_nalgebra(desired_translation),
            filter,
            |_| {},
        );

        let new_position = collider.position() * Isometry3::translation(
            corrected.translation.x,
            corrected.translation.y,
            corrected.translation.z,
        );
        if let Some(collider) = collider_set.get_mut(entry.collider) {
            collider.set_position(new_position);
        }

        let mut cframe = current;
        cframe.position = vec3_from_nalgebra(&new_position.translation.vector);
        Some(CharacterMoveResult {
            cframe,
            grounded: corrected.grounded,
        })
    }
}

impl Default for CharacterWorld {
    fn default() -> Self {
        Self::new()
    }
}
