//! `Humanoid` node data (§3, §4.4 step 7 "character movement").

use serde::{Deserialize, Serialize};

use crate::cframe::{CFrame, Vec3};

/// Movement and health state for a character. One humanoid per player's
/// character model; driven by `move_target`/`jump_requested` each tick and
/// advanced by the character-movement step against the physics world.
///
/// Unlike a `Part`, a humanoid's body isn't a rigid body in the physics
/// world -- it's a kinematic capsule owned by `atrium-physics`'s
/// `CharacterWorld`. `cframe` is this node's own copy of that capsule's
/// position, written back by the character-movement step (§4.4 step 7) the
/// same way step 8 writes dynamic parts back from the rigid-body set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HumanoidData {
    pub max_health: f64,
    pub health: f64,
    pub walk_speed: f64,
    pub cframe: CFrame,
    /// World-space point the character walks toward this tick, set by
    /// `Humanoid:MoveTo` and cleared once reached or replaced.
    pub move_target: Option<Vec3>,
    pub jump_requested: bool,
    pub grounded: bool,
    pub vertical_velocity: f64,
}

impl HumanoidData {
    pub fn new(max_health: f64, walk_speed: f64) -> Self {
        Self {
            max_health,
            health: max_health,
            walk_speed,
            cframe: CFrame::default(),
            move_target: None,
            jump_requested: false,
            grounded: false,
            vertical_velocity: 0.0,
        }
    }

    pub fn at(mut self, cframe: CFrame) -> Self {
        self.cframe = cframe;
        self
    }

    pub fn is_dead(&self) -> bool {
        self.health <= 0.0
    }

    /// Apply damage/healing, clamped to `[0, max_health]`. Returns `true` if
    /// this delta crossed from alive to dead (fires `Died`, §4.3).
    pub fn apply_health_delta(&mut self, delta: f64) -> bool {
        let was_alive = !self.is_dead();
        self.health = (self.health + delta).clamp(0.0, self.max_health);
        was_alive && self.is_dead()
    }

    pub fn request_move_to(&mut self, target: Vec3) {
        self.move_target = Some(target);
    }

    pub fn request_jump(&mut self) {
        self.jump_requested = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_clamps_to_max() {
        let mut h = HumanoidData::new(100.0, 16.0);
        h.apply_health_delta(50.0);
        assert_eq!(h.health, 100.0);
    }

    #[test]
    fn health_delta_crossing_zero_reports_death_once() {
        let mut h = HumanoidData::new(100.0, 16.0);
        assert!(!h.apply_health_delta(-50.0));
        assert!(h.apply_health_delta(-60.0));
        assert!(h.is_dead());
        // Already dead -- further damage doesn't re-report death.
        assert!(!h.apply_health_delta(-10.0));
    }
}
