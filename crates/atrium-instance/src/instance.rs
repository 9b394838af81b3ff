//! The per-instance tick pipeline (§4.3, §4.4).
//!
//! One [`Instance`] owns one [`SceneTree`], one [`PhysicsWorld`], one
//! [`CharacterWorld`], and one [`ScriptHost`]. The fleet controller
//! (`atrium-fleet`) wraps each instance in its own `RwLock` and drives
//! [`Instance::tick`] under the write lock, exactly one tick at a time
//! (§5: "instance state is owned by exactly one write-lock holder").

use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use atrium_physics::prelude::{CharacterWorld, ContactPair, PhysicsWorld};
use atrium_script::prelude::{ScriptConfig, ScriptHost};
use atrium_script::services;
use atrium_persistence::prelude::PersistenceStore;
use atrium_tree::prelude::{
    CFrame, HumanoidData, KickReason, NodeId, NodeKind, PartShape, PlayerData, SceneTree, SignalArg, Vec3,
};

use crate::action::{AgentAction, ActionQueue};
use crate::diagnostics::TickDiagnostics;
use crate::error::InstanceError;
use crate::observation::ObservationCache;
use crate::state::InstanceState;

/// Capsule dimensions used for every player's character (§4.4 step 7).
const CHARACTER_RADIUS: f64 = 0.5;
const CHARACTER_HALF_HEIGHT: f64 = 1.0;
const JUMP_POWER: f64 = 6.0;
const GRAVITY: f64 = 9.81;
/// Respawn threshold for scenario 3's "fall detection at y < -10".
const VOID_Y: f64 = -10.0;
const RESPAWN_POSITION: Vec3 = Vec3 { x: 0.0, y: 4.0, z: 0.0 };

/// One running game world. Created by the fleet controller's
/// `find_or_create_instance`, destroyed by GC once empty for `empty_timeout`.
pub struct Instance {
    pub instance_id: String,
    pub blueprint_id: String,
    pub asset_version: u64,
    pub max_players: u32,
    pub created_at: Instant,

    state: InstanceState,
    tick: u64,
    tick_period: Duration,

    tree: Arc<RwLock<SceneTree>>,
    physics: PhysicsWorld,
    characters: CharacterWorld,
    script: ScriptHost,

    actions: ActionQueue,
    players: HashMap<String, NodeId>,
    character_of: HashMap<String, NodeId>,
    previous_contacts: HashSet<ContactPair>,
    previous_anchored: HashMap<NodeId, CFrame>,
    standing_on: HashMap<NodeId, NodeId>,
    empty_since: Option<Instant>,

    pub observation_cache: ObservationCache,
    pub last_diagnostics: TickDiagnostics,
}

impl Instance {
    /// Allocate a fresh instance and load the blueprint's entry script
    /// (§4.6: "creation initializes the script host, loads the blueprint
    /// script, and transitions to Playing").
    pub fn create(
        instance_id: String,
        blueprint_id: String,
        max_players: u32,
        asset_version: u64,
        tick_period: Duration,
        entry_script_source: &str,
        persistence: Option<Arc<PersistenceStore>>,
    ) -> Result<Self, InstanceError> {
        let tree = Arc::new(RwLock::new(SceneTree::new()));
        let script = ScriptHost::new(
            tree.clone(),
            ScriptConfig::default(),
            blueprint_id.clone(),
            max_players,
            persistence,
        )?;
        script.load_main(entry_script_source, &blueprint_id)?;

        Ok(Self {
            instance_id,
            blueprint_id,
            asset_version,
            max_players,
            created_at: Instant::now(),
            state: InstanceState::Playing,
            tick: 0,
            tick_period,
            tree,
            physics: PhysicsWorld::new(),
            characters: CharacterWorld::new(),
            script,
            actions: ActionQueue::new(),
            players: HashMap::new(),
            character_of: HashMap::new(),
            previous_contacts: HashSet::new(),
            previous_anchored: HashMap::new(),
            standing_on: HashMap::new(),
            empty_since: Some(Instant::now()),
            observation_cache: ObservationCache::new(),
            last_diagnostics: TickDiagnostics::default(),
        })
    }

    pub fn state(&self) -> InstanceState {
        self.state
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.max_players as usize
    }

    pub fn has_player(&self, agent_id: &str) -> bool {
        self.players.contains_key(agent_id)
    }

    pub fn empty_since(&self) -> Option<Instant> {
        self.empty_since
    }

    pub fn tree(&self) -> &Arc<RwLock<SceneTree>> {
        &self.tree
    }

    pub fn enqueue_action(&self, action: AgentAction) {
        self.actions.push(action);
    }

    /// Currently joined agent ids, in no particular order.
    pub fn agent_ids(&self) -> Vec<String> {
        self.players.keys().cloned().collect()
    }

    /// Ticks elapsed since `agent_id`'s last submitted action (§4.8 "AFK
    /// eviction"). `None` if the agent isn't currently joined.
    pub fn idle_ticks(&self, agent_id: &str) -> Option<u64> {
        let &player_id = self.players.get(agent_id)?;
        let tree = self.tree.read();
        let player = tree.get(player_id)?.kind.as_player()?;
        Some(player.idle_ticks(self.tick))
    }

    /// Queue a kick that takes effect at the next tick boundary (§4.4 step
    /// 10). Used by the fleet controller for AFK eviction -- unlike
    /// `remove_player`, this doesn't tear the player down immediately, so it
    /// can be called between ticks without racing the pipeline.
    pub fn queue_kick(&self, agent_id: &str, reason: KickReason) {
        let Some(&player_id) = self.players.get(agent_id) else { return };
        let mut tree = self.tree.write();
        if let Some(node) = tree.get_mut(player_id) {
            if let Some(p) = node.kind.as_player_mut() {
                p.queue_kick(reason);
            }
        }
    }

    /// Insert a freshly-joined player (§4.6 `try_join`). Caller must already
    /// have checked capacity; this still re-checks as a last line of defense
    /// against a capacity race.
    pub fn join(&mut self, agent_id: &str, name: &str) -> Result<NodeId, InstanceError> {
        if self.is_full() {
            return Err(InstanceError::TreeInvariant("join on a full instance".to_owned()));
        }
        let mut tree = self.tree.write();
        let players_service = services::find_service(&tree, services::PLAYERS_SERVICE)
            .ok_or(InstanceError::MissingWellKnownNode)?;
        let workspace = tree.workspace_id();

        let player_id = tree
            .spawn(
                players_service,
                name,
                NodeKind::Player(PlayerData::new(agent_id, name, self.tick)),
            )
            .map_err(|e| InstanceError::TreeInvariant(e.to_string()))?;

        let character_id = tree
            .spawn(
                workspace,
                format!("{name}Character"),
                NodeKind::Humanoid(HumanoidData::new(100.0, 16.0).at(CFrame::identity_at(RESPAWN_POSITION))),
            )
            .map_err(|e| InstanceError::TreeInvariant(e.to_string()))?;
        tree.set_character_root(player_id, character_id).ok();
        drop(tree);

        self.characters.add_character(
            character_id,
            self.physics.collider_set_mut(),
            CHARACTER_RADIUS,
            CHARACTER_HALF_HEIGHT,
            CFrame::identity_at(RESPAWN_POSITION),
        );

        self.players.insert(agent_id.to_owned(), player_id);
        self.character_of.insert(agent_id.to_owned(), character_id);
        self.empty_since = None;
        if self.state == InstanceState::Empty {
            self.state = InstanceState::Playing;
        }
        Ok(player_id)
    }

    /// Remove a player immediately, outside the tick boundary -- used by
    /// `duplicate_join_resolution` (§4.6), which must complete atomically
    /// before the new join. Engine-initiated removal during a tick instead
    /// goes through the kick queue (step 10) so there is exactly one removal
    /// pipeline for everything that happens mid-tick (§9).
    pub fn remove_player(&mut self, agent_id: &str) {
        let Some(player_id) = self.players.remove(agent_id) else {
            return;
        };
        let character_id = self.character_of.remove(agent_id);
        if let Some(character_id) = character_id {
            self.characters.remove_character(character_id, self.physics.collider_set_mut());
            self.tree.write().despawn(character_id).ok();
            self.standing_on.remove(&character_id);
        }
        self.tree.write().despawn(player_id).ok();
        self.observation_cache.invalidate_agent(agent_id);
        if self.players.is_empty() {
            self.empty_since = Some(Instant::now());
            if self.state == InstanceState::Playing {
                self.state = InstanceState::Empty;
            }
        }
    }

    /// Run one full tick (§4.4). No-op if not `Playing`.
    pub fn tick(&mut self) -> TickDiagnostics {
        let mut diag = TickDiagnostics::default();
        if !self.state.is_playing() {
            return diag;
        }

        macro_rules! stage {
            ($name:literal, $body:expr) => {{
                let started = Instant::now();
                let result = catch_unwind(AssertUnwindSafe(|| $body));
                diag.record($name, started.elapsed());
                match result {
                    Ok(value) => value,
                    Err(_) => {
                        tracing::error!(instance = %self.instance_id, stage = $name, "engine core panicked");
                        self.fail_engine($name);
                        diag.finish(self.tick, self.tick_period);
                        return diag;
                    }
                }
            }};
        }

        // Step 1: apply queued actions.
        stage!("apply_actions", self.apply_actions());

        // Step 2: script pre-physics (script faults are contained inside
        // ScriptHost, not engine core -- not wrapped in catch_unwind).
        let started = Instant::now();
        self.script.fire_pre_physics();
        diag.record("script_pre_physics", started.elapsed());

        // Step 3: script -> physics sync.
        stage!("physics_sync_in", self.sync_script_to_physics());

        // Step 4: physics step.
        let dt = self.tick_period.as_secs_f64();
        let step_result = stage!("physics_step", self.physics.step(dt));
        if let Err(e) = step_result {
            tracing::error!(instance = %self.instance_id, error = %e, "physics step failed");
            self.fail_engine("physics_step");
            diag.finish(self.tick, self.tick_period);
            return diag;
        }

        // Step 5: contact resolution.
        stage!("contact_resolution", self.resolve_contacts());

        // Step 6: kinematic push resolution.
        stage!("kinematic_push", self.resolve_kinematic_pushes());

        // Step 7: character movement.
        stage!("character_movement", self.move_characters(dt));

        // Step 8: physics -> data-model sync.
        stage!("physics_sync_out", self.sync_physics_to_tree());

        // Step 9: script post-physics.
        let started = Instant::now();
        self.script.fire_post_physics();
        diag.record("script_post_physics", started.elapsed());

        // Step 10: leave/kick processing.
        stage!("leave_kick_processing", self.process_kicks());

        // Step 11: observation publish -- see crate::observation. Publishing
        // itself happens on request; here we just advance the tick counter
        // and drop any cache entries tagged with the previous tick.
        self.tick += 1;
        self.observation_cache.advance(self.tick);

        diag.finish(self.tick, self.tick_period);
        self.last_diagnostics = diag.clone();
        diag
    }

    fn fail_engine(&mut self, stage: &'static str) {
        self.state = InstanceState::Finished;
        let players: Vec<NodeId> = self.players.values().copied().collect();
        let mut tree = self.tree.write();
        for player in players {
            if let Some(node) = tree.get_mut(player) {
                if let Some(p) = node.kind.as_player_mut() {
                    p.queue_kick(KickReason::Script(format!("instance terminated: engine fault in {stage}")));
                }
            }
        }
    }

    // -- Step 1 ---------------------------------------------------------

    fn apply_actions(&mut self) {
        let pending = self.actions.drain();
        if pending.is_empty() {
            return;
        }
        let by_agent = self.script.collect_instances_by_id();
        let mut tree = self.tree.write();
        for action in pending {
            let Some(&player_id) = by_agent.get(&action.agent_id).or_else(|| self.players.get(&action.agent_id)) else {
                tracing::warn!(agent = %action.agent_id, "action for unknown agent dropped");
                continue;
            };
            if let Some(node) = tree.get_mut(player_id) {
                if let Some(p) = node.kind.as_player_mut() {
                    p.record_action(self.tick);
                }
            }
            match action.action_type.as_str() {
                "move_to" => {
                    let Some(target) = parse_vec3(&action.data) else {
                        tracing::warn!(agent = %action.agent_id, "move_to action missing x/y/z, dropped");
                        continue;
                    };
                    if let Some(&character_id) = self.character_of.get(&action.agent_id) {
                        if let Some(node) = tree.get_mut(character_id) {
                            if let Some(h) = node.kind.as_humanoid_mut() {
                                h.request_move_to(target);
                            }
                        }
                    }
                }
                "jump" => {
                    if let Some(&character_id) = self.character_of.get(&action.agent_id) {
                        if let Some(node) = tree.get_mut(character_id) {
                            if let Some(h) = node.kind.as_humanoid_mut() {
                                h.request_jump();
                            }
                        }
                    }
                }
                other => {
                    drop(tree);
                    let args = vec![
                        SignalArg::Text(action.agent_id.clone()),
                        SignalArg::Text(action.data.to_string()),
                    ];
                    self.script.fire_signal(player_id, other, &args);
                    tree = self.tree.write();
                }
            }
        }
    }

    // -- Step 3 -----------------------------------------------------------

    fn sync_script_to_physics(&mut self) {
        let tracked: Vec<NodeId> = {
            let tree = self.tree.read();
            tree.physics_tracked_ids().collect()
        };
        let mut current_anchored = HashMap::new();

        let mut tree = self.tree.write();
        for id in tracked {
            let Some(node) = tree.get_mut(id) else { continue };
            let Some(part) = node.kind.as_part_mut() else { continue };

            if !self.physics.is_tracked(id) {
                self.physics.add_part(id, part.shape, part.size, part.cframe, part.anchored, part.can_collide, part.velocity);
                part.clear_dirty();
                if part.anchored {
                    current_anchored.insert(id, part.cframe);
                }
                continue;
            }

            if part.anchored_dirty {
                self.physics.set_anchored(id, part.anchored);
            }
            if part.shape_dirty || part.size_dirty {
                self.physics.set_shape(id, part.shape, part.size);
            }
            if part.can_collide_dirty {
                self.physics.set_can_collide(id, part.can_collide);
            }
            if part.anchored {
                if part.rotation_dirty {
                    self.physics.set_cframe(id, part.cframe);
                }
                current_anchored.insert(id, part.cframe);
            } else if part.velocity_dirty {
                self.physics.set_velocity(id, part.velocity);
            }
            part.clear_dirty();
        }
        drop(tree);

        self.previous_anchored = current_anchored;
    }

    // -- Step 5 -------------------------------------------------------------

    fn resolve_contacts(&mut self) {
        let mut current: HashSet<ContactPair> = self.physics.contact_pairs().into_iter().collect();
        for &character_id in self.character_of.values() {
            for other in self.physics.touch_query(character_id) {
                current.insert(normalize_pair(character_id, other));
            }
        }

        let mut new_pairs: Vec<ContactPair> = current.difference(&self.previous_contacts).copied().collect();
        let mut ended_pairs: Vec<ContactPair> = self.previous_contacts.difference(&current).copied().collect();
        new_pairs.sort_by_key(|p| (p.0.to_raw(), p.1.to_raw()));
        ended_pairs.sort_by_key(|p| (p.0.to_raw(), p.1.to_raw()));

        for pair in &new_pairs {
            self.fire_touch(pair.0, pair.1, true);
            self.fire_touch(pair.1, pair.0, true);
        }
        for pair in &ended_pairs {
            self.fire_touch(pair.0, pair.1, false);
            self.fire_touch(pair.1, pair.0, false);
        }

        self.previous_contacts = current;
    }

    fn fire_touch(&self, subject: NodeId, other: NodeId, started: bool) {
        let can_touch = {
            let tree = self.tree.read();
            tree.get(subject)
                .and_then(|n| n.get_attribute("CanTouch"))
                .and_then(|v| v.as_bool())
                .unwrap_or(true)
                && tree.get(other)
                    .and_then(|n| n.get_attribute("CanTouch"))
                    .and_then(|v| v.as_bool())
                    .unwrap_or(true)
        };
        if !can_touch {
            return;
        }
        let signal_name = if started { "Touched" } else { "TouchEnded" };
        self.script.fire_signal(subject, signal_name, &[SignalArg::Node(other)]);
    }

    // -- Step 6 ---------------------------------------------------------
    //
    // The physics world exposes no per-contact penetration depth, so the
    // minimum-translation vector is approximated as the direction from the
    // kinematic part's center to the character, scaled by a small push
    // distance -- good enough to clear a rotating platform's edge (scenario
    // 3) without a full manifold query (§9 open question a).

    fn resolve_kinematic_pushes(&mut self) {
        let anchored_parts: HashMap<NodeId, (Vec3, Vec3)> = {
            let tree = self.tree.read();
            self.previous_anchored
                .keys()
                .filter_map(|&id| {
                    let part = tree.get(id)?.kind.as_part()?;
                    Some((id, (part.cframe.position, part.size)))
                })
                .collect()
        };

        let mut displacements: HashMap<NodeId, Vec3> = HashMap::new();
        let character_ids: Vec<NodeId> = self.character_of.values().copied().collect();
        for character_id in character_ids {
            let char_pos = {
                let tree = self.tree.read();
                tree.get(character_id).and_then(|n| n.kind.as_humanoid()).map(|h| h.cframe.position)
            };
            let Some(char_pos) = char_pos else { continue };

            for (&platform_id, &(center, size)) in &anchored_parts {
                let overlap = self.physics.overlap_box(CFrame::identity_at(center), size, &[platform_id]);
                if !overlap.contains(&character_id) {
                    continue;
                }
                let mut push = Vec3::new(char_pos.x - center.x, 0.0, char_pos.z - center.z);
                let len = (push.x * push.x + push.z * push.z).sqrt();
                if len < 1e-6 {
                    push = Vec3::new(1.0, 0.0, 0.0);
                } else {
                    push = Vec3::new(push.x / len, 0.0, push.z / len);
                }
                displacements.insert(character_id, Vec3::new(push.x * 0.05, 0.0, push.z * 0.05));
            }

            if let Some(&platform_id) = self.standing_on.get(&character_id) {
                if let (Some(prev), Some(&(now, _))) = (self.previous_anchored.get(&platform_id), anchored_parts.get(&platform_id)) {
                    let delta = Vec3::new(now.x - prev.position.x, now.y - prev.position.y, now.z - prev.position.z);
                    if delta.y > 0.0 || delta.x != 0.0 || delta.z != 0.0 {
                        let entry = displacements.entry(character_id).or_insert(Vec3::ZERO);
                        *entry = Vec3::new(entry.x + delta.x, entry.y + delta.y, entry.z + delta.z);
                    }
                }
            }
        }

        if displacements.is_empty() {
            return;
        }
        let mut tree = self.tree.write();
        for (character_id, push) in displacements {
            if let Some(node) = tree.get_mut(character_id) {
                if let Some(h) = node.kind.as_humanoid_mut() {
                    h.cframe.position = Vec3::new(
                        h.cframe.position.x + push.x,
                        h.cframe.position.y + push.y,
                        h.cframe.position.z + push.z,
                    );
                }
            }
        }
    }

    // -- Step 7 ---------------------------------------------------------

    fn move_characters(&mut self, dt: f64) {
        let mut to_respawn = Vec::new();
        let character_ids: Vec<NodeId> = self.character_of.values().copied().collect();

        for character_id in character_ids {
            let (current_cframe, desired, walk_speed, jump_requested, grounded, mut vertical_velocity) = {
                let tree = self.tree.read();
                let Some(h) = tree.get(character_id).and_then(|n| n.kind.as_humanoid()) else { continue };
                (h.cframe, h.move_target, h.walk_speed, h.jump_requested, h.grounded, h.vertical_velocity)
            };

            let mut horizontal = Vec3::ZERO;
            let mut reached = false;
            if let Some(target) = desired {
                let dx = target.x - current_cframe.position.x;
                let dz = target.z - current_cframe.position.z;
                let dist = (dx * dx + dz * dz).sqrt();
                if dist < 0.05 {
                    reached = true;
                } else {
                    let step = (walk_speed * dt).min(dist);
                    horizontal = Vec3::new(dx / dist * step, 0.0, dz / dist * step);
                }
            }

            if jump_requested && grounded {
                vertical_velocity = JUMP_POWER;
            } else {
                vertical_velocity -= GRAVITY * dt;
            }

            let translation = Vec3::new(horizontal.x, vertical_velocity * dt, horizontal.z);
            let result = self.characters.move_character(
                character_id,
                self.physics.collider_set_mut(),
                self.physics.rigid_body_set(),
                self.physics.query_pipeline(),
                current_cframe,
                translation,
                dt,
            );

            let mut tree = self.tree.write();
            if let Some(node) = tree.get_mut(character_id) {
                if let Some(h) = node.kind.as_humanoid_mut() {
                    if let Some(result) = result {
                        h.cframe = result.cframe;
                        h.grounded = result.grounded;
                        h.vertical_velocity = if result.grounded { 0.0 } else { vertical_velocity };
                    } else {
                        h.cframe.position = translation_applied(current_cframe.position, translation);
                        h.vertical_velocity = vertical_velocity;
                    }
                    if jump_requested {
                        h.jump_requested = false;
                    }
                    if reached {
                        h.move_target = None;
                    }
                    if h.cframe.position.y < VOID_Y {
                        to_respawn.push(character_id);
                    }
                }
            }

            let grounded_now = tree.get(character_id).and_then(|n| n.kind.as_humanoid()).map(|h| h.grounded).unwrap_or(false);
            let feet_pos = tree.get(character_id).and_then(|n| n.kind.as_humanoid()).map(|h| h.cframe.position);
            drop(tree);

            if grounded_now {
                if let Some(pos) = feet_pos {
                    let probe_center = Vec3::new(pos.x, pos.y - CHARACTER_HALF_HEIGHT - 0.1, pos.z);
                    let hits = self.physics.overlap_box(CFrame::identity_at(probe_center), Vec3::new(0.4, 0.2, 0.4), &[]);
                    if let Some(&platform_id) = hits.iter().find(|&&id| self.previous_anchored.contains_key(&id)) {
                        self.standing_on.insert(character_id, platform_id);
                    } else {
                        self.standing_on.remove(&character_id);
                    }
                }
            } else {
                self.standing_on.remove(&character_id);
            }
        }

        if !to_respawn.is_empty() {
            let mut tree = self.tree.write();
            for character_id in to_respawn {
                if let Some(node) = tree.get_mut(character_id) {
                    if let Some(h) = node.kind.as_humanoid_mut() {
                        h.cframe = CFrame::identity_at(RESPAWN_POSITION);
                        h.vertical_velocity = 0.0;
                        h.grounded = false;
                    }
                }
                self.standing_on.remove(&character_id);
            }
        }
    }

    // -- Step 8 -----------------------------------------------------------

    fn sync_physics_to_tree(&mut self) {
        let transforms = self.physics.read_transforms();
        let mut tree = self.tree.write();
        for (id, cframe, velocity) in transforms {
            if let Some(node) = tree.get_mut(id) {
                if let Some(part) = node.kind.as_part_mut() {
                    part.cframe = cframe;
                    part.velocity = velocity;
                }
            }
        }
    }

    // -- Step 10 ----------------------------------------------------------

    fn process_kicks(&mut self) {
        let kicks = self.script.drain_pending_kicks();
        let mut agents_to_remove = Vec::new();
        {
            let tree = self.tree.read();
            for (player_id, reason) in kicks {
                if let Some(node) = tree.get(player_id) {
                    if let Some(p) = node.kind.as_player() {
                        tracing::info!(agent = %p.agent_id, ?reason, "player removed at tick boundary");
                        agents_to_remove.push(p.agent_id.clone());
                    }
                }
            }
        }
        for agent_id in agents_to_remove {
            self.remove_player(&agent_id);
        }
    }
}

fn normalize_pair(a: NodeId, b: NodeId) -> ContactPair {
    if a.to_raw() <= b.to_raw() {
        ContactPair(a, b)
    } else {
        ContactPair(b, a)
    }
}

fn translation_applied(position: Vec3, delta: Vec3) -> Vec3 {
    Vec3::new(position.x + delta.x, position.y + delta.y, position.z + delta.z)
}

fn parse_vec3(data: &serde_json::Value) -> Option<Vec3> {
    Some(Vec3::new(data.get("x")?.as_f64()?, data.get("y")?.as_f64()?, data.get("z")?.as_f64()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARENA_SCRIPT: &str = r#"
        local RunService = get_service("RunService")
        RunService:Connect("PrePhysics", function() end)
    "#;

    fn new_instance() -> Instance {
        Instance::create(
            "inst-1".to_owned(),
            "arena".to_owned(),
            8,
            1,
            Duration::from_secs_f64(1.0 / 60.0),
            ARENA_SCRIPT,
            None,
        )
        .unwrap()
    }

    #[test]
    fn fresh_instance_starts_playing_and_empty() {
        let instance = new_instance();
        assert_eq!(instance.state(), InstanceState::Playing);
        assert!(instance.empty_since().is_some());
        assert_eq!(instance.player_count(), 0);
    }

    #[test]
    fn join_clears_empty_since_and_adds_a_player() {
        let mut instance = new_instance();
        let player_id = instance.join("agent-1", "Agent One").unwrap();
        assert!(instance.tree().read().is_alive(player_id));
        assert_eq!(instance.player_count(), 1);
        assert!(instance.empty_since().is_none());
    }

    #[test]
    fn join_beyond_capacity_is_rejected() {
        let mut instance = new_instance();
        instance.max_players = 1;
        instance.join("agent-1", "Agent One").unwrap();
        assert!(instance.join("agent-2", "Agent Two").is_err());
    }

    #[test]
    fn tick_advances_counter_and_runs_pipeline() {
        let mut instance = new_instance();
        instance.join("agent-1", "Agent One").unwrap();
        instance.tick();
        assert_eq!(instance.tick_count(), 1);
        instance.tick();
        assert_eq!(instance.tick_count(), 2);
    }

    #[test]
    fn leaving_last_player_marks_instance_empty() {
        let mut instance = new_instance();
        instance.join("agent-1", "Agent One").unwrap();
        instance.remove_player("agent-1");
        assert_eq!(instance.state(), InstanceState::Empty);
        assert!(instance.empty_since().is_some());
    }

    #[test]
    fn ticking_an_empty_instance_is_a_noop() {
        let mut instance = new_instance();
        instance.join("agent-1", "Agent One").unwrap();
        instance.remove_player("agent-1");
        instance.tick();
        assert_eq!(instance.tick_count(), 0);
    }

    #[test]
    fn anchored_part_rotation_round_trips_through_a_tick() {
        let mut instance = new_instance();
        let part_id = {
            let mut tree = instance.tree().write();
            let ws = tree.workspace_id();
            let mut plate = atrium_tree::prelude::PartData::new(
                PartShape::Box,
                Vec3::new(8.0, 1.0, 8.0),
                CFrame::identity_at(Vec3::new(20.0, 2.0, -20.0)),
            );
            plate.set_anchored(true);
            tree.spawn(ws, "Plate", NodeKind::Part(plate)).unwrap()
        };
        instance.tick();
        let tree = instance.tree().read();
        let cframe = tree.get(part_id).unwrap().kind.as_part().unwrap().cframe;
        assert!((cframe.position.x - 20.0).abs() < 1e-9);
    }
}
