//! Agent and spectator observation building (§4.5).
//!
//! Observations are built **on request**, never inside the tick loop (§5
//! "observations are produced on request... never in the tick loop"), and
//! cached per `(agent, tick)` so repeated requests within one tick coalesce
//! to the same bytes (§8 "at most one entry is produced").

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::Serialize;

use atrium_tree::prelude::{AttributeValue, NodeId, NodeKind, PartShape, SceneTree, Vec3};

/// Rewrite an `asset://path` reference to a public URL deterministically
/// derived from `(blueprint_id, asset_version, path)` (§4.5 "URL rewriting").
/// `/static/...` and absolute `https://...` URLs pass through unchanged.
pub fn rewrite_asset_url(blueprint_id: &str, asset_version: u64, url: &str) -> String {
    match url.strip_prefix("asset://") {
        Some(path) => format!("/assets/{blueprint_id}/{asset_version}/{path}"),
        None => url.to_owned(),
    }
}

/// Recover `(blueprint_id, asset_version, path)` from a URL produced by
/// [`rewrite_asset_url`]. Round-trips exactly (§8 "Asset URL" law).
pub fn parse_asset_url(url: &str) -> Option<(String, u64, String)> {
    let rest = url.strip_prefix("/assets/")?;
    let mut parts = rest.splitn(3, '/');
    let blueprint_id = parts.next()?.to_owned();
    let asset_version: u64 = parts.next()?.parse().ok()?;
    let path = parts.next()?.to_owned();
    Some((blueprint_id, asset_version, path))
}

#[derive(Debug, Clone, Serialize)]
pub struct PlayerSummary {
    pub agent_id: String,
    pub name: String,
    pub position: Vec3,
}

/// A physics-tracked entity's spectator-facing view. `id` is the node's raw
/// id rather than [`NodeId`] itself, since streaming clients key diffs on a
/// plain integer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityView {
    pub id: u64,
    pub name: String,
    pub shape: PartShape,
    pub size: Vec3,
    pub cframe: Vec3,
    pub rotation: [[f64; 3]; 3],
    pub color: (f64, f64, f64),
    pub material: String,
    pub model_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LightView {
    pub id: u64,
    pub kind: &'static str,
    pub color: (f64, f64, f64),
    pub brightness: f64,
    pub range: f64,
}

/// Private, lean view returned to the owning agent (§4.5 "agent observation").
#[derive(Debug, Clone, Serialize)]
pub struct AgentObservation {
    pub tick: u64,
    pub self_agent_id: String,
    pub self_position: Vec3,
    pub self_health: f64,
    pub other_players: Vec<PlayerSummary>,
    pub nearby_entities: Vec<EntityView>,
    pub world_attributes: HashMap<String, serde_json::Value>,
}

/// Public, rich view for spectators (§4.5 "spectator observation").
#[derive(Debug, Clone, Serialize)]
pub struct SpectatorSnapshot {
    pub tick: u64,
    pub players: Vec<PlayerSummary>,
    pub entities: Vec<EntityView>,
    pub lights: Vec<LightView>,
    pub ambient: Option<serde_json::Value>,
}

/// An incremental update for an already-subscribed spectator stream (§4.5
/// "delta framing").
#[derive(Debug, Clone, Serialize)]
pub struct SpectatorDelta {
    pub tick: u64,
    pub upserts: Vec<EntityView>,
    pub removes: Vec<u64>,
}

fn attribute_to_json(value: &AttributeValue) -> serde_json::Value {
    match value {
        AttributeValue::Number(n) => serde_json::json!(n),
        AttributeValue::Bool(b) => serde_json::json!(b),
        AttributeValue::String(s) => serde_json::json!(s),
        AttributeValue::Vector(v) => serde_json::json!({"x": v.x, "y": v.y, "z": v.z}),
        AttributeValue::Color(c) => serde_json::json!({"r": c.r, "g": c.g, "b": c.b}),
    }
}

fn collect_players(tree: &SceneTree) -> Vec<(NodeId, PlayerSummary)> {
    let Some(players_service) = tree
        .children(tree.root_id())
        .iter()
        .copied()
        .find(|&id| tree.get(id).map(|n| n.name == "Players").unwrap_or(false))
    else {
        return Vec::new();
    };
    tree.children(players_service)
        .iter()
        .filter_map(|&id| {
            let node = tree.get(id)?;
            let player = node.kind.as_player()?;
            let position = player
                .character_root
                .and_then(|c| tree.get(c))
                .and_then(|n| n.kind.as_humanoid())
                .map(|h| h.cframe.position)
                .unwrap_or(Vec3::ZERO);
            Some((
                id,
                PlayerSummary {
                    agent_id: player.agent_id.clone(),
                    name: player.name.clone(),
                    position,
                },
            ))
        })
        .collect()
}

fn entity_view(id: NodeId, name: &str, part: &atrium_tree::prelude::PartData) -> EntityView {
    EntityView {
        id: id.to_raw(),
        name: name.to_owned(),
        shape: part.shape,
        size: part.size,
        cframe: part.cframe.position,
        rotation: part.cframe.rotation.m,
        color: (part.color.r, part.color.g, part.color.b),
        material: part.material.clone(),
        model_url: part.model_url.clone(),
    }
}

/// Build the lean observation `agent_id` sees this tick. `None` if the agent
/// has no `Player` node (already left, or never joined).
pub fn build_agent_observation(
    tree: &SceneTree,
    agent_id: &str,
    tick: u64,
    blueprint_id: &str,
    asset_version: u64,
) -> Option<AgentObservation> {
    let players = collect_players(tree);
    let (_, me) = players.iter().find(|(_, p)| p.agent_id == agent_id)?;

    let self_health = players
        .iter()
        .find(|(_, p)| p.agent_id == agent_id)
        .and_then(|(id, _)| tree.get(*id))
        .and_then(|n| n.kind.as_player())
        .and_then(|p| p.character_root)
        .and_then(|c| tree.get(c))
        .and_then(|n| n.kind.as_humanoid())
        .map(|h| h.health)
        .unwrap_or(0.0);

    let other_players: Vec<PlayerSummary> = players
        .into_iter()
        .filter(|(_, p)| p.agent_id != agent_id)
        .map(|(_, p)| p)
        .collect();

    let mut nearby_entities: Vec<EntityView> = tree
        .physics_tracked_ids()
        .filter_map(|id| {
            let node = tree.get(id)?;
            let part = node.kind.as_part()?;
            let mut view = entity_view(id, &node.name, part);
            view.model_url = view
                .model_url
                .map(|url| rewrite_asset_url(blueprint_id, asset_version, &url));
            Some(view)
        })
        .collect();
    nearby_entities.sort_by_key(|e| e.id);

    let workspace = tree.get(tree.workspace_id());
    let world_attributes = workspace
        .map(|n| {
            n.attributes
                .iter()
                .map(|(k, v)| (k.clone(), attribute_to_json(v)))
                .collect()
        })
        .unwrap_or_default();

    Some(AgentObservation {
        tick,
        self_agent_id: agent_id.to_owned(),
        self_position: me.position,
        self_health,
        other_players,
        nearby_entities,
        world_attributes,
    })
}

/// Build the full spectator snapshot, also returning the entity map keyed by
/// raw id so the caller can diff it against the previous tick's map.
pub fn build_spectator_snapshot(tree: &SceneTree, tick: u64) -> (SpectatorSnapshot, HashMap<u64, EntityView>) {
    let players: Vec<PlayerSummary> = collect_players(tree).into_iter().map(|(_, p)| p).collect();

    let mut entities: Vec<EntityView> = tree
        .physics_tracked_ids()
        .filter_map(|id| {
            let node = tree.get(id)?;
            let part = node.kind.as_part()?;
            Some(entity_view(id, &node.name, part))
        })
        .collect();
    entities.sort_by_key(|e| e.id);
    let entity_map: HashMap<u64, EntityView> = entities.iter().cloned().map(|e| (e.id, e)).collect();

    let lights: Vec<LightView> = tree
        .children(tree.workspace_id())
        .iter()
        .filter_map(|&id| {
            let node = tree.get(id)?;
            match &node.kind {
                NodeKind::Light(light) => Some(LightView {
                    id: id.to_raw(),
                    kind: match light.kind {
                        atrium_tree::prelude::LightKind::Point => "Point",
                        atrium_tree::prelude::LightKind::Spot => "Spot",
                        atrium_tree::prelude::LightKind::Directional => "Directional",
                    },
                    color: (light.color.r, light.color.g, light.color.b),
                    brightness: light.brightness,
                    range: light.range,
                }),
                _ => None,
            }
        })
        .collect();

    let ambient = tree
        .children(tree.root_id())
        .iter()
        .copied()
        .find(|&id| tree.get(id).map(|n| n.name == "Lighting").unwrap_or(false))
        .and_then(|id| tree.get(id))
        .and_then(|n| n.get_attribute("Ambient"))
        .map(attribute_to_json);

    (
        SpectatorSnapshot { tick, players, entities, lights, ambient },
        entity_map,
    )
}

/// Diff two spectator entity maps into an upsert/remove delta (§4.5 "delta
/// framing"). An entity present in both but unchanged is not re-sent.
pub fn diff_spectator_entities(
    previous: &HashMap<u64, EntityView>,
    current: &HashMap<u64, EntityView>,
    tick: u64,
) -> SpectatorDelta {
    let mut upserts: Vec<EntityView> = current
        .iter()
        .filter(|(id, view)| previous.get(id) != Some(*view))
        .map(|(_, view)| view.clone())
        .collect();
    upserts.sort_by_key(|e| e.id);

    let mut removes: Vec<u64> = previous.keys().filter(|id| !current.contains_key(id)).copied().collect();
    removes.sort_unstable();

    SpectatorDelta { tick, upserts, removes }
}

/// Per-(agent, tick) and per-(instance, tick) coalescing cache (§4.5
/// "back-pressure... cached per (instance, agent, tick) for the duration of
/// one tick"). Lives on [`crate::instance::Instance`]; cleared wholesale
/// each time the tick counter advances since every entry it could hold is
/// tagged with the tick that just ended.
pub struct ObservationCache {
    agent_cache: RwLock<HashMap<String, (u64, Vec<u8>)>>,
    spectator_snapshot: RwLock<Option<(u64, Vec<u8>, HashMap<u64, EntityView>)>>,
}

impl ObservationCache {
    pub fn new() -> Self {
        Self {
            agent_cache: RwLock::new(HashMap::new()),
            spectator_snapshot: RwLock::new(None),
        }
    }

    /// Evict every cached entry -- called once per tick from step 11, since
    /// entries are only ever valid for the tick that produced them.
    pub fn advance(&self, _tick: u64) {
        self.agent_cache.write().clear();
        *self.spectator_snapshot.write() = None;
    }

    /// Drop a departed agent's cached observation immediately (§4.4 step 10
    /// "clear cached observations").
    pub fn invalidate_agent(&self, agent_id: &str) {
        self.agent_cache.write().remove(agent_id);
    }

    /// Return cached bytes for `(agent_id, tick)` if present, else build,
    /// cache, and return fresh bytes. `None` only if `build` itself returns
    /// `None` (agent not found).
    pub fn agent_observation_bytes(
        &self,
        agent_id: &str,
        tick: u64,
        build: impl FnOnce() -> Option<AgentObservation>,
    ) -> Option<Vec<u8>> {
        if let Some((cached_tick, bytes)) = self.agent_cache.read().get(agent_id) {
            if *cached_tick == tick {
                return Some(bytes.clone());
            }
        }
        let observation = build()?;
        let bytes = serde_json::to_vec(&observation).ok()?;
        self.agent_cache.write().insert(agent_id.to_owned(), (tick, bytes.clone()));
        Some(bytes)
    }

    /// Return cached spectator snapshot bytes for `tick` if present, else
    /// build and cache a fresh one, also returning the entity map so the
    /// caller can compute the next tick's delta.
    pub fn spectator_snapshot_bytes(
        &self,
        tick: u64,
        build: impl FnOnce() -> (SpectatorSnapshot, HashMap<u64, EntityView>),
    ) -> (Vec<u8>, HashMap<u64, EntityView>) {
        if let Some((cached_tick, bytes, entities)) = self.spectator_snapshot.read().as_ref() {
            if *cached_tick == tick {
                return (bytes.clone(), entities.clone());
            }
        }
        let (snapshot, entities) = build();
        let bytes = serde_json::to_vec(&snapshot).unwrap_or_default();
        *self.spectator_snapshot.write() = Some((tick, bytes.clone(), entities.clone()));
        (bytes, entities)
    }
}

impl Default for ObservationCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_url_round_trips() {
        let url = rewrite_asset_url("bp-1", 3, "asset://models/chair.glb");
        let (blueprint_id, version, path) = parse_asset_url(&url).unwrap();
        assert_eq!(blueprint_id, "bp-1");
        assert_eq!(version, 3);
        assert_eq!(path, "models/chair.glb");
    }

    #[test]
    fn static_and_https_urls_pass_through() {
        assert_eq!(rewrite_asset_url("bp-1", 1, "/static/icon.png"), "/static/icon.png");
        assert_eq!(
            rewrite_asset_url("bp-1", 1, "https://cdn.example.com/a.png"),
            "https://cdn.example.com/a.png"
        );
    }

    #[test]
    fn repeated_reads_within_a_tick_coalesce() {
        let cache = ObservationCache::new();
        let mut build_calls = 0;
        for _ in 0..3 {
            let bytes = cache.agent_observation_bytes("agent-1", 5, || {
                build_calls += 1;
                Some(AgentObservation {
                    tick: 5,
                    self_agent_id: "agent-1".to_owned(),
                    self_position: Vec3::ZERO,
                    self_health: 100.0,
                    other_players: Vec::new(),
                    nearby_entities: Vec::new(),
                    world_attributes: HashMap::new(),
                })
            });
            assert!(bytes.is_some());
        }
        assert_eq!(build_calls, 1);
    }

    #[test]
    fn advancing_the_tick_evicts_the_cache() {
        let cache = ObservationCache::new();
        cache.agent_observation_bytes("agent-1", 5, || {
            Some(AgentObservation {
                tick: 5,
                self_agent_id: "agent-1".to_owned(),
                self_position: Vec3::ZERO,
                self_health: 100.0,
                other_players: Vec::new(),
                nearby_entities: Vec::new(),
                world_attributes: HashMap::new(),
            })
        });
        cache.advance(6);
        let mut build_calls = 0;
        cache.agent_observation_bytes("agent-1", 6, || {
            build_calls += 1;
            Some(AgentObservation {
                tick: 6,
                self_agent_id: "agent-1".to_owned(),
                self_position: Vec3::ZERO,
                self_health: 100.0,
                other_players: Vec::new(),
                nearby_entities: Vec::new(),
                world_attributes: HashMap::new(),
            })
        });
        assert_eq!(build_calls, 1);
    }

    #[test]
    fn diff_reports_removed_and_upserted_entities() {
        let mut previous = HashMap::new();
        previous.insert(
            1,
            EntityView {
                id: 1,
                name: "A".to_owned(),
                shape: PartShape::Box,
                size: Vec3::new(1.0, 1.0, 1.0),
                cframe: Vec3::ZERO,
                rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
                color: (1.0, 1.0, 1.0),
                material: "plastic".to_owned(),
                model_url: None,
            },
        );
        let current = HashMap::new();
        let delta = diff_spectator_entities(&previous, &current, 7);
        assert_eq!(delta.removes, vec![1]);
        assert!(delta.upserts.is_empty());
    }
}
