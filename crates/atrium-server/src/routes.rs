//! The agent-facing HTTP/WebSocket API (§6).
//!
//! Every handler is a thin translation layer: resolve `blueprint_id`/
//! `agent_id` against the fleet, call straight into `atrium-fleet` or
//! `atrium-instance`, and hand the result back as JSON. No game logic lives
//! here.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, Query, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use atrium_instance::observation::{build_agent_observation, build_spectator_snapshot, diff_spectator_entities};
use atrium_instance::prelude::AgentAction;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/games/:blueprint_id/join", post(join))
        .route("/games/:blueprint_id/observe", get(observe))
        .route("/games/:blueprint_id/action", post(action))
        .route("/games/:blueprint_id/players", get(players))
        .route("/games/:blueprint_id/spectate", get(spectate_snapshot))
        .route("/games/:blueprint_id/spectate/ws", get(spectate_ws))
        .route("/games/:blueprint_id/skill.md", get(skill_md))
        .route("/spectate/player/:agent_id", get(spectate_player_redirect))
        .with_state(state)
}

#[derive(Deserialize)]
struct JoinRequest {
    agent_id: String,
    #[serde(default = "default_name")]
    name: String,
}

fn default_name() -> String {
    "Agent".to_owned()
}

#[derive(Serialize)]
struct JoinResponse {
    instance_id: String,
}

async fn join(
    State(state): State<AppState>,
    Path(blueprint_id): Path<String>,
    Json(req): Json<JoinRequest>,
) -> Result<Json<JoinResponse>, ApiError> {
    let instance_id = state.fleet.try_join(&blueprint_id, &req.agent_id, &req.name)?;
    Ok(Json(JoinResponse { instance_id }))
}

#[derive(Deserialize)]
struct AgentQuery {
    agent_id: String,
}

async fn observe(
    State(state): State<AppState>,
    Path(blueprint_id): Path<String>,
    Query(query): Query<AgentQuery>,
) -> Result<Response, ApiError> {
    let instance_id = state
        .fleet
        .player_location(&query.agent_id, &blueprint_id)
        .ok_or_else(|| ApiError(atrium_fleet::prelude::FleetError::NotFound(query.agent_id.clone())))?;
    let handle = state
        .fleet
        .get_instance(&instance_id)
        .ok_or(ApiError(atrium_fleet::prelude::FleetError::InstanceGone { instance_id }))?;

    let guard = handle.read();
    let tick = guard.tick_count();
    let asset_version = guard.asset_version;
    let bytes = guard.observation_cache.agent_observation_bytes(&query.agent_id, tick, || {
        let tree = guard.tree().read();
        build_agent_observation(&tree, &query.agent_id, tick, &blueprint_id, asset_version)
    });

    match bytes {
        Some(bytes) => Ok((StatusCode::OK, json_bytes(bytes)).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

#[derive(Deserialize)]
struct ActionRequest {
    agent_id: String,
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    data: serde_json::Value,
}

async fn action(
    State(state): State<AppState>,
    Path(blueprint_id): Path<String>,
    Json(req): Json<ActionRequest>,
) -> Result<StatusCode, ApiError> {
    let instance_id = state
        .fleet
        .player_location(&req.agent_id, &blueprint_id)
        .ok_or_else(|| ApiError(atrium_fleet::prelude::FleetError::NotFound(req.agent_id.clone())))?;
    let handle = state
        .fleet
        .get_instance(&instance_id)
        .ok_or(ApiError(atrium_fleet::prelude::FleetError::InstanceGone { instance_id }))?;

    handle.read().enqueue_action(AgentAction {
        agent_id: req.agent_id,
        action_type: req.action_type,
        data: req.data,
    });
    Ok(StatusCode::ACCEPTED)
}

async fn players(State(state): State<AppState>, Path(blueprint_id): Path<String>) -> Result<Response, ApiError> {
    let instance_id = state.fleet.spectate_default(&blueprint_id)?;
    let handle = state
        .fleet
        .get_instance(&instance_id)
        .ok_or(ApiError(atrium_fleet::prelude::FleetError::InstanceGone { instance_id }))?;
    let guard = handle.read();
    let tree = guard.tree().read();
    let (snapshot, _) = build_spectator_snapshot(&tree, guard.tick_count());
    Ok(Json(snapshot.players).into_response())
}

async fn spectate_snapshot(State(state): State<AppState>, Path(blueprint_id): Path<String>) -> Result<Response, ApiError> {
    let instance_id = state.fleet.spectate_default(&blueprint_id)?;
    let handle = state
        .fleet
        .get_instance(&instance_id)
        .ok_or(ApiError(atrium_fleet::prelude::FleetError::InstanceGone { instance_id }))?;
    let guard = handle.read();
    let tick = guard.tick_count();
    let (bytes, _) = guard.observation_cache.spectator_snapshot_bytes(tick, || {
        let tree = guard.tree().read();
        build_spectator_snapshot(&tree, tick)
    });
    Ok((StatusCode::OK, json_bytes(bytes)).into_response())
}

async fn spectate_ws(
    State(state): State<AppState>,
    Path(blueprint_id): Path<String>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let instance_id = state.fleet.spectate_default(&blueprint_id)?;
    let handle = state
        .fleet
        .get_instance(&instance_id)
        .ok_or(ApiError(atrium_fleet::prelude::FleetError::InstanceGone { instance_id }))?;
    let tick_period = state.config.tick_period();
    Ok(ws.on_upgrade(move |socket| stream_spectator(socket, handle, tick_period)))
}

async fn stream_spectator(mut socket: WebSocket, handle: Arc<parking_lot::RwLock<atrium_instance::prelude::Instance>>, tick_period: Duration) {
    let mut previous = std::collections::HashMap::new();
    let mut first = true;
    let mut ticker = tokio::time::interval(tick_period);

    loop {
        ticker.tick().await;
        let (tick, snapshot, entities) = {
            let guard = handle.read();
            let tick = guard.tick_count();
            let tree = guard.tree().read();
            let (snapshot, entities) = build_spectator_snapshot(&tree, tick);
            (tick, snapshot, entities)
        };

        let payload = if first {
            first = false;
            previous = entities;
            serde_json::to_string(&SnapshotEnvelope { kind: "snapshot", data: snapshot })
        } else {
            let delta = diff_spectator_entities(&previous, &entities, tick);
            previous = entities;
            serde_json::to_string(&DeltaEnvelope { kind: "delta", data: delta })
        };

        let Ok(text) = payload else { continue };
        if socket.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
}

#[derive(Serialize)]
struct SnapshotEnvelope {
    #[serde(rename = "type")]
    kind: &'static str,
    data: atrium_instance::observation::SpectatorSnapshot,
}

#[derive(Serialize)]
struct DeltaEnvelope {
    #[serde(rename = "type")]
    kind: &'static str,
    data: atrium_instance::observation::SpectatorDelta,
}

#[derive(Deserialize)]
struct SpectatePlayerQuery {
    blueprint_id: String,
}

async fn spectate_player_redirect(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
    Query(query): Query<SpectatePlayerQuery>,
) -> Result<Redirect, ApiError> {
    let instance_id = state.fleet.spectate_player(&query.blueprint_id, &agent_id)?;
    Ok(Redirect::temporary(&format!(
        "/games/{}/spectate?instance_id={instance_id}",
        query.blueprint_id
    )))
}

async fn skill_md(State(state): State<AppState>, Path(blueprint_id): Path<String>) -> Response {
    let path = state.fleet.blueprint_dir(&blueprint_id).join("skill.md");
    match tokio::fs::read_to_string(&path).await {
        Ok(contents) => {
            let mut headers = HeaderMap::new();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/markdown; charset=utf-8"));
            (headers, contents).into_response()
        }
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

fn json_bytes(bytes: Vec<u8>) -> (HeaderMap, Vec<u8>) {
    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    (headers, bytes)
}
