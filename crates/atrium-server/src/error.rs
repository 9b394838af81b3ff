//! HTTP error mapping (§7).
//!
//! `FleetError` already names every failure mode at the right granularity;
//! this module is purely the status-code translation so handlers can just
//! `?` their way to a `FleetError` and let `IntoResponse` do the rest.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use atrium_blueprint::prelude::BlueprintError;
use atrium_fleet::prelude::FleetError;

pub struct ApiError(pub FleetError);

impl From<FleetError> for ApiError {
    fn from(err: FleetError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = Json(ErrorBody { error: self.0.to_string() });
        (status, body).into_response()
    }
}

fn status_for(err: &FleetError) -> StatusCode {
    match err {
        FleetError::NotFound(_) | FleetError::InstanceGone { .. } => StatusCode::NOT_FOUND,
        FleetError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        FleetError::ServiceBusy | FleetError::CapacityRace { .. } => StatusCode::CONFLICT,
        FleetError::PersistenceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        FleetError::ScriptFault { .. } => StatusCode::BAD_GATEWAY,
        FleetError::EngineFatal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        FleetError::Instance(_) => StatusCode::INTERNAL_SERVER_ERROR,
        FleetError::Blueprint(blueprint_err) => status_for_blueprint(blueprint_err),
    }
}

fn status_for_blueprint(err: &BlueprintError) -> StatusCode {
    match err {
        BlueprintError::NotFound(_) => StatusCode::NOT_FOUND,
        BlueprintError::MissingWorldToml(_)
        | BlueprintError::InvalidWorldToml { .. }
        | BlueprintError::InvalidMaxPlayers { .. }
        | BlueprintError::MissingEntryScript { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BlueprintError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
