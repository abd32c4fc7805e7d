use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Deserializer};
use serde_json::json;

use crate::lib::engine::types::EngineError;
use crate::lib::provisioner::types::ServiceProvisioner;
use crate::lib::relay::hub::BroadcastHub;

/// HTTP and realtime front door for the orchestration core.
pub struct ControlServer {
    pub provisioner: Arc<ServiceProvisioner>,
    pub hub: BroadcastHub,
    pub address: String,
    pub port: u16,
}

#[derive(Debug, Default, Deserialize)]
pub struct ContainersQuery {
    #[serde(rename = "serviceCreated", default, deserialize_with = "lenient_bool")]
    pub service_created: bool,
    pub take: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProvisionQuery {
    /// Answer `202` right away instead of waiting for the recipe.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub detach: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct StopQuery {
    /// Seconds before the engine kills the container.
    pub grace: Option<u64>,
}

/// Query flag accepting `true`/`True`/`1` and their negatives, as the
/// orchestration page has historically sent either casing.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        v if v.eq_ignore_ascii_case("true") || v == "1" => Ok(true),
        v if v.eq_ignore_ascii_case("false") || v == "0" || v.is_empty() => Ok(false),
        other => Err(serde::de::Error::custom(format!(
            "expected a boolean, got {other:?}"
        ))),
    }
}

/// Engine failure surfaced to an HTTP caller.
#[derive(Debug)]
pub struct ApiError(pub EngineError);

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            EngineError::Unreachable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::Conflict(_) => StatusCode::CONFLICT,
            EngineError::OperationFailed(_) => StatusCode::BAD_GATEWAY,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}
