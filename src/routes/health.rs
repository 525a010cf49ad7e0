//! Health check endpoints
//!
//! - /health, /healthz: liveness, always 200 while the process runs
//! - /ready, /readyz: readiness, 200 only when the store answers
//! - /version: build information

use hyper::StatusCode;
use serde::Serialize;

use crate::db::SkillStore;
use crate::routes::common::{json_response, ApiResponse};
use crate::server::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    /// 'online' when the store is connected, 'degraded' otherwise
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since startup
    pub uptime: u64,
    pub timestamp: String,
    /// 'development' or 'production'
    pub mode: &'static str,
    pub instance_id: String,
    pub store: StoreHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct StoreHealth {
    /// 'memory' or 'mongo'
    pub kind: &'static str,
    pub connected: bool,
}

fn build_health_response(state: &AppState, error: Option<String>) -> HealthResponse {
    let connected = state.store.is_connected();

    HealthResponse {
        healthy: true,
        status: if connected { "online" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        instance_id: state.args.instance_id.to_string(),
        store: StoreHealth {
            kind: state.store.kind(),
            connected,
        },
        error,
    }
}

/// Liveness check. The body reports store status for information only.
pub fn health_check(state: &AppState) -> ApiResponse {
    json_response(StatusCode::OK, &build_health_response(state, None))
}

/// Readiness check. Triggers the lazy store connection if needed.
pub async fn readiness_check(state: &AppState) -> ApiResponse {
    match state.store.ready().await {
        Ok(()) => json_response(StatusCode::OK, &build_health_response(state, None)),
        Err(e) => json_response(
            StatusCode::SERVICE_UNAVAILABLE,
            &build_health_response(state, Some(e.to_string())),
        ),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionResponse {
    pub version: &'static str,
    pub commit: &'static str,
    pub commit_full: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

pub fn version_info() -> ApiResponse {
    json_response(
        StatusCode::OK,
        &VersionResponse {
            version: env!("CARGO_PKG_VERSION"),
            commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
            commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
            build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
            service: "skilltree",
        },
    )
}
