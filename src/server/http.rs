//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one task per connection. Requests are buffered
//! into an `ApiRequest` before routing.

use bytes::Bytes;
use http_body_util::{BodyExt, Full, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{header, Request, Response};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::auth::JwtValidator;
use crate::config::Args;
use crate::db::{SkillStore, Store};
use crate::logging::ActivityLogger;
use crate::routes::{self, ApiRequest, ApiResponse};
use crate::services::{AchievementCascade, Catalog, HierarchyAssembler, ProfileService};
use crate::types::SkillTreeError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub store: Arc<Store>,
    pub jwt: Arc<JwtValidator>,
    /// Append-only record of achievements and XP changes
    pub activity: ActivityLogger,
    pub catalog: Catalog,
    pub achievements: AchievementCascade,
    pub hierarchy: HierarchyAssembler,
    pub profiles: ProfileService,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(args: Args, store: Arc<Store>, jwt: JwtValidator, activity: ActivityLogger) -> Self {
        let jwt = Arc::new(jwt);
        Self {
            catalog: Catalog::new(Arc::clone(&store)),
            achievements: AchievementCascade::new(Arc::clone(&store), activity.clone()),
            hierarchy: HierarchyAssembler::new(Arc::clone(&store)),
            profiles: ProfileService::new(Arc::clone(&store), Arc::clone(&jwt)),
            args,
            store,
            jwt,
            activity,
            started_at: Instant::now(),
        }
    }

    /// Dev-mode state over an in-memory store
    #[cfg(test)]
    pub fn for_tests() -> Self {
        use clap::Parser;

        let args = Args::parse_from(["skilltree", "--dev-mode", "--store", "memory"]);
        Self::new(
            args,
            Arc::new(Store::memory()),
            JwtValidator::new_dev(),
            ActivityLogger::new("test".to_string()),
        )
    }
}

/// Start the HTTP server and serve until `shutdown` resolves
pub async fn run<F>(state: Arc<AppState>, shutdown: F) -> Result<(), SkillTreeError>
where
    F: Future<Output = ()>,
{
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Skilltree listening on {} as instance {} ({} store)",
        state.args.listen,
        state.args.instance_id,
        state.store.kind()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using the fixed development JWT secret");
    }

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok((stream, addr)) => {
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);

                        let service = service_fn(move |req| {
                            let state = Arc::clone(&state);
                            async move { handle_request(state, addr, req).await }
                        });

                        if let Err(err) = http1::Builder::new()
                            .serve_connection(io, service)
                            .await
                        {
                            debug!("Error serving connection from {}: {:?}", addr, err);
                        }
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {:?}", e);
                }
            }
        }
    }
}

/// Buffer, route and log one request
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let started = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let response = match buffer_request(&state, req).await {
        Ok(api_request) => routes::dispatch(&state, &api_request).await,
        Err(e) => routes::error_response(&e),
    };

    info!(
        "[{}] {} {} -> {} ({:?})",
        addr,
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );

    Ok(to_boxed(response))
}

/// Collect the body up to the configured limit
async fn buffer_request(
    state: &AppState,
    req: Request<Incoming>,
) -> Result<ApiRequest, SkillTreeError> {
    let (parts, body) = req.into_parts();

    let body = Limited::new(body, state.args.max_body_bytes)
        .collect()
        .await
        .map_err(|e| SkillTreeError::Http(format!("Failed to read request body: {}", e)))?
        .to_bytes();

    let authorization = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    Ok(ApiRequest {
        method: parts.method,
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(String::from),
        authorization,
        body,
    })
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: ApiResponse) -> Response<BoxBody> {
    response.map(|body: Full<Bytes>| body.map_err(|never| match never {}).boxed())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_state_wires_one_store() {
        let state = AppState::for_tests();
        assert_eq!(state.store.kind(), "memory");
        assert!(state.store.is_connected());
        assert!(state.args.dev_mode);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut state = AppState::for_tests();
        state.args.listen = "127.0.0.1:0".parse().unwrap();
        let state = Arc::new(state);

        tokio_test::assert_ok!(run(state, async {}).await);
    }

    #[test]
    fn test_to_boxed_keeps_status() {
        let response = routes::common::preflight_response();
        let boxed = to_boxed(response);
        assert_eq!(boxed.status(), hyper::StatusCode::NO_CONTENT);
    }
}
