//! /auth routes: register, login and the current profile

use hyper::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::routes::common::{json_response, method_not_allowed, ok, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::services::Session;
use crate::types::views::ProfileView;
use crate::types::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub token: String,
    /// Token lifetime in seconds
    pub expires_in: u64,
    pub profile: ProfileView,
}

fn auth_response(state: &AppState, status: StatusCode, session: Session) -> ApiResponse {
    json_response(
        status,
        &AuthResponse {
            token: session.token,
            expires_in: state.jwt.expiry_seconds(),
            profile: ProfileView::from(&session.profile),
        },
    )
}

pub async fn handle(state: &AppState, req: &ApiRequest, rest: &[&str]) -> Result<ApiResponse> {
    match (&req.method, rest) {
        (&Method::POST, ["register"]) => {
            let body: RegisterRequest = req.json()?;
            let session = state
                .profiles
                .register(&body.name, &body.email, &body.password)
                .await?;
            Ok(auth_response(state, StatusCode::CREATED, session))
        }
        (&Method::POST, ["login"]) => {
            let body: LoginRequest = req.json()?;
            let session = state.profiles.login(&body.email, &body.password).await?;
            Ok(auth_response(state, StatusCode::OK, session))
        }
        (&Method::GET, ["me"]) => {
            let profile = req.require_profile(state)?;
            let doc = state.profiles.me(profile).await?;
            ok(&ProfileView::from(&doc))
        }
        (_, ["register"]) | (_, ["login"]) | (_, ["me"]) => Ok(method_not_allowed()),
        _ => Ok(crate::routes::common::not_found_response(&req.path)),
    }
}
