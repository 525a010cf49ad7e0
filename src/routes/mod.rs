//! HTTP routes for skilltree

pub mod achievements;
pub mod auth_routes;
pub mod categories;
pub mod challenges;
pub mod common;
pub mod health;
pub mod profile;
pub mod skills;
pub mod sub_skills;

pub use common::{error_response, ApiRequest, ApiResponse};
pub use health::{health_check, readiness_check, version_info};

use hyper::Method;

use crate::server::AppState;
use crate::types::Result;

/// Route a buffered request to its handler
pub async fn dispatch(state: &AppState, req: &ApiRequest) -> ApiResponse {
    match route(state, req).await {
        Ok(response) => response,
        Err(e) => error_response(&e),
    }
}

async fn route(state: &AppState, req: &ApiRequest) -> Result<ApiResponse> {
    if req.method == Method::OPTIONS {
        return Ok(common::preflight_response());
    }

    let segments: Vec<&str> = req
        .path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    match segments.as_slice() {
        ["health"] | ["healthz"] => Ok(health_check(state)),
        ["ready"] | ["readyz"] => Ok(readiness_check(state).await),
        ["version"] => Ok(version_info()),
        ["auth", rest @ ..] => auth_routes::handle(state, req, rest).await,
        ["api", resource, rest @ ..] => {
            let profile_id = req.require_profile(state)?;
            match *resource {
                "categories" => categories::handle(state, req, profile_id, rest).await,
                "skills" => skills::handle(state, req, profile_id, rest).await,
                "subskills" => sub_skills::handle(state, req, profile_id, rest).await,
                "challenges" => challenges::handle(state, req, profile_id, rest).await,
                "achievements" => achievements::handle(state, req, profile_id, rest).await,
                "profile" => profile::handle(state, req, profile_id, rest).await,
                _ => Ok(common::not_found_response(&req.path)),
            }
        }
        _ => Ok(common::not_found_response(&req.path)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::AppState;
    use hyper::StatusCode;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};

    async fn call(state: &AppState, req: ApiRequest) -> (StatusCode, Value) {
        let response = dispatch(state, &req).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    async fn register(state: &AppState, email: &str) -> String {
        let (status, body) = call(
            state,
            ApiRequest::new(Method::POST, "/auth/register").with_json(&json!({
                "name": "Ada",
                "email": email,
                "password": "analytical-engine",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        body["token"].as_str().unwrap().to_string()
    }

    async fn post(state: &AppState, token: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        call(
            state,
            ApiRequest::new(Method::POST, uri)
                .with_bearer(token)
                .with_json(&body),
        )
        .await
    }

    async fn get(state: &AppState, token: &str, uri: &str) -> (StatusCode, Value) {
        call(state, ApiRequest::new(Method::GET, uri).with_bearer(token)).await
    }

    /// Category → Skill → SubSkill → Challenge, returning their ids
    async fn seed(state: &AppState, token: &str, xp_reward: i64) -> [String; 4] {
        let (_, category) = post(state, token, "/api/categories", json!({ "name": "Music" })).await;
        let category_id = category["id"].as_str().unwrap().to_string();
        let (_, skill) = post(
            state,
            token,
            "/api/skills",
            json!({ "name": "Guitar", "categoryId": category_id }),
        )
        .await;
        let skill_id = skill["id"].as_str().unwrap().to_string();
        let (_, sub_skill) = post(
            state,
            token,
            "/api/subskills",
            json!({ "name": "Chords", "skillId": skill_id }),
        )
        .await;
        let sub_skill_id = sub_skill["id"].as_str().unwrap().to_string();
        let (status, challenge) = post(
            state,
            token,
            "/api/challenges",
            json!({ "name": "Learn G major", "subSkillId": sub_skill_id, "xpReward": xp_reward }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let challenge_id = challenge["id"].as_str().unwrap().to_string();
        [category_id, skill_id, sub_skill_id, challenge_id]
    }

    #[tokio::test]
    async fn test_health_and_version() {
        let state = AppState::for_tests();
        let (status, body) = call(&state, ApiRequest::new(Method::GET, "/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["store"]["kind"], "memory");
        assert_eq!(body["status"], "online");

        let (status, body) = call(&state, ApiRequest::new(Method::GET, "/version")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "skilltree");

        let (status, _) = call(&state, ApiRequest::new(Method::GET, "/ready")).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_requires_token() {
        let state = AppState::for_tests();
        let (status, body) = call(&state, ApiRequest::new(Method::GET, "/api/categories")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "AUTHENTICATION_ERROR");

        let (status, _) = get(&state, "garbage", "/api/categories").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_login_me() {
        let state = AppState::for_tests();
        register(&state, "ada@example.com").await;

        let (status, body) = call(
            &state,
            ApiRequest::new(Method::POST, "/auth/login").with_json(&json!({
                "email": "ADA@example.com",
                "password": "analytical-engine",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let token = body["token"].as_str().unwrap();

        let (status, me) = get(&state, token, "/auth/me").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(me["email"], "ada@example.com");
        assert!(me.get("passwordHash").is_none());

        let (status, body) = call(
            &state,
            ApiRequest::new(Method::POST, "/auth/register").with_json(&json!({
                "name": "Ada",
                "email": "ada@example.com",
                "password": "analytical-engine",
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "CONFLICT");
    }

    #[tokio::test]
    async fn test_validation_and_not_found_codes() {
        let state = AppState::for_tests();
        let token = register(&state, "ada@example.com").await;

        let (status, body) = post(&state, &token, "/api/categories", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "VALIDATION_ERROR");

        let (status, _) = get(&state, &token, "/api/categories/not-an-id").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = bson::oid::ObjectId::new().to_hex();
        let (status, body) = get(&state, &token, &format!("/api/skills/{}", missing)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");

        let (status, _) = call(
            &state,
            ApiRequest::new(Method::POST, "/api/categories").with_bearer(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = get(&state, &token, "/api/unknown").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_achievement_cascade_over_http() {
        let state = AppState::for_tests();
        let token = register(&state, "ada@example.com").await;
        let [category_id, skill_id, _, challenge_id] = seed(&state, &token, 25).await;

        for _ in 0..3 {
            let (status, _) = post(
                &state,
                &token,
                "/api/achievements",
                json!({ "challengeId": challenge_id }),
            )
            .await;
            assert_eq!(status, StatusCode::CREATED);
        }
        let (status, done) = post(
            &state,
            &token,
            "/api/achievements",
            json!({ "challengeId": challenge_id, "notes": "Clean", "completedAt": "2024-03-01T12:00:00Z" }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(done["skill"]["xp"], 100);
        assert_eq!(done["skill"]["level"], 2);
        assert_eq!(done["category"]["xp"], 100);
        assert_eq!(done["category"]["level"], 1);
        assert_eq!(done["achievement"]["notes"], "Clean");
        assert_eq!(done["subSkill"]["name"], "Chords");

        let (_, skill) = get(&state, &token, &format!("/api/skills/{}", skill_id)).await;
        assert_eq!(skill["xp"], 100);

        let (_, list) = get(
            &state,
            &token,
            &format!("/api/achievements?challengeId={}", challenge_id),
        )
        .await;
        assert_eq!(list.as_array().unwrap().len(), 4);

        let (status, profile) = get(&state, &token, "/api/profile").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["stats"]["totalXp"], 200);
        assert_eq!(profile["stats"]["totalLevel"], 3);
        assert_eq!(profile["stats"]["achievements"], 4);

        let (_, tree) = get(&state, &token, &format!("/api/categories/{}/tree", category_id)).await;
        assert_eq!(tree["skills"][0]["subSkills"][0]["challenges"][0]["xpReward"], 25);
    }

    #[tokio::test]
    async fn test_other_profiles_cannot_complete_challenge() {
        let state = AppState::for_tests();
        let owner = register(&state, "ada@example.com").await;
        let intruder = register(&state, "eve@example.com").await;
        let [_, skill_id, _, challenge_id] = seed(&state, &owner, 25).await;

        let (status, _) = post(
            &state,
            &intruder,
            "/api/achievements",
            json!({ "challengeId": challenge_id }),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, skill) = get(&state, &owner, &format!("/api/skills/{}", skill_id)).await;
        assert_eq!(skill["xp"], 0);
    }

    #[tokio::test]
    async fn test_skill_delete_cascades_over_http() {
        let state = AppState::for_tests();
        let token = register(&state, "ada@example.com").await;
        let [_, skill_id, _, challenge_id] = seed(&state, &token, 10).await;

        let (status, body) = call(
            &state,
            ApiRequest::new(Method::DELETE, &format!("/api/skills/{}", skill_id)).with_bearer(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted"]["challenges"], 1);

        let (status, _) = get(&state, &token, &format!("/api/challenges/{}", challenge_id)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (_, challenges) = get(&state, &token, "/api/challenges").await;
        assert_eq!(challenges, json!([]));
    }

    #[tokio::test]
    async fn test_preflight() {
        let state = AppState::for_tests();
        let response = dispatch(&state, &ApiRequest::new(Method::OPTIONS, "/api/skills")).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
