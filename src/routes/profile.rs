//! /api/profile routes

use bson::oid::ObjectId;
use hyper::Method;
use serde::Serialize;

use crate::routes::common::{method_not_allowed, ok, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::services::ProfileStats;
use crate::types::views::ProfileView;
use crate::types::Result;

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub profile: ProfileView,
    pub stats: ProfileStats,
}

pub async fn handle(
    state: &AppState,
    req: &ApiRequest,
    profile: ObjectId,
    rest: &[&str],
) -> Result<ApiResponse> {
    match (&req.method, rest) {
        (&Method::GET, []) => {
            let doc = state.profiles.me(profile).await?;
            let stats = state.hierarchy.stats(profile).await?;
            ok(&ProfileResponse {
                profile: ProfileView::from(&doc),
                stats,
            })
        }
        (&Method::GET, ["tree"]) => ok(&state.hierarchy.profile_tree(profile).await?),
        _ => Ok(method_not_allowed()),
    }
}
