//! /api/challenges routes

use bson::oid::ObjectId;
use hyper::Method;
use serde::Deserialize;

use crate::db::schemas::ChallengeUpdate;
use crate::routes::common::{created, method_not_allowed, ok, parse_id, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::types::views::ChallengeView;
use crate::types::{Result, SkillTreeError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChallengeBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub xp_reward: Option<i64>,
    pub sub_skill_id: Option<String>,
}

pub async fn handle(
    state: &AppState,
    req: &ApiRequest,
    profile: ObjectId,
    rest: &[&str],
) -> Result<ApiResponse> {
    let catalog = &state.catalog;

    match (&req.method, rest) {
        (&Method::GET, []) => {
            let challenges = catalog
                .list_challenges(profile, req.query_id("subSkillId")?)
                .await?;
            ok(&challenges.iter().map(ChallengeView::from).collect::<Vec<_>>())
        }
        (&Method::POST, []) => {
            let body: ChallengeBody = req.json()?;
            let sub_skill_id = body
                .sub_skill_id
                .as_deref()
                .ok_or_else(|| SkillTreeError::Validation("subSkillId is required".into()))
                .and_then(parse_id)?;
            let challenge = catalog
                .create_challenge(
                    profile,
                    sub_skill_id,
                    body.name.as_deref().unwrap_or_default(),
                    body.description,
                    body.xp_reward,
                )
                .await?;
            created(&ChallengeView::from(&challenge))
        }
        (&Method::GET, [id]) => {
            let challenge = catalog.get_challenge(profile, parse_id(id)?).await?;
            ok(&ChallengeView::from(&challenge))
        }
        (&Method::PUT, [id]) | (&Method::PATCH, [id]) => {
            let body: ChallengeBody = req.json()?;
            let update = ChallengeUpdate {
                name: body.name,
                description: body.description,
                xp_reward: body.xp_reward,
                sub_skill_id: body.sub_skill_id.as_deref().map(parse_id).transpose()?,
            };
            let challenge = catalog
                .update_challenge(profile, parse_id(id)?, update)
                .await?;
            ok(&ChallengeView::from(&challenge))
        }
        (&Method::DELETE, [id]) => {
            let summary = catalog.delete_challenge(profile, parse_id(id)?).await?;
            ok(&serde_json::json!({ "deleted": summary }))
        }
        _ => Ok(method_not_allowed()),
    }
}
