//! /api/subskills routes

use bson::oid::ObjectId;
use hyper::Method;
use serde::Deserialize;

use crate::db::schemas::SubSkillUpdate;
use crate::routes::common::{created, method_not_allowed, ok, parse_id, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::types::views::SubSkillView;
use crate::types::{Result, SkillTreeError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubSkillBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub skill_id: Option<String>,
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
            let sub_skills = catalog
                .list_sub_skills(profile, req.query_id("skillId")?)
                .await?;
            ok(&sub_skills.iter().map(SubSkillView::from).collect::<Vec<_>>())
        }
        (&Method::POST, []) => {
            let body: SubSkillBody = req.json()?;
            let skill_id = body
                .skill_id
                .as_deref()
                .ok_or_else(|| SkillTreeError::Validation("skillId is required".into()))
                .and_then(parse_id)?;
            let sub_skill = catalog
                .create_sub_skill(
                    profile,
                    skill_id,
                    body.name.as_deref().unwrap_or_default(),
                    body.description,
                )
                .await?;
            created(&SubSkillView::from(&sub_skill))
        }
        (&Method::GET, [id]) => {
            let sub_skill = catalog.get_sub_skill(profile, parse_id(id)?).await?;
            ok(&SubSkillView::from(&sub_skill))
        }
        (&Method::PUT, [id]) | (&Method::PATCH, [id]) => {
            let body: SubSkillBody = req.json()?;
            let update = SubSkillUpdate {
                name: body.name,
                description: body.description,
            };
            let sub_skill = catalog
                .update_sub_skill(profile, parse_id(id)?, update)
                .await?;
            ok(&SubSkillView::from(&sub_skill))
        }
        (&Method::DELETE, [id]) => {
            let summary = catalog.delete_sub_skill(profile, parse_id(id)?).await?;
            ok(&serde_json::json!({ "deleted": summary }))
        }
        _ => Ok(method_not_allowed()),
    }
}
