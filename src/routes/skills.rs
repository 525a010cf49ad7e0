//! /api/skills routes

use bson::oid::ObjectId;
use hyper::Method;
use serde::Deserialize;

use crate::db::schemas::SkillUpdate;
use crate::routes::common::{created, method_not_allowed, ok, parse_id, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::types::views::SkillView;
use crate::types::{Result, SkillTreeError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SkillBody {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
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
            let skills = catalog
                .list_skills(profile, req.query_id("categoryId")?)
                .await?;
            ok(&skills.iter().map(SkillView::from).collect::<Vec<_>>())
        }
        (&Method::POST, []) => {
            let body: SkillBody = req.json()?;
            let category_id = body
                .category_id
                .as_deref()
                .ok_or_else(|| SkillTreeError::Validation("categoryId is required".into()))
                .and_then(parse_id)?;
            let skill = catalog
                .create_skill(
                    profile,
                    category_id,
                    body.name.as_deref().unwrap_or_default(),
                    body.description,
                )
                .await?;
            created(&SkillView::from(&skill))
        }
        (&Method::GET, [id]) => {
            let skill = catalog.get_skill(profile, parse_id(id)?).await?;
            ok(&SkillView::from(&skill))
        }
        (&Method::PUT, [id]) | (&Method::PATCH, [id]) => {
            let body: SkillBody = req.json()?;
            let update = SkillUpdate {
                name: body.name,
                description: body.description,
                category_id: body.category_id.as_deref().map(parse_id).transpose()?,
            };
            let skill = catalog.update_skill(profile, parse_id(id)?, update).await?;
            ok(&SkillView::from(&skill))
        }
        (&Method::DELETE, [id]) => {
            let summary = catalog.delete_skill(profile, parse_id(id)?).await?;
            ok(&serde_json::json!({ "deleted": summary }))
        }
        (&Method::GET, [id, "tree"]) => {
            let tree = state.hierarchy.skill_tree(profile, parse_id(id)?).await?;
            ok(&tree)
        }
        _ => Ok(method_not_allowed()),
    }
}
