//! /api/categories routes

use bson::oid::ObjectId;
use hyper::Method;
use serde::Deserialize;

use crate::db::schemas::CategoryUpdate;
use crate::routes::common::{created, method_not_allowed, ok, parse_id, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::types::views::CategoryView;
use crate::types::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryBody {
    pub name: Option<String>,
    pub description: Option<String>,
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
            let categories = catalog.list_categories(profile).await?;
            ok(&categories.iter().map(CategoryView::from).collect::<Vec<_>>())
        }
        (&Method::POST, []) => {
            let body: CategoryBody = req.json()?;
            let category = catalog
                .create_category(profile, body.name.as_deref().unwrap_or_default(), body.description)
                .await?;
            created(&CategoryView::from(&category))
        }
        (&Method::GET, [id]) => {
            let category = catalog.get_category(profile, parse_id(id)?).await?;
            ok(&CategoryView::from(&category))
        }
        (&Method::PUT, [id]) | (&Method::PATCH, [id]) => {
            let body: CategoryBody = req.json()?;
            let update = CategoryUpdate {
                name: body.name,
                description: body.description,
            };
            let category = catalog
                .update_category(profile, parse_id(id)?, update)
                .await?;
            ok(&CategoryView::from(&category))
        }
        (&Method::DELETE, [id]) => {
            let summary = catalog.delete_category(profile, parse_id(id)?).await?;
            ok(&serde_json::json!({ "deleted": summary }))
        }
        (&Method::GET, [id, "tree"]) => {
            let tree = state
                .hierarchy
                .category_tree(profile, parse_id(id)?)
                .await?;
            ok(&tree)
        }
        _ => Ok(method_not_allowed()),
    }
}
