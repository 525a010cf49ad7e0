//! /api/achievements routes
//!
//! POST records a completion and runs the XP cascade.

use bson::{oid::ObjectId, DateTime};
use hyper::Method;
use serde::Deserialize;

use crate::db::schemas::AchievementUpdate;
use crate::routes::common::{created, method_not_allowed, ok, parse_id, ApiRequest, ApiResponse};
use crate::server::AppState;
use crate::services::CompletedAchievementView;
use crate::types::views::AchievementView;
use crate::types::{Result, SkillTreeError};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AchievementBody {
    pub challenge_id: Option<String>,
    pub notes: Option<String>,
    /// RFC 3339
    pub completed_at: Option<String>,
}

fn parse_timestamp(raw: &str) -> Result<DateTime> {
    chrono::DateTime::parse_from_rfc3339(raw)
        .map(|t| DateTime::from_chrono(t.with_timezone(&chrono::Utc)))
        .map_err(|e| SkillTreeError::Validation(format!("completedAt must be RFC 3339: {}", e)))
}

pub async fn handle(
    state: &AppState,
    req: &ApiRequest,
    profile: ObjectId,
    rest: &[&str],
) -> Result<ApiResponse> {
    let achievements = &state.achievements;

    match (&req.method, rest) {
        (&Method::GET, []) => {
            let list = achievements
                .list(profile, req.query_id("challengeId")?)
                .await?;
            ok(&list.iter().map(AchievementView::from).collect::<Vec<_>>())
        }
        (&Method::POST, []) => {
            let body: AchievementBody = req.json()?;
            let challenge_id = body
                .challenge_id
                .as_deref()
                .ok_or_else(|| SkillTreeError::Validation("challengeId is required".into()))
                .and_then(parse_id)?;
            let completed_at = body.completed_at.as_deref().map(parse_timestamp).transpose()?;

            let done = achievements
                .record(profile, challenge_id, body.notes, completed_at)
                .await?;
            created(&CompletedAchievementView::from(&done))
        }
        (&Method::GET, [id]) => {
            let achievement = achievements.get(profile, parse_id(id)?).await?;
            ok(&AchievementView::from(&achievement))
        }
        (&Method::PUT, [id]) | (&Method::PATCH, [id]) => {
            let body: AchievementBody = req.json()?;
            let update = AchievementUpdate {
                notes: body.notes,
                completed_at: body.completed_at.as_deref().map(parse_timestamp).transpose()?,
            };
            let achievement = achievements.update(profile, parse_id(id)?, update).await?;
            ok(&AchievementView::from(&achievement))
        }
        (&Method::DELETE, [id]) => {
            let summary = achievements.delete(profile, parse_id(id)?).await?;
            ok(&serde_json::json!({ "deleted": summary }))
        }
        _ => Ok(method_not_allowed()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        let t = parse_timestamp("2024-03-01T12:00:00+02:00").unwrap();
        assert_eq!(t.timestamp_millis(), 1_709_287_200_000);
        assert!(parse_timestamp("yesterday").is_err());
    }
}
