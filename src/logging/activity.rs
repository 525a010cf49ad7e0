//! Activity log
//!
//! Appends one JSON object per line for every achievement recorded, every XP
//! award and every level-up. Without a configured file the logger is inert.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::leveling::{XpChange, XpPool};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    AchievementRecorded,
    XpAwarded,
    LevelUp,
    AchievementDeleted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: ActivityKind,
    /// Server instance that handled the request
    pub instance_id: String,
    pub profile_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    /// `skill` or `category` for XP events
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl ActivityEvent {
    pub fn new(kind: ActivityKind, instance_id: String, profile_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            instance_id,
            profile_id,
            entity_id: None,
            pool: None,
            xp: None,
            level: None,
            metadata: None,
        }
    }

    pub fn with_entity(mut self, entity_id: String) -> Self {
        self.entity_id = Some(entity_id);
        self
    }

    pub fn with_pool(mut self, pool: XpPool) -> Self {
        self.pool = Some(pool.as_str().to_string());
        self
    }

    pub fn with_xp(mut self, xp: i64) -> Self {
        self.xp = Some(xp);
        self
    }

    pub fn with_level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }

    pub fn to_jsonl(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Writes activity events to a JSONL file
#[derive(Clone)]
pub struct ActivityLogger {
    inner: Arc<Mutex<ActivityLoggerInner>>,
    instance_id: String,
}

struct ActivityLoggerInner {
    writer: Option<BufWriter<File>>,
    path: Option<PathBuf>,
}

impl ActivityLogger {
    pub fn new(instance_id: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ActivityLoggerInner {
                writer: None,
                path: None,
            })),
            instance_id,
        }
    }

    /// Start appending to `path`
    pub async fn init_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        let mut inner = self.inner.lock().await;
        inner.writer = Some(BufWriter::new(file));
        inner.path = Some(path.clone());

        info!("Activity logging initialized to {}", path.display());
        Ok(())
    }

    pub async fn path(&self) -> Option<PathBuf> {
        self.inner.lock().await.path.clone()
    }

    pub async fn log(&self, event: ActivityEvent) {
        let jsonl = match event.to_jsonl() {
            Ok(line) => line,
            Err(e) => {
                error!("Failed to serialize activity event: {}", e);
                return;
            }
        };

        let mut inner = self.inner.lock().await;

        if let Some(ref mut writer) = inner.writer {
            if let Err(e) = writeln!(writer, "{}", jsonl) {
                error!("Failed to write activity event: {}", e);
            }
            if let Err(e) = writer.flush() {
                error!("Failed to flush activity log: {}", e);
            }
        }
    }

    pub async fn log_achievement(&self, profile_id: &str, achievement_id: &str, xp_awarded: i64) {
        let event = ActivityEvent::new(
            ActivityKind::AchievementRecorded,
            self.instance_id.clone(),
            profile_id.to_string(),
        )
        .with_entity(achievement_id.to_string())
        .with_xp(xp_awarded);

        self.log(event).await;
    }

    pub async fn log_achievement_deleted(&self, profile_id: &str, achievement_id: &str) {
        let event = ActivityEvent::new(
            ActivityKind::AchievementDeleted,
            self.instance_id.clone(),
            profile_id.to_string(),
        )
        .with_entity(achievement_id.to_string());

        self.log(event).await;
    }

    /// Log an XP award, plus a level-up event when the level changed
    pub async fn log_xp_change(&self, profile_id: &str, entity_id: &str, change: &XpChange) {
        let awarded = ActivityEvent::new(
            ActivityKind::XpAwarded,
            self.instance_id.clone(),
            profile_id.to_string(),
        )
        .with_entity(entity_id.to_string())
        .with_pool(change.pool)
        .with_xp(change.xp_after)
        .with_level(change.level_after);
        self.log(awarded).await;

        if change.leveled_up() {
            let level_up = ActivityEvent::new(
                ActivityKind::LevelUp,
                self.instance_id.clone(),
                profile_id.to_string(),
            )
            .with_entity(entity_id.to_string())
            .with_pool(change.pool)
            .with_level(change.level_after);
            self.log(level_up).await;
        }
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }
}
