//! Logging infrastructure for skilltree
//!
//! Diagnostics go through `tracing`. Gameplay events (achievements, XP
//! awards, level-ups) are additionally appended to a JSONL activity log.

pub mod activity;

pub use activity::{ActivityEvent, ActivityKind, ActivityLogger};
