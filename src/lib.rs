//! Skilltree - gamified skill tracking API
//!
//! Profiles organise what they are learning as Category → Skill → SubSkill →
//! Challenge. Completing a challenge records an achievement and awards its
//! XP to the owning skill and category, which level up as XP accumulates.
//!
//! ## Services
//!
//! - **Catalog**: CRUD over the four hierarchy levels with cascading deletes
//! - **Achievements**: the completion cascade that moves XP up the tree
//! - **Hierarchy**: nested tree views and per-profile totals
//! - **Profiles**: registration, login and JWT issuance

pub mod auth;
pub mod config;
pub mod db;
pub mod leveling;
pub mod logging;
pub mod routes;
pub mod server;
pub mod services;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{Result, SkillTreeError};
