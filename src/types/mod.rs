//! Shared types for skilltree

mod error;
pub mod views;

pub use error::{Result, SkillTreeError};
