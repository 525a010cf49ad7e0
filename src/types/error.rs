//! Error types for skilltree
//!
//! Every failure surfaced to a client maps onto one of these variants, which
//! in turn carries its HTTP status and a stable machine-readable code.

use hyper::StatusCode;

/// Main error type for skilltree operations
#[derive(Debug, thiserror::Error)]
pub enum SkillTreeError {
    /// Missing or malformed input (absent name, xp_reward < 1, bad id)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity is absent or not owned by the acting profile
    #[error("Not found: {0}")]
    NotFound(String),

    /// Missing or invalid credential
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Unique constraint violated (duplicate email)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Transaction aborted by a write conflict or failover; safe to retry
    #[error("Database error: {0}")]
    TransientDatabase(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SkillTreeError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Database(_) | Self::TransientDatabase(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Http(_) => StatusCode::BAD_REQUEST,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Auth(_) => "AUTHENTICATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) | Self::TransientDatabase(_) => "DB_ERROR",
            Self::Http(_) => "BAD_REQUEST",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Database error that keeps MongoDB's transient-transaction label
    pub fn database(context: &str, err: mongodb::error::Error) -> Self {
        let message = format!("{}: {}", context, err);
        if err.contains_label(mongodb::error::TRANSIENT_TRANSACTION_ERROR) {
            Self::TransientDatabase(message)
        } else {
            Self::Database(message)
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::TransientDatabase(_))
    }

    /// Shorthand for a not-found error on a named entity kind
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        Self::NotFound(format!("{} {} not found", kind, id))
    }
}

impl From<std::io::Error> for SkillTreeError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for SkillTreeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for SkillTreeError {
    fn from(err: hyper::Error) -> Self {
        Self::Http(err.to_string())
    }
}

impl From<mongodb::error::Error> for SkillTreeError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::database("MongoDB operation failed", err)
    }
}

impl From<bson::ser::Error> for SkillTreeError {
    fn from(err: bson::ser::Error) -> Self {
        Self::Internal(format!("BSON serialization failed: {}", err))
    }
}

impl From<bson::de::Error> for SkillTreeError {
    fn from(err: bson::de::Error) -> Self {
        Self::Database(format!("BSON deserialization failed: {}", err))
    }
}

impl From<bson::oid::Error> for SkillTreeError {
    fn from(err: bson::oid::Error) -> Self {
        Self::Validation(format!("Invalid id: {}", err))
    }
}

impl From<jsonwebtoken::errors::Error> for SkillTreeError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::Auth(format!("JWT error: {}", err))
    }
}

/// Result type alias for skilltree operations
pub type Result<T> = std::result::Result<T, SkillTreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            SkillTreeError::Validation("name".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            SkillTreeError::not_found("Challenge", "abc").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            SkillTreeError::Database("down".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_not_found_message() {
        let err = SkillTreeError::not_found("Skill", "42");
        assert_eq!(err.to_string(), "Not found: Skill 42 not found");
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn test_transient_database_errors() {
        let err = SkillTreeError::TransientDatabase("WriteConflict".into());
        assert!(err.is_transient());
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "DB_ERROR");
        assert!(!SkillTreeError::Database("down".into()).is_transient());
    }

    #[test]
    fn test_invalid_object_id_is_validation() {
        let err: SkillTreeError = bson::oid::ObjectId::parse_str("nope").unwrap_err().into();
        assert!(matches!(err, SkillTreeError::Validation(_)));
    }
}
