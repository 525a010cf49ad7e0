//! Profile registration and login

use bson::oid::ObjectId;
use std::sync::Arc;
use tracing::{info, warn};

use crate::auth::{hash_password, validate_password, verify_password, JwtValidator};
use crate::db::schemas::{normalize_email, ProfileDoc};
use crate::db::{SkillStore, Store};
use crate::services::catalog::require_name;
use crate::types::{Result, SkillTreeError};

/// A profile together with a freshly issued token
#[derive(Debug, Clone)]
pub struct Session {
    pub profile: ProfileDoc,
    pub token: String,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<Store>,
    jwt: Arc<JwtValidator>,
}

fn require_email(email: &str) -> Result<String> {
    let email = normalize_email(email);
    let valid = email
        .split_once('@')
        .is_some_and(|(user, domain)| !user.is_empty() && domain.contains('.'));
    if !valid {
        return Err(SkillTreeError::Validation("a valid email is required".into()));
    }
    Ok(email)
}

impl ProfileService {
    pub fn new(store: Arc<Store>, jwt: Arc<JwtValidator>) -> Self {
        Self { store, jwt }
    }

    fn issue(&self, profile: ProfileDoc) -> Result<Session> {
        let id = profile
            ._id
            .ok_or_else(|| SkillTreeError::Internal("Profile has no id".into()))?;
        let token = self.jwt.generate_token(id, &profile.email)?;
        Ok(Session { profile, token })
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<Session> {
        let name = require_name(name)?;
        let email = require_email(email)?;
        validate_password(password)?;

        let hash = hash_password(password)?;
        let profile = self
            .store
            .insert_profile(ProfileDoc::new(name, email, hash))
            .await?;

        info!(profile = ?profile._id, email = %profile.email, "Profile registered");
        self.issue(profile)
    }

    /// Unknown email and wrong password fail the same way
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        let invalid = || SkillTreeError::Auth("Invalid email or password".into());

        let Some(profile) = self.store.find_profile_by_email(&email).await? else {
            warn!(%email, "Login for unknown email");
            return Err(invalid());
        };
        if !verify_password(password, &profile.password_hash)? {
            warn!(%email, "Login with wrong password");
            return Err(invalid());
        }

        info!(profile = ?profile._id, "Profile logged in");
        self.issue(profile)
    }

    pub async fn me(&self, profile: ObjectId) -> Result<ProfileDoc> {
        self.store
            .find_profile(profile)
            .await?
            .ok_or_else(|| SkillTreeError::not_found("Profile", profile))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> ProfileService {
        ProfileService::new(Arc::new(Store::memory()), Arc::new(JwtValidator::new_dev()))
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let service = service();
        let registered = service
            .register("Ada", "Ada@Example.com", "analytical-engine")
            .await
            .unwrap();
        assert_eq!(registered.profile.email, "ada@example.com");
        assert!(registered.profile.password_hash.starts_with("$argon2"));

        let session = service
            .login("ada@example.com", "analytical-engine")
            .await
            .unwrap();
        assert_eq!(session.profile._id, registered.profile._id);

        let claims = JwtValidator::new_dev().verify_token(&session.token).unwrap();
        assert_eq!(claims.profile_id().unwrap(), registered.profile._id.unwrap());

        let me = service.me(claims.profile_id().unwrap()).await.unwrap();
        assert_eq!(me.name, "Ada");
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = service();
        assert!(matches!(
            service.register("Ada", "not-an-email", "long-password").await,
            Err(SkillTreeError::Validation(_))
        ));
        assert!(matches!(
            service.register("Ada", "ada@example.com", "short").await,
            Err(SkillTreeError::Validation(_))
        ));
        assert!(matches!(
            service.register(" ", "ada@example.com", "long-password").await,
            Err(SkillTreeError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let service = service();
        service
            .register("Ada", "ada@example.com", "long-password")
            .await
            .unwrap();
        let err = service
            .register("Other Ada", "ADA@example.com", "long-password")
            .await
            .unwrap_err();
        assert!(matches!(err, SkillTreeError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let service = service();
        service
            .register("Ada", "ada@example.com", "long-password")
            .await
            .unwrap();

        let wrong = service.login("ada@example.com", "nope-nope").await.unwrap_err();
        let unknown = service.login("bob@example.com", "long-password").await.unwrap_err();
        assert!(matches!(wrong, SkillTreeError::Auth(_)));
        assert_eq!(wrong.to_string(), unknown.to_string());
    }
}
