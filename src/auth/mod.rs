//! Authentication for skilltree
//!
//! Profiles log in with email and password (argon2id hashes) and receive an
//! HS256 JWT whose subject is the profile id. Every `/api` request carries
//! that token as a bearer credential.

pub mod jwt;
pub mod password;

pub use jwt::{extract_token_from_header, Claims, JwtValidator};
pub use password::{hash_password, validate_password, verify_password, MIN_PASSWORD_LENGTH};
