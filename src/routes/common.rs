//! Request and response plumbing shared by every route
//!
//! Handlers work on an `ApiRequest` whose body has already been collected,
//! so they can be driven directly in tests without a socket.

use bson::oid::ObjectId;
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{self, HeaderValue};
use hyper::{Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{error, warn};

use crate::auth::extract_token_from_header;
use crate::server::AppState;
use crate::types::{Result, SkillTreeError};

pub type ApiResponse = Response<Full<Bytes>>;

/// A fully buffered request
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub body: Bytes,
}

impl ApiRequest {
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = match uri.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (uri.to_string(), None),
        };
        Self {
            method,
            path,
            query,
            authorization: None,
            body: Bytes::new(),
        }
    }

    pub fn with_bearer(mut self, token: &str) -> Self {
        self.authorization = Some(format!("Bearer {}", token));
        self
    }

    pub fn with_json<T: Serialize>(mut self, body: &T) -> Self {
        self.body = Bytes::from(serde_json::to_vec(body).unwrap_or_default());
        self
    }

    /// Decoded value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            if key != name {
                return None;
            }
            urlencoding::decode(value).ok().map(|v| v.into_owned())
        })
    }

    /// Optional id filter from the query string
    pub fn query_id(&self, name: &str) -> Result<Option<ObjectId>> {
        self.query_param(name)
            .filter(|v| !v.is_empty())
            .map(|v| parse_id(&v))
            .transpose()
    }

    /// Deserialize the JSON body; an empty body reads as `{}`
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        if self.body.is_empty() {
            return Ok(serde_json::from_slice(b"{}")?);
        }
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Profile id of the bearer token
    pub fn require_profile(&self, state: &AppState) -> Result<ObjectId> {
        let token = extract_token_from_header(self.authorization.as_deref())
            .ok_or_else(|| SkillTreeError::Auth("Missing bearer token".into()))?;
        state.jwt.verify_token(token)?.profile_id()
    }
}

pub fn parse_id(raw: &str) -> Result<ObjectId> {
    ObjectId::parse_str(raw)
        .map_err(|_| SkillTreeError::Validation(format!("'{}' is not a valid id", raw)))
}

fn with_cors(mut response: ApiResponse) -> ApiResponse {
    let headers = response.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, PATCH, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, body: &T) -> ApiResponse {
    let json = match serde_json::to_vec(body) {
        Ok(json) => json,
        Err(e) => {
            error!("Failed to serialize response: {}", e);
            return error_response(&SkillTreeError::Internal("Serialization failed".into()));
        }
    };

    let mut response = Response::new(Full::new(Bytes::from(json)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    with_cors(response)
}

pub fn ok<T: Serialize>(body: &T) -> Result<ApiResponse> {
    Ok(json_response(StatusCode::OK, body))
}

pub fn created<T: Serialize>(body: &T) -> Result<ApiResponse> {
    Ok(json_response(StatusCode::CREATED, body))
}

/// `{"error": message, "code": CODE}` with the error's status
pub fn error_response(err: &SkillTreeError) -> ApiResponse {
    let status = err.status_code();
    if status.is_server_error() {
        error!(code = err.code(), "{}", err);
    } else {
        warn!(code = err.code(), "{}", err);
    }

    let body = serde_json::json!({
        "error": err.to_string(),
        "code": err.code(),
    });
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    with_cors(response)
}

pub fn not_found_response(path: &str) -> ApiResponse {
    json_response(
        StatusCode::NOT_FOUND,
        &serde_json::json!({
            "error": format!("No route for {}", path),
            "code": "NOT_FOUND",
        }),
    )
}

pub fn method_not_allowed() -> ApiResponse {
    json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &serde_json::json!({
            "error": "Method not allowed",
            "code": "METHOD_NOT_ALLOWED",
        }),
    )
}

pub fn preflight_response() -> ApiResponse {
    let mut response = Response::new(Full::new(Bytes::new()));
    *response.status_mut() = StatusCode::NO_CONTENT;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400"));
    with_cors(response)
}
