//! Authentication utilities
//!
//! OAuth/session authentication is handled by an upstream identity layer;
//! this module only provides:
//! - API key hashing and validation helpers
//! - User context extraction from forwarded headers

use crate::errors::{AppError, Result};
use axum::{
    extract::{FromRequestParts, Request},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// User ID (session owner)
    pub user_id: Uuid,

    /// API key (if authenticated via API key)
    pub api_key: Option<String>,

    /// Request ID for tracing
    pub request_id: String,
}

/// Hash an API key for storage
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Validate an API key against a stored hash
pub fn validate_api_key(api_key: &str, stored_hash: &str) -> bool {
    hash_api_key(api_key) == stored_hash
}

/// Generate a new API key
pub fn generate_api_key() -> String {
    let random_bytes: [u8; 32] = rand::random();
    format!("ck_{}", hex::encode(random_bytes))
}

/// Extract API key from Authorization header
pub fn extract_api_key(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        // Extract request ID
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        // Extract user ID forwarded by the identity layer
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| Uuid::parse_str(s).ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing or invalid X-User-ID header".to_string(),
            })?;

        // Extract API key
        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let api_key = extract_api_key(auth_header).map(String::from);

        if let Some(ref key) = api_key {
            if !key.starts_with("ck_") {
                return Err(AppError::InvalidApiKey);
            }
        }

        Ok(AuthContext {
            user_id,
            api_key,
            request_id,
        })
    }
}

/// Middleware for API key authentication
pub async fn auth_middleware(
    request: Request,
    next: Next,
) -> std::result::Result<Response, AppError> {
    // Check for Authorization header
    let auth_header = request
        .headers()
        .get("authorization")
        .and_then(|v| v.to_str().ok());

    if auth_header.is_none() {
        return Err(AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
        });
    }

    // Check for User ID header
    let user_header = request
        .headers()
        .get("x-user-id")
        .and_then(|v| v.to_str().ok());

    if user_header.is_none() {
        return Err(AppError::Unauthorized {
            message: "Missing X-User-ID header".to_string(),
        });
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_api_key() {
        let key = "ck_test_12345";
        let hash = hash_api_key(key);
        assert!(validate_api_key(key, &hash));
        assert!(!validate_api_key("wrong_key", &hash));
    }

    #[test]
    fn test_generate_api_key() {
        let key = generate_api_key();
        assert!(key.starts_with("ck_"));
        assert!(key.len() > 10);
    }

    #[test]
    fn test_extract_api_key() {
        assert_eq!(extract_api_key("Bearer ck_123"), Some("ck_123"));
        assert_eq!(extract_api_key("ck_123"), None);
        assert_eq!(extract_api_key("Basic abc"), None);
    }
}
