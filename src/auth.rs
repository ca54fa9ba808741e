use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use uuid::Uuid;

use crate::errors::AppError;

/// Header carrying the authenticated account id, set by the identity gateway
/// in front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The account making the request. Every contact query is scoped to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser(pub Uuid);

/// Extract the user id from `X-User-Id`.
pub fn user_id_from_headers(headers: &HeaderMap) -> Result<Uuid, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing X-User-Id header".to_string()))?
        .to_str()
        .map_err(|_| AppError::Unauthorized("X-User-Id is not valid ASCII".to_string()))?;

    Uuid::parse_str(raw.trim())
        .map_err(|_| AppError::Unauthorized(format!("X-User-Id is not a UUID: {}", raw)))
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        user_id_from_headers(&parts.headers).map(AuthenticatedUser)
    }
}
