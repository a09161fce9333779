use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};
use uuid::Uuid;

/// Header carrying the verified holder identity. Authentication happens
/// upstream; by the time a request reaches this service the id is already an
/// opaque, trusted value.
pub const HOLDER_HEADER: &str = "x-holder-id";

#[derive(Debug, Clone, Copy)]
pub struct HolderId(pub Uuid);

impl<S> FromRequestParts<S> for HolderId
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(HOLDER_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or((
                StatusCode::UNAUTHORIZED,
                "Missing X-Holder-Id header".to_string(),
            ))?;

        let id = raw.parse::<Uuid>().map_err(|_| {
            (
                StatusCode::UNAUTHORIZED,
                "X-Holder-Id must be a UUID".to_string(),
            )
        })?;

        Ok(HolderId(id))
    }
}
