pub mod auth;
pub mod bookings;
pub mod chargers;
pub mod health;

use axum::http::HeaderMap;

use crate::errors::AppError;

/// Durable user id issued by the identity provider, forwarded by the API
/// gateway as a trusted header.
pub(crate) fn caller_id(headers: &HeaderMap) -> Result<String, AppError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(AppError::Unauthorized)
}

/// Optional per-tab client id used only for realtime self-echo suppression.
pub(crate) fn client_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-client-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
