//! JSON request bodies.
//!
//! Same as `axum::Json`, except that malformed bodies, unknown enum values
//! and missing fields are answered through [`ApiError`] as 400s.

use axum::extract::FromRequest;

use super::ApiError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct JsonBody<T>(pub T);
