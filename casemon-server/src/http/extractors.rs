//! Custom Axum extractors

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, FromRequestParts, Request};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::Json;
use casemon_core::ValidationError;
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// JSON body whose rejections are reported as `400 invalid_input`.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|e: JsonRejection| ApiError::InvalidInput(ValidationError::invalid_payload(e.body_text())))?;
        Ok(Self(value))
    }
}

/// Raw `Authorization` header, if present and valid UTF-8.
///
/// Never rejects; the webhook operation decides what an absent header means.
pub struct AuthorizationHeader(pub Option<String>);

impl AuthorizationHeader {
    pub fn as_deref(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for AuthorizationHeader
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(str::to_owned);
        Ok(Self(value))
    }
}
