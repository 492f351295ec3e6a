use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use tally_core::OwnerId;

use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

/// Verifies access tokens issued by the hosted auth provider (HS256, shared secret).
pub struct Authenticator {
    key: DecodingKey,
    validation: Validation,
}

impl Authenticator {
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        match audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<OwnerId, ApiError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::warn!("Rejected access token: {e}");
            ApiError::unauthorized()
        })?;

        if data.claims.sub.trim().is_empty() {
            return Err(ApiError::unauthorized());
        }
        Ok(OwnerId(data.claims.sub))
    }
}

/// The verified caller. Extracted from request parts, so it is resolved
/// before any body is read.
#[derive(Debug, Clone)]
pub struct Owner(pub OwnerId);

impl FromRequestParts<AppState> for Owner {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                tracing::warn!("Request without Authorization header");
                ApiError::unauthorized()
            })?;

        let token = header
            .strip_prefix("Bearer ")
            .or_else(|| header.strip_prefix("bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(ApiError::unauthorized)?;

        state.auth.verify(token).map(Owner)
    }
}
