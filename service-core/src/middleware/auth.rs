//! Bearer token authentication.
//!
//! Tokens are HS256 JWTs signed with a secret shared with the issuer. The
//! audience and issuer claims are checked when configured; expiry is always
//! enforced.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;

/// Settings for bearer token validation.
#[derive(Debug, Clone)]
pub struct BearerAuthConfig {
    pub secret: Secret<String>,
    pub audience: Option<String>,
    pub issuer: Option<String>,
}

/// Claims carried by an accepted token, stored in request extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClaims {
    /// Subject (client or user ID), when the issuer sets one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtValidator {
    decoding_key: Arc<DecodingKey>,
    validation: Arc<Validation>,
}

impl JwtValidator {
    pub fn new(config: &BearerAuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        match config.audience.as_deref().filter(|a| !a.is_empty()) {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }
        if let Some(issuer) = config.issuer.as_deref().filter(|i| !i.is_empty()) {
            validation.set_issuer(&[issuer]);
        }

        Self {
            decoding_key: Arc::new(DecodingKey::from_secret(
                config.secret.expose_secret().as_bytes(),
            )),
            validation: Arc::new(validation),
        }
    }

    pub fn validate(&self, token: &str) -> Result<ApiClaims, AppError> {
        decode::<ApiClaims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(anyhow::anyhow!("Invalid token: {}", e)))
    }
}

/// Reject requests without a valid `Authorization: Bearer <token>` header.
pub async fn require_bearer_token(
    State(validator): State<JwtValidator>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| {
            AppError::Unauthorized(anyhow::anyhow!("Missing or invalid Authorization header"))
        })?;

    let claims = validator.validate(token).map_err(|e| {
        tracing::warn!(error = %e, "Rejected bearer token");
        e
    })?;

    if let Some(subject) = claims.sub.as_deref() {
        tracing::Span::current().record("subject", subject);
    }
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}
