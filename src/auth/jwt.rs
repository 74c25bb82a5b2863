//! HS256 access/refresh tokens and the `AuthUser` extractor.

use anyhow::Context;
use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts},
};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    auth::dto::{Claims, TokenKind},
    config::JwtConfig,
    error::AppError,
    state::AppState,
};

#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    issuer: String,
    audience: String,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from_config(&state.config.jwt)
    }
}

impl JwtKeys {
    pub fn from_config(cfg: &JwtConfig) -> Self {
        let secret = cfg.secret.as_bytes();
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[cfg.issuer.as_str()]);
        validation.set_audience(&[cfg.audience.as_str()]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: Duration::minutes(cfg.ttl_minutes.max(0)),
            refresh_ttl: Duration::minutes(cfg.refresh_ttl_minutes.max(0)),
        }
    }

    fn ttl(&self, kind: TokenKind) -> Duration {
        match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        }
    }

    pub fn issue(&self, user_id: Uuid, kind: TokenKind) -> anyhow::Result<String> {
        let issued_at = OffsetDateTime::now_utc();
        let claims = Claims {
            sub: user_id,
            iat: issued_at.unix_timestamp() as usize,
            exp: (issued_at + self.ttl(kind)).unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            kind,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("sign token")?;
        debug!(%user_id, ?kind, "token issued");
        Ok(token)
    }

    /// Checks signature, expiry, issuer and audience, then the token kind.
    pub fn decode_as(&self, token: &str, expected: TokenKind) -> anyhow::Result<Claims> {
        let claims = decode::<Claims>(token, &self.decoding, &self.validation)
            .context("invalid token")?
            .claims;
        anyhow::ensure!(
            claims.kind == expected,
            "expected {expected:?} token, got {:?}",
            claims.kind
        );
        Ok(claims)
    }
}

/// Owner of the request, taken from a verified access token.
pub struct AuthUser(pub Uuid);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

        let claims = JwtKeys::from_ref(state)
            .decode_as(token, TokenKind::Access)
            .map_err(|e| {
                warn!(error = %e, "access token rejected");
                AppError::Unauthorized("Invalid or expired token".into())
            })?;
        Ok(AuthUser(claims.sub))
    }
}
