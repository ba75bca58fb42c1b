//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs. The `sub` claim identifies the principal and the
//! `name` claim carries its display name; the user row is created on first
//! sight. Roles are never read from the token: ownership is derived from the
//! group on every call.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::{ServerError, server::ServerState};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub name: String,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: Option<String>,
    pub leeway_secs: u64,
}

impl AuthConfig {
    fn validation(&self) -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = self.leeway_secs;
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }
        validation
    }

    pub fn verify(&self, token: &str) -> Result<Claims, ServerError> {
        let key = DecodingKey::from_secret(self.jwt_secret.as_bytes());
        jsonwebtoken::decode::<Claims>(token, &key, &self.validation())
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::debug!("rejected bearer token: {err}");
                ServerError::Unauthorized("invalid bearer token".to_string())
            })
    }
}

/// Signs a token for `subject`, valid for `ttl`.
pub fn mint_token(
    config: &AuthConfig,
    subject: &str,
    name: &str,
    ttl: Duration,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: subject.to_string(),
        name: name.to_string(),
        exp: (Utc::now() + ttl).timestamp(),
        iss: config.issuer.clone(),
    };
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

pub(crate) async fn auth(
    State(state): State<ServerState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let Some(header) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return Err(ServerError::Unauthorized(
            "missing bearer token".to_string(),
        ));
    };
    let claims = state.auth.verify(header.token())?;

    let user = state
        .engine
        .resolve_user(&claims.sub, &claims.name)
        .await
        .map_err(|err| match err {
            err if err.is_internal() => ServerError::Engine(err),
            _ => ServerError::Unauthorized("invalid token subject".to_string()),
        })?;

    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}
