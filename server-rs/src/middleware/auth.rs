use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::JwtConfig;
use crate::error::{AppError, AppResult};
use crate::AppState;

pub const ACCESS: &str = "access";
pub const REFRESH: &str = "refresh";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user id
    pub role: Option<String>,
    #[serde(rename = "type")]
    pub token_type: Option<String>,
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub role: Option<String>,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}

/// Handlers take `AuthUser` directly; it is present once `authenticate` or
/// `optional_auth` accepted a token.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

fn sign(user_id: Uuid, role: Option<&str>, kind: &str, ttl: i64, secret: &str) -> AppResult<String> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        role: role.map(String::from),
        token_type: Some(kind.to_string()),
        exp: now + ttl,
        iat: now,
    };
    Ok(encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?)
}

/// Returns `(access, refresh)`.
pub fn generate_tokens(
    user_id: Uuid,
    role: Option<&str>,
    jwt: &JwtConfig,
) -> AppResult<(String, String)> {
    let access = sign(user_id, role, ACCESS, jwt.access_expiry_secs, &jwt.secret)?;
    let refresh = sign(user_id, role, REFRESH, jwt.refresh_expiry_secs, &jwt.secret)?;
    Ok((access, refresh))
}

pub fn verify_token(token: &str, secret: &str) -> AppResult<Claims> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(data.claims)
}

fn extract_bearer(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(String::from)
}

fn auth_user(claims: Claims) -> AppResult<AuthUser> {
    if claims.token_type.as_deref() == Some(REFRESH) {
        return Err(AppError::Unauthorized("Access token required".into()));
    }
    let id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;
    Ok(AuthUser {
        id,
        role: claims.role,
    })
}

/// Middleware: requires valid JWT. Sets AuthUser in extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = extract_bearer(&req)
        .ok_or_else(|| AppError::Unauthorized("No token provided".into()))?;

    let claims = verify_token(&token, &state.config.jwt.secret)?;
    let user = auth_user(claims)?;
    req.extensions_mut().insert(user);

    Ok(next.run(req).await)
}

/// Middleware: sets AuthUser when a valid access token is present.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = extract_bearer(&req) {
        if let Ok(user) = verify_token(&token, &state.config.jwt.secret).and_then(auth_user) {
            req.extensions_mut().insert(user);
        }
    }
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jwt() -> JwtConfig {
        JwtConfig {
            secret: "test-secret".into(),
            access_expiry_secs: 3600,
            refresh_expiry_secs: 86_400,
        }
    }

    #[test]
    fn access_token_round_trip() {
        let id = Uuid::new_v4();
        let (access, refresh) = generate_tokens(id, Some("admin"), &jwt()).unwrap();

        let user = auth_user(verify_token(&access, "test-secret").unwrap()).unwrap();
        assert_eq!(user.id, id);
        assert!(user.is_admin());

        let claims = verify_token(&refresh, "test-secret").unwrap();
        assert_eq!(claims.token_type.as_deref(), Some(REFRESH));
        assert!(auth_user(claims).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let (access, _) = generate_tokens(Uuid::new_v4(), None, &jwt()).unwrap();
        assert!(verify_token(&access, "other-secret").is_err());
    }
}
