use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;

/// `(is_admin, is_banned)` as currently stored; token claims can be stale.
pub async fn account_flags(db: &PgPool, user_id: Uuid) -> Result<(bool, bool), AppError> {
    sqlx::query_as::<_, (bool, bool)>("SELECT is_admin, is_banned FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".into()))
}

/// Whether the stored account currently holds admin rights.
pub async fn is_admin(db: &PgPool, user_id: Uuid) -> Result<bool, AppError> {
    let (admin, banned) = account_flags(db, user_id).await?;
    Ok(admin && !banned)
}

fn current_user(req: &Request) -> Result<AuthUser, AppError> {
    req.extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
}

/// Middleware: refuses requests from banned accounts. Anonymous requests
/// pass through untouched.
pub async fn reject_banned(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Ok(user) = current_user(&req) {
        let (_, banned) = account_flags(&state.db, user.id).await?;
        if banned {
            return Err(AppError::Forbidden("Account suspended".into()));
        }
    }
    Ok(next.run(req).await)
}

/// Middleware: requires the admin flag on the stored account.
pub async fn require_admin(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = current_user(&req)?;
    let (is_admin, banned) = account_flags(&state.db, user.id).await?;
    if !is_admin || banned {
        return Err(AppError::Forbidden("Requires admin role".into()));
    }
    req.extensions_mut().insert(AuthUser {
        id: user.id,
        role: Some("admin".to_string()),
    });

    Ok(next.run(req).await)
}
