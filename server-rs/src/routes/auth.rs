use axum::{extract::State, Json};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::db;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::{generate_tokens, verify_token, AuthUser, REFRESH};
use crate::models::user::*;
use crate::services::mailer::EmailTemplate;
use crate::services::verification;
use crate::services::wizard::{RegisterWizard, Wizard};
use crate::AppState;

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn auth_response(state: &AppState, user: &User) -> AppResult<Json<Value>> {
    let (token, refresh_token) = generate_tokens(user.id, user.role(), &state.config.jwt)?;
    Ok(Json(json!({
        "token": token,
        "refreshToken": refresh_token,
        "user": UserPrivate::from(user),
    })))
}

/// Mints a verification token and queues the link.
async fn send_verification(state: &AppState, user: &User) -> AppResult<()> {
    let token = verification::create(
        &state.db,
        user.id,
        &user.email,
        state.config.mail.verification_expiry_secs,
    )
    .await?;
    state.notifier.queue_email(
        user.email.clone(),
        EmailTemplate::Verification {
            name: user.display_name.clone(),
            link: state.config.verification_link(&token),
        },
    );
    Ok(())
}

pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> AppResult<Json<Value>> {
    RegisterWizard { draft: &body }.validate()?;

    let email = normalize_email(&body.email);
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.db)
        .await?;
    if exists {
        return Err(AppError::Conflict("Email already registered".into()));
    }

    let password_hash =
        bcrypt::hash(&body.password, 12).map_err(|e| AppError::Internal(e.to_string()))?;

    let mut tx = state.db.begin().await?;
    let user: User = sqlx::query_as(
        r#"INSERT INTO users (id, email, password_hash, display_name, photo_url, phone, level, sports, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, NOW())
        RETURNING *"#,
    )
    .bind(Uuid::new_v4())
    .bind(&email)
    .bind(&password_hash)
    .bind(body.display_name.trim())
    .bind(&body.photo_url)
    .bind(&body.phone)
    .bind(body.level.as_deref().unwrap_or("beginner"))
    .bind(&body.sports)
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        if db::is_unique_violation(&e) {
            AppError::Conflict("Email already registered".into())
        } else {
            e.into()
        }
    })?;
    sqlx::query("INSERT INTO friend_lists (user_id, friend_ids) VALUES ($1, '{}')")
        .bind(user.id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, "User registered");

    if let Err(e) = send_verification(&state, &user).await {
        tracing::warn!(user_id = %user.id, "Failed to issue verification email: {e}");
    }
    state.notifier.email(
        user.email.clone(),
        EmailTemplate::Welcome {
            name: user.display_name.clone(),
        },
    );
    if let Some(list) = state.mailing_list.clone() {
        let (email, name) = (user.email.clone(), user.display_name.clone());
        tokio::spawn(async move {
            if let Err(e) = list.subscribe(&email, &name).await {
                tracing::warn!("Mailing list subscribe failed: {e}");
            }
        });
    }

    auth_response(&state, &user)
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> AppResult<Json<Value>> {
    let user: User = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(normalize_email(&body.email))
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;

    let hash = user
        .password_hash
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))?;
    let valid = bcrypt::verify(&body.password, hash).map_err(|e| AppError::Internal(e.to_string()))?;
    if !valid {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }
    if user.is_banned {
        return Err(AppError::Forbidden("Account suspended".into()));
    }

    sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
        .bind(user.id)
        .execute(&state.db)
        .await?;

    auth_response(&state, &user)
}

pub async fn refresh(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> AppResult<Json<Value>> {
    let refresh_token = body["refreshToken"]
        .as_str()
        .ok_or_else(|| AppError::BadRequest("refreshToken required".into()))?;

    let claims = verify_token(refresh_token, &state.config.jwt.secret)?;
    if claims.token_type.as_deref() != Some(REFRESH) {
        return Err(AppError::Unauthorized("Refresh token required".into()));
    }
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| AppError::Unauthorized("Invalid token subject".into()))?;

    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Account no longer exists".into()))?;
    if user.is_banned {
        return Err(AppError::Forbidden("Account suspended".into()));
    }

    let (token, refresh_token) = generate_tokens(user.id, user.role(), &state.config.jwt)?;
    Ok(Json(json!({
        "token": token,
        "refreshToken": refresh_token,
    })))
}

pub async fn verify_email(
    State(state): State<AppState>,
    Json(body): Json<VerifyEmailRequest>,
) -> AppResult<Json<Value>> {
    let user_id = verification::verify(&state.db, body.token.trim()).await?;
    tracing::info!(user_id = %user_id, "Email verified");
    Ok(Json(json!({ "verified": true })))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<Value>> {
    let user: User = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user.id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    if user.email_verified {
        return Err(AppError::BadRequest("Email already verified".into()));
    }

    send_verification(&state, &user).await?;
    Ok(Json(json!({ "sent": true })))
}
