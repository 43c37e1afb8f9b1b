use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::user::EmailVerification;

pub fn mint_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn check_usable(v: &EmailVerification, now: DateTime<Utc>) -> AppResult<()> {
    if v.used {
        return Err(AppError::BadRequest("Verification link already used".into()));
    }
    if v.expires_at <= now {
        return Err(AppError::BadRequest("Verification link expired".into()));
    }
    Ok(())
}

/// Stores a fresh token for `user_id` and returns it. Older unused tokens
/// for the same user stay valid until they expire.
pub async fn create(
    db: &PgPool,
    user_id: Uuid,
    email: &str,
    expiry_secs: i64,
) -> AppResult<String> {
    let token = mint_token();
    sqlx::query(
        "INSERT INTO email_verifications (token, user_id, email, expires_at, used) VALUES ($1, $2, $3, $4, false)",
    )
    .bind(&token)
    .bind(user_id)
    .bind(email)
    .bind(Utc::now() + Duration::seconds(expiry_secs))
    .execute(db)
    .await?;
    Ok(token)
}

/// Consumes `token` and marks its user verified.
pub async fn verify(db: &PgPool, token: &str) -> AppResult<Uuid> {
    let mut tx = db.begin().await?;
    let v: EmailVerification =
        sqlx::query_as("SELECT * FROM email_verifications WHERE token = $1 FOR UPDATE")
            .bind(token)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Verification link not found".into()))?;

    check_usable(&v, Utc::now())?;

    sqlx::query("UPDATE email_verifications SET used = true WHERE token = $1")
        .bind(token)
        .execute(&mut *tx)
        .await?;
    // Only verify the address the token was minted for.
    sqlx::query("UPDATE users SET email_verified = true WHERE id = $1 AND email = $2")
        .bind(v.user_id)
        .bind(&v.email)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    tracing::info!(user_id = %v.user_id, "Email verified");
    Ok(v.user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verification(used: bool, expires_in: i64) -> EmailVerification {
        EmailVerification {
            token: "t".into(),
            user_id: Uuid::nil(),
            email: "a@b.co".into(),
            expires_at: Utc::now() + Duration::seconds(expires_in),
            used,
        }
    }

    #[test]
    fn tokens_are_url_safe_and_unique() {
        let a = mint_token();
        let b = mint_token();
        assert_ne!(a, b);
        assert_eq!(a.len(), 43);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn used_or_expired_tokens_are_refused() {
        let now = Utc::now();
        assert!(check_usable(&verification(false, 60), now).is_ok());
        assert!(check_usable(&verification(true, 60), now).is_err());
        assert!(check_usable(&verification(false, -60), now).is_err());
    }
}
