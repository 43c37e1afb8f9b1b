use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

use crate::AppState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Check {
    Up,
    Down,
    /// Redis was unreachable at startup and the cache runs as a no-op.
    Disabled,
}

/// Postgres is required to serve anything; the cache is not.
fn overall(postgres: Check, redis: Check) -> (StatusCode, &'static str) {
    match (postgres, redis) {
        (Check::Up, Check::Up) => (StatusCode::OK, "healthy"),
        (Check::Up, _) => (StatusCode::OK, "degraded"),
        _ => (StatusCode::SERVICE_UNAVAILABLE, "degraded"),
    }
}

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let postgres = match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => Check::Up,
        Err(e) => {
            tracing::warn!("Health check failed for Postgres: {e}");
            Check::Down
        }
    };
    let redis = if !state.cache.is_enabled() {
        Check::Disabled
    } else if state.cache.health_check().await {
        Check::Up
    } else {
        Check::Down
    };

    let (code, status) = overall(postgres, redis);
    (
        code,
        Json(json!({
            "status": status,
            "postgres": postgres,
            "redis": redis,
            "version": env!("CARGO_PKG_VERSION"),
            "timestamp": chrono::Utc::now(),
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_outage_degrades_but_keeps_serving() {
        assert_eq!(overall(Check::Up, Check::Up), (StatusCode::OK, "healthy"));
        assert_eq!(overall(Check::Up, Check::Disabled), (StatusCode::OK, "degraded"));
        assert_eq!(overall(Check::Up, Check::Down), (StatusCode::OK, "degraded"));
    }

    #[test]
    fn database_outage_is_unavailable() {
        assert_eq!(
            overall(Check::Down, Check::Up),
            (StatusCode::SERVICE_UNAVAILABLE, "degraded")
        );
    }
}
