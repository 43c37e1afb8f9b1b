use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::AppState;

#[derive(Clone)]
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, WindowEntry>>>,
    max_requests: u32,
    window_secs: u64,
}

struct WindowEntry {
    count: u32,
    reset_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            max_requests,
            window_secs,
        }
    }

    pub async fn check(&self, key: &str) -> bool {
        self.check_at(key, now_secs()).await
    }

    async fn check_at(&self, key: &str, now: u64) -> bool {
        let mut windows = self.windows.lock().await;

        // Drop expired windows so the map does not grow without bound.
        if windows.len() > 10_000 {
            windows.retain(|_, e| e.reset_at > now);
        }

        let entry = windows.entry(key.to_string()).or_insert(WindowEntry {
            count: 0,
            reset_at: now + self.window_secs,
        });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window_secs;
        }

        entry.count += 1;
        entry.count <= self.max_requests
    }
}

fn get_client_key(req: &Request) -> String {
    // Use user ID if authenticated, otherwise IP
    if let Some(user) = req.extensions().get::<AuthUser>() {
        return format!("user:{}", user.id);
    }
    if let Some(ConnectInfo(addr)) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return format!("ip:{}", addr.ip());
    }
    req.headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map(|v| format!("ip:{}", v.split(',').next().unwrap_or("unknown").trim()))
        .unwrap_or_else(|| "ip:unknown".to_string())
}

/// Middleware: general rate limiter.
pub async fn rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("global:{}", get_client_key(&req));
    if !state.rate_limiter.check(&key).await {
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}

/// Middleware: stricter limit for joins, leaves and anything that sends email.
pub async fn mutation_rate_limit(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let key = format!("mutation:{}", get_client_key(&req));
    if !state.mutation_rate_limiter.check(&key).await {
        return Err(AppError::RateLimited);
    }
    Ok(next.run(req).await)
}
