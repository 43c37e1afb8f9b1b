use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};

use crate::config::Config;

/// Read-through cache in front of Postgres. With no Redis connection every
/// lookup misses and writes are dropped.
#[derive(Clone)]
pub struct Cache {
    conn: Option<ConnectionManager>,
    prefix: String,
}

impl Cache {
    pub async fn new(config: &Config) -> Self {
        let conn = match Client::open(config.redis_url()) {
            Ok(client) => match ConnectionManager::new(client).await {
                Ok(conn) => Some(conn),
                Err(e) => {
                    tracing::warn!("Redis unavailable, running without cache: {e}");
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Invalid Redis URL, running without cache: {e}");
                None
            }
        };
        Self {
            conn,
            prefix: config.redis.key_prefix.clone(),
        }
    }

    pub fn disabled() -> Self {
        Self {
            conn: None,
            prefix: String::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.conn.is_some()
    }

    fn key(&self, k: &str) -> String {
        format!("{}{}", self.prefix, k)
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.conn.clone()?;
        let value: redis::RedisResult<Option<String>> = conn.get(self.key(key)).await;
        value.ok().flatten()
    }

    pub async fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get(key)
            .await
            .and_then(|s| serde_json::from_str(&s).ok())
    }

    pub async fn set(&self, key: &str, value: &str, ttl_secs: u64) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let k = self.key(key);
        let result: Result<(), _> = if ttl_secs > 0 {
            conn.set_ex(&k, value, ttl_secs).await
        } else {
            conn.set(&k, value).await
        };
        if let Err(e) = result {
            tracing::debug!("Cache write failed for {k}: {e}");
        }
    }

    pub async fn set_json<T: serde::Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        if let Ok(json) = serde_json::to_string(value) {
            self.set(key, &json, ttl_secs).await;
        }
    }

    pub async fn del(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let _: Result<(), _> = conn.del(self.key(key)).await;
    }

    pub async fn health_check(&self) -> bool {
        let Some(mut conn) = self.conn.clone() else {
            return false;
        };
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .is_ok()
    }
}

pub fn event_key(event_id: &uuid::Uuid) -> String {
    format!("event:{}", event_id)
}

pub const VENUES_KEY: &str = "venues:all";

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_cache_misses_and_ignores_writes() {
        let cache = Cache::disabled();
        assert!(!cache.is_enabled());
        cache.set("k", "v", 10).await;
        assert_eq!(cache.get("k").await, None);
        assert!(!cache.health_check().await);
    }
}
