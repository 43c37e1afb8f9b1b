use std::env;

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub app_env: String,
    pub cors_origins: Vec<String>,
    pub db: DbConfig,
    pub redis: RedisConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub mail: MailConfig,
    pub mailing_list: MailingListConfig,
    pub geocoding: GeocodingConfig,
    pub links: AppLinksConfig,
}

#[derive(Clone, Debug)]
pub struct DbConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub pool_min: u32,
    pub pool_max: u32,
}

#[derive(Clone, Debug)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub password: Option<String>,
    pub db: u8,
    pub key_prefix: String,
    pub event_ttl_secs: u64,
    pub venue_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub secret: String,
    pub access_expiry_secs: i64,
    pub refresh_expiry_secs: i64,
}

#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
    pub mutation_max: u32,
}

#[derive(Clone, Debug)]
pub struct MailConfig {
    /// Base URL of the email API; empty disables direct sends.
    pub api_url: String,
    pub from_address: String,
    pub verification_expiry_secs: i64,
}

#[derive(Clone, Debug)]
pub struct MailingListConfig {
    pub api_url: String,
    pub api_key: String,
    pub welcome_group: String,
}

#[derive(Clone, Debug)]
pub struct GeocodingConfig {
    pub api_url: String,
    pub user_agent: String,
    pub result_limit: u32,
}

#[derive(Clone, Debug)]
pub struct AppLinksConfig {
    pub public_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            port: env_or_parse("PORT", 3000),
            app_env: env_or("APP_ENV", "development"),
            cors_origins: env_or("CORS_ORIGINS", "http://localhost:5173,http://localhost:3000")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            db: DbConfig {
                host: env_or("DB_HOST", "localhost"),
                port: env_or_parse("DB_PORT", 5432),
                database: env_or("DB_NAME", "webpadel"),
                user: env_or("DB_USER", "webpadel"),
                password: env_or("DB_PASSWORD", ""),
                pool_min: env_or_parse("DB_POOL_MIN", 2),
                pool_max: env_or_parse("DB_POOL_MAX", 20),
            },
            redis: RedisConfig {
                host: env_or("REDIS_HOST", "localhost"),
                port: env_or_parse("REDIS_PORT", 6379),
                password: env::var("REDIS_PASSWORD").ok().filter(|s| !s.is_empty()),
                db: env_or_parse("REDIS_DB", 0),
                key_prefix: "webpadel:".to_string(),
                event_ttl_secs: env_or_parse("CACHE_EVENT_TTL", 60),
                venue_ttl_secs: env_or_parse("CACHE_VENUE_TTL", 3600),
            },
            jwt: JwtConfig {
                secret: env_or("JWT_SECRET", "change-me-to-a-secure-random-string"),
                access_expiry_secs: parse_duration_to_secs(&env_or("JWT_ACCESS_EXPIRY", "1h")),
                refresh_expiry_secs: parse_duration_to_secs(&env_or("JWT_REFRESH_EXPIRY", "30d")),
            },
            rate_limit: RateLimitConfig {
                window_secs: 60,
                max_requests: env_or_parse("RATE_LIMIT_MAX", 120),
                mutation_max: env_or_parse("RATE_LIMIT_MUTATION", 20),
            },
            mail: MailConfig {
                api_url: env_or("MAIL_API_URL", ""),
                from_address: env_or("MAIL_FROM", "WeTeamUp <no-reply@weteamup.app>"),
                verification_expiry_secs: parse_duration_to_secs(&env_or(
                    "EMAIL_VERIFICATION_EXPIRY",
                    "24h",
                )),
            },
            mailing_list: MailingListConfig {
                api_url: env_or("MAILING_LIST_API_URL", "https://connect.mailerlite.com/api"),
                api_key: env_or("MAILING_LIST_API_KEY", ""),
                welcome_group: env_or("MAILING_LIST_WELCOME_GROUP", ""),
            },
            geocoding: GeocodingConfig {
                api_url: env_or("GEOCODING_API_URL", "https://nominatim.openstreetmap.org"),
                user_agent: env_or("GEOCODING_USER_AGENT", "webpadel-api/0.1"),
                result_limit: env_or_parse("GEOCODING_LIMIT", 5),
            },
            links: AppLinksConfig {
                public_url: env_or("PUBLIC_APP_URL", "http://localhost:5173"),
            },
        }
    }

    pub fn database_url(&self) -> String {
        if let Ok(url) = env::var("DATABASE_URL") {
            return url;
        }
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db.user, self.db.password, self.db.host, self.db.port, self.db.database
        )
    }

    pub fn redis_url(&self) -> String {
        if let Ok(url) = env::var("REDIS_URL") {
            return url;
        }
        match &self.redis.password {
            Some(pw) if !pw.is_empty() => format!(
                "redis://:{}@{}:{}/{}",
                pw, self.redis.host, self.redis.port, self.redis.db
            ),
            _ => format!(
                "redis://{}:{}/{}",
                self.redis.host, self.redis.port, self.redis.db
            ),
        }
    }

    /// Link embedded in verification emails.
    pub fn verification_link(&self, token: &str) -> String {
        format!(
            "{}/verify-email?token={}",
            self.links.public_url.trim_end_matches('/'),
            token
        )
    }

    pub fn event_link(&self, event_id: &uuid::Uuid) -> String {
        format!("{}/event/{}", self.links.public_url.trim_end_matches('/'), event_id)
    }
}

fn parse_duration_to_secs(s: &str) -> i64 {
    let s = s.trim();
    if s.is_empty() {
        return 3600;
    }
    let (num_str, unit) = s.split_at(s.len() - 1);
    let num: i64 = num_str.parse().unwrap_or(1);
    match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3600,
        "d" => num * 86400,
        _ => s.parse().unwrap_or(3600),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_durations() {
        assert_eq!(parse_duration_to_secs("45s"), 45);
        assert_eq!(parse_duration_to_secs("15m"), 900);
        assert_eq!(parse_duration_to_secs("24h"), 86_400);
        assert_eq!(parse_duration_to_secs("30d"), 2_592_000);
    }

    #[test]
    fn bare_numbers_are_seconds_and_garbage_falls_back() {
        assert_eq!(parse_duration_to_secs("120"), 120);
        assert_eq!(parse_duration_to_secs(""), 3600);
        assert_eq!(parse_duration_to_secs("soon"), 3600);
    }

    #[test]
    fn links_strip_trailing_slash() {
        let mut config = Config::from_env();
        config.links.public_url = "https://weteamup.app/".to_string();
        assert_eq!(
            config.verification_link("abc"),
            "https://weteamup.app/verify-email?token=abc"
        );
        let id = uuid::Uuid::nil();
        assert_eq!(
            config.event_link(&id),
            format!("https://weteamup.app/event/{}", id)
        );
    }
}
