use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

fn pool_options(config: &Config) -> PgPoolOptions {
    PgPoolOptions::new()
        .min_connections(config.db.pool_min)
        .max_connections(config.db.pool_max)
        .acquire_timeout(Duration::from_secs(10))
}

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    pool_options(config).connect(&config.database_url()).await
}

/// Pool that opens connections on first use.
pub fn create_lazy_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    pool_options(config)
        .min_connections(0)
        .connect_lazy(&config.database_url())
}

pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// True when the insert lost a race against a unique constraint.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map_or(false, |db| db.is_unique_violation())
}

/// `%q%` for ILIKE with the pattern metacharacters in `q` escaped.
pub fn contains_pattern(q: &str) -> String {
    let mut pattern = String::with_capacity(q.len() + 2);
    pattern.push('%');
    for c in q.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_input_is_matched_literally() {
        assert_eq!(contains_pattern("ana"), "%ana%");
        assert_eq!(contains_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(contains_pattern(r"a\b"), r"%a\\b%");
    }
}
