use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Connection settings of the backing store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_max_conns")]
    pub max_conns: u32,
    #[serde(default = "default_acquire_timeout_sec")]
    pub acquire_timeout_sec: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_conns: default_max_conns(),
            acquire_timeout_sec: default_acquire_timeout_sec(),
        }
    }
}

impl DatabaseConfig {
    pub fn in_memory() -> Self {
        Self {
            url: default_url(),
            ..Default::default()
        }
    }

    /// Every pooled connection to an in-memory SQLite database sees its own database.
    pub fn is_in_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

fn default_url() -> String {
    "sqlite::memory:".to_string()
}

fn default_max_conns() -> u32 {
    5
}

fn default_acquire_timeout_sec() -> u64 {
    30
}

/// Open a pooled connection.
///
/// In-memory databases are pinned to a single long-lived connection, otherwise the
/// schema would vanish when the pool recycles it.
pub async fn connect(cfg: &DatabaseConfig) -> Result<DatabaseConnection, DbErr> {
    let mut opts = ConnectOptions::new(cfg.url.clone());
    opts.acquire_timeout(Duration::from_secs(cfg.acquire_timeout_sec))
        .sqlx_logging(false);

    if cfg.is_in_memory() {
        let forever = Duration::from_secs(60 * 60 * 24 * 365);
        opts.max_connections(1)
            .min_connections(1)
            .idle_timeout(forever)
            .max_lifetime(forever);
    } else {
        opts.max_connections(cfg.max_conns);
    }

    let db = Database::connect(opts).await?;
    info!(
        backend = ?db.get_database_backend(),
        in_memory = cfg.is_in_memory(),
        "database connected"
    );
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_in_memory_urls() {
        assert!(DatabaseConfig::in_memory().is_in_memory());
        assert!(DatabaseConfig {
            url: "sqlite:file:demo?mode=memory&cache=shared".into(),
            ..Default::default()
        }
        .is_in_memory());
        assert!(!DatabaseConfig {
            url: "sqlite://data/app.db?mode=rwc".into(),
            ..Default::default()
        }
        .is_in_memory());
    }

    #[tokio::test]
    async fn connects_to_in_memory_sqlite() {
        let db = connect(&DatabaseConfig::in_memory()).await.unwrap();
        assert_eq!(db.get_database_backend(), sea_orm::DbBackend::Sqlite);
    }
}
