//! SQLite-Pool des FSD-Servers
//!
//! Dateibasierte Datenbanken laufen im WAL-Modus mit Busy-Timeout, weil
//! viele Sessions gleichzeitig Historie und Flugplaene schreiben.
//! `sqlite::memory:` bekommt genau eine Verbindung, die nie recycelt wird.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::error::DbError;
use crate::repository::DatabaseConfig;

/// Wartezeit auf eine gesperrte Datenbank bevor SQLite `SQLITE_BUSY` meldet
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Implementiert alle Repository-Traits auf einem SQLite-Pool
#[derive(Debug, Clone)]
pub struct SqliteDb {
    pub(crate) pool: SqlitePool,
}

impl SqliteDb {
    /// Oeffnet die Datenbank aus der Konfiguration und migriert sie
    pub async fn oeffnen(config: &DatabaseConfig) -> Result<Self, DbError> {
        if ist_in_memory(&config.url) {
            return Self::in_memory().await;
        }

        let journal = if config.sqlite_wal {
            SqliteJournalMode::Wal
        } else {
            SqliteJournalMode::Delete
        };
        let opts = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .journal_mode(journal)
            .busy_timeout(BUSY_TIMEOUT)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_verbindungen.max(1))
            .connect_with(opts)
            .await?;

        info!(url = %config.url, wal = config.sqlite_wal, "SQLite-Pool geoeffnet");
        Self::migriert(pool).await
    }

    /// Fluechtige Datenbank (Tests, `sqlite::memory:`)
    pub async fn in_memory() -> Result<Self, DbError> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        // Mit der letzten Verbindung verschwindet auch der Inhalt
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        Self::migriert(pool).await
    }

    async fn migriert(pool: SqlitePool) -> Result<Self, DbError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!("Migrationen angewendet");
        Ok(Self { pool })
    }

    /// `SELECT 1` gegen den Pool, fuer den Health-Check
    pub async fn erreichbar(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }

    /// Wartet auf laufende Abfragen und schliesst den Pool
    pub async fn schliessen(&self) {
        self.pool.close().await;
        info!("SQLite-Pool geschlossen");
    }
}

fn ist_in_memory(url: &str) -> bool {
    url == "sqlite::memory:" || url.contains("mode=memory")
}
