//! Repository-Trait-Definitionen
//!
//! Das Repository-Pattern entkoppelt die Engine von der konkreten
//! Datenbank-Implementierung. Die Engine haelt die Repositories als
//! `Arc<dyn ...>`, Tests koennen eigene Implementierungen einsetzen.

use async_trait::async_trait;
use fsd_core::types::Flugplan;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{BenutzerRecord, FlugplanRecord, HistoryRecord, NeueHistory, NeuerBenutzer};

/// Result-Alias fuer alle Repository-Operationen
pub type DbResult<T> = Result<T, DbError>;

/// Konfiguration fuer die Datenbankverbindung
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Verbindungs-URL (z.B. "sqlite://fsd.db")
    pub url: String,
    /// Maximale Anzahl gleichzeitiger Verbindungen im Pool
    pub max_verbindungen: u32,
    /// Ob WAL-Modus aktiviert werden soll
    pub sqlite_wal: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://fsd.db".into(),
            max_verbindungen: 5,
            sqlite_wal: true,
        }
    }
}

/// Benutzerkonten
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Konto anhand der CID laden
    async fn get_by_cid(&self, cid: &str) -> DbResult<Option<BenutzerRecord>>;

    /// Neues Konto anlegen
    async fn create(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord>;

    /// Online-Zeit eines Kontos erhoehen (getrennt nach Pilot und ATC)
    async fn online_zeit_addieren(&self, cid: &str, is_atc: bool, sekunden: i64) -> DbResult<()>;

    /// Zeitpunkt der letzten Anmeldung setzen
    async fn update_last_login(&self, cid: &str) -> DbResult<()>;
}

/// Flugplaene, einer pro Konto
#[async_trait]
pub trait FlightPlanRepository: Send + Sync {
    /// Flugplan anlegen oder ersetzen
    async fn upsert(
        &self,
        cid: &str,
        callsign: &str,
        plan: &Flugplan,
        locked: bool,
    ) -> DbResult<FlugplanRecord>;

    async fn get_by_cid(&self, cid: &str) -> DbResult<Option<FlugplanRecord>>;

    /// Bestehenden Flugplan aendern, `NichtGefunden` wenn keiner existiert
    async fn update(&self, cid: &str, plan: &Flugplan, locked: bool) -> DbResult<FlugplanRecord>;
}

/// Verbindungshistorie
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Eintrag beim Login eroeffnen
    async fn create(&self, data: NeueHistory<'_>) -> DbResult<HistoryRecord>;

    /// Eintrag beim endgueltigen Entfernen abschliessen
    async fn beenden(&self, id: Uuid, online_sekunden: i64) -> DbResult<bool>;

    async fn get(&self, id: Uuid) -> DbResult<Option<HistoryRecord>>;
}
