//! Datenbankmodelle fuer den FSD-Server
//!
//! Diese Typen repraesentieren Datensaetze aus der Datenbank.
//! Sie sind von den Engine-Typen getrennt und dienen als reine Datenuebertragungsobjekte.

use chrono::{DateTime, Utc};
use fsd_core::types::Flugplan;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Benutzer
// ---------------------------------------------------------------------------

/// Benutzer-Datensatz aus der Datenbank
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenutzerRecord {
    pub id: Uuid,
    pub cid: String,
    pub real_name: String,
    pub password_hash: String,
    /// Rating als Zahl (-1 = gebannt bis 12)
    pub rating: i32,
    pub pilot_sekunden: i64,
    pub atc_sekunden: i64,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Daten zum Erstellen eines neuen Benutzers
#[derive(Debug, Clone)]
pub struct NeuerBenutzer<'a> {
    pub cid: &'a str,
    pub real_name: &'a str,
    pub password_hash: &'a str,
    pub rating: i32,
}

// ---------------------------------------------------------------------------
// Flugplaene
// ---------------------------------------------------------------------------

/// Gespeicherter Flugplan eines Kontos
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlugplanRecord {
    pub id: Uuid,
    pub cid: String,
    pub callsign: String,
    pub plan: Flugplan,
    pub locked: bool,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Historie
// ---------------------------------------------------------------------------

/// Eine Verbindung eines Kontos unter einem Callsign
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: Uuid,
    pub cid: String,
    pub callsign: String,
    pub is_atc: bool,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub online_sekunden: i64,
}

/// Daten zum Eroeffnen eines Historien-Eintrags
#[derive(Debug, Clone)]
pub struct NeueHistory<'a> {
    pub cid: &'a str,
    pub callsign: &'a str,
    pub is_atc: bool,
}
