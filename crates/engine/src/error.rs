//! Fehlertypen der Engine

use fsd_auth::AuthError;
use fsd_db::DbError;
use thiserror::Error;

/// Fehlertyp fuer Registry, Sessions und Server
#[derive(Debug, Error)]
pub enum EngineError {
    /// Unter dem Callsign ist bereits ein lebender Client registriert
    #[error("Callsign bereits registriert: {0}")]
    AlreadyRegistered(String),

    /// Kein erreichbarer Client unter diesem Callsign
    #[error("Callsign nicht gefunden: {0}")]
    CallsignNotFound(String),

    /// Der Client hat keine aktive Verbindung
    #[error("Client getrennt")]
    ClientGetrennt,

    #[error("Herunterfahren laeuft bereits")]
    ShutdownInProgress,

    #[error("Zeitlimit ueberschritten")]
    Timeout,

    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    #[error("Datenbankfehler: {0}")]
    Db(#[from] DbError),

    #[error("Authentifizierungsfehler: {0}")]
    Auth(#[from] AuthError),

    #[error("Interner Fehler: {0}")]
    Intern(String),
}

impl EngineError {
    pub fn intern(msg: impl Into<String>) -> Self {
        Self::Intern(msg.into())
    }
}

/// Result-Typ der Engine
pub type EngineResult<T> = Result<T, EngineError>;
