//! Fehler der Persistenzschicht

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    /// Konto oder Flugplan existiert nicht
    #[error("Nicht vorhanden: {0}")]
    NichtGefunden(String),

    /// CID bereits vergeben
    #[error("Bereits vorhanden: {0}")]
    Eindeutigkeit(String),

    #[error("SQLite: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Migration fehlgeschlagen: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Gespeicherter Flugplan nicht lesbar
    #[error("Flugplan-JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Inkonsistente Daten: {0}")]
    Intern(String),
}

impl DbError {
    pub fn nicht_gefunden(was: impl Into<String>) -> Self {
        Self::NichtGefunden(was.into())
    }

    pub fn intern(was: impl Into<String>) -> Self {
        Self::Intern(was.into())
    }

    /// UNIQUE-Verletzung, egal ob vorab erkannt oder von SQLite gemeldet
    pub fn ist_eindeutigkeit(&self) -> bool {
        match self {
            Self::Eindeutigkeit(_) => true,
            Self::Sqlx(e) => e
                .as_database_error()
                .is_some_and(|d| d.is_unique_violation()),
            _ => false,
        }
    }
}
