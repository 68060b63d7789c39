//! Fehlertypen fuer den Auth-Service

use thiserror::Error;

/// Alle moeglichen Fehler im Auth-Service
#[derive(Debug, Error)]
pub enum AuthError {
    // --- Passwort ---
    #[error("Passwort-Hashing fehlgeschlagen: {0}")]
    PasswortHashing(String),

    // --- Authentifizierung ---
    #[error("CID oder Passwort falsch")]
    UngueltigeAnmeldedaten,

    // --- Benutzerverwaltung ---
    #[error("CID bereits vergeben: {0}")]
    CidVergeben(String),

    // --- Datenbank ---
    #[error("Datenbankfehler: {0}")]
    Datenbank(#[from] fsd_db::DbError),
}

impl AuthError {
    /// Fehler die auf falsche Eingaben des Clients zurueckgehen
    pub fn ist_anmeldefehler(&self) -> bool {
        matches!(self, Self::UngueltigeAnmeldedaten)
    }
}

/// Result-Alias fuer den Auth-Service
pub type AuthResult<T> = Result<T, AuthError>;
