//! fsd-auth – Anmeldung fuer den FSD-Server
//!
//! Dieses Crate implementiert:
//! - Passwort-Hashing mit Argon2id
//! - AuthService (Konto anlegen, Anmeldung per CID und Passwort)

pub mod error;
pub mod password;
pub mod service;

// Bequeme Re-Exporte
pub use error::{AuthError, AuthResult};
pub use password::{passwort_hashen, passwort_verifizieren, PasswortParameter};
pub use service::AuthService;
