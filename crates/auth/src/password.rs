//! Passwort-Hashing mit Argon2id
//!
//! Gespeichert wird der PHC-String, die Parameter stehen also im Hash selbst.
//! Beim Verifizieren zaehlen die Parameter aus dem Hash, nicht die aktuellen.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2, Params, Version,
};

use crate::error::AuthError;

/// Kostenparameter fuer neue Hashes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswortParameter {
    /// Speicher in KiB
    pub speicher_kib: u32,
    pub iterationen: u32,
    pub parallelitaet: u32,
}

impl PasswortParameter {
    /// Minimale Kosten, nur fuer Tests
    pub const fn schnell() -> Self {
        Self {
            speicher_kib: 8,
            iterationen: 1,
            parallelitaet: 1,
        }
    }
}

impl Default for PasswortParameter {
    /// 64 MiB, 3 Iterationen, 1 Thread (OWASP)
    fn default() -> Self {
        Self {
            speicher_kib: 64 * 1024,
            iterationen: 3,
            parallelitaet: 1,
        }
    }
}

fn argon2_instanz(parameter: PasswortParameter) -> Result<Argon2<'static>, AuthError> {
    let params = Params::new(
        parameter.speicher_kib,
        parameter.iterationen,
        parameter.parallelitaet,
        None,
    )
    .map_err(|e| AuthError::PasswortHashing(format!("Argon2-Parameter ungueltig: {e}")))?;

    Ok(Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params))
}

/// Hasht ein Passwort mit Argon2id und einem zufaelligen Salt
pub fn passwort_hashen(passwort: &str, parameter: PasswortParameter) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);

    argon2_instanz(parameter)?
        .hash_password(passwort.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswortHashing(e.to_string()))
}

/// Verifiziert ein Passwort gegen einen gespeicherten PHC-Hash
pub fn passwort_verifizieren(passwort: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AuthError::PasswortHashing(format!("Ungueltiges Hash-Format: {e}")))?;

    match Argon2::default().verify_password(passwort.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(AuthError::PasswortHashing(e.to_string())),
    }
}
