//! Auth-Service fuer den FSD-Server
//!
//! Anmeldung per CID und Passwort gegen das `UserRepository`. Ob ein Konto
//! gebannt ist oder welches Rating es anfordern darf, entscheidet die Engine.

use std::sync::Arc;

use fsd_db::{
    models::{BenutzerRecord, NeuerBenutzer},
    repository::UserRepository,
};

use crate::{
    error::{AuthError, AuthResult},
    password::{passwort_hashen, passwort_verifizieren, PasswortParameter},
};

/// Auth-Service – zentraler Einstiegspunkt fuer die Anmeldung
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    parameter: PasswortParameter,
}

impl AuthService {
    /// Erstellt einen neuen AuthService mit Standard-Hashparametern
    pub fn neu(user_repo: Arc<dyn UserRepository>) -> Self {
        Self::mit_parametern(user_repo, PasswortParameter::default())
    }

    pub fn mit_parametern(user_repo: Arc<dyn UserRepository>, parameter: PasswortParameter) -> Self {
        Self {
            user_repo,
            parameter,
        }
    }

    /// Legt ein neues Konto an
    pub async fn registrieren(
        &self,
        cid: &str,
        real_name: &str,
        passwort: &str,
        rating: i32,
    ) -> AuthResult<BenutzerRecord> {
        if self.user_repo.get_by_cid(cid).await?.is_some() {
            return Err(AuthError::CidVergeben(cid.to_string()));
        }

        let passwort_hash = passwort_hashen(passwort, self.parameter)?;

        let benutzer = self
            .user_repo
            .create(NeuerBenutzer {
                cid,
                real_name,
                password_hash: &passwort_hash,
                rating,
            })
            .await
            .map_err(|e| {
                if e.ist_eindeutigkeit() {
                    AuthError::CidVergeben(cid.to_string())
                } else {
                    AuthError::Datenbank(e)
                }
            })?;

        tracing::info!(cid = %benutzer.cid, rating = benutzer.rating, "Neues Konto angelegt");
        Ok(benutzer)
    }

    /// Prueft CID und Passwort
    ///
    /// Unbekannte CID und falsches Passwort liefern denselben Fehler.
    pub async fn anmelden(&self, cid: &str, passwort: &str) -> AuthResult<BenutzerRecord> {
        let benutzer = self
            .user_repo
            .get_by_cid(cid)
            .await?
            .ok_or(AuthError::UngueltigeAnmeldedaten)?;

        if !passwort_verifizieren(passwort, &benutzer.password_hash)? {
            tracing::warn!(cid = %cid, "Fehlgeschlagener Login-Versuch");
            return Err(AuthError::UngueltigeAnmeldedaten);
        }

        if let Err(e) = self.user_repo.update_last_login(cid).await {
            tracing::warn!(cid = %cid, fehler = %e, "last_login konnte nicht gesetzt werden");
        }

        tracing::debug!(cid = %cid, "Anmeldung erfolgreich");
        Ok(benutzer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsd_db::SqliteDb;

    async fn service() -> AuthService {
        let db = SqliteDb::in_memory().await.unwrap();
        AuthService::mit_parametern(Arc::new(db), PasswortParameter::schnell())
    }

    #[tokio::test]
    async fn registrieren_und_anmelden() {
        let auth = service().await;
        auth.registrieren("1000001", "Max", "geheim", 5).await.unwrap();

        let benutzer = auth.anmelden("1000001", "geheim").await.unwrap();
        assert_eq!(benutzer.cid, "1000001");
        assert_eq!(benutzer.rating, 5);
    }

    #[tokio::test]
    async fn falsches_passwort() {
        let auth = service().await;
        auth.registrieren("1000002", "Max", "geheim", 1).await.unwrap();

        let err = auth.anmelden("1000002", "falsch").await.unwrap_err();
        assert!(err.ist_anmeldefehler());
    }

    #[tokio::test]
    async fn unbekannte_cid() {
        let auth = service().await;
        let err = auth.anmelden("404", "egal").await.unwrap_err();
        assert!(matches!(err, AuthError::UngueltigeAnmeldedaten));
    }

    #[tokio::test]
    async fn doppelte_cid() {
        let auth = service().await;
        auth.registrieren("1000003", "A", "x", 1).await.unwrap();
        let err = auth.registrieren("1000003", "B", "y", 1).await.unwrap_err();
        assert!(matches!(err, AuthError::CidVergeben(_)));
    }
}
