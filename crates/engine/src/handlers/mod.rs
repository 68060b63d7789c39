//! Befehls-Handler
//!
//! Jeder Handler liefert `Ok(())` oder einen `BefehlFehler`, den die Session
//! als `$ER`-Zeile an den Absender schickt. Fatale Fehler beenden danach die
//! Verbindung.

pub mod anfrage;
pub mod flugplan;
pub mod kill;
pub mod login;
pub mod logout;
pub mod position;
pub mod relay;
pub mod text;

use std::str::FromStr;
use std::sync::Arc;

use fsd_protocol::validierung::{frequenz_parsen, ist_gueltige_frequenz, ATC_FREQUENZ};
use fsd_protocol::{FehlerCode, ProtokollFehler, SERVER_CALLSIGN};

use crate::client::Client;
use crate::error::EngineError;
use crate::filter;
use crate::session::Session;
use crate::state::EngineState;

/// Fuer den Absender sichtbarer Fehler eines Befehls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BefehlFehler {
    pub code: FehlerCode,
    pub fatal: bool,
    /// Betroffenes Callsign oder Feld
    pub kontext: String,
}

impl BefehlFehler {
    pub fn neu(code: FehlerCode, kontext: impl Into<String>) -> Self {
        Self {
            code,
            fatal: false,
            kontext: kontext.into(),
        }
    }

    pub fn fatal(code: FehlerCode, kontext: impl Into<String>) -> Self {
        Self {
            code,
            fatal: true,
            kontext: kontext.into(),
        }
    }

    pub fn aus_protokoll(fehler: &ProtokollFehler, fatal: bool) -> Self {
        // Der Kontext landet als Feld auf der Leitung und darf keinen ':' enthalten
        let kontext = match fehler {
            ProtokollFehler::ZuWenigeFelder { .. } => String::new(),
            ProtokollFehler::UngueltigesFeld { feld, .. } => (*feld).to_string(),
            ProtokollFehler::UngueltigesCallsign(cs) => cs.clone(),
        };
        Self {
            code: fehler.code(),
            fatal,
            kontext,
        }
    }
}

impl std::fmt::Display for BefehlFehler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code.label(), self.kontext)?;
        if self.fatal {
            write!(f, " [fatal]")?;
        }
        Ok(())
    }
}

pub type BefehlResult = Result<(), BefehlFehler>;

// ---------------------------------------------------------------------------
// Gemeinsame Hilfen
// ---------------------------------------------------------------------------

/// Client der Session; ohne Login ein Syntaxfehler
pub(crate) fn eigener_client(session: &Session) -> Result<Arc<Client>, BefehlFehler> {
    session
        .client
        .clone()
        .ok_or_else(|| BefehlFehler::neu(FehlerCode::SyntaxError, ""))
}

/// Parst ein Zahlenfeld, Fehler tragen den Feldnamen als Kontext
pub(crate) fn zahl<T: FromStr>(feld: &'static str, wert: &str) -> Result<T, BefehlFehler> {
    wert.trim()
        .parse()
        .map_err(|_| BefehlFehler::neu(FehlerCode::SyntaxError, feld))
}

/// Unicast; ein fehlendes Ziel ist `NoSuchCallsign`
pub(crate) async fn unicast(state: &EngineState, ziel: &str, zeile: &str) -> BefehlResult {
    match state.registry.send_message_to(ziel, zeile).await {
        Ok(()) => Ok(()),
        Err(EngineError::CallsignNotFound(_)) => {
            Err(BefehlFehler::neu(FehlerCode::NoSuchCallsign, ziel))
        }
        Err(e) => {
            tracing::warn!(ziel = %ziel, fehler = %e, "Unicast fehlgeschlagen");
            Ok(())
        }
    }
}

/// Verteilung auf eine Frequenz `@<freq>`
///
/// Eine gueltige Sprechfunkfrequenz geht an alle in Reichweite, alles andere
/// nur an Lotsen in Reichweite.
pub(crate) async fn frequenz_senden(state: &EngineState, von: &Arc<Client>, frequenz: &str, zeile: &str) {
    let gueltig = frequenz_parsen(frequenz).is_some_and(ist_gueltige_frequenz);
    let filter = if gueltig {
        filter::in_range()
    } else {
        filter::atc_in_reichweite()
    };
    state.registry.broadcast_message(zeile, Some(von), &filter).await;
}

/// Leitet eine Zeile an ihr Ziel weiter
///
/// `SERVER` wird verschluckt, `@94835` geht an Lotsen in Reichweite,
/// `@<freq>` auf die Frequenz, alles andere per Unicast.
pub(crate) async fn weiterleiten(
    state: &EngineState,
    von: &Arc<Client>,
    ziel: &str,
    zeile: &str,
) -> BefehlResult {
    if ziel == SERVER_CALLSIGN {
        return Ok(());
    }
    match ziel.strip_prefix('@') {
        Some(ATC_FREQUENZ) => {
            state
                .registry
                .broadcast_message(zeile, Some(von), &filter::atc_in_reichweite())
                .await;
            Ok(())
        }
        Some(frequenz) => {
            frequenz_senden(state, von, frequenz, zeile).await;
            Ok(())
        }
        None => unicast(state, ziel, zeile).await,
    }
}
