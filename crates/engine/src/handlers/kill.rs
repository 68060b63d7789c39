//! `$!!<von>:<ziel>[:<grund>]` – Supervisor wirft einen Client hinaus
//!
//! Der Client bekommt die Kill-Zeile, dann wird seine Verbindung getrennt.
//! Er bleibt fuer das Reconnect-Fenster registriert.

use std::sync::Arc;

use fsd_protocol::nachricht::{entfernen_zeile, kill_zeile};
use fsd_protocol::{FehlerCode, Rating};

use crate::client::ClientInterface;
use crate::filter;
use crate::handlers::{eigener_client, BefehlFehler, BefehlResult};
use crate::session::Session;
use crate::state::EngineState;

pub async fn verarbeiten(state: &EngineState, session: &Session, felder: &[&str]) -> BefehlResult {
    let von = eigener_client(session)?;
    if !von.ist_atc() || von.rating() < Rating::Supervisor {
        return Err(BefehlFehler::neu(FehlerCode::InvalidControl, von.callsign()));
    }

    let ziel_callsign = felder[1];
    let ziel = state
        .registry
        .get_client(ziel_callsign)
        .ok_or_else(|| BefehlFehler::neu(FehlerCode::NoSuchCallsign, ziel_callsign))?;
    let grund = felder.get(2..).map(|rest| rest.join(":")).unwrap_or_default();

    tracing::warn!(von = %von.callsign(), ziel = %ziel_callsign, grund = %grund, "Client gekickt");

    if let Err(e) = ziel.senden(Arc::from(kill_zeile(ziel_callsign, &grund))).await {
        tracing::debug!(ziel = %ziel_callsign, fehler = %e, "Kill-Zeile nicht zugestellt");
    }
    state
        .registry
        .broadcast_message(
            &entfernen_zeile(ziel.callsign(), ziel.ist_atc()),
            Some(&ziel),
            &filter::in_range(),
        )
        .await;
    state.registry.disconnect_client(&ziel, false, None).await;
    Ok(())
}
