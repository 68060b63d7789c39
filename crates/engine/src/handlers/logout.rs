//! `#DA` / `#DP` – geordnetes Abmelden
//!
//! Anders als ein Verbindungsabbruch loescht ein Logout den Client sofort,
//! ohne Reconnect-Fenster.

use fsd_protocol::nachricht::entfernen_zeile;
use fsd_protocol::FehlerCode;

use crate::client::ClientInterface;
use crate::filter;
use crate::handlers::{BefehlFehler, BefehlResult};
use crate::session::{Session, SessionZustand};
use crate::state::EngineState;

pub async fn verarbeiten(state: &EngineState, session: &mut Session) -> BefehlResult {
    let client = session
        .client
        .take()
        .ok_or_else(|| BefehlFehler::neu(FehlerCode::SyntaxError, ""))?;

    let zeile = entfernen_zeile(client.callsign(), client.ist_atc());
    state
        .registry
        .broadcast_message(&zeile, Some(&client), &filter::in_range())
        .await;
    state.registry.disconnect_client(&client, true, None).await;

    tracing::info!(callsign = %client.callsign(), "Abgemeldet");
    session.zustand = SessionZustand::Beendend;
    Ok(())
}
