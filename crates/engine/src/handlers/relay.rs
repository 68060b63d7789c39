//! Reine Weiterleitungen: Ping/Pong, Handoff, Pilot-Client-Nachrichten

use fsd_protocol::nachricht::pong_zeile;
use fsd_protocol::SERVER_CALLSIGN;

use crate::client::ClientInterface;
use crate::handlers::{self, eigener_client, BefehlResult};
use crate::session::Session;
use crate::state::EngineState;

/// `$PI<von>:<an>:<daten>`; an `SERVER` antwortet der Server mit `$PO`
pub async fn ping(
    state: &EngineState,
    session: &Session,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    let client = eigener_client(session)?;
    if felder[1] == SERVER_CALLSIGN {
        session
            .antworten(&pong_zeile(client.callsign(), &felder[2..]))
            .await;
        return Ok(());
    }
    handlers::weiterleiten(state, &client, felder[1], zeile).await
}

/// Unicast an `felder[1]`
pub async fn unicast(
    state: &EngineState,
    session: &Session,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    eigener_client(session)?;
    handlers::unicast(state, felder[1], zeile).await
}
