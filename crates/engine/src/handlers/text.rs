//! Textnachrichten – `#TM<von>:<an>:<text>`
//!
//! Ziele: `*` alle, `*S` Supervisoren, `@<freq>` Frequenz, sonst Callsign.

use crate::client::ClientInterface;
use crate::filter;
use crate::handlers::{eigener_client, weiterleiten, BefehlResult};
use crate::session::Session;
use crate::state::EngineState;

const AN_ALLE: &str = "*";
const AN_SUPERVISOREN: &str = "*S";

pub async fn verarbeiten(
    state: &EngineState,
    session: &Session,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    let client = eigener_client(session)?;

    match felder[1] {
        AN_ALLE => {
            state
                .registry
                .broadcast_message(zeile, Some(&client), &filter::immer())
                .await;
        }
        AN_SUPERVISOREN => {
            tracing::info!(callsign = %client.callsign(), "Supervisor-Ruf");
            state
                .registry
                .broadcast_message(
                    zeile,
                    Some(&client),
                    &filter::to_supervisors(state.config.supervisor_strikt),
                )
                .await;
        }
        ziel => weiterleiten(state, &client, ziel, zeile).await?,
    }
    Ok(())
}
