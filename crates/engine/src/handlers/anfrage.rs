//! Anfrage-Handler – `$CQ` und `$CR`
//!
//! Feldlayout: `$CQ<von>:<an>:<typ>[:<daten>...]`, `$CR` genauso.
//!
//! Anfragen an `SERVER` beantwortet der Server selbst (`FP`, `ATC`, `ATIS`,
//! `IP`). `@94835` ist die Koordinationsfrequenz der Lotsen; darueber laeuft
//! auch das Setzen der Reiseflughoehe (`FA`). Alles andere wird
//! weitergeleitet.

use std::sync::Arc;

use fsd_protocol::nachricht::{flugplan_zeile, server_antwort};
use fsd_protocol::validierung::ATC_FREQUENZ;
use fsd_protocol::{Facility, FehlerCode, SERVER_CALLSIGN};

use crate::client::{Client, ClientInterface};
use crate::handlers::{eigener_client, weiterleiten, BefehlFehler, BefehlResult};
use crate::session::Session;
use crate::state::EngineState;

pub async fn anfrage(
    state: &EngineState,
    session: &Session,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    let client = eigener_client(session)?;
    let ziel = felder[1];

    if ziel == SERVER_CALLSIGN {
        return server_anfrage(state, session, &client, felder).await;
    }

    if ziel.strip_prefix('@') == Some(ATC_FREQUENZ) && felder[2] == "FA" {
        reiseflughoehe_setzen(state, &client, felder).await?;
    }

    weiterleiten(state, &client, ziel, zeile).await
}

pub async fn antwort(
    state: &EngineState,
    session: &Session,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    let client = eigener_client(session)?;

    if client.ist_atc() && felder[2] == "ATIS" {
        atis_sammeln(&client, felder);
    }

    weiterleiten(state, &client, felder[1], zeile).await
}

/// `ATIS:T:<text>` haengt an, `ATIS:E` veroeffentlicht den Block
///
/// Die ATIS liegt beim sendenden Lotsen, nicht beim Empfaenger der
/// `$CR`-Zeile. `$CQ:SERVER:ATIS` liest sie spaeter von dort.
fn atis_sammeln(client: &Client, felder: &[&str]) {
    match felder.get(3).copied() {
        Some("T") => {
            let text = felder.get(4..).map(|rest| rest.join(":")).unwrap_or_default();
            if !client.atis_zeile_hinzufuegen(&text) {
                tracing::debug!(callsign = %client.callsign(), "ATIS-Block voll, Zeile verworfen");
            }
        }
        Some("E") => {
            let zeilen = client.atis_abschliessen();
            tracing::debug!(callsign = %client.callsign(), zeilen, "ATIS veroeffentlicht");
        }
        _ => {}
    }
}

async fn server_anfrage(
    state: &EngineState,
    session: &Session,
    client: &Client,
    felder: &[&str],
) -> BefehlResult {
    let von = client.callsign();
    let ziel_feld = || {
        felder
            .get(3)
            .copied()
            .ok_or_else(|| BefehlFehler::neu(FehlerCode::SyntaxError, felder[2]))
    };

    match felder[2] {
        "FP" => {
            let ziel_callsign = ziel_feld()?;
            let ziel = ziel_holen(state, ziel_callsign)?;
            let eintrag = ziel
                .flugplan()
                .ok_or_else(|| BefehlFehler::neu(FehlerCode::NoFlightPlan, ziel_callsign))?;
            session
                .antworten(&flugplan_zeile(ziel.callsign(), von, &eintrag.plan))
                .await;
        }
        "ATC" => {
            let ziel_callsign = ziel_feld()?;
            let gueltig = state.registry.get_client(ziel_callsign).is_some_and(|c| {
                c.ist_atc() && c.facility() != Facility::OBS && c.facility() != Facility::KEINE
            });
            let kennung = if gueltig { "Y" } else { "N" };
            session
                .antworten(&server_antwort(von, "ATC", &[kennung, ziel_callsign]))
                .await;
        }
        "ATIS" => {
            let ziel_callsign = ziel_feld()?;
            let ziel = ziel_holen(state, ziel_callsign)?;
            if !ziel.ist_atc() {
                return Err(BefehlFehler::neu(FehlerCode::NoSuchCallsign, ziel_callsign));
            }
            let atis = ziel.atis();
            for text in &atis {
                session
                    .antworten(&server_antwort(von, "ATIS", &["T", text]))
                    .await;
            }
            let anzahl = atis.len().to_string();
            session
                .antworten(&server_antwort(von, "ATIS", &["E", &anzahl]))
                .await;
        }
        "IP" => {
            let ip = session.peer.ip().to_string();
            session.antworten(&server_antwort(von, "IP", &[&ip])).await;
        }
        andere => {
            tracing::trace!(callsign = %von, typ = %andere, "Unbeantwortete Server-Anfrage");
        }
    }
    Ok(())
}

fn ziel_holen(state: &EngineState, callsign: &str) -> Result<Arc<Client>, BefehlFehler> {
    state
        .registry
        .get_client(callsign)
        .ok_or_else(|| BefehlFehler::neu(FehlerCode::NoSuchCallsign, callsign))
}

/// `$CQ<lotse>:@94835:FA:<pilot>:<hoehe>`
async fn reiseflughoehe_setzen(
    state: &EngineState,
    lotse: &Client,
    felder: &[&str],
) -> BefehlResult {
    if !lotse.ist_atc() || !lotse.facility().ist_mindestens_delivery() {
        return Err(BefehlFehler::neu(FehlerCode::InvalidControl, lotse.callsign()));
    }
    let (Some(ziel_callsign), Some(hoehe)) = (felder.get(3).copied(), felder.get(4).copied()) else {
        return Err(BefehlFehler::neu(FehlerCode::SyntaxError, "FA"));
    };

    let ziel = ziel_holen(state, ziel_callsign)?;
    let eintrag = ziel
        .reiseflughoehe_setzen(hoehe)
        .ok_or_else(|| BefehlFehler::neu(FehlerCode::NoFlightPlan, ziel_callsign))?;

    if let Err(e) = state
        .flugplaene
        .update(ziel.cid(), &eintrag.plan, eintrag.locked)
        .await
    {
        tracing::warn!(callsign = %ziel_callsign, fehler = %e, "Reiseflughoehe nicht gespeichert");
    }
    tracing::debug!(lotse = %lotse.callsign(), callsign = %ziel_callsign, hoehe = %hoehe, "Reiseflughoehe gesetzt");
    Ok(())
}
