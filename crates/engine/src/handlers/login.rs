//! Login-Handler – `#AA` (Lotse) und `#AP` (Pilot)
//!
//! Feldlayout:
//! - `#AA<callsign>:SERVER:<name>:<cid>:<passwort>:<rating>:<protokoll>`
//! - `#AP<callsign>:SERVER:<cid>:<passwort>:<rating>:<protokoll>:<simtyp>:<name>`
//!
//! Jeder Fehler beim Login ist fatal.

use std::sync::Arc;

use fsd_db::models::{BenutzerRecord, NeueHistory};
use fsd_protocol::nachricht::motd_zeile;
use fsd_protocol::validierung::callsign_pruefen;
use fsd_protocol::{Befehl, Facility, FehlerCode, Rating};

use crate::client::{Client, ClientInterface, ClientLogin};
use crate::error::EngineError;
use crate::filter;
use crate::handlers::{BefehlFehler, BefehlResult};
use crate::session::{Session, SessionZustand};
use crate::state::EngineState;

/// Felder eines Logins, unabhaengig vom Typ
struct LoginFelder<'a> {
    callsign: &'a str,
    real_name: &'a str,
    cid: &'a str,
    passwort: &'a str,
    rating: &'a str,
    protokoll: &'a str,
    sim_typ: &'a str,
}

impl<'a> LoginFelder<'a> {
    fn aus(befehl: Befehl, felder: &[&'a str]) -> Self {
        if befehl == Befehl::AtcLogin {
            Self {
                callsign: felder[0],
                real_name: felder[2],
                cid: felder[3],
                passwort: felder[4],
                rating: felder[5],
                protokoll: felder[6],
                sim_typ: "",
            }
        } else {
            Self {
                callsign: felder[0],
                cid: felder[2],
                passwort: felder[3],
                rating: felder[4],
                protokoll: felder[5],
                sim_typ: felder[6],
                real_name: felder[7],
            }
        }
    }
}

pub async fn verarbeiten(
    state: &EngineState,
    session: &mut Session,
    befehl: Befehl,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    let ist_atc = befehl == Befehl::AtcLogin;
    let daten = LoginFelder::aus(befehl, felder);

    callsign_pruefen(daten.callsign).map_err(|e| BefehlFehler::aus_protokoll(&e, true))?;

    let version = daten.protokoll.trim().parse::<u32>().ok();
    if version != Some(state.config.protokoll_version) {
        return Err(BefehlFehler::fatal(
            FehlerCode::InvalidProtocolVersion,
            daten.protokoll,
        ));
    }

    let angefordert = Rating::aus_feld(daten.rating)
        .ok_or_else(|| BefehlFehler::fatal(FehlerCode::SyntaxError, "rating"))?;

    let benutzer = anmelden(state, daten.cid, daten.passwort).await?;
    let konto_rating = Rating::try_from(benutzer.rating).map_err(|_| {
        tracing::error!(cid = %benutzer.cid, rating = benutzer.rating, "Unbekanntes Rating im Konto");
        BefehlFehler::fatal(FehlerCode::InvalidCidOrPassword, daten.cid)
    })?;

    if konto_rating.ist_gebannt() {
        tracing::warn!(cid = %benutzer.cid, callsign = %daten.callsign, "Login eines gesperrten Kontos");
        return Err(BefehlFehler::fatal(FehlerCode::CertificateSuspended, daten.cid));
    }

    let facility = if ist_atc {
        if angefordert.ist_gebannt() {
            return Err(BefehlFehler::fatal(
                FehlerCode::CertificateSuspended,
                daten.callsign,
            ));
        }
        if angefordert > konto_rating {
            return Err(BefehlFehler::fatal(
                FehlerCode::RequestedLevelTooHigh,
                daten.callsign,
            ));
        }
        Facility::OBS
    } else {
        if angefordert != Rating::Normal {
            return Err(BefehlFehler::fatal(
                FehlerCode::RequestedLevelTooHigh,
                daten.callsign,
            ));
        }
        if !state.config.rating_tabelle.darf(Rating::Normal, Facility::PILOT) {
            return Err(BefehlFehler::fatal(
                FehlerCode::InvalidPositionForRating,
                daten.callsign,
            ));
        }
        Facility::PILOT
    };

    let login = ClientLogin {
        callsign: daten.callsign.to_string(),
        ist_atc,
        cid: benutzer.cid.clone(),
        real_name: daten.real_name.to_string(),
        konto_rating,
        rating: angefordert,
        facility,
        sim_typ: daten.sim_typ.to_string(),
    };
    let (client, neu) = registrieren(state, session, login).await?;

    if neu {
        historie_oeffnen(state, &client).await;
        flugplan_laden(state, &client).await;
    }

    session.callsign = client.callsign().to_string();
    session.client = Some(Arc::clone(&client));
    session.benutzer = Some(benutzer);
    session.zustand = SessionZustand::Registriert;
    state.metriken.logins_total.inc();

    tracing::info!(
        callsign = %client.callsign(),
        cid = %client.cid(),
        atc = ist_atc,
        reconnect = !neu,
        peer = %session.peer,
        "Client angemeldet"
    );

    state
        .registry
        .broadcast_message(zeile, Some(&client), &filter::login_empfaenger())
        .await;

    for text in &state.config.motd {
        session.antworten(&motd_zeile(client.callsign(), text)).await;
    }
    Ok(())
}

async fn anmelden(state: &EngineState, cid: &str, passwort: &str) -> Result<BenutzerRecord, BefehlFehler> {
    match state.auth.anmelden(cid, passwort).await {
        Ok(benutzer) => Ok(benutzer),
        Err(e) if e.ist_anmeldefehler() => {
            Err(BefehlFehler::fatal(FehlerCode::InvalidCidOrPassword, cid))
        }
        Err(e) => {
            tracing::error!(cid = %cid, fehler = %e, "Anmeldung nicht pruefbar");
            Err(BefehlFehler::fatal(FehlerCode::InvalidCidOrPassword, cid))
        }
    }
}

/// Bindet einen getrennten Client desselben Kontos neu an oder legt einen an
///
/// Liefert den Client und ob er neu ist.
async fn registrieren(
    state: &EngineState,
    session: &Session,
    login: ClientLogin,
) -> Result<(Arc<Client>, bool), BefehlFehler> {
    if let Some(vorhanden) = state.registry.get_client(&login.callsign) {
        let gleiches_konto = vorhanden.cid() == login.cid && vorhanden.ist_atc() == login.ist_atc;
        if gleiches_konto && vorhanden.anbinden(session.verbindung()) {
            vorhanden.rating_setzen(login.rating);
            return Ok((vorhanden, false));
        }
    }

    let callsign = login.callsign.clone();
    let client = Arc::new(Client::neu(login, session.verbindung()));
    match state.registry.add_client(Arc::clone(&client)) {
        Ok(()) => Ok((client, true)),
        Err(EngineError::AlreadyRegistered(_)) => {
            Err(BefehlFehler::fatal(FehlerCode::CallsignInUse, callsign))
        }
        Err(EngineError::ShutdownInProgress) => {
            Err(BefehlFehler::fatal(FehlerCode::ServerFull, callsign))
        }
        Err(e) => {
            tracing::error!(callsign = %callsign, fehler = %e, "Client nicht registrierbar");
            Err(BefehlFehler::fatal(FehlerCode::ServerFull, callsign))
        }
    }
}

async fn historie_oeffnen(state: &EngineState, client: &Client) {
    let eintrag = NeueHistory {
        cid: client.cid(),
        callsign: client.callsign(),
        is_atc: client.ist_atc(),
    };
    match state.historie.create(eintrag).await {
        Ok(record) => client.history_id_setzen(record.id),
        Err(e) => {
            tracing::warn!(callsign = %client.callsign(), fehler = %e, "Historie nicht eroeffnet")
        }
    }
}

/// Uebernimmt den gespeicherten Plan des Kontos, wenn er zum Callsign passt
async fn flugplan_laden(state: &EngineState, client: &Client) {
    match state.flugplaene.get_by_cid(client.cid()).await {
        Ok(Some(record)) if record.callsign == client.callsign() => {
            tracing::debug!(callsign = %client.callsign(), "Gespeicherter Flugplan geladen");
            client.flugplan_setzen(record.plan, record.locked);
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!(callsign = %client.callsign(), fehler = %e, "Flugplan nicht ladbar")
        }
    }
}
