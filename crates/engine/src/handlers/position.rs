//! Positions-Handler – `@` (Pilot), `%` (Lotse), `'` (Sichtpunkt)
//!
//! Feldlayout:
//! - `@<modus>:<callsign>:<squawk>:<rating>:<lat>:<lon>:<alt>:<gs>:<pbh>:<flags>`
//! - `%<callsign>:<freq>:<facility>:<sichtweite>:<rating>:<lat>:<lon>:<alt>`
//! - `'<callsign>:<index>:<lat>:<lon>`

use fsd_core::types::Position;
use fsd_protocol::validierung::frequenz_parsen;
use fsd_protocol::{Facility, FehlerCode, Rating};

use crate::client::{AtcUpdate, ClientInterface, PilotUpdate};
use crate::filter;
use crate::handlers::{eigener_client, zahl, BefehlFehler, BefehlResult};
use crate::session::Session;
use crate::state::EngineState;

fn position(lat: &str, lon: &str) -> Result<Position, BefehlFehler> {
    Ok(Position::neu(zahl("latitude", lat)?, zahl("longitude", lon)?))
}

pub async fn pilot(
    state: &EngineState,
    session: &Session,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    let client = eigener_client(session)?;
    if client.ist_atc() {
        return Err(BefehlFehler::neu(FehlerCode::InvalidControl, client.callsign()));
    }

    // PBH kommt je nach Client vorzeichenbehaftet
    let pbh = zahl::<i64>("pbh", felder[8])? as u32;
    let update = PilotUpdate {
        transponder: zahl("transponder", felder[2])?,
        // Mehr als das Konto hergibt wird ignoriert
        rating: Rating::aus_feld(felder[3]).filter(|r| *r <= client.konto_rating()),
        position: position(felder[4], felder[5])?,
        hoehe: zahl("altitude", felder[6])?,
        geschwindigkeit: zahl("groundspeed", felder[7])?,
        pbh,
    };

    client.pilot_position_setzen(update);
    client.pfad_tick(state.config.pfad_intervall);

    state
        .registry
        .broadcast_message(zeile, Some(&client), &filter::in_range())
        .await;
    Ok(())
}

pub async fn lotse(
    state: &EngineState,
    session: &Session,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    let client = eigener_client(session)?;
    if !client.ist_atc() {
        return Err(BefehlFehler::neu(FehlerCode::InvalidControl, client.callsign()));
    }

    let facility = Facility::aus_index(zahl("facility", felder[2])?)
        .ok_or_else(|| BefehlFehler::neu(FehlerCode::SyntaxError, "facility"))?;
    if !state.config.rating_tabelle.darf(client.rating(), facility) {
        return Err(BefehlFehler::neu(
            FehlerCode::InvalidPositionForRating,
            client.callsign(),
        ));
    }

    let update = AtcUpdate {
        position: position(felder[5], felder[6])?,
        frequenz: frequenz_parsen(felder[1]),
        facility,
        sichtweite: zahl("visualrange", felder[3])?,
        hoehe: zahl("altitude", felder[7])?,
    };
    client.atc_position_setzen(update);

    state
        .registry
        .broadcast_message(zeile, Some(&client), &filter::in_range())
        .await;
    Ok(())
}

/// Sichtpunkte werden nicht verteilt
pub fn sichtpunkt(session: &Session, felder: &[&str]) -> BefehlResult {
    let client = eigener_client(session)?;
    if !client.ist_atc() {
        return Err(BefehlFehler::neu(FehlerCode::InvalidControl, client.callsign()));
    }

    let index: usize = zahl("index", felder[1])?;
    let punkt = position(felder[2], felder[3])?;
    if !client.sichtpunkt_setzen(index, punkt) {
        return Err(BefehlFehler::neu(FehlerCode::SyntaxError, "index"));
    }
    Ok(())
}
