//! Flugplan-Handler – `$FP` (Pilot reicht ein) und `$AM` (Lotse aendert)
//!
//! Feldlayout:
//! - `$FP<callsign>:<an>:<15 Flugplanfelder>`
//! - `$AM<lotse>:SERVER:<pilot>:<15 Flugplanfelder>`
//!
//! Ein von einem Lotsen geaenderter Plan ist gesperrt. Der Pilot kann ihn
//! erst wieder ersetzen, wenn sich Abflug oder Ziel aendern.

use fsd_db::DbError;
use fsd_protocol::nachricht::{flugplan_aus_feldern, flugplan_zeile, AN_ALLE_LOTSEN};
use fsd_protocol::FehlerCode;

use crate::client::ClientInterface;
use crate::filter;
use crate::handlers::{eigener_client, BefehlFehler, BefehlResult};
use crate::session::Session;
use crate::state::EngineState;

pub async fn einreichen(
    state: &EngineState,
    session: &Session,
    zeile: &str,
    felder: &[&str],
) -> BefehlResult {
    let client = eigener_client(session)?;
    if client.ist_atc() {
        return Err(BefehlFehler::neu(FehlerCode::InvalidControl, client.callsign()));
    }

    let plan = flugplan_aus_feldern(&felder[2..]).map_err(|e| BefehlFehler::aus_protokoll(&e, false))?;

    if let Some(alt) = client.flugplan() {
        if alt.locked && alt.plan.gleiche_strecke(&plan) {
            return Err(BefehlFehler::neu(FehlerCode::InvalidControl, "flight plan locked"));
        }
    }

    client.flugplan_setzen(plan.clone(), false);
    if let Err(e) = state
        .flugplaene
        .upsert(client.cid(), client.callsign(), &plan, false)
        .await
    {
        tracing::warn!(callsign = %client.callsign(), fehler = %e, "Flugplan nicht gespeichert");
    }

    tracing::debug!(callsign = %client.callsign(), ziel = %plan.ziel, "Flugplan eingereicht");
    state
        .registry
        .broadcast_message(zeile, Some(&client), &filter::atc_in_reichweite())
        .await;
    Ok(())
}

pub async fn aendern(state: &EngineState, session: &Session, felder: &[&str]) -> BefehlResult {
    let lotse = eigener_client(session)?;
    if !lotse.ist_atc() || !lotse.facility().ist_mindestens_delivery() {
        return Err(BefehlFehler::neu(FehlerCode::InvalidControl, lotse.callsign()));
    }

    let ziel_callsign = felder[2];
    let ziel = state
        .registry
        .get_client(ziel_callsign)
        .ok_or_else(|| BefehlFehler::neu(FehlerCode::NoSuchCallsign, ziel_callsign))?;
    if ziel.flugplan().is_none() {
        return Err(BefehlFehler::neu(FehlerCode::NoFlightPlan, ziel_callsign));
    }

    let plan = flugplan_aus_feldern(&felder[3..]).map_err(|e| BefehlFehler::aus_protokoll(&e, false))?;
    let locked = !state.config.simulator_modus;
    ziel.flugplan_setzen(plan.clone(), locked);

    let gespeichert = match state.flugplaene.update(ziel.cid(), &plan, locked).await {
        Err(DbError::NichtGefunden(_)) => state
            .flugplaene
            .upsert(ziel.cid(), ziel.callsign(), &plan, locked)
            .await
            .map(|_| ()),
        andere => andere.map(|_| ()),
    };
    if let Err(e) = gespeichert {
        tracing::warn!(callsign = %ziel.callsign(), fehler = %e, "Geaenderter Flugplan nicht gespeichert");
    }

    tracing::info!(
        lotse = %lotse.callsign(),
        callsign = %ziel.callsign(),
        locked,
        "Flugplan durch Lotsen geaendert"
    );
    let zeile = flugplan_zeile(ziel.callsign(), AN_ALLE_LOTSEN, &plan);
    state
        .registry
        .broadcast_message(&zeile, Some(&lotse), &filter::atc_in_reichweite())
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::AtcUpdate;
    use crate::state::EngineConfig;
    use crate::testhilfe::{test_client_bei, test_peer, test_state, TestSchreiber};
    use fsd_core::types::Position;
    use fsd_protocol::Facility;
    use std::sync::Arc;

    fn session_mit(client: &Arc<crate::client::Client>) -> Session {
        let mut session = Session::neu(1, test_peer(), TestSchreiber::neu());
        session.callsign = client.callsign().to_string();
        session.client = Some(Arc::clone(client));
        session
    }

    fn fp_zeile(callsign: &str, abflug: &str, ziel: &str, hoehe: &str) -> String {
        format!("$FP{callsign}:*A:I:B738:450:{abflug}:1200:0:{hoehe}:{ziel}:1:10:3:0:EDDS:RMK:ROUTE")
    }

    fn felder(zeile: &str) -> Vec<&str> {
        zeile[3..].split(':').collect()
    }

    async fn umgebung(
        config: EngineConfig,
    ) -> (
        Arc<EngineState>,
        Arc<crate::client::Client>,
        Arc<crate::client::Client>,
        Arc<TestSchreiber>,
    ) {
        let state = test_state(config).await;
        state.auth.registrieren("cid-ABC123", "Pilot", "x", 1).await.unwrap();
        let (pilot, _) = test_client_bei("ABC123", false, Position::neu(50.0, 8.5));
        let (lotse, lotse_ausgang) = test_client_bei("EDDF_TWR", true, Position::neu(50.0, 8.6));
        state.registry.add_client(Arc::clone(&pilot)).unwrap();
        state.registry.add_client(Arc::clone(&lotse)).unwrap();
        (state, pilot, lotse, lotse_ausgang)
    }

    #[tokio::test]
    async fn einreichen_speichert_und_verteilt() {
        let (state, pilot, _, lotse_ausgang) = umgebung(EngineConfig::default()).await;
        let session = session_mit(&pilot);

        let zeile = fp_zeile("ABC123", "EDDF", "EDDM", "FL240");
        einreichen(&state, &session, &zeile, &felder(&zeile)).await.unwrap();

        let eintrag = pilot.flugplan().unwrap();
        assert!(!eintrag.locked);
        assert_eq!(eintrag.plan.reiseflughoehe, "FL240");
        assert_eq!(lotse_ausgang.zeilen(), vec![format!("{zeile}\r\n")]);

        let gespeichert = state.flugplaene.get_by_cid("cid-ABC123").await.unwrap().unwrap();
        assert_eq!(gespeichert.callsign, "ABC123");
        assert_eq!(gespeichert.plan.ziel, "EDDM");
    }

    #[tokio::test]
    async fn gesperrter_plan_nur_mit_neuer_strecke() {
        let (state, pilot, lotse, _) = umgebung(EngineConfig::default()).await;
        let pilot_session = session_mit(&pilot);
        let lotse_session = session_mit(&lotse);

        let zeile = fp_zeile("ABC123", "EDDF", "EDDM", "FL240");
        einreichen(&state, &pilot_session, &zeile, &felder(&zeile)).await.unwrap();

        let aenderung = "$AMEDDF_TWR:SERVER:ABC123:I:B738:450:EDDF:1200:0:FL200:EDDM:1:10:3:0:EDDS:RMK:ROUTE";
        aendern(&state, &lotse_session, &felder(aenderung)).await.unwrap();
        let eintrag = pilot.flugplan().unwrap();
        assert!(eintrag.locked);
        assert_eq!(eintrag.plan.reiseflughoehe, "FL200");

        // Gleiche Strecke: abgelehnt
        let zeile = fp_zeile("ABC123", "EDDF", "EDDM", "FL300");
        let err = einreichen(&state, &pilot_session, &zeile, &felder(&zeile))
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::InvalidControl);
        assert_eq!(err.kontext, "flight plan locked");
        assert_eq!(pilot.flugplan().unwrap().plan.reiseflughoehe, "FL200");

        // Neues Ziel: entsperrt
        let zeile = fp_zeile("ABC123", "EDDF", "EDDH", "FL300");
        einreichen(&state, &pilot_session, &zeile, &felder(&zeile)).await.unwrap();
        assert!(!pilot.flugplan().unwrap().locked);
    }

    #[tokio::test]
    async fn simulatormodus_sperrt_nicht() {
        let (state, pilot, lotse, _) = umgebung(EngineConfig {
            simulator_modus: true,
            ..EngineConfig::default()
        })
        .await;
        let zeile = fp_zeile("ABC123", "EDDF", "EDDM", "FL240");
        einreichen(&state, &session_mit(&pilot), &zeile, &felder(&zeile)).await.unwrap();

        let aenderung = "$AMEDDF_TWR:SERVER:ABC123:I:B738:450:EDDF:1200:0:FL200:EDDM:1:10:3:0:EDDS:RMK:ROUTE";
        aendern(&state, &session_mit(&lotse), &felder(aenderung)).await.unwrap();
        assert!(!pilot.flugplan().unwrap().locked);
    }

    #[tokio::test]
    async fn aendern_fehlerfaelle() {
        let (state, _, lotse, _) = umgebung(EngineConfig::default()).await;
        let session = session_mit(&lotse);

        let ohne_plan = "$AMEDDF_TWR:SERVER:ABC123:I:B738:450:EDDF:1200:0:FL200:EDDM:1:10:3:0:EDDS:RMK:ROUTE";
        let err = aendern(&state, &session, &felder(ohne_plan)).await.unwrap_err();
        assert_eq!(err.code, FehlerCode::NoFlightPlan);

        let unbekannt = "$AMEDDF_TWR:SERVER:XYZ999:I:B738:450:EDDF:1200:0:FL200:EDDM:1:10:3:0:EDDS:RMK:ROUTE";
        let err = aendern(&state, &session, &felder(unbekannt)).await.unwrap_err();
        assert_eq!(err.code, FehlerCode::NoSuchCallsign);
        assert_eq!(err.kontext, "XYZ999");

        // Beobachter duerfen nicht aendern
        lotse.atc_position_setzen(AtcUpdate {
            position: Position::neu(50.0, 8.6),
            frequenz: None,
            facility: Facility::OBS,
            sichtweite: 100.0,
            hoehe: 0,
        });
        let err = aendern(&state, &session, &felder(ohne_plan)).await.unwrap_err();
        assert_eq!(err.code, FehlerCode::InvalidControl);
    }

    #[tokio::test]
    async fn lotse_reicht_keinen_plan_ein() {
        let (state, _, lotse, _) = umgebung(EngineConfig::default()).await;
        let zeile = fp_zeile("EDDF_TWR", "EDDF", "EDDM", "FL240");
        let err = einreichen(&state, &session_mit(&lotse), &zeile, &felder(&zeile))
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::InvalidControl);
    }
}
