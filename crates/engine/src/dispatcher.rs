//! Dispatcher – Routet Protokollzeilen an die richtigen Handler
//!
//! ## Zustandspruefung
//! - Login nur im Zustand `Unauthentifiziert`
//! - Alle anderen Befehle nur im Zustand `Registriert`
//! - Unbekannte Praefixe werden stillschweigend ignoriert
//!
//! Danach prueft der Dispatcher die Mindestanzahl Felder und ob das
//! Absenderfeld zum Callsign der Session passt.

use std::sync::Arc;

use fsd_protocol::{zeile_parsen, Befehl, FehlerCode};

use crate::handlers::{
    anfrage, flugplan, kill, login, logout, position, relay, text, BefehlFehler, BefehlResult,
};
use crate::session::{Session, SessionZustand};
use crate::state::EngineState;

/// Zentraler Befehls-Dispatcher einer Session
pub struct Dispatcher {
    state: Arc<EngineState>,
}

impl Dispatcher {
    pub fn neu(state: Arc<EngineState>) -> Self {
        Self { state }
    }

    /// Verarbeitet eine empfangene Zeile (ohne Trenner)
    pub async fn zeile_verarbeiten(&self, zeile: &str, session: &mut Session) -> BefehlResult {
        let (befehl, felder) = zeile_parsen(zeile);

        match befehl {
            Befehl::Unbekannt => {
                tracing::trace!(session = session.id, "Unbekannter Befehl ignoriert");
                return Ok(());
            }
            // Wind und Fehler schickt nur der Server
            Befehl::Wind | Befehl::Fehler => return Ok(()),
            _ => {}
        }

        match session.zustand {
            SessionZustand::Unauthentifiziert if !befehl.ist_login() => {
                return Err(BefehlFehler::neu(FehlerCode::SyntaxError, ""));
            }
            SessionZustand::Registriert if befehl.ist_login() => {
                return Err(BefehlFehler::neu(
                    FehlerCode::AlreadyRegistered,
                    session.callsign.clone(),
                ));
            }
            SessionZustand::Beendend => return Ok(()),
            _ => {}
        }

        befehl
            .felder_pruefen(&felder)
            .map_err(|e| BefehlFehler::aus_protokoll(&e, befehl.regel().fatal))?;

        if !befehl.ist_login() {
            Self::absender_pruefen(befehl, &felder, session)?;
        }

        let state = self.state.as_ref();
        match befehl {
            Befehl::AtcLogin | Befehl::PilotLogin => {
                login::verarbeiten(state, session, befehl, zeile, &felder).await
            }
            Befehl::AtcLogout | Befehl::PilotLogout => logout::verarbeiten(state, session).await,
            Befehl::PilotPosition => position::pilot(state, session, zeile, &felder).await,
            Befehl::AtcPosition => position::lotse(state, session, zeile, &felder).await,
            Befehl::Sichtpunkt => position::sichtpunkt(session, &felder),
            Befehl::Flugplan => flugplan::einreichen(state, session, zeile, &felder).await,
            Befehl::FlugplanAenderung => flugplan::aendern(state, session, &felder).await,
            Befehl::Anfrage => anfrage::anfrage(state, session, zeile, &felder).await,
            Befehl::Antwort => anfrage::antwort(state, session, zeile, &felder).await,
            Befehl::TextNachricht => text::verarbeiten(state, session, zeile, &felder).await,
            Befehl::Kill => kill::verarbeiten(state, session, &felder).await,
            Befehl::Ping => relay::ping(state, session, zeile, &felder).await,
            Befehl::Pong
            | Befehl::Uebergabe
            | Befehl::UebergabeAnnahme
            | Befehl::ProController
            | Befehl::SquawkBox => relay::unicast(state, session, zeile, &felder).await,
            Befehl::Wind | Befehl::Fehler | Befehl::Unbekannt => Ok(()),
        }
    }

    /// Das Absenderfeld muss das eigene Callsign tragen
    ///
    /// Bei `@` steht es an zweiter Stelle, sonst an erster.
    fn absender_pruefen(befehl: Befehl, felder: &[&str], session: &Session) -> BefehlResult {
        let index = usize::from(befehl == Befehl::PilotPosition);
        match felder.get(index) {
            Some(absender) if *absender == session.callsign => Ok(()),
            Some(absender) => Err(BefehlFehler::neu(
                FehlerCode::InvalidSourceCallsign,
                *absender,
            )),
            None => Err(BefehlFehler::neu(FehlerCode::SyntaxError, "")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientInterface;
    use crate::state::EngineConfig;
    use crate::testhilfe::{test_peer, test_state, TestSchreiber};

    async fn umgebung() -> (Arc<EngineState>, Dispatcher) {
        let config = EngineConfig {
            motd: vec!["Willkommen".to_string()],
            ..EngineConfig::default()
        };
        let state = test_state(config).await;
        state
            .auth
            .registrieren("1000001", "Pilot Eins", "geheim", 1)
            .await
            .unwrap();
        state
            .auth
            .registrieren("1000002", "Lotse Zwei", "geheim", 11)
            .await
            .unwrap();
        let dispatcher = Dispatcher::neu(Arc::clone(&state));
        (state, dispatcher)
    }

    fn session(id: u64) -> (Session, Arc<TestSchreiber>) {
        let ausgang = TestSchreiber::neu();
        (Session::neu(id, test_peer(), ausgang.clone()), ausgang)
    }

    const PILOT_LOGIN: &str = "#APABC123:SERVER:1000001:geheim:0:9:1:Pilot Eins EDDF";
    const ATC_LOGIN: &str = "#AAEDDF_TWR:SERVER:Lotse Zwei:1000002:geheim:5:9";

    #[tokio::test]
    async fn vor_login_nur_login() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);

        let err = dispatcher
            .zeile_verarbeiten("#TMABC123:*:hallo", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::SyntaxError);
        assert!(!err.fatal);
        assert_eq!(session.zustand, SessionZustand::Unauthentifiziert);
    }

    #[tokio::test]
    async fn unbekannter_befehl_wird_ignoriert() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, ausgang) = session(1);

        dispatcher.zeile_verarbeiten("XYZ:foo:bar", &mut session).await.unwrap();
        dispatcher.zeile_verarbeiten("#DLSERVER:*:5:270", &mut session).await.unwrap();
        assert!(ausgang.zeilen().is_empty());
    }

    #[tokio::test]
    async fn pilot_login_registriert_und_sendet_motd() {
        let (state, dispatcher) = umgebung().await;
        let (mut session, ausgang) = session(1);

        dispatcher.zeile_verarbeiten(PILOT_LOGIN, &mut session).await.unwrap();

        assert_eq!(session.zustand, SessionZustand::Registriert);
        assert_eq!(session.callsign, "ABC123");
        assert_eq!(ausgang.zeilen(), vec!["#TMSERVER:ABC123:Willkommen\r\n"]);

        let client = state.registry.get_client("ABC123").unwrap();
        assert!(!client.ist_atc());
        assert!(client.history_id().is_some());
        assert_eq!(state.metriken.logins_total.get(), 1);
    }

    #[tokio::test]
    async fn zweiter_login_auf_derselben_session() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);
        dispatcher.zeile_verarbeiten(PILOT_LOGIN, &mut session).await.unwrap();

        let err = dispatcher
            .zeile_verarbeiten(PILOT_LOGIN, &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::AlreadyRegistered);
        assert!(!err.fatal);
    }

    #[tokio::test]
    async fn falsches_passwort_ist_fatal() {
        let (state, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);

        let err = dispatcher
            .zeile_verarbeiten("#APABC123:SERVER:1000001:falsch:0:9:1:Pilot", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::InvalidCidOrPassword);
        assert!(err.fatal);
        assert!(state.registry.get_client("ABC123").is_none());
    }

    #[tokio::test]
    async fn falsche_protokollversion_ist_fatal() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);

        let err = dispatcher
            .zeile_verarbeiten("#APABC123:SERVER:1000001:geheim:0:8:1:Pilot", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::InvalidProtocolVersion);
        assert!(err.fatal);
    }

    #[tokio::test]
    async fn ungueltiges_callsign_ist_fatal() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);

        let err = dispatcher
            .zeile_verarbeiten("#APSERVER:SERVER:1000001:geheim:0:9:1:Pilot", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::InvalidCallsign);
        assert!(err.fatal);
    }

    #[tokio::test]
    async fn zu_wenige_felder_beim_login_ist_fatal() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);

        let err = dispatcher
            .zeile_verarbeiten("#APABC123:SERVER:1000001", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::SyntaxError);
        assert!(err.fatal);
    }

    #[tokio::test]
    async fn pilot_mit_zu_hohem_rating() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);

        let err = dispatcher
            .zeile_verarbeiten("#APABC123:SERVER:1000001:geheim:1:9:1:Pilot", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::RequestedLevelTooHigh);
        assert!(err.fatal);
    }

    #[tokio::test]
    async fn lotse_ueber_kontorating() {
        let (state, dispatcher) = umgebung().await;
        state
            .auth
            .registrieren("1000003", "Student", "geheim", 2)
            .await
            .unwrap();
        let (mut session, _) = session(1);

        let err = dispatcher
            .zeile_verarbeiten("#AAEDDM_TWR:SERVER:Student:1000003:geheim:5:9", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::RequestedLevelTooHigh);
        assert!(err.fatal);
    }

    #[tokio::test]
    async fn gebanntes_konto() {
        let (state, dispatcher) = umgebung().await;
        state
            .auth
            .registrieren("1000009", "Gesperrt", "geheim", -1)
            .await
            .unwrap();
        let (mut session, _) = session(1);

        let err = dispatcher
            .zeile_verarbeiten("#APBAD123:SERVER:1000009:geheim:0:9:1:Gesperrt", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::CertificateSuspended);
        assert!(err.fatal);
    }

    #[tokio::test]
    async fn fremdes_absenderfeld() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);
        dispatcher.zeile_verarbeiten(PILOT_LOGIN, &mut session).await.unwrap();

        let err = dispatcher
            .zeile_verarbeiten("#TMDLH456:*:hallo", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::InvalidSourceCallsign);
        assert_eq!(err.kontext, "DLH456");
        assert!(!err.fatal);

        let err = dispatcher
            .zeile_verarbeiten("@N:DLH456:2000:0:50.0:8.5:1000:0:0:0", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::InvalidSourceCallsign);
    }

    #[tokio::test]
    async fn kurzer_befehl_ist_nicht_fatal() {
        let (_, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);
        dispatcher.zeile_verarbeiten(PILOT_LOGIN, &mut session).await.unwrap();

        let err = dispatcher
            .zeile_verarbeiten("@N:ABC123:2000", &mut session)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::SyntaxError);
        assert!(!err.fatal);
    }

    #[tokio::test]
    async fn position_und_text_an_lotsen_in_reichweite() {
        let (state, dispatcher) = umgebung().await;
        let (mut lotse, lotse_ausgang) = session(1);
        let (mut pilot, pilot_ausgang) = session(2);

        dispatcher.zeile_verarbeiten(ATC_LOGIN, &mut lotse).await.unwrap();
        dispatcher
            .zeile_verarbeiten("%EDDF_TWR:18700:4:50:5:50.03:8.57:0", &mut lotse)
            .await
            .unwrap();
        dispatcher.zeile_verarbeiten(PILOT_LOGIN, &mut pilot).await.unwrap();
        lotse_ausgang.leeren();
        pilot_ausgang.leeren();

        dispatcher
            .zeile_verarbeiten("@N:ABC123:2000:0:50.05:8.60:1500:120:0:0", &mut pilot)
            .await
            .unwrap();
        assert_eq!(
            lotse_ausgang.leeren(),
            vec!["@N:ABC123:2000:0:50.05:8.60:1500:120:0:0\r\n"]
        );

        let telemetrie = state.registry.get_client("ABC123").unwrap().telemetrie();
        assert_eq!(telemetrie.transponder, 2000);
        assert_eq!(telemetrie.hoehe, 1500);

        dispatcher
            .zeile_verarbeiten("#TMABC123:EDDF_TWR:guten Tag", &mut pilot)
            .await
            .unwrap();
        assert_eq!(lotse_ausgang.leeren(), vec!["#TMABC123:EDDF_TWR:guten Tag\r\n"]);

        let err = dispatcher
            .zeile_verarbeiten("#TMABC123:NIEMAND:hallo", &mut pilot)
            .await
            .unwrap_err();
        assert_eq!(err.code, FehlerCode::NoSuchCallsign);
    }

    #[tokio::test]
    async fn logout_beendet_session() {
        let (state, dispatcher) = umgebung().await;
        let (mut session, _) = session(1);
        dispatcher.zeile_verarbeiten(PILOT_LOGIN, &mut session).await.unwrap();

        dispatcher.zeile_verarbeiten("#DPABC123:SERVER", &mut session).await.unwrap();
        assert_eq!(session.zustand, SessionZustand::Beendend);
        assert!(session.client.is_none());
        assert!(state.registry.get_client("ABC123").is_none());
    }
}
