//! fsd-engine – Protokoll-Engine des FSD-Servers
//!
//! Dieser Crate implementiert den eigentlichen Netzwerkbetrieb: TCP-Sessions,
//! Login, die Client-Registry mit Reconnect-Fenster, die Befehlsverarbeitung
//! und die raeumlich gefilterte Verteilung von Zeilen an andere Clients.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (FsdServer)
//!     |  Semaphore begrenzt gleichzeitige Verbindungen
//!     v
//! Session (pro Verbindung ein Task)
//!     |  State Machine: Unauthentifiziert -> Registriert -> Beendend
//!     |  Schreib-Task pro Verbindung, gespeist ueber mpsc
//!     v
//! Dispatcher
//!     |
//!     +-- login      (#AA, #AP)
//!     +-- logout     (#DA, #DP)
//!     +-- position   (@, %, ')
//!     +-- flugplan   ($FP, $AM)
//!     +-- anfrage    ($CQ, $CR)
//!     +-- text       (#TM)
//!     +-- kill       ($!!)
//!     +-- relay      ($HO, $HA, #PC, #SB, $PI, $PO)
//!
//! ClientRegistry – Wer ist angemeldet, Broadcasts, Reconnect-Timer
//! Heartbeat      – Periodisches Wind-Delta an alle Clients
//! ```

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod heartbeat;
pub mod registry;
pub mod session;
pub mod state;
pub mod tcp;

// Bequeme Re-Exporte
pub use client::{Client, ClientInterface, ClientLogin, ClientZustand, ZeilenSchreiber};
pub use dispatcher::Dispatcher;
pub use error::{EngineError, EngineResult};
pub use filter::Filter;
pub use handlers::{BefehlFehler, BefehlResult};
pub use heartbeat::Heartbeat;
pub use registry::{ClientRegistry, RegistryConfig};
pub use session::{Session, SessionZustand};
pub use state::{EngineConfig, EngineState};
pub use tcp::FsdServer;

#[cfg(test)]
pub(crate) mod testhilfe {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use fsd_auth::PasswortParameter;
    use fsd_core::types::Position;
    use fsd_db::SqliteDb;
    use fsd_observability::FsdMetrics;
    use fsd_protocol::{Facility, Rating};
    use parking_lot::Mutex;
    use tokio_util::sync::CancellationToken;

    use crate::client::{AtcUpdate, Client, ClientLogin, PilotUpdate, Verbindung, ZeilenSchreiber};
    use crate::error::{EngineError, EngineResult};
    use crate::state::{EngineConfig, EngineState};

    /// Schreiber der alle Zeilen im Speicher sammelt
    #[derive(Default)]
    pub struct TestSchreiber {
        zeilen: Mutex<Vec<String>>,
        geschlossen: AtomicBool,
    }

    impl TestSchreiber {
        pub fn neu() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn zeilen(&self) -> Vec<String> {
            self.zeilen.lock().clone()
        }

        pub fn leeren(&self) -> Vec<String> {
            std::mem::take(&mut *self.zeilen.lock())
        }

        pub fn schliessen(&self) {
            self.geschlossen.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl ZeilenSchreiber for TestSchreiber {
        async fn schreiben(&self, zeile: Arc<str>) -> EngineResult<()> {
            if self.ist_geschlossen() {
                return Err(EngineError::ClientGetrennt);
            }
            self.zeilen.lock().push(zeile.to_string());
            Ok(())
        }

        fn ist_geschlossen(&self) -> bool {
            self.geschlossen.load(Ordering::SeqCst)
        }
    }

    pub fn test_peer() -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 6809))
    }

    pub fn test_verbindung(session_id: u64) -> (Verbindung, Arc<TestSchreiber>) {
        let schreiber = TestSchreiber::neu();
        let verbindung = Verbindung {
            session_id,
            peer: test_peer(),
            schreiber: Arc::clone(&schreiber) as Arc<dyn ZeilenSchreiber>,
            abbruch: CancellationToken::new(),
        };
        (verbindung, schreiber)
    }

    pub fn test_login(callsign: &str, ist_atc: bool) -> ClientLogin {
        ClientLogin {
            callsign: callsign.to_string(),
            ist_atc,
            cid: format!("cid-{callsign}"),
            real_name: "Test Benutzer".to_string(),
            konto_rating: if ist_atc { Rating::Supervisor } else { Rating::Observer },
            rating: if ist_atc { Rating::Controller1 } else { Rating::Normal },
            facility: if ist_atc { Facility::OBS } else { Facility::PILOT },
            sim_typ: String::new(),
        }
    }

    pub fn test_client(callsign: &str, ist_atc: bool) -> (Arc<Client>, Arc<TestSchreiber>) {
        let (verbindung, schreiber) = test_verbindung(1);
        let client = Arc::new(Client::neu(test_login(callsign, ist_atc), verbindung));
        (client, schreiber)
    }

    /// Client mit Position; Lotsen bekommen 100 NM Sichtweite
    pub fn test_client_bei(
        callsign: &str,
        ist_atc: bool,
        position: Position,
    ) -> (Arc<Client>, Arc<TestSchreiber>) {
        let (client, schreiber) = test_client(callsign, ist_atc);
        if ist_atc {
            client.atc_position_setzen(AtcUpdate {
                position,
                frequenz: Some(18_700),
                facility: Facility::TWR,
                sichtweite: 100.0,
                hoehe: 0,
            });
        } else {
            client.pilot_position_setzen(PilotUpdate {
                position,
                transponder: 2000,
                hoehe: 1000,
                geschwindigkeit: 0,
                pbh: 0,
                rating: None,
            });
        }
        (client, schreiber)
    }

    /// Engine-Zustand auf einer In-Memory-Datenbank
    pub async fn test_state(config: EngineConfig) -> Arc<EngineState> {
        let db = Arc::new(SqliteDb::in_memory().await.unwrap());
        let metriken = FsdMetrics::neu().unwrap();
        EngineState::aus_datenbank(config, db, PasswortParameter::schnell(), metriken)
    }
}
