//! Gemeinsame Hilfen fuer die TCP-Integrationstests
//!
//! Startet einen `FsdServer` auf einem freien Port mit In-Memory-SQLite und
//! stellt einen zeilenbasierten Test-Client bereit.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fsd_auth::PasswortParameter;
use fsd_db::SqliteDb;
use fsd_engine::{EngineConfig, EngineState, FsdServer};
use fsd_observability::FsdMetrics;
use fsd_protocol::ZeilenCodec;
use futures_util::{SinkExt, StreamExt};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;

pub const PILOT_LOGIN: &str = "#APABC123:SERVER:1000001:geheim:0:9:1:Pilot Eins EDDF";
pub const ATC_LOGIN: &str = "#AAEDDF_TWR:SERVER:Lotse Zwei:1000002:geheim:5:9";

/// Wartezeit auf eine erwartete Zeile
const WARTEZEIT: Duration = Duration::from_secs(3);

pub fn test_config() -> EngineConfig {
    EngineConfig {
        motd: vec!["Willkommen".to_string()],
        reconnect_grace: Duration::from_secs(5),
        flush_timeout: Duration::from_millis(200),
        ..EngineConfig::default()
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: Arc<EngineState>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    /// Startet einen Server mit den Testkonten 1000001 (Pilot) und
    /// 1000002 (Supervisor)
    pub async fn starten(config: EngineConfig) -> Self {
        let db = Arc::new(
            SqliteDb::in_memory()
                .await
                .expect("In-Memory DB konnte nicht erstellt werden"),
        );
        let metriken = FsdMetrics::neu().expect("Metriken");
        let state = EngineState::aus_datenbank(config, db, PasswortParameter::schnell(), metriken);

        state
            .auth
            .registrieren("1000001", "Pilot Eins", "geheim", 1)
            .await
            .expect("Pilotkonto");
        state
            .auth
            .registrieren("1000002", "Lotse Zwei", "geheim", 11)
            .await
            .expect("Lotsenkonto");

        let server = FsdServer::binden(Arc::clone(&state), "127.0.0.1:0".parse().unwrap())
            .await
            .expect("Bind fehlgeschlagen");
        let addr = server.lokale_adresse().expect("Lokale Adresse");

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(server.starten(shutdown_rx));

        Self {
            addr,
            state,
            shutdown_tx,
            task,
        }
    }

    pub async fn verbinden(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr)
            .await
            .expect("Verbindung fehlgeschlagen");
        TestClient {
            framed: Framed::new(stream, ZeilenCodec::default()),
        }
    }

    /// Verbindet und meldet an; MOTD wird abgewartet
    pub async fn anmelden(&self, login: &str, callsign: &str) -> TestClient {
        let mut client = self.verbinden().await;
        client.senden(login).await;
        client
            .erwarte(&format!("#TMSERVER:{callsign}:Willkommen"))
            .await;
        client
    }

    pub async fn stoppen(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = tokio::time::timeout(WARTEZEIT, self.task).await;
        let _ = self.state.registry.shutdown(Duration::from_secs(1)).await;
    }
}

pub struct TestClient {
    framed: Framed<TcpStream, ZeilenCodec>,
}

impl TestClient {
    pub async fn senden(&mut self, zeile: &str) {
        self.framed.send(zeile).await.expect("Senden fehlgeschlagen");
    }

    /// Schreibt Bytes unveraendert am Codec vorbei
    pub async fn senden_roh(&mut self, bytes: &[u8]) {
        let stream = self.framed.get_mut();
        stream.write_all(bytes).await.expect("Senden fehlgeschlagen");
        stream.flush().await.expect("Flush fehlgeschlagen");
    }

    /// Naechste Zeile; `None` wenn der Server die Verbindung geschlossen hat
    pub async fn zeile(&mut self) -> Option<String> {
        match tokio::time::timeout(WARTEZEIT, self.framed.next()).await {
            Ok(Some(Ok(zeile))) => Some(zeile),
            Ok(Some(Err(_))) | Ok(None) => None,
            Err(_) => panic!("Keine Zeile innerhalb von {WARTEZEIT:?}"),
        }
    }

    /// Liest bis eine Zeile mit `praefix` beginnt, andere werden verworfen
    pub async fn erwarte(&mut self, praefix: &str) -> String {
        loop {
            match self.zeile().await {
                Some(zeile) if zeile.starts_with(praefix) => return zeile,
                Some(_) => continue,
                None => panic!("Verbindung geschlossen, erwartet: {praefix}"),
            }
        }
    }

    /// Liest bis der Server die Verbindung schliesst
    pub async fn erwarte_ende(&mut self) -> Vec<String> {
        let mut rest = Vec::new();
        while let Some(zeile) = self.zeile().await {
            rest.push(zeile);
        }
        rest
    }

    /// `true` wenn innerhalb von `dauer` nichts ankommt
    pub async fn ist_still(&mut self, dauer: Duration) -> bool {
        tokio::time::timeout(dauer, self.framed.next()).await.is_err()
    }
}
