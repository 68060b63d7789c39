//! TCP-Listener – Bindet Socket, akzeptiert Verbindungen
//!
//! Der `FsdServer` startet fuer jede eingehende Verbindung einen eigenen
//! tokio-Task mit einer Session. Ein Semaphore begrenzt die Zahl
//! gleichzeitiger Verbindungen; wer darueber liegt, bekommt noch eine
//! `ServerFull`-Fehlerzeile und wird getrennt.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use fsd_protocol::nachricht::fehler_zeile;
use fsd_protocol::FehlerCode;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};

use crate::session::{self, UNBEKANNT};
use crate::state::EngineState;

/// So lange darf die Absage an einen abgewiesenen Client dauern
const ABSAGE_TIMEOUT: Duration = Duration::from_secs(1);

/// TCP-Server des FSD-Protokolls
pub struct FsdServer {
    state: Arc<EngineState>,
    listener: TcpListener,
    verbindungen: Arc<Semaphore>,
}

impl FsdServer {
    /// Bindet den Socket; Port 0 waehlt einen freien Port
    pub async fn binden(state: Arc<EngineState>, addr: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let verbindungen = Arc::new(Semaphore::new(state.config.max_clients));
        Ok(Self {
            state,
            listener,
            verbindungen,
        })
    }

    pub fn lokale_adresse(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Akzeptiert Verbindungen bis `shutdown_rx` ein `true`-Signal empfaengt
    pub async fn starten(self, mut shutdown_rx: watch::Receiver<bool>) -> std::io::Result<()> {
        let lokale_addr = self.listener.local_addr()?;
        tracing::info!(
            adresse = %lokale_addr,
            max_clients = self.state.config.max_clients,
            "FSD-Server gestartet"
        );

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer_addr)) => self.annehmen(stream, peer_addr, &shutdown_rx),
                        Err(e) => {
                            tracing::error!(fehler = %e, "TCP-Accept-Fehler");
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                }

                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!("FSD-Server: Shutdown-Signal empfangen");
                        break;
                    }
                }
            }
        }

        tracing::info!("FSD-Server gestoppt");
        Ok(())
    }

    fn annehmen(&self, stream: TcpStream, peer: SocketAddr, shutdown_rx: &watch::Receiver<bool>) {
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(peer = %peer, fehler = %e, "TCP_NODELAY nicht gesetzt");
        }

        let Ok(permit) = Arc::clone(&self.verbindungen).try_acquire_owned() else {
            tracing::warn!(
                peer = %peer,
                max = self.state.config.max_clients,
                "Server voll – Verbindung abgelehnt"
            );
            self.state.metriken.protokollfehler(FehlerCode::ServerFull.label());
            tokio::spawn(absagen(stream, peer));
            return;
        };

        tracing::debug!(peer = %peer, "Verbindung akzeptiert");
        let state = Arc::clone(&self.state);
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move {
            let _permit = permit;
            session::verarbeiten(state, stream, peer, shutdown_rx).await;
        });
    }
}

async fn absagen(mut stream: TcpStream, peer: SocketAddr) {
    let zeile = fehler_zeile(UNBEKANNT, FehlerCode::ServerFull, "");
    let ergebnis = tokio::time::timeout(ABSAGE_TIMEOUT, async {
        stream.write_all(zeile.as_bytes()).await?;
        stream.shutdown().await
    })
    .await;
    if !matches!(ergebnis, Ok(Ok(()))) {
        tracing::debug!(peer = %peer, "Absage nicht zugestellt");
    }
}
