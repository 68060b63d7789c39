//! Session – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `Session` in einem eigenen tokio-Task.
//! Gelesen wird ueber `FramedRead<_, ZeilenCodec>`, geschrieben ueber einen
//! eigenen Schreib-Task, den eine mpsc-Queue speist. Broadcasts anderer
//! Sessions landen in derselben Queue.
//!
//! ## State Machine
//! ```text
//! Unauthentifiziert --Login--> Registriert --Logout/Fehler/EOF--> Beendend
//!         |                                                          ^
//!         +-------------------- fataler Fehler ---------------------+
//! ```
//!
//! ## Verbindungsende
//! - EOF, Lesefehler, Kick: Abmeldung an alle in Reichweite, danach bleibt
//!   der Client fuer das Reconnect-Fenster getrennt registriert
//! - Fataler Fehler: Fehlerzeile wird noch geschrieben, der Client sofort
//!   entfernt
//! - Logout: der Handler hat bereits aufgeraeumt

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use fsd_db::models::BenutzerRecord;
use fsd_observability::FsdMetrics;
use fsd_protocol::mit_zeilenende;
use fsd_protocol::nachricht::{entfernen_zeile, fehler_zeile};
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;

use crate::client::{Client, ClientInterface, Verbindung, ZeilenSchreiber};
use crate::dispatcher::Dispatcher;
use crate::error::{EngineError, EngineResult};
use crate::filter;
use crate::handlers::BefehlFehler;
use crate::state::EngineState;

/// Callsign einer Session vor dem Login
pub const UNBEKANNT: &str = "unknown";

// ---------------------------------------------------------------------------
// Schreibseite
// ---------------------------------------------------------------------------

/// Schreibt in die Ausgangs-Queue einer Verbindung
pub struct KanalSchreiber {
    tx: mpsc::Sender<Arc<str>>,
}

impl KanalSchreiber {
    pub fn neu(tx: mpsc::Sender<Arc<str>>) -> Self {
        Self { tx }
    }
}

#[async_trait]
impl ZeilenSchreiber for KanalSchreiber {
    async fn schreiben(&self, zeile: Arc<str>) -> EngineResult<()> {
        self.tx
            .send(zeile)
            .await
            .map_err(|_| EngineError::ClientGetrennt)
    }

    fn ist_geschlossen(&self) -> bool {
        self.tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionZustand {
    Unauthentifiziert,
    Registriert,
    Beendend,
}

/// Zustand einer Verbindung, den der Dispatcher veraendert
pub struct Session {
    pub id: u64,
    pub peer: SocketAddr,
    /// Callsign nach dem Login, vorher `unknown`
    pub callsign: String,
    pub client: Option<Arc<Client>>,
    pub benutzer: Option<BenutzerRecord>,
    pub zustand: SessionZustand,
    schreiber: Arc<dyn ZeilenSchreiber>,
    abbruch: CancellationToken,
}

impl Session {
    pub fn neu(id: u64, peer: SocketAddr, schreiber: Arc<dyn ZeilenSchreiber>) -> Self {
        Self {
            id,
            peer,
            callsign: UNBEKANNT.to_string(),
            client: None,
            benutzer: None,
            zustand: SessionZustand::Unauthentifiziert,
            schreiber,
            abbruch: CancellationToken::new(),
        }
    }

    /// Bindung fuer einen Client an diese Verbindung
    pub fn verbindung(&self) -> Verbindung {
        Verbindung {
            session_id: self.id,
            peer: self.peer,
            schreiber: Arc::clone(&self.schreiber),
            abbruch: self.abbruch.clone(),
        }
    }

    pub fn abbruch(&self) -> &CancellationToken {
        &self.abbruch
    }

    /// Sendet eine Zeile nur an diese Verbindung
    pub async fn antworten(&self, zeile: &str) {
        let zeile: Arc<str> = Arc::from(mit_zeilenende(zeile));
        if let Err(e) = self.schreiber.schreiben(zeile).await {
            tracing::debug!(session = self.id, fehler = %e, "Antwort nicht zustellbar");
        }
    }

    /// Schickt die `$ER`-Zeile eines fehlgeschlagenen Befehls
    pub async fn fehler_melden(&self, fehler: &BefehlFehler, metriken: &FsdMetrics) {
        metriken.protokollfehler(fehler.code.label());
        tracing::debug!(
            session = self.id,
            callsign = %self.callsign,
            fehler = %fehler,
            "Befehl abgelehnt"
        );
        self.antworten(&fehler_zeile(&self.callsign, fehler.code, &fehler.kontext))
            .await;
    }
}

// ---------------------------------------------------------------------------
// Verbindungs-Task
// ---------------------------------------------------------------------------

/// Verarbeitet eine Verbindung bis sie endet
///
/// Laeuft bis EOF, Lesefehler, fatalem Fehler, Logout, Kick oder bis
/// `shutdown_rx` ein `true`-Signal empfaengt.
pub async fn verarbeiten<S>(
    state: Arc<EngineState>,
    stream: S,
    peer: SocketAddr,
    mut shutdown_rx: watch::Receiver<bool>,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let id = state.naechste_session_id();
    let (lesen, schreiben) = tokio::io::split(stream);
    let mut zeilen = FramedRead::new(lesen, state.config.codec());
    let mut ausgang = FramedWrite::new(schreiben, state.config.codec());

    let (tx, mut rx) = mpsc::channel::<Arc<str>>(state.config.ausgang_puffer.max(1));

    let mut schreib_task = tokio::spawn(async move {
        while let Some(zeile) = rx.recv().await {
            if let Err(e) = ausgang.send(zeile).await {
                tracing::debug!(peer = %peer, fehler = %e, "Schreiben fehlgeschlagen");
                break;
            }
        }
        // Codec kodiert mehrere Typen, Sink-Typ daher explizit
        let _ = SinkExt::<Arc<str>>::close(&mut ausgang).await;
    });

    let mut session = Session::neu(id, peer, Arc::new(KanalSchreiber::neu(tx)));
    let abbruch = session.abbruch.clone();
    let dispatcher = Dispatcher::neu(Arc::clone(&state));
    let mut fatal = false;

    tracing::info!(peer = %peer, session = id, "Neue Verbindung");

    loop {
        tokio::select! {
            _ = abbruch.cancelled() => {
                tracing::debug!(peer = %peer, session = id, "Session abgebrochen");
                break;
            }

            Ok(()) = shutdown_rx.changed() => {
                if *shutdown_rx.borrow() {
                    tracing::info!(peer = %peer, "Shutdown-Signal – Verbindung wird getrennt");
                    break;
                }
            }

            zeile = zeilen.next() => {
                match zeile {
                    Some(Ok(zeile)) => {
                        tracing::trace!(peer = %peer, laenge = zeile.len(), "Zeile empfangen");
                        if let Err(fehler) = dispatcher.zeile_verarbeiten(&zeile, &mut session).await {
                            session.fehler_melden(&fehler, &state.metriken).await;
                            if fehler.fatal {
                                fatal = true;
                                break;
                            }
                        }
                        if session.zustand == SessionZustand::Beendend {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(peer = %peer, fehler = %e, "Lesefehler");
                        break;
                    }
                    None => {
                        tracing::info!(peer = %peer, callsign = %session.callsign, "Verbindung vom Client getrennt");
                        break;
                    }
                }
            }
        }
    }

    session.zustand = SessionZustand::Beendend;
    if let Some(client) = session.client.take() {
        aufraeumen(&state, &client, id, fatal).await;
    }

    // Queue schliessen, dann noch ausstehende Zeilen (z.B. $ER) kurz leeren
    drop(session);
    if tokio::time::timeout(state.config.flush_timeout, &mut schreib_task)
        .await
        .is_err()
    {
        tracing::debug!(peer = %peer, "Schreib-Task abgebrochen");
        schreib_task.abort();
    }

    tracing::info!(peer = %peer, session = id, "Verbindungs-Task beendet");
}

async fn aufraeumen(state: &EngineState, client: &Arc<Client>, session_id: u64, fatal: bool) {
    // Gehoert der Client inzwischen einer anderen Session, bleibt er unberuehrt
    if client.letzte_session_id() != session_id {
        return;
    }

    if fatal {
        state.registry.disconnect_client(client, true, None).await;
        return;
    }

    if client.ist_getrennt() {
        return;
    }
    let zeile = entfernen_zeile(client.callsign(), client.ist_atc());
    state
        .registry
        .broadcast_message(&zeile, Some(client), &filter::in_range())
        .await;
    state
        .registry
        .disconnect_client(client, false, Some(session_id))
        .await;
}
