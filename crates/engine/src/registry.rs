//! Client-Registry – Wer ist angemeldet
//!
//! Eine Map `callsign -> Arc<Client>` hinter einem `RwLock`. Broadcasts
//! arbeiten immer auf einem Snapshot: Lock nehmen, Liste kopieren, Lock
//! freigeben, erst dann senden. Das Client-Lock wird nie gehalten waehrend
//! das Registry-Lock genommen wird.
//!
//! ## Loeschen
//! Nur der Aufruf der den Client nach `Geloescht` ueberfuehrt schreibt die
//! Online-Zeit weg und schliesst den Historieneintrag.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fsd_db::{HistoryRepository, UserRepository};
use fsd_observability::FsdMetrics;
use fsd_protocol::{mit_zeilenende, nachricht::wind_zeile};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::client::{Client, ClientInterface, ZeilenSchreiber};
use crate::error::{EngineError, EngineResult};
use crate::filter::{self, Filter};
use crate::heartbeat::Heartbeat;

/// Wie viele Snapshot-Puffer der Pool hoechstens vorhaelt
const SNAPSHOT_POOL_MAX: usize = 16;

/// Maximale Windgeschwindigkeit des Heartbeats in Knoten
const WIND_MAX_KT: u32 = 40;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// So lange bleibt ein getrennter Client fuer einen Reconnect reserviert
    pub reconnect_grace: Duration,
    /// Maximal gleichzeitige Sendevorgaenge pro Broadcast
    pub broadcast_worker: usize,
    /// Zeitlimit pro Empfaenger
    pub sende_timeout: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            reconnect_grace: Duration::from_secs(60),
            broadcast_worker: 32,
            sende_timeout: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Momentaufnahme aller Clients
///
/// Gibt ihren Puffer beim Drop an den Pool der Registry zurueck.
pub struct ClientSnapshot<'a> {
    clients: Vec<Arc<Client>>,
    pool: &'a Mutex<Vec<Vec<Arc<Client>>>>,
}

impl Deref for ClientSnapshot<'_> {
    type Target = [Arc<Client>];

    fn deref(&self) -> &Self::Target {
        &self.clients
    }
}

impl Drop for ClientSnapshot<'_> {
    fn drop(&mut self) {
        let mut puffer = std::mem::take(&mut self.clients);
        puffer.clear();
        let mut pool = self.pool.lock();
        if pool.len() < SNAPSHOT_POOL_MAX {
            pool.push(puffer);
        }
    }
}

// ---------------------------------------------------------------------------
// ClientRegistry
// ---------------------------------------------------------------------------

pub struct ClientRegistry {
    clients: RwLock<HashMap<String, Arc<Client>>>,
    heruntergefahren: AtomicBool,
    snapshot_pool: Mutex<Vec<Vec<Arc<Client>>>>,
    heartbeat: Mutex<Option<Heartbeat>>,
    benutzer: Option<Arc<dyn UserRepository>>,
    historie: Option<Arc<dyn HistoryRepository>>,
    metriken: Option<FsdMetrics>,
    config: RegistryConfig,
}

impl ClientRegistry {
    pub fn neu(config: RegistryConfig) -> Self {
        Self {
            clients: RwLock::new(HashMap::new()),
            heruntergefahren: AtomicBool::new(false),
            snapshot_pool: Mutex::new(Vec::new()),
            heartbeat: Mutex::new(None),
            benutzer: None,
            historie: None,
            metriken: None,
            config,
        }
    }

    /// Online-Zeit und Historie werden beim Loeschen hierhin geschrieben
    pub fn mit_persistenz(
        mut self,
        benutzer: Arc<dyn UserRepository>,
        historie: Arc<dyn HistoryRepository>,
    ) -> Self {
        self.benutzer = Some(benutzer);
        self.historie = Some(historie);
        self
    }

    pub fn mit_metriken(mut self, metriken: FsdMetrics) -> Self {
        self.metriken = Some(metriken);
        self
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn ist_heruntergefahren(&self) -> bool {
        self.heruntergefahren.load(Ordering::SeqCst)
    }

    pub fn online_anzahl(&self) -> usize {
        self.clients.read().len()
    }

    fn gauge_aktualisieren(&self, anzahl: usize) {
        if let Some(m) = &self.metriken {
            m.connected_clients.set(anzahl as i64);
        }
    }

    /// Registriert einen neuen Client
    ///
    /// Ein geloeschter Eintrag unter demselben Callsign wird ersetzt.
    pub fn add_client(&self, client: Arc<Client>) -> EngineResult<()> {
        let mut clients = self.clients.write();
        // Unter dem Write-Lock pruefen, sonst rutscht ein Client am Shutdown vorbei
        if self.ist_heruntergefahren() {
            return Err(EngineError::ShutdownInProgress);
        }
        if let Some(vorhanden) = clients.get(client.callsign()) {
            if !vorhanden.ist_geloescht() {
                return Err(EngineError::AlreadyRegistered(client.callsign().to_string()));
            }
        }
        clients.insert(client.callsign().to_string(), client);
        let anzahl = clients.len();
        drop(clients);

        self.gauge_aktualisieren(anzahl);
        Ok(())
    }

    /// Client unter dem Callsign; `None` waehrend des Herunterfahrens
    pub fn get_client(&self, callsign: &str) -> Option<Arc<Client>> {
        if self.ist_heruntergefahren() {
            return None;
        }
        self.clients
            .read()
            .get(callsign)
            .filter(|c| !c.ist_geloescht())
            .cloned()
    }

    /// Loescht den Client sofort. `false` wenn nicht vorhanden.
    pub async fn delete_client(&self, callsign: &str) -> bool {
        let client = self.clients.read().get(callsign).cloned();
        match client {
            Some(client) => self.entfernen(&client).await,
            None => false,
        }
    }

    async fn entfernen(&self, client: &Arc<Client>) -> bool {
        let uebergang = client.als_geloescht_markieren();
        self.austragen(client, uebergang).await;
        uebergang
    }

    /// Nimmt den Eintrag aus der Map und sichert beim Uebergang die Online-Zeit
    async fn austragen(&self, client: &Arc<Client>, uebergang: bool) {
        let anzahl = {
            let mut clients = self.clients.write();
            // Nur den eigenen Eintrag entfernen, nie einen Nachfolger
            if clients
                .get(client.callsign())
                .is_some_and(|c| Arc::ptr_eq(c, client))
            {
                clients.remove(client.callsign());
            }
            clients.len()
        };
        self.gauge_aktualisieren(anzahl);

        if uebergang {
            tracing::info!(callsign = %client.callsign(), "Client entfernt");
            self.online_zeit_sichern(client).await;
        }
    }

    async fn online_zeit_sichern(&self, client: &Client) {
        let sekunden = client.online_sekunden();

        if let Some(benutzer) = &self.benutzer {
            if let Err(e) = benutzer
                .online_zeit_addieren(client.cid(), client.ist_atc(), sekunden)
                .await
            {
                tracing::warn!(callsign = %client.callsign(), fehler = %e, "Online-Zeit nicht gespeichert");
            }
        }

        if let (Some(historie), Some(id)) = (&self.historie, client.history_id()) {
            if let Err(e) = historie.beenden(id, sekunden).await {
                tracing::warn!(callsign = %client.callsign(), fehler = %e, "Historie nicht abgeschlossen");
            }
        }
    }

    /// Momentaufnahme aller registrierten Clients
    pub fn snapshot(&self) -> ClientSnapshot<'_> {
        let mut puffer = self.snapshot_pool.lock().pop().unwrap_or_default();
        puffer.extend(self.clients.read().values().cloned());
        ClientSnapshot {
            clients: puffer,
            pool: &self.snapshot_pool,
        }
    }

    /// Sendet eine Zeile an alle Clients die der Filter zulaesst
    ///
    /// `from` und zum Snapshot-Zeitpunkt getrennte Clients werden
    /// uebersprungen. Kehrt erst zurueck wenn alle Sendevorgaenge fertig
    /// oder abgelaufen sind und liefert die Anzahl erfolgreicher Zustellungen.
    pub async fn broadcast_message(
        &self,
        payload: &str,
        from: Option<&Arc<Client>>,
        filter: &Filter,
    ) -> usize {
        let zeile: Arc<str> = Arc::from(mit_zeilenende(payload));
        let von: Option<&dyn ClientInterface> = from.map(|f| &**f as &dyn ClientInterface);

        let empfaenger: Vec<(String, Arc<dyn ZeilenSchreiber>)> = {
            let snapshot = self.snapshot();
            snapshot
                .iter()
                .filter(|c| from.map_or(true, |f| !Arc::ptr_eq(f, c)))
                .filter(|c| {
                    let an: &dyn ClientInterface = c.as_ref();
                    filter(an, von)
                })
                .filter_map(|c| c.schreiber().map(|s| (c.callsign().to_string(), s)))
                .collect()
        };

        if let Some(m) = &self.metriken {
            m.broadcasts_total.inc();
        }
        if empfaenger.is_empty() {
            return 0;
        }

        let limit = Arc::new(Semaphore::new(self.config.broadcast_worker.max(1)));
        let mut tasks = JoinSet::new();

        for (callsign, schreiber) in empfaenger {
            let Ok(permit) = Arc::clone(&limit).acquire_owned().await else {
                break;
            };
            let zeile = Arc::clone(&zeile);
            let timeout = self.config.sende_timeout;

            tasks.spawn(async move {
                let _permit = permit;
                match tokio::time::timeout(timeout, schreiber.schreiben(zeile)).await {
                    Ok(Ok(())) => true,
                    Ok(Err(e)) => {
                        tracing::debug!(callsign = %callsign, fehler = %e, "Broadcast nicht zugestellt");
                        false
                    }
                    Err(_) => {
                        tracing::warn!(callsign = %callsign, "Broadcast-Timeout");
                        false
                    }
                }
            });
        }

        let mut zugestellt = 0;
        while let Some(ergebnis) = tasks.join_next().await {
            if matches!(ergebnis, Ok(true)) {
                zugestellt += 1;
            }
        }
        zugestellt
    }

    /// Unicast an ein Callsign
    pub async fn send_message_to(&self, callsign: &str, zeile: &str) -> EngineResult<()> {
        let client = self
            .get_client(callsign)
            .ok_or_else(|| EngineError::CallsignNotFound(callsign.to_string()))?;
        let zeile: Arc<str> = Arc::from(mit_zeilenende(zeile));

        match tokio::time::timeout(self.config.sende_timeout, client.senden(zeile)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(EngineError::CallsignNotFound(callsign.to_string())),
            Err(_) => Err(EngineError::Timeout),
        }
    }

    /// Trennt einen Client
    ///
    /// `sofort` loescht ihn direkt. Sonst bleibt er getrennt registriert und
    /// ein Timer loescht ihn nach Ablauf des Reconnect-Fensters. Mit
    /// `session_id` wirkt das Trennen nur auf die eigene Bindung.
    pub async fn disconnect_client(
        self: &Arc<Self>,
        client: &Arc<Client>,
        sofort: bool,
        session_id: Option<u64>,
    ) -> bool {
        if sofort {
            return self.entfernen(client).await;
        }

        let Some(generation) = client.als_getrennt_markieren(session_id) else {
            return false;
        };
        tracing::info!(
            callsign = %client.callsign(),
            grace_sek = self.config.reconnect_grace.as_secs(),
            "Client getrennt, warte auf Reconnect"
        );

        let registry = Arc::downgrade(self);
        let ziel = Arc::clone(client);
        let grace = self.config.reconnect_grace;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let Some(registry) = registry.upgrade() else {
                return;
            };
            if ziel.nach_ablauf_loeschen(generation) {
                tracing::info!(callsign = %ziel.callsign(), "Reconnect-Fenster abgelaufen");
                registry.austragen(&ziel, true).await;
            }
        });
        client.timer_setzen(generation, timer.abort_handle());
        true
    }

    /// Startet den Wind-Heartbeat; ein laufender wird ersetzt
    pub fn heartbeat_starten(self: &Arc<Self>, intervall: Duration) {
        let registry = Arc::downgrade(self);
        let heartbeat = Heartbeat::starten(intervall, move || {
            let registry = registry.clone();
            let (geschwindigkeit, richtung) = {
                let mut rng = rand::thread_rng();
                (rng.gen_range(0..=WIND_MAX_KT), rng.gen_range(0..360))
            };
            async move {
                if let Some(registry) = registry.upgrade() {
                    let zeile = wind_zeile(geschwindigkeit, richtung);
                    registry.broadcast_message(&zeile, None, &filter::immer()).await;
                }
            }
        });

        if let Some(alt) = self.heartbeat.lock().replace(heartbeat) {
            alt.stoppen();
        }
    }

    /// Faehrt die Registry herunter
    ///
    /// Stoppt den Heartbeat und loescht alle Clients parallel. Ein zweiter
    /// Aufruf liefert `ShutdownInProgress`, eine ueberschrittene Frist
    /// `Timeout`.
    pub async fn shutdown(self: &Arc<Self>, frist: Duration) -> EngineResult<()> {
        if self.heruntergefahren.swap(true, Ordering::SeqCst) {
            return Err(EngineError::ShutdownInProgress);
        }

        if let Some(heartbeat) = self.heartbeat.lock().take() {
            heartbeat.stoppen();
        }

        let alle: Vec<Arc<Client>> = self.clients.read().values().cloned().collect();
        tracing::info!(anzahl = alle.len(), "Registry wird heruntergefahren");

        let mut tasks = JoinSet::new();
        for client in alle {
            let registry = Arc::clone(self);
            tasks.spawn(async move {
                registry.entfernen(&client).await;
            });
        }

        let ergebnis = tokio::time::timeout(frist, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        match ergebnis {
            Ok(()) => {
                tracing::info!("Registry heruntergefahren");
                Ok(())
            }
            Err(_) => {
                tasks.abort_all();
                tracing::warn!(frist_ms = frist.as_millis() as u64, "Frist beim Herunterfahren ueberschritten");
                Err(EngineError::Timeout)
            }
        }
    }
}
