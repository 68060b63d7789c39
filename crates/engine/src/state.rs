//! Gemeinsamer Engine-Zustand
//!
//! Haelt Konfiguration, Registry und alle Kollaborateure als Arc-Referenzen,
//! die zwischen Sessions geteilt werden. Es gibt keinen globalen Zustand:
//! der Server baut `EngineState` einmal und reicht ihn an jede Session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use fsd_auth::{AuthService, PasswortParameter};
use fsd_db::{FlightPlanRepository, HistoryRepository, SqliteDb, UserRepository};
use fsd_observability::FsdMetrics;
use fsd_protocol::wire::DEFAULT_MAX_ZEILENLAENGE;
use fsd_protocol::{RatingFacilityTabelle, ZeilenCodec, ZEILENENDE};

use crate::registry::{ClientRegistry, RegistryConfig};

/// Konfiguration der Protokoll-Engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Anzeigename des Servers
    pub server_name: String,
    /// Zeilen der Begruessung nach dem Login
    pub motd: Vec<String>,
    /// Maximale gleichzeitige TCP-Verbindungen
    pub max_clients: usize,
    /// Erwartete Protokollversion beim Login
    pub protokoll_version: u32,
    /// Im Simulatormodus sperrt `$AM` den Flugplan nicht
    pub simulator_modus: bool,
    pub reconnect_grace: Duration,
    pub heartbeat_intervall: Duration,
    /// Maximal gleichzeitige Sendevorgaenge pro Broadcast
    pub broadcast_worker: usize,
    pub sende_timeout: Duration,
    /// So lange darf der Schreib-Task nach Session-Ende noch leeren
    pub flush_timeout: Duration,
    /// Jedes wievielte Positionsupdate in den Pfad geht
    pub pfad_intervall: u32,
    /// `*S` nur an genau Supervisor statt ab Supervisor
    pub supervisor_strikt: bool,
    pub zeilen_trenner: String,
    pub max_zeilenlaenge: usize,
    /// Kapazitaet der Ausgangs-Queue pro Verbindung
    pub ausgang_puffer: usize,
    pub rating_tabelle: RatingFacilityTabelle,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            server_name: "FSD Server".to_string(),
            motd: Vec::new(),
            max_clients: 1000,
            protokoll_version: 9,
            simulator_modus: false,
            reconnect_grace: Duration::from_secs(60),
            heartbeat_intervall: Duration::from_secs(60),
            broadcast_worker: 32,
            sende_timeout: Duration::from_secs(2),
            flush_timeout: Duration::from_millis(500),
            pfad_intervall: 1,
            supervisor_strikt: false,
            zeilen_trenner: ZEILENENDE.to_string(),
            max_zeilenlaenge: DEFAULT_MAX_ZEILENLAENGE,
            ausgang_puffer: 256,
            rating_tabelle: RatingFacilityTabelle::standard(),
        }
    }
}

impl EngineConfig {
    /// Frischer Codec fuer eine Verbindung
    pub fn codec(&self) -> ZeilenCodec {
        ZeilenCodec::mit_trenner(&self.zeilen_trenner, self.max_zeilenlaenge)
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            reconnect_grace: self.reconnect_grace,
            broadcast_worker: self.broadcast_worker,
            sende_timeout: self.sende_timeout,
        }
    }
}

/// Gemeinsamer Engine-Zustand (thread-safe, Arc-geteilt)
pub struct EngineState {
    pub config: Arc<EngineConfig>,
    pub registry: Arc<ClientRegistry>,
    pub auth: Arc<AuthService>,
    pub flugplaene: Arc<dyn FlightPlanRepository>,
    pub historie: Arc<dyn HistoryRepository>,
    pub metriken: FsdMetrics,
    session_zaehler: AtomicU64,
    /// Startzeitpunkt (fuer Uptime-Berechnung)
    pub start_time: Instant,
}

impl EngineState {
    pub fn neu(
        config: EngineConfig,
        auth: Arc<AuthService>,
        benutzer: Arc<dyn UserRepository>,
        flugplaene: Arc<dyn FlightPlanRepository>,
        historie: Arc<dyn HistoryRepository>,
        metriken: FsdMetrics,
    ) -> Arc<Self> {
        let registry = ClientRegistry::neu(config.registry_config())
            .mit_persistenz(benutzer, Arc::clone(&historie))
            .mit_metriken(metriken.clone());

        Arc::new(Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            auth,
            flugplaene,
            historie,
            metriken,
            session_zaehler: AtomicU64::new(1),
            start_time: Instant::now(),
        })
    }

    /// Verdrahtet alle Repositories mit einer SQLite-Datenbank
    pub fn aus_datenbank(
        config: EngineConfig,
        db: Arc<SqliteDb>,
        passwort: PasswortParameter,
        metriken: FsdMetrics,
    ) -> Arc<Self> {
        let benutzer: Arc<dyn UserRepository> = db.clone();
        let flugplaene: Arc<dyn FlightPlanRepository> = db.clone();
        let historie: Arc<dyn HistoryRepository> = db;
        let auth = Arc::new(AuthService::mit_parametern(Arc::clone(&benutzer), passwort));

        Self::neu(config, auth, benutzer, flugplaene, historie, metriken)
    }

    /// Vergibt eine prozessweit eindeutige Session-ID
    pub fn naechste_session_id(&self) -> u64 {
        self.session_zaehler.fetch_add(1, Ordering::Relaxed)
    }

    pub fn uptime_sek(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
