//! fsd-server – Bibliotheks-Root
//!
//! Verdrahtet Datenbank, Engine, TCP-Listener und Observability und
//! steuert das geordnete Herunterfahren.

pub mod config;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{KontoEinstellung, ServerConfig};
use fsd_auth::{AuthService, PasswortParameter};
use fsd_db::{SqliteDb, UserRepository};
use fsd_engine::{EngineError, EngineState, FsdServer};
use fsd_observability::{observability_server_starten, FsdMetrics, HealthState};
use tokio::sync::watch;

const DB_PRUEF_INTERVALL: Duration = Duration::from_secs(30);

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Laeuft bis SIGINT oder SIGTERM
    pub async fn starten(self) -> Result<()> {
        self.starten_bis(shutdown_signal()).await
    }

    /// Startet alle Subsysteme und faehrt herunter sobald `signal` endet
    ///
    /// Reihenfolge:
    /// 1. Datenbank oeffnen, Konten anlegen
    /// 2. Observability-Server starten
    /// 3. Heartbeat und TCP-Listener starten
    /// 4. Auf das Signal warten
    /// 5. Listener stoppen, Registry herunterfahren, Pool schliessen
    pub async fn starten_bis(self, signal: impl Future<Output = ()>) -> Result<()> {
        let engine_config = self.config.engine_config()?;
        let heartbeat = engine_config.heartbeat_intervall;
        let tcp_adresse = self.config.tcp_bind_adresse()?;

        tracing::info!(
            server_name = %self.config.server.name,
            tcp = %tcp_adresse,
            protokoll = engine_config.protokoll_version,
            "Server startet"
        );

        let db = Arc::new(
            SqliteDb::oeffnen(&self.config.datenbank_config())
                .await
                .with_context(|| format!("Datenbank '{}' nicht verfuegbar", self.config.datenbank.url))?,
        );

        let metriken = FsdMetrics::neu()?;
        let health = HealthState::neu(&self.config.server.name, metriken.connected_clients.clone());
        let state = EngineState::aus_datenbank(
            engine_config,
            Arc::clone(&db),
            PasswortParameter::default(),
            metriken.clone(),
        );
        konten_anlegen(&state.auth, db.as_ref(), &self.config.konten).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let observability = if self.config.observability.aktiviert {
            let adresse = self.config.observability_bind_adresse()?;
            let rx = shutdown_rx.clone();
            let health = health.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = observability_server_starten(adresse, metriken, health, rx).await {
                    tracing::error!(fehler = %e, "Observability-Server fehlgeschlagen");
                }
            }))
        } else {
            None
        };

        let db_pruefung = tokio::spawn(db_pruefen(
            Arc::clone(&db),
            health.clone(),
            shutdown_rx.clone(),
        ));

        state.registry.heartbeat_starten(heartbeat);

        let listener = FsdServer::binden(Arc::clone(&state), tcp_adresse)
            .await
            .with_context(|| format!("TCP-Bind auf {tcp_adresse} fehlgeschlagen"))?;
        let mut tcp_task = tokio::spawn(listener.starten(shutdown_rx));

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal...");
        tokio::select! {
            _ = signal => {
                tracing::info!("Shutdown-Signal empfangen, Server wird beendet");
            }
            ergebnis = &mut tcp_task => {
                tracing::error!(ergebnis = ?ergebnis, "TCP-Listener unerwartet beendet");
            }
        }

        health.herunterfahren_melden();
        let _ = shutdown_tx.send(true);
        if !tcp_task.is_finished() {
            let _ = tcp_task.await;
        }

        match state.registry.shutdown(self.config.shutdown_frist()).await {
            Ok(()) => {}
            Err(EngineError::Timeout) => {
                tracing::warn!("Nicht alle Clients rechtzeitig abgemeldet");
            }
            Err(e) => tracing::warn!(fehler = %e, "Registry-Shutdown fehlgeschlagen"),
        }

        if let Some(task) = observability {
            let _ = task.await;
        }
        let _ = db_pruefung.await;
        db.schliessen().await;

        tracing::info!("Server beendet");
        Ok(())
    }
}

/// Legt konfigurierte Konten an, vorhandene bleiben unveraendert
pub async fn konten_anlegen(
    auth: &AuthService,
    benutzer: &dyn UserRepository,
    konten: &[KontoEinstellung],
) -> Result<()> {
    for konto in konten {
        if benutzer.get_by_cid(&konto.cid).await?.is_some() {
            continue;
        }
        auth.registrieren(&konto.cid, &konto.name, &konto.passwort, konto.rating)
            .await
            .with_context(|| format!("Konto {} nicht angelegt", konto.cid))?;
        tracing::info!(cid = %konto.cid, rating = konto.rating, "Konto angelegt");
    }
    Ok(())
}

/// Prueft die Datenbank periodisch und spiegelt das Ergebnis in `/health`
async fn db_pruefen(db: Arc<SqliteDb>, health: HealthState, mut shutdown_rx: watch::Receiver<bool>) {
    let mut takt = tokio::time::interval(DB_PRUEF_INTERVALL);
    takt.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = takt.tick() => health.db_status_setzen(db.erreichbar().await),
            _ = async { let _ = shutdown_rx.wait_for(|v| *v).await; } => return,
        }
    }
}

/// Wartet auf Ctrl-C oder (unter Unix) SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(fehler = %e, "Ctrl-C-Handler nicht installierbar");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let term = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => {
                tracing::error!(fehler = %e, "SIGTERM-Handler nicht installierbar");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let term = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = term => {}
    }
}
