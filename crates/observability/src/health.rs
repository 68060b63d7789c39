//! `GET /health` – Zustand des FSD-Servers als JSON
//!
//! Liefert 503 sobald der Server herunterfaehrt. Eine nicht erreichbare
//! Datenbank meldet `degraded`, aber weiter 200: verbundene Clients
//! fliegen ohne Datenbank weiter, nur neue Logins scheitern.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use prometheus::IntGauge;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub server: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub db_connected: bool,
    pub clients_online: i64,
}

/// Geteilter Zustand; Server und DB-Pruefung schreiben, `/health` liest
#[derive(Clone)]
pub struct HealthState {
    server_name: Arc<str>,
    gestartet: Instant,
    db_verbunden: Arc<AtomicBool>,
    faehrt_herunter: Arc<AtomicBool>,
    clients_online: IntGauge,
}

impl HealthState {
    /// `clients_online` ist das Gauge aus [`crate::FsdMetrics`]
    pub fn neu(server_name: &str, clients_online: IntGauge) -> Self {
        Self {
            server_name: Arc::from(server_name),
            gestartet: Instant::now(),
            db_verbunden: Arc::new(AtomicBool::new(true)),
            faehrt_herunter: Arc::new(AtomicBool::new(false)),
            clients_online,
        }
    }

    pub fn db_verbunden(&self) -> bool {
        self.db_verbunden.load(Ordering::Relaxed)
    }

    /// Meldet nur Wechsel, damit das Log bei Dauerausfall ruhig bleibt
    pub fn db_status_setzen(&self, verbunden: bool) {
        let vorher = self.db_verbunden.swap(verbunden, Ordering::Relaxed);
        if vorher && !verbunden {
            tracing::warn!("Datenbank nicht erreichbar");
        } else if !vorher && verbunden {
            tracing::info!("Datenbank wieder erreichbar");
        }
    }

    pub fn herunterfahren_melden(&self) {
        self.faehrt_herunter.store(true, Ordering::Relaxed);
    }

    fn status(&self) -> HealthStatus {
        if self.faehrt_herunter.load(Ordering::Relaxed) {
            HealthStatus::Unhealthy
        } else if self.db_verbunden() {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        }
    }

    fn antwort(&self) -> HealthResponse {
        HealthResponse {
            status: self.status(),
            server: self.server_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: self.gestartet.elapsed().as_secs(),
            db_connected: self.db_verbunden(),
            clients_online: self.clients_online.get(),
        }
    }
}

pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .with_state(state)
}

async fn health_handler(State(state): State<HealthState>) -> impl IntoResponse {
    let antwort = state.antwort();
    let code = match antwort.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (code, Json(antwort))
}
