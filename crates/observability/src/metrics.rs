//! Prometheus-kompatible Metriken fuer den FSD-Server
//!
//! Registrierte Metriken:
//! - `fsd_connected_clients` – Gauge: Aktuell registrierte Clients
//! - `fsd_logins_total` – Counter: Erfolgreiche Logins (neu und Reconnect)
//! - `fsd_protocol_errors_total` – Counter: Gesendete Fehlerzeilen (code)
//! - `fsd_broadcasts_total` – Counter: Ausgefuehrte Broadcasts

use anyhow::Result;
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Alle FSD-Prometheus-Metriken
#[derive(Clone)]
pub struct FsdMetrics {
    pub registry: Arc<Registry>,

    pub connected_clients: IntGauge,
    pub logins_total: IntCounter,
    pub protocol_errors_total: IntCounterVec,
    pub broadcasts_total: IntCounter,
}

impl FsdMetrics {
    /// Erstellt und registriert alle Metriken in einer neuen Registry
    pub fn neu() -> Result<Self> {
        let registry = Registry::new();

        let connected_clients = IntGauge::with_opts(Opts::new(
            "fsd_connected_clients",
            "Anzahl aktuell registrierter Clients",
        ))?;
        registry.register(Box::new(connected_clients.clone()))?;

        let logins_total = IntCounter::with_opts(Opts::new(
            "fsd_logins_total",
            "Gesamtanzahl erfolgreicher Logins",
        ))?;
        registry.register(Box::new(logins_total.clone()))?;

        let protocol_errors_total = IntCounterVec::new(
            Opts::new(
                "fsd_protocol_errors_total",
                "Gesamtanzahl gesendeter Protokoll-Fehlerzeilen",
            ),
            &["code"],
        )?;
        registry.register(Box::new(protocol_errors_total.clone()))?;

        let broadcasts_total = IntCounter::with_opts(Opts::new(
            "fsd_broadcasts_total",
            "Gesamtanzahl ausgefuehrter Broadcasts",
        ))?;
        registry.register(Box::new(broadcasts_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            connected_clients,
            logins_total,
            protocol_errors_total,
            broadcasts_total,
        })
    }

    /// Zaehlt eine Fehlerzeile unter ihrem Code-Label
    pub fn protokollfehler(&self, code: &str) {
        self.protocol_errors_total.with_label_values(&[code]).inc();
    }

    /// Exportiert alle Metriken im Prometheus-Textformat
    pub fn exportieren(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Axum-Router fuer den `/metrics`-Endpunkt
pub fn metrics_router(metriken: FsdMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metriken)
}

async fn metrics_handler(State(metriken): State<FsdMetrics>) -> impl IntoResponse {
    match metriken.exportieren() {
        Ok(text) => (
            axum::http::StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(err) => {
            tracing::error!("Metriken-Export fehlgeschlagen: {err}");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metriken_erstellen_erfolgreich() {
        let metriken = FsdMetrics::neu().unwrap();
        metriken.logins_total.inc();
        assert!(!metriken.registry.gather().is_empty());
    }

    #[test]
    fn gauge_connected_clients_setzen() {
        let metriken = FsdMetrics::neu().unwrap();
        metriken.connected_clients.set(42);
        assert_eq!(metriken.connected_clients.get(), 42);
    }

    #[test]
    fn protokollfehler_nach_code() {
        let metriken = FsdMetrics::neu().unwrap();
        metriken.protokollfehler("callsign_in_use");
        metriken.protokollfehler("callsign_in_use");
        metriken.protokollfehler("syntax_error");

        let text = metriken.exportieren().unwrap();
        assert!(text.contains("fsd_protocol_errors_total{code=\"callsign_in_use\"} 2"));
        assert!(text.contains("fsd_protocol_errors_total{code=\"syntax_error\"} 1"));
    }

    #[tokio::test]
    async fn metrics_endpunkt_liefert_text() {
        use tower::ServiceExt;

        let metriken = FsdMetrics::neu().unwrap();
        metriken.broadcasts_total.inc();

        let antwort = metrics_router(metriken)
            .oneshot(
                axum::http::Request::builder()
                    .uri("/metrics")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(antwort.status(), axum::http::StatusCode::OK);

        let body = axum::body::to_bytes(antwort.into_body(), usize::MAX).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("fsd_broadcasts_total 1"));
    }
}
