//! Periodischer Heartbeat
//!
//! Ruft in festem Takt einen async Callback auf, bis er gestoppt wird.
//! Der sofortige erste Tick von `tokio::time::interval` wird uebersprungen.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle auf einen laufenden Heartbeat-Task
pub struct Heartbeat {
    abbruch: CancellationToken,
    gestoppt: AtomicBool,
}

impl Heartbeat {
    /// Startet den Heartbeat auf der aktuellen Runtime
    pub fn starten<F, Fut>(intervall: Duration, mut callback: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let abbruch = CancellationToken::new();
        let token = abbruch.clone();
        // interval() akzeptiert keine Null-Dauer
        let intervall = intervall.max(Duration::from_millis(1));

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(intervall);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => callback().await,
                }
            }
            tracing::debug!("Heartbeat beendet");
        });

        tracing::debug!(intervall_ms = intervall.as_millis() as u64, "Heartbeat gestartet");
        Self {
            abbruch,
            gestoppt: AtomicBool::new(false),
        }
    }

    /// Stoppt den Heartbeat. Nur der erste Aufruf liefert `true`.
    pub fn stoppen(&self) -> bool {
        if self.gestoppt.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.abbruch.cancel();
        true
    }

    pub fn ist_gestoppt(&self) -> bool {
        self.gestoppt.load(Ordering::SeqCst)
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.abbruch.cancel();
    }
}
