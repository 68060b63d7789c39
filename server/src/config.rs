//! Server-Konfiguration
//!
//! Wird beim Start aus einer TOML-Datei geladen. Alle Felder haben
//! sinnvolle Standardwerte, sodass der Server ohne Konfigurationsdatei
//! lauffaehig ist.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;
use fsd_db::DatabaseConfig;
use fsd_engine::EngineConfig;
use fsd_protocol::wire::DEFAULT_MAX_ZEILENLAENGE;
use fsd_protocol::RatingFacilityTabelle;
use serde::{Deserialize, Serialize};

/// Vollstaendige Server-Konfiguration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Allgemeine Server-Einstellungen
    pub server: ServerEinstellungen,
    /// Netzwerk-Einstellungen
    pub netzwerk: NetzwerkEinstellungen,
    /// Protokoll- und Engine-Einstellungen
    pub protokoll: ProtokollEinstellungen,
    /// Datenbank-Einstellungen
    pub datenbank: DatenbankEinstellungen,
    /// Logging-Einstellungen
    pub logging: LoggingEinstellungen,
    /// Observability-Einstellungen (Metriken, Health)
    pub observability: ObservabilityEinstellungen,
    /// Konten, die beim Start angelegt werden falls sie fehlen
    pub konten: Vec<KontoEinstellung>,
}

/// Allgemeine Server-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerEinstellungen {
    /// Anzeigename des Servers
    pub name: String,
    /// Begruessung, eine Zeile pro Eintrag
    pub motd: Vec<String>,
    /// Maximale Anzahl gleichzeitiger Verbindungen
    pub max_clients: usize,
    /// Frist fuer das Herunterfahren in Sekunden
    pub shutdown_frist_sek: u64,
}

impl Default for ServerEinstellungen {
    fn default() -> Self {
        Self {
            name: "FSD Server".into(),
            motd: Vec::new(),
            max_clients: 1000,
            shutdown_frist_sek: 10,
        }
    }
}

/// Netzwerk-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetzwerkEinstellungen {
    pub bind_adresse: String,
    pub port: u16,
    /// Zeilentrenner auf der Leitung
    pub zeilen_trenner: String,
    pub max_zeilenlaenge: usize,
}

impl Default for NetzwerkEinstellungen {
    fn default() -> Self {
        Self {
            bind_adresse: "0.0.0.0".into(),
            port: 6809,
            zeilen_trenner: "\r\n".into(),
            max_zeilenlaenge: DEFAULT_MAX_ZEILENLAENGE,
        }
    }
}

/// Protokoll-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtokollEinstellungen {
    /// Erwartete Protokollversion im Login
    pub version: u32,
    /// Lotsen-Aenderungen sperren den Flugplan nicht
    pub simulator_modus: bool,
    pub reconnect_grace_sek: u64,
    pub heartbeat_sek: u64,
    /// Gleichzeitige Sendevorgaenge pro Broadcast
    pub broadcast_worker: usize,
    pub sende_timeout_ms: u64,
    /// Jedes N-te Positionsupdate wird als Pfadpunkt aufgezeichnet
    pub pfad_intervall: u32,
    /// `*S` nur an Supervisor, nicht an hoehere Ratings
    pub supervisor_strikt: bool,
    /// Rating-Nummer -> Facility-Bitmaske, ueberschreibt die Standardtabelle
    pub rating_tabelle: BTreeMap<String, u32>,
}

impl Default for ProtokollEinstellungen {
    fn default() -> Self {
        Self {
            version: 9,
            simulator_modus: false,
            reconnect_grace_sek: 60,
            heartbeat_sek: 60,
            broadcast_worker: 32,
            sende_timeout_ms: 2000,
            pfad_intervall: 1,
            supervisor_strikt: false,
            rating_tabelle: BTreeMap::new(),
        }
    }
}

/// Datenbank-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatenbankEinstellungen {
    /// Verbindungs-URL
    pub url: String,
    /// Maximale Verbindungspool-Groesse
    pub max_verbindungen: u32,
    pub wal: bool,
}

impl Default for DatenbankEinstellungen {
    fn default() -> Self {
        Self {
            url: "sqlite://fsd.db".into(),
            max_verbindungen: 5,
            wal: true,
        }
    }
}

/// Logging-Einstellungen
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingEinstellungen {
    /// Log-Level: "trace", "debug", "info", "warn", "error"
    pub level: String,
    /// Format: "json" oder "text"
    pub format: String,
}

impl Default for LoggingEinstellungen {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

/// Observability-Einstellungen (Metriken + Health-Check)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityEinstellungen {
    /// Aktiviert den Observability-Server
    pub aktiviert: bool,
    /// Port fuer Metriken und Health (Standard: 9300)
    pub port: u16,
}

impl Default for ObservabilityEinstellungen {
    fn default() -> Self {
        Self {
            aktiviert: true,
            port: 9300,
        }
    }
}

/// Ein vorab angelegtes Konto
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KontoEinstellung {
    pub cid: String,
    pub name: String,
    pub passwort: String,
    pub rating: i32,
}

impl ServerConfig {
    /// Laedt die Konfiguration aus einer TOML-Datei.
    /// Gibt die Standardkonfiguration zurueck wenn die Datei nicht existiert.
    pub fn laden(pfad: &str) -> anyhow::Result<Self> {
        match std::fs::read_to_string(pfad) {
            Ok(inhalt) => {
                let config: Self = toml::from_str(&inhalt)
                    .map_err(|e| anyhow::anyhow!("Konfigurationsfehler in '{pfad}': {e}"))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(
                    pfad = pfad,
                    "Konfigurationsdatei nicht gefunden, verwende Standardwerte"
                );
                Ok(Self::default())
            }
            Err(e) => Err(anyhow::anyhow!(
                "Konfigurationsdatei '{pfad}' nicht lesbar: {e}"
            )),
        }
    }

    /// Bind-Adresse des FSD-Listeners
    pub fn tcp_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let adresse = format!("{}:{}", self.netzwerk.bind_adresse, self.netzwerk.port);
        adresse
            .parse()
            .with_context(|| format!("Ungueltige Bind-Adresse '{adresse}'"))
    }

    /// Bind-Adresse fuer den Observability-Server
    pub fn observability_bind_adresse(&self) -> anyhow::Result<SocketAddr> {
        let adresse = format!("{}:{}", self.netzwerk.bind_adresse, self.observability.port);
        adresse
            .parse()
            .with_context(|| format!("Ungueltige Observability-Adresse '{adresse}'"))
    }

    pub fn shutdown_frist(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_frist_sek)
    }

    pub fn datenbank_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.datenbank.url.clone(),
            max_verbindungen: self.datenbank.max_verbindungen,
            sqlite_wal: self.datenbank.wal,
        }
    }

    /// Baut die Engine-Konfiguration; prueft die Rating-Tabelle
    pub fn engine_config(&self) -> anyhow::Result<EngineConfig> {
        let p = &self.protokoll;

        let mut ueberschreibungen = BTreeMap::new();
        for (rating, maske) in &p.rating_tabelle {
            let rating: i32 = rating
                .parse()
                .with_context(|| format!("Rating-Tabelle: '{rating}' ist keine Zahl"))?;
            ueberschreibungen.insert(rating, *maske);
        }
        let rating_tabelle = RatingFacilityTabelle::mit_ueberschreibungen(&ueberschreibungen)
            .map_err(|e| anyhow::anyhow!("Rating-Tabelle: {e}"))?;

        if self.netzwerk.zeilen_trenner.is_empty() {
            anyhow::bail!("Zeilentrenner darf nicht leer sein");
        }

        Ok(EngineConfig {
            server_name: self.server.name.clone(),
            motd: self.server.motd.clone(),
            max_clients: self.server.max_clients.max(1),
            protokoll_version: p.version,
            simulator_modus: p.simulator_modus,
            reconnect_grace: Duration::from_secs(p.reconnect_grace_sek),
            heartbeat_intervall: Duration::from_secs(p.heartbeat_sek),
            broadcast_worker: p.broadcast_worker.max(1),
            sende_timeout: Duration::from_millis(p.sende_timeout_ms),
            pfad_intervall: p.pfad_intervall.max(1),
            supervisor_strikt: p.supervisor_strikt,
            zeilen_trenner: self.netzwerk.zeilen_trenner.clone(),
            max_zeilenlaenge: self.netzwerk.max_zeilenlaenge,
            rating_tabelle,
            ..EngineConfig::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsd_protocol::{Facility, Rating};

    #[test]
    fn standard_config_ist_valide() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.server.max_clients, 1000);
        assert_eq!(cfg.netzwerk.port, 6809);
        assert_eq!(cfg.protokoll.version, 9);
        assert_eq!(cfg.logging.level, "info");
        assert!(cfg.konten.is_empty());
    }

    #[test]
    fn bind_adressen() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.tcp_bind_adresse().unwrap().to_string(), "0.0.0.0:6809");
        assert_eq!(
            cfg.observability_bind_adresse().unwrap().to_string(),
            "0.0.0.0:9300"
        );
    }

    #[test]
    fn config_aus_toml_string() {
        let toml = r#"
            [server]
            name = "FSD Frankfurt"
            motd = ["Hallo", "Zweite Zeile"]

            [netzwerk]
            port = 7000

            [protokoll]
            simulator_modus = true
            reconnect_grace_sek = 5

            [[konten]]
            cid = "1000001"
            name = "Test Pilot"
            passwort = "geheim"
            rating = 1
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.server.name, "FSD Frankfurt");
        assert_eq!(cfg.server.motd.len(), 2);
        assert_eq!(cfg.netzwerk.port, 7000);
        assert_eq!(cfg.konten[0].cid, "1000001");
        // Nicht angegebene Felder behalten Standardwerte
        assert_eq!(cfg.server.max_clients, 1000);
        assert_eq!(cfg.netzwerk.zeilen_trenner, "\r\n");

        let engine = cfg.engine_config().unwrap();
        assert!(engine.simulator_modus);
        assert_eq!(engine.reconnect_grace, Duration::from_secs(5));
        assert_eq!(engine.motd, vec!["Hallo", "Zweite Zeile"]);
    }

    #[test]
    fn rating_tabelle_ueberschreiben() {
        let toml = r#"
            [protokoll.rating_tabelle]
            "0" = 0
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        let engine = cfg.engine_config().unwrap();
        assert!(!engine.rating_tabelle.darf(Rating::Normal, Facility::PILOT));
        assert!(engine.rating_tabelle.darf(Rating::Observer, Facility::PILOT));
    }

    #[test]
    fn kaputte_rating_tabelle() {
        let toml = r#"
            [protokoll.rating_tabelle]
            "abc" = 1
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert!(cfg.engine_config().is_err());

        let toml = r#"
            [protokoll.rating_tabelle]
            "42" = 1
        "#;
        let cfg: ServerConfig = toml::from_str(toml).unwrap();
        assert!(cfg.engine_config().is_err());
    }
}
