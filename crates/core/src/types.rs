//! Gemeinsame Positions- und Flugplantypen
//!
//! Eine `Position` ist ein Paar aus Breiten- und Laengengrad in Grad.
//! `(0, 0)` gilt im Protokoll als "nicht gesetzt".

use serde::{Deserialize, Serialize};

/// Anzahl der Positions-Slots pro Client
///
/// Slot 0 ist die Hauptposition, Slots 1-3 sind Sichtpunkte eines Lotsen.
pub const POSITIONS_SLOTS: usize = 4;

/// Geografische Position in Grad
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    /// Die "nicht gesetzt"-Position
    pub const UNGESETZT: Position = Position {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn neu(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Gibt true zurueck wenn die Position gesetzt ist (nicht `(0, 0)`)
    pub fn ist_gueltig(&self) -> bool {
        !(self.latitude == 0.0 && self.longitude == 0.0)
    }
}

/// Flugplan in Leitungsform
///
/// Alle Felder bleiben Text, so wie der Client sie geschickt hat.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flugplan {
    pub flugregeln: String,
    pub flugzeug: String,
    pub reisegeschwindigkeit: String,
    pub abflug: String,
    pub abflugzeit: String,
    pub abflugzeit_ist: String,
    pub reiseflughoehe: String,
    pub ziel: String,
    pub stunden_enroute: String,
    pub minuten_enroute: String,
    pub stunden_kraftstoff: String,
    pub minuten_kraftstoff: String,
    pub ausweich: String,
    pub bemerkungen: String,
    pub route: String,
}

impl Flugplan {
    /// Gleicher Abflug- und Zielflughafen (Gross-/Kleinschreibung egal)
    pub fn gleiche_strecke(&self, anderer: &Flugplan) -> bool {
        self.abflug.eq_ignore_ascii_case(&anderer.abflug)
            && self.ziel.eq_ignore_ascii_case(&anderer.ziel)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.latitude, self.longitude)
    }
}
