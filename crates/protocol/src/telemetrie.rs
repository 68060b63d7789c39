//! Telemetrie-Kodierung
//!
//! - Grosskreis-Distanz zwischen zwei Positionen (Kosinussatz) in Seemeilen
//! - Minimale Distanz zwischen zwei Positions-Gruppen (Lotsen-Sichtpunkte)
//! - Pitch/Bank/Heading-Packing in ein 32-Bit-Wort
//!
//! ## PBH-Layout
//!
//! ```text
//!  31        22 21        12 11         2  1  0
//! +------------+------------+------------+--+--+
//! |   -pitch   |   -bank    |  heading   |G |  |
//! +------------+------------+------------+--+--+
//! ```
//!
//! Pitch: 256 Einheiten pro 90 Grad, Bank: 512 pro 180 Grad,
//! Heading: 1024 pro 360 Grad. Pitch und Bank werden vorzeichen-invertiert
//! als 10-Bit-Zweierkomplement abgelegt. G = am Boden.

use fsd_core::types::{Position, POSITIONS_SLOTS};

/// Erdradius in Seemeilen
pub const ERDRADIUS_NM: f64 = 6_371_000.0 / 1852.0;

// Skalierung immer als (wert * einheiten) / grad rechnen, damit exakte
// Fixpunkte wie 0.3515625 Grad nicht durch Rundung um eine Stufe kippen.
const PITCH_EINHEITEN: f64 = 256.0;
const PITCH_GRAD: f64 = 90.0;
const BANK_EINHEITEN: f64 = 512.0;
const BANK_GRAD: f64 = 180.0;
const HEADING_EINHEITEN: f64 = 1024.0;
const HEADING_GRAD: f64 = 360.0;

const FELD_MASKE: u32 = 0x3FF;
const AM_BODEN_BIT: u32 = 1 << 1;

/// Distanz zwischen zwei Positionen in Seemeilen
pub fn distanz(p1: &Position, p2: &Position) -> f64 {
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();
    let delta_lon = (p2.longitude - p1.longitude).to_radians();

    let cos_winkel = lat1.sin() * lat2.sin() + lat1.cos() * lat2.cos() * delta_lon.cos();
    // Rundungsfehler koennen |cos| minimal ueber 1 treiben
    cos_winkel.clamp(-1.0, 1.0).acos() * ERDRADIUS_NM
}

/// Kleinste Distanz zwischen zwei Positions-Gruppen
///
/// Nicht gesetzte Punkte werden ignoriert. Hat eine Seite keinen gueltigen
/// Punkt, ist das Ergebnis `f64::INFINITY`.
pub fn naechste_distanz(a: &[Position; POSITIONS_SLOTS], b: &[Position; POSITIONS_SLOTS]) -> f64 {
    let mut minimum = f64::INFINITY;
    for pa in a.iter().filter(|p| p.ist_gueltig()) {
        for pb in b.iter().filter(|p| p.ist_gueltig()) {
            let d = distanz(pa, pb);
            if d < minimum {
                minimum = d;
            }
        }
    }
    minimum
}

/// Entpackte Fluglage
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pbh {
    pub pitch: f64,
    pub bank: f64,
    pub heading: f64,
    pub am_boden: bool,
}

/// Packt Pitch/Bank/Heading in ein 32-Bit-Wort
pub fn pbh_packen(pbh: Pbh) -> u32 {
    let pitch = (-pbh.pitch * PITCH_EINHEITEN / PITCH_GRAD) as i32 as u32 & FELD_MASKE;
    let bank = (-pbh.bank * BANK_EINHEITEN / BANK_GRAD) as i32 as u32 & FELD_MASKE;
    let heading =
        (pbh.heading.rem_euclid(HEADING_GRAD) * HEADING_EINHEITEN / HEADING_GRAD) as u32 & FELD_MASKE;

    let mut wert = (pitch << 22) | (bank << 12) | (heading << 2);
    if pbh.am_boden {
        wert |= AM_BODEN_BIT;
    }
    wert
}

/// Entpackt ein 32-Bit-PBH-Wort
pub fn pbh_entpacken(wert: u32) -> Pbh {
    let pitch = zehn_bit_vorzeichen((wert >> 22) & FELD_MASKE);
    let bank = zehn_bit_vorzeichen((wert >> 12) & FELD_MASKE);
    let heading = (wert >> 2) & FELD_MASKE;

    Pbh {
        pitch: -(pitch as f64) * PITCH_GRAD / PITCH_EINHEITEN,
        bank: -(bank as f64) * BANK_GRAD / BANK_EINHEITEN,
        heading: heading as f64 * HEADING_GRAD / HEADING_EINHEITEN,
        am_boden: wert & AM_BODEN_BIT != 0,
    }
}

fn zehn_bit_vorzeichen(roh: u32) -> i32 {
    if roh >= 512 {
        roh as i32 - 1024
    } else {
        roh as i32
    }
}
