//! Callsign- und Frequenzpruefung

use crate::fehler::ProtokollFehler;

pub const CALLSIGN_MIN: usize = 3;
pub const CALLSIGN_MAX: usize = 12;

/// Reservierte Namen die kein Client tragen darf
pub const RESERVIERTE_CALLSIGNS: [&str; 3] = ["SERVER", "CLIENT", "FP"];

/// Untere und obere Grenze der Leitungsfrequenz (118.000 bis 136.975 MHz)
pub const FREQUENZ_MIN: u32 = 18_000;
pub const FREQUENZ_MAX: u32 = 36_975;

/// Reservierte ATC-Koordinationsfrequenz (`@94835`)
pub const ATC_FREQUENZ: &str = "94835";

/// Prueft die Callsign-Syntax
pub fn callsign_pruefen(callsign: &str) -> Result<(), ProtokollFehler> {
    let laenge_ok = (CALLSIGN_MIN..=CALLSIGN_MAX).contains(&callsign.len());
    let zeichen_ok = callsign
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    let reserviert = RESERVIERTE_CALLSIGNS
        .iter()
        .any(|r| r.eq_ignore_ascii_case(callsign));

    if laenge_ok && zeichen_ok && !reserviert {
        Ok(())
    } else {
        Err(ProtokollFehler::UngueltigesCallsign(callsign.to_string()))
    }
}

pub fn ist_gueltiges_callsign(callsign: &str) -> bool {
    callsign_pruefen(callsign).is_ok()
}

/// Parst eine Leitungsfrequenz wie `22800` (entspricht 122.800 MHz)
pub fn frequenz_parsen(feld: &str) -> Option<u32> {
    feld.trim().parse::<u32>().ok()
}

/// Liegt die Frequenz im Sprechfunkband und auf dem 5-kHz-Raster?
pub fn ist_gueltige_frequenz(frequenz: u32) -> bool {
    (FREQUENZ_MIN..=FREQUENZ_MAX).contains(&frequenz) && frequenz % 5 == 0
}
