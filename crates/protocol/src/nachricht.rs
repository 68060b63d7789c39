//! Nachrichtenbauer fuer serverseitig erzeugte Zeilen
//!
//! Alle Bauer liefern eine vollstaendige Zeile inklusive CRLF.

use fsd_core::types::Flugplan;

use crate::fehler::{FehlerCode, ProtokollFehler};
use crate::wire::mit_zeilenende;
use crate::SERVER_CALLSIGN;

/// Anzahl der Flugplanfelder auf der Leitung
pub const FLUGPLAN_FELDER: usize = 15;

/// Empfaenger-Platzhalter fuer einen an alle Lotsen verteilten Flugplan
pub const AN_ALLE_LOTSEN: &str = "*A";

/// `$ERSERVER:<callsign>:<code>:<kontext>:<begruendung>`
pub fn fehler_zeile(callsign: &str, code: FehlerCode, kontext: &str) -> String {
    mit_zeilenende(&format!(
        "$ER{}:{}:{:03}:{}:{}",
        SERVER_CALLSIGN,
        callsign,
        code.nummer(),
        kontext,
        code.begruendung()
    ))
}

/// MOTD-Zeile als Textnachricht vom Server
pub fn motd_zeile(callsign: &str, text: &str) -> String {
    mit_zeilenende(&format!("#TM{}:{}:{}", SERVER_CALLSIGN, callsign, text))
}

/// Kill-Zeile an den betroffenen Client
pub fn kill_zeile(ziel: &str, grund: &str) -> String {
    mit_zeilenende(&format!("$!!{}:{}:{}", SERVER_CALLSIGN, ziel, grund))
}

/// Wind-Delta des Heartbeats
pub fn wind_zeile(geschwindigkeit: u32, richtung: u32) -> String {
    mit_zeilenende(&format!("#DL{}:*:{}:{}", SERVER_CALLSIGN, geschwindigkeit, richtung))
}

/// Abmeldung eines Clients an alle in Reichweite
pub fn entfernen_zeile(callsign: &str, ist_atc: bool) -> String {
    let praefix = if ist_atc { "#DA" } else { "#DP" };
    mit_zeilenende(&format!("{}{}:{}", praefix, callsign, SERVER_CALLSIGN))
}

/// `$PO` Antwort des Servers auf ein `$PI`
pub fn pong_zeile(an: &str, daten: &[&str]) -> String {
    let mut zeile = format!("$PO{}:{}", SERVER_CALLSIGN, an);
    for feld in daten {
        zeile.push(':');
        zeile.push_str(feld);
    }
    mit_zeilenende(&zeile)
}

/// `$CRSERVER:<an>:<typ>:<felder...>`
pub fn server_antwort(an: &str, typ: &str, felder: &[&str]) -> String {
    let mut zeile = format!("$CR{}:{}:{}", SERVER_CALLSIGN, an, typ);
    for feld in felder {
        zeile.push(':');
        zeile.push_str(feld);
    }
    mit_zeilenende(&zeile)
}

/// `$FP<callsign>:<an>:<15 Flugplanfelder>`
pub fn flugplan_zeile(callsign: &str, an: &str, plan: &Flugplan) -> String {
    mit_zeilenende(&format!(
        "$FP{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}:{}",
        callsign,
        an,
        plan.flugregeln,
        plan.flugzeug,
        plan.reisegeschwindigkeit,
        plan.abflug,
        plan.abflugzeit,
        plan.abflugzeit_ist,
        plan.reiseflughoehe,
        plan.ziel,
        plan.stunden_enroute,
        plan.minuten_enroute,
        plan.stunden_kraftstoff,
        plan.minuten_kraftstoff,
        plan.ausweich,
        plan.bemerkungen,
        plan.route
    ))
}

/// Liest die 15 Flugplanfelder ab `felder[0]`
///
/// Fuer `$FP` beginnen sie bei Feld 2, fuer `$AM` bei Feld 3.
pub fn flugplan_aus_feldern(felder: &[&str]) -> Result<Flugplan, ProtokollFehler> {
    if felder.len() < FLUGPLAN_FELDER {
        return Err(ProtokollFehler::ZuWenigeFelder {
            erwartet: FLUGPLAN_FELDER,
            erhalten: felder.len(),
        });
    }
    let f = |i: usize| felder[i].to_string();

    // Route darf selbst Doppelpunkte enthalten
    let route = felder[FLUGPLAN_FELDER - 1..].join(":");

    Ok(Flugplan {
        flugregeln: f(0),
        flugzeug: f(1),
        reisegeschwindigkeit: f(2),
        abflug: f(3),
        abflugzeit: f(4),
        abflugzeit_ist: f(5),
        reiseflughoehe: f(6),
        ziel: f(7),
        stunden_enroute: f(8),
        minuten_enroute: f(9),
        stunden_kraftstoff: f(10),
        minuten_kraftstoff: f(11),
        ausweich: f(12),
        bemerkungen: f(13),
        route,
    })
}
