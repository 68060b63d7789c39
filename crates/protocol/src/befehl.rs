//! Befehlspraefixe und Feldregeln
//!
//! Jede Zeile beginnt mit einem festen ASCII-Praefix, danach folgen
//! durch `:` getrennte Felder. Die Praefixtabelle ist nach Laenge sortiert,
//! damit `$!!` vor einem hypothetischen `$!` greift.

use crate::fehler::ProtokollFehler;

/// Alle bekannten Befehle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Befehl {
    AtcLogin,
    PilotLogin,
    AtcLogout,
    PilotLogout,
    TextNachricht,
    ProController,
    SquawkBox,
    Wind,
    Flugplan,
    FlugplanAenderung,
    Anfrage,
    Antwort,
    Uebergabe,
    UebergabeAnnahme,
    Kill,
    Ping,
    Pong,
    Fehler,
    PilotPosition,
    AtcPosition,
    Sichtpunkt,
    Unbekannt,
}

/// Mindestanzahl Felder und ob ein Verstoss die Verbindung beendet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BefehlsRegel {
    pub min_felder: usize,
    pub fatal: bool,
}

impl BefehlsRegel {
    const fn neu(min_felder: usize, fatal: bool) -> Self {
        Self { min_felder, fatal }
    }
}

/// Praefixtabelle, laengste Praefixe zuerst
const PRAEFIXE: [(&str, Befehl); 21] = [
    ("#AA", Befehl::AtcLogin),
    ("#AP", Befehl::PilotLogin),
    ("#DA", Befehl::AtcLogout),
    ("#DP", Befehl::PilotLogout),
    ("#TM", Befehl::TextNachricht),
    ("#PC", Befehl::ProController),
    ("#SB", Befehl::SquawkBox),
    ("#DL", Befehl::Wind),
    ("$FP", Befehl::Flugplan),
    ("$AM", Befehl::FlugplanAenderung),
    ("$CQ", Befehl::Anfrage),
    ("$CR", Befehl::Antwort),
    ("$HO", Befehl::Uebergabe),
    ("$HA", Befehl::UebergabeAnnahme),
    ("$!!", Befehl::Kill),
    ("$PI", Befehl::Ping),
    ("$PO", Befehl::Pong),
    ("$ER", Befehl::Fehler),
    ("@", Befehl::PilotPosition),
    ("%", Befehl::AtcPosition),
    ("'", Befehl::Sichtpunkt),
];

impl Befehl {
    /// Praefix auf der Leitung
    pub fn praefix(self) -> &'static str {
        PRAEFIXE
            .iter()
            .find(|(_, b)| *b == self)
            .map(|(p, _)| *p)
            .unwrap_or("")
    }

    /// Feldregel des Befehls
    pub fn regel(self) -> BefehlsRegel {
        match self {
            Self::AtcLogin => BefehlsRegel::neu(7, true),
            Self::PilotLogin => BefehlsRegel::neu(8, true),
            Self::AtcLogout | Self::PilotLogout => BefehlsRegel::neu(1, false),
            Self::PilotPosition => BefehlsRegel::neu(10, false),
            Self::AtcPosition => BefehlsRegel::neu(8, false),
            Self::Sichtpunkt => BefehlsRegel::neu(4, false),
            Self::TextNachricht => BefehlsRegel::neu(3, false),
            Self::Flugplan => BefehlsRegel::neu(17, false),
            Self::FlugplanAenderung => BefehlsRegel::neu(18, false),
            Self::Anfrage | Self::Antwort => BefehlsRegel::neu(3, false),
            Self::Kill => BefehlsRegel::neu(2, false),
            Self::Uebergabe | Self::UebergabeAnnahme => BefehlsRegel::neu(3, false),
            Self::ProController | Self::SquawkBox => BefehlsRegel::neu(3, false),
            Self::Ping | Self::Pong => BefehlsRegel::neu(2, false),
            Self::Wind | Self::Fehler | Self::Unbekannt => BefehlsRegel::neu(0, false),
        }
    }

    pub fn ist_login(self) -> bool {
        matches!(self, Self::AtcLogin | Self::PilotLogin)
    }

    /// Prueft die Mindestanzahl Felder
    pub fn felder_pruefen(self, felder: &[&str]) -> Result<(), ProtokollFehler> {
        let regel = self.regel();
        if felder.len() < regel.min_felder {
            return Err(ProtokollFehler::ZuWenigeFelder {
                erwartet: regel.min_felder,
                erhalten: felder.len(),
            });
        }
        Ok(())
    }
}

impl std::fmt::Display for Befehl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbekannt => write!(f, "unbekannt"),
            andere => write!(f, "{}", andere.praefix()),
        }
    }
}

/// Zerlegt eine Zeile in Befehl und Felder
///
/// Ein eventuell noch anhaengender Zeilentrenner wird entfernt. Bei
/// unbekanntem Praefix werden die Felder der ganzen Zeile geliefert.
pub fn zeile_parsen(zeile: &str) -> (Befehl, Vec<&str>) {
    let zeile = zeile.trim_end_matches(['\r', '\n']);
    let (befehl, rest) = PRAEFIXE
        .iter()
        .find_map(|(praefix, befehl)| zeile.strip_prefix(praefix).map(|rest| (*befehl, rest)))
        .unwrap_or((Befehl::Unbekannt, zeile));

    let felder = if rest.is_empty() {
        Vec::new()
    } else {
        rest.split(':').collect()
    };
    (befehl, felder)
}
