//! fsd-protocol – Definitionen des FSD-Zeilenprotokolls
//!
//! Dieses Crate definiert alles was zwischen Client und Server auf der
//! Leitung steht: Befehlspraefixe, Mindestfeldanzahlen, Ratings,
//! Facilities, die Fehlertabelle, den Zeilen-Codec und die Telemetrie-
//! Kodierung (Distanz, PBH).

pub mod befehl;
pub mod fehler;
pub mod nachricht;
pub mod rating;
pub mod telemetrie;
pub mod validierung;
pub mod wire;

pub use befehl::{zeile_parsen, Befehl, BefehlsRegel};
pub use fehler::{FehlerCode, ProtokollFehler};
pub use rating::{Facility, Rating, RatingFacilityTabelle};
pub use telemetrie::{distanz, naechste_distanz, pbh_entpacken, pbh_packen, Pbh};
pub use wire::{mit_zeilenende, ZeilenCodec};

/// Callsign des Servers als Absender/Empfaenger
pub const SERVER_CALLSIGN: &str = "SERVER";

/// Zeilenende im Protokoll
pub const ZEILENENDE: &str = "\r\n";
