//! fsd-core – Gemeinsame Typen
//!
//! Positionen und Flugplaene, die Protokoll, Persistenz und Engine
//! gemeinsam nutzen.

pub mod types;

pub use types::{Flugplan, Position, POSITIONS_SLOTS};
