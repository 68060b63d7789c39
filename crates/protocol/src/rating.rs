//! Ratings und Facilities
//!
//! Ein Rating ist die Zertifizierungsstufe eines Kontos (-1 = gebannt bis
//! 12 = Administrator). Eine Facility ist der Positionstyp eines Lotsen und
//! wird als Bitmaske gefuehrt. Welche Facilities ein Rating besetzen darf,
//! beschreibt die datengetriebene `RatingFacilityTabelle`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Rating
// ---------------------------------------------------------------------------

/// Zertifizierungsstufe eines Kontos
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rating {
    Ban = -1,
    Normal = 0,
    Observer = 1,
    Student1 = 2,
    Student2 = 3,
    Student3 = 4,
    Controller1 = 5,
    Controller2 = 6,
    Controller3 = 7,
    Instructor1 = 8,
    Instructor2 = 9,
    Instructor3 = 10,
    Supervisor = 11,
    Administrator = 12,
}

impl Rating {
    pub const ALLE: [Rating; 14] = [
        Rating::Ban,
        Rating::Normal,
        Rating::Observer,
        Rating::Student1,
        Rating::Student2,
        Rating::Student3,
        Rating::Controller1,
        Rating::Controller2,
        Rating::Controller3,
        Rating::Instructor1,
        Rating::Instructor2,
        Rating::Instructor3,
        Rating::Supervisor,
        Rating::Administrator,
    ];

    pub fn als_i32(self) -> i32 {
        self as i32
    }

    /// Parst ein Rating-Feld der Leitung
    pub fn aus_feld(feld: &str) -> Option<Self> {
        feld.trim()
            .parse::<i32>()
            .ok()
            .and_then(|n| Self::try_from(n).ok())
    }

    pub fn ist_gebannt(self) -> bool {
        self == Rating::Ban
    }
}

impl TryFrom<i32> for Rating {
    type Error = String;

    fn try_from(wert: i32) -> Result<Self, Self::Error> {
        Self::ALLE
            .iter()
            .copied()
            .find(|r| r.als_i32() == wert)
            .ok_or_else(|| format!("Unbekanntes Rating: {wert}"))
    }
}

impl From<Rating> for i32 {
    fn from(rating: Rating) -> Self {
        rating.als_i32()
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ---------------------------------------------------------------------------
// Facility
// ---------------------------------------------------------------------------

/// Bitmaske von Positionstypen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Facility(pub u32);

impl Facility {
    pub const KEINE: Facility = Facility(0);
    pub const PILOT: Facility = Facility(1 << 0);
    pub const OBS: Facility = Facility(1 << 1);
    pub const DEL: Facility = Facility(1 << 2);
    pub const GND: Facility = Facility(1 << 3);
    pub const TWR: Facility = Facility(1 << 4);
    pub const APP: Facility = Facility(1 << 5);
    pub const CTR: Facility = Facility(1 << 6);
    pub const FSS: Facility = Facility(1 << 7);

    /// Facility-Index aus dem `%`-Paket in die Bitmaske uebersetzen
    ///
    /// `0=OBS 1=FSS 2=DEL 3=GND 4=TWR 5=APP 6=CTR`
    pub fn aus_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::OBS),
            1 => Some(Self::FSS),
            2 => Some(Self::DEL),
            3 => Some(Self::GND),
            4 => Some(Self::TWR),
            5 => Some(Self::APP),
            6 => Some(Self::CTR),
            _ => None,
        }
    }

    /// Rueckrichtung von `aus_index` fuer eine einzelne Facility
    pub fn als_index(self) -> Option<u32> {
        match self {
            Self::OBS => Some(0),
            Self::FSS => Some(1),
            Self::DEL => Some(2),
            Self::GND => Some(3),
            Self::TWR => Some(4),
            Self::APP => Some(5),
            Self::CTR => Some(6),
            _ => None,
        }
    }

    pub fn enthaelt(self, andere: Facility) -> bool {
        andere.0 != 0 && self.0 & andere.0 == andere.0
    }

    pub fn vereinigt(self, andere: Facility) -> Facility {
        Facility(self.0 | andere.0)
    }

    /// Mindestens Delivery (DEL, GND, TWR, APP, CTR oder FSS)
    pub fn ist_mindestens_delivery(self) -> bool {
        let lotsen = Self::DEL.0 | Self::GND.0 | Self::TWR.0 | Self::APP.0 | Self::CTR.0 | Self::FSS.0;
        self.0 & lotsen != 0
    }
}

impl std::ops::BitOr for Facility {
    type Output = Facility;

    fn bitor(self, rhs: Facility) -> Facility {
        self.vereinigt(rhs)
    }
}

// ---------------------------------------------------------------------------
// RatingFacilityTabelle
// ---------------------------------------------------------------------------

/// Welche Facilities ein Rating besetzen darf
///
/// Startet mit der Standardzuordnung; einzelne Ratings koennen per
/// Konfiguration ueberschrieben werden.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingFacilityTabelle {
    eintraege: BTreeMap<Rating, Facility>,
}

impl RatingFacilityTabelle {
    /// Standardtabelle
    pub fn standard() -> Self {
        let basis = Facility::PILOT | Facility::OBS;
        let s1 = basis | Facility::DEL | Facility::GND;
        let s2 = s1 | Facility::TWR;
        let s3 = s2 | Facility::APP;
        let c1 = s3 | Facility::CTR;
        let alle = c1 | Facility::FSS;

        let eintraege = BTreeMap::from([
            (Rating::Ban, Facility::KEINE),
            (Rating::Normal, basis),
            (Rating::Observer, basis),
            (Rating::Student1, s1),
            (Rating::Student2, s2),
            (Rating::Student3, s3),
            (Rating::Controller1, c1),
            (Rating::Controller2, c1),
            (Rating::Controller3, alle),
            (Rating::Instructor1, alle),
            (Rating::Instructor2, alle),
            (Rating::Instructor3, alle),
            (Rating::Supervisor, alle),
            (Rating::Administrator, alle),
        ]);
        Self { eintraege }
    }

    /// Standardtabelle mit ueberschriebenen Eintraegen
    pub fn mit_ueberschreibungen(ueberschreibungen: &BTreeMap<i32, u32>) -> Result<Self, String> {
        let mut tabelle = Self::standard();
        for (rating, maske) in ueberschreibungen {
            let rating = Rating::try_from(*rating)?;
            tabelle.eintraege.insert(rating, Facility(*maske));
        }
        Ok(tabelle)
    }

    pub fn erlaubte(&self, rating: Rating) -> Facility {
        self.eintraege.get(&rating).copied().unwrap_or(Facility::KEINE)
    }

    pub fn darf(&self, rating: Rating, facility: Facility) -> bool {
        self.erlaubte(rating).enthaelt(facility)
    }
}

impl Default for RatingFacilityTabelle {
    fn default() -> Self {
        Self::standard()
    }
}
