//! Fehlertabelle des Protokolls
//!
//! Jeder Fehler der auf der Leitung landet hat einen stabilen numerischen
//! Code und einen festen Begruendungstext. Die Zeile hat die Form
//! `$ERSERVER:<callsign>:<code>:<kontext>:<begruendung>`.

use thiserror::Error;

/// Stabile Fehlercodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FehlerCode {
    Ok = 0,
    CallsignInUse = 1,
    InvalidCallsign = 2,
    AlreadyRegistered = 3,
    SyntaxError = 4,
    InvalidSourceCallsign = 5,
    InvalidCidOrPassword = 6,
    NoSuchCallsign = 7,
    NoFlightPlan = 8,
    NoWeatherProfile = 9,
    InvalidProtocolVersion = 10,
    RequestedLevelTooHigh = 11,
    ServerFull = 12,
    CertificateSuspended = 13,
    InvalidControl = 14,
    InvalidPositionForRating = 15,
    UnauthorizedSoftware = 16,
    ClientAuthenticationResponseTimeout = 17,
}

impl FehlerCode {
    pub fn nummer(self) -> u8 {
        self as u8
    }

    /// Fester Begruendungstext
    pub fn begruendung(self) -> &'static str {
        match self {
            Self::Ok => "No error",
            Self::CallsignInUse => "Callsign in use",
            Self::InvalidCallsign => "Invalid callsign",
            Self::AlreadyRegistered => "Already registered",
            Self::SyntaxError => "Syntax error",
            Self::InvalidSourceCallsign => "Invalid source callsign",
            Self::InvalidCidOrPassword => "Invalid CID/password",
            Self::NoSuchCallsign => "No such callsign",
            Self::NoFlightPlan => "No flightplan",
            Self::NoWeatherProfile => "No such weather profile",
            Self::InvalidProtocolVersion => "Invalid protocol revision",
            Self::RequestedLevelTooHigh => "Requested level too high",
            Self::ServerFull => "Too many clients connected",
            Self::CertificateSuspended => "CID/PID was suspended",
            Self::InvalidControl => "Not valid control",
            Self::InvalidPositionForRating => "Invalid position for rating",
            Self::UnauthorizedSoftware => "Unauthorized client software",
            Self::ClientAuthenticationResponseTimeout => "Client authentication response timeout",
        }
    }

    /// Name fuer Metrik-Labels
    pub fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::CallsignInUse => "callsign_in_use",
            Self::InvalidCallsign => "invalid_callsign",
            Self::AlreadyRegistered => "already_registered",
            Self::SyntaxError => "syntax_error",
            Self::InvalidSourceCallsign => "invalid_source_callsign",
            Self::InvalidCidOrPassword => "invalid_cid_or_password",
            Self::NoSuchCallsign => "no_such_callsign",
            Self::NoFlightPlan => "no_flight_plan",
            Self::NoWeatherProfile => "no_weather_profile",
            Self::InvalidProtocolVersion => "invalid_protocol_version",
            Self::RequestedLevelTooHigh => "requested_level_too_high",
            Self::ServerFull => "server_full",
            Self::CertificateSuspended => "certificate_suspended",
            Self::InvalidControl => "invalid_control",
            Self::InvalidPositionForRating => "invalid_position_for_rating",
            Self::UnauthorizedSoftware => "unauthorized_software",
            Self::ClientAuthenticationResponseTimeout => "client_auth_timeout",
        }
    }
}

impl std::fmt::Display for FehlerCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03} ({})", self.nummer(), self.begruendung())
    }
}

/// Fehler beim Zerlegen oder Pruefen einer Protokollzeile
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtokollFehler {
    #[error("Zu wenige Felder: erwartet {erwartet}, erhalten {erhalten}")]
    ZuWenigeFelder { erwartet: usize, erhalten: usize },

    #[error("Ungueltiges Feld '{feld}': {wert}")]
    UngueltigesFeld { feld: &'static str, wert: String },

    #[error("Ungueltiges Callsign: {0}")]
    UngueltigesCallsign(String),
}

impl ProtokollFehler {
    pub fn ungueltiges_feld(feld: &'static str, wert: impl Into<String>) -> Self {
        Self::UngueltigesFeld {
            feld,
            wert: wert.into(),
        }
    }

    /// Passender Code fuer die Fehlerzeile
    pub fn code(&self) -> FehlerCode {
        match self {
            Self::ZuWenigeFelder { .. } | Self::UngueltigesFeld { .. } => FehlerCode::SyntaxError,
            Self::UngueltigesCallsign(_) => FehlerCode::InvalidCallsign,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_sind_stabil() {
        assert_eq!(FehlerCode::Ok.nummer(), 0);
        assert_eq!(FehlerCode::CallsignInUse.nummer(), 1);
        assert_eq!(FehlerCode::InvalidCidOrPassword.nummer(), 6);
        assert_eq!(FehlerCode::InvalidProtocolVersion.nummer(), 10);
        assert_eq!(FehlerCode::InvalidControl.nummer(), 14);
        assert_eq!(FehlerCode::ClientAuthenticationResponseTimeout.nummer(), 17);
    }

    #[test]
    fn anzeige_mit_drei_stellen() {
        assert_eq!(FehlerCode::CallsignInUse.to_string(), "001 (Callsign in use)");
    }

    #[test]
    fn protokollfehler_code() {
        let e = ProtokollFehler::ZuWenigeFelder {
            erwartet: 10,
            erhalten: 3,
        };
        assert_eq!(e.code(), FehlerCode::SyntaxError);
        assert!(e.to_string().contains("erwartet 10"));
        assert_eq!(
            ProtokollFehler::UngueltigesCallsign("X".into()).code(),
            FehlerCode::InvalidCallsign
        );
    }
}
