//! SQLite-Backend-Implementierungen fuer alle Repository-Traits

pub mod flight_plans;
pub mod history;
pub mod pool;
pub mod users;

pub use pool::SqliteDb;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::DbError;

pub(crate) fn zeit_parsen(feld: &str, wert: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(wert)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DbError::intern(format!("Ungueltige {feld} '{wert}': {e}")))
}

pub(crate) fn uuid_parsen(wert: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(wert).map_err(|e| DbError::intern(format!("Ungueltige UUID '{wert}': {e}")))
}
