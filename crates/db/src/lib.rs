//! fsd-db – Persistenz fuer den FSD-Server
//!
//! Dieses Crate stellt das Repository-Pattern fuer Benutzerkonten,
//! Flugplaene und die Verbindungshistorie bereit. Die Engine kennt nur die
//! Traits; `SqliteDb` implementiert alle drei auf einem SQLite-Pool.

pub mod error;
pub mod models;
pub mod repository;
pub mod sqlite;

pub use error::DbError;
pub use repository::{
    DatabaseConfig, DbResult, FlightPlanRepository, HistoryRepository, UserRepository,
};
pub use sqlite::SqliteDb;
