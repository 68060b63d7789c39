//! SQLite-Implementierung des FlightPlanRepository

use async_trait::async_trait;
use chrono::Utc;
use fsd_core::types::Flugplan;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::FlugplanRecord;
use crate::repository::{DbResult, FlightPlanRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{uuid_parsen, zeit_parsen};

#[async_trait]
impl FlightPlanRepository for SqliteDb {
    async fn upsert(
        &self,
        cid: &str,
        callsign: &str,
        plan: &Flugplan,
        locked: bool,
    ) -> DbResult<FlugplanRecord> {
        let daten = serde_json::to_string(plan)?;
        let now = Utc::now().to_rfc3339();

        // Bestehende ID bleibt bei einem Update erhalten
        sqlx::query(
            "INSERT INTO flight_plans (id, cid, callsign, daten, locked, updated_at)
             VALUES (?, ?, ?, ?, ?, ?)
             ON CONFLICT(cid) DO UPDATE SET
                callsign = excluded.callsign,
                daten = excluded.daten,
                locked = excluded.locked,
                updated_at = excluded.updated_at",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(cid)
        .bind(callsign)
        .bind(&daten)
        .bind(locked as i64)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.get_by_cid(cid)
            .await?
            .ok_or_else(|| DbError::intern("Flugplan nach Upsert nicht gefunden"))
    }

    async fn get_by_cid(&self, cid: &str) -> DbResult<Option<FlugplanRecord>> {
        let row = sqlx::query(
            "SELECT id, cid, callsign, daten, locked, updated_at FROM flight_plans WHERE cid = ?",
        )
        .bind(cid)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_flugplan(&r)).transpose()
    }

    async fn update(&self, cid: &str, plan: &Flugplan, locked: bool) -> DbResult<FlugplanRecord> {
        let daten = serde_json::to_string(plan)?;
        let affected =
            sqlx::query("UPDATE flight_plans SET daten = ?, locked = ?, updated_at = ? WHERE cid = ?")
                .bind(&daten)
                .bind(locked as i64)
                .bind(Utc::now().to_rfc3339())
                .bind(cid)
                .execute(&self.pool)
                .await?
                .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Flugplan fuer CID {cid}")));
        }

        self.get_by_cid(cid)
            .await?
            .ok_or_else(|| DbError::intern("Flugplan nach Update nicht gefunden"))
    }
}

fn row_to_flugplan(row: &sqlx::sqlite::SqliteRow) -> DbResult<FlugplanRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let daten: String = row.try_get("daten")?;
    let locked: i64 = row.try_get("locked")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(FlugplanRecord {
        id: uuid_parsen(&id_str)?,
        cid: row.try_get("cid")?,
        callsign: row.try_get("callsign")?,
        plan: serde_json::from_str(&daten)?,
        locked: locked != 0,
        updated_at: zeit_parsen("updated_at", &updated_at)?,
    })
}
