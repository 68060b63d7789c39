//! SQLite-Implementierung des HistoryRepository

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{HistoryRecord, NeueHistory};
use crate::repository::{DbResult, HistoryRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{uuid_parsen, zeit_parsen};

#[async_trait]
impl HistoryRepository for SqliteDb {
    async fn create(&self, data: NeueHistory<'_>) -> DbResult<HistoryRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO history (id, cid, callsign, is_atc, started_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(data.cid)
        .bind(data.callsign)
        .bind(data.is_atc as i64)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(HistoryRecord {
            id,
            cid: data.cid.to_string(),
            callsign: data.callsign.to_string(),
            is_atc: data.is_atc,
            started_at: now,
            ended_at: None,
            online_sekunden: 0,
        })
    }

    async fn beenden(&self, id: Uuid, online_sekunden: i64) -> DbResult<bool> {
        // Nur offene Eintraege abschliessen
        let affected = sqlx::query(
            "UPDATE history SET ended_at = ?, online_sekunden = ? WHERE id = ? AND ended_at IS NULL",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(online_sekunden.max(0))
        .bind(id.to_string())
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(affected > 0)
    }

    async fn get(&self, id: Uuid) -> DbResult<Option<HistoryRecord>> {
        let row = sqlx::query(
            "SELECT id, cid, callsign, is_atc, started_at, ended_at, online_sekunden
             FROM history WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_history(&r)).transpose()
    }
}

fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> DbResult<HistoryRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let is_atc: i64 = row.try_get("is_atc")?;
    let started_at: String = row.try_get("started_at")?;
    let ended_at: Option<String> = row.try_get("ended_at")?;

    Ok(HistoryRecord {
        id: uuid_parsen(&id_str)?,
        cid: row.try_get("cid")?,
        callsign: row.try_get("callsign")?,
        is_atc: is_atc != 0,
        started_at: zeit_parsen("started_at", &started_at)?,
        ended_at: ended_at
            .as_deref()
            .map(|s| zeit_parsen("ended_at", s))
            .transpose()?,
        online_sekunden: row.try_get("online_sekunden")?,
    })
}
