//! SQLite-Implementierung des UserRepository

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::error::DbError;
use crate::models::{BenutzerRecord, NeuerBenutzer};
use crate::repository::{DbResult, UserRepository};
use crate::sqlite::pool::SqliteDb;
use crate::sqlite::{uuid_parsen, zeit_parsen};

const SPALTEN: &str =
    "id, cid, real_name, password_hash, rating, pilot_sekunden, atc_sekunden, created_at, last_login";

#[async_trait]
impl UserRepository for SqliteDb {
    async fn get_by_cid(&self, cid: &str) -> DbResult<Option<BenutzerRecord>> {
        let sql = format!("SELECT {SPALTEN} FROM users WHERE cid = ?");
        let row = sqlx::query(&sql)
            .bind(cid)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|r| row_to_benutzer(&r)).transpose()
    }

    async fn create(&self, data: NeuerBenutzer<'_>) -> DbResult<BenutzerRecord> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, cid, real_name, password_hash, rating, created_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(data.cid)
        .bind(data.real_name)
        .bind(data.password_hash)
        .bind(data.rating)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::Sqlx(e) {
            e if e.ist_eindeutigkeit() => {
                DbError::Eindeutigkeit(format!("CID '{}' bereits vergeben", data.cid))
            }
            e => e,
        })?;

        Ok(BenutzerRecord {
            id,
            cid: data.cid.to_string(),
            real_name: data.real_name.to_string(),
            password_hash: data.password_hash.to_string(),
            rating: data.rating,
            pilot_sekunden: 0,
            atc_sekunden: 0,
            created_at: now,
            last_login: None,
        })
    }

    async fn online_zeit_addieren(&self, cid: &str, is_atc: bool, sekunden: i64) -> DbResult<()> {
        let sql = if is_atc {
            "UPDATE users SET atc_sekunden = atc_sekunden + ? WHERE cid = ?"
        } else {
            "UPDATE users SET pilot_sekunden = pilot_sekunden + ? WHERE cid = ?"
        };
        let affected = sqlx::query(sql)
            .bind(sekunden.max(0))
            .bind(cid)
            .execute(&self.pool)
            .await?
            .rows_affected();

        if affected == 0 {
            return Err(DbError::nicht_gefunden(format!("Benutzer {cid}")));
        }
        Ok(())
    }

    async fn update_last_login(&self, cid: &str) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login = ? WHERE cid = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(cid)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn row_to_benutzer(row: &sqlx::sqlite::SqliteRow) -> DbResult<BenutzerRecord> {
    use sqlx::Row as _;

    let id_str: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    let last_login: Option<String> = row.try_get("last_login")?;

    Ok(BenutzerRecord {
        id: uuid_parsen(&id_str)?,
        cid: row.try_get("cid")?,
        real_name: row.try_get("real_name")?,
        password_hash: row.try_get("password_hash")?,
        rating: row.try_get("rating")?,
        pilot_sekunden: row.try_get("pilot_sekunden")?,
        atc_sekunden: row.try_get("atc_sekunden")?,
        created_at: zeit_parsen("created_at", &created_at)?,
        last_login: last_login
            .as_deref()
            .map(|s| zeit_parsen("last_login", s))
            .transpose()?,
    })
}
