//! Integration-Tests fuer UserRepository (In-Memory SQLite)

use fsd_db::{models::NeuerBenutzer, DbError, SqliteDb, UserRepository};

async fn db() -> SqliteDb {
    SqliteDb::in_memory()
        .await
        .expect("In-Memory DB konnte nicht erstellt werden")
}

fn neuer_benutzer<'a>(cid: &'a str, rating: i32) -> NeuerBenutzer<'a> {
    NeuerBenutzer {
        cid,
        real_name: "Max Mustermann",
        password_hash: "hash",
        rating,
    }
}

#[tokio::test]
async fn benutzer_erstellen_und_laden() {
    let db = db().await;

    let user = UserRepository::create(&db, neuer_benutzer("1000001", 5))
        .await
        .expect("Benutzer erstellen fehlgeschlagen");

    assert_eq!(user.cid, "1000001");
    assert_eq!(user.rating, 5);
    assert_eq!(user.pilot_sekunden, 0);

    let geladen = UserRepository::get_by_cid(&db, "1000001")
        .await
        .expect("get_by_cid fehlgeschlagen")
        .expect("Benutzer sollte gefunden werden");

    assert_eq!(geladen.id, user.id);
    assert_eq!(geladen.real_name, "Max Mustermann");
    assert!(geladen.last_login.is_none());
}

#[tokio::test]
async fn unbekannte_cid() {
    let db = db().await;
    let nicht_gefunden = UserRepository::get_by_cid(&db, "999").await.unwrap();
    assert!(nicht_gefunden.is_none());
}

#[tokio::test]
async fn cid_ist_eindeutig() {
    let db = db().await;

    UserRepository::create(&db, neuer_benutzer("1000002", 1))
        .await
        .unwrap();

    let err = UserRepository::create(&db, neuer_benutzer("1000002", 1))
        .await
        .unwrap_err();
    assert!(err.ist_eindeutigkeit(), "Unerwarteter Fehler: {err}");
}

#[tokio::test]
async fn online_zeit_getrennt_nach_rolle() {
    let db = db().await;
    UserRepository::create(&db, neuer_benutzer("1000003", 5))
        .await
        .unwrap();

    db.online_zeit_addieren("1000003", false, 120).await.unwrap();
    db.online_zeit_addieren("1000003", false, 30).await.unwrap();
    db.online_zeit_addieren("1000003", true, 600).await.unwrap();

    let user = db.get_by_cid("1000003").await.unwrap().unwrap();
    assert_eq!(user.pilot_sekunden, 150);
    assert_eq!(user.atc_sekunden, 600);
}

#[tokio::test]
async fn online_zeit_fuer_unbekanntes_konto() {
    let db = db().await;
    let err = db.online_zeit_addieren("0", true, 10).await.unwrap_err();
    assert!(matches!(err, DbError::NichtGefunden(_)));
}

#[tokio::test]
async fn letzter_login_wird_gesetzt() {
    let db = db().await;
    UserRepository::create(&db, neuer_benutzer("1000004", 1))
        .await
        .unwrap();

    db.update_last_login("1000004").await.unwrap();

    let user = db.get_by_cid("1000004").await.unwrap().unwrap();
    assert!(user.last_login.is_some());
}
