//! Auffaellige Eingaben duerfen eine Verbindung nicht beenden

mod common;

use std::time::Duration;

use common::{test_config, TestServer, ATC_LOGIN, PILOT_LOGIN};
use fsd_engine::ClientInterface;

#[tokio::test]
async fn riesiger_sichtpunkt_index() {
    let server = TestServer::starten(test_config()).await;
    let mut lotse = server.anmelden(ATC_LOGIN, "EDDF_TWR").await;

    lotse
        .senden("'EDDF_TWR:18446744073709551615:51.0:9.0")
        .await;
    let fehler = lotse.erwarte("$ER").await;
    assert!(fehler.starts_with("$ERSERVER:EDDF_TWR:004:index:"), "{fehler}");

    // Session lebt weiter
    lotse.senden("$PIEDDF_TWR:SERVER:1").await;
    assert_eq!(lotse.erwarte("$PO").await, "$POSERVER:EDDF_TWR:1");

    let client = server.state.registry.get_client("EDDF_TWR").unwrap();
    assert!(!client.ist_getrennt());
    assert!(!client.positionen()[0].ist_gueltig());

    server.stoppen().await;
}

#[tokio::test]
async fn latin1_text_haelt_verbindung() {
    let server = TestServer::starten(test_config()).await;
    let mut lotse = server.anmelden(ATC_LOGIN, "EDDF_TWR").await;
    let mut pilot = server.anmelden(PILOT_LOGIN, "ABC123").await;

    pilot
        .senden_roh(b"#TMABC123:*:Gr\xfc\xdfe\r\n$PIABC123:SERVER:1\r\n")
        .await;
    assert_eq!(pilot.erwarte("$PO").await, "$POSERVER:ABC123:1");
    assert_eq!(lotse.erwarte("#TM").await, "#TMABC123:*:Gr\u{fc}\u{df}e");

    let client = server.state.registry.get_client("ABC123").unwrap();
    assert!(!client.ist_getrennt());
    assert!(pilot.ist_still(Duration::from_millis(100)).await);

    server.stoppen().await;
}
