//! Client – ein angemeldeter Pilot oder Lotse
//!
//! Ein `Client` ueberlebt seine TCP-Verbindung: nach einem Abbruch bleibt er
//! im Zustand `Getrennt` in der Registry, bis das Reconnect-Fenster ablaeuft
//! oder eine neue Verbindung desselben Kontos ihn wieder anbindet.
//!
//! ## Lebenszyklus
//! ```text
//! Aktiv --trennen--> Getrennt --anbinden--> Aktiv
//!   |                   |
//!   +----loeschen-------+--Fenster abgelaufen--> Geloescht
//! ```
//!
//! Zustand, Reconnect-Timer und Verbindung liegen hinter demselben Lock,
//! damit Timer und Reconnect nicht gegeneinander laufen koennen.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use fsd_core::types::{Flugplan, Position, POSITIONS_SLOTS};
use fsd_protocol::{Facility, Rating};
use parking_lot::Mutex;
use tokio::task::AbortHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{EngineError, EngineResult};

/// Maximale Anzahl ATIS-Zeilen pro Block
pub const ATIS_MAX_ZEILEN: usize = 32;

/// Sichtweite eines Piloten in Seemeilen
pub const PILOT_SICHTWEITE_NM: f64 = 40.0;

// ---------------------------------------------------------------------------
// Capability-Traits
// ---------------------------------------------------------------------------

/// Schreibseite einer Verbindung
#[async_trait]
pub trait ZeilenSchreiber: Send + Sync {
    /// Reiht eine fertige Zeile (inklusive Trenner) zum Senden ein
    async fn schreiben(&self, zeile: Arc<str>) -> EngineResult<()>;

    fn ist_geschlossen(&self) -> bool;
}

/// Was Filter und Registry von einem Client sehen
pub trait ClientInterface: Send + Sync {
    fn callsign(&self) -> &str;
    fn ist_atc(&self) -> bool;
    fn rating(&self) -> Rating;
    fn facility(&self) -> Facility;
    /// Sichtweite in Seemeilen
    fn sichtweite(&self) -> f64;
    fn positionen(&self) -> [Position; POSITIONS_SLOTS];
    fn ist_getrennt(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Hilfstypen
// ---------------------------------------------------------------------------

/// Bindung eines Clients an eine Session
#[derive(Clone)]
pub struct Verbindung {
    pub session_id: u64,
    pub peer: SocketAddr,
    pub schreiber: Arc<dyn ZeilenSchreiber>,
    /// Beendet die Lese-Schleife der Session
    pub abbruch: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientZustand {
    Aktiv,
    Getrennt,
    Geloescht,
}

/// Daten aus einem erfolgreichen Login
#[derive(Debug, Clone)]
pub struct ClientLogin {
    pub callsign: String,
    pub ist_atc: bool,
    pub cid: String,
    pub real_name: String,
    /// Rating des Kontos
    pub konto_rating: Rating,
    /// Beim Login angefordertes Rating
    pub rating: Rating,
    pub facility: Facility,
    pub sim_typ: String,
}

/// Letzter bekannter Telemetriestand
#[derive(Debug, Clone, PartialEq)]
pub struct Telemetrie {
    pub positionen: [Position; POSITIONS_SLOTS],
    pub transponder: u32,
    pub hoehe: i32,
    pub geschwindigkeit: u32,
    pub pbh: u32,
    pub frequenz: Option<u32>,
    pub sichtweite: f64,
    pub sim_typ: String,
}

impl Telemetrie {
    fn neu(ist_atc: bool, sim_typ: String) -> Self {
        Self {
            positionen: [Position::UNGESETZT; POSITIONS_SLOTS],
            transponder: 0,
            hoehe: 0,
            geschwindigkeit: 0,
            pbh: 0,
            frequenz: None,
            sichtweite: if ist_atc { 0.0 } else { PILOT_SICHTWEITE_NM },
            sim_typ,
        }
    }
}

/// `@`-Update eines Piloten
#[derive(Debug, Clone, PartialEq)]
pub struct PilotUpdate {
    pub position: Position,
    pub transponder: u32,
    pub hoehe: i32,
    pub geschwindigkeit: u32,
    pub pbh: u32,
    pub rating: Option<Rating>,
}

/// `%`-Update eines Lotsen
#[derive(Debug, Clone, PartialEq)]
pub struct AtcUpdate {
    pub position: Position,
    pub frequenz: Option<u32>,
    pub facility: Facility,
    pub sichtweite: f64,
    pub hoehe: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlugplanEintrag {
    pub plan: Flugplan,
    pub locked: bool,
}

/// Ein aufgezeichneter Bahnpunkt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PfadPunkt {
    pub position: Position,
    pub hoehe: i32,
    pub zeitpunkt: Instant,
}

struct ClientInner {
    zustand: ClientZustand,
    /// Zaehlt jeden Zustandswechsel; ein Timer gilt nur fuer seine Generation
    generation: u64,
    reconnect_timer: Option<AbortHandle>,
    verbindung: Option<Verbindung>,
    letzte_session_id: u64,

    rating: Rating,
    facility: Facility,
    telemetrie: Telemetrie,

    flugplan: Option<FlugplanEintrag>,
    atis: Vec<String>,
    atis_entwurf: Vec<String>,
    history_id: Option<Uuid>,
    pfade: Vec<PfadPunkt>,
    pfad_ticks: u32,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

pub struct Client {
    callsign: String,
    ist_atc: bool,
    cid: String,
    real_name: String,
    konto_rating: Rating,
    angemeldet_seit: Instant,
    inner: Mutex<ClientInner>,
}

impl Client {
    pub fn neu(login: ClientLogin, verbindung: Verbindung) -> Self {
        let inner = ClientInner {
            zustand: ClientZustand::Aktiv,
            generation: 0,
            reconnect_timer: None,
            letzte_session_id: verbindung.session_id,
            verbindung: Some(verbindung),
            rating: login.rating,
            facility: login.facility,
            telemetrie: Telemetrie::neu(login.ist_atc, login.sim_typ),
            flugplan: None,
            atis: Vec::new(),
            atis_entwurf: Vec::new(),
            history_id: None,
            pfade: Vec::new(),
            pfad_ticks: 0,
        };

        Self {
            callsign: login.callsign,
            ist_atc: login.ist_atc,
            cid: login.cid,
            real_name: login.real_name,
            konto_rating: login.konto_rating,
            angemeldet_seit: Instant::now(),
            inner: Mutex::new(inner),
        }
    }

    pub fn cid(&self) -> &str {
        &self.cid
    }

    pub fn real_name(&self) -> &str {
        &self.real_name
    }

    pub fn konto_rating(&self) -> Rating {
        self.konto_rating
    }

    pub fn online_sekunden(&self) -> i64 {
        self.angemeldet_seit.elapsed().as_secs() as i64
    }

    pub fn zustand(&self) -> ClientZustand {
        self.inner.lock().zustand
    }

    pub fn ist_geloescht(&self) -> bool {
        self.zustand() == ClientZustand::Geloescht
    }

    pub fn letzte_session_id(&self) -> u64 {
        self.inner.lock().letzte_session_id
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.inner.lock().verbindung.as_ref().map(|v| v.peer)
    }

    // --- Lebenszyklus -----------------------------------------------------

    /// Bindet einen getrennten Client an eine neue Verbindung
    ///
    /// Bricht den Reconnect-Timer ab und verwirft die ATIS. Liefert `false`
    /// wenn der Client nicht (mehr) getrennt ist.
    pub fn anbinden(&self, verbindung: Verbindung) -> bool {
        let mut inner = self.inner.lock();
        if inner.zustand != ClientZustand::Getrennt {
            return false;
        }
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        inner.zustand = ClientZustand::Aktiv;
        inner.generation += 1;
        inner.letzte_session_id = verbindung.session_id;
        inner.verbindung = Some(verbindung);
        inner.atis.clear();
        inner.atis_entwurf.clear();
        true
    }

    /// Markiert den Client als getrennt und liefert die neue Generation
    ///
    /// Mit `session_id` wirkt der Aufruf nur, wenn der Client noch an diese
    /// Session gebunden ist. Die Session der alten Bindung wird abgebrochen.
    pub fn als_getrennt_markieren(&self, session_id: Option<u64>) -> Option<u64> {
        let mut inner = self.inner.lock();
        if inner.zustand != ClientZustand::Aktiv {
            return None;
        }
        if session_id.is_some_and(|id| id != inner.letzte_session_id) {
            return None;
        }
        inner.zustand = ClientZustand::Getrennt;
        inner.generation += 1;
        if let Some(verbindung) = inner.verbindung.take() {
            verbindung.abbruch.cancel();
        }
        Some(inner.generation)
    }

    /// Haengt den Reconnect-Timer an; veraltete Timer werden sofort abgebrochen
    pub fn timer_setzen(&self, generation: u64, timer: AbortHandle) {
        let mut inner = self.inner.lock();
        if inner.zustand == ClientZustand::Getrennt && inner.generation == generation {
            if let Some(alt) = inner.reconnect_timer.replace(timer) {
                alt.abort();
            }
        } else {
            timer.abort();
        }
    }

    pub fn ist_getrennt_seit(&self, generation: u64) -> bool {
        let inner = self.inner.lock();
        inner.zustand == ClientZustand::Getrennt && inner.generation == generation
    }

    /// Uebergang nach `Geloescht`. Nur der erste Aufruf liefert `true`.
    pub fn als_geloescht_markieren(&self) -> bool {
        let mut inner = self.inner.lock();
        Self::loeschen(&mut inner)
    }

    /// Wie `als_geloescht_markieren`, aber nur wenn seit `generation`
    /// ununterbrochen getrennt
    pub fn nach_ablauf_loeschen(&self, generation: u64) -> bool {
        let mut inner = self.inner.lock();
        if inner.zustand != ClientZustand::Getrennt || inner.generation != generation {
            return false;
        }
        // Der Timer loescht sich hier selbst
        inner.reconnect_timer = None;
        Self::loeschen(&mut inner)
    }

    fn loeschen(inner: &mut ClientInner) -> bool {
        if inner.zustand == ClientZustand::Geloescht {
            return false;
        }
        inner.zustand = ClientZustand::Geloescht;
        inner.generation += 1;
        if let Some(timer) = inner.reconnect_timer.take() {
            timer.abort();
        }
        if let Some(verbindung) = inner.verbindung.take() {
            verbindung.abbruch.cancel();
        }
        true
    }

    // --- Senden -----------------------------------------------------------

    /// Schreiber der aktiven Verbindung, `None` wenn getrennt
    pub fn schreiber(&self) -> Option<Arc<dyn ZeilenSchreiber>> {
        let inner = self.inner.lock();
        match (inner.zustand, &inner.verbindung) {
            (ClientZustand::Aktiv, Some(v)) => Some(Arc::clone(&v.schreiber)),
            _ => None,
        }
    }

    /// Sendet eine fertige Zeile; schlaegt fehl wenn der Client getrennt ist
    pub async fn senden(&self, zeile: Arc<str>) -> EngineResult<()> {
        let schreiber = self.schreiber().ok_or(EngineError::ClientGetrennt)?;
        schreiber.schreiben(zeile).await
    }

    // --- Telemetrie -------------------------------------------------------

    pub fn telemetrie(&self) -> Telemetrie {
        self.inner.lock().telemetrie.clone()
    }

    pub fn rating_setzen(&self, rating: Rating) {
        self.inner.lock().rating = rating;
    }

    pub fn pilot_position_setzen(&self, update: PilotUpdate) {
        let mut inner = self.inner.lock();
        let t = &mut inner.telemetrie;
        t.positionen[0] = update.position;
        t.transponder = update.transponder;
        t.hoehe = update.hoehe;
        t.geschwindigkeit = update.geschwindigkeit;
        t.pbh = update.pbh;
        if let Some(rating) = update.rating {
            inner.rating = rating;
        }
    }

    pub fn atc_position_setzen(&self, update: AtcUpdate) {
        let mut inner = self.inner.lock();
        inner.facility = update.facility;
        let t = &mut inner.telemetrie;
        t.positionen[0] = update.position;
        t.frequenz = update.frequenz;
        t.sichtweite = update.sichtweite;
        t.hoehe = update.hoehe;
    }

    /// Setzt Sichtpunkt 0..=2 (Slots 1..=3)
    pub fn sichtpunkt_setzen(&self, index: usize, position: Position) -> bool {
        let Some(slot) = index.checked_add(1).filter(|s| *s < POSITIONS_SLOTS) else {
            return false;
        };
        self.inner.lock().telemetrie.positionen[slot] = position;
        true
    }

    /// Zaehlt ein Positionsupdate und zeichnet jeden `intervall`-ten Punkt auf
    pub fn pfad_tick(&self, intervall: u32) -> bool {
        let mut inner = self.inner.lock();
        inner.pfad_ticks += 1;
        if inner.pfad_ticks < intervall.max(1) {
            return false;
        }
        inner.pfad_ticks = 0;
        let punkt = PfadPunkt {
            position: inner.telemetrie.positionen[0],
            hoehe: inner.telemetrie.hoehe,
            zeitpunkt: Instant::now(),
        };
        inner.pfade.push(punkt);
        true
    }

    pub fn pfade(&self) -> Vec<PfadPunkt> {
        self.inner.lock().pfade.clone()
    }

    // --- Flugplan ---------------------------------------------------------

    pub fn flugplan(&self) -> Option<FlugplanEintrag> {
        self.inner.lock().flugplan.clone()
    }

    pub fn flugplan_setzen(&self, plan: Flugplan, locked: bool) {
        self.inner.lock().flugplan = Some(FlugplanEintrag { plan, locked });
    }

    /// Aendert nur die Reiseflughoehe eines vorhandenen Plans
    pub fn reiseflughoehe_setzen(&self, hoehe: &str) -> Option<FlugplanEintrag> {
        let mut inner = self.inner.lock();
        let eintrag = inner.flugplan.as_mut()?;
        eintrag.plan.reiseflughoehe = hoehe.to_string();
        Some(eintrag.clone())
    }

    // --- ATIS -------------------------------------------------------------

    /// Haengt eine Zeile an den laufenden ATIS-Block; `false` wenn voll
    pub fn atis_zeile_hinzufuegen(&self, zeile: &str) -> bool {
        let mut inner = self.inner.lock();
        if inner.atis_entwurf.len() >= ATIS_MAX_ZEILEN {
            return false;
        }
        inner.atis_entwurf.push(zeile.to_string());
        true
    }

    /// Veroeffentlicht den laufenden Block und ersetzt die alte ATIS
    pub fn atis_abschliessen(&self) -> usize {
        let mut inner = self.inner.lock();
        let block = std::mem::take(&mut inner.atis_entwurf);
        inner.atis = block;
        inner.atis.len()
    }

    pub fn atis(&self) -> Vec<String> {
        self.inner.lock().atis.clone()
    }

    // --- Historie ---------------------------------------------------------

    pub fn history_id_setzen(&self, id: Uuid) {
        self.inner.lock().history_id = Some(id);
    }

    pub fn history_id(&self) -> Option<Uuid> {
        self.inner.lock().history_id
    }
}

impl ClientInterface for Client {
    fn callsign(&self) -> &str {
        &self.callsign
    }

    fn ist_atc(&self) -> bool {
        self.ist_atc
    }

    fn rating(&self) -> Rating {
        self.inner.lock().rating
    }

    fn facility(&self) -> Facility {
        self.inner.lock().facility
    }

    fn sichtweite(&self) -> f64 {
        self.inner.lock().telemetrie.sichtweite
    }

    fn positionen(&self) -> [Position; POSITIONS_SLOTS] {
        self.inner.lock().telemetrie.positionen
    }

    fn ist_getrennt(&self) -> bool {
        self.inner.lock().zustand != ClientZustand::Aktiv
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("callsign", &self.callsign)
            .field("ist_atc", &self.ist_atc)
            .field("cid", &self.cid)
            .field("zustand", &self.zustand())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testhilfe::{test_client, test_verbindung};

    #[tokio::test]
    async fn senden_an_aktiven_client() {
        let (client, schreiber) = test_client("ABC123", false);
        client.senden(Arc::from("#TMSERVER:ABC123:hallo\r\n")).await.unwrap();
        assert_eq!(schreiber.zeilen(), vec!["#TMSERVER:ABC123:hallo\r\n"]);
    }

    #[tokio::test]
    async fn senden_an_getrennten_client_schlaegt_fehl() {
        let (client, schreiber) = test_client("ABC123", false);
        assert!(client.als_getrennt_markieren(None).is_some());
        assert!(client.ist_getrennt());

        let err = client.senden(Arc::from("x\r\n")).await.unwrap_err();
        assert!(matches!(err, EngineError::ClientGetrennt));
        assert!(schreiber.zeilen().is_empty());
    }

    #[test]
    fn getrennt_markieren_nur_fuer_eigene_session() {
        let (client, _) = test_client("ABC123", false);
        let eigene = client.letzte_session_id();

        assert!(client.als_getrennt_markieren(Some(eigene + 1)).is_none());
        assert!(!client.ist_getrennt());
        assert!(client.als_getrennt_markieren(Some(eigene)).is_some());
        // Zweites Markieren aendert nichts
        assert!(client.als_getrennt_markieren(None).is_none());
    }

    #[test]
    fn trennen_bricht_session_ab() {
        let (client, _) = test_client("ABC123", false);
        let (verbindung, _) = test_verbindung(77);
        let token = verbindung.abbruch.clone();

        client.als_getrennt_markieren(None);
        assert!(client.anbinden(verbindung));
        assert!(!token.is_cancelled());

        client.als_getrennt_markieren(None);
        assert!(token.is_cancelled());
    }

    #[test]
    fn anbinden_nur_wenn_getrennt() {
        let (client, _) = test_client("EDDF_TWR", true);
        let (neu, _) = test_verbindung(2);
        assert!(!client.anbinden(neu.clone()));

        client.als_getrennt_markieren(None);
        assert!(client.anbinden(neu));
        assert_eq!(client.letzte_session_id(), 2);
        assert!(!client.ist_getrennt());
    }

    #[test]
    fn anbinden_verwirft_atis() {
        let (client, _) = test_client("EDDF_TWR", true);
        client.atis_zeile_hinzufuegen("EDDF INFORMATION A");
        client.atis_abschliessen();
        client.atis_zeile_hinzufuegen("halb fertig");
        assert_eq!(client.atis().len(), 1);

        client.als_getrennt_markieren(None);
        let (neu, _) = test_verbindung(2);
        client.anbinden(neu);
        assert!(client.atis().is_empty());
        assert_eq!(client.atis_abschliessen(), 0);
    }

    #[test]
    fn loeschen_genau_einmal() {
        let (client, _) = test_client("ABC123", false);
        assert!(client.als_geloescht_markieren());
        assert!(!client.als_geloescht_markieren());
        assert!(client.ist_geloescht());
        assert!(client.ist_getrennt());
    }

    #[test]
    fn ablauf_loescht_nur_passende_generation() {
        let (client, _) = test_client("ABC123", false);
        let generation = client.als_getrennt_markieren(None).unwrap();

        let (neu, _) = test_verbindung(9);
        client.anbinden(neu);
        assert!(!client.nach_ablauf_loeschen(generation));
        assert!(!client.ist_geloescht());

        let zweite = client.als_getrennt_markieren(None).unwrap();
        assert!(client.nach_ablauf_loeschen(zweite));
        assert!(client.ist_geloescht());
    }

    #[tokio::test]
    async fn veralteter_timer_wird_abgebrochen() {
        let (client, _) = test_client("ABC123", false);
        let generation = client.als_getrennt_markieren(None).unwrap();

        let task = tokio::spawn(std::future::pending::<()>());
        client.timer_setzen(generation + 1, task.abort_handle());
        assert!(task.await.unwrap_err().is_cancelled());
    }

    #[test]
    fn atis_ist_begrenzt() {
        let (client, _) = test_client("EDDF_TWR", true);
        for i in 0..ATIS_MAX_ZEILEN {
            assert!(client.atis_zeile_hinzufuegen(&format!("Zeile {i}")));
        }
        assert!(!client.atis_zeile_hinzufuegen("zu viel"));
        assert_eq!(client.atis_abschliessen(), ATIS_MAX_ZEILEN);

        // Neuer Block ersetzt den alten komplett
        client.atis_zeile_hinzufuegen("neu");
        client.atis_abschliessen();
        assert_eq!(client.atis(), vec!["neu".to_string()]);
    }

    #[test]
    fn pfad_wird_jeden_n_ten_tick_aufgezeichnet() {
        let (client, _) = test_client("ABC123", false);
        let ergebnisse: Vec<bool> = (0..6).map(|_| client.pfad_tick(3)).collect();
        assert_eq!(ergebnisse, vec![false, false, true, false, false, true]);
        assert_eq!(client.pfade().len(), 2);

        // Intervall 1 zeichnet jedes Update auf
        assert!(client.pfad_tick(1));
        assert_eq!(client.pfade().len(), 3);
    }

    #[test]
    fn pilot_update_setzt_telemetrie() {
        let (client, _) = test_client("ABC123", false);
        client.pilot_position_setzen(PilotUpdate {
            position: Position::neu(50.03, 8.57),
            transponder: 2000,
            hoehe: 5000,
            geschwindigkeit: 250,
            pbh: 42,
            rating: Some(Rating::Normal),
        });

        let t = client.telemetrie();
        assert_eq!(t.positionen[0], Position::neu(50.03, 8.57));
        assert_eq!(t.transponder, 2000);
        assert_eq!(t.hoehe, 5000);
        assert_eq!(t.sichtweite, PILOT_SICHTWEITE_NM);
    }

    #[test]
    fn sichtpunkte_nur_drei() {
        let (client, _) = test_client("EDDF_CTR", true);
        assert!(client.sichtpunkt_setzen(0, Position::neu(1.0, 1.0)));
        assert!(client.sichtpunkt_setzen(2, Position::neu(3.0, 3.0)));
        assert!(!client.sichtpunkt_setzen(3, Position::neu(4.0, 4.0)));
        assert!(!client.sichtpunkt_setzen(usize::MAX, Position::neu(5.0, 5.0)));

        let p = client.positionen();
        assert_eq!(p[1], Position::neu(1.0, 1.0));
        assert_eq!(p[3], Position::neu(3.0, 3.0));
        assert!(!p[0].ist_gueltig());
    }

    #[test]
    fn reiseflughoehe_ohne_plan() {
        let (client, _) = test_client("ABC123", false);
        assert!(client.reiseflughoehe_setzen("FL350").is_none());

        client.flugplan_setzen(Flugplan::default(), true);
        let eintrag = client.reiseflughoehe_setzen("FL350").unwrap();
        assert_eq!(eintrag.plan.reiseflughoehe, "FL350");
        assert!(eintrag.locked);
    }

    #[test]
    fn schreiber_nur_wenn_aktiv() {
        let (client, _) = test_client("ABC123", false);
        assert!(client.schreiber().is_some());
        client.als_getrennt_markieren(None);
        assert!(client.schreiber().is_none());
    }
}
