//! Empfaengerfilter fuer Broadcasts
//!
//! Ein Filter entscheidet pro Empfaenger `to`, ob eine Nachricht des
//! Absenders `from` zugestellt wird. `from == None` steht fuer Nachrichten
//! des Servers selbst. Filter werden mit `und` / `alle` verknuepft.

use std::sync::Arc;

use fsd_protocol::{naechste_distanz, Rating};

use crate::client::ClientInterface;

pub type Filter =
    Arc<dyn Fn(&dyn ClientInterface, Option<&dyn ClientInterface>) -> bool + Send + Sync>;

/// Sind `to` und `from` in Funkreichweite?
///
/// Schwelle: zwei Lotsen die groessere Sichtweite, ein Lotse dessen
/// Sichtweite, zwei Piloten die Summe beider Sichtweiten.
pub fn ist_in_reichweite(to: &dyn ClientInterface, from: Option<&dyn ClientInterface>) -> bool {
    let Some(from) = from else {
        return true;
    };

    let schwelle = match (to.ist_atc(), from.ist_atc()) {
        (true, true) => to.sichtweite().max(from.sichtweite()),
        (true, false) => to.sichtweite(),
        (false, true) => from.sichtweite(),
        (false, false) => to.sichtweite() + from.sichtweite(),
    };

    let distanz = naechste_distanz(&to.positionen(), &from.positionen());
    distanz.is_finite() && distanz <= schwelle
}

/// Baut einen Filter aus einer Closure
pub fn filter<F>(f: F) -> Filter
where
    F: Fn(&dyn ClientInterface, Option<&dyn ClientInterface>) -> bool + Send + Sync + 'static,
{
    Arc::new(f)
}

pub fn in_range() -> Filter {
    filter(ist_in_reichweite)
}

pub fn to_atc_only() -> Filter {
    filter(|to, _| to.ist_atc())
}

/// Lotsen ab Supervisor; `strikt` verlangt genau Supervisor
pub fn to_supervisors(strikt: bool) -> Filter {
    filter(move |to, _| {
        to.ist_atc()
            && if strikt {
                to.rating() == Rating::Supervisor
            } else {
                to.rating() >= Rating::Supervisor
            }
    })
}

pub fn immer() -> Filter {
    filter(|_, _| true)
}

pub fn und(a: Filter, b: Filter) -> Filter {
    filter(move |to, from| a(to, from) && b(to, from))
}

/// Alle Filter muessen zustimmen; leere Liste laesst alles durch
pub fn alle(filter: Vec<Filter>) -> Filter {
    self::filter(move |to, from| filter.iter().all(|f| f(to, from)))
}

/// Lotsen in Reichweite
pub fn atc_in_reichweite() -> Filter {
    und(to_atc_only(), in_range())
}

/// Empfaenger einer Login-Zeile
///
/// Direkt nach dem Login hat der Absender noch keine Position. Dann geht
/// die Zeile an alle Lotsen, sonst an alle in Reichweite. Ohne Position
/// ist das bewusst weiter als [`in_range`], das dann niemanden liefert.
pub fn login_empfaenger() -> Filter {
    filter(|to, from| match from {
        Some(f) if !f.positionen().iter().any(|p| p.ist_gueltig()) => to.ist_atc(),
        _ => ist_in_reichweite(to, from),
    })
}
