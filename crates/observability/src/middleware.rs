//! HTTP-Tracing fuer die Observability-Endpunkte

use axum::{body::Body, http::Request, Router};
use tower_http::{
    classify::{ServerErrorsAsFailures, SharedClassifier},
    trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

type SpanFn = fn(&Request<Body>) -> tracing::Span;

fn http_span(req: &Request<Body>) -> tracing::Span {
    tracing::debug_span!("http", method = %req.method(), path = %req.uri().path())
}

/// TraceLayer mit Methode und Pfad im Span, Antworten auf DEBUG
pub fn request_timing_layer(
) -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>, SpanFn, DefaultOnRequest, DefaultOnResponse>
{
    TraceLayer::new_for_http()
        .make_span_with(http_span as SpanFn)
        .on_response(DefaultOnResponse::new().level(Level::DEBUG))
}

/// Legt das Request-Tracing um einen Router
pub fn mit_request_tracing(router: Router) -> Router {
    router.layer(request_timing_layer())
}
