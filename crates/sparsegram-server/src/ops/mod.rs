//! Operational HTTP endpoints.
//!
//! - `/healthz`          : liveness
//! - `/histograms`       : plain-text dump, optional `?query=substring`
//! - `/histograms.html`  : the same dump as an HTML page
//! - anything else       : 404, still counted by the status middleware

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
};
use serde::Deserialize;

use crate::app_state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct DumpQuery {
    /// Substring a metric name must contain; empty matches all.
    #[serde(default)]
    pub query: String,
}

pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "not found")
}

pub async fn histograms(State(state): State<AppState>, Query(q): Query<DumpQuery>) -> Response {
    let body = state.registry().render_text(&q.query);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

pub async fn histograms_html(
    State(state): State<AppState>,
    Query(q): Query<DumpQuery>,
) -> Response {
    Html(state.registry().render_html(&q.query)).into_response()
}
