//! Axum router wiring.

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, obs, ops};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(ops::healthz))
        .route("/histograms", get(ops::histograms))
        .route("/histograms.html", get(ops::histograms_html))
        .fallback(ops::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), obs::record_status))
        .with_state(state)
}
