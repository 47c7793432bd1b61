//! Self-observation: the server counts its own response codes in a sparse
//! histogram, so the dump endpoints always have something to show.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sparsegram_core::Metric;

use crate::app_state::AppState;

pub async fn record_status(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let resp = next.run(req).await;
    let code = i64::from(resp.status().as_u16());
    if let Err(e) = state.http_status().add(code) {
        tracing::warn!(status = code, error = %e, "status sample dropped");
    }
    resp
}
