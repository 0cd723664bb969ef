// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local HTTP surface for the authorization flow.

pub mod http;
pub mod state;
pub mod view;

pub use state::AppState;

use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

/// Build the axum `Router` for the callback server.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(http::index))
        .route("/auth", get(http::auth_landing).post(http::auth_callback))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
