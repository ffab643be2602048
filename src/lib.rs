//! Multi-force personnel management backend. Each force (tenant) lives
//! in its own MySQL database, selected per request by the
//! `x-portalseguranca-force` header; a declarative route table drives a
//! gate chain of force, session, intent and shape checks before any
//! handler runs.

pub mod broadcast;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod pipeline;
pub mod routes;
pub mod state;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the HTTP application around the route-table dispatcher. Every
/// path funnels through the fallback so resolution, 404/405 semantics
/// and the gate chain stay in one place.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(pipeline::dispatch)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
