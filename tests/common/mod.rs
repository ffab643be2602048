use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use portalseguranca_api::broadcast::LogBroadcaster;
use portalseguranca_api::config::{ForceConfig, ForceEntry};
use portalseguranca_api::database::TenantConnectionRegistry;
use portalseguranca_api::routes::table;
use portalseguranca_api::state::AppState;

pub const FORCE_HEADER: &str = portalseguranca_api::pipeline::FORCE_HEADER;

fn force_entry(database: &str) -> ForceEntry {
    ForceEntry {
        name: database.to_uppercase(),
        database: database.to_string(),
        promotion_expression: "NULL".to_string(),
        inactivity_justification_type: 3,
        min_week_minutes: 120,
        max_non_working_days: 30,
        patrol_forces: vec![],
    }
}

/// In-process application with a two-force config and no live database
/// pools. Everything up to (and including) the force and session gates
/// is exercisable without any tenant database.
pub fn app() -> Router {
    let config = ForceConfig::from_entries([
        ("alfa".to_string(), force_entry("force_alfa")),
        ("bravo".to_string(), force_entry("force_bravo")),
    ])
    .expect("test force table");
    let state = AppState::new(
        config,
        TenantConnectionRegistry::empty(),
        table::routes().expect("route table"),
        Arc::new(LogBroadcaster),
    );
    portalseguranca_api::app(state)
}

pub async fn send(
    app: Router,
    request: Request<Body>,
) -> Result<(StatusCode, serde_json::Value)> {
    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, body))
}
