//! Request pipeline: route resolution followed by five sequential
//! gates (force, session, intents, body/query validation, dispatch).
//! Each gate either passes control on or terminates the request with a
//! structured error; the first failure is terminal.

pub mod context;
pub mod intents;
pub mod session;

pub use context::RequestContext;
pub use session::Officer;

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::Method;
use axum::response::{IntoResponse, Json, Response};
use serde_json::Value;

use crate::database::SqlValue;
use crate::error::ApiError;
use crate::routes::RouteResolveError;
use crate::state::AppState;

/// Tenant selector header on force-scoped routes.
pub const FORCE_HEADER: &str = "x-portalseguranca-force";

const BODY_LIMIT: usize = 2 * 1024 * 1024;

pub fn is_production() -> bool {
    matches!(std::env::var("APP_ENV").as_deref(), Ok("production") | Ok("prod"))
}

/// Single entry point mounted as the router fallback; owns the whole
/// request lifecycle described above.
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = uri.path().to_string();
    let headers = request.headers().clone();

    let body_bytes = match axum::body::to_bytes(request.into_body(), BODY_LIMIT).await {
        Ok(bytes) => bytes,
        Err(_) => return ApiError::bad_request("Corpo do pedido demasiado grande.").into_response(),
    };

    // Route resolution: first pattern (in declaration order) matching
    // the path wins, then the method is looked up on that entry.
    let route_match = match state.routes.resolve(&path, &method) {
        Ok(m) => m,
        Err(RouteResolveError::RouteNotFound) => {
            return ApiError::not_found("Rota não encontrada.").into_response()
        }
        Err(RouteResolveError::MethodNotAllowed) => {
            return ApiError::MethodNotAllowed.into_response()
        }
    };
    let descriptor = route_match.descriptor;

    // Gate 1: force header
    let mut force: Option<String> = None;
    if descriptor.requires_force {
        match headers.get(FORCE_HEADER).and_then(|v| v.to_str().ok()) {
            None => {
                return ApiError::bad_request("Cabeçalho de força em falta.").into_response()
            }
            Some(value) if !state.config.is_known(value) => {
                return ApiError::bad_request("Força inválida.").into_response()
            }
            Some(value) => force = Some(value.to_string()),
        }
    }

    // Parsed up front so error logging can include the raw body, but a
    // parse failure only becomes terminal at the validation gate: the
    // force and session gates rule first.
    let (parsed_body, body_parse_error): (Value, Option<String>) = if body_bytes.is_empty() {
        (Value::Null, None)
    } else {
        match serde_json::from_slice(&body_bytes) {
            Ok(v) => (v, None),
            Err(e) => (Value::Null, Some(e.to_string())),
        }
    };

    // Gate 2: session
    let mut officer: Option<Officer> = None;
    let mut session_token_hash: Option<String> = None;
    if descriptor.requires_session {
        let force_id = force.as_deref().unwrap_or_default();
        let Some(token) = session::extract_token(&headers) else {
            return ApiError::unauthorized("Sessão não encontrada.").into_response();
        };
        session_token_hash = Some(session::hash_token(&token));
        match session::validate_session(&state, force_id, &token).await {
            Ok(found) => officer = Some(found),
            Err(err) => {
                return respond_error(&state, force.as_deref(), &method, &path, &parsed_body, None, err)
                    .await
            }
        }
    }

    // Gate 3: intents, all required and short-circuiting
    if !descriptor.intents.is_empty() {
        let force_id = force.as_deref().unwrap_or_default();
        let nif = officer.as_ref().map(|o| o.nif).unwrap_or_default();
        if let Err(err) = intents::check_intents(&state, force_id, nif, descriptor.intents).await {
            let nif = officer.as_ref().map(|o| o.nif);
            return respond_error(&state, force.as_deref(), &method, &path, &parsed_body, nif, err)
                .await;
        }
    }

    // Gate 4: declared body/query shapes. A declared query schema is
    // only checked when query parameters were actually supplied.
    if let Some(validator) = descriptor.body {
        if let Some(detail) = body_parse_error {
            return ApiError::validation_error("Corpo do pedido inválido.", detail).into_response();
        }
        if let Err(detail) = validator(&parsed_body) {
            return ApiError::validation_error("Corpo do pedido inválido.", detail).into_response();
        }
    }
    let query_pairs: Vec<(String, Value)> = uri
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect()
        })
        .unwrap_or_default();
    if let Some(validator) = descriptor.query_params {
        if !query_pairs.is_empty() {
            let as_object = Value::Object(query_pairs.iter().cloned().collect());
            if let Err(detail) = validator(&as_object) {
                return ApiError::validation_error("Parâmetros de pesquisa inválidos.", detail)
                    .into_response();
            }
        }
    }

    // Gate 5: handler dispatch with the assembled context
    let ctx = RequestContext {
        state: state.clone(),
        force,
        officer,
        session_token_hash,
        body: parsed_body,
        query: query_pairs,
        captures: route_match.captures,
    };

    match (descriptor.handler)(&ctx).await {
        Ok(response) => {
            if let Some(spec) = &descriptor.broadcast {
                if response.status.is_success() {
                    if let Ok(force) = ctx.force() {
                        let event_body = (spec.body)(&ctx, &response);
                        crate::broadcast::publish_for_force(
                            state.broadcaster.as_ref(),
                            &state.config,
                            force,
                            spec.event,
                            event_body,
                            spec.patrol,
                        );
                    }
                }
            }
            response.into_response()
        }
        Err(err) => {
            let nif = ctx.officer.as_ref().map(|o| o.nif);
            respond_error(&state, ctx.force.as_deref(), &method, &path, &ctx.body, nif, err).await
        }
    }
}

/// Terminal error mapping. Inline failures respond as-is; unexpected
/// errors are persisted to the force's error log under a reference
/// code the caller can quote in a support report.
async fn respond_error(
    state: &Arc<AppState>,
    force: Option<&str>,
    method: &Method,
    path: &str,
    body: &Value,
    nif: Option<i64>,
    err: ApiError,
) -> Response {
    let ApiError::Internal { code, detail } = &err else {
        return err.into_response();
    };

    tracing::error!(code = %code, method = %method, path, "unhandled error: {}", detail);

    if let Some(force) = force {
        let result = state
            .registry
            .execute(
                force,
                "INSERT INTO errors (code, route, method, body, officer, detail) \
                 VALUES (?, ?, ?, ?, ?, ?)",
                vec![
                    SqlValue::from(code.as_str()),
                    SqlValue::from(path),
                    SqlValue::from(method.as_str()),
                    SqlValue::from(body.to_string()),
                    SqlValue::from(nif),
                    SqlValue::from(detail.as_str()),
                ],
            )
            .await;
        if let Err(e) = result {
            tracing::warn!("failed to persist error log for force '{}': {}", force, e);
        }
    }

    let envelope = if is_production() { err.to_json() } else { err.to_json_with_details() };
    (err.status_code(), Json(envelope)).into_response()
}
