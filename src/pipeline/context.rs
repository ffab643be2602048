use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::mysql::{MySqlQueryResult, MySqlRow};

use crate::config::ForceEntry;
use crate::database::Params;
use crate::error::ApiError;
use crate::state::AppState;

use super::session::Officer;

/// Strongly-typed per-request capability bundle, constructed once by
/// the gate chain and passed to the handler. Replaces ambient mutable
/// request state: everything a handler may rely on is resolved here.
pub struct RequestContext {
    pub state: Arc<AppState>,
    /// Resolved force identifier, present on `requires_force` routes.
    pub force: Option<String>,
    /// Acting officer, present on `requires_session` routes.
    pub officer: Option<Officer>,
    /// Hashed token of the validated session, for handlers that manage
    /// the session itself (logout, password change).
    pub session_token_hash: Option<String>,
    /// Parsed (and, when declared, validated) JSON body; `Null` if none.
    pub body: Value,
    /// Query-string pairs in received order.
    pub query: Vec<(String, Value)>,
    /// Path captures from the matched route pattern.
    pub captures: Vec<String>,
}

impl RequestContext {
    pub fn force(&self) -> Result<&str, ApiError> {
        self.force
            .as_deref()
            .ok_or_else(|| ApiError::internal("route handler ran without a resolved force"))
    }

    pub fn force_entry(&self) -> Result<&ForceEntry, ApiError> {
        let force = self.force()?;
        self.state
            .config
            .force(force)
            .ok_or_else(|| ApiError::internal(format!("force '{}' vanished from config", force)))
    }

    pub fn officer(&self) -> Result<&Officer, ApiError> {
        self.officer
            .as_ref()
            .ok_or_else(|| ApiError::internal("route handler ran without a logged officer"))
    }

    pub fn capture_i64(&self, index: usize) -> Result<i64, ApiError> {
        self.captures
            .get(index)
            .and_then(|c| c.parse::<i64>().ok())
            .ok_or_else(|| ApiError::bad_request("Identificador inválido."))
    }

    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, ApiError> {
        serde_json::from_value(self.body.clone())
            .map_err(|e| ApiError::validation_error("Corpo do pedido inválido.", e.to_string()))
    }

    pub fn query_value(&self, name: &str) -> Option<&Value> {
        self.query.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// SELECT against the request's force database.
    pub async fn fetch(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<Vec<MySqlRow>, ApiError> {
        Ok(self.state.registry.query(self.force()?, sql, params).await?)
    }

    /// Mutation against the request's force database.
    pub async fn exec(
        &self,
        sql: &str,
        params: impl Into<Params>,
    ) -> Result<MySqlQueryResult, ApiError> {
        Ok(self.state.registry.execute(self.force()?, sql, params).await?)
    }
}
