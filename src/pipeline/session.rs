use std::sync::Arc;

use axum::http::HeaderMap;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::ApiError;
use crate::state::AppState;

/// Acting officer loaded from the force database for the session's NIF.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Officer {
    pub nif: i64,
    pub name: String,
    /// Rank ordered by seniority; a numerically lower patent outranks a
    /// higher one.
    pub patent: i64,
    pub status: i64,
    pub callsign: Option<String>,
}

/// Session credential from the `Authorization` header or the
/// `sid`/`sessionToken` cookie.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        let token = value.strip_prefix("Bearer ").unwrap_or(value).trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }
    let cookies = headers.get("cookie").and_then(|v| v.to_str().ok())?;
    for pair in cookies.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let name = parts.next()?;
        if name == "sid" || name == "sessionToken" {
            let value = parts.next().unwrap_or("").trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Tokens are stored hashed; compare on the SHA-256 hex digest.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Look the token up in the resolved force's session store and load the
/// officer it belongs to. A session row only exists in the database of
/// the force that created it, so cross-force reuse fails here.
pub async fn validate_session(
    state: &Arc<AppState>,
    force: &str,
    token: &str,
) -> Result<Officer, ApiError> {
    use sqlx::{FromRow, Row};

    let hashed = hash_token(token);
    let rows = state
        .registry
        .query(force, "SELECT nif FROM sessions WHERE token = ?", hashed.clone())
        .await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::unauthorized("Sessão inválida."));
    };
    let nif: i64 = row.try_get("nif").map_err(ApiError::from)?;

    let rows = state
        .registry
        .query(
            force,
            "SELECT nif, name, patent, status, callsign FROM officers WHERE nif = ?",
            nif,
        )
        .await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::unauthorized("Sessão inválida."));
    };
    let officer = Officer::from_row(row).map_err(ApiError::from)?;

    touch_last_used(state, force, hashed, nif);

    Ok(officer)
}

/// Detached last-used updates for the session and the officer. Spawned
/// without awaiting so they never delay or fail the request; failures
/// are logged only.
fn touch_last_used(state: &Arc<AppState>, force: &str, hashed_token: String, nif: i64) {
    let state = state.clone();
    let force = force.to_string();
    tokio::spawn(async move {
        if let Err(e) = state
            .registry
            .execute(
                &force,
                "UPDATE sessions SET last_used = NOW() WHERE token = ?",
                hashed_token,
            )
            .await
        {
            tracing::warn!("failed to update session last_used for force '{}': {}", force, e);
        }
        if let Err(e) = state
            .registry
            .execute(
                &force,
                "UPDATE officers SET last_interaction = NOW() WHERE nif = ?",
                nif,
            )
            .await
        {
            tracing::warn!("failed to update officer last_interaction for force '{}': {}", force, e);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn token_from_authorization_header() {
        let map = headers(&[("authorization", "abc123")]);
        assert_eq!(extract_token(&map).as_deref(), Some("abc123"));
    }

    #[test]
    fn bearer_prefix_is_stripped() {
        let map = headers(&[("authorization", "Bearer abc123")]);
        assert_eq!(extract_token(&map).as_deref(), Some("abc123"));
    }

    #[test]
    fn token_from_sid_cookie() {
        let map = headers(&[("cookie", "theme=dark; sid=tok456")]);
        assert_eq!(extract_token(&map).as_deref(), Some("tok456"));
    }

    #[test]
    fn token_from_session_token_cookie() {
        let map = headers(&[("cookie", "sessionToken=tok789")]);
        assert_eq!(extract_token(&map).as_deref(), Some("tok789"));
    }

    #[test]
    fn missing_credential_is_none() {
        let map = headers(&[("cookie", "theme=dark")]);
        assert_eq!(extract_token(&map), None);
    }

    #[test]
    fn hashing_is_deterministic_and_hex() {
        let first = hash_token("token");
        assert_eq!(first, hash_token("token"));
        assert_eq!(first.len(), 64);
        assert!(first.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(first, hash_token("other"));
    }
}
