//! Account and session management: login, logout, password changes and
//! account detail with per-force permission grants.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Deserialize;
use serde_json::json;
use sqlx::Row;

use crate::error::{ApiError, ApiResponse};
use crate::pipeline::session::hash_token;
use crate::pipeline::RequestContext;

const WRONG_CREDENTIALS: &str = "NIF ou password errados.";
const SESSION_TOKEN_LEN: usize = 48;
const PERSISTENT_COOKIE_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub nif: i64,
    pub password: String,
    #[serde(default)]
    pub persistent: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordBody {
    pub old_password: String,
    pub new_password: String,
}

fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

fn verify_password(password: &str, hash: &str) -> Result<bool, ApiError> {
    let parsed = argon2::PasswordHash::new(hash)
        .map_err(|e| ApiError::internal(format!("stored password hash is malformed: {}", e)))?;
    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(ApiError::internal(format!("password verification failed: {}", e))),
    }
}

fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| ApiError::internal(format!("password hashing failed: {}", e)))
}

/// POST /accounts/login
pub async fn login(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let body: LoginBody = ctx.body_as()?;

    let rows = ctx
        .fetch(
            "SELECT password, suspended FROM accounts WHERE nif = ?",
            body.nif,
        )
        .await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::unauthorized(WRONG_CREDENTIALS));
    };
    let stored: String = row.try_get("password").map_err(ApiError::from)?;
    let suspended: bool = row.try_get("suspended").map_err(ApiError::from)?;

    if !verify_password(&body.password, &stored)? {
        return Err(ApiError::unauthorized(WRONG_CREDENTIALS));
    }
    if suspended {
        return Err(ApiError::forbidden("Conta suspensa."));
    }

    let token = generate_token();
    ctx.exec(
        "INSERT INTO sessions (token, nif, created, last_used) VALUES (?, ?, NOW(), NOW())",
        vec![hash_token(&token).into(), body.nif.into()],
    )
    .await?;

    let mut cookie = format!("sid={}; Path=/; HttpOnly; SameSite=Strict", token);
    if body.persistent {
        cookie.push_str(&format!("; Max-Age={}", PERSISTENT_COOKIE_MAX_AGE_SECS));
    }

    Ok(ApiResponse::ok("Login efetuado com sucesso.")
        .with_data(json!({ "token": token }))
        .with_cookie(cookie))
}

/// POST /accounts/logout
pub async fn logout(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let hashed = ctx
        .session_token_hash
        .clone()
        .ok_or_else(|| ApiError::internal("logout reached without a session token"))?;
    ctx.exec("DELETE FROM sessions WHERE token = ?", hashed).await?;
    Ok(ApiResponse::ok("Sessão terminada.")
        .with_cookie("sid=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0"))
}

/// PATCH /accounts/{nif}/password — only the account holder; every
/// other session of the account is dropped on success.
pub async fn change_password(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let target_nif = ctx.capture_i64(0)?;
    let officer = ctx.officer()?;
    if officer.nif != target_nif {
        return Err(ApiError::forbidden("Só podes alterar a tua própria password."));
    }

    let body: ChangePasswordBody = ctx.body_as()?;
    let rows = ctx
        .fetch("SELECT password FROM accounts WHERE nif = ?", target_nif)
        .await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::not_found("Conta não encontrada."));
    };
    let stored: String = row.try_get("password").map_err(ApiError::from)?;

    if !verify_password(&body.old_password, &stored)? {
        return Err(ApiError::unauthorized("Password atual errada."));
    }

    ctx.exec(
        "UPDATE accounts SET password = ? WHERE nif = ?",
        vec![hash_password(&body.new_password)?.into(), target_nif.into()],
    )
    .await?;

    let current = ctx
        .session_token_hash
        .clone()
        .ok_or_else(|| ApiError::internal("password change reached without a session token"))?;
    ctx.exec(
        "DELETE FROM sessions WHERE nif = ? AND token != ?",
        vec![target_nif.into(), current.into()],
    )
    .await?;

    Ok(ApiResponse::ok("Password alterada com sucesso."))
}

/// GET /accounts/{nif}
pub async fn get(ctx: &RequestContext) -> Result<ApiResponse, ApiError> {
    let nif = ctx.capture_i64(0)?;

    let rows = ctx
        .fetch(
            "SELECT nif, suspended, last_used FROM accounts \
             LEFT JOIN sessions USING (nif) WHERE nif = ? \
             ORDER BY last_used DESC LIMIT 1",
            nif,
        )
        .await?;
    let Some(row) = rows.first() else {
        return Err(ApiError::not_found("Conta não encontrada."));
    };
    let suspended: bool = row.try_get("suspended").map_err(ApiError::from)?;
    let last_used: Option<chrono::NaiveDateTime> =
        row.try_get("last_used").map_err(ApiError::from)?;

    let intent_rows = ctx
        .fetch(
            "SELECT intent, enabled FROM officer_intents WHERE officer = ?",
            nif,
        )
        .await?;
    let mut intents = serde_json::Map::new();
    for row in &intent_rows {
        let intent: String = row.try_get("intent").map_err(ApiError::from)?;
        let enabled: bool = row.try_get("enabled").map_err(ApiError::from)?;
        intents.insert(intent, json!(enabled));
    }

    Ok(ApiResponse::ok("Operação bem sucedida.").with_data(json!({
        "nif": nif,
        "suspended": suspended,
        "last_used": last_used,
        "intents": intents,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_long_and_unique() {
        let token = generate_token();
        assert_eq!(token.len(), SESSION_TOKEN_LEN);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn password_roundtrip_verifies() {
        let hash = hash_password("correct").unwrap();
        assert!(verify_password("correct", &hash).unwrap());
        assert!(!verify_password("wrong", &hash).unwrap());
    }

    #[test]
    fn malformed_stored_hash_is_an_internal_error() {
        let err = verify_password("pw", "not-a-hash").unwrap_err();
        assert!(matches!(err, ApiError::Internal { .. }));
    }
}
