//! End-to-end login scenarios against a live MySQL server. Set
//! PORTALSEGURANCA_TEST_DATABASE_URL (a MySQL URL whose user may create
//! databases) to enable them; without it every test skips cleanly.

mod common;

use std::sync::{Arc, OnceLock};

use anyhow::Result;
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use sqlx::mysql::MySqlPoolOptions;
use tokio::sync::{Mutex, MutexGuard};

use portalseguranca_api::broadcast::LogBroadcaster;
use portalseguranca_api::config::{ForceConfig, ForceEntry};
use portalseguranca_api::database::TenantConnectionRegistry;
use portalseguranca_api::routes::table;
use portalseguranca_api::state::AppState;

const ALFA_DB: &str = "portalseguranca_test_alfa";
const BRAVO_DB: &str = "portalseguranca_test_bravo";
const SEED_NIF: i64 = 111222333;

// The tests reseed the same two databases, so they run one at a time.
static SERIAL: OnceLock<Mutex<()>> = OnceLock::new();

async fn serial() -> MutexGuard<'static, ()> {
    SERIAL.get_or_init(|| Mutex::new(())).lock().await
}

fn entry(database: &str) -> ForceEntry {
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

/// Create and reseed both force databases, then build the application
/// on live pools. `None` means the live-server env is not configured.
async fn live_app() -> Result<Option<Router>> {
    let Ok(base) = std::env::var("PORTALSEGURANCA_TEST_DATABASE_URL") else {
        eprintln!("skipping: PORTALSEGURANCA_TEST_DATABASE_URL not set");
        return Ok(None);
    };
    std::env::set_var("DATABASE_URL", &base);

    let admin = MySqlPoolOptions::new().max_connections(1).connect(&base).await?;
    for db in [ALFA_DB, BRAVO_DB] {
        sqlx::query(&format!("CREATE DATABASE IF NOT EXISTS {}", db))
            .execute(&admin)
            .await?;
        let ddl = [
            format!(
                "CREATE TABLE IF NOT EXISTS {}.accounts (\
                 nif BIGINT PRIMARY KEY, password TEXT NOT NULL, \
                 suspended BOOLEAN NOT NULL DEFAULT FALSE)",
                db
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}.sessions (\
                 token VARCHAR(64) PRIMARY KEY, nif BIGINT NOT NULL, \
                 created DATETIME NOT NULL, last_used DATETIME NOT NULL)",
                db
            ),
            format!(
                "CREATE TABLE IF NOT EXISTS {}.officers (\
                 nif BIGINT PRIMARY KEY, name VARCHAR(255) NOT NULL, \
                 patent BIGINT NOT NULL, status BIGINT NOT NULL, \
                 callsign VARCHAR(32) NULL, entry_date DATE NULL, \
                 last_interaction DATETIME NULL)",
                db
            ),
        ];
        for statement in &ddl {
            sqlx::query(statement).execute(&admin).await?;
        }
        for name in ["sessions", "accounts", "officers"] {
            sqlx::query(&format!("DELETE FROM {}.{}", db, name))
                .execute(&admin)
                .await?;
        }
    }

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(b"correct", &salt)
        .map_err(|e| anyhow::anyhow!("hashing seed password: {}", e))?
        .to_string();
    sqlx::query(&format!(
        "INSERT INTO {}.accounts (nif, password, suspended) VALUES (?, ?, FALSE)",
        ALFA_DB
    ))
    .bind(SEED_NIF)
    .bind(hash)
    .execute(&admin)
    .await?;
    sqlx::query(&format!(
        "INSERT INTO {}.officers (nif, name, patent, status) VALUES (?, 'Seed', 3, 1)",
        ALFA_DB
    ))
    .bind(SEED_NIF)
    .execute(&admin)
    .await?;
    admin.close().await;

    let config = ForceConfig::from_entries([
        ("alfa".to_string(), entry(ALFA_DB)),
        ("bravo".to_string(), entry(BRAVO_DB)),
    ])?;
    let registry = TenantConnectionRegistry::connect(&config).await?;
    let state = AppState::new(config, registry, table::routes()?, Arc::new(LogBroadcaster));
    Ok(Some(portalseguranca_api::app(state)))
}

fn login_request(force: &str, password: &str) -> Result<Request<Body>> {
    Ok(Request::builder()
        .method(Method::POST)
        .uri("/accounts/login")
        .header(common::FORCE_HEADER, force)
        .header("content-type", "application/json")
        .body(Body::from(format!(
            r#"{{"nif": {}, "password": "{}"}}"#,
            SEED_NIF, password
        )))?)
}

#[tokio::test]
async fn login_with_wrong_password_is_401() -> Result<()> {
    let _guard = serial().await;
    let Some(app) = live_app().await? else { return Ok(()) };

    let (status, body) = common::send(app, login_request("alfa", "wrong")?).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "NIF ou password errados.");
    Ok(())
}

#[tokio::test]
async fn session_is_only_valid_in_its_own_force() -> Result<()> {
    let _guard = serial().await;
    let Some(app) = live_app().await? else { return Ok(()) };

    let (status, body) = common::send(app.clone(), login_request("alfa", "correct")?).await?;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    // the token only has a session row in alfa's database
    let request = Request::builder()
        .method(Method::GET)
        .uri("/officers")
        .header(common::FORCE_HEADER, "bravo")
        .header("authorization", &token)
        .body(Body::empty())?;
    let (status, body) = common::send(app.clone(), request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Sessão inválida.");

    let request = Request::builder()
        .method(Method::GET)
        .uri("/officers")
        .header(common::FORCE_HEADER, "alfa")
        .header("authorization", &token)
        .body(Body::empty())?;
    let (status, _body) = common::send(app, request).await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}
