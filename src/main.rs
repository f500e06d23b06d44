use anyhow::{Context, Result};
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use upload_review::{
    backend::{ChangeFeed, LocalObjectStorage, SqliteBackend},
    config::{AppConfig, Command},
    db,
    models::Role,
    routes,
    state::AppState,
};

const MAX_DB_CONNECTIONS: u32 = 5;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting upload-review with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let db = Arc::new(db::connect(&cfg.database_url, MAX_DB_CONNECTIONS).await?);

    match command {
        Command::Migrate => {
            db::run_migrations(&db).await?;
            tracing::info!("Database migration complete.");
            return Ok(()); // exit after migration
        }
        Command::CreateUser {
            email,
            username,
            admin,
        } => return create_user(db, &cfg, &email, username, admin).await,
        Command::Serve => {}
    }

    // --- Initialize collaborators ---
    let files = LocalObjectStorage::new(
        cfg.storage_dir.clone(),
        cfg.public_url.clone(),
        cfg.signing_key.clone(),
    );
    let state = AppState::new(db, files);

    // --- Build router ---
    let app: Router = routes::routes::routes(cfg.max_upload_bytes).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Create (or reuse) the profile for `email`, optionally grant admin, and
/// print a fresh session token.
async fn create_user(
    db: Arc<sqlx::SqlitePool>,
    cfg: &AppConfig,
    email: &str,
    username: Option<String>,
    admin: bool,
) -> Result<()> {
    let backend = SqliteBackend::new(db, ChangeFeed::default());

    let profile = match backend.find_profile_by_email(email).await? {
        Some(profile) => {
            tracing::info!(user_id = %profile.id, "profile already exists");
            profile
        }
        None => {
            let username = username.unwrap_or_else(|| {
                email.split('@').next().unwrap_or(email).to_string()
            });
            backend
                .create_profile(&username, email)
                .await
                .with_context(|| format!("creating profile for {}", email))?
        }
    };

    if admin {
        backend.grant_role(profile.id, Role::Admin).await?;
        tracing::info!(user_id = %profile.id, "granted admin role");
    }

    let ttl = i64::try_from(cfg.session_ttl_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .context("UPLOAD_REVIEW_SESSION_TTL_SECS is out of range")?;
    let session = backend.issue_session(profile.id, ttl).await?;
    println!("{}", session.token);
    Ok(())
}
