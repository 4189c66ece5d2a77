use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use quill_api::auth::{self, AppState, AppStateInner};
use quill_api::history;
use quill_api::middleware::require_session;
use quill_api::posts;
use quill_auth::cookie::CookieConfig;
use quill_auth::token::TokenSigner;

const DEV_SECRET: &str = "dev-secret-change-me";

struct Config {
    secret: String,
    db_path: String,
    host: String,
    port: u16,
    session_ttl_secs: i64,
    cookie_secure: bool,
}

impl Config {
    fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            secret: std::env::var("QUILL_SECRET").unwrap_or_else(|_| DEV_SECRET.into()),
            db_path: std::env::var("QUILL_DB_PATH").unwrap_or_else(|_| "quill.db".into()),
            host: std::env::var("QUILL_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("QUILL_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()?,
            session_ttl_secs: std::env::var("QUILL_SESSION_TTL_SECS")
                .unwrap_or_else(|_| "3600".into())
                .parse()?,
            cookie_secure: std::env::var("QUILL_COOKIE_SECURE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quill=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;
    if config.secret == DEV_SECRET {
        warn!("QUILL_SECRET not set; sessions are signed with the development secret");
    }

    // Init database
    let db = quill_db::Database::open(&PathBuf::from(&config.db_path))?;

    // Shared state, read-only after startup
    let app_state: AppState = Arc::new(AppStateInner {
        db,
        tokens: TokenSigner::new(config.secret.clone()),
        cookies: CookieConfig {
            name: "session".to_string(),
            secure: config.cookie_secure,
            max_age_secs: config.session_ttl_secs,
        },
        session_ttl_secs: config.session_ttl_secs,
    });

    // Routes
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", get(auth::logout))
        .route("/posts", get(posts::list_posts))
        .route("/posts/{id}", get(posts::get_post))
        .route("/history", get(history::list_history))
        .with_state(app_state.clone());

    let protected_routes = Router::new()
        .route("/create_post", post(posts::create_post))
        .route("/edit_post/{id}", post(posts::edit_post))
        .route("/delete_post/{id}", post(posts::delete_post))
        .route("/history/clear", post(history::clear_history))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_session,
        ))
        .with_state(app_state);

    let app = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Quill server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
