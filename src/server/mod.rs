//! Axum HTTP server: JSON API under `/api/` plus a static welcome page.
//!
//! ## URL layout
//!
//! ```text
//! POST   /api/register
//! POST   /api/login
//! POST   /api/logout
//! GET    /api/user                       PATCH /api/user
//! POST   /api/carbon/analyze
//! GET    /api/carbon/projects
//! GET    /api/carbon/project/{id}        DELETE /api/carbon/project/{id}
//! POST   /api/carbon/calculate           (public)
//! POST   /api/carbon/website             (public)
//! GET    /api/gamification/badges
//! GET    /api/gamification/badges/all
//! POST   /api/gamification/check-badges
//! GET    /api/gamification/leaderboard
//! GET    /api/gamification/stats
//! GET    /api/chatbot/messages           POST /api/chatbot/messages
//! GET    /api/chatbot/tip                (public)
//! GET    /api/health
//! GET    /favicon.ico                    → 204
//! GET    /                               → welcome page
//! ```

mod api;
mod extract;
mod ui;

pub use extract::CurrentUser;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    http::{HeaderValue, Method, StatusCode, header},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use crate::auth::SessionStore;
use crate::config::Config;
use crate::error::AppError;
use crate::llm::LlmProvider;
use crate::storage::SharedStore;

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler via [`axum::extract::State`].
///
/// Cheap to clone — all fields are reference-counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: SharedStore,
    pub sessions: Arc<SessionStore>,
    /// `None` when `llm.default = "none"`.
    pub llm: Option<LlmProvider>,
    /// Client for fetching analysed pages.
    pub http: reqwest::Client,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: SharedStore,
        sessions: Arc<SessionStore>,
        llm: Option<LlmProvider>,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.carbon.fetch_timeout_seconds))
            .user_agent(concat!("greenweb/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Server(format!("failed to build http client: {e}")))?;
        Ok(Self { config, store, sessions, llm, http })
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    let router = Router::new()
        // auth
        .route("/api/register",                   post(api::auth::register))
        .route("/api/login",                      post(api::auth::login))
        .route("/api/logout",                     post(api::auth::logout))
        .route("/api/user",                       get(api::auth::current_user).patch(api::auth::update_user))
        // carbon
        .route("/api/carbon/analyze",             post(api::carbon::analyze))
        .route("/api/carbon/projects",            get(api::carbon::projects))
        .route("/api/carbon/project/{id}",        get(api::carbon::project_detail).delete(api::carbon::delete_project))
        .route("/api/carbon/calculate",           post(api::carbon::calculate))
        .route("/api/carbon/website",             post(api::carbon::website))
        // gamification
        .route("/api/gamification/badges",        get(api::gamification::badges))
        .route("/api/gamification/badges/all",    get(api::gamification::all_badges))
        .route("/api/gamification/check-badges",  post(api::gamification::check_badges))
        .route("/api/gamification/leaderboard",   get(api::gamification::leaderboard))
        .route("/api/gamification/stats",         get(api::gamification::stats))
        // chatbot
        .route("/api/chatbot/messages",           get(api::chatbot::messages).post(api::chatbot::send_message))
        .route("/api/chatbot/tip",                get(api::chatbot::tip))
        // misc
        .route("/api/health",                     get(api::health))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/",            get(ui::root))
        .with_state(state);

    match cors {
        Some(cors) => router.layer(cors),
        None => router,
    }
}

/// Credentialed CORS for the configured origins; `None` when there are none.
fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    if origins.is_empty() {
        return None;
    }
    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(Duration::from_secs(60 * 60)),
    )
}

// ── Server loop ───────────────────────────────────────────────────────────────

/// Bind `bind` and serve until `shutdown` is cancelled.
pub async fn serve(state: AppState, bind: &str, shutdown: CancellationToken) -> Result<(), AppError> {
    let router = build_router(state);

    let listener = TcpListener::bind(bind)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind}: {e}")))?;

    info!(%bind, "http server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("http server error: {e}")))?;

    info!("http server shut down");
    Ok(())
}
