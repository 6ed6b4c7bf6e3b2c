//! In-process session store keyed by random cookie tokens.
//!
//! Sessions do not survive a restart. Expired entries are dropped lazily on
//! lookup and eagerly by the sweeper task spawned at startup.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use axum::http::{HeaderMap, header};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::random_token;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "greenweb.sid";

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: i64,
    expires_at: Instant,
}

pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: Mutex::new(HashMap::new()) }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Session>> {
        // A panic while holding this lock cannot leave the map half-written.
        self.sessions.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Start a session for `user_id` and return its token.
    pub fn create(&self, user_id: i64) -> String {
        let token = random_token();
        let session = Session { user_id, expires_at: Instant::now() + self.ttl };
        self.lock().insert(token.clone(), session);
        debug!(user_id, "session created");
        token
    }

    /// The user behind `token`, if the session exists and has not expired.
    pub fn resolve(&self, token: &str) -> Option<i64> {
        let mut sessions = self.lock();
        let session = *sessions.get(token)?;
        if session.expires_at <= Instant::now() {
            sessions.remove(token);
            return None;
        }
        Some(session.user_id)
    }

    /// End a session. Returns `false` if it did not exist.
    pub fn destroy(&self, token: &str) -> bool {
        self.lock().remove(token).is_some()
    }

    /// Remove every expired session; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Periodically purge expired sessions until `shutdown` is cancelled.
pub fn spawn_sweeper(
    store: Arc<SessionStore>,
    every: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = store.sweep();
                    if removed > 0 {
                        info!(removed, remaining = store.len(), "expired sessions swept");
                    }
                }
            }
        }
        debug!("session sweeper stopped");
    })
}

// ── Cookies ───────────────────────────────────────────────────────────────────

/// `Set-Cookie` value starting a session.
pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ttl.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that makes the browser drop the session cookie.
pub fn clear_cookie(secure: bool) -> String {
    session_cookie("", Duration::ZERO, secure)
}

/// Extract the session token from the request's `Cookie` headers.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}
