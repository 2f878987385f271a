use std::fmt;
use std::sync::Arc;

use anyhow::anyhow;
use barter_db::Database;
use chrono::Duration;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub settings: Settings,
}

impl AppStateInner {
    pub fn new(db: Database, settings: Settings) -> AppState {
        Arc::new(Self { db, settings })
    }
}

#[derive(Clone)]
pub struct Settings {
    pub jwt_secret: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
    pub session_ttl: Duration,
    pub page_size: u32,
}

impl Settings {
    pub fn new(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_ttl: Duration::minutes(60),
            refresh_ttl: Duration::days(1),
            session_ttl: Duration::days(14),
            page_size: 10,
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("jwt_secret", &"[redacted]")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .field("session_ttl", &self.session_ttl)
            .field("page_size", &self.page_size)
            .finish()
    }
}

/// Runs a blocking database call off the async runtime.
pub async fn with_db<F, T>(state: &AppState, f: F) -> anyhow::Result<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| anyhow!("spawn_blocking join error: {}", e))?
}
