use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::middleware::{Actor, Identity};
use crate::state::{AppState, with_db};

use super::PageError;

pub const SESSION_COOKIE: &str = "sessionid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Success,
    Error,
}

impl Level {
    pub fn css_class(self) -> &'static str {
        match self {
            Self::Success => "flash-success",
            Self::Error => "flash-error",
        }
    }
}

/// One-shot notice shown on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub level: Level,
    pub text: String,
}

/// The browser side of a request: who is logged in, which session row backs
/// the cookie, and the notices queued on it.
#[derive(Debug, Clone, Default)]
pub struct Visitor {
    pub identity: Identity,
    pub session_id: Option<String>,
    pub flash: Vec<Flash>,
}

/// Resolve the session cookie into a [`Visitor`]. Unknown or expired
/// sessions are treated as anonymous rather than rejected.
pub async fn resolve_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response, PageError> {
    let mut visitor = Visitor::default();

    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        let lookup = cookie.value().to_string();
        let found = with_db(&state, move |db| {
            let Some(session) = db.get_session(&lookup)? else {
                return Ok(None);
            };
            Ok(db.get_user_by_id(session.user_id)?.map(|user| (session, user)))
        })
        .await?;

        match found {
            Some((session, user)) => {
                visitor.identity = Identity::User(Actor {
                    id: user.id,
                    username: user.username,
                });
                visitor.flash = session.flash.as_deref().map(decode_flash).unwrap_or_default();
                visitor.session_id = Some(session.id);
            }
            None => debug!("Ignoring stale session cookie"),
        }
    }

    req.extensions_mut().insert(visitor);
    Ok(next.run(req).await)
}

fn decode_flash(raw: &str) -> Vec<Flash> {
    serde_json::from_str(raw).unwrap_or_else(|e| {
        warn!("Dropping unreadable flash messages: {}", e);
        Vec::new()
    })
}

/// Queue a notice for the next page this visitor sees. Anonymous visitors
/// have nowhere to keep it, so it is dropped.
pub async fn push_flash(
    state: &AppState,
    visitor: &Visitor,
    level: Level,
    text: impl Into<String>,
) -> Result<(), PageError> {
    let Some(session_id) = visitor.session_id.clone() else {
        return Ok(());
    };

    let mut queued = visitor.flash.clone();
    queued.push(Flash {
        level,
        text: text.into(),
    });
    let encoded = serde_json::to_string(&queued).map_err(anyhow::Error::from)?;
    with_db(state, move |db| db.set_session_flash(&session_id, Some(&encoded))).await?;
    Ok(())
}

/// Hand out the queued notices and clear them from the session.
pub async fn take_flash(state: &AppState, visitor: &Visitor) -> Result<Vec<Flash>, PageError> {
    if visitor.flash.is_empty() {
        return Ok(Vec::new());
    }
    if let Some(session_id) = visitor.session_id.clone() {
        with_db(state, move |db| db.set_session_flash(&session_id, None)).await?;
    }
    Ok(visitor.flash.clone())
}

/// Open a session for `user_id` and attach its cookie to the jar.
pub async fn log_in(state: &AppState, jar: CookieJar, user_id: i64) -> Result<CookieJar, PageError> {
    let session_id = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + state.settings.session_ttl;

    let stored = session_id.clone();
    with_db(state, move |db| db.create_session(&stored, user_id, expires_at)).await?;

    let cookie = Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax);
    Ok(jar.add(cookie))
}

/// Drop the visitor's session row and clear the cookie.
pub async fn log_out(state: &AppState, jar: CookieJar, visitor: &Visitor) -> Result<CookieJar, PageError> {
    if let Some(session_id) = visitor.session_id.clone() {
        with_db(state, move |db| db.delete_session(&session_id)).await?;
    }
    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flash_round_trips_through_json() {
        let queued = vec![Flash {
            level: Level::Success,
            text: "Proposal sent!".to_string(),
        }];
        let raw = serde_json::to_string(&queued).unwrap();
        assert!(raw.contains("\"success\""));
        assert_eq!(decode_flash(&raw), queued);
    }

    #[test]
    fn garbage_flash_is_dropped() {
        assert!(decode_flash("not json").is_empty());
    }
}
