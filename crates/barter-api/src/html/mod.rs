//! Server-rendered pages mirroring the JSON API for browsers, authenticated by
//! a session cookie instead of a bearer token.

mod account;
mod ads;
mod proposals;
pub mod render;
pub mod session;

use axum::{
    Router,
    extract::{FromRequestParts, Path, rejection::FormRejection},
    http::{StatusCode, Uri, request::Parts},
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use tracing::error;
use url::form_urlencoded;

use crate::error::ApiError;
use crate::middleware::Actor;
use crate::state::AppState;

pub use session::{Flash, Level, SESSION_COOKIE, Visitor};

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(ads::list))
        .route("/ad/create/", get(ads::create_form).post(ads::create))
        .route("/ad/{id}/", get(ads::detail))
        .route("/ad/{id}/edit/", get(ads::edit_form).post(ads::edit))
        .route("/ad/{id}/delete/", get(ads::delete_confirm).post(ads::delete))
        .route("/ad/{id}/propose/", get(proposals::form).post(proposals::create))
        .route("/my-proposals/", get(proposals::mine))
        .route("/proposals/{id}/accept/", post(proposals::accept))
        .route("/proposals/{id}/decline/", post(proposals::decline))
        .route("/login/", get(account::login_form).post(account::login))
        .route("/logout/", get(account::logout).post(account::logout))
        .route("/register/", get(account::register_form).post(account::register))
        .route_layer(middleware::from_fn_with_state(state, session::resolve_session))
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    /// Carries the path to come back to after logging in.
    #[error("login required for {0}")]
    LoginRequired(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("forbidden")]
    Forbidden,

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NotFound(_) => Self::NotFound,
            ApiError::Forbidden(_) => Self::Forbidden,
            ApiError::Internal(e) => Self::Internal(e),
            other => Self::BadRequest(other.to_string()),
        }
    }
}

impl From<FormRejection> for PageError {
    fn from(rejection: FormRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::LoginRequired(next) => return Redirect::to(&login_url(&next)).into_response(),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                "You do not have permission to do that.".to_string(),
            ),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                "The page you asked for does not exist.".to_string(),
            ),
            Self::Internal(err) => {
                error!("Internal error while rendering page: {:#}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong on our side.".to_string(),
                )
            }
        };
        (status, Html(render::error_page(status, &message))).into_response()
    }
}

pub fn login_url(next: &str) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair("next", next)
        .finish();
    format!("/login/?{}", query)
}

/// The logged-in user, or a redirect to the login page that returns here.
pub fn require_login<'a>(visitor: &'a Visitor, uri: &Uri) -> Result<&'a Actor, PageError> {
    visitor.identity.actor().ok_or_else(|| {
        let next = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());
        PageError::LoginRequired(next)
    })
}

/// Wrap `body` in the site layout, consuming any queued flash messages.
pub(crate) async fn render_page(
    state: &AppState,
    visitor: &Visitor,
    title: &str,
    body: &str,
) -> Result<Response, PageError> {
    let flash = session::take_flash(state, visitor).await?;
    Ok(Html(render::layout(title, &visitor.identity, &flash, body)).into_response())
}

/// Integer `{id}` path segment; anything else is a 404 page.
#[derive(Debug, Clone, Copy)]
pub struct PageId(pub i64);

impl<S> FromRequestParts<S> for PageId
where
    S: Send + Sync,
{
    type Rejection = PageError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<i64>::from_request_parts(parts, state)
            .await
            .map_err(|_| PageError::NotFound)?;
        Ok(Self(id))
    }
}
