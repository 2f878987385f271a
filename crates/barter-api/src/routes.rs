use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::state::AppState;
use crate::{ads, auth, html, proposals, users};

/// The whole application: JSON API, auth endpoints and the browser pages.
pub fn router(state: AppState) -> Router {
    // Token endpoints carry their own credentials and never look at a bearer header.
    let public = Router::new()
        .route("/auth/users/", post(auth::register))
        .route("/auth/jwt/create/", post(auth::create_token))
        .route("/auth/jwt/refresh/", post(auth::refresh_token))
        .route("/auth/jwt/verify/", post(auth::verify_token));

    let api = Router::new()
        .route("/auth/users/me/", get(auth::me))
        .route("/api/ads/", get(ads::list).post(ads::create))
        .route(
            "/api/ads/{id}/",
            get(ads::retrieve)
                .put(ads::update)
                .patch(ads::partial_update)
                .delete(ads::destroy),
        )
        .route("/api/users/", get(users::list))
        .route("/api/users/{id}/", get(users::retrieve))
        .route("/api/proposals/", get(proposals::list).post(proposals::create))
        .route("/api/proposals/my/", get(proposals::my_proposals))
        .route(
            "/api/proposals/{id}/",
            get(proposals::retrieve)
                .put(proposals::update)
                .patch(proposals::partial_update)
                .delete(proposals::destroy),
        )
        .route("/api/proposals/{id}/accept/", post(proposals::accept))
        .route("/api/proposals/{id}/decline/", post(proposals::decline))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::resolve_identity,
        ));

    Router::new()
        .merge(public)
        .merge(api)
        .merge(html::routes(state.clone()))
        .with_state(state)
}
