use axum::{
    Json,
    extract::{OriginalUri, Query, State, rejection::QueryRejection},
};
use serde::Deserialize;

use barter_types::api::Page;
use barter_types::models::User;

use crate::error::ApiError;
use crate::extract::RecordId;
use crate::pagination::PageRequest;
use crate::state::{AppState, with_db};
use crate::views;

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub page: Option<String>,
}

/// GET /api/users/
pub async fn list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<UserListQuery>, QueryRejection>,
) -> Result<Json<Page<User>>, ApiError> {
    let Query(query) = query?;
    let page = PageRequest::parse(query.page.as_deref(), state.settings.page_size)?;

    let count = with_db(&state, |db| db.count_users()).await?;
    page.check(count)?;

    let slice = page.slice();
    let rows = with_db(&state, move |db| db.list_users(Some(slice))).await?;
    Ok(Json(page.into_page(&uri, count, rows.iter().map(views::user).collect())))
}

/// GET /api/users/{id}/
pub async fn retrieve(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<User>, ApiError> {
    let row = with_db(&state, move |db| db.get_user_by_id(id))
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(views::user(&row)))
}
