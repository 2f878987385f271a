use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{OriginalUri, Query, State, rejection::{JsonRejection, QueryRejection}},
    http::{Method, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use barter_db::AdFilter;
use barter_db::models::AdFields;
use barter_types::api::{AdWrite, Page};
use barter_types::models::{Ad, Condition};

use crate::error::{ApiError, FieldErrors};
use crate::extract::RecordId;
use crate::middleware::Identity;
use crate::pagination::PageRequest;
use crate::permissions::{Access, owner_or_read_only};
use crate::state::{AppState, with_db};
use crate::{validate, views};

pub const NO_RESULTS_MESSAGE: &str = "Nothing matched your query.";

#[derive(Debug, Default, Deserialize)]
pub struct AdListQuery {
    pub category: Option<String>,
    pub condition: Option<String>,
    /// Whitespace-separated terms, all of which must match.
    pub search: Option<String>,
    /// One substring matched as a whole.
    pub q: Option<String>,
    pub mine: Option<String>,
    pub page: Option<String>,
}

impl AdListQuery {
    fn filter(&self, identity: &Identity) -> Result<AdFilter, ApiError> {
        let condition = match non_empty(&self.condition) {
            None => None,
            Some(raw) => Some(raw.parse::<Condition>().map_err(|_| {
                FieldErrors::single(
                    "condition",
                    format!("Select a valid choice. {} is not one of the available choices.", raw),
                )
            })?),
        };

        let mut terms = search_terms(self.search.as_deref());
        if let Some(q) = non_empty(&self.q) {
            terms.push(q.to_string());
        }

        let owner_id = match self.mine.as_deref() {
            Some("1") => identity.user_id(),
            _ => None,
        };

        Ok(AdFilter {
            category: non_empty(&self.category).map(str::to_string),
            condition,
            owner_id,
            terms,
            ..Default::default()
        })
    }
}

/// Split a search parameter into terms on whitespace and commas.
pub fn search_terms(raw: Option<&str>) -> Vec<String> {
    raw.unwrap_or_default()
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// GET /api/ads/
pub async fn list(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<AdListQuery>, QueryRejection>,
) -> Result<Json<Page<Ad>>, ApiError> {
    let Query(query) = query?;
    let filter = query.filter(&identity)?;
    let page = PageRequest::parse(query.page.as_deref(), state.settings.page_size)?;

    let counted = filter.clone();
    let count = with_db(&state, move |db| db.count_ads(&counted)).await?;
    page.check(count)?;

    let slice = page.slice();
    let rows = with_db(&state, move |db| db.list_ads(&filter, Some(slice))).await?;

    let mut body = page.into_page(&uri, count, rows.iter().map(views::ad).collect());
    if body.count == 0 {
        body.message = Some(NO_RESULTS_MESSAGE.to_string());
    }
    Ok(Json(body))
}

/// GET /api/ads/{id}/
pub async fn retrieve(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<Ad>, ApiError> {
    let row = with_db(&state, move |db| db.get_ad(id))
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(views::ad(&row)))
}

/// POST /api/ads/: the requester always becomes the owner.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<AdWrite>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.require()?.clone();
    let Json(req) = payload?;
    let fields = validate::ad_fields(req, None)?;

    let owner = actor.id;
    let row = with_db(&state, move |db| {
        let id = db.create_ad(owner, &fields)?;
        db.get_ad(id)?.ok_or_else(|| anyhow!("ad {} missing after insert", id))
    })
    .await?;

    info!("User {} created ad {}", actor.username, row.id);
    Ok((StatusCode::CREATED, Json(views::ad(&row))))
}

/// PUT /api/ads/{id}/
pub async fn update(
    state: State<AppState>,
    identity: Extension<Identity>,
    method: Method,
    id: RecordId,
    payload: Result<Json<AdWrite>, JsonRejection>,
) -> Result<Json<Ad>, ApiError> {
    write(state, identity, method, id, payload, false).await
}

/// PATCH /api/ads/{id}/
pub async fn partial_update(
    state: State<AppState>,
    identity: Extension<Identity>,
    method: Method,
    id: RecordId,
    payload: Result<Json<AdWrite>, JsonRejection>,
) -> Result<Json<Ad>, ApiError> {
    write(state, identity, method, id, payload, true).await
}

async fn write(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    RecordId(id): RecordId,
    payload: Result<Json<AdWrite>, JsonRejection>,
    partial: bool,
) -> Result<Json<Ad>, ApiError> {
    let actor = identity.require()?;
    let current = with_db(&state, move |db| db.get_ad(id))
        .await?
        .ok_or_else(ApiError::not_found)?;
    owner_or_read_only(Access::of(&method), Some(actor.id), current.user_id).or_forbid()?;

    let Json(req) = payload?;
    let base: Option<AdFields> = partial.then(|| AdFields::from(&current));
    // An absent image_url keeps the stored image, even on PUT.
    let keep_image = req.image_url.is_none();
    let mut fields = validate::ad_fields(req, base.as_ref())?;
    if keep_image {
        fields.image_url = current.image_url.clone();
    }

    let row = with_db(&state, move |db| {
        db.update_ad(id, &fields)?;
        db.get_ad(id)?.ok_or_else(|| anyhow!("ad {} missing after update", id))
    })
    .await?;

    Ok(Json(views::ad(&row)))
}

/// DELETE /api/ads/{id}/: proposals referencing the ad go with it.
pub async fn destroy(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    RecordId(id): RecordId,
) -> Result<StatusCode, ApiError> {
    let actor = identity.require()?;
    let current = with_db(&state, move |db| db.get_ad(id))
        .await?
        .ok_or_else(ApiError::not_found)?;
    owner_or_read_only(Access::of(&method), Some(actor.id), current.user_id).or_forbid()?;

    with_db(&state, move |db| db.delete_ad(id)).await?;
    info!("User {} deleted ad {}", actor.username, id);
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::Actor;

    #[test]
    fn search_splits_on_whitespace_and_commas() {
        assert_eq!(search_terms(Some(" black,  shirt ")), vec!["black", "shirt"]);
        assert!(search_terms(None).is_empty());
    }

    #[test]
    fn mine_needs_a_user() {
        let query = AdListQuery {
            mine: Some("1".to_string()),
            ..Default::default()
        };
        assert_eq!(query.filter(&Identity::Anonymous).unwrap().owner_id, None);

        let user = Identity::User(Actor {
            id: 3,
            username: "genji".to_string(),
        });
        assert_eq!(query.filter(&user).unwrap().owner_id, Some(3));
    }

    #[test]
    fn unknown_condition_is_a_validation_error() {
        let query = AdListQuery {
            condition: Some("mint".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            query.filter(&Identity::Anonymous),
            Err(ApiError::Validation(_))
        ));
    }

    #[test]
    fn q_is_a_single_term() {
        let query = AdListQuery {
            q: Some("black shirt".to_string()),
            ..Default::default()
        };
        assert_eq!(
            query.filter(&Identity::Anonymous).unwrap().terms,
            vec!["black shirt".to_string()]
        );
    }
}
