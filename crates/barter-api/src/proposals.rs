use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::{OriginalUri, Query, State, rejection::{JsonRejection, QueryRejection}},
    http::{Method, StatusCode},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;

use barter_db::ProposalFilter;
use barter_db::models::AdRow;
use barter_types::api::{Page, ProposalWrite, StatusResponse};
use barter_types::models::{ExchangeProposal, ProposalStatus};

use crate::ads::{non_empty, search_terms};
use crate::error::{ApiError, FieldErrors, REQUIRED};
use crate::extract::RecordId;
use crate::middleware::{Actor, Identity};
use crate::pagination::PageRequest;
use crate::permissions::{Access, receiver_owner, sender_or_read_only};
use crate::state::{AppState, with_db};
use crate::{validate, views};

pub const FOREIGN_SENDER: &str = "You can only propose exchanges from your own ads.";

#[derive(Debug, Default, Deserialize)]
pub struct ProposalListQuery {
    pub status: Option<String>,
    pub ad_sender: Option<String>,
    pub ad_receiver: Option<String>,
    pub search: Option<String>,
    pub page: Option<String>,
}

impl ProposalListQuery {
    fn filter(&self) -> Result<ProposalFilter, ApiError> {
        let mut errors = FieldErrors::default();

        let status = non_empty(&self.status).and_then(|raw| {
            raw.parse::<ProposalStatus>()
                .map_err(|_| errors.add("status", invalid_choice(raw)))
                .ok()
        });
        let ad_sender = id_param(&mut errors, "ad_sender", &self.ad_sender);
        let ad_receiver = id_param(&mut errors, "ad_receiver", &self.ad_receiver);

        if !errors.is_empty() {
            return Err(errors.into());
        }

        Ok(ProposalFilter {
            status,
            ad_sender,
            ad_receiver,
            terms: search_terms(self.search.as_deref()),
            ..Default::default()
        })
    }
}

fn id_param(errors: &mut FieldErrors, field: &str, value: &Option<String>) -> Option<i64> {
    let raw = non_empty(value)?;
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, invalid_choice(raw));
            None
        }
    }
}

fn invalid_choice(raw: &str) -> String {
    format!("Select a valid choice. {} is not one of the available choices.", raw)
}

/// GET /api/proposals/
pub async fn list(
    State(state): State<AppState>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<ProposalListQuery>, QueryRejection>,
) -> Result<Json<Page<ExchangeProposal>>, ApiError> {
    let Query(query) = query?;
    let filter = query.filter()?;
    let page = PageRequest::parse(query.page.as_deref(), state.settings.page_size)?;
    paginate(&state, &uri, page, filter).await
}

/// GET /api/proposals/my/: proposals on either side of the requester's ads.
pub async fn my_proposals(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    OriginalUri(uri): OriginalUri,
    query: Result<Query<ProposalListQuery>, QueryRejection>,
) -> Result<Json<Page<ExchangeProposal>>, ApiError> {
    let actor = identity.require()?;
    let Query(query) = query?;
    let page = PageRequest::parse(query.page.as_deref(), state.settings.page_size)?;

    let filter = ProposalFilter {
        involving_user: Some(actor.id),
        ..Default::default()
    };
    paginate(&state, &uri, page, filter).await
}

async fn paginate(
    state: &AppState,
    uri: &axum::http::Uri,
    page: PageRequest,
    filter: ProposalFilter,
) -> Result<Json<Page<ExchangeProposal>>, ApiError> {
    let counted = filter.clone();
    let count = with_db(state, move |db| db.count_proposals(&counted)).await?;
    page.check(count)?;

    let slice = page.slice();
    let rows = with_db(state, move |db| db.list_proposals(&filter, Some(slice))).await?;
    Ok(Json(page.into_page(uri, count, rows.iter().map(views::proposal).collect())))
}

/// GET /api/proposals/{id}/
pub async fn retrieve(
    State(state): State<AppState>,
    RecordId(id): RecordId,
) -> Result<Json<ExchangeProposal>, ApiError> {
    let row = with_db(&state, move |db| db.get_proposal(id))
        .await?
        .ok_or_else(ApiError::not_found)?;
    Ok(Json(views::proposal(&row)))
}

/// The validated, resolved contents of a proposal write.
struct Resolved {
    sender: AdRow,
    receiver: AdRow,
    comment: String,
}

/// Resolve ad references and check the comment. With `base`, absent fields
/// keep their current values.
async fn resolve(
    state: &AppState,
    req: ProposalWrite,
    base: Option<(i64, i64, &str)>,
) -> Result<Resolved, ApiError> {
    let mut errors = FieldErrors::default();

    let sender_id = req.ad_sender_id.or(base.map(|b| b.0));
    let receiver_id = req.ad_receiver.or(base.map(|b| b.1));
    let comment = validate::comment(&mut errors, req.comment, base.map(|b| b.2));

    let (sender, receiver) = with_db(state, move |db| {
        let sender = sender_id.map(|id| db.get_ad(id)).transpose()?.flatten();
        let receiver = receiver_id.map(|id| db.get_ad(id)).transpose()?.flatten();
        Ok((sender, receiver))
    })
    .await?;

    check_ref(&mut errors, "ad_sender_id", sender_id, sender.is_some());
    check_ref(&mut errors, "ad_receiver", receiver_id, receiver.is_some());

    match (sender, receiver, comment) {
        (Some(sender), Some(receiver), Some(comment)) if errors.is_empty() => Ok(Resolved {
            sender,
            receiver,
            comment,
        }),
        _ => Err(errors.into()),
    }
}

fn check_ref(errors: &mut FieldErrors, field: &str, id: Option<i64>, exists: bool) {
    match id {
        None => errors.add(field, REQUIRED),
        Some(id) if !exists => {
            errors.add(field, format!("Invalid pk \"{}\" - object does not exist.", id))
        }
        Some(_) => {}
    }
}

fn require_own_sender(actor: &Actor, sender: &AdRow) -> Result<(), ApiError> {
    if sender.user_id != actor.id {
        return Err(ApiError::Forbidden(FOREIGN_SENDER.to_string()));
    }
    Ok(())
}

/// POST /api/proposals/: only from an ad the requester owns; always starts pending.
pub async fn create(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<ProposalWrite>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let actor = identity.require()?;
    let Json(req) = payload?;

    let resolved = resolve(&state, req, None).await?;
    require_own_sender(actor, &resolved.sender)?;

    let (sender_id, receiver_id) = (resolved.sender.id, resolved.receiver.id);
    let row = with_db(&state, move |db| {
        let id = db.create_proposal(sender_id, receiver_id, &resolved.comment)?;
        db.get_proposal(id)?
            .ok_or_else(|| anyhow!("proposal {} missing after insert", id))
    })
    .await?;

    info!(
        "User {} proposed ad {} for ad {} (proposal {})",
        actor.username, sender_id, receiver_id, row.id
    );
    Ok((StatusCode::CREATED, Json(views::proposal(&row))))
}

/// PUT /api/proposals/{id}/
pub async fn update(
    state: State<AppState>,
    identity: Extension<Identity>,
    method: Method,
    id: RecordId,
    payload: Result<Json<ProposalWrite>, JsonRejection>,
) -> Result<Json<ExchangeProposal>, ApiError> {
    write(state, identity, method, id, payload, false).await
}

/// PATCH /api/proposals/{id}/
pub async fn partial_update(
    state: State<AppState>,
    identity: Extension<Identity>,
    method: Method,
    id: RecordId,
    payload: Result<Json<ProposalWrite>, JsonRejection>,
) -> Result<Json<ExchangeProposal>, ApiError> {
    write(state, identity, method, id, payload, true).await
}

async fn write(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    RecordId(id): RecordId,
    payload: Result<Json<ProposalWrite>, JsonRejection>,
    partial: bool,
) -> Result<Json<ExchangeProposal>, ApiError> {
    let actor = identity.require()?;
    let current = with_db(&state, move |db| db.get_proposal(id))
        .await?
        .ok_or_else(ApiError::not_found)?;
    sender_or_read_only(Access::of(&method), Some(actor.id), current.sender.user_id).or_forbid()?;

    let Json(req) = payload?;
    let base = partial.then_some((current.sender.id, current.ad_receiver_id, current.comment.as_str()));
    let resolved = resolve(&state, req, base).await?;
    require_own_sender(actor, &resolved.sender)?;

    let (sender_id, receiver_id) = (resolved.sender.id, resolved.receiver.id);
    let row = with_db(&state, move |db| {
        db.update_proposal(id, sender_id, receiver_id, &resolved.comment)?;
        db.get_proposal(id)?
            .ok_or_else(|| anyhow!("proposal {} missing after update", id))
    })
    .await?;

    Ok(Json(views::proposal(&row)))
}

/// DELETE /api/proposals/{id}/
pub async fn destroy(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    RecordId(id): RecordId,
) -> Result<StatusCode, ApiError> {
    let actor = identity.require()?;
    let current = with_db(&state, move |db| db.get_proposal(id))
        .await?
        .ok_or_else(ApiError::not_found)?;
    sender_or_read_only(Access::of(&method), Some(actor.id), current.sender.user_id).or_forbid()?;

    with_db(&state, move |db| db.delete_proposal(id)).await?;
    info!("User {} withdrew proposal {}", actor.username, id);
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/proposals/{id}/accept/
pub async fn accept(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    RecordId(id): RecordId,
) -> Result<Json<StatusResponse>, ApiError> {
    transition(&state, &identity, id, ProposalStatus::Accepted).await
}

/// POST /api/proposals/{id}/decline/
pub async fn decline(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    RecordId(id): RecordId,
) -> Result<Json<StatusResponse>, ApiError> {
    transition(&state, &identity, id, ProposalStatus::Declined).await
}

async fn transition(
    state: &AppState,
    identity: &Identity,
    id: i64,
    status: ProposalStatus,
) -> Result<Json<StatusResponse>, ApiError> {
    let actor = identity.require()?;
    let status = set_status(state, actor, id, status).await?;
    Ok(Json(StatusResponse { status }))
}

/// Move a proposal to `status` on behalf of the receiver ad's owner. The write
/// is unconditional; repeated or conflicting calls simply overwrite each other.
pub async fn set_status(
    state: &AppState,
    actor: &Actor,
    id: i64,
    status: ProposalStatus,
) -> Result<ProposalStatus, ApiError> {
    let current = with_db(state, move |db| db.get_proposal(id))
        .await?
        .ok_or_else(ApiError::not_found)?;

    let detail = match status {
        ProposalStatus::Accepted => "You cannot accept this proposal.",
        _ => "You cannot decline this proposal.",
    };
    receiver_owner(actor.id, current.receiver_owner_id).or_forbid_with(detail)?;

    with_db(state, move |db| db.set_proposal_status(id, status)).await?;
    info!("User {} set proposal {} to {}", actor.username, id, status);
    Ok(status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_validates_each_filter() {
        let query = ProposalListQuery {
            status: Some("pendidng".to_string()),
            ad_sender: Some("abc".to_string()),
            ad_receiver: Some("4".to_string()),
            ..Default::default()
        };
        let Err(ApiError::Validation(errors)) = query.filter() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("status").len(), 1);
        assert_eq!(errors.get("ad_sender").len(), 1);
        assert!(errors.get("ad_receiver").is_empty());
    }

    #[test]
    fn list_query_builds_filter() {
        let query = ProposalListQuery {
            status: Some("accepted".to_string()),
            ad_receiver: Some("4".to_string()),
            search: Some("стул".to_string()),
            ..Default::default()
        };
        let filter = query.filter().unwrap();
        assert_eq!(filter.status, Some(ProposalStatus::Accepted));
        assert_eq!(filter.ad_receiver, Some(4));
        assert_eq!(filter.terms, vec!["стул".to_string()]);
        assert_eq!(filter.involving_user, None);
    }
}
