use axum::{
    Extension, Form,
    extract::{OriginalUri, State, rejection::FormRejection},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use barter_db::ProposalFilter;
use barter_db::models::{AdRow, ProposalRow};
use barter_types::models::ProposalStatus;

use crate::error::FieldErrors;
use crate::middleware::Actor;
use crate::proposals::set_status;
use crate::state::{AppState, with_db};
use crate::validate;

use super::ads::{ads_of, load_ad};
use super::render::{escape, select, textarea};
use super::session::{Level, Visitor, push_flash};
use super::{PageError, PageId, render_page, require_login};

pub const OWN_AD: &str = "You cannot propose an exchange on your own ad.";
pub const SENT: &str = "Proposal sent!";

#[derive(Debug, Default, Deserialize)]
pub struct ProposalForm {
    pub ad_sender_id: Option<String>,
    pub comment: Option<String>,
}

impl ProposalForm {
    /// Check the form against the ads the requester may offer. Returns the
    /// chosen sender ad id and the comment.
    fn validate(&self, offered: &[AdRow]) -> Result<(i64, String), FieldErrors> {
        let mut errors = FieldErrors::default();

        let sender = match self.ad_sender_id.as_deref().map(str::trim) {
            None | Some("") => {
                errors.add("ad_sender_id", crate::error::REQUIRED);
                None
            }
            Some(raw) => {
                let chosen = raw.parse::<i64>().ok().filter(|id| offered.iter().any(|ad| ad.id == *id));
                if chosen.is_none() {
                    errors.add(
                        "ad_sender_id",
                        "Select a valid choice. That choice is not one of the available choices.",
                    );
                }
                chosen
            }
        };
        let comment = validate::comment(&mut errors, self.comment.clone(), None);

        match (sender, comment) {
            (Some(sender), Some(comment)) if errors.is_empty() => Ok((sender, comment)),
            _ => Err(errors),
        }
    }

    fn render(&self, receiver: &AdRow, offered: &[AdRow], errors: &FieldErrors) -> String {
        let choices: Vec<(String, String)> = offered
            .iter()
            .map(|ad| (ad.id.to_string(), ad.title.clone()))
            .collect();

        format!(
            r#"<p>You are offering an exchange for <a href="/ad/{id}/">{title}</a>.</p>
<form method="post" action="/ad/{id}/propose/">{}{}<button type="submit">Send proposal</button></form>"#,
            select(
                "ad_sender_id",
                "Your ad",
                &choices,
                self.ad_sender_id.as_deref().unwrap_or_default(),
                errors
            ),
            textarea("comment", "Comment", self.comment.as_deref().unwrap_or_default(), errors),
            id = receiver.id,
            title = escape(&receiver.title),
        )
    }
}

/// The receiver ad, or a redirect back to it when the requester owns it.
async fn foreign_ad(
    state: &AppState,
    visitor: &Visitor,
    actor: &Actor,
    id: i64,
) -> Result<Result<AdRow, Response>, PageError> {
    let receiver = load_ad(state, id).await?;
    if receiver.user_id == actor.id {
        push_flash(state, visitor, Level::Error, OWN_AD).await?;
        return Ok(Err(Redirect::to(&format!("/ad/{}/", id)).into_response()));
    }
    Ok(Ok(receiver))
}

/// GET /ad/{id}/propose/
pub async fn form(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    PageId(id): PageId,
) -> Result<Response, PageError> {
    let actor = require_login(&visitor, &uri)?;
    let receiver = match foreign_ad(&state, &visitor, actor, id).await? {
        Ok(ad) => ad,
        Err(redirect) => return Ok(redirect),
    };

    let offered = ads_of(&state, actor.id).await?;
    let body = if offered.is_empty() {
        r#"<p>You have no ads to offer yet. <a href="/ad/create/">Publish one</a> first.</p>"#.to_string()
    } else {
        ProposalForm::default().render(&receiver, &offered, &FieldErrors::default())
    };
    render_page(&state, &visitor, "Offer an exchange", &body).await
}

/// POST /ad/{id}/propose/
pub async fn create(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    PageId(id): PageId,
    form: Result<Form<ProposalForm>, FormRejection>,
) -> Result<Response, PageError> {
    let actor = require_login(&visitor, &uri)?;
    let receiver = match foreign_ad(&state, &visitor, actor, id).await? {
        Ok(ad) => ad,
        Err(redirect) => return Ok(redirect),
    };
    let Form(form) = form?;

    let offered = ads_of(&state, actor.id).await?;
    let (sender_id, comment) = match form.validate(&offered) {
        Ok(valid) => valid,
        Err(errors) => {
            let body = form.render(&receiver, &offered, &errors);
            return render_page(&state, &visitor, "Offer an exchange", &body).await;
        }
    };

    let proposal = with_db(&state, move |db| db.create_proposal(sender_id, id, &comment)).await?;
    info!(
        "User {} proposed ad {} for ad {} (proposal {})",
        actor.username, sender_id, id, proposal
    );

    push_flash(&state, &visitor, Level::Success, SENT).await?;
    Ok(Redirect::to(&format!("/ad/{}/", id)).into_response())
}

/// GET /my-proposals/
pub async fn mine(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, PageError> {
    let actor = require_login(&visitor, &uri)?;
    let filter = ProposalFilter {
        involving_user: Some(actor.id),
        newest_first: true,
        ..Default::default()
    };
    let proposals = with_db(&state, move |db| db.list_proposals(&filter, None)).await?;

    let body = if proposals.is_empty() {
        "<p>No proposals yet.</p>".to_string()
    } else {
        let rows: String = proposals.iter().map(|p| proposal_row(p, actor.id)).collect();
        format!(
            "<table><thead><tr><th>Offered</th><th>For</th><th>Comment</th><th>Status</th><th></th></tr></thead><tbody>{}</tbody></table>",
            rows
        )
    };
    render_page(&state, &visitor, "My proposals", &body).await
}

fn proposal_row(p: &ProposalRow, viewer: i64) -> String {
    let actions = if p.receiver_owner_id == viewer && p.status == ProposalStatus::Pending {
        format!(
            r#"<form method="post" action="/proposals/{id}/accept/" class="inline"><button type="submit">Accept</button></form>
<form method="post" action="/proposals/{id}/decline/" class="inline"><button type="submit">Decline</button></form>"#,
            id = p.id
        )
    } else {
        String::new()
    };

    format!(
        r#"<tr><td><a href="/ad/{}/">{}</a> ({})</td><td><a href="/ad/{}/">{}</a> ({})</td><td>{}</td><td>{}</td><td>{}</td></tr>"#,
        p.sender.id,
        escape(&p.sender.title),
        escape(&p.sender.username),
        p.ad_receiver_id,
        escape(&p.receiver_title),
        escape(&p.receiver_owner_username),
        escape(&p.comment),
        p.status.label(),
        actions,
    )
}

/// POST /proposals/{id}/accept/
pub async fn accept(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    PageId(id): PageId,
) -> Result<Response, PageError> {
    respond(&state, &visitor, &uri, id, ProposalStatus::Accepted).await
}

/// POST /proposals/{id}/decline/
pub async fn decline(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    PageId(id): PageId,
) -> Result<Response, PageError> {
    respond(&state, &visitor, &uri, id, ProposalStatus::Declined).await
}

async fn respond(
    state: &AppState,
    visitor: &Visitor,
    uri: &axum::http::Uri,
    id: i64,
    status: ProposalStatus,
) -> Result<Response, PageError> {
    let actor = require_login(visitor, uri)?;
    set_status(state, actor, id, status).await?;
    Ok(Redirect::to("/my-proposals/").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use barter_types::models::Condition;
    use chrono::Utc;

    fn ad(id: i64, user_id: i64, title: &str) -> AdRow {
        AdRow {
            id,
            user_id,
            username: "batman".to_string(),
            title: title.to_string(),
            description: "Чёрная".to_string(),
            image_url: None,
            category: "Одежда".to_string(),
            condition: Condition::Used,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sender_must_be_one_of_the_offered_ads() {
        let offered = [ad(1, 7, "Рубашка")];
        let form = ProposalForm {
            ad_sender_id: Some("2".to_string()),
            comment: Some("Меняю".to_string()),
        };
        let errors = form.validate(&offered).unwrap_err();
        assert_eq!(errors.get("ad_sender_id").len(), 1);

        let form = ProposalForm {
            ad_sender_id: Some("1".to_string()),
            comment: Some("Меняю".to_string()),
        };
        assert_eq!(form.validate(&offered).unwrap(), (1, "Меняю".to_string()));
    }

    #[test]
    fn comment_is_required() {
        let offered = [ad(1, 7, "Рубашка")];
        let form = ProposalForm {
            ad_sender_id: Some("1".to_string()),
            comment: Some("  ".to_string()),
        };
        assert_eq!(form.validate(&offered).unwrap_err().get("comment").len(), 1);
    }

    #[test]
    fn buttons_only_for_pending_received_proposals() {
        let mut row = ProposalRow {
            id: 5,
            sender: ad(1, 7, "Рубашка"),
            ad_receiver_id: 2,
            receiver_owner_id: 8,
            receiver_title: "Книга".to_string(),
            receiver_owner_username: "genji".to_string(),
            comment: "Меняю".to_string(),
            status: ProposalStatus::Pending,
            created_at: Utc::now(),
        };
        assert!(proposal_row(&row, 8).contains("/proposals/5/accept/"));
        assert!(!proposal_row(&row, 7).contains("/proposals/5/accept/"));

        row.status = ProposalStatus::Declined;
        assert!(!proposal_row(&row, 8).contains("/proposals/5/accept/"));
    }
}
