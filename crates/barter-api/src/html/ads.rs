use axum::{
    Extension, Form,
    extract::{OriginalUri, Query, State, rejection::FormRejection},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::info;

use barter_db::models::{AdFields, AdRow};
use barter_db::{AdFilter, AdOrder};
use barter_types::api::AdWrite;
use barter_types::models::Condition;

use crate::ads::non_empty;
use crate::error::FieldErrors;
use crate::middleware::Actor;
use crate::permissions::{Access, owner_or_read_only};
use crate::state::{AppState, with_db};
use crate::validate;

use super::render::{escape, select, text_input, textarea};
use super::session::{Level, Visitor, push_flash};
use super::{PageError, PageId, render_page, require_login};

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub q: Option<String>,
    pub mine: Option<String>,
}

/// GET /
pub async fn list(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Query(query): Query<ListQuery>,
) -> Result<Response, PageError> {
    let mine = query.mine.as_deref() == Some("1");
    let filter = AdFilter {
        terms: non_empty(&query.q).map(|q| vec![q.to_string()]).unwrap_or_default(),
        owner_id: if mine { visitor.identity.user_id() } else { None },
        order: AdOrder::Newest,
        ..Default::default()
    };
    let ads = with_db(&state, move |db| db.list_ads(&filter, None)).await?;

    let mut body = format!(
        r#"<form method="get" action="/"><input type="search" name="q" value="{}">{}<button type="submit">Search</button></form>"#,
        escape(query.q.as_deref().unwrap_or_default()),
        if mine { r#"<input type="hidden" name="mine" value="1">"# } else { "" },
    );
    if ads.is_empty() {
        body.push_str("<p>No ads yet.</p>");
    } else {
        body.push_str("<ul class=\"ads\">");
        for ad in &ads {
            body.push_str(&ad_summary(ad));
        }
        body.push_str("</ul>");
    }

    let title = if mine { "My ads" } else { "Ads" };
    render_page(&state, &visitor, title, &body).await
}

fn ad_summary(ad: &AdRow) -> String {
    format!(
        r#"<li><a href="/ad/{}/">{}</a> <small>{} · {} · {}</small></li>"#,
        ad.id,
        escape(&ad.title),
        escape(&ad.category),
        ad.condition.label(),
        escape(&ad.username),
    )
}

/// GET /ad/{id}/
pub async fn detail(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    PageId(id): PageId,
) -> Result<Response, PageError> {
    let ad = load_ad(&state, id).await?;

    let mut body = String::new();
    if let Some(url) = &ad.image_url {
        body.push_str(&format!(r#"<p><img src="{}" alt="{}"></p>"#, escape(url), escape(&ad.title)));
    }
    body.push_str(&format!(
        "<p>{}</p><dl><dt>Category</dt><dd>{}</dd><dt>Condition</dt><dd>{}</dd><dt>Posted by</dt><dd>{}</dd><dt>Posted</dt><dd>{}</dd></dl>",
        escape(&ad.description),
        escape(&ad.category),
        ad.condition.label(),
        escape(&ad.username),
        ad.created_at.format("%Y-%m-%d %H:%M"),
    ));

    if visitor.identity.user_id() == Some(ad.user_id) {
        body.push_str(&format!(
            r#"<p><a href="/ad/{id}/edit/">Edit</a> <a href="/ad/{id}/delete/">Delete</a></p>"#
        ));
    } else {
        body.push_str(&format!(r#"<p><a href="/ad/{id}/propose/">Offer an exchange</a></p>"#));
    }

    render_page(&state, &visitor, &ad.title, &body).await
}

/// Ad fields as submitted by the browser; everything arrives as text.
#[derive(Debug, Default, Deserialize)]
pub struct AdForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
}

impl AdForm {
    fn from_row(ad: &AdRow) -> Self {
        Self {
            title: Some(ad.title.clone()),
            description: Some(ad.description.clone()),
            image_url: ad.image_url.clone(),
            category: Some(ad.category.clone()),
            condition: Some(ad.condition.as_str().to_string()),
        }
    }

    fn to_write(&self) -> AdWrite {
        AdWrite {
            title: self.title.clone(),
            description: self.description.clone(),
            // A missing or blank URL input clears the image.
            image_url: Some(self.image_url.clone()),
            category: self.category.clone(),
            condition: self.condition.clone(),
        }
    }

    fn validate(&self) -> Result<AdFields, FieldErrors> {
        validate::ad_fields(self.to_write(), None)
    }

    fn render(&self, action: &str, submit: &str, errors: &FieldErrors) -> String {
        let conditions: Vec<(String, String)> = Condition::ALL
            .iter()
            .map(|c| (c.as_str().to_string(), c.label().to_string()))
            .collect();
        let value = |v: &Option<String>| v.clone().unwrap_or_default();

        format!(
            r#"<form method="post" action="{action}">{}{}{}{}{}<button type="submit">{submit}</button></form>"#,
            text_input("title", "Title", &value(&self.title), errors),
            textarea("description", "Description", &value(&self.description), errors),
            text_input("image_url", "Image URL", &value(&self.image_url), errors),
            text_input("category", "Category", &value(&self.category), errors),
            select("condition", "Condition", &conditions, &value(&self.condition), errors),
        )
    }
}

/// GET /ad/create/
pub async fn create_form(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
) -> Result<Response, PageError> {
    require_login(&visitor, &uri)?;
    let form = AdForm {
        condition: Some(Condition::New.as_str().to_string()),
        ..Default::default()
    };
    let body = form.render("/ad/create/", "Publish", &FieldErrors::default());
    render_page(&state, &visitor, "New ad", &body).await
}

/// POST /ad/create/
pub async fn create(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    form: Result<Form<AdForm>, FormRejection>,
) -> Result<Response, PageError> {
    let actor = require_login(&visitor, &uri)?.clone();
    let Form(form) = form?;

    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => {
            let body = form.render("/ad/create/", "Publish", &errors);
            return render_page(&state, &visitor, "New ad", &body).await;
        }
    };

    let owner = actor.id;
    let id = with_db(&state, move |db| db.create_ad(owner, &fields)).await?;
    info!("User {} created ad {}", actor.username, id);

    push_flash(&state, &visitor, Level::Success, "Ad published.").await?;
    Ok(Redirect::to("/").into_response())
}

/// GET /ad/{id}/edit/
pub async fn edit_form(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    PageId(id): PageId,
) -> Result<Response, PageError> {
    let actor = require_login(&visitor, &uri)?;
    let ad = owned_ad(&state, actor, id).await?;

    let body = AdForm::from_row(&ad).render(&format!("/ad/{}/edit/", id), "Save", &FieldErrors::default());
    render_page(&state, &visitor, "Edit ad", &body).await
}

/// POST /ad/{id}/edit/
pub async fn edit(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    PageId(id): PageId,
    form: Result<Form<AdForm>, FormRejection>,
) -> Result<Response, PageError> {
    let actor = require_login(&visitor, &uri)?;
    owned_ad(&state, actor, id).await?;
    let Form(form) = form?;

    let fields = match form.validate() {
        Ok(fields) => fields,
        Err(errors) => {
            let body = form.render(&format!("/ad/{}/edit/", id), "Save", &errors);
            return render_page(&state, &visitor, "Edit ad", &body).await;
        }
    };

    with_db(&state, move |db| db.update_ad(id, &fields)).await?;
    push_flash(&state, &visitor, Level::Success, "Ad updated.").await?;
    Ok(Redirect::to("/").into_response())
}

/// GET /ad/{id}/delete/
pub async fn delete_confirm(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    PageId(id): PageId,
) -> Result<Response, PageError> {
    let actor = require_login(&visitor, &uri)?;
    let ad = owned_ad(&state, actor, id).await?;

    let body = format!(
        r#"<p>Delete "{}"? Proposals involving this ad will be removed too.</p>
<form method="post" action="/ad/{}/delete/"><button type="submit">Delete</button> <a href="/ad/{}/">Cancel</a></form>"#,
        escape(&ad.title),
        id,
        id
    );
    render_page(&state, &visitor, "Delete ad", &body).await
}

/// POST /ad/{id}/delete/
pub async fn delete(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    OriginalUri(uri): OriginalUri,
    PageId(id): PageId,
) -> Result<Response, PageError> {
    let actor = require_login(&visitor, &uri)?;
    owned_ad(&state, actor, id).await?;

    with_db(&state, move |db| db.delete_ad(id)).await?;
    info!("User {} deleted ad {}", actor.username, id);
    push_flash(&state, &visitor, Level::Success, "Ad deleted.").await?;
    Ok(Redirect::to("/").into_response())
}

pub(super) async fn load_ad(state: &AppState, id: i64) -> Result<AdRow, PageError> {
    with_db(state, move |db| db.get_ad(id))
        .await?
        .ok_or(PageError::NotFound)
}

/// The ad, provided `actor` owns it.
async fn owned_ad(state: &AppState, actor: &Actor, id: i64) -> Result<AdRow, PageError> {
    let ad = load_ad(state, id).await?;
    if !owner_or_read_only(Access::Write, Some(actor.id), ad.user_id).is_allowed() {
        return Err(PageError::Forbidden);
    }
    Ok(ad)
}

/// Every ad `user_id` owns, newest first.
pub(super) async fn ads_of(state: &AppState, user_id: i64) -> Result<Vec<AdRow>, PageError> {
    let filter = AdFilter {
        owner_id: Some(user_id),
        order: AdOrder::Newest,
        ..Default::default()
    };
    Ok(with_db(state, move |db| db.list_ads(&filter, None)).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_image_url_clears_the_image() {
        let form = AdForm {
            title: Some("Рубашка".to_string()),
            description: Some("Чёрная".to_string()),
            image_url: Some(String::new()),
            category: Some("Одежда".to_string()),
            condition: Some("used".to_string()),
        };
        let fields = form.validate().unwrap();
        assert_eq!(fields.image_url, None);
        assert_eq!(fields.condition, Condition::Used);
    }

    #[test]
    fn empty_form_reports_every_required_field() {
        let errors = AdForm::default().validate().unwrap_err();
        for field in ["title", "description", "category", "condition"] {
            assert!(!errors.get(field).is_empty(), "{} should be required", field);
        }
    }

    #[test]
    fn rendered_form_keeps_submitted_values() {
        let form = AdForm {
            title: Some("<Lamp>".to_string()),
            condition: Some("used".to_string()),
            ..Default::default()
        };
        let html = form.render("/ad/create/", "Publish", &FieldErrors::default());
        assert!(html.contains("&lt;Lamp&gt;"));
        assert!(html.contains(r#"<option value="used" selected>"#));
    }
}
