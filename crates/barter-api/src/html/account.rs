use axum::{
    Extension, Form,
    extract::{Query, State, rejection::FormRejection},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use tracing::info;

use crate::auth::{authenticate, create_account};
use crate::error::{ApiError, FieldErrors};
use crate::state::AppState;
use crate::validate;

use super::render::{escape, field_errors, password_input, text_input};
use super::session::{Visitor, log_in, log_out};
use super::{PageError, render_page};

const BAD_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

/// Only local paths are followed after login; anything else lands on `/`.
fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => path,
        _ => "/",
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub next: Option<String>,
}

fn login_body(username: &str, next: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<form method="post" action="/login/">{}{}{}<input type="hidden" name="next" value="{}"><button type="submit">Log in</button></form>
<p>No account? <a href="/register/">Register</a>.</p>"#,
        field_errors(errors, "__all__"),
        text_input("username", "Username", username, errors),
        password_input("password", "Password", errors),
        escape(next),
    )
}

/// GET /login/
pub async fn login_form(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    Query(query): Query<NextQuery>,
) -> Result<Response, PageError> {
    let next = safe_next(query.next.as_deref());
    let body = login_body("", next, &FieldErrors::default());
    render_page(&state, &visitor, "Log in", &body).await
}

/// POST /login/
pub async fn login(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    jar: CookieJar,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<Response, PageError> {
    let Form(form) = form?;
    let next = safe_next(form.next.as_deref()).to_string();

    let Some(user) = authenticate(&state, form.username.clone(), &form.password).await? else {
        let errors = FieldErrors::single("__all__", BAD_LOGIN);
        let body = login_body(&form.username, &next, &errors);
        return render_page(&state, &visitor, "Log in", &body).await;
    };

    let jar = log_out(&state, jar, &visitor).await?;
    let jar = log_in(&state, jar, user.id).await?;
    info!("User {} logged in", user.username);
    Ok((jar, Redirect::to(&next)).into_response())
}

/// GET|POST /logout/
pub async fn logout(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    jar: CookieJar,
) -> Result<Response, PageError> {
    let jar = log_out(&state, jar, &visitor).await?;
    if let Some(actor) = visitor.identity.actor() {
        info!("User {} logged out", actor.username);
    }
    Ok((jar, Redirect::to("/")).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password1: String,
    #[serde(default)]
    pub password2: String,
}

impl RegisterForm {
    fn validate(&self) -> FieldErrors {
        let mut errors = FieldErrors::default();
        if let Err(msg) = validate::username(&self.username) {
            errors.add("username", msg);
        }
        if self.password1.is_empty() {
            errors.add("password1", crate::error::REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", crate::error::REQUIRED);
        } else if self.password1 != self.password2 {
            errors.add("password2", "The two password fields didn't match.");
        } else if let Err(msg) = validate::password(&self.password2) {
            errors.add("password2", msg);
        }
        errors
    }

    fn render(&self, errors: &FieldErrors) -> String {
        format!(
            r#"<form method="post" action="/register/">{}{}{}<button type="submit">Register</button></form>"#,
            text_input("username", "Username", &self.username, errors),
            password_input("password1", "Password", errors),
            password_input("password2", "Password confirmation", errors),
        )
    }
}

/// GET /register/
pub async fn register_form(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
) -> Result<Response, PageError> {
    let body = RegisterForm::default().render(&FieldErrors::default());
    render_page(&state, &visitor, "Register", &body).await
}

/// POST /register/: creates the account and logs it in.
pub async fn register(
    State(state): State<AppState>,
    Extension(visitor): Extension<Visitor>,
    jar: CookieJar,
    form: Result<Form<RegisterForm>, FormRejection>,
) -> Result<Response, PageError> {
    let Form(form) = form?;

    let errors = form.validate();
    if !errors.is_empty() {
        return render_page(&state, &visitor, "Register", &form.render(&errors)).await;
    }

    let user = match create_account(&state, form.username.clone(), &form.password1).await {
        Ok(user) => user,
        Err(ApiError::Validation(errors)) => {
            return render_page(&state, &visitor, "Register", &form.render(&errors)).await;
        }
        Err(other) => return Err(other.into()),
    };

    let jar = log_out(&state, jar, &visitor).await?;
    let jar = log_in(&state, jar, user.id).await?;
    Ok((jar, Redirect::to("/")).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_must_stay_on_site() {
        assert_eq!(safe_next(Some("/ad/3/propose/")), "/ad/3/propose/");
        assert_eq!(safe_next(Some("https://evil.example/")), "/");
        assert_eq!(safe_next(Some("//evil.example/")), "/");
        assert_eq!(safe_next(Some("/\\evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }

    #[test]
    fn registration_checks_confirmation() {
        let form = RegisterForm {
            username: "genji".to_string(),
            password1: "shimada-42".to_string(),
            password2: "shimada-43".to_string(),
        };
        let errors = form.validate();
        assert_eq!(errors.get("password2"), ["The two password fields didn't match."]);
        assert!(errors.get("username").is_empty());
    }

    #[test]
    fn registration_applies_password_rules() {
        let form = RegisterForm {
            username: "genji".to_string(),
            password1: "12345678".to_string(),
            password2: "12345678".to_string(),
        };
        assert_eq!(form.validate().get("password2"), ["This password is entirely numeric."]);

        let ok = RegisterForm {
            username: "genji".to_string(),
            password1: "shimada-42".to_string(),
            password2: "shimada-42".to_string(),
        };
        assert!(ok.validate().is_empty());
    }
}
