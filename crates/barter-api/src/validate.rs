//! Field rules shared by the JSON API and the HTML forms.

use barter_db::models::AdFields;
use barter_types::api::AdWrite;
use barter_types::models::Condition;

use crate::error::{FieldErrors, REQUIRED};

pub const SHORT_TEXT_MAX: usize = 50;
pub const URL_MAX: usize = 200;
pub const USERNAME_MAX: usize = 150;
pub const PASSWORD_MIN: usize = 8;

/// Validate an ad payload. With `base`, absent fields keep their current value
/// (partial update); without it every required field must be present.
pub fn ad_fields(req: AdWrite, base: Option<&AdFields>) -> Result<AdFields, FieldErrors> {
    let mut errors = FieldErrors::default();

    let title = short_text(&mut errors, "title", req.title, base.map(|b| b.title.as_str()));
    let description = short_text(
        &mut errors,
        "description",
        req.description,
        base.map(|b| b.description.as_str()),
    );
    let category = short_text(&mut errors, "category", req.category, base.map(|b| b.category.as_str()));

    let image_url = match req.image_url {
        None => base.and_then(|b| b.image_url.clone()),
        Some(value) => match optional_url(value) {
            Ok(url) => url,
            Err(msg) => {
                errors.add("image_url", msg);
                None
            }
        },
    };

    let condition = match req.condition {
        None => {
            if base.is_none() {
                errors.add("condition", REQUIRED);
            }
            base.map(|b| b.condition)
        }
        Some(raw) => match raw.parse::<Condition>() {
            Ok(c) => Some(c),
            Err(_) => {
                errors.add("condition", format!("\"{}\" is not a valid choice.", raw));
                None
            }
        },
    };

    match (title, description, category, condition) {
        (Some(title), Some(description), Some(category), Some(condition)) if errors.is_empty() => {
            Ok(AdFields {
                title,
                description,
                image_url,
                category,
                condition,
            })
        }
        _ => Err(errors),
    }
}

/// Required free text with no length cap.
pub fn comment(
    errors: &mut FieldErrors,
    value: Option<String>,
    base: Option<&str>,
) -> Option<String> {
    text(errors, "comment", value, base, None)
}

pub fn username(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err(REQUIRED.to_string());
    }
    if value.chars().count() > USERNAME_MAX {
        return Err(too_long(USERNAME_MAX));
    }
    if !value
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err("Enter a valid username. This value may contain only letters, numbers, \
                    and @/./+/-/_ characters."
            .to_string());
    }
    Ok(())
}

pub fn password(value: &str) -> Result<(), String> {
    if value.chars().count() < PASSWORD_MIN {
        return Err(format!(
            "This password is too short. It must contain at least {} characters.",
            PASSWORD_MIN
        ));
    }
    if value.chars().all(|c| c.is_ascii_digit()) {
        return Err("This password is entirely numeric.".to_string());
    }
    Ok(())
}

fn short_text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    base: Option<&str>,
) -> Option<String> {
    text(errors, field, value, base, Some(SHORT_TEXT_MAX))
}

fn text(
    errors: &mut FieldErrors,
    field: &str,
    value: Option<String>,
    base: Option<&str>,
    max: Option<usize>,
) -> Option<String> {
    let Some(value) = value else {
        if base.is_none() {
            errors.add(field, REQUIRED);
        }
        return base.map(str::to_string);
    };

    let value = value.trim();
    if value.is_empty() {
        errors.add(field, "This field may not be blank.");
        return None;
    }
    if let Some(max) = max {
        if value.chars().count() > max {
            errors.add(field, too_long(max));
            return None;
        }
    }
    Some(value.to_string())
}

/// Blank or null clears the image; anything else must be an absolute http(s) URL.
fn optional_url(value: Option<String>) -> Result<Option<String>, String> {
    let Some(value) = value else {
        return Ok(None);
    };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    if value.chars().count() > URL_MAX {
        return Err(too_long(URL_MAX));
    }

    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some() => {
            Ok(Some(value.to_string()))
        }
        _ => Err("Enter a valid URL.".to_string()),
    }
}

fn too_long(max: usize) -> String {
    format!("Ensure this field has no more than {} characters.", max)
}
