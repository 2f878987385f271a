//! Plain string rendering for the browser pages. Every value that came from a
//! user goes through [`escape`] before it is spliced into markup.

use std::fmt::Write;

use axum::http::StatusCode;

use crate::error::FieldErrors;
use crate::middleware::Identity;

use super::session::Flash;

/// Characters with meaning inside HTML text and quoted attributes.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn layout(title: &str, identity: &Identity, flash: &[Flash], body: &str) -> String {
    let nav = match identity.actor() {
        Some(actor) => format!(
            r#"<a href="/ad/create/">New ad</a> <a href="/?mine=1">My ads</a> <a href="/my-proposals/">Proposals</a>
<form method="post" action="/logout/" class="inline"><button type="submit">Log out ({})</button></form>"#,
            escape(&actor.username)
        ),
        None => r#"<a href="/login/">Log in</a> <a href="/register/">Register</a>"#.to_string(),
    };

    let mut notices = String::new();
    for item in flash {
        let _ = writeln!(
            notices,
            r#"<p class="{}">{}</p>"#,
            item.level.css_class(),
            escape(&item.text)
        );
    }

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} | Barter</title>
</head>
<body>
<header><a href="/"><strong>Barter</strong></a> {nav}</header>
{notices}<main>
<h1>{title}</h1>
{body}
</main>
</body>
</html>
"#,
        title = escape(title),
    )
}

pub fn error_page(status: StatusCode, message: &str) -> String {
    let title = status.canonical_reason().unwrap_or("Error");
    layout(
        &format!("{} {}", status.as_u16(), title),
        &Identity::Anonymous,
        &[],
        &format!(r#"<p>{}</p><p><a href="/">Back to the listing</a></p>"#, escape(message)),
    )
}

pub fn field_errors(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .iter()
        .map(|msg| format!(r#"<span class="error">{}</span>"#, escape(msg)))
        .collect()
}

pub fn text_input(name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<p><label for="{name}">{label}</label> <input type="text" id="{name}" name="{name}" value="{value}">{errs}</p>"#,
        value = escape(value),
        errs = field_errors(errors, name),
    )
}

pub fn password_input(name: &str, label: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<p><label for="{name}">{label}</label> <input type="password" id="{name}" name="{name}">{errs}</p>"#,
        errs = field_errors(errors, name),
    )
}

pub fn textarea(name: &str, label: &str, value: &str, errors: &FieldErrors) -> String {
    format!(
        r#"<p><label for="{name}">{label}</label> <textarea id="{name}" name="{name}">{value}</textarea>{errs}</p>"#,
        value = escape(value),
        errs = field_errors(errors, name),
    )
}

/// A `<select>` over `(value, label)` pairs with `selected` preselected.
pub fn select(
    name: &str,
    label: &str,
    options: &[(String, String)],
    selected: &str,
    errors: &FieldErrors,
) -> String {
    let mut opts = String::new();
    for (value, text) in options {
        let mark = if value == selected { " selected" } else { "" };
        let _ = write!(
            opts,
            r#"<option value="{}"{}>{}</option>"#,
            escape(value),
            mark,
            escape(text)
        );
    }
    format!(
        r#"<p><label for="{name}">{label}</label> <select id="{name}" name="{name}">{opts}</select>{errs}</p>"#,
        errs = field_errors(errors, name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::html::session::Level;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#x27;y&#x27;&quot;)&lt;/script&gt;"
        );
        assert_eq!(escape("Рубашка"), "Рубашка");
    }

    #[test]
    fn layout_shows_flash_and_user() {
        let identity = Identity::User(crate::middleware::Actor {
            id: 1,
            username: "batman".to_string(),
        });
        let flash = [Flash {
            level: Level::Error,
            text: "You cannot propose an exchange to your own ad.".to_string(),
        }];
        let page = layout("Ad", &identity, &flash, "<p>body</p>");
        assert!(page.contains("flash-error"));
        assert!(page.contains("Log out (batman)"));
        assert!(page.contains("<p>body</p>"));
    }

    #[test]
    fn inputs_carry_errors() {
        let errors = FieldErrors::single("title", "This field may not be blank.");
        let html = text_input("title", "Title", "", &errors);
        assert!(html.contains(r#"class="error""#));
        assert!(text_input("category", "Category", "Книги", &errors).contains("Книги"));
    }

    #[test]
    fn select_marks_current_value() {
        let opts = vec![
            ("new".to_string(), "New".to_string()),
            ("used".to_string(), "Used".to_string()),
        ];
        let html = select("condition", "Condition", &opts, "used", &FieldErrors::default());
        assert!(html.contains(r#"<option value="used" selected>"#));
        assert!(!html.contains(r#"<option value="new" selected>"#));
    }
}
