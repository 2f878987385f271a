use axum::http::Uri;
use url::form_urlencoded;

use barter_db::Slice;
use barter_types::api::Page;

use crate::error::ApiError;

/// Page-number pagination: `?page=N`, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub number: u64,
    pub size: u32,
}

impl PageRequest {
    pub fn parse(raw: Option<&str>, size: u32) -> Result<Self, ApiError> {
        let number = match raw.map(str::trim) {
            None | Some("") => 1,
            Some(s) => s
                .parse::<u64>()
                .ok()
                .filter(|n| *n >= 1)
                .ok_or_else(invalid_page)?,
        };
        Ok(Self {
            number,
            size: size.max(1),
        })
    }

    pub fn slice(&self) -> Slice {
        Slice {
            limit: self.size,
            offset: (self.number - 1).saturating_mul(u64::from(self.size)),
        }
    }

    /// The first page always exists; later pages must start inside the result set.
    pub fn check(&self, count: u64) -> Result<(), ApiError> {
        if self.number > 1 && self.slice().offset >= count {
            return Err(invalid_page());
        }
        Ok(())
    }

    pub fn into_page<T>(self, uri: &Uri, count: u64, results: Vec<T>) -> Page<T> {
        let shown = self.number.saturating_mul(u64::from(self.size));
        let next = (shown < count).then(|| page_link(uri, Some(self.number + 1)));
        let previous = (self.number > 1).then(|| {
            // Page 1 is addressed without a page parameter.
            let target = if self.number == 2 { None } else { Some(self.number - 1) };
            page_link(uri, target)
        });

        Page {
            count,
            next,
            previous,
            results,
            message: None,
        }
    }
}

fn invalid_page() -> ApiError {
    ApiError::NotFound("Invalid page.".to_string())
}

/// The request's own path and query with `page` replaced.
fn page_link(uri: &Uri, page: Option<u64>) -> String {
    let mut query = form_urlencoded::Serializer::new(String::new());
    if let Some(q) = uri.query() {
        for (key, value) in form_urlencoded::parse(q.as_bytes()) {
            if key != "page" {
                query.append_pair(&key, &value);
            }
        }
    }
    if let Some(page) = page {
        query.append_pair("page", &page.to_string());
    }

    let query = query.finish();
    if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    }
}
