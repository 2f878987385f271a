use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};

use barter_types::api::{Claims, TokenType};

use crate::error::ApiError;
use crate::state::{AppState, with_db};

/// An authenticated user as seen by a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: i64,
    pub username: String,
}

/// Who is making the request. Resolved once per request and handed to every
/// handler explicitly through a request extension.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Identity {
    #[default]
    Anonymous,
    User(Actor),
}

impl Identity {
    pub fn actor(&self) -> Option<&Actor> {
        match self {
            Self::User(actor) => Some(actor),
            Self::Anonymous => None,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.actor().map(|a| a.id)
    }

    /// The acting user, or a 401 for anonymous requests.
    pub fn require(&self) -> Result<&Actor, ApiError> {
        self.actor().ok_or_else(ApiError::unauthenticated)
    }
}

/// Resolve the bearer JWT (if any) into an [`Identity`].
///
/// No `Authorization: Bearer` header means anonymous; a bearer header with a
/// bad token, or one naming a user that no longer exists, is rejected.
pub async fn resolve_identity(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let identity = match bearer_token(req.headers()) {
        None => Identity::Anonymous,
        Some(token) => {
            let claims = decode_token(&state.settings.jwt_secret, token, Some(TokenType::Access))?;
            let user = with_db(&state, move |db| db.get_user_by_id(claims.sub))
                .await?
                .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;
            Identity::User(Actor {
                id: user.id,
                username: user.username,
            })
        }
    };

    req.extensions_mut().insert(identity);
    Ok(next.run(req).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Validate signature and expiry, and optionally the token type.
pub fn decode_token(
    secret: &str,
    token: &str,
    expected: Option<TokenType>,
) -> Result<Claims, ApiError> {
    let invalid = || ApiError::Unauthorized("Token is invalid or expired".to_string());

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|_| invalid())?;

    match expected {
        Some(kind) if data.claims.token_type != kind => Err(invalid()),
        _ => Ok(data.claims),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic Zm9vOmJhcg=="));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));
    }

    #[test]
    fn anonymous_identity_requires_login() {
        let identity = Identity::Anonymous;
        assert!(identity.require().is_err());
        assert_eq!(identity.user_id(), None);

        let identity = Identity::User(Actor {
            id: 7,
            username: "genji".to_string(),
        });
        assert_eq!(identity.require().unwrap().id, 7);
    }
}
