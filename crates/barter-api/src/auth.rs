use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::json;
use tracing::info;

use barter_types::api::{
    AccessToken, Claims, RegisterRequest, TokenObtainRequest, TokenPair, TokenRefreshRequest,
    TokenType, TokenVerifyRequest,
};
use barter_types::models::User;

use crate::error::{ApiError, FieldErrors};
use crate::middleware::{Identity, decode_token};
use crate::state::{AppState, Settings, with_db};
use crate::validate;

/// POST /auth/users/: create an account.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;

    let mut errors = FieldErrors::default();
    if let Err(msg) = validate::username(&req.username) {
        errors.add("username", msg);
    }
    if let Err(msg) = validate::password(&req.password) {
        errors.add("password", msg);
    }
    if !errors.is_empty() {
        return Err(errors.into());
    }

    let user = create_account(&state, req.username, &req.password).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Insert a user whose username and password already passed validation.
/// Shared by the API and the HTML registration form.
pub async fn create_account(
    state: &AppState,
    username: String,
    password: &str,
) -> Result<User, ApiError> {
    let password_hash = hash_password(password)?;
    let name = username.clone();
    let Some(id) = with_db(state, move |db| db.create_user(&name, &password_hash)).await? else {
        return Err(FieldErrors::single("username", "A user with that username already exists.").into());
    };

    info!("Registered user {} ({})", username, id);
    Ok(User { id, username })
}

/// GET /auth/users/me/
pub async fn me(Extension(identity): Extension<Identity>) -> Result<Json<User>, ApiError> {
    let actor = identity.require()?;
    Ok(Json(User {
        id: actor.id,
        username: actor.username.clone(),
    }))
}

/// POST /auth/jwt/create/: exchange credentials for an access/refresh pair.
pub async fn create_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenObtainRequest>, JsonRejection>,
) -> Result<Json<TokenPair>, ApiError> {
    let Json(req) = payload?;

    let user = authenticate(&state, req.username, &req.password)
        .await?
        .ok_or_else(|| {
            ApiError::Unauthorized("No active account found with the given credentials".to_string())
        })?;

    let settings = &state.settings;
    Ok(Json(TokenPair {
        access: issue_token(settings, user.id, &user.username, TokenType::Access)?,
        refresh: issue_token(settings, user.id, &user.username, TokenType::Refresh)?,
    }))
}

/// POST /auth/jwt/refresh/: trade a refresh token for a fresh access token.
pub async fn refresh_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRefreshRequest>, JsonRejection>,
) -> Result<Json<AccessToken>, ApiError> {
    let Json(req) = payload?;
    let claims = decode_token(&state.settings.jwt_secret, &req.refresh, Some(TokenType::Refresh))?;

    let user = with_db(&state, move |db| db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".to_string()))?;

    Ok(Json(AccessToken {
        access: issue_token(&state.settings, user.id, &user.username, TokenType::Access)?,
    }))
}

/// POST /auth/jwt/verify/: 200 for any well-signed, unexpired token.
pub async fn verify_token(
    State(state): State<AppState>,
    payload: Result<Json<TokenVerifyRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    decode_token(&state.settings.jwt_secret, &req.token, None)?;
    Ok(Json(json!({})))
}

/// Check a username/password pair. `Ok(None)` means the credentials are wrong.
pub async fn authenticate(
    state: &AppState,
    username: String,
    password: &str,
) -> Result<Option<User>, ApiError> {
    let Some(user) = with_db(state, move |db| db.get_user_by_username(&username)).await? else {
        return Ok(None);
    };

    if !verify_password(password, &user.password)? {
        return Ok(None);
    }

    Ok(Some(User {
        id: user.id,
        username: user.username,
    }))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| anyhow::anyhow!("stored password hash is corrupt: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn issue_token(
    settings: &Settings,
    user_id: i64,
    username: &str,
    token_type: TokenType,
) -> anyhow::Result<String> {
    let ttl = match token_type {
        TokenType::Access => settings.access_ttl,
        TokenType::Refresh => settings.refresh_ttl,
    };

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (chrono::Utc::now() + ttl).timestamp() as usize,
        token_type,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(settings.jwt_secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_verifies() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("battery staple", &hash).unwrap());
    }

    #[test]
    fn token_type_is_enforced() {
        let settings = Settings::new("test-secret");
        let refresh = issue_token(&settings, 1, "batman", TokenType::Refresh).unwrap();

        assert!(decode_token("test-secret", &refresh, Some(TokenType::Access)).is_err());
        let claims = decode_token("test-secret", &refresh, Some(TokenType::Refresh)).unwrap();
        assert_eq!(claims.sub, 1);
        assert_eq!(claims.username, "batman");
        assert!(decode_token("other-secret", &refresh, None).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut settings = Settings::new("test-secret");
        settings.access_ttl = chrono::Duration::minutes(-10);
        let token = issue_token(&settings, 1, "batman", TokenType::Access).unwrap();
        assert!(decode_token("test-secret", &token, None).is_err());
    }
}
