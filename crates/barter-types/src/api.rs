use serde::{Deserialize, Deserializer, Serialize};

use crate::models::ProposalStatus;

// -- JWT Claims --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// JWT claims for both access and refresh tokens; `token_type` tells them apart.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
    pub token_type: TokenType,
}

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenObtainRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRefreshRequest {
    pub refresh: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessToken {
    pub access: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenVerifyRequest {
    pub token: String,
}

// -- Ads --

/// Writable ad fields. Every field is optional so that the handler can report
/// missing ones per field; `user` and `created_at` are not accepted at all.
#[derive(Debug, Default, Deserialize)]
pub struct AdWrite {
    pub title: Option<String>,
    pub description: Option<String>,
    /// `None` when absent, `Some(None)` when explicitly null.
    #[serde(default, deserialize_with = "present")]
    pub image_url: Option<Option<String>>,
    pub category: Option<String>,
    pub condition: Option<String>,
}

// -- Proposals --

#[derive(Debug, Default, Deserialize)]
pub struct ProposalWrite {
    pub ad_sender_id: Option<i64>,
    #[serde(alias = "ad_receiver_id")]
    pub ad_receiver: Option<i64>,
    pub comment: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: ProposalStatus,
}

// -- Pagination --

#[derive(Debug, Serialize, Deserialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
    /// Set only when a listing wants to explain an empty result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_write_distinguishes_null_from_absent_image() {
        let absent: AdWrite = serde_json::from_str(r#"{"title": "Lamp"}"#).unwrap();
        assert_eq!(absent.image_url, None);

        let null: AdWrite = serde_json::from_str(r#"{"image_url": null}"#).unwrap();
        assert_eq!(null.image_url, Some(None));
    }

    #[test]
    fn ad_write_ignores_owner_field() {
        let req: AdWrite =
            serde_json::from_str(r#"{"title": "Lamp", "user": 42, "created_at": "x"}"#).unwrap();
        assert_eq!(req.title.as_deref(), Some("Lamp"));
    }

    #[test]
    fn proposal_write_accepts_receiver_alias() {
        let req: ProposalWrite =
            serde_json::from_str(r#"{"ad_sender_id": 1, "ad_receiver_id": 2, "comment": "hi"}"#)
                .unwrap();
        assert_eq!(req.ad_receiver, Some(2));
    }

    #[test]
    fn page_omits_message_unless_set() {
        let page: Page<u8> = Page {
            count: 0,
            next: None,
            previous: None,
            results: vec![],
            message: None,
        };
        let json = serde_json::to_value(&page).unwrap();
        assert!(json.get("message").is_none());
    }
}
