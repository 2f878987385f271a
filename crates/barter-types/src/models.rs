use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
#[error("\"{value}\" is not a valid {kind}")]
pub struct InvalidChoice {
    pub kind: &'static str,
    pub value: String,
}

/// Physical state of the item offered in an ad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    New,
    Used,
}

impl Condition {
    pub const ALL: [Condition; 2] = [Condition::New, Condition::Used];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Used => "used",
        }
    }

    /// Human-readable label for forms and listings.
    pub fn label(self) -> &'static str {
        match self {
            Self::New => "New",
            Self::Used => "Used",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Condition {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(Self::New),
            "used" => Ok(Self::Used),
            other => Err(InvalidChoice {
                kind: "condition",
                value: other.to_string(),
            }),
        }
    }
}

/// Lifecycle state of an exchange proposal.
///
/// Only `Pending -> Accepted` and `Pending -> Declined` are meaningful, but the
/// stored value is overwritten on every accept/decline call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProposalStatus {
    #[default]
    Pending,
    Accepted,
    Declined,
}

impl ProposalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Accepted => "Accepted",
            Self::Declined => "Declined",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProposalStatus {
    type Err = InvalidChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "declined" => Ok(Self::Declined),
            other => Err(InvalidChoice {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ad {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
    pub category: String,
    pub condition: Condition,
    pub created_at: DateTime<Utc>,
    pub user: User,
}

/// Proposal as exposed by the API: the sender ad is embedded, the receiver ad
/// is referenced by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeProposal {
    pub id: i64,
    pub ad_sender: Ad,
    pub ad_receiver: i64,
    pub comment: String,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_parses_known_values_only() {
        assert_eq!("new".parse::<Condition>().unwrap(), Condition::New);
        assert_eq!("used".parse::<Condition>().unwrap(), Condition::Used);
        assert!("broken".parse::<Condition>().is_err());
        assert!("New".parse::<Condition>().is_err());
    }

    #[test]
    fn status_defaults_to_pending() {
        assert_eq!(ProposalStatus::default(), ProposalStatus::Pending);
        assert_eq!(ProposalStatus::default().as_str(), "pending");
    }

    #[test]
    fn status_rejects_misspelled_pending() {
        let err = "pendidng".parse::<ProposalStatus>().unwrap_err();
        assert_eq!(err.to_string(), "\"pendidng\" is not a valid status");
    }

    #[test]
    fn enums_serialize_lowercase() {
        assert_eq!(serde_json::to_string(&Condition::Used).unwrap(), "\"used\"");
        assert_eq!(
            serde_json::to_string(&ProposalStatus::Declined).unwrap(),
            "\"declined\""
        );
    }
}
