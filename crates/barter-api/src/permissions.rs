//! Ownership predicates consulted before every mutation.

use axum::http::Method;

use crate::error::{ApiError, PERMISSION_DENIED};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl Access {
    /// GET, HEAD and OPTIONS are reads; every other method writes.
    pub fn of(method: &Method) -> Self {
        if matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS) {
            Self::Read
        } else {
            Self::Write
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny,
}

impl Verdict {
    fn from_bool(allowed: bool) -> Self {
        if allowed { Self::Allow } else { Self::Deny }
    }

    pub fn is_allowed(self) -> bool {
        self == Self::Allow
    }

    pub fn or_forbid(self) -> Result<(), ApiError> {
        self.or_forbid_with(PERMISSION_DENIED)
    }

    pub fn or_forbid_with(self, detail: &str) -> Result<(), ApiError> {
        match self {
            Self::Allow => Ok(()),
            Self::Deny => Err(ApiError::Forbidden(detail.to_string())),
        }
    }
}

/// Reads are open; writes need the actor to own the ad.
pub fn owner_or_read_only(access: Access, actor: Option<i64>, ad_owner: i64) -> Verdict {
    Verdict::from_bool(access == Access::Read || actor == Some(ad_owner))
}

/// Reads are open; writes need the actor to own the proposal's sender ad.
pub fn sender_or_read_only(access: Access, actor: Option<i64>, sender_ad_owner: i64) -> Verdict {
    Verdict::from_bool(access == Access::Read || actor == Some(sender_ad_owner))
}

/// Accept and decline belong to whoever owns the receiving ad.
pub fn receiver_owner(actor: i64, receiver_ad_owner: i64) -> Verdict {
    Verdict::from_bool(actor == receiver_ad_owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_methods_are_reads() {
        assert_eq!(Access::of(&Method::GET), Access::Read);
        assert_eq!(Access::of(&Method::HEAD), Access::Read);
        assert_eq!(Access::of(&Method::OPTIONS), Access::Read);
        assert_eq!(Access::of(&Method::PATCH), Access::Write);
        assert_eq!(Access::of(&Method::DELETE), Access::Write);
    }

    #[test]
    fn owner_predicate() {
        assert!(owner_or_read_only(Access::Read, None, 1).is_allowed());
        assert!(owner_or_read_only(Access::Write, Some(1), 1).is_allowed());
        assert!(!owner_or_read_only(Access::Write, Some(2), 1).is_allowed());
        assert!(!owner_or_read_only(Access::Write, None, 1).is_allowed());
    }

    #[test]
    fn sender_predicate() {
        assert!(sender_or_read_only(Access::Read, Some(9), 1).is_allowed());
        assert!(sender_or_read_only(Access::Write, Some(1), 1).is_allowed());
        assert!(!sender_or_read_only(Access::Write, Some(2), 1).is_allowed());
    }

    #[test]
    fn receiver_predicate() {
        assert!(receiver_owner(2, 2).is_allowed());
        assert!(!receiver_owner(1, 2).is_allowed());
        assert!(matches!(
            receiver_owner(1, 2).or_forbid(),
            Err(ApiError::Forbidden(_))
        ));
    }
}
