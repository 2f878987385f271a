//! Row to wire-type mapping for the JSON API.

use barter_db::models::{AdRow, ProposalRow, UserRow};
use barter_types::models::{Ad, ExchangeProposal, User};

pub fn user(row: &UserRow) -> User {
    User {
        id: row.id,
        username: row.username.clone(),
    }
}

pub fn ad(row: &AdRow) -> Ad {
    Ad {
        id: row.id,
        title: row.title.clone(),
        description: row.description.clone(),
        image_url: row.image_url.clone(),
        category: row.category.clone(),
        condition: row.condition,
        created_at: row.created_at,
        user: User {
            id: row.user_id,
            username: row.username.clone(),
        },
    }
}

pub fn proposal(row: &ProposalRow) -> ExchangeProposal {
    ExchangeProposal {
        id: row.id,
        ad_sender: ad(&row.sender),
        ad_receiver: row.ad_receiver_id,
        comment: row.comment.clone(),
        status: row.status,
        created_at: row.created_at,
    }
}
