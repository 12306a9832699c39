use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Id, TokenSettings};

/// A member's role within a group.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Member,
}

/// A user's participation record in one group, carrying its token balance.
///
/// The balance is mutated only by the payment applicator (debit) and
/// token regeneration (credit); both maintain `0 <= token_balance <= max_tokens`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    /// Conventionally `{user_id}_{group_id}`, minted by the membership flow.
    pub id: Id,
    pub user_id: Id,
    pub group_id: Id,
    pub role: Role,
    pub token_balance: u32,
    pub last_token_regeneration: DateTime<Utc>,
}

impl Membership {
    /// Create a membership seeded with the group's initial token grant.
    pub fn new(
        user_id: Id,
        group_id: Id,
        role: Role,
        settings: &TokenSettings,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Id::from(format!("{user_id}_{group_id}"));
        Self {
            id,
            user_id,
            group_id,
            role,
            token_balance: settings.initial_tokens.min(settings.max_tokens),
            last_token_regeneration: now,
        }
    }
}
