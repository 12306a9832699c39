use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Id;

/// An option on which members can spend tokens within one election.
/// Immutable after creation; its lifetime is bounded by its election.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub id: Id,
    pub election_id: Id,
    pub title: String,
    pub proposed_by: Id,
    pub created_at: DateTime<Utc>,
}

impl Proposal {
    pub fn new(election_id: Id, title: String, proposed_by: Id, now: DateTime<Utc>) -> Self {
        Self {
            id: Id::new(),
            election_id,
            title,
            proposed_by,
            created_at: now,
        }
    }
}
