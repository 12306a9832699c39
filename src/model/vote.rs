use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Id;

/// One membership's token allocation to one proposal within one election.
///
/// At most one vote exists per (membership, election) pair; re-casting
/// updates `proposal_id`, `tokens_used` and `updated_at` in place.
/// Mutable until the election closes, read-only history thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Id,
    pub election_id: Id,
    pub membership_id: Id,
    pub proposal_id: Id,
    pub tokens_used: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(
        election_id: Id,
        membership_id: Id,
        proposal_id: Id,
        tokens_used: u32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Id::new(),
            election_id,
            membership_id,
            proposal_id,
            tokens_used,
            created_at: now,
            updated_at: now,
        }
    }

    /// Re-cast this vote onto a (possibly different) proposal.
    pub fn recast(&mut self, proposal_id: Id, tokens_used: u32, now: DateTime<Utc>) {
        self.proposal_id = proposal_id;
        self.tokens_used = tokens_used;
        self.updated_at = now;
    }
}
