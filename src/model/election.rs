use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::Id;

/// States in the Election lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectionState {
    /// Created but not yet started.
    Upcoming,
    /// In progress; votes may be cast and changed.
    Open,
    /// Resolved. Terminal; votes are read-only history.
    Closed,
}

/// Who pays for their bids when the election resolves.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    /// Every voter pays their own bid.
    AllPay,
    /// Only voters on the winning proposal pay.
    WinnersPay,
}

/// How the price-per-token multiplier is derived.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceMode {
    /// Winners pay exactly what they bid (multiplier 1).
    FirstPrice,
    /// Winners pay scaled by second-highest / highest proposal total.
    SecondPrice,
}

/// How the winning proposal is selected.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMode {
    /// The proposal with the largest token total wins.
    MostVotes,
    /// Weighted lottery: each token spent is one ticket.
    Lottery,
}

/// A token-weighted election within one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Election {
    pub id: Id,
    pub group_id: Id,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub status: ElectionState,
    pub payment_mode: PaymentMode,
    pub price_mode: PriceMode,
    pub resolution_mode: ResolutionMode,
    /// Set exactly once, when the election closes with at least one vote.
    pub winning_proposal_id: Option<Id>,
    pub created_at: DateTime<Utc>,
}

impl Election {
    /// Create a new upcoming election. Fails if the window is empty or inverted.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        group_id: Id,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        payment_mode: PaymentMode,
        price_mode: PriceMode,
        resolution_mode: ResolutionMode,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if start_date >= end_date {
            return Err(Error::configuration(format!(
                "Election start {start_date} is not before end {end_date}"
            )));
        }
        Ok(Self {
            id: Id::new(),
            group_id,
            start_date,
            end_date,
            status: ElectionState::Upcoming,
            payment_mode,
            price_mode,
            resolution_mode,
            winning_proposal_id: None,
            created_at: now,
        })
    }
}
