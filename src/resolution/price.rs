use crate::model::{Proposal, Vote};
use crate::resolution::tally_tokens;

/// Computes the price-per-token multiplier applied to winning bids.
pub trait PriceCalculator: Send + Sync {
    fn price(&self, proposals: &[Proposal], votes: &[Vote]) -> f64;
}

/// Voters pay exactly what they bid.
#[derive(Debug, Default)]
pub struct FirstPrice;

impl PriceCalculator for FirstPrice {
    fn price(&self, _proposals: &[Proposal], _votes: &[Vote]) -> f64 {
        1.0
    }
}

/// Voters pay scaled by the runner-up: `second_highest_total / highest_total`
/// over per-proposal token totals, a multiplier in [0, 1].
///
/// Falls back to 1 when fewer than two proposals received any votes, which
/// also guards the division (the highest total is non-zero past that branch).
#[derive(Debug, Default)]
pub struct SecondPrice;

impl PriceCalculator for SecondPrice {
    fn price(&self, proposals: &[Proposal], votes: &[Vote]) -> f64 {
        let mut totals: Vec<u64> = tally_tokens(proposals, votes)
            .into_iter()
            .map(|(_, total)| total)
            .filter(|&total| total > 0)
            .collect();
        if totals.len() < 2 {
            return 1.0;
        }
        totals.sort_unstable_by(|a, b| b.cmp(a));
        totals[1] as f64 / totals[0] as f64
    }
}
