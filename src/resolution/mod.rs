//! Auction resolution: picking a winning proposal and applying payment
//! when an election closes.
//!
//! The three election configuration axes are independent: a resolution
//! strategy (how the winner is chosen), a price calculator (what
//! multiplier winners pay) and a payment applicator (who pays). A
//! [`ResolutionStrategy`] composes the other two; [`strategy_for`] builds
//! the composition straight from the election's fields, so no
//! (payment x price) combination is ever special-cased.

mod payment;
mod price;

pub use payment::{AllPay, PaymentApplicator, WinnersPay};
pub use price::{FirstPrice, PriceCalculator, SecondPrice};

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::RngCore;

use crate::error::{Error, Result};
use crate::model::{
    Election, Id, Membership, PaymentMode, PriceMode, Proposal, ResolutionMode, TokenSettings,
    Vote,
};

/// The outcome of resolving one election.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// `None` iff no tokens backed any proposal.
    pub winner: Option<Id>,
    /// Membership records whose balances changed, ready to be staged in
    /// the closing transaction. Empty when payment was skipped.
    pub updated_memberships: Vec<Membership>,
}

/// Selects a winning proposal and orchestrates price calculation and
/// payment application. Called at most once per election close.
pub trait ResolutionStrategy: Send + Sync {
    /// Resolve the election over a consistent snapshot of its data.
    ///
    /// `settings` may be absent only for groups with no token
    /// configuration; that is an error as soon as payment must run.
    /// When the winner is `None`, payment is skipped entirely.
    fn resolve(
        &self,
        proposals: &[Proposal],
        votes: &[Vote],
        memberships: &HashMap<Id, Membership>,
        settings: Option<&TokenSettings>,
        now: DateTime<Utc>,
        rng: &mut dyn RngCore,
    ) -> Result<Resolution>;
}

/// Compose the configured strategy for an election.
pub fn strategy_for(election: &Election) -> Box<dyn ResolutionStrategy> {
    let payment: Box<dyn PaymentApplicator> = match election.payment_mode {
        PaymentMode::AllPay => Box::new(AllPay),
        PaymentMode::WinnersPay => Box::new(WinnersPay),
    };
    match election.resolution_mode {
        ResolutionMode::MostVotes => {
            let price: Box<dyn PriceCalculator> = match election.price_mode {
                PriceMode::FirstPrice => Box::new(FirstPrice),
                PriceMode::SecondPrice => Box::new(SecondPrice),
            };
            Box::new(MostVotes { price, payment })
        }
        ResolutionMode::Lottery => Box::new(Lottery { payment }),
    }
}

/// Total tokens spent per proposal, in proposal order.
/// Proposals nobody voted for appear with a zero total.
pub(crate) fn tally_tokens(proposals: &[Proposal], votes: &[Vote]) -> Vec<(Id, u64)> {
    proposals
        .iter()
        .map(|proposal| {
            let total = votes
                .iter()
                .filter(|vote| vote.proposal_id == proposal.id)
                .map(|vote| vote.tokens_used as u64)
                .sum();
            (proposal.id.clone(), total)
        })
        .collect()
}

/// Every vote must target a proposal that actually exists.
fn check_vote_targets(proposals: &[Proposal], votes: &[Vote]) -> Result<()> {
    let known: HashSet<&Id> = proposals.iter().map(|p| &p.id).collect();
    for vote in votes {
        if !known.contains(&vote.proposal_id) {
            return Err(Error::data_integrity(format!(
                "Vote {} references missing proposal {}",
                vote.id, vote.proposal_id
            )));
        }
    }
    Ok(())
}

fn require_settings(settings: Option<&TokenSettings>) -> Result<&TokenSettings> {
    settings.ok_or_else(|| Error::configuration("Group has no token settings".to_string()))
}

/// The proposal with the largest token total wins.
///
/// Ties go to the first proposal encountered with the maximum total, i.e.
/// the earliest in the given slice. The state machine pre-sorts proposals
/// by creation order, making the tie-break deterministic across re-runs.
pub struct MostVotes {
    pub price: Box<dyn PriceCalculator>,
    pub payment: Box<dyn PaymentApplicator>,
}

impl ResolutionStrategy for MostVotes {
    fn resolve(
        &self,
        proposals: &[Proposal],
        votes: &[Vote],
        memberships: &HashMap<Id, Membership>,
        settings: Option<&TokenSettings>,
        now: DateTime<Utc>,
        _rng: &mut dyn RngCore,
    ) -> Result<Resolution> {
        check_vote_targets(proposals, votes)?;
        if votes.is_empty() {
            debug!("No votes cast; resolving with no winner");
            return Ok(Resolution {
                winner: None,
                updated_memberships: Vec::new(),
            });
        }

        let totals = tally_tokens(proposals, votes);
        // max_by_key would return the *last* maximum; keep the first.
        let (winner, winning_total) = totals
            .iter()
            .max_by(|(_, a), (_, b)| a.cmp(b).then(std::cmp::Ordering::Greater))
            .cloned()
            .ok_or_else(|| Error::data_integrity("Votes exist but no proposals do".to_string()))?;

        let price = self.price.price(proposals, votes);
        info!("Most-votes winner is {winner} with {winning_total} tokens at price {price}");

        let settings = require_settings(settings)?;
        let updated_memberships =
            self.payment
                .apply(votes, memberships, settings, price, &winner, now)?;
        Ok(Resolution {
            winner: Some(winner),
            updated_memberships,
        })
    }
}

/// Weighted lottery: every token spent on a proposal is one ticket in a
/// virtual pool bearing that proposal's id, and one ticket is drawn
/// uniformly at random. A proposal's win probability is therefore
/// `tokens_on_proposal / total_tokens_cast`.
///
/// Second-price semantics are meaningless for a lottery, so the price
/// passed to the payment applicator is fixed at 1.
pub struct Lottery {
    pub payment: Box<dyn PaymentApplicator>,
}

impl ResolutionStrategy for Lottery {
    fn resolve(
        &self,
        proposals: &[Proposal],
        votes: &[Vote],
        memberships: &HashMap<Id, Membership>,
        settings: Option<&TokenSettings>,
        now: DateTime<Utc>,
        rng: &mut dyn RngCore,
    ) -> Result<Resolution> {
        check_vote_targets(proposals, votes)?;
        let totals = tally_tokens(proposals, votes);
        let pool_size: u64 = totals.iter().map(|(_, total)| total).sum();
        if pool_size == 0 {
            debug!("No tokens cast; resolving with no winner");
            return Ok(Resolution {
                winner: None,
                updated_memberships: Vec::new(),
            });
        }

        let winner = draw_ticket(&totals, pool_size, rng);
        info!("Lottery winner is {winner} from a pool of {pool_size} tickets");

        let settings = require_settings(settings)?;
        let updated_memberships =
            self.payment
                .apply(votes, memberships, settings, 1.0, &winner, now)?;
        Ok(Resolution {
            winner: Some(winner),
            updated_memberships,
        })
    }
}

/// Draw one ticket uniformly from the virtual pool.
fn draw_ticket(totals: &[(Id, u64)], pool_size: u64, rng: &mut dyn RngCore) -> Id {
    use rand::Rng;

    let mut ticket = rng.gen_range(0..pool_size);
    for (proposal_id, total) in totals {
        if ticket < *total {
            return proposal_id.clone();
        }
        ticket -= total;
    }
    // Unreachable: the totals sum to pool_size.
    totals
        .last()
        .map(|(id, _)| id.clone())
        .expect("pool is non-empty")
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::model::{RegenerationInterval, Role};

    fn settings() -> TokenSettings {
        TokenSettings {
            group_id: Id::from("g1"),
            regeneration_rate: 5,
            regeneration_interval: RegenerationInterval::Daily,
            max_tokens: 100,
            initial_tokens: 100,
        }
    }

    fn member(id: &str, balance: u32) -> (Id, Membership) {
        let membership = Membership {
            id: Id::from(id),
            user_id: Id::from(id),
            group_id: Id::from("g1"),
            role: Role::Member,
            token_balance: balance,
            last_token_regeneration: Utc::now(),
        };
        (membership.id.clone(), membership)
    }

    fn proposal(id: &str, offset_secs: i64) -> Proposal {
        Proposal {
            id: Id::from(id),
            election_id: Id::from("e1"),
            title: id.to_string(),
            proposed_by: Id::from("m0"),
            created_at: Utc::now() + Duration::seconds(offset_secs),
        }
    }

    fn vote(member: &str, proposal: &str, tokens: u32) -> Vote {
        Vote::new(
            Id::from("e1"),
            Id::from(member),
            Id::from(proposal),
            tokens,
            Utc::now(),
        )
    }

    fn most_votes() -> MostVotes {
        MostVotes {
            price: Box::new(FirstPrice),
            payment: Box::new(AllPay),
        }
    }

    #[test]
    fn most_votes_picks_the_largest_total() {
        let proposals = vec![proposal("p1", 0), proposal("p2", 1)];
        let votes = vec![vote("m1", "p1", 10), vote("m2", "p2", 7)];
        let memberships: HashMap<_, _> = vec![member("m1", 50), member("m2", 50)]
            .into_iter()
            .collect();

        let resolution = most_votes()
            .resolve(
                &proposals,
                &votes,
                &memberships,
                Some(&settings()),
                Utc::now(),
                &mut rand::thread_rng(),
            )
            .unwrap();
        assert_eq!(resolution.winner, Some(Id::from("p1")));
        assert_eq!(resolution.updated_memberships.len(), 2);
    }

    #[test]
    fn most_votes_breaks_ties_consistently() {
        let proposals = vec![proposal("p1", 0), proposal("p2", 1)];
        let votes = vec![vote("m1", "p1", 7), vote("m2", "p2", 7)];
        let memberships: HashMap<_, _> = vec![member("m1", 50), member("m2", 50)]
            .into_iter()
            .collect();

        let mut winners = HashSet::new();
        for _ in 0..10 {
            let resolution = most_votes()
                .resolve(
                    &proposals,
                    &votes,
                    &memberships,
                    Some(&settings()),
                    Utc::now(),
                    &mut rand::thread_rng(),
                )
                .unwrap();
            winners.insert(resolution.winner.unwrap());
        }
        // Ties are broken the same way every run over the same input.
        assert_eq!(winners.len(), 1);
    }

    #[test]
    fn most_votes_without_votes_has_no_winner_and_no_mutations() {
        let proposals = vec![proposal("p1", 0)];
        let memberships: HashMap<_, _> = vec![member("m1", 50)].into_iter().collect();

        // No settings supplied: payment must be skipped, so this resolves.
        let resolution = most_votes()
            .resolve(
                &proposals,
                &[],
                &memberships,
                None,
                Utc::now(),
                &mut rand::thread_rng(),
            )
            .unwrap();
        assert_eq!(resolution.winner, None);
        assert!(resolution.updated_memberships.is_empty());
    }

    #[test]
    fn missing_settings_with_votes_is_a_configuration_error() {
        let proposals = vec![proposal("p1", 0)];
        let votes = vec![vote("m1", "p1", 10)];
        let memberships: HashMap<_, _> = vec![member("m1", 50)].into_iter().collect();

        let err = most_votes()
            .resolve(
                &proposals,
                &votes,
                &memberships,
                None,
                Utc::now(),
                &mut rand::thread_rng(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn vote_on_missing_proposal_is_a_data_integrity_error() {
        let proposals = vec![proposal("p1", 0)];
        let votes = vec![vote("m1", "deleted", 10)];
        let memberships: HashMap<_, _> = vec![member("m1", 50)].into_iter().collect();

        let err = most_votes()
            .resolve(
                &proposals,
                &votes,
                &memberships,
                Some(&settings()),
                Utc::now(),
                &mut rand::thread_rng(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn lottery_with_zero_tokens_has_no_winner() {
        let proposals = vec![proposal("p1", 0)];
        let votes = vec![vote("m1", "p1", 0)];
        let memberships: HashMap<_, _> = vec![member("m1", 50)].into_iter().collect();

        let lottery = Lottery {
            payment: Box::new(WinnersPay),
        };
        let resolution = lottery
            .resolve(
                &proposals,
                &votes,
                &memberships,
                Some(&settings()),
                Utc::now(),
                &mut rand::thread_rng(),
            )
            .unwrap();
        assert_eq!(resolution.winner, None);
        assert!(resolution.updated_memberships.is_empty());
    }

    #[test]
    fn lottery_draw_is_reproducible_under_a_seed() {
        let proposals = vec![proposal("p1", 0), proposal("p2", 1)];
        let votes = vec![vote("m1", "p1", 90), vote("m2", "p2", 10)];
        let memberships: HashMap<_, _> = vec![member("m1", 100), member("m2", 100)]
            .into_iter()
            .collect();

        let lottery = Lottery {
            payment: Box::new(AllPay),
        };
        let first = lottery
            .resolve(
                &proposals,
                &votes,
                &memberships,
                Some(&settings()),
                Utc::now(),
                &mut StdRng::seed_from_u64(7),
            )
            .unwrap();
        let second = lottery
            .resolve(
                &proposals,
                &votes,
                &memberships,
                Some(&settings()),
                Utc::now(),
                &mut StdRng::seed_from_u64(7),
            )
            .unwrap();
        assert_eq!(first.winner, second.winner);
    }

    #[test]
    fn strategy_composition_covers_every_mode() {
        let now = Utc::now();
        for payment_mode in [PaymentMode::AllPay, PaymentMode::WinnersPay] {
            for price_mode in [PriceMode::FirstPrice, PriceMode::SecondPrice] {
                for resolution_mode in [ResolutionMode::MostVotes, ResolutionMode::Lottery] {
                    let election = Election::new(
                        Id::from("g1"),
                        now,
                        now + Duration::hours(1),
                        payment_mode,
                        price_mode,
                        resolution_mode,
                        now,
                    )
                    .unwrap();
                    // Every combination composes; none is an error case.
                    let _ = strategy_for(&election);
                }
            }
        }
    }
}
