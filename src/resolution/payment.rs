use std::collections::HashMap;

use chrono::{DateTime, Utc};
use log::warn;

use crate::error::{Error, Result};
use crate::model::{Id, Membership, RegenerationInterval, TokenSettings, Vote};

/// Applies token debits to the correct subset of voters once a winner is
/// known, and folds any per-election regeneration credit into the same
/// balance update.
///
/// This is the only component permitted to mutate `token_balance` as a
/// consequence of resolution. It never persists anything itself; it
/// returns the mutated membership records for the caller to stage inside
/// the closing transaction.
pub trait PaymentApplicator: Send + Sync {
    fn apply(
        &self,
        votes: &[Vote],
        memberships: &HashMap<Id, Membership>,
        settings: &TokenSettings,
        price: f64,
        winner: &Id,
        now: DateTime<Utc>,
    ) -> Result<Vec<Membership>>;
}

/// Every vote incurs a debit of its full `tokens_used`, regardless of the
/// price multiplier (first/second price only scales winners' payments).
#[derive(Debug, Default)]
pub struct AllPay;

impl PaymentApplicator for AllPay {
    fn apply(
        &self,
        votes: &[Vote],
        memberships: &HashMap<Id, Membership>,
        settings: &TokenSettings,
        _price: f64,
        _winner: &Id,
        now: DateTime<Utc>,
    ) -> Result<Vec<Membership>> {
        votes
            .iter()
            .map(|vote| settle(vote, vote.tokens_used, memberships, settings, now))
            .collect()
    }
}

/// Only votes on the winning proposal pay, each debited
/// `floor(tokens_used * price)`.
#[derive(Debug, Default)]
pub struct WinnersPay;

impl PaymentApplicator for WinnersPay {
    fn apply(
        &self,
        votes: &[Vote],
        memberships: &HashMap<Id, Membership>,
        settings: &TokenSettings,
        price: f64,
        winner: &Id,
        now: DateTime<Utc>,
    ) -> Result<Vec<Membership>> {
        votes
            .iter()
            .filter(|vote| &vote.proposal_id == winner)
            .map(|vote| {
                let debit = (vote.tokens_used as f64 * price).floor() as u32;
                settle(vote, debit, memberships, settings, now)
            })
            .collect()
    }
}

/// Debit one vote's membership, regenerating in the same update when the
/// group regenerates per election. The debit and the credit land in a
/// single returned record, so no intermediate balance is ever visible.
fn settle(
    vote: &Vote,
    debit: u32,
    memberships: &HashMap<Id, Membership>,
    settings: &TokenSettings,
    now: DateTime<Utc>,
) -> Result<Membership> {
    let mut membership = memberships
        .get(&vote.membership_id)
        .cloned()
        .ok_or_else(|| {
            Error::data_integrity(format!(
                "Vote {} references missing membership {}",
                vote.id, vote.membership_id
            ))
        })?;

    if debit > membership.token_balance {
        // Balances are checked at cast time, so this means the ledger
        // drifted; clamp to zero and leave a trace for group admins.
        warn!(
            "Membership {} owes {debit} tokens but holds {}; clamping balance to 0",
            membership.id, membership.token_balance
        );
    }
    let mut balance = membership.token_balance.saturating_sub(debit);

    if settings.regeneration_interval == RegenerationInterval::PerElection {
        balance = balance
            .saturating_add(settings.regeneration_rate)
            .min(settings.max_tokens);
        membership.last_token_regeneration = now;
    }

    membership.token_balance = balance.min(settings.max_tokens);
    Ok(membership)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::model::Role;

    fn settings(interval: RegenerationInterval) -> TokenSettings {
        TokenSettings {
            group_id: Id::from("g1"),
            regeneration_rate: 5,
            regeneration_interval: interval,
            max_tokens: 100,
            initial_tokens: 100,
        }
    }

    fn member(id: &str, balance: u32) -> Membership {
        Membership {
            id: Id::from(id),
            user_id: Id::from(id),
            group_id: Id::from("g1"),
            role: Role::Member,
            token_balance: balance,
            last_token_regeneration: Utc::now() - chrono::Duration::days(3),
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

    fn by_id(memberships: Vec<Membership>) -> HashMap<Id, Membership> {
        memberships.into_iter().map(|m| (m.id.clone(), m)).collect()
    }

    #[test]
    fn all_pay_debits_losers_full_bid_regardless_of_price() {
        let memberships = by_id(vec![member("m1", 50), member("m2", 50)]);
        let votes = vec![vote("m1", "p1", 10), vote("m2", "p2", 7)];
        let updated = AllPay
            .apply(
                &votes,
                &memberships,
                &settings(RegenerationInterval::Daily),
                0.4,
                &Id::from("p1"),
                Utc::now(),
            )
            .unwrap();

        let balances: HashMap<_, _> = updated
            .iter()
            .map(|m| (m.id.as_str().to_string(), m.token_balance))
            .collect();
        assert_eq!(balances["m1"], 40);
        assert_eq!(balances["m2"], 43);
    }

    #[test]
    fn winners_pay_debits_only_winning_votes_scaled_and_floored() {
        let memberships = by_id(vec![member("m1", 50), member("m2", 50)]);
        let votes = vec![vote("m1", "p1", 10), vote("m2", "p2", 7)];
        let updated = WinnersPay
            .apply(
                &votes,
                &memberships,
                &settings(RegenerationInterval::Daily),
                0.4,
                &Id::from("p1"),
                Utc::now(),
            )
            .unwrap();

        // floor(10 * 0.4) = 4; the losing vote is untouched.
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].id.as_str(), "m1");
        assert_eq!(updated[0].token_balance, 46);
    }

    #[test]
    fn overdrawn_debit_clamps_to_zero() {
        let memberships = by_id(vec![member("m1", 3)]);
        let votes = vec![vote("m1", "p1", 10)];
        let updated = AllPay
            .apply(
                &votes,
                &memberships,
                &settings(RegenerationInterval::Daily),
                1.0,
                &Id::from("p1"),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(updated[0].token_balance, 0);
    }

    #[test]
    fn per_election_regeneration_folds_into_the_debit() {
        let now = Utc::now();
        let memberships = by_id(vec![member("m1", 50)]);
        let votes = vec![vote("m1", "p1", 10)];
        let updated = AllPay
            .apply(
                &votes,
                &memberships,
                &settings(RegenerationInterval::PerElection),
                1.0,
                &Id::from("p1"),
                now,
            )
            .unwrap();

        // 50 - 10 + 5, and the regeneration timestamp moves with it.
        assert_eq!(updated[0].token_balance, 45);
        assert_eq!(updated[0].last_token_regeneration, now);
    }

    #[test]
    fn per_election_regeneration_is_capped_at_max_tokens() {
        let memberships = by_id(vec![member("m1", 98)]);
        let votes = vec![vote("m1", "p1", 1)];
        let updated = AllPay
            .apply(
                &votes,
                &memberships,
                &settings(RegenerationInterval::PerElection),
                1.0,
                &Id::from("p1"),
                Utc::now(),
            )
            .unwrap();
        assert_eq!(updated[0].token_balance, 100);
    }

    #[test]
    fn missing_membership_is_a_data_integrity_error() {
        let memberships = by_id(vec![member("m1", 50)]);
        let votes = vec![vote("m1", "p1", 10), vote("ghost", "p1", 5)];
        let err = AllPay
            .apply(
                &votes,
                &memberships,
                &settings(RegenerationInterval::Daily),
                1.0,
                &Id::from("p1"),
                Utc::now(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }
}
