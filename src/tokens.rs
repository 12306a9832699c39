//! Token regeneration: replenishing membership balances on a schedule,
//! bounded by the group's maximum.

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::{Error, Result};
use crate::model::{Id, Membership, RegenerationInterval, TokenSettings};
use crate::store::{LedgerStore, Transaction};

/// Regenerate a membership's balance according to its group's settings.
///
/// * `Daily` credits `regeneration_rate` at most once per calendar day,
///   capped at `max_tokens`.
/// * `PerElection` is a no-op here: that credit is applied by the payment
///   applicator at resolution time, never by a standalone pass.
/// * `Unknown` intervals are a configuration problem in stored data; they
///   are reported and the balance is left unchanged.
///
/// Returns the (possibly unchanged) membership; nothing is persisted.
pub fn regenerate(
    membership: &Membership,
    settings: &TokenSettings,
    now: DateTime<Utc>,
) -> Membership {
    let mut membership = membership.clone();
    let tokens_to_add = match settings.regeneration_interval {
        RegenerationInterval::Daily => {
            if membership.last_token_regeneration.date_naive() < now.date_naive() {
                settings.regeneration_rate
            } else {
                0
            }
        }
        RegenerationInterval::PerElection => 0,
        RegenerationInterval::Unknown => {
            warn!(
                "Invalid regeneration interval configured for group {}; leaving membership {} unchanged",
                settings.group_id, membership.id
            );
            0
        }
    };

    if tokens_to_add > 0 {
        let new_balance = membership
            .token_balance
            .saturating_add(tokens_to_add)
            .min(settings.max_tokens);
        info!(
            "Regenerated {tokens_to_add} tokens for membership {}, new balance: {new_balance}",
            membership.id
        );
        membership.token_balance = new_balance;
        membership.last_token_regeneration = now;
    }
    membership
}

/// Regenerate one membership and persist the result if it changed.
///
/// This is the entry point the surrounding application calls when a
/// membership is read; missing records surface as errors rather than
/// silent no-ops.
pub async fn regenerate_membership<S: LedgerStore + ?Sized>(
    store: &S,
    membership_id: &Id,
    now: DateTime<Utc>,
) -> Result<Membership> {
    let mut txn = Transaction::new(store);
    let membership: Membership = txn
        .get(membership_id)
        .await?
        .ok_or_else(|| Error::not_found(format!("Membership {membership_id}")))?;
    let settings: TokenSettings = txn
        .get(&membership.group_id)
        .await?
        .ok_or_else(|| {
            Error::configuration(format!(
                "Group {} has no token settings",
                membership.group_id
            ))
        })?;

    let updated = regenerate(&membership, &settings, now);
    if updated != membership {
        txn.set(&updated)?;
        txn.commit().await?;
    }
    Ok(updated)
}
