//! The election lifecycle state machine.
//!
//! `upcoming -> open -> closed`, driven by wall-clock time whenever the
//! surrounding application reads or polls an election. At most one
//! transition happens per invocation; the closing transition runs the
//! configured resolution strategy exactly once, and commits the status
//! flip, the winner, and every membership debit in a single transaction.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use rand::RngCore;

use crate::error::{Error, Result};
use crate::model::{Election, ElectionState, Id, Membership, Proposal, TokenSettings, Vote};
use crate::resolution::strategy_for;
use crate::store::{LedgerStore, Transaction};

/// Attempts at the closing transaction before a conflict is surfaced.
/// A conflict normally means a concurrent caller closed the election,
/// which the retry observes on its fresh read.
const MAX_COMMIT_ATTEMPTS: u32 = 3;

/// Drives elections through their lifecycle against a ledger store.
pub struct ElectionStateMachine<S: LedgerStore + ?Sized> {
    store: Arc<S>,
}

impl<S: LedgerStore + ?Sized> ElectionStateMachine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Compare the election's clock against `now` and perform at most one
    /// transition. Returns the (possibly updated) election and whether
    /// this call triggered resolution.
    ///
    /// Calling this on a closed election is a no-op and performs zero
    /// store writes, no matter how many times it is repeated.
    pub async fn advance(
        &self,
        election_id: &Id,
        now: DateTime<Utc>,
        rng: &mut impl RngCore,
    ) -> Result<(Election, bool)> {
        self.step(election_id, None, None, now, rng).await
    }

    /// Administrative override: treat the election as starting at `now`.
    /// Goes through the same transition path as [`Self::advance`].
    pub async fn start_now(
        &self,
        election_id: &Id,
        now: DateTime<Utc>,
        rng: &mut impl RngCore,
    ) -> Result<(Election, bool)> {
        self.step(election_id, Some(now), None, now, rng).await
    }

    /// Administrative override: treat the election as ending at `now`,
    /// closing and resolving it if it is open. There is no parallel
    /// resolution path; this is the ordinary closing transition with a
    /// clamped deadline.
    pub async fn close_early(
        &self,
        election_id: &Id,
        now: DateTime<Utc>,
        rng: &mut impl RngCore,
    ) -> Result<(Election, bool)> {
        self.step(election_id, None, Some(now), now, rng).await
    }

    async fn step(
        &self,
        election_id: &Id,
        start_override: Option<DateTime<Utc>>,
        end_override: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
        rng: &mut impl RngCore,
    ) -> Result<(Election, bool)> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut txn = Transaction::new(self.store.as_ref());
            let mut election: Election = txn
                .get(election_id)
                .await?
                .ok_or_else(|| Error::not_found(format!("Election {election_id}")))?;

            let effective_start = start_override.unwrap_or(election.start_date);
            let effective_end = end_override.unwrap_or(election.end_date);

            let result = match election.status {
                // Terminal: no transition, no writes.
                ElectionState::Closed => return Ok((election, false)),
                ElectionState::Upcoming if now >= effective_start => {
                    election.status = ElectionState::Open;
                    txn.set(&election)?;
                    match txn.commit().await {
                        Ok(()) => {
                            info!("Election {election_id} transitioned to open");
                            Ok((election, false))
                        }
                        Err(err) => Err(err),
                    }
                }
                ElectionState::Open if now >= effective_end => {
                    self.resolve_and_close(&mut txn, &mut election, now, rng)
                        .await?;
                    match txn.commit().await {
                        Ok(()) => {
                            info!(
                                "Election {election_id} transitioned to closed; winning proposal: {:?}",
                                election.winning_proposal_id.as_ref().map(Id::as_str)
                            );
                            Ok((election, true))
                        }
                        Err(err) => Err(err),
                    }
                }
                // Not yet due for a transition.
                _ => return Ok((election, false)),
            };

            match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_conflict() && attempts < MAX_COMMIT_ATTEMPTS => {
                    // Most likely a concurrent caller advanced this
                    // election first; the fresh read will observe that.
                    debug!("Retrying transition of election {election_id} after conflict: {err}");
                    continue;
                }
                Err(err) => {
                    if err.is_conflict() {
                        warn!(
                            "Giving up on election {election_id} after {attempts} conflicting attempts"
                        );
                    }
                    return Err(err);
                }
            }
        }
    }

    /// Stage the closing transition inside `txn`: load a snapshot of the
    /// election's data, resolve it, and stage the membership updates plus
    /// the closed election as one atomic write set. Any error leaves the
    /// transaction uncommitted and the election open.
    async fn resolve_and_close(
        &self,
        txn: &mut Transaction<'_, S>,
        election: &mut Election,
        now: DateTime<Utc>,
        rng: &mut impl RngCore,
    ) -> Result<()> {
        let mut proposals: Vec<Proposal> = txn
            .query("election_id", election.id.as_str())
            .await?;
        // Creation order makes the most-votes tie-break deterministic.
        proposals.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));

        let votes: Vec<Vote> = txn.query("election_id", election.id.as_str()).await?;
        let memberships: HashMap<Id, Membership> = txn
            .query("group_id", election.group_id.as_str())
            .await?
            .into_iter()
            .map(|m: Membership| (m.id.clone(), m))
            .collect();
        let settings: Option<TokenSettings> = txn.get(&election.group_id).await?;

        let strategy = strategy_for(election);
        let resolution = strategy.resolve(
            &proposals,
            &votes,
            &memberships,
            settings.as_ref(),
            now,
            rng,
        )?;

        for membership in &resolution.updated_memberships {
            txn.set(membership)?;
        }
        election.status = ElectionState::Closed;
        election.winning_proposal_id = resolution.winner;
        txn.set(election)?;
        Ok(())
    }
}
