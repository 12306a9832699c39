//! Domain records for the election engine.
//!
//! These arrive already validated from the surrounding application; the
//! core only enforces the domain invariants (balance bounds, lifecycle
//! ordering, one-vote-per-membership-per-election).

mod election;
mod id;
mod membership;
mod proposal;
mod settings;
mod vote;

pub use election::{Election, ElectionState, PaymentMode, PriceMode, ResolutionMode};
pub use id::Id;
pub use membership::{Membership, Role};
pub use proposal::Proposal;
pub use settings::{RegenerationInterval, TokenSettings};
pub use vote::Vote;
