//! Core engine for token-weighted group elections.
//!
//! Members hold a token budget and spend tokens voting for proposals; an
//! election resolves to a winning proposal under a pluggable economic
//! rule (most-votes or spend-weighted lottery) with a matching payment
//! rule (all voters pay, or only winners pay) that debits spent tokens
//! and regenerates each member's balance.
//!
//! This crate owns the election lifecycle state machine, the
//! resolution/payment engine and the token-ledger consistency
//! guarantees. User/group CRUD, authentication and routing live in the
//! surrounding application, which hands the engine already-validated
//! domain objects and a [`store::LedgerStore`].

pub mod error;
pub mod lifecycle;
pub mod model;
pub mod resolution;
pub mod store;
pub mod tokens;

pub use error::{Error, Result};
pub use lifecycle::ElectionStateMachine;
