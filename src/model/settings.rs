use serde::{Deserialize, Serialize};

use crate::model::Id;

/// How often token balances regenerate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegenerationInterval {
    /// Once per calendar day.
    Daily,
    /// Immediately after each election's payment is applied.
    PerElection,
    /// An interval value this engine does not recognise. Stored data may
    /// predate or postdate this build; regeneration treats it as a
    /// configuration error and leaves balances unchanged.
    #[serde(other)]
    Unknown,
}

/// Per-group token economy settings. Immutable input to the core;
/// changed only by the group-admin flow. Stored under the group's id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSettings {
    pub group_id: Id,
    /// Tokens credited per regeneration interval.
    pub regeneration_rate: u32,
    pub regeneration_interval: RegenerationInterval,
    /// Upper bound on any membership's balance.
    pub max_tokens: u32,
    /// Balance granted to a newly created membership.
    pub initial_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unrecognised_interval_deserializes_to_unknown() {
        let interval: RegenerationInterval = serde_json::from_value("hourly".into()).unwrap();
        assert_eq!(interval, RegenerationInterval::Unknown);

        let interval: RegenerationInterval = serde_json::from_value("per_election".into()).unwrap();
        assert_eq!(interval, RegenerationInterval::PerElection);
    }
}
