//! Observable outcomes of farming operations.
//!
//! The stake ledger queues one event per successful state change (and one
//! per isolated callback failure); hosts drain the queue after each call.
//! The standalone farming pool reports through `tracing` only.

use drip_types::{AccountId, Amount, FarmId, Timestamp, TokenId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FarmingEvent {
    Joined {
        account: AccountId,
        farm: FarmId,
    },
    Quit {
        account: AccountId,
        farm: FarmId,
    },
    Claimed {
        account: AccountId,
        farm: FarmId,
        token: TokenId,
        amount: Amount,
    },
    FarmingStarted {
        farm: FarmId,
        token: TokenId,
        amount: Amount,
        reward: Amount,
        period: u64,
        at: Timestamp,
    },
    FarmingStopped {
        farm: FarmId,
        token: TokenId,
        refunded: Amount,
        at: Timestamp,
    },
    FundsRescued {
        farm: FarmId,
        token: TokenId,
        amount: Amount,
    },
    DistributorChanged {
        farm: FarmId,
        distributor: AccountId,
    },
    RewardsTokenAdded {
        farm: FarmId,
        token: TokenId,
    },
    /// A balance-change callback failed and was skipped.
    CallbackFailed {
        farm: FarmId,
        account: AccountId,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = FarmingEvent::Joined {
            account: AccountId::from_label("alice"),
            farm: FarmId::from_label("farm"),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "joined");
        let back: FarmingEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
