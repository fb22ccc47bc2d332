use drip_types::{AccountId, Amount, FarmId, TokenId};
use thiserror::Error;

/// Errors raised by farming operations.
///
/// Every variant is produced before any state is mutated: a failed call
/// leaves farms, memberships and token balances exactly as they were.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FarmingError {
    #[error("access denied for {caller:?}")]
    AccessDenied { caller: AccountId },

    #[error("farming duration must be positive")]
    ZeroDuration,

    #[error("farming duration {duration}s exceeds maximum {max}s")]
    DurationTooLarge { duration: u64, max: u64 },

    #[error("reward amount {amount} exceeds maximum {max}")]
    AmountTooLarge { amount: Amount, max: Amount },

    #[error("account is already farming {0:?}")]
    AlreadyFarming(FarmId),

    #[error("account already exited {0:?}")]
    AlreadyExited(FarmId),

    #[error("{resource} capacity of {limit} exceeded")]
    CapacityExceeded { resource: &'static str, limit: usize },

    #[error("rewards token {0:?} already added")]
    RewardsTokenAlreadyAdded(TokenId),

    #[error("rewards token {0:?} not found")]
    RewardsTokenNotFound(TokenId),

    #[error("insufficient funds: requested={requested}, available={available}")]
    InsufficientFunds { requested: Amount, available: Amount },

    #[error("insufficient balance: requested={requested}, available={available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    #[error("farm {0:?} not found")]
    FarmNotFound(FarmId),

    #[error("farm {0:?} already registered")]
    FarmAlreadyRegistered(FarmId),

    #[error("callback out of gas: required {required}, remaining {remaining}")]
    OutOfGas { required: u64, remaining: u64 },

    #[error("callback panicked: {0}")]
    CallbackPanicked(String),

    #[error("arithmetic overflow: {0}")]
    ArithmeticOverflow(&'static str),

    #[error("invalid farming config: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to load farming config: {0}")]
    ConfigLoad(String),
}

pub type Result<T> = std::result::Result<T, FarmingError>;
