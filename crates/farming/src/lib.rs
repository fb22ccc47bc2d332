//! Drip Farming
//!
//! Streams reward budgets to the holders of a balance ledger in proportion
//! to balance and time held, in constant time per balance change.
//!
//! - [`schedule`], [`accumulator`], [`correction`]: the per-token accounting
//!   triple, composed by [`stream::RewardStream`]
//! - [`farm`] and [`multi_farm`]: farms plugged into a host ledger through
//!   [`hook::FarmPlugin`]
//! - [`stake_ledger`]: the host ledger with memberships and dispatch
//! - [`pool`]: a deposit/withdraw pool whose shares farm directly

pub mod accumulator;
pub mod config;
pub mod correction;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod farm;
pub mod gas;
pub mod hook;
pub mod membership;
pub mod multi_farm;
pub mod pool;
pub mod schedule;
pub mod stake_ledger;
pub mod stream;
pub mod token_ledger;

pub use config::FarmingConfig;
pub use dispatcher::{BalanceChangeDispatcher, DispatchFailure, DispatchReport};
pub use errors::{FarmingError, Result};
pub use events::FarmingEvent;
pub use farm::Farm;
pub use gas::GasMeter;
pub use hook::{BalanceUpdate, FarmAdmin, FarmPlugin, FarmRegistry};
pub use membership::Memberships;
pub use multi_farm::MultiFarm;
pub use pool::FarmingPool;
pub use schedule::{RewardSchedule, ScheduleLimits, ScheduleState};
pub use stake_ledger::StakeLedger;
pub use stream::RewardStream;
pub use token_ledger::{InMemoryTokenLedger, MockTokenLedger, TokenLedger};
