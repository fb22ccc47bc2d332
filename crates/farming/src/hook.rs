//! Farm plugin interface
//!
//! A farm is a plugin of the stake ledger: the ledger notifies it of every
//! balance movement of the accounts that joined it, and routes holder and
//! distributor requests to it. The ledger owns farms as trait objects, so
//! single-token farms, multi-token farms and third-party implementations
//! share one registry.

use crate::errors::{FarmingError, Result};
use crate::gas::GasMeter;
use crate::token_ledger::TokenLedger;
use drip_types::{AccountId, Amount, FarmId, Timestamp, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A balance movement as seen by one farm.
///
/// `from`/`to` are `None` when that side is not a member of the farm, so a
/// transfer between two members keeps the farm's supply unchanged while a
/// transfer from a non-member looks like a mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceUpdate {
    pub from: Option<AccountId>,
    pub to: Option<AccountId>,
    pub amount: Amount,
}

impl BalanceUpdate {
    pub fn mint(to: AccountId, amount: Amount) -> Self {
        Self {
            from: None,
            to: Some(to),
            amount,
        }
    }

    pub fn burn(from: AccountId, amount: Amount) -> Self {
        Self {
            from: Some(from),
            to: None,
            amount,
        }
    }

    pub fn transfer(from: AccountId, to: AccountId, amount: Amount) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
            amount,
        }
    }

    /// Translate an `(account, old, new)` notification. `None` when nothing
    /// changed.
    pub fn from_balance_change(account: AccountId, old: Amount, new: Amount) -> Option<Self> {
        match new.cmp(&old) {
            std::cmp::Ordering::Greater => Some(Self::mint(account, new - old)),
            std::cmp::Ordering::Less => Some(Self::burn(account, old - new)),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Whether the farm's total supply moves.
    pub fn changes_supply(&self) -> bool {
        self.from.is_none() != self.to.is_none()
    }

    /// Number of correction entries this update touches per stream.
    pub fn writes(&self) -> u64 {
        self.from.is_some() as u64 + self.to.is_some() as u64
    }
}

/// Farm-side view of the stake ledger. All identities are plain values; the
/// farm decides what the caller may do.
pub trait FarmPlugin: Send {
    fn id(&self) -> FarmId;

    /// Sum of the balances of all current members.
    fn total_supply(&self) -> Amount;

    /// Reward tokens this farm streams, in registration order.
    fn rewards_tokens(&self) -> Vec<TokenId>;

    /// Apply a balance movement. Implementations charge `meter` for the
    /// whole update before mutating anything.
    fn update_balances(
        &mut self,
        update: &BalanceUpdate,
        now: Timestamp,
        meter: &mut GasMeter,
    ) -> Result<()>;

    /// Reward of `token` farmed by `account` holding `balance` in this farm.
    fn farmed(
        &self,
        token: &TokenId,
        account: &AccountId,
        balance: Amount,
        now: Timestamp,
    ) -> Result<Amount>;

    /// Pay out the farmed reward of `token`.
    fn claim(
        &mut self,
        token: &TokenId,
        account: &AccountId,
        balance: Amount,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount>;

    /// Fund and (re)start the schedule of `token`. Returns the new total
    /// reward of the window.
    fn start_farming(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        amount: Amount,
        period: u64,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount>;

    /// Stop the schedule of `token`, refunding the unstreamed reward.
    fn stop_farming(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        now: Timestamp,
        vault: &mut dyn TokenLedger,
    ) -> Result<Amount>;

    /// Move uncommitted tokens held by the farm to the distributor.
    fn rescue_funds(
        &mut self,
        caller: &AccountId,
        token: &TokenId,
        amount: Amount,
        vault: &mut dyn TokenLedger,
    ) -> Result<()>;

    /// What the distributor can take out: with `at == None` the amount
    /// `rescue_funds` accepts now, with `Some(t)` that amount plus the
    /// remainder a stop at `t` would refund.
    fn withdrawable(
        &self,
        token: &TokenId,
        at: Option<Timestamp>,
        vault: &dyn TokenLedger,
    ) -> Result<Amount>;

    fn distributor(&self) -> AccountId;

    fn set_distributor(&mut self, caller: &AccountId, distributor: AccountId) -> Result<()>;

    /// Register another reward token. Single-token farms have no room.
    fn add_rewards_token(&mut self, _caller: &AccountId, _token: TokenId) -> Result<()> {
        Err(FarmingError::CapacityExceeded {
            resource: "rewards tokens",
            limit: self.rewards_tokens().len(),
        })
    }
}

/// Owner and distributor identities of a farm, injected at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FarmAdmin {
    pub owner: AccountId,
    pub distributor: AccountId,
}

impl FarmAdmin {
    pub fn new(owner: AccountId, distributor: AccountId) -> Self {
        Self { owner, distributor }
    }

    pub fn ensure_owner(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.owner {
            return Err(FarmingError::AccessDenied { caller: *caller });
        }
        Ok(())
    }

    pub fn ensure_distributor(&self, caller: &AccountId) -> Result<()> {
        if *caller != self.distributor {
            return Err(FarmingError::AccessDenied { caller: *caller });
        }
        Ok(())
    }
}

/// Farms known to a stake ledger.
#[derive(Default)]
pub struct FarmRegistry {
    farms: HashMap<FarmId, Box<dyn FarmPlugin>>,
}

impl FarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, farm: Box<dyn FarmPlugin>) -> Result<FarmId> {
        let id = farm.id();
        if self.farms.contains_key(&id) {
            return Err(FarmingError::FarmAlreadyRegistered(id));
        }
        self.farms.insert(id, farm);
        Ok(id)
    }

    pub fn contains(&self, id: &FarmId) -> bool {
        self.farms.contains_key(id)
    }

    pub fn get(&self, id: &FarmId) -> Result<&dyn FarmPlugin> {
        self.farms
            .get(id)
            .map(|farm| &**farm)
            .ok_or(FarmingError::FarmNotFound(*id))
    }

    pub fn get_mut(&mut self, id: &FarmId) -> Result<&mut (dyn FarmPlugin + 'static)> {
        self.farms
            .get_mut(id)
            .map(|farm| &mut **farm)
            .ok_or(FarmingError::FarmNotFound(*id))
    }

    pub fn len(&self) -> usize {
        self.farms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.farms.is_empty()
    }
}

impl std::fmt::Debug for FarmRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FarmRegistry")
            .field("farms", &self.farms.keys().collect::<Vec<_>>())
            .finish()
    }
}
