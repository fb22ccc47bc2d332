//! Farming configuration
//!
//! Loaded from TOML, then overridden from `DRIP_*` environment variables,
//! then validated. Every cap the engine enforces lives here.

use crate::errors::{FarmingError, Result};
use crate::gas;
use crate::schedule::ScheduleLimits;
use drip_types::Amount;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Default number of farms one account may join.
pub const DEFAULT_MAX_USER_FARMS: usize = 10;
/// Default number of reward tokens one multi-reward farm may track.
pub const DEFAULT_MAX_REWARDS_TOKENS: usize = 5;
/// Default per-callback budget.
pub const DEFAULT_CALLBACK_GAS_LIMIT: u64 = 200_000;
/// Default cap on a schedule's total reward (1e32 base units).
pub const DEFAULT_MAX_REWARD_AMOUNT: Amount = 100_000_000_000_000_000_000_000_000_000_000;
/// Default cap on a schedule's duration in seconds.
pub const DEFAULT_MAX_DURATION: u64 = u32::MAX as u64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FarmingConfig {
    /// Capacity of each account's farm membership set.
    pub max_user_farms: usize,
    /// Capacity of each multi-reward farm's token registry.
    pub max_rewards_tokens: usize,
    /// Budget granted to every balance-change callback.
    pub callback_gas_limit: u64,
    /// Upper bound on `reward` of any schedule, folded remainder included.
    pub max_reward_amount: Amount,
    /// Upper bound on a schedule's duration.
    pub max_duration: u64,
}

impl Default for FarmingConfig {
    fn default() -> Self {
        Self {
            max_user_farms: DEFAULT_MAX_USER_FARMS,
            max_rewards_tokens: DEFAULT_MAX_REWARDS_TOKENS,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            max_reward_amount: DEFAULT_MAX_REWARD_AMOUNT,
            max_duration: DEFAULT_MAX_DURATION,
        }
    }
}

impl FarmingConfig {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| FarmingError::ConfigLoad(format!("Failed to parse config: {e}")))
    }

    /// Load from a TOML file, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            FarmingError::ConfigLoad(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        info!(target: "farming", path = %path.display(), "Loaded farming config");
        Ok(config)
    }

    /// Override fields from `DRIP_*` environment variables. Unparseable values
    /// are logged and ignored.
    pub fn apply_env_overrides(&mut self) {
        override_from_env("DRIP_MAX_USER_FARMS", &mut self.max_user_farms);
        override_from_env("DRIP_MAX_REWARDS_TOKENS", &mut self.max_rewards_tokens);
        override_from_env("DRIP_CALLBACK_GAS_LIMIT", &mut self.callback_gas_limit);
        override_from_env("DRIP_MAX_REWARD_AMOUNT", &mut self.max_reward_amount);
        override_from_env("DRIP_MAX_DURATION", &mut self.max_duration);
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_user_farms == 0 {
            return Err(FarmingError::InvalidConfig("max_user_farms must be positive"));
        }
        if self.max_rewards_tokens == 0 {
            return Err(FarmingError::InvalidConfig(
                "max_rewards_tokens must be positive",
            ));
        }
        if self.max_duration == 0 {
            return Err(FarmingError::InvalidConfig("max_duration must be positive"));
        }
        if self.max_reward_amount == 0 {
            return Err(FarmingError::InvalidConfig(
                "max_reward_amount must be positive",
            ));
        }
        // A well-behaved callback on the largest allowed farm must fit.
        if self.callback_gas_limit < gas::balance_update_cost(self.max_rewards_tokens) {
            return Err(FarmingError::InvalidConfig(
                "callback_gas_limit cannot cover a balance update at max_rewards_tokens",
            ));
        }
        Ok(())
    }

    pub fn schedule_limits(&self) -> ScheduleLimits {
        ScheduleLimits {
            max_duration: self.max_duration,
            max_reward_amount: self.max_reward_amount,
        }
    }
}

fn override_from_env<T: std::str::FromStr>(key: &str, slot: &mut T) {
    if let Ok(raw) = env::var(key) {
        match raw.trim().parse::<T>() {
            Ok(value) => *slot = value,
            Err(_) => warn!(target: "farming", key, value = %raw, "Ignoring unparseable override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        FarmingConfig::default().validate().unwrap();
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = FarmingConfig::from_toml_str("max_user_farms = 3\n").unwrap();
        assert_eq!(config.max_user_farms, 3);
        assert_eq!(config.max_rewards_tokens, DEFAULT_MAX_REWARDS_TOKENS);
        assert_eq!(config.callback_gas_limit, DEFAULT_CALLBACK_GAS_LIMIT);
    }

    #[test]
    fn malformed_toml_is_rejected() {
        let err = FarmingConfig::from_toml_str("max_user_farms = \"lots\"").unwrap_err();
        assert!(matches!(err, FarmingError::ConfigLoad(_)));
    }

    #[test]
    fn budget_must_cover_largest_farm() {
        let config = FarmingConfig {
            max_rewards_tokens: 5,
            callback_gas_limit: gas::balance_update_cost(5) - 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(FarmingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_caps_are_rejected() {
        let config = FarmingConfig {
            max_user_farms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_user_farms = 4").unwrap();
        writeln!(file, "max_duration = 86400").unwrap();

        let config = FarmingConfig::load(file.path()).unwrap();
        assert_eq!(config.max_duration, 86_400);
        assert_eq!(config.schedule_limits().max_duration, 86_400);
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = FarmingConfig::load("/nonexistent/drip.toml").unwrap_err();
        assert!(matches!(err, FarmingError::ConfigLoad(_)));
    }
}
