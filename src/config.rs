//! Simulation tuning.
//!
//! Per-game settings (ticks per day, timezone, command limit) live in the
//! game record; everything here applies to every game the process runs.

use std::str::FromStr;

use crate::game::{placeholder_momentum, MomentumInit, MAX_QUANTITY};

/// Error returned by [`SimConfig::validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(pub String);

/// Simulation parameters.
#[derive(Debug, Clone, Copy)]
pub struct SimConfig {
    /// Equilibration iterations per tick.
    pub iterations: u32,
    /// Cap applied to every cell once flow has settled.
    pub max_quantity: u32,
    /// Lowest momentum a directed gate may hold.
    pub momentum_floor: u32,
    /// Highest momentum a directed gate may hold.
    pub momentum_ceiling: u32,
    /// Momentum gained after a tick of heavy use.
    pub momentum_growth: u32,
    /// Momentum lost after a tick of light use.
    pub momentum_decay: u32,
    /// Momentum lost after a tick where force went the other way.
    pub reversal_decay: u32,
    /// Flow at or above this share of momentum counts as heavy use.
    pub heavy_use_percent: u32,
    /// Power applied to force when computing combat indices.
    pub combat_exponent: f64,
    /// Multiplier applied to the pre-tick resident's force in combat.
    pub defender_penalty: f64,
    /// Momentum given to a newly opened gate.
    pub momentum_init: MomentumInit,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            iterations: 8,
            max_quantity: MAX_QUANTITY,
            momentum_floor: 50,
            momentum_ceiling: 600,
            momentum_growth: 50,
            momentum_decay: 25,
            reversal_decay: 100,
            heavy_use_percent: 75,
            combat_exponent: 2.0,
            defender_penalty: 0.9,
            momentum_init: placeholder_momentum,
        }
    }
}

impl SimConfig {
    /// Load config from `SLUICE_*` environment variables or use defaults.
    ///
    /// Unparseable or out-of-range values are logged and ignored.
    #[must_use]
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        read_env("SLUICE_ITERATIONS", &mut config.iterations, |v| (1..=64).contains(v));
        read_env("SLUICE_MAX_QUANTITY", &mut config.max_quantity, |v| *v > 0);
        read_env("SLUICE_MOMENTUM_FLOOR", &mut config.momentum_floor, |v| *v > 0);
        read_env("SLUICE_MOMENTUM_CEILING", &mut config.momentum_ceiling, |v| *v > 0);
        read_env("SLUICE_MOMENTUM_GROWTH", &mut config.momentum_growth, |_| true);
        read_env("SLUICE_MOMENTUM_DECAY", &mut config.momentum_decay, |_| true);
        read_env("SLUICE_REVERSAL_DECAY", &mut config.reversal_decay, |_| true);
        read_env("SLUICE_HEAVY_USE_PERCENT", &mut config.heavy_use_percent, |v| {
            (1..=100).contains(v)
        });
        read_env("SLUICE_COMBAT_EXPONENT", &mut config.combat_exponent, |v| *v > 1.0);
        read_env("SLUICE_DEFENDER_PENALTY", &mut config.defender_penalty, |v| {
            *v > 0.0 && *v <= 1.0
        });

        config
    }

    /// Validate configuration after loading.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first inconsistent setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError("iterations must be at least 1".to_string()));
        }
        if self.max_quantity == 0 {
            return Err(ConfigError("max_quantity must be at least 1".to_string()));
        }
        if self.momentum_floor == 0 || self.momentum_floor > self.momentum_ceiling {
            return Err(ConfigError(format!(
                "momentum bounds [{}, {}] are empty",
                self.momentum_floor, self.momentum_ceiling
            )));
        }
        if self.heavy_use_percent == 0 || self.heavy_use_percent > 100 {
            return Err(ConfigError("heavy_use_percent must be 1-100".to_string()));
        }
        if self.combat_exponent.is_nan() || self.combat_exponent <= 1.0 {
            return Err(ConfigError("combat_exponent must be greater than 1".to_string()));
        }
        if !(self.defender_penalty > 0.0 && self.defender_penalty <= 1.0) {
            return Err(ConfigError("defender_penalty must be in (0, 1]".to_string()));
        }
        Ok(())
    }

    /// Clamp a momentum value into the configured bounds.
    #[must_use]
    pub fn clamp_momentum(&self, value: u32) -> u32 {
        value.clamp(self.momentum_floor, self.momentum_ceiling.max(self.momentum_floor))
    }
}

fn read_env<T: FromStr + Copy + std::fmt::Display>(
    name: &str,
    field: &mut T,
    valid: impl Fn(&T) -> bool,
) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) if valid(&value) => *field = value,
        Ok(value) => tracing::warn!("{name}={value} is out of range, using default {field}"),
        Err(_) => tracing::warn!("Invalid {name} '{raw}', using default {field}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimConfig::default();
        assert_eq!(config.iterations, 8);
        assert_eq!(config.max_quantity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_or_default() {
        let config = SimConfig::load_or_default();
        assert!(config.iterations > 0);
    }

    #[test]
    fn test_validate_rejects_inverted_bounds() {
        let config = SimConfig {
            momentum_floor: 700,
            momentum_ceiling: 100,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_linear_combat() {
        let config = SimConfig {
            combat_exponent: 1.0,
            ..SimConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_momentum() {
        let config = SimConfig::default();
        assert_eq!(config.clamp_momentum(0), 50);
        assert_eq!(config.clamp_momentum(10_000), 600);
        assert_eq!(config.clamp_momentum(321), 321);
    }
}
