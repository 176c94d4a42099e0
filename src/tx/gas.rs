//! Gas price escalation parameters handed through to the admission gate

use crate::config::EscalationConfig;
use crate::error::{DispatchError, DispatchResult};

use ethers::types::U256;
use std::time::Duration;

const GWEI: u64 = 1_000_000_000;

/// Options the gas price escalator uses to bump a transaction until it is mined.
///
/// The dispatcher never interprets these beyond [`EscalationOptions::validate`].
#[derive(Debug, Clone, PartialEq)]
pub struct EscalationOptions {
    /// Factor applied to the gas price on every increase (e.g. 1.1 = +10%)
    pub price_multiplier: f64,
    /// How long to wait before bumping the price again
    pub increase_interval: Duration,
    /// How often the escalator polls for the receipt
    pub check_interval: Duration,
    /// Ceiling for the escalated gas price, in wei
    pub max_price: U256,
}

impl EscalationOptions {
    /// Validate the escalation parameters
    pub fn validate(&self) -> DispatchResult<()> {
        if !self.price_multiplier.is_finite() || self.price_multiplier <= 1.0 {
            return Err(DispatchError::InvalidOptions(format!(
                "price multiplier must be greater than 1, got {}",
                self.price_multiplier
            )));
        }
        if self.increase_interval.is_zero() {
            return Err(DispatchError::InvalidOptions(
                "increase interval must be positive".to_string(),
            ));
        }
        if self.check_interval.is_zero() {
            return Err(DispatchError::InvalidOptions(
                "check interval must be positive".to_string(),
            ));
        }
        if self.check_interval > self.increase_interval {
            return Err(DispatchError::InvalidOptions(format!(
                "check interval {:?} exceeds increase interval {:?}",
                self.check_interval, self.increase_interval
            )));
        }
        if self.max_price.is_zero() {
            return Err(DispatchError::InvalidOptions(
                "max price must be set".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<&EscalationConfig> for EscalationOptions {
    fn from(config: &EscalationConfig) -> Self {
        Self {
            price_multiplier: config.price_multiplier,
            increase_interval: Duration::from_secs(config.increase_interval_secs),
            check_interval: Duration::from_secs(config.check_interval_secs),
            max_price: U256::from(config.max_price_gwei) * U256::from(GWEI),
        }
    }
}

impl Default for EscalationOptions {
    fn default() -> Self {
        Self::from(&EscalationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        let opts = EscalationOptions::default();
        assert!(opts.validate().is_ok());
        assert_eq!(opts.max_price, U256::from(500u64) * U256::from(GWEI));
    }

    #[test]
    fn test_multiplier_must_increase_price() {
        for multiplier in [1.0, 0.5, f64::NAN, f64::INFINITY] {
            let opts = EscalationOptions {
                price_multiplier: multiplier,
                ..Default::default()
            };
            assert!(matches!(
                opts.validate(),
                Err(DispatchError::InvalidOptions(_))
            ));
        }
    }

    #[test]
    fn test_intervals_and_price_cap() {
        let zero_interval = EscalationOptions {
            increase_interval: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_interval.validate().is_err());

        let slow_check = EscalationOptions {
            check_interval: Duration::from_secs(600),
            increase_interval: Duration::from_secs(60),
            ..Default::default()
        };
        assert!(slow_check.validate().is_err());

        let no_cap = EscalationOptions {
            max_price: U256::zero(),
            ..Default::default()
        };
        assert!(no_cap.validate().is_err());
    }
}
