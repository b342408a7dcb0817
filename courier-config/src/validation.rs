// Checks applied to loaded settings before the worker starts

use std::time::Duration;

use crate::{ConfigError, Result};

/// Settings that can check themselves after loading.
pub trait Validate {
    fn validate(&self) -> Result<()>;
}

/// Individual checks, each naming the offending variable in its error.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Rejects blank and whitespace-only values.
    pub fn required(value: &str, key: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(invalid(format!("{} must not be blank", key)));
        }
        Ok(())
    }

    pub fn port(value: u16, key: &str) -> Result<()> {
        if value == 0 {
            return Err(invalid(format!("{} must be a port between 1 and 65535", key)));
        }
        Ok(())
    }

    pub fn non_zero(value: Duration, key: &str) -> Result<()> {
        if value.is_zero() {
            return Err(invalid(format!("{} must be greater than zero", key)));
        }
        Ok(())
    }

    /// A sender address: one `@` with something on both sides and a dotted domain.
    pub fn sender_address(value: &str, key: &str) -> Result<()> {
        let well_formed = value
            .split_once('@')
            .filter(|(local, domain)| {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.split('.').count() > 1
                    && domain.split('.').all(|label| !label.is_empty())
            })
            .is_some();

        if !well_formed {
            return Err(invalid(format!("{} is not a usable sender address: {:?}", key, value)));
        }
        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::ValidationError(message)
}
