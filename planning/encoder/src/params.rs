use crate::error::EncodingError;
use std::time::Duration;
use strata::params::{EnvParam, Limits};

/// Largest horizon that can be encoded.
pub static MAX_HORIZON: EnvParam<usize> = EnvParam::new("STRATA_MAX_HORIZON", "512");

/// Configuration of an encoder. The default values are read from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    pub max_horizon: usize,
    /// Maximal duration of a single solve call.
    pub timeout: Option<Duration>,
    /// Maximal amount of solver resource units spent in a single solve call.
    pub resource_limit: Option<u32>,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        let limits = Limits::default();
        EncoderConfig {
            max_horizon: MAX_HORIZON.get(),
            timeout: limits.timeout,
            resource_limit: limits.resource_limit,
        }
    }
}

impl EncoderConfig {
    /// Fails if a limit is set to a value that would make every solve call give up.
    pub fn validate(&self) -> Result<(), EncodingError> {
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(EncodingError::InvalidConfig("timeout must be positive".to_string()));
        }
        if self.resource_limit == Some(0) {
            return Err(EncodingError::InvalidConfig("resource limit must be positive".to_string()));
        }
        Ok(())
    }

    pub fn limits(&self) -> Limits {
        Limits {
            timeout: self.timeout,
            resource_limit: self.resource_limit,
        }
    }
}
