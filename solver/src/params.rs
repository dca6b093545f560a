//! Global parameters that can be set from environment variables.
//!
//! An [`EnvParam`] holds the name of an environment variable and a string representing its default value.
//! It is read once, on first access.
//!
//! ```
//! use strata::params::EnvParam;
//! static MY_PARAM: EnvParam<u32> = EnvParam::new("STRATA_DOC_PARAM", "0");
//!
//! // environment variable not set, using default value "0"
//! assert_eq!(MY_PARAM.get(), 0);
//! ```

use once_cell::sync::OnceCell;
use std::str::FromStr;
use std::time::Duration;

pub struct EnvParam<T> {
    value: OnceCell<T>,
    env: &'static str,
    default: &'static str,
}

impl<T> EnvParam<T> {
    /// Creates a new parameter that will be initialized from the environment variable `env` or set
    /// `default` if the environment variable is not set.
    pub const fn new(env: &'static str, default: &'static str) -> EnvParam<T> {
        EnvParam {
            value: OnceCell::new(),
            env,
            default,
        }
    }

    pub fn name(&self) -> &'static str {
        self.env
    }
}

impl<T: FromStr> EnvParam<T> {
    fn read_default(&self) -> T {
        match T::from_str(self.default) {
            Ok(v) => v,
            Err(_) => panic!("[env_param] {}: invalid default value \"{}\".", self.env, self.default),
        }
    }

    /// Returns the value of the parameter. On the first call, the value will be read from
    /// the declared environment variable. If it is not set or has an invalid value, the
    /// default value will be used.
    ///
    /// # Panic
    /// The method will panic if the parameter cannot be parsed from the default value.
    pub fn get(&self) -> T
    where
        T: Copy,
    {
        *self.get_ref()
    }

    pub fn get_ref(&self) -> &T {
        let read = || match std::env::var(self.env) {
            Ok(param) => match T::from_str(&param) {
                Ok(value) => value,
                Err(_) => {
                    tracing::warn!(
                        "could not parse the value \"{}\" for environment variable \"{}\". Using default: \"{}\"",
                        &param,
                        self.env,
                        self.default
                    );
                    self.read_default()
                }
            },
            Err(std::env::VarError::NotPresent) => self.read_default(),
            Err(err) => {
                tracing::warn!("{}: {}. Using default: \"{}\"", self.env, err, self.default);
                self.read_default()
            }
        };
        self.value.get_or_init(read)
    }
}

/// Maximal time of a single solve call, in milliseconds (0 for no limit).
pub static TIMEOUT_MS: EnvParam<u64> = EnvParam::new("STRATA_TIMEOUT_MS", "0");

/// Maximal amount of z3 resource units (`rlimit`) spent in a single solve call (0 for no limit).
pub static RESOURCE_LIMIT: EnvParam<u32> = EnvParam::new("STRATA_RESOURCE_LIMIT", "0");

/// Resources allowed for a single solve call.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Limits {
    pub timeout: Option<Duration>,
    pub resource_limit: Option<u32>,
}

impl Limits {
    pub fn unlimited() -> Self {
        Limits {
            timeout: None,
            resource_limit: None,
        }
    }
}

impl Default for Limits {
    fn default() -> Self {
        let timeout = TIMEOUT_MS.get();
        let resources = RESOURCE_LIMIT.get();
        Limits {
            timeout: (timeout > 0).then(|| Duration::from_millis(timeout)),
            resource_limit: (resources > 0).then_some(resources),
        }
    }
}
