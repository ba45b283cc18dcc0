// Configuration Management
//
// This crate builds the user service configuration from the process
// environment. It provides:
// - The field table (env key, type, default) for every section
// - Conversion of raw strings into integers, durations and lists
// - A one-shot loader that returns a complete snapshot or an error
//
// Consumers receive the sections they need by explicit parameter passing.

use thiserror::Error;

pub mod env;
pub mod loader;
pub mod schema;
pub mod types;
pub mod value;

pub use env::{EnvSource, NotUnicode, ProcessEnv};
pub use loader::{ConfigLoader, Resolved, ValueSource};
pub use types::*;
pub use value::{DurationError, ValueError};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key} ({section}): {reason}")]
    Conversion {
        section: &'static str,
        key: &'static str,
        value: String,
        #[source]
        reason: ValueError,
    },

    /// The typed layer asked for a field the schema does not declare with that kind.
    /// Loading with the built-in schema only ever fails with `Conversion`.
    #[error("Field {key} in section {section} is not declared as {expected}")]
    UndeclaredField {
        section: &'static str,
        key: &'static str,
        expected: &'static str,
    },
}

/// Main configuration loading interface
impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        ConfigLoader::from_process_env().load()
    }

    /// Load configuration from any environment source
    pub fn from_source<E: EnvSource>(env: E) -> Result<Self, ConfigError> {
        ConfigLoader::new(env).load()
    }
}
