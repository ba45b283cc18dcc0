use std::collections::HashMap;
use std::env::VarError;
use thiserror::Error;

/// A variable that is set but whose value is not valid unicode.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("environment value is not valid unicode")]
pub struct NotUnicode {
    /// The value with invalid sequences replaced by U+FFFD.
    pub lossy: String,
}

/// Read-only view of environment variables.
pub trait EnvSource {
    /// Value of `key`, `Ok(None)` when the variable is unset.
    fn var(&self, key: &str) -> Result<Option<String>, NotUnicode>;
}

/// The live process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Result<Option<String>, NotUnicode> {
        match std::env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(VarError::NotPresent) => Ok(None),
            Err(VarError::NotUnicode(raw)) => Err(NotUnicode {
                lossy: raw.to_string_lossy().into_owned(),
            }),
        }
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Result<Option<String>, NotUnicode> {
        Ok(self.get(key).cloned())
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Result<Option<String>, NotUnicode> {
        Ok(self.get(key).map(|v| v.to_string()))
    }
}

impl<E: EnvSource + ?Sized> EnvSource for &E {
    fn var(&self, key: &str) -> Result<Option<String>, NotUnicode> {
        (**self).var(key)
    }
}
