use serde::{Deserialize, Serialize};
use std::fmt;

/// A value that is either a literal embedded in configuration or read from
/// an environment variable, with the literal as fallback.
///
/// Resolution happens once, at `Register` time (see [`crate::settings`]);
/// nothing downstream of that point calls `std::env::var` directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvString {
    pub variable: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnvStringError(pub String);

impl fmt::Display for EnvStringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for EnvStringError {}

impl EnvString {
    pub fn literal(value: impl Into<String>) -> Self {
        Self {
            variable: None,
            value: Some(value.into()),
        }
    }

    pub fn env(variable: impl Into<String>) -> Self {
        Self {
            variable: Some(variable.into()),
            value: None,
        }
    }

    /// Resolve to a concrete string: read `variable` from the environment
    /// if set, falling back to the embedded `value`. An unset variable with
    /// no fallback value is an error.
    pub fn resolve(&self) -> Result<String, EnvStringError> {
        if let Some(variable) = &self.variable
            && let Ok(resolved) = std::env::var(variable)
        {
            return Ok(resolved);
        }
        if let Some(value) = &self.value {
            return Ok(value.clone());
        }
        match &self.variable {
            Some(variable) => Err(EnvStringError(format!(
                "environment variable {variable} is not set and no fallback value was configured"
            ))),
            None => Err(EnvStringError(
                "EnvString has neither a variable nor a value".to_string(),
            )),
        }
    }
}
