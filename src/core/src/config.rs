use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, StagefileError};

/// Options that accompany Dockerfile content through the frontend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DockerfileOptions {
    /// Target stage name. Empty selects the last stage.
    pub target: String,

    /// Build-time arguments, passed through unresolved
    pub build_args: Vec<BuildArg>,
}

impl DockerfileOptions {
    /// Options selecting the named target stage.
    pub fn with_target(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Load options from a YAML document.
    ///
    /// ```yaml
    /// target: release
    /// build_args:
    ///   - key: VERSION
    ///     value: "1.2"
    ///   - key: HTTP_PROXY
    /// ```
    pub fn from_yaml(content: &str) -> Result<Self> {
        let options: Self = serde_yaml::from_str(content)?;
        for arg in &options.build_args {
            if arg.key.is_empty() {
                return Err(StagefileError::Config(
                    "build arg with empty name".to_string(),
                ));
            }
        }
        Ok(options)
    }

    /// Look up the value supplied for a build argument.
    ///
    /// Later entries override earlier ones with the same key.
    pub fn build_arg(&self, key: &str) -> Option<&str> {
        self.build_args
            .iter()
            .rev()
            .find(|arg| arg.key == key)
            .and_then(|arg| arg.value.as_deref())
    }
}

/// A `KEY` or `KEY=VALUE` build argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArg {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl BuildArg {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

impl fmt::Display for BuildArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{}={}", self.key, value),
            None => write!(f, "{}", self.key),
        }
    }
}

impl FromStr for BuildArg {
    type Err = StagefileError;

    fn from_str(s: &str) -> Result<Self> {
        let (key, value) = match s.split_once('=') {
            Some((key, value)) => (key, Some(value.to_string())),
            None => (s, None),
        };
        if key.is_empty() {
            return Err(StagefileError::Config(format!(
                "Invalid build arg (expected KEY[=VALUE]): {s}"
            )));
        }
        Ok(Self::new(key, value))
    }
}
