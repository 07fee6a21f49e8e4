#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use crate::contract::{WritePolicy, DEFAULT_INITIAL_VALUE};
use crate::error::{HostError, Result};
use std::path::PathBuf;

pub const DEFAULT_CONFIG_PATH: &str = ".contract-host/config.toml";
pub const DEFAULT_LOG_FILTER: &str = "warn";

pub const STATE_DIR_ENV: &str = "CONTRACT_HOST_STATE_DIR";
pub const INITIAL_VALUE_ENV: &str = "CONTRACT_HOST_INITIAL_VALUE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostConfig {
    /// Directory for `FileStore`; in-memory storage when absent.
    pub state_dir: Option<PathBuf>,
    pub initial_value: String,
    pub write_policy: WritePolicy,
    pub log_filter: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            state_dir: None,
            initial_value: DEFAULT_INITIAL_VALUE.to_string(),
            write_policy: WritePolicy::Adopt,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

/// Loads the config file (if present) and applies environment overrides.
///
/// # Errors
/// Returns `HostError::Config` if the file cannot be read or holds an
/// invalid `write_policy`.
pub async fn load_config(path: Option<PathBuf>) -> Result<HostConfig> {
    let config_path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = if tokio::fs::try_exists(&config_path).await.unwrap_or(false) {
        let content = tokio::fs::read_to_string(&config_path)
            .await
            .map_err(|e| {
                HostError::Config(format!(
                    "Failed to read config {}: {e}",
                    config_path.display()
                ))
            })?;
        parse_config_content(&content)?
    } else {
        HostConfig::default()
    };

    Ok(apply_env_overrides(config, non_empty_env_var))
}

/// Parses `key = value` lines. Blank lines and `#` comments are skipped and
/// `${VAR:-default}` is expanded in values.
///
/// # Errors
/// Returns `HostError::Config` for an unknown `write_policy` or a `pinned`
/// policy without `pinned_value`.
pub fn parse_config_content(content: &str) -> Result<HostConfig> {
    let mut config = HostConfig::default();
    let mut policy_mode = None;
    let mut pinned_value = None;

    for line in content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
    {
        if let Some(value) = parse_key_value(line, "state_dir") {
            let expanded = expand_env_vars(value);
            config.state_dir = (!expanded.is_empty()).then(|| PathBuf::from(expanded));
        }
        if let Some(value) = parse_key_value(line, "initial_value") {
            config.initial_value = expand_env_vars(value);
        }
        if let Some(value) = parse_key_value(line, "write_policy") {
            policy_mode = Some(value.to_ascii_lowercase());
        }
        if let Some(value) = parse_key_value(line, "pinned_value") {
            pinned_value = Some(expand_env_vars(value));
        }
        if let Some(value) = parse_key_value(line, "log_filter") {
            config.log_filter = value.to_string();
        }
    }

    config.write_policy = match (policy_mode.as_deref(), pinned_value) {
        (None | Some("adopt"), _) => WritePolicy::Adopt,
        (Some("pinned"), Some(literal)) => WritePolicy::Pinned(literal),
        (Some("pinned"), None) => {
            return Err(HostError::Config(
                "write_policy = \"pinned\" requires pinned_value".to_string(),
            ))
        }
        (Some(other), _) => {
            return Err(HostError::Config(format!(
                "Unknown write_policy '{other}'; expected adopt or pinned"
            )))
        }
    };

    Ok(config)
}

pub fn apply_env_overrides(
    mut config: HostConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> HostConfig {
    if let Some(dir) = lookup(STATE_DIR_ENV) {
        config.state_dir = Some(PathBuf::from(dir));
    }
    if let Some(initial) = lookup(INITIAL_VALUE_ENV) {
        config.initial_value = initial;
    }
    config
}

fn non_empty_env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn expand_env_vars(input: &str) -> String {
    let mut result = input.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_part = &result[start + 2..start + end];
            let (var_name, default) = var_part.split_once(":-").unwrap_or((var_part, ""));
            let value = std::env::var(var_name).unwrap_or_else(|_| default.to_string());
            result.replace_range(start..=(start + end), &value);
        } else {
            break;
        }
    }
    result
}

#[must_use]
pub fn parse_key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    line.split_once('=')
        .and_then(|(lhs, rhs)| (lhs.trim() == key).then_some(rhs.trim().trim_matches('"')))
}
