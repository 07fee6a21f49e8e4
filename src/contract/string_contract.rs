#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

use super::{Contract, MethodTable};
use crate::types::{ParamSpec, ValueType};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_INITIAL_VALUE: &str = "hello";

/// What `write_method` stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "lowercase")]
pub enum WritePolicy {
    /// Store the caller-supplied value.
    #[default]
    Adopt,
    /// Discard the caller-supplied value and store this literal instead.
    Pinned(String),
}

impl WritePolicy {
    #[must_use]
    pub const fn is_adopt(&self) -> bool {
        matches!(self, Self::Adopt)
    }
}

/// A contract holding one string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringContract {
    variable: String,
    #[serde(default, skip_serializing_if = "WritePolicy::is_adopt")]
    policy: WritePolicy,
}

impl StringContract {
    #[must_use]
    pub fn new() -> Self {
        Self::with_initial(DEFAULT_INITIAL_VALUE)
    }

    #[must_use]
    pub fn with_initial(initial: impl Into<String>) -> Self {
        Self {
            variable: initial.into(),
            policy: WritePolicy::Adopt,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: WritePolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> &WritePolicy {
        &self.policy
    }

    #[must_use]
    pub fn read_method(&self) -> &str {
        &self.variable
    }

    pub fn write_method(&mut self, new_value: impl Into<String>) {
        self.variable = match &self.policy {
            WritePolicy::Adopt => new_value.into(),
            WritePolicy::Pinned(literal) => literal.clone(),
        };
    }
}

impl Default for StringContract {
    fn default() -> Self {
        Self::new()
    }
}

impl Contract for StringContract {
    fn methods() -> MethodTable<Self> {
        MethodTable::new()
            .view(
                "read_method",
                vec![],
                ValueType::String,
                |contract: &Self, _| Ok(Value::String(contract.read_method().to_string())),
            )
            .write(
                "write_method",
                vec![ParamSpec::string("new_value")],
                ValueType::Unit,
                |contract: &mut Self, args| {
                    contract.write_method(args.string(0)?);
                    Ok(Value::Null)
                },
            )
    }
}
