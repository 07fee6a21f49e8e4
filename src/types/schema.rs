use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Whether an externally callable method may mutate contract state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    View,
    Write,
}

impl Visibility {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::Write => "write",
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    String,
    Unit,
}

impl ValueType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Unit => "unit",
        }
    }

    #[must_use]
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Unit => value.is_null(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParamSpec {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub ty: ValueType,
}

impl ParamSpec {
    #[must_use]
    pub const fn string(name: &'static str) -> Self {
        Self {
            name,
            ty: ValueType::String,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodSpec {
    pub name: &'static str,
    pub visibility: Visibility,
    pub params: Vec<ParamSpec>,
    pub returns: ValueType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSchema {
    pub kind: String,
    pub methods: Vec<MethodSpec>,
}

impl ContractSchema {
    #[must_use]
    pub fn method(&self, name: &str) -> Option<&MethodSpec> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn methods_with(&self, visibility: Visibility) -> impl Iterator<Item = &MethodSpec> {
        self.methods.iter().filter(move |m| m.visibility == visibility)
    }
}
