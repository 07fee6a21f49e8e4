#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![forbid(unsafe_code)]

//! Contract interface: a contract declares its externally callable methods
//! as two disjoint sets. View handlers receive `&C` and cannot mutate state;
//! write handlers receive `&mut C`.

mod string_contract;

pub use string_contract::{StringContract, WritePolicy, DEFAULT_INITIAL_VALUE};

use crate::error::{HostError, Result};
use crate::types::{ContractKind, ContractSchema, MethodSpec, ParamSpec, ValueType, Visibility};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

const MAX_SUGGESTION_DISTANCE: usize = 3;

pub trait Contract: Serialize + DeserializeOwned + Send + Sync + 'static {
    fn methods() -> MethodTable<Self>;
}

type ViewHandler<C> = Box<dyn Fn(&C, &MethodArgs) -> Result<Value> + Send + Sync>;
type WriteHandler<C> = Box<dyn Fn(&mut C, &MethodArgs) -> Result<Value> + Send + Sync>;

struct Entry<H> {
    spec: MethodSpec,
    handler: H,
}

pub struct MethodTable<C> {
    views: Vec<Entry<ViewHandler<C>>>,
    writes: Vec<Entry<WriteHandler<C>>>,
}

impl<C> Default for MethodTable<C> {
    fn default() -> Self {
        Self {
            views: Vec::new(),
            writes: Vec::new(),
        }
    }
}

impl<C> MethodTable<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn view<F>(
        mut self,
        name: &'static str,
        params: Vec<ParamSpec>,
        returns: ValueType,
        handler: F,
    ) -> Self
    where
        F: Fn(&C, &MethodArgs) -> Result<Value> + Send + Sync + 'static,
    {
        self.views.push(Entry {
            spec: MethodSpec {
                name,
                visibility: Visibility::View,
                params,
                returns,
            },
            handler: Box::new(handler),
        });
        self
    }

    #[must_use]
    pub fn write<F>(
        mut self,
        name: &'static str,
        params: Vec<ParamSpec>,
        returns: ValueType,
        handler: F,
    ) -> Self
    where
        F: Fn(&mut C, &MethodArgs) -> Result<Value> + Send + Sync + 'static,
    {
        self.writes.push(Entry {
            spec: MethodSpec {
                name,
                visibility: Visibility::Write,
                params,
                returns,
            },
            handler: Box::new(handler),
        });
        self
    }

    fn specs(&self) -> impl Iterator<Item = &MethodSpec> {
        self.views
            .iter()
            .map(|e| &e.spec)
            .chain(self.writes.iter().map(|e| &e.spec))
    }

    /// Checks that every method name is non-empty and declared exactly once
    /// across both sets.
    ///
    /// # Errors
    /// Returns `HostError::DuplicateMethod` or `HostError::Config`.
    pub fn validate(&self, kind: &ContractKind) -> Result<()> {
        let mut seen: Vec<&str> = Vec::new();
        for spec in self.specs() {
            if spec.name.trim().is_empty() {
                return Err(HostError::Config(format!(
                    "{kind} declares a method with an empty name"
                )));
            }
            if seen.contains(&spec.name) {
                return Err(HostError::DuplicateMethod {
                    kind: kind.to_string(),
                    method: spec.name.to_string(),
                });
            }
            seen.push(spec.name);
        }
        Ok(())
    }

    #[must_use]
    pub fn schema(&self, kind: &ContractKind) -> ContractSchema {
        let mut methods: Vec<MethodSpec> = self.specs().cloned().collect();
        methods.sort_by(|a, b| a.name.cmp(b.name));
        ContractSchema {
            kind: kind.to_string(),
            methods,
        }
    }

    #[must_use]
    pub fn visibility_of(&self, name: &str) -> Option<Visibility> {
        self.specs()
            .find(|spec| spec.name == name)
            .map(|spec| spec.visibility)
    }

    #[must_use]
    pub fn suggest(&self, name: &str) -> Option<String> {
        self.specs()
            .map(|spec| (spec.name, strsim::levenshtein(name, spec.name)))
            .filter(|(_, dist)| *dist <= MAX_SUGGESTION_DISTANCE)
            .min_by_key(|(_, dist)| *dist)
            .map(|(candidate, _)| candidate.to_string())
    }

    fn resolve_error(&self, kind: &ContractKind, name: &str, requested: Visibility) -> HostError {
        match self.visibility_of(name) {
            Some(declared) => HostError::VisibilityMismatch {
                method: name.to_string(),
                declared: declared.as_str(),
                requested: requested.as_str(),
            },
            None => HostError::MethodNotFound {
                kind: kind.to_string(),
                method: name.to_string(),
                suggestion: self.suggest(name),
            },
        }
    }

    /// # Errors
    /// Returns an error when the method is unknown, is a write method, the
    /// arguments do not match its parameters, or the handler fails.
    pub fn invoke_view(
        &self,
        kind: &ContractKind,
        contract: &C,
        name: &str,
        raw_args: &Value,
    ) -> Result<Value> {
        let entry = self
            .views
            .iter()
            .find(|e| e.spec.name == name)
            .ok_or_else(|| self.resolve_error(kind, name, Visibility::View))?;
        let args = MethodArgs::bind(&entry.spec, raw_args)?;
        (entry.handler)(contract, &args)
    }

    /// # Errors
    /// Returns an error when the method is unknown, is a view method, the
    /// arguments do not match its parameters, or the handler fails.
    pub fn invoke_write(
        &self,
        kind: &ContractKind,
        contract: &mut C,
        name: &str,
        raw_args: &Value,
    ) -> Result<Value> {
        let entry = self
            .writes
            .iter()
            .find(|e| e.spec.name == name)
            .ok_or_else(|| self.resolve_error(kind, name, Visibility::Write))?;
        let args = MethodArgs::bind(&entry.spec, raw_args)?;
        (entry.handler)(contract, &args)
    }
}

/// Arguments bound to a method's declared parameters, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodArgs {
    method: &'static str,
    values: Vec<Value>,
}

impl MethodArgs {
    /// Accepts `null` (no arguments), a positional array, or an object keyed
    /// by parameter name.
    ///
    /// # Errors
    /// Returns `HostError::InvalidArguments` on arity, name or type mismatch.
    pub fn bind(spec: &MethodSpec, raw: &Value) -> Result<Self> {
        let invalid = |reason: String| HostError::InvalidArguments {
            method: spec.name.to_string(),
            reason,
        };

        let values = match raw {
            Value::Null => Vec::new(),
            Value::Array(items) => items.clone(),
            Value::Object(named) => {
                if let Some(extra) = named
                    .keys()
                    .find(|key| !spec.params.iter().any(|p| p.name == key.as_str()))
                {
                    return Err(invalid(format!("unexpected argument '{extra}'")));
                }
                spec.params
                    .iter()
                    .map(|param| {
                        named
                            .get(param.name)
                            .cloned()
                            .ok_or_else(|| invalid(format!("missing argument '{}'", param.name)))
                    })
                    .collect::<Result<Vec<_>>>()?
            }
            other => {
                return Err(invalid(format!(
                    "arguments must be an array or object, got {other}"
                )))
            }
        };

        if values.len() != spec.params.len() {
            return Err(invalid(format!(
                "expected {} argument(s), got {}",
                spec.params.len(),
                values.len()
            )));
        }

        if let Some((param, _)) = spec
            .params
            .iter()
            .zip(&values)
            .find(|(param, value)| !param.ty.accepts(value))
        {
            return Err(invalid(format!(
                "argument '{}' must be of type {}",
                param.name,
                param.ty.as_str()
            )));
        }

        Ok(Self {
            method: spec.name,
            values,
        })
    }

    /// # Errors
    /// Returns `HostError::InvalidArguments` if there is no string at `index`.
    pub fn string(&self, index: usize) -> Result<&str> {
        self.values
            .get(index)
            .and_then(Value::as_str)
            .ok_or_else(|| HostError::InvalidArguments {
                method: self.method.to_string(),
                reason: format!("no string argument at position {index}"),
            })
    }
}

/// Type-erased handle the host keeps for each deployed instance.
pub(crate) trait DeployedContract: Send + Sync {
    fn kind(&self) -> &ContractKind;
    fn call_view(&self, method: &str, args: &Value) -> Result<Value>;
    fn call_write(&mut self, method: &str, args: &Value) -> Result<Value>;
    fn snapshot(&self) -> Result<Value>;
}

pub(crate) struct Instance<C> {
    kind: ContractKind,
    contract: C,
    table: Arc<MethodTable<C>>,
}

impl<C: Contract> Instance<C> {
    pub(crate) const fn new(kind: ContractKind, contract: C, table: Arc<MethodTable<C>>) -> Self {
        Self {
            kind,
            contract,
            table,
        }
    }

    pub(crate) fn restore(
        kind: ContractKind,
        state: Value,
        table: Arc<MethodTable<C>>,
    ) -> Result<Self> {
        let contract = serde_json::from_value(state)?;
        Ok(Self::new(kind, contract, table))
    }
}

impl<C: Contract> DeployedContract for Instance<C> {
    fn kind(&self) -> &ContractKind {
        &self.kind
    }

    fn call_view(&self, method: &str, args: &Value) -> Result<Value> {
        self.table
            .invoke_view(&self.kind, &self.contract, method, args)
    }

    fn call_write(&mut self, method: &str, args: &Value) -> Result<Value> {
        self.table
            .invoke_write(&self.kind, &mut self.contract, method, args)
    }

    fn snapshot(&self) -> Result<Value> {
        Ok(serde_json::to_value(&self.contract)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Counter {
        count: u64,
    }

    impl Contract for Counter {
        fn methods() -> MethodTable<Self> {
            MethodTable::new()
                .view("get_count", vec![], ValueType::String, |c: &Self, _| {
                    Ok(Value::String(c.count.to_string()))
                })
                .write("increment", vec![], ValueType::Unit, |c: &mut Self, _| {
                    c.count += 1;
                    Ok(Value::Null)
                })
        }
    }

    fn counter_kind() -> ContractKind {
        ContractKind::new("counter")
    }

    #[test]
    fn given_write_method_when_invoked_as_view_then_visibility_mismatch() {
        let table = Counter::methods();
        let counter = Counter::default();

        let result = table.invoke_view(&counter_kind(), &counter, "increment", &Value::Null);

        assert!(matches!(
            result,
            Err(HostError::VisibilityMismatch {
                declared: "write",
                requested: "view",
                ..
            })
        ));
    }

    #[test]
    fn given_view_method_when_invoked_as_write_then_visibility_mismatch() {
        let table = Counter::methods();
        let mut counter = Counter::default();

        let result = table.invoke_write(&counter_kind(), &mut counter, "get_count", &Value::Null);

        assert!(matches!(result, Err(HostError::VisibilityMismatch { .. })));
        assert_eq!(counter.count, 0);
    }

    #[test]
    fn given_typo_when_invoked_then_not_found_carries_suggestion() {
        let table = Counter::methods();
        let counter = Counter::default();

        let result = table.invoke_view(&counter_kind(), &counter, "get_cont", &Value::Null);

        match result {
            Err(HostError::MethodNotFound { suggestion, .. }) => {
                assert_eq!(suggestion.as_deref(), Some("get_count"));
            }
            other => unreachable!("expected MethodNotFound, got {other:?}"),
        }
    }

    #[test]
    fn given_unrelated_name_then_no_suggestion() {
        assert_eq!(Counter::methods().suggest("completely_different"), None);
    }

    #[test]
    fn given_same_name_in_both_sets_then_validate_rejects() {
        let table: MethodTable<Counter> = MethodTable::new()
            .view("value", vec![], ValueType::String, |_, _| Ok(Value::Null))
            .write("value", vec![], ValueType::Unit, |_, _| Ok(Value::Null));

        assert!(matches!(
            table.validate(&counter_kind()),
            Err(HostError::DuplicateMethod { .. })
        ));
    }

    #[test]
    fn schema_lists_methods_sorted_by_name() {
        let schema = Counter::methods().schema(&counter_kind());
        let names: Vec<&str> = schema.methods.iter().map(|m| m.name).collect();

        assert_eq!(names, vec!["get_count", "increment"]);
        assert_eq!(schema.methods_with(Visibility::View).count(), 1);
    }

    #[test]
    fn bind_accepts_named_and_positional_arguments() {
        let spec = MethodSpec {
            name: "set",
            visibility: Visibility::Write,
            params: vec![ParamSpec::string("new_value")],
            returns: ValueType::Unit,
        };

        let positional = MethodArgs::bind(&spec, &json!(["x"]));
        let named = MethodArgs::bind(&spec, &json!({"new_value": "x"}));

        assert_eq!(positional.as_ref().ok().and_then(|a| a.string(0).ok()), Some("x"));
        assert_eq!(positional.ok(), named.ok());
    }

    #[test]
    fn bind_rejects_wrong_arity_type_and_unknown_names() {
        let spec = MethodSpec {
            name: "set",
            visibility: Visibility::Write,
            params: vec![ParamSpec::string("new_value")],
            returns: ValueType::Unit,
        };

        for raw in [
            Value::Null,
            json!(["a", "b"]),
            json!([42]),
            json!({"other": "x"}),
            json!({}),
            json!("bare"),
        ] {
            assert!(
                matches!(
                    MethodArgs::bind(&spec, &raw),
                    Err(HostError::InvalidArguments { .. })
                ),
                "expected rejection for {raw}"
            );
        }
    }
}
