mod identifiers;
mod schema;

pub use identifiers::{ContractAddress, ContractKind};
pub use schema::{ContractSchema, MethodSpec, ParamSpec, ValueType, Visibility};
