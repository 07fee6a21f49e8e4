pub mod config;
pub mod contract;
pub mod contracts;
pub mod error;
pub mod host;
pub mod protocol_envelope;
pub mod protocol_runtime;
pub mod storage;
pub mod types;

pub use config::{load_config, HostConfig};
pub use contract::{Contract, MethodArgs, MethodTable, StringContract, WritePolicy};
pub use error::{code, HostError, Result};
pub use host::{ContractHost, WriteReceipt};
pub use protocol_envelope::ProtocolEnvelope;
pub use protocol_runtime::{process_protocol_line, run_protocol_loop, ProtocolSummary};
pub use storage::{FileStore, MemoryStore, StateStore, StoredState};
pub use types::*;

/// Kind name under which the built-in string contract is registered.
pub const STRING_CONTRACT_KIND: &str = "string_contract";

/// Registers the built-in contract kinds using the configured initial value
/// and write policy.
///
/// # Errors
/// Returns `HostError::AlreadyRegistered` if the kinds are already present.
pub fn register_builtin_contracts<S: StateStore>(
    host: &mut ContractHost<S>,
    config: &HostConfig,
) -> Result<()> {
    let initial = config.initial_value.clone();
    let policy = config.write_policy.clone();
    host.register(STRING_CONTRACT_KIND, move || {
        StringContract::with_initial(initial.clone()).with_policy(policy.clone())
    })
}
