// Input Contracts - What each protocol command accepts
// Output Contracts - What each protocol command returns

use crate::types::{ContractAddress, ContractSchema};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// HELP COMMAND
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HelpOutput {
    pub n: &'static str,
    pub v: &'static str,
    pub cmds: Vec<CommandHelp>,
    pub errs: Vec<ErrorHelp>,
}

#[derive(Debug, Serialize)]
pub struct CommandHelp(pub &'static str, pub &'static str); // (cmd, desc)

#[derive(Debug, Serialize)]
pub struct ErrorHelp(pub &'static str, pub &'static str, pub &'static str); // (code, desc, fix)

// ============================================================================
// KINDS / SCHEMA COMMANDS
// ============================================================================

#[derive(Debug, Serialize)]
pub struct KindsOutput<'a> {
    pub kinds: Vec<&'a ContractSchema>,
    pub total: usize,
}

#[derive(Debug, Deserialize)]
pub struct SchemaInput {
    pub kind: String,
}

// ============================================================================
// DEPLOY COMMAND
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct DeployInput {
    pub kind: String,
}

#[derive(Debug, Serialize)]
pub struct DeployOutput {
    pub address: ContractAddress,
    pub kind: String,
    pub version: u64,
}

// ============================================================================
// VIEW / WRITE COMMANDS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CallInput {
    pub address: ContractAddress,
    pub method: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Serialize)]
pub struct ViewOutput {
    pub address: ContractAddress,
    pub method: String,
    pub result: Value,
}

#[derive(Debug, Serialize)]
pub struct WriteOutput {
    pub address: ContractAddress,
    pub method: String,
    pub result: Value,
    pub version: u64,
}

// ============================================================================
// STATE / CONTRACTS COMMANDS
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StateInput {
    pub address: ContractAddress,
}

#[derive(Debug, Serialize)]
pub struct ContractsOutput {
    pub contracts: Vec<ContractAddress>,
    pub total: usize,
}

// ============================================================================
// BATCH COMMAND
// ============================================================================

#[derive(Debug, Serialize)]
pub struct BatchOutput {
    pub items: Vec<Value>,
    pub pass: usize,
    pub fail: usize,
}
