#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unnecessary_box_returns)]

use crate::contracts::{
    BatchOutput, CallInput, CommandHelp, ContractsOutput, DeployInput, DeployOutput, ErrorHelp,
    HelpOutput, KindsOutput, SchemaInput, StateInput, ViewOutput, WriteOutput,
};
use crate::error::{code, HostError, ERROR_CODES};
use crate::host::ContractHost;
use crate::protocol_envelope::ProtocolEnvelope;
use crate::storage::StateStore;
use crate::types::ContractAddress;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, warn};

const MAX_COMMAND_SUGGESTION_DISTANCE: usize = 3;

const COMMANDS: &[(&str, &str)] = &[
    ("kinds", "List registered contract kinds with their schemas"),
    ("schema", "Show the method schema of one kind"),
    ("deploy", "Deploy a new instance of a kind"),
    ("view", "Call a view method"),
    ("write", "Call a write method"),
    ("state", "Show the stored record of an instance"),
    ("contracts", "List deployed instance addresses"),
    ("batch", "Execute multiple commands in order"),
    ("?", "This help"),
];

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProtocolRequest {
    pub cmd: String,
    pub rid: Option<String>,
    #[serde(flatten)]
    pub args: Map<String, Value>,
}

// ============================================================================
// PARSE INPUT TRAIT
// ============================================================================

pub trait ParseInput: Sized {
    /// # Errors
    /// Returns a `ParseError` describing the first invalid or missing field.
    fn parse_input(request: &ProtocolRequest) -> Result<Self, ParseError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid type for field {field}: expected {expected}, got {got}")]
    InvalidType {
        field: String,
        expected: String,
        got: String,
    },

    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: String },
}

impl ParseInput for SchemaInput {
    fn parse_input(request: &ProtocolRequest) -> Result<Self, ParseError> {
        Ok(Self {
            kind: required_string_arg(request, "kind")?,
        })
    }
}

impl ParseInput for DeployInput {
    fn parse_input(request: &ProtocolRequest) -> Result<Self, ParseError> {
        Ok(Self {
            kind: required_string_arg(request, "kind")?,
        })
    }
}

impl ParseInput for CallInput {
    fn parse_input(request: &ProtocolRequest) -> Result<Self, ParseError> {
        Ok(Self {
            address: required_address_arg(request)?,
            method: required_string_arg(request, "method")?,
            args: request.args.get("args").cloned().unwrap_or(Value::Null),
        })
    }
}

impl ParseInput for StateInput {
    fn parse_input(request: &ProtocolRequest) -> Result<Self, ParseError> {
        Ok(Self {
            address: required_address_arg(request)?,
        })
    }
}

fn required_string_arg(request: &ProtocolRequest, field: &str) -> Result<String, ParseError> {
    let raw = request
        .args
        .get(field)
        .ok_or_else(|| ParseError::MissingField {
            field: field.to_string(),
        })?;

    raw.as_str()
        .map(ToString::to_string)
        .ok_or_else(|| ParseError::InvalidType {
            field: field.to_string(),
            expected: "string".to_string(),
            got: json_value_type_name(raw).to_string(),
        })
}

fn required_address_arg(request: &ProtocolRequest) -> Result<ContractAddress, ParseError> {
    let raw = required_string_arg(request, "address")?;
    ContractAddress::parse(&raw).map_err(|value| ParseError::InvalidValue {
        field: "address".to_string(),
        value,
    })
}

const fn json_value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// LOOP
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProtocolSummary {
    pub processed: usize,
    pub failed: usize,
}

impl ProtocolSummary {
    #[must_use]
    pub const fn all_ok(&self) -> bool {
        self.failed == 0
    }
}

/// Reads one JSON request per line and writes one envelope per line. Every
/// line is processed even after failures.
///
/// # Errors
/// Returns `HostError::Io` if reading input or writing output fails.
pub async fn run_protocol_loop<S, R, W>(
    host: &ContractHost<S>,
    reader: R,
    writer: &mut W,
) -> Result<ProtocolSummary, HostError>
where
    S: StateStore,
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut summary = ProtocolSummary::default();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let envelope = process_protocol_line(host, &line).await;
        summary.processed += 1;
        if !envelope.ok {
            summary.failed += 1;
        }
        write_envelope(writer, &envelope).await?;
    }

    if summary.processed == 0 {
        let envelope = ProtocolEnvelope::error(
            None,
            code::INVALID.to_string(),
            "No input received on stdin".to_string(),
        )
        .with_fix(
            "Provide one JSON command per line. Example: echo '{\"cmd\":\"kinds\"}' | chost"
                .to_string(),
        )
        .with_ctx(json!({"stdin": "empty"}))
        .with_ms(0);
        summary.failed += 1;
        write_envelope(writer, &envelope).await?;
    }

    Ok(summary)
}

async fn write_envelope<W: AsyncWrite + Unpin>(
    writer: &mut W,
    envelope: &ProtocolEnvelope,
) -> Result<(), HostError> {
    let response_text = serde_json::to_string(envelope)?;
    writer.write_all(response_text.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

fn parse_rid(line: &str) -> Option<String> {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|value| value.get("rid").and_then(Value::as_str).map(ToString::to_string))
}

fn elapsed_ms(started: Instant) -> i64 {
    i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX)
}

pub async fn process_protocol_line<S: StateStore>(
    host: &ContractHost<S>,
    line: &str,
) -> ProtocolEnvelope {
    let started = Instant::now();

    let envelope = match serde_json::from_str::<ProtocolRequest>(line) {
        Ok(request) => {
            let result = execute_request(host, &request).await;
            debug!("Processed '{}' ok={}", request.cmd, result.is_ok());
            match result {
                Ok(data) => ProtocolEnvelope::success(request.rid.clone(), data),
                Err(failure) => *failure,
            }
        }
        Err(err) => ProtocolEnvelope::error(
            parse_rid(line),
            code::INVALID.to_string(),
            format!("Invalid request JSON: {err}"),
        )
        .with_fix(
            "Ensure request is valid JSON with a 'cmd' field. Example: echo '{\"cmd\":\"kinds\"}' | chost"
                .to_string(),
        )
        .with_ctx(json!({"line": line})),
    };

    envelope.with_ms(elapsed_ms(started))
}

type HandlerResult = std::result::Result<Value, Box<ProtocolEnvelope>>;

async fn execute_request<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    match request.cmd.as_str() {
        "batch" => handle_batch(host, request).await,
        _ => execute_request_no_batch(host, request).await,
    }
}

async fn execute_request_no_batch<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    validate_request_args(request)?;

    match request.cmd.as_str() {
        "?" | "help" => handle_help(request),
        "kinds" => handle_kinds(host, request),
        "schema" => handle_schema(host, request),
        "deploy" => handle_deploy(host, request).await,
        "view" => handle_view(host, request).await,
        "write" => handle_write(host, request).await,
        "state" => handle_state(host, request).await,
        "contracts" => handle_contracts(host, request).await,
        other => {
            let envelope = ProtocolEnvelope::error(
                request.rid.clone(),
                code::INVALID.to_string(),
                format!("Unknown command: {other}"),
            );
            let fix = suggest_command(other).map_or_else(
                || {
                    format!(
                        "Use a valid command: {}",
                        COMMANDS.iter().map(|(cmd, _)| *cmd).join(", ")
                    )
                },
                |suggestion| format!("Did you mean '{suggestion}'?"),
            );
            Err(Box::new(
                envelope.with_fix(fix).with_ctx(json!({"cmd": other})),
            ))
        }
    }
}

#[must_use]
pub fn suggest_command(typo: &str) -> Option<&'static str> {
    COMMANDS
        .iter()
        .map(|(cmd, _)| (*cmd, strsim::levenshtein(typo, cmd)))
        .filter(|(_, dist)| *dist <= MAX_COMMAND_SUGGESTION_DISTANCE)
        .min_by_key(|(_, dist)| *dist)
        .map(|(cmd, _)| cmd)
}

fn allowed_command_args(cmd: &str) -> Option<&'static [&'static str]> {
    match cmd {
        "?" | "help" | "kinds" | "contracts" => Some(&[]),
        "schema" | "deploy" => Some(&["kind"]),
        "view" | "write" => Some(&["address", "method", "args"]),
        "state" => Some(&["address"]),
        "batch" => Some(&["ops"]),
        _ => None,
    }
}

fn validate_request_args(request: &ProtocolRequest) -> std::result::Result<(), Box<ProtocolEnvelope>> {
    let Some(allowed) = allowed_command_args(request.cmd.as_str()) else {
        return Ok(());
    };
    let unknown = request
        .args
        .keys()
        .filter(|key| !allowed.contains(&key.as_str()))
        .cloned()
        .collect::<Vec<_>>();

    if unknown.is_empty() {
        return Ok(());
    }

    Err(Box::new(
        ProtocolEnvelope::error(
            request.rid.clone(),
            code::INVALID.to_string(),
            format!(
                "Unknown field(s) for {}: {}",
                request.cmd,
                unknown.join(", ")
            ),
        )
        .with_fix("Remove unknown fields or use documented command arguments".to_string())
        .with_ctx(json!({"cmd": request.cmd, "unknown": unknown, "allowed": allowed})),
    ))
}

fn parse_failure(request: &ProtocolRequest, err: ParseError) -> Box<ProtocolEnvelope> {
    let fields = allowed_command_args(request.cmd.as_str()).unwrap_or(&[]);
    Box::new(
        ProtocolEnvelope::error(request.rid.clone(), code::INVALID.to_string(), err.to_string())
            .with_fix(format!(
                "'{}' accepts: {}",
                request.cmd,
                fields.iter().join(", ")
            ))
            .with_ctx(json!({"cmd": request.cmd})),
    )
}

fn host_failure(request: &ProtocolRequest, err: HostError) -> Box<ProtocolEnvelope> {
    warn!("'{}' failed: {}", request.cmd, err);
    Box::new(
        ProtocolEnvelope::from_host_error(request.rid.clone(), &err)
            .with_ctx(json!({"cmd": request.cmd})),
    )
}

fn to_data<T: Serialize>(request: &ProtocolRequest, output: &T) -> HandlerResult {
    serde_json::to_value(output).map_err(|err| host_failure(request, HostError::from(err)))
}

fn parse<T: ParseInput>(request: &ProtocolRequest) -> std::result::Result<T, Box<ProtocolEnvelope>> {
    T::parse_input(request).map_err(|err| parse_failure(request, err))
}

// ============================================================================
// HANDLERS
// ============================================================================

fn handle_help(request: &ProtocolRequest) -> HandlerResult {
    to_data(
        request,
        &HelpOutput {
            n: "chost",
            v: env!("CARGO_PKG_VERSION"),
            cmds: COMMANDS
                .iter()
                .map(|(cmd, desc)| CommandHelp(*cmd, *desc))
                .collect(),
            errs: ERROR_CODES
                .iter()
                .map(|(err_code, desc, fix)| ErrorHelp(*err_code, *desc, *fix))
                .collect(),
        },
    )
}

fn handle_kinds<S: StateStore>(host: &ContractHost<S>, request: &ProtocolRequest) -> HandlerResult {
    let kinds = host.kinds();
    let total = kinds.len();
    to_data(request, &KindsOutput { kinds, total })
}

fn handle_schema<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    let input: SchemaInput = parse(request)?;
    let schema = host
        .schema(&input.kind)
        .map_err(|err| host_failure(request, err))?;
    to_data(request, schema)
}

async fn handle_deploy<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    let input: DeployInput = parse(request)?;
    let address = host
        .deploy(&input.kind)
        .await
        .map_err(|err| host_failure(request, err))?;
    to_data(
        request,
        &DeployOutput {
            address,
            kind: input.kind,
            version: 0,
        },
    )
}

async fn handle_view<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    let input: CallInput = parse(request)?;
    let result = host
        .call_view(&input.address, &input.method, &input.args)
        .await
        .map_err(|err| host_failure(request, err))?;
    to_data(
        request,
        &ViewOutput {
            address: input.address,
            method: input.method,
            result,
        },
    )
}

async fn handle_write<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    let input: CallInput = parse(request)?;
    let receipt = host
        .call_write(&input.address, &input.method, &input.args)
        .await
        .map_err(|err| host_failure(request, err))?;
    to_data(
        request,
        &WriteOutput {
            address: input.address,
            method: input.method,
            result: receipt.result,
            version: receipt.version,
        },
    )
}

async fn handle_state<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    let input: StateInput = parse(request)?;
    let record = host
        .snapshot(&input.address)
        .await
        .map_err(|err| host_failure(request, err))?;
    to_data(request, &record)
}

async fn handle_contracts<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    let contracts = host
        .instances()
        .await
        .map_err(|err| host_failure(request, err))?;
    let total = contracts.len();
    to_data(request, &ContractsOutput { contracts, total })
}

async fn handle_batch<S: StateStore>(
    host: &ContractHost<S>,
    request: &ProtocolRequest,
) -> HandlerResult {
    validate_request_args(request)?;
    let ops = request
        .args
        .get("ops")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Box::new(
                ProtocolEnvelope::error(
                    request.rid.clone(),
                    code::INVALID.to_string(),
                    "Missing ops array".to_string(),
                )
                .with_fix(
                    "Add 'ops' array to batch request. Example: {\"cmd\":\"batch\",\"ops\":[{\"cmd\":\"kinds\"}]}"
                        .to_string(),
                )
                .with_ctx(json!({"ops": "required"})),
            )
        })?;

    let mut output = BatchOutput {
        items: Vec::with_capacity(ops.len()),
        pass: 0,
        fail: 0,
    };

    for (idx, op) in ops.iter().enumerate() {
        let outcome = match serde_json::from_value::<ProtocolRequest>(op.clone()) {
            Err(err) => Err(Box::new(
                ProtocolEnvelope::error(
                    request.rid.clone(),
                    code::INVALID.to_string(),
                    format!("Invalid batch item {idx}: {err}"),
                )
                .with_ctx(json!({"index": idx})),
            )),
            Ok(sub_request) if sub_request.cmd == "batch" => Err(Box::new(
                ProtocolEnvelope::error(
                    request.rid.clone(),
                    code::INVALID.to_string(),
                    "Nested batch is not supported".to_string(),
                )
                .with_fix("Split nested batch into top-level ops".to_string())
                .with_ctx(json!({"index": idx})),
            )),
            Ok(sub_request) => execute_request_no_batch(host, &sub_request)
                .await
                .map(|data| (sub_request.cmd, data)),
        };

        let item = match outcome {
            Ok((cmd, data)) => {
                output.pass += 1;
                json!({"i": idx, "cmd": cmd, "ok": true, "d": data})
            }
            Err(failure) => {
                output.fail += 1;
                json!({
                    "i": idx,
                    "cmd": op.get("cmd").cloned().unwrap_or(Value::Null),
                    "ok": false,
                    "err": failure.err,
                })
            }
        };
        output.items.push(item);
    }

    to_data(request, &output)
}

#[cfg(test)]
mod tests;
