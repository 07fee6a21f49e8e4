#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]

use super::{
    process_protocol_line, run_protocol_loop, suggest_command, CallInput, ParseError, ParseInput,
    ProtocolRequest,
};
use crate::contract::StringContract;
use crate::error::code;
use crate::host::ContractHost;
use crate::storage::MemoryStore;
use serde_json::{json, Map, Value};

fn make_request(cmd: &str, args: Map<String, Value>) -> ProtocolRequest {
    ProtocolRequest {
        cmd: cmd.to_string(),
        rid: None,
        args,
    }
}

fn string_host() -> ContractHost<MemoryStore> {
    let mut host = ContractHost::new(MemoryStore::new());
    host.register("string_contract", StringContract::new)
        .expect("register string_contract");
    host
}

async fn envelope_json(host: &ContractHost<MemoryStore>, line: &str) -> Value {
    let envelope = process_protocol_line(host, line).await;
    serde_json::to_value(&envelope).expect("envelope serializes")
}

async fn deploy(host: &ContractHost<MemoryStore>) -> String {
    let json = envelope_json(host, r#"{"cmd":"deploy","kind":"string_contract"}"#).await;
    assert_eq!(json["ok"], true, "deploy failed: {json}");
    json["d"]["address"]
        .as_str()
        .expect("address is a string")
        .to_string()
}

#[test]
fn given_call_request_without_address_when_parsed_then_missing_field() {
    let mut args = Map::new();
    args.insert("method".to_string(), json!("read_method"));

    let result = CallInput::parse_input(&make_request("view", args));

    assert!(matches!(result, Err(ParseError::MissingField { field }) if field == "address"));
}

#[test]
fn given_numeric_method_when_parsed_then_invalid_type() {
    let mut args = Map::new();
    args.insert(
        "address".to_string(),
        json!("abcdef0123456789abcdef0123456789abcdef01"),
    );
    args.insert("method".to_string(), json!(7));

    let result = CallInput::parse_input(&make_request("view", args));

    assert!(matches!(result, Err(ParseError::InvalidType { got, .. }) if got == "number"));
}

#[test]
fn given_typo_command_then_suggestion_is_closest_command() {
    assert_eq!(suggest_command("deplyo"), Some("deploy"));
    assert_eq!(suggest_command("contract"), Some("contracts"));
    assert_eq!(suggest_command("xxxxxxxxxxxx"), None);
}

#[tokio::test]
async fn help_lists_commands_with_version() {
    let host = string_host();
    let json = envelope_json(&host, r#"{"cmd":"?","rid":"r-1"}"#).await;

    assert_eq!(json["ok"], true);
    assert_eq!(json["rid"], "r-1");
    assert_eq!(json["d"]["n"], "chost");
    assert!(json["d"]["cmds"].as_array().is_some_and(|c| !c.is_empty()));
    let codes: Vec<&str> = json["d"]["errs"]
        .as_array()
        .expect("errs is an array")
        .iter()
        .filter_map(|entry| entry[0].as_str())
        .collect();
    assert_eq!(
        codes,
        vec![
            code::EXISTS,
            code::NOTFOUND,
            code::INVALID,
            code::CONFLICT,
            code::DEPENDENCY
        ]
    );
    assert!(json["t"].is_i64());
    assert!(json["ms"].is_i64());
}

#[tokio::test]
async fn deploy_view_write_view_round_trip() {
    let host = string_host();
    let address = deploy(&host).await;

    let first = envelope_json(
        &host,
        &json!({"cmd": "view", "address": address, "method": "read_method"}).to_string(),
    )
    .await;
    assert_eq!(first["d"]["result"], "hello");

    let written = envelope_json(
        &host,
        &json!({"cmd": "write", "address": address, "method": "write_method", "args": ["world"]})
            .to_string(),
    )
    .await;
    assert_eq!(written["ok"], true);
    assert_eq!(written["d"]["version"], 1);
    assert_eq!(written["d"]["result"], Value::Null);

    let second = envelope_json(
        &host,
        &json!({"cmd": "view", "address": address, "method": "read_method"}).to_string(),
    )
    .await;
    assert_eq!(second["d"]["result"], "world");
}

#[tokio::test]
async fn write_method_via_view_command_is_conflict() {
    let host = string_host();
    let address = deploy(&host).await;

    let json = envelope_json(
        &host,
        &json!({"cmd": "view", "address": address, "method": "write_method", "args": ["x"]})
            .to_string(),
    )
    .await;

    assert_eq!(json["ok"], false);
    assert_eq!(json["err"]["code"], code::CONFLICT);
    assert_eq!(json["fix"], "Use the 'write' command for this method");
}

#[tokio::test]
async fn unknown_method_reports_suggestion() {
    let host = string_host();
    let address = deploy(&host).await;

    let json = envelope_json(
        &host,
        &json!({"cmd": "view", "address": address, "method": "read_methd"}).to_string(),
    )
    .await;

    assert_eq!(json["err"]["code"], code::NOTFOUND);
    assert_eq!(json["fix"], "Did you mean 'read_method'?");
}

#[tokio::test]
async fn unknown_fields_are_rejected() {
    let host = string_host();
    let json = envelope_json(&host, r#"{"cmd":"kinds","verbose":true}"#).await;

    assert_eq!(json["ok"], false);
    assert_eq!(json["err"]["code"], code::INVALID);
    assert_eq!(json["err"]["ctx"]["unknown"], json!(["verbose"]));
}

#[tokio::test]
async fn invalid_json_keeps_rid_when_recoverable() {
    let host = string_host();
    let json = envelope_json(&host, r#"{"rid":"r-9"}"#).await;

    assert_eq!(json["ok"], false);
    assert_eq!(json["rid"], "r-9");
    assert_eq!(json["err"]["code"], code::INVALID);
}

#[tokio::test]
async fn batch_runs_ops_in_order_and_counts_failures() {
    let host = string_host();
    let address = deploy(&host).await;

    let line = json!({
        "cmd": "batch",
        "ops": [
            {"cmd": "write", "address": address, "method": "write_method", "args": ["a"]},
            {"cmd": "write", "address": address, "method": "write_method", "args": ["b"]},
            {"cmd": "view", "address": address, "method": "read_method"},
            {"cmd": "batch", "ops": []},
            {"cmd": "nope"}
        ]
    })
    .to_string();
    let json = envelope_json(&host, &line).await;

    assert_eq!(json["ok"], true);
    assert_eq!(json["d"]["pass"], 3);
    assert_eq!(json["d"]["fail"], 2);
    assert_eq!(json["d"]["items"][2]["d"]["result"], "b");
    assert_eq!(json["d"]["items"][3]["ok"], false);
}

#[tokio::test]
async fn loop_processes_every_line_and_counts_failures() {
    let host = string_host();
    let input = "{\"cmd\":\"kinds\"}\n\n{\"cmd\":\"kind\"}\n{\"cmd\":\"contracts\"}\n";
    let mut output: Vec<u8> = Vec::new();

    let summary = run_protocol_loop(&host, input.as_bytes(), &mut output)
        .await
        .expect("loop completes");

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.failed, 1);
    assert!(!summary.all_ok());
    let lines: Vec<Value> = String::from_utf8(output)
        .expect("utf8 output")
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is json"))
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1]["fix"], "Did you mean 'kinds'?");
}

#[tokio::test]
async fn loop_with_empty_input_emits_single_error_envelope() {
    let host = string_host();
    let mut output: Vec<u8> = Vec::new();

    let summary = run_protocol_loop(&host, "\n  \n".as_bytes(), &mut output)
        .await
        .expect("loop completes");

    assert_eq!(summary.processed, 0);
    assert_eq!(summary.failed, 1);
    let text = String::from_utf8(output).expect("utf8 output");
    let json: Value = serde_json::from_str(text.trim()).expect("json envelope");
    assert_eq!(json["err"]["msg"], "No input received on stdin");
}
