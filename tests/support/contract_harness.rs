use assert_cmd::Command;
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub output: Value,
}

#[derive(Debug, Clone)]
pub struct ProtocolScenarioHarness {
    binary_path: PathBuf,
    state_dir: Option<PathBuf>,
}

impl ProtocolScenarioHarness {
    #[must_use]
    pub fn new() -> Self {
        Self {
            binary_path: PathBuf::from(assert_cmd::cargo::cargo_bin!("chost")),
            state_dir: None,
        }
    }

    #[must_use]
    pub fn with_state_dir(mut self, dir: &Path) -> Self {
        self.state_dir = Some(dir.to_path_buf());
        self
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.binary_path);
        command
            .env_remove("CONTRACT_HOST_STATE_DIR")
            .env_remove("CONTRACT_HOST_INITIAL_VALUE")
            .env_remove("RUST_LOG");
        if let Some(dir) = &self.state_dir {
            command.arg("--state-dir").arg(dir);
        }
        command
    }

    /// Runs a single request that is expected to succeed.
    pub fn run_protocol(&self, input: &str) -> Result<ScenarioResult, String> {
        let assert = self
            .command()
            .write_stdin(format!("{input}\n"))
            .assert()
            .success();
        single_envelope(&assert.get_output().stdout)
    }

    /// Runs a single request that is expected to fail with a non-zero exit.
    pub fn run_protocol_failure(&self, input: &str) -> Result<ScenarioResult, String> {
        let assert = self
            .command()
            .write_stdin(format!("{input}\n"))
            .assert()
            .failure();
        single_envelope(&assert.get_output().stdout)
    }

    /// Runs every line and returns one envelope per processed request,
    /// regardless of the exit status.
    pub fn run_lines(&self, lines: &[&str]) -> Result<Vec<Value>, String> {
        let output = self
            .command()
            .write_stdin(lines.join("\n"))
            .output()
            .map_err(|err| format!("failed to run chost: {err}"))?;

        String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|line| {
                serde_json::from_str::<Value>(line)
                    .map_err(|err| format!("expected JSON response envelope, got '{line}': {err}"))
            })
            .collect()
    }
}

impl Default for ProtocolScenarioHarness {
    fn default() -> Self {
        Self::new()
    }
}

fn single_envelope(stdout: &[u8]) -> Result<ScenarioResult, String> {
    let raw = String::from_utf8_lossy(stdout).trim().to_string();
    serde_json::from_str::<Value>(&raw)
        .map(|output| ScenarioResult { output })
        .map_err(|err| format!("expected JSON response envelope, got '{raw}': {err}"))
}

pub fn assert_protocol_envelope(output: &Value) -> Result<(), String> {
    match (output.get("ok"), output.get("t"), output.get("ms")) {
        (Some(_), Some(timestamp), Some(duration))
            if timestamp.is_number() && duration.is_number() =>
        {
            Ok(())
        }
        _ => Err(format!(
            "missing or invalid protocol envelope fields in response: {output}"
        )),
    }
}

#[allow(dead_code)]
pub fn assert_contract_test_is_decoupled(relative_path: &str) -> Result<(), String> {
    let source = read_contract_test_source(relative_path)?;
    let forbidden = [
        (
            "use chost::",
            "contract tests must drive the binary, not the library API",
        ),
        (
            "use super::",
            "contract tests must not couple to private module internals",
        ),
        (
            ".json\")",
            "contract tests must not assert on the persisted file layout",
        ),
    ];

    forbidden
        .iter()
        .find(|(snippet, _)| source.contains(snippet))
        .map_or(Ok(()), |(snippet, reason)| {
            Err(format!(
                "{relative_path} contains forbidden internal coupling snippet '{snippet}': {reason}"
            ))
        })
}

#[allow(dead_code)]
fn read_contract_test_source(relative_path: &str) -> Result<String, String> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join(relative_path);
    std::fs::read_to_string(&path).map_err(|err| {
        format!(
            "failed to read contract test source {}: {err}",
            path.display()
        )
    })
}
