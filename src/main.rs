#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;

use anyhow::Context;
use chost::config::DEFAULT_LOG_FILTER;
use chost::{
    load_config, register_builtin_contracts, run_protocol_loop, ContractHost, FileStore,
    HostConfig, HostError, MemoryStore, StateStore, STRING_CONTRACT_KIND,
};
use clap::Parser;
use cli::{Cli, Commands};
use serde_json::{json, Value};
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let exit_code = match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            eprintln!("Error: {err:#}");
            err.downcast_ref::<HostError>()
                .map_or(1, HostError::exit_code)
        }
    };
    std::process::exit(exit_code);
}

fn init_tracing(config: &HostConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let mut config = load_config(cli.config).await?;
    init_tracing(&config);

    if let Some(dir) = cli.state_dir {
        config.state_dir = Some(dir);
    }
    let command = cli.command.unwrap_or(Commands::Serve);

    match config.state_dir.clone() {
        Some(dir) => {
            let store = FileStore::open(&dir).await?;
            debug!("Using file store at {}", dir.display());
            execute(ContractHost::new(store), &config, command).await
        }
        None => execute(ContractHost::new(MemoryStore::new()), &config, command).await,
    }
}

async fn execute<S: StateStore>(
    mut host: ContractHost<S>,
    config: &HostConfig,
    command: Commands,
) -> anyhow::Result<i32> {
    register_builtin_contracts(&mut host, config)?;

    match command {
        Commands::Serve => {
            let mut stdout = tokio::io::stdout();
            let summary = run_protocol_loop(&host, tokio::io::stdin(), &mut stdout).await?;
            debug!(
                "Protocol loop finished: {} processed, {} failed",
                summary.processed, summary.failed
            );
            Ok(i32::from(!summary.all_ok()))
        }

        Commands::Deploy => {
            let address = host.deploy(STRING_CONTRACT_KIND).await?;
            println!("{address}");
            Ok(0)
        }

        Commands::Read { address } => {
            let value = host
                .call_view(&address, "read_method", &Value::Null)
                .await?;
            println!("{}", value.as_str().unwrap_or_default());
            Ok(0)
        }

        Commands::Write { address, value } => {
            let receipt = host
                .call_write(&address, "write_method", &json!([value]))
                .await?;
            println!("{}", receipt.version);
            Ok(0)
        }

        Commands::Schema => {
            let rendered = serde_json::to_string_pretty(&host.kinds())
                .context("Failed to render schemas")?;
            println!("{rendered}");
            Ok(0)
        }
    }
}
