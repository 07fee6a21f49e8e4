use chost::ContractAddress;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chost")]
#[command(about = "String contract host - deploy, read and write contracts over JSON lines")]
#[command(version)]
pub struct Cli {
    /// Without a command, serves the JSON-lines protocol on stdin/stdout.
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to config file (default: .contract-host/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Persist contract state under this directory
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve the JSON-lines protocol on stdin/stdout
    Serve,

    /// Deploy a string contract and print its address
    Deploy,

    /// Print the current value of a contract
    Read {
        #[arg(value_parser = ContractAddress::parse)]
        address: ContractAddress,
    },

    /// Replace the value of a contract and print the new version
    Write {
        #[arg(value_parser = ContractAddress::parse)]
        address: ContractAddress,
        #[arg(allow_hyphen_values = true)]
        value: String,
    },

    /// Print registered contract schemas as JSON
    Schema,
}
