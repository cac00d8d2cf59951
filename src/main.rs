//! Chain node (v1)
//!
//! Runs one node of the A → B → C service chain.
//!
//! # Architecture Overview
//!
//! ```text
//!   chain-cli ──GET /──▶ app-a ──GET /──▶ app-b ──GET /──▶ app-c
//!                        │ span          │ span          │ span + local work
//!                        └───────────────┴───────────────┘
//!                          traceparent + baggage headers
//!
//!   every node: traces → OTLP/gRPC collector
//!               metrics → stdout (periodic)
//!               logs → console + stdout log pipeline
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use otel_chain::config::{self, NodeConfig, NodePreset};
use otel_chain::lifecycle::{interrupt_token, Controller};

#[derive(Parser)]
#[command(name = "chain-node")]
#[command(about = "One node of the A → B → C traced service chain", long_about = None)]
struct Cli {
    /// Which node of the chain to run.
    #[arg(short, long, value_enum, default_value_t = Node::A)]
    node: Node,

    /// TOML file overlaid on the node's built-in configuration.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configured one.
    #[arg(short, long)]
    bind: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Node {
    A,
    B,
    C,
}

impl From<Node> for NodePreset {
    fn from(node: Node) -> Self {
        match node {
            Node::A => NodePreset::A,
            Node::B => NodePreset::B,
            Node::C => NodePreset::C,
        }
    }
}

fn load(cli: &Cli) -> Result<NodeConfig, config::ConfigError> {
    let preset = NodeConfig::preset(cli.node.into());
    let mut config = match &cli.config {
        Some(path) => config::load_config(path, &preset)?,
        None => preset,
    };

    config::apply_process_env(&mut config);
    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
    }

    config::validate_config(&config).map_err(config::ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("chain-node: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut controller = Controller::new(config, interrupt_token());
    match controller.run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("chain-node: {e}");
            ExitCode::FAILURE
        }
    }
}
