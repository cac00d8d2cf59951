use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "chain-cli")]
#[command(about = "Client for the traced A → B → C service chain", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Call the node's root endpoint and print the chain result
    Call {
        /// Baggage entry carried down the chain (repeatable)
        #[arg(short, long = "baggage", value_name = "KEY=VALUE", value_parser = parse_baggage)]
        baggage: Vec<(String, String)>,
    },
    /// Check node liveness
    Health,
}

fn parse_baggage(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected KEY=VALUE, got `{raw}`")),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Call { baggage } => {
            let mut headers = HeaderMap::new();
            if !baggage.is_empty() {
                let value = baggage
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(",");
                headers.insert("baggage", HeaderValue::from_str(&value)?);
            }

            let res = client.get(format!("{base}/")).headers(headers).send().await?;
            print_response(res).await?;
        }
        Commands::Health => {
            let res = client.get(format!("{base}/health")).send().await?;
            let status = res.status();
            println!("{} {}", status, res.text().await?);
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if let Some(id) = res.headers().get("x-request-id").and_then(|v| v.to_str().ok()) {
        eprintln!("Request ID: {}", id);
    }
    if !status.is_success() {
        eprintln!("Error: node returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
