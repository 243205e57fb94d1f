use std::io::Read;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Send jobs to a request relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3041")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post a job file (or stdin when omitted) to the relay
    Send {
        job: Option<PathBuf>,
    },
    /// Relay a single GET request
    Get {
        target: String,
        /// Extra header as `Name: value`; may be repeated
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let job: Value = match cli.command {
        Commands::Send { job: Some(path) } => serde_json::from_str(&std::fs::read_to_string(path)?)?,
        Commands::Send { job: None } => {
            let mut raw = String::new();
            std::io::stdin().read_to_string(&mut raw)?;
            serde_json::from_str(&raw)?
        }
        Commands::Get { target, headers } => {
            let headers = headers
                .iter()
                .map(|h| match h.split_once(':') {
                    Some((name, value)) => Ok(json!([name.trim(), value.trim()])),
                    None => Err(format!("header {:?} is not `Name: value`", h)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            json!({"method": "GET", "url": target, "headers": headers})
        }
    };

    let res = client
        .post(format!("{}/proxy", cli.url.trim_end_matches('/')))
        .json(&job)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    if let Some(message) = json.pointer("/error/message").and_then(Value::as_str) {
        eprintln!("Relayed call failed: {}", message);
    }
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
