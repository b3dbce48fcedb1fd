use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Value};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recap-cli")]
#[command(about = "Client for a running recap gateway", long_about = None)]
struct Cli {
    #[arg(short, long, env = "RECAP_GATEWAY_URL", default_value = "http://localhost:8080")]
    url: String,

    /// API key sent in the credential header
    #[arg(short, long, env = "APP_API_KEY", default_value = "")]
    key: String,

    /// Credential header name
    #[arg(long, default_value = "X-API-Key")]
    header: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show gateway health, breaker states and counter store reachability
    Health,
    /// Check that the API accepts the configured key
    Status,
    /// Summarize a chat export
    Recap {
        /// Path to the conversation text file
        #[arg(short, long)]
        file: PathBuf,
        /// concise, detailed, bullet, casual or formal
        #[arg(short, long, default_value = "concise")]
        style: String,
        /// Only consider the last N days
        #[arg(short, long)]
        days: Option<i64>,
    },
    /// Free-form text generation
    Generate {
        #[arg(short, long)]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            HeaderName::from_bytes(cli.header.as_bytes())?,
            HeaderValue::from_str(&cli.key)?,
        );
    }

    let res = match cli.command {
        Commands::Health => {
            client
                .get(format!("{}/health/details", cli.url))
                .send()
                .await?
        }
        Commands::Status => {
            client
                .get(format!("{}/api/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Recap { file, style, days } => {
            let conversation = std::fs::read_to_string(&file)?;
            client
                .post(format!("{}/api/recap", cli.url))
                .headers(headers)
                .json(&json!({ "conversation": conversation, "style": style, "days": days }))
                .send()
                .await?
        }
        Commands::Generate { prompt } => {
            client
                .post(format!("{}/api/generate", cli.url))
                .headers(headers)
                .json(&json!({ "prompt": prompt }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    for name in [
        "x-ratelimit-remaining",
        "x-ratelimit-reset",
        "retry-after",
        "x-recap-degraded",
    ] {
        if let Some(value) = res.headers().get(name).and_then(|v| v.to_str().ok()) {
            eprintln!("{}: {}", name, value);
        }
    }

    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let text = res.text().await?;
    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
