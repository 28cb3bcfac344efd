use std::io::Write;

use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Smoke-test client for a running bearer-relay", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Public bearer token.
    #[arg(short, long, default_value = "")]
    token: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List upstream models
    Models,
    /// POST a JSON body to a path; streamed responses print as they arrive
    Send {
        /// Request path, e.g. /v1/chat/completions
        #[arg(short, long)]
        path: String,
        /// JSON request body
        #[arg(short, long)]
        data: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::Models => {
            let res = client.get(format!("{}/v1/models", cli.url)).send().await?;
            print_response(res).await?;
        }
        Commands::Send { path, data } => {
            let mut headers = HeaderMap::new();
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", cli.token))?,
            );
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

            let res = client
                .post(format!("{}{}", cli.url, path))
                .headers(headers)
                .body(data)
                .send()
                .await?;

            let is_stream = res
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v.starts_with("text/event-stream"));

            if is_stream {
                print_stream(res).await?;
            } else {
                print_response(res).await?;
            }
        }
    }

    Ok(())
}

async fn print_stream(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    let mut chunks = res.bytes_stream();
    while let Some(chunk) = chunks.next().await {
        stdout.write_all(&chunk?)?;
        stdout.flush()?;
    }
    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{}", text),
    }
    Ok(())
}
