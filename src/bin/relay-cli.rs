use clap::Parser;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::io::Write;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Send a chat request through a running chat relay", long_about = None)]
struct Cli {
    /// Relay endpoint
    #[arg(short, long, default_value = "http://localhost:8080/api/chat")]
    url: String,

    /// Ask for a server-sent event stream and print chunks as they arrive
    #[arg(short, long)]
    stream: bool,

    /// JSON request body, or @path to read it from a file
    body: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let body = match cli.body.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)?,
        None => cli.body,
    };
    serde_json::from_str::<Value>(&body)?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if cli.stream {
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    }

    let client = reqwest::Client::new();
    let res = client.post(&cli.url).headers(headers).body(body).send().await?;

    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: relay returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    if cli.stream {
        let mut stdout = std::io::stdout();
        let mut chunks = res.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            stdout.write_all(&chunk?)?;
            stdout.flush()?;
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
