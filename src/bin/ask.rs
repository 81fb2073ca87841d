use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

#[derive(Parser, Debug)]
#[command(name = "docrag-ask", about = "Ask a running docrag-server a question")]
struct AskCli {
    /// Question to answer from the ingested documents
    query: String,

    /// Server base URL
    #[arg(long, env = "DOCRAG_SERVER_URL", default_value = "http://127.0.0.1:8080")]
    server: String,

    /// Chat model override
    #[arg(long)]
    model: Option<String>,

    /// Number of chunks to retrieve
    #[arg(long)]
    top_k: Option<usize>,

    /// Print the retrieved chunks after the answer
    #[arg(long, default_value_t = false)]
    show_context: bool,

    /// Seconds before the request times out
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,
}

fn main() -> Result<()> {
    let cli = AskCli::parse();
    let client = Client::builder()
        .timeout(Duration::from_secs(cli.timeout_secs.max(1)))
        .build()
        .context("failed to build HTTP client")?;
    let url = format!("{}/ask", cli.server.trim_end_matches('/'));
    let request = AskRequest {
        query: &cli.query,
        model: cli.model.as_deref(),
        top_k: cli.top_k,
    };
    let resp = client
        .post(&url)
        .json(&request)
        .send()
        .with_context(|| format!("failed to call {url}"))?;
    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp
            .text()
            .unwrap_or_else(|_| "<body unavailable>".to_string());
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|e| e.error)
            .unwrap_or(body);
        bail!("server returned {status}: {message}");
    }
    let parsed: AskResponse = resp.json().context("failed to parse server response")?;

    println!("--- Answer ({}) ---\n{}", parsed.model, parsed.answer);
    if cli.show_context {
        println!("\n--- Context ---");
        for chunk in &parsed.context {
            println!("[{}]\n{}\n", chunk.id, chunk.text.trim());
        }
    } else if !parsed.context.is_empty() {
        let ids: Vec<&str> = parsed.context.iter().map(|c| c.id.as_str()).collect();
        println!("\nsources: {}", ids.join(", "));
    }
    Ok(())
}

#[derive(Serialize)]
struct AskRequest<'a> {
    query: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    #[serde(rename = "topK", skip_serializing_if = "Option::is_none")]
    top_k: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct AskResponse {
    answer: String,
    #[serde(default)]
    context: Vec<ContextChunk>,
    model: String,
}

#[derive(Debug, Deserialize)]
struct ContextChunk {
    id: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}
