//! edusmart-cli: terminal client for the EduSmart store assistant
//!
//! # Subcommands
//! - `chat <message> --user <id> [--session <id>] [--language en|km] [--response-type text|voice|both] [--audio-out <file>]`
//! - `status`: `GET /health`
//! - `probe` : `GET /test-db`

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "edusmart-cli",
    version,
    about = "EduSmart store assistant terminal client"
)]
struct Cli {
    /// EduSmart HTTP server URL (overrides EDUSMART_HTTP_URL env var)
    #[arg(long, env = "EDUSMART_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Ask the assistant a question
    Chat {
        /// Message text
        message: String,

        /// Shopper id
        #[arg(long)]
        user: String,

        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,

        /// Reply language: en or km
        #[arg(long, default_value = "en")]
        language: String,

        /// text, voice or both
        #[arg(long, default_value = "text")]
        response_type: String,

        /// Write the reply audio (MP3) here
        #[arg(long)]
        audio_out: Option<PathBuf>,
    },

    /// Show server health
    Status,

    /// Show transcript store, product index and model diagnostics
    Probe,
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ChatBody<'a> {
    pub message: &'a str,
    pub user_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
    pub response_type: &'a str,
    pub language: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub text: String,
    #[serde(default)]
    pub audio_data: String,
    pub session_id: String,
    pub response_type: String,
    pub timestamp: String,
}

/// Decode the reply's base64 audio; `None` when the reply has none.
pub fn decode_audio(audio_data: &str) -> anyhow::Result<Option<Vec<u8>>> {
    if audio_data.is_empty() {
        return Ok(None);
    }
    Ok(Some(BASE64.decode(audio_data)?))
}

/// Human-readable lines for a `/test-db` body.
pub fn probe_lines(body: &serde_json::Value) -> Vec<String> {
    let field = |key: &str| match &body[key] {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => "-".to_string(),
        other => other.to_string(),
    };

    vec![
        format!("Transcript store: {}", field("transcript_store_status")),
        format!("Product index:    {}", field("vector_store_status")),
        format!("Products indexed: {}", field("vector_products_count")),
        format!("Model configured: {}", field("model_configured")),
        format!("Model client:     {}", field("model_client")),
    ]
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

fn do_chat(server: &str, body: &ChatBody<'_>, audio_out: Option<&Path>) -> anyhow::Result<()> {
    // generation plus speech can take a while
    let url = format!("{}/chat", server);
    let resp = match client(120)?.post(&url).json(body).send() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("edusmart-cli: connection failed to {}: {}", url, e);
            std::process::exit(1);
        }
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        eprintln!("edusmart-cli: server returned {}: {}", status, body);
        std::process::exit(1);
    }

    let reply: ChatReply = resp.json()?;
    println!("{}\n", reply.text);
    println!("Session: {}", reply.session_id);

    match (audio_out, decode_audio(&reply.audio_data)?) {
        (Some(path), Some(audio)) => {
            std::fs::write(path, &audio)?;
            println!("Audio:   {} ({} bytes)", path.display(), audio.len());
        }
        (Some(_), None) => eprintln!("edusmart-cli: reply carried no audio"),
        _ => {}
    }

    Ok(())
}

fn do_get(server: &str, path: &str) -> anyhow::Result<serde_json::Value> {
    let url = format!("{}{}", server, path);
    match client(10)?.get(&url).send() {
        Ok(r) if r.status().is_success() => Ok(r.json().unwrap_or_default()),
        Ok(r) => {
            eprintln!("edusmart-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("edusmart-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }
}

fn do_status(server: &str) -> anyhow::Result<()> {
    let body = do_get(server, "/health")?;
    println!("EduSmart server: {}", body["status"].as_str().unwrap_or("unknown"));
    println!("Version:         {}", body["version"].as_str().unwrap_or("?"));
    println!("Timestamp:       {}", body["timestamp"].as_str().unwrap_or("?"));
    Ok(())
}

fn do_probe(server: &str) -> anyhow::Result<()> {
    let body = do_get(server, "/test-db")?;
    for line in probe_lines(&body) {
        println!("{}", line);
    }
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match &cli.command {
        Commands::Chat {
            message,
            user,
            session,
            language,
            response_type,
            audio_out,
        } => {
            let body = ChatBody {
                message,
                user_id: user,
                session_id: session.as_deref(),
                response_type,
                language,
            };
            do_chat(&server, &body, audio_out.as_deref())
        }
        Commands::Status => do_status(&server),
        Commands::Probe => do_probe(&server),
    };

    if let Err(e) = result {
        eprintln!("edusmart-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
