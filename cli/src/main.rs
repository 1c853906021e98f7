//! Kava CLI - console entry point for the safety assistant.
//!
//! The binary is thin glue: it initializes logging, loads configuration,
//! wires the engine's collaborators (model client, web search, store,
//! curated index), and runs a line-oriented REPL over stdin. Everything
//! interesting happens behind [`kava_engine::Engine`].
//!
//! Commands inside the REPL:
//!
//! - `/health` - collaborator liveness
//! - `/reset`  - clear this session's log and history
//! - `/quit`   - exit

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use kava_config::KavaConfig;
use kava_engine::{Engine, EngineError, TurnError};
use kava_providers::OllamaClient;
use kava_types::ThreadId;
use kava_websearch::BraveSearchClient;

const APOLOGY: &str =
    "Sorry - I couldn't safely record that right now. Please try again in a moment.";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));

    if let Some((path, file)) = open_log_file() {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();
        tracing::info!(path = %path.display(), "Logging initialized");
        return;
    }

    // If no log file can be opened, prefer "no logs" over interleaving
    // log lines with the conversation.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> Option<(PathBuf, std::fs::File)> {
    let candidates: Vec<PathBuf> = [
        kava_config::data_dir().map(|dir| dir.join("logs").join("kava.log")),
        Some(std::env::temp_dir().join("kava.log")),
    ]
    .into_iter()
    .flatten()
    .collect();

    for candidate in candidates {
        if let Some(parent) = candidate.parent()
            && std::fs::create_dir_all(parent).is_err()
        {
            continue;
        }
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&candidate)
        {
            return Some((candidate, file));
        }
    }

    None
}

fn resolve_db_path(config: &KavaConfig) -> PathBuf {
    config
        .storage
        .db_path
        .clone()
        .or_else(|| kava_config::data_dir().map(|dir| dir.join("kava.db")))
        .unwrap_or_else(|| PathBuf::from("kava.db"))
}

fn resolve_corpus_path(config: &KavaConfig) -> PathBuf {
    config
        .storage
        .corpus_path
        .clone()
        .unwrap_or_else(|| PathBuf::from("data").join("interactions.toml"))
}

async fn build_engine(config: &KavaConfig) -> Result<Engine, EngineError> {
    let model = Arc::new(OllamaClient::new(
        config.model.endpoint.as_str(),
        config.model.chat_model.as_str(),
        config.model.embed_model.as_str(),
    ));

    let web = match std::env::var(&config.search.api_key_env) {
        Ok(key) => match BraveSearchClient::new(&config.search.endpoint, key) {
            Ok(client) => Some(Arc::new(client) as Arc<dyn kava_websearch::EvidenceSearch>),
            Err(e) => {
                tracing::warn!(error = %e, "Web evidence tool disabled");
                None
            }
        },
        Err(_) => {
            tracing::warn!(
                env = %config.search.api_key_env,
                "No search API key; web evidence tier disabled"
            );
            None
        }
    };

    Engine::bootstrap(
        config,
        &resolve_db_path(config),
        &resolve_corpus_path(config),
        Arc::clone(&model) as Arc<dyn kava_providers::ChatModel>,
        Some(model as Arc<dyn kava_index::Embedder>),
        web,
    )
    .await
}

async fn print_health(engine: &Engine, stdout: &mut tokio::io::Stdout) -> Result<()> {
    let health = engine.health().await;
    let line = format!(
        "log store: {:?} | curated index: {:?} | web tool: {:?}\n",
        health.log_store, health.curated_index, health.web_tool
    );
    stdout.write_all(line.to_lowercase().as_bytes()).await?;
    Ok(())
}

async fn run_repl(engine: Arc<Engine>) -> Result<()> {
    let thread = ThreadId::new(format!("cli:{}", uuid::Uuid::new_v4()));
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(
            b"kava - tell me what you eat and what you take, and I'll watch for interactions.\n\
              Commands: /health /reset /quit\n\n> ",
        )
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let input = line.trim();
        match input {
            "" => {}
            "/quit" | "/exit" => break,
            "/health" => print_health(&engine, &mut stdout).await?,
            "/reset" => match engine.reset_thread(&thread).await {
                Ok(()) => stdout.write_all(b"Session cleared.\n").await?,
                Err(e) => {
                    tracing::error!(error = %e, "Reset failed");
                    stdout.write_all(APOLOGY.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
            },
            text => match engine.submit_turn(&thread, text).await {
                Ok(result) => {
                    stdout.write_all(b"\n").await?;
                    stdout.write_all(result.reply.as_bytes()).await?;
                    stdout.write_all(b"\n\n").await?;
                }
                Err(e @ TurnError::Persistence(_)) => {
                    tracing::error!(error = %e, "Turn failed");
                    stdout.write_all(APOLOGY.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Turn failed unexpectedly");
                    stdout.write_all(APOLOGY.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
            },
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = match kava_config::config_path() {
        Some(path) => KavaConfig::load(&path).context("loading configuration")?,
        None => KavaConfig::default(),
    };

    let engine = match build_engine(&config).await {
        Ok(engine) => Arc::new(engine),
        // Fatal for the whole service: without a durable log and curated
        // corpus there is nothing safe to say.
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            anyhow::bail!("{e}");
        }
    };

    // Idle threads are swept in the background; in-flight turns defer
    // their own eviction.
    let sweeper = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                engine.evict_idle_threads();
            }
        })
    };

    let result = run_repl(engine).await;
    sweeper.abort();
    result
}
