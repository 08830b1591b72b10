use std::sync::Arc;

use clap::Parser;
use edusmart_core::embeddings::gemini_api_key;
use edusmart_core::{
    EduSmartConfig, EmbeddingBackend, EmbeddingError, LanguageModel, SpeechSynthesizer,
    TranslateTtsClient,
};
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use edusmart_server::subsystems::assistant::{Assistant, AssistantSettings};
use edusmart_server::subsystems::catalog::{PgProductIndex, ProductSearch};
use edusmart_server::subsystems::transcript::{PgTranscriptStore, Transcript};
use edusmart_server::subsystems::voice::Voice;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "edusmart.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience; production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match EduSmartConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    if args.health {
        let pool = match edusmart_core::db::create_pool(&config.database).await {
            Ok(p) => p,
            Err(e) => {
                eprintln!("Failed to connect to database: {}", e);
                std::process::exit(1);
            }
        };

        match edusmart_core::db::health_check(&pool).await {
            Ok(v) => println!("✅ PostgreSQL connected: {}", v),
            Err(e) => {
                println!("❌ PostgreSQL connection failed: {}", e);
                std::process::exit(1);
            }
        }

        match edusmart_core::db::check_pgvector(&pool).await {
            Ok(v) => println!("✅ pgvector version: {}", v),
            Err(e) => {
                println!("❌ pgvector check failed: {}", e);
                std::process::exit(1);
            }
        }

        println!("✅ EduSmart DB health check passed");
        return Ok(());
    }

    // Lazy: the assistant answers (with fallbacks) while Postgres is down.
    let pool = match edusmart_core::db::create_lazy_pool(&config.database) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Invalid database configuration: {}", e);
            std::process::exit(1);
        }
    };

    let transcript = Transcript::new(Arc::new(PgTranscriptStore::new(pool.clone())));

    let products = match edusmart_core::create_backend_from_config(
        &config.embedding,
        config.embedding.query_max_retries,
    ) {
        Ok(backend) => {
            tracing::info!(backend = backend.name(), "Query embeddings ready");
            let backend: Arc<dyn EmbeddingBackend> = Arc::from(backend);
            ProductSearch::new(Arc::new(PgProductIndex::new(pool.clone(), backend)))
        }
        Err(e @ EmbeddingError::UnknownBackend(_)) => {
            eprintln!("Invalid embedding configuration: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            tracing::warn!("Product search disabled: failed to create embedding backend: {}", e);
            ProductSearch::fallback_only()
        }
    };

    let voice = if config.speech.enabled {
        match TranslateTtsClient::new(&config.speech) {
            Ok(client) => {
                let client: Arc<dyn SpeechSynthesizer> = Arc::new(client);
                Voice::new(client)
            }
            Err(e) => {
                tracing::warn!("Speech disabled: failed to create TTS client: {}", e);
                Voice::disabled()
            }
        }
    } else {
        Voice::disabled()
    };

    let model: Option<Arc<dyn LanguageModel>> =
        match edusmart_core::create_model(&config.generation, gemini_api_key()) {
            Ok(Some(model)) => Some(Arc::from(model)),
            Ok(None) => {
                tracing::warn!("GEMINI_API_KEY not set, running in demo mode");
                None
            }
            Err(e) => {
                eprintln!("Invalid generation configuration: {}", e);
                std::process::exit(1);
            }
        };

    let assistant = Arc::new(Assistant::new(
        transcript,
        products,
        voice,
        model,
        AssistantSettings::from(&config.retrieval),
    ));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    edusmart_server::http::start_http_server(assistant, config, tx.subscribe()).await?;

    Ok(())
}
