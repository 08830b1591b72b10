use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use edusmart_core::EduSmartConfig;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Create the EduSmart schema and seed the product catalog")]
struct Args {
    #[arg(short, long, default_value = "edusmart.toml")]
    config: String,

    /// JSON array of products
    #[arg(long, default_value = "data/products.json")]
    catalog: PathBuf,

    /// Create tables and indexes, then stop
    #[arg(long)]
    schema_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
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

    let pool = match edusmart_core::db::create_pool(&config.database).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };

    edusmart_ingest::init_schema(&pool, config.embedding.dimensions()).await?;
    println!("✅ Schema ready");

    if args.schema_only {
        return Ok(());
    }

    let products = edusmart_ingest::load_catalog(&args.catalog)
        .with_context(|| format!("loading catalog {}", args.catalog.display()))?;

    let backend = edusmart_core::create_backend_from_config(
        &config.embedding,
        config.embedding.ingest_max_retries,
    )
    .context("creating embedding backend")?;

    let report = edusmart_ingest::seed_products(&pool, backend.as_ref(), &products).await?;
    println!(
        "✅ Seeded {} products ({} embedded, {} without embedding)",
        report.inserted, report.embedded, report.skipped
    );

    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM education_products")
        .fetch_one(&pool)
        .await?;
    println!("📈 Total products in catalog: {}", total.0);

    Ok(())
}
