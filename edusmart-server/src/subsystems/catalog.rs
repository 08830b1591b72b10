//! Product search over the `education_products` vector index.
//!
//! `ProductSearch` always answers with something: when the index cannot (no
//! index, no query embedding, an error, or zero rows) it hands back the two
//! built-in fallback products and records why.

use std::sync::Arc;

use async_trait::async_trait;
use edusmart_core::{DegradedReason, EmbeddingBackend, EmbeddingError, Outcome, ProductRecord};
use pgvector::Vector;
use sqlx::PgPool;
use thiserror::Error;

pub const MIN_K: u32 = 1;
pub const MAX_K: u32 = 20;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The embedding backend declined to embed the query.
    #[error("Query embedding unavailable")]
    NoEmbedding,
}

#[async_trait]
pub trait ProductIndex: Send + Sync {
    /// Up to `k` products, best match first.
    async fn search(&self, query: &str, k: u32) -> Result<Vec<ProductRecord>, IndexError>;

    /// Products carrying an embedding.
    async fn count(&self) -> Result<i64, IndexError>;

    fn name(&self) -> &str;
}

pub struct PgProductIndex {
    pool: PgPool,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl PgProductIndex {
    pub fn new(pool: PgPool, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        Self { pool, embedder }
    }
}

#[async_trait]
impl ProductIndex for PgProductIndex {
    async fn search(&self, query: &str, k: u32) -> Result<Vec<ProductRecord>, IndexError> {
        let embedding = self
            .embedder
            .embed_query(query)
            .await?
            .ok_or(IndexError::NoEmbedding)?;
        let vector = Vector::from(embedding);

        let rows = sqlx::query_as::<_, ProductRecord>(
            r#"
            SELECT id, name, description, price, category, stock, age_range, brand,
                   COALESCE(features, '') AS features
            FROM education_products
            WHERE embedding IS NOT NULL
            ORDER BY embedding <=> $1::vector
            LIMIT $2
            "#,
        )
        .bind(&vector)
        .bind(i64::from(k))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn count(&self) -> Result<i64, IndexError> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM education_products WHERE embedding IS NOT NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(row.0)
    }

    fn name(&self) -> &str {
        "pgvector"
    }
}

/// Returned whenever the index cannot answer. Not a source of truth for stock or price.
pub fn fallback_products() -> Vec<ProductRecord> {
    vec![
        ProductRecord {
            id: "fallback-stem-robotics-kit-pro".to_string(),
            name: "STEM Robotics Kit Pro".to_string(),
            description: "Advanced robotics kit with coding capabilities for teens".to_string(),
            price: 149.99,
            category: "STEM".to_string(),
            stock: 35,
            age_range: "14-18 years".to_string(),
            brand: "RoboTech Pro".to_string(),
            features: "AI programming, Multiple sensors, Machine learning".to_string(),
        },
        ProductRecord {
            id: "fallback-digital-microscope-pro".to_string(),
            name: "Digital Microscope Pro".to_string(),
            description: "High-precision digital microscope with 2000x magnification".to_string(),
            price: 129.99,
            category: "Science".to_string(),
            stock: 25,
            age_range: "12+ years".to_string(),
            brand: "ScienceVision".to_string(),
            features: "2000x magnification, 4K imaging, Computer connectivity".to_string(),
        },
    ]
}

#[derive(Clone)]
pub struct ProductSearch {
    index: Option<Arc<dyn ProductIndex>>,
}

impl ProductSearch {
    pub fn new(index: Arc<dyn ProductIndex>) -> Self {
        Self { index: Some(index) }
    }

    /// No index configured; every search serves the fallback catalog.
    pub fn fallback_only() -> Self {
        Self { index: None }
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index.as_deref().map(|i| i.name())
    }

    pub async fn search(&self, query: &str, k: u32) -> Outcome<Vec<ProductRecord>> {
        let k = k.clamp(MIN_K, MAX_K);

        let Some(index) = &self.index else {
            tracing::warn!("Product index not configured, serving fallback products");
            return Outcome::degraded(
                fallback_products(),
                DegradedReason::IndexUnavailable("not configured".to_string()),
            );
        };

        match index.search(query, k).await {
            Ok(products) if !products.is_empty() => Outcome::ok(products),
            Ok(_) => {
                tracing::info!(k, "No products matched, serving fallback products");
                Outcome::degraded(fallback_products(), DegradedReason::NoMatches)
            }
            Err(IndexError::NoEmbedding) => {
                tracing::warn!("Query embedding unavailable, serving fallback products");
                Outcome::degraded(fallback_products(), DegradedReason::EmbeddingUnavailable)
            }
            Err(e) => {
                tracing::error!(error = %e, index = index.name(), "Product search failed, serving fallback products");
                Outcome::degraded(
                    fallback_products(),
                    DegradedReason::IndexUnavailable(e.to_string()),
                )
            }
        }
    }

    pub async fn count(&self) -> Result<i64, IndexError> {
        match &self.index {
            Some(index) => index.count().await,
            None => Ok(0),
        }
    }
}
