use edusmart_core::{EduSmartError, EmbeddingBackend, ProductRecord};
use pgvector::Vector;
use sqlx::PgPool;

/// Counts from one seeding run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// Rows written (inserted or updated).
    pub inserted: usize,
    /// Rows written with a fresh embedding.
    pub embedded: usize,
    /// Rows whose embedding could not be produced this run.
    pub skipped: usize,
}

/// Embed each product's document and upsert it by id.
///
/// A product whose embedding fails is still written; it keeps any embedding
/// it already had and stays out of search until a later run embeds it.
pub async fn seed_products(
    pool: &PgPool,
    backend: &dyn EmbeddingBackend,
    products: &[ProductRecord],
) -> Result<SeedReport, EduSmartError> {
    let mut report = SeedReport::default();

    for product in products {
        let document = product.embedding_document();

        let embedding = match backend.embed(&document).await {
            Ok(Some(values)) => Some(Vector::from(values)),
            Ok(None) => {
                tracing::debug!(id = %product.id, backend = backend.name(), "Embedding unavailable");
                None
            }
            Err(e) => {
                tracing::warn!(id = %product.id, error = %e, "Failed to embed product, skipping vector");
                None
            }
        };

        sqlx::query(
            r#"
            INSERT INTO education_products
                (id, name, description, price, category, stock, age_range, brand, features, document, embedding)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                description = EXCLUDED.description,
                price = EXCLUDED.price,
                category = EXCLUDED.category,
                stock = EXCLUDED.stock,
                age_range = EXCLUDED.age_range,
                brand = EXCLUDED.brand,
                features = EXCLUDED.features,
                document = EXCLUDED.document,
                embedding = COALESCE(EXCLUDED.embedding, education_products.embedding)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.description)
        .bind(product.price)
        .bind(&product.category)
        .bind(product.stock)
        .bind(&product.age_range)
        .bind(&product.brand)
        .bind(&product.features)
        .bind(&document)
        .bind(&embedding)
        .execute(pool)
        .await?;

        report.inserted += 1;
        if embedding.is_some() {
            report.embedded += 1;
        } else {
            report.skipped += 1;
        }
    }

    tracing::info!(
        inserted = report.inserted,
        embedded = report.embedded,
        skipped = report.skipped,
        "Catalog seeded"
    );
    Ok(report)
}
