use edusmart_core::EduSmartError;
use sqlx::PgPool;

/// Create the extension, both tables and the history index. Safe to re-run.
///
/// `dimensions` sizes `education_products.embedding` and must match the
/// embedding backend; an existing column keeps its original width.
pub async fn init_schema(pool: &PgPool, dimensions: u32) -> Result<(), EduSmartError> {
    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS conversation_history (
            id BIGSERIAL PRIMARY KEY,
            user_id TEXT NOT NULL,
            session_id TEXT NOT NULL,
            user_message TEXT,
            assistant_response TEXT,
            timestamp TIMESTAMPTZ,
            created_at TIMESTAMPTZ DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS conversation_history_session_idx
            ON conversation_history (user_id, session_id, timestamp DESC)
        "#,
    )
    .execute(pool)
    .await?;

    // Type modifiers cannot be bound as parameters.
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS education_products (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT NOT NULL,
            price DOUBLE PRECISION NOT NULL,
            category TEXT NOT NULL,
            stock INTEGER NOT NULL CHECK (stock >= 0),
            age_range TEXT NOT NULL,
            brand TEXT NOT NULL,
            features TEXT NOT NULL DEFAULT '',
            document TEXT NOT NULL,
            embedding vector({dimensions})
        )
        "#
    ))
    .execute(pool)
    .await?;

    tracing::info!(dimensions, "Schema ready");
    Ok(())
}
