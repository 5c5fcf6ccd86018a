use sqlx::{PgPool, Postgres, QueryBuilder};

use crate::models::classification::{ClassificationResult, ColumnValue};
use crate::models::job::ProcessingStatus;

/// Product row as written by this worker.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRecord {
    pub id: i64,
    pub title: Option<String>,
    pub description: Option<String>,
    pub taxonomy: Option<String>,
    pub processing_status: Option<String>,
    pub violations: Option<serde_json::Value>,
    pub error_message: Option<String>,
}

/// Build the partial `UPDATE products` statement.
///
/// Only columns whose field is present in `result` are assigned; every other
/// column keeps its current value.
pub fn build_status_update(
    record_id: i64,
    status: ProcessingStatus,
    result: &ClassificationResult,
) -> QueryBuilder<'static, Postgres> {
    let mut query = QueryBuilder::new("UPDATE products SET processing_status = ");
    query.push_bind(status.to_string());

    for (column, value) in result.column_assignments() {
        query.push(", ").push(column).push(" = ");
        match value {
            ColumnValue::Text(text) => query.push_bind(text),
            ColumnValue::Json(json) => query.push_bind(json),
        };
    }

    query.push(", updated_at = NOW() WHERE id = ");
    query.push_bind(record_id);
    query
}

/// Set a product's processing status and merge in the present result fields.
pub async fn update_product_status(
    pool: &PgPool,
    record_id: i64,
    status: ProcessingStatus,
    result: &ClassificationResult,
) -> Result<(), sqlx::Error> {
    let outcome = build_status_update(record_id, status, result)
        .build()
        .execute(pool)
        .await?;

    if outcome.rows_affected() == 0 {
        tracing::warn!(record_id, status = %status, "No product row matched status update");
    }
    Ok(())
}

/// Get a product by ID.
pub async fn get_product(pool: &PgPool, record_id: i64) -> Result<Option<ProductRecord>, sqlx::Error> {
    sqlx::query_as::<_, ProductRecord>(
        r#"
        SELECT id, title, description, taxonomy, processing_status, violations, error_message
        FROM products
        WHERE id = $1
        "#,
    )
    .bind(record_id)
    .fetch_optional(pool)
    .await
}
