//! Database query functions for the `generation_logs` audit table.

use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::models::GenerationLog;

/// Parameters for inserting an audit entry.
#[derive(Debug, Clone)]
pub struct NewGenerationLog {
    pub caller: String,
    pub prompt_type: String,
    pub model: String,
    pub attempt: i32,
    pub success: bool,
    pub error_kind: Option<String>,
    pub output_chars: i32,
    pub output_tokens: Option<i32>,
    pub duration_ms: i32,
    pub prompt_sha256: String,
}

/// Insert an audit entry and return the stored row.
pub async fn insert(pool: &PgPool, new: &NewGenerationLog) -> Result<GenerationLog> {
    let log = sqlx::query_as::<_, GenerationLog>(
        "INSERT INTO generation_logs \
             (caller, prompt_type, model, attempt, success, error_kind, \
              output_chars, output_tokens, duration_ms, prompt_sha256) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING *",
    )
    .bind(&new.caller)
    .bind(&new.prompt_type)
    .bind(&new.model)
    .bind(new.attempt)
    .bind(new.success)
    .bind(&new.error_kind)
    .bind(new.output_chars)
    .bind(new.output_tokens)
    .bind(new.duration_ms)
    .bind(&new.prompt_sha256)
    .fetch_one(pool)
    .await
    .with_context(|| {
        format!(
            "failed to insert generation log for {} / {} attempt {}",
            new.caller, new.prompt_type, new.attempt
        )
    })?;

    Ok(log)
}

/// List audit entries for a caller, oldest first.
pub async fn list_for_caller(pool: &PgPool, caller: &str) -> Result<Vec<GenerationLog>> {
    let logs = sqlx::query_as::<_, GenerationLog>(
        "SELECT * FROM generation_logs WHERE caller = $1 ORDER BY recorded_at ASC, id ASC",
    )
    .bind(caller)
    .fetch_all(pool)
    .await
    .with_context(|| format!("failed to list generation logs for {caller}"))?;

    Ok(logs)
}

/// Sum of output tokens recorded for a caller across all attempts.
pub async fn output_tokens_for_caller(pool: &PgPool, caller: &str) -> Result<i64> {
    let row: (Option<i64>,) = sqlx::query_as(
        "SELECT SUM(output_tokens)::bigint FROM generation_logs WHERE caller = $1",
    )
    .bind(caller)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to sum output tokens for {caller}"))?;

    Ok(row.0.unwrap_or(0))
}
