//! Audit trail of oracle attempts.
//!
//! One [`AuditEntry`] is recorded per attempt, successful or not. Sinks must
//! return immediately; a sink that does I/O spawns it and only logs failures.

use std::sync::Mutex;
use std::time::Duration;

use mealgen_db::queries::generation_logs::{self, NewGenerationLog};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub caller: String,
    pub prompt_type: &'static str,
    pub model: String,
    /// 1-based attempt number within one call.
    pub attempt: u32,
    pub success: bool,
    pub error_kind: Option<&'static str>,
    pub output_chars: usize,
    pub output_tokens: Option<u32>,
    pub duration: Duration,
    pub prompt_sha256: String,
}

/// Hex SHA-256 of a prompt, stored instead of the prompt text.
pub fn prompt_fingerprint(prompt: &str) -> String {
    hex::encode(Sha256::digest(prompt.as_bytes()))
}

/// Destination for audit entries. `record` must never block or fail.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry);
}

// ---------------------------------------------------------------------------
// Postgres
// ---------------------------------------------------------------------------

/// Writes entries to `generation_logs` on tracked background tasks.
#[derive(Debug, Clone)]
pub struct PgAuditSink {
    pool: PgPool,
    background: TaskTracker,
}

impl PgAuditSink {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            background: TaskTracker::new(),
        }
    }

    /// Spawn inserts on `background` instead of a private tracker.
    pub fn with_tracker(mut self, background: TaskTracker) -> Self {
        self.background = background;
        self
    }

    pub fn tracker(&self) -> &TaskTracker {
        &self.background
    }
}

fn clamp_i32(value: u128) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl From<&AuditEntry> for NewGenerationLog {
    fn from(entry: &AuditEntry) -> Self {
        Self {
            caller: entry.caller.clone(),
            prompt_type: entry.prompt_type.to_owned(),
            model: entry.model.clone(),
            attempt: clamp_i32(u128::from(entry.attempt)),
            success: entry.success,
            error_kind: entry.error_kind.map(str::to_owned),
            output_chars: clamp_i32(entry.output_chars as u128),
            output_tokens: entry.output_tokens.map(|t| clamp_i32(u128::from(t))),
            duration_ms: clamp_i32(entry.duration.as_millis()),
            prompt_sha256: entry.prompt_sha256.clone(),
        }
    }
}

impl AuditSink for PgAuditSink {
    fn record(&self, entry: AuditEntry) {
        let pool = self.pool.clone();
        let row = NewGenerationLog::from(&entry);
        self.background.spawn(async move {
            if let Err(e) = generation_logs::insert(&pool, &row).await {
                warn!(
                    caller = %row.caller,
                    prompt_type = %row.prompt_type,
                    error = %e,
                    "failed to write generation audit entry"
                );
            }
        });
    }
}

// ---------------------------------------------------------------------------
// Tracing
// ---------------------------------------------------------------------------

/// Emits entries as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) {
        info!(
            caller = %entry.caller,
            prompt_type = entry.prompt_type,
            model = %entry.model,
            attempt = entry.attempt,
            success = entry.success,
            error_kind = entry.error_kind.unwrap_or("-"),
            output_chars = entry.output_chars,
            duration_ms = entry.duration.as_millis() as u64,
            "oracle attempt"
        );
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

/// Keeps entries in memory for inspection.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, entry: AuditEntry) {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> AuditEntry {
        AuditEntry {
            caller: "user-1".to_owned(),
            prompt_type: "meals",
            model: "planner".to_owned(),
            attempt: 2,
            success: false,
            error_kind: Some("timeout"),
            output_chars: 0,
            output_tokens: None,
            duration: Duration::from_millis(1500),
            prompt_sha256: prompt_fingerprint("hello"),
        }
    }

    #[test]
    fn fingerprint_is_hex_sha256() {
        assert_eq!(
            prompt_fingerprint("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn entry_converts_to_row() {
        let row = NewGenerationLog::from(&entry());
        assert_eq!(row.attempt, 2);
        assert_eq!(row.duration_ms, 1500);
        assert_eq!(row.error_kind.as_deref(), Some("timeout"));
        assert_eq!(row.output_tokens, None);
    }

    #[test]
    fn memory_sink_collects_entries() {
        let sink = MemoryAuditSink::new();
        assert!(sink.is_empty());
        sink.record(entry());
        sink.record(entry());
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.entries()[0].caller, "user-1");
    }
}
