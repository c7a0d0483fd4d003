//! Chatwise conversation import and export.
//!
//! Import pulls user messages out of a Chatwise export file, categorizes and
//! tags them, and stores them as memories. Deduplication compares clean
//! content (tags stripped) case-insensitively against what is already stored
//! and within the file itself. Export writes everything back out in a
//! Chatwise-compatible shape.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::backend::MemoryBackend;
use crate::categories;
use crate::error::BackendError;
use crate::tools::truncate;

/// Minimum character count for a user message to count as memorable.
const MIN_CONTENT_LENGTH: usize = 10;
/// Page size when fetching existing memories for deduplication and export.
const PAGE_SIZE: u32 = 100;

// ============================================================================
// Parsing and planning
// ============================================================================

/// One memory candidate pulled from an export file.
#[derive(Debug, Clone)]
pub struct ParsedMemory {
    pub content: String,
    pub timestamp: Option<String>,
    pub original_id: Option<Value>,
}

/// Read and parse an export file into memory candidates.
pub fn parse_export(path: &Path) -> Result<Vec<ParsedMemory>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("could not read {}", path.display()))?;
    let value: Value = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    Ok(parse_messages(&value))
}

/// Pull memorable user messages out of an export document. Accepts both a
/// bare message array and the `{"messages": [...]}` wrapper.
fn parse_messages(value: &Value) -> Vec<ParsedMemory> {
    let messages: &[Value] = match value {
        Value::Array(items) => items,
        Value::Object(_) => match value.get("messages").and_then(Value::as_array) {
            Some(items) => items,
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    messages
        .iter()
        .filter_map(|message| {
            let role = message.get("role").and_then(Value::as_str)?;
            if role != "user" {
                return None;
            }
            let content = message.get("content").and_then(Value::as_str)?.trim();
            if content.chars().count() <= MIN_CONTENT_LENGTH {
                return None;
            }
            Some(ParsedMemory {
                content: content.to_string(),
                timestamp: message
                    .get("timestamp")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                original_id: message.get("id").cloned().filter(|id| !id.is_null()),
            })
        })
        .collect()
}

/// Split of candidates into fresh memories and duplicates.
#[derive(Debug)]
pub struct ImportPlan {
    pub to_import: Vec<ParsedMemory>,
    pub skipped: usize,
}

/// Drop candidates whose content already exists (case-insensitive), either in
/// `existing` or earlier in the same batch.
pub fn plan_import(parsed: Vec<ParsedMemory>, existing: &[String]) -> ImportPlan {
    let mut seen: HashSet<String> = existing
        .iter()
        .map(|content| content.to_lowercase())
        .collect();

    let mut to_import = Vec::new();
    let mut skipped = 0;
    for memory in parsed {
        let key = memory.content.to_lowercase();
        if seen.contains(&key) {
            skipped += 1;
            continue;
        }
        seen.insert(key);
        to_import.push(memory);
    }

    ImportPlan { to_import, skipped }
}

// ============================================================================
// Reports
// ============================================================================

/// Outcome of an import run, aggregated across files for batches.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl ImportReport {
    pub fn merge(&mut self, other: ImportReport) {
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.errors.extend(other.errors);
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Import completed:".to_string(),
            format!("  Imported: {} memories", self.imported),
            format!("  Skipped:  {} duplicates", self.skipped),
            format!("  Errors:   {}", self.errors.len()),
        ];
        if !self.errors.is_empty() {
            lines.push("First errors:".to_string());
            for error in self.errors.iter().take(5) {
                lines.push(format!("  - {error}"));
            }
        }
        lines.join("\n")
    }
}

// ============================================================================
// Importer
// ============================================================================

/// Imports Chatwise exports into the memory backend for one user.
pub struct ChatwiseImporter {
    backend: Arc<dyn MemoryBackend>,
    user_id: String,
}

impl ChatwiseImporter {
    pub fn new(backend: Arc<dyn MemoryBackend>, user_id: impl Into<String>) -> Self {
        ChatwiseImporter {
            backend,
            user_id: user_id.into(),
        }
    }

    /// Import one export file.
    pub async fn import_file(&self, path: &Path, skip_duplicates: bool) -> Result<ImportReport> {
        let parsed = parse_export(path)?;
        info!(file = %path.display(), candidates = parsed.len(), "parsed export file");

        let plan = if skip_duplicates {
            let existing = self.existing_contents().await?;
            plan_import(parsed, &existing)
        } else {
            ImportPlan {
                to_import: parsed,
                skipped: 0,
            }
        };

        let mut report = ImportReport {
            skipped: plan.skipped,
            ..Default::default()
        };
        for memory in plan.to_import {
            match self.import_one(&memory).await {
                Ok(()) => report.imported += 1,
                Err(err) => report
                    .errors
                    .push(format!("Failed: {} - {err}", truncate(&memory.content, 50))),
            }
        }
        Ok(report)
    }

    /// Import several files. Unreadable files are reported, not fatal.
    pub async fn import_batch(&self, paths: &[PathBuf], skip_duplicates: bool) -> ImportReport {
        let mut total = ImportReport::default();
        for path in paths {
            match self.import_file(path, skip_duplicates).await {
                Ok(report) => total.merge(report),
                Err(err) => {
                    warn!(file = %path.display(), error = %err, "skipping export file");
                    total.errors.push(format!("{}: {err}", path.display()));
                }
            }
        }
        total
    }

    /// Export every stored memory as Chatwise-compatible JSON.
    pub async fn export_to_file(&self, output: &Path) -> Result<String> {
        let records = self.backend.list_all(&self.user_id, 1, PAGE_SIZE).await?;

        let memories: Vec<Value> = records
            .iter()
            .map(|record| {
                let (content, tags) = categories::extract_tags(&record.memory);
                json!({
                    "id": record.id,
                    "content": content,
                    "created_at": record.created_at,
                    "role": "assistant",
                    "categories": tags,
                    "metadata": record.metadata,
                })
            })
            .collect();

        let export = json!({
            "export_date": Utc::now().to_rfc3339(),
            "total_memories": memories.len(),
            "format": "chatwise_compatible",
            "memories": memories,
        });

        let text = serde_json::to_string_pretty(&export)?;
        std::fs::write(output, &text)
            .with_context(|| format!("could not write {}", output.display()))?;

        Ok(format!(
            "Exported {} memories to {}",
            records.len(),
            output.display()
        ))
    }

    async fn import_one(&self, memory: &ParsedMemory) -> Result<(), BackendError> {
        let categories = categories::categorize(&memory.content);
        let tagged = categories::format_with_tags(&memory.content, &categories);

        let mut metadata = json!({
            "source": "chatwise",
            "categories": categories,
            "imported_at": Utc::now().to_rfc3339(),
        });
        if let Some(original_id) = &memory.original_id {
            metadata["original_id"] = original_id.clone();
        }
        if let Some(timestamp) = &memory.timestamp {
            metadata["original_timestamp"] = json!(timestamp);
        }

        self.backend
            .add(&tagged, &self.user_id, Some(metadata))
            .await?;
        Ok(())
    }

    /// Clean contents of everything already stored, for deduplication.
    async fn existing_contents(&self) -> Result<Vec<String>, BackendError> {
        let records = self.backend.list_all(&self.user_id, 1, PAGE_SIZE).await?;
        Ok(records
            .into_iter()
            .map(|record| categories::extract_tags(&record.memory).0)
            .collect())
    }
}

/// Render what an import of `path` would store, without touching the backend.
pub fn preview(path: &Path, limit: usize) -> Result<String> {
    let parsed = parse_export(path)?;
    if parsed.is_empty() {
        return Ok("No memories found to import.".to_string());
    }

    let shown = limit.min(parsed.len());
    let mut out = format!(
        "Found {} potential memories to import.\n\nPreview (first {}):\n",
        parsed.len(),
        shown
    );
    out.push_str(&"-".repeat(50));
    out.push('\n');

    for (index, memory) in parsed.iter().take(limit).enumerate() {
        out.push_str(&format!("{}. {}\n", index + 1, truncate(&memory.content, 100)));
        out.push_str(&format!(
            "   Categories: {}\n\n",
            categories::suggest_category(&memory.content)
        ));
    }

    if parsed.len() > limit {
        out.push_str(&format!("... and {} more memories\n", parsed.len() - limit));
    }
    Ok(out)
}
