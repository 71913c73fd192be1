//! Context budgeting, compaction and memory commands

use super::Engine;
use crate::context::{
    allocate_budget, total_tokens, trim_history, BudgetRequest, ChatMessage, CompactionOutcome,
    TokenBudget,
};
use crate::error::{Error, Result};
use crate::meta::{MemoryEntry, MemoryScope};
use serde::Serialize;
use std::path::Path;

/// Budget allocation, optionally applied to a conversation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetOutput {
    pub budget: TokenBudget,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryFit>,
}

/// How a conversation fits the history allowance
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFit {
    pub messages_before: usize,
    pub messages_kept: usize,
    pub tokens_before: usize,
    pub tokens_kept: usize,
    pub messages: Vec<ChatMessage>,
}

/// Read a JSON array of `{role, content}` messages
pub async fn read_messages(path: &Path) -> Result<Vec<ChatMessage>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::Validation(format!("Cannot read {}: {}", path.display(), e)))?;
    Ok(serde_json::from_str(&raw)?)
}

/// Allocate a budget and, given messages, trim them to the history allowance
pub fn cmd_budget(request: &BudgetRequest, messages: Option<Vec<ChatMessage>>) -> BudgetOutput {
    let budget = allocate_budget(request);
    let history = messages.map(|messages| {
        let kept = trim_history(&messages, budget.history);
        HistoryFit {
            messages_before: messages.len(),
            messages_kept: kept.len(),
            tokens_before: total_tokens(&messages),
            tokens_kept: total_tokens(&kept),
            messages: kept,
        }
    });
    BudgetOutput { budget, history }
}

pub async fn cmd_compact(
    engine: &Engine,
    messages: Vec<ChatMessage>,
    context_window: usize,
    chat_id: &str,
    character_id: Option<&str>,
) -> CompactionOutcome {
    engine
        .compactor()
        .compact(messages, context_window, chat_id, character_id)
        .await
}

pub async fn cmd_list_memory(
    engine: &Engine,
    scope: Option<MemoryScope>,
    source_id: Option<&str>,
    limit: usize,
) -> Result<Vec<MemoryEntry>> {
    engine.db.list_memory_entries(scope, source_id, limit).await
}

pub fn print_budget(output: &BudgetOutput) {
    let b = &output.budget;
    println!("Token budget ({} total)", b.total);
    println!("  System:   {}", b.system);
    println!("  Persona:  {}", b.persona);
    println!("  Memory:   {}", b.memory);
    println!("  Response: {}", b.response);
    println!("  History:  {}", b.history);

    if let Some(fit) = &output.history {
        println!(
            "\nHistory: kept {}/{} messages ({} of {} tokens)",
            fit.messages_kept, fit.messages_before, fit.tokens_kept, fit.tokens_before
        );
    }
}

pub fn print_compaction(outcome: &CompactionOutcome) {
    match &outcome.event {
        Some(event) => {
            println!(
                "✓ Compacted {} → {} messages ({} → {} tokens)",
                event.messages_before,
                event.messages_after,
                event.tokens_before,
                event.tokens_after
            );
            println!("  {}", event.summary.replace('\n', " "));
        }
        None => println!("Conversation is within budget; nothing compacted."),
    }
}

pub fn print_memory(entries: &[MemoryEntry]) {
    if entries.is_empty() {
        println!("No memory entries.");
        return;
    }
    for entry in entries {
        println!(
            "{}  {}/{} [{}] importance {:.2}{}",
            entry.created_at,
            entry.entry_type,
            entry.category,
            entry.scope,
            entry.importance,
            if entry.auto_captured { " (auto)" } else { "" }
        );
        println!("  {}", entry.content.lines().next().unwrap_or_default());
    }
}
