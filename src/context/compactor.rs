//! Automatic conversation compaction

use super::budget::total_tokens;
use super::ChatMessage;
use crate::config::{Config, ContextConfig};
use crate::meta::{MemoryEntry, MemoryScope, MetaDb};
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Messages kept verbatim at the start of a compacted conversation
const HEAD_MESSAGES: usize = 2;
/// Characters kept from a message with no sentence terminator
const EXCERPT_CHARS: usize = 100;
/// Maximum length of the summary carried by a [`CompactionEvent`]
const EVENT_SUMMARY_CHARS: usize = 200;
const SUMMARY_HEADER: &str = "Conversation summary";
const SUMMARY_IMPORTANCE: f64 = 0.7;

/// Record of one compaction
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionEvent {
    pub timestamp: String,
    pub messages_before: usize,
    pub messages_after: usize,
    pub tokens_before: usize,
    pub tokens_after: usize,
    pub summary: String,
}

/// Output of [`heuristic_summarize`]
#[derive(Debug, Clone, PartialEq)]
pub struct Summarized {
    pub messages: Vec<ChatMessage>,
    pub compacted_count: usize,
    /// Text of the inserted summary message; empty when nothing was compacted
    pub digest: String,
}

/// Result of [`ContextCompactor::compact`]
#[derive(Debug, Clone, Serialize)]
pub struct CompactionOutcome {
    pub messages: Vec<ChatMessage>,
    /// `None` when the conversation was left untouched
    pub event: Option<CompactionEvent>,
}

/// Whether the conversation exceeds the compaction threshold
pub fn needs_compaction(
    messages: &[ChatMessage],
    context_window: usize,
    config: &ContextConfig,
) -> bool {
    if !config.enabled {
        return false;
    }
    total_tokens(messages) as f64 > context_window as f64 * config.threshold
}

/// Replace the middle of a conversation with one extractive summary message.
///
/// The first two and the last `preserve_recent` messages are kept verbatim.
/// Conversations of `preserve_recent + 2` messages or fewer are returned
/// unchanged.
pub fn heuristic_summarize(messages: &[ChatMessage], preserve_recent: usize) -> Summarized {
    let count = messages.len();
    if count <= preserve_recent.saturating_add(HEAD_MESSAGES) {
        return Summarized {
            messages: messages.to_vec(),
            compacted_count: 0,
            digest: String::new(),
        };
    }

    let tail_start = count - preserve_recent;
    let interior = &messages[HEAD_MESSAGES..tail_start];

    let mut digest = format!("{} ({} earlier messages):", SUMMARY_HEADER, interior.len());
    for message in interior {
        digest.push_str(&format!("\n- {}: {}", message.role, first_sentence(&message.content)));
    }

    let mut compacted = Vec::with_capacity(HEAD_MESSAGES + 1 + preserve_recent);
    compacted.extend_from_slice(&messages[..HEAD_MESSAGES]);
    compacted.push(ChatMessage::system(digest.clone()));
    compacted.extend_from_slice(&messages[tail_start..]);

    Summarized {
        messages: compacted,
        compacted_count: interior.len(),
        digest,
    }
}

/// First sentence of a message, or its first 100 characters
fn first_sentence(content: &str) -> String {
    let text = content.split_whitespace().collect::<Vec<_>>().join(" ");
    match text.find(['.', '!', '?']) {
        Some(pos) => text[..=pos].to_string(),
        None => truncate_chars(&text, EXCERPT_CHARS),
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Compacts conversations and persists their summaries
pub struct ContextCompactor {
    db: MetaDb,
    config: ContextConfig,
    mirror_dir: Option<PathBuf>,
}

impl ContextCompactor {
    pub fn new(db: MetaDb, config: &Config) -> Self {
        Self {
            db,
            config: config.context.clone(),
            mirror_dir: config.memory.mirror_dir.clone(),
        }
    }

    /// Compact a conversation if it exceeds the threshold.
    ///
    /// Persistence failures are logged; the compacted messages are returned
    /// regardless.
    pub async fn compact(
        &self,
        messages: Vec<ChatMessage>,
        context_window: usize,
        chat_id: &str,
        character_id: Option<&str>,
    ) -> CompactionOutcome {
        if !needs_compaction(&messages, context_window, &self.config) {
            return CompactionOutcome {
                messages,
                event: None,
            };
        }

        let summarized = heuristic_summarize(&messages, self.config.preserve_recent_messages);
        if summarized.compacted_count == 0 {
            debug!("Over budget but too few messages to compact");
            return CompactionOutcome {
                messages,
                event: None,
            };
        }

        let (scope, source_id) = match character_id {
            Some(id) => (MemoryScope::Character, id),
            None => (MemoryScope::Chat, chat_id),
        };
        let mut entry = MemoryEntry::new(
            "summary",
            "summary",
            scope,
            Some(source_id.to_string()),
            summarized.digest.clone(),
            SUMMARY_IMPORTANCE,
        );
        entry.auto_captured = true;
        self.persist(&entry).await;

        let event = CompactionEvent {
            timestamp: Utc::now().to_rfc3339(),
            messages_before: messages.len(),
            messages_after: summarized.messages.len(),
            tokens_before: total_tokens(&messages),
            tokens_after: total_tokens(&summarized.messages),
            summary: truncate_chars(&summarized.digest, EVENT_SUMMARY_CHARS),
        };
        info!(
            chat_id = %chat_id,
            "Compacted {} messages ({} → {} tokens)",
            summarized.compacted_count,
            event.tokens_before,
            event.tokens_after
        );

        CompactionOutcome {
            messages: summarized.messages,
            event: Some(event),
        }
    }

    async fn persist(&self, entry: &MemoryEntry) {
        if let Err(e) = self.db.insert_memory_entry(entry).await {
            warn!("Failed to persist compaction summary: {}", e);
        }
        if let Some(dir) = &self.mirror_dir {
            if let Err(e) = mirror_entry(dir, entry).await {
                warn!("Failed to mirror memory entry to {}: {}", dir.display(), e);
            }
        }
    }
}

/// Write a memory entry as a markdown file
async fn mirror_entry(dir: &Path, entry: &MemoryEntry) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let body = format!(
        "---\nid: {}\ntype: {}\ncategory: {}\nscope: {}\nsource: {}\nimportance: {}\ncreated: {}\n---\n\n{}\n",
        entry.id,
        entry.entry_type,
        entry.category,
        entry.scope,
        entry.source_id.as_deref().unwrap_or(""),
        entry.importance,
        entry.created_at,
        entry.content
    );
    tokio::fs::write(dir.join(format!("{}.md", entry.id)), body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Role;
    use tempfile::TempDir;

    fn conversation(n: usize) -> Vec<ChatMessage> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("Question number {}. Some more detail here.", i))
                } else {
                    ChatMessage::assistant(format!("Answer number {} without a terminator", i))
                }
            })
            .collect()
    }

    fn config(enabled: bool) -> ContextConfig {
        ContextConfig {
            enabled,
            threshold: 0.8,
            preserve_recent_messages: 8,
            system_tokens: 200,
            persona_tokens: 300,
        }
    }

    #[test]
    fn test_needs_compaction() {
        let messages = conversation(20);
        let tokens = total_tokens(&messages);

        assert!(needs_compaction(&messages, tokens, &config(true)));
        assert!(!needs_compaction(&messages, tokens * 2, &config(true)));
        assert!(!needs_compaction(&messages, tokens, &config(false)));
        assert!(!needs_compaction(&[], 0, &config(true)));
    }

    #[test]
    fn test_needs_compaction_monotonic() {
        let mut messages = Vec::new();
        let mut previous = false;
        for i in 0..40 {
            messages.push(ChatMessage::user(format!("message {} with a few words", i)));
            let now = needs_compaction(&messages, 200, &config(true));
            assert!(now || !previous);
            previous = now;
        }
        assert!(previous);
    }

    #[test]
    fn test_summarize_twenty_messages() {
        let messages = conversation(20);
        let result = heuristic_summarize(&messages, 8);

        assert_eq!(result.compacted_count, 10);
        assert_eq!(result.messages.len(), 11);
        assert_eq!(&result.messages[..2], &messages[..2]);
        assert_eq!(&result.messages[3..], &messages[12..]);

        let summary = &result.messages[2];
        assert_eq!(summary.role, Role::System);
        assert!(summary.content.contains("Conversation summary"));
        assert!(summary.content.contains("- user: Question number 2."));
        assert!(!summary.content.contains("Some more detail"));
        assert!(summary
            .content
            .contains("- assistant: Answer number 3 without a terminator"));
        assert_eq!(
            result
                .messages
                .iter()
                .filter(|m| m.role == Role::System)
                .count(),
            1
        );
    }

    #[test]
    fn test_summarize_short_conversation_unchanged() {
        let messages = conversation(10);
        let result = heuristic_summarize(&messages, 8);
        assert_eq!(result.compacted_count, 0);
        assert_eq!(result.messages, messages);
        assert!(result.digest.is_empty());

        assert_eq!(heuristic_summarize(&[], 8).compacted_count, 0);
    }

    #[test]
    fn test_excerpt_truncates_long_messages() {
        let long = "x".repeat(300);
        assert_eq!(first_sentence(&long).len(), EXCERPT_CHARS);
        assert_eq!(first_sentence("Hi there! More text."), "Hi there!");
        assert_eq!(first_sentence("multi\n  line\ttext"), "multi line text");
    }

    #[tokio::test]
    async fn test_compact_persists_summary() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        config.memory.mirror_dir = Some(tmp.path().join("memory"));
        let db = MetaDb::connect(&config).await.unwrap();
        let compactor = ContextCompactor::new(db.clone(), &config);

        let messages = conversation(20);
        let outcome = compactor
            .compact(messages.clone(), 100, "chat-1", Some("char-9"))
            .await;

        let event = outcome.event.unwrap();
        assert_eq!(event.messages_before, 20);
        assert_eq!(event.messages_after, 11);
        assert!(event.tokens_after < event.tokens_before);
        assert!(event.summary.chars().count() <= 200);
        assert_eq!(outcome.messages.len(), 11);

        let entries = db
            .list_memory_entries(Some(MemoryScope::Character), Some("char-9"), 10)
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].entry_type, "summary");
        assert_eq!(entries[0].category, "summary");
        assert!(entries[0].auto_captured);
        assert!((entries[0].importance - 0.7).abs() < 1e-9);
        assert!(entries[0].content.starts_with("Conversation summary"));

        let mirrored = tmp.path().join("memory").join(format!("{}.md", entries[0].id));
        assert!(std::fs::read_to_string(mirrored)
            .unwrap()
            .contains("Conversation summary"));
    }

    #[tokio::test]
    async fn test_compact_noop_under_threshold() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.db_file = tmp.path().join("test.db");
        let db = MetaDb::connect(&config).await.unwrap();
        let compactor = ContextCompactor::new(db.clone(), &config);

        let messages = conversation(20);
        let outcome = compactor
            .compact(messages.clone(), 100_000, "chat-1", None)
            .await;
        assert!(outcome.event.is_none());
        assert_eq!(outcome.messages, messages);
        assert!(db
            .list_memory_entries(None, None, 10)
            .await
            .unwrap()
            .is_empty());
    }
}
