//! Context window management
//!
//! - [`budget`]: token estimation, section allowances, history trimming
//! - [`compactor`]: threshold detection and extractive summarization of
//!   older turns, persisted as memory entries

pub mod budget;
pub mod compactor;

pub use budget::{
    allocate_budget, estimate_tokens, total_tokens, trim_history, trim_history_with,
    BudgetRequest, TokenBudget, TokenEstimator, WordCountEstimator,
};
pub use compactor::{
    heuristic_summarize, needs_compaction, CompactionEvent, CompactionOutcome, ContextCompactor,
    Summarized,
};

use serde::{Deserialize, Serialize};

/// Speaker of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}
