//! Token budgeting for prompt assembly

use super::{ChatMessage, Role};
use crate::config::ContextConfig;
use serde::{Deserialize, Serialize};

/// Fixed per-message overhead added to the word-count estimate
pub const MESSAGE_OVERHEAD_TOKENS: usize = 2;

/// Estimates how many model tokens a piece of text costs
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;
}

/// `ceil(words × 1.3) + 2`, or 0 for blank text
#[derive(Debug, Clone, Copy, Default)]
pub struct WordCountEstimator;

impl TokenEstimator for WordCountEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.trim().is_empty() {
            return 0;
        }
        crate::chunk::estimate_tokens(text) + MESSAGE_OVERHEAD_TOKENS
    }
}

/// Estimate the token cost of a message body
pub fn estimate_tokens(text: &str) -> usize {
    WordCountEstimator.estimate(text)
}

/// Total estimated tokens of a conversation
pub fn total_tokens(messages: &[ChatMessage]) -> usize {
    messages.iter().map(|m| estimate_tokens(&m.content)).sum()
}

/// Inputs to [`allocate_budget`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetRequest {
    pub context_window: usize,
    pub max_response_tokens: usize,
    #[serde(default = "default_system_tokens")]
    pub system_tokens: usize,
    #[serde(default = "default_persona_tokens")]
    pub persona_tokens: usize,
    #[serde(default)]
    pub memory_tokens: usize,
}

fn default_system_tokens() -> usize {
    crate::config::default_context_system_tokens()
}

fn default_persona_tokens() -> usize {
    crate::config::default_context_persona_tokens()
}

impl BudgetRequest {
    pub fn new(context_window: usize, max_response_tokens: usize) -> Self {
        Self {
            context_window,
            max_response_tokens,
            system_tokens: default_system_tokens(),
            persona_tokens: default_persona_tokens(),
            memory_tokens: 0,
        }
    }

    /// Use the configured system/persona reservations
    pub fn with_config(mut self, config: &ContextConfig) -> Self {
        self.system_tokens = config.system_tokens;
        self.persona_tokens = config.persona_tokens;
        self
    }

    pub fn with_memory_tokens(mut self, memory_tokens: usize) -> Self {
        self.memory_tokens = memory_tokens;
        self
    }
}

/// Per-section token allowances
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub total: usize,
    pub system: usize,
    pub persona: usize,
    pub memory: usize,
    pub history: usize,
    pub response: usize,
}

/// Split a context window into section allowances.
///
/// History gets whatever remains after the fixed reservations and is never
/// negative.
pub fn allocate_budget(request: &BudgetRequest) -> TokenBudget {
    let reserved = request
        .max_response_tokens
        .saturating_add(request.system_tokens)
        .saturating_add(request.persona_tokens)
        .saturating_add(request.memory_tokens);

    TokenBudget {
        total: request.context_window,
        system: request.system_tokens,
        persona: request.persona_tokens,
        memory: request.memory_tokens,
        history: request.context_window.saturating_sub(reserved),
        response: request.max_response_tokens,
    }
}

/// Trim conversation history to fit `max_tokens` using the word-count estimator
pub fn trim_history(messages: &[ChatMessage], max_tokens: usize) -> Vec<ChatMessage> {
    trim_history_with(&WordCountEstimator, messages, max_tokens)
}

/// Trim conversation history to fit `max_tokens`.
///
/// System messages are always kept. Non-system messages are kept newest
/// first until one does not fit; it and everything older are dropped. The
/// result lists the system messages first, then the kept messages in their
/// original order.
pub fn trim_history_with(
    estimator: &dyn TokenEstimator,
    messages: &[ChatMessage],
    max_tokens: usize,
) -> Vec<ChatMessage> {
    let costs: Vec<usize> = messages
        .iter()
        .map(|m| estimator.estimate(&m.content))
        .collect();
    if costs.iter().sum::<usize>() <= max_tokens {
        return messages.to_vec();
    }

    let system_cost: usize = messages
        .iter()
        .zip(&costs)
        .filter(|(m, _)| m.role == Role::System)
        .map(|(_, cost)| *cost)
        .sum();
    let mut remaining = max_tokens.saturating_sub(system_cost);

    let mut keep_from = messages.len();
    for (i, message) in messages.iter().enumerate().rev() {
        if message.role == Role::System {
            continue;
        }
        if costs[i] > remaining {
            break;
        }
        remaining -= costs[i];
        keep_from = i;
    }

    let system = messages.iter().filter(|m| m.role == Role::System);
    let recent = messages
        .iter()
        .enumerate()
        .filter(|(i, m)| *i >= keep_from && m.role != Role::System)
        .map(|(_, m)| m);
    system.chain(recent).cloned().collect()
}
