//! Input token budget enforcement.
//!
//! The system prompt and user message are fixed costs and never trimmed.
//! History and retrieval records are first trimmed against their own caps,
//! then against the aggregate input ceiling in the configured priority
//! order. History always loses turns from the oldest end; retrieval always
//! keeps a greedy prefix of its rank order.

use ragctx_config::{BudgetConfig, TrimPriority};
use ragctx_core::{ConversationTurn, RetrievalHit};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::token::TokenCounter;

// ── Types ──────────────────────────────────────────────────────────────────

/// Token ceilings for one generation call. Every cap is literal: 0 allows
/// nothing in that category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenBudget {
    pub max_history_tokens: usize,
    pub max_retrieval_tokens: usize,
    pub max_input_tokens: usize,
    /// Not enforced here; handed to the generation collaborator.
    pub max_output_tokens: usize,
}

impl Default for TokenBudget {
    fn default() -> Self {
        Self {
            max_history_tokens: 2000,
            max_retrieval_tokens: 1500,
            max_input_tokens: 4000,
            max_output_tokens: 2048,
        }
    }
}

impl From<&BudgetConfig> for TokenBudget {
    fn from(config: &BudgetConfig) -> Self {
        Self {
            max_history_tokens: config.max_history_tokens,
            max_retrieval_tokens: config.max_retrieval_tokens,
            max_input_tokens: config.max_input_tokens,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropCategory {
    History,
    Retrieval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The category's own cap
    CategoryLimit,
    /// The aggregate input ceiling
    InputLimit,
}

/// One trimming step, for observability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropInfo {
    pub category: DropCategory,
    pub items_dropped: usize,
    pub tokens_dropped: usize,
    pub reason: DropReason,
}

/// Per-category token breakdown of the final, trimmed input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub system_tokens: usize,
    pub history_tokens: usize,
    pub user_tokens: usize,
    pub retrieval_tokens: usize,
    pub total_tokens: usize,
    pub max_input_tokens: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drops: Vec<DropInfo>,
}

impl TokenUsage {
    /// True only when the fixed costs alone exceed the input ceiling.
    pub fn is_over_budget(&self) -> bool {
        self.total_tokens > self.max_input_tokens
    }

    pub fn overage(&self) -> usize {
        self.total_tokens.saturating_sub(self.max_input_tokens)
    }
}

#[derive(Debug, Clone)]
pub struct BudgetOutcome {
    pub history: Vec<ConversationTurn>,
    pub records: Vec<RetrievalHit>,
    pub usage: TokenUsage,
}

// ── Enforcer ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TokenBudgetEnforcer {
    counter: TokenCounter,
    budget: TokenBudget,
    priority: TrimPriority,
}

impl TokenBudgetEnforcer {
    pub fn new(counter: TokenCounter, budget: TokenBudget) -> Self {
        Self {
            counter,
            budget,
            priority: TrimPriority::default(),
        }
    }

    pub fn from_config(counter: TokenCounter, config: &BudgetConfig) -> Self {
        Self::new(counter, TokenBudget::from(config)).with_priority(config.trim_priority)
    }

    pub fn with_priority(mut self, priority: TrimPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn budget(&self) -> &TokenBudget {
        &self.budget
    }

    pub fn priority(&self) -> TrimPriority {
        self.priority
    }

    /// Trim `history` and `records` so the whole input fits the budget.
    ///
    /// Never fails. If the system prompt and user message alone exceed
    /// `max_input_tokens`, both trimmable categories come back empty and the
    /// overage is visible through [`TokenUsage::overage`].
    pub fn enforce_input_budget(
        &self,
        system_prompt: &str,
        history: &[ConversationTurn],
        user_message: &str,
        records: &[RetrievalHit],
    ) -> BudgetOutcome {
        let system_tokens = self.counter.count_tokens(system_prompt);
        let user_tokens = self.counter.count_tokens(user_message);
        let fixed = system_tokens + user_tokens;
        let max_input = self.budget.max_input_tokens;

        let turn_costs: Vec<usize> = history
            .iter()
            .map(|t| self.counter.count_tokens(&t.content))
            .collect();
        let record_costs: Vec<usize> = records
            .iter()
            .map(|r| self.counter.count_tokens(r.text()))
            .collect();

        let mut drops = Vec::new();
        let mut turns = Trim::new(&turn_costs);
        let mut kept = Trim::new(&record_costs);

        // Independent per-category caps.
        turns.drop_oldest_while(|tokens| tokens > self.budget.max_history_tokens);
        turns.record(DropCategory::History, DropReason::CategoryLimit, &mut drops);
        kept.greedy_prefix(self.budget.max_retrieval_tokens);
        kept.record(DropCategory::Retrieval, DropReason::CategoryLimit, &mut drops);

        // Aggregate ceiling.
        if fixed + turns.tokens + kept.tokens > max_input {
            match self.priority {
                TrimPriority::HistoryFirst => {
                    let retrieval = kept.tokens;
                    turns.drop_oldest_while(|tokens| fixed + tokens + retrieval > max_input);
                    if fixed + turns.tokens + kept.tokens > max_input {
                        kept.greedy_prefix(max_input.saturating_sub(fixed + turns.tokens));
                    }
                }
                TrimPriority::RetrievalFirst => {
                    kept.greedy_prefix(max_input.saturating_sub(fixed + turns.tokens));
                    let retrieval = kept.tokens;
                    turns.drop_oldest_while(|tokens| fixed + tokens + retrieval > max_input);
                }
            }
            turns.record(DropCategory::History, DropReason::InputLimit, &mut drops);
            kept.record(DropCategory::Retrieval, DropReason::InputLimit, &mut drops);
        }

        let usage = TokenUsage {
            system_tokens,
            history_tokens: turns.tokens,
            user_tokens,
            retrieval_tokens: kept.tokens,
            total_tokens: fixed + turns.tokens + kept.tokens,
            max_input_tokens: max_input,
            drops,
        };

        if usage.is_over_budget() {
            warn!(
                fixed_tokens = fixed,
                max_input_tokens = max_input,
                overage = usage.overage(),
                "System prompt and user message exceed the input budget"
            );
        } else if !usage.drops.is_empty() {
            debug!(
                history_turns = turns.len(),
                retrieval_records = kept.len(),
                total_tokens = usage.total_tokens,
                max_input_tokens = max_input,
                "Input trimmed to budget"
            );
        }

        BudgetOutcome {
            history: history[turns.range()].to_vec(),
            records: records[kept.range()].to_vec(),
            usage,
        }
    }
}

// ── Trimming state ─────────────────────────────────────────────────────────

/// A contiguous window over cached item costs. History windows shrink from
/// the front (oldest first), retrieval windows from the back (lowest rank).
struct Trim<'a> {
    costs: &'a [usize],
    start: usize,
    end: usize,
    tokens: usize,
    // Since the last `record` call.
    dropped_items: usize,
    dropped_tokens: usize,
}

impl<'a> Trim<'a> {
    fn new(costs: &'a [usize]) -> Self {
        Self {
            costs,
            start: 0,
            end: costs.len(),
            tokens: costs.iter().sum(),
            dropped_items: 0,
            dropped_tokens: 0,
        }
    }

    fn len(&self) -> usize {
        self.end - self.start
    }

    fn range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }

    fn drop_oldest_while(&mut self, over: impl Fn(usize) -> bool) {
        while self.start < self.end && over(self.tokens) {
            let cost = self.costs[self.start];
            self.start += 1;
            self.tokens -= cost;
            self.dropped_items += 1;
            self.dropped_tokens += cost;
        }
    }

    /// Keep the longest prefix of the current window whose running total
    /// stays within `cap`. Stops at the first record that would overflow.
    fn greedy_prefix(&mut self, cap: usize) {
        let mut total = 0;
        let mut end = self.start;
        while end < self.end && total + self.costs[end] <= cap {
            total += self.costs[end];
            end += 1;
        }
        self.dropped_items += self.end - end;
        self.dropped_tokens += self.tokens - total;
        self.end = end;
        self.tokens = total;
    }

    fn record(&mut self, category: DropCategory, reason: DropReason, drops: &mut Vec<DropInfo>) {
        if self.dropped_items > 0 {
            drops.push(DropInfo {
                category,
                items_dropped: self.dropped_items,
                tokens_dropped: self.dropped_tokens,
                reason,
            });
        }
        self.dropped_items = 0;
        self.dropped_tokens = 0;
    }
}
