//! Budget measurement for context assembly.
//!
//! Budgets are configured in either characters or tokens. Token counts use
//! a character-based heuristic (1 token ≈ 4 characters, rounded up), which
//! is within ~10% of BPE tokenizers on English text and keeps assembly
//! deterministic.

use serde::{Deserialize, Serialize};

/// The unit a budget is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetUnit {
    Chars,
    Tokens,
}

impl BudgetUnit {
    /// Parse a config string. Unknown units were rejected at config
    /// validation, so this only sees "chars" or "tokens".
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "chars" => Some(Self::Chars),
            "tokens" => Some(Self::Tokens),
            _ => None,
        }
    }

    /// Cost of a piece of text in this unit.
    pub fn measure(&self, text: &str) -> usize {
        match self {
            Self::Chars => text.chars().count(),
            Self::Tokens => {
                if text.is_empty() {
                    0
                } else {
                    (text.len() + 3) / 4
                }
            }
        }
    }

    /// Per-message framing overhead (role name, delimiters).
    pub fn message_overhead(&self) -> usize {
        match self {
            Self::Chars => 16,
            Self::Tokens => 4,
        }
    }
}

/// A total assembly budget.
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub limit: usize,
    pub unit: BudgetUnit,
}

impl Budget {
    pub fn new(limit: usize, unit: BudgetUnit) -> Self {
        Self { limit, unit }
    }

    pub fn measure(&self, text: &str) -> usize {
        self.unit.measure(text)
    }

    /// Cost of one conversation turn's content plus framing.
    pub fn measure_turn(&self, content: &str) -> usize {
        self.unit.measure(content) + self.unit.message_overhead()
    }
}

impl Default for Budget {
    fn default() -> Self {
        Self {
            limit: 4096,
            unit: BudgetUnit::Tokens,
        }
    }
}
