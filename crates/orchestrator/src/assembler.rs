//! Context assembly — builds the bounded prompt for one generation.
//!
//! Layers fill a single budget in strict priority order:
//!
//! 1. **System prompt** — never trimmed
//! 2. **Retrieved chunks** — highest similarity first, lowest dropped
//! 3. **Tool result** — at most one, dropped whole if it does not fit
//! 4. **Conversation history** — newest kept, oldest dropped
//! 5. **User message** — never trimmed
//!
//! Drops are whole-unit: a chunk, tool result, or turn is either fully in
//! or fully out. Assembly is deterministic — identical inputs always
//! produce identical output.

use crate::budget::Budget;
use coxswain_core::tool::ToolInvocation;
use coxswain_core::turn::{Role, Turn};
use coxswain_retrieval::ScoredChunk;
use serde::{Deserialize, Serialize};

/// All inputs for assembling one turn's context.
pub struct AssemblyInput<'a> {
    /// The session's system prompt.
    pub system_prompt: &'a str,
    /// Retrieved chunks, pre-sorted by similarity descending.
    pub chunks: &'a [ScoredChunk],
    /// The turn's tool invocation, if one ran.
    pub tool_invocation: Option<&'a ToolInvocation>,
    /// Conversation history, oldest first. System turns are skipped here;
    /// the system layer owns that content.
    pub history: &'a [Turn],
    /// The current user message.
    pub user_message: &'a str,
}

/// The assembled context, ready for the engine.
#[derive(Debug, Clone)]
pub struct AssembledContext {
    /// System message: system prompt plus injected context sections.
    pub system: String,
    /// History window plus the current user message, in order.
    pub turns: Vec<Turn>,
    pub metadata: AssemblyMetadata,
}

/// What the assembler kept, what it dropped, and what it cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyMetadata {
    pub total_cost: usize,
    pub budget: usize,
    pub per_layer: Vec<LayerStats>,
    pub drops: Vec<DropInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerStats {
    pub name: String,
    pub cost: usize,
    pub items_included: usize,
    pub items_total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DropInfo {
    pub layer: String,
    pub items_dropped: usize,
    pub reason: String,
}

/// The fixed layers alone exceed the budget; nothing sensible can be sent.
#[derive(Debug, Clone)]
pub struct AssemblyError {
    pub fixed_cost: usize,
    pub budget: usize,
}

impl std::fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "System prompt and user message ({} units) exceed the context budget ({} units)",
            self.fixed_cost, self.budget
        )
    }
}

impl std::error::Error for AssemblyError {}

/// The context assembler. Stateless — create one and reuse it.
pub struct ContextAssembler {
    budget: Budget,
}

impl ContextAssembler {
    pub fn new(budget: Budget) -> Self {
        Self { budget }
    }

    /// Assemble a context from all layers in priority order.
    pub fn assemble(&self, input: &AssemblyInput<'_>) -> Result<AssembledContext, AssemblyError> {
        let mut stats: Vec<LayerStats> = Vec::new();
        let mut drops: Vec<DropInfo> = Vec::new();

        // Fixed layers first: system prompt and user message must both fit.
        let system_cost = self.budget.measure(input.system_prompt);
        let user_cost = self.budget.measure_turn(input.user_message);
        let fixed_cost = system_cost + user_cost;
        if fixed_cost > self.budget.limit {
            return Err(AssemblyError {
                fixed_cost,
                budget: self.budget.limit,
            });
        }

        stats.push(LayerStats {
            name: "system".into(),
            cost: system_cost,
            items_included: 1,
            items_total: 1,
        });

        let mut remaining = self.budget.limit - fixed_cost;
        let mut sections: Vec<String> = Vec::new();

        // Retrieved chunks, best first.
        let (chunk_section, chunk_stats, chunk_drop) = self.render_chunks(input.chunks, remaining);
        remaining -= chunk_stats.cost;
        if let Some(section) = chunk_section {
            sections.push(section);
        }
        stats.push(chunk_stats);
        drops.extend(chunk_drop);

        // Tool result, all-or-nothing.
        let (tool_section, tool_stats, tool_drop) =
            self.render_tool_result(input.tool_invocation, remaining);
        remaining -= tool_stats.cost;
        if let Some(section) = tool_section {
            sections.push(section);
        }
        stats.push(tool_stats);
        drops.extend(tool_drop);

        // History window: fill newest-first, emit oldest-first.
        let (history, history_stats, history_drop) = self.render_history(input.history, remaining);
        stats.push(history_stats);
        drops.extend(history_drop);

        let system = if sections.is_empty() {
            input.system_prompt.to_string()
        } else if input.system_prompt.is_empty() {
            sections.join("\n\n")
        } else {
            format!("{}\n\n{}", input.system_prompt, sections.join("\n\n"))
        };

        let mut turns = history;
        turns.push(Turn::user(input.user_message));

        stats.push(LayerStats {
            name: "user_message".into(),
            cost: user_cost,
            items_included: 1,
            items_total: 1,
        });

        let total_cost: usize = stats.iter().map(|s| s.cost).sum();
        Ok(AssembledContext {
            system,
            turns,
            metadata: AssemblyMetadata {
                total_cost,
                budget: self.budget.limit,
                per_layer: stats,
                drops,
            },
        })
    }

    fn render_chunks(
        &self,
        chunks: &[ScoredChunk],
        available: usize,
    ) -> (Option<String>, LayerStats, Option<DropInfo>) {
        let layer = "retrieved_chunks";
        if chunks.is_empty() {
            return (None, empty_stats(layer, 0), None);
        }

        let header = "[Retrieved Context]\n";
        let mut used = self.budget.measure(header);
        if used >= available {
            return (
                None,
                empty_stats(layer, chunks.len()),
                Some(DropInfo {
                    layer: layer.into(),
                    items_dropped: chunks.len(),
                    reason: "No budget left for retrieved chunks".into(),
                }),
            );
        }

        // Fill best-first and stop at the first chunk that does not fit:
        // a lower-similarity chunk must never leapfrog a higher one.
        let mut lines = Vec::new();
        let mut dropped = 0;
        for scored in chunks {
            let line = format!(
                "[Source: {}] {}\n",
                scored.chunk.source_name, scored.chunk.text
            );
            let cost = self.budget.measure(&line);
            if used + cost > available {
                dropped = chunks.len() - lines.len();
                break;
            }
            lines.push(line);
            used += cost;
        }

        if lines.is_empty() {
            return (
                None,
                empty_stats(layer, chunks.len()),
                maybe_drop(layer, dropped, "Lowest-similarity chunks dropped"),
            );
        }

        (
            Some(format!("{header}{}", lines.join(""))),
            LayerStats {
                name: layer.into(),
                cost: used,
                items_included: lines.len(),
                items_total: chunks.len(),
            },
            maybe_drop(layer, dropped, "Lowest-similarity chunks dropped"),
        )
    }

    fn render_tool_result(
        &self,
        invocation: Option<&ToolInvocation>,
        available: usize,
    ) -> (Option<String>, LayerStats, Option<DropInfo>) {
        let layer = "tool_result";
        let Some(invocation) = invocation else {
            return (None, empty_stats(layer, 0), None);
        };
        let Some(result) = invocation.outcome.result() else {
            // Failed invocations never enter the context.
            return (None, empty_stats(layer, 0), None);
        };

        let section = format!("[Tool Result: {}]\n{}\n", invocation.tool_name, result);
        let cost = self.budget.measure(&section);
        if cost > available {
            return (
                None,
                empty_stats(layer, 1),
                Some(DropInfo {
                    layer: layer.into(),
                    items_dropped: 1,
                    reason: "Tool result did not fit the remaining budget".into(),
                }),
            );
        }

        (
            Some(section),
            LayerStats {
                name: layer.into(),
                cost,
                items_included: 1,
                items_total: 1,
            },
            None,
        )
    }

    fn render_history(
        &self,
        history: &[Turn],
        available: usize,
    ) -> (Vec<Turn>, LayerStats, Option<DropInfo>) {
        let layer = "history";
        let eligible: Vec<&Turn> = history.iter().filter(|t| t.role != Role::System).collect();
        if eligible.is_empty() {
            return (Vec::new(), empty_stats(layer, 0), None);
        }

        let mut used = 0;
        let mut included: Vec<Turn> = Vec::new();
        let mut dropped = 0;

        // Fill newest-first and stop at the first turn that does not fit,
        // so the kept window is always a contiguous recent tail.
        for turn in eligible.iter().rev() {
            let cost = self.budget.measure_turn(&turn.content);
            if used + cost > available {
                dropped = eligible.len() - included.len();
                break;
            }
            included.push((*turn).clone());
            used += cost;
        }
        included.reverse();

        let included_count = included.len();
        (
            included,
            LayerStats {
                name: layer.into(),
                cost: used,
                items_included: included_count,
                items_total: eligible.len(),
            },
            maybe_drop(layer, dropped, "Oldest turns dropped"),
        )
    }
}

fn empty_stats(layer: &str, total: usize) -> LayerStats {
    LayerStats {
        name: layer.into(),
        cost: 0,
        items_included: 0,
        items_total: total,
    }
}

fn maybe_drop(layer: &str, count: usize, reason: &str) -> Option<DropInfo> {
    (count > 0).then(|| DropInfo {
        layer: layer.into(),
        items_dropped: count,
        reason: reason.into(),
    })
}
