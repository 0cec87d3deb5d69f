//! Built-in tool implementations for Coxswain.
//!
//! Tools give a turn access to the outside world before generation:
//! general web search, weather lookup, encyclopedia summaries, and
//! person search. All four are deterministic stubs — in production each
//! would call its real API, and the stubs return plausible data so the
//! orchestration loop can be exercised end to end without network access.

pub mod encyclopedia;
pub mod general_search;
pub mod person_search;
pub mod weather;

use coxswain_core::error::ToolError;
use coxswain_core::tool::{Tool, ToolInvocation, ToolRoute};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// The tools available to the orchestrator, keyed by route.
pub struct ToolSet {
    tools: HashMap<ToolRoute, Arc<dyn Tool>>,
    timeout: Duration,
}

impl ToolSet {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tools: HashMap::new(),
            timeout,
        }
    }

    pub fn register(&mut self, route: ToolRoute, tool: Arc<dyn Tool>) {
        self.tools.insert(route, tool);
    }

    pub fn get(&self, route: ToolRoute) -> Option<Arc<dyn Tool>> {
        self.tools.get(&route).cloned()
    }

    /// Look a tool up by its wire name, for direct invocation endpoints.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .values()
            .find(|t| t.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.values().map(|t| t.name()).collect();
        names.sort_unstable();
        names
    }

    /// Run the tool selected for a route under the configured deadline.
    ///
    /// Failures and timeouts are captured in the returned invocation record
    /// rather than propagated — a tool outcome never aborts a turn.
    pub async fn invoke(&self, route: ToolRoute, query: &str) -> ToolInvocation {
        let started = Instant::now();
        let Some(tool) = self.get(route) else {
            let err = ToolError::NotFound(route.to_string());
            return ToolInvocation::err(route.as_str(), query, &err, started.elapsed());
        };

        match tokio::time::timeout(self.timeout, tool.invoke(query)).await {
            Ok(Ok(result)) => {
                info!(tool = tool.name(), latency_ms = started.elapsed().as_millis() as u64, "Tool succeeded");
                ToolInvocation::ok(tool.name(), query, result, started.elapsed())
            }
            Ok(Err(err)) => {
                warn!(tool = tool.name(), error = %err, "Tool failed");
                ToolInvocation::err(tool.name(), query, &err, started.elapsed())
            }
            Err(_) => {
                let err = ToolError::Timeout {
                    tool_name: tool.name().to_string(),
                    timeout_ms: self.timeout.as_millis() as u64,
                };
                warn!(tool = tool.name(), error = %err, "Tool timed out");
                ToolInvocation::err(tool.name(), query, &err, started.elapsed())
            }
        }
    }
}

/// The default tool set with all four built-in stubs.
pub fn default_toolset(timeout: Duration) -> ToolSet {
    let mut set = ToolSet::new(timeout);
    set.register(ToolRoute::GeneralSearch, Arc::new(general_search::GeneralSearchTool));
    set.register(ToolRoute::Weather, Arc::new(weather::WeatherTool));
    set.register(ToolRoute::Encyclopedia, Arc::new(encyclopedia::EncyclopediaTool));
    set.register(ToolRoute::PersonSearch, Arc::new(person_search::PersonSearchTool));
    set
}

/// Deterministic hash used by the stubs to vary their mock data by input.
pub(crate) fn stub_hash(input: &str) -> u32 {
    input
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32))
}
