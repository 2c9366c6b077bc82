//! Tool system for the agent.
//!
//! Tools are the agent's eyes and hands on the cluster. Each tool is a named
//! record with a fixed capability set: name, description, JSON schema for
//! its arguments, a safety class, and an execute function. Implementations
//! live behind [`ToolProvider`]s; the [`ToolRouter`] aggregates them and
//! presents the union to the rest of the system.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::llm::{FunctionDefinition, ToolDefinition};

/// Risk level of a tool.
///
/// `ReadOnly` and `LowRisk` tools execute freely. `HighRisk` tools are gated
/// behind task approval. `Forbidden` tools are never executed; a request for
/// one is answered with a synthetic error so the model can re-plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyClass {
    ReadOnly,
    LowRisk,
    HighRisk,
    Forbidden,
}

/// Trait for implementing tools.
///
/// `execute` takes the run's cancellation token so blocking cluster calls
/// can be interrupted when the task is cancelled or times out. Arguments
/// arrive as the raw JSON string the LLM produced.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool.
    fn name(&self) -> &str;

    /// A description of what this tool does.
    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments.
    fn schema(&self) -> serde_json::Value;

    /// Risk classification. Pure function of tool identity.
    fn safety_class(&self) -> SafetyClass;

    /// Execute the tool with the given JSON argument string.
    async fn execute(&self, cancel: &CancellationToken, args: &str) -> anyhow::Result<String>;
}

/// A source of tools (in-process cluster inspectors, MCP bridges, remote
/// services).
#[async_trait]
pub trait ToolProvider: Send + Sync {
    /// Name of this provider, used in logs.
    fn name(&self) -> &str;

    /// List the tools this provider currently offers.
    async fn list_tools(&self) -> anyhow::Result<Vec<Arc<dyn Tool>>>;
}

/// Aggregates tools from multiple providers.
///
/// A provider failure is logged and its tools omitted; the union of the
/// remaining providers is returned without error so one unreachable bridge
/// never takes diagnosis offline.
#[derive(Default)]
pub struct ToolRouter {
    providers: Vec<Arc<dyn ToolProvider>>,
}

impl ToolRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool provider to the router.
    pub fn add_provider(&mut self, provider: Arc<dyn ToolProvider>) {
        self.providers.push(provider);
    }

    /// Return the union of tools from all providers.
    pub async fn list_tools(&self) -> Vec<Arc<dyn Tool>> {
        let mut all = Vec::new();
        for provider in &self.providers {
            match provider.list_tools().await {
                Ok(tools) => all.extend(tools),
                Err(e) => {
                    // External providers may not be ready; skip and continue.
                    tracing::warn!(provider = provider.name(), error = %e,
                        "failed to list tools from provider, skipping");
                }
            }
        }
        all
    }
}

/// A fixed, in-process set of tools.
pub struct StaticToolProvider {
    name: String,
    tools: Vec<Arc<dyn Tool>>,
}

impl StaticToolProvider {
    pub fn new(name: impl Into<String>, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            name: name.into(),
            tools,
        }
    }
}

#[async_trait]
impl ToolProvider for StaticToolProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn list_tools(&self) -> anyhow::Result<Vec<Arc<dyn Tool>>> {
        Ok(self.tools.clone())
    }
}

/// A snapshot of tools available to one agent run, indexed by name.
#[derive(Clone, Default)]
pub struct ToolSet {
    by_name: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl ToolSet {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        let mut set = Self::default();
        for tool in tools {
            set.insert(tool);
        }
        set
    }

    fn insert(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.by_name.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Retain only the tools named in `allowed`.
    pub fn filtered(&self, allowed: &[String]) -> Self {
        let mut set = Self::default();
        for name in &self.order {
            if allowed.iter().any(|a| a == name) {
                if let Some(tool) = self.by_name.get(name) {
                    set.insert(Arc::clone(tool));
                }
            }
        }
        set
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Tool schemas in the chat-completions format.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.by_name.get(name))
            .map(|t| ToolDefinition {
                tool_type: "function".to_string(),
                function: FunctionDefinition {
                    name: t.name().to_string(),
                    description: t.description().to_string(),
                    parameters: t.schema(),
                },
            })
            .collect()
    }
}
