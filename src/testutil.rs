//! Shared test fixtures: a scripted chat provider, mock tools, and a
//! recording step sink.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::agent::StepSink;
use crate::llm::{ChatMessage, FunctionCall, LlmClient, Role, ToolCall, ToolDefinition};
use crate::task::Finding;
use crate::tools::{SafetyClass, Tool};

/// Build an assistant message with plain content.
pub fn assistant_text(content: &str) -> ChatMessage {
    ChatMessage::new(Role::Assistant, content)
}

/// Build an assistant message requesting one tool call.
pub fn assistant_tool_call(id: &str, name: &str, arguments: &str) -> ChatMessage {
    ChatMessage::assistant_tool_calls(
        Some("Thinking...".to_string()),
        vec![ToolCall {
            id: id.to_string(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }],
    )
}

/// Chat provider that replays responses keyed by call index and records
/// the message snapshots it was called with.
pub struct ScriptedLlm {
    responses: Mutex<HashMap<usize, ChatMessage>>,
    errors: Mutex<HashMap<usize, String>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(HashMap::new()),
            errors: Mutex::new(HashMap::new()),
            seen: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Script the response for the `call`-th chat invocation (0-indexed).
    pub fn respond_at(&self, call: usize, message: ChatMessage) {
        self.responses.lock().unwrap().insert(call, message);
    }

    /// Script an error for the `call`-th chat invocation.
    pub fn fail_at(&self, call: usize, error: &str) {
        self.errors.lock().unwrap().insert(call, error.to_string());
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The message snapshot the `call`-th chat invocation received.
    pub fn messages_at(&self, call: usize) -> Option<Vec<ChatMessage>> {
        self.seen.lock().unwrap().get(call).cloned()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatMessage> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());

        if let Some(err) = self.errors.lock().unwrap().get(&call) {
            return Err(anyhow::anyhow!("{err}"));
        }
        if let Some(msg) = self.responses.lock().unwrap().get(&call) {
            return Ok(msg.clone());
        }
        Err(anyhow::anyhow!("no scripted response for call {call}"))
    }
}

/// Chat provider that returns the same response on every call.
pub struct RepeatingLlm {
    response: ChatMessage,
    calls: AtomicUsize,
}

impl RepeatingLlm {
    pub fn new(response: ChatMessage) -> Self {
        Self {
            response,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for RepeatingLlm {
    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _tools: &[ToolDefinition],
    ) -> anyhow::Result<ChatMessage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.response.clone())
    }
}

/// Configurable mock tool with an execution counter.
pub struct MockTool {
    name: String,
    safety: SafetyClass,
    output: String,
    error: Option<String>,
    executions: AtomicUsize,
}

impl MockTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            safety: SafetyClass::ReadOnly,
            output: "mock output".to_string(),
            error: None,
            executions: AtomicUsize::new(0),
        }
    }

    pub fn with_safety(mut self, safety: SafetyClass) -> Self {
        self.safety = safety;
        self
    }

    pub fn with_output(mut self, output: &str) -> Self {
        self.output = output.to_string();
        self
    }

    pub fn failing_with(mut self, error: &str) -> Self {
        self.error = Some(error.to_string());
        self
    }

    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "mock tool"
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({"type": "object", "properties": {}})
    }

    fn safety_class(&self) -> SafetyClass {
        self.safety
    }

    async fn execute(&self, _cancel: &CancellationToken, _args: &str) -> anyhow::Result<String> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(err) => Err(anyhow::anyhow!("{err}")),
            None => Ok(self.output.clone()),
        }
    }
}

/// Step sink that records findings and history lines.
pub struct RecordingSink {
    findings: Mutex<Vec<Finding>>,
    history: Mutex<Vec<String>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            findings: Mutex::new(Vec::new()),
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn findings(&self) -> Vec<Finding> {
        self.findings.lock().unwrap().clone()
    }

    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap().clone()
    }
}

#[async_trait]
impl StepSink for RecordingSink {
    async fn on_step(&self, finding: Option<&Finding>, history_entry: &str) {
        if let Some(f) = finding {
            self.findings.lock().unwrap().push(f.clone());
        }
        if !history_entry.is_empty() {
            self.history.lock().unwrap().push(history_entry.to_string());
        }
    }
}
