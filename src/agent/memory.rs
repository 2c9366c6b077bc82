//! Ordered conversation record for one agent run.

use std::sync::RwLock;

use crate::llm::{ChatMessage, Role, ToolCall};

/// Thread-safe append + snapshot-read conversation history.
///
/// Owned by a single agent run; the read-write lock permits safe inspection
/// from tests and diagnostics while the run is in flight.
#[derive(Default)]
pub struct ConversationMemory {
    messages: RwLock<Vec<ChatMessage>>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user message.
    pub fn add_user(&self, content: impl Into<String>) {
        self.push(ChatMessage::new(Role::User, content));
    }

    /// Append a plain assistant message.
    pub fn add_assistant(&self, content: impl Into<String>) {
        self.push(ChatMessage::new(Role::Assistant, content));
    }

    /// Append an assistant message that requests tool calls.
    pub fn add_assistant_tool_calls(&self, content: Option<String>, tool_calls: Vec<ToolCall>) {
        self.push(ChatMessage::assistant_tool_calls(content, tool_calls));
    }

    /// Append a tool execution result keyed by the originating call id.
    pub fn add_tool_output(&self, tool_call_id: impl Into<String>, content: impl Into<String>) {
        self.push(ChatMessage::tool_result(tool_call_id, content));
    }

    /// A copy of the full conversation history.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        self.messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.messages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn push(&self, message: ChatMessage) {
        self.messages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::FunctionCall;

    #[test]
    fn appends_preserve_order() {
        let memory = ConversationMemory::new();
        memory.add_user("goal");
        memory.add_assistant("thinking");
        memory.add_tool_output("call_1", "output");

        let history = memory.snapshot();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[2].role, Role::Tool);
        assert_eq!(history[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let memory = ConversationMemory::new();
        memory.add_user("one");
        let snapshot = memory.snapshot();
        memory.add_user("two");
        assert_eq!(snapshot.len(), 1);
        assert_eq!(memory.len(), 2);
    }

    #[test]
    fn tool_call_request_is_recorded() {
        let memory = ConversationMemory::new();
        memory.add_assistant_tool_calls(
            Some("checking logs".to_string()),
            vec![ToolCall {
                id: "call_1".to_string(),
                call_type: "function".to_string(),
                function: FunctionCall {
                    name: "get_pod_logs".to_string(),
                    arguments: "{}".to_string(),
                },
            }],
        );

        let history = memory.snapshot();
        assert_eq!(history[0].requested_tool_calls().len(), 1);
        assert_eq!(history[0].requested_tool_calls()[0].function.name, "get_pod_logs");
    }
}
