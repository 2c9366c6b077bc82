//! Typed terminal errors for an agent run.

use thiserror::Error;

/// How many identical consecutive tool invocations abort a run.
///
/// Two identical calls are legitimate (retry after a transient error);
/// four would let the agent burn budget.
pub(crate) const REPEAT_WINDOW: usize = 3;

/// The ways an agent run terminates without a result.
///
/// The reconciler pattern-matches on these: `WaitingForApproval` parks the
/// task rather than failing it, and `Cancelled` writes no terminal status at
/// all so the next reconcile resumes the run.
#[derive(Debug, Error)]
pub enum AgentError {
    /// A `HighRisk` tool was selected while the task was unapproved.
    #[error("tool {tool} requires approval")]
    WaitingForApproval { tool: String },

    /// The run's cancellation token fired.
    #[error("agent run cancelled")]
    Cancelled,

    /// The step budget ran out before the model concluded.
    #[error("agent exceeded maximum steps ({0})")]
    MaxStepsExceeded(usize),

    /// The same tool was invoked with identical arguments `REPEAT_WINDOW`
    /// times in a row.
    #[error("agent loop detected: tool {tool:?} called with identical arguments {window} consecutive times, aborting to prevent runaway token consumption", window = REPEAT_WINDOW)]
    LoopDetected { tool: String },

    /// The chat provider returned an unrecoverable error.
    #[error("failed to chat with LLM: {0}")]
    Chat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_details_consumers_match_on() {
        let err = AgentError::WaitingForApproval {
            tool: "delete_pod".to_string(),
        };
        assert_eq!(err.to_string(), "tool delete_pod requires approval");

        let err = AgentError::MaxStepsExceeded(3);
        assert_eq!(err.to_string(), "agent exceeded maximum steps (3)");

        let err = AgentError::LoopDetected {
            tool: "get_pod_logs".to_string(),
        };
        assert!(err.to_string().contains("loop detected"));
        assert!(err.to_string().contains("get_pod_logs"));
    }
}
