//! The bounded think-act-observe executor.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use tokio_util::sync::CancellationToken;

use crate::llm::LlmClient;
use crate::skill::Skill;
use crate::task::Finding;
use crate::tools::{SafetyClass, ToolSet};
use crate::util::truncate_with_ellipsis;

use super::error::REPEAT_WINDOW;
use super::{AgentError, ConversationMemory};

/// Characters of LLM content kept in a "Think" history line.
const THINK_PREVIEW_CHARS: usize = 500;

/// Characters of tool output kept in a finding summary.
const SUMMARY_CHARS: usize = 200;

/// Final outcome of a successful agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosisResult {
    pub root_cause: String,
    pub suggestion: String,
}

/// Receiver for per-step checkpoints.
///
/// `finding` is present for tool observations and absent for think/conclude
/// history lines. The sink routes through the reconciler's commit path; the
/// agent never touches task status directly.
#[async_trait]
pub trait StepSink: Send + Sync {
    async fn on_step(&self, finding: Option<&Finding>, history_entry: &str);
}

/// The reason-act loop.
///
/// One instance drives one run. The loop is strictly sequential: think, act
/// on every requested tool in request order, observe all outputs, then the
/// next step.
pub struct AgentLoop {
    llm: Arc<dyn LlmClient>,
    tools: ToolSet,
    memory: ConversationMemory,
    max_steps: usize,
    sink: Option<Arc<dyn StepSink>>,
    skill: Skill,
}

impl AgentLoop {
    /// Create a loop bound to a skill.
    ///
    /// When the skill carries a tool whitelist, the set presented to the
    /// LLM is filtered to it. The skill's system prompt becomes the first
    /// memory entry.
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: ToolSet,
        max_steps: usize,
        sink: Option<Arc<dyn StepSink>>,
        skill: Skill,
    ) -> Self {
        let tools = if skill.allowed_tools.is_empty() {
            tools
        } else {
            tools.filtered(&skill.allowed_tools)
        };

        let memory = ConversationMemory::new();
        if !skill.system_prompt.is_empty() {
            memory.add_user(format!("SYSTEM INSTRUCTION: {}", skill.system_prompt));
        }

        Self {
            llm,
            tools,
            memory,
            max_steps,
            sink,
            skill,
        }
    }

    /// The conversation record of this run.
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Add a user message to memory before the run starts. The reconciler
    /// uses this to push recent-alert and similar-diagnosis context.
    pub fn inject_context(&self, msg: &str) {
        self.memory.add_user(msg);
    }

    /// Re-inject prior findings after a restart.
    ///
    /// This is the only state an agent carries across restarts; the step
    /// counter starts fresh.
    pub fn restore(&self, findings: &[Finding]) {
        if findings.is_empty() {
            return;
        }
        tracing::info!(findings = findings.len(), "restoring from checkpoint");

        let mut summary = String::from(
            "Previous diagnosis findings (restored from checkpoint). \
             Continue the investigation from these results without repeating them:\n",
        );
        for f in findings {
            summary.push_str(&format!("- Step {} [{}]: {}\n", f.step, f.tool_name, f.summary));
        }
        self.memory.add_user(summary);
    }

    /// Execute the loop for a goal.
    ///
    /// Returns the extracted `(root cause, suggestion)` on success, or a
    /// typed [`AgentError`] when the run terminates without one.
    pub async fn run(
        &self,
        cancel: &CancellationToken,
        goal: &str,
        approved: bool,
    ) -> Result<DiagnosisResult, AgentError> {
        tracing::info!(goal, skill = %self.skill.name, approved, "starting agent run");

        self.memory.add_user(format!(
            "Diagnosis Goal: {goal}\n\n\
             When you have enough information to conclude, respond with:\n\
             Root Cause: <concise root cause>\n\
             Suggestion: <actionable remediation>"
        ));

        let definitions = self.tools.definitions();
        let mut findings: Vec<Finding> = Vec::new();

        for step in 1..=self.max_steps {
            if cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }

            tracing::debug!(step, "executing step");

            // Think.
            let snapshot = self.memory.snapshot();
            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(AgentError::Cancelled),
                r = self.llm.chat(&snapshot, &definitions) => {
                    r.map_err(|e| AgentError::Chat(e.to_string()))?
                }
            };

            let content = response.content.clone().unwrap_or_default();
            self.emit(
                None,
                format!(
                    "Step {step} (Think): {}",
                    truncate_with_ellipsis(&content, THINK_PREVIEW_CHARS)
                ),
            )
            .await;

            let tool_calls = response.tool_calls.unwrap_or_default();

            // No tool calls: the model concluded.
            if tool_calls.is_empty() {
                self.memory.add_assistant(&content);
                tracing::info!(step, "agent decided to finish");

                let (root_cause, suggestion) = extract_conclusion(&content);
                self.emit(
                    None,
                    format!("Step {step} (Conclude): RootCause: {root_cause} | Suggestion: {suggestion}"),
                )
                .await;

                return Ok(DiagnosisResult {
                    root_cause,
                    suggestion,
                });
            }

            self.memory
                .add_assistant_tool_calls(response.content, tool_calls.clone());

            // Act: execute tools in request order.
            for call in &tool_calls {
                let tool_name = &call.function.name;
                tracing::info!(tool = %tool_name, "executing tool");

                let output = match self.tools.get(tool_name) {
                    None => format!("Error: Tool {tool_name} not found"),
                    Some(tool) => match tool.safety_class() {
                        SafetyClass::Forbidden => {
                            tracing::warn!(tool = %tool_name, "tool forbidden by safety policy");
                            format!("Error: Tool {tool_name} is forbidden by safety policy.")
                        }
                        SafetyClass::HighRisk if !approved => {
                            // Abort the run and hand off to the approval gate;
                            // no tool output is recorded for this call.
                            tracing::warn!(tool = %tool_name, "tool requires approval");
                            return Err(AgentError::WaitingForApproval {
                                tool: tool_name.clone(),
                            });
                        }
                        _ => match tool.execute(cancel, &call.function.arguments).await {
                            Ok(out) => out,
                            Err(e) => format!("Error executing tool: {e}"),
                        },
                    },
                };

                // Observe.
                self.memory.add_tool_output(&call.id, &output);

                let finding = Finding {
                    step,
                    tool_name: tool_name.clone(),
                    tool_args: call.function.arguments.clone(),
                    summary: truncate_with_ellipsis(&output, SUMMARY_CHARS),
                    timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
                };
                findings.push(finding.clone());

                self.emit(
                    Some(&finding),
                    format!(
                        "Step {step} (Act): {}({}) -> {}",
                        finding.tool_name, finding.tool_args, finding.summary
                    ),
                )
                .await;
            }

            if let Some(tool) = repeated_tool(&findings, REPEAT_WINDOW) {
                return Err(AgentError::LoopDetected { tool });
            }
        }

        Err(AgentError::MaxStepsExceeded(self.max_steps))
    }

    async fn emit(&self, finding: Option<&Finding>, history_entry: String) {
        if let Some(sink) = &self.sink {
            sink.on_step(finding, &history_entry).await;
        }
    }
}

/// If the last `window` findings share one `(tool, args)` pair, return the
/// tool name.
fn repeated_tool(findings: &[Finding], window: usize) -> Option<String> {
    if findings.len() < window {
        return None;
    }
    let tail = &findings[findings.len() - window..];
    let first = &tail[0];
    tail[1..]
        .iter()
        .all(|f| f.tool_name == first.tool_name && f.tool_args == first.tool_args)
        .then(|| first.tool_name.clone())
}

/// Parse the final response for `Root Cause:` and `Suggestion:` (or
/// `Remediation:`) markers; the Chinese equivalents `根因:` and `建议:`
/// are recognized too. Marker lines start a block that extends until the
/// other marker appears.
///
/// Without a root-cause marker, the first sentence becomes the root cause
/// and the whole trimmed content the suggestion; with no period, both
/// fields carry the trimmed content.
fn extract_conclusion(content: &str) -> (String, String) {
    let mut root_cause_lines: Vec<&str> = Vec::new();
    let mut suggestion_lines: Vec<&str> = Vec::new();
    let mut in_root_cause = false;
    let mut in_suggestion = false;

    for line in content.lines() {
        let lower = line.trim().to_lowercase();
        if lower.starts_with("root cause:") || lower.starts_with("根因:") {
            in_root_cause = true;
            in_suggestion = false;
            if let Some(idx) = line.find(':') {
                let val = line[idx + 1..].trim();
                if !val.is_empty() {
                    root_cause_lines.push(val);
                }
            }
        } else if lower.starts_with("suggestion:")
            || lower.starts_with("remediation:")
            || lower.starts_with("建议:")
        {
            in_suggestion = true;
            in_root_cause = false;
            if let Some(idx) = line.find(':') {
                let val = line[idx + 1..].trim();
                if !val.is_empty() {
                    suggestion_lines.push(val);
                }
            }
        } else if in_root_cause {
            root_cause_lines.push(line);
        } else if in_suggestion {
            suggestion_lines.push(line);
        }
    }

    if !root_cause_lines.is_empty() {
        return (
            root_cause_lines.join("\n").trim().to_string(),
            suggestion_lines.join("\n").trim().to_string(),
        );
    }

    let trimmed = content.trim();
    if let Some(idx) = trimmed.find('.') {
        return (trimmed[..idx].trim().to_string(), trimmed.to_string());
    }
    (trimmed.to_string(), trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::testutil::{
        assistant_text, assistant_tool_call, MockTool, RecordingSink, ScriptedLlm,
    };
    use crate::tools::Tool;

    fn loop_with(
        llm: ScriptedLlm,
        tools: Vec<Arc<dyn Tool>>,
        max_steps: usize,
        sink: Option<Arc<RecordingSink>>,
    ) -> AgentLoop {
        AgentLoop::new(
            Arc::new(llm),
            ToolSet::new(tools),
            max_steps,
            sink.map(|s| s as Arc<dyn StepSink>),
            Skill::default(),
        )
    }

    #[tokio::test]
    async fn run_tool_then_conclude() {
        let llm = ScriptedLlm::new();
        llm.respond_at(
            0,
            assistant_tool_call("call_1", "get_logs", r#"{"pod":"test-pod"}"#),
        );
        llm.respond_at(
            1,
            assistant_text("Root Cause: panic in handler\nSuggestion: restart the pod"),
        );

        let tool = Arc::new(MockTool::new("get_logs").with_output("panic: index out of range"));
        let agent = loop_with(llm, vec![tool.clone()], 5, None);

        let cancel = CancellationToken::new();
        let result = agent.run(&cancel, "Diagnose pod failure", true).await.expect("run");

        assert_eq!(result.root_cause, "panic in handler");
        assert_eq!(result.suggestion, "restart the pod");
        assert_eq!(tool.executions(), 1);
    }

    #[tokio::test]
    async fn history_covers_think_act_conclude() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_tool_call("call_1", "get_logs", "{}"));
        llm.respond_at(
            1,
            assistant_text("Root Cause: crash\nSuggestion: restart"),
        );

        let sink = Arc::new(RecordingSink::new());
        let tool = Arc::new(MockTool::new("get_logs").with_output("log line"));
        let agent = loop_with(llm, vec![tool], 5, Some(Arc::clone(&sink)));

        let cancel = CancellationToken::new();
        agent.run(&cancel, "Diagnose", true).await.expect("run");

        let history = sink.history();
        assert_eq!(history.len(), 4, "history: {history:?}");
        assert!(history[0].starts_with("Step 1 (Think):"));
        assert!(history[1].starts_with("Step 1 (Act): get_logs({})"));
        assert!(history[2].starts_with("Step 2 (Think):"));
        assert!(history[3].contains("(Conclude)"));
        assert!(history[3].contains("RootCause"));
        assert!(history[3].contains("Suggestion"));
    }

    #[tokio::test]
    async fn think_history_is_truncated() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_text(&"a".repeat(1000)));

        let sink = Arc::new(RecordingSink::new());
        let agent = loop_with(llm, vec![], 5, Some(Arc::clone(&sink)));

        let cancel = CancellationToken::new();
        agent.run(&cancel, "Diagnose", true).await.expect("run");

        let think = &sink.history()[0];
        assert!(think.len() < 600, "not truncated: len={}", think.len());
        assert!(think.ends_with("..."));
    }

    #[tokio::test]
    async fn max_steps_exceeded() {
        let llm = ScriptedLlm::new();
        // Distinct arguments each step so loop detection does not fire first.
        for i in 0..5 {
            llm.respond_at(
                i,
                assistant_tool_call(
                    &format!("call_{i}"),
                    "get_logs",
                    &format!(r#"{{"step":{i}}}"#),
                ),
            );
        }

        let tool = Arc::new(MockTool::new("get_logs"));
        let agent = loop_with(llm, vec![tool], 3, None);

        let cancel = CancellationToken::new();
        let err = agent.run(&cancel, "Diagnose", true).await.expect_err("budget");
        assert_eq!(err.to_string(), "agent exceeded maximum steps (3)");
    }

    #[tokio::test]
    async fn loop_detection_aborts_after_three_identical_calls() {
        let llm = ScriptedLlm::new();
        for i in 0..5 {
            llm.respond_at(i, assistant_tool_call(&format!("call_{i}"), "get_logs", "{}"));
        }

        let sink = Arc::new(RecordingSink::new());
        let tool = Arc::new(MockTool::new("get_logs"));
        let agent = loop_with(llm, vec![tool], 10, Some(Arc::clone(&sink)));

        let cancel = CancellationToken::new();
        let err = agent.run(&cancel, "Diagnose", true).await.expect_err("loop");
        assert!(err.to_string().contains("loop detected"), "got: {err}");
        assert!(err.to_string().contains("get_logs"));
        assert_eq!(sink.findings().len(), 3);
    }

    #[tokio::test]
    async fn two_identical_calls_do_not_trip_the_detector() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_tool_call("call_0", "get_logs", "{}"));
        llm.respond_at(1, assistant_tool_call("call_1", "get_logs", "{}"));
        llm.respond_at(2, assistant_text("Root Cause: found\nSuggestion: done"));

        let tool = Arc::new(MockTool::new("get_logs"));
        let agent = loop_with(llm, vec![tool], 10, None);

        let cancel = CancellationToken::new();
        let result = agent.run(&cancel, "Diagnose", true).await.expect("run");
        assert_eq!(result.root_cause, "found");
    }

    #[tokio::test]
    async fn llm_failure_terminates_run() {
        let llm = ScriptedLlm::new();
        llm.fail_at(0, "api rate limit exceeded");

        let agent = loop_with(llm, vec![], 5, None);
        let cancel = CancellationToken::new();
        let err = agent.run(&cancel, "Diagnose", true).await.expect_err("llm error");
        assert!(matches!(err, AgentError::Chat(_)));
        assert!(err.to_string().contains("api rate limit exceeded"));
    }

    #[tokio::test]
    async fn tool_failure_is_fed_back_not_fatal() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_tool_call("call_1", "get_logs", "{}"));
        llm.respond_at(1, assistant_text("Tool failed, giving up."));

        let tool = Arc::new(MockTool::new("get_logs").failing_with("connection refused"));
        let agent = loop_with(llm, vec![tool], 5, None);

        let cancel = CancellationToken::new();
        let result = agent.run(&cancel, "Diagnose", true).await.expect("run");
        assert_eq!(result.suggestion, "Tool failed, giving up.");

        let recorded = agent.memory().snapshot().iter().any(|m| {
            m.role == Role::Tool
                && m.text_content() == Some("Error executing tool: connection refused")
        });
        assert!(recorded, "tool error not recorded in memory");
    }

    #[tokio::test]
    async fn unknown_tool_is_reported_to_the_model() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_tool_call("call_1", "no_such_tool", "{}"));
        llm.respond_at(1, assistant_text("ok then."));

        let agent = loop_with(llm, vec![], 5, None);
        let cancel = CancellationToken::new();
        agent.run(&cancel, "Diagnose", true).await.expect("run");

        let recorded = agent.memory().snapshot().iter().any(|m| {
            m.role == Role::Tool && m.text_content() == Some("Error: Tool no_such_tool not found")
        });
        assert!(recorded);
    }

    #[tokio::test]
    async fn high_risk_tool_without_approval_parks_the_run() {
        let llm = ScriptedLlm::new();
        llm.respond_at(
            0,
            assistant_tool_call("call_1", "delete_pod", r#"{"pod":"test-pod"}"#),
        );

        let tool = Arc::new(
            MockTool::new("delete_pod")
                .with_safety(SafetyClass::HighRisk)
                .with_output("pod deleted"),
        );
        let agent = loop_with(llm, vec![tool.clone()], 5, None);

        let cancel = CancellationToken::new();
        let err = agent.run(&cancel, "Fix pod", false).await.expect_err("gate");
        assert!(matches!(err, AgentError::WaitingForApproval { ref tool } if tool == "delete_pod"));
        assert_eq!(tool.executions(), 0);
    }

    #[tokio::test]
    async fn high_risk_tool_with_approval_executes() {
        let llm = ScriptedLlm::new();
        llm.respond_at(
            0,
            assistant_tool_call("call_1", "delete_pod", r#"{"pod":"test-pod"}"#),
        );
        llm.respond_at(1, assistant_text("Root Cause: stuck\nSuggestion: done"));

        let tool = Arc::new(
            MockTool::new("delete_pod")
                .with_safety(SafetyClass::HighRisk)
                .with_output("pod deleted"),
        );
        let agent = loop_with(llm, vec![tool.clone()], 5, None);

        let cancel = CancellationToken::new();
        let result = agent.run(&cancel, "Fix pod", true).await.expect("run");
        assert_eq!(result.root_cause, "stuck");
        assert_eq!(tool.executions(), 1);
    }

    #[tokio::test]
    async fn forbidden_tool_is_never_executed() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_tool_call("call_1", "drop_node", "{}"));
        llm.respond_at(1, assistant_text("understood."));

        let tool = Arc::new(MockTool::new("drop_node").with_safety(SafetyClass::Forbidden));
        let agent = loop_with(llm, vec![tool.clone()], 5, None);

        let cancel = CancellationToken::new();
        agent.run(&cancel, "Diagnose", true).await.expect("run");

        assert_eq!(tool.executions(), 0);
        let recorded = agent.memory().snapshot().iter().any(|m| {
            m.role == Role::Tool
                && m.text_content()
                    == Some("Error: Tool drop_node is forbidden by safety policy.")
        });
        assert!(recorded);
    }

    #[tokio::test]
    async fn low_risk_executes_without_approval() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_tool_call("call_1", "annotate_pod", "{}"));
        llm.respond_at(1, assistant_text("Root Cause: x\nSuggestion: y"));

        let tool = Arc::new(MockTool::new("annotate_pod").with_safety(SafetyClass::LowRisk));
        let agent = loop_with(llm, vec![tool.clone()], 5, None);

        let cancel = CancellationToken::new();
        agent.run(&cancel, "Diagnose", false).await.expect("run");
        assert_eq!(tool.executions(), 1);
    }

    #[tokio::test]
    async fn skill_whitelist_hides_other_tools() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_tool_call("call_1", "delete_pod", "{}"));
        llm.respond_at(1, assistant_text("fine."));

        let skill = Skill {
            allowed_tools: vec!["get_pod_logs".to_string()],
            ..Skill::default()
        };
        let delete = Arc::new(MockTool::new("delete_pod"));
        let agent = AgentLoop::new(
            Arc::new(llm),
            ToolSet::new(vec![
                Arc::new(MockTool::new("get_pod_logs")),
                delete.clone() as Arc<dyn Tool>,
            ]),
            5,
            None,
            skill,
        );

        let cancel = CancellationToken::new();
        agent.run(&cancel, "Diagnose", true).await.expect("run");

        // Outside the whitelist the tool resolves as unknown and never runs.
        assert_eq!(delete.executions(), 0);
        let recorded = agent.memory().snapshot().iter().any(|m| {
            m.role == Role::Tool && m.text_content() == Some("Error: Tool delete_pod not found")
        });
        assert!(recorded);
    }

    #[tokio::test]
    async fn skill_prompt_is_first_memory_entry() {
        let skill = Skill {
            system_prompt: "You are a memory expert.".to_string(),
            ..Skill::default()
        };
        let agent = AgentLoop::new(
            Arc::new(ScriptedLlm::new()),
            ToolSet::default(),
            5,
            None,
            skill,
        );

        let history = agent.memory().snapshot();
        assert_eq!(history.len(), 1);
        assert_eq!(
            history[0].text_content(),
            Some("SYSTEM INSTRUCTION: You are a memory expert.")
        );
    }

    #[tokio::test]
    async fn restore_injects_prior_findings() {
        let agent = loop_with(ScriptedLlm::new(), vec![], 5, None);
        agent.restore(&[
            Finding {
                step: 1,
                tool_name: "get_pod_spec".to_string(),
                tool_args: "{}".to_string(),
                summary: "memory limit 128Mi".to_string(),
                timestamp: "2024-01-01T00:00:00Z".to_string(),
            },
            Finding {
                step: 2,
                tool_name: "get_pod_logs".to_string(),
                tool_args: "{}".to_string(),
                summary: "OOM killed".to_string(),
                timestamp: "2024-01-01T00:00:05Z".to_string(),
            },
        ]);

        let history = agent.memory().snapshot();
        assert_eq!(history.len(), 1);
        let text = history[0].text_content().expect("content");
        assert!(text.contains("Step 1 [get_pod_spec]: memory limit 128Mi"));
        assert!(text.contains("Step 2 [get_pod_logs]: OOM killed"));
    }

    #[tokio::test]
    async fn restore_with_no_findings_is_a_noop() {
        let agent = loop_with(ScriptedLlm::new(), vec![], 5, None);
        agent.restore(&[]);
        assert!(agent.memory().is_empty());
    }

    #[tokio::test]
    async fn cancelled_token_stops_the_run() {
        let llm = ScriptedLlm::new();
        llm.respond_at(0, assistant_text("never reached"));

        let agent = loop_with(llm, vec![], 5, None);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = agent.run(&cancel, "Diagnose", true).await.expect_err("cancel");
        assert!(matches!(err, AgentError::Cancelled));
    }

    #[test]
    fn extraction_with_markers() {
        let (rc, sg) =
            extract_conclusion("Root Cause: memory limit exceeded\nSuggestion: raise the limit");
        assert_eq!(rc, "memory limit exceeded");
        assert_eq!(sg, "raise the limit");
    }

    #[test]
    fn extraction_multiline_blocks() {
        let content = "Root Cause: the container\nexceeds its limit\nSuggestion: raise limits\nor fix the leak";
        let (rc, sg) = extract_conclusion(content);
        assert_eq!(rc, "the container\nexceeds its limit");
        assert_eq!(sg, "raise limits\nor fix the leak");
    }

    #[test]
    fn extraction_accepts_remediation_marker() {
        let (rc, sg) = extract_conclusion("Root Cause: bad probe\nRemediation: fix the probe path");
        assert_eq!(rc, "bad probe");
        assert_eq!(sg, "fix the probe path");
    }

    #[test]
    fn extraction_accepts_chinese_markers() {
        let (rc, sg) = extract_conclusion("根因: 内存限制过低\n建议: 提高内存限制");
        assert_eq!(rc, "内存限制过低");
        assert_eq!(sg, "提高内存限制");
    }

    #[test]
    fn extraction_is_case_insensitive() {
        let (rc, sg) = extract_conclusion("ROOT CAUSE: x\nSUGGESTION: y");
        assert_eq!(rc, "x");
        assert_eq!(sg, "y");
    }

    #[test]
    fn extraction_fallback_first_sentence() {
        let (rc, sg) = extract_conclusion("The logs show a panic. Suggest restarting the pod.");
        assert_eq!(rc, "The logs show a panic");
        assert_eq!(sg, "The logs show a panic. Suggest restarting the pod.");
    }

    #[test]
    fn extraction_fallback_no_period() {
        let (rc, sg) = extract_conclusion("everything looks healthy");
        assert_eq!(rc, "everything looks healthy");
        assert_eq!(sg, "everything looks healthy");
    }
}
