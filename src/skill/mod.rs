//! Diagnosis skills: named prompt bundles with tool whitelists and trigger
//! rules.
//!
//! A skill selects a domain-expert system prompt for the agent and may
//! restrict the tool set it is allowed to use. Trigger rules match against
//! a task's alert context; the registry returns the first matching skill
//! and falls back to the built-in generic skill.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::task::DiagnosisTask;

/// A rule that selects a skill for a task.
///
/// `alert_name` matches the alert context's name exactly, or as a
/// substring of its `alertname` label. `labels` is a subset match against
/// the alert context's labels. A trigger with both fields requires both; a
/// trigger with neither never matches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert_name: Option<String>,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl SkillTrigger {
    fn matches(&self, task: &DiagnosisTask) -> bool {
        if self.alert_name.is_none() && self.labels.is_empty() {
            return false;
        }
        let Some(ctx) = &task.spec.alert_context else {
            return false;
        };
        if let Some(name) = &self.alert_name {
            let label_contains = ctx
                .labels
                .get("alertname")
                .is_some_and(|v| v.contains(name.as_str()));
            if &ctx.name != name && !label_contains {
                return false;
            }
        }
        self.labels
            .iter()
            .all(|(k, v)| ctx.labels.get(k) == Some(v))
    }
}

/// A named diagnosis capability. Immutable after load.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Skill {
    pub name: String,
    pub description: String,
    pub system_prompt: String,
    /// Names of tools this skill may use. Empty means all tools.
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<SkillTrigger>,
}

impl Skill {
    /// The default skill for general troubleshooting.
    pub fn base() -> Self {
        Skill {
            name: "base_skill".to_string(),
            description: "General Kubernetes troubleshooting skill".to_string(),
            system_prompt: "You are a Kubernetes Expert Agent. Your goal is to diagnose issues in a K8s cluster.\n\
                You have access to a set of tools to gather information.\n\
                Follow this process:\n\
                1. Think: Analyze the current situation and decide what information you need.\n\
                2. Act: Execute a tool to gather that information.\n\
                3. Observe: Analyze the tool output.\n\
                4. Repeat until you identify the root cause.\n\
                5. Conclude: Provide a Root Cause and a Suggestion."
                .to_string(),
            allowed_tools: Vec::new(),
            triggers: Vec::new(),
        }
    }

    /// Specialized skill for OOMKilled pods.
    pub fn oom_diagnosis() -> Self {
        Skill {
            name: "oom_diagnosis".to_string(),
            description: "Specialized skill for diagnosing OOMKilled pods".to_string(),
            system_prompt: "You are a Kubernetes Memory Expert. You are diagnosing a Pod that was OOMKilled.\n\
                Focus your investigation on:\n\
                1. Check the Pod's memory limit in its Spec.\n\
                2. Check the container's actual memory usage or look for \"Out of Memory\" logs.\n\
                3. Determine if the limit is too tight or if there is a memory leak.\n\
                Do NOT suggest increasing limits immediately; first identify why it is consuming so much memory."
                .to_string(),
            allowed_tools: vec![
                "get_pod_logs".to_string(),
                "get_pod_events".to_string(),
                "get_pod_spec".to_string(),
            ],
            triggers: vec![
                SkillTrigger {
                    alert_name: None,
                    labels: HashMap::from([("reason".to_string(), "OOMKilled".to_string())]),
                },
                SkillTrigger {
                    alert_name: Some("KubeContainerOOMKilled".to_string()),
                    labels: HashMap::new(),
                },
            ],
        }
    }
}

/// Ordered skill collection with first-match-wins selection.
pub struct SkillRegistry {
    skills: Vec<Skill>,
    base: Skill,
}

impl SkillRegistry {
    /// An empty registry with only the base fallback.
    pub fn new() -> Self {
        Self {
            skills: Vec::new(),
            base: Skill::base(),
        }
    }

    /// Registry pre-populated with the built-in specialized skills.
    pub fn with_builtin_skills() -> Self {
        let mut registry = Self::new();
        registry.register(Skill::oom_diagnosis());
        registry
    }

    /// Add a skill. Later registrations match after earlier ones.
    pub fn register(&mut self, skill: Skill) {
        self.skills.push(skill);
    }

    /// Select the skill for a task: the first registered skill with a
    /// matching trigger, else the base skill.
    pub fn match_task(&self, task: &DiagnosisTask) -> &Skill {
        for skill in &self.skills {
            if skill.triggers.iter().any(|t| t.matches(task)) {
                return skill;
            }
        }
        &self.base
    }

    /// Look up a skill by name, including the base skill.
    pub fn get(&self, name: &str) -> Option<&Skill> {
        if self.base.name == name {
            return Some(&self.base);
        }
        self.skills.iter().find(|s| s.name == name)
    }

    /// Every registered skill, specialized skills first, base last.
    pub fn list(&self) -> Vec<&Skill> {
        self.skills.iter().chain(std::iter::once(&self.base)).collect()
    }
}

impl Default for SkillRegistry {
    fn default() -> Self {
        Self::with_builtin_skills()
    }
}
