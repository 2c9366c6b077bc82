//! Alertmanager webhook payload types and group-key construction.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The Alertmanager v4 webhook payload.
/// See: <https://prometheus.io/docs/alerting/latest/configuration/#webhook_config>
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertmanagerPayload {
    pub version: String,
    #[serde(rename = "groupKey")]
    pub group_key: String,
    #[serde(rename = "truncatedAlerts")]
    pub truncated_alerts: u64,
    pub status: String,
    pub receiver: String,
    #[serde(rename = "groupLabels")]
    pub group_labels: HashMap<String, String>,
    #[serde(rename = "commonLabels")]
    pub common_labels: HashMap<String, String>,
    #[serde(rename = "commonAnnotations")]
    pub common_annotations: HashMap<String, String>,
    #[serde(rename = "externalURL")]
    pub external_url: String,
    pub alerts: Vec<AlertItem>,
}

/// A single alert within the payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertItem {
    /// `"firing"` or `"resolved"`.
    pub status: String,
    pub labels: HashMap<String, String>,
    pub annotations: HashMap<String, String>,
    #[serde(rename = "startsAt")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(rename = "endsAt")]
    pub ends_at: Option<DateTime<Utc>>,
    #[serde(rename = "generatorURL")]
    pub generator_url: String,
    pub fingerprint: String,
}

impl AlertItem {
    pub fn is_firing(&self) -> bool {
        self.status == "firing"
    }
}

/// Uniquely identifies a group of related alerts.
///
/// Missing fields use reserved placeholders so that "no pod" stays disjoint
/// from any real pod name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey {
    pub alert_name: String,
    pub namespace: String,
    pub pod: String,
}

impl GroupKey {
    /// Build a key from alert labels, substituting placeholders for
    /// missing fields.
    pub fn from_labels(labels: &HashMap<String, String>) -> Self {
        let field = |name: &str, placeholder: &str| -> String {
            match labels.get(name) {
                Some(v) if !v.is_empty() => v.clone(),
                _ => placeholder.to_string(),
            }
        };
        Self {
            alert_name: field("alertname", "unknown"),
            namespace: field("namespace", "_"),
            pod: field("pod", "_"),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.alert_name, self.namespace, self.pod)
    }
}

/// Alerts sharing one [`GroupKey`] within an aggregation window.
///
/// Created on the first ingest of a new key, mutated by every ingest
/// sharing the key, destroyed on flush.
#[derive(Debug, Clone)]
pub struct AlertGroup {
    pub key: GroupKey,
    /// Label merge: later alerts overwrite earlier ones.
    pub merged_labels: HashMap<String, String>,
    pub alert_name: String,
    pub namespace: String,
    /// Empty for non-pod-level alerts.
    pub pod: String,
    pub first_seen: DateTime<Utc>,
    /// Sliding-window anchor: a group expires only after this has been
    /// silent for the full window.
    pub last_seen: DateTime<Utc>,
    pub count: u64,
}
