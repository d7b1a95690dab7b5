//! Signal and wire shapes shared across the pipeline
//!
//! Acquisition collaborators hand the engine already-extracted records in
//! these shapes; the engine routes them into the stores and the reporter
//! serializes them into outgoing envelopes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fixed metric vocabulary. Wire names follow the collector's expectations
/// (`first-paint`, `router-change-record`, ...).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKey {
    FirstPaint,
    FirstContentfulPaint,
    LargestContentfulPaint,
    FirstInputDelay,
    CumulativeLayoutShift,
    NavigationTiming,
    ResourceFlow,
    PageInformation,
    OriginInformation,
    RouterChangeRecord,
    ClickBehaviorRecord,
    CustomDefineRecord,
    HttpRecord,
}

impl MetricKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::FirstPaint => "first-paint",
            MetricKey::FirstContentfulPaint => "first-contentful-paint",
            MetricKey::LargestContentfulPaint => "largest-contentful-paint",
            MetricKey::FirstInputDelay => "first-input-delay",
            MetricKey::CumulativeLayoutShift => "cumulative-layout-shift",
            MetricKey::NavigationTiming => "navigation-timing",
            MetricKey::ResourceFlow => "resource-flow",
            MetricKey::PageInformation => "page-information",
            MetricKey::OriginInformation => "origin-information",
            MetricKey::RouterChangeRecord => "router-change-record",
            MetricKey::ClickBehaviorRecord => "click-behavior-record",
            MetricKey::CustomDefineRecord => "custom-define-record",
            MetricKey::HttpRecord => "http-record",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|k| k.as_str() == s)
    }

    /// Keys that accumulate an ordered sequence instead of holding one
    /// current value. The store does not bound these sequences; callers cap
    /// how often they append.
    pub fn append_only(&self) -> bool {
        matches!(
            self,
            MetricKey::RouterChangeRecord
                | MetricKey::ClickBehaviorRecord
                | MetricKey::CustomDefineRecord
                | MetricKey::HttpRecord
        )
    }

    pub fn all() -> [MetricKey; 13] {
        [
            MetricKey::FirstPaint,
            MetricKey::FirstContentfulPaint,
            MetricKey::LargestContentfulPaint,
            MetricKey::FirstInputDelay,
            MetricKey::CumulativeLayoutShift,
            MetricKey::NavigationTiming,
            MetricKey::ResourceFlow,
            MetricKey::PageInformation,
            MetricKey::OriginInformation,
            MetricKey::RouterChangeRecord,
            MetricKey::ClickBehaviorRecord,
            MetricKey::CustomDefineRecord,
            MetricKey::HttpRecord,
        ]
    }
}

/// Performance-metric signal as delivered by an acquisition collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSignal {
    pub key: MetricKey,
    pub value: Value,
    pub timestamp: i64,
}

/// One breadcrumb: a minor user or network action retained briefly to give
/// context to a subsequent error report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreadcrumbEntry {
    pub name: String,
    pub page: String,
    pub timestamp: i64,
    pub value: Value,
}

/// Transient input to the session-window aggregator. Not retained outside
/// the window it lands in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayoutShiftEvent {
    pub start_time: f64,
    pub value: f64,
    pub had_recent_input: bool,
}

/// Where an error was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMechanism {
    Js,
    Resource,
    UnhandledRejection,
    Http,
    Cors,
}

impl ErrorMechanism {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorMechanism::Js => "js",
            ErrorMechanism::Resource => "resource",
            ErrorMechanism::UnhandledRejection => "unhandledrejection",
            ErrorMechanism::Http => "http",
            ErrorMechanism::Cors => "cors",
        }
    }
}

/// Error signal as delivered by an acquisition collaborator.
///
/// `locator` is the distinguishing field used for identity: the script file
/// name for JS errors, the resource URL for load failures, the status text
/// for HTTP failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorSignal {
    pub mechanism: ErrorMechanism,
    pub message: String,
    pub error_type: String,
    pub stack: Option<String>,
    pub locator: String,
    #[serde(default)]
    pub meta: Value,
}

/// Outgoing error report, enriched with breadcrumbs and page context.
/// Serializes camelCase to match the collector's field names.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub mechanism: ErrorMechanism,
    pub value: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack_frames: Option<Vec<crate::error::StackFrame>>,
    pub breadcrumbs: Vec<BreadcrumbEntry>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub page_information: Value,
    pub error_uid: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub meta: Value,
}

/// Report categories understood by the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportCategory {
    Pv,
    Perf,
    Api,
    Error,
    Custom,
}

impl ReportCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportCategory::Pv => "pv",
            ReportCategory::Perf => "perf",
            ReportCategory::Api => "api",
            ReportCategory::Error => "error",
            ReportCategory::Custom => "custom",
        }
    }
}

/// One queued report record: category plus a single context object or an
/// ordered list of them. Field order is fixed by the struct, so the collector
/// can rely on stable key ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEnvelope {
    pub category: ReportCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<Value>>,
}

impl ReportEnvelope {
    pub fn single(category: ReportCategory, context: Value) -> Self {
        Self {
            category,
            context: Some(context),
            contexts: None,
        }
    }

    pub fn batch(category: ReportCategory, contexts: Vec<Value>) -> Self {
        Self {
            category,
            context: None,
            contexts: Some(contexts),
        }
    }
}

/// Custom analytics record submitted through `Engine::track_event`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomEventData {
    pub event_category: String,
    pub event_action: String,
    pub event_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event_value: Option<String>,
}

/// Wall-clock timestamp in milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_key_round_trip() {
        for key in MetricKey::all() {
            assert_eq!(MetricKey::from_str(key.as_str()), Some(key));
        }
        assert_eq!(MetricKey::from_str("not-a-key"), None);
    }

    #[test]
    fn test_append_only_keys() {
        assert!(MetricKey::RouterChangeRecord.append_only());
        assert!(MetricKey::HttpRecord.append_only());
        assert!(!MetricKey::FirstPaint.append_only());
        assert!(!MetricKey::CumulativeLayoutShift.append_only());
    }

    #[test]
    fn test_error_record_serializes_collector_field_names() {
        let record = ErrorRecord {
            mechanism: ErrorMechanism::Js,
            value: "boom".to_string(),
            error_type: "TypeError".to_string(),
            stack_frames: Some(Vec::new()),
            breadcrumbs: Vec::new(),
            page_information: serde_json::json!({"pathname": "/"}),
            error_uid: "abc".to_string(),
            meta: Value::Null,
        };
        let json = serde_json::to_value(&record).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert!(keys.contains(&"errorUid"));
        assert!(keys.contains(&"stackFrames"));
        assert!(keys.contains(&"pageInformation"));
        assert!(keys.contains(&"type"));
        assert!(!keys.contains(&"meta"));
    }

    #[test]
    fn test_envelope_serializes_one_body_field() {
        let single =
            ReportEnvelope::single(ReportCategory::Error, serde_json::json!({"a": 1}));
        let json = serde_json::to_string(&single).unwrap();
        assert!(json.contains("\"category\":\"error\""));
        assert!(json.contains("\"context\""));
        assert!(!json.contains("\"contexts\""));

        let batch = ReportEnvelope::batch(ReportCategory::Pv, vec![serde_json::json!(1)]);
        let json = serde_json::to_string(&batch).unwrap();
        assert!(json.contains("\"contexts\""));
        assert!(!json.contains("\"context\":"));
    }
}
