//! Acquisition boundary: plugin kinds and instrumentation hooks
//!
//! The engine does not capture anything from the host itself; acquisition
//! collaborators observe the host and emit already-extracted signals through
//! named instrumentation points. Two redesigns over the usual SDK shape:
//!
//! - Plugins are a closed tagged-variant set (`PluginKind`) known at compile
//!   time, each with the same fixed capability surface (`start`, `destroy`,
//!   `metric_keys`, `handle`), registered via an explicit ordered list.
//! - Instrumenting the host is wrap-and-restore, never implicit global
//!   mutation: installing a handler at a hook point captures the previous
//!   handler in a `WrapGuard`, and plugin `destroy` puts it back.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::mpsc;

use crate::config::EngineConfig;
use crate::dispatch::{EngineEvent, EventBus};
use crate::error::{fingerprint_signal, parse_stack_frames};
use crate::reporter::Reporter;
use crate::signal::{
    BreadcrumbEntry, ErrorRecord, ErrorSignal, LayoutShiftEvent, MetricKey, MetricSignal,
    ReportCategory, ReportEnvelope,
};
use crate::store::{BreadcrumbLog, LayoutShiftSessions, MetricsStore};

/// Union of the signal shapes acquisition collaborators may emit.
#[derive(Debug, Clone)]
pub enum RawSignal {
    Metric(MetricSignal),
    Behavior(BreadcrumbEntry),
    LayoutShift(LayoutShiftEvent),
    Error(ErrorSignal),
    RouteChange {
        page: String,
        jump_type: String,
        timestamp: i64,
    },
}

pub type SignalHandler = Arc<dyn Fn(RawSignal) + Send + Sync>;

/// Named instrumentation points. The host-facing side of a collaborator
/// calls `emit`; plugins install and remove handlers through wrap/restore.
#[derive(Default)]
pub struct HookRegistry {
    slots: HashMap<&'static str, SignalHandler>,
}

/// Captured state of one wrapped hook point. Returned by `wrap`, consumed by
/// `restore`; holding it is holding the obligation to restore.
pub struct WrapGuard {
    point: &'static str,
    original: Option<SignalHandler>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handler` at `point`, capturing whatever was installed
    /// before.
    pub fn wrap(&mut self, point: &'static str, handler: SignalHandler) -> WrapGuard {
        let original = self.slots.insert(point, handler);
        WrapGuard { point, original }
    }

    /// Put the captured original back (or clear the slot if the point was
    /// previously uninstrumented).
    pub fn restore(&mut self, guard: WrapGuard) {
        match guard.original {
            Some(original) => {
                self.slots.insert(guard.point, original);
            }
            None => {
                self.slots.remove(guard.point);
            }
        }
    }

    /// Deliver a signal to the handler installed at `point`. Returns false
    /// when the point is uninstrumented (the signal is dropped).
    pub fn emit(&self, point: &str, signal: RawSignal) -> bool {
        match self.slots.get(point) {
            Some(handler) => {
                handler(signal);
                true
            }
            None => false,
        }
    }

    pub fn is_instrumented(&self, point: &str) -> bool {
        self.slots.contains_key(point)
    }
}

/// Mutable view over the engine-owned structures a plugin may touch while
/// handling a signal.
pub struct EngineContext<'a> {
    pub config: &'a EngineConfig,
    pub metrics: &'a mut MetricsStore,
    pub breadcrumbs: &'a mut BreadcrumbLog,
    pub sessions: &'a mut LayoutShiftSessions,
    pub reporter: &'a Arc<Reporter>,
    pub bus: &'a mut EventBus,
}

impl EngineContext<'_> {
    async fn submit(&mut self, envelope: ReportEnvelope) {
        let payload = json!({"category": envelope.category.as_str()});
        self.reporter.report(envelope).await;
        self.bus.publish(EngineEvent::Reported, &payload);
    }
}

/// Closed set of plugin kinds, in their canonical registration order.
pub enum PluginKind {
    Performance(PerformanceVitals),
    Behavior(UserVitals),
    Error(ErrorVitals),
}

impl PluginKind {
    /// The canonical ordered list: performance, behavior, error.
    pub fn default_set() -> Vec<PluginKind> {
        vec![
            PluginKind::Performance(PerformanceVitals::new()),
            PluginKind::Behavior(UserVitals::new()),
            PluginKind::Error(ErrorVitals::new()),
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PluginKind::Performance(_) => "performance-vitals",
            PluginKind::Behavior(_) => "user-vitals",
            PluginKind::Error(_) => "error-vitals",
        }
    }

    /// Metric keys this plugin contributes to the store.
    pub fn metric_keys(&self) -> &'static [MetricKey] {
        match self {
            PluginKind::Performance(_) => &[
                MetricKey::FirstPaint,
                MetricKey::FirstContentfulPaint,
                MetricKey::LargestContentfulPaint,
                MetricKey::FirstInputDelay,
                MetricKey::CumulativeLayoutShift,
                MetricKey::NavigationTiming,
                MetricKey::ResourceFlow,
            ],
            PluginKind::Behavior(_) => &[
                MetricKey::PageInformation,
                MetricKey::OriginInformation,
                MetricKey::RouterChangeRecord,
                MetricKey::ClickBehaviorRecord,
                MetricKey::CustomDefineRecord,
                MetricKey::HttpRecord,
            ],
            PluginKind::Error(_) => &[],
        }
    }

    /// Install instrumentation handlers that forward raw signals into the
    /// engine's intake channel.
    pub fn start(
        &mut self,
        registry: &mut HookRegistry,
        intake: &mpsc::UnboundedSender<RawSignal>,
    ) {
        let forward = |tx: mpsc::UnboundedSender<RawSignal>| -> SignalHandler {
            Arc::new(move |signal| {
                // Send fails only after engine teardown; late signals are
                // dropped by contract.
                let _ = tx.send(signal);
            })
        };
        let points = self.hook_points();
        let guards = match self {
            PluginKind::Performance(p) => &mut p.guards,
            PluginKind::Behavior(p) => &mut p.guards,
            PluginKind::Error(p) => &mut p.guards,
        };
        for point in points {
            guards.push(registry.wrap(point, forward(intake.clone())));
        }
        log::debug!("Plugin {} started ({} hook points)", self.name(), points.len());
    }

    /// Restore every wrapped hook point.
    pub fn destroy(&mut self, registry: &mut HookRegistry) {
        let guards = match self {
            PluginKind::Performance(p) => &mut p.guards,
            PluginKind::Behavior(p) => &mut p.guards,
            PluginKind::Error(p) => &mut p.guards,
        };
        for guard in guards.drain(..) {
            registry.restore(guard);
        }
        log::debug!("Plugin {} destroyed", self.name());
    }

    /// Host instrumentation points this plugin wraps.
    pub fn hook_points(&self) -> &'static [&'static str] {
        match self {
            PluginKind::Performance(_) => &["performance-observer"],
            PluginKind::Behavior(_) => &["history-api", "dom-event", "http-request"],
            PluginKind::Error(_) => &["error-event", "unhandled-rejection"],
        }
    }

    /// Whether this plugin handles `signal`. Dispatch walks the registration
    /// order and stops at the first taker.
    pub fn wants(&self, signal: &RawSignal) -> bool {
        match (self, signal) {
            (PluginKind::Performance(_), RawSignal::LayoutShift(_)) => true,
            (PluginKind::Performance(_), RawSignal::Metric(m)) => {
                self.metric_keys().contains(&m.key)
            }
            (PluginKind::Behavior(_), RawSignal::Metric(m)) => {
                self.metric_keys().contains(&m.key)
            }
            (PluginKind::Behavior(_), RawSignal::Behavior(_)) => true,
            (PluginKind::Behavior(_), RawSignal::RouteChange { .. }) => true,
            (PluginKind::Error(_), RawSignal::Error(_)) => true,
            _ => false,
        }
    }

    pub async fn handle(&mut self, signal: RawSignal, ctx: &mut EngineContext<'_>) {
        match self {
            PluginKind::Performance(p) => p.handle(signal, ctx),
            PluginKind::Behavior(p) => p.handle(signal, ctx).await,
            PluginKind::Error(p) => p.handle(signal, ctx).await,
        }
    }
}

/// Performance acquisition seam: paint/input/navigation metrics plus the
/// layout-shift stream.
#[derive(Default)]
pub struct PerformanceVitals {
    guards: Vec<WrapGuard>,
}

impl PerformanceVitals {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&mut self, signal: RawSignal, ctx: &mut EngineContext<'_>) {
        match signal {
            RawSignal::Metric(m) => {
                if m.key.append_only() {
                    ctx.metrics.add(m.key, m.value);
                } else {
                    ctx.metrics.set(m.key, m.value);
                }
            }
            RawSignal::LayoutShift(event) => ctx.sessions.record(event),
            _ => {}
        }
    }
}

/// User-behavior acquisition seam: breadcrumbs, route changes, page-view
/// submissions, and the append-only behavior records.
#[derive(Default)]
pub struct UserVitals {
    guards: Vec<WrapGuard>,
}

impl UserVitals {
    pub fn new() -> Self {
        Self::default()
    }

    async fn handle(&mut self, signal: RawSignal, ctx: &mut EngineContext<'_>) {
        match signal {
            RawSignal::Metric(m) => {
                if m.key.append_only() {
                    ctx.metrics.add(m.key, m.value);
                } else {
                    ctx.metrics.set(m.key, m.value);
                }
            }
            RawSignal::Behavior(entry) => {
                if let Some(key) = MetricKey::from_str(&entry.name) {
                    if key.append_only() {
                        ctx.metrics.add(key, entry.value.clone());
                    }
                }
                ctx.breadcrumbs.push(entry);
            }
            RawSignal::RouteChange {
                page,
                jump_type,
                timestamp,
            } => {
                let record = json!({
                    "jumpType": jump_type,
                    "timestamp": timestamp,
                });
                ctx.metrics
                    .add(MetricKey::RouterChangeRecord, record.clone());
                ctx.breadcrumbs.push(BreadcrumbEntry {
                    name: MetricKey::RouterChangeRecord.as_str().to_string(),
                    page: page.clone(),
                    timestamp,
                    value: record,
                });
                // Every route change is a page view
                let pv = json!({
                    "page": page,
                    "timestamp": timestamp,
                    "jumpType": jump_type,
                });
                ctx.submit(ReportEnvelope::single(ReportCategory::Pv, pv))
                    .await;
            }
            _ => {}
        }
    }
}

/// Error acquisition seam: identity, one-shot dedup, enrichment with the
/// breadcrumb trail, submission.
#[derive(Default)]
pub struct ErrorVitals {
    guards: Vec<WrapGuard>,
    submitted_uids: std::collections::HashSet<String>,
}

impl ErrorVitals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uids submitted so far in this page lifetime.
    pub fn submitted_count(&self) -> usize {
        self.submitted_uids.len()
    }

    async fn handle(&mut self, signal: RawSignal, ctx: &mut EngineContext<'_>) {
        let RawSignal::Error(signal) = signal else {
            return;
        };

        let uid = match fingerprint_signal(&signal) {
            Some(uid) => {
                // One-shot submission: a uid goes out at most once per page
                if !self.submitted_uids.insert(uid.clone()) {
                    log::debug!("Duplicate error suppressed: {}", uid);
                    return;
                }
                uid
            }
            None if ctx.config.report_unfingerprinted => String::new(),
            None => {
                log::debug!("Dropping error record without identity fields");
                return;
            }
        };

        let record = build_error_record(&signal, uid, ctx);
        let context = match serde_json::to_value(&record) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to serialize error record: {}", e);
                return;
            }
        };
        ctx.submit(ReportEnvelope::single(ReportCategory::Error, context))
            .await;
        // The trail was attached to this report; the next distinct error
        // starts fresh
        ctx.breadcrumbs.clear();
    }
}

fn build_error_record(
    signal: &ErrorSignal,
    error_uid: String,
    ctx: &EngineContext<'_>,
) -> ErrorRecord {
    ErrorRecord {
        mechanism: signal.mechanism,
        value: signal.message.clone(),
        error_type: signal.error_type.clone(),
        stack_frames: signal.stack.as_deref().map(parse_stack_frames),
        breadcrumbs: ctx.breadcrumbs.snapshot(),
        page_information: ctx
            .metrics
            .get(MetricKey::PageInformation)
            .cloned()
            .unwrap_or(Value::Null),
        error_uid,
        meta: signal.meta.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_handler(counter: Arc<AtomicUsize>) -> SignalHandler {
        Arc::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn dummy_signal() -> RawSignal {
        RawSignal::LayoutShift(LayoutShiftEvent {
            start_time: 0.0,
            value: 0.1,
            had_recent_input: false,
        })
    }

    #[test]
    fn test_wrap_then_restore_reinstates_original() {
        let mut registry = HookRegistry::new();
        let original_hits = Arc::new(AtomicUsize::new(0));
        let wrapped_hits = Arc::new(AtomicUsize::new(0));

        // Host-installed original handler
        let first = registry.wrap("dom-event", counting_handler(Arc::clone(&original_hits)));
        assert!(first.original.is_none());

        // Plugin wraps it, capturing the original
        let guard = registry.wrap("dom-event", counting_handler(Arc::clone(&wrapped_hits)));
        assert!(guard.original.is_some());

        registry.emit("dom-event", dummy_signal());
        assert_eq!(wrapped_hits.load(Ordering::SeqCst), 1);
        assert_eq!(original_hits.load(Ordering::SeqCst), 0);

        // Restore: the original handler is back in the slot
        registry.restore(guard);
        registry.emit("dom-event", dummy_signal());
        assert_eq!(original_hits.load(Ordering::SeqCst), 1);
        assert_eq!(wrapped_hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_emit_on_uninstrumented_point_is_dropped() {
        let registry = HookRegistry::new();
        assert!(!registry.emit("history-api", dummy_signal()));
    }

    #[test]
    fn test_restore_clears_previously_uninstrumented_point() {
        let mut registry = HookRegistry::new();
        let guard = registry.wrap("http-request", counting_handler(Arc::default()));
        assert!(registry.is_instrumented("http-request"));
        registry.restore(guard);
        assert!(!registry.is_instrumented("http-request"));
    }

    #[test]
    fn test_plugin_start_installs_and_destroy_restores_all_points() {
        let mut registry = HookRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let mut plugins = PluginKind::default_set();
        for plugin in &mut plugins {
            plugin.start(&mut registry, &tx);
            for point in plugin.hook_points() {
                assert!(registry.is_instrumented(point));
            }
        }

        for plugin in &mut plugins {
            plugin.destroy(&mut registry);
            for point in plugin.hook_points() {
                assert!(!registry.is_instrumented(point));
            }
        }
    }

    #[test]
    fn test_dispatch_order_and_claims() {
        let plugins = PluginKind::default_set();
        let metric = RawSignal::Metric(MetricSignal {
            key: MetricKey::FirstPaint,
            value: json!(1.0),
            timestamp: 0,
        });
        let behavior_metric = RawSignal::Metric(MetricSignal {
            key: MetricKey::PageInformation,
            value: json!({}),
            timestamp: 0,
        });
        let error = RawSignal::Error(ErrorSignal {
            mechanism: crate::signal::ErrorMechanism::Js,
            message: "boom".into(),
            error_type: "Error".into(),
            stack: None,
            locator: "a.js".into(),
            meta: Value::Null,
        });

        let takers =
            |sig: &RawSignal| -> Vec<&'static str> {
                plugins.iter().filter(|p| p.wants(sig)).map(|p| p.name()).collect()
            };
        assert_eq!(takers(&metric), vec!["performance-vitals"]);
        assert_eq!(takers(&behavior_metric), vec!["user-vitals"]);
        assert_eq!(takers(&error), vec!["error-vitals"]);
    }
}
