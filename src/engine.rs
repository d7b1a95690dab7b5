//! Engine: composition root and signal router
//!
//! Owns exactly one instance of every core structure and wires the
//! acquisition boundary to the delivery queue. Deliberately constructed
//! once at application startup; there is no hidden singleton, the single
//! instance is a discipline of the composition root.

use std::sync::Arc;

use serde_json::{json, Value};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::config::EngineConfig;
use crate::dispatch::{EngineEvent, EventBus};
use crate::plugins::{EngineContext, HookRegistry, PluginKind, RawSignal};
use crate::reporter::{flush_scheduler_task, Reporter, Transport};
use crate::signal::{
    now_millis, BreadcrumbEntry, CustomEventData, MetricKey, ReportCategory, ReportEnvelope,
};
use crate::store::{BreadcrumbLog, LayoutShiftSessions, MetricsStore};

pub struct Engine {
    config: EngineConfig,
    metrics: MetricsStore,
    breadcrumbs: BreadcrumbLog,
    sessions: LayoutShiftSessions,
    reporter: Arc<Reporter>,
    bus: EventBus,
    hooks: HookRegistry,
    plugins: Vec<PluginKind>,
    intake_tx: mpsc::UnboundedSender<RawSignal>,
    intake_rx: mpsc::UnboundedReceiver<RawSignal>,
    scheduler: Option<JoinHandle<()>>,
    scheduler_stop: Option<oneshot::Sender<()>>,
    started: bool,
}

impl Engine {
    /// Build an engine with the canonical plugin set.
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        Self::with_plugins(config, transport, PluginKind::default_set())
    }

    /// Build an engine with an explicit ordered plugin list. Dispatch walks
    /// the list in order and the first taker wins.
    pub fn with_plugins(
        config: EngineConfig,
        transport: Arc<dyn Transport>,
        plugins: Vec<PluginKind>,
    ) -> Self {
        let reporter = Arc::new(Reporter::new(transport, &config));
        let breadcrumbs = BreadcrumbLog::new(config.max_breadcrumbs);
        let (intake_tx, intake_rx) = mpsc::unbounded_channel();
        Self {
            config,
            metrics: MetricsStore::new(),
            breadcrumbs,
            sessions: LayoutShiftSessions::new(),
            reporter,
            bus: EventBus::new(),
            hooks: HookRegistry::new(),
            plugins,
            intake_tx,
            intake_rx,
            scheduler: None,
            scheduler_stop: None,
            started: false,
        }
    }

    /// Start the pipeline: install plugin instrumentation and spawn the
    /// periodic flush scheduler. Requires a running tokio runtime. Calling
    /// start twice is a no-op.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        for plugin in &mut self.plugins {
            plugin.start(&mut self.hooks, &self.intake_tx);
        }
        let (stop_tx, stop_rx) = oneshot::channel();
        self.scheduler = Some(tokio::spawn(flush_scheduler_task(
            Arc::clone(&self.reporter),
            self.config.flush_interval_ms,
            stop_rx,
        )));
        self.scheduler_stop = Some(stop_tx);
        self.started = true;
        log::info!(
            "Engine started ({} plugins, flush every {}ms)",
            self.plugins.len(),
            self.config.flush_interval_ms
        );
        self.bus
            .publish(EngineEvent::Started, &json!({"plugins": self.plugins.len()}));
    }

    /// The instrumentation surface acquisition collaborators emit through.
    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Drain the intake channel, routing each queued signal to the first
    /// plugin that claims it. Runs to completion; nothing here suspends
    /// except the delivery handoff.
    pub async fn process_pending(&mut self) {
        while let Ok(signal) = self.intake_rx.try_recv() {
            self.dispatch(signal).await;
        }
    }

    /// Route one signal immediately, bypassing the intake channel.
    pub async fn dispatch(&mut self, signal: RawSignal) {
        let Some(index) = self.plugins.iter().position(|p| p.wants(&signal)) else {
            log::debug!("No plugin claims signal {:?}", signal);
            return;
        };
        let plugin = &mut self.plugins[index];
        let mut ctx = EngineContext {
            config: &self.config,
            metrics: &mut self.metrics,
            breadcrumbs: &mut self.breadcrumbs,
            sessions: &mut self.sessions,
            reporter: &self.reporter,
            bus: &mut self.bus,
        };
        plugin.handle(signal, &mut ctx).await;
    }

    /// Queue one report record under `category`.
    pub async fn report(&mut self, category: ReportCategory, context: Value) {
        self.reporter
            .report(ReportEnvelope::single(category, context))
            .await;
        self.bus.publish(
            EngineEvent::Reported,
            &json!({"category": category.as_str()}),
        );
    }

    /// Snapshot the metrics store (with the layout-shift maximum read at
    /// this moment) and queue it as one `perf` record.
    pub async fn report_metrics(&mut self) {
        let mut snapshot = self.metrics.snapshot();
        snapshot.insert(
            MetricKey::CumulativeLayoutShift.as_str().to_string(),
            self.sessions.to_metric(),
        );
        self.report(ReportCategory::Perf, Value::Object(snapshot))
            .await;
    }

    /// Record and submit a custom analytics event: accumulated in the
    /// metrics store, breadcrumbed, and queued as a `custom` record.
    pub async fn track_event(&mut self, data: CustomEventData) {
        let value = match serde_json::to_value(&data) {
            Ok(value) => value,
            Err(e) => {
                log::error!("Failed to serialize custom event: {}", e);
                return;
            }
        };
        self.metrics
            .add(MetricKey::CustomDefineRecord, value.clone());
        let page = self
            .metrics
            .get(MetricKey::PageInformation)
            .and_then(|info| info.get("pathname"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        self.breadcrumbs.push(BreadcrumbEntry {
            name: MetricKey::CustomDefineRecord.as_str().to_string(),
            page,
            timestamp: now_millis(),
            value: value.clone(),
        });
        self.report(ReportCategory::Custom, value).await;
    }

    /// Subscribe to engine lifecycle events.
    pub fn subscribe(
        &mut self,
        event: EngineEvent,
        callback: impl FnMut(&Value) + Send + 'static,
    ) {
        self.bus.subscribe(event, callback);
    }

    /// Force a delivery attempt of everything queued.
    pub async fn flush(&self) {
        self.reporter.flush().await;
    }

    /// Tear down: restore instrumentation, stop the scheduler, drain the
    /// intake, and force a final flush to minimize the loss window. The
    /// scheduler is signalled and awaited rather than aborted, so a flush
    /// already in flight resolves (and requeues on failure) before the
    /// final flush runs.
    pub async fn shutdown(&mut self) {
        for plugin in &mut self.plugins {
            plugin.destroy(&mut self.hooks);
        }
        if let Some(stop) = self.scheduler_stop.take() {
            let _ = stop.send(());
        }
        if let Some(scheduler) = self.scheduler.take() {
            let _ = scheduler.await;
        }
        self.process_pending().await;
        self.reporter.flush().await;
        self.started = false;
        log::info!("Engine shut down");
        self.bus.publish(EngineEvent::Destroyed, &Value::Null);
    }

    pub fn metrics(&self) -> &MetricsStore {
        &self.metrics
    }

    pub fn breadcrumbs(&self) -> &BreadcrumbLog {
        &self.breadcrumbs
    }

    pub fn sessions(&self) -> &LayoutShiftSessions {
        &self.sessions
    }

    pub fn reporter(&self) -> &Arc<Reporter> {
        &self.reporter
    }

    /// Snapshot of the metric keys one plugin contributes, by plugin name.
    pub fn plugin_metrics(&self, name: &str) -> Option<serde_json::Map<String, Value>> {
        let plugin = self.plugins.iter().find(|p| p.name() == name)?;
        let keys = plugin.metric_keys();
        Some(
            self.metrics
                .snapshot()
                .into_iter()
                .filter(|(k, _)| {
                    MetricKey::from_str(k).is_some_and(|key| keys.contains(&key))
                })
                .collect(),
        )
    }
}
