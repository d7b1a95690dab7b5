//! vitalflow: client-side telemetry aggregation and delivery
//!
//! Embeds in an application to collect performance metrics, user-behavior
//! breadcrumbs, and deduplicated error reports, then batches them to a
//! collector endpoint with retry. The pipeline:
//!
//! host instrumentation -> hook points -> plugins -> stores -> reporter -> collector
//!
//! The host wires acquisition into [`Engine::hooks`], periodically drains
//! with [`Engine::process_pending`], and the background flush scheduler
//! pushes batches out on an interval. [`Engine::shutdown`] restores the
//! instrumentation and forces a final flush.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod plugins;
pub mod reporter;
pub mod signal;
pub mod store;

pub use config::{init_logging, ConfigError, EngineConfig};
pub use dispatch::{EngineEvent, EventBus};
pub use engine::Engine;
pub use plugins::{HookRegistry, PluginKind, RawSignal};
pub use reporter::{HttpTransport, Reporter, Transport, TransportError};
pub use signal::{
    CustomEventData, ErrorMechanism, ErrorSignal, LayoutShiftEvent, MetricKey, MetricSignal,
    ReportCategory, ReportEnvelope,
};
