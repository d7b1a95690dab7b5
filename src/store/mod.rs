//! Bounded in-memory aggregation structures
//!
//! Everything here lives for exactly one page view: created at engine
//! construction, mutated by signal routing, discarded at teardown. Nothing
//! is persisted and nothing grows without bound (the ring evicts, the
//! metrics store overwrites, the session aggregator keeps one window).
//!
//! - `metrics` - keyed latest-value / append-only store
//! - `breadcrumbs` - fixed-capacity FIFO behavior trail
//! - `layout_shift` - session-window clustering of layout-shift events

pub mod breadcrumbs;
pub mod layout_shift;
pub mod metrics;

pub use breadcrumbs::BreadcrumbLog;
pub use layout_shift::LayoutShiftSessions;
pub use metrics::MetricsStore;
