//! Batching, retry, and delivery
//!
//! Outgoing records queue up in the `Reporter` and leave in batches: on a
//! timer, on a capacity threshold, or on teardown. Delivery is two-tier -
//! a beacon-style fire-and-forget handoff first, a keepalive HTTP request
//! with bounded retry when the beacon is unavailable or refuses the batch.
//! A terminally failed batch is re-queued in front of newer arrivals so no
//! record is silently dropped while the page lives.

pub mod queue;
pub mod transport;

pub use queue::{flush_scheduler_task, Reporter};
pub use transport::{HttpTransport, Transport, TransportError};
