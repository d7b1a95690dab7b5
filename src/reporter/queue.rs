//! Delivery queue
//!
//! Buffers outgoing report records and flushes them as one batch: on the
//! periodic scheduler tick, when the queue reaches the batch threshold, or
//! unconditionally at teardown. `flush` snapshots and clears the queue
//! before transmitting, so a signal handler firing mid-send can never
//! corrupt the batch; the `sending` flag keeps sends from overlapping.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::{interval, sleep};

use crate::config::EngineConfig;
use crate::signal::ReportEnvelope;

use super::transport::{Transport, TransportError};

pub struct Reporter {
    transport: Arc<dyn Transport>,
    pending: Mutex<Vec<ReportEnvelope>>,
    sending: AtomicBool,
    max_batch_size: usize,
    retry_limit: u32,
    retry_delay: Duration,
}

impl Reporter {
    pub fn new(transport: Arc<dyn Transport>, config: &EngineConfig) -> Self {
        Self {
            transport,
            pending: Mutex::new(Vec::new()),
            sending: AtomicBool::new(false),
            max_batch_size: config.max_batch_size,
            retry_limit: config.retry_limit,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }

    /// Queue one record. Reaching the batch threshold triggers an immediate
    /// flush, independent of the scheduler.
    pub async fn report(&self, record: ReportEnvelope) {
        let at_capacity = {
            let mut pending = self.pending.lock().expect("pending queue poisoned");
            pending.push(record);
            pending.len() >= self.max_batch_size
        };
        if at_capacity {
            self.flush().await;
        }
    }

    /// Take everything queued and attempt one batched transmission. No-op
    /// while another send is in flight or when nothing is queued. On
    /// terminal failure the snapshot is re-injected in front of whatever
    /// arrived meanwhile, preserving emission order.
    pub async fn flush(&self) {
        if self
            .sending
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let batch = {
            let mut pending = self.pending.lock().expect("pending queue poisoned");
            std::mem::take(&mut *pending)
        };
        if batch.is_empty() {
            self.sending.store(false, Ordering::SeqCst);
            return;
        }

        // The guard owns the snapshot until the attempt resolves. Dropping
        // this future mid-send (task cancellation) requeues the snapshot and
        // releases the sending flag the same way a terminal failure does.
        let mut guard = FlushGuard {
            reporter: self,
            batch: Some(batch),
        };
        let outcome = match &guard.batch {
            Some(batch) => self.transmit(batch).await,
            None => Ok(()),
        };
        match outcome {
            Ok(()) => guard.batch = None,
            Err(e) => log::error!(
                "Telemetry delivery failed terminally, requeueing {} record(s): {}",
                guard.batch.as_ref().map_or(0, Vec::len),
                e
            ),
        }
    }

    /// One delivery attempt: beacon handoff first, then the keepalive
    /// request with up to `retry_limit` additional attempts at a fixed
    /// delay.
    async fn transmit(&self, batch: &[ReportEnvelope]) -> Result<(), TransportError> {
        let body = match serde_json::to_string(batch) {
            Ok(body) => body,
            Err(e) => {
                // Unserializable batches cannot succeed on retry either;
                // dropping with a diagnostic beats requeueing forever.
                log::error!("Dropping unserializable telemetry batch: {}", e);
                return Ok(());
            }
        };

        if self.transport.send_beacon(&body) {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            match self.transport.send_keepalive(&body).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.retry_limit => {
                    attempt += 1;
                    log::warn!(
                        "⏳ Telemetry send attempt {} of {} failed ({}), retrying in {}ms",
                        attempt,
                        self.retry_limit,
                        e,
                        self.retry_delay.as_millis()
                    );
                    sleep(self.retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Records currently awaiting delivery.
    pub fn pending_len(&self) -> usize {
        self.pending.lock().expect("pending queue poisoned").len()
    }
}

/// Holds one flush's snapshot until the attempt resolves. On drop, any batch
/// still held is re-prepended to the queue and the sending flag is released;
/// a successful send clears `batch` first so only the flag reset runs.
struct FlushGuard<'a> {
    reporter: &'a Reporter,
    batch: Option<Vec<ReportEnvelope>>,
}

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            if let Ok(mut pending) = self.reporter.pending.lock() {
                let newer = std::mem::replace(&mut *pending, batch);
                pending.extend(newer);
            }
        }
        self.reporter.sending.store(false, Ordering::SeqCst);
    }
}

/// Periodic flush loop. Ticks every `flush_interval_ms` until the shutdown
/// signal fires; a flush already underway when the signal arrives runs to
/// completion before the loop exits.
pub async fn flush_scheduler_task(
    reporter: Arc<Reporter>,
    flush_interval_ms: u64,
    mut shutdown: oneshot::Receiver<()>,
) {
    log::info!("⏰ Starting flush scheduler (interval: {}ms)", flush_interval_ms);
    let mut timer = interval(Duration::from_millis(flush_interval_ms));
    // The first tick fires immediately; skip it so the first real flush
    // happens one interval after startup.
    timer.tick().await;
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = timer.tick() => reporter.flush().await,
        }
    }
    log::info!("⏰ Flush scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ReportCategory;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicU32;

    struct MockTransport {
        beacon_available: bool,
        /// Keepalive calls that fail before one succeeds; u32::MAX = always.
        fail_first: AtomicU32,
        keepalive_delay: Duration,
        beacon_bodies: Mutex<Vec<String>>,
        keepalive_bodies: Mutex<Vec<String>>,
    }

    impl MockTransport {
        fn new(beacon_available: bool, fail_first: u32) -> Self {
            Self {
                beacon_available,
                fail_first: AtomicU32::new(fail_first),
                keepalive_delay: Duration::ZERO,
                beacon_bodies: Mutex::new(Vec::new()),
                keepalive_bodies: Mutex::new(Vec::new()),
            }
        }

        fn keepalive_calls(&self) -> usize {
            self.keepalive_bodies.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        fn send_beacon(&self, body: &str) -> bool {
            if self.beacon_available {
                self.beacon_bodies.lock().unwrap().push(body.to_string());
            }
            self.beacon_available
        }

        async fn send_keepalive(&self, body: &str) -> Result<(), TransportError> {
            if !self.keepalive_delay.is_zero() {
                sleep(self.keepalive_delay).await;
            }
            self.keepalive_bodies.lock().unwrap().push(body.to_string());
            let remaining = self.fail_first.load(Ordering::SeqCst);
            if remaining > 0 {
                if remaining != u32::MAX {
                    self.fail_first.store(remaining - 1, Ordering::SeqCst);
                }
                return Err(TransportError::Status(503));
            }
            Ok(())
        }
    }

    fn fast_config() -> EngineConfig {
        let mut config = EngineConfig::new("https://collector.example/api");
        config.max_batch_size = 3;
        config.retry_limit = 2;
        config.retry_delay_ms = 1;
        config
    }

    fn record(n: u64) -> ReportEnvelope {
        ReportEnvelope::single(ReportCategory::Custom, json!({"n": n}))
    }

    #[tokio::test]
    async fn test_capacity_triggers_immediate_flush() {
        let transport = Arc::new(MockTransport::new(false, 0));
        let reporter = Reporter::new(transport.clone(), &fast_config());

        reporter.report(record(1)).await;
        reporter.report(record(2)).await;
        assert_eq!(transport.keepalive_calls(), 0);

        // Third record reaches max_batch_size and flushes without a timer
        reporter.report(record(3)).await;
        assert_eq!(transport.keepalive_calls(), 1);
        assert_eq!(reporter.pending_len(), 0);

        let body = transport.keepalive_bodies.lock().unwrap()[0].clone();
        let parsed: Vec<ReportEnvelope> = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.len(), 3);
    }

    #[tokio::test]
    async fn test_flush_is_noop_when_empty() {
        let transport = Arc::new(MockTransport::new(false, 0));
        let reporter = Reporter::new(transport.clone(), &fast_config());
        reporter.flush().await;
        assert_eq!(transport.keepalive_calls(), 0);
    }

    #[tokio::test]
    async fn test_beacon_preferred_over_keepalive() {
        let transport = Arc::new(MockTransport::new(true, 0));
        let reporter = Reporter::new(transport.clone(), &fast_config());

        reporter.report(record(1)).await;
        reporter.flush().await;

        assert_eq!(transport.beacon_bodies.lock().unwrap().len(), 1);
        assert_eq!(transport.keepalive_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_until_success_within_limit() {
        // Fail twice, succeed on the third attempt (retry_limit = 2)
        let transport = Arc::new(MockTransport::new(false, 2));
        let reporter = Reporter::new(transport.clone(), &fast_config());

        reporter.report(record(1)).await;
        reporter.flush().await;

        assert_eq!(transport.keepalive_calls(), 3);
        assert_eq!(reporter.pending_len(), 0);
    }

    #[tokio::test]
    async fn test_exhausted_retries_requeue_batch() {
        let transport = Arc::new(MockTransport::new(false, u32::MAX));
        let reporter = Reporter::new(transport.clone(), &fast_config());

        reporter.report(record(1)).await;
        reporter.flush().await;

        // 1 attempt + retry_limit retries, then terminal requeue
        assert_eq!(transport.keepalive_calls(), 3);
        assert_eq!(reporter.pending_len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_batch_requeued_ahead_of_newer_records() {
        // [r1, r2] fails terminally while r3 arrives mid-flight; the queue
        // afterwards must read [r1, r2, r3].
        let mut transport = MockTransport::new(false, u32::MAX);
        transport.keepalive_delay = Duration::from_millis(30);
        let transport = Arc::new(transport);

        let mut config = fast_config();
        config.retry_limit = 0;
        let reporter = Arc::new(Reporter::new(transport.clone(), &config));

        reporter.report(record(1)).await;
        reporter.report(record(2)).await;

        let late = Arc::clone(&reporter);
        tokio::join!(reporter.flush(), async move {
            sleep(Duration::from_millis(10)).await;
            late.report(record(3)).await;
        });

        let pending = reporter.pending.lock().unwrap();
        let values: Vec<_> = pending
            .iter()
            .map(|r| r.context.as_ref().unwrap()["n"].as_u64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_flush_requeues_batch_and_releases_sending() {
        // A flush dropped mid-send must behave like a terminal failure:
        // snapshot back in the queue, sending flag released.
        let mut transport = MockTransport::new(false, u32::MAX);
        transport.keepalive_delay = Duration::from_millis(30);
        let transport = Arc::new(transport);

        let mut config = fast_config();
        config.retry_limit = 0;
        let reporter = Arc::new(Reporter::new(transport.clone(), &config));

        reporter.report(record(1)).await;
        let in_flight = tokio::spawn({
            let reporter = Arc::clone(&reporter);
            async move { reporter.flush().await }
        });
        sleep(Duration::from_millis(10)).await;
        in_flight.abort();
        let _ = in_flight.await;

        assert_eq!(reporter.pending_len(), 1);

        // The flag was released: a later flush delivers, in emission order
        reporter.report(record(2)).await;
        transport.fail_first.store(0, Ordering::SeqCst);
        reporter.flush().await;

        assert_eq!(reporter.pending_len(), 0);
        let body = transport.keepalive_bodies.lock().unwrap()[0].clone();
        let parsed: Vec<ReportEnvelope> = serde_json::from_str(&body).unwrap();
        let values: Vec<_> = parsed
            .iter()
            .map(|r| r.context.as_ref().unwrap()["n"].as_u64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_flush_is_rejected_while_sending() {
        let mut transport = MockTransport::new(false, 0);
        transport.keepalive_delay = Duration::from_millis(30);
        let transport = Arc::new(transport);
        let reporter = Arc::new(Reporter::new(transport.clone(), &fast_config()));

        reporter.report(record(1)).await;

        let second = Arc::clone(&reporter);
        tokio::join!(reporter.flush(), async move {
            sleep(Duration::from_millis(10)).await;
            second.flush().await;
        });

        // The overlapping flush hit the sending guard and sent nothing
        assert_eq!(transport.keepalive_calls(), 1);
    }
}
