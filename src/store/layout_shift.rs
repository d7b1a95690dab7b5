//! Session-window clustering of layout-shift events
//!
//! Bursts of layout shift within 1s of each other and within a 5s span from
//! the first shift are treated as one visual event; anything farther apart
//! starts a fresh session. Only the maximum cumulative window value is
//! reported. The aggregator never pushes; consumers read the maximum at
//! report time.

use serde_json::json;

use crate::signal::LayoutShiftEvent;

/// Maximum gap between consecutive entries of one session, in milliseconds.
const ENTRY_GAP_MS: f64 = 1000.0;
/// Maximum span from the first entry of one session, in milliseconds.
const SESSION_SPAN_MS: f64 = 5000.0;

#[derive(Debug, Default)]
pub struct LayoutShiftSessions {
    session_value: f64,
    session_entries: Vec<LayoutShiftEvent>,
    max_value: f64,
    max_entries: Vec<LayoutShiftEvent>,
}

impl LayoutShiftSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one shift event. Input-caused shifts are discarded; others
    /// either extend the current session or start a new one, and the running
    /// maximum is updated.
    ///
    /// Session membership is decided by the entry list, not by the session
    /// value, so a leading zero-valued shift still anchors its session.
    pub fn record(&mut self, event: LayoutShiftEvent) {
        if event.had_recent_input {
            return;
        }

        let extends_session = match (self.session_entries.first(), self.session_entries.last()) {
            (Some(first), Some(last)) => {
                event.start_time - last.start_time < ENTRY_GAP_MS
                    && event.start_time - first.start_time < SESSION_SPAN_MS
            }
            _ => false,
        };

        if extends_session {
            self.session_value += event.value;
            self.session_entries.push(event);
        } else {
            self.session_value = event.value;
            self.session_entries = vec![event];
        }

        if self.session_value > self.max_value {
            self.max_value = self.session_value;
            self.max_entries = self.session_entries.clone();
        }
    }

    /// Maximum cumulative session value observed so far.
    pub fn max_value(&self) -> f64 {
        self.max_value
    }

    /// Entries of the maximum session. Read-only; a snapshot of the session
    /// as it stood when the maximum was set.
    pub fn max_entries(&self) -> &[LayoutShiftEvent] {
        &self.max_entries
    }

    /// Report-time shape for the metrics snapshot.
    pub fn to_metric(&self) -> serde_json::Value {
        json!({
            "clsValue": self.max_value,
            "clsEntries": self.max_entries,
        })
    }
}
