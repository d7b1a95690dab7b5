//! Engine event bus
//!
//! A plain publish/subscribe abstraction: one owned list of subscriber
//! callbacks per event kind, no inheritance, no shared listener registry.
//! The engine publishes lifecycle notifications; embedders subscribe to
//! observe the pipeline without reaching into it.

use std::collections::HashMap;

use serde_json::Value;

/// Engine lifecycle notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineEvent {
    /// The engine started: plugins are live, the scheduler is running.
    Started,
    /// A record was handed to the delivery queue.
    Reported,
    /// The engine tore down; the final flush has been attempted.
    Destroyed,
}

type Subscriber = Box<dyn FnMut(&Value) + Send>;

#[derive(Default)]
pub struct EventBus {
    subscribers: HashMap<EngineEvent, Vec<Subscriber>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for one event kind. Callbacks run in
    /// subscription order.
    pub fn subscribe(
        &mut self,
        event: EngineEvent,
        callback: impl FnMut(&Value) + Send + 'static,
    ) {
        self.subscribers
            .entry(event)
            .or_default()
            .push(Box::new(callback));
    }

    /// Invoke every subscriber of `event` with `payload`.
    pub fn publish(&mut self, event: EngineEvent, payload: &Value) {
        if let Some(callbacks) = self.subscribers.get_mut(&event) {
            for callback in callbacks.iter_mut() {
                callback(payload);
            }
        }
    }

    pub fn subscriber_count(&self, event: EngineEvent) -> usize {
        self.subscribers.get(&event).map_or(0, |c| c.len())
    }
}
