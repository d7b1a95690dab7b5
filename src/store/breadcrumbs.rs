//! Breadcrumb trail
//!
//! Insertion-ordered ring of recent user/network actions, attached to error
//! reports for context. Capacity is fixed at construction; pushing past it
//! evicts the oldest entry, so the trail can never grow unbounded.

use std::collections::VecDeque;

use crate::signal::BreadcrumbEntry;

#[derive(Debug)]
pub struct BreadcrumbLog {
    stack: VecDeque<BreadcrumbEntry>,
    capacity: usize,
}

impl BreadcrumbLog {
    /// `capacity` is clamped to at least 1: a zero-capacity trail can still
    /// be pushed to, and `len <= capacity` must hold at every observation
    /// point.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            stack: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one first when full. O(1)
    /// amortized; never exceeds capacity.
    pub fn push(&mut self, entry: BreadcrumbEntry) {
        if self.stack.len() >= self.capacity {
            self.stack.pop_front();
        }
        self.stack.push_back(entry);
    }

    /// Remove and return the oldest entry.
    pub fn shift(&mut self) -> Option<BreadcrumbEntry> {
        self.stack.pop_front()
    }

    /// Ordered read-only view, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &BreadcrumbEntry> {
        self.stack.iter()
    }

    /// Cloned ordered trail, for attaching to an outgoing error report.
    pub fn snapshot(&self) -> Vec<BreadcrumbEntry> {
        self.stack.iter().cloned().collect()
    }

    /// Empty the trail. Called after an error report goes out so the next
    /// distinct error does not carry a stale trail.
    pub fn clear(&mut self) {
        self.stack.clear();
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
