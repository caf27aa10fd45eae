//! Asynchronous notification delivery.
//!
//! Each category owns a bounded queue and one delivery thread, so a slow
//! handler in one category never holds up another and never blocks the
//! inbound loop. Notifications arriving before a handler is registered
//! wait in the queue; when a queue is full the oldest entry is dropped.

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};
use crate::report::{ReaderCapabilities, ReaderConfig, ReaderEvent, RoAccessReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ReaderCapabilities,
    ReaderConfig,
    RoAccessReport,
    ReaderEvent,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::ReaderCapabilities,
        Category::ReaderConfig,
        Category::RoAccessReport,
        Category::ReaderEvent,
    ];

    fn index(self) -> usize {
        match self {
            Category::ReaderCapabilities => 0,
            Category::ReaderConfig => 1,
            Category::RoAccessReport => 2,
            Category::ReaderEvent => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::ReaderCapabilities => "reader_capabilities",
            Category::ReaderConfig => "reader_config",
            Category::RoAccessReport => "ro_access_report",
            Category::ReaderEvent => "reader_event",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded message delivered to a category handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "category", content = "data", rename_all = "snake_case")]
pub enum Notification {
    ReaderCapabilities(ReaderCapabilities),
    ReaderConfig(ReaderConfig),
    RoAccessReport(RoAccessReport),
    ReaderEvent(ReaderEvent),
}

impl Notification {
    pub fn category(&self) -> Category {
        match self {
            Notification::ReaderCapabilities(_) => Category::ReaderCapabilities,
            Notification::ReaderConfig(_) => Category::ReaderConfig,
            Notification::RoAccessReport(_) => Category::RoAccessReport,
            Notification::ReaderEvent(_) => Category::ReaderEvent,
        }
    }
}

pub type Handler = Box<dyn FnMut(Notification) + Send + 'static>;

/// Per-category delivery counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    pub category: Category,
    pub handler_registered: bool,
    pub queued: usize,
    pub delivered: u64,
    /// Entries evicted from a full queue.
    pub dropped: u64,
    pub handler_panics: u64,
}

struct LaneState {
    queue: VecDeque<Notification>,
    handler: Option<Arc<Mutex<Handler>>>,
    closed: bool,
    delivered: u64,
    dropped: u64,
    handler_panics: u64,
}

struct Lane {
    category: Category,
    capacity: usize,
    state: Mutex<LaneState>,
    ready: Condvar,
}

impl Lane {
    fn new(category: Category, capacity: usize) -> Self {
        Self {
            category,
            capacity,
            state: Mutex::new(LaneState {
                queue: VecDeque::new(),
                handler: None,
                closed: false,
                delivered: 0,
                dropped: 0,
                handler_panics: 0,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, LaneState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn push(&self, notification: Notification) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        if state.queue.len() >= self.capacity {
            state.queue.pop_front();
            state.dropped += 1;
            warn!(
                category = %self.category,
                dropped = state.dropped,
                "notification queue full, dropped oldest"
            );
        }
        state.queue.push_back(notification);
        self.ready.notify_one();
    }

    fn run(&self) {
        loop {
            let (notification, handler) = {
                let mut state = self.lock();
                loop {
                    let deliverable = state.handler.is_some() && !state.queue.is_empty();
                    if deliverable {
                        break;
                    }
                    if state.closed {
                        return;
                    }
                    state = self.ready.wait(state).unwrap_or_else(|e| e.into_inner());
                }
                let Some(notification) = state.queue.pop_front() else {
                    continue;
                };
                let Some(handler) = state.handler.clone() else {
                    continue;
                };
                (notification, handler)
            };

            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut handler = handler.lock().unwrap_or_else(|e| e.into_inner());
                (handler)(notification)
            }));

            let mut state = self.lock();
            match outcome {
                Ok(()) => state.delivered += 1,
                Err(_) => {
                    state.handler_panics += 1;
                    warn!(category = %self.category, "notification handler panicked");
                }
            }
        }
    }

    fn stats(&self) -> CategoryStats {
        let state = self.lock();
        CategoryStats {
            category: self.category,
            handler_registered: state.handler.is_some(),
            queued: state.queue.len(),
            delivered: state.delivered,
            dropped: state.dropped,
            handler_panics: state.handler_panics,
        }
    }
}

struct ReportBuffer {
    reports: VecDeque<RoAccessReport>,
    dropped: u64,
    closed: Option<String>,
}

/// Await-side counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportBufferStats {
    pub buffered: usize,
    pub dropped: u64,
}

struct Shared {
    lanes: Vec<Lane>,
    capacity: usize,
    reports: Mutex<ReportBuffer>,
    report_ready: Condvar,
}

/// Routes decoded notifications to per-category handlers.
pub struct Dispatcher {
    shared: Arc<Shared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Dispatcher {
    /// Start one delivery thread per category.
    pub fn new(capacity: usize) -> Result<Self> {
        let capacity = capacity.max(1);
        let shared = Arc::new(Shared {
            lanes: Category::ALL
                .iter()
                .map(|category| Lane::new(*category, capacity))
                .collect(),
            capacity,
            reports: Mutex::new(ReportBuffer {
                reports: VecDeque::new(),
                dropped: 0,
                closed: None,
            }),
            report_ready: Condvar::new(),
        });

        let mut workers = Vec::with_capacity(Category::ALL.len());
        for category in Category::ALL {
            let lane_shared = Arc::clone(&shared);
            let handle = thread::Builder::new()
                .name(format!("llrpc-{}", category.name()))
                .spawn(move || lane_shared.lanes[category.index()].run())
                .map_err(|err| ClientError::Config(format!("spawn dispatcher thread: {err}")))?;
            workers.push(handle);
        }
        Ok(Self {
            shared,
            workers: Mutex::new(workers),
        })
    }

    /// Install `handler` for `category`, replacing any earlier one.
    ///
    /// Queued notifications are delivered to the new handler in arrival
    /// order. A delivery already in progress finishes on the old handler.
    pub fn register(&self, category: Category, handler: Handler) {
        let lane = &self.shared.lanes[category.index()];
        let mut state = lane.lock();
        state.handler = Some(Arc::new(Mutex::new(handler)));
        debug!(%category, queued = state.queue.len(), "handler registered");
        lane.ready.notify_one();
    }

    pub fn publish(&self, notification: Notification) {
        if let Notification::RoAccessReport(report) = &notification {
            self.buffer_report(report.clone());
        }
        self.shared.lanes[notification.category().index()].push(notification);
    }

    fn buffer_report(&self, report: RoAccessReport) {
        let mut buffer = self
            .shared
            .reports
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if buffer.reports.len() >= self.shared.capacity {
            buffer.reports.pop_front();
            buffer.dropped += 1;
        }
        buffer.reports.push_back(report);
        self.shared.report_ready.notify_all();
    }

    /// Take the oldest RO_ACCESS_REPORT not yet awaited.
    ///
    /// Reports stay available after the connection drops; once they are
    /// exhausted the wait fails with `ConnectionLost`.
    pub fn await_report(&self, timeout: Duration) -> Result<RoAccessReport> {
        let deadline = Instant::now() + timeout;
        let mut buffer = self
            .shared
            .reports
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(report) = buffer.reports.pop_front() {
                return Ok(report);
            }
            if let Some(reason) = &buffer.closed {
                return Err(ClientError::ConnectionLost(reason.clone()));
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ClientError::Timeout(timeout));
            }
            buffer = self
                .shared
                .report_ready
                .wait_timeout(buffer, deadline - now)
                .map(|(guard, _)| guard)
                .unwrap_or_else(|e| e.into_inner().0);
        }
    }

    /// Wake report waiters: no more reports will arrive.
    pub fn connection_closed(&self, reason: &str) {
        let mut buffer = self
            .shared
            .reports
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if buffer.closed.is_none() {
            buffer.closed = Some(reason.to_string());
        }
        self.shared.report_ready.notify_all();
    }

    pub fn stats(&self) -> Vec<CategoryStats> {
        self.shared.lanes.iter().map(Lane::stats).collect()
    }

    pub fn report_buffer_stats(&self) -> ReportBufferStats {
        let buffer = self
            .shared
            .reports
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        ReportBufferStats {
            buffered: buffer.reports.len(),
            dropped: buffer.dropped,
        }
    }

    /// Deliver what is queued to registered handlers, then stop the
    /// delivery threads. Idempotent.
    pub fn shutdown(&self) {
        for lane in &self.shared.lanes {
            let mut state = lane.lock();
            state.closed = true;
            lane.ready.notify_all();
        }
        self.connection_closed("client closed");

        let workers: Vec<JoinHandle<()>> = {
            let mut guard = self.workers.lock().unwrap_or_else(|e| e.into_inner());
            guard.drain(..).collect()
        };
        let current = thread::current().id();
        for worker in workers {
            // Shutting down from inside a handler; that thread exits on return.
            if worker.thread().id() == current {
                continue;
            }
            if worker.join().is_err() {
                warn!("dispatcher thread panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
