//! ProgressSink: thin reporter interface invoked once per table completed
//! by the driver.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

pub trait ProgressSink: Send + Sync {
    fn start(&self);
    fn add_task(&self, label: &str, total: u64) -> u64;
    fn advance(&self, task_id: u64, delta: u64);
    fn finish(&self);
}

/// No-op sink: the default for library callers that don't want console
/// output, and what the test suite uses.
#[derive(Default)]
pub struct NullProgressSink;

impl ProgressSink for NullProgressSink {
    fn start(&self) {}
    fn add_task(&self, _label: &str, _total: u64) -> u64 {
        0
    }
    fn advance(&self, _task_id: u64, _delta: u64) {}
    fn finish(&self) {}
}

/// Console reporter backed by `indicatif`.
pub struct ConsoleProgressSink {
    multi: MultiProgress,
    bars: Mutex<Vec<ProgressBar>>,
    next_id: AtomicU64,
}

impl ConsoleProgressSink {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(0),
        }
    }
}

impl Default for ConsoleProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for ConsoleProgressSink {
    fn start(&self) {}

    fn add_task(&self, label: &str, total: u64) -> u64 {
        let bar = self.multi.add(ProgressBar::new(total));
        if let Ok(style) = ProgressStyle::with_template("{prefix:.bold} [{bar:40}] {pos}/{len}") {
            bar.set_style(style);
        }
        bar.set_prefix(label.to_string());

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.bars.lock().unwrap().push(bar);
        id
    }

    fn advance(&self, task_id: u64, delta: u64) {
        if let Some(bar) = self.bars.lock().unwrap().get(task_id as usize) {
            bar.inc(delta);
        }
    }

    fn finish(&self) {
        for bar in self.bars.lock().unwrap().iter() {
            bar.finish();
        }
    }
}
