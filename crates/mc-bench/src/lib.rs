//! `mc-bench` - Timing samples and the process-wide benchmark sink.
//!
//! The compute crates report `(label, duration)` pairs into an append-only,
//! mutex-protected collection; an external reporter drains and formats it
//! later. Pure data sink - nothing in the core depends on its contents.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;

/// A start/stop stopwatch.
///
/// `stop` returns the elapsed duration; the sample can then be pushed into
/// a [`BenchInfo`] under a label.
#[derive(Debug, Clone, Copy)]
pub struct Timeit {
    started: Instant,
}

impl Timeit {
    /// Start timing now.
    pub fn start() -> Self {
        Timeit {
            started: Instant::now(),
        }
    }

    /// Elapsed time since `start`.
    pub fn stop(&self) -> Duration {
        self.started.elapsed()
    }
}

/// One recorded timing sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub label: String,
    pub duration: Duration,
}

/// Append-only, mutex-protected collection of timing samples.
#[derive(Debug, Default)]
pub struct BenchInfo {
    entries: Mutex<Vec<Entry>>,
}

impl BenchInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one sample. Safe to call from any thread.
    pub fn add(&self, label: impl Into<String>, duration: Duration) {
        let mut entries = self.entries.lock().unwrap();
        entries.push(Entry {
            label: label.into(),
            duration,
        });
    }

    /// Take all recorded samples, leaving the collection empty.
    pub fn drain(&self) -> Vec<Entry> {
        let mut entries = self.entries.lock().unwrap();
        std::mem::take(&mut *entries)
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

static BENCH_INFO: Lazy<BenchInfo> = Lazy::new(BenchInfo::new);

/// The process-wide sink the harness drains after a run.
pub fn bench_info() -> &'static BenchInfo {
    &BENCH_INFO
}

/// Run `f`, recording its wall time into the process-wide sink under
/// `label`, and pass its result through.
pub fn time<R>(label: &str, f: impl FnOnce() -> R) -> R {
    let clock = Timeit::start();
    let result = f();
    bench_info().add(label, clock.stop());
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeit_measures_something() {
        let clock = Timeit::start();
        let d = clock.stop();
        assert!(d >= Duration::ZERO);
    }

    #[test]
    fn test_add_and_drain() {
        let info = BenchInfo::new();
        info.add("first", Duration::from_micros(10));
        info.add("second", Duration::from_micros(20));
        assert_eq!(info.len(), 2);

        let entries = info.drain();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].label, "first");
        assert_eq!(entries[1].duration, Duration::from_micros(20));
        assert!(info.is_empty());
    }

    #[test]
    fn test_concurrent_adds_are_all_kept() {
        use std::sync::Arc;
        use std::thread;

        let info = Arc::new(BenchInfo::new());
        let mut handles = Vec::new();
        for t in 0..8 {
            let info = Arc::clone(&info);
            handles.push(thread::spawn(move || {
                for i in 0..50 {
                    info.add(format!("t{}-{}", t, i), Duration::from_nanos(i));
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(info.len(), 8 * 50);
    }

    #[test]
    fn test_time_passes_result_through() {
        let value = time("answer", || 42);
        assert_eq!(value, 42);
        // The global sink now holds at least this sample.
        assert!(bench_info().drain().iter().any(|e| e.label == "answer"));
    }
}
