//! Concrete [`Profiler`] sinks that turn [`JobRecord`]s and run/custom
//! durations into the engine's stable, offline-parseable text log
//! format.
//!
//! Every line is comma-separated and starts with a single-letter tag:
//!
//! - `J,<node>,<job_id>,<worker>,<wait_us>,<run_us>,<sync_us>` — a job's full lifecycle within one wave (`worker` is `-` for the serial runner).
//! - `W,<wave>,<wave_us>` — a wave finished.
//! - `R,<run_us>` — the total duration of a `run_n`/`run_loop` call.
//! - `C,<label>,<us>` — a caller-tagged custom duration.
//!
//! [`SingleThreadedProfiler`] writes synchronously on the calling
//! (runner) thread, under a mutex, and flushes every `flush_every`
//! lines. [`MultiThreadedProfiler`] instead hands lines to a dedicated
//! logging thread through a bounded ring — so a slow or contended
//! writer (a file, a socket) never adds latency to the wave runner's
//! own thread(s); it flushes once per drain of the ring.
//!
//! Both sinks carry a runtime `enabled` toggle: a cheap `AtomicBool`
//! that `record_*` checks before doing any work. Flipping it off drops
//! incoming events on the floor without blocking or returning an error
//! — a caller can cheaply turn profiling on/off around a hot section
//! without reconstructing the sink or switching to [`NullProfiler`].
//!
//! [`NullProfiler`]: taskgraph_core::profiler::NullProfiler

use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use taskgraph_core::profiler::{JobRecord, Profiler};
use taskgraph_core::ring::BoundedRing;

fn format_job(record: &JobRecord) -> String {
    let worker = record
        .worker_index
        .map(|w| w.to_string())
        .unwrap_or_else(|| "-".to_string());
    format!(
        "J,{},{},{},{},{},{}",
        record.node_id,
        record.job_id,
        worker,
        record.wait.map(duration_us).unwrap_or(0),
        record.run.map(duration_us).unwrap_or(0),
        record.sync.map(duration_us).unwrap_or(0),
    )
}

fn format_wave(wave: usize, wave_duration: Duration) -> String {
    format!("W,{},{}", wave, duration_us(wave_duration))
}

fn format_run(run_duration: Duration) -> String {
    format!("R,{}", duration_us(run_duration))
}

fn format_custom(label: &str, duration: Duration) -> String {
    format!("C,{},{}", label, duration_us(duration))
}

fn duration_us(d: Duration) -> u128 {
    d.as_micros()
}

/// Writes profiling lines synchronously, on whichever thread calls the
/// `record_*` methods. Simple and sufficient for a serial runner, or a
/// parallel run where profiling overhead on the completing worker
/// doesn't matter.
pub struct SingleThreadedProfiler<W: Write + Send> {
    state: Mutex<SingleState<W>>,
    enabled: AtomicBool,
    flush_every: usize,
}

struct SingleState<W> {
    writer: W,
    lines_since_flush: usize,
}

impl<W: Write + Send> SingleThreadedProfiler<W> {
    /// Flushes the writer every `flush_every` lines (at least 1).
    /// Starts enabled.
    pub fn new(writer: W, flush_every: usize) -> Self {
        SingleThreadedProfiler {
            state: Mutex::new(SingleState { writer, lines_since_flush: 0 }),
            enabled: AtomicBool::new(true),
            flush_every: flush_every.max(1),
        }
    }

    /// Turn recording on or off. A cheap atomic store; takes effect on
    /// the next `record_*` call from any thread.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn write_line(&self, line: &str) {
        let mut state = self.state.lock().unwrap();
        let _ = writeln!(state.writer, "{}", line);
        state.lines_since_flush += 1;
        if state.lines_since_flush >= self.flush_every {
            let _ = state.writer.flush();
            state.lines_since_flush = 0;
        }
    }
}

impl<W: Write + Send> Profiler for SingleThreadedProfiler<W> {
    fn record_job(&self, record: JobRecord) {
        if !self.is_enabled() {
            return;
        }
        self.write_line(&format_job(&record));
    }

    fn record_wave(&self, wave: usize, wave_duration: Duration) {
        if !self.is_enabled() {
            return;
        }
        self.write_line(&format_wave(wave, wave_duration));
    }

    fn record_run(&self, run_duration: Duration) {
        if !self.is_enabled() {
            return;
        }
        self.write_line(&format_run(run_duration));
    }

    fn record_custom(&self, label: &str, duration: Duration) {
        if !self.is_enabled() {
            return;
        }
        self.write_line(&format_custom(label, duration));
    }
}

enum Entry {
    Job(JobRecord),
    Wave { wave: usize, wave_duration: Duration },
    Run { run_duration: Duration },
    Custom { label: String, duration: Duration },
}

struct RingState {
    ring: BoundedRing<Entry>,
    stop: bool,
}

/// Shared state between [`MultiThreadedProfiler`] and its background
/// logging thread. The thread clones only `Arc<ProfilerInner>`, never
/// `Arc<MultiThreadedProfiler>`, so the outer struct's strong count
/// reflects only external handles and `Drop` can actually join the
/// thread — the same split used by [`crate::pool::ThreadPool`]/
/// `PoolInner` and for the same reason.
struct ProfilerInner {
    state: Mutex<RingState>,
    added: Condvar,
    popped: Condvar,
    enabled: AtomicBool,
}

impl ProfilerInner {
    fn push_entry(&self, entry: Entry) {
        if !self.enabled.load(Ordering::Relaxed) {
            return;
        }
        let mut state = self.state.lock().unwrap();
        loop {
            if state.stop {
                return;
            }
            if !self.enabled.load(Ordering::Relaxed) {
                return;
            }
            if !state.ring.is_full() {
                state.ring.push(entry);
                break;
            }
            // Ring full: the logging thread is behind. Wait for it to
            // drain a slot rather than growing unboundedly.
            state = self.popped.wait(state).unwrap();
        }
        drop(state);
        self.added.notify_all();
    }

    /// Wait for the ring to go non-empty (or stop), then drain it
    /// fully, formatting and writing every entry before flushing once.
    fn drain_loop<W: Write>(&self, mut writer: W) {
        loop {
            let mut state = self.state.lock().unwrap();
            while state.ring.is_empty() && !state.stop {
                state = self.added.wait(state).unwrap();
            }
            if state.ring.is_empty() && state.stop {
                return;
            }
            let mut batch = Vec::new();
            while let Some(entry) = state.ring.pop().into_option() {
                batch.push(entry);
            }
            drop(state);
            self.popped.notify_all();
            for entry in &batch {
                write_entry(&mut writer, entry);
            }
            let _ = writer.flush();
        }
    }

    /// Stop accepting new records and wake the logging thread. Idempotent.
    fn request_stop(&self) {
        let mut state = self.state.lock().unwrap();
        if state.stop {
            return;
        }
        state.stop = true;
        drop(state);
        self.added.notify_all();
        self.popped.notify_all();
    }
}

/// Writes profiling lines from a dedicated background thread, fed by a
/// bounded ring. `record_*` blocks only as long as it takes to push
/// onto the ring — never for the actual write.
pub struct MultiThreadedProfiler {
    inner: Arc<ProfilerInner>,
    handle: Mutex<Option<thread::JoinHandle<()>>>,
}

impl MultiThreadedProfiler {
    /// Starts enabled.
    pub fn new<W: Write + Send + 'static>(writer: W, ring_capacity: usize) -> Arc<Self> {
        let inner = Arc::new(ProfilerInner {
            state: Mutex::new(RingState { ring: BoundedRing::new(ring_capacity), stop: false }),
            added: Condvar::new(),
            popped: Condvar::new(),
            enabled: AtomicBool::new(true),
        });

        let drain_inner = Arc::clone(&inner);
        let handle = thread::Builder::new()
            .name("taskgraph-profiler".to_string())
            .spawn(move || drain_inner.drain_loop(writer))
            .expect("failed to spawn profiler logging thread");

        Arc::new(MultiThreadedProfiler { inner, handle: Mutex::new(Some(handle)) })
    }

    /// Turn recording on or off. A cheap atomic store; takes effect on
    /// the next `record_*` call from any thread. Disabling drops
    /// incoming events without blocking or failing; it does not affect
    /// entries already queued on the ring, which the logging thread
    /// still drains and writes.
    pub fn set_enabled(&self, enabled: bool) {
        self.inner.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Relaxed)
    }

    /// Stop accepting new records and wait for the logging thread to
    /// drain whatever's left in the ring and exit. Idempotent — safe to
    /// call more than once, and safe to skip entirely and let `Drop`
    /// do it.
    pub fn shutdown(&self) {
        self.teardown();
    }

    fn teardown(&self) {
        self.inner.request_stop();
        if let Some(handle) = self.handle.lock().unwrap().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MultiThreadedProfiler {
    /// Matches §4.5's "On destruction, sets stop, notifies, joins."
    /// `handle` is owned directly, not behind the `Arc` the logging
    /// thread itself holds (that thread only clones `Arc<ProfilerInner>`),
    /// so this runs once no external handle to the profiler remains and
    /// can actually join the thread, flushing any buffered entries
    /// first.
    fn drop(&mut self) {
        self.teardown();
    }
}

fn write_entry<W: Write>(writer: &mut W, entry: &Entry) {
    let line = match entry {
        Entry::Job(record) => format_job(record),
        Entry::Wave { wave, wave_duration } => format_wave(*wave, *wave_duration),
        Entry::Run { run_duration } => format_run(*run_duration),
        Entry::Custom { label, duration } => format_custom(label, *duration),
    };
    let _ = writeln!(writer, "{}", line);
}

impl Profiler for MultiThreadedProfiler {
    fn record_job(&self, record: JobRecord) {
        self.inner.push_entry(Entry::Job(record));
    }

    fn record_wave(&self, wave: usize, wave_duration: Duration) {
        self.inner.push_entry(Entry::Wave { wave, wave_duration });
    }

    fn record_run(&self, run_duration: Duration) {
        self.inner.push_entry(Entry::Run { run_duration });
    }

    fn record_custom(&self, label: &str, duration: Duration) {
        self.inner.push_entry(Entry::Custom { label: label.to_string(), duration });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskgraph_core::id::NodeId;

    #[test]
    fn single_threaded_profiler_formats_all_line_kinds() {
        let buf: Vec<u8> = Vec::new();
        let profiler = SingleThreadedProfiler::new(buf, 4);
        profiler.record_job(JobRecord {
            node_id: NodeId::new(3),
            job_id: 7,
            worker_index: Some(2),
            wait: Some(Duration::from_micros(50)),
            run: Some(Duration::from_micros(120)),
            sync: Some(Duration::from_micros(9)),
        });
        profiler.record_wave(1, Duration::from_micros(500));
        profiler.record_run(Duration::from_micros(1500));
        profiler.record_custom("warmup", Duration::from_micros(42));

        let out = profiler.state.into_inner().unwrap().writer;
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("J,3,7,2,50,120,9"));
        assert!(text.contains("W,1,500"));
        assert!(text.contains("R,1500"));
        assert!(text.contains("C,warmup,42"));
    }

    #[test]
    fn single_threaded_profiler_flushes_every_n_lines() {
        let buf: Vec<u8> = Vec::new();
        let profiler = SingleThreadedProfiler::new(buf, 2);
        profiler.record_run(Duration::from_micros(1));
        assert_eq!(profiler.state.lock().unwrap().lines_since_flush, 1);
        profiler.record_run(Duration::from_micros(1));
        assert_eq!(profiler.state.lock().unwrap().lines_since_flush, 0);
    }

    #[test]
    fn single_threaded_profiler_disabled_drops_events_silently() {
        let buf: Vec<u8> = Vec::new();
        let profiler = SingleThreadedProfiler::new(buf, 4);
        profiler.set_enabled(false);
        profiler.record_run(Duration::from_micros(1));
        profiler.record_custom("ignored", Duration::from_micros(1));
        assert_eq!(profiler.state.lock().unwrap().lines_since_flush, 0);

        profiler.set_enabled(true);
        profiler.record_run(Duration::from_micros(1));
        assert_eq!(profiler.state.lock().unwrap().lines_since_flush, 1);
    }

    #[test]
    fn multi_threaded_profiler_drains_to_the_writer_on_shutdown() {
        let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
        struct SharedWriter(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedWriter {
            fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(data);
                Ok(data.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let profiler = MultiThreadedProfiler::new(SharedWriter(buf.clone()), 8);
        profiler.record_job(JobRecord {
            node_id: NodeId::new(1),
            job_id: 0,
            worker_index: Some(0),
            wait: Some(Duration::from_micros(1)),
            run: Some(Duration::from_micros(2)),
            sync: Some(Duration::from_micros(1)),
        });
        profiler.record_wave(0, Duration::from_micros(10));
        profiler.record_run(Duration::from_micros(10));
        profiler.record_custom("x", Duration::from_micros(3));
        profiler.shutdown();

        let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(text.contains("J,1,0,0,1,2,1"));
        assert!(text.contains("W,0,10"));
        assert!(text.contains("R,10"));
        assert!(text.contains("C,x,3"));
    }

    #[test]
    fn multi_threaded_profiler_disabled_drops_events_silently() {
        let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
        struct SharedWriter(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedWriter {
            fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(data);
                Ok(data.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let profiler = MultiThreadedProfiler::new(SharedWriter(buf.clone()), 8);
        profiler.set_enabled(false);
        profiler.record_run(Duration::from_micros(10));
        profiler.record_custom("ignored", Duration::from_micros(10));
        profiler.shutdown();

        let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(text.is_empty());
    }

    #[test]
    fn dropping_the_multi_threaded_profiler_without_shutdown_still_joins_the_logger() {
        let buf = Arc::new(Mutex::new(Vec::<u8>::new()));
        struct SharedWriter(Arc<Mutex<Vec<u8>>>);
        impl Write for SharedWriter {
            fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(data);
                Ok(data.len())
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let profiler = MultiThreadedProfiler::new(SharedWriter(buf.clone()), 8);
        profiler.record_run(Duration::from_micros(1));
        drop(profiler);

        let text = String::from_utf8(buf.lock().unwrap().clone()).unwrap();
        assert!(text.contains("R,1"));
    }
}
