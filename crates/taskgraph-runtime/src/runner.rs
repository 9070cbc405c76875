//! Wave runners: drive every node in a [`NodeList`]'s sorted order
//! through exactly one readiness-to-done pass ("a wave"), either on
//! the calling thread ([`SerialRunner`]) or fanned out across a
//! [`ThreadPool`] ([`ParallelRunner`]).
//!
//! Both runners reset every node's `ready`/`done` flags at the start
//! of each wave in a multi-wave run — a node that was done in wave N
//! is eligible to run again in wave N+1 once its dependencies are
//! reset too, which is what makes a loop of waves meaningful for a
//! graph whose nodes represent repeating per-tick work rather than a
//! one-shot computation.
//!
//! Every runner call takes a `stop: &AtomicBool` — a single,
//! caller-owned cancellation flag threaded through to every blocking
//! pool operation. Setting it causes the current wave to stop
//! dispatching new nodes and the runner to return once any in-flight
//! callables finish; no hard interruption of a running callable is
//! attempted (see the design notes' "Global stop flag").

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use taskgraph_core::graph::NodeList;
use taskgraph_core::job::Job;
use taskgraph_core::profiler::{JobRecord, NullProfiler, Profiler};

use crate::pool::ThreadPool;

fn reset_all(list: &NodeList) {
    for node in list.sorted() {
        node.reset();
    }
}

/// Runs a wave on the calling thread, in the list's sorted order.
///
/// Correct only when that order is a valid topological order (e.g.
/// produced by [`taskgraph_core::graph::SortType::Topological`] or
/// [`taskgraph_core::graph::SortType::DepthOrPriority`]) — a node is
/// expected to already be ready by the time the scan reaches it.
pub struct SerialRunner<P = NullProfiler> {
    profiler: P,
}

impl SerialRunner<NullProfiler> {
    pub fn new() -> Self {
        SerialRunner { profiler: NullProfiler }
    }
}

impl Default for SerialRunner<NullProfiler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Profiler> SerialRunner<P> {
    pub fn with_profiler(profiler: P) -> Self {
        SerialRunner { profiler }
    }

    /// Read-only access to the profiler, for callers that want to emit
    /// their own `C` (custom-duration) lines between waves.
    pub fn profiler(&self) -> &P {
        &self.profiler
    }

    /// Run one wave without resetting first — useful when the caller
    /// has already prepared a fresh node list. `run_n`/`run_loop` call
    /// this after resetting.
    ///
    /// Stops early (leaving the remaining nodes un-run for this wave)
    /// the moment `stop` is observed set, checked before each node.
    pub fn run_once(&self, list: &NodeList, wave: usize, stop: &AtomicBool) {
        let start = Instant::now();
        for (job_id, node) in list.sorted().iter().enumerate() {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if !node.is_ready() {
                panic!(
                    "node {} was not ready during a serial run — the list's sorted order is not a valid topological order",
                    node.id()
                );
            }
            let t0 = Instant::now();
            node.run();
            node.set_done();
            let run = t0.elapsed();
            self.profiler.record_job(JobRecord {
                node_id: node.id(),
                job_id,
                worker_index: None,
                wait: Some(std::time::Duration::ZERO),
                run: Some(run),
                // No separate drain step on the calling thread: the
                // node is synced the instant it's done.
                sync: Some(std::time::Duration::ZERO),
            });
        }
        self.profiler.record_wave(wave, start.elapsed());
    }

    /// Run `waves` waves back to back, resetting every node before
    /// each, breaking early if `stop` is observed set between waves.
    /// Emits one `R` line with the total wall-clock time across every
    /// wave actually run.
    pub fn run_n(&self, list: &NodeList, stop: &AtomicBool, waves: usize) {
        let start = Instant::now();
        for wave in 0..waves {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            reset_all(list);
            self.run_once(list, wave, stop);
        }
        self.profiler.record_run(start.elapsed());
    }

    /// Run waves until `stop` is observed set, checked before each
    /// wave. Emits one `R` line with the total wall-clock time.
    pub fn run_loop(&self, list: &NodeList, stop: &AtomicBool) {
        let start = Instant::now();
        let mut wave = 0;
        while !stop.load(Ordering::Relaxed) {
            reset_all(list);
            self.run_once(list, wave, stop);
            wave += 1;
        }
        self.profiler.record_run(start.elapsed());
    }
}

/// Runs a wave across a [`ThreadPool`], dispatching every
/// currently-ready node and draining completions until the whole list
/// has run — unlike [`SerialRunner`], this works for any sorted order
/// since readiness, not position, gates dispatch.
pub struct ParallelRunner<P = NullProfiler> {
    pool: Arc<ThreadPool>,
    profiler: P,
}

impl ParallelRunner<NullProfiler> {
    pub fn new(pool: Arc<ThreadPool>) -> Self {
        ParallelRunner { pool, profiler: NullProfiler }
    }
}

impl<P: Profiler> ParallelRunner<P> {
    pub fn with_profiler(pool: Arc<ThreadPool>, profiler: P) -> Self {
        ParallelRunner { pool, profiler }
    }

    /// Read-only access to the profiler, for callers that want to emit
    /// their own `C` (custom-duration) lines between waves.
    pub fn profiler(&self) -> &P {
        &self.profiler
    }

    /// Dispatch every ready, not-yet-dispatched node (in sorted order,
    /// each node's index doubling as its job id for profiling) and
    /// drain completions, until every node in the list has been
    /// observed done or `stop` is set.
    pub fn run_once(&self, list: &NodeList, wave: usize, stop: &AtomicBool) {
        let start = Instant::now();
        let nodes = list.sorted();
        let total = nodes.len();
        let mut dispatched = vec![false; total];
        let mut collected = 0usize;

        'wave: while collected < total {
            for (i, node) in nodes.iter().enumerate() {
                if dispatched[i] || !node.is_ready() {
                    continue;
                }
                if stop.load(Ordering::Relaxed) {
                    break 'wave;
                }
                match self.pool.schedule_blocking_or_stop(Job::new(node.clone()).with_slot_id(i), stop) {
                    Ok(()) => dispatched[i] = true,
                    Err(_job) => break 'wave,
                }
            }
            if collected == total || stop.load(Ordering::Relaxed) {
                break;
            }
            match self.pool.take_done_blocking_or_stop(stop) {
                Some(mut job) => {
                    job.mark_synced();
                    // Single-writer discipline: the worker only ran the
                    // callable (Job::execute does not call set_done);
                    // the drain step is what marks the node done, now
                    // that this observation is synchronized through the
                    // pool's mutex.
                    job.node().set_done();
                    self.record(&job, wave);
                    collected += 1;
                }
                None => break,
            }
        }

        self.profiler.record_wave(wave, start.elapsed());
    }

    /// Run `waves` waves back to back, resetting every node before
    /// each, breaking early if `stop` is observed set between waves.
    /// Emits one `R` line with the total wall-clock time across every
    /// wave actually run.
    pub fn run_n(&self, list: &NodeList, stop: &AtomicBool, waves: usize) {
        let start = Instant::now();
        for wave in 0..waves {
            if stop.load(Ordering::Relaxed) {
                break;
            }
            reset_all(list);
            self.run_once(list, wave, stop);
        }
        self.profiler.record_run(start.elapsed());
    }

    /// Run waves until `stop` is observed set, checked before each
    /// wave. Emits one `R` line with the total wall-clock time.
    pub fn run_loop(&self, list: &NodeList, stop: &AtomicBool) {
        let start = Instant::now();
        let mut wave = 0;
        while !stop.load(Ordering::Relaxed) {
            reset_all(list);
            self.run_once(list, wave, stop);
            wave += 1;
        }
        self.profiler.record_run(start.elapsed());
    }

    fn record(&self, job: &Job, wave: usize) {
        let _ = wave;
        self.profiler.record_job(JobRecord {
            node_id: job.node().id(),
            job_id: job.slot_id(),
            worker_index: job.worker_index(),
            wait: job.wait_duration(),
            run: job.run_duration(),
            sync: job.sync_duration(),
        });
    }
}
