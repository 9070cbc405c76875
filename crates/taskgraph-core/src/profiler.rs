//! Profiling hooks (C5, platform-agnostic half).
//!
//! Wave runners report each job's and each wave's timing through a
//! [`Profiler`] after every `run`. This crate only defines the trait
//! and the plain data handed to it; the concrete sinks that turn a
//! stream of [`JobRecord`]s into the stable text log format live in
//! `taskgraph-runtime` since they need a background thread and a
//! writer, both platform-dependent concerns this crate stays free of.

use std::time::Duration;

use crate::id::NodeId;

/// One node's timing for a single wave, matching the `J` log line's
/// fields: node identifier, job id (the submitter-chosen slot id,
/// carried verbatim through [`crate::job::Job`]), owning worker thread
/// (`None` for the serial runner, which has no worker threads), and the
/// three lifecycle gaps — scheduled-to-started (`wait`),
/// started-to-ended (`run`), ended-to-synced (`sync`).
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub node_id: NodeId,
    pub job_id: usize,
    pub worker_index: Option<usize>,
    /// Time spent queued before a worker picked it up.
    pub wait: Option<Duration>,
    /// Time spent inside the node's callable.
    pub run: Option<Duration>,
    /// Time spent between the callable finishing and the wave runner
    /// observing the completion on the done channel.
    pub sync: Option<Duration>,
}

/// Sink for job-, wave-, run-, and custom-level timing. Implementations
/// must tolerate being called from any worker thread concurrently with
/// any other. The four methods correspond one-to-one with the `J`/`W`/
/// `R`/`C` log line prefixes.
pub trait Profiler: Send + Sync {
    /// One node's lifecycle timing within a wave (`J` line).
    fn record_job(&self, record: JobRecord);

    /// One wave's total wall-clock duration (`W` line).
    fn record_wave(&self, wave: usize, wave_duration: Duration);

    /// The total duration of a `run_n`/`run_loop` call, across every
    /// wave it drove (`R` line).
    fn record_run(&self, run_duration: Duration);

    /// A caller-tagged duration outside the job/wave/run lifecycle
    /// (`C` line) — e.g. timing a block of caller code between waves.
    fn record_custom(&self, label: &str, duration: Duration);
}

/// A profiler that discards everything, at the cost of one vtable
/// dispatch per record. The default for runners that weren't given one.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProfiler;

impl Profiler for NullProfiler {
    #[inline]
    fn record_job(&self, _record: JobRecord) {}

    #[inline]
    fn record_wave(&self, _wave: usize, _wave_duration: Duration) {}

    #[inline]
    fn record_run(&self, _run_duration: Duration) {}

    #[inline]
    fn record_custom(&self, _label: &str, _duration: Duration) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_profiler_accepts_any_record_without_panicking() {
        let profiler = NullProfiler;
        profiler.record_job(JobRecord {
            node_id: NodeId::new(1),
            job_id: 0,
            worker_index: Some(2),
            wait: Some(Duration::from_micros(5)),
            run: Some(Duration::from_micros(10)),
            sync: Some(Duration::from_micros(1)),
        });
        profiler.record_wave(0, Duration::from_micros(20));
        profiler.record_run(Duration::from_micros(100));
        profiler.record_custom("warmup", Duration::from_micros(7));
    }
}
