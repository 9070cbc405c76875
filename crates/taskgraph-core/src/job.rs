//! A scheduled unit of work: one node handed to the job pool, plus the
//! bookkeeping the pool and profiling sinks attach to it as it moves
//! through the queued -> running -> done lifecycle.

use std::sync::Arc;
use std::time::Instant;

use crate::node::AnyNode;

/// One node's turn through the job pool.
///
/// `should_sync` marks jobs the scheduler must wait to see on the done
/// ring before a wave can be declared complete (every job a wave runner
/// submits is `should_sync`; a caller using the pool directly for
/// fire-and-forget background work can submit without it).
pub struct Job {
    node: Arc<dyn AnyNode>,
    slot_id: usize,
    should_sync: bool,
    queued_at: Option<Instant>,
    started_at: Option<Instant>,
    finished_at: Option<Instant>,
    synced_at: Option<Instant>,
    worker_index: Option<usize>,
}

impl Job {
    pub fn new(node: Arc<dyn AnyNode>) -> Self {
        Job {
            node,
            slot_id: 0,
            should_sync: true,
            queued_at: None,
            started_at: None,
            finished_at: None,
            synced_at: None,
            worker_index: None,
        }
    }

    pub fn without_sync(mut self) -> Self {
        self.should_sync = false;
        self
    }

    /// Tag this job with the submitter-chosen slot id returned verbatim
    /// on the done channel (the wave runner's index into its sorted
    /// node list) so the submitter can correlate without a lookup, and
    /// so it can be carried through to the `job-id` field of a `J`
    /// profiling line.
    pub fn with_slot_id(mut self, slot_id: usize) -> Self {
        self.slot_id = slot_id;
        self
    }

    pub fn slot_id(&self) -> usize {
        self.slot_id
    }

    pub fn node(&self) -> &Arc<dyn AnyNode> {
        &self.node
    }

    pub fn should_sync(&self) -> bool {
        self.should_sync
    }

    /// Called by the pool immediately after a successful schedule.
    pub fn mark_queued(&mut self) {
        self.queued_at = Some(Instant::now());
    }

    /// Called by a worker immediately before invoking the node.
    pub fn mark_started(&mut self, worker_index: usize) {
        self.started_at = Some(Instant::now());
        self.worker_index = Some(worker_index);
    }

    /// Called by a worker immediately after the node's `run` returns.
    pub fn mark_finished(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    /// Called by the wave runner the moment it observes this job on the
    /// done channel (i.e. when it is "synced" back to the submitter).
    pub fn mark_synced(&mut self) {
        self.synced_at = Some(Instant::now());
    }

    pub fn queued_at(&self) -> Option<Instant> {
        self.queued_at
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<Instant> {
        self.finished_at
    }

    pub fn worker_index(&self) -> Option<usize> {
        self.worker_index
    }

    /// Queued-to-started wait, once both timestamps are present.
    pub fn wait_duration(&self) -> Option<std::time::Duration> {
        Some(self.started_at?.saturating_duration_since(self.queued_at?))
    }

    /// Started-to-finished run duration, once both timestamps are present.
    pub fn run_duration(&self) -> Option<std::time::Duration> {
        Some(self.finished_at?.saturating_duration_since(self.started_at?))
    }

    /// Finished-to-synced handoff wait, once both timestamps are present.
    pub fn sync_duration(&self) -> Option<std::time::Duration> {
        Some(self.synced_at?.saturating_duration_since(self.finished_at?))
    }

    /// Run the wrapped node's callable. Deliberately does *not* call
    /// `set_done` — per the engine's single-writer discipline, only the
    /// wave runner mutates a node's flags once it has observed this job
    /// on the done channel, never the worker that ran it. Timestamps
    /// are the caller's responsibility (see `mark_started`/
    /// `mark_finished`) so a non-profiling pool can skip
    /// `Instant::now()` calls entirely.
    pub fn execute(&self) {
        self.node.run();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::NodeId;
    use crate::node::Node0;

    #[test]
    fn defaults_to_should_sync() {
        let job = Job::new(Node0::new(NodeId::new(1), || 1i32));
        assert!(job.should_sync());
        let job = job.without_sync();
        assert!(!job.should_sync());
    }

    #[test]
    fn execute_runs_but_leaves_set_done_to_the_caller() {
        let node = Node0::new(NodeId::new(1), || 5i32);
        let job = Job::new(node.clone());
        assert!(!node.is_done());
        job.execute();
        assert_eq!(*node.output_any().unwrap().downcast::<i32>().unwrap(), 5);
        assert!(!node.is_done());
        node.set_done();
        assert!(node.is_done());
    }

    #[test]
    fn durations_require_both_timestamps() {
        let mut job = Job::new(Node0::new(NodeId::new(1), || 1i32));
        assert!(job.wait_duration().is_none());
        job.mark_queued();
        job.mark_started(0);
        assert!(job.wait_duration().is_some());
        assert!(job.run_duration().is_none());
        job.mark_finished();
        assert!(job.run_duration().is_some());
        assert_eq!(job.worker_index(), Some(0));
        assert!(job.sync_duration().is_none());
        job.mark_synced();
        assert!(job.sync_duration().is_some());
    }

    #[test]
    fn slot_id_defaults_to_zero_and_is_settable() {
        let job = Job::new(Node0::new(NodeId::new(1), || 1i32));
        assert_eq!(job.slot_id(), 0);
        let job = job.with_slot_id(3);
        assert_eq!(job.slot_id(), 3);
    }
}
