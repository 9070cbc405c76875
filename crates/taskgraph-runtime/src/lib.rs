//! OS-thread-dependent execution layer for the task-graph engine: the
//! bounded job pool, the serial and parallel wave runners, and the two
//! profiling sinks that turn job/wave timing into the stable text log
//! format.
//!
//! # Modules
//!
//! - [`pool`] — `ThreadPool`, the fixed worker-thread job pool.
//! - [`runner`] — `SerialRunner`, `ParallelRunner`.
//! - [`profiler_sinks`] — `SingleThreadedProfiler`, `MultiThreadedProfiler`.

pub mod pool;
pub mod profiler_sinks;
pub mod runner;

pub use pool::ThreadPool;
pub use profiler_sinks::{MultiThreadedProfiler, SingleThreadedProfiler};
pub use runner::{ParallelRunner, SerialRunner};
