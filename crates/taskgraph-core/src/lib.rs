//! Platform-agnostic types and traits for the task-graph execution
//! engine: typed nodes, the node list and its sort/cycle-detection
//! pass, the job unit handed to a pool, the profiling data shape, and
//! the small load-bearing primitives (`NodeId`, `BoundedRing`,
//! `SmallOption`, `TaskGraphError`) they all build on.
//!
//! Everything that needs an OS thread, a mutex, or a writer lives one
//! layer up in `taskgraph-runtime`; this crate has no such dependency
//! and could in principle run on a single thread or be reused by a
//! different execution strategy entirely.
//!
//! # Modules
//!
//! - [`id`] — `NodeId`, the opaque node identifier.
//! - [`error`] — `TaskGraphError`, the engine's fatal-condition taxonomy.
//! - [`env`] — environment-variable-driven defaults, read once at startup.
//! - [`log`] — the `tg*!` leveled debug-print macros (maintainer diagnostics).
//! - [`optional`] — `SmallOption<T>`, the in-place optional used by pop/take APIs.
//! - [`ring`] — `BoundedRing<T>`, the fixed-capacity FIFO.
//! - [`nodefn`] — `NodeFn`, the compile-time callable-arity abstraction.
//! - [`node`] — `AnyNode`, `NodeHandle<O>`, and the `Node0`..`Node4` structs.
//! - [`graph`] — `NodeList`, `SortType`, cycle detection.
//! - [`job`] — `Job`, the unit the job pool schedules and runs.
//! - [`profiler`] — `Profiler`, `JobRecord`, `NullProfiler`.

pub mod env;
pub mod error;
pub mod graph;
pub mod id;
pub mod job;
pub mod log;
pub mod node;
pub mod nodefn;
pub mod optional;
pub mod profiler;
pub mod ring;

pub use error::{TaskGraphError, TaskGraphResult};
pub use graph::{NodeList, SortType};
pub use id::NodeId;
pub use job::Job;
pub use node::{AnyNode, Node0, Node1, Node2, Node3, Node4, NodeHandle};
pub use nodefn::NodeFn;
pub use optional::SmallOption;
pub use profiler::{JobRecord, NullProfiler, Profiler};
pub use ring::BoundedRing;
