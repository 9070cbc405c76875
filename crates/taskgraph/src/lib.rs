//! # taskgraph — in-process typed task-graph execution engine
//!
//! A typed DAG of nodes, each a callable with a compile-time-checked
//! dependency arity, executed wave by wave either on the calling
//! thread or fanned out across a bounded pool of worker threads.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//! use taskgraph::prelude::*;
//!
//! let a = Node0::new(NodeId::new(1), || 21i32);
//! let b = Node1::new(NodeId::new(2), |x: i32| x * 2);
//! b.dep0(&a.handle());
//!
//! let mut list = NodeList::new(2);
//! list.add(a);
//! list.add(b.clone());
//! list.sort(SortType::Topological);
//!
//! let stop = AtomicBool::new(false);
//! SerialRunner::new().run_once(&list, 0, &stop);
//! assert_eq!(*b.output_any().unwrap().downcast::<i32>().unwrap(), 42);
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        NodeList                               │
//! │   Node0/Node1/../Node4 wired into a DAG, sort()'d into a       │
//! │   topological / depth / priority order (graph.rs)              │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┴──────────────┐
//!               ▼                             ▼
//!     ┌───────────────────┐         ┌───────────────────────┐
//!     │    SerialRunner     │         │    ParallelRunner       │
//!     │  runs sorted order   │         │  dispatch/drain loop     │
//!     │  on the caller's      │         │  against a ThreadPool    │
//!     │  own thread            │         └───────────┬───────────┘
//!     └───────────────────┘                     │
//!                                                ▼
//!                                    ┌───────────────────────┐
//!                                    │      ThreadPool         │
//!                                    │  N workers, one mutex,   │
//!                                    │  3 condvars, bounded      │
//!                                    │  scheduled/done rings     │
//!                                    └───────────────────────┘
//! ```
//!
//! Both runners report per-job and per-wave timing through a
//! [`taskgraph_core::profiler::Profiler`]; [`SingleThreadedProfiler`]
//! and [`MultiThreadedProfiler`] turn that into the stable `J`/`W`/`R`/`C`
//! text log format described in `profiler_sinks`.
//!
//! ## Crate layout
//!
//! This crate is a thin facade over two lower crates, split the way a
//! scheduling engine typically separates "what a node is" from "how it
//! gets run": `taskgraph-core` has no OS-thread dependency at all and
//! could back a different execution strategy; `taskgraph-runtime` is
//! where threads, mutexes, and condvars live.

pub use taskgraph_core::env;
pub use taskgraph_core::error::{TaskGraphError, TaskGraphResult};
pub use taskgraph_core::graph::{NodeList, SortType};
pub use taskgraph_core::id::NodeId;
pub use taskgraph_core::job::Job;
pub use taskgraph_core::log::{self, LogLevel};
pub use taskgraph_core::node::{AnyNode, Node0, Node1, Node2, Node3, Node4, NodeHandle};
pub use taskgraph_core::nodefn::NodeFn;
pub use taskgraph_core::optional::SmallOption;
pub use taskgraph_core::profiler::{JobRecord, NullProfiler, Profiler};
pub use taskgraph_core::ring::BoundedRing;
pub use taskgraph_core::{tgdebug, tgerror, tginfo, tgtrace, tgwarn};

pub use taskgraph_runtime::pool::ThreadPool;
pub use taskgraph_runtime::profiler_sinks::{MultiThreadedProfiler, SingleThreadedProfiler};
pub use taskgraph_runtime::runner::{ParallelRunner, SerialRunner};

/// Everything needed to wire a graph and run it, in one `use`.
pub mod prelude {
    pub use crate::{
        AnyNode, Job, JobRecord, NodeFn, NodeHandle, NodeId, NodeList, NullProfiler,
        ParallelRunner, Profiler, SerialRunner, SortType, TaskGraphError, ThreadPool,
    };
    pub use crate::{Node0, Node1, Node2, Node3, Node4};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn wires_and_runs_a_small_graph_end_to_end() {
        let a = Node0::new(NodeId::new(1), || 2i32);
        let b = Node1::new(NodeId::new(2), |x: i32| x + 3);
        let c = Node1::new(NodeId::new(3), |x: i32| x * 5);
        let d = Node2::new(NodeId::new(4), |x: i32, y: i32| x + y);
        b.dep0(&a.handle());
        c.dep0(&a.handle());
        d.dep0(&b.handle());
        d.dep1(&c.handle());

        let mut list = NodeList::new(4);
        list.add(a);
        list.add(b);
        list.add(c);
        list.add(d.clone());
        list.sort(SortType::Topological);

        let stop = AtomicBool::new(false);
        SerialRunner::new().run_once(&list, 0, &stop);
        assert_eq!(*d.output_any().unwrap().downcast::<i32>().unwrap(), 15);
    }

    #[test]
    fn runs_the_same_graph_on_a_thread_pool() {
        let a = Node0::new(NodeId::new(1), || 2i32);
        let b = Node1::new(NodeId::new(2), |x: i32| x + 3);
        let c = Node1::new(NodeId::new(3), |x: i32| x * 5);
        let d = Node2::new(NodeId::new(4), |x: i32, y: i32| x + y);
        b.dep0(&a.handle());
        c.dep0(&a.handle());
        d.dep0(&b.handle());
        d.dep1(&c.handle());

        let mut list = NodeList::new(4);
        list.add(a);
        list.add(b);
        list.add(c);
        list.add(d.clone());
        list.sort(SortType::Topological);

        let pool = ThreadPool::new(2, 8);
        let stop = AtomicBool::new(false);
        ParallelRunner::new(pool.clone()).run_once(&list, 0, &stop);
        assert_eq!(*d.output_any().unwrap().downcast::<i32>().unwrap(), 15);
        pool.shutdown();
        pool.join();
    }
}
