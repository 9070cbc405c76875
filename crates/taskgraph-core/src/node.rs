//! Typed node abstraction (part of C3).
//!
//! The source material keeps each node's callable signature static
//! (compile-time templates) while storing nodes behind a uniform
//! dependency/readiness interface. The Rust rendition keeps that split:
//! a parametric `NodeK<F, A1..AK>` struct per arity holds the callable
//! and its typed output; a non-generic [`AnyNode`] trait is the
//! polymorphic capability surface (`run`, `is_ready`, `set_done`,
//! `reset`, typed-output access, `identifier`, `priority`, `depth`) that
//! the graph, runners, and job pool all program against.
//!
//! Output storage lives inside the generic node and is handed to
//! successors as `Arc<dyn Any + Send + Sync>` — a type-erased pointer
//! that each reader re-types (via `downcast`) using its own statically
//! known argument list. This is the safe idiomatic analog of the
//! source material's type-erased output pointer.
//!
//! Dependency wiring is compile-time checked without a runtime
//! type-mismatch path: [`NodeHandle<O>`] carries the phantom output
//! type of the node it was taken from, and each node's `set_dep{N}`
//! setter only accepts a handle whose `O` matches that slot's declared
//! argument type. Passing the wrong handle is a compile error, not a
//! runtime assertion.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TaskGraphError;
use crate::id::NodeId;
use crate::nodefn::NodeFn;

/// Type-erased capability surface every concrete `NodeK` implements.
///
/// Flags (`ready`, `done`, `visited`, `active`) are stored as relaxed
/// atomics purely to satisfy the `Sync` bound needed to move nodes
/// across the job pool's worker threads. The atomics' memory ordering
/// is *not* what makes concurrent access race-free — single-writer
/// discipline plus the job pool's own mutex lock/unlock around every
/// dispatch and drain step establishes the happens-before edge (see
/// `taskgraph-runtime::pool`). Relaxed is correct, not merely
/// convenient, given that externally-provided edge.
pub trait AnyNode: Send + Sync {
    /// Opaque, user-assigned identifier.
    fn id(&self) -> NodeId;

    /// Compile-time-fixed number of dependency slots.
    fn arity(&self) -> usize;

    /// The upstream node wired into `slot`.
    ///
    /// # Panics
    /// Panics if `slot` is out of range, or if the slot was never
    /// wired via the node's typed `set_dep{N}` setter — both are fatal
    /// programmer errors per the engine's error taxonomy.
    fn dependency(&self, slot: usize) -> Arc<dyn AnyNode>;

    fn priority(&self) -> u32;
    fn set_priority(&self, priority: u32);

    fn depth(&self) -> usize;
    fn set_depth(&self, depth: usize);

    fn is_visited(&self) -> bool;
    fn set_visited(&self, visited: bool);

    fn is_active(&self) -> bool;
    fn set_active(&self, active: bool);

    /// True iff every dependency slot is `done`. Memoized for the
    /// current wave; cleared by `reset`.
    fn is_ready(&self) -> bool;

    fn is_done(&self) -> bool;

    /// Mark the node done for the current wave. Called by a wave
    /// runner after observing `run` complete.
    fn set_done(&self);

    /// Clear `ready`/`done` at the start of a new wave.
    fn reset(&self);

    /// Invoke the callable, reading each dependency's stored output
    /// and writing this node's own output.
    ///
    /// # Panics
    /// Panics if `is_ready()` is false.
    fn run(&self);

    /// This node's last computed output, type-erased. `None` only
    /// before the first `run()` of the node's lifetime.
    fn output_any(&self) -> Option<Arc<dyn Any + Send + Sync>>;
}

/// A typed reference to a node's output, used to wire dependencies at
/// compile-time-checked call sites. Cheap to clone (one `Arc` bump);
/// the same handle can feed any number of successor slots.
pub struct NodeHandle<O> {
    inner: Arc<dyn AnyNode>,
    _marker: PhantomData<fn() -> O>,
}

impl<O> NodeHandle<O> {
    pub fn id(&self) -> NodeId {
        self.inner.id()
    }

    /// Type-erased handle to the same node, for insertion into a
    /// [`crate::graph::NodeList`].
    pub fn as_any_node(&self) -> Arc<dyn AnyNode> {
        self.inner.clone()
    }
}

impl<O> Clone for NodeHandle<O> {
    fn clone(&self) -> Self {
        NodeHandle { inner: self.inner.clone(), _marker: PhantomData }
    }
}

/// Read dependency slot `slot` (wired via `dep`) as `T`, panicking with
/// a [`TaskGraphError`]-shaped message on a missing wire or a type
/// mismatch. Shared by every `NodeK::run` impl below.
fn read_dependency<T: 'static + Clone>(
    dep: &Mutex<Option<Arc<dyn AnyNode>>>,
    node_id: NodeId,
    slot: usize,
) -> T {
    let upstream = dep
        .lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| panic!("{}", TaskGraphError::MissingDependency { node: node_id, slot }));
    let output = upstream
        .output_any()
        .unwrap_or_else(|| panic!("node {} read slot {} before its upstream ever ran", node_id, slot));
    let typed = output.downcast::<T>().unwrap_or_else(|_| {
        panic!(
            "node {} slot {}: upstream output type does not match the wired argument type",
            node_id, slot
        )
    });
    (*typed).clone()
}

fn dep_is_done(dep: &Mutex<Option<Arc<dyn AnyNode>>>) -> bool {
    dep.lock().unwrap().as_ref().map(|d| d.is_done()).unwrap_or(false)
}

fn dep_or_panic(
    dep: &Mutex<Option<Arc<dyn AnyNode>>>,
    node_id: NodeId,
    slot: usize,
) -> Arc<dyn AnyNode> {
    dep.lock()
        .unwrap()
        .clone()
        .unwrap_or_else(|| panic!("{}", TaskGraphError::MissingDependency { node: node_id, slot }))
}

/// Common flag storage shared by every arity's `NodeK`.
struct Flags {
    priority: AtomicU32,
    depth: AtomicUsize,
    visited: AtomicBool,
    active: AtomicBool,
    ready: AtomicBool,
    done: AtomicBool,
}

impl Flags {
    fn new() -> Self {
        Flags {
            priority: AtomicU32::new(0),
            depth: AtomicUsize::new(0),
            visited: AtomicBool::new(false),
            active: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            done: AtomicBool::new(false),
        }
    }
}

macro_rules! define_node {
    (
        $name:ident ;
        [ $( $arg:ident ),* ] ;
        [ $( $dep:ident ),* ] ;
        [ $( $idx:tt ),* ]
    ) => {
        #[doc = concat!(
            "A node with ", stringify!($name), "-shaped (",
            stringify!($($arg),*), ") dependency arity."
        )]
        pub struct $name<F, $( $arg ),*>
        where
            F: NodeFn<( $( $arg, )* )>,
            $( $arg: 'static + Send + Sync + Clone, )*
            F::Output: 'static + Send + Sync,
        {
            id: NodeId,
            flags: Flags,
            $( $dep: Mutex<Option<Arc<dyn AnyNode>>>, )*
            output: Mutex<Option<Arc<dyn Any + Send + Sync>>>,
            f: F,
            _marker: PhantomData<( $( $arg, )* )>,
        }

        impl<F, $( $arg ),*> $name<F, $( $arg ),*>
        where
            F: NodeFn<( $( $arg, )* )>,
            $( $arg: 'static + Send + Sync + Clone, )*
            F::Output: 'static + Send + Sync,
        {
            /// Construct a new node wrapping callable `f`, identified
            /// by `id` for profiling/correlation.
            pub fn new(id: NodeId, f: F) -> Arc<Self> {
                Arc::new($name {
                    id,
                    flags: Flags::new(),
                    $( $dep: Mutex::new(None), )*
                    output: Mutex::new(None),
                    f,
                    _marker: PhantomData,
                })
            }

            /// Builder-style priority setter (default priority is 0).
            pub fn with_priority(self: Arc<Self>, priority: u32) -> Arc<Self> {
                self.flags.priority.store(priority, Ordering::Relaxed);
                self
            }

            /// A typed handle to this node's output, for wiring into a
            /// successor's dependency slot.
            pub fn handle(self: &Arc<Self>) -> NodeHandle<F::Output> {
                NodeHandle { inner: self.clone() as Arc<dyn AnyNode>, _marker: PhantomData }
            }

            $(
                #[doc = concat!("Wire dependency slot ", stringify!($idx), ".")]
                pub fn $dep(&self, upstream: &NodeHandle<$arg>) {
                    *self.$dep.lock().unwrap() = Some(upstream.as_any_node());
                }
            )*
        }

        impl<F, $( $arg ),*> AnyNode for $name<F, $( $arg ),*>
        where
            F: NodeFn<( $( $arg, )* )>,
            $( $arg: 'static + Send + Sync + Clone, )*
            F::Output: 'static + Send + Sync,
        {
            fn id(&self) -> NodeId {
                self.id
            }

            fn arity(&self) -> usize {
                #[allow(unused_mut)]
                let mut n = 0usize;
                $( let _ = stringify!($idx); n += 1; )*
                n
            }

            fn dependency(&self, slot: usize) -> Arc<dyn AnyNode> {
                match slot {
                    $( $idx => dep_or_panic(&self.$dep, self.id, slot), )*
                    _ => panic!(
                        "{}",
                        TaskGraphError::SlotOutOfRange { node: self.id, slot, arity: self.arity() }
                    ),
                }
            }

            fn priority(&self) -> u32 {
                self.flags.priority.load(Ordering::Relaxed)
            }

            fn set_priority(&self, priority: u32) {
                self.flags.priority.store(priority, Ordering::Relaxed);
            }

            fn depth(&self) -> usize {
                self.flags.depth.load(Ordering::Relaxed)
            }

            fn set_depth(&self, depth: usize) {
                self.flags.depth.store(depth, Ordering::Relaxed);
            }

            fn is_visited(&self) -> bool {
                self.flags.visited.load(Ordering::Relaxed)
            }

            fn set_visited(&self, visited: bool) {
                self.flags.visited.store(visited, Ordering::Relaxed);
            }

            fn is_active(&self) -> bool {
                self.flags.active.load(Ordering::Relaxed)
            }

            fn set_active(&self, active: bool) {
                self.flags.active.store(active, Ordering::Relaxed);
            }

            fn is_ready(&self) -> bool {
                if self.flags.ready.load(Ordering::Relaxed) {
                    return true;
                }
                #[allow(unused_mut)]
                let mut all_done = true;
                $( all_done = all_done && dep_is_done(&self.$dep); )*
                if all_done {
                    self.flags.ready.store(true, Ordering::Relaxed);
                }
                all_done
            }

            fn is_done(&self) -> bool {
                self.flags.done.load(Ordering::Relaxed)
            }

            fn set_done(&self) {
                self.flags.done.store(true, Ordering::Relaxed);
            }

            fn reset(&self) {
                self.flags.ready.store(false, Ordering::Relaxed);
                self.flags.done.store(false, Ordering::Relaxed);
            }

            fn run(&self) {
                assert!(self.is_ready(), "node {} run() called before isReady", self.id);
                let args = ( $( read_dependency::<$arg>(&self.$dep, self.id, $idx), )* );
                let result = self.f.call(args);
                *self.output.lock().unwrap() = Some(Arc::new(result) as Arc<dyn Any + Send + Sync>);
            }

            fn output_any(&self) -> Option<Arc<dyn Any + Send + Sync>> {
                self.output.lock().unwrap().clone()
            }
        }
    };
}

define_node!(Node0; []; []; []);
define_node!(Node1; [A]; [dep0]; [0]);
define_node!(Node2; [A, B]; [dep0, dep1]; [0, 1]);
define_node!(Node3; [A, B, C]; [dep0, dep1, dep2]; [0, 1, 2]);
define_node!(Node4; [A, B, C, D]; [dep0, dep1, dep2, dep3]; [0, 1, 2, 3]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_node_is_always_ready() {
        let a = Node0::new(NodeId::new(1), || 7i32);
        assert!(a.is_ready());
        a.run();
        assert_eq!(*a.output_any().unwrap().downcast::<i32>().unwrap(), 7);
    }

    #[test]
    fn one_arg_node_waits_for_dependency() {
        let a = Node0::new(NodeId::new(1), || 7i32);
        let b = Node1::new(NodeId::new(2), |x: i32| x as f64 + 0.5);
        b.dep0(&a.handle());

        assert!(!b.is_ready());
        a.run();
        a.set_done();
        assert!(b.is_ready());
        b.run();
        assert_eq!(*b.output_any().unwrap().downcast::<f64>().unwrap(), 7.5);
    }

    #[test]
    fn two_arg_node_combines_both_dependencies() {
        let a = Node0::new(NodeId::new(1), || 3i32);
        let b = Node1::new(NodeId::new(2), |x: i32| x + 1);
        let c = Node1::new(NodeId::new(3), |x: i32| x * 2);
        let d = Node2::new(NodeId::new(4), |x: i32, y: i32| x + y);

        b.dep0(&a.handle());
        c.dep0(&a.handle());
        d.dep0(&b.handle());
        d.dep1(&c.handle());

        a.run();
        a.set_done();
        b.run();
        b.set_done();
        c.run();
        c.set_done();
        assert!(d.is_ready());
        d.run();
        assert_eq!(*d.output_any().unwrap().downcast::<i32>().unwrap(), 10);
    }

    #[test]
    #[should_panic(expected = "before isReady")]
    fn run_before_ready_panics() {
        let a = Node0::new(NodeId::new(1), || 1i32);
        let b = Node1::new(NodeId::new(2), |x: i32| x);
        b.dep0(&a.handle());
        b.run();
    }

    #[test]
    fn reset_clears_ready_and_done_memoization() {
        let a = Node0::new(NodeId::new(1), || 1i32);
        assert!(a.is_ready());
        a.run();
        a.set_done();
        assert!(a.is_done());
        a.reset();
        assert!(!a.is_done());
        // ready recomputes to true again since arity is 0.
        assert!(a.is_ready());
    }

    #[test]
    fn priority_default_and_override() {
        let a = Node0::new(NodeId::new(1), || 1i32);
        assert_eq!(a.priority(), 0);
        let a = a.with_priority(9);
        assert_eq!(a.priority(), 9);
    }
}
