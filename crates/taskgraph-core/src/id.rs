//! Node identifier type

use core::fmt;

/// Opaque, user-assigned identifier for a node.
///
/// The engine never interprets this value — it only carries it through
/// to jobs and profiling records so the caller can correlate them back
/// to the node that produced them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct NodeId(u64);

impl NodeId {
    /// Sentinel used by slots that have not yet been wired.
    pub const NONE: NodeId = NodeId(u64::MAX);

    /// Create a new identifier from a raw value.
    #[inline]
    pub const fn new(id: u64) -> Self {
        NodeId(id)
    }

    /// Raw value, for logging and profiling output.
    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == u64::MAX
    }
}

impl From<u64> for NodeId {
    #[inline]
    fn from(id: u64) -> Self {
        NodeId(id)
    }
}

impl From<NodeId> for u64 {
    #[inline]
    fn from(id: NodeId) -> Self {
        id.0
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "NodeId(NONE)")
        } else {
            write!(f, "NodeId({})", self.0)
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl Default for NodeId {
    fn default() -> Self {
        NodeId::NONE
    }
}
