//! Stable plug identifiers.
//!
//! A [`PlugId`] stays valid for the lifetime of the plug it names, even when
//! sibling plugs are removed from the tree. The slot of a removed plug may be
//! reused by a plug added later, so holders of an id must not outlive the
//! plug's removal.

use std::fmt;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// Stable plug identifier. Maps to a petgraph `NodeIndex<u32>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlugId(pub u32);

impl fmt::Display for PlugId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Bridge between PlugId and petgraph's NodeIndex<u32>.

impl From<NodeIndex<u32>> for PlugId {
    fn from(idx: NodeIndex<u32>) -> Self {
        PlugId(idx.index() as u32)
    }
}

impl From<PlugId> for NodeIndex<u32> {
    fn from(id: PlugId) -> Self {
        NodeIndex::new(id.0 as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plug_id_to_node_index_roundtrip() {
        let idx = NodeIndex::<u32>::new(42);
        let plug = PlugId::from(idx);
        assert_eq!(plug.0, 42);

        let back: NodeIndex<u32> = plug.into();
        assert_eq!(back.index(), 42);
    }

    #[test]
    fn plug_id_display() {
        assert_eq!(format!("{}", PlugId(7)), "7");
    }
}
