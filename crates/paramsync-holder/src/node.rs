//! Node bases a holder can be layered on.
//!
//! A node is a named owner of a [`PlugTree`]. The holder adds parameter
//! synchronization on top of any [`NodeBase`]; [`ComputeNode`] additionally
//! carries the output plug an op writes its result into.

use paramsync_core::{CoreError, Direction, PlugId, PlugTree, Value};
use tracing::debug;

/// Name of the output plug holding a compute node's result.
pub const RESULT_PLUG_NAME: &str = "result";

pub trait NodeBase {
    /// Node type name recorded in saved holder state.
    const TYPE_NAME: &'static str;

    fn new(name: &str) -> Self;

    /// Rebuilds a node around a previously saved plug tree.
    fn from_plugs(plugs: PlugTree) -> Self;

    fn name(&self) -> &str;

    fn plugs(&self) -> &PlugTree;

    fn plugs_mut(&mut self) -> &mut PlugTree;
}

/// A plain node.
#[derive(Debug, Clone)]
pub struct Node {
    plugs: PlugTree,
}

impl NodeBase for Node {
    const TYPE_NAME: &'static str = "node";

    fn new(name: &str) -> Self {
        Node {
            plugs: PlugTree::new(name),
        }
    }

    fn from_plugs(plugs: PlugTree) -> Self {
        Node { plugs }
    }

    fn name(&self) -> &str {
        node_name(&self.plugs)
    }

    fn plugs(&self) -> &PlugTree {
        &self.plugs
    }

    fn plugs_mut(&mut self) -> &mut PlugTree {
        &mut self.plugs
    }
}

/// A node with a `result` output plug.
///
/// The plug is created by the first [`set_result`](ComputeNode::set_result)
/// and takes the type of the value written into it.
#[derive(Debug, Clone)]
pub struct ComputeNode {
    plugs: PlugTree,
}

impl ComputeNode {
    pub fn result_plug(&self) -> Option<PlugId> {
        self.plugs.child(self.plugs.root(), RESULT_PLUG_NAME)
    }

    /// Last value written by `set_result`.
    pub fn result(&self) -> Option<&Value> {
        self.result_plug()
            .and_then(|id| self.plugs.get(id))
            .and_then(|plug| plug.value())
    }

    /// Writes `value` into the result plug, recreating the plug when the
    /// value type changed.
    pub fn set_result(&mut self, value: Value) -> Result<(), CoreError> {
        let root = self.plugs.root();
        let value_type = value.value_type();
        if let Some(id) = self.result_plug() {
            if self.plugs.plug(id)?.value_type() == Some(value_type) {
                return self.plugs.set_value(id, value);
            }
            self.plugs.remove_plug(id)?;
        }
        let id = self.plugs.add_leaf_plug(
            root,
            RESULT_PLUG_NAME,
            Direction::Out,
            value_type.zero(),
            None,
        )?;
        debug!(value_type = %value_type, "created result plug");
        self.plugs.set_value(id, value)
    }
}

impl NodeBase for ComputeNode {
    const TYPE_NAME: &'static str = "compute";

    fn new(name: &str) -> Self {
        ComputeNode {
            plugs: PlugTree::new(name),
        }
    }

    fn from_plugs(plugs: PlugTree) -> Self {
        ComputeNode { plugs }
    }

    fn name(&self) -> &str {
        node_name(&self.plugs)
    }

    fn plugs(&self) -> &PlugTree {
        &self.plugs
    }

    fn plugs_mut(&mut self) -> &mut PlugTree {
        &mut self.plugs
    }
}

fn node_name(plugs: &PlugTree) -> &str {
    plugs.get(plugs.root()).map_or("", |root| root.name())
}
