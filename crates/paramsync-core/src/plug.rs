//! The node attribute tree.
//!
//! Every node owns a [`PlugTree`] rooted at the node component itself. Plugs
//! are either typed leaves carrying a current and a default [`Value`], or
//! compounds with ordered, uniquely named children.
//!
//! # Storage
//!
//! Plugs live in a petgraph `StableGraph` with a parent -> child edge per
//! containment relationship. `StableGraph` keeps indices stable across
//! removals, so a [`PlugId`] handed out for a plug stays valid (and keeps
//! naming the same plug) while unrelated siblings are added and removed.
//! Child order is kept on the parent plug itself.

use indexmap::IndexMap;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableGraph;
use petgraph::visit::Dfs;
use petgraph::{Directed, Direction as EdgeDirection};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::PlugId;
use crate::parameter::PATH_SEPARATOR;
use crate::value::{NumericRange, Value, ValueType};

/// Data direction of a plug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    In,
    Out,
}

/// What a plug holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlugKind {
    Leaf {
        default: Value,
        value: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        range: Option<NumericRange>,
    },
    Compound,
}

/// A single named slot in a [`PlugTree`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plug {
    name: String,
    direction: Direction,
    kind: PlugKind,
    children: IndexMap<String, PlugId>,
}

impl Plug {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn kind(&self) -> &PlugKind {
        &self.kind
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.kind, PlugKind::Compound)
    }

    /// Value type of a leaf plug; `None` for compounds.
    pub fn value_type(&self) -> Option<ValueType> {
        match &self.kind {
            PlugKind::Leaf { default, .. } => Some(default.value_type()),
            PlugKind::Compound => None,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            PlugKind::Leaf { value, .. } => Some(value),
            PlugKind::Compound => None,
        }
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.kind {
            PlugKind::Leaf { default, .. } => Some(default),
            PlugKind::Compound => None,
        }
    }

    pub fn range(&self) -> Option<NumericRange> {
        match &self.kind {
            PlugKind::Leaf { range, .. } => *range,
            PlugKind::Compound => None,
        }
    }

    /// Child names in order.
    pub fn child_names(&self) -> Vec<&str> {
        self.children.keys().map(String::as_str).collect()
    }
}

/// Tree of plugs rooted at a node component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlugTree {
    graph: StableGraph<Plug, (), Directed, u32>,
    root: PlugId,
}

impl PlugTree {
    /// Creates a tree holding only the node component named `node_name`.
    pub fn new(node_name: &str) -> Self {
        let mut graph = StableGraph::new();
        let root = graph.add_node(Plug {
            name: node_name.to_string(),
            direction: Direction::In,
            kind: PlugKind::Compound,
            children: IndexMap::new(),
        });
        PlugTree {
            graph,
            root: PlugId::from(root),
        }
    }

    /// The node component at the root of the tree.
    pub fn root(&self) -> PlugId {
        self.root
    }

    pub fn get(&self, id: PlugId) -> Option<&Plug> {
        self.graph.node_weight(id.into())
    }

    /// Like [`get`](Self::get), failing with [`CoreError::PlugNotFound`].
    pub fn plug(&self, id: PlugId) -> Result<&Plug, CoreError> {
        self.get(id).ok_or(CoreError::PlugNotFound { id })
    }

    fn plug_mut(&mut self, id: PlugId) -> Result<&mut Plug, CoreError> {
        self.graph
            .node_weight_mut(id.into())
            .ok_or(CoreError::PlugNotFound { id })
    }

    pub fn contains(&self, id: PlugId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live plugs, including the root.
    pub fn plug_count(&self) -> usize {
        self.graph.node_count()
    }

    // -----------------------------------------------------------------------
    // Structure
    // -----------------------------------------------------------------------

    /// Adds a leaf plug under `parent`. The current value starts at the
    /// default, clamped into `range`.
    pub fn add_leaf_plug(
        &mut self,
        parent: PlugId,
        name: &str,
        direction: Direction,
        default: Value,
        range: Option<NumericRange>,
    ) -> Result<PlugId, CoreError> {
        let value = match &range {
            Some(range) => range.clamp(default.clone()),
            None => default.clone(),
        };
        self.add_plug(
            parent,
            name,
            direction,
            PlugKind::Leaf {
                default,
                value,
                range,
            },
        )
    }

    /// Adds an empty compound plug under `parent`.
    pub fn add_compound_plug(
        &mut self,
        parent: PlugId,
        name: &str,
        direction: Direction,
    ) -> Result<PlugId, CoreError> {
        self.add_plug(parent, name, direction, PlugKind::Compound)
    }

    fn add_plug(
        &mut self,
        parent: PlugId,
        name: &str,
        direction: Direction,
        kind: PlugKind,
    ) -> Result<PlugId, CoreError> {
        let parent_plug = self.plug(parent)?;
        if !parent_plug.is_compound() {
            return Err(CoreError::NotCompound {
                name: parent_plug.name.clone(),
            });
        }
        if parent_plug.children.contains_key(name) {
            return Err(CoreError::DuplicatePlug {
                name: name.to_string(),
            });
        }

        let idx = self.graph.add_node(Plug {
            name: name.to_string(),
            direction,
            kind,
            children: IndexMap::new(),
        });
        self.graph.add_edge(parent.into(), idx, ());
        let id = PlugId::from(idx);
        self.plug_mut(parent)?.children.insert(name.to_string(), id);

        #[cfg(debug_assertions)]
        self.assert_consistency();

        Ok(id)
    }

    /// Removes a plug together with its whole subtree, returning the removed
    /// plug. The root cannot be removed.
    pub fn remove_plug(&mut self, id: PlugId) -> Result<Plug, CoreError> {
        if id == self.root {
            return Err(CoreError::CannotRemoveRoot);
        }
        let name = self.plug(id)?.name.clone();
        if let Some(parent) = self.parent(id) {
            self.plug_mut(parent)?.children.shift_remove(&name);
        }

        let subtree = self.descendants(id);
        let mut removed = None;
        // Descendants come back in DFS preorder; the first entry is `id`.
        for plug in subtree.into_iter().rev() {
            removed = self.graph.remove_node(plug.into());
        }

        #[cfg(debug_assertions)]
        self.assert_consistency();

        removed.ok_or(CoreError::PlugNotFound { id })
    }

    /// `id` followed by every plug below it, in DFS preorder.
    pub fn descendants(&self, id: PlugId) -> Vec<PlugId> {
        let mut out = Vec::new();
        if !self.contains(id) {
            return out;
        }
        let mut dfs = Dfs::new(&self.graph, NodeIndex::from(id));
        while let Some(idx) = dfs.next(&self.graph) {
            out.push(PlugId::from(idx));
        }
        out
    }

    /// Reorders the children of `parent` so that the named children come
    /// first, in the given order. Unlisted children keep their relative
    /// order after them; unknown names are ignored.
    pub fn reorder_children(&mut self, parent: PlugId, order: &[&str]) -> Result<(), CoreError> {
        let plug = self.plug_mut(parent)?;
        let mut reordered = IndexMap::with_capacity(plug.children.len());
        for name in order {
            if let Some(id) = plug.children.get(*name) {
                reordered.insert(name.to_string(), *id);
            }
        }
        for (name, id) in &plug.children {
            if !reordered.contains_key(name) {
                reordered.insert(name.clone(), *id);
            }
        }
        plug.children = reordered;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    pub fn child(&self, parent: PlugId, name: &str) -> Option<PlugId> {
        self.get(parent)?.children.get(name).copied()
    }

    /// Children of `id` in order. Empty for leaves and unknown ids.
    pub fn children(&self, id: PlugId) -> impl Iterator<Item = PlugId> + '_ {
        self.get(id)
            .into_iter()
            .flat_map(|plug| plug.children.values().copied())
    }

    pub fn parent(&self, id: PlugId) -> Option<PlugId> {
        self.graph
            .neighbors_directed(id.into(), EdgeDirection::Incoming)
            .next()
            .map(PlugId::from)
    }

    /// `.`-separated path of `id` relative to the root. The root's path is
    /// empty.
    pub fn path(&self, id: PlugId) -> Option<String> {
        let mut segments = Vec::new();
        let mut current = id;
        while current != self.root {
            segments.push(self.get(current)?.name.as_str());
            current = self.parent(current)?;
        }
        segments.reverse();
        let separator = PATH_SEPARATOR.to_string();
        Some(segments.join(separator.as_str()))
    }

    /// Finds a plug by path relative to the root.
    pub fn find(&self, path: &str) -> Option<PlugId> {
        self.find_from(self.root, path)
    }

    /// Finds a plug by path relative to `start`. The empty path is `start`.
    pub fn find_from(&self, start: PlugId, path: &str) -> Option<PlugId> {
        if path.is_empty() {
            return self.contains(start).then_some(start);
        }
        path.split(PATH_SEPARATOR)
            .try_fold(start, |plug, segment| self.child(plug, segment))
    }

    // -----------------------------------------------------------------------
    // Values
    // -----------------------------------------------------------------------

    /// Current value of a leaf plug.
    pub fn value(&self, id: PlugId) -> Result<&Value, CoreError> {
        let plug = self.plug(id)?;
        plug.value().ok_or_else(|| CoreError::PlugKindMismatch {
            name: plug.name.clone(),
            reason: "compound plugs have no value".to_string(),
        })
    }

    /// Assigns the current value of a leaf plug.
    ///
    /// The value must match the plug's type (an `Int` is accepted by a
    /// `Float` plug). Ranged numeric plugs clamp the value into range.
    pub fn set_value(&mut self, id: PlugId, new_value: Value) -> Result<(), CoreError> {
        let plug = self.plug_mut(id)?;
        let PlugKind::Leaf {
            default,
            value,
            range,
        } = &mut plug.kind
        else {
            return Err(CoreError::PlugKindMismatch {
                name: plug.name.clone(),
                reason: "compound plugs have no value".to_string(),
            });
        };

        let expected = default.value_type();
        let actual = new_value.value_type();
        let new_value = new_value
            .coerce(expected)
            .ok_or_else(|| CoreError::ValueTypeMismatch {
                name: plug.name.clone(),
                expected,
                actual,
            })?;
        *value = match range {
            Some(range) => range.clamp(new_value),
            None => new_value,
        };
        Ok(())
    }

    /// Replaces the default of a leaf plug. The default must keep the plug's
    /// type; the current value is untouched.
    pub fn set_default(&mut self, id: PlugId, new_default: Value) -> Result<(), CoreError> {
        let plug = self.plug_mut(id)?;
        let PlugKind::Leaf { default, .. } = &mut plug.kind else {
            return Err(CoreError::PlugKindMismatch {
                name: plug.name.clone(),
                reason: "compound plugs have no default".to_string(),
            });
        };
        let expected = default.value_type();
        let actual = new_default.value_type();
        *default = new_default
            .coerce(expected)
            .ok_or_else(|| CoreError::ValueTypeMismatch {
                name: plug.name.clone(),
                expected,
                actual,
            })?;
        Ok(())
    }

    /// Replaces the range of a leaf plug, re-clamping its current value.
    pub fn set_range(&mut self, id: PlugId, new_range: Option<NumericRange>) -> Result<(), CoreError> {
        let plug = self.plug_mut(id)?;
        let PlugKind::Leaf { value, range, .. } = &mut plug.kind else {
            return Err(CoreError::PlugKindMismatch {
                name: plug.name.clone(),
                reason: "compound plugs have no range".to_string(),
            });
        };
        *range = new_range;
        if let Some(range) = range {
            *value = range.clamp(value.clone());
        }
        Ok(())
    }

    /// Restores the default value of `id` and every leaf below it.
    pub fn reset_to_default(&mut self, id: PlugId) -> Result<(), CoreError> {
        for plug in self.descendants(id) {
            if let PlugKind::Leaf { default, value, .. } = &mut self.plug_mut(plug)?.kind {
                *value = default.clone();
            }
        }
        Ok(())
    }

    /// Paths and values of every leaf plug below `id`, depth first, with
    /// paths relative to `id`.
    pub fn leaf_values(&self, id: PlugId) -> Vec<(String, &Value)> {
        let mut out = Vec::new();
        self.collect_leaves(id, "", &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, id: PlugId, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
        for child in self.children(id) {
            let Some(plug) = self.get(child) else {
                continue;
            };
            let path = if prefix.is_empty() {
                plug.name.clone()
            } else {
                format!("{}{}{}", prefix, PATH_SEPARATOR, plug.name)
            };
            match plug.value() {
                Some(value) => out.push((path, value)),
                None => self.collect_leaves(child, &path, out),
            }
        }
    }

    /// Verifies that child maps and containment edges agree.
    ///
    /// Only called in debug builds after structural mutations.
    #[cfg(debug_assertions)]
    fn assert_consistency(&self) {
        for idx in self.graph.node_indices() {
            let id = PlugId::from(idx);
            let plug = &self.graph[idx];
            for (name, child) in &plug.children {
                assert_eq!(
                    self.parent(*child),
                    Some(id),
                    "Plug '{}' lists child '{}' without a containment edge",
                    plug.name,
                    name
                );
            }
            let edges = self
                .graph
                .neighbors_directed(idx, EdgeDirection::Outgoing)
                .count();
            assert_eq!(
                edges,
                plug.children.len(),
                "Plug '{}' has {} containment edges but {} children",
                plug.name,
                edges,
                plug.children.len()
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree() -> (PlugTree, PlugId, PlugId, PlugId) {
        let mut tree = PlugTree::new("node");
        let root = tree.root();
        let params = tree
            .add_compound_plug(root, "parameters", Direction::In)
            .unwrap();
        let a = tree
            .add_leaf_plug(params, "a", Direction::In, Value::Int(1), None)
            .unwrap();
        let b = tree
            .add_leaf_plug(
                params,
                "b",
                Direction::In,
                Value::Float(0.5),
                Some(NumericRange::new(Some(0.0), Some(1.0))),
            )
            .unwrap();
        (tree, params, a, b)
    }

    #[test]
    fn new_tree_has_only_root() {
        let tree = PlugTree::new("holder");
        assert_eq!(tree.plug_count(), 1);
        assert_eq!(tree.plug(tree.root()).unwrap().name(), "holder");
        assert_eq!(tree.path(tree.root()).as_deref(), Some(""));
    }

    #[test]
    fn add_and_navigate() {
        let (tree, params, a, b) = tree();
        assert_eq!(tree.child(params, "a"), Some(a));
        assert_eq!(tree.children(params).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(tree.parent(a), Some(params));
        assert_eq!(tree.path(b).as_deref(), Some("parameters.b"));
        assert_eq!(tree.find("parameters.b"), Some(b));
        assert_eq!(tree.find_from(params, "a"), Some(a));
        assert_eq!(tree.find("parameters.zzz"), None);
    }

    #[test]
    fn duplicate_names_rejected() {
        let (mut tree, params, _, _) = tree();
        assert!(matches!(
            tree.add_compound_plug(params, "a", Direction::In),
            Err(CoreError::DuplicatePlug { .. })
        ));
    }

    #[test]
    fn leaves_cannot_have_children() {
        let (mut tree, _, a, _) = tree();
        assert!(matches!(
            tree.add_compound_plug(a, "c", Direction::In),
            Err(CoreError::NotCompound { .. })
        ));
    }

    #[test]
    fn set_value_checks_type_and_clamps() {
        let (mut tree, _, a, b) = tree();
        tree.set_value(a, Value::Int(7)).unwrap();
        assert_eq!(tree.value(a).unwrap(), &Value::Int(7));

        tree.set_value(b, Value::Float(3.0)).unwrap();
        assert_eq!(tree.value(b).unwrap(), &Value::Float(1.0));

        tree.set_value(b, Value::Int(0)).unwrap();
        assert_eq!(tree.value(b).unwrap(), &Value::Float(0.0));

        assert!(matches!(
            tree.set_value(a, Value::Bool(true)),
            Err(CoreError::ValueTypeMismatch { .. })
        ));
    }

    #[test]
    fn compound_plugs_have_no_value() {
        let (mut tree, params, _, _) = tree();
        assert!(matches!(
            tree.value(params),
            Err(CoreError::PlugKindMismatch { .. })
        ));
        assert!(tree.set_value(params, Value::Int(1)).is_err());
    }

    #[test]
    fn remove_subtree_keeps_sibling_ids() {
        let (mut tree, params, a, b) = tree();
        let count = tree.plug_count();
        let removed = tree.remove_plug(a).unwrap();
        assert_eq!(removed.name(), "a");
        assert_eq!(tree.plug_count(), count - 1);
        assert_eq!(tree.child(params, "b"), Some(b));
        assert!(!tree.contains(a));

        tree.remove_plug(params).unwrap();
        assert_eq!(tree.plug_count(), 1);
        assert!(!tree.contains(b));
    }

    #[test]
    fn root_cannot_be_removed() {
        let mut tree = PlugTree::new("n");
        let root = tree.root();
        assert!(matches!(
            tree.remove_plug(root),
            Err(CoreError::CannotRemoveRoot)
        ));
    }

    #[test]
    fn reorder_children() {
        let (mut tree, params, a, b) = tree();
        let c = tree
            .add_leaf_plug(params, "c", Direction::In, Value::Bool(false), None)
            .unwrap();
        tree.reorder_children(params, &["c", "a"]).unwrap();
        assert_eq!(tree.children(params).collect::<Vec<_>>(), vec![c, a, b]);
    }

    #[test]
    fn default_and_range_updates() {
        let (mut tree, _, a, b) = tree();
        tree.set_default(a, Value::Int(3)).unwrap();
        assert_eq!(tree.get(a).unwrap().default_value(), Some(&Value::Int(3)));
        assert_eq!(tree.value(a).unwrap(), &Value::Int(1));

        tree.set_range(a, Some(NumericRange::new(Some(2.0), None)))
            .unwrap();
        assert_eq!(tree.value(a).unwrap(), &Value::Int(2));

        tree.set_value(b, Value::Float(0.25)).unwrap();
        tree.reset_to_default(tree.root()).unwrap();
        assert_eq!(tree.value(a).unwrap(), &Value::Int(3));
        assert_eq!(tree.value(b).unwrap(), &Value::Float(0.5));
    }

    #[test]
    fn leaf_values_relative_paths() {
        let (tree, params, _, _) = tree();
        let leaves = tree.leaf_values(params);
        assert_eq!(leaves.len(), 2);
        assert_eq!(leaves[0].0, "a");
        assert_eq!(leaves[1], ("b".to_string(), &Value::Float(0.5)));
    }

    #[test]
    fn serde_roundtrip_preserves_ids() {
        let (mut tree, params, a, b) = tree();
        tree.remove_plug(a).unwrap();
        let json = serde_json::to_string(&tree).unwrap();
        let back: PlugTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back.find("parameters.b"), Some(b));
        assert_eq!(back.child(params, "b"), Some(b));
        assert_eq!(back.value(b).unwrap(), &Value::Float(0.5));
    }
}
