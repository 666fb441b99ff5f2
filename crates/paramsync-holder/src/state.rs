//! Serializable holder state.
//!
//! A [`HolderState`] captures everything needed to rebuild a holder: the
//! node type and the full plug tree, identity plugs and parameter plug
//! values included. The operation itself is not saved; restoring reloads
//! it from the identity plugs (see
//! [`ParameterisedHolder::from_state`](crate::ParameterisedHolder::from_state)).

use paramsync_core::PlugTree;
use serde::{Deserialize, Serialize};

use crate::error::HolderError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HolderState {
    /// [`NodeBase::TYPE_NAME`](crate::NodeBase::TYPE_NAME) of the saved node.
    pub node_type: String,
    pub plugs: PlugTree,
}

impl HolderState {
    pub fn to_json(&self) -> Result<String, HolderError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, HolderError> {
        Ok(serde_json::from_str(json)?)
    }
}
