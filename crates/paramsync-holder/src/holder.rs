//! [`ParameterisedHolder`]: a node that owns a parameterised operation and
//! mirrors its parameters into plugs.
//!
//! The holder persists the identity of the class it holds in three plugs
//! (`__className`, `__classVersion`, `__searchPathEnvVar`) so that a saved
//! node can reload its operation. The live operation and the root handler
//! bound to it are always replaced together: a load either succeeds and
//! swaps both, or fails and leaves the previous pair in place.

use std::sync::Arc;

use paramsync_core::{CoreError, Direction, PlugId, PlugTree, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::HolderError;
use crate::handler::{CompoundParameterHandler, HandlerRegistry, ParameterHandler};
use crate::loader::ClassLoader;
use crate::node::{ComputeNode, Node, NodeBase, RESULT_PLUG_NAME};
use crate::parameterised::{Loadable, Op, Parameterised};
use crate::state::HolderState;

/// Class version meaning "the highest available".
pub const LATEST_VERSION: i64 = -1;

/// Search path variable used by [`OpHolder::set_op`].
pub const OP_PATHS_ENV_VAR: &str = "PARAMSYNC_OP_PATHS";

pub const CLASS_NAME_PLUG: &str = "__className";
pub const CLASS_VERSION_PLUG: &str = "__classVersion";
pub const SEARCH_PATH_ENV_VAR_PLUG: &str = "__searchPathEnvVar";

/// Names of plugs a node owns next to the root parameter plug.
const RESERVED_PLUG_NAMES: [&str; 4] = [
    CLASS_NAME_PLUG,
    CLASS_VERSION_PLUG,
    SEARCH_PATH_ENV_VAR_PLUG,
    RESULT_PLUG_NAME,
];

/// A holder over a plain [`Node`].
pub type ParameterisedHolderNode = ParameterisedHolder<Node>;

/// A holder over a [`ComputeNode`], holding an executable op.
pub type OpHolder = ParameterisedHolder<ComputeNode>;

/// Identity of the class a holder was last loaded from, as stored in its
/// identity plugs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassIdentity {
    pub class_name: String,
    pub class_version: i64,
    pub search_path_env_var: String,
}

impl ClassIdentity {
    /// Whether the identity names a class that can be reloaded.
    pub fn is_loadable(&self) -> bool {
        !self.class_name.is_empty() && !self.search_path_env_var.is_empty()
    }
}

#[derive(Debug)]
pub struct ParameterisedHolder<B: NodeBase = Node> {
    node: B,
    parameterised: Option<Box<dyn Parameterised>>,
    handler: Option<CompoundParameterHandler>,
    loader: Option<Arc<dyn ClassLoader>>,
    registry: Arc<HandlerRegistry>,
}

impl<B: NodeBase> ParameterisedHolder<B> {
    /// Creates a holder with empty identity plugs, no loader and the builtin
    /// handler registry.
    pub fn new(name: &str) -> Result<Self, HolderError> {
        Self::from_node(B::new(name), None, Arc::new(HandlerRegistry::with_builtins()))
    }

    fn from_node(
        mut node: B,
        loader: Option<Arc<dyn ClassLoader>>,
        registry: Arc<HandlerRegistry>,
    ) -> Result<Self, HolderError> {
        ensure_identity_plugs(node.plugs_mut())?;
        Ok(ParameterisedHolder {
            node,
            parameterised: None,
            handler: None,
            loader,
            registry,
        })
    }

    pub fn with_loader(mut self, loader: Arc<dyn ClassLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Replaces the handler registry. Takes effect at the next plug setup.
    pub fn with_registry(mut self, registry: Arc<HandlerRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn node(&self) -> &B {
        &self.node
    }

    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    // -----------------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------------

    /// Binds `instance` to this holder.
    ///
    /// The instance must expose a parameter set; otherwise this fails with
    /// [`HolderError::TypeMismatch`] and the holder is unchanged. The plug
    /// tree is reshaped to mirror the new parameters. With
    /// `keep_existing_values` false the plugs then take the parameters'
    /// values; with it true, plugs that already existed keep theirs.
    pub fn set_parameterised(
        &mut self,
        instance: Box<dyn Loadable>,
        keep_existing_values: bool,
    ) -> Result<(), HolderError> {
        let parameterised = into_parameterised(instance)?;
        self.bind(parameterised, keep_existing_values)
    }

    /// Loads a class through the holder's loader, binds it and records its
    /// identity in the identity plugs.
    pub fn set_parameterised_by_name(
        &mut self,
        class_name: &str,
        class_version: i64,
        search_path_env_var: &str,
        keep_existing_values: bool,
    ) -> Result<(), HolderError> {
        let instance = self.load_class(class_name, class_version, search_path_env_var)?;
        let parameterised = into_parameterised(instance)?;
        self.bind(parameterised, keep_existing_values)?;
        self.write_identity(&ClassIdentity {
            class_name: class_name.to_string(),
            class_version,
            search_path_env_var: search_path_env_var.to_string(),
        })
    }

    /// Reloads the operation named by the identity plugs, keeping existing
    /// plug values. Does nothing unless both the class name and the search
    /// path variable are set.
    pub fn load_parameterised(&mut self) -> Result<(), HolderError> {
        let identity = self.class_identity()?;
        if !identity.is_loadable() {
            if identity.class_name.is_empty() && identity.search_path_env_var.is_empty() {
                debug!(node = %self.name(), "no class identity, skipping load");
            } else {
                warn!(
                    node = %self.name(),
                    class = %identity.class_name,
                    search_path_env_var = %identity.search_path_env_var,
                    "incomplete class identity, skipping load"
                );
            }
            return Ok(());
        }
        let instance = self.load_class(
            &identity.class_name,
            identity.class_version,
            &identity.search_path_env_var,
        )?;
        self.set_parameterised(instance, true)
    }

    /// Instantiates a class through the holder's loader. A holder built
    /// without a loader cannot load anything.
    pub fn load_class(
        &self,
        class_name: &str,
        class_version: i64,
        search_path_env_var: &str,
    ) -> Result<Box<dyn Loadable>, HolderError> {
        let loader = self
            .loader
            .as_ref()
            .ok_or_else(|| HolderError::UnsupportedOperation {
                reason: format!("holder '{}' has no class loader", self.name()),
            })?;
        Ok(loader.load(class_name, class_version, search_path_env_var)?)
    }

    /// Sets up plugs for `parameterised` on a copy of the plug tree and
    /// installs the copy, the operation and its handler only once setup
    /// succeeded.
    fn bind(
        &mut self,
        parameterised: Box<dyn Parameterised>,
        keep_existing_values: bool,
    ) -> Result<(), HolderError> {
        let parameters = parameterised.parameters();
        if RESERVED_PLUG_NAMES.iter().any(|name| *name == parameters.name()) {
            return Err(HolderError::ReservedName {
                name: parameters.name().to_string(),
            });
        }

        let mut plugs = self.node.plugs().clone();
        let root = plugs.root();
        let mut handler = CompoundParameterHandler::new(parameters);
        handler.setup_plug(parameters, &mut plugs, root, &self.registry)?;
        if !keep_existing_values {
            handler.set_plug_value(parameters, &mut plugs)?;
        }

        // A renamed root parameter leaves the old root plug behind.
        let stale = self
            .handler
            .as_ref()
            .filter(|previous| previous.name() != handler.name())
            .and_then(|previous| previous.plug())
            .filter(|id| plugs.parent(*id) == Some(root));
        if let Some(id) = stale {
            let removed = plugs.remove_plug(id)?;
            debug!(plug = %removed.name(), "removed previous root parameter plug");
        }

        info!(
            node = %self.name(),
            class = %parameterised.type_name(),
            keep_existing_values,
            "bound parameterised"
        );
        *self.node.plugs_mut() = plugs;
        self.parameterised = Some(parameterised);
        self.handler = Some(handler);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    pub fn get_parameterised(&self) -> Option<&dyn Parameterised> {
        self.parameterised.as_deref()
    }

    pub fn get_parameterised_mut(&mut self) -> Option<&mut (dyn Parameterised + 'static)> {
        self.parameterised.as_deref_mut()
    }

    pub fn parameter_handler(&self) -> Option<&CompoundParameterHandler> {
        self.handler.as_ref()
    }

    pub fn parameter_handler_mut(&mut self) -> Option<&mut CompoundParameterHandler> {
        self.handler.as_mut()
    }

    /// Reads the identity plugs.
    pub fn class_identity(&self) -> Result<ClassIdentity, HolderError> {
        let plugs = self.node.plugs();
        let string = |name: &str| -> Result<String, HolderError> {
            plugs
                .value(identity_plug(plugs, name)?)?
                .as_str()
                .map(str::to_string)
                .ok_or_else(|| identity_type_error(name))
        };
        let class_version = plugs
            .value(identity_plug(plugs, CLASS_VERSION_PLUG)?)?
            .as_int()
            .ok_or_else(|| identity_type_error(CLASS_VERSION_PLUG))?;
        Ok(ClassIdentity {
            class_name: string(CLASS_NAME_PLUG)?,
            class_version,
            search_path_env_var: string(SEARCH_PATH_ENV_VAR_PLUG)?,
        })
    }

    fn write_identity(&mut self, identity: &ClassIdentity) -> Result<(), HolderError> {
        let plugs = self.node.plugs_mut();
        let values = [
            (CLASS_NAME_PLUG, Value::String(identity.class_name.clone())),
            (CLASS_VERSION_PLUG, Value::Int(identity.class_version)),
            (
                SEARCH_PATH_ENV_VAR_PLUG,
                Value::String(identity.search_path_env_var.clone()),
            ),
        ];
        for (name, value) in values {
            let id = identity_plug(plugs, name)?;
            plugs.set_value(id, value)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Synchronization
    // -----------------------------------------------------------------------

    /// Copies plug values into the operation's parameters. Does nothing when
    /// no operation is held.
    pub fn set_parameterised_values(&mut self) -> Result<(), HolderError> {
        let (Some(parameterised), Some(handler)) =
            (self.parameterised.as_deref_mut(), self.handler.as_ref())
        else {
            return Ok(());
        };
        handler.set_parameter_value(parameterised.parameters_mut(), self.node.plugs())
    }

    /// Reshapes the plugs to the operation's current parameters and copies
    /// the parameter values into them.
    pub(crate) fn sync_plugs_from_parameters(&mut self) -> Result<(), HolderError> {
        let (Some(parameterised), Some(handler)) =
            (self.parameterised.as_deref(), self.handler.as_mut())
        else {
            return Ok(());
        };
        let parameters = parameterised.parameters();
        let root = self.node.plugs().root();
        handler.setup_plug(parameters, self.node.plugs_mut(), root, &self.registry)?;
        handler.set_plug_value(parameters, self.node.plugs_mut())
    }

    // -----------------------------------------------------------------------
    // Plugs
    // -----------------------------------------------------------------------

    pub fn plugs(&self) -> &PlugTree {
        self.node.plugs()
    }

    /// Mutable plug tree. Edits to parameter plugs reach the operation on
    /// the next [`set_parameterised_values`](Self::set_parameterised_values).
    pub fn plugs_mut(&mut self) -> &mut PlugTree {
        self.node.plugs_mut()
    }

    /// Plug of the parameter at `path`, relative to the root parameter. The
    /// empty path is the root parameter plug.
    pub fn parameter_plug(&self, path: &str) -> Option<PlugId> {
        let root = self.handler.as_ref()?.plug()?;
        self.node.plugs().find_from(root, path)
    }

    /// Sets the value of the parameter plug at `path`.
    pub fn set_parameter_plug(&mut self, path: &str, value: Value) -> Result<(), HolderError> {
        let id = self
            .parameter_plug(path)
            .ok_or_else(|| CoreError::ParameterNotFound {
                path: path.to_string(),
            })?;
        self.node.plugs_mut().set_value(id, value)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // State
    // -----------------------------------------------------------------------

    pub fn state(&self) -> HolderState {
        HolderState {
            node_type: B::TYPE_NAME.to_string(),
            plugs: self.node.plugs().clone(),
        }
    }

    /// Rebuilds a holder from saved state: the operation is reloaded from
    /// the identity plugs and then takes the saved plug values.
    pub fn from_state(
        state: HolderState,
        loader: Option<Arc<dyn ClassLoader>>,
        registry: Arc<HandlerRegistry>,
    ) -> Result<Self, HolderError> {
        if state.node_type != B::TYPE_NAME {
            return Err(HolderError::StateMismatch {
                expected: B::TYPE_NAME.to_string(),
                found: state.node_type,
            });
        }
        let mut holder = Self::from_node(B::from_plugs(state.plugs), loader, registry)?;
        holder.load_parameterised()?;
        holder.set_parameterised_values()?;
        Ok(holder)
    }
}

impl ParameterisedHolder<ComputeNode> {
    /// Loads an op from the [`OP_PATHS_ENV_VAR`] search path and binds it.
    /// Classes that load but are not ops fail with
    /// [`HolderError::TypeMismatch`].
    pub fn set_op(
        &mut self,
        class_name: &str,
        class_version: i64,
        keep_existing_values: bool,
    ) -> Result<(), HolderError> {
        let instance = self.load_class(class_name, class_version, OP_PATHS_ENV_VAR)?;
        let parameterised = into_parameterised(instance)?;
        if parameterised.as_op().is_none() {
            return Err(HolderError::TypeMismatch {
                type_name: parameterised.type_name().to_string(),
            });
        }
        self.bind(parameterised, keep_existing_values)?;
        self.write_identity(&ClassIdentity {
            class_name: class_name.to_string(),
            class_version,
            search_path_env_var: OP_PATHS_ENV_VAR.to_string(),
        })
    }

    pub fn get_op(&self) -> Option<&dyn Op> {
        self.parameterised.as_deref().and_then(|p| p.as_op())
    }

    /// Pushes plug values into the op, runs it and stores the result in the
    /// node's `result` plug.
    pub fn compute(&mut self) -> Result<Value, HolderError> {
        let parameterised = self
            .parameterised
            .as_deref()
            .ok_or(HolderError::NoOperation)?;
        if parameterised.as_op().is_none() {
            return Err(HolderError::TypeMismatch {
                type_name: parameterised.type_name().to_string(),
            });
        }
        self.set_parameterised_values()?;
        let value = self.get_op().ok_or(HolderError::NoOperation)?.operate()?;
        self.node.set_result(value.clone())?;
        debug!(node = %self.name(), result = %value, "computed");
        Ok(value)
    }
}

fn into_parameterised(instance: Box<dyn Loadable>) -> Result<Box<dyn Parameterised>, HolderError> {
    let type_name = instance.type_name().to_string();
    instance
        .into_parameterised()
        .ok_or(HolderError::TypeMismatch { type_name })
}

/// Creates any missing identity plug, replacing ones of the wrong type.
fn ensure_identity_plugs(plugs: &mut PlugTree) -> Result<(), HolderError> {
    let root = plugs.root();
    let defaults = [
        (CLASS_NAME_PLUG, Value::String(String::new())),
        (CLASS_VERSION_PLUG, Value::Int(LATEST_VERSION)),
        (SEARCH_PATH_ENV_VAR_PLUG, Value::String(String::new())),
    ];
    for (name, default) in defaults {
        if let Some(id) = plugs.child(root, name) {
            if plugs.plug(id)?.value_type() == Some(default.value_type()) {
                continue;
            }
            plugs.remove_plug(id)?;
        }
        plugs.add_leaf_plug(root, name, Direction::In, default, None)?;
    }
    Ok(())
}

fn identity_plug(plugs: &PlugTree, name: &str) -> Result<PlugId, HolderError> {
    plugs
        .child(plugs.root(), name)
        .ok_or_else(|| HolderError::InconsistentShape {
            path: name.to_string(),
            reason: "identity plug is missing".to_string(),
        })
}

fn identity_type_error(name: &str) -> HolderError {
    HolderError::InconsistentShape {
        path: name.to_string(),
        reason: "identity plug has the wrong type".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use paramsync_core::Parameter;

    use super::*;
    use crate::loader::InMemoryClassLoader;
    use crate::operation::{DescribedOperation, ROOT_PARAMETER_NAME};

    fn scale(version: i64) -> DescribedOperation {
        DescribedOperation::op(
            "scale",
            version,
            Parameter::compound(ROOT_PARAMETER_NAME)
                .with_child(Parameter::leaf("factor", Value::Float(version as f64))),
            "factor",
        )
    }

    fn loader() -> Arc<dyn ClassLoader> {
        let mut loader = InMemoryClassLoader::new();
        loader.register_operation(OP_PATHS_ENV_VAR, scale(1));
        loader.register_operation(OP_PATHS_ENV_VAR, scale(2));
        Arc::new(loader)
    }

    #[test]
    fn new_holder_has_empty_identity() {
        let holder = ParameterisedHolderNode::new("h").unwrap();
        assert_eq!(
            holder.class_identity().unwrap(),
            ClassIdentity {
                class_name: String::new(),
                class_version: LATEST_VERSION,
                search_path_env_var: String::new(),
            }
        );
        assert!(holder.get_parameterised().is_none());
        assert!(holder.parameter_handler().is_none());
        assert_eq!(holder.plugs().plug_count(), 4);
    }

    #[test]
    fn load_class_without_loader_is_unsupported() {
        let holder = ParameterisedHolderNode::new("h").unwrap();
        assert!(matches!(
            holder.load_class("scale", 1, OP_PATHS_ENV_VAR),
            Err(HolderError::UnsupportedOperation { .. })
        ));
    }

    #[test]
    fn set_op_records_identity_and_plugs() {
        let mut holder = OpHolder::new("op").unwrap().with_loader(loader());
        holder.set_op("scale", LATEST_VERSION, false).unwrap();

        assert_eq!(
            holder.class_identity().unwrap(),
            ClassIdentity {
                class_name: "scale".to_string(),
                class_version: LATEST_VERSION,
                search_path_env_var: OP_PATHS_ENV_VAR.to_string(),
            }
        );
        let factor = holder.parameter_plug("factor").unwrap();
        assert_eq!(holder.plugs().value(factor).unwrap(), &Value::Float(2.0));
        assert_eq!(
            holder.parameter_plug(""),
            holder.plugs().find(ROOT_PARAMETER_NAME)
        );
    }

    #[test]
    fn compute_writes_result_plug() {
        let mut holder = OpHolder::new("op").unwrap().with_loader(loader());
        assert!(matches!(holder.compute(), Err(HolderError::NoOperation)));

        holder.set_op("scale", 1, false).unwrap();
        holder
            .set_parameter_plug("factor", Value::Float(4.5))
            .unwrap();
        assert_eq!(holder.compute().unwrap(), Value::Float(4.5));
        assert_eq!(holder.node().result(), Some(&Value::Float(4.5)));
    }

    #[test]
    fn renamed_root_parameter_replaces_root_plug() {
        let mut holder = ParameterisedHolderNode::new("h").unwrap();
        let first = DescribedOperation::procedure(
            "a",
            1,
            Parameter::compound("first").with_child(Parameter::leaf("x", Value::Int(1))),
        );
        let second = DescribedOperation::procedure(
            "b",
            1,
            Parameter::compound("second").with_child(Parameter::leaf("y", Value::Int(2))),
        );
        holder.set_parameterised(Box::new(first), false).unwrap();
        holder.set_parameterised(Box::new(second), false).unwrap();

        assert_eq!(holder.plugs().find("first"), None);
        assert!(holder.plugs().find("second.y").is_some());
    }

    #[test]
    fn root_parameter_cannot_shadow_node_plugs() {
        let mut holder = OpHolder::new("op").unwrap();
        holder.set_parameterised(Box::new(scale(1)), false).unwrap();
        let count = holder.plugs().plug_count();

        for name in RESERVED_PLUG_NAMES {
            let op = DescribedOperation::procedure(
                "shadow",
                1,
                Parameter::compound(name).with_child(Parameter::leaf("x", Value::Int(1))),
            );
            assert!(matches!(
                holder.set_parameterised(Box::new(op), false),
                Err(HolderError::ReservedName { .. })
            ));
        }
        assert_eq!(holder.get_parameterised().unwrap().type_name(), "scale");
        assert_eq!(holder.plugs().plug_count(), count);
        assert_eq!(holder.class_identity().unwrap().class_name, "");
    }

    #[test]
    fn set_parameter_plug_on_unknown_path() {
        let mut holder = ParameterisedHolderNode::new("h").unwrap();
        holder
            .set_parameterised(Box::new(scale(1)), false)
            .unwrap();
        assert!(matches!(
            holder.set_parameter_plug("missing", Value::Int(0)),
            Err(HolderError::Core(CoreError::ParameterNotFound { .. }))
        ));
    }

    #[test]
    fn state_of_wrong_node_type_is_rejected() {
        let holder = ParameterisedHolderNode::new("h").unwrap();
        let state = holder.state();
        assert!(matches!(
            OpHolder::from_state(state, None, Arc::new(HandlerRegistry::with_builtins())),
            Err(HolderError::StateMismatch { .. })
        ));
    }
}
