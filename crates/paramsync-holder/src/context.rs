//! Scoped editing of a held operation's parameters.
//!
//! Parameters edited directly (adding children, changing values) drift out
//! of sync with the plugs. A [`ParameterModificationContext`] borrows the
//! holder for the duration of the edit and, when released, rebuilds the
//! plug tree to the new parameter shape and copies the parameter values
//! into it. Release happens exactly once: either through
//! [`finish`](ParameterModificationContext::finish), which reports the
//! resync error, or on drop, which logs it.

use paramsync_core::Parameter;
use tracing::error;

use crate::error::HolderError;
use crate::holder::ParameterisedHolder;
use crate::node::NodeBase;
use crate::parameterised::Parameterised;

pub struct ParameterModificationContext<'a, B: NodeBase> {
    holder: &'a mut ParameterisedHolder<B>,
    released: bool,
}

impl<'a, B: NodeBase> ParameterModificationContext<'a, B> {
    pub fn new(holder: &'a mut ParameterisedHolder<B>) -> Self {
        ParameterModificationContext {
            holder,
            released: false,
        }
    }

    /// The held operation, if any.
    pub fn parameterised_mut(&mut self) -> Option<&mut (dyn Parameterised + 'static)> {
        self.holder.get_parameterised_mut()
    }

    /// Root parameter of the held operation, if any.
    pub fn parameters_mut(&mut self) -> Option<&mut Parameter> {
        self.parameterised_mut().map(|p| p.parameters_mut())
    }

    /// Releases the context, returning the resync error if there was one.
    pub fn finish(mut self) -> Result<(), HolderError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), HolderError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.holder.sync_plugs_from_parameters()
    }
}

impl<B: NodeBase> Drop for ParameterModificationContext<'_, B> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            error!(node = %self.holder.name(), error = %e, "failed to resync plugs after modification");
        }
    }
}

/// Runs `f` inside a modification context and resyncs afterwards, also when
/// `f` fails or panics. An error from `f` takes precedence over a resync
/// error.
pub fn with_modification<B, T, F>(
    holder: &mut ParameterisedHolder<B>,
    f: F,
) -> Result<T, HolderError>
where
    B: NodeBase,
    F: FnOnce(&mut ParameterModificationContext<'_, B>) -> Result<T, HolderError>,
{
    let mut context = ParameterModificationContext::new(holder);
    let result = f(&mut context);
    let resync = context.finish();
    let value = result?;
    resync?;
    Ok(value)
}

impl<B: NodeBase> std::fmt::Debug for ParameterModificationContext<'_, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParameterModificationContext")
            .field("holder", &self.holder.name())
            .field("released", &self.released)
            .finish()
    }
}
