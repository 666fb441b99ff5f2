//! Capability traits for objects a holder can bind.
//!
//! A class loader produces [`Loadable`] objects. Binding one to a holder
//! requires the object to expose the [`Parameterised`] capability; the check
//! happens once, in [`Loadable::into_parameterised`], and the holder stores
//! the typed result. [`Op`] adds execution on top of a parameter set.

use std::fmt;

use paramsync_core::{Parameter, Value};

use crate::error::OpError;

/// An object exposing a named, hierarchical parameter set.
///
/// The root parameter is a compound; its name becomes the name of the
/// compound plug the holder mirrors it into.
pub trait Parameterised: fmt::Debug {
    /// Name of the class this object was instantiated from.
    fn type_name(&self) -> &str;

    fn parameters(&self) -> &Parameter;

    fn parameters_mut(&mut self) -> &mut Parameter;

    /// Op view of this object, for objects that can execute.
    fn as_op(&self) -> Option<&dyn Op> {
        None
    }
}

/// A parameterised object that computes a result from its parameters.
pub trait Op: Parameterised {
    fn operate(&self) -> Result<Value, OpError>;
}

/// Anything a class loader can produce.
pub trait Loadable: fmt::Debug {
    fn type_name(&self) -> &str;

    /// Converts into the parameterised capability, or `None` when the object
    /// has no parameter set.
    fn into_parameterised(self: Box<Self>) -> Option<Box<dyn Parameterised>> {
        None
    }
}
