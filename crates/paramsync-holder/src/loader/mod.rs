//! Class loading.
//!
//! A [`ClassLoader`] turns a class identity (name, version and the search
//! path variable naming its namespace) into a fresh [`Loadable`] instance.
//! Holders delegate every (re)load to the loader they were built with.
//!
//! Two implementations ship:
//! - [`InMemoryClassLoader`] holds registered constructors, for tests and
//!   embedding.
//! - [`SearchPathClassLoader`] reads operation definitions from the
//!   directories listed in an environment variable.

mod memory;
mod search_path;

use std::fmt;

use crate::error::LoadError;
use crate::parameterised::Loadable;

pub use memory::InMemoryClassLoader;
pub use search_path::SearchPathClassLoader;

pub trait ClassLoader: fmt::Debug {
    /// Instantiates `class_name` at `class_version` from the namespace named
    /// by `search_path_env_var`. A negative version selects the highest
    /// available one.
    fn load(
        &self,
        class_name: &str,
        class_version: i64,
        search_path_env_var: &str,
    ) -> Result<Box<dyn Loadable>, LoadError>;
}

/// Picks `requested` out of `available` (sorted ascending), or the highest
/// version when `requested` is negative.
pub(crate) fn resolve_version(
    class_name: &str,
    requested: i64,
    available: &[i64],
) -> Result<i64, LoadError> {
    let found = if requested < 0 {
        available.last().copied()
    } else {
        available.contains(&requested).then_some(requested)
    };
    found.ok_or_else(|| LoadError::VersionNotFound {
        class_name: class_name.to_string(),
        version: requested,
        available: available.to_vec(),
    })
}
