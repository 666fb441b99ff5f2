use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::{resolve_version, ClassLoader};
use crate::error::LoadError;
use crate::operation::DescribedOperation;
use crate::parameterised::{Loadable, Parameterised};

type Constructor = Box<dyn Fn() -> Box<dyn Loadable>>;

/// Class loader backed by registered constructors.
///
/// Classes are keyed by search path variable and class name, then by
/// version.
#[derive(Default)]
pub struct InMemoryClassLoader {
    classes: HashMap<(String, String), BTreeMap<i64, Constructor>>,
}

impl InMemoryClassLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor, replacing any previous one for the same
    /// class and version.
    pub fn register<F>(
        &mut self,
        search_path_env_var: &str,
        class_name: &str,
        class_version: i64,
        constructor: F,
    ) where
        F: Fn() -> Box<dyn Loadable> + 'static,
    {
        self.classes
            .entry((search_path_env_var.to_string(), class_name.to_string()))
            .or_default()
            .insert(class_version, Box::new(constructor));
    }

    /// Registers a described operation under its own type name and version.
    /// Every load returns a fresh clone.
    pub fn register_operation(&mut self, search_path_env_var: &str, operation: DescribedOperation) {
        let class_name = Parameterised::type_name(&operation).to_string();
        let version = operation.version();
        self.register(search_path_env_var, &class_name, version, move || {
            Box::new(operation.clone())
        });
    }

    /// Registered versions of a class, ascending.
    pub fn versions(&self, class_name: &str, search_path_env_var: &str) -> Vec<i64> {
        self.classes
            .get(&(search_path_env_var.to_string(), class_name.to_string()))
            .map(|versions| versions.keys().copied().collect())
            .unwrap_or_default()
    }
}

impl fmt::Debug for InMemoryClassLoader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut classes: Vec<(&str, &str, Vec<i64>)> = self
            .classes
            .iter()
            .map(|((env, class), versions)| {
                (env.as_str(), class.as_str(), versions.keys().copied().collect())
            })
            .collect();
        classes.sort();
        f.debug_struct("InMemoryClassLoader")
            .field("classes", &classes)
            .finish()
    }
}

impl ClassLoader for InMemoryClassLoader {
    fn load(
        &self,
        class_name: &str,
        class_version: i64,
        search_path_env_var: &str,
    ) -> Result<Box<dyn Loadable>, LoadError> {
        let versions = self
            .classes
            .get(&(search_path_env_var.to_string(), class_name.to_string()))
            .ok_or_else(|| LoadError::ClassNotFound {
                class_name: class_name.to_string(),
                search_path_env_var: search_path_env_var.to_string(),
            })?;
        let available: Vec<i64> = versions.keys().copied().collect();
        let version = resolve_version(class_name, class_version, &available)?;
        let constructor = versions
            .get(&version)
            .ok_or_else(|| LoadError::VersionNotFound {
                class_name: class_name.to_string(),
                version,
                available,
            })?;
        Ok(constructor())
    }
}
