use std::collections::{BTreeSet, HashMap};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{resolve_version, ClassLoader};
use crate::error::LoadError;
use crate::operation::{DescribedOperation, OperationDefinition};
use crate::parameterised::Loadable;

const DEFINITION_EXTENSION: &str = "json";

/// Loads operation definitions from the directories listed in an
/// environment variable.
///
/// A class `blur` at version 2 lives at `<dir>/blur/blur-2.json`. The
/// directories are searched in order and the first one holding a `blur`
/// directory wins, even when another directory later on the path has more
/// versions.
#[derive(Debug, Clone, Default)]
pub struct SearchPathClassLoader {
    overrides: HashMap<String, Vec<PathBuf>>,
}

impl SearchPathClassLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses `paths` for `search_path_env_var` instead of reading the
    /// environment.
    pub fn with_search_path(
        mut self,
        search_path_env_var: &str,
        paths: impl IntoIterator<Item = PathBuf>,
    ) -> Self {
        self.overrides
            .insert(search_path_env_var.to_string(), paths.into_iter().collect());
        self
    }

    /// Directories named by `search_path_env_var`, in search order.
    pub fn search_path(&self, search_path_env_var: &str) -> Result<Vec<PathBuf>, LoadError> {
        if let Some(paths) = self.overrides.get(search_path_env_var) {
            return Ok(paths.clone());
        }
        let value = env::var_os(search_path_env_var).ok_or_else(|| LoadError::EnvVarNotSet {
            name: search_path_env_var.to_string(),
        })?;
        Ok(env::split_paths(&value)
            .filter(|path| !path.as_os_str().is_empty())
            .collect())
    }

    /// Names of every class found on the search path, sorted.
    pub fn classes(&self, search_path_env_var: &str) -> Result<Vec<String>, LoadError> {
        let mut classes = BTreeSet::new();
        for dir in self.search_path(search_path_env_var)? {
            let Ok(entries) = fs::read_dir(&dir) else {
                continue;
            };
            for entry in entries {
                let entry = entry.map_err(|source| LoadError::Io {
                    path: dir.clone(),
                    source,
                })?;
                let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                    continue;
                };
                let path = entry.path();
                if path.is_dir() && !versions_in(&path, &name)?.is_empty() {
                    classes.insert(name);
                }
            }
        }
        Ok(classes.into_iter().collect())
    }

    /// Available versions of `class_name`, ascending.
    pub fn versions(
        &self,
        class_name: &str,
        search_path_env_var: &str,
    ) -> Result<Vec<i64>, LoadError> {
        let dir = self.class_dir(class_name, search_path_env_var)?;
        versions_in(&dir, class_name)
    }

    /// Reads the definition of `class_name`, resolving negative versions to
    /// the latest. Returns the resolved version alongside.
    pub fn definition(
        &self,
        class_name: &str,
        class_version: i64,
        search_path_env_var: &str,
    ) -> Result<(i64, OperationDefinition), LoadError> {
        let dir = self.class_dir(class_name, search_path_env_var)?;
        let available = versions_in(&dir, class_name)?;
        let version = resolve_version(class_name, class_version, &available)?;
        let path = dir.join(definition_file_name(class_name, version));
        debug!(class = class_name, version, path = %path.display(), "reading definition");

        let text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let definition = serde_json::from_str(&text)
            .map_err(|source| LoadError::Parse { path, source })?;
        Ok((version, definition))
    }

    fn class_dir(&self, class_name: &str, search_path_env_var: &str) -> Result<PathBuf, LoadError> {
        let not_found = || LoadError::ClassNotFound {
            class_name: class_name.to_string(),
            search_path_env_var: search_path_env_var.to_string(),
        };
        if class_name.is_empty() || class_name.contains(['/', '\\']) {
            return Err(not_found());
        }
        self.search_path(search_path_env_var)?
            .into_iter()
            .map(|dir| dir.join(class_name))
            .find(|dir| dir.is_dir())
            .ok_or_else(not_found)
    }
}

impl ClassLoader for SearchPathClassLoader {
    fn load(
        &self,
        class_name: &str,
        class_version: i64,
        search_path_env_var: &str,
    ) -> Result<Box<dyn Loadable>, LoadError> {
        let (version, definition) =
            self.definition(class_name, class_version, search_path_env_var)?;
        let operation = DescribedOperation::from_definition(class_name, version, &definition)?;
        Ok(Box::new(operation))
    }
}

fn definition_file_name(class_name: &str, version: i64) -> String {
    format!("{}-{}.{}", class_name, version, DEFINITION_EXTENSION)
}

/// Versions of `class_name` defined in `dir`, ascending. Files not named
/// `<class_name>-<version>.json` are ignored.
fn versions_in(dir: &Path, class_name: &str) -> Result<Vec<i64>, LoadError> {
    let entries = fs::read_dir(dir).map_err(|source| LoadError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    let prefix = format!("{}-", class_name);
    let mut versions = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| LoadError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(DEFINITION_EXTENSION) {
            continue;
        }
        let version = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .and_then(|stem| stem.strip_prefix(&prefix))
            .and_then(|version| version.parse::<i64>().ok())
            .filter(|version| *version >= 0);
        if let Some(version) = version {
            versions.push(version);
        }
    }
    versions.sort_unstable();
    Ok(versions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_file_names() {
        assert_eq!(definition_file_name("blur", 3), "blur-3.json");
    }

    #[test]
    fn override_replaces_environment() {
        let loader = SearchPathClassLoader::new()
            .with_search_path("PARAMSYNC_TEST_UNSET_VAR", vec![PathBuf::from("/a")]);
        assert_eq!(
            loader.search_path("PARAMSYNC_TEST_UNSET_VAR").unwrap(),
            vec![PathBuf::from("/a")]
        );
    }

    #[test]
    fn unset_variable_is_reported() {
        let loader = SearchPathClassLoader::new();
        assert!(matches!(
            loader.search_path("PARAMSYNC_TEST_SURELY_UNSET_VAR"),
            Err(LoadError::EnvVarNotSet { .. })
        ));
    }

    #[test]
    fn empty_class_name_is_not_found() {
        let loader = SearchPathClassLoader::new().with_search_path("P", Vec::new());
        assert!(matches!(
            loader.load("", -1, "P"),
            Err(LoadError::ClassNotFound { .. })
        ));
    }
}
