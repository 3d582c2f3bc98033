use std::collections::HashMap;

use thiserror::Error;

use super::module::{Module, ModulePath};

/// Supplies handler modules by path.
///
/// Each call to [`ModuleSource::load`] produces a fresh module; the resolver
/// calls it again whenever a cached module is due for reload.
pub trait ModuleSource: Send + Sync {
    /// Loads the module at `path`.
    fn load(&self, path: &ModulePath) -> Result<Module, LoadError>;
}

/// Reasons a module could not be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    /// Nothing is registered at the path.
    #[error("module {path} does not exist")]
    NotFound {
        /// Requested path.
        path: ModulePath,
    },
    /// The module exists but could not be built.
    #[error("module {path} failed to load: {message}")]
    Failed {
        /// Requested path.
        path: ModulePath,
        /// Loader diagnostic.
        message: String,
    },
}

type Factory = Box<dyn Fn() -> Module + Send + Sync>;

/// Module source backed by in-process factories.
#[derive(Default)]
pub struct StaticModuleSource {
    factories: HashMap<ModulePath, Factory>,
}

impl StaticModuleSource {
    /// Source with no modules.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` as the builder of the module at `path`. Use `""`
    /// for the root module.
    #[must_use]
    pub fn with_module<F>(mut self, path: &str, factory: F) -> Self
    where
        F: Fn() -> Module + Send + Sync + 'static,
    {
        self.factories
            .insert(ModulePath::from(path), Box::new(factory));
        self
    }
}

impl ModuleSource for StaticModuleSource {
    fn load(&self, path: &ModulePath) -> Result<Module, LoadError> {
        self.factories
            .get(path)
            .map(|factory| factory())
            .ok_or_else(|| LoadError::NotFound { path: path.clone() })
    }
}
