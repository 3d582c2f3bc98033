use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use busgate_config::ReloadInterval;
use busgate_jsonrpc::RpcError;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::METHODS_TARGET;
use super::handler::{Handler, HandlerError};
use super::module::{Module, ModulePath, Node};
use super::source::{LoadError, ModuleSource};
use crate::sync::lock;

/// Reasons a method name did not resolve to a handler.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// Some segment of the path names nothing callable.
    #[error("method '{method}' not found")]
    MethodNotFound {
        /// Requested method path.
        method: String,
    },
    /// A module on the path exists but failed its first load.
    #[error("method '{method}' is unavailable: {source}")]
    ModuleUnavailable {
        /// Requested method path.
        method: String,
        /// Loader failure.
        #[source]
        source: LoadError,
    },
}

impl ResolveError {
    fn not_found(method: &str) -> Self {
        Self::MethodNotFound {
            method: method.to_owned(),
        }
    }
}

impl From<ResolveError> for HandlerError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::MethodNotFound { .. } => Self::Rpc(RpcError::method_not_found()),
            ResolveError::ModuleUnavailable { source, .. } => {
                Self::failure("ModuleLoadError", source.to_string())
            }
        }
    }
}

struct CachedModule {
    module: Arc<Module>,
    loaded_at: Instant,
}

/// Resolves dotted method names against cached, periodically reloaded
/// modules.
///
/// Cache lookups, first loads and reloads all happen under one lock; the
/// resolved handler is returned as an owned `Arc` and called after the lock
/// is released.
pub struct MethodResolver {
    source: Box<dyn ModuleSource>,
    reload: ReloadInterval,
    cache: Mutex<HashMap<ModulePath, CachedModule>>,
}

impl MethodResolver {
    /// Resolver over `source` using the given reload policy.
    #[must_use]
    pub fn new(source: impl ModuleSource + 'static, reload: ReloadInterval) -> Self {
        Self {
            source: Box::new(source),
            reload,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Reload policy in force.
    #[must_use]
    pub const fn reload_interval(&self) -> ReloadInterval {
        self.reload
    }

    /// Finds the handler for `method`.
    ///
    /// # Errors
    ///
    /// [`ResolveError::MethodNotFound`] when the path is malformed or any
    /// segment is missing, [`ResolveError::ModuleUnavailable`] when a module
    /// on the path fails its first load.
    pub fn resolve(&self, method: &str) -> Result<Arc<dyn Handler>, ResolveError> {
        let segments: Vec<&str> = method.split('.').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(ResolveError::not_found(method));
        }
        let Some((name, namespaces)) = segments.split_last() else {
            return Err(ResolveError::not_found(method));
        };

        let mut cache = lock(&self.cache);
        let mut path = ModulePath::root();
        let mut current = self.cached_module(&mut cache, &path, method)?;
        for segment in namespaces {
            path = path.child(segment);
            current = match current.get(segment) {
                Some(Node::Namespace(namespace)) => Arc::clone(namespace),
                _ => self.cached_module(&mut cache, &path, method)?,
            };
        }
        drop(cache);

        match current.get(name) {
            Some(Node::Method(handler)) => Ok(Arc::clone(handler)),
            _ => {
                debug!(target: METHODS_TARGET, method, "method not found");
                Err(ResolveError::not_found(method))
            }
        }
    }

    /// Forgets every cached module; the next resolution loads afresh.
    pub fn invalidate(&self) {
        let dropped = {
            let mut cache = lock(&self.cache);
            let dropped = cache.len();
            cache.clear();
            dropped
        };
        debug!(target: METHODS_TARGET, dropped, "module cache cleared");
    }

    fn cached_module(
        &self,
        cache: &mut HashMap<ModulePath, CachedModule>,
        path: &ModulePath,
        method: &str,
    ) -> Result<Arc<Module>, ResolveError> {
        if let Some(entry) = cache.get_mut(path) {
            if self.reload.is_due(entry.loaded_at.elapsed()) {
                self.reload_entry(entry, path);
            }
            return Ok(Arc::clone(&entry.module));
        }

        let module = match self.source.load(path) {
            Ok(module) => Arc::new(module),
            Err(LoadError::NotFound { .. }) => return Err(ResolveError::not_found(method)),
            Err(source) => {
                return Err(ResolveError::ModuleUnavailable {
                    method: method.to_owned(),
                    source,
                });
            }
        };
        debug!(target: METHODS_TARGET, module = %path, "module loaded");
        cache.insert(
            path.clone(),
            CachedModule {
                module: Arc::clone(&module),
                loaded_at: Instant::now(),
            },
        );
        Ok(module)
    }

    fn reload_entry(&self, entry: &mut CachedModule, path: &ModulePath) {
        match self.source.load(path) {
            Ok(module) => {
                entry.module = Arc::new(module);
                entry.loaded_at = Instant::now();
                info!(target: METHODS_TARGET, module = %path, "module reloaded");
            }
            Err(error) => {
                warn!(
                    target: METHODS_TARGET,
                    module = %path,
                    error = %error,
                    "module reload failed, keeping the last loaded version"
                );
            }
        }
    }
}
