//! Dotted method-name resolution over hot-reloadable handler modules.
//!
//! Handlers are grouped into [`Module`]s supplied by a [`ModuleSource`]. A
//! method path such as `reports.daily.render` is resolved segment by
//! segment: nested namespaces inside an already-loaded module are preferred,
//! otherwise the prefix (`reports`, then `reports.daily`) is loaded as a
//! submodule. Loaded modules are cached by [`MethodResolver`] and re-loaded
//! according to the configured [`busgate_config::ReloadInterval`].

mod builtin;
mod handler;
mod module;
mod resolver;
mod source;

pub use builtin::builtin_source;
pub use handler::{Handler, HandlerError};
pub use module::{Module, ModulePath, Node};
pub use resolver::{MethodResolver, ResolveError};
pub use source::{LoadError, ModuleSource, StaticModuleSource};

pub(crate) const METHODS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::methods");
