use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::handler::Handler;

/// Dotted path of a handler module. The root module has the empty path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ModulePath(String);

impl ModulePath {
    /// The root module.
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Path of the submodule `segment` below this one.
    #[must_use]
    pub fn child(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Self(segment.to_owned())
        } else {
            Self(format!("{}.{segment}", self.0))
        }
    }

    /// Dotted text, empty for the root.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the root module.
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for ModulePath {
    fn from(path: &str) -> Self {
        Self(path.to_owned())
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            formatter.write_str("<root>")
        } else {
            formatter.write_str(&self.0)
        }
    }
}

/// A named member of a module.
#[derive(Clone)]
pub enum Node {
    /// A callable method.
    Method(Arc<dyn Handler>),
    /// A nested namespace, resolved without loading a submodule.
    Namespace(Arc<Module>),
}

impl fmt::Debug for Node {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(_) => formatter.write_str("Method"),
            Self::Namespace(module) => formatter.debug_tuple("Namespace").field(module).finish(),
        }
    }
}

/// A set of named methods and namespaces.
#[derive(Debug, Clone, Default)]
pub struct Module {
    members: HashMap<String, Node>,
}

impl Module {
    /// Empty module.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a method.
    #[must_use]
    pub fn with_method<H>(mut self, name: impl Into<String>, handler: H) -> Self
    where
        H: Handler + 'static,
    {
        self.members
            .insert(name.into(), Node::Method(Arc::new(handler)));
        self
    }

    /// Adds a nested namespace.
    #[must_use]
    pub fn with_namespace(mut self, name: impl Into<String>, namespace: Self) -> Self {
        self.members
            .insert(name.into(), Node::Namespace(Arc::new(namespace)));
        self
    }

    /// Member called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Node> {
        self.members.get(name)
    }
}
