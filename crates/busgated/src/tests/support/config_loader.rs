//! Configuration loaders for scenarios covering success and failure paths.

use std::sync::Arc;

use busgate_config::{Config, SocketEndpoint};
use ortho_config::OrthoError;
use tempfile::TempDir;

use crate::bootstrap::{ArgsConfigLoader, ConfigLoader};

/// Loader yielding a small pool listening on an ephemeral TCP port.
pub struct TestConfigLoader {
    endpoint: SocketEndpoint,
    _socket_dir: Option<TempDir>,
}

impl TestConfigLoader {
    /// TCP loopback on port `0`.
    #[must_use]
    pub fn tcp() -> Self {
        Self {
            endpoint: SocketEndpoint::tcp("127.0.0.1", 0),
            _socket_dir: None,
        }
    }

    /// Unix socket nested two directories deep inside a fresh temp dir.
    #[must_use]
    pub fn nested_unix() -> Self {
        let dir = TempDir::new().expect("temporary socket directory");
        let path = dir.path().join("run/busgate/busgated.sock");
        Self {
            endpoint: SocketEndpoint::unix(path.to_str().expect("utf8 socket path")),
            _socket_dir: Some(dir),
        }
    }

    /// Endpoint the loaded configuration listens on.
    #[must_use]
    pub fn endpoint(&self) -> &SocketEndpoint {
        &self.endpoint
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(Config {
            listen_socket: self.endpoint.clone(),
            worker_concurrency: Some(2),
            queue_capacity: 16,
            ..Config::default()
        })
    }
}

/// Loader that fails by passing an unparsable CLI value.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        ArgsConfigLoader::new(["busgated", "--queue-capacity", "plenty"]).load()
    }
}
