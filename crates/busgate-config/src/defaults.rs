use camino::Utf8PathBuf;
#[cfg(unix)]
use std::env;

#[cfg(unix)]
use dirs::runtime_dir;
#[cfg(unix)]
use libc::geteuid;

use crate::logging::LogFormat;
use crate::socket::SocketEndpoint;

/// TCP port used when Unix domain sockets are unavailable.
pub const DEFAULT_TCP_PORT: u16 = 9780;

/// Log filter applied when nothing else is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Intake queue bound.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

/// Negative: handler modules are never reloaded.
pub const DEFAULT_RELOAD_INTERVAL_SECS: f64 = -1.0;

/// Flow acknowledgment wait budget in seconds.
pub const DEFAULT_FLOW_ACK_TIMEOUT_SECS: f64 = 15.0;

/// Default log filter expression.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default log output format.
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Endpoint the line transport listens on when none is configured.
///
/// On Unix this is `busgated.sock` under the user's runtime directory, or a
/// per-uid directory below the temp dir when no runtime directory exists.
pub fn default_socket_endpoint() -> SocketEndpoint {
    #[cfg(unix)]
    {
        let (mut base, per_user) = match runtime_dir()
            .and_then(|path| Utf8PathBuf::from_path_buf(path).ok())
        {
            Some(dir) => (dir, false),
            None => (temp_base(), true),
        };
        base.push("busgate");
        if per_user {
            // SAFETY: geteuid has no preconditions and cannot fail.
            let uid = unsafe { geteuid() };
            base.push(format!("uid-{uid}"));
        }
        SocketEndpoint::unix(base.join("busgated.sock"))
    }

    #[cfg(not(unix))]
    {
        SocketEndpoint::tcp("127.0.0.1", DEFAULT_TCP_PORT)
    }
}

#[cfg(unix)]
fn temp_base() -> Utf8PathBuf {
    Utf8PathBuf::from_path_buf(env::temp_dir()).unwrap_or_else(|_| Utf8PathBuf::from("/tmp"))
}
