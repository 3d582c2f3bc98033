use super::errors::ReplyError;

/// Delivers encoded replies back to the bus client that sent the request.
///
/// `send` is called from worker threads and from the intake path, possibly
/// concurrently.
pub trait ReplySink: Send + Sync + 'static {
    /// Routing information identifying the requesting client.
    type Target: Send + 'static;

    /// Writes one encoded reply to `target`.
    fn send(&self, target: &Self::Target, text: &str) -> Result<(), ReplyError>;
}
