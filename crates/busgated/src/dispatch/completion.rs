use std::sync::Arc;
use std::time::Instant;

use busgate_jsonrpc::{NativeValue, RequestId, encode_error, encode_result};
use tracing::{debug, warn};

use super::DISPATCH_TARGET;
use super::sink::ReplySink;
use crate::methods::HandlerError;
use crate::pool::Completion;

/// Turns a handler outcome into the reply for one queued request.
///
/// Notifications never produce a reply. Sink failures are logged and
/// dropped.
pub struct ReplyCompletion<S: ReplySink> {
    sink: Arc<S>,
    target: S::Target,
    id: Option<RequestId>,
    method: String,
    received_at: Instant,
}

impl<S: ReplySink> ReplyCompletion<S> {
    /// Completion answering request `id` for `method` on `target`.
    #[must_use]
    pub const fn new(
        sink: Arc<S>,
        target: S::Target,
        id: Option<RequestId>,
        method: String,
        received_at: Instant,
    ) -> Self {
        Self {
            sink,
            target,
            id,
            method,
            received_at,
        }
    }

    fn reply(&self, id: &RequestId, text: &str) {
        if let Err(error) = self.sink.send(&self.target, text) {
            warn!(
                target: DISPATCH_TARGET,
                method = %self.method,
                id = %id,
                error = %error,
                "failed to send reply"
            );
        }
    }
}

impl<S: ReplySink> Completion for ReplyCompletion<S> {
    fn on_success(self: Box<Self>, value: NativeValue) {
        debug!(
            target: DISPATCH_TARGET,
            method = %self.method,
            elapsed_ms = self.received_at.elapsed().as_millis(),
            "request completed"
        );
        if let Some(id) = &self.id {
            self.reply(id, &encode_result(Some(id), &value));
        }
    }

    fn on_failure(self: Box<Self>, error: HandlerError) {
        warn!(
            target: DISPATCH_TARGET,
            method = %self.method,
            elapsed_ms = self.received_at.elapsed().as_millis(),
            error = %error,
            "request failed"
        );
        if let Some(id) = &self.id {
            self.reply(id, &encode_error(Some(id), &error.to_rpc_error()));
        }
    }
}
