//! Issues flows on remote peers and waits for their acknowledgment.

use std::mem;
use std::sync::{Arc, Mutex};
use std::thread::{self, ThreadId};
use std::time::Duration;

use busgate_config::{Config, TargetSelection};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::FLOW_TARGET;
use super::errors::FlowError;
use super::peers::{PeerAddress, PeerDirectory};
use super::registry::{CorrelationKey, CorrelationRegistry, PendingFlow, Resolution};
use crate::sync::lock;

/// Outbound half of the bus used to start flows.
///
/// An implementation may deliver the acknowledgment before `invoke_flow`
/// returns, from another thread or synchronously from inside the call.
pub trait FlowBus: Send + Sync {
    /// Starts `flow` of `project` on `target` and returns the invoke id the
    /// bus assigned to it.
    ///
    /// # Errors
    ///
    /// [`FlowError::Bus`] when the flow could not be issued.
    fn invoke_flow(
        &self,
        target: &PeerAddress,
        project: &str,
        flow: &str,
        params: &Value,
    ) -> Result<u64, FlowError>;
}

/// A flow the caller wants to run.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowRequest {
    /// Target server, filled in by selection when absent.
    pub server: Option<String>,
    /// Target process, filled in by selection when absent.
    pub process: Option<String>,
    /// Project containing the flow.
    pub project: String,
    /// Flow name.
    pub flow: String,
    /// Flow input.
    pub params: Value,
}

/// Acknowledgment event delivered by the bus once a flow finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowAck {
    /// Peer that ran the flow.
    pub source: PeerAddress,
    /// Project of the flow.
    pub project: String,
    /// Invoke id assigned when the flow was issued.
    pub invoke_id: u64,
    /// `1` for success, anything else is a failure.
    pub ack: i64,
    /// Peer-provided message.
    pub message: String,
}

impl FlowAck {
    fn key(&self) -> CorrelationKey {
        correlation_key(&self.source, &self.project, self.invoke_id)
    }

    fn into_result(self) -> Result<String, FlowError> {
        if self.ack == 1 {
            Ok(self.message)
        } else {
            Err(FlowError::Rejected {
                ack: self.ack,
                message: self.message,
            })
        }
    }
}

fn correlation_key(peer: &PeerAddress, project: &str, invoke_id: u64) -> CorrelationKey {
    CorrelationKey::new(format!(
        "{}:{}:{project}:{invoke_id}",
        peer.unit_id, peer.client_id
    ))
}

/// Runs flows and correlates their acknowledgments.
pub struct FlowInvoker<B> {
    bus: B,
    peers: Arc<PeerDirectory>,
    registry: CorrelationRegistry<FlowAck>,
    ack_timeout: Duration,
    selection: TargetSelection,
    issue: Mutex<()>,
    issuer: Mutex<Option<ThreadId>>,
    deferred: Mutex<Vec<FlowAck>>,
}

impl<B: FlowBus> FlowInvoker<B> {
    /// Invoker over `bus`, selecting targets from `peers`.
    #[must_use]
    pub fn new(
        bus: B,
        peers: Arc<PeerDirectory>,
        ack_timeout: Duration,
        selection: TargetSelection,
    ) -> Self {
        Self {
            bus,
            peers,
            registry: CorrelationRegistry::new(),
            ack_timeout,
            selection,
            issue: Mutex::new(()),
            issuer: Mutex::new(None),
            deferred: Mutex::new(Vec::new()),
        }
    }

    /// Invoker configured from the daemon settings.
    #[must_use]
    pub fn from_config(bus: B, peers: Arc<PeerDirectory>, config: &Config) -> Self {
        Self::new(
            bus,
            peers,
            config.flow_ack_timeout(),
            config.flow_target_selection(),
        )
    }

    /// Peers used for target selection.
    #[must_use]
    pub fn peers(&self) -> &Arc<PeerDirectory> {
        &self.peers
    }

    /// Invocations currently waiting for an acknowledgment.
    #[must_use]
    pub fn registry(&self) -> &CorrelationRegistry<FlowAck> {
        &self.registry
    }

    /// Runs a flow and waits for its acknowledgment.
    ///
    /// Dropping the returned future abandons the invocation; a late
    /// acknowledgment is then ignored.
    ///
    /// # Errors
    ///
    /// Target selection and bus errors are returned as is. Afterwards
    /// [`FlowError::Rejected`] for a failure acknowledgment,
    /// [`FlowError::Timeout`] when none arrives within the acknowledgment
    /// timeout and [`FlowError::Cancelled`] when the wait was cancelled.
    pub async fn invoke(&self, request: FlowRequest) -> Result<String, FlowError> {
        let FlowRequest {
            server,
            process,
            project,
            flow,
            params,
        } = request;
        let target = self
            .peers
            .select(server.as_deref(), process.as_deref(), self.selection)?;

        let pending = {
            let _issue = lock(&self.issue);
            *lock(&self.issuer) = Some(thread::current().id());
            let registered = self.issue_flow(&target, &project, &flow, &params);
            *lock(&self.issuer) = None;
            let deferred = mem::take(&mut *lock(&self.deferred));
            for ack in deferred {
                self.deliver(ack);
            }
            registered?
        };
        let key = pending.key().clone();
        info!(target: FLOW_TARGET, key = %key, flow = %flow, "flow issued");

        match pending.await {
            Resolution::Event(ack) => ack.into_result(),
            Resolution::TimedOut => {
                warn!(target: FLOW_TARGET, key = %key, "flow acknowledgment timed out");
                Err(FlowError::Timeout {
                    key,
                    after: self.ack_timeout,
                })
            }
            Resolution::Cancelled => Err(FlowError::Cancelled { key }),
        }
    }

    fn issue_flow(
        &self,
        target: &PeerAddress,
        project: &str,
        flow: &str,
        params: &Value,
    ) -> Result<PendingFlow<FlowAck>, FlowError> {
        let invoke_id = self.bus.invoke_flow(target, project, flow, params)?;
        let key = correlation_key(target, project, invoke_id);
        Ok(self.registry.begin(key, self.ack_timeout)?)
    }

    /// Delivers an acknowledgment to its waiting invocation. Returns `false`
    /// when nothing was waiting for it.
    ///
    /// Called from inside [`FlowBus::invoke_flow`] on the issuing thread, the
    /// acknowledgment is held until the flow is registered and `true` is
    /// returned.
    pub fn acknowledge(&self, ack: FlowAck) -> bool {
        if *lock(&self.issuer) == Some(thread::current().id()) {
            debug!(target: FLOW_TARGET, key = %ack.key(), "acknowledgment deferred until issued");
            lock(&self.deferred).push(ack);
            return true;
        }
        // Issue and registration happen under this lock, so an ack for a
        // flow issued concurrently is never looked up before it is pending.
        let _issue = lock(&self.issue);
        self.deliver(ack)
    }

    fn deliver(&self, ack: FlowAck) -> bool {
        let key = ack.key();
        let delivered = self.registry.resolve(&key, ack);
        if !delivered {
            debug!(target: FLOW_TARGET, key = %key, "acknowledgment without a waiter");
        }
        delivered
    }
}
