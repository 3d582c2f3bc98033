//! Asynchronous flow invocation and acknowledgment correlation.
//!
//! A flow runs on a remote peer and reports completion later through an
//! acknowledgment event. [`FlowInvoker`] issues the flow over a [`FlowBus`],
//! parks the caller in the [`CorrelationRegistry`] and wakes it when the
//! matching [`FlowAck`] arrives or the acknowledgment deadline passes.

mod errors;
mod invoker;
mod peers;
mod registry;

pub use errors::{FlowError, RegistryError};
pub use invoker::{FlowAck, FlowBus, FlowInvoker, FlowRequest};
pub use peers::{ConnectionStatus, PeerAddress, PeerDirectory};
pub use registry::{CorrelationKey, CorrelationRegistry, PendingFlow, Resolution};

pub(crate) const FLOW_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::flow");
