//! JSON-RPC 2.0 envelope codec for the busgate engine.
//!
//! Inbound bus messages are classified by [`decode`] into one of the three
//! mutually exclusive [`Envelope`] shapes: a request (or notification), a
//! result response, or an error response. Decoding failures carry whatever
//! request id could be recovered so the caller can decide whether a reply is
//! possible at all.
//!
//! Outbound replies are produced by [`encode_result`] and [`encode_error`].
//! Handler return values are expressed as [`NativeValue`], which admits
//! values with no direct JSON form (dates, byte strings, durations);
//! [`NativeValue::normalise`] maps them onto JSON.

mod decode;
mod encode;
mod envelope;
mod error;
mod value;

pub use decode::decode;
pub use encode::{JSONRPC_VERSION, encode_error, encode_result};
pub use envelope::{Envelope, Params, RequestId, RpcErrorResponse, RpcRequest, RpcResponse};
pub use error::{DecodeError, RpcError, UnsupportedTypeError};
pub use value::{ByteEncoding, NativeValue};
