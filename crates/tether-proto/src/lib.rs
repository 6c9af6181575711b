//! Wire protocol types for the tether object-graph RPC core.
//!
//! This crate is purely declarative: it defines the descriptors two
//! endpoints exchange to describe their exposed entities, the message
//! envelope that crosses the channel, and the tagged wire forms values
//! take inside `args`, `result` and `props`. No runtime state lives here;
//! the live endpoint is built on top in `tether-core`.
//!
//! # Wire Format
//!
//! Every message is a JSON object stamped with `rpc_marker: "srpc"` and an
//! `action` discriminant:
//!
//! ```text
//! { "rpc_marker": "srpc", "action": "method_call",
//!   "callType": "async", "objId": "...", "prop": "...",
//!   "args": [...], "callId": "7" }
//! ```
//!
//! Values inside `args`/`result`/`props` are either bare JSON scalars and
//! containers, or objects tagged with `_rpc_type` (`object`, `function`,
//! `hostObject`).

mod descriptor;
mod error;
mod message;
mod tagged;

pub use descriptor::{
    resolve_function, ArgumentDescriptor, ClassDescriptor, EventAction, FunctionDescriptor,
    ObjectDescriptor, PropertyDescriptor, ReturnKind,
};
pub use error::ProtocolError;
pub use message::{
    CallMessage, CallType, DescriptorBatch, ReplyMessage, RpcMessage, WireEnvelope, RPC_MARKER,
};
pub use tagged::{TaggedValue, PROMISE_CLASS_ID};
