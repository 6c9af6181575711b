//! Error types for the protocol layer.

use thiserror::Error;

/// Errors raised while screening and decoding channel traffic.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Inbound value does not carry the rpc marker.
    #[error("message lacks the rpc marker")]
    MissingMarker,

    /// Inbound value carries the marker but does not parse as a message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A synchronous call produced no usable reply.
    #[error("no reply to synchronous call")]
    MissingSyncReply,

    /// Serialisation error.
    #[error("serialisation error: {0}")]
    Serialisation(String),
}
