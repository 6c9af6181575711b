//! Error types for the endpoint runtime.

use thiserror::Error;

use crate::channel::ChannelError;
use tether_proto::ProtocolError;

/// Errors surfaced by proxy calls and host-side dispatch.
///
/// `Clone` so one rejection can settle every continuation attached to a
/// deferred call. Errors crossing the wire lose their structure: only the
/// display string travels, and the receiving side re-raises it as
/// [`RpcError::Remote`].
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    /// No host object is registered under the id.
    #[error("unknown object id: {0}")]
    UnknownObject(String),

    /// No host function is registered under the id.
    #[error("unknown function id: {0}")]
    UnknownFunction(String),

    /// No host class is registered under the id.
    #[error("unknown class id: {0}")]
    UnknownClass(String),

    /// The member is not exposed by the entity's descriptor.
    #[error("property {0} is not exposed")]
    UnknownProperty(String),

    /// The member exists but cannot be called.
    #[error("{0} is not a function")]
    NotAFunction(String),

    /// The property may not be assigned through the proxy.
    #[error("property {0} is read-only")]
    ReadonlyProperty(String),

    /// The class exposes no constructor.
    #[error("class {0} exposes no constructor")]
    NoConstructor(String),

    /// The proxy has been disposed; no further invocations are possible.
    #[error("proxy has been disposed")]
    Disposed,

    /// The channel cannot carry the requested call mode.
    #[error("channel has no {0} transport")]
    TransportUnavailable(&'static str),

    /// An application error raised by host code, reduced to its message.
    #[error("{0}")]
    Failed(String),

    /// An error received from the peer, reduced to its message.
    #[error("{0}")]
    Remote(String),

    /// Inbound or reply traffic violated the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The channel refused the operation.
    #[error("channel error: {0}")]
    Channel(String),

    /// A value could not be folded into or out of its wire form.
    #[error("serialisation error: {0}")]
    Serialisation(String),
}

impl RpcError {
    /// Creates an application error from a plain message.
    #[must_use]
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<ProtocolError> for RpcError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e.to_string())
    }
}

impl From<ChannelError> for RpcError {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_errors_display_bare_messages() {
        assert_eq!(RpcError::msg("ErRoR").to_string(), "ErRoR");
        assert_eq!(RpcError::Remote("pingerr".to_owned()).to_string(), "pingerr");
    }

    #[test]
    fn protocol_errors_are_wrapped() {
        let error: RpcError = ProtocolError::MissingSyncReply.into();
        assert_eq!(
            error.to_string(),
            "protocol error: no reply to synchronous call"
        );
    }
}
