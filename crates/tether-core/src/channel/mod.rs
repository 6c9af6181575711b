//! The opaque message channel contract.
//!
//! A channel is whatever can move a JSON value to the peer: a pipe, a
//! window boundary, a socket. The core consumes it through the narrow
//! [`MessageChannel`] trait and degrades call modes to whatever subset of
//! capabilities the channel offers. At least one send variant is needed to
//! originate calls; a receiver is needed to accept them.

mod memory;

pub use memory::MemoryChannel;

use std::any::Any;
use std::rc::Rc;

use thiserror::Error;

/// Errors raised by channel operations.
#[derive(Error, Debug)]
pub enum ChannelError {
    /// The channel has no synchronous transport.
    #[error("channel does not support synchronous sends")]
    SyncUnsupported,

    /// The channel has no asynchronous transport.
    #[error("channel does not support asynchronous sends")]
    AsyncUnsupported,

    /// The channel cannot deliver inbound messages.
    #[error("channel does not support receiving")]
    ReceiveUnsupported,

    /// The peer is gone.
    #[error("channel closed")]
    Closed,

    /// Transport-specific failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Per-message delivery context handed to the receive callback.
#[derive(Clone, Default)]
pub struct ReceiveOptions {
    /// Transport overlay for replying on the same logical connection that
    /// delivered the message. While a message is handled, every outgoing
    /// message is addressed here instead of the default channel.
    pub reply_channel: Option<Rc<dyn MessageChannel>>,

    /// The raw transport event, exposed to host code for the duration of
    /// the call.
    pub context: Option<Rc<dyn Any>>,
}

/// Callback invoked for each inbound message.
pub type MessageReceiver = Rc<dyn Fn(serde_json::Value, ReceiveOptions)>;

/// A message transport with any subset of sync send, async send and
/// receive capability.
pub trait MessageChannel {
    /// Emits a message and blocks for the peer's reply.
    fn send_sync(&self, message: serde_json::Value) -> Result<serde_json::Value, ChannelError> {
        let _ = message;
        Err(ChannelError::SyncUnsupported)
    }

    /// Emits a message without waiting.
    fn send_async(&self, message: serde_json::Value) -> Result<(), ChannelError> {
        let _ = message;
        Err(ChannelError::AsyncUnsupported)
    }

    /// Whether [`send_sync`](Self::send_sync) is available.
    fn supports_sync(&self) -> bool {
        false
    }

    /// Whether [`send_async`](Self::send_async) is available.
    fn supports_async(&self) -> bool {
        false
    }

    /// Installs the inbound message callback.
    fn bind_receiver(&self, receiver: MessageReceiver) -> Result<(), ChannelError> {
        let _ = receiver;
        Err(ChannelError::ReceiveUnsupported)
    }
}
