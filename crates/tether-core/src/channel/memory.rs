//! In-memory channel pair for tests and same-process endpoints.
//!
//! Both ends share one link; a send runs the peer's receiver on the
//! caller's stack, so delivery order is exactly send order. A synchronous
//! send hands the peer a reply channel whose `send_sync` fills the reply
//! slot of the originating call, the same shape as transports where a sync
//! reply is set on the originating event.

use std::any::Any;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::{ChannelError, MessageChannel, MessageReceiver, ReceiveOptions};

struct Link {
    receivers: [RefCell<Option<MessageReceiver>>; 2],
    contexts: [RefCell<Option<Rc<dyn Any>>>; 2],
}

impl Link {
    fn new() -> Rc<Self> {
        Rc::new(Self {
            receivers: [RefCell::new(None), RefCell::new(None)],
            contexts: [RefCell::new(None), RefCell::new(None)],
        })
    }

    fn deliver(
        &self,
        to: usize,
        message: serde_json::Value,
        reply_channel: Option<Rc<dyn MessageChannel>>,
    ) -> Result<(), ChannelError> {
        let receiver = self.receivers[to].borrow().clone().ok_or(ChannelError::Closed)?;
        let context = self.contexts[to].borrow().clone();
        receiver(
            message,
            ReceiveOptions {
                reply_channel,
                context,
            },
        );
        Ok(())
    }
}

/// One end of an in-memory channel pair.
pub struct MemoryChannel {
    link: Rc<Link>,
    side: usize,
    has_sync: bool,
    has_async: bool,
}

impl MemoryChannel {
    fn linked(has_sync: bool, has_async: bool) -> (Self, Self) {
        let link = Link::new();
        (
            Self {
                link: link.clone(),
                side: 0,
                has_sync,
                has_async,
            },
            Self {
                link,
                side: 1,
                has_sync,
                has_async,
            },
        )
    }

    /// Creates a pair with both transports.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        Self::linked(true, true)
    }

    /// Creates a pair offering only the synchronous transport.
    #[must_use]
    pub fn sync_only() -> (Self, Self) {
        Self::linked(true, false)
    }

    /// Creates a pair offering only the asynchronous transport.
    #[must_use]
    pub fn async_only() -> (Self, Self) {
        Self::linked(false, true)
    }

    /// Attaches the delivery context this end's receiver will observe.
    pub fn set_context(&self, context: Rc<dyn Any>) {
        *self.link.contexts[self.side].borrow_mut() = Some(context);
    }

    fn peer(&self) -> usize {
        1 - self.side
    }
}

impl MessageChannel for MemoryChannel {
    fn send_sync(&self, message: serde_json::Value) -> Result<serde_json::Value, ChannelError> {
        if !self.has_sync {
            return Err(ChannelError::SyncUnsupported);
        }

        let slot = Rc::new(RefCell::new(None));
        let reply_channel: Rc<dyn MessageChannel> = Rc::new(SyncReplyChannel {
            slot: slot.clone(),
            link: Rc::downgrade(&self.link),
            origin: self.side,
            has_async: self.has_async,
        });

        self.link.deliver(self.peer(), message, Some(reply_channel))?;

        let reply = slot.borrow_mut().take();
        Ok(reply.unwrap_or(serde_json::Value::Null))
    }

    fn send_async(&self, message: serde_json::Value) -> Result<(), ChannelError> {
        if !self.has_async {
            return Err(ChannelError::AsyncUnsupported);
        }
        self.link.deliver(self.peer(), message, None)
    }

    fn supports_sync(&self) -> bool {
        self.has_sync
    }

    fn supports_async(&self) -> bool {
        self.has_async
    }

    fn bind_receiver(&self, receiver: MessageReceiver) -> Result<(), ChannelError> {
        *self.link.receivers[self.side].borrow_mut() = Some(receiver);
        Ok(())
    }
}

/// Reply overlay for one synchronous delivery.
///
/// `send_sync` sets the originating call's reply; `send_async` routes back
/// over the normal path to the caller's receiver.
struct SyncReplyChannel {
    slot: Rc<RefCell<Option<serde_json::Value>>>,
    link: Weak<Link>,
    origin: usize,
    has_async: bool,
}

impl MessageChannel for SyncReplyChannel {
    fn send_sync(&self, message: serde_json::Value) -> Result<serde_json::Value, ChannelError> {
        *self.slot.borrow_mut() = Some(message);
        Ok(serde_json::Value::Null)
    }

    fn send_async(&self, message: serde_json::Value) -> Result<(), ChannelError> {
        if !self.has_async {
            return Err(ChannelError::AsyncUnsupported);
        }
        let link = self.link.upgrade().ok_or(ChannelError::Closed)?;
        link.deliver(self.origin, message, None)
    }

    fn supports_sync(&self) -> bool {
        true
    }

    fn supports_async(&self) -> bool {
        self.has_async
    }
}
