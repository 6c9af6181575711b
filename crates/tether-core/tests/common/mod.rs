//! Shared fixtures: paired sessions over an in-memory channel.

use std::rc::Rc;

use tether_core::{MemoryChannel, RpcSession, SessionConfig};

pub fn connect(channel: MemoryChannel) -> RpcSession {
    RpcSession::connect(Rc::new(channel), SessionConfig::default()).expect("session connects")
}

/// Two sessions over a channel with both transports.
pub fn linked() -> (RpcSession, RpcSession) {
    let (a, b) = MemoryChannel::pair();
    (connect(a), connect(b))
}

/// Two sessions over a sync-only channel.
#[allow(dead_code)]
pub fn linked_sync_only() -> (RpcSession, RpcSession) {
    let (a, b) = MemoryChannel::sync_only();
    (connect(a), connect(b))
}

/// Two sessions over an async-only channel.
#[allow(dead_code)]
pub fn linked_async_only() -> (RpcSession, RpcSession) {
    let (a, b) = MemoryChannel::async_only();
    (connect(a), connect(b))
}
