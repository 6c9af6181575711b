//! Symmetric, bidirectional object-graph RPC endpoint.
//!
//! Two endpoints connected by an opaque message channel expose live
//! objects, functions and classes to each other. Registering a host
//! entity under an id lets the peer obtain a proxy whose calls, property
//! accesses and constructor invocations are marshalled across the
//! channel; sending a proxy back to its origin resolves to the original
//! target. Call modes (`void`, `sync`, `async`) are chosen per operation
//! and degrade automatically when the channel lacks a transport.
//!
//! The core is single-threaded and cooperative: all state lives on the
//! caller's thread, proxies are tracked through weak references, and the
//! reclamation of a proxy notifies the origin with `obj_died`.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//! use tether_core::{HostFunction, MemoryChannel, RpcSession, SessionConfig, Value};
//! use tether_proto::{FunctionDescriptor, ReturnKind};
//!
//! let (host_end, client_end) = MemoryChannel::pair();
//! let host = RpcSession::connect(Rc::new(host_end), SessionConfig::default()).unwrap();
//! let client = RpcSession::connect(Rc::new(client_end), SessionConfig::default()).unwrap();
//!
//! host.register_host_function(
//!     "add",
//!     HostFunction::new(|args| {
//!         let a = args[0].as_i64().unwrap_or(0);
//!         let b = args[1].as_i64().unwrap_or(0);
//!         Ok(Value::from(a + b))
//!     }),
//!     FunctionDescriptor::named("add").with_returns(ReturnKind::Sync),
//! );
//!
//! client.request_descriptors().unwrap();
//! let add = client.get_proxy_function("add").unwrap();
//! let sum = add.invoke(vec![Value::from(2i64), Value::from(3i64)]).unwrap();
//! assert_eq!(sum.as_i64(), Some(5));
//! ```

mod channel;
mod codec;
mod config;
mod dispatch;
mod error;
mod object;
mod promise;
mod proxies;
mod proxy;
mod registry;
mod session;
mod value;

pub use channel::{ChannelError, MemoryChannel, MessageChannel, MessageReceiver, ReceiveOptions};
pub use config::SessionConfig;
pub use error::RpcError;
pub use object::DynObject;
pub use promise::{Promise, PromiseState};
pub use proxy::{ProxyClass, ProxyFunction, ProxyObject};
pub use session::RpcSession;
pub use value::{HostFunction, HostObject, RpcTarget, Value};
