//! The session controller: one endpoint of the object-graph RPC core.
//!
//! An [`RpcSession`] owns the channel binding, the host and proxy
//! registries, the remote descriptor caches and the correlation of
//! deferred replies. Everything runs on the caller's thread; inbound
//! messages are threaded through a single receive callback installed at
//! connection time.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::{Rc, Weak};

use serde_json::Value as Json;
use tracing::{debug, trace, warn};

use tether_proto::{
    ClassDescriptor, DescriptorBatch, FunctionDescriptor, ObjectDescriptor, ProtocolError,
    ReplyMessage, RpcMessage, WireEnvelope,
};

use crate::channel::{ChannelError, MessageChannel, MessageReceiver, ReceiveOptions};
use crate::codec;
use crate::config::SessionConfig;
use crate::error::RpcError;
use crate::promise::Promise;
use crate::proxies::{ProxyLifecycle, ProxyRegistry};
use crate::proxy::{
    CallAction, FunctionProxyInner, ObjectProxyInner, ProxyClass, ProxyFunction, ProxyObject,
};
use crate::registry::{ClassEntry, HostRegistry};
use crate::value::{HostFunction, HostObject, Value};

/// Shared endpoint state behind every proxy and dispatch path.
pub(crate) struct SessionCore {
    weak_self: Weak<SessionCore>,
    channel: Rc<dyn MessageChannel>,
    config: SessionConfig,

    pub(crate) host: HostRegistry,
    proxies: ProxyRegistry,
    proxy_classes: RefCell<HashMap<String, ProxyClass>>,
    remote: RefCell<DescriptorBatch>,

    pending: RefCell<HashMap<String, Promise>>,
    orphan_replies: RefCell<HashMap<String, ReplyMessage>>,
    next_call_id: Cell<u64>,
    descriptor_pull: RefCell<Option<Promise>>,

    reply_channel: RefCell<Option<Rc<dyn MessageChannel>>>,
    current_context: RefCell<Option<Rc<dyn Any>>>,

    post_send: RefCell<VecDeque<Box<dyn FnOnce()>>>,
    handling_depth: Cell<u32>,
}

impl SessionCore {
    /// The channel outgoing traffic is addressed to: the per-message
    /// reply channel while one is active, the bound channel otherwise.
    pub(crate) fn active_channel(&self) -> Rc<dyn MessageChannel> {
        self.reply_channel
            .borrow()
            .clone()
            .unwrap_or_else(|| self.channel.clone())
    }

    /// Whether the bound channel has a synchronous transport. Drives the
    /// deferred-assignment predicate of `prop_set`.
    pub(crate) fn default_supports_sync(&self) -> bool {
        self.channel.supports_sync()
    }

    pub(crate) fn weak(&self) -> Weak<SessionCore> {
        self.weak_self.clone()
    }

    pub(crate) fn generate_id(&self) -> String {
        self.config.generate_id()
    }

    /// Allocates the next stringified correlation id.
    pub(crate) fn next_call_id(&self) -> String {
        let next = self.next_call_id.get() + 1;
        self.next_call_id.set(next);
        next.to_string()
    }

    pub(crate) fn register_pending(&self, call_id: &str, promise: Promise) {
        // A settlement can overtake its promise when the promise rides a
        // synchronous reply; it was stashed and settles the promise now.
        let orphan = self.orphan_replies.borrow_mut().remove(call_id);
        if let Some(reply) = orphan {
            self.settle_from_reply(&promise, &reply);
            return;
        }
        self.pending.borrow_mut().insert(call_id.to_owned(), promise);
    }

    pub(crate) fn take_pending(&self, call_id: &str) -> Option<Promise> {
        self.pending.borrow_mut().remove(call_id)
    }

    /// Defers an emission until the message currently being assembled or
    /// handled has gone out.
    pub(crate) fn queue_post_send(&self, action: Box<dyn FnOnce()>) {
        self.post_send.borrow_mut().push_back(action);
    }

    /// Runs the deferred emissions, unless a message is still being
    /// handled; the handler drains once it unwinds.
    pub(crate) fn drain_post_send(&self) {
        if self.handling_depth.get() > 0 {
            return;
        }
        loop {
            let action = self.post_send.borrow_mut().pop_front();
            match action {
                Some(action) => action(),
                None => break,
            }
        }
    }

    /// Emits a message without waiting, preferring the async transport.
    pub(crate) fn send_message(&self, envelope: WireEnvelope) -> Result<(), RpcError> {
        let channel = self.active_channel();
        let value = envelope.to_value()?;
        channel
            .send_async(value.clone())
            .or_else(|_| channel.send_sync(value).map(|_| ()))
            .map_err(RpcError::from)?;
        self.drain_post_send();
        Ok(())
    }

    /// Emits a call synchronously and validates the reply envelope.
    pub(crate) fn send_sync_message(&self, envelope: WireEnvelope) -> Result<ReplyMessage, RpcError> {
        let channel = self.active_channel();
        if !channel.supports_sync() {
            return Err(RpcError::TransportUnavailable("sync"));
        }
        let raw = channel.send_sync(envelope.to_value()?)?;
        self.drain_post_send();

        if raw.is_null() {
            return Err(ProtocolError::MissingSyncReply.into());
        }
        let reply = WireEnvelope::parse(raw)?;
        match reply.message {
            RpcMessage::FnReply(reply) => Ok(reply),
            other => Err(RpcError::Protocol(format!("unexpected sync reply: {other:?}"))),
        }
    }

    /// Delivers a serialised promise's settlement as an async `fn_reply`
    /// keyed by the promise id.
    pub(crate) fn send_settlement_reply(&self, call_id: &str, result: &Result<Value, RpcError>) {
        let reply = self
            .encode_settlement(tether_proto::CallType::Async, result)
            .with_call_id(call_id);
        let channel = self.active_channel();
        self.send_reply(&channel, reply);
    }

    /// Notifies the origin that a proxy for `obj_id` has been reclaimed.
    ///
    /// Dispatched on the async transport regardless of any call mode,
    /// falling back to sync when async is absent. Failures are swallowed:
    /// finalisation must not unwind.
    pub(crate) fn send_obj_died(&self, obj_id: &str) {
        let envelope = WireEnvelope::new(RpcMessage::ObjDied {
            obj_id: obj_id.to_owned(),
        });
        let Ok(value) = envelope.to_value() else {
            return;
        };
        let sent = self
            .channel
            .send_async(value.clone())
            .or_else(|_| self.channel.send_sync(value).map(|_| ()));
        if let Err(e) = sent {
            debug!(obj_id = %obj_id, error = %e, "obj_died not delivered");
        }
    }

    /// Routes one inbound channel value: marker screening, then dispatch
    /// with the reply channel and raw context installed for the duration.
    pub(crate) fn handle_message(&self, raw: Json, options: ReceiveOptions) {
        if !WireEnvelope::has_marker(&raw) {
            trace!("ignoring unmarked channel message");
            return;
        }
        let envelope = match WireEnvelope::parse(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "dropping malformed message");
                return;
            }
        };

        let previous_reply = self.reply_channel.replace(options.reply_channel);
        let previous_context = self.current_context.replace(options.context);
        self.handling_depth.set(self.handling_depth.get() + 1);

        match envelope.message {
            RpcMessage::GetDescriptors => self.handle_get_descriptors(),
            RpcMessage::Descriptors(batch) => self.handle_descriptors(batch),
            RpcMessage::FnCall(message) => self.handle_call(CallAction::Function, message),
            RpcMessage::CtorCall(message) => self.handle_call(CallAction::Ctor, message),
            RpcMessage::MethodCall(message) => self.handle_call(CallAction::Method, message),
            RpcMessage::PropGet(message) => self.handle_call(CallAction::PropGet, message),
            RpcMessage::PropSet(message) => self.handle_call(CallAction::PropSet, message),
            RpcMessage::FnReply(reply) => self.handle_reply(reply),
            RpcMessage::ObjDied { obj_id } => {
                debug!(obj_id = %obj_id, "peer proxy died");
                self.host.remove(&obj_id);
            }
        }

        self.handling_depth.set(self.handling_depth.get() - 1);
        self.reply_channel.replace(previous_reply);
        self.current_context.replace(previous_context);
        self.drain_post_send();
    }

    fn handle_get_descriptors(&self) {
        let batch = self.local_descriptors();
        let envelope = WireEnvelope::new(RpcMessage::Descriptors(batch));
        let Ok(value) = envelope.to_value() else {
            warn!("descriptor batch failed to serialise");
            return;
        };
        // A pull reply belongs on the originating event when the
        // transport allows it.
        let channel = self.active_channel();
        let sent = channel
            .send_sync(value.clone())
            .map(|_| ())
            .or_else(|_| channel.send_async(value));
        if let Err(e) = sent {
            warn!(error = %e, "descriptor reply not delivered");
        }
    }

    pub(crate) fn handle_descriptors(&self, batch: DescriptorBatch) {
        debug!(
            objects = batch.objects.len(),
            functions = batch.functions.len(),
            classes = batch.classes.len(),
            "remote descriptors received"
        );
        *self.remote.borrow_mut() = batch;
        let pull = self.descriptor_pull.borrow_mut().take();
        if let Some(pull) = pull {
            pull.resolve(Value::from(true));
        }
    }

    fn handle_reply(&self, reply: ReplyMessage) {
        let Some(call_id) = reply.call_id.clone() else {
            warn!("reply without a call id");
            return;
        };
        let Some(promise) = self.take_pending(&call_id) else {
            debug!(call_id = %call_id, "stashing reply for a call not registered yet");
            self.orphan_replies.borrow_mut().insert(call_id, reply);
            return;
        };
        self.settle_from_reply(&promise, &reply);
    }

    fn settle_from_reply(&self, promise: &Promise, reply: &ReplyMessage) {
        if reply.success {
            match codec::deserialize_value(self, &reply.result) {
                Ok(value) => promise.resolve(value),
                Err(e) => promise.reject(e),
            }
        } else {
            promise.reject(RpcError::Remote(reply.error_message()));
        }
    }

    /// Builds the descriptor tables shipped to the peer, snapshotting
    /// readonly property values on the way out.
    pub(crate) fn local_descriptors(&self) -> DescriptorBatch {
        let mut batch = DescriptorBatch::default();
        for (id, entry) in self.host.objects_snapshot() {
            batch
                .objects
                .insert(id, self.shipped_object_descriptor(&entry.target, &entry.descriptor));
        }
        for (id, entry) in self.host.functions_snapshot() {
            batch.functions.insert(id, (*entry.descriptor).clone());
        }
        for (id, entry) in self.host.classes_snapshot() {
            let mut descriptor = (*entry.descriptor).clone();
            if let (Some(statics_descriptor), Some(statics_target)) =
                (descriptor.statics.clone(), entry.statics.as_ref())
            {
                descriptor.statics =
                    Some(self.shipped_object_descriptor(statics_target, &statics_descriptor));
            }
            batch.classes.insert(id, descriptor);
        }
        batch
    }

    /// The descriptor-emission hook: captures the readonly property
    /// snapshot from the live target.
    fn shipped_object_descriptor(
        &self,
        target: &HostObject,
        descriptor: &ObjectDescriptor,
    ) -> ObjectDescriptor {
        let mut shipped = descriptor.clone();
        if shipped.readonly_properties.is_empty() {
            return shipped;
        }
        let mut props = serde_json::Map::new();
        for name in &shipped.readonly_properties {
            let value = match target.get(name) {
                Ok(value) => value,
                Err(e) => {
                    warn!(prop = %name, error = %e, "readonly snapshot failed");
                    continue;
                }
            };
            match codec::serialize_value(self, &value, None) {
                Ok(wire) => {
                    props.insert(name.clone(), wire);
                }
                Err(e) => warn!(prop = %name, error = %e, "readonly snapshot failed"),
            }
        }
        shipped.props = Some(props);
        shipped
    }

    /// Resolves a `hostObject` wire value to the original local target.
    pub(crate) fn resolve_host_value(&self, obj_id: &str) -> Result<Value, RpcError> {
        if let Some(entry) = self.host.object(obj_id) {
            return Ok(Value::Instance(entry.target));
        }
        if let Some(entry) = self.host.function(obj_id) {
            return Ok(Value::Function(entry.target));
        }
        Err(RpcError::UnknownObject(obj_id.to_owned()))
    }

    /// Returns the live function proxy under `obj_id` or materialises
    /// one, preferring the descriptor that governed the value, then the
    /// remote cache.
    pub(crate) fn get_or_create_proxy_function(
        &self,
        obj_id: &str,
        hint: Option<&FunctionDescriptor>,
    ) -> Result<ProxyFunction, RpcError> {
        if let Some(existing) = self.proxies.function(obj_id) {
            return Ok(existing);
        }
        let descriptor = hint
            .cloned()
            .or_else(|| self.remote.borrow().functions.get(obj_id).cloned())
            .unwrap_or_default();
        Ok(self.install_proxy_function(obj_id, Rc::new(descriptor)))
    }

    fn install_proxy_function(&self, obj_id: &str, descriptor: Rc<FunctionDescriptor>) -> ProxyFunction {
        let inner = Rc::new(FunctionProxyInner::new(
            ProxyLifecycle::new(obj_id),
            descriptor,
            self.weak(),
        ));
        self.proxies
            .register_function(&inner, self.obj_died_hook(obj_id));
        ProxyFunction::from_inner(inner)
    }

    /// Returns the live object proxy under `obj_id` or materialises one
    /// from the class's instance descriptor or the remote object cache.
    pub(crate) fn get_or_create_proxy_object(
        &self,
        obj_id: &str,
        class_id: Option<&str>,
        props: Option<&serde_json::Map<String, Json>>,
    ) -> Result<ProxyObject, RpcError> {
        if let Some(existing) = self.proxies.object(obj_id) {
            return Ok(existing);
        }
        let descriptor = {
            let remote = self.remote.borrow();
            class_id
                .and_then(|class_id| remote.classes.get(class_id))
                .and_then(|class| class.instance.clone())
                .or_else(|| remote.objects.get(obj_id).cloned())
                .unwrap_or_default()
        };
        self.install_proxy_object(obj_id, class_id, descriptor, props)
    }

    fn install_proxy_object(
        &self,
        obj_id: &str,
        class_id: Option<&str>,
        descriptor: ObjectDescriptor,
        props: Option<&serde_json::Map<String, Json>>,
    ) -> Result<ProxyObject, RpcError> {
        // The descriptor-borne snapshot first, then the per-instance
        // payload on top.
        let mut snapshot = BTreeMap::new();
        if let Some(shipped) = &descriptor.props {
            for (name, wire) in shipped {
                snapshot.insert(name.clone(), codec::deserialize_value(self, wire)?);
            }
        }
        if let Some(props) = props {
            for (name, wire) in props {
                snapshot.insert(name.clone(), codec::deserialize_value(self, wire)?);
            }
        }

        let inner = Rc::new(ObjectProxyInner::new(
            ProxyLifecycle::new(obj_id),
            class_id.map(str::to_owned),
            Rc::new(descriptor),
            snapshot,
            self.weak(),
        ));
        self.proxies.register_object(&inner, self.obj_died_hook(obj_id));
        Ok(ProxyObject::from_inner(inner))
    }

    fn obj_died_hook(&self, obj_id: &str) -> Box<dyn FnOnce()> {
        let weak = self.weak();
        let obj_id = obj_id.to_owned();
        Box::new(move || {
            if let Some(core) = weak.upgrade() {
                core.send_obj_died(&obj_id);
            }
        })
    }
}

/// One endpoint of the channel: registers host entities, exchanges
/// descriptors and hands out proxies for the peer's entities.
pub struct RpcSession {
    core: Rc<SessionCore>,
}

impl RpcSession {
    /// Binds a session to a channel.
    ///
    /// When the channel can deliver inbound messages the session installs
    /// its receive handler; a send-only channel yields an endpoint that
    /// can originate calls but not accept them.
    pub fn connect(channel: Rc<dyn MessageChannel>, config: SessionConfig) -> Result<Self, RpcError> {
        let core = Rc::new_cyclic(|weak| SessionCore {
            weak_self: weak.clone(),
            channel: channel.clone(),
            config,
            host: HostRegistry::default(),
            proxies: ProxyRegistry::default(),
            proxy_classes: RefCell::new(HashMap::new()),
            remote: RefCell::new(DescriptorBatch::default()),
            pending: RefCell::new(HashMap::new()),
            orphan_replies: RefCell::new(HashMap::new()),
            next_call_id: Cell::new(0),
            descriptor_pull: RefCell::new(None),
            reply_channel: RefCell::new(None),
            current_context: RefCell::new(None),
            post_send: RefCell::new(VecDeque::new()),
            handling_depth: Cell::new(0),
        });

        let weak = Rc::downgrade(&core);
        let receiver: MessageReceiver = Rc::new(move |message, options| {
            if let Some(core) = weak.upgrade() {
                core.handle_message(message, options);
            }
        });
        match channel.bind_receiver(receiver) {
            Ok(()) | Err(ChannelError::ReceiveUnsupported) => {}
            Err(e) => return Err(e.into()),
        }

        Ok(Self { core })
    }

    /// Registers an object target for remote access under `id`.
    pub fn register_host_object(
        &self,
        id: impl Into<String>,
        target: HostObject,
        descriptor: ObjectDescriptor,
    ) {
        self.core.host.insert_object(id, target, Rc::new(descriptor));
    }

    /// Registers a function for remote access under `id`.
    pub fn register_host_function(
        &self,
        id: impl Into<String>,
        target: HostFunction,
        descriptor: FunctionDescriptor,
    ) {
        self.core.host.insert_function(id, target, Rc::new(descriptor));
    }

    /// Registers a class for remote access, stamping `class_id` into its
    /// descriptor. The constructor, when present, is expected to return
    /// an instance value.
    pub fn register_host_class(
        &self,
        class_id: impl Into<String>,
        ctor: Option<HostFunction>,
        statics: Option<HostObject>,
        mut descriptor: ClassDescriptor,
    ) {
        let class_id = class_id.into();
        descriptor.class_id = Some(class_id.clone());
        self.core.host.insert_class(
            class_id,
            ClassEntry {
                ctor,
                statics,
                descriptor: Rc::new(descriptor),
            },
        );
    }

    /// Explicitly takes down a host object registration.
    pub fn deregister_host_object(&self, id: &str) {
        self.core.host.remove(id);
    }

    /// Explicitly takes down a host function registration.
    pub fn deregister_host_function(&self, id: &str) {
        self.core.host.remove(id);
    }

    /// Explicitly takes down a host class registration.
    pub fn deregister_host_class(&self, class_id: &str) {
        self.core.host.remove_class(class_id);
    }

    /// Pushes this endpoint's descriptor tables to the peer.
    pub fn send_descriptors(&self) -> Result<(), RpcError> {
        let batch = self.core.local_descriptors();
        let envelope = WireEnvelope::new(RpcMessage::Descriptors(batch));
        let value = envelope.to_value()?;
        self.core
            .channel
            .send_async(value.clone())
            .or_else(|_| self.core.channel.send_sync(value).map(|_| ()))
            .map_err(RpcError::from)
    }

    /// Pulls the peer's descriptor tables.
    ///
    /// Prefers the synchronous transport, resolving the returned promise
    /// on the spot; otherwise the promise resolves when the async
    /// `descriptors` reply arrives.
    pub fn request_descriptors(&self) -> Result<Promise, RpcError> {
        let envelope = WireEnvelope::new(RpcMessage::GetDescriptors);
        if self.core.channel.supports_sync() {
            let raw = self.core.channel.send_sync(envelope.to_value()?)?;
            if raw.is_null() {
                return Err(ProtocolError::MissingSyncReply.into());
            }
            let reply = WireEnvelope::parse(raw)?;
            match reply.message {
                RpcMessage::Descriptors(batch) => {
                    self.core.handle_descriptors(batch);
                    Ok(Promise::resolved(Value::from(true)))
                }
                other => Err(RpcError::Protocol(format!(
                    "unexpected descriptor reply: {other:?}"
                ))),
            }
        } else if self.core.channel.supports_async() {
            let promise = Promise::pending();
            *self.core.descriptor_pull.borrow_mut() = Some(promise.clone());
            self.core.channel.send_async(envelope.to_value()?)?;
            Ok(promise)
        } else {
            Err(RpcError::TransportUnavailable("send"))
        }
    }

    /// The proxy for the peer's host object under `id`, materialised
    /// from the remote descriptor cache on first use.
    pub fn get_proxy_object(&self, id: &str) -> Result<ProxyObject, RpcError> {
        if let Some(existing) = self.core.proxies.object(id) {
            return Ok(existing);
        }
        let descriptor = self
            .core
            .remote
            .borrow()
            .objects
            .get(id)
            .cloned()
            .ok_or_else(|| RpcError::UnknownObject(id.to_owned()))?;
        self.core.install_proxy_object(id, None, descriptor, None)
    }

    /// The proxy for the peer's host function under `id`.
    pub fn get_proxy_function(&self, id: &str) -> Result<ProxyFunction, RpcError> {
        if let Some(existing) = self.core.proxies.function(id) {
            return Ok(existing);
        }
        let descriptor = self
            .core
            .remote
            .borrow()
            .functions
            .get(id)
            .cloned()
            .ok_or_else(|| RpcError::UnknownFunction(id.to_owned()))?;
        Ok(self.core.install_proxy_function(id, Rc::new(descriptor)))
    }

    /// The synthesised constructor for the peer's class under `id`,
    /// cached strongly per class id.
    pub fn get_proxy_class(&self, class_id: &str) -> Result<ProxyClass, RpcError> {
        if let Some(existing) = self.core.proxy_classes.borrow().get(class_id) {
            return Ok(existing.clone());
        }
        let descriptor = self
            .core
            .remote
            .borrow()
            .classes
            .get(class_id)
            .cloned()
            .ok_or_else(|| RpcError::UnknownClass(class_id.to_owned()))?;
        let proxy = ProxyClass::new(class_id, Rc::new(descriptor), self.core.weak());
        self.core
            .proxy_classes
            .borrow_mut()
            .insert(class_id.to_owned(), proxy.clone());
        Ok(proxy)
    }

    /// The raw transport event of the message currently being handled,
    /// for host code that needs the originating context.
    #[must_use]
    pub fn current_context(&self) -> Option<Rc<dyn Any>> {
        self.core.current_context.borrow().clone()
    }

    #[cfg(test)]
    pub(crate) fn core_for_tests(&self) -> Rc<SessionCore> {
        self.core.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::channel::MemoryChannel;
    use crate::object::DynObject;

    fn pair() -> (RpcSession, RpcSession) {
        let (a, b) = MemoryChannel::pair();
        let host = RpcSession::connect(Rc::new(a), SessionConfig::default()).unwrap();
        let client = RpcSession::connect(Rc::new(b), SessionConfig::default()).unwrap();
        (host, client)
    }

    #[test]
    fn unmarked_traffic_is_ignored() {
        let (host, _client) = pair();
        let core = host.core_for_tests();

        // Stray traffic must not disturb the session.
        core.handle_message(json!({ "hello": "world" }), ReceiveOptions::default());
        core.handle_message(json!(17), ReceiveOptions::default());
        core.handle_message(
            json!({ "rpc_marker": "srpc", "action": "not_an_action" }),
            ReceiveOptions::default(),
        );
    }

    #[test]
    fn descriptor_pull_populates_the_remote_cache() {
        let (host, client) = pair();
        host.register_host_function(
            "ping",
            HostFunction::new(|_| Ok(Value::from("pong"))),
            FunctionDescriptor::named("ping"),
        );
        host.register_host_object(
            "state",
            Rc::new(DynObject::new()),
            ObjectDescriptor::new(),
        );

        let pull = client.request_descriptors().unwrap();
        assert!(pull.is_settled());
        assert!(client.get_proxy_function("ping").is_ok());
        assert!(client.get_proxy_object("state").is_ok());
        assert!(matches!(
            client.get_proxy_function("absent"),
            Err(RpcError::UnknownFunction(_))
        ));
    }

    #[test]
    fn descriptor_push_populates_the_remote_cache() {
        let (host, client) = pair();
        host.register_host_function(
            "ping",
            HostFunction::new(|_| Ok(Value::from("pong"))),
            FunctionDescriptor::named("ping"),
        );

        host.send_descriptors().unwrap();
        assert!(client.get_proxy_function("ping").is_ok());
    }

    #[test]
    fn correlation_ids_are_monotonic() {
        let (host, _client) = pair();
        let core = host.core_for_tests();
        assert_eq!(core.next_call_id(), "1");
        assert_eq!(core.next_call_id(), "2");
        assert_eq!(core.next_call_id(), "3");
    }

    #[test]
    fn lookups_return_the_same_proxy_instance() {
        let (host, client) = pair();
        host.register_host_object("state", Rc::new(DynObject::new()), ObjectDescriptor::new());
        client.request_descriptors().unwrap();

        let first = client.get_proxy_object("state").unwrap();
        let second = client.get_proxy_object("state").unwrap();
        assert!(first.ptr_eq(&second));
    }

    #[test]
    fn current_context_is_exposed_during_dispatch() {
        let (a, b) = MemoryChannel::pair();
        let host_channel = Rc::new(a);
        host_channel.set_context(Rc::new("event-7".to_owned()));

        let host = Rc::new(RpcSession::connect(host_channel, SessionConfig::default()).unwrap());
        let client = RpcSession::connect(Rc::new(b), SessionConfig::default()).unwrap();

        let seen = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        let reader = host.clone();
        host.register_host_function(
            "probe",
            HostFunction::new(move |_| {
                let tag = reader
                    .current_context()
                    .and_then(|context| context.downcast_ref::<String>().cloned());
                *sink.borrow_mut() = tag;
                Ok(Value::null())
            }),
            FunctionDescriptor::named("probe").with_returns(tether_proto::ReturnKind::Sync),
        );
        client.request_descriptors().unwrap();

        let probe = client.get_proxy_function("probe").unwrap();
        probe.invoke(vec![]).unwrap();
        assert_eq!(seen.borrow().as_deref(), Some("event-7"));

        // Outside dispatch the slot is empty again.
        assert!(host.current_context().is_none());
    }

    #[test]
    fn obj_died_drops_the_host_entry() {
        let (host, client) = pair();
        host.register_host_function(
            "ping",
            HostFunction::new(|_| Ok(Value::from("pong"))),
            FunctionDescriptor::named("ping"),
        );
        client.request_descriptors().unwrap();

        let proxy = client.get_proxy_function("ping").unwrap();
        drop(proxy);

        assert!(host.core_for_tests().host.function("ping").is_none());
    }
}
