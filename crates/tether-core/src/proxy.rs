//! Proxy-side call engine: synthesised callables for remote entities.
//!
//! A proxy never holds a pointer to the remote target, only its id. Every
//! callable carries the descriptor it was synthesised from; the effective
//! call mode starts from the declared return behaviour and degrades to
//! whatever transport the channel offers. A disposed proxy fails every
//! further invocation with the fixed disposed error.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use tether_proto::{
    resolve_function, CallMessage, CallType, ClassDescriptor, EventAction, FunctionDescriptor,
    ObjectDescriptor, ReturnKind, RpcMessage, WireEnvelope,
};

use crate::codec;
use crate::error::RpcError;
use crate::promise::Promise;
use crate::proxies::ProxyLifecycle;
use crate::session::SessionCore;
use crate::value::Value;

/// Which call message an operation emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallAction {
    Function,
    Ctor,
    Method,
    PropGet,
    PropSet,
}

impl CallAction {
    fn into_message(self, body: CallMessage) -> RpcMessage {
        match self {
            Self::Function => RpcMessage::FnCall(body),
            Self::Ctor => RpcMessage::CtorCall(body),
            Self::Method => RpcMessage::MethodCall(body),
            Self::PropGet => RpcMessage::PropGet(body),
            Self::PropSet => RpcMessage::PropSet(body),
        }
    }
}

/// The disposed error, shaped for the declared call mode: raised for
/// void/sync callables, rejected for async ones.
fn disposed_outcome(declared: ReturnKind) -> Result<Value, RpcError> {
    match declared {
        ReturnKind::Async => Ok(Value::Promise(Promise::rejected(RpcError::Disposed))),
        _ => Err(RpcError::Disposed),
    }
}

impl SessionCore {
    /// Emits one call with the negotiated mode and shapes the outcome:
    /// nothing for void, the deserialised reply for sync, a parked
    /// promise for async.
    pub(crate) fn call_remote(
        &self,
        action: CallAction,
        obj_id: &str,
        prop: Option<&str>,
        descriptor: &FunctionDescriptor,
        declared: ReturnKind,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let mode = self.effective_mode(action, declared)?;
        let wire_args = codec::serialize_args(self, &args, descriptor)?;

        let mut body = CallMessage::new(mode, obj_id, wire_args);
        if let Some(prop) = prop {
            body = body.with_prop(prop);
        }

        match mode {
            CallType::Void => {
                self.send_message(WireEnvelope::new(action.into_message(body)))?;
                Ok(Value::null())
            }
            CallType::Sync => {
                let reply = self.send_sync_message(WireEnvelope::new(action.into_message(body)))?;
                if reply.success {
                    codec::deserialize_value(self, &reply.result)
                } else {
                    Err(RpcError::Remote(reply.error_message()))
                }
            }
            CallType::Async => {
                let call_id = self.next_call_id();
                let promise = Promise::pending();
                self.register_pending(&call_id, promise.clone());

                let envelope = WireEnvelope::new(action.into_message(body.with_call_id(&call_id)));
                if let Err(e) = self.send_message(envelope) {
                    self.take_pending(&call_id);
                    return Err(e);
                }
                Ok(Value::Promise(promise))
            }
        }
    }

    /// Applies the call-mode degradation rules against the active
    /// channel's capabilities. `void` is never remapped; a setter may
    /// never go async, so a sync setter without a sync transport falls to
    /// void instead.
    fn effective_mode(&self, action: CallAction, declared: ReturnKind) -> Result<CallType, RpcError> {
        let channel = self.active_channel();
        let has_sync = channel.supports_sync();
        let has_async = channel.supports_async();

        match declared {
            ReturnKind::Void => Ok(CallType::Void),
            ReturnKind::Sync if has_sync => Ok(CallType::Sync),
            ReturnKind::Sync => match action {
                CallAction::PropSet => Ok(CallType::Void),
                _ if has_async => Ok(CallType::Async),
                _ => Err(RpcError::TransportUnavailable("sync")),
            },
            ReturnKind::Async if has_async => Ok(CallType::Async),
            ReturnKind::Async if has_sync => Ok(CallType::Sync),
            ReturnKind::Async => Err(RpcError::TransportUnavailable("async")),
        }
    }
}

pub(crate) struct FunctionProxyInner {
    lifecycle: ProxyLifecycle,
    descriptor: Rc<FunctionDescriptor>,
    session: Weak<SessionCore>,
}

impl FunctionProxyInner {
    pub(crate) fn new(
        lifecycle: ProxyLifecycle,
        descriptor: Rc<FunctionDescriptor>,
        session: Weak<SessionCore>,
    ) -> Self {
        Self {
            lifecycle,
            descriptor,
            session,
        }
    }

    pub(crate) fn lifecycle(&self) -> &ProxyLifecycle {
        &self.lifecycle
    }
}

impl Drop for FunctionProxyInner {
    fn drop(&mut self) {
        self.lifecycle.dispose();
    }
}

/// A stand-in for a function hosted on the peer.
///
/// Clones share identity; the last clone to go away finalises the proxy
/// and notifies the origin with `obj_died`.
#[derive(Clone)]
pub struct ProxyFunction {
    inner: Rc<FunctionProxyInner>,
}

impl ProxyFunction {
    pub(crate) fn from_inner(inner: Rc<FunctionProxyInner>) -> Self {
        Self { inner }
    }

    /// The host function id on the origin endpoint.
    #[must_use]
    pub fn id(&self) -> &str {
        self.inner.lifecycle.id()
    }

    /// Invokes the remote function.
    ///
    /// Void callables return null, sync callables the deserialised
    /// result, async callables a [`Value::Promise`].
    pub fn invoke(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        let declared = self.inner.descriptor.returns;
        if self.inner.lifecycle.is_disposed() {
            return disposed_outcome(declared);
        }
        let Some(session) = self.inner.session.upgrade() else {
            return disposed_outcome(declared);
        };
        session.call_remote(
            CallAction::Function,
            self.id(),
            None,
            &self.inner.descriptor,
            declared,
            args,
        )
    }

    /// Disposes the proxy: further invocations fail and the origin is
    /// notified. Idempotent, and interchangeable with drop-driven
    /// finalisation.
    pub fn dispose(&self) {
        self.inner.lifecycle.dispose();
    }

    /// Whether the proxy has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.lifecycle.is_disposed()
    }

    /// Whether two handles are the same proxy.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

pub(crate) struct ObjectProxyInner {
    lifecycle: ProxyLifecycle,
    class_id: Option<String>,
    descriptor: Rc<ObjectDescriptor>,
    props: RefCell<BTreeMap<String, Value>>,
    session: Weak<SessionCore>,
}

impl ObjectProxyInner {
    pub(crate) fn new(
        lifecycle: ProxyLifecycle,
        class_id: Option<String>,
        descriptor: Rc<ObjectDescriptor>,
        props: BTreeMap<String, Value>,
        session: Weak<SessionCore>,
    ) -> Self {
        Self {
            lifecycle,
            class_id,
            descriptor,
            props: RefCell::new(props),
            session,
        }
    }

    pub(crate) fn lifecycle(&self) -> &ProxyLifecycle {
        &self.lifecycle
    }
}

impl Drop for ObjectProxyInner {
    fn drop(&mut self) {
        self.lifecycle.dispose();
    }
}

/// A stand-in for an object hosted on the peer.
///
/// Members are bound at creation: every operation captures this
/// instance's id, so methods synthesised from a class descriptor resolve
/// their receiver without a prototype chain.
#[derive(Clone)]
pub struct ProxyObject {
    inner: Rc<ObjectProxyInner>,
}

impl ProxyObject {
    pub(crate) fn from_inner(inner: Rc<ObjectProxyInner>) -> Self {
        Self { inner }
    }

    /// The host object id on the origin endpoint.
    #[must_use]
    pub fn id(&self) -> &str {
        self.inner.lifecycle.id()
    }

    /// The class this proxy is an instance of, when any.
    #[must_use]
    pub fn class_id(&self) -> Option<&str> {
        self.inner.class_id.as_deref()
    }

    fn session(&self) -> Result<Rc<SessionCore>, RpcError> {
        self.inner.session.upgrade().ok_or(RpcError::Disposed)
    }

    /// Reads a property: readonly properties from the local snapshot,
    /// proxied properties through the wire. An async-graded getter yields
    /// a [`Value::Promise`].
    pub fn get(&self, prop: &str) -> Result<Value, RpcError> {
        if self.inner.lifecycle.is_disposed() {
            return Err(RpcError::Disposed);
        }
        if let Some(value) = self.inner.props.borrow().get(prop) {
            return Ok(value.clone());
        }

        let property = self
            .inner
            .descriptor
            .property(prop)
            .cloned()
            .ok_or_else(|| RpcError::UnknownProperty(prop.to_owned()))?;
        let getter = property
            .get
            .unwrap_or_else(|| FunctionDescriptor::default().with_returns(ReturnKind::Sync));
        let declared = match getter.returns {
            ReturnKind::Void => ReturnKind::Sync,
            declared => declared,
        };

        self.session()?
            .call_remote(CallAction::PropGet, self.id(), Some(prop), &getter, declared, vec![])
    }

    /// Writes a proxied property.
    pub fn set(&self, prop: &str, value: Value) -> Result<(), RpcError> {
        if self.inner.lifecycle.is_disposed() {
            return Err(RpcError::Disposed);
        }

        let property = self
            .inner
            .descriptor
            .property(prop)
            .cloned()
            .ok_or_else(|| RpcError::UnknownProperty(prop.to_owned()))?;
        if property.get_only {
            return Err(RpcError::ReadonlyProperty(prop.to_owned()));
        }

        let setter = property
            .set
            .unwrap_or_else(|| FunctionDescriptor::default().with_returns(ReturnKind::Void));
        let declared = match setter.returns {
            // A setter may never be async on the wire.
            ReturnKind::Async => ReturnKind::Sync,
            declared => declared,
        };

        self.session()?
            .call_remote(
                CallAction::PropSet,
                self.id(),
                Some(prop),
                &setter,
                declared,
                vec![value],
            )
            .map(|_| ())
    }

    /// Invokes a member. The function descriptor is resolved by name,
    /// falling back to a bare descriptor with the default (async) return
    /// behaviour.
    pub fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let descriptor = resolve_function(Some(&self.inner.descriptor), method);
        let declared = descriptor.returns;
        if self.inner.lifecycle.is_disposed() {
            return disposed_outcome(declared);
        }
        self.session()?.call_remote(
            CallAction::Method,
            self.id(),
            Some(method),
            &descriptor,
            declared,
            args,
        )
    }

    /// Registers a listener for `event` on the remote object, emitting an
    /// `add_<event>` method call.
    pub fn add_event_listener(&self, event: &str, listener: Value) -> Result<(), RpcError> {
        self.event_call(EventAction::Add, event, listener)
    }

    /// Removes a previously registered listener, emitting a
    /// `remove_<event>` method call. The listener value must be the same
    /// callable that was registered.
    pub fn remove_event_listener(&self, event: &str, listener: Value) -> Result<(), RpcError> {
        self.event_call(EventAction::Remove, event, listener)
    }

    fn event_call(&self, action: EventAction, event: &str, listener: Value) -> Result<(), RpcError> {
        if self.inner.lifecycle.is_disposed() {
            return Err(RpcError::Disposed);
        }
        let descriptor = self
            .inner
            .descriptor
            .event(event)
            .cloned()
            .unwrap_or_else(|| FunctionDescriptor::named(event));
        self.session()?
            .call_remote(
                CallAction::Method,
                self.id(),
                Some(&action.method_name(event)),
                &descriptor,
                ReturnKind::Void,
                vec![listener],
            )
            .map(|_| ())
    }

    /// Disposes the proxy: further operations fail and the origin is
    /// notified. Idempotent, and interchangeable with drop-driven
    /// finalisation.
    pub fn dispose(&self) {
        self.inner.lifecycle.dispose();
    }

    /// Whether the proxy has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.lifecycle.is_disposed()
    }

    /// Whether two handles are the same proxy.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

struct ClassProxyInner {
    class_id: String,
    descriptor: Rc<ClassDescriptor>,
    session: Weak<SessionCore>,
}

/// A synthesised constructor for a class hosted on the peer, decorated
/// with its static members.
///
/// Class proxies are cached strongly per class id; they carry no
/// lifecycle of their own.
#[derive(Clone)]
pub struct ProxyClass {
    inner: Rc<ClassProxyInner>,
}

impl ProxyClass {
    pub(crate) fn new(
        class_id: impl Into<String>,
        descriptor: Rc<ClassDescriptor>,
        session: Weak<SessionCore>,
    ) -> Self {
        Self {
            inner: Rc::new(ClassProxyInner {
                class_id: class_id.into(),
                descriptor,
                session,
            }),
        }
    }

    /// The class id on the origin endpoint.
    #[must_use]
    pub fn class_id(&self) -> &str {
        &self.inner.class_id
    }

    fn session(&self) -> Result<Rc<SessionCore>, RpcError> {
        self.inner.session.upgrade().ok_or(RpcError::Disposed)
    }

    /// Constructs a remote instance. Fails immediately when the class
    /// exposes no constructor.
    pub fn construct(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        let ctor = self
            .inner
            .descriptor
            .ctor
            .clone()
            .ok_or_else(|| RpcError::NoConstructor(self.inner.class_id.clone()))?;
        let declared = match ctor.returns {
            // A constructor always produces a value.
            ReturnKind::Void => ReturnKind::Sync,
            declared => declared,
        };
        self.session()?.call_remote(
            CallAction::Ctor,
            &self.inner.class_id,
            None,
            &ctor,
            declared,
            args,
        )
    }

    /// Invokes a static member.
    pub fn call_static(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        let descriptor = resolve_function(self.inner.descriptor.statics.as_ref(), method);
        let declared = descriptor.returns;
        self.session()?.call_remote(
            CallAction::Method,
            &self.inner.class_id,
            Some(method),
            &descriptor,
            declared,
            args,
        )
    }

    /// Reads a static property: snapshotted statics from the descriptor,
    /// proxied statics through the wire.
    pub fn get_static(&self, prop: &str) -> Result<Value, RpcError> {
        let statics = self.inner.descriptor.statics.clone().unwrap_or_default();
        if let Some(snapshot) = statics.props.as_ref().and_then(|p| p.get(prop)) {
            return codec::deserialize_value(&*self.session()?, snapshot);
        }

        let property = statics
            .property(prop)
            .cloned()
            .ok_or_else(|| RpcError::UnknownProperty(prop.to_owned()))?;
        let getter = property
            .get
            .unwrap_or_else(|| FunctionDescriptor::default().with_returns(ReturnKind::Sync));
        let declared = match getter.returns {
            ReturnKind::Void => ReturnKind::Sync,
            declared => declared,
        };
        self.session()?.call_remote(
            CallAction::PropGet,
            &self.inner.class_id,
            Some(prop),
            &getter,
            declared,
            vec![],
        )
    }

    /// Writes a proxied static property.
    pub fn set_static(&self, prop: &str, value: Value) -> Result<(), RpcError> {
        let statics = self.inner.descriptor.statics.clone().unwrap_or_default();
        let property = statics
            .property(prop)
            .cloned()
            .ok_or_else(|| RpcError::UnknownProperty(prop.to_owned()))?;
        if property.get_only {
            return Err(RpcError::ReadonlyProperty(prop.to_owned()));
        }
        let setter = property
            .set
            .unwrap_or_else(|| FunctionDescriptor::default().with_returns(ReturnKind::Void));
        let declared = match setter.returns {
            ReturnKind::Async => ReturnKind::Sync,
            declared => declared,
        };
        self.session()?
            .call_remote(
                CallAction::PropSet,
                &self.inner.class_id,
                Some(prop),
                &setter,
                declared,
                vec![value],
            )
            .map(|_| ())
    }
}
