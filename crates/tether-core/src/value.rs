//! The dynamic value model the codec operates on.
//!
//! Everything crossing the boundary is a [`Value`]: a JSON scalar, a plain
//! container walked recursively, a local callable or object target, a
//! deferred, or a proxy standing in for an entity on the peer. The codec
//! folds this union into the tagged wire forms of `tether-proto` and back.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::error::RpcError;
use crate::promise::Promise;
use crate::proxy::{ProxyFunction, ProxyObject};

/// A local callable exposed to, or received from, the peer.
///
/// Cheap to clone; identity follows the underlying allocation, which makes
/// re-serialisation of the same function idempotent.
#[derive(Clone)]
pub struct HostFunction {
    f: Rc<dyn Fn(Vec<Value>) -> Result<Value, RpcError>>,
}

impl HostFunction {
    /// Wraps a closure as a host function.
    pub fn new(f: impl Fn(Vec<Value>) -> Result<Value, RpcError> + 'static) -> Self {
        Self { f: Rc::new(f) }
    }

    /// Invokes the function.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        (self.f)(args)
    }

    /// Checks whether two handles reference the same function.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.f, &other.f)
    }

    /// Address of the underlying allocation, used as the identity stamp.
    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.f) as *const () as usize
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HostFunction({:#x})", self.addr())
    }
}

/// The dynamic-object seam a host target implements.
///
/// The call engine drives targets exclusively through this trait:
/// `prop_get`/`prop_set` land on [`get`](Self::get)/[`set`](Self::set) and
/// `method_call` on [`call`](Self::call). Event registration arrives as
/// `addEventListener(event, listener)` / `removeEventListener(event,
/// listener)` calls after the engine rewrites the wire's `add_<event>` /
/// `remove_<event>` pair.
pub trait RpcTarget {
    /// Reads a property.
    fn get(&self, prop: &str) -> Result<Value, RpcError>;

    /// Writes a property.
    fn set(&self, prop: &str, value: Value) -> Result<(), RpcError>;

    /// Invokes a member.
    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError>;

    /// The id of the registered class this target is an instance of, if
    /// any. Drives the `classId` stamped on the wire.
    fn class_id(&self) -> Option<String> {
        None
    }
}

/// A local object target.
pub type HostObject = Rc<dyn RpcTarget>;

/// Identity stamp for a host object.
pub(crate) fn object_addr(target: &HostObject) -> usize {
    Rc::as_ptr(target) as *const () as usize
}

/// A value crossing the endpoint boundary.
#[derive(Clone)]
pub enum Value {
    /// A JSON scalar: null, boolean, number or string.
    Scalar(serde_json::Value),

    /// An array, walked element by element.
    Array(Vec<Value>),

    /// A plain object, walked key by key.
    Map(BTreeMap<String, Value>),

    /// A local callable.
    Function(HostFunction),

    /// A deferred value.
    Promise(Promise),

    /// A local object target.
    Instance(HostObject),

    /// A stand-in for a function hosted on the peer.
    ProxyFunction(ProxyFunction),

    /// A stand-in for an object hosted on the peer.
    ProxyObject(ProxyObject),
}

impl Value {
    /// The null scalar.
    #[must_use]
    pub fn null() -> Self {
        Self::Scalar(serde_json::Value::Null)
    }

    /// Wraps a string.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::Scalar(serde_json::Value::String(s.into()))
    }

    /// Whether this is the null scalar.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(serde_json::Value::Null))
    }

    /// Reads the value as a string slice.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(v) => v.as_str(),
            _ => None,
        }
    }

    /// Reads the value as a signed integer.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Scalar(v) => v.as_i64(),
            _ => None,
        }
    }

    /// Reads the value as a float.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Scalar(v) => v.as_f64(),
            _ => None,
        }
    }

    /// Reads the value as a boolean.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Scalar(v) => v.as_bool(),
            _ => None,
        }
    }

    /// Invokes a callable value, local or proxied.
    pub fn call(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        match self {
            Self::Function(f) => f.call(args),
            Self::ProxyFunction(p) => p.invoke(args),
            _ => Err(RpcError::NotAFunction("value".to_owned())),
        }
    }

    /// Checks whether two values are the same callable.
    ///
    /// Local functions compare by allocation, proxy functions by proxy
    /// identity. Used to match a listener on removal.
    #[must_use]
    pub fn same_function(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::ProxyFunction(a), Self::ProxyFunction(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Scalar(serde_json::Value::Bool(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Scalar(serde_json::Value::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Scalar(serde_json::Value::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::string(v)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "Scalar({v})"),
            Self::Array(items) => f.debug_tuple("Array").field(items).finish(),
            Self::Map(map) => f.debug_tuple("Map").field(map).finish(),
            Self::Function(func) => fmt::Debug::fmt(func, f),
            Self::Promise(p) => fmt::Debug::fmt(p, f),
            Self::Instance(target) => {
                write!(f, "Instance({:#x})", Rc::as_ptr(target) as *const () as usize)
            }
            Self::ProxyFunction(p) => write!(f, "ProxyFunction({})", p.id()),
            Self::ProxyObject(p) => write!(f, "ProxyObject({})", p.id()),
        }
    }
}
