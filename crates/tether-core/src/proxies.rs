//! The weak proxy registry.
//!
//! Proxies are tracked by id through weak references so that the registry
//! never keeps a proxy alive. When the last strong handle goes away the
//! proxy's lifecycle fires: the entry is removed and the dispose hook runs,
//! which is how the origin endpoint learns it may drop its host entry.
//! Explicit disposal and reclamation-driven finalisation share one
//! idempotent path.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use tracing::debug;

use crate::proxy::{FunctionProxyInner, ObjectProxyInner, ProxyFunction, ProxyObject};

type EntryMap = RefCell<HashMap<String, ProxyEntry>>;

pub(crate) enum ProxyEntry {
    Object(Weak<ObjectProxyInner>),
    Function(Weak<FunctionProxyInner>),
}

struct DisposeHooks {
    entries: Weak<EntryMap>,
    on_dispose: Box<dyn FnOnce()>,
}

/// Shared lifecycle state of one proxy.
///
/// Carries the disposed flag and the hooks installed at registration.
pub(crate) struct ProxyLifecycle {
    id: String,
    disposed: Cell<bool>,
    hooks: RefCell<Option<DisposeHooks>>,
}

impl ProxyLifecycle {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            disposed: Cell::new(false),
            hooks: RefCell::new(None),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    fn attach(&self, entries: Weak<EntryMap>, on_dispose: Box<dyn FnOnce()>) {
        *self.hooks.borrow_mut() = Some(DisposeHooks { entries, on_dispose });
    }

    /// Flips the disposed flag, removes the registry entry and runs the
    /// dispose hook. Safe to call any number of times from explicit
    /// disposal and from `Drop`; only the first call acts.
    pub(crate) fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        let hooks = self.hooks.borrow_mut().take();
        if let Some(hooks) = hooks {
            if let Some(entries) = hooks.entries.upgrade() {
                entries.borrow_mut().remove(&self.id);
            }
            debug!(obj_id = %self.id, "proxy disposed");
            (hooks.on_dispose)();
        }
    }
}

/// Weak-valued map from id to live proxy.
#[derive(Default)]
pub(crate) struct ProxyRegistry {
    entries: Rc<EntryMap>,
}

impl ProxyRegistry {
    /// Installs an object proxy and its dispose hook.
    pub(crate) fn register_object(&self, inner: &Rc<ObjectProxyInner>, on_dispose: Box<dyn FnOnce()>) {
        inner
            .lifecycle()
            .attach(Rc::downgrade(&self.entries), on_dispose);
        self.entries.borrow_mut().insert(
            inner.lifecycle().id().to_owned(),
            ProxyEntry::Object(Rc::downgrade(inner)),
        );
    }

    /// Installs a function proxy and its dispose hook.
    pub(crate) fn register_function(
        &self,
        inner: &Rc<FunctionProxyInner>,
        on_dispose: Box<dyn FnOnce()>,
    ) {
        inner
            .lifecycle()
            .attach(Rc::downgrade(&self.entries), on_dispose);
        self.entries.borrow_mut().insert(
            inner.lifecycle().id().to_owned(),
            ProxyEntry::Function(Rc::downgrade(inner)),
        );
    }

    /// Retrieves the live object proxy under `id`, pruning a dead entry.
    pub(crate) fn object(&self, id: &str) -> Option<ProxyObject> {
        let upgraded = match self.entries.borrow().get(id) {
            Some(ProxyEntry::Object(weak)) => Some(weak.upgrade()),
            _ => return None,
        };
        match upgraded {
            Some(Some(inner)) => Some(ProxyObject::from_inner(inner)),
            _ => {
                self.entries.borrow_mut().remove(id);
                None
            }
        }
    }

    /// Retrieves the live function proxy under `id`, pruning a dead entry.
    pub(crate) fn function(&self, id: &str) -> Option<ProxyFunction> {
        let upgraded = match self.entries.borrow().get(id) {
            Some(ProxyEntry::Function(weak)) => Some(weak.upgrade()),
            _ => return None,
        };
        match upgraded {
            Some(Some(inner)) => Some(ProxyFunction::from_inner(inner)),
            _ => {
                self.entries.borrow_mut().remove(id);
                None
            }
        }
    }

    /// Whether a live proxy is registered under `id`.
    pub(crate) fn contains(&self, id: &str) -> bool {
        match self.entries.borrow().get(id) {
            Some(ProxyEntry::Object(weak)) => weak.upgrade().is_some(),
            Some(ProxyEntry::Function(weak)) => weak.upgrade().is_some(),
            None => false,
        }
    }

    /// Explicitly removes an entry without disposing the proxy.
    #[allow(dead_code)]
    pub(crate) fn remove(&self, id: &str) {
        self.entries.borrow_mut().remove(id);
    }
}
