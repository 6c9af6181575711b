//! Host-side registries: the entities this endpoint exposes to its peer.
//!
//! Entries stay alive as long as the peer may reference them; they are
//! removed only on explicit takedown or on receipt of `obj_died` for
//! their id. Targets are stamped with their id on first registration so
//! re-serialisation resolves to the same entry.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use tracing::debug;

use tether_proto::{ClassDescriptor, FunctionDescriptor, ObjectDescriptor};

use crate::value::{object_addr, HostFunction, HostObject};

/// A registered host object.
#[derive(Clone)]
pub struct ObjectEntry {
    /// The local target the peer's calls land on.
    pub target: HostObject,
    /// What the peer may touch on it.
    pub descriptor: Rc<ObjectDescriptor>,
}

/// A registered host function.
#[derive(Clone)]
pub struct FunctionEntry {
    /// The local callable.
    pub target: HostFunction,
    /// Its calling convention.
    pub descriptor: Rc<FunctionDescriptor>,
}

/// A registered host class: constructor, statics and the descriptor
/// governing both plus instances.
#[derive(Clone)]
pub struct ClassEntry {
    /// Constructor, expected to return an instance value.
    pub ctor: Option<HostFunction>,
    /// Target for static member calls, addressed by the class id.
    pub statics: Option<HostObject>,
    /// The full class descriptor, `class_id` stamped.
    pub descriptor: Rc<ClassDescriptor>,
}

/// Registries for host objects, functions and classes, plus the reverse
/// identity stamps.
#[derive(Default)]
pub struct HostRegistry {
    objects: RefCell<HashMap<String, ObjectEntry>>,
    functions: RefCell<HashMap<String, FunctionEntry>>,
    classes: RefCell<HashMap<String, ClassEntry>>,
    ids_by_addr: RefCell<HashMap<usize, String>>,
}

impl HostRegistry {
    /// Registers an object target under `id`.
    pub fn insert_object(&self, id: impl Into<String>, target: HostObject, descriptor: Rc<ObjectDescriptor>) {
        let id = id.into();
        debug!(obj_id = %id, "host object registered");
        self.ids_by_addr.borrow_mut().insert(object_addr(&target), id.clone());
        self.objects.borrow_mut().insert(id, ObjectEntry { target, descriptor });
    }

    /// Registers a function under `id`.
    pub fn insert_function(
        &self,
        id: impl Into<String>,
        target: HostFunction,
        descriptor: Rc<FunctionDescriptor>,
    ) {
        let id = id.into();
        debug!(obj_id = %id, "host function registered");
        self.ids_by_addr.borrow_mut().insert(target.addr(), id.clone());
        self.functions.borrow_mut().insert(id, FunctionEntry { target, descriptor });
    }

    /// Registers a class under its class id.
    pub fn insert_class(&self, id: impl Into<String>, entry: ClassEntry) {
        let id = id.into();
        debug!(class_id = %id, "host class registered");
        self.classes.borrow_mut().insert(id, entry);
    }

    /// Looks up an object entry.
    #[must_use]
    pub fn object(&self, id: &str) -> Option<ObjectEntry> {
        self.objects.borrow().get(id).cloned()
    }

    /// Looks up a function entry.
    #[must_use]
    pub fn function(&self, id: &str) -> Option<FunctionEntry> {
        self.functions.borrow().get(id).cloned()
    }

    /// Looks up a class entry.
    #[must_use]
    pub fn class(&self, id: &str) -> Option<ClassEntry> {
        self.classes.borrow().get(id).cloned()
    }

    /// The stamped id of an already-registered object target.
    #[must_use]
    pub fn id_for_object(&self, target: &HostObject) -> Option<String> {
        self.ids_by_addr.borrow().get(&object_addr(target)).cloned()
    }

    /// The stamped id of an already-registered function.
    #[must_use]
    pub fn id_for_function(&self, target: &HostFunction) -> Option<String> {
        self.ids_by_addr.borrow().get(&target.addr()).cloned()
    }

    /// Removes the object or function entry under `id`, together with its
    /// identity stamp. Used by explicit takedown and `obj_died`.
    pub fn remove(&self, id: &str) {
        if let Some(entry) = self.objects.borrow_mut().remove(id) {
            debug!(obj_id = %id, "host object removed");
            self.ids_by_addr.borrow_mut().remove(&object_addr(&entry.target));
        }
        if let Some(entry) = self.functions.borrow_mut().remove(id) {
            debug!(obj_id = %id, "host function removed");
            self.ids_by_addr.borrow_mut().remove(&entry.target.addr());
        }
    }

    /// Removes a class entry.
    pub fn remove_class(&self, id: &str) {
        if self.classes.borrow_mut().remove(id).is_some() {
            debug!(class_id = %id, "host class removed");
        }
    }

    /// Snapshot of all object entries, for descriptor emission.
    #[must_use]
    pub fn objects_snapshot(&self) -> Vec<(String, ObjectEntry)> {
        self.objects
            .borrow()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Snapshot of all function entries, for descriptor emission.
    #[must_use]
    pub fn functions_snapshot(&self) -> Vec<(String, FunctionEntry)> {
        self.functions
            .borrow()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    /// Snapshot of all class entries, for descriptor emission.
    #[must_use]
    pub fn classes_snapshot(&self) -> Vec<(String, ClassEntry)> {
        self.classes
            .borrow()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }
}
