//! A ready-made dynamic object target.
//!
//! [`DynObject`] implements [`RpcTarget`] over a property map, closure
//! methods and a built-in listener list, so applications and tests can
//! expose objects without hand-writing a target. Listener registration
//! follows the engine's rewrite convention: `addEventListener(event,
//! listener)` and `removeEventListener(event, listener)` arrive as plain
//! member calls.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::error::RpcError;
use crate::value::{HostFunction, RpcTarget, Value};

/// A dynamic object target built from parts.
#[derive(Default)]
pub struct DynObject {
    class_id: Option<String>,
    properties: Rc<RefCell<BTreeMap<String, Value>>>,
    methods: RefCell<HashMap<String, HostFunction>>,
    listeners: RefCell<Vec<(String, Value)>>,
}

impl DynObject {
    /// Creates an empty object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the object as an instance of a registered class.
    #[must_use]
    pub fn with_class_id(mut self, class_id: impl Into<String>) -> Self {
        self.class_id = Some(class_id.into());
        self
    }

    /// Adds a property.
    #[must_use]
    pub fn with_property(self, name: impl Into<String>, value: Value) -> Self {
        self.properties.borrow_mut().insert(name.into(), value);
        self
    }

    /// Adds a closure method.
    #[must_use]
    pub fn with_method(
        self,
        name: impl Into<String>,
        f: impl Fn(Vec<Value>) -> Result<Value, RpcError> + 'static,
    ) -> Self {
        self.methods
            .borrow_mut()
            .insert(name.into(), HostFunction::new(f));
        self
    }

    /// The shared property map, for methods that read or write their own
    /// object's state.
    #[must_use]
    pub fn properties(&self) -> Rc<RefCell<BTreeMap<String, Value>>> {
        self.properties.clone()
    }

    /// Fires `event`, invoking every registered listener with `args`.
    pub fn emit_event(&self, event: &str, args: Vec<Value>) -> Result<(), RpcError> {
        let listeners: Vec<Value> = self
            .listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, listener)| listener.clone())
            .collect();
        for listener in listeners {
            listener.call(args.clone())?;
        }
        Ok(())
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners
            .borrow()
            .iter()
            .filter(|(name, _)| name == event)
            .count()
    }

    fn add_listener(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        let mut args = args.into_iter();
        let event = args
            .next()
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or_else(|| RpcError::msg("addEventListener expects an event name"))?;
        let listener = args
            .next()
            .ok_or_else(|| RpcError::msg("addEventListener expects a listener"))?;
        self.listeners.borrow_mut().push((event, listener));
        Ok(Value::null())
    }

    fn remove_listener(&self, args: Vec<Value>) -> Result<Value, RpcError> {
        let mut args = args.into_iter();
        let event = args
            .next()
            .and_then(|v| v.as_str().map(str::to_owned))
            .ok_or_else(|| RpcError::msg("removeEventListener expects an event name"))?;
        let listener = args
            .next()
            .ok_or_else(|| RpcError::msg("removeEventListener expects a listener"))?;
        self.listeners
            .borrow_mut()
            .retain(|(name, registered)| !(name == &event && registered.same_function(&listener)));
        Ok(Value::null())
    }
}

impl RpcTarget for DynObject {
    fn get(&self, prop: &str) -> Result<Value, RpcError> {
        self.properties
            .borrow()
            .get(prop)
            .cloned()
            .ok_or_else(|| RpcError::UnknownProperty(prop.to_owned()))
    }

    fn set(&self, prop: &str, value: Value) -> Result<(), RpcError> {
        self.properties.borrow_mut().insert(prop.to_owned(), value);
        Ok(())
    }

    fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        match method {
            "addEventListener" => self.add_listener(args),
            "removeEventListener" => self.remove_listener(args),
            _ => {
                let function = self.methods.borrow().get(method).cloned();
                match function {
                    Some(function) => function.call(args),
                    None => Err(RpcError::NotAFunction(method.to_owned())),
                }
            }
        }
    }

    fn class_id(&self) -> Option<String> {
        self.class_id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn properties_read_and_write() {
        let object = DynObject::new().with_property("counter", Value::from(1i64));

        assert_eq!(object.get("counter").unwrap().as_i64(), Some(1));
        object.set("counter", Value::from(2i64)).unwrap();
        assert_eq!(object.get("counter").unwrap().as_i64(), Some(2));
        assert!(matches!(
            object.get("missing"),
            Err(RpcError::UnknownProperty(_))
        ));
    }

    #[test]
    fn methods_can_share_the_property_map() {
        let object = DynObject::new().with_property("n", Value::from(20i64));
        let properties = object.properties();
        let object = object.with_method("double", move |_| {
            let n = properties.borrow().get("n").and_then(|v| v.as_i64()).unwrap_or(0);
            Ok(Value::from(n * 2))
        });

        assert_eq!(object.call("double", vec![]).unwrap().as_i64(), Some(40));
        assert!(matches!(
            object.call("halve", vec![]),
            Err(RpcError::NotAFunction(_))
        ));
    }

    #[test]
    fn listeners_register_fire_and_remove() {
        let object = DynObject::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        let sink = seen.clone();
        let listener = Value::Function(HostFunction::new(move |args| {
            sink.borrow_mut()
                .push(args[0].as_str().unwrap_or("").to_owned());
            Ok(Value::null())
        }));

        object
            .call(
                "addEventListener",
                vec![Value::from("data"), listener.clone()],
            )
            .unwrap();
        assert_eq!(object.listener_count("data"), 1);

        object.emit_event("data", vec![Value::from("first")]).unwrap();
        object.emit_event("other", vec![Value::from("skip")]).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["first"]);

        object
            .call("removeEventListener", vec![Value::from("data"), listener])
            .unwrap();
        assert_eq!(object.listener_count("data"), 0);

        object.emit_event("data", vec![Value::from("second")]).unwrap();
        assert_eq!(seen.borrow().as_slice(), ["first"]);
    }
}
