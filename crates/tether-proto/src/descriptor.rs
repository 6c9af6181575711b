//! Descriptors declaring the shape of exposed entities.
//!
//! A descriptor says which members of a host entity the peer may touch and
//! how each one is called. Descriptors travel inside the `descriptors`
//! message and are cached by the receiving endpoint, which synthesises its
//! proxies from them.

use serde::{Deserialize, Serialize};

/// Return behaviour of a callable surface.
///
/// `void` means fire-and-forget, `sync` a blocking request/response and
/// `async` a deferred request/response. Callables default to `async`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReturnKind {
    /// No reply is produced or awaited.
    Void,
    /// The caller blocks until the reply arrives.
    Sync,
    /// The caller receives a deferred settled by a later reply.
    #[default]
    Async,
}

/// Shape of an exposed function or method.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct FunctionDescriptor {
    /// Function name. Absent for anonymous argument positions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Declared return behaviour.
    pub returns: ReturnKind,

    /// Per-argument sub-descriptors, possibly sparse (see
    /// [`ArgumentDescriptor::idx`]).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgumentDescriptor>,
}

impl FunctionDescriptor {
    /// Creates a bare descriptor carrying only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Sets the declared return behaviour.
    #[must_use]
    pub fn with_returns(mut self, returns: ReturnKind) -> Self {
        self.returns = returns;
        self
    }

    /// Adds an argument descriptor.
    #[must_use]
    pub fn with_argument(mut self, argument: ArgumentDescriptor) -> Self {
        self.arguments.push(argument);
        self
    }

    /// Resolves the descriptor governing the argument at `idx`.
    ///
    /// Arguments may be declared sparsely: an entry without an `idx`
    /// applies to any position, an entry with one applies to that position
    /// only. The first matching entry wins.
    #[must_use]
    pub fn argument(&self, idx: usize) -> Option<&ArgumentDescriptor> {
        self.arguments
            .iter()
            .find(|a| a.idx.is_none() || a.idx == Some(idx))
    }
}

/// Descriptor for one argument position.
///
/// An argument descriptor is a function descriptor with an optional
/// position: argument positions that are themselves functions (callbacks,
/// listeners) declare their calling convention here.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ArgumentDescriptor {
    /// Position this entry applies to; applies to every position when
    /// absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idx: Option<usize>,

    /// The function shape of the argument.
    #[serde(flatten)]
    pub function: FunctionDescriptor,
}

impl ArgumentDescriptor {
    /// Creates a positional argument descriptor.
    #[must_use]
    pub fn at(idx: usize, function: FunctionDescriptor) -> Self {
        Self {
            idx: Some(idx),
            function,
        }
    }
}

/// Shape of a proxied property.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertyDescriptor {
    /// Property name.
    pub name: String,

    /// Getter behaviour. Getters default to `sync` so that a plain read
    /// of the proxy yields the value when the channel allows it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<FunctionDescriptor>,

    /// Setter behaviour. Setters default to `void`; a setter may never be
    /// `async` on the wire.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<FunctionDescriptor>,

    /// When set, assignments through the proxy are rejected locally.
    pub get_only: bool,
}

impl PropertyDescriptor {
    /// Creates a read-write proxied property descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Marks the property as readable only.
    #[must_use]
    pub fn get_only(mut self) -> Self {
        self.get_only = true;
        self
    }

    /// Sets the getter behaviour.
    #[must_use]
    pub fn with_get(mut self, get: FunctionDescriptor) -> Self {
        self.get = Some(get);
        self
    }

    /// Sets the setter behaviour.
    #[must_use]
    pub fn with_set(mut self, set: FunctionDescriptor) -> Self {
        self.set = Some(set);
        self
    }
}

/// Shape of an exposed object.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectDescriptor {
    /// Plain callable members.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub functions: Vec<FunctionDescriptor>,

    /// Properties read and written through the wire.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub proxied_properties: Vec<PropertyDescriptor>,

    /// Properties snapshotted once, at descriptor emission.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub readonly_properties: Vec<String>,

    /// Events, each expanding to an `add_<name>` / `remove_<name>` method
    /// pair on the wire. The descriptor declares the listener argument.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<FunctionDescriptor>,

    /// Snapshot of the readonly property values, filled in just before
    /// the descriptor ships.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub props: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ObjectDescriptor {
    /// Creates an empty object descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a callable member.
    #[must_use]
    pub fn with_function(mut self, function: FunctionDescriptor) -> Self {
        self.functions.push(function);
        self
    }

    /// Adds a proxied property.
    #[must_use]
    pub fn with_proxied_property(mut self, property: PropertyDescriptor) -> Self {
        self.proxied_properties.push(property);
        self
    }

    /// Adds a readonly property.
    #[must_use]
    pub fn with_readonly_property(mut self, name: impl Into<String>) -> Self {
        self.readonly_properties.push(name.into());
        self
    }

    /// Adds an event.
    #[must_use]
    pub fn with_event(mut self, event: FunctionDescriptor) -> Self {
        self.events.push(event);
        self
    }

    /// Looks up a function descriptor by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.functions.iter().find(|f| f.name.as_deref() == Some(name))
    }

    /// Looks up an event descriptor by event name.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<&FunctionDescriptor> {
        self.events.iter().find(|e| e.name.as_deref() == Some(name))
    }

    /// Looks up a proxied property descriptor by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.proxied_properties.iter().find(|p| p.name == name)
    }
}

/// Resolves a function descriptor by name from an optional object
/// descriptor, falling back to a bare named descriptor.
#[must_use]
pub fn resolve_function(descriptor: Option<&ObjectDescriptor>, name: &str) -> FunctionDescriptor {
    descriptor
        .and_then(|d| d.function(name))
        .cloned()
        .unwrap_or_else(|| FunctionDescriptor::named(name))
}

/// Shape of an exposed class: an optional constructor, static members and
/// instance members.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassDescriptor {
    /// Class identifier, stamped at registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_id: Option<String>,

    /// Constructor behaviour; classes without one cannot be constructed
    /// from the peer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ctor: Option<FunctionDescriptor>,

    /// Static members, addressed by the class id.
    #[serde(rename = "static", skip_serializing_if = "Option::is_none")]
    pub statics: Option<ObjectDescriptor>,

    /// Instance members, bound to each instance id at proxy creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<ObjectDescriptor>,
}

impl ClassDescriptor {
    /// Creates an empty class descriptor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the constructor descriptor.
    #[must_use]
    pub fn with_ctor(mut self, ctor: FunctionDescriptor) -> Self {
        self.ctor = Some(ctor);
        self
    }

    /// Sets the static member descriptor.
    #[must_use]
    pub fn with_statics(mut self, statics: ObjectDescriptor) -> Self {
        self.statics = Some(statics);
        self
    }

    /// Sets the instance member descriptor.
    #[must_use]
    pub fn with_instance(mut self, instance: ObjectDescriptor) -> Self {
        self.instance = Some(instance);
        self
    }
}

/// Direction of an event method pair member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventAction {
    /// `add_<event>`, rewritten to `addEventListener`.
    Add,
    /// `remove_<event>`, rewritten to `removeEventListener`.
    Remove,
}

impl EventAction {
    /// The listener-registration method the host rewrites to.
    #[must_use]
    pub const fn listener_method(self) -> &'static str {
        match self {
            Self::Add => "addEventListener",
            Self::Remove => "removeEventListener",
        }
    }

    /// The wire method name for this action on the given event.
    #[must_use]
    pub fn method_name(self, event: &str) -> String {
        match self {
            Self::Add => format!("add_{event}"),
            Self::Remove => format!("remove_{event}"),
        }
    }

    /// Parses a wire method name into its action and event name.
    #[must_use]
    pub fn parse(method: &str) -> Option<(Self, &str)> {
        if let Some(event) = method.strip_prefix("add_") {
            Some((Self::Add, event))
        } else if let Some(event) = method.strip_prefix("remove_") {
            Some((Self::Remove, event))
        } else {
            None
        }
    }
}
