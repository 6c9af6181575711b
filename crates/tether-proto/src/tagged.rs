//! Tagged wire forms for values inside `args`, `result` and `props`.
//!
//! Scalars cross the boundary as bare JSON and plain containers are walked
//! recursively; everything that carries identity is folded into an object
//! tagged with `_rpc_type`.

use serde::{Deserialize, Serialize};

/// Reserved class id marking a serialised promise.
///
/// A promise travels as an `object` wire value with this class id; its
/// eventual settlement arrives as an `fn_reply` keyed by the same id.
pub const PROMISE_CLASS_ID: &str = "Promise";

/// The tagged sum a non-plain value takes on the wire.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "_rpc_type")]
pub enum TaggedValue {
    /// A host object or class instance living on the sending endpoint.
    #[serde(rename = "object", rename_all = "camelCase")]
    Object {
        /// Class id for instances of registered classes, or
        /// [`PROMISE_CLASS_ID`] for promises. Absent for plain host
        /// objects.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        class_id: Option<String>,

        /// Host entry id on the sending endpoint.
        obj_id: String,

        /// Recursively encoded snapshot of the readonly properties.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        props: Option<serde_json::Map<String, serde_json::Value>>,
    },

    /// A host function living on the sending endpoint.
    #[serde(rename = "function", rename_all = "camelCase")]
    Function {
        /// Host function id on the sending endpoint.
        obj_id: String,
    },

    /// A proxy travelling back to the endpoint that hosts the original;
    /// the receiver resolves it to the original target.
    #[serde(rename = "hostObject", rename_all = "camelCase")]
    HostObject {
        /// Host entry id on the receiving endpoint.
        obj_id: String,
    },
}

impl TaggedValue {
    /// Attempts to read a tagged value out of a raw wire value.
    ///
    /// Returns `None` for anything that does not carry a `_rpc_type` key,
    /// leaving plain objects to the recursive walk.
    #[must_use]
    pub fn from_value(value: &serde_json::Value) -> Option<Self> {
        if value.get("_rpc_type").is_some() {
            serde_json::from_value(value.clone()).ok()
        } else {
            None
        }
    }

    /// Serialises the tagged value into its wire form.
    #[must_use]
    pub fn into_value(self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}
