//! Message envelope and the message family crossing the channel.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::descriptor::{ClassDescriptor, FunctionDescriptor, ObjectDescriptor};
use crate::error::ProtocolError;

/// Marker stamped on every outgoing message.
///
/// Inbound traffic lacking the marker is ignored, screening stray channel
/// messages from other users of the same transport.
pub const RPC_MARKER: &str = "srpc";

/// Call mode of a single operation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CallType {
    /// Fire-and-forget: no reply is produced.
    Void,
    /// Blocking request/response over the synchronous transport.
    Sync,
    /// Deferred request/response correlated by `callId`.
    Async,
}

/// Body shared by the call message family.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallMessage {
    /// Effective call mode.
    pub call_type: CallType,

    /// Target entity id: a host object, function or class id.
    pub obj_id: String,

    /// Member name, present for `method_call`, `prop_get` and `prop_set`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prop: Option<String>,

    /// Serialised arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<serde_json::Value>,

    /// Correlation id, present on `async` calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl CallMessage {
    /// Creates a call body without member or correlation id.
    #[must_use]
    pub fn new(call_type: CallType, obj_id: impl Into<String>, args: Vec<serde_json::Value>) -> Self {
        Self {
            call_type,
            obj_id: obj_id.into(),
            prop: None,
            args,
            call_id: None,
        }
    }

    /// Sets the member name.
    #[must_use]
    pub fn with_prop(mut self, prop: impl Into<String>) -> Self {
        self.prop = Some(prop.into());
        self
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }
}

/// Result envelope for a call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ReplyMessage {
    /// Call mode of the originating call.
    pub call_type: CallType,

    /// Whether the call succeeded. On failure `result` carries the error
    /// reduced to its string form.
    pub success: bool,

    /// Serialised result or error string.
    #[serde(default)]
    pub result: serde_json::Value,

    /// Correlation id echoed from an `async` call, or the promise id for
    /// a promise settlement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
}

impl ReplyMessage {
    /// Creates a successful reply.
    #[must_use]
    pub fn success(call_type: CallType, result: serde_json::Value) -> Self {
        Self {
            call_type,
            success: true,
            result,
            call_id: None,
        }
    }

    /// Creates a failed reply carrying the error's string form.
    #[must_use]
    pub fn failure(call_type: CallType, message: impl Into<String>) -> Self {
        Self {
            call_type,
            success: false,
            result: serde_json::Value::String(message.into()),
            call_id: None,
        }
    }

    /// Sets the correlation id.
    #[must_use]
    pub fn with_call_id(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    /// The error string of a failed reply.
    #[must_use]
    pub fn error_message(&self) -> String {
        match self.result.as_str() {
            Some(message) => message.to_owned(),
            None => self.result.to_string(),
        }
    }
}

/// Descriptor tables exchanged between endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct DescriptorBatch {
    /// Host object descriptors keyed by object id.
    #[serde(default)]
    pub objects: HashMap<String, ObjectDescriptor>,

    /// Host function descriptors keyed by function id.
    #[serde(default)]
    pub functions: HashMap<String, FunctionDescriptor>,

    /// Host class descriptors keyed by class id.
    #[serde(default)]
    pub classes: HashMap<String, ClassDescriptor>,
}

/// The message family, discriminated by `action`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RpcMessage {
    /// Pull request for the peer's descriptor tables.
    GetDescriptors,

    /// Descriptor tables, as a pull reply or an unsolicited push.
    Descriptors(DescriptorBatch),

    /// Invoke a registered host function.
    FnCall(CallMessage),

    /// Construct an instance of a registered host class.
    CtorCall(CallMessage),

    /// Invoke a member on a host object (or a class static).
    MethodCall(CallMessage),

    /// Read a proxied property.
    PropGet(CallMessage),

    /// Write a proxied property.
    PropSet(CallMessage),

    /// Result envelope for a call or a promise settlement.
    FnReply(ReplyMessage),

    /// Notice that the peer's proxy for `objId` was reclaimed.
    ObjDied {
        #[serde(rename = "objId")]
        obj_id: String,
    },
}

/// A marker-stamped message as it appears on the channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WireEnvelope {
    /// Always [`RPC_MARKER`].
    pub rpc_marker: String,

    /// The message body, flattened beside the marker.
    #[serde(flatten)]
    pub message: RpcMessage,
}

impl WireEnvelope {
    /// Wraps a message with the marker.
    #[must_use]
    pub fn new(message: RpcMessage) -> Self {
        Self {
            rpc_marker: RPC_MARKER.to_owned(),
            message,
        }
    }

    /// Checks whether a raw channel value carries the marker.
    #[must_use]
    pub fn has_marker(value: &serde_json::Value) -> bool {
        value.get("rpc_marker").and_then(serde_json::Value::as_str) == Some(RPC_MARKER)
    }

    /// Parses a raw channel value, rejecting unmarked or malformed input.
    pub fn parse(value: serde_json::Value) -> Result<Self, ProtocolError> {
        if !Self::has_marker(&value) {
            return Err(ProtocolError::MissingMarker);
        }
        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Serialises the envelope into a raw channel value.
    pub fn to_value(&self) -> Result<serde_json::Value, ProtocolError> {
        serde_json::to_value(self).map_err(|e| ProtocolError::Serialisation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_carries_marker_and_action() {
        let envelope = WireEnvelope::new(RpcMessage::GetDescriptors);
        let wire = envelope.to_value().unwrap();

        assert_eq!(wire.get("rpc_marker").unwrap(), "srpc");
        assert_eq!(wire.get("action").unwrap(), "get_descriptors");
    }

    #[test]
    fn call_message_wire_form_is_camel_case() {
        let envelope = WireEnvelope::new(RpcMessage::MethodCall(
            CallMessage::new(CallType::Async, "obj-1", vec![json!(1)])
                .with_prop("tick")
                .with_call_id("7"),
        ));
        let wire = envelope.to_value().unwrap();

        assert_eq!(wire.get("action").unwrap(), "method_call");
        assert_eq!(wire.get("callType").unwrap(), "async");
        assert_eq!(wire.get("objId").unwrap(), "obj-1");
        assert_eq!(wire.get("prop").unwrap(), "tick");
        assert_eq!(wire.get("callId").unwrap(), "7");
    }

    #[test]
    fn envelope_roundtrip() {
        let envelope = WireEnvelope::new(RpcMessage::FnReply(
            ReplyMessage::success(CallType::Async, json!("pong")).with_call_id("3"),
        ));

        let parsed = WireEnvelope::parse(envelope.to_value().unwrap()).unwrap();
        assert_eq!(parsed, envelope);
    }

    #[test]
    fn unmarked_messages_are_rejected() {
        let stray = json!({ "action": "fn_call", "objId": "x", "callType": "void" });
        assert!(matches!(
            WireEnvelope::parse(stray),
            Err(ProtocolError::MissingMarker)
        ));
    }

    #[test]
    fn marked_but_malformed_messages_are_rejected() {
        let broken = json!({ "rpc_marker": "srpc", "action": "no_such_action" });
        assert!(matches!(
            WireEnvelope::parse(broken),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn obj_died_uses_obj_id_key() {
        let envelope = WireEnvelope::new(RpcMessage::ObjDied {
            obj_id: "gone".to_owned(),
        });
        let wire = envelope.to_value().unwrap();

        assert_eq!(wire.get("action").unwrap(), "obj_died");
        assert_eq!(wire.get("objId").unwrap(), "gone");
    }

    #[test]
    fn reply_error_message_reduction() {
        let failed = ReplyMessage::failure(CallType::Sync, "ErRoR");
        assert_eq!(failed.error_message(), "ErRoR");

        let odd = ReplyMessage {
            call_type: CallType::Sync,
            success: false,
            result: json!(42),
            call_id: None,
        };
        assert_eq!(odd.error_message(), "42");
    }

    #[test]
    fn descriptor_batch_defaults_to_empty_tables() {
        let wire = json!({ "rpc_marker": "srpc", "action": "descriptors" });
        let parsed = WireEnvelope::parse(wire).unwrap();
        match parsed.message {
            RpcMessage::Descriptors(batch) => {
                assert!(batch.objects.is_empty());
                assert!(batch.functions.is_empty());
                assert!(batch.classes.is_empty());
            }
            other => panic!("expected descriptors, got {other:?}"),
        }
    }
}
