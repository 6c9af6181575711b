//! Recursive value marshalling between [`Value`] and the tagged wire
//! forms.
//!
//! Serialisation folds functions, promises and instances into tagged
//! objects, auto-registering anything that crosses the boundary without a
//! prior id. Deserialisation is the inverse dispatch on `_rpc_type`; the
//! `hostObject` tag resolves through the local host registry, which is
//! what preserves identity when a proxy travels back to its origin.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::Value as Json;

use tether_proto::{FunctionDescriptor, TaggedValue, PROMISE_CLASS_ID};

use crate::error::RpcError;
use crate::promise::Promise;
use crate::session::SessionCore;
use crate::value::Value;

/// Serialises a call's arguments, resolving the governing argument
/// descriptor per position.
pub(crate) fn serialize_args(
    session: &SessionCore,
    args: &[Value],
    descriptor: &FunctionDescriptor,
) -> Result<Vec<Json>, RpcError> {
    args.iter()
        .enumerate()
        .map(|(idx, value)| {
            serialize_value(session, value, descriptor.argument(idx).map(|a| &a.function))
        })
        .collect()
}

/// Serialises one value into its wire form.
pub(crate) fn serialize_value(
    session: &SessionCore,
    value: &Value,
    descriptor: Option<&FunctionDescriptor>,
) -> Result<Json, RpcError> {
    match value {
        Value::Scalar(scalar) => Ok(scalar.clone()),

        Value::Array(items) => {
            let items = items
                .iter()
                .map(|item| serialize_value(session, item, None))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Json::Array(items))
        }

        Value::Map(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                out.insert(key.clone(), serialize_value(session, item, None)?);
            }
            Ok(Json::Object(out))
        }

        Value::Function(function) => {
            let obj_id = match session.host.id_for_function(function) {
                Some(id) => id,
                None => {
                    let id = session.generate_id();
                    let registered = descriptor.cloned().unwrap_or_default();
                    session
                        .host
                        .insert_function(id.clone(), function.clone(), Rc::new(registered));
                    id
                }
            };
            Ok(TaggedValue::Function { obj_id }.into_value())
        }

        Value::Promise(promise) => {
            let obj_id = session.generate_id();
            schedule_settlement(session, obj_id.clone(), promise);
            Ok(TaggedValue::Object {
                class_id: Some(PROMISE_CLASS_ID.to_owned()),
                obj_id,
                props: None,
            }
            .into_value())
        }

        Value::Instance(target) => {
            let class_id = target.class_id();
            let (obj_id, descriptor) = match session.host.id_for_object(target) {
                Some(id) => {
                    let descriptor = session.host.object(&id).map(|entry| entry.descriptor);
                    (id, descriptor)
                }
                None => {
                    let id = session.generate_id();
                    let descriptor = class_id
                        .as_deref()
                        .and_then(|class_id| session.host.class(class_id))
                        .and_then(|entry| entry.descriptor.instance.clone())
                        .map(Rc::new)
                        .unwrap_or_default();
                    session
                        .host
                        .insert_object(id.clone(), target.clone(), descriptor.clone());
                    (id, Some(descriptor))
                }
            };

            let props = match &descriptor {
                Some(descriptor) if !descriptor.readonly_properties.is_empty() => {
                    let mut props = serde_json::Map::new();
                    for name in &descriptor.readonly_properties {
                        let value = target.get(name)?;
                        props.insert(name.clone(), serialize_value(session, &value, None)?);
                    }
                    Some(props)
                }
                _ => None,
            };

            Ok(TaggedValue::Object {
                class_id,
                obj_id,
                props,
            }
            .into_value())
        }

        Value::ProxyFunction(proxy) => Ok(TaggedValue::HostObject {
            obj_id: proxy.id().to_owned(),
        }
        .into_value()),

        Value::ProxyObject(proxy) => Ok(TaggedValue::HostObject {
            obj_id: proxy.id().to_owned(),
        }
        .into_value()),
    }
}

/// Arranges the `fn_reply` that delivers a serialised promise's
/// settlement under its id.
///
/// A settlement already known at serialisation time is queued and flushed
/// only after the enclosing message has been sent, so the call always
/// precedes its promises' replies on the wire.
fn schedule_settlement(session: &SessionCore, call_id: String, promise: &Promise) {
    let weak = session.weak();
    if promise.is_settled() {
        let promise = promise.clone();
        session.queue_post_send(Box::new(move || {
            if let (Some(session), Some(result)) = (weak.upgrade(), promise.try_result()) {
                session.send_settlement_reply(&call_id, &result);
            }
        }));
    } else {
        promise.on_settled(move |result| {
            if let Some(session) = weak.upgrade() {
                session.send_settlement_reply(&call_id, result);
            }
        });
    }
}

/// Deserialises a call's arguments, resolving the governing argument
/// descriptor per position.
pub(crate) fn deserialize_args(
    session: &SessionCore,
    args: &[Json],
    descriptor: &FunctionDescriptor,
) -> Result<Vec<Value>, RpcError> {
    args.iter()
        .enumerate()
        .map(|(idx, wire)| {
            deserialize_value_with(session, wire, descriptor.argument(idx).map(|a| &a.function))
        })
        .collect()
}

/// Deserialises one wire value without a governing descriptor.
pub(crate) fn deserialize_value(session: &SessionCore, wire: &Json) -> Result<Value, RpcError> {
    deserialize_value_with(session, wire, None)
}

/// Deserialises one wire value, dispatching on the `_rpc_type` tag.
pub(crate) fn deserialize_value_with(
    session: &SessionCore,
    wire: &Json,
    descriptor: Option<&FunctionDescriptor>,
) -> Result<Value, RpcError> {
    if let Some(tagged) = TaggedValue::from_value(wire) {
        return match tagged {
            TaggedValue::Object {
                class_id,
                obj_id,
                props,
            } => {
                if class_id.as_deref() == Some(PROMISE_CLASS_ID) {
                    // The settlement arrives as an fn_reply keyed by the
                    // promise's id.
                    let promise = Promise::pending();
                    session.register_pending(&obj_id, promise.clone());
                    Ok(Value::Promise(promise))
                } else {
                    session
                        .get_or_create_proxy_object(&obj_id, class_id.as_deref(), props.as_ref())
                        .map(Value::ProxyObject)
                }
            }
            TaggedValue::Function { obj_id } => session
                .get_or_create_proxy_function(&obj_id, descriptor)
                .map(Value::ProxyFunction),
            TaggedValue::HostObject { obj_id } => session.resolve_host_value(&obj_id),
        };
    }

    match wire {
        Json::Array(items) => items
            .iter()
            .map(|item| deserialize_value_with(session, item, None))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Json::Object(map) => {
            let mut out = BTreeMap::new();
            for (key, item) in map {
                out.insert(key.clone(), deserialize_value_with(session, item, None)?);
            }
            Ok(Value::Map(out))
        }
        scalar => Ok(Value::Scalar(scalar.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::channel::MemoryChannel;
    use crate::config::SessionConfig;
    use crate::session::RpcSession;
    use crate::value::HostFunction;

    fn lone_session() -> RpcSession {
        let (channel, _peer) = MemoryChannel::pair();
        RpcSession::connect(Rc::new(channel), SessionConfig::default()).unwrap()
    }

    #[test]
    fn scalars_pass_through_unchanged() {
        let session = lone_session();
        let core = session.core_for_tests();

        for wire in [json!(null), json!(true), json!(42), json!("hi")] {
            let value = deserialize_value(&core, &wire).unwrap();
            assert_eq!(serialize_value(&core, &value, None).unwrap(), wire);
        }
    }

    #[test]
    fn containers_are_walked_recursively() {
        let session = lone_session();
        let core = session.core_for_tests();

        let wire = json!({ "nested": { "items": [1, 2, 3] }, "ok": true });
        let value = deserialize_value(&core, &wire).unwrap();
        assert!(matches!(value, Value::Map(_)));
        assert_eq!(serialize_value(&core, &value, None).unwrap(), wire);
    }

    #[test]
    fn functions_are_stamped_for_idempotent_serialisation() {
        let session = lone_session();
        let core = session.core_for_tests();

        let function = Value::Function(HostFunction::new(|_| Ok(Value::null())));
        let first = serialize_value(&core, &function, None).unwrap();
        let second = serialize_value(&core, &function, None).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.get("_rpc_type").unwrap(), "function");
    }

    #[test]
    fn promises_serialise_as_the_reserved_pseudo_class() {
        let session = lone_session();
        let core = session.core_for_tests();

        let wire = serialize_value(&core, &Value::Promise(Promise::pending()), None).unwrap();
        assert_eq!(wire.get("_rpc_type").unwrap(), "object");
        assert_eq!(wire.get("classId").unwrap(), "Promise");
        assert!(wire.get("objId").is_some());
    }
}
