//! Host-side call engine: dispatching inbound call messages to targets.
//!
//! Every call resolves its target through the host registries, never
//! through raw pointers, and replies on the channel that delivered it.
//! Errors raised by host code are reduced to their string form; only void
//! calls swallow them.

use std::rc::Rc;

use tracing::{debug, warn};

use tether_proto::{
    resolve_function, CallMessage, CallType, EventAction, ObjectDescriptor, ReplyMessage,
    ReturnKind, RpcMessage, WireEnvelope,
};

use crate::channel::MessageChannel;
use crate::codec;
use crate::error::RpcError;
use crate::proxy::CallAction;
use crate::session::SessionCore;
use crate::value::{HostObject, Value};

fn required_prop(message: &CallMessage) -> Result<&str, RpcError> {
    message
        .prop
        .as_deref()
        .ok_or_else(|| RpcError::Protocol("call without a member name".to_owned()))
}

impl SessionCore {
    /// Executes one inbound call and delivers its outcome per the call
    /// mode.
    pub(crate) fn handle_call(&self, action: CallAction, message: CallMessage) {
        debug!(
            action = ?action,
            obj_id = %message.obj_id,
            call_type = ?message.call_type,
            prop = message.prop.as_deref().unwrap_or(""),
            "dispatching call"
        );
        // Replies, including late async settlements, go to the channel
        // that delivered the call.
        let reply_to = self.active_channel();
        let outcome = self.execute_call(action, &message);
        self.deliver_outcome(&reply_to, message.call_type, message.call_id, outcome);
    }

    fn execute_call(&self, action: CallAction, message: &CallMessage) -> Result<Value, RpcError> {
        match action {
            CallAction::Function => {
                let entry = self
                    .host
                    .function(&message.obj_id)
                    .ok_or_else(|| RpcError::UnknownFunction(message.obj_id.clone()))?;
                let args = codec::deserialize_args(self, &message.args, &entry.descriptor)?;
                entry.target.call(args)
            }

            CallAction::Ctor => {
                let entry = self
                    .host
                    .class(&message.obj_id)
                    .ok_or_else(|| RpcError::UnknownClass(message.obj_id.clone()))?;
                let ctor = entry
                    .ctor
                    .clone()
                    .ok_or_else(|| RpcError::NoConstructor(message.obj_id.clone()))?;
                let descriptor = entry.descriptor.ctor.clone().unwrap_or_default();
                let args = codec::deserialize_args(self, &message.args, &descriptor)?;
                ctor.call(args)
            }

            CallAction::Method => self.execute_method(message),

            CallAction::PropGet => {
                let (target, _) = self.resolve_object_target(&message.obj_id)?;
                let prop = required_prop(message)?;
                target.get(prop)
            }

            CallAction::PropSet => self.execute_prop_set(message),
        }
    }

    /// Resolves a member-call target: a host object, or a class's static
    /// surface addressed by the class id.
    fn resolve_object_target(&self, obj_id: &str) -> Result<(HostObject, Rc<ObjectDescriptor>), RpcError> {
        if let Some(entry) = self.host.object(obj_id) {
            return Ok((entry.target, entry.descriptor));
        }
        if let Some(entry) = self.host.class(obj_id) {
            if let Some(statics) = entry.statics {
                let descriptor = entry.descriptor.statics.clone().map(Rc::new).unwrap_or_default();
                return Ok((statics, descriptor));
            }
        }
        Err(RpcError::UnknownObject(obj_id.to_owned()))
    }

    fn execute_method(&self, message: &CallMessage) -> Result<Value, RpcError> {
        let (target, descriptor) = self.resolve_object_target(&message.obj_id)?;
        let prop = required_prop(message)?;

        // An undeclared add_<event>/remove_<event> pair is rewritten to
        // the listener-registration methods.
        if descriptor.function(prop).is_none() {
            if let Some((event_action, event)) = EventAction::parse(prop) {
                if let Some(event_descriptor) = descriptor.event(event).cloned() {
                    let listeners =
                        codec::deserialize_args(self, &message.args, &event_descriptor)?;
                    let mut args = vec![Value::string(event)];
                    args.extend(listeners);
                    return target.call(event_action.listener_method(), args);
                }
            }
        }

        let function = resolve_function(Some(&descriptor), prop);
        let args = codec::deserialize_args(self, &message.args, &function)?;
        target.call(prop, args)
    }

    fn execute_prop_set(&self, message: &CallMessage) -> Result<Value, RpcError> {
        let (target, descriptor) = self.resolve_object_target(&message.obj_id)?;
        let prop = required_prop(message)?.to_owned();

        let property = descriptor.property(&prop).cloned();
        if property.as_ref().is_some_and(|p| p.get_only) {
            return Err(RpcError::ReadonlyProperty(prop));
        }

        let setter = property
            .as_ref()
            .and_then(|p| p.set.clone())
            .unwrap_or_default();
        let wire = message
            .args
            .first()
            .ok_or_else(|| RpcError::Protocol("prop_set without a value".to_owned()))?;
        let value =
            codec::deserialize_value_with(self, wire, setter.argument(0).map(|a| &a.function))?;

        if let Value::Promise(promise) = value {
            let getter_is_async = property
                .as_ref()
                .and_then(|p| p.get.as_ref())
                .is_some_and(|g| g.returns == ReturnKind::Async);
            if getter_is_async || !self.default_supports_sync() {
                // Assign the resolved value once the promise settles.
                promise.on_settled(move |result| match result {
                    Ok(value) => {
                        if let Err(e) = target.set(&prop, value.clone()) {
                            warn!(prop = %prop, error = %e, "deferred property assignment failed");
                        }
                    }
                    Err(e) => warn!(prop = %prop, error = %e, "deferred property value rejected"),
                });
            } else {
                target.set(&prop, Value::Promise(promise))?;
            }
            Ok(Value::null())
        } else {
            target.set(&prop, value)?;
            Ok(Value::null())
        }
    }

    fn deliver_outcome(
        &self,
        reply_to: &Rc<dyn MessageChannel>,
        call_type: CallType,
        call_id: Option<String>,
        outcome: Result<Value, RpcError>,
    ) {
        match call_type {
            CallType::Void => {
                if let Err(e) = outcome {
                    debug!(error = %e, "void call failed");
                }
            }

            CallType::Sync => {
                let reply = self.encode_outcome(CallType::Sync, outcome);
                self.send_reply(reply_to, reply);
            }

            CallType::Async => {
                let Some(call_id) = call_id else {
                    warn!("async call without a call id");
                    return;
                };
                match outcome {
                    // Coerce a deferred result: reply on settlement.
                    Ok(Value::Promise(promise)) => {
                        let weak = self.weak();
                        let reply_to = reply_to.clone();
                        promise.on_settled(move |result| {
                            if let Some(session) = weak.upgrade() {
                                let reply = session
                                    .encode_settlement(CallType::Async, result)
                                    .with_call_id(call_id);
                                session.send_reply(&reply_to, reply);
                            }
                        });
                    }
                    other => {
                        let reply = self.encode_outcome(CallType::Async, other).with_call_id(call_id);
                        self.send_reply(reply_to, reply);
                    }
                }
            }
        }
    }

    fn encode_outcome(&self, call_type: CallType, outcome: Result<Value, RpcError>) -> ReplyMessage {
        self.encode_settlement(call_type, &outcome)
    }

    /// Reduces an outcome to the reply envelope: the serialised value on
    /// success, the stringified error otherwise.
    pub(crate) fn encode_settlement(
        &self,
        call_type: CallType,
        outcome: &Result<Value, RpcError>,
    ) -> ReplyMessage {
        match outcome {
            Ok(value) => match codec::serialize_value(self, value, None) {
                Ok(wire) => ReplyMessage::success(call_type, wire),
                Err(e) => ReplyMessage::failure(call_type, e.to_string()),
            },
            Err(e) => ReplyMessage::failure(call_type, e.to_string()),
        }
    }

    /// Delivers a reply on `channel`, preferring the transport matching
    /// the reply's call mode and falling back to the other.
    pub(crate) fn send_reply(&self, channel: &Rc<dyn MessageChannel>, reply: ReplyMessage) {
        let prefer_sync = reply.call_type == CallType::Sync;
        let envelope = WireEnvelope::new(RpcMessage::FnReply(reply));
        let value = match envelope.to_value() {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "reply failed to serialise");
                return;
            }
        };

        let sent = if prefer_sync {
            channel
                .send_sync(value.clone())
                .map(|_| ())
                .or_else(|_| channel.send_async(value))
        } else {
            channel
                .send_async(value.clone())
                .or_else(|_| channel.send_sync(value).map(|_| ()))
        };
        if let Err(e) = sent {
            warn!(error = %e, "reply not delivered");
        }
        self.drain_post_send();
    }
}
