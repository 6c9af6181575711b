//! Proxied properties, readonly snapshots and event-pair mapping.

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use tether_core::{DynObject, HostFunction, RpcError, RpcTarget, Value};
use tether_proto::{FunctionDescriptor, ObjectDescriptor, PropertyDescriptor};

#[test]
fn proxied_property_reads_and_writes_through_the_wire() {
    let (host, client) = common::linked();

    let state = Rc::new(DynObject::new().with_property("counter", Value::from(1i64)));
    host.register_host_object(
        "state",
        state.clone(),
        ObjectDescriptor::new().with_proxied_property(PropertyDescriptor::new("counter")),
    );
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_object("state").unwrap();
    let counter = proxy.get("counter").unwrap().as_i64().unwrap();
    assert_eq!(counter, 1);

    proxy.set("counter", Value::from(counter + 1)).unwrap();
    assert_eq!(state.get("counter").unwrap().as_i64(), Some(2));
    assert_eq!(proxy.get("counter").unwrap().as_i64(), Some(2));
}

#[test]
fn readonly_properties_are_snapshotted_at_descriptor_emission() {
    let (host, client) = common::linked();

    let state = Rc::new(DynObject::new().with_property("version", Value::from("1.0")));
    host.register_host_object(
        "state",
        state.clone(),
        ObjectDescriptor::new().with_readonly_property("version"),
    );
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_object("state").unwrap();
    assert_eq!(proxy.get("version").unwrap().as_str(), Some("1.0"));

    // Later host-side mutation is invisible to the snapshot.
    state.set("version", Value::from("2.0")).unwrap();
    assert_eq!(proxy.get("version").unwrap().as_str(), Some("1.0"));
}

#[test]
fn get_only_properties_reject_assignment_locally() {
    let (host, client) = common::linked();

    let state = Rc::new(DynObject::new().with_property("mode", Value::from("on")));
    host.register_host_object(
        "state",
        state,
        ObjectDescriptor::new().with_proxied_property(PropertyDescriptor::new("mode").get_only()),
    );
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_object("state").unwrap();
    assert_eq!(proxy.get("mode").unwrap().as_str(), Some("on"));
    assert!(matches!(
        proxy.set("mode", Value::from("off")),
        Err(RpcError::ReadonlyProperty(_))
    ));
}

#[test]
fn undeclared_properties_are_rejected() {
    let (host, client) = common::linked();
    host.register_host_object("state", Rc::new(DynObject::new()), ObjectDescriptor::new());
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_object("state").unwrap();
    assert!(matches!(
        proxy.get("ghost"),
        Err(RpcError::UnknownProperty(_))
    ));
    assert!(matches!(
        proxy.set("ghost", Value::null()),
        Err(RpcError::UnknownProperty(_))
    ));
}

#[test]
fn event_pair_maps_to_listener_registration() {
    let (host, client) = common::linked();

    let emitter = Rc::new(DynObject::new());
    host.register_host_object(
        "emitter",
        emitter.clone(),
        ObjectDescriptor::new().with_event(FunctionDescriptor::named("data")),
    );
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_object("emitter").unwrap();

    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    let listener = Value::Function(HostFunction::new(move |args| {
        sink.borrow_mut()
            .push(args[0].as_str().unwrap_or("").to_owned());
        Ok(Value::null())
    }));

    proxy.add_event_listener("data", listener.clone()).unwrap();
    assert_eq!(emitter.listener_count("data"), 1);

    emitter.emit_event("data", vec![Value::from("payload")]).unwrap();
    assert_eq!(seen.borrow().as_slice(), ["payload"]);

    proxy.remove_event_listener("data", listener).unwrap();
    assert_eq!(emitter.listener_count("data"), 0);

    emitter.emit_event("data", vec![Value::from("after")]).unwrap();
    assert_eq!(seen.borrow().as_slice(), ["payload"]);
}

#[test]
fn distinct_listeners_are_removed_independently() {
    let (host, client) = common::linked();

    let emitter = Rc::new(DynObject::new());
    host.register_host_object(
        "emitter",
        emitter.clone(),
        ObjectDescriptor::new().with_event(FunctionDescriptor::named("data")),
    );
    client.request_descriptors().unwrap();
    let proxy = client.get_proxy_object("emitter").unwrap();

    let hits = Rc::new(RefCell::new((0u32, 0u32)));
    let first_sink = hits.clone();
    let first = Value::Function(HostFunction::new(move |_| {
        first_sink.borrow_mut().0 += 1;
        Ok(Value::null())
    }));
    let second_sink = hits.clone();
    let second = Value::Function(HostFunction::new(move |_| {
        second_sink.borrow_mut().1 += 1;
        Ok(Value::null())
    }));

    proxy.add_event_listener("data", first.clone()).unwrap();
    proxy.add_event_listener("data", second).unwrap();
    emitter.emit_event("data", vec![]).unwrap();
    assert_eq!(*hits.borrow(), (1, 1));

    proxy.remove_event_listener("data", first).unwrap();
    emitter.emit_event("data", vec![]).unwrap();
    assert_eq!(*hits.borrow(), (1, 2));
}
