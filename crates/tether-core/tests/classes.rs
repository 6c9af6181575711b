//! Class round-trips: constructors, statics, instance members, and
//! identity preservation on send-back.

mod common;

use std::cell::Cell;
use std::rc::Rc;

use tether_core::{DynObject, HostFunction, HostObject, RpcError, RpcSession, Value};
use tether_proto::{
    ClassDescriptor, FunctionDescriptor, ObjectDescriptor, PropertyDescriptor, ReturnKind,
};

fn make_sensor(name: &str) -> Rc<DynObject> {
    let object = DynObject::new()
        .with_class_id("Sensor")
        .with_property("name", Value::from(name))
        .with_property("color", Value::from("red"));
    let properties = object.properties();
    Rc::new(object.with_method("getDescription", move |_| {
        let properties = properties.borrow();
        let color = properties
            .get("color")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        let name = properties
            .get("name")
            .and_then(|v| v.as_str().map(str::to_owned))
            .unwrap_or_default();
        Ok(Value::from(format!("{color} {name}")))
    }))
}

fn register_sensor_class(host: &RpcSession) {
    let statics: HostObject = Rc::new(DynObject::new().with_method("createInstance", |args| {
        let name = args[0].as_str().unwrap_or("").to_owned();
        Ok(Value::Instance(make_sensor(&name)))
    }));

    let descriptor = ClassDescriptor::new()
        .with_ctor(FunctionDescriptor::default().with_returns(ReturnKind::Sync))
        .with_statics(
            ObjectDescriptor::new()
                .with_function(FunctionDescriptor::named("createInstance")),
        )
        .with_instance(
            ObjectDescriptor::new()
                .with_readonly_property("name")
                .with_proxied_property(PropertyDescriptor::new("color"))
                .with_function(FunctionDescriptor::named("getDescription")),
        );

    host.register_host_class(
        "Sensor",
        Some(HostFunction::new(|args| {
            let name = args[0].as_str().unwrap_or("").to_owned();
            Ok(Value::Instance(make_sensor(&name)))
        })),
        Some(statics),
        descriptor,
    );
}

#[test]
fn static_factory_yields_an_instance_proxy() {
    let (host, client) = common::linked();
    register_sensor_class(&host);
    client.request_descriptors().unwrap();

    let sensor_class = client.get_proxy_class("Sensor").unwrap();
    let Value::Promise(created) = sensor_class
        .call_static("createInstance", vec![Value::from("test2")])
        .unwrap()
    else {
        panic!("static factory should be deferred");
    };

    let Value::ProxyObject(instance) = created.try_result().unwrap().unwrap() else {
        panic!("factory should return an instance proxy");
    };
    assert_eq!(instance.class_id(), Some("Sensor"));
    assert_eq!(instance.get("name").unwrap().as_str(), Some("test2"));

    instance.set("color", Value::from("green")).unwrap();
    let Value::Promise(description) = instance.call("getDescription", vec![]).unwrap() else {
        panic!("instance method should be deferred");
    };
    assert_eq!(
        description.try_result().unwrap().unwrap().as_str(),
        Some("green test2")
    );
}

#[test]
fn constructor_builds_a_remote_instance() {
    let (host, client) = common::linked();
    register_sensor_class(&host);
    client.request_descriptors().unwrap();

    let sensor_class = client.get_proxy_class("Sensor").unwrap();
    let Value::ProxyObject(instance) = sensor_class.construct(vec![Value::from("direct")]).unwrap()
    else {
        panic!("sync ctor should return an instance proxy");
    };
    assert_eq!(instance.get("name").unwrap().as_str(), Some("direct"));
}

#[test]
fn class_without_ctor_cannot_be_constructed() {
    let (host, client) = common::linked();
    host.register_host_class(
        "Opaque",
        None,
        None,
        ClassDescriptor::new().with_instance(ObjectDescriptor::new()),
    );
    client.request_descriptors().unwrap();

    let opaque = client.get_proxy_class("Opaque").unwrap();
    assert!(matches!(
        opaque.construct(vec![]),
        Err(RpcError::NoConstructor(_))
    ));
}

#[test]
fn class_proxies_are_cached_per_class_id() {
    let (host, client) = common::linked();
    register_sensor_class(&host);
    client.request_descriptors().unwrap();

    let first = client.get_proxy_class("Sensor").unwrap();
    let second = client.get_proxy_class("Sensor").unwrap();
    assert_eq!(first.class_id(), second.class_id());
    assert!(matches!(
        client.get_proxy_class("Unknown"),
        Err(RpcError::UnknownClass(_))
    ));
}

#[test]
fn instance_identity_is_preserved_on_send_back() {
    let (host, client) = common::linked();

    let stable: HostObject = Rc::new(DynObject::new().with_property("tag", Value::from("a")));
    let matched = Rc::new(Cell::new(false));

    let holder = DynObject::new();
    let returned = stable.clone();
    let holder = holder.with_method("getA", move |_| Ok(Value::Instance(returned.clone())));
    let expected = stable.clone();
    let hit = matched.clone();
    let holder = holder.with_method("setA", move |args| {
        if let Some(Value::Instance(received)) = args.first() {
            hit.set(Rc::ptr_eq(received, &expected));
        }
        Ok(Value::null())
    });

    host.register_host_object(
        "holder",
        Rc::new(holder),
        ObjectDescriptor::new()
            .with_function(FunctionDescriptor::named("getA").with_returns(ReturnKind::Sync))
            .with_function(FunctionDescriptor::named("setA").with_returns(ReturnKind::Sync)),
    );
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_object("holder").unwrap();
    let a = proxy.call("getA", vec![]).unwrap();
    assert!(matches!(a, Value::ProxyObject(_)));

    proxy.call("setA", vec![a]).unwrap();
    assert!(matched.get(), "the host must receive its original instance");
}

#[test]
fn repeated_send_back_reuses_one_proxy() {
    let (host, client) = common::linked();

    let stable: HostObject = Rc::new(DynObject::new());
    let returned = stable.clone();
    let holder = DynObject::new().with_method("getA", move |_| Ok(Value::Instance(returned.clone())));

    host.register_host_object(
        "holder",
        Rc::new(holder),
        ObjectDescriptor::new()
            .with_function(FunctionDescriptor::named("getA").with_returns(ReturnKind::Sync)),
    );
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_object("holder").unwrap();
    let Value::ProxyObject(first) = proxy.call("getA", vec![]).unwrap() else {
        panic!("expected an instance proxy");
    };
    let Value::ProxyObject(second) = proxy.call("getA", vec![]).unwrap() else {
        panic!("expected an instance proxy");
    };
    assert!(first.ptr_eq(&second));
}
