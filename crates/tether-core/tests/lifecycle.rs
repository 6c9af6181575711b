//! Disposal and finalisation: disposed proxies fail per call mode,
//! reclamation notifies the origin, and dispose is idempotent.

mod common;

use tether_core::{HostFunction, PromiseState, RpcError, RpcSession, Value};
use tether_proto::{FunctionDescriptor, ReturnKind};

fn register_echo(host: &RpcSession, id: &str, returns: ReturnKind) {
    host.register_host_function(
        id,
        HostFunction::new(|args| Ok(args.into_iter().next().unwrap_or(Value::null()))),
        FunctionDescriptor::named(id).with_returns(returns),
    );
}

#[test]
fn disposed_proxy_raises_for_void_and_sync() {
    let (host, client) = common::linked();
    register_echo(&host, "voidFn", ReturnKind::Void);
    register_echo(&host, "syncFn", ReturnKind::Sync);
    client.request_descriptors().unwrap();

    for id in ["voidFn", "syncFn"] {
        let proxy = client.get_proxy_function(id).unwrap();
        proxy.dispose();
        assert!(proxy.is_disposed());
        assert!(matches!(proxy.invoke(vec![]), Err(RpcError::Disposed)));
    }
}

#[test]
fn disposed_proxy_rejects_for_async() {
    let (host, client) = common::linked();
    register_echo(&host, "asyncFn", ReturnKind::Async);
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_function("asyncFn").unwrap();
    proxy.dispose();

    let Ok(Value::Promise(rejected)) = proxy.invoke(vec![]) else {
        panic!("async invocation of a disposed proxy must reject, not raise");
    };
    assert_eq!(rejected.state(), PromiseState::Rejected);
    assert!(matches!(
        rejected.try_result().unwrap().unwrap_err(),
        RpcError::Disposed
    ));
}

#[test]
fn dispose_notifies_the_origin() {
    let (host, client) = common::linked();
    register_echo(&host, "echo", ReturnKind::Sync);
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_function("echo").unwrap();
    assert_eq!(
        proxy.invoke(vec![Value::from("hi")]).unwrap().as_str(),
        Some("hi")
    );
    proxy.dispose();

    // The host entry is gone: a freshly materialised proxy now fails
    // remotely.
    let stale = client.get_proxy_function("echo").unwrap();
    let error = stale.invoke(vec![Value::from("hi")]).unwrap_err();
    assert!(error.to_string().contains("unknown function"));
}

#[test]
fn reclamation_notifies_the_origin() {
    let (host, client) = common::linked();
    register_echo(&host, "echo", ReturnKind::Sync);
    client.request_descriptors().unwrap();

    {
        let proxy = client.get_proxy_function("echo").unwrap();
        let clone = proxy.clone();
        drop(proxy);
        // A surviving clone keeps the proxy alive.
        assert_eq!(
            clone.invoke(vec![Value::from("hi")]).unwrap().as_str(),
            Some("hi")
        );
    }

    let stale = client.get_proxy_function("echo").unwrap();
    let error = stale.invoke(vec![Value::from("hi")]).unwrap_err();
    assert!(error.to_string().contains("unknown function"));
}

#[test]
fn dispose_is_idempotent_across_reregistration() {
    let (host, client) = common::linked();
    register_echo(&host, "echo", ReturnKind::Sync);
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_function("echo").unwrap();
    proxy.dispose();

    // The host re-registers under the same id; neither a second dispose
    // nor the eventual drop may emit another obj_died.
    register_echo(&host, "echo", ReturnKind::Sync);
    proxy.dispose();
    drop(proxy);

    let fresh = client.get_proxy_function("echo").unwrap();
    assert_eq!(
        fresh.invoke(vec![Value::from("ok")]).unwrap().as_str(),
        Some("ok")
    );
}

#[test]
fn disposed_object_proxy_fails_every_surface() {
    let (host, client) = common::linked();

    let target = std::rc::Rc::new(
        tether_core::DynObject::new().with_property("n", Value::from(1i64)),
    );
    host.register_host_object(
        "obj",
        target,
        tether_proto::ObjectDescriptor::new()
            .with_proxied_property(tether_proto::PropertyDescriptor::new("n"))
            .with_function(FunctionDescriptor::named("poke")),
    );
    client.request_descriptors().unwrap();

    let proxy = client.get_proxy_object("obj").unwrap();
    proxy.dispose();
    proxy.dispose();

    assert!(matches!(proxy.get("n"), Err(RpcError::Disposed)));
    assert!(matches!(
        proxy.set("n", Value::from(2i64)),
        Err(RpcError::Disposed)
    ));
    let Ok(Value::Promise(rejected)) = proxy.call("poke", vec![]) else {
        panic!("async method on a disposed proxy must reject");
    };
    assert!(matches!(
        rejected.try_result().unwrap().unwrap_err(),
        RpcError::Disposed
    ));
}
