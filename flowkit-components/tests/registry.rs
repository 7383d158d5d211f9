//! Registry-level invariants across the full component catalog.

use flowkit_components::register_all;
use flowkit_components::common::router::RouterSettings;
use flowkit_core::prelude::*;

#[tokio::test]
async fn instances_from_the_registry_are_independent() {
    let mut registry = ComponentRegistry::new();
    register_all(&mut registry).unwrap();

    let a = registry.instance("router").unwrap();
    let b = registry.instance("router").unwrap();

    let settings = Message::encode(&RouterSettings {
        routes: vec!["only".to_string()],
        enable_default_port: false,
    })
    .unwrap();
    a.handle(
        CancellationToken::new(),
        noop_handler(),
        flowkit_core::port::SETTINGS_PORT,
        settings,
    )
    .await
    .unwrap();

    let a_names: Vec<_> = a.ports().into_iter().map(|p| p.name).collect();
    let b_names: Vec<_> = b.ports().into_iter().map(|p| p.name).collect();

    assert!(a_names.contains(&"out_only".to_string()));
    assert!(!a_names.contains(&"default".to_string()));
    // the sibling instance still shows the prototype defaults
    assert!(b_names.contains(&"out_a".to_string()));
    assert!(b_names.contains(&"default".to_string()));
}

#[test]
fn every_component_reports_consistent_metadata() {
    let mut registry = ComponentRegistry::new();
    register_all(&mut registry).unwrap();

    for info in registry.infos() {
        assert!(!info.name.is_empty());
        assert!(!info.description.is_empty());

        let instance = registry.instance(&info.name).unwrap();
        assert_eq!(instance.info(), info, "instance metadata drifted");
        assert!(
            !instance.ports().is_empty(),
            "component {} declares no ports",
            info.name
        );
    }
}
