//! End-to-end tests for distortion enforcement: key filtering, trap
//! subsets, local stores, truncation, shadow targets, and configuration
//! validation through the public API.

use membrane_rs::{
    ALL_OPERATIONS, DistortionsConfig, Error, Membrane, Operation, TruncateArgList, Value,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn traps_without(excluded: &[Operation]) -> Vec<String> {
    ALL_OPERATIONS
        .iter()
        .filter(|op| !excluded.contains(op))
        .map(|op| op.as_str().to_string())
        .collect()
}

// ============================================================================
// 1. filterOwnKeys: hidden consistently across every reading trap
// ============================================================================

#[test]
fn test_filtered_key_invisible_everywhere() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    dry.set_distortions(DistortionsConfig {
        filter_own_keys: Some(vec!["a".into()]),
        ..Default::default()
    })
    .unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "a", Value::from(1)).unwrap();
    membrane.set(x.clone(), "b", Value::from(2)).unwrap();

    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();

    // invisible through the wrapper
    assert!(!membrane.has(wrapper.clone(), "a").unwrap());
    assert_eq!(membrane.get(wrapper.clone(), "a").unwrap(), Value::Null);
    assert!(membrane.get_own_property_descriptor(wrapper.clone(), "a").unwrap().is_none());
    assert_eq!(membrane.own_keys(wrapper.clone()).unwrap(), vec!["b"]);

    // the unfiltered key behaves normally
    assert!(membrane.has(wrapper.clone(), "b").unwrap());
    assert_eq!(membrane.get(wrapper, "b").unwrap(), Value::from(2));

    // present and mutable on the original
    assert!(membrane.has(x.clone(), "a").unwrap());
    assert!(membrane.set(x.clone(), "a", Value::from(10)).unwrap());
    assert_eq!(membrane.get(x, "a").unwrap(), Value::from(10));
}

#[test]
fn test_set_on_filtered_key_never_reaches_original() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    dry.set_distortions(DistortionsConfig {
        filter_own_keys: Some(vec!["a".into()]),
        ..Default::default()
    })
    .unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "a", Value::from(1)).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();

    assert!(membrane.set(wrapper.clone(), "a", Value::from(99)).unwrap());
    // the write stayed on the wrapper's local state
    assert_eq!(membrane.get(x, "a").unwrap(), Value::from(1));
    assert_eq!(membrane.get(wrapper, "a").unwrap(), Value::from(99));
}

#[test]
fn test_delete_of_filtered_key_is_noop() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    dry.set_distortions(DistortionsConfig {
        filter_own_keys: Some(vec!["a".into()]),
        ..Default::default()
    })
    .unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "a", Value::from(1)).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();

    // deleting a key that appears non-existent succeeds without forwarding
    assert!(membrane.delete_property(wrapper, "a").unwrap());
    assert_eq!(membrane.get(x, "a").unwrap(), Value::from(1));
}

// ============================================================================
// 2. proxyTraps: excluded operations fall back to pass-through
// ============================================================================

#[test]
fn test_disabled_traps_bypass_distortions() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "a", Value::from(1)).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x).unwrap();

    // filter active, every trap intercepted: hidden
    dry.set_distortions(DistortionsConfig {
        filter_own_keys: Some(vec!["a".into()]),
        ..Default::default()
    })
    .unwrap();
    assert!(!membrane.has(wrapper.clone(), "a").unwrap());
    assert_eq!(membrane.get(wrapper.clone(), "a").unwrap(), Value::Null);

    // same filter, but no traps configured: pass-through ignores it
    dry.set_distortions(DistortionsConfig {
        filter_own_keys: Some(vec!["a".into()]),
        proxy_traps: vec![],
        ..Default::default()
    })
    .unwrap();
    assert!(membrane.has(wrapper.clone(), "a").unwrap());
    assert_eq!(membrane.get(wrapper.clone(), "a").unwrap(), Value::from(1));
    assert_eq!(membrane.own_keys(wrapper).unwrap(), vec!["a"]);
}

#[test]
fn test_partial_trap_subset() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    dry.set_distortions(DistortionsConfig {
        filter_own_keys: Some(vec!["a".into()]),
        proxy_traps: traps_without(&[Operation::Get]),
        ..Default::default()
    })
    .unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "a", Value::from(1)).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x).unwrap();

    // has is intercepted and filtered; get is not intercepted
    assert!(!membrane.has(wrapper.clone(), "a").unwrap());
    assert_eq!(membrane.get(wrapper, "a").unwrap(), Value::from(1));
}

// ============================================================================
// 3. storeUnknownAsLocal / requireLocalDelete
// ============================================================================

#[test]
fn test_store_unknown_as_local() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    let damp = membrane.get_graph_handler("damp", true).unwrap();
    dry.set_distortions(DistortionsConfig {
        store_unknown_as_local: true,
        ..Default::default()
    })
    .unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "known", Value::from(1)).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();

    // unknown key: recorded on the wrapper only
    assert!(membrane.set(wrapper.clone(), "unknown", Value::from("local")).unwrap());
    assert_eq!(membrane.get(wrapper.clone(), "unknown").unwrap(), Value::from("local"));
    assert!(!membrane.has(x.clone(), "unknown").unwrap());
    assert_eq!(membrane.own_keys(wrapper.clone()).unwrap(), vec!["known", "unknown"]);

    // known key: forwarded as usual
    assert!(membrane.set(wrapper, "known", Value::from(2)).unwrap());
    assert_eq!(membrane.get(x.clone(), "known").unwrap(), Value::from(2));

    // an undistorted view never sees the local key
    let other = membrane.convert_argument_to_proxy(&wet, &damp, x).unwrap();
    assert!(!membrane.has(other, "unknown").unwrap());
}

#[test]
fn test_require_local_delete() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    dry.set_distortions(DistortionsConfig {
        require_local_delete: true,
        ..Default::default()
    })
    .unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "k", Value::from(1)).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();

    assert!(membrane.delete_property(wrapper.clone(), "k").unwrap());
    // gone through the wrapper
    assert!(!membrane.has(wrapper.clone(), "k").unwrap());
    assert_eq!(membrane.get(wrapper.clone(), "k").unwrap(), Value::Null);
    assert!(membrane.own_keys(wrapper.clone()).unwrap().is_empty());
    // untouched on the original
    assert_eq!(membrane.get(x, "k").unwrap(), Value::from(1));

    // a later write through the wrapper resurrects the key locally
    assert!(membrane.set(wrapper.clone(), "k", Value::from(5)).unwrap());
    assert_eq!(membrane.get(wrapper, "k").unwrap(), Value::from(5));
}

// ============================================================================
// 4. truncateArgList
// ============================================================================

#[test]
fn test_truncate_arg_list() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();

    let seen = std::sync::Arc::new(parking_lot::Mutex::new(0usize));
    let counter = seen.clone();
    let f = wet
        .create_function(2, move |_m, _this, args| {
            *counter.lock() = args.len();
            Ok(Value::Null)
        })
        .unwrap();
    let wrapped = membrane.convert_argument_to_proxy(&wet, &dry, f).unwrap();
    let args = [Value::from(1), Value::from(2), Value::from(3)];

    // false: everything forwarded
    dry.set_distortions(DistortionsConfig {
        truncate_arg_list: TruncateArgList::Flag(false),
        ..Default::default()
    })
    .unwrap();
    membrane.call(wrapped.clone(), Value::Null, &args).unwrap();
    assert_eq!(*seen.lock(), 3);

    // true: truncated to the callee's declared arity
    dry.set_distortions(DistortionsConfig {
        truncate_arg_list: TruncateArgList::Flag(true),
        ..Default::default()
    })
    .unwrap();
    membrane.call(wrapped.clone(), Value::Null, &args).unwrap();
    assert_eq!(*seen.lock(), 2);

    // integer: capped at that many positions
    dry.set_distortions(DistortionsConfig {
        truncate_arg_list: TruncateArgList::Limit(1),
        ..Default::default()
    })
    .unwrap();
    membrane.call(wrapped, Value::Null, &args).unwrap();
    assert_eq!(*seen.lock(), 1);
}

// ============================================================================
// 5. useShadowTarget: structural inspection never reaches the original
// ============================================================================

#[test]
fn test_shadow_target_disguises_structure() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    dry.set_distortions(DistortionsConfig {
        use_shadow_target: true,
        proxy_traps: traps_without(&[
            Operation::GetOwnPropertyDescriptor,
            Operation::OwnKeys,
        ]),
        ..Default::default()
    })
    .unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "secret", Value::from("classified")).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x).unwrap();

    // non-intercepted structural inspection sees only the placeholder
    assert!(membrane.own_keys(wrapper.clone()).unwrap().is_empty());
    assert!(
        membrane.get_own_property_descriptor(wrapper.clone(), "secret").unwrap().is_none()
    );

    // intercepted operations still mediate the real original
    assert_eq!(membrane.get(wrapper.clone(), "secret").unwrap(), Value::from("classified"));
    assert!(membrane.is_extensible(wrapper).unwrap());
}

#[test]
fn test_shadow_shares_extensibility() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    dry.set_distortions(DistortionsConfig {
        use_shadow_target: true,
        proxy_traps: traps_without(&[Operation::IsExtensible]),
        ..Default::default()
    })
    .unwrap();

    let x = wet.create_object().unwrap();
    membrane.prevent_extensions(x.clone()).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x).unwrap();

    // the shadow copied the original's extensibility at wrap time
    assert!(!membrane.is_extensible(wrapper).unwrap());
}

// ============================================================================
// 6. Configuration validation through the public surface
// ============================================================================

#[test]
fn test_invalid_config_rejected_before_state_changes() {
    let membrane = Membrane::new();
    membrane.get_graph_handler("dry", true).unwrap();
    let dry = membrane.get_graph_handler("dry", false).unwrap();

    let bad = DistortionsConfig {
        truncate_arg_list: TruncateArgList::Limit(-1),
        ..Default::default()
    };
    let err = membrane.modify_rules().replace_distortions("dry", bad).unwrap_err();
    assert!(matches!(err, Error::Configuration { field: "truncateArgList", .. }));

    // the graph's configuration is unchanged
    assert_eq!(dry.distortions(), DistortionsConfig::default());
}

#[test]
fn test_unknown_and_duplicate_trap_names_name_the_field() {
    let unknown = DistortionsConfig {
        proxy_traps: vec!["get".into(), "getOwnPropertyNames".into()],
        ..Default::default()
    };
    match unknown.validate().unwrap_err() {
        Error::Configuration { field, message } => {
            assert_eq!(field, "proxyTraps");
            assert!(message.contains("getOwnPropertyNames"));
        }
        other => panic!("unexpected: {other:?}"),
    }

    let duplicate = DistortionsConfig {
        proxy_traps: vec!["get".into(), "get".into()],
        ..Default::default()
    };
    assert!(matches!(
        duplicate.validate().unwrap_err(),
        Error::Configuration { field: "proxyTraps", .. }
    ));
}

#[test]
fn test_config_arrives_as_json() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();

    let json = r#"{
        "formatVersion": "1.0",
        "dataVersion": "0.1",
        "filterOwnKeys": ["a"],
        "proxyTraps": [
            "getPrototypeOf", "setPrototypeOf", "isExtensible",
            "preventExtensions", "getOwnPropertyDescriptor", "defineProperty",
            "has", "get", "set", "deleteProperty", "ownKeys", "apply",
            "construct"
        ],
        "inheritFilter": false,
        "storeUnknownAsLocal": false,
        "requireLocalDelete": false,
        "useShadowTarget": false,
        "truncateArgList": 3
    }"#;
    let config = DistortionsConfig::from_json(json).unwrap();
    dry.set_distortions(config).unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "a", Value::from(1)).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x).unwrap();
    assert!(!membrane.has(wrapper, "a").unwrap());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_two_part_versions_validate(major in 0u32..1000, minor in 0u32..1000) {
        let cfg = DistortionsConfig {
            format_version: format!("{major}.{minor}"),
            data_version: format!("{minor}.{major}"),
            ..Default::default()
        };
        prop_assert!(cfg.validate().is_ok());
    }

    #[test]
    fn prop_single_component_versions_fail(major in 0u32..1000) {
        let cfg = DistortionsConfig {
            format_version: format!("{major}"),
            ..Default::default()
        };
        let is_expected_err = matches!(
            cfg.validate(),
            Err(Error::Configuration { field: "formatVersion", .. })
        );
        prop_assert!(is_expected_err);
    }

    #[test]
    fn prop_distinct_trap_subsets_validate(mask in 0u16..(1 << 13)) {
        let traps: Vec<String> = ALL_OPERATIONS
            .iter()
            .enumerate()
            .filter(|(i, _)| mask & (1 << i) != 0)
            .map(|(_, op)| op.as_str().to_string())
            .collect();
        let cfg = DistortionsConfig { proxy_traps: traps, ..Default::default() };
        prop_assert!(cfg.validate().is_ok());
    }
}
