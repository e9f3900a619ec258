//! End-to-end tests for revocation: revoked wrappers fail distinctly,
//! unrelated graph pairs keep working.

use membrane_rs::{Error, Membrane, Value};
use pretty_assertions::assert_eq;

fn assert_revoked<T: std::fmt::Debug>(result: membrane_rs::Result<T>) {
    match result {
        Err(Error::RevokedWrapper { .. }) => {}
        other => panic!("expected RevokedWrapper, got {other:?}"),
    }
}

// ============================================================================
// 1. Revoking a destination graph kills its wrappers
// ============================================================================

#[test]
fn test_operations_on_revoked_wrapper_fail() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "k", Value::from(1)).unwrap();
    let wrapper = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();
    assert_eq!(membrane.get(wrapper.clone(), "k").unwrap(), Value::from(1));

    dry.revoke_everything().unwrap();

    assert_revoked(membrane.get(wrapper.clone(), "k"));
    assert_revoked(membrane.has(wrapper.clone(), "k"));
    assert_revoked(membrane.set(wrapper.clone(), "k", Value::from(2)));
    assert_revoked(membrane.own_keys(wrapper.clone()));
    assert_revoked(membrane.delete_property(wrapper.clone(), "k"));
    assert_revoked(membrane.call(wrapper.clone(), Value::Null, &[]));
    assert_revoked(membrane.convert_argument_to_proxy(&dry, &wet, wrapper));

    // the original is untouched and stays usable
    assert_eq!(membrane.get(x, "k").unwrap(), Value::from(1));
}

// ============================================================================
// 2. Revoking a home graph kills every foreign view of its originals
// ============================================================================

#[test]
fn test_revoking_home_graph_kills_foreign_views() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    let damp = membrane.get_graph_handler("damp", true).unwrap();

    let x = wet.create_object().unwrap();
    let x_dry = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();
    let x_damp = membrane.convert_argument_to_proxy(&wet, &damp, x).unwrap();

    wet.revoke_everything().unwrap();

    assert_revoked(membrane.own_keys(x_dry));
    assert_revoked(membrane.own_keys(x_damp));
}

// ============================================================================
// 3. Unrelated graph pairs keep working
// ============================================================================

#[test]
fn test_unrelated_graph_pairs_survive() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();
    let damp = membrane.get_graph_handler("damp", true).unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "k", Value::from(1)).unwrap();
    let y = damp.create_object().unwrap();
    membrane.set(y.clone(), "j", Value::from(2)).unwrap();

    let x_dry = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();
    let x_damp = membrane.convert_argument_to_proxy(&wet, &damp, x).unwrap();
    let y_wet = membrane.convert_argument_to_proxy(&damp, &wet, y).unwrap();

    // dry touches neither damp-as-destination nor damp-as-home
    dry.revoke_everything().unwrap();

    assert_revoked(membrane.get(x_dry, "k"));
    assert_eq!(membrane.get(x_damp, "k").unwrap(), Value::from(1));
    assert_eq!(membrane.get(y_wet, "j").unwrap(), Value::from(2));
}

// ============================================================================
// 4. After revocation the identity table is clean
// ============================================================================

#[test]
fn test_fresh_wrapper_after_revocation() {
    let membrane = Membrane::new();
    let wet = membrane.get_graph_handler("wet", true).unwrap();
    let dry = membrane.get_graph_handler("dry", true).unwrap();

    let x = wet.create_object().unwrap();
    membrane.set(x.clone(), "k", Value::from(1)).unwrap();
    let old = membrane.convert_argument_to_proxy(&wet, &dry, x.clone()).unwrap();

    dry.revoke_everything().unwrap();

    // a new conversion builds a fresh, working wrapper; the old one stays dead
    let fresh = membrane.convert_argument_to_proxy(&wet, &dry, x).unwrap();
    assert_ne!(fresh, old);
    assert_eq!(membrane.get(fresh, "k").unwrap(), Value::from(1));
    assert_revoked(membrane.get(old, "k"));
}

// ============================================================================
// 5. Revoking an unknown graph
// ============================================================================

#[test]
fn test_revoke_unknown_graph_fails() {
    let membrane = Membrane::new();
    let err = membrane.revoke_everything("never-created").unwrap_err();
    assert!(matches!(err, Error::UnknownGraph(name) if name == "never-created"));
}
