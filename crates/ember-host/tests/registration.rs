mod common;

use common::{fixture_entry, load_fixture, num, text};
use ember_host::{Engine, HostError, Value};
use ember_sdk::ValueKind;

#[test]
fn test_scalars_are_bound_on_the_namespace() {
    let engine = load_fixture();

    assert_eq!(engine.get_path("fixture.name"), Some(text("fixture")));
    assert_eq!(engine.get_path("fixture.answer"), Some(num(42.0)));
    assert_eq!(engine.get_path("fixture.enabled"), Some(Value::Bool(true)));
}

#[test]
fn test_arrays_keep_their_order() {
    let engine = load_fixture();

    let tags = engine.get_path("fixture.tags").unwrap();
    assert_eq!(tags.kind(), ValueKind::Array);
    assert_eq!(tags.len(), 3);
    assert_eq!(tags.at(0), Some(text("a")));
    assert_eq!(tags.at(2), Some(text("c")));

    let primes = engine.get_path("fixture.primes").unwrap();
    let primes: Vec<f64> = (0..primes.len())
        .filter_map(|i| primes.at(i).and_then(|v| v.as_number()))
        .collect();
    assert_eq!(primes, vec![2.0, 3.0, 5.0, 7.0]);
}

#[test]
fn test_nested_objects() {
    let engine = load_fixture();

    let meta = engine.get_path("fixture.meta").unwrap();
    assert_eq!(meta.kind(), ValueKind::Object);
    assert_eq!(meta.keys(), vec!["author", "build"]);
    assert_eq!(engine.get_path("fixture.meta.author"), Some(text("ember")));
    assert_eq!(engine.get_path("fixture.meta.build.major"), Some(num(1.0)));
    // Registrations after the nested object land back on the namespace.
    assert!(engine.get_path("fixture.author").is_none());
}

#[test]
fn test_functions_are_registered_as_callables() {
    let engine = load_fixture();

    for name in ["sum", "greet", "countArgs", "tick"] {
        let value = engine.get_path(&format!("fixture.{name}")).unwrap();
        assert!(value.is_function(), "{name} should be a function");
    }
}

#[test]
fn test_namespace_is_bound_as_global() {
    let engine = load_fixture();

    assert_eq!(engine.addon_names(), vec!["fixture"]);
    assert_eq!(engine.globals().keys(), vec!["fixture"]);
}

#[test]
fn test_registration_outside_init_is_ignored() {
    let engine = load_fixture();

    let result = engine.call_path("fixture.registerLate", &[]).unwrap();
    assert_eq!(result, Value::Undefined);
    assert!(engine.get_path("fixture.late").is_none());
    assert!(engine.get_path("late").is_none());
}

#[test]
fn test_load_twice_is_rejected() {
    let mut engine = load_fixture();

    let err = engine.load_addon("fixture", fixture_entry()).unwrap_err();
    assert!(matches!(err, HostError::AlreadyLoaded(name) if name == "fixture"));
    // The same addon may be loaded under a second name.
    engine.load_addon("fixture2", fixture_entry()).unwrap();
    assert_eq!(engine.get_path("fixture2.answer"), Some(num(42.0)));
}

#[test]
fn test_unload_all_removes_globals() {
    let mut engine = load_fixture();

    engine.unload_all();
    assert!(engine.addon_names().is_empty());
    assert!(engine.get_path("fixture").is_none());
}

#[test]
fn test_engines_are_independent() {
    let a = load_fixture();
    let b = Engine::new();

    assert!(a.get_path("fixture").is_some());
    assert!(b.get_path("fixture").is_none());
}
