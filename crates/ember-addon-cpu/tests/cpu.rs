use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use ember_addon_cpu::{ember_addon_init, ember_addon_unload};
use ember_host::{Engine, ScriptError, Value};
use ember_sdk::AddonEntry;
use parking_lot::{const_mutex, Mutex};

// The monitor is addon-wide state; tests take turns.
static SERIAL: Mutex<()> = const_mutex(());

const WAIT: Duration = Duration::from_secs(5);

fn engine() -> Engine {
    let mut engine = Engine::new();
    engine
        .load_addon("cpu", AddonEntry::new(ember_addon_init, Some(ember_addon_unload)))
        .unwrap();
    engine
}

fn is_running(engine: &Engine) -> bool {
    engine.call_path("cpu.isRunning", &[]) == Ok(Value::Bool(true))
}

/// A callback recording every usage value it receives
fn recorder(engine: &Engine) -> (Value, Rc<RefCell<Vec<f64>>>) {
    let samples = Rc::new(RefCell::new(Vec::new()));
    let log = samples.clone();
    let owner = thread::current().id();
    let callback = engine.script_function("onUpdate", move |_ctx, args| {
        assert_eq!(thread::current().id(), owner);
        let usage = args.first().and_then(Value::as_number).unwrap_or(f64::NAN);
        log.borrow_mut().push(usage);
        Ok(Value::Undefined)
    });
    (callback, samples)
}

#[test]
fn test_exports() {
    let _serial = SERIAL.lock();
    let engine = engine();

    for name in ["start", "stop", "isRunning"] {
        assert!(engine.get_path(&format!("cpu.{name}")).unwrap().is_function());
    }
    assert_eq!(engine.get_path("cpu.defaultIntervalMs"), Some(Value::Number(1000.0)));
}

#[test]
fn test_stop_when_idle_is_a_no_op() {
    let _serial = SERIAL.lock();
    let engine = engine();

    assert!(!is_running(&engine));
    assert_eq!(engine.call_path("cpu.stop", &[]), Ok(Value::Undefined));
    assert_eq!(engine.call_path("cpu.stop", &[]), Ok(Value::Undefined));
    assert!(!is_running(&engine));
}

#[test]
fn test_start_requires_a_callback() {
    let _serial = SERIAL.lock();
    let engine = engine();

    let err = engine.call_path("cpu.start", &[Value::Number(1.0)]).unwrap_err();
    assert_eq!(
        err,
        ScriptError::Thrown("start(): argument 0: expected function, got number".to_string())
    );
    assert!(!is_running(&engine));
}

#[test]
fn test_start_rejects_bad_interval() {
    let _serial = SERIAL.lock();
    let engine = engine();
    let (callback, _samples) = recorder(&engine);

    let err = engine
        .call_path("cpu.start", &[callback, Value::Number(0.0)])
        .unwrap_err();
    assert!(matches!(err, ScriptError::Thrown(msg) if msg.contains("interval")));
    assert!(!is_running(&engine));
}

#[test]
fn test_updates_arrive_on_owner_thread() {
    let _serial = SERIAL.lock();
    let engine = engine();
    let (callback, samples) = recorder(&engine);

    engine
        .call_path("cpu.start", &[callback, Value::Number(10.0)])
        .unwrap();
    assert!(is_running(&engine));
    assert!(engine.run_until(WAIT, || samples.borrow().len() >= 3));
    for usage in samples.borrow().iter() {
        assert!((0.0..=100.0).contains(usage), "usage {usage} out of range");
    }

    engine.call_path("cpu.stop", &[]).unwrap();
    assert!(!is_running(&engine));
    // Samples still queued at stop are skipped.
    let seen = samples.borrow().len();
    engine.run_for(Duration::from_millis(50));
    assert_eq!(samples.borrow().len(), seen);

    // Stopping twice equals stopping once.
    assert_eq!(engine.call_path("cpu.stop", &[]), Ok(Value::Undefined));
}

#[test]
fn test_restart_replaces_callback() {
    let _serial = SERIAL.lock();
    let engine = engine();
    let (first, first_samples) = recorder(&engine);
    let (second, second_samples) = recorder(&engine);

    engine
        .call_path("cpu.start", &[first, Value::Number(10.0)])
        .unwrap();
    engine
        .call_path("cpu.start", &[second, Value::Number(10.0)])
        .unwrap();
    // The first reference was released when replaced.
    assert_eq!(engine.context().captured_functions(), 1);

    assert!(engine.run_until(WAIT, || second_samples.borrow().len() >= 2));
    assert!(first_samples.borrow().is_empty());

    engine.call_path("cpu.stop", &[]).unwrap();
    assert!(!is_running(&engine));

    // Start after stop spawns a fresh worker.
    let (third, third_samples) = recorder(&engine);
    engine
        .call_path("cpu.start", &[third, Value::Number(10.0)])
        .unwrap();
    assert!(is_running(&engine));
    assert!(engine.run_until(WAIT, || !third_samples.borrow().is_empty()));
    engine.call_path("cpu.stop", &[]).unwrap();
}

#[test]
fn test_unload_stops_monitoring() {
    let _serial = SERIAL.lock();
    let mut engine = engine();
    let (callback, samples) = recorder(&engine);

    engine
        .call_path("cpu.start", &[callback, Value::Number(5.0)])
        .unwrap();
    assert!(engine.run_until(WAIT, || !samples.borrow().is_empty()));

    engine.unload_all();
    let seen = samples.borrow().len();
    engine.run_for(Duration::from_millis(50));
    assert_eq!(samples.borrow().len(), seen);
}

#[test]
fn test_dropping_a_running_engine() {
    let _serial = SERIAL.lock();
    let engine = engine();
    let (callback, _samples) = recorder(&engine);

    engine
        .call_path("cpu.start", &[callback, Value::Number(5.0)])
        .unwrap();
    drop(engine);

    // A fresh engine starts from a clean monitor.
    let engine = self::engine();
    assert!(!is_running(&engine));
}
