use std::os::raw::c_int;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ember_host::{Engine, Value};
use ember_native::function;
use ember_sdk::native::{invoke, run_init};
use ember_sdk::{
    AddonEntry, CapabilityTable, ContextHandle, Dispatcher, OwnerThread, ScriptValue, VARARGS,
};

#[function]
fn add(a: f64, b: f64) -> f64 {
    a + b
}

#[function]
fn shout(text: String) -> String {
    text.to_uppercase()
}

unsafe extern "C" fn echo_all(ctx: ContextHandle) -> c_int {
    invoke(ctx, "echoAll", |frame| Ok(Some(ScriptValue::Array(frame.args()?))))
}

unsafe extern "C" fn bench_init(
    ctx: ContextHandle,
    owner: *const OwnerThread,
    table: *const CapabilityTable,
) {
    run_init("bench", ctx, owner, table, |addon, _owner| {
        addon
            .register_function("add", add_native, ADD_ARITY)
            .register_function("shout", shout_native, SHOUT_ARITY)
            .register_function("echoAll", echo_all, VARARGS);
        Ok(())
    })
}

fn engine() -> Engine {
    let mut engine = Engine::new();
    engine
        .load_addon("bench", AddonEntry::new(bench_init, None))
        .unwrap();
    engine
}

fn bench_calls(c: &mut Criterion) {
    let engine = engine();
    let add = engine.get_path("bench.add").unwrap();
    let shout = engine.get_path("bench.shout").unwrap();

    c.bench_function("call_add", |b| {
        let args = [Value::Number(1.0), Value::Number(2.0)];
        b.iter(|| engine.call(&add, black_box(&args)).unwrap());
    });

    c.bench_function("call_shout", |b| {
        let args = [Value::string("hello ember")];
        b.iter(|| engine.call(&shout, black_box(&args)).unwrap());
    });
}

fn bench_varargs(c: &mut Criterion) {
    let engine = engine();
    let echo = engine.get_path("bench.echoAll").unwrap();
    let mut group = c.benchmark_group("echo_all");

    for count in [1usize, 8, 64] {
        let args: Vec<Value> = (0..count).map(|i| Value::Number(i as f64)).collect();
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &args, |b, args| {
            b.iter(|| engine.call(&echo, black_box(args)).unwrap());
        });
    }

    group.finish();
}

fn bench_dispatch(c: &mut Criterion) {
    let engine = Engine::new();
    let dispatcher = Dispatcher::with_scheduler(engine.scheduler());

    c.bench_function("dispatch_and_drain_100", |b| {
        b.iter(|| {
            for i in 0..100u32 {
                dispatcher.dispatch(move || {
                    black_box(i);
                });
            }
            engine.run_pending()
        });
    });
}

criterion_group!(benches, bench_calls, bench_varargs, bench_dispatch);
criterion_main!(benches);
