use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use selene_bytecode::{Opcode, ProtoBuilder};
use selene_core::{copy_slice, Interpreter, InterpreterOptions, TransferPolicy, Value};

fn fresh() -> Interpreter {
    Interpreter::bare(InterpreterOptions::default())
}

/// `{ [1] = { n = 1, name = "item" }, ... }`, `len` entries
fn build_list(interp: &mut Interpreter, len: usize) -> Value {
    let list = interp.new_table();
    for i in 0..len {
        let item = interp.new_table();
        let name = interp.new_string("item");
        interp.set_field(item, "n", Value::Number(i as f64)).unwrap();
        interp.set_field(item, "name", name).unwrap();
        interp.raw_set(list, Value::Number(i as f64 + 1.0), item).unwrap();
    }
    list
}

fn bench_atomic(c: &mut Criterion) {
    let mut src = fresh();
    let text = src.new_string("payload");
    let values = [Value::Nil, Value::Boolean(true), Value::Number(3.5), text];

    c.bench_function("copy_atomic", |b| {
        b.iter_batched(
            fresh,
            |mut dst| {
                copy_slice(&src, &mut dst, black_box(&values), TransferPolicy::default()).unwrap()
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_tables(c: &mut Criterion) {
    let mut group = c.benchmark_group("copy_table");
    for len in [16usize, 256, 4096] {
        let mut src = fresh();
        let list = build_list(&mut src, len);
        group.bench_with_input(BenchmarkId::new("list", len), &list, |b, &list| {
            b.iter_batched(
                fresh,
                |mut dst| copy_slice(&src, &mut dst, &[list], TransferPolicy::default()).unwrap(),
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_closures(c: &mut Criterion) {
    // local n = 0; return function(x) n = n + x; return n end
    let mut inner = ProtoBuilder::with_params("accumulate", 1);
    let n = inner.capture_local("n", 0);
    inner.get_upvalue(n).get_local(0).emit(Opcode::Add).set_upvalue(n);
    inner.get_upvalue(n).ret(1);
    let mut outer = ProtoBuilder::new("make");
    let slot = outer.local();
    outer.number(0.0).set_local(slot);
    outer.closure(inner.build().unwrap()).ret(1);

    let mut src = fresh();
    let make = src.load(outer.build().unwrap());
    let closure = src.call(make, vec![]).unwrap()[0];

    c.bench_function("copy_closure", |b| {
        b.iter_batched(
            fresh,
            |mut dst| copy_slice(&src, &mut dst, &[closure], TransferPolicy::default()).unwrap(),
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_atomic, bench_tables, bench_closures);
criterion_main!(benches);
