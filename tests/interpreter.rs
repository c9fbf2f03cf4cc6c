use std::sync::Arc;

use dynir::{
    driver::{
        Session,
        config::{Config, InterpreterConfig},
    },
    ir::{IrScope, Operand, ScopeBuilder, Span},
    runtime::{Frame, RuntimeError, Value},
};

use crate::common::{add_method, builtins, fixnums, init_tracing, run};

mod common;

fn returns_self() -> IrScope {
    let mut builder = ScopeBuilder::method("me");
    builder.ret(Operand::SelfValue);
    builder.finish().unwrap()
}

#[test]
fn self_is_the_receiver() {
    init_tracing();
    let mut methods = builtins();
    methods.define("Point", "me", returns_self());

    let a = Value::object("Point");
    let b = Value::object("Point");
    let from_a = run(&methods, &a, "me", vec![]).unwrap();
    let from_b = run(&methods, &b, "me", vec![]).unwrap();
    assert!(from_a.same_object(&a));
    assert!(from_b.same_object(&b));
    assert!(!from_a.same_object(&from_b));
}

#[test]
fn self_ignores_its_nominal_slot() {
    let scope = returns_self();
    let receiver = Value::object("Point");
    let frame = Frame::new(&scope, receiver.clone(), vec![]);
    frame.scope.borrow_mut().set_slot(0, Value::Fixnum(99));

    assert!(Operand::SelfValue.retrieve(&frame).unwrap().same_object(&receiver));
    assert_eq!(
        Operand::Local(Operand::self_slot()).retrieve(&frame).unwrap(),
        Value::Fixnum(99)
    );
}

#[test]
fn calls_with_arguments() {
    let mut methods = builtins();
    methods.define("Calc", "add", add_method());
    let value = run(&methods, &Value::object("Calc"), "add", fixnums(&[40, 2])).unwrap();
    assert_eq!(value, Value::Fixnum(42));
}

#[test]
fn loops() {
    // i = 5; acc = 0; while 0 < i; acc += i; i -= 1; end; acc
    let mut builder = ScopeBuilder::method("sum_down");
    let i = builder.local("i");
    let acc = builder.local("acc");
    builder.copy(i.clone(), Operand::fixnum(5));
    builder.copy(acc.clone(), Operand::fixnum(0));
    let head = builder.new_label();
    let exit = builder.new_label();
    builder.place_label(head);
    let more = builder.call(Operand::fixnum(0), "<", vec![Operand::Local(i.clone())]);
    builder.branch_false(more, exit);
    let sum = builder.call(acc.clone(), "+", vec![Operand::Local(i.clone())]);
    builder.copy(acc.clone(), sum);
    let next = builder.call(i.clone(), "-", vec![Operand::fixnum(1)]);
    builder.copy(i, next);
    builder.jump(head);
    builder.place_label(exit);
    builder.ret(acc);
    let scope = builder.finish().unwrap();

    let methods = builtins();
    let value = Session::default()
        .run_script(&methods, &scope, Value::Nil)
        .unwrap();
    assert_eq!(value, Value::Fixnum(15));
}

#[test]
fn falling_off_the_end_returns_nil() {
    let mut builder = ScopeBuilder::method("empty");
    let t = builder.temp();
    builder.copy(t, Operand::fixnum(1));
    let scope = builder.finish().unwrap();
    let value = Session::default()
        .run_script(&builtins(), &scope, Value::Nil)
        .unwrap();
    assert_eq!(value, Value::Nil);
}

#[test]
fn exceptions_record_every_frame() {
    let mut methods = builtins();

    let mut builder = ScopeBuilder::method("inner");
    builder.set_span(Some(Span::new(20, 30)));
    let value = builder.call(Operand::fixnum(1), "nope", vec![]);
    builder.ret(value);
    methods.define("Object", "inner", builder.finish().unwrap());

    let mut builder = ScopeBuilder::method("outer");
    builder.set_span(Some(Span::new(0, 5)));
    let value = builder.call(Operand::SelfValue, "inner", vec![]);
    builder.ret(value);
    methods.define("Object", "outer", builder.finish().unwrap());

    let err = run(&methods, &Value::object("Object"), "outer", vec![]).unwrap_err();
    assert_eq!(
        err.error,
        RuntimeError::NoMethod {
            method: "nope".to_string(),
            class: "Integer".to_string(),
        }
    );
    let frames: Vec<_> = err
        .trace
        .iter()
        .map(|entry| (entry.scope.as_str(), entry.span))
        .collect();
    assert_eq!(
        frames,
        vec![
            ("inner", Some(Span::new(20, 30))),
            ("outer", Some(Span::new(0, 5))),
        ]
    );
}

#[test]
fn arity_check_needs_an_array() {
    let mut builder = ScopeBuilder::method("bad");
    builder.check_arity(Operand::fixnum(1), 0, 0, -1);
    builder.ret(Operand::nil());
    let scope = builder.finish().unwrap();
    let err = Session::default()
        .run_script(&builtins(), &scope, Value::Nil)
        .unwrap_err();
    assert_eq!(
        err.error,
        RuntimeError::Type {
            expected: "Array".to_string(),
            found: "Integer".to_string(),
        }
    );
}

/// `def twice = (yield; yield)`.
fn twice() -> IrScope {
    let mut builder = ScopeBuilder::method("twice");
    builder.yield_values(vec![]);
    let last = builder.yield_values(vec![]);
    builder.ret(last);
    builder.finish().unwrap()
}

#[test]
fn blocks_write_to_the_defining_scope() {
    init_tracing();
    let mut methods = builtins();
    methods.define("Object", "twice", twice());

    // counter = 0; twice { counter += 1 }; counter
    let mut builder = ScopeBuilder::method("count");
    let counter = builder.local("counter");

    let mut block = ScopeBuilder::closure("count_block");
    let outer = block.outer_local("counter", 1, counter.offset);
    let next = block.call(outer.clone(), "+", vec![Operand::fixnum(1)]);
    block.copy(outer, next);
    block.ret(next);
    let block = Arc::new(block.finish().unwrap());

    builder.copy(counter.clone(), Operand::fixnum(0));
    builder.call_with_closure(Operand::SelfValue, "twice", vec![], block);
    builder.ret(counter);
    methods.define("Object", "count", builder.finish().unwrap());

    let value = run(&methods, &Value::object("Object"), "count", vec![]).unwrap();
    assert_eq!(value, Value::Fixnum(2));
}

#[test]
fn blocks_receive_arguments_and_self() {
    let mut methods = builtins();

    let mut builder = ScopeBuilder::method("apply");
    let value = builder.yield_values(vec![Operand::fixnum(10)]);
    builder.ret(value);
    methods.define("Object", "apply", builder.finish().unwrap());

    // apply { |v| [v * 2, self] }
    let mut block = ScopeBuilder::closure("apply_block");
    let args = block.receive_args();
    let v = block.call(args, "[]", vec![Operand::fixnum(0)]);
    let doubled = block.call(v, "*", vec![Operand::fixnum(2)]);
    block.ret(Operand::Array(vec![Operand::Temp(doubled), Operand::SelfValue]));
    let block = Arc::new(block.finish().unwrap());

    let mut builder = ScopeBuilder::method("run");
    let value = builder.call_with_closure(Operand::SelfValue, "apply", vec![], block);
    builder.ret(value);
    methods.define("Object", "run", builder.finish().unwrap());

    let receiver = Value::object("Object");
    let value = run(&methods, &receiver, "run", vec![]).unwrap();
    let values = value.as_array().unwrap();
    assert_eq!(values[0], Value::Fixnum(20));
    assert!(values[1].same_object(&receiver));
}

#[test]
fn yield_without_block() {
    let mut methods = builtins();
    methods.define("Object", "twice", twice());
    let err = run(&methods, &Value::object("Object"), "twice", vec![]).unwrap_err();
    assert_eq!(err.error, RuntimeError::NoBlockGiven);
    assert_eq!(err.to_string(), "no block given (yield)");
}

#[test]
fn deep_recursion_overflows() {
    let mut builder = ScopeBuilder::method("forever");
    let value = builder.call(Operand::SelfValue, "forever", vec![]);
    builder.ret(value);
    let mut methods = builtins();
    methods.define("Object", "forever", builder.finish().unwrap());

    let session = Session::new(Config {
        interpreter: InterpreterConfig { max_call_depth: 10 },
        ..Config::default()
    });
    let err = session
        .run_method(&methods, &Value::object("Object"), "forever", vec![])
        .unwrap_err();
    assert_eq!(err.error, RuntimeError::StackOverflow { depth: 11 });
    assert_eq!(err.trace.len(), 11);
    assert!(err.trace.iter().all(|entry| entry.scope == "forever"));
}

#[test]
fn unknown_method_on_receiver() {
    let err = run(&builtins(), &Value::Nil, "frobnicate", vec![]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "undefined method \"frobnicate\" for an instance of NilClass"
    );
    assert!(err.trace.is_empty());
}
