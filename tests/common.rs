#![allow(unused)]

use std::sync::Arc;

use dynir::{
    driver::{Session, config::Config},
    ir::{IrScope, Operand, ScopeBuilder},
    runtime::{Exception, MethodTable, RuntimeError, Value},
};
use tracing_subscriber::EnvFilter;

/// Installs a test subscriber, controlled by `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fixnum_arg(args: &[Value]) -> Result<i64, RuntimeError> {
    let arg = args.first().cloned().unwrap_or(Value::Nil);
    arg.as_fixnum().ok_or_else(|| RuntimeError::Type {
        expected: "Integer".to_string(),
        found: arg.class_name().to_string(),
    })
}

fn int_receiver(receiver: &Value) -> Result<i64, RuntimeError> {
    receiver.as_fixnum().ok_or_else(|| RuntimeError::Type {
        expected: "Integer".to_string(),
        found: receiver.class_name().to_string(),
    })
}

fn int_add(receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Fixnum(int_receiver(receiver)? + fixnum_arg(args)?))
}

fn int_sub(receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Fixnum(int_receiver(receiver)? - fixnum_arg(args)?))
}

fn int_mul(receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Fixnum(int_receiver(receiver)? * fixnum_arg(args)?))
}

fn int_lt(receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    Ok(Value::Bool(int_receiver(receiver)? < fixnum_arg(args)?))
}

fn array_size(receiver: &Value, _args: &[Value]) -> Result<Value, RuntimeError> {
    let len = receiver.as_array().map(<[Value]>::len).unwrap_or(0);
    Ok(Value::Fixnum(len as i64))
}

fn array_at(receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let index = fixnum_arg(args)?;
    Ok(receiver
        .as_array()
        .and_then(|values| usize::try_from(index).ok().and_then(|i| values.get(i)))
        .cloned()
        .unwrap_or(Value::Nil))
}

fn array_same(receiver: &Value, args: &[Value]) -> Result<Value, RuntimeError> {
    let other = args.first().cloned().unwrap_or(Value::Nil);
    Ok(Value::Bool(receiver.same_object(&other)))
}

/// A method table with a few integer and array builtins.
pub fn builtins() -> MethodTable {
    let mut methods = MethodTable::new();
    methods.define_builtin("Integer", "+", int_add);
    methods.define_builtin("Integer", "-", int_sub);
    methods.define_builtin("Integer", "*", int_mul);
    methods.define_builtin("Integer", "<", int_lt);
    methods.define_builtin("Array", "size", array_size);
    methods.define_builtin("Array", "[]", array_at);
    methods.define_builtin("Array", "equal?", array_same);
    methods
}

/// `def name(*args)` with the given arity check, returning the args array.
pub fn arity_method(name: &str, required: usize, opt: usize, rest: i32) -> IrScope {
    let mut builder = ScopeBuilder::method(name);
    let args = builder.receive_args();
    builder.check_arity(args, required, opt, rest);
    builder.ret(args);
    builder.finish().unwrap()
}

/// `def add(a, b) = a + b`.
pub fn add_method() -> IrScope {
    let mut builder = ScopeBuilder::method("add");
    let args = builder.receive_args();
    builder.check_arity(args, 2, 0, -1);
    let a = builder.local("a");
    let b = builder.local("b");
    let first = builder.call(args, "[]", vec![Operand::fixnum(0)]);
    builder.copy(a.clone(), first);
    let second = builder.call(args, "[]", vec![Operand::fixnum(1)]);
    builder.copy(b.clone(), second);
    let sum = builder.call(a, "+", vec![Operand::Local(b)]);
    builder.ret(sum);
    builder.finish().unwrap()
}

pub fn fixnums(values: &[i64]) -> Vec<Value> {
    values.iter().copied().map(Value::Fixnum).collect()
}

pub fn run(
    methods: &MethodTable,
    receiver: &Value,
    name: &str,
    args: Vec<Value>,
) -> Result<Value, Exception> {
    Session::new(Config::default()).run_method(methods, receiver, name, args)
}

pub fn shared(scope: IrScope) -> Arc<IrScope> {
    Arc::new(scope)
}
