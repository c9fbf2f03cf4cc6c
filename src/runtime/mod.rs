//! The part of the object model the IR needs at interpretation time.

use std::{cell::RefCell, fmt, rc::Rc, sync::Arc};

use educe::Educe;
use itertools::Itertools;

use crate::ir::{IrScope, Literal, LocalVariable, TemporaryVariable, Variable};

mod errors;
mod methods;

pub use errors::{ArityError, Exception, RuntimeError, TraceEntry};
pub use methods::{Builtin, Method, MethodTable};

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Fixnum(i64),
    String(Rc<str>),
    Symbol(Rc<str>),
    Array(Rc<Vec<Value>>),
    Object(Rc<Object>),
}

/// An instance of a user class. Compared by identity.
#[derive(Debug)]
pub struct Object {
    pub class: String,
}

impl Value {
    pub fn array(values: Vec<Value>) -> Self {
        Value::Array(Rc::new(values))
    }

    pub fn string(value: &str) -> Self {
        Value::String(value.into())
    }

    pub fn symbol(value: &str) -> Self {
        Value::Symbol(value.into())
    }

    pub fn object(class: impl Into<String>) -> Self {
        Value::Object(Rc::new(Object {
            class: class.into(),
        }))
    }

    /// Only nil and false are falsy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_fixnum(&self) -> Option<i64> {
        match self {
            Value::Fixnum(value) => Some(*value),
            _ => None,
        }
    }

    /// The class methods are looked up in.
    pub fn class_name(&self) -> &str {
        match self {
            Value::Nil => "NilClass",
            Value::Bool(true) => "TrueClass",
            Value::Bool(false) => "FalseClass",
            Value::Fixnum(_) => "Integer",
            Value::String(_) => "String",
            Value::Symbol(_) => "Symbol",
            Value::Array(_) => "Array",
            Value::Object(object) => object.class.as_str(),
        }
    }

    /// Whether both values are the very same heap object.
    pub fn same_object(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => self == other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Fixnum(a), Value::Fixnum(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&Literal> for Value {
    fn from(literal: &Literal) -> Self {
        match literal {
            Literal::Nil => Value::Nil,
            Literal::Bool(value) => Value::Bool(*value),
            Literal::Fixnum(value) => Value::Fixnum(*value),
            Literal::String(value) => Value::string(value),
            Literal::Symbol(value) => Value::symbol(value),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Fixnum(value) => write!(f, "{value}"),
            Value::String(value) => write!(f, "{value:?}"),
            Value::Symbol(value) => write!(f, ":{value}"),
            Value::Array(values) => write!(f, "[{}]", values.iter().join(", ")),
            Value::Object(object) => write!(f, "#<{}>", object.class),
        }
    }
}

pub type ScopeRef = Rc<RefCell<DynamicScope>>;

/// Variable storage of one activation, chained to the enclosing scopes.
#[derive(Debug, Default)]
pub struct DynamicScope {
    slots: Vec<Value>,
    parent: Option<ScopeRef>,
}

impl DynamicScope {
    pub fn new(size: usize) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            slots: vec![Value::Nil; size],
            parent: None,
        }))
    }

    pub fn child(parent: &ScopeRef, size: usize) -> ScopeRef {
        Rc::new(RefCell::new(Self {
            slots: vec![Value::Nil; size],
            parent: Some(parent.clone()),
        }))
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    /// Unset slots read as nil.
    pub fn slot(&self, offset: u32) -> Value {
        self.slots
            .get(offset as usize)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub fn set_slot(&mut self, offset: u32, value: Value) {
        let offset = offset as usize;
        if offset >= self.slots.len() {
            self.slots.resize(offset + 1, Value::Nil);
        }
        self.slots[offset] = value;
    }
}

/// Walks `depth` parents up from `scope`.
pub fn ancestor(scope: &ScopeRef, depth: u32) -> Result<ScopeRef, RuntimeError> {
    let mut current = scope.clone();
    for _ in 0..depth {
        let parent = current
            .borrow()
            .parent()
            .cloned()
            .ok_or(RuntimeError::ScopeDepth { depth })?;
        current = parent;
    }
    Ok(current)
}

/// A block: a body plus the receiver and scope it was created in.
#[derive(Clone, Educe)]
#[educe(Debug)]
pub struct Closure {
    pub body: Arc<IrScope>,
    pub receiver: Value,
    #[educe(Debug(ignore))]
    pub scope: ScopeRef,
}

/// The live storage of one call.
#[derive(Educe)]
#[educe(Debug)]
pub struct Frame {
    pub receiver: Value,
    #[educe(Debug(ignore))]
    pub scope: ScopeRef,
    pub temps: Vec<Value>,
    pub args: Rc<Vec<Value>>,
    pub block: Option<Closure>,
}

impl Frame {
    /// A frame for a method body: a fresh root dynamic scope.
    pub fn new(body: &IrScope, receiver: Value, args: Vec<Value>) -> Self {
        Self {
            receiver,
            scope: DynamicScope::new(body.num_local_slots()),
            temps: vec![Value::Nil; body.num_temps as usize],
            args: Rc::new(args),
            block: None,
        }
    }

    /// A frame for a block body: a child of the scope the block captured.
    pub fn for_closure(closure: &Closure, args: Vec<Value>) -> Self {
        Self {
            receiver: closure.receiver.clone(),
            scope: DynamicScope::child(&closure.scope, closure.body.num_local_slots()),
            temps: vec![Value::Nil; closure.body.num_temps as usize],
            args: Rc::new(args),
            block: None,
        }
    }

    pub fn with_block(mut self, block: Option<Closure>) -> Self {
        self.block = block;
        self
    }

    /// The incoming arguments as an array value.
    pub fn args_array(&self) -> Value {
        Value::Array(self.args.clone())
    }

    pub fn get_local(&self, local: &LocalVariable) -> Result<Value, RuntimeError> {
        let scope = ancestor(&self.scope, local.depth)?;
        let value = scope.borrow().slot(local.offset);
        Ok(value)
    }

    pub fn set_local(&mut self, local: &LocalVariable, value: Value) -> Result<(), RuntimeError> {
        let scope = ancestor(&self.scope, local.depth)?;
        scope.borrow_mut().set_slot(local.offset, value);
        Ok(())
    }

    /// Unset temporaries read as nil.
    pub fn get_temp(&self, temp: TemporaryVariable) -> Value {
        self.temps
            .get(temp.index as usize)
            .cloned()
            .unwrap_or(Value::Nil)
    }

    pub fn set_temp(&mut self, temp: TemporaryVariable, value: Value) {
        let index = temp.index as usize;
        if index >= self.temps.len() {
            self.temps.resize(index + 1, Value::Nil);
        }
        self.temps[index] = value;
    }

    pub fn assign(&mut self, variable: &Variable, value: Value) -> Result<(), RuntimeError> {
        match variable {
            Variable::Local(local) => self.set_local(local, value),
            Variable::Temp(temp) => {
                self.set_temp(*temp, value);
                Ok(())
            }
        }
    }
}
