use std::fmt;

use itertools::Itertools;

use crate::{
    ir::{
        inlining::{InlineContext, InlineError},
        simplify::ValueMap,
    },
    runtime::{Frame, RuntimeError, Value},
};

/// The nominal name of the self operand.
pub const SELF_NAME: &str = "%self";

/// Constant data embedded in the IR.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Nil,
    Bool(bool),
    Fixnum(i64),
    String(String),
    Symbol(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Nil => write!(f, "nil"),
            Literal::Bool(value) => write!(f, "{value}"),
            Literal::Fixnum(value) => write!(f, "{value}"),
            Literal::String(value) => write!(f, "{value:?}"),
            Literal::Symbol(value) => write!(f, ":{value}"),
        }
    }
}

/// A variable living in a dynamic scope, `depth` scopes up from the current one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalVariable {
    pub name: String,
    pub depth: u32,
    pub offset: u32,
}

impl LocalVariable {
    pub fn new(name: impl Into<String>, depth: u32, offset: u32) -> Self {
        Self {
            name: name.into(),
            depth,
            offset,
        }
    }
}

impl fmt::Display for LocalVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}:{})", self.name, self.depth, self.offset)
    }
}

/// A frame-local temporary holding an intermediate result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemporaryVariable {
    pub index: u32,
}

impl TemporaryVariable {
    pub const fn new(index: u32) -> Self {
        Self { index }
    }
}

impl fmt::Display for TemporaryVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%t{}", self.index)
    }
}

/// An assignable location. Self is deliberately not one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Variable {
    Local(LocalVariable),
    Temp(TemporaryVariable),
}

impl Variable {
    pub fn as_operand(&self) -> Operand {
        match self {
            Variable::Local(local) => Operand::Local(local.clone()),
            Variable::Temp(temp) => Operand::Temp(*temp),
        }
    }
}

impl From<LocalVariable> for Variable {
    fn from(value: LocalVariable) -> Self {
        Variable::Local(value)
    }
}

impl From<TemporaryVariable> for Variable {
    fn from(value: TemporaryVariable) -> Self {
        Variable::Temp(value)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Local(local) => write!(f, "{local}"),
            Variable::Temp(temp) => write!(f, "{temp}"),
        }
    }
}

/// A value source consumed by an instruction.
///
/// `SelfValue` is the receiver of the current frame. It is nominally the local
/// `%self` at depth 0, slot 0, but it is its own variant: two operands are the
/// same self reference only if both are `SelfValue`, never because a local
/// happens to share its name or slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Const(Literal),
    Local(LocalVariable),
    Temp(TemporaryVariable),
    SelfValue,
    /// Materialized into a fresh array on every retrieval.
    Array(Vec<Operand>),
}

impl Operand {
    pub fn nil() -> Self {
        Operand::Const(Literal::Nil)
    }

    pub fn fixnum(value: i64) -> Self {
        Operand::Const(Literal::Fixnum(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Operand::Const(Literal::String(value.into()))
    }

    pub fn symbol(value: impl Into<String>) -> Self {
        Operand::Const(Literal::Symbol(value.into()))
    }

    /// The slot the self operand nominally occupies.
    pub fn self_slot() -> LocalVariable {
        LocalVariable::new(SELF_NAME, 0, 0)
    }

    pub fn is_self(&self) -> bool {
        matches!(self, Operand::SelfValue)
    }

    /// Whether this operand can be a key of a [`ValueMap`].
    pub fn is_variable(&self) -> bool {
        matches!(
            self,
            Operand::Local(_) | Operand::Temp(_) | Operand::SelfValue
        )
    }

    /// Constants and arrays made only of constants.
    pub fn is_constant(&self) -> bool {
        match self {
            Operand::Const(_) => true,
            Operand::Array(elements) => elements.iter().all(Operand::is_constant),
            _ => false,
        }
    }

    /// Leaves are substituted freely, compound operands only when forced.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Operand::Array(_))
    }

    /// Resolves the operand to a runtime value in the given frame.
    pub fn retrieve(&self, frame: &Frame) -> Result<Value, RuntimeError> {
        match self {
            Operand::Const(literal) => Ok(Value::from(literal)),
            Operand::Local(local) => frame.get_local(local),
            Operand::Temp(temp) => Ok(frame.get_temp(*temp)),
            // The nominal slot is never read.
            Operand::SelfValue => Ok(frame.receiver.clone()),
            Operand::Array(elements) => {
                let values = elements
                    .iter()
                    .map(|element| element.retrieve(frame))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Value::array(values))
            }
        }
    }

    /// Returns an equivalent operand, looking variables up in `map`.
    pub fn simplify(&self, map: &ValueMap, force: bool) -> Operand {
        match self {
            Operand::Const(_) => self.clone(),
            Operand::Array(elements) => Operand::Array(
                elements
                    .iter()
                    .map(|element| element.simplify(map, force))
                    .collect(),
            ),
            Operand::Local(_) | Operand::Temp(_) | Operand::SelfValue => {
                map.resolve(self, force).clone()
            }
        }
    }

    /// Returns the operand this one stands for in the destination scope of `ctx`.
    pub fn clone_for_inlining(&self, ctx: &mut InlineContext) -> Result<Operand, InlineError> {
        match self {
            Operand::Const(_) => Ok(self.clone()),
            Operand::Local(local) => ctx.local_operand(local),
            Operand::Temp(temp) => Ok(Operand::Temp(ctx.temp(*temp))),
            Operand::SelfValue => ctx.self_operand(),
            Operand::Array(elements) => Ok(Operand::Array(
                elements
                    .iter()
                    .map(|element| element.clone_for_inlining(ctx))
                    .collect::<Result<_, _>>()?,
            )),
        }
    }
}

impl Operand {
    /// Like [`Operand::clone_for_inlining`], for an operand of a closure body
    /// nested `level` scopes below the callee.
    ///
    /// Self stays self when the closure can keep it.
    pub fn clone_for_closure(
        &self,
        ctx: &mut InlineContext,
        level: u32,
    ) -> Result<Operand, InlineError> {
        match self {
            Operand::Const(_) | Operand::Temp(_) => Ok(self.clone()),
            Operand::Local(local) => ctx.closure_local_operand(local, level),
            Operand::SelfValue => ctx.closure_self(),
            Operand::Array(elements) => Ok(Operand::Array(
                elements
                    .iter()
                    .map(|element| element.clone_for_closure(ctx, level))
                    .collect::<Result<_, _>>()?,
            )),
        }
    }
}

impl From<Literal> for Operand {
    fn from(value: Literal) -> Self {
        Operand::Const(value)
    }
}

impl From<LocalVariable> for Operand {
    fn from(value: LocalVariable) -> Self {
        Operand::Local(value)
    }
}

impl From<TemporaryVariable> for Operand {
    fn from(value: TemporaryVariable) -> Self {
        Operand::Temp(value)
    }
}

impl From<Variable> for Operand {
    fn from(value: Variable) -> Self {
        value.as_operand()
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Const(literal) => write!(f, "{literal}"),
            Operand::Local(local) => write!(f, "{local}"),
            Operand::Temp(temp) => write!(f, "{temp}"),
            Operand::SelfValue => write!(f, "{SELF_NAME}"),
            Operand::Array(elements) => write!(f, "[{}]", elements.iter().join(", ")),
        }
    }
}
