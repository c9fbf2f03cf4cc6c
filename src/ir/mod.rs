use std::{collections::HashMap, fmt, ops::Range};

use typed_generational_arena::{SmallSlab, SmallSlabIndex};

pub mod builder;
pub mod errors;
pub mod inlining;
pub mod instructions;
pub mod operands;
pub mod simplify;
pub mod verify;

pub use builder::ScopeBuilder;
pub use errors::IrError;
pub use instructions::{ClosureBody, InstrKind, Instruction, Operation};
pub use operands::{Literal, LocalVariable, Operand, TemporaryVariable, Variable};

pub type InstrIndex = SmallSlabIndex<Instruction>;
pub type Instrs = SmallSlab<Instruction>;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Span {
    pub from: usize,
    pub to: usize,
}

impl Span {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }
}

impl From<Span> for Range<usize> {
    fn from(val: Span) -> Self {
        val.from..val.to
    }
}

/// A jump target inside a single scope.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// What kind of body a scope holds. Decides how the scope's frame is set up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// A method body, the root of its own lexical chain.
    Method,
    /// A block body, its dynamic scope is a child of the defining scope.
    Closure,
    /// A top level unit.
    Script,
}

/// An instruction sequence and the index spaces its operands live in.
///
/// Instructions are allocated in the scope's own arena, `order` holds the
/// execution order. The scope is read-only once built, interpretation never
/// mutates it.
#[derive(Debug, Clone)]
pub struct IrScope {
    /// The name of the scope, usually the method name.
    pub name: String,
    pub kind: ScopeKind,
    /// Instruction storage.
    pub instrs: Instrs,
    /// The instructions in execution order.
    pub order: Vec<InstrIndex>,
    /// Locals declared at depth 0.
    pub locals: Vec<LocalVariable>,
    /// The number of temporaries the frame must provide.
    pub num_temps: u32,
    /// Next unused label number.
    pub next_label: u32,
}

impl IrScope {
    pub fn new(name: impl Into<String>, kind: ScopeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            instrs: Instrs::new(),
            order: Vec::new(),
            locals: Vec::new(),
            num_temps: 0,
            next_label: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Appends an instruction at the end of the sequence.
    pub fn push(&mut self, instr: Instruction) -> InstrIndex {
        let idx = self.instrs.insert(instr);
        self.order.push(idx);
        idx
    }

    pub fn instr(&self, idx: InstrIndex) -> &Instruction {
        &self.instrs[idx]
    }

    pub fn instr_mut(&mut self, idx: InstrIndex) -> &mut Instruction {
        &mut self.instrs[idx]
    }

    /// Iterates the instructions in execution order.
    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> + '_ {
        self.order.iter().map(|idx| &self.instrs[*idx])
    }

    /// Number of slots the dynamic scope needs at depth 0, slot 0 included.
    pub fn num_local_slots(&self) -> usize {
        self.locals
            .iter()
            .map(|local| local.offset as usize + 1)
            .max()
            .unwrap_or(1)
    }

    pub fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    pub fn new_temp(&mut self) -> TemporaryVariable {
        let temp = TemporaryVariable::new(self.num_temps);
        self.num_temps += 1;
        temp
    }

    /// Maps every label defined in this scope to its position in `order`.
    pub fn label_positions(&self) -> HashMap<Label, usize> {
        self.instructions()
            .enumerate()
            .filter_map(|(pos, instr)| match &instr.kind {
                InstrKind::Label(label) => Some((*label, pos)),
                _ => None,
            })
            .collect()
    }
}

impl fmt::Display for IrScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ScopeKind::Method => "method",
            ScopeKind::Closure => "closure",
            ScopeKind::Script => "script",
        };
        writeln!(f, "{kind} {}:", self.name)?;
        for instr in self.instructions() {
            match instr.kind {
                InstrKind::Label(_) => writeln!(f, "{instr}")?,
                _ => writeln!(f, "    {instr}")?,
            }
        }
        Ok(())
    }
}
