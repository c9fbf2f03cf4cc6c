use std::collections::{HashMap, HashSet};

use tracing::{debug, instrument};

use crate::ir::{
    IrError, IrScope, InstrKind, Operation,
    operands::{Operand, TemporaryVariable, Variable},
};

/// Known equivalences between a variable and a simpler operand.
#[derive(Debug, Clone, Default)]
pub struct ValueMap {
    values: HashMap<Operand, Operand>,
}

impl ValueMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `from` always holds `to`.
    ///
    /// Keys must be variables. Values must be leaves or arrays of constants,
    /// an array mentioning variables would make simplification non-idempotent.
    pub fn insert(&mut self, from: Operand, to: Operand) -> Result<(), IrError> {
        if !from.is_variable() || (!to.is_leaf() && !to.is_constant()) {
            return Err(IrError::InvalidValueMapping {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.values.insert(from, to);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Follows the mapping chain starting at `operand`.
    ///
    /// Arrays end the chain and are only taken when `force` is set. An operand
    /// on a cycle resolves to itself.
    pub fn resolve<'a>(&'a self, operand: &'a Operand, force: bool) -> &'a Operand {
        let mut current = operand;
        let mut hops = 0;
        while let Some(next) = self.values.get(current) {
            if !force && !next.is_leaf() {
                break;
            }
            hops += 1;
            if hops > self.values.len() {
                return operand;
            }
            current = next;
        }
        current
    }
}

/// Simplifies every instruction of the scope in place.
///
/// Returns the number of operand slots that changed.
#[instrument(level = "debug", skip_all, fields(scope = %scope.name))]
pub fn simplify_scope(scope: &mut IrScope, map: &ValueMap, force: bool) -> usize {
    let mut changed = 0;
    for idx in scope.order.clone() {
        changed += scope.instr_mut(idx).simplify_operands(map, force);
    }
    debug!("simplified {changed} operands");
    changed
}

/// Finds temporaries that provably always hold a constant.
///
/// A temporary qualifies when it is written exactly once, by a copy of a
/// constant, and every read comes after that copy with no label in between,
/// so no path can reach a read without running the copy first.
pub fn constant_temporaries(scope: &IrScope) -> ValueMap {
    let mut defs: HashMap<TemporaryVariable, (usize, Operand)> = HashMap::new();
    let mut redefined: HashSet<TemporaryVariable> = HashSet::new();
    let mut labels = Vec::new();

    for (pos, instr) in scope.instructions().enumerate() {
        if instr.operation() == Operation::Label {
            labels.push(pos);
        }
        if let Some(Variable::Temp(temp)) = instr.result() {
            match &instr.kind {
                InstrKind::Copy { source, .. }
                    if source.is_constant() && !defs.contains_key(temp) =>
                {
                    defs.insert(*temp, (pos, source.clone()));
                }
                _ => {
                    redefined.insert(*temp);
                }
            }
        }
    }

    let mut map = ValueMap::new();
    'candidates: for (temp, (def_pos, value)) in defs {
        if redefined.contains(&temp) {
            continue;
        }
        let key = Operand::Temp(temp);
        for (pos, instr) in scope.instructions().enumerate() {
            if !instr.operands().iter().any(|op| reads(op, &key)) {
                continue;
            }
            let dominated =
                pos > def_pos && !labels.iter().any(|label| *label > def_pos && *label < pos);
            if !dominated {
                continue 'candidates;
            }
        }
        // Keys are temporaries and values constants, the insert can't fail.
        let _ = map.insert(key, value);
    }
    map
}

fn reads(operand: &Operand, var: &Operand) -> bool {
    match operand {
        Operand::Array(elements) => elements.iter().any(|x| reads(x, var)),
        _ => operand == var,
    }
}

/// Substitutes constant temporaries into their uses.
#[instrument(level = "debug", skip_all, fields(scope = %scope.name))]
pub fn propagate_constants(scope: &mut IrScope, force: bool) -> usize {
    let map = constant_temporaries(scope);
    if map.is_empty() {
        return 0;
    }
    debug!("found {} constant temporaries", map.len());
    simplify_scope(scope, &map, force)
}
