use std::collections::HashSet;

use crate::ir::{IrError, IrScope, InstrKind, Operand, Span, Variable};

/// Checks the structural invariants of a scope.
///
/// - every jump target is a label defined exactly once,
/// - temporaries are within the scope's temporary count,
/// - no local other than self sits at depth 0, slot 0.
pub fn verify_scope(scope: &IrScope) -> Result<(), IrError> {
    let mut defined = HashSet::new();
    for instr in scope.instructions() {
        if let InstrKind::Label(label) = &instr.kind {
            if !defined.insert(*label) {
                return Err(IrError::DuplicateLabel {
                    scope: scope.name.clone(),
                    label: *label,
                    span: instr.span,
                });
            }
        }
    }

    for instr in scope.instructions() {
        let target = match &instr.kind {
            InstrKind::Jump { target } | InstrKind::BranchFalse { target, .. } => Some(target),
            _ => None,
        };
        if let Some(target) = target {
            if !defined.contains(target) {
                return Err(IrError::UndefinedLabel {
                    scope: scope.name.clone(),
                    label: *target,
                    span: instr.span,
                });
            }
        }

        let result = instr.result().map(Variable::as_operand);
        for operand in instr.operands().into_iter().chain(result.as_ref()) {
            check_operand(scope, operand, instr.span)?;
        }
    }

    Ok(())
}

fn check_operand(scope: &IrScope, operand: &Operand, span: Option<Span>) -> Result<(), IrError> {
    match operand {
        Operand::Temp(temp) if temp.index >= scope.num_temps => Err(IrError::TempOutOfRange {
            scope: scope.name.clone(),
            index: temp.index,
            num_temps: scope.num_temps,
            span,
        }),
        Operand::Local(local) if local.depth == 0 && local.offset == 0 => {
            Err(IrError::ReservedSelfSlot {
                scope: scope.name.clone(),
                name: local.name.clone(),
                span,
            })
        }
        Operand::Array(elements) => elements
            .iter()
            .try_for_each(|element| check_operand(scope, element, span)),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Instruction, Label, LocalVariable, ScopeKind, TemporaryVariable};

    #[test]
    fn undefined_label() {
        let mut scope = IrScope::new("broken", ScopeKind::Method);
        scope.push(Instruction::new(InstrKind::Jump { target: Label(7) }));
        assert!(matches!(
            verify_scope(&scope),
            Err(IrError::UndefinedLabel { label: Label(7), .. })
        ));
    }

    #[test]
    fn temp_out_of_range() {
        let mut scope = IrScope::new("broken", ScopeKind::Method);
        scope.push(Instruction::new(InstrKind::Return {
            value: Operand::Temp(TemporaryVariable::new(0)),
        }));
        assert!(matches!(
            verify_scope(&scope),
            Err(IrError::TempOutOfRange { index: 0, .. })
        ));
    }

    #[test]
    fn local_in_self_slot() {
        let mut scope = IrScope::new("broken", ScopeKind::Method);
        scope.push(Instruction::new(InstrKind::Copy {
            result: Variable::Local(LocalVariable::new("x", 0, 0)),
            source: Operand::nil(),
        }));
        assert!(matches!(
            verify_scope(&scope),
            Err(IrError::ReservedSelfSlot { .. })
        ));
    }
}
