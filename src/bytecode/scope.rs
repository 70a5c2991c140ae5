use tracing::trace;

use crate::bytecode::ir::Instructions;
use crate::bytecode::op::{Opcode, PLACEHOLDER, make};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmittedInstruction {
    pub opcode: Opcode,
    pub position: usize,
}

/// Per-function compilation frame.
///
/// Holds the instruction buffer, the last two emitted instructions (so a
/// trailing `OpPop` or `OpIndex` can be taken back), and one entry per open
/// loop on each patch stack.
#[derive(Debug, Default)]
pub struct CompilationScope {
    pub instructions: Instructions,
    pub last: Option<EmittedInstruction>,
    pub previous: Option<EmittedInstruction>,
    loop_starts: Vec<usize>,
    break_patches: Vec<Vec<usize>>,
    continue_patches: Vec<Vec<usize>>,
}

impl CompilationScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offset the next instruction will be written at.
    pub fn position(&self) -> usize {
        self.instructions.len()
    }

    /// Appends an instruction and returns its starting offset.
    pub fn emit(&mut self, opcode: Opcode, operands: &[usize]) -> usize {
        let position = self.position();
        self.instructions.extend(&make(opcode, operands));
        self.previous = self.last;
        self.last = Some(EmittedInstruction { opcode, position });
        position
    }

    pub fn last_is(&self, opcode: Opcode) -> bool {
        self.last.is_some_and(|last| last.opcode == opcode)
    }

    /// Drops the last emitted instruction; `previous` becomes `last`.
    pub fn remove_last_instruction(&mut self) {
        if let Some(last) = self.last {
            self.instructions.truncate(last.position);
            self.last = self.previous.take();
        }
    }

    pub fn remove_last_pop(&mut self) {
        if self.last_is(Opcode::Pop) {
            self.remove_last_instruction();
        }
    }

    /// Turns a trailing `OpPop` into `OpReturnValue`, keeping the value as
    /// the function's result.
    pub fn replace_last_pop_with_return(&mut self) {
        if let Some(last) = self.last.filter(|l| l.opcode == Opcode::Pop) {
            self.instructions
                .overwrite(last.position, &make(Opcode::ReturnValue, &[]));
            self.last = Some(EmittedInstruction {
                opcode: Opcode::ReturnValue,
                position: last.position,
            });
        }
    }

    /// Rewrites the operand of the instruction at `position`.
    pub fn change_operand(&mut self, position: usize, operand: usize) {
        let opcode = self
            .instructions
            .opcode_at(position)
            .unwrap_or_else(|| panic!("no instruction at {}", position));
        trace!(%opcode, position, operand, "patch");
        self.instructions
            .overwrite(position, &make(opcode, &[operand]));
    }

    // =========================================================================
    // Loops
    // =========================================================================

    pub fn enter_loop(&mut self, start: usize) {
        self.loop_starts.push(start);
        self.break_patches.push(Vec::new());
        self.continue_patches.push(Vec::new());
    }

    pub fn in_loop(&self) -> bool {
        !self.loop_starts.is_empty()
    }

    /// Emits a placeholder jump for `break`. Returns `false` outside a loop.
    pub fn emit_break(&mut self) -> bool {
        if !self.in_loop() {
            return false;
        }
        let position = self.emit(Opcode::Jump, &[PLACEHOLDER]);
        if let Some(patches) = self.break_patches.last_mut() {
            patches.push(position);
        }
        true
    }

    /// Emits a placeholder jump for `continue`. Returns `false` outside a loop.
    pub fn emit_continue(&mut self) -> bool {
        if !self.in_loop() {
            return false;
        }
        let position = self.emit(Opcode::Jump, &[PLACEHOLDER]);
        if let Some(patches) = self.continue_patches.last_mut() {
            patches.push(position);
        }
        true
    }

    /// Points every pending `continue` of the innermost loop at `target`.
    pub fn patch_continues(&mut self, target: usize) {
        let pending = self
            .continue_patches
            .last_mut()
            .map(std::mem::take)
            .unwrap_or_default();
        for position in pending {
            self.change_operand(position, target);
        }
    }

    /// Closes the innermost loop, pointing its `break`s at `end`.
    pub fn leave_loop(&mut self, end: usize) {
        self.loop_starts.pop();
        self.continue_patches.pop();
        for position in self.break_patches.pop().unwrap_or_default() {
            self.change_operand(position, end);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_tracks_last_and_previous() {
        let mut scope = CompilationScope::new();
        assert_eq!(scope.emit(Opcode::True, &[]), 0);
        assert_eq!(scope.emit(Opcode::Constant, &[3]), 1);
        assert_eq!(
            scope.last,
            Some(EmittedInstruction {
                opcode: Opcode::Constant,
                position: 1
            })
        );
        assert_eq!(
            scope.previous,
            Some(EmittedInstruction {
                opcode: Opcode::True,
                position: 0
            })
        );
    }

    #[test]
    fn test_remove_last_restores_previous() {
        let mut scope = CompilationScope::new();
        scope.emit(Opcode::Constant, &[0]);
        let previous = scope.last;
        scope.emit(Opcode::Pop, &[]);

        scope.remove_last_pop();
        assert_eq!(scope.last, previous);
        assert_eq!(scope.position(), 3);

        // not a pop: untouched
        scope.remove_last_pop();
        assert_eq!(scope.position(), 3);
    }

    #[test]
    fn test_replace_last_pop_with_return() {
        let mut scope = CompilationScope::new();
        scope.emit(Opcode::Null, &[]);
        scope.emit(Opcode::Pop, &[]);
        scope.replace_last_pop_with_return();
        assert!(scope.last_is(Opcode::ReturnValue));
        assert_eq!(
            scope.instructions.opcodes(),
            vec![Opcode::Null, Opcode::ReturnValue]
        );
    }

    #[test]
    fn test_change_operand() {
        let mut scope = CompilationScope::new();
        let jump = scope.emit(Opcode::JumpNotTruthy, &[PLACEHOLDER]);
        scope.emit(Opcode::Null, &[]);
        scope.change_operand(jump, scope.position());
        let (_, op, operands) = scope.instructions.iter().next().unwrap();
        assert_eq!(op, Opcode::JumpNotTruthy);
        assert_eq!(operands, vec![4]);
    }

    #[test]
    fn test_break_and_continue_patch_lists() {
        let mut scope = CompilationScope::new();
        assert!(!scope.emit_break());

        scope.enter_loop(0);
        scope.emit(Opcode::True, &[]);
        assert!(scope.emit_continue());
        scope.enter_loop(4);
        assert!(scope.emit_break());
        scope.leave_loop(7);
        assert!(scope.emit_break());
        scope.patch_continues(10);
        scope.leave_loop(13);

        let targets: Vec<usize> = scope
            .instructions
            .iter()
            .filter(|(_, op, _)| *op == Opcode::Jump)
            .map(|(_, _, operands)| operands[0])
            .collect();
        assert_eq!(targets, vec![10, 7, 13]);
        assert!(!scope.in_loop());
    }
}
