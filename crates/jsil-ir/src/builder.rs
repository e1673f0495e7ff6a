//! A small program assembler.
//!
//! `ProgramBuilder` allocates variables and numbers instructions so that
//! tests and tools can assemble IR without hand-maintaining indices. It
//! validates operand counts (through `Instruction::new`) and nothing else.

use crate::instruction::Instruction;
use crate::operation::Operation;
use crate::variable::Variable;
use smallvec::SmallVec;

/// The variables defined by one emitted instruction.
#[derive(Debug, Clone)]
pub struct Emitted {
    pub outputs: SmallVec<[Variable; 2]>,
    pub inner_outputs: SmallVec<[Variable; 4]>,
}

impl Emitted {
    /// The single output of the instruction. Panics if there is none.
    #[must_use]
    pub fn output(&self) -> Variable {
        assert!(!self.outputs.is_empty(), "instruction has no outputs");
        self.outputs[0]
    }

    #[must_use]
    pub fn inner_output(&self, i: usize) -> Variable {
        self.inner_outputs[i]
    }
}

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    code: Vec<Instruction>,
    next_variable: u32,
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index the next emitted instruction will receive.
    #[must_use]
    pub fn next_index(&self) -> usize {
        self.code.len()
    }

    fn next_variables(&mut self, n: usize) -> SmallVec<[Variable; 4]> {
        (0..n)
            .map(|_| {
                let v = Variable::new(self.next_variable);
                self.next_variable += 1;
                v
            })
            .collect()
    }

    /// Appends one instruction, allocating fresh variables for its outputs
    /// and inner outputs.
    pub fn emit(&mut self, op: Operation, inputs: &[Variable]) -> Emitted {
        let (_, num_outputs, num_inner) = op.shape();
        let outputs = self.next_variables(num_outputs);
        let inner_outputs = self.next_variables(num_inner);
        let instr = Instruction::new(self.code.len(), op, inputs, &outputs, &inner_outputs);
        self.code.push(instr);
        Emitted {
            outputs: outputs.into_iter().collect(),
            inner_outputs,
        }
    }

    #[must_use]
    pub fn finish(self) -> Vec<Instruction> {
        self.code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_numbers_instructions_and_variables() {
        let mut b = ProgramBuilder::new();
        let a = b.emit(Operation::LoadInteger { value: 1 }, &[]).output();
        let c = b.emit(Operation::LoadInteger { value: 2 }, &[]).output();
        let sum = b
            .emit(
                Operation::BinaryOperation {
                    op: crate::operation::BinaryOperator::Add,
                },
                &[a, c],
            )
            .output();
        assert_eq!(a, Variable::new(0));
        assert_eq!(c, Variable::new(1));
        assert_eq!(sum, Variable::new(2));
        let program = b.finish();
        assert_eq!(program.len(), 3);
        assert!(program.iter().enumerate().all(|(i, instr)| instr.index() == i));
    }
}
