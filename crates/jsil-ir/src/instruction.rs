//! Instructions: one operation plus its operands.

use crate::operation::Operation;
use crate::variable::Variable;
use smallvec::SmallVec;
use std::fmt;

/// One IR instruction.
///
/// Operands are stored as a single list: inputs first, then outputs, then
/// inner outputs (block-local bindings such as function parameters or caught
/// exceptions). The operation's shape determines the partition.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    op: Operation,
    inouts: SmallVec<[Variable; 4]>,
    index: usize,
}

impl Instruction {
    /// Assembles an instruction, asserting that the operand lists match the
    /// operation's declared shape. A mismatch is a programmer error.
    #[must_use]
    pub fn new(
        index: usize,
        op: Operation,
        inputs: &[Variable],
        outputs: &[Variable],
        inner_outputs: &[Variable],
    ) -> Self {
        let (num_inputs, num_outputs, num_inner) = op.shape();
        assert_eq!(
            inputs.len(),
            num_inputs,
            "{op:?} expects {num_inputs} inputs, got {}",
            inputs.len()
        );
        assert_eq!(
            outputs.len(),
            num_outputs,
            "{op:?} expects {num_outputs} outputs, got {}",
            outputs.len()
        );
        assert_eq!(
            inner_outputs.len(),
            num_inner,
            "{op:?} expects {num_inner} inner outputs, got {}",
            inner_outputs.len()
        );
        let mut inouts = SmallVec::with_capacity(inputs.len() + outputs.len() + inner_outputs.len());
        inouts.extend_from_slice(inputs);
        inouts.extend_from_slice(outputs);
        inouts.extend_from_slice(inner_outputs);
        Self { op, inouts, index }
    }

    #[must_use]
    pub fn op(&self) -> &Operation {
        &self.op
    }

    /// Position of this instruction in the program.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn num_inputs(&self) -> usize {
        self.op.num_inputs()
    }

    #[must_use]
    pub fn num_outputs(&self) -> usize {
        self.op.num_outputs()
    }

    #[must_use]
    pub fn num_inner_outputs(&self) -> usize {
        self.op.num_inner_outputs()
    }

    #[must_use]
    pub fn input(&self, i: usize) -> Variable {
        assert!(i < self.num_inputs(), "input index {i} out of range");
        self.inouts[i]
    }

    #[must_use]
    pub fn inputs(&self) -> &[Variable] {
        &self.inouts[..self.num_inputs()]
    }

    /// The first output. Panics if the operation has none.
    #[must_use]
    pub fn output(&self) -> Variable {
        assert!(self.num_outputs() > 0, "{:?} has no outputs", self.op);
        self.inouts[self.num_inputs()]
    }

    #[must_use]
    pub fn outputs(&self) -> &[Variable] {
        let start = self.num_inputs();
        &self.inouts[start..start + self.num_outputs()]
    }

    #[must_use]
    pub fn inner_output(&self, i: usize) -> Variable {
        assert!(i < self.num_inner_outputs(), "inner output index {i} out of range");
        self.inouts[self.num_inputs() + self.num_outputs() + i]
    }

    #[must_use]
    pub fn inner_outputs(&self) -> &[Variable] {
        &self.inouts[self.num_inputs() + self.num_outputs()..]
    }

    /// All variables defined by this instruction (outputs then inner
    /// outputs).
    #[must_use]
    pub fn all_outputs(&self) -> &[Variable] {
        &self.inouts[self.num_inputs()..]
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>4}: ", self.index)?;
        for (i, v) in self.outputs().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        if self.num_outputs() > 0 {
            write!(f, " <- ")?;
        }
        write!(f, "{:?}", self.op)?;
        if self.num_inputs() > 0 {
            write!(f, " (")?;
            for (i, v) in self.inputs().iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v}")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::SubroutineParameters;

    fn v(n: u32) -> Variable {
        Variable::new(n)
    }

    #[test]
    fn test_operand_partition() {
        let instr = Instruction::new(
            0,
            Operation::BeginPlainFunction {
                parameters: SubroutineParameters::simple(2),
            },
            &[],
            &[v(0)],
            &[v(1), v(2)],
        );
        assert_eq!(instr.output(), v(0));
        assert_eq!(instr.inner_outputs(), &[v(1), v(2)]);
        assert_eq!(instr.all_outputs(), &[v(0), v(1), v(2)]);
    }

    #[test]
    #[should_panic(expected = "expects 1 inputs")]
    fn test_input_count_is_enforced() {
        let _ = Instruction::new(
            0,
            Operation::GetProperty {
                name: "x".into(),
                is_guarded: false,
            },
            &[],
            &[v(0)],
            &[],
        );
    }
}
