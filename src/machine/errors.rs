use thiserror::Error;

/// Errors reported by the instruction executors.
///
/// The three kinds never overlap: a malformed or type-incompatible operand is
/// an instruction error, a well-typed operand whose address fails the
/// bounds/alignment invariant is a memory error, and an unresolvable
/// control-flow target is a pc error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// Operand text could not be classified, or the opcode forbids its type.
    #[error("instruction error: {0}")]
    Instruction(&'static str),

    /// Out-of-range or misaligned data address.
    #[error("memory error: {0}")]
    Memory(&'static str),

    /// Label not found, or a popped return address outside the program.
    #[error("pc error: {0}")]
    Pc(&'static str),
}
