use std::cmp::Ordering;

use crate::machine::errors::ExecError;
use crate::machine::operand::Operand;
use crate::machine::system::{MEMORY_SIZE, Register, System};

/// The literal line that ends a program.
pub const END_MARKER: &str = "END";

/// A validated write target: a register, or a word slot in memory.
enum Place {
    Reg(Register),
    Mem(usize),
}

/// Effective address of a memory operand, checked against the data-memory
/// invariant: in range and word-aligned. Returns the word index.
fn word_index(sys: &System, base: Register, offset: i32) -> Result<usize, ExecError> {
    let addr = sys.reg(base).wrapping_add(offset);
    if addr < 0 || addr > (MEMORY_SIZE as i32 - 1) * 4 || addr % 4 != 0 {
        return Err(ExecError::Memory("effective address out of range or unaligned"));
    }
    Ok((addr / 4) as usize)
}

/// Shared type checks for the two-operand forms (MOVL, ADDL, CMPL).
fn check_pair(src: &Operand, dst: &Operand) -> Result<(), ExecError> {
    if matches!(src, Operand::Invalid) || matches!(dst, Operand::Invalid) {
        return Err(ExecError::Instruction("unrecognized operand"));
    }
    if matches!(dst, Operand::Immediate(_)) {
        return Err(ExecError::Instruction("destination cannot be an immediate"));
    }
    if matches!(src, Operand::Memory { .. }) && matches!(dst, Operand::Memory { .. }) {
        return Err(ExecError::Instruction("no memory-to-memory form"));
    }
    Ok(())
}

fn read_operand(sys: &System, op: &Operand) -> Result<i32, ExecError> {
    match *op {
        Operand::Register(r) => Ok(sys.reg(r)),
        Operand::Immediate(value) => Ok(value),
        Operand::Memory { base, offset } => Ok(sys.memory[word_index(sys, base, offset)?]),
        Operand::Invalid => Err(ExecError::Instruction("unrecognized operand")),
    }
}

/// Resolves a destination, validating a memory operand's address before any
/// write happens. Immediate and Invalid never reach this point for the
/// two-operand forms; PUSHL/POPL call it only with Register/Memory.
fn resolve_place(sys: &System, op: &Operand) -> Result<Place, ExecError> {
    match *op {
        Operand::Register(r) => Ok(Place::Reg(r)),
        Operand::Memory { base, offset } => Ok(Place::Mem(word_index(sys, base, offset)?)),
        _ => Err(ExecError::Instruction("destination must be a register or memory")),
    }
}

fn place_value(sys: &System, place: &Place) -> i32 {
    match *place {
        Place::Reg(r) => sys.reg(r),
        Place::Mem(index) => sys.memory[index],
    }
}

fn write_place(sys: &mut System, place: &Place, value: i32) {
    match *place {
        Place::Reg(r) => sys.set_reg(r, value),
        Place::Mem(index) => sys.memory[index] = value,
    }
}

/// MOVL src, dst: dst takes the source value. All validation precedes the
/// write, so a failure leaves the machine untouched. EIP is the caller's job.
pub fn execute_movl(sys: &mut System, src: &str, dst: &str) -> Result<(), ExecError> {
    let (src, dst) = (Operand::parse(src), Operand::parse(dst));
    check_pair(&src, &dst)?;
    let value = read_operand(sys, &src)?;
    let place = resolve_place(sys, &dst)?;
    write_place(sys, &place, value);
    Ok(())
}

/// ADDL src, dst: dst takes dst + src, wrapping on overflow.
pub fn execute_addl(sys: &mut System, src: &str, dst: &str) -> Result<(), ExecError> {
    let (src, dst) = (Operand::parse(src), Operand::parse(dst));
    check_pair(&src, &dst)?;
    let value = read_operand(sys, &src)?;
    let place = resolve_place(sys, &dst)?;
    let sum = place_value(sys, &place).wrapping_add(value);
    write_place(sys, &place, sum);
    Ok(())
}

/// CMPL src, dst: sets the comparison flag to dst vs. src without writing
/// either operand. Same type rules as MOVL/ADDL.
pub fn execute_cmpl(sys: &mut System, src: &str, dst: &str) -> Result<(), ExecError> {
    let (src, dst) = (Operand::parse(src), Operand::parse(dst));
    check_pair(&src, &dst)?;
    let src_value = read_operand(sys, &src)?;
    let dst_value = read_operand(sys, &dst)?;
    sys.comparison_flag = dst_value.cmp(&src_value);
    Ok(())
}

/// PUSHL src: decrements ESP by a word and stores the source value at the
/// new top of stack. The post-decrement address must clear the guard word at
/// address 0 and stay inside memory; on a memory error nothing moves.
pub fn execute_pushl(sys: &mut System, src: &str) -> Result<(), ExecError> {
    let src = Operand::parse(src);
    let value = read_operand(sys, &src)?;
    let new_esp = sys.reg(Register::Esp).wrapping_sub(4);
    if new_esp < 4 || new_esp >= (MEMORY_SIZE as i32) * 4 || new_esp % 4 != 0 {
        return Err(ExecError::Memory("push outside the stack bound"));
    }
    sys.memory[(new_esp / 4) as usize] = value;
    sys.set_reg(Register::Esp, new_esp);
    Ok(())
}

/// POPL dst: reads the word at the top of stack into dst and increments ESP
/// by a word. The increment is computed once and reused for both destination
/// paths; a memory destination resolves its effective address against the
/// pre-increment register file. POPL %ESP leaves ESP holding the popped
/// value (the destination write wins).
pub fn execute_popl(sys: &mut System, dst: &str) -> Result<(), ExecError> {
    let dst = Operand::parse(dst);
    if matches!(dst, Operand::Invalid | Operand::Immediate(_)) {
        return Err(ExecError::Instruction("pop destination must be a register or memory"));
    }
    let esp = sys.reg(Register::Esp);
    if esp < 0 || esp > (MEMORY_SIZE as i32 - 1) * 4 || esp % 4 != 0 {
        return Err(ExecError::Memory("stack pointer out of range or unaligned"));
    }
    let value = sys.memory[(esp / 4) as usize];
    let new_esp = esp + 4;
    if new_esp > (MEMORY_SIZE as i32) * 4 {
        return Err(ExecError::Memory("pop outside the stack bound"));
    }
    match dst {
        Operand::Register(r) => {
            sys.set_reg(Register::Esp, new_esp);
            sys.set_reg(r, value);
        }
        Operand::Memory { .. } => {
            let place = resolve_place(sys, &dst)?;
            write_place(sys, &place, value);
            sys.set_reg(Register::Esp, new_esp);
        }
        _ => unreachable!("rejected above"),
    }
    Ok(())
}

/// JMP/JE/JNE/JL/JG label: resolves the label first (pc error when it is
/// missing, whether or not the branch would be taken), then sets EIP when the
/// mnemonic's condition holds. Not-taken branches leave EIP alone and still
/// report success; the caller detects the unchanged EIP and advances.
pub fn execute_jmp(sys: &mut System, mnemonic: &str, label: &str) -> Result<(), ExecError> {
    let target = sys
        .addr_of_label(label)
        .ok_or(ExecError::Pc("jump target label not found"))?;
    let taken = match mnemonic {
        "JMP" => true,
        "JE" => sys.comparison_flag == Ordering::Equal,
        "JNE" => sys.comparison_flag != Ordering::Equal,
        "JL" => sys.comparison_flag == Ordering::Less,
        "JG" => sys.comparison_flag == Ordering::Greater,
        // Anything else J-prefixed reaches here via the dispatcher and never
        // branches.
        _ => false,
    };
    if taken {
        sys.set_reg(Register::Eip, target);
    }
    Ok(())
}

/// CALL label: pushes the address of the following instruction with the
/// same stack bound as PUSHL, then jumps to the label.
pub fn execute_call(sys: &mut System, label: &str) -> Result<(), ExecError> {
    let target = sys
        .addr_of_label(label)
        .ok_or(ExecError::Pc("call target label not found"))?;
    let return_addr = sys.reg(Register::Eip) + 4;
    let new_esp = sys.reg(Register::Esp).wrapping_sub(4);
    if new_esp < 4 || new_esp >= (MEMORY_SIZE as i32) * 4 || new_esp % 4 != 0 {
        return Err(ExecError::Memory("push outside the stack bound"));
    }
    sys.memory[(new_esp / 4) as usize] = return_addr;
    sys.set_reg(Register::Esp, new_esp);
    sys.set_reg(Register::Eip, target);
    Ok(())
}

/// RET: pops the return address and jumps to it. The popped word must land
/// on a real instruction (inside the loaded program, word-aligned), a
/// stricter bound than ordinary data access.
pub fn execute_ret(sys: &mut System) -> Result<(), ExecError> {
    let esp = sys.reg(Register::Esp);
    if esp < 0 || esp > (MEMORY_SIZE as i32 - 1) * 4 || esp % 4 != 0 {
        return Err(ExecError::Memory("stack pointer out of range or unaligned"));
    }
    let ret_addr = sys.memory[(esp / 4) as usize];
    if ret_addr < 0 || ret_addr >= sys.instructions.len() as i32 * 4 || ret_addr % 4 != 0 {
        return Err(ExecError::Pc("return address outside the loaded program"));
    }
    sys.set_reg(Register::Eip, ret_addr);
    sys.set_reg(Register::Esp, esp + 4);
    Ok(())
}

/// Recognized opcodes, keyed from the mnemonic. Every J-prefixed mnemonic
/// routes to the jump dispatcher; `execute_jmp` decides which ones branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Opcode {
    Movl,
    Addl,
    Pushl,
    Popl,
    Cmpl,
    Call,
    Ret,
    Jump,
}

impl Opcode {
    fn from_mnemonic(mnemonic: &str) -> Option<Opcode> {
        match mnemonic {
            "MOVL" => Some(Opcode::Movl),
            "ADDL" => Some(Opcode::Addl),
            "PUSHL" => Some(Opcode::Pushl),
            "POPL" => Some(Opcode::Popl),
            "CMPL" => Some(Opcode::Cmpl),
            "CALL" => Some(Opcode::Call),
            "RET" => Some(Opcode::Ret),
            _ if mnemonic.starts_with('J') => Some(Opcode::Jump),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// END marker reached, or EIP left the loaded program.
    Halted,
    /// An executor reported an error; EIP still addresses the failing
    /// instruction.
    Faulted(ExecError),
}

fn operand<'a>(tokens: &[&'a str], index: usize) -> Result<&'a str, ExecError> {
    tokens.get(index).copied().ok_or(ExecError::Instruction("missing operand"))
}

/// One fetch-decode-execute step. Operand tokens split on spaces or commas.
/// Blank lines, labels and foreign opcodes are skipped, not faulted; an
/// executor error propagates with EIP untouched.
pub fn step(sys: &mut System) -> Result<StepOutcome, ExecError> {
    let pc = sys.reg(Register::Eip);
    let index = pc / 4;
    if index < 0 || index as usize >= sys.instructions.len() {
        return Ok(StepOutcome::Halted);
    }
    let line = sys.instructions[index as usize].clone();
    let tokens: Vec<&str> = line.split([' ', ',']).filter(|t| !t.is_empty()).collect();

    let Some(mnemonic) = tokens.first().copied() else {
        sys.set_reg(Register::Eip, pc + 4);
        return Ok(StepOutcome::Continue);
    };
    if mnemonic == END_MARKER {
        return Ok(StepOutcome::Halted);
    }
    let Some(opcode) = Opcode::from_mnemonic(mnemonic) else {
        // Permissive loop: unrecognized lines (labels included) are no-ops.
        sys.set_reg(Register::Eip, pc + 4);
        return Ok(StepOutcome::Continue);
    };

    match opcode {
        Opcode::Movl => {
            execute_movl(sys, operand(&tokens, 1)?, operand(&tokens, 2)?)?;
            sys.set_reg(Register::Eip, pc + 4);
        }
        Opcode::Addl => {
            execute_addl(sys, operand(&tokens, 1)?, operand(&tokens, 2)?)?;
            sys.set_reg(Register::Eip, pc + 4);
        }
        Opcode::Cmpl => {
            execute_cmpl(sys, operand(&tokens, 1)?, operand(&tokens, 2)?)?;
            sys.set_reg(Register::Eip, pc + 4);
        }
        Opcode::Pushl => {
            execute_pushl(sys, operand(&tokens, 1)?)?;
            sys.set_reg(Register::Eip, pc + 4);
        }
        Opcode::Popl => {
            execute_popl(sys, operand(&tokens, 1)?)?;
            sys.set_reg(Register::Eip, pc + 4);
        }
        // CALL and RET set EIP themselves.
        Opcode::Call => execute_call(sys, operand(&tokens, 1)?)?,
        Opcode::Ret => execute_ret(sys)?,
        Opcode::Jump => {
            execute_jmp(sys, mnemonic, operand(&tokens, 1)?)?;
            if sys.reg(Register::Eip) == pc {
                // Branch not taken.
                sys.set_reg(Register::Eip, pc + 4);
            }
        }
    }
    Ok(StepOutcome::Continue)
}

/// Drives `step` until the program halts or an executor faults.
pub fn run(sys: &mut System) -> RunOutcome {
    loop {
        match step(sys) {
            Ok(StepOutcome::Continue) => {}
            Ok(StepOutcome::Halted) => return RunOutcome::Halted,
            Err(err) => return RunOutcome::Faulted(err),
        }
    }
}
