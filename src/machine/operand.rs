use crate::machine::system::Register;

/// Classification of a single operand token.
///
/// A valid operand is a register (`%EAX`), a memory reference with an
/// optional signed byte offset (`(%EAX)`, `-20(%EBP)`) or an immediate
/// (`$10`). Everything else, including malformed numeric text, classifies as
/// `Invalid` rather than a parse error: classification is total and the
/// executors turn `Invalid` into an instruction error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Register(Register),
    Memory { base: Register, offset: i32 },
    Immediate(i32),
    Invalid,
}

impl Operand {
    /// Pure classification; no machine state is consulted.
    pub fn parse(token: &str) -> Operand {
        if let Some(reg) = Register::from_name(token) {
            return Operand::Register(reg);
        }
        if let Some(rest) = token.strip_prefix('$') {
            return match rest.parse::<i32>() {
                Ok(value) => Operand::Immediate(value),
                Err(_) => Operand::Invalid,
            };
        }
        if let (Some(open), Some(close)) = (token.find('('), token.rfind(')')) {
            if open < close && close == token.len() - 1 {
                let offset_text = &token[..open];
                let offset = if offset_text.is_empty() {
                    Some(0)
                } else {
                    offset_text.parse::<i32>().ok()
                };
                let base = Register::from_name(&token[open + 1..close]);
                if let (Some(base), Some(offset)) = (base, offset) {
                    return Operand::Memory { base, offset };
                }
            }
        }
        Operand::Invalid
    }
}
