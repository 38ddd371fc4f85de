use std::cmp::Ordering;

/// Word capacity of the data memory. Byte addresses run 0..MEMORY_SIZE*4.
pub const MEMORY_SIZE: usize = 1024;

/// Stack baseline after reset: a little below the top of memory, word-aligned.
pub const STACK_BASE: i32 = (MEMORY_SIZE as i32) * 4 - 256;

const REGISTER_COUNT: usize = 6;

/// The closed register set. EIP is the program counter, byte-addressed but
/// only ever set to multiples of 4; ESP is the stack pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    Eax,
    Edx,
    Ecx,
    Esp,
    Ebp,
    Eip,
}

impl Register {
    /// Matches the `%`-prefixed, case-sensitive register syntax of the
    /// dialect. Anything else is not a register.
    pub fn from_name(name: &str) -> Option<Register> {
        match name {
            "%EAX" => Some(Register::Eax),
            "%EDX" => Some(Register::Edx),
            "%ECX" => Some(Register::Ecx),
            "%ESP" => Some(Register::Esp),
            "%EBP" => Some(Register::Ebp),
            "%EIP" => Some(Register::Eip),
            _ => None,
        }
    }
}

/// The whole machine: register file, flat word memory, comparison flag and
/// the loaded instruction table. One instance per run, passed by `&mut` to
/// every operation; there is no hidden global.
#[derive(Clone)]
pub struct System {
    pub registers: [i32; REGISTER_COUNT],
    pub memory: Vec<i32>,
    /// Loaded program text, one normalized line per slot. Read-only after
    /// loading; labels occupy real slots.
    pub instructions: Vec<String>,
    /// Set only by CMPL, read only by conditional jumps: `dst.cmp(&src)`.
    pub comparison_flag: Ordering,
}

impl System {
    pub fn new() -> Self {
        let mut sys = System {
            registers: [0; REGISTER_COUNT],
            memory: Vec::new(),
            instructions: Vec::new(),
            comparison_flag: Ordering::Equal,
        };
        sys.reset();
        sys
    }

    /// Back to the fixed baseline: general registers and EIP zero, stack
    /// pointers near the top of memory, flag cleared, memory zero-filled,
    /// program table emptied.
    pub fn reset(&mut self) {
        self.registers = [0; REGISTER_COUNT];
        self.registers[Register::Esp as usize] = STACK_BASE;
        self.registers[Register::Ebp as usize] = STACK_BASE;
        self.memory.clear();
        self.memory.resize(MEMORY_SIZE, 0);
        self.instructions.clear();
        self.comparison_flag = Ordering::Equal;
    }

    #[inline]
    pub fn reg(&self, r: Register) -> i32 {
        self.registers[r as usize]
    }

    #[inline]
    pub fn set_reg(&mut self, r: Register, v: i32) {
        self.registers[r as usize] = v;
    }

    /// Resolves a label token to the byte address of the instruction that
    /// follows it. Labels start with `.`; lookup is a linear scan over the
    /// loaded program, first match wins. `None` when the token lacks the
    /// marker or no slot matches.
    pub fn addr_of_label(&self, label: &str) -> Option<i32> {
        if !label.starts_with('.') {
            return None;
        }
        self.instructions
            .iter()
            .position(|line| line == label)
            .map(|idx| (idx as i32 + 1) * 4)
    }
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_baseline() {
        let sys = System::new();
        assert_eq!(sys.reg(Register::Eax), 0);
        assert_eq!(sys.reg(Register::Eip), 0);
        assert_eq!(sys.reg(Register::Esp), STACK_BASE);
        assert_eq!(sys.reg(Register::Ebp), STACK_BASE);
        assert_eq!(sys.comparison_flag, Ordering::Equal);
        assert_eq!(sys.memory.len(), MEMORY_SIZE);
        assert!(sys.memory.iter().all(|&w| w == 0));
        assert!(sys.instructions.is_empty());
        assert_eq!(STACK_BASE % 4, 0);
    }

    #[test]
    fn register_names_are_case_sensitive_and_sigiled() {
        assert_eq!(Register::from_name("%EAX"), Some(Register::Eax));
        assert_eq!(Register::from_name("%EIP"), Some(Register::Eip));
        assert_eq!(Register::from_name("EAX"), None);
        assert_eq!(Register::from_name("%eax"), None);
        assert_eq!(Register::from_name("%EBX"), None);
    }

    #[test]
    fn label_address_is_the_following_slot() {
        let mut sys = System::new();
        sys.instructions = vec![
            ".L1".to_string(),
            "MOVL $1 %EAX".to_string(),
            ".L2".to_string(),
            "RET".to_string(),
        ];
        assert_eq!(sys.addr_of_label(".L1"), Some(4));
        assert_eq!(sys.addr_of_label(".L2"), Some(12));
    }

    #[test]
    fn label_lookup_misses() {
        let mut sys = System::new();
        sys.instructions = vec![".L1".to_string(), "RET".to_string()];
        // Missing marker fails before any scan.
        assert_eq!(sys.addr_of_label("L1"), None);
        assert_eq!(sys.addr_of_label(".L9"), None);
        assert_eq!(sys.addr_of_label(""), None);
    }

    #[test]
    fn duplicate_labels_first_match_wins() {
        let mut sys = System::new();
        sys.instructions = vec![
            ".L1".to_string(),
            "RET".to_string(),
            ".L1".to_string(),
            "RET".to_string(),
        ];
        assert_eq!(sys.addr_of_label(".L1"), Some(4));
    }
}
