use std::fs;
use std::io;
use std::path::Path;

use crate::machine::exec::END_MARKER;
use crate::machine::system::{MEMORY_SIZE, System};

/// Strips leading whitespace, collapses interior runs to single spaces and
/// drops the line ending. The execution loop expects lines in this form.
pub fn reformat(line: &str) -> String {
    line.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Appends the program text to the instruction table, one normalized line
/// per slot. Blank lines are skipped, loading stops after the END marker and
/// the table never grows past `MEMORY_SIZE` entries.
pub fn load_program(sys: &mut System, source: &str) {
    for raw in source.lines() {
        if sys.instructions.len() >= MEMORY_SIZE {
            break;
        }
        let line = reformat(raw);
        if line.is_empty() {
            continue;
        }
        let at_end = line == END_MARKER;
        sys.instructions.push(line);
        if at_end {
            break;
        }
    }
}

/// Reads a program file and loads it.
pub fn load_file(sys: &mut System, path: &Path) -> io::Result<()> {
    let source = fs::read_to_string(path)?;
    load_program(sys, &source);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reformat_normalizes_whitespace() {
        assert_eq!(reformat("  MOVL   %EAX,  %EDX \n"), "MOVL %EAX, %EDX");
        assert_eq!(reformat("\tRET"), "RET");
        assert_eq!(reformat("   "), "");
    }

    #[test]
    fn load_skips_blanks_and_stops_after_end() {
        let mut sys = System::new();
        let source = "\n  MOVL $1 %EAX\n\n.L1\n END \nMOVL $2 %EAX\n";
        load_program(&mut sys, source);
        assert_eq!(sys.instructions, vec!["MOVL $1 %EAX", ".L1", "END"]);
    }

    #[test]
    fn load_keeps_program_order() {
        let mut sys = System::new();
        load_program(&mut sys, "PUSHL %EAX\nPOPL %EDX");
        assert_eq!(sys.instructions, vec!["PUSHL %EAX", "POPL %EDX"]);
    }

    #[test]
    fn load_caps_at_memory_size() {
        let mut sys = System::new();
        let source = "NOP\n".repeat(MEMORY_SIZE + 10);
        load_program(&mut sys, &source);
        assert_eq!(sys.instructions.len(), MEMORY_SIZE);
    }
}
