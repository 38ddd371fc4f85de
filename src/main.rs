mod machine;

use std::env;
use std::path::Path;
use std::process;

use machine::exec::{self, RunOutcome};
use machine::{Register, System, loader};

fn main() {
    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: x86lite <program>");
        process::exit(2);
    };

    let mut sys = System::new();
    if let Err(err) = loader::load_file(&mut sys, Path::new(&path)) {
        eprintln!("{path}: {err}");
        process::exit(1);
    }

    let outcome = exec::run(&mut sys);

    for (name, reg) in [
        ("EAX", Register::Eax),
        ("EDX", Register::Edx),
        ("ECX", Register::Ecx),
        ("ESP", Register::Esp),
        ("EBP", Register::Ebp),
        ("EIP", Register::Eip),
    ] {
        println!("{name} = {}", sys.reg(reg));
    }
    println!("flag = {:?}", sys.comparison_flag);

    if let RunOutcome::Faulted(err) = outcome {
        eprintln!("{err}");
        process::exit(1);
    }
}
