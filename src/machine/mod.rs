pub mod errors;
pub mod exec;
pub mod loader;
pub mod operand;
pub mod system;

pub use errors::ExecError;
pub use exec::RunOutcome;
pub use system::{Register, System};
