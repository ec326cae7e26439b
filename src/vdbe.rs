//! Register-machine instruction stream: opcodes, program assembly and a
//! reference machine that executes finished programs.

pub mod machine;
pub mod opcode;
pub mod program;

pub use machine::{Machine, MemoryStore};
pub use opcode::{CmpFlags, Instruction, Opcode, P4};
pub use program::{Label, Program, ProgramBuilder};
