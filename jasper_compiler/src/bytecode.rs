//! Bytecode representation: instructions, code objects and the builder.

pub mod builder;
pub mod code_object;
pub mod instruction;

pub use builder::{FunctionBuilder, Label};
pub use code_object::{CodeObject, LineTableEntry};
pub use instruction::{ConstIndex, FunId, Instruction, Register, SiteDesc, SiteId, SiteKind};
