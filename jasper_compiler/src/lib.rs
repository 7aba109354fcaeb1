//! # Jasper Compiler
//!
//! The bytecode tier's front half: a static slot resolver, a register
//! bytecode representation with a builder, the compiler from AST bodies
//! to [`bytecode::CodeObject`]s, and the function dictionary that hands
//! stable ids to nested function literals for the loader.
//!
//! Compilation is per function body. Slot-resolved locals become direct
//! register traffic; every operation whose meaning depends on runtime
//! state (free-name lookup, calls, truthiness, field access, method
//! dispatch) compiles to an unresolved call site that the runtime linker
//! resolves and caches on first execution.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bytecode;
pub mod compiler;
pub mod dictionary;
pub mod resolver;

pub use bytecode::{
    CodeObject, ConstIndex, FunId, FunctionBuilder, Instruction, Label, Register, SiteDesc,
    SiteId, SiteKind,
};
pub use compiler::{compile_function, compile_script};
pub use dictionary::FunDictionary;
pub use resolver::{resolve_slots, SlotTable};
