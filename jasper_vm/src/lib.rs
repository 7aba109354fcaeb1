//! # Jasper VM
//!
//! The bytecode execution tier: the call-site linker with monomorphic
//! inline caches, the register dispatch loop, and the loader that
//! materializes compiled units into invocable function objects.
//!
//! The contract with the tree-walking tier is strict observable
//! equivalence: same sink output, same results, same error kinds at the
//! same source lines. Inline caches are a transparent optimization;
//! [`IcMode::Disabled`] runs every site through the slow path and must
//! not change any observable behavior.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ic;
pub mod loader;
pub mod vm;

pub use ic::{CallSite, IcMode, IcState};
pub use loader::{execute, execute_in, execute_with_mode, load_function, CompiledInvoker};
pub use vm::LoadedCode;
