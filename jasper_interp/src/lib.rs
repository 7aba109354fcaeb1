//! # Jasper Interpreter
//!
//! The tree-walking execution tier: direct structural recursion over the
//! AST against an environment chain. This tier defines the language's
//! reference semantics — the bytecode tier must reproduce its observable
//! behavior (output, results, failure kind and line) exactly.
//!
//! `return` is modeled as a tagged propagation value ([`interp::Flow`])
//! threaded through block evaluation and caught at the owning closure
//! invocation, not as a host exception or a general unwind mechanism.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod interp;

pub use interp::{interpret, interpret_in};
