//! # Jasper Core
//!
//! Core types for the Jasper runtime, shared by the tree-walking
//! interpreter and the bytecode tier:
//!
//! - **Value System**: the tagged dynamic value domain (`undefined`,
//!   integers, strings, object references)
//! - **Object Model**: the single `DynObject` representation behind
//!   environments, plain objects and functions
//! - **Invoker Capability**: the callable contract attached to
//!   function-valued objects
//! - **Error Handling**: the unrecoverable failure set (type, arity,
//!   redeclaration, arithmetic) with source-line attribution

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod invoke;
pub mod object;
pub mod value;

pub use error::{JasperError, JasperResult};
pub use invoke::{Invoke, InvokerKind, NativeFn, NativeInvoker};
pub use object::{DynObject, ObjRef, ObjectKind, Shape};
pub use value::Value;

/// Jasper runtime version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
