//! # Jasper Runtime
//!
//! The global environment shared by both execution tiers: the unique root
//! environment object, the builtin registry (`print`, arithmetic,
//! comparisons) and the injected output sink.
//!
//! The sink is line-oriented and injected by the embedder; the core never
//! opens files or sockets.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod globals;
pub mod sink;

pub use globals::create_global_env;
pub use sink::{memory_sink, stdout_sink, Sink};
