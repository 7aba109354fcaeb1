//! The injected output sink.

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

/// Shared, line-oriented text sink that `print` writes to.
pub type Sink = Rc<RefCell<dyn Write>>;

/// A sink writing to the process's standard output.
#[must_use]
pub fn stdout_sink() -> Sink {
    Rc::new(RefCell::new(std::io::stdout()))
}

/// An in-memory sink plus a handle to read back what was written.
/// Used by tests and by the tier-equivalence harness.
#[must_use]
pub fn memory_sink() -> (Sink, Rc<RefCell<Vec<u8>>>) {
    let buffer: Rc<RefCell<Vec<u8>>> = Rc::new(RefCell::new(Vec::new()));
    let sink: Sink = buffer.clone();
    (sink, buffer)
}
