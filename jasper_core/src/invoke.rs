//! The invoker capability: the callable contract carried by function
//! objects.
//!
//! Two families implement it: native/builtin invokers with fixed host
//! logic (defined here) and user-defined invokers supplied by the
//! execution tiers (the interpreter's closure bodies and the compiled
//! tier's code objects). Each reports its family through
//! [`InvokerKind`].

use crate::error::JasperResult;
use crate::value::Value;
use std::rc::Rc;

/// Dispatch classification of an invoker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokerKind {
    /// Fixed host logic (builtins).
    Native,
    /// User-defined function body (either tier).
    User,
}

/// The callable contract: `invoke(receiver, args) -> value`.
///
/// Errors raised by an invoker carry source line 0 (the invoker cannot
/// see the call site); the caller patches in the real line.
pub trait Invoke {
    /// Invoke with an explicit receiver (`this`) and argument values.
    fn invoke(&self, receiver: Value, args: &[Value]) -> JasperResult<Value>;

    /// Which family this invoker belongs to.
    fn kind(&self) -> InvokerKind;
}

/// Host function signature for builtins.
pub type NativeFn = Rc<dyn Fn(Value, &[Value]) -> JasperResult<Value>>;

/// A builtin invoker wrapping fixed host logic.
pub struct NativeInvoker {
    name: Rc<str>,
    body: NativeFn,
}

impl NativeInvoker {
    /// Wrap a host closure as an invoker.
    pub fn new(
        name: impl Into<Rc<str>>,
        body: impl Fn(Value, &[Value]) -> JasperResult<Value> + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            body: Rc::new(body),
        }
    }

    /// The builtin's name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Invoke for NativeInvoker {
    fn invoke(&self, receiver: Value, args: &[Value]) -> JasperResult<Value> {
        (self.body)(receiver, args)
    }

    fn kind(&self) -> InvokerKind {
        InvokerKind::Native
    }
}
