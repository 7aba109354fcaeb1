//! Call-site linker and monomorphic inline caches.
//!
//! Every dynamic call site starts unlinked. Its first execution resolves
//! through the authoritative slow path, with the same error conditions
//! the tree-walking tier applies, and installs a guarded cache entry.
//! A guard failure re-resolves and replaces the entry wholesale; there
//! are no cache chains. Correctness never depends on cache state: with
//! [`IcMode::Disabled`] every execution takes the slow path and must be
//! observably identical.
//!
//! # Guards
//!
//! - lookup: the cached environment object still holds the name
//! - call: callee identity (arity stays a per-call contract)
//! - field get/set/method: receiver shape equality, the only structural
//!   guard
//! - truth: value kind (integer vs. everything else)

use jasper_compiler::{SiteDesc, SiteKind};
use jasper_core::{Invoke, JasperError, JasperResult, ObjRef, Shape, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Whether call sites may install inline caches.
///
/// `Disabled` forces the slow path on every execution; results must be
/// byte-identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IcMode {
    /// Link sites on first execution and reuse guarded fast paths.
    Enabled,
    /// Never link; every execution resolves from scratch.
    Disabled,
}

impl IcMode {
    #[inline]
    fn caching(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

/// Monomorphic cache state of one call site.
pub enum IcState {
    /// Not yet executed, or deliberately left cold.
    Unlinked,
    /// A name lookup resolved into this environment object.
    Lookup {
        /// The environment the name was found in.
        env: ObjRef,
    },
    /// A call bound to one callee identity.
    Call {
        /// The cached callee object.
        callee: ObjRef,
        /// Its invoker, ready to dispatch.
        invoker: Rc<dyn Invoke>,
    },
    /// A field or method slot under a receiver-shape guard.
    Field {
        /// The receiver shape the slot was computed under.
        shape: Shape,
        /// Field position within that shape.
        slot: usize,
    },
    /// A truthiness test specialized on value kind.
    Truth {
        /// True when the cached operand kind was integer.
        int_kind: bool,
    },
}

impl IcState {
    fn name(&self) -> &'static str {
        match self {
            Self::Unlinked => "unlinked",
            Self::Lookup { .. } => "lookup",
            Self::Call { .. } => "call",
            Self::Field { .. } => "field",
            Self::Truth { .. } => "truth",
        }
    }
}

impl fmt::Debug for IcState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One linked call site: the compiler's static descriptor paired with
/// its mutable cache state.
#[derive(Debug)]
pub struct CallSite {
    kind: SiteKind,
    line: u32,
    cache: RefCell<IcState>,
}

impl CallSite {
    /// Create an unlinked site from its compile-time descriptor.
    #[must_use]
    pub fn new(desc: &SiteDesc) -> Self {
        Self {
            kind: desc.kind.clone(),
            line: desc.line,
            cache: RefCell::new(IcState::Unlinked),
        }
    }

    /// The site's static description.
    #[must_use]
    pub fn kind(&self) -> &SiteKind {
        &self.kind
    }

    /// Source line of the originating expression.
    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// True once a cache entry is installed.
    #[must_use]
    pub fn is_linked(&self) -> bool {
        !matches!(&*self.cache.borrow(), IcState::Unlinked)
    }

    /// Replace the cache entry wholesale.
    fn relink(&self, state: IcState) {
        tracing::debug!(site = %self.kind, line = self.line, state = state.name(), "site linked");
        *self.cache.borrow_mut() = state;
    }

    // =========================================================================
    // Variable sites
    // =========================================================================

    /// Chain lookup of the site's name, caching the resolved environment.
    /// An unresolved name yields `undefined` and stays unlinked, so a
    /// later declaration is still found.
    pub fn lookup(&self, global: &ObjRef, mode: IcMode) -> Value {
        let SiteKind::Lookup { name } = &self.kind else {
            unreachable!("lookup through {} site", self.kind);
        };
        if mode.caching() {
            if let IcState::Lookup { env } = &*self.cache.borrow() {
                let value = env.get_field(name);
                if !value.is_undefined() {
                    return value;
                }
                // Guard failure: the binding is no longer here.
            }
        }
        match resolve_env(global, name) {
            Some((env, value)) => {
                if mode.caching() {
                    self.relink(IcState::Lookup { env });
                }
                value
            }
            None => Value::Undefined,
        }
    }

    /// Store through a variable site: registration into the global
    /// environment, redeclaration-checked when the site is a `var`
    /// declaration. Never cached; a declaration must re-run its check
    /// on every execution.
    pub fn store(&self, global: &ObjRef, value: Value) -> JasperResult<()> {
        let SiteKind::Store { name, declaration } = &self.kind else {
            unreachable!("store through {} site", self.kind);
        };
        if *declaration {
            global.declare(name, value, self.line)
        } else {
            global.register(name.clone(), value);
            Ok(())
        }
    }

    /// Unconditional registration of a named function literal.
    pub fn register(&self, global: &ObjRef, value: Value) {
        let SiteKind::Register { name } = &self.kind else {
            unreachable!("register through {} site", self.kind);
        };
        global.register(name.clone(), value);
    }

    // =========================================================================
    // Call sites
    // =========================================================================

    /// Invoke `callee`, caching its identity and dispatch kind. Arity is
    /// checked by the invoker on every call.
    pub fn call(&self, callee: &Value, receiver: Value, args: &[Value], mode: IcMode) -> JasperResult<Value> {
        debug_assert!(matches!(self.kind, SiteKind::Call));
        if mode.caching() {
            // The borrow must not outlive this block: the invocation
            // below may re-enter this very site.
            let hit = match &*self.cache.borrow() {
                IcState::Call {
                    callee: cached,
                    invoker,
                } => match callee.as_object() {
                    Some(obj) if Rc::ptr_eq(obj, cached) => Some(invoker.clone()),
                    _ => None,
                },
                _ => None,
            };
            if let Some(invoker) = hit {
                return invoker
                    .invoke(receiver, args)
                    .map_err(|e| e.with_line(self.line));
            }
        }

        let Some(fun) = callee.as_object().cloned() else {
            return Err(JasperError::type_error(
                format!("{callee} is not invocable"),
                self.line,
            ));
        };
        if mode.caching() {
            if let Some(invoker) = fun.invoker().cloned() {
                self.relink(IcState::Call {
                    callee: fun.clone(),
                    invoker,
                });
            }
        }
        fun.invoke(receiver, args).map_err(|e| e.with_line(self.line))
    }

    /// Method dispatch: shape-cached field slot for the method, then an
    /// invocation with the receiver bound as `this`.
    pub fn call_method(&self, receiver: &Value, args: &[Value], mode: IcMode) -> JasperResult<Value> {
        let SiteKind::MethodCall { name } = &self.kind else {
            unreachable!("method call through {} site", self.kind);
        };
        let Some(object) = receiver.as_object().cloned() else {
            return Err(JasperError::type_error(
                format!("{receiver} is not an object"),
                self.line,
            ));
        };

        let mut method = None;
        if mode.caching() {
            if let IcState::Field { shape, slot } = &*self.cache.borrow() {
                if object.shape_matches(shape) {
                    method = object.field_at(*slot);
                }
            }
        }
        let method = match method {
            Some(value) => value,
            None => {
                if mode.caching() {
                    if let Some(slot) = object.field_index(name) {
                        self.relink(IcState::Field {
                            shape: object.shape(),
                            slot,
                        });
                    }
                }
                object.get_field(name)
            }
        };

        let Some(fun) = method.as_object().cloned() else {
            return Err(JasperError::type_error(
                format!("{name} is not invocable"),
                self.line,
            ));
        };
        fun.invoke(receiver.clone(), args)
            .map_err(|e| e.with_line(self.line))
    }

    // =========================================================================
    // Field sites
    // =========================================================================

    /// Field read under a shape guard; absent fields yield `undefined`
    /// and leave the site unlinked.
    pub fn get_field(&self, receiver: &Value, mode: IcMode) -> JasperResult<Value> {
        let SiteKind::GetField { name } = &self.kind else {
            unreachable!("field read through {} site", self.kind);
        };
        let Some(object) = receiver.as_object() else {
            return Err(JasperError::type_error(
                format!("{receiver} is not an object"),
                self.line,
            ));
        };
        if mode.caching() {
            if let IcState::Field { shape, slot } = &*self.cache.borrow() {
                if object.shape_matches(shape) {
                    return Ok(object.field_at(*slot).unwrap_or(Value::Undefined));
                }
            }
        }
        match object.field_index(name) {
            Some(slot) => {
                let value = object.field_at(slot).unwrap_or(Value::Undefined);
                if mode.caching() {
                    self.relink(IcState::Field {
                        shape: object.shape(),
                        slot,
                    });
                }
                Ok(value)
            }
            None => Ok(Value::Undefined),
        }
    }

    /// Field write under a shape guard. Writing a fresh field changes
    /// the receiver's shape; the site is relinked against the new shape.
    pub fn set_field(&self, receiver: &Value, value: Value, mode: IcMode) -> JasperResult<()> {
        let SiteKind::SetField { name } = &self.kind else {
            unreachable!("field write through {} site", self.kind);
        };
        let Some(object) = receiver.as_object() else {
            return Err(JasperError::type_error(
                format!("{receiver} is not an object"),
                self.line,
            ));
        };
        if mode.caching() {
            let hit = match &*self.cache.borrow() {
                IcState::Field { shape, slot } if object.shape_matches(shape) => Some(*slot),
                _ => None,
            };
            if let Some(slot) = hit {
                object.set_field_at(slot, value);
                return Ok(());
            }
        }
        object.set_field(name.clone(), value);
        if mode.caching() {
            if let Some(slot) = object.field_index(name) {
                self.relink(IcState::Field {
                    shape: object.shape(),
                    slot,
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Truthiness sites
    // =========================================================================

    /// Truth test specialized on the operand's kind: for cached integer
    /// operands only the zero test remains, for any other kind the
    /// answer is constant `true`.
    pub fn truth(&self, value: &Value, mode: IcMode) -> bool {
        debug_assert!(matches!(self.kind, SiteKind::Truth));
        let is_int = matches!(value, Value::Int(_));
        if mode.caching() {
            let hit = matches!(&*self.cache.borrow(), IcState::Truth { int_kind } if *int_kind == is_int);
            if !hit {
                self.relink(IcState::Truth { int_kind: is_int });
            }
        }
        value.is_truthy()
    }
}

/// Walk the environment chain and report where the name lives.
fn resolve_env(env: &ObjRef, name: &str) -> Option<(ObjRef, Value)> {
    let mut current = Some(env.clone());
    while let Some(object) = current {
        if let Some(index) = object.field_index(name) {
            let value = object.field_at(index).unwrap_or(Value::Undefined);
            return Some((object, value));
        }
        current = object.parent().cloned();
    }
    None
}
