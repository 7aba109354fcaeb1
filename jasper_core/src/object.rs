//! The dynamic object model.
//!
//! A single representation, [`DynObject`], sits behind three roles:
//! lexical environments, plain objects, and functions. The roles differ
//! in two capabilities:
//!
//! - **Chaining**: only environments have a `parent`; name [`lookup`]
//!   walks the chain, while plain-object field access never delegates.
//!   The two lookup disciplines are kept apart by an explicit
//!   [`ObjectKind`] tag rather than by convention.
//! - **Invocation**: a function is any object carrying an invoker; this
//!   is a capability flag, not a class hierarchy.
//!
//! Fields live in an insertion-ordered map. The ordered list of field
//! names currently present is the object's *shape*; the position of a
//! name in that list is its *field slot*. The inline-cache tier guards on
//! shape equality and then reads the slot directly.
//!
//! [`lookup`]: DynObject::lookup

use crate::error::{JasperError, JasperResult};
use crate::invoke::Invoke;
use crate::value::Value;
use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Shared reference to a dynamic object. Identity (`Rc::ptr_eq`) is the
/// language's object-equality rule and the call-site linker's callee
/// guard.
pub type ObjRef = Rc<DynObject>;

/// An object's shape: its field names in insertion order.
pub type Shape = Rc<[Rc<str>]>;

/// Role tag separating chaining environments from plain objects.
#[derive(Clone)]
pub enum ObjectKind {
    /// A lexical environment; `parent` is the enclosing scope (`None`
    /// only for the unique global root).
    Env {
        /// Enclosing lexical scope.
        parent: Option<ObjRef>,
    },
    /// A plain object (or function object): a value, not a scope.
    Plain,
}

/// The single runtime representation for environments, plain objects and
/// functions.
pub struct DynObject {
    kind: ObjectKind,
    fields: RefCell<IndexMap<Rc<str>, Value, FxBuildHasher>>,
    /// Present iff this object is a function. Immutable after
    /// construction.
    invoker: Option<Rc<dyn Invoke>>,
    /// Function name, for diagnostics and printing.
    name: Option<Rc<str>>,
    /// Statically-resolved local slot count; set only by the compiled
    /// tier's loader. The interpreter never pre-sizes.
    slot_count: Cell<usize>,
}

impl DynObject {
    /// Create a new environment chained to `parent`.
    #[must_use]
    pub fn new_env(parent: Option<ObjRef>) -> ObjRef {
        Rc::new(Self {
            kind: ObjectKind::Env { parent },
            fields: RefCell::new(IndexMap::default()),
            invoker: None,
            name: None,
            slot_count: Cell::new(0),
        })
    }

    /// Create a new plain object with no parent.
    #[must_use]
    pub fn new_object() -> ObjRef {
        Rc::new(Self {
            kind: ObjectKind::Plain,
            fields: RefCell::new(IndexMap::default()),
            invoker: None,
            name: None,
            slot_count: Cell::new(0),
        })
    }

    /// Create a new function object with the given invoker.
    #[must_use]
    pub fn new_function(name: impl Into<Rc<str>>, invoker: Rc<dyn Invoke>) -> ObjRef {
        Rc::new(Self {
            kind: ObjectKind::Plain,
            fields: RefCell::new(IndexMap::default()),
            invoker: Some(invoker),
            name: Some(name.into()),
            slot_count: Cell::new(0),
        })
    }

    // =========================================================================
    // Environment operations
    // =========================================================================

    /// Chain lookup: search this object's fields, then the parent chain.
    /// Exhaustion yields `undefined`, never an error.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Value {
        if let Some(value) = self.fields.borrow().get(name) {
            return value.clone();
        }
        match &self.kind {
            ObjectKind::Env {
                parent: Some(parent),
            } => parent.lookup(name),
            _ => Value::Undefined,
        }
    }

    /// Declare or overwrite `name` directly in this object; no chain
    /// walk. Used for first declarations, assignments, and parameter /
    /// `this` binding alike.
    pub fn register(&self, name: impl Into<Rc<str>>, value: Value) {
        self.fields.borrow_mut().insert(name.into(), value);
    }

    /// `register` under the declaration rule: fails with a
    /// redeclaration error when the name already resolves to a
    /// non-`undefined` value.
    pub fn declare(&self, name: &str, value: Value, line: u32) -> JasperResult<()> {
        if !self.lookup(name).is_undefined() {
            return Err(JasperError::redeclaration(name, line));
        }
        self.register(name, value);
        Ok(())
    }

    /// The enclosing scope, if this object is a chained environment.
    #[must_use]
    pub fn parent(&self) -> Option<&ObjRef> {
        match &self.kind {
            ObjectKind::Env { parent } => parent.as_ref(),
            ObjectKind::Plain => None,
        }
    }

    // =========================================================================
    // Plain-object field access (never chains)
    // =========================================================================

    /// Read a field; `undefined` if absent.
    #[must_use]
    pub fn get_field(&self, name: &str) -> Value {
        self.fields
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Create-or-overwrite a field.
    pub fn set_field(&self, name: impl Into<Rc<str>>, value: Value) {
        self.fields.borrow_mut().insert(name.into(), value);
    }

    // =========================================================================
    // Shape & slots (inline-cache support)
    // =========================================================================

    /// The current shape: field names in insertion order.
    #[must_use]
    pub fn shape(&self) -> Shape {
        self.fields.borrow().keys().cloned().collect()
    }

    /// Whether the current field names, in order, equal `shape`.
    /// This is the inline-cache guard; it never allocates.
    #[must_use]
    pub fn shape_matches(&self, shape: &Shape) -> bool {
        let fields = self.fields.borrow();
        fields.len() == shape.len() && fields.keys().zip(shape.iter()).all(|(a, b)| a == b)
    }

    /// Position of `name` in the field map, if present.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.borrow().get_index_of(name)
    }

    /// Read the field at `index`. Meaningful only while the shape under
    /// which `index` was computed still holds.
    #[must_use]
    pub fn field_at(&self, index: usize) -> Option<Value> {
        self.fields
            .borrow()
            .get_index(index)
            .map(|(_, value)| value.clone())
    }

    /// Overwrite the field at `index` (shape-preserving).
    pub fn set_field_at(&self, index: usize, value: Value) -> bool {
        match self.fields.borrow_mut().get_index_mut(index) {
            Some((_, slot)) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Snapshot of the fields, for printing.
    #[must_use]
    pub fn fields_snapshot(&self) -> Vec<(Rc<str>, Value)> {
        self.fields
            .borrow()
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    /// Statically-resolved local slot count (compiled tier only).
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slot_count.get()
    }

    /// Record the resolved slot count.
    pub fn set_slot_count(&self, count: usize) {
        self.slot_count.set(count);
    }

    // =========================================================================
    // Invocation capability
    // =========================================================================

    /// Whether this object is a function.
    #[must_use]
    pub fn is_function(&self) -> bool {
        self.invoker.is_some()
    }

    /// Function name, if this object is a function.
    #[must_use]
    pub fn function_name(&self) -> Option<Rc<str>> {
        if self.is_function() {
            self.name.clone()
        } else {
            None
        }
    }

    /// The invoker capability, if present.
    #[must_use]
    pub fn invoker(&self) -> Option<&Rc<dyn Invoke>> {
        self.invoker.as_ref()
    }

    /// Invoke this object as a function. Errors raised here carry line 0;
    /// the call site patches the real line in.
    pub fn invoke(&self, receiver: Value, args: &[Value]) -> JasperResult<Value> {
        match &self.invoker {
            Some(invoker) => invoker.invoke(receiver, args),
            None => Err(JasperError::type_error(
                format!("{} is not invocable", self.name.as_deref().unwrap_or("object")),
                0,
            )),
        }
    }
}

impl std::fmt::Debug for DynObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let role = match (&self.kind, self.is_function()) {
            (_, true) => "function",
            (ObjectKind::Env { .. }, _) => "env",
            (ObjectKind::Plain, _) => "object",
        };
        write!(f, "DynObject({role}, {} fields)", self.fields.borrow().len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoke::NativeInvoker;

    fn constant_fn(value: i64) -> Rc<dyn Invoke> {
        Rc::new(NativeInvoker::new("k", move |_, _| Ok(Value::Int(value))))
    }

    #[test]
    fn test_lookup_walks_the_parent_chain() {
        let root = DynObject::new_env(None);
        root.register("a", Value::Int(1));
        let child = DynObject::new_env(Some(root));
        child.register("b", Value::Int(2));

        assert_eq!(child.lookup("a"), Value::Int(1));
        assert_eq!(child.lookup("b"), Value::Int(2));
        assert_eq!(child.lookup("c"), Value::Undefined);
    }

    #[test]
    fn test_inner_binding_shadows_outer() {
        let root = DynObject::new_env(None);
        root.register("x", Value::Int(1));
        let child = DynObject::new_env(Some(root.clone()));
        child.register("x", Value::Int(2));

        assert_eq!(child.lookup("x"), Value::Int(2));
        assert_eq!(root.lookup("x"), Value::Int(1));
    }

    #[test]
    fn test_register_never_walks_up() {
        let root = DynObject::new_env(None);
        let child = DynObject::new_env(Some(root.clone()));
        child.register("x", Value::Int(5));

        assert_eq!(root.lookup("x"), Value::Undefined);
    }

    #[test]
    fn test_declare_rejects_bound_name() {
        let env = DynObject::new_env(None);
        env.declare("x", Value::Int(1), 1).unwrap();
        let err = env.declare("x", Value::Int(2), 2).unwrap_err();
        assert_eq!(err.kind(), "RedeclarationError");
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_declare_allows_undefined_binding() {
        let env = DynObject::new_env(None);
        env.register("x", Value::Undefined);
        assert!(env.declare("x", Value::Int(1), 1).is_ok());
    }

    #[test]
    fn test_plain_objects_do_not_chain() {
        let obj = DynObject::new_object();
        assert!(obj.parent().is_none());
        assert_eq!(obj.get_field("missing"), Value::Undefined);
    }

    #[test]
    fn test_field_set_then_get() {
        let obj = DynObject::new_object();
        obj.set_field("a", Value::Int(1));
        obj.set_field("a", Value::Int(2));
        assert_eq!(obj.get_field("a"), Value::Int(2));
    }

    #[test]
    fn test_shape_tracks_field_names_in_order() {
        let obj = DynObject::new_object();
        obj.set_field("a", Value::Int(1));
        obj.set_field("b", Value::Int(2));

        let shape = obj.shape();
        assert_eq!(shape.len(), 2);
        assert_eq!(&*shape[0], "a");
        assert_eq!(&*shape[1], "b");

        // Overwriting an existing field leaves the shape unchanged.
        obj.set_field("a", Value::Int(9));
        assert_eq!(obj.shape(), shape);

        // Adding a field changes the shape.
        obj.set_field("c", Value::Int(3));
        assert_ne!(obj.shape(), shape);
    }

    #[test]
    fn test_field_slots_match_shape_positions() {
        let obj = DynObject::new_object();
        obj.set_field("x", Value::Int(10));
        obj.set_field("y", Value::Int(20));

        assert_eq!(obj.field_index("y"), Some(1));
        assert_eq!(obj.field_at(1), Some(Value::Int(20)));
        assert!(obj.set_field_at(1, Value::Int(25)));
        assert_eq!(obj.get_field("y"), Value::Int(25));
        assert!(!obj.set_field_at(7, Value::Int(0)));
    }

    #[test]
    fn test_shape_matches_is_order_sensitive() {
        let obj = DynObject::new_object();
        obj.set_field("a", Value::Int(1));
        obj.set_field("b", Value::Int(2));
        let shape = obj.shape();

        assert!(obj.shape_matches(&shape));
        obj.set_field("a", Value::Int(9));
        assert!(obj.shape_matches(&shape));

        let other = DynObject::new_object();
        other.set_field("b", Value::Int(2));
        other.set_field("a", Value::Int(1));
        assert!(!other.shape_matches(&shape));

        obj.set_field("c", Value::Int(3));
        assert!(!obj.shape_matches(&shape));
    }

    #[test]
    fn test_function_capability_flag() {
        let fun = DynObject::new_function("answer", constant_fn(42));
        assert!(fun.is_function());
        assert_eq!(fun.function_name().as_deref(), Some("answer"));
        assert_eq!(
            fun.invoke(Value::Undefined, &[]).unwrap(),
            Value::Int(42)
        );

        let plain = DynObject::new_object();
        assert!(!plain.is_function());
        let err = plain.invoke(Value::Undefined, &[]).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
    }

    #[test]
    fn test_functions_can_still_hold_fields() {
        let fun = DynObject::new_function("f", constant_fn(0));
        fun.set_field("tag", Value::Int(7));
        assert_eq!(fun.get_field("tag"), Value::Int(7));
    }

    #[test]
    fn test_slot_count_roundtrip() {
        let env = DynObject::new_env(None);
        assert_eq!(env.slot_count(), 0);
        env.set_slot_count(4);
        assert_eq!(env.slot_count(), 4);
    }
}
