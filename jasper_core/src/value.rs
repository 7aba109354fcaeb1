//! Dynamic value representation shared by both execution tiers.
//!
//! A [`Value`] is one of four kinds: the `undefined` sentinel, a 64-bit
//! integer, a text string, or a reference to a [`DynObject`]. Values are
//! cheap to clone: strings and objects are reference counted.
//!
//! Equality follows the language rule: the sentinel equals only itself,
//! integers and strings compare by value, object references compare by
//! identity. Truthiness has exactly one falsy value, the integer `0` —
//! `undefined`, strings and objects are all truthy.

use crate::object::ObjRef;
use std::fmt;
use std::rc::Rc;

/// A dynamic value.
#[derive(Clone)]
pub enum Value {
    /// The distinguished `undefined` sentinel.
    Undefined,
    /// A 64-bit integer.
    Int(i64),
    /// A text string.
    Str(Rc<str>),
    /// A reference to a dynamic object (environment, plain object or
    /// function).
    Object(ObjRef),
}

impl Value {
    /// Create a string value.
    #[must_use]
    pub fn str(s: impl Into<Rc<str>>) -> Self {
        Self::Str(s.into())
    }

    /// Check for the `undefined` sentinel.
    #[inline]
    #[must_use]
    pub const fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    /// Check for an integer.
    #[inline]
    #[must_use]
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Try to extract an integer.
    #[inline]
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to extract a string.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Try to extract an object reference.
    #[inline]
    #[must_use]
    pub const fn as_object(&self) -> Option<&ObjRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Language truthiness: the integer `0` is the only falsy value.
    #[inline]
    #[must_use]
    pub const fn is_truthy(&self) -> bool {
        !matches!(self, Self::Int(0))
    }

    /// Kind name for diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::Object(obj) => {
                if obj.is_function() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Shallow print form: like `Display`, but object-valued fields render
    /// as `object` / `function <name>` without descending into them.
    /// Keeps printing of cyclic objects (`global.global`) terminating.
    fn fmt_shallow(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(obj) => {
                if let Some(name) = obj.function_name() {
                    write!(f, "function {name}")
                } else {
                    write!(f, "object")
                }
            }
            other => write!(f, "{other}"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Undefined, Self::Undefined) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Eq for Value {}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<ObjRef> for Value {
    fn from(obj: ObjRef) -> Self {
        Self::Object(obj)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "undefined"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s}"),
            Self::Object(obj) => {
                if let Some(name) = obj.function_name() {
                    return write!(f, "function {name}");
                }
                write!(f, "{{")?;
                for (name, value) in obj.fields_snapshot() {
                    write!(f, " {name}=")?;
                    value.fmt_shallow(f)?;
                }
                write!(f, " }}")
            }
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Undefined => write!(f, "Value(undefined)"),
            Self::Int(i) => write!(f, "Value({i})"),
            Self::Str(s) => write!(f, "Value({s:?})"),
            Self::Object(obj) => write!(f, "Value(object@{:p})", Rc::as_ptr(obj)),
        }
    }
}
