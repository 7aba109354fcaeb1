//! The global environment and its builtins.
//!
//! Created once per script run, before any user code executes; the unique
//! root of the environment chain (`parent = None`), never replaced.
//!
//! Builtins raise failures with line 0 — they cannot see the call site;
//! the triggering call site patches the real line in.

use crate::sink::Sink;
use jasper_core::{DynObject, Invoke, JasperError, JasperResult, NativeInvoker, ObjRef, Value};
use std::cmp::Ordering;
use std::io::Write;
use std::rc::Rc;

/// Create the global environment with all builtins registered.
#[must_use]
pub fn create_global_env(sink: Sink) -> ObjRef {
    let global = DynObject::new_env(None);
    global.register("global", Value::Object(global.clone()));

    register_builtin(&global, "print", {
        let sink = sink.clone();
        move |_, args: &[Value]| {
            let joined = args
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(sink.borrow_mut(), "{joined}")
                .map_err(|e| JasperError::type_error(format!("print failed: {e}"), 0))?;
            Ok(Value::Undefined)
        }
    });

    register_arith(&global, "+", |a, b| Ok(a.wrapping_add(b)));
    register_arith(&global, "-", |a, b| Ok(a.wrapping_sub(b)));
    register_arith(&global, "*", |a, b| Ok(a.wrapping_mul(b)));
    register_arith(&global, "/", |a, b| {
        a.checked_div(b)
            .ok_or_else(|| JasperError::arithmetic("division by zero", 0))
    });
    register_arith(&global, "%", |a, b| {
        a.checked_rem(b)
            .ok_or_else(|| JasperError::arithmetic("modulo by zero", 0))
    });

    register_builtin(&global, "==", |_, args| {
        let (a, b) = binary_args(args)?;
        Ok(bool_value(a == b))
    });
    register_builtin(&global, "!=", |_, args| {
        let (a, b) = binary_args(args)?;
        Ok(bool_value(a != b))
    });

    register_compare(&global, "<", |ord| ord == Ordering::Less);
    register_compare(&global, "<=", |ord| ord != Ordering::Greater);
    register_compare(&global, ">", |ord| ord == Ordering::Greater);
    register_compare(&global, ">=", |ord| ord != Ordering::Less);

    global
}

fn register_builtin(
    global: &ObjRef,
    name: &str,
    body: impl Fn(Value, &[Value]) -> JasperResult<Value> + 'static,
) {
    let invoker: Rc<dyn Invoke> = Rc::new(NativeInvoker::new(name, body));
    global.register(name, Value::Object(DynObject::new_function(name, invoker)));
}

/// Comparison truth is the language's integer convention: `1` / `0`.
const fn bool_value(b: bool) -> Value {
    Value::Int(b as i64)
}

fn binary_args(args: &[Value]) -> JasperResult<(&Value, &Value)> {
    match args {
        [a, b] => Ok((a, b)),
        _ => Err(JasperError::arity(2, args.len(), 0)),
    }
}

fn int_operands(op: &'static str, args: &[Value]) -> JasperResult<(i64, i64)> {
    let (a, b) = binary_args(args)?;
    match (a.as_int(), b.as_int()) {
        (Some(a), Some(b)) => Ok((a, b)),
        _ => Err(JasperError::type_error(
            format!(
                "{op} expects integers, got {} and {}",
                a.kind_name(),
                b.kind_name()
            ),
            0,
        )),
    }
}

fn register_arith(global: &ObjRef, op: &'static str, f: impl Fn(i64, i64) -> JasperResult<i64> + 'static) {
    register_builtin(global, op, move |_, args| {
        let (a, b) = int_operands(op, args)?;
        Ok(Value::Int(f(a, b)?))
    });
}

/// Ordering requires mutually ordered operands: integers numerically,
/// strings lexicographically, nothing else.
fn register_compare(global: &ObjRef, op: &'static str, f: impl Fn(Ordering) -> bool + 'static) {
    register_builtin(global, op, move |_, args| {
        let (a, b) = binary_args(args)?;
        let ord = match (a, b) {
            (Value::Int(a), Value::Int(b)) => a.cmp(b),
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            _ => {
                return Err(JasperError::type_error(
                    format!(
                        "{op} cannot order {} and {}",
                        a.kind_name(),
                        b.kind_name()
                    ),
                    0,
                ))
            }
        };
        Ok(bool_value(f(ord)))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::memory_sink;

    fn global() -> ObjRef {
        let (sink, _) = memory_sink();
        create_global_env(sink)
    }

    fn call(env: &ObjRef, name: &str, args: &[Value]) -> JasperResult<Value> {
        let fun = env.lookup(name);
        fun.as_object().expect("builtin").invoke(Value::Undefined, args)
    }

    #[test]
    fn test_global_binds_itself() {
        let env = global();
        assert_eq!(env.lookup("global"), Value::Object(env.clone()));
    }

    #[test]
    fn test_print_joins_with_spaces() {
        let (sink, buffer) = memory_sink();
        let env = create_global_env(sink);
        call(&env, "print", &[Value::Int(1), Value::str("x"), Value::Undefined]).unwrap();
        assert_eq!(String::from_utf8(buffer.borrow().clone()).unwrap(), "1 x undefined\n");
    }

    #[test]
    fn test_arithmetic_builtins() {
        let env = global();
        assert_eq!(call(&env, "+", &[Value::Int(40), Value::Int(2)]).unwrap(), Value::Int(42));
        assert_eq!(call(&env, "-", &[Value::Int(1), Value::Int(3)]).unwrap(), Value::Int(-2));
        assert_eq!(call(&env, "*", &[Value::Int(6), Value::Int(7)]).unwrap(), Value::Int(42));
        assert_eq!(call(&env, "/", &[Value::Int(7), Value::Int(2)]).unwrap(), Value::Int(3));
        assert_eq!(call(&env, "/", &[Value::Int(-7), Value::Int(2)]).unwrap(), Value::Int(-3));
        assert_eq!(call(&env, "%", &[Value::Int(7), Value::Int(2)]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_division_by_zero_is_an_arithmetic_failure() {
        let env = global();
        let err = call(&env, "/", &[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind(), "ArithmeticError");
        let err = call(&env, "%", &[Value::Int(1), Value::Int(0)]).unwrap_err();
        assert_eq!(err.kind(), "ArithmeticError");
    }

    #[test]
    fn test_arithmetic_rejects_non_integers() {
        let env = global();
        let err = call(&env, "+", &[Value::str("a"), Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
    }

    #[test]
    fn test_equality_follows_the_value_rule() {
        let env = global();
        assert_eq!(call(&env, "==", &[Value::Int(1), Value::Int(1)]).unwrap(), Value::Int(1));
        assert_eq!(call(&env, "==", &[Value::Int(1), Value::str("1")]).unwrap(), Value::Int(0));
        assert_eq!(call(&env, "!=", &[Value::Undefined, Value::Undefined]).unwrap(), Value::Int(0));

        let obj = DynObject::new_object();
        assert_eq!(
            call(&env, "==", &[Value::Object(obj.clone()), Value::Object(obj)]).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_ordering_ints_and_strings() {
        let env = global();
        assert_eq!(call(&env, "<", &[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(1));
        assert_eq!(call(&env, ">=", &[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(0));
        assert_eq!(
            call(&env, "<", &[Value::str("abc"), Value::str("abd")]).unwrap(),
            Value::Int(1)
        );
        assert_eq!(
            call(&env, "<=", &[Value::str("b"), Value::str("b")]).unwrap(),
            Value::Int(1)
        );
    }

    #[test]
    fn test_ordering_mixed_kinds_is_a_type_error() {
        let env = global();
        let err = call(&env, "<", &[Value::Int(1), Value::str("1")]).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
        let err = call(&env, ">", &[Value::Undefined, Value::Undefined]).unwrap_err();
        assert_eq!(err.kind(), "TypeError");
    }

    #[test]
    fn test_binary_builtins_check_arity() {
        let env = global();
        let err = call(&env, "+", &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind(), "ArityError");
    }
}
