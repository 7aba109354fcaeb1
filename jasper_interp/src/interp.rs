//! Structural recursive evaluation of the AST.

use jasper_ast::{Block, Expr, FunLiteral, Lit, Script};
use jasper_core::{DynObject, Invoke, InvokerKind, JasperError, JasperResult, ObjRef, Value};
use jasper_runtime::{create_global_env, Sink};
use smallvec::SmallVec;
use std::rc::Rc;

/// Evaluation outcome of one node: either a plain value, or a `return`
/// in flight towards the nearest enclosing function invocation. The
/// carried line attributes a `return` that escapes the top level.
pub enum Flow {
    /// Normal completion.
    Value(Value),
    /// A non-local `return` with its value and source line.
    Return(Value, u32),
}

/// Unwrap a `Flow::Value`, re-propagating an in-flight `return`.
macro_rules! flow {
    ($e:expr) => {
        match $e? {
            Flow::Value(value) => value,
            ret @ Flow::Return(..) => return Ok(ret),
        }
    };
}

/// Interpret a script against a fresh global environment writing to
/// `sink`.
pub fn interpret(script: &Script, sink: Sink) -> JasperResult<()> {
    let global = create_global_env(sink);
    interpret_in(script, &global)
}

/// Interpret a script against a pre-built global environment.
pub fn interpret_in(script: &Script, global: &ObjRef) -> JasperResult<()> {
    match eval_block(&script.body, global)? {
        Flow::Value(_) => Ok(()),
        Flow::Return(_, line) => Err(JasperError::type_error("return outside function", line)),
    }
}

fn eval_block(block: &Block, env: &ObjRef) -> JasperResult<Flow> {
    for instr in &block.instrs {
        flow!(eval(instr, env));
    }
    // A block sequences; its result is always undefined.
    Ok(Flow::Value(Value::Undefined))
}

fn eval(expr: &Expr, env: &ObjRef) -> JasperResult<Flow> {
    match expr {
        Expr::Block(block) => eval_block(block, env),

        Expr::Literal { value, line: _ } => Ok(Flow::Value(match value {
            Lit::Int(i) => Value::Int(*i),
            Lit::Str(s) => Value::str(s.as_str()),
        })),

        Expr::LocalVarAccess { name, line: _ } => Ok(Flow::Value(env.lookup(name))),

        Expr::LocalVarAssignment {
            name,
            expr,
            declaration,
            line,
        } => {
            let value = flow!(eval(expr, env));
            if *declaration && !env.lookup(name).is_undefined() {
                return Err(JasperError::redeclaration(name, *line));
            }
            // Assignment writes into the *current* scope, never the
            // declaring one. Load-bearing for closure visibility; see
            // DESIGN.md.
            env.register(name.as_str(), value.clone());
            Ok(Flow::Value(value))
        }

        Expr::FunCall {
            qualifier,
            args,
            line,
        } => {
            let callee = flow!(eval(qualifier, env));
            let Some(fun) = callee.as_object().cloned() else {
                return Err(JasperError::type_error(
                    format!("{callee} is not invocable"),
                    *line,
                ));
            };
            let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
            for arg in args {
                values.push(flow!(eval(arg, env)));
            }
            let result = fun
                .invoke(Value::Undefined, &values)
                .map_err(|e| e.with_line(*line))?;
            Ok(Flow::Value(result))
        }

        Expr::Fun { fun, line: _ } => {
            let invoker: Rc<dyn Invoke> = Rc::new(ClosureInvoker {
                fun: fun.clone(),
                env: env.clone(),
            });
            let function = DynObject::new_function(fun.display_name(), invoker);
            if let Some(name) = &fun.name {
                // Self-registration in the defining environment;
                // overwrite semantics, no declaration check.
                env.register(name.as_str(), Value::Object(function.clone()));
            }
            Ok(Flow::Value(Value::Object(function)))
        }

        Expr::Return { expr, line } => {
            let value = flow!(eval(expr, env));
            Ok(Flow::Return(value, *line))
        }

        Expr::If {
            condition,
            true_block,
            false_block,
            line: _,
        } => {
            let cond = flow!(eval(condition, env));
            // Exactly one branch, never both: integer 0 is the only
            // falsy value.
            if cond.is_truthy() {
                flow!(eval_block(true_block, env));
            } else {
                flow!(eval_block(false_block, env));
            }
            Ok(Flow::Value(Value::Undefined))
        }

        Expr::New { init, line: _ } => {
            let object = DynObject::new_object();
            for (name, expr) in init {
                let value = flow!(eval(expr, env));
                object.register(name.as_str(), value);
            }
            Ok(Flow::Value(Value::Object(object)))
        }

        Expr::FieldAccess {
            receiver,
            name,
            line,
        } => {
            let receiver = flow!(eval(receiver, env));
            let object = as_object(&receiver, *line)?;
            Ok(Flow::Value(object.get_field(name)))
        }

        Expr::FieldAssignment {
            receiver,
            name,
            expr,
            line,
        } => {
            let receiver = flow!(eval(receiver, env));
            let object = as_object(&receiver, *line)?.clone();
            let value = flow!(eval(expr, env));
            object.set_field(name.as_str(), value.clone());
            Ok(Flow::Value(value))
        }

        Expr::MethodCall {
            receiver,
            name,
            args,
            line,
        } => {
            let receiver = flow!(eval(receiver, env));
            let object = as_object(&receiver, *line)?.clone();
            let method = object.get_field(name);
            let Some(fun) = method.as_object().cloned() else {
                return Err(JasperError::type_error(
                    format!("{name} is not invocable"),
                    *line,
                ));
            };
            let mut values: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
            for arg in args {
                values.push(flow!(eval(arg, env)));
            }
            // The receiver, not undefined, becomes `this`.
            let result = fun
                .invoke(receiver, &values)
                .map_err(|e| e.with_line(*line))?;
            Ok(Flow::Value(result))
        }
    }
}

fn as_object(value: &Value, line: u32) -> JasperResult<&ObjRef> {
    value
        .as_object()
        .ok_or_else(|| JasperError::type_error(format!("{value} is not an object"), line))
}

/// A user-defined closure body: captures its *defining* environment, so
/// free variables resolve lexically no matter who calls it.
struct ClosureInvoker {
    fun: Rc<FunLiteral>,
    env: ObjRef,
}

impl Invoke for ClosureInvoker {
    fn invoke(&self, receiver: Value, args: &[Value]) -> JasperResult<Value> {
        if args.len() != self.fun.params.len() {
            return Err(JasperError::arity(self.fun.params.len(), args.len(), 0));
        }
        let frame = DynObject::new_env(Some(self.env.clone()));
        frame.register("this", receiver);
        for (param, arg) in self.fun.params.iter().zip(args) {
            frame.register(param.as_str(), arg.clone());
        }
        // The function boundary is exactly where an in-flight return
        // lands.
        match eval_block(&self.fun.body, &frame)? {
            Flow::Value(_) => Ok(Value::Undefined),
            Flow::Return(value, _) => Ok(value),
        }
    }

    fn kind(&self) -> InvokerKind {
        InvokerKind::User
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jasper_runtime::memory_sink;

    fn run(instrs: Vec<Expr>) -> (JasperResult<()>, String) {
        let script = Script::new(Block::new(instrs, 1));
        let (sink, buffer) = memory_sink();
        let result = interpret(&script, sink);
        let output = String::from_utf8(buffer.borrow().clone()).unwrap();
        (result, output)
    }

    fn run_ok(instrs: Vec<Expr>) -> String {
        let (result, output) = run(instrs);
        result.expect("script should succeed");
        output
    }

    fn run_err(instrs: Vec<Expr>) -> JasperError {
        let (result, _) = run(instrs);
        result.expect_err("script should fail")
    }

    #[test]
    fn test_print_literal() {
        let output = run_ok(vec![Expr::call_var("print", vec![Expr::int(3, 1)], 1)]);
        assert_eq!(output, "3\n");
    }

    #[test]
    fn test_function_call_with_arithmetic() {
        // var f = function(x) { return x + 1; }; print(f(41));
        let fun = Expr::fun(
            None,
            &["x"],
            Block::new(
                vec![Expr::ret(
                    Expr::binop("+", Expr::var("x", 1), Expr::int(1, 1), 1),
                    1,
                )],
                1,
            ),
            1,
        );
        let output = run_ok(vec![
            Expr::declare("f", fun, 1),
            Expr::call_var(
                "print",
                vec![Expr::call_var("f", vec![Expr::int(41, 2)], 2)],
                2,
            ),
        ]);
        assert_eq!(output, "42\n");
    }

    #[test]
    fn test_redeclaration_fails_at_second_line() {
        let err = run_err(vec![
            Expr::declare("x", Expr::int(1, 1), 1),
            Expr::declare("x", Expr::int(2, 2), 2),
        ]);
        assert_eq!(err.kind(), "RedeclarationError");
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_assignment_without_declaration_never_fails() {
        let output = run_ok(vec![
            Expr::declare("x", Expr::int(1, 1), 1),
            Expr::assign("x", Expr::int(2, 2), 2),
            Expr::assign("x", Expr::int(3, 3), 3),
            Expr::call_var("print", vec![Expr::var("x", 4)], 4),
        ]);
        assert_eq!(output, "3\n");
    }

    #[test]
    fn test_if_zero_takes_only_the_false_branch() {
        let output = run_ok(vec![Expr::if_else(
            Expr::int(0, 1),
            Block::new(vec![Expr::call_var("print", vec![Expr::string("a", 2)], 2)], 1),
            Block::new(vec![Expr::call_var("print", vec![Expr::string("b", 3)], 3)], 1),
            1,
        )]);
        assert_eq!(output, "b\n");
    }

    #[test]
    fn test_if_truthy_values_take_only_the_true_branch() {
        for condition in [
            Expr::int(1, 1),
            Expr::int(-7, 1),
            Expr::string("", 1),
            Expr::var("no_such_name", 1), // undefined is truthy
        ] {
            let output = run_ok(vec![Expr::if_else(
                condition,
                Block::new(vec![Expr::call_var("print", vec![Expr::string("a", 2)], 2)], 1),
                Block::new(vec![Expr::call_var("print", vec![Expr::string("b", 3)], 3)], 1),
                1,
            )]);
            assert_eq!(output, "a\n");
        }
    }

    #[test]
    fn test_object_literal_and_field_assignment() {
        // var o = new { a: 1 }; o.b = 2; print(o.a, o.b);
        let output = run_ok(vec![
            Expr::declare("o", Expr::new_object(vec![("a", Expr::int(1, 1))], 1), 1),
            Expr::set_field(Expr::var("o", 2), "b", Expr::int(2, 2), 2),
            Expr::call_var(
                "print",
                vec![
                    Expr::field(Expr::var("o", 3), "a", 3),
                    Expr::field(Expr::var("o", 3), "b", 3),
                ],
                3,
            ),
        ]);
        assert_eq!(output, "1 2\n");
    }

    #[test]
    fn test_absent_field_reads_as_undefined() {
        let output = run_ok(vec![
            Expr::declare("o", Expr::new_object(vec![], 1), 1),
            Expr::call_var("print", vec![Expr::field(Expr::var("o", 2), "missing", 2)], 2),
        ]);
        assert_eq!(output, "undefined\n");
    }

    #[test]
    fn test_calling_a_non_function_is_a_type_error() {
        let err = run_err(vec![
            Expr::declare("x", Expr::int(1, 1), 1),
            Expr::call_var("x", vec![], 2),
        ]);
        assert_eq!(err.kind(), "TypeError");
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_arity_mismatch() {
        let fun = Expr::fun(
            None,
            &["a", "b"],
            Block::new(vec![Expr::ret(Expr::var("a", 1), 1)], 1),
            1,
        );
        let err = run_err(vec![
            Expr::declare("f", fun, 1),
            Expr::call_var("f", vec![Expr::int(1, 2)], 2),
        ]);
        assert_eq!(err.kind(), "ArityError");
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn test_method_call_binds_this() {
        // var o = new { v: 41, m: function() { return this.v + 1; } };
        // print(o.m());
        let method = Expr::fun(
            None,
            &[],
            Block::new(
                vec![Expr::ret(
                    Expr::binop(
                        "+",
                        Expr::field(Expr::var("this", 1), "v", 1),
                        Expr::int(1, 1),
                        1,
                    ),
                    1,
                )],
                1,
            ),
            1,
        );
        let output = run_ok(vec![
            Expr::declare(
                "o",
                Expr::new_object(vec![("v", Expr::int(41, 1)), ("m", method)], 1),
                1,
            ),
            Expr::call_var(
                "print",
                vec![Expr::method(Expr::var("o", 2), "m", vec![], 2)],
                2,
            ),
        ]);
        assert_eq!(output, "42\n");
    }

    #[test]
    fn test_plain_call_gets_undefined_this() {
        let fun = Expr::fun(
            None,
            &[],
            Block::new(vec![Expr::ret(Expr::var("this", 1), 1)], 1),
            1,
        );
        let output = run_ok(vec![
            Expr::declare("f", fun, 1),
            Expr::call_var("print", vec![Expr::call_var("f", vec![], 2)], 2),
        ]);
        assert_eq!(output, "undefined\n");
    }

    #[test]
    fn test_lexical_scoping_resolves_against_defining_env() {
        // var x = 1;
        // var f = function() { return x; };
        // var g = function(x) { return f(); };
        // print(g(99));   -- f sees the global x, not g's parameter
        let f = Expr::fun(None, &[], Block::new(vec![Expr::ret(Expr::var("x", 2), 2)], 2), 2);
        let g = Expr::fun(
            None,
            &["x"],
            Block::new(vec![Expr::ret(Expr::call_var("f", vec![], 3), 3)], 3),
            3,
        );
        let output = run_ok(vec![
            Expr::declare("x", Expr::int(1, 1), 1),
            Expr::declare("f", f, 2),
            Expr::declare("g", g, 3),
            Expr::call_var(
                "print",
                vec![Expr::call_var("g", vec![Expr::int(99, 4)], 4)],
                4,
            ),
        ]);
        assert_eq!(output, "1\n");
    }

    #[test]
    fn test_shadowing_declaration_is_rejected_by_the_chain_rule() {
        // The declaration check walks the chain, so re-declaring a name
        // visible from an enclosing scope fails too.
        let f = Expr::fun(
            None,
            &[],
            Block::new(
                vec![
                    Expr::declare("x", Expr::int(99, 3), 3),
                    Expr::ret(Expr::int(0, 3), 3),
                ],
                3,
            ),
            3,
        );
        let err = run_err(vec![
            Expr::declare("x", Expr::int(1, 1), 1),
            Expr::declare("f", f, 2),
            Expr::call_var("f", vec![], 4),
        ]);
        assert_eq!(err.kind(), "RedeclarationError");
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_named_function_literal_supports_self_recursion() {
        // function fact(n) {
        //   if (n) { return n * fact(n - 1); } else { return 1; }
        // }
        // The statement form self-registers "fact"; a `var fact = ...`
        // spelling would trip the redeclaration check because the
        // literal registers its own name before the declaration runs.
        let body = Block::new(
            vec![
                Expr::if_else(
                    Expr::var("n", 2),
                    Block::new(
                        vec![Expr::ret(
                            Expr::binop(
                                "*",
                                Expr::var("n", 2),
                                Expr::call_var(
                                    "fact",
                                    vec![Expr::binop("-", Expr::var("n", 2), Expr::int(1, 2), 2)],
                                    2,
                                ),
                                2,
                            ),
                            2,
                        )],
                        2,
                    ),
                    Block::new(vec![Expr::ret(Expr::int(1, 3), 3)], 3),
                    2,
                ),
            ],
            1,
        );
        let output = run_ok(vec![
            Expr::fun(Some("fact"), &["n"], body, 1),
            Expr::call_var("print", vec![Expr::call_var("fact", vec![Expr::int(5, 4)], 4)], 4),
        ]);
        assert_eq!(output, "120\n");
    }

    #[test]
    fn test_return_propagates_out_of_nested_blocks_only_to_the_frame() {
        // function() { if (1) { return 7; } else {}; return 8; }
        let body = Block::new(
            vec![
                Expr::if_else(
                    Expr::int(1, 1),
                    Block::new(vec![Expr::ret(Expr::int(7, 2), 2)], 2),
                    Block::empty(2),
                    1,
                ),
                Expr::ret(Expr::int(8, 3), 3),
            ],
            1,
        );
        let output = run_ok(vec![
            Expr::declare("f", Expr::fun(None, &[], body, 1), 1),
            Expr::call_var("print", vec![Expr::call_var("f", vec![], 4)], 4),
        ]);
        assert_eq!(output, "7\n");
    }

    #[test]
    fn test_function_without_return_yields_undefined() {
        let body = Block::new(vec![Expr::int(5, 1)], 1);
        let output = run_ok(vec![
            Expr::declare("f", Expr::fun(None, &[], body, 1), 1),
            Expr::call_var("print", vec![Expr::call_var("f", vec![], 2)], 2),
        ]);
        assert_eq!(output, "undefined\n");
    }

    #[test]
    fn test_top_level_return_is_a_failure() {
        let err = run_err(vec![Expr::ret(Expr::int(1, 1), 1)]);
        assert_eq!(err.kind(), "TypeError");
        assert_eq!(err.line(), 1);
    }

    #[test]
    fn test_assignment_writes_into_the_current_scope() {
        // var x = 1;
        // var f = function() { x = 2; return 0; };
        // f();
        // print(x);   -- the callee's write lands in its own frame, so 1
        let f = Expr::fun(
            None,
            &[],
            Block::new(
                vec![
                    Expr::assign("x", Expr::int(2, 2), 2),
                    Expr::ret(Expr::int(0, 2), 2),
                ],
                2,
            ),
            2,
        );
        let output = run_ok(vec![
            Expr::declare("x", Expr::int(1, 1), 1),
            Expr::declare("f", f, 2),
            Expr::call_var("f", vec![], 3),
            Expr::call_var("print", vec![Expr::var("x", 4)], 4),
        ]);
        assert_eq!(output, "1\n");
    }

    #[test]
    fn test_division_by_zero_surfaces_the_call_line() {
        let err = run_err(vec![Expr::binop("/", Expr::int(1, 3), Expr::int(0, 3), 3)]);
        assert_eq!(err.kind(), "ArithmeticError");
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn test_block_result_is_undefined_not_its_last_value() {
        // print(f()) where f body has trailing literal but no return
        let body = Block::new(vec![Expr::int(42, 1)], 1);
        let output = run_ok(vec![
            Expr::declare("f", Expr::fun(None, &[], body, 1), 1),
            Expr::call_var("print", vec![Expr::call_var("f", vec![], 2)], 2),
        ]);
        assert_eq!(output, "undefined\n");
    }

    #[test]
    fn test_unordered_comparison_is_a_type_error() {
        let err = run_err(vec![Expr::binop(
            "<",
            Expr::int(1, 1),
            Expr::string("a", 1),
            1,
        )]);
        assert_eq!(err.kind(), "TypeError");
        assert_eq!(err.line(), 1);
    }
}
