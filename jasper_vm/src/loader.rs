//! Loader: compiled units to invocable function objects.
//!
//! Loading a function slot-resolves and compiles its body, then eagerly
//! materializes every dictionary entry, recursively, into function
//! objects that share the global environment. The script itself runs as
//! a zero-parameter compiled unit through [`execute`].

use crate::ic::{CallSite, IcMode};
use crate::vm::{run, LoadedCode};
use jasper_ast::{Block, Script};
use jasper_compiler::{compile_function, compile_script, CodeObject};
use jasper_core::{
    DynObject, Invoke, InvokerKind, JasperError, JasperResult, ObjRef, Value,
};
use jasper_runtime::{create_global_env, Sink};
use std::rc::Rc;

/// Compile and materialize one function against a global environment,
/// returning the invocable function value.
pub fn load_function(
    name: &str,
    params: &[String],
    body: &Block,
    global: &ObjRef,
    mode: IcMode,
) -> JasperResult<Value> {
    let code = Rc::new(compile_function(name, params, body)?);
    let loaded = load_unit(code, global, mode)?;
    Ok(Value::Object(function_object(name, loaded, global, mode)))
}

/// Run a script against a fresh global environment writing to `sink`,
/// with inline caches enabled.
pub fn execute(script: &Script, sink: Sink) -> JasperResult<()> {
    execute_with_mode(script, sink, IcMode::Enabled)
}

/// Run a script against a fresh global environment with an explicit
/// cache mode. `IcMode::Disabled` must be observably identical.
pub fn execute_with_mode(script: &Script, sink: Sink, mode: IcMode) -> JasperResult<()> {
    let global = create_global_env(sink);
    execute_in(script, &global, mode)
}

/// Run a script against a pre-built global environment.
pub fn execute_in(script: &Script, global: &ObjRef, mode: IcMode) -> JasperResult<()> {
    let code = Rc::new(compile_script(&script.body)?);
    let loaded = load_unit(code, global, mode)?;
    let mut regs = vec![Value::Undefined; loaded.code.register_count];
    let exit = run(&loaded, &mut regs, global, mode)?;

    // Only the compiler's implicit fall-off return may end the script;
    // an executed `return` has no enclosing function to transfer to.
    if exit.pc + 1 < loaded.code.instructions.len() {
        return Err(JasperError::type_error(
            "return outside function",
            loaded.code.line_for_pc(exit.pc as u32),
        ));
    }
    Ok(())
}

/// Materialize a compiled unit: link its call sites and eagerly load
/// every dictionary entry into a function object.
fn load_unit(code: Rc<CodeObject>, global: &ObjRef, mode: IcMode) -> JasperResult<Rc<LoadedCode>> {
    let sites: Box<[CallSite]> = code.sites.iter().map(CallSite::new).collect();
    let mut funs = Vec::with_capacity(code.dictionary.len());
    for (_, literal) in code.dictionary.iter() {
        let name = literal.display_name();
        let nested = Rc::new(compile_function(name, &literal.params, &literal.body)?);
        let loaded = load_unit(nested, global, mode)?;
        funs.push(function_object(name, loaded, global, mode));
    }
    Ok(Rc::new(LoadedCode {
        code,
        sites,
        funs: funs.into_boxed_slice(),
    }))
}

fn function_object(name: &str, loaded: Rc<LoadedCode>, global: &ObjRef, mode: IcMode) -> ObjRef {
    let slot_count = loaded.code.slot_count;
    let invoker: Rc<dyn Invoke> = Rc::new(CompiledInvoker {
        code: loaded,
        global: global.clone(),
        mode,
    });
    let object = DynObject::new_function(name, invoker);
    object.set_slot_count(slot_count);
    object
}

/// A compiled function body behind the common invocation interface:
/// exact-arity check, fresh register frame, `this` and the parameters
/// in the low registers, then the dispatch loop.
pub struct CompiledInvoker {
    code: Rc<LoadedCode>,
    global: ObjRef,
    mode: IcMode,
}

impl Invoke for CompiledInvoker {
    fn invoke(&self, receiver: Value, args: &[Value]) -> JasperResult<Value> {
        let code = &self.code.code;
        if args.len() != code.param_count {
            return Err(JasperError::arity(code.param_count, args.len(), 0));
        }
        let mut regs = vec![Value::Undefined; code.register_count];
        regs[0] = receiver;
        for (i, arg) in args.iter().enumerate() {
            regs[1 + i] = arg.clone();
        }
        let exit = run(&self.code, &mut regs, &self.global, self.mode)?;
        Ok(exit.value)
    }

    fn kind(&self) -> InvokerKind {
        InvokerKind::User
    }
}
