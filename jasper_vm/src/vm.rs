//! Bytecode dispatch loop.
//!
//! Execution is a match over the instruction enum with an explicit `pc`.
//! A frame is a flat register vector sized by the code object; `this`
//! and the parameters occupy the low registers, temporaries the rest.
//! `Return` leaves the loop with its value and the returning `pc`, which
//! lets the loader tell an explicit `return` apart from the implicit
//! fall-off return the compiler appends.

use crate::ic::{CallSite, IcMode};
use jasper_compiler::{CodeObject, Instruction, Register};
use jasper_core::{DynObject, JasperResult, ObjRef, Value};
use smallvec::SmallVec;
use std::rc::Rc;

/// A compiled unit ready to execute: the code object, its call sites
/// and the function objects materialized from its dictionary.
pub struct LoadedCode {
    /// The compiled function body.
    pub code: Rc<CodeObject>,
    /// One linked call site per compile-time site descriptor.
    pub sites: Box<[CallSite]>,
    /// Materialized function objects, indexed by `FunId`.
    pub funs: Box<[ObjRef]>,
}

/// How one frame finished.
pub(crate) struct RunExit {
    /// The produced value.
    pub value: Value,
    /// The `pc` of the `Return` instruction that produced it.
    pub pc: usize,
}

type ArgBuffer = SmallVec<[Value; 4]>;

fn window(regs: &[Value], base: Register, argc: u16) -> ArgBuffer {
    regs[base.index()..base.index() + argc as usize]
        .iter()
        .cloned()
        .collect()
}

/// Execute one frame over `regs` until it returns.
pub(crate) fn run(
    loaded: &LoadedCode,
    regs: &mut [Value],
    global: &ObjRef,
    mode: IcMode,
) -> JasperResult<RunExit> {
    let code = &loaded.code;
    let mut pc = 0usize;
    loop {
        let Some(inst) = code.instructions.get(pc) else {
            // The compiler always appends a return; running off the end
            // still yields undefined.
            return Ok(RunExit {
                value: Value::Undefined,
                pc,
            });
        };
        match inst {
            Instruction::LoadConst { dst, index } => {
                regs[dst.index()] = code.constants[index.index()].clone();
            }
            Instruction::LoadUndefined { dst } => {
                regs[dst.index()] = Value::Undefined;
            }
            Instruction::Move { dst, src } => {
                regs[dst.index()] = regs[src.index()].clone();
            }
            Instruction::Jump { target } => {
                pc = *target as usize;
                continue;
            }
            Instruction::JumpIfFalse { cond, target } => {
                if !regs[cond.index()].is_truthy() {
                    pc = *target as usize;
                    continue;
                }
            }
            Instruction::Return { src } => {
                return Ok(RunExit {
                    value: regs[src.index()].clone(),
                    pc,
                });
            }
            Instruction::LoadFun { dst, fun } => {
                regs[dst.index()] = Value::Object(loaded.funs[fun.index()].clone());
            }
            Instruction::LookupVar { dst, site } => {
                regs[dst.index()] = loaded.sites[site.index()].lookup(global, mode);
            }
            Instruction::StoreVar { src, site } => {
                loaded.sites[site.index()].store(global, regs[src.index()].clone())?;
            }
            Instruction::RegisterVar { src, site } => {
                loaded.sites[site.index()].register(global, regs[src.index()].clone());
            }
            Instruction::CallFun {
                dst,
                callee,
                base,
                argc,
                site,
            } => {
                let args = window(regs, *base, *argc);
                let callee_value = regs[callee.index()].clone();
                regs[dst.index()] = loaded.sites[site.index()].call(
                    &callee_value,
                    Value::Undefined,
                    &args,
                    mode,
                )?;
            }
            Instruction::Truth { dst, src, site } => {
                let truthy = loaded.sites[site.index()].truth(&regs[src.index()], mode);
                regs[dst.index()] = Value::Int(i64::from(truthy));
            }
            Instruction::NewObject { dst, base, keys } => {
                let object = DynObject::new_object();
                for (i, key) in keys.iter().enumerate() {
                    object.set_field(key.clone(), regs[base.index() + i].clone());
                }
                regs[dst.index()] = Value::Object(object);
            }
            Instruction::GetField { dst, obj, site } => {
                let receiver = regs[obj.index()].clone();
                regs[dst.index()] = loaded.sites[site.index()].get_field(&receiver, mode)?;
            }
            Instruction::SetField { obj, src, site } => {
                let receiver = regs[obj.index()].clone();
                loaded.sites[site.index()].set_field(
                    &receiver,
                    regs[src.index()].clone(),
                    mode,
                )?;
            }
            Instruction::CallMethod {
                dst,
                recv,
                base,
                argc,
                site,
            } => {
                let args = window(regs, *base, *argc);
                let receiver = regs[recv.index()].clone();
                regs[dst.index()] =
                    loaded.sites[site.index()].call_method(&receiver, &args, mode)?;
            }
        }
        pc += 1;
    }
}
