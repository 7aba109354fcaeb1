//! Bytecode compiler: one function body to straight-line register code.
//!
//! Slot-resolved names become direct register reads and writes; every
//! other dynamic operation compiles to an unresolved call site linked on
//! first execution. Nested function literals are only registered in the
//! unit's dictionary; the loader compiles their bodies.
//!
//! The top-level script compiles through [`compile_script`], which skips
//! slot resolution entirely: top-level bindings live in the global
//! environment so that functions defined by the script can look them up
//! through the environment chain, exactly as the tree-walking tier sees
//! them.

use crate::bytecode::{CodeObject, FunctionBuilder, Instruction, Register, SiteKind};
use crate::dictionary::FunDictionary;
use crate::resolver::{resolve_slots, SlotTable};
use jasper_ast::{Block, Expr, Lit};
use jasper_core::JasperResult;
use std::rc::Rc;

/// Compile a function body over its resolved slots.
pub fn compile_function(name: &str, params: &[String], body: &Block) -> JasperResult<CodeObject> {
    let slots = resolve_slots(params, body)?;
    compile_unit(name, params.len(), slots, body)
}

/// Compile the top-level script block as a zero-parameter unit whose
/// name accesses are all dynamic sites against the global environment.
pub fn compile_script(body: &Block) -> JasperResult<CodeObject> {
    compile_unit("<script>", 0, SlotTable::empty(), body)
}

fn compile_unit(
    name: &str,
    param_count: usize,
    slots: SlotTable,
    body: &Block,
) -> JasperResult<CodeObject> {
    let mut compiler = Compiler {
        builder: FunctionBuilder::new(name, param_count, slots.len()),
        slots,
        dictionary: FunDictionary::new(),
    };
    compiler.compile_block(body)?;

    // Implicit fall-off return: the body yields `undefined`. The runtime
    // relies on this being the unit's final instruction to tell an
    // explicit `return` apart from running off the end.
    let result = compiler.load_undefined();
    compiler.builder.emit(Instruction::Return { src: result });
    Ok(compiler.builder.finish(compiler.dictionary))
}

struct Compiler {
    builder: FunctionBuilder,
    slots: SlotTable,
    dictionary: FunDictionary,
}

impl Compiler {
    /// Compile each contained expression for effect; no value survives
    /// the block boundary.
    fn compile_block(&mut self, block: &Block) -> JasperResult<()> {
        for instr in &block.instrs {
            let reg = self.compile_expr(instr)?;
            self.builder.free_register(reg);
        }
        Ok(())
    }

    /// Compile one expression; the returned register holds its value.
    fn compile_expr(&mut self, expr: &Expr) -> JasperResult<Register> {
        self.builder.set_line(expr.line());
        match expr {
            Expr::Block(block) => {
                self.compile_block(block)?;
                Ok(self.load_undefined())
            }
            Expr::Literal { value, .. } => {
                let index = match value {
                    Lit::Int(i) => self.builder.add_int(*i),
                    Lit::Str(s) => self.builder.add_str(s),
                };
                let dst = self.builder.alloc_register();
                self.builder.emit(Instruction::LoadConst { dst, index });
                Ok(dst)
            }
            Expr::LocalVarAccess { name, line } => {
                if let Some(slot) = self.slots.get(name) {
                    return Ok(slot);
                }
                let site = self.builder.add_site(
                    SiteKind::Lookup {
                        name: Rc::from(name.as_str()),
                    },
                    *line,
                );
                let dst = self.builder.alloc_register();
                self.builder.emit(Instruction::LookupVar { dst, site });
                Ok(dst)
            }
            Expr::LocalVarAssignment {
                name,
                expr,
                declaration,
                line,
            } => {
                let src = self.compile_expr(expr)?;
                self.builder.set_line(*line);
                if let Some(slot) = self.slots.get(name) {
                    // Redeclaration was already rejected by the resolver.
                    self.builder.emit_move(slot, src);
                } else {
                    let site = self.builder.add_site(
                        SiteKind::Store {
                            name: Rc::from(name.as_str()),
                            declaration: *declaration,
                        },
                        *line,
                    );
                    self.builder.emit(Instruction::StoreVar { src, site });
                }
                // An assignment yields the assigned value.
                Ok(src)
            }
            Expr::FunCall {
                qualifier,
                args,
                line,
            } => {
                let callee = self.compile_expr(qualifier)?;
                let callee = self.capture(callee);
                let (base, argc) = self.compile_arg_window(args)?;
                self.builder.set_line(*line);
                let site = self.builder.add_site(SiteKind::Call, *line);
                let dst = self.builder.alloc_register();
                self.builder.emit(Instruction::CallFun {
                    dst,
                    callee,
                    base,
                    argc,
                    site,
                });
                self.builder.free_register(callee);
                self.builder.free_register_block(base, argc);
                Ok(dst)
            }
            Expr::Fun { fun, line } => {
                let id = self.dictionary.register(fun);
                let dst = self.builder.alloc_register();
                self.builder.emit(Instruction::LoadFun { dst, fun: id });
                if let Some(name) = &fun.name {
                    // Named literals register themselves, unconditionally,
                    // so self-recursion resolves.
                    let site = self.builder.add_site(
                        SiteKind::Register {
                            name: Rc::from(name.as_str()),
                        },
                        *line,
                    );
                    self.builder.emit(Instruction::RegisterVar { src: dst, site });
                }
                Ok(dst)
            }
            Expr::Return { expr, line } => {
                let src = self.compile_expr(expr)?;
                self.builder.set_line(*line);
                self.builder.emit(Instruction::Return { src });
                self.builder.free_register(src);
                Ok(self.load_undefined())
            }
            Expr::If {
                condition,
                true_block,
                false_block,
                line,
            } => {
                let cond = self.compile_expr(condition)?;
                self.builder.set_line(*line);
                let site = self.builder.add_site(SiteKind::Truth, *line);
                let test = self.builder.alloc_register();
                self.builder.emit(Instruction::Truth {
                    dst: test,
                    src: cond,
                    site,
                });
                self.builder.free_register(cond);

                let else_label = self.builder.create_label();
                let end_label = self.builder.create_label();
                self.builder.emit_jump_if_false(test, else_label);
                self.builder.free_register(test);
                self.compile_block(true_block)?;
                self.builder.emit_jump(end_label);
                self.builder.bind_label(else_label);
                self.compile_block(false_block)?;
                self.builder.bind_label(end_label);
                Ok(self.load_undefined())
            }
            Expr::New { init, line } => {
                let count = init.len() as u16;
                let base = self.builder.alloc_register_block(count);
                for (i, (_, value)) in init.iter().enumerate() {
                    let value_reg = self.compile_expr(value)?;
                    self.builder.emit_move(Register::new(base.0 + i as u16), value_reg);
                    self.builder.free_register(value_reg);
                }
                let keys: Rc<[Rc<str>]> =
                    init.iter().map(|(key, _)| Rc::from(key.as_str())).collect();
                self.builder.set_line(*line);
                let dst = self.builder.alloc_register();
                self.builder.emit(Instruction::NewObject { dst, base, keys });
                self.builder.free_register_block(base, count);
                Ok(dst)
            }
            Expr::FieldAccess {
                receiver,
                name,
                line,
            } => {
                let obj = self.compile_expr(receiver)?;
                self.builder.set_line(*line);
                let site = self.builder.add_site(
                    SiteKind::GetField {
                        name: Rc::from(name.as_str()),
                    },
                    *line,
                );
                let dst = self.builder.alloc_register();
                self.builder.emit(Instruction::GetField { dst, obj, site });
                self.builder.free_register(obj);
                Ok(dst)
            }
            Expr::FieldAssignment {
                receiver,
                name,
                expr,
                line,
            } => {
                let obj = self.compile_expr(receiver)?;
                let obj = self.capture(obj);
                let src = self.compile_expr(expr)?;
                self.builder.set_line(*line);
                let site = self.builder.add_site(
                    SiteKind::SetField {
                        name: Rc::from(name.as_str()),
                    },
                    *line,
                );
                self.builder.emit(Instruction::SetField { obj, src, site });
                self.builder.free_register(obj);
                // A field assignment yields the assigned value.
                Ok(src)
            }
            Expr::MethodCall {
                receiver,
                name,
                args,
                line,
            } => {
                let recv = self.compile_expr(receiver)?;
                let recv = self.capture(recv);
                let (base, argc) = self.compile_arg_window(args)?;
                self.builder.set_line(*line);
                let site = self.builder.add_site(
                    SiteKind::MethodCall {
                        name: Rc::from(name.as_str()),
                    },
                    *line,
                );
                let dst = self.builder.alloc_register();
                self.builder.emit(Instruction::CallMethod {
                    dst,
                    recv,
                    base,
                    argc,
                    site,
                });
                self.builder.free_register(recv);
                self.builder.free_register_block(base, argc);
                Ok(dst)
            }
        }
    }

    /// Compile arguments into a fresh contiguous register window.
    fn compile_arg_window(&mut self, args: &[Expr]) -> JasperResult<(Register, u16)> {
        let argc = args.len() as u16;
        let base = self.builder.alloc_register_block(argc);
        for (i, arg) in args.iter().enumerate() {
            let reg = self.compile_expr(arg)?;
            self.builder.emit_move(Register::new(base.0 + i as u16), reg);
            self.builder.free_register(reg);
        }
        Ok((base, argc))
    }

    /// Copy a slot register into a fresh temporary. A callee or receiver
    /// living in a slot must be captured before the remaining operands of
    /// the expression are compiled: an operand may assign that very slot,
    /// and the captured value has to survive it.
    fn capture(&mut self, reg: Register) -> Register {
        if reg.index() >= self.slots.len() {
            return reg;
        }
        let dst = self.builder.alloc_register();
        self.builder.emit_move(dst, reg);
        dst
    }

    fn load_undefined(&mut self) -> Register {
        let dst = self.builder.alloc_register();
        self.builder.emit(Instruction::LoadUndefined { dst });
        dst
    }
}
