//! Function builder for bytecode emission.
//!
//! The `FunctionBuilder` provides a high-level API for constructing
//! bytecode with automatic temporary-register allocation, label
//! resolution and call-site registration. Local slots occupy the low
//! registers and are never handed out as temporaries.

use super::code_object::{CodeObject, LineTableEntry};
use super::instruction::{ConstIndex, Instruction, Register, SiteDesc, SiteId, SiteKind};
use crate::dictionary::FunDictionary;
use jasper_core::Value;
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// A label for jump targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(u32);

/// A jump instruction whose target label is patched at finish.
#[derive(Debug)]
struct ForwardRef {
    /// Instruction index containing the jump.
    instruction_index: usize,
    /// The label being jumped to.
    label: Label,
}

/// Key type for constant deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstKey {
    Int(i64),
    Str(Rc<str>),
}

/// Builder for constructing code objects.
pub struct FunctionBuilder {
    /// Function name.
    name: Rc<str>,
    /// Declared parameter count.
    param_count: usize,
    /// Resolved slot count; temporaries are allocated above it.
    slot_count: usize,

    /// Emitted instructions.
    instructions: Vec<Instruction>,

    /// Constant pool.
    constants: Vec<Value>,
    /// Constant deduplication map.
    constant_map: FxHashMap<ConstKey, ConstIndex>,

    /// Dynamic call-site descriptors.
    sites: Vec<SiteDesc>,

    /// Next temporary register to allocate.
    next_register: u16,
    /// Maximum registers used (high water mark).
    max_registers: u16,
    /// Temporary free list for reuse.
    free_registers: Vec<Register>,

    /// Label counter.
    next_label: u32,
    /// Label to instruction index map.
    labels: FxHashMap<Label, usize>,
    /// Forward references that need patching.
    forward_refs: Vec<ForwardRef>,

    /// Current line number (for the line table).
    current_line: u32,
    /// Start pc for the current line.
    line_start_pc: u32,
    /// Line table entries.
    line_table: Vec<LineTableEntry>,
}

impl FunctionBuilder {
    /// Create a builder for a function with the given resolved slot count.
    ///
    /// Registers `0 .. slot_count` are reserved for `this`, the parameters
    /// and the declared locals; temporaries start above them.
    pub fn new(name: impl Into<Rc<str>>, param_count: usize, slot_count: usize) -> Self {
        let slot_count_u16 = u16::try_from(slot_count).expect("slot overflow");
        Self {
            name: name.into(),
            param_count,
            slot_count,
            instructions: Vec::new(),
            constants: Vec::new(),
            constant_map: FxHashMap::default(),
            sites: Vec::new(),
            next_register: slot_count_u16,
            max_registers: slot_count_u16,
            free_registers: Vec::new(),
            next_label: 0,
            labels: FxHashMap::default(),
            forward_refs: Vec::new(),
            current_line: 0,
            line_start_pc: 0,
            line_table: Vec::new(),
        }
    }

    // =========================================================================
    // Register Management
    // =========================================================================

    /// Allocate a temporary register.
    #[inline]
    pub fn alloc_register(&mut self) -> Register {
        if let Some(reg) = self.free_registers.pop() {
            return reg;
        }
        let reg = Register(self.next_register);
        self.next_register = self
            .next_register
            .checked_add(1)
            .expect("register overflow");
        self.max_registers = self.max_registers.max(self.next_register);
        reg
    }

    /// Free a register for reuse. Slot registers are silently kept: a
    /// local stays live for the whole frame.
    #[inline]
    pub fn free_register(&mut self, reg: Register) {
        if reg.index() >= self.slot_count {
            self.free_registers.push(reg);
        }
    }

    /// Allocate a contiguous block of registers for a call argument
    /// window. Always taken from fresh registers, never from the free
    /// list, so the run is guaranteed contiguous.
    #[inline]
    pub fn alloc_register_block(&mut self, count: u16) -> Register {
        let base = Register(self.next_register);
        self.next_register = self
            .next_register
            .checked_add(count)
            .expect("register overflow");
        self.max_registers = self.max_registers.max(self.next_register);
        base
    }

    /// Free a contiguous block of registers after the call.
    #[inline]
    pub fn free_register_block(&mut self, base: Register, count: u16) {
        for i in 0..count {
            self.free_registers.push(Register(base.0 + i));
        }
    }

    // =========================================================================
    // Constant Pool & Call Sites
    // =========================================================================

    /// Add an integer constant, deduplicated.
    pub fn add_int(&mut self, value: i64) -> ConstIndex {
        self.add_const(ConstKey::Int(value), || Value::Int(value))
    }

    /// Add a string constant, deduplicated.
    pub fn add_str(&mut self, value: &str) -> ConstIndex {
        let shared: Rc<str> = Rc::from(value);
        let key = ConstKey::Str(shared.clone());
        self.add_const(key, || Value::Str(shared))
    }

    fn add_const(&mut self, key: ConstKey, make: impl FnOnce() -> Value) -> ConstIndex {
        if let Some(&idx) = self.constant_map.get(&key) {
            return idx;
        }
        let idx = ConstIndex::new(self.constants.len() as u32);
        self.constants.push(make());
        self.constant_map.insert(key, idx);
        idx
    }

    /// Register a dynamic call site and return its id. Sites are never
    /// deduplicated: each carries its own cache at run time.
    pub fn add_site(&mut self, kind: SiteKind, line: u32) -> SiteId {
        let id = SiteId::new(self.sites.len() as u32);
        self.sites.push(SiteDesc { kind, line });
        id
    }

    // =========================================================================
    // Labels & Lines
    // =========================================================================

    /// Create a new label for a jump target.
    pub fn create_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    /// Mark the current position as the target for a label.
    pub fn bind_label(&mut self, label: Label) {
        let pc = self.instructions.len();
        self.labels.insert(label, pc);
    }

    /// Set the source line for subsequently emitted instructions.
    pub fn set_line(&mut self, line: u32) {
        if line != self.current_line {
            self.flush_line_entry();
            self.current_line = line;
        }
    }

    fn flush_line_entry(&mut self) {
        let current_pc = self.instructions.len() as u32;
        if current_pc > self.line_start_pc && self.current_line != 0 {
            self.line_table.push(LineTableEntry {
                start_pc: self.line_start_pc,
                end_pc: current_pc,
                line: self.current_line,
            });
        }
        self.line_start_pc = current_pc;
    }

    // =========================================================================
    // Instruction Emission
    // =========================================================================

    /// Emit a raw instruction.
    #[inline]
    pub fn emit(&mut self, inst: Instruction) {
        self.instructions.push(inst);
    }

    /// Emit a register-to-register move (elided when `dst == src`).
    pub fn emit_move(&mut self, dst: Register, src: Register) {
        if dst != src {
            self.emit(Instruction::Move { dst, src });
        }
    }

    /// Emit an unconditional jump to `label`.
    pub fn emit_jump(&mut self, label: Label) {
        let inst_idx = self.instructions.len();
        self.emit(Instruction::Jump { target: 0 });
        self.forward_refs.push(ForwardRef {
            instruction_index: inst_idx,
            label,
        });
    }

    /// Emit a jump to `label` taken when `cond` is falsy.
    pub fn emit_jump_if_false(&mut self, cond: Register, label: Label) {
        let inst_idx = self.instructions.len();
        self.emit(Instruction::JumpIfFalse { cond, target: 0 });
        self.forward_refs.push(ForwardRef {
            instruction_index: inst_idx,
            label,
        });
    }

    // =========================================================================
    // Finalization
    // =========================================================================

    /// Finish building and return the code object.
    pub fn finish(mut self, dictionary: FunDictionary) -> CodeObject {
        self.flush_line_entry();

        for fwd in &self.forward_refs {
            let target = *self.labels.get(&fwd.label).expect("unbound label") as u32;
            match &mut self.instructions[fwd.instruction_index] {
                Instruction::Jump { target: slot }
                | Instruction::JumpIfFalse { target: slot, .. } => *slot = target,
                other => unreachable!("forward ref to non-jump {other}"),
            }
        }

        CodeObject {
            name: self.name,
            param_count: self.param_count,
            slot_count: self.slot_count,
            register_count: self.max_registers as usize,
            instructions: self.instructions.into_boxed_slice(),
            constants: self.constants.into_boxed_slice(),
            sites: self.sites.into_boxed_slice(),
            line_table: self.line_table.into_boxed_slice(),
            dictionary,
        }
    }
}
