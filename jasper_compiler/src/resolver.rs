//! Static slot resolver.
//!
//! One pre-pass over a function body assigns a frame slot to `this`, to
//! each parameter and to every declared local, walking `Block` and `If`
//! structurally. Nested function literals are not entered; each gets its
//! own independent pass when compiled.
//!
//! The pass applies the declaration rule to its own bookkeeping, so a
//! duplicate declaration surfaces as a redeclaration failure at compile
//! time, carrying the second declaration's line.

use crate::bytecode::Register;
use jasper_ast::{Block, Expr};
use jasper_core::{JasperError, JasperResult};
use rustc_hash::FxHashMap;
use std::rc::Rc;

/// The resolved name-to-slot mapping of one function frame.
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: FxHashMap<Rc<str>, Register>,
    count: usize,
}

impl SlotTable {
    /// An empty table: every name access compiles to a dynamic site.
    /// Used for the top-level script unit, whose bindings live in the
    /// global environment rather than in frame slots.
    #[must_use]
    pub fn empty() -> Self {
        // Slot 0 stays reserved for `this` even without named slots.
        Self {
            slots: FxHashMap::default(),
            count: 1,
        }
    }

    /// The register assigned to `name`, if the resolver slotted it.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Register> {
        self.slots.get(name).copied()
    }

    /// Total slot count, including the implicit `this`.
    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    /// True only for a table without even the `this` slot; never the
    /// case for resolved tables.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn assign(&mut self, name: &str) -> Register {
        let reg = Register::new(self.count as u16);
        self.slots.insert(Rc::from(name), reg);
        self.count += 1;
        reg
    }
}

/// Resolve the frame slots of one function body.
///
/// `this` takes slot 0, parameters the next slots in declaration order,
/// then the body scan assigns one slot per declaration.
pub fn resolve_slots(params: &[String], body: &Block) -> JasperResult<SlotTable> {
    let mut table = SlotTable {
        slots: FxHashMap::default(),
        count: 0,
    };
    table.assign("this");
    for param in params {
        table.assign(param);
    }
    scan_block(body, &mut table)?;
    Ok(table)
}

fn scan_block(block: &Block, table: &mut SlotTable) -> JasperResult<()> {
    for instr in &block.instrs {
        scan_expr(instr, table)?;
    }
    Ok(())
}

fn scan_expr(expr: &Expr, table: &mut SlotTable) -> JasperResult<()> {
    match expr {
        Expr::Block(block) => scan_block(block, table),
        Expr::LocalVarAssignment {
            name,
            declaration: true,
            line,
            ..
        } => {
            if table.get(name).is_some() {
                return Err(JasperError::redeclaration(name, *line));
            }
            table.assign(name);
            Ok(())
        }
        Expr::If {
            true_block,
            false_block,
            ..
        } => {
            scan_block(true_block, table)?;
            scan_block(false_block, table)
        }
        // Everything else neither declares nor opens a scope; nested
        // `Fun` literals are resolved by their own pass.
        _ => Ok(()),
    }
}
