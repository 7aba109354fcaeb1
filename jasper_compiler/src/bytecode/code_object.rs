//! Compiled function representation.

use super::instruction::{Instruction, SiteDesc};
use crate::dictionary::FunDictionary;
use jasper_core::Value;
use std::fmt;
use std::rc::Rc;

/// One entry of the pc-to-source-line table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineTableEntry {
    /// First pc covered by this entry.
    pub start_pc: u32,
    /// One past the last covered pc.
    pub end_pc: u32,
    /// The source line.
    pub line: u32,
}

/// A compiled function body plus everything its execution needs: the
/// constant pool, the call-site table and the dictionary of nested
/// function literals the loader materializes.
#[derive(Debug)]
pub struct CodeObject {
    /// Function name, for diagnostics and disassembly.
    pub name: Rc<str>,
    /// Declared parameter count (excluding the implicit `this`).
    pub param_count: usize,
    /// Resolved local slots (`this` + parameters + declared locals).
    pub slot_count: usize,
    /// Total frame size in registers (slots + temporaries).
    pub register_count: usize,
    /// The instruction stream.
    pub instructions: Box<[Instruction]>,
    /// The constant pool.
    pub constants: Box<[Value]>,
    /// Static descriptors of the dynamic call sites.
    pub sites: Box<[SiteDesc]>,
    /// pc-to-line mapping for failure attribution.
    pub line_table: Box<[LineTableEntry]>,
    /// Nested function literals registered during compilation.
    pub dictionary: FunDictionary,
}

impl CodeObject {
    /// Source line for the instruction at `pc`, or 0 when unmapped.
    #[must_use]
    pub fn line_for_pc(&self, pc: u32) -> u32 {
        self.line_table
            .iter()
            .find(|entry| entry.start_pc <= pc && pc < entry.end_pc)
            .map_or(0, |entry| entry.line)
    }
}

impl fmt::Display for CodeObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "fun {} (params {}, slots {}, regs {})",
            self.name, self.param_count, self.slot_count, self.register_count
        )?;
        for (pc, inst) in self.instructions.iter().enumerate() {
            writeln!(f, "  {pc:4}: {inst}")?;
        }
        for (id, site) in self.sites.iter().enumerate() {
            writeln!(f, "  @{id}: {} (line {})", site.kind, site.line)?;
        }
        Ok(())
    }
}
