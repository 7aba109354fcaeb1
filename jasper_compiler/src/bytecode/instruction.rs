//! Register-based bytecode instruction definitions.
//!
//! Instructions are an enum rather than a packed word: the dynamic-site
//! instructions carry a [`SiteId`] into the owning code object's call-site
//! table, and `NewObject` carries its initializer key list directly.
//!
//! # Frame convention
//!
//! Registers `r0..` hold the resolved locals (`this` in `r0`, parameters
//! next, declared locals after), and temporaries are allocated above the
//! local window. Call argument windows are contiguous register runs.

use std::fmt;
use std::rc::Rc;

/// A virtual register index within one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Register(pub u16);

impl Register {
    /// The `this` register (r0).
    pub const THIS: Register = Register(0);

    /// Create a new register with the given index.
    #[inline]
    pub const fn new(index: u16) -> Self {
        Register(index)
    }

    /// Get the register index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

/// A constant pool index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ConstIndex(pub u32);

impl ConstIndex {
    /// Create a new constant index.
    #[inline]
    pub const fn new(index: u32) -> Self {
        ConstIndex(index)
    }

    /// Get the pool index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ConstIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// An index into a code object's call-site table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct SiteId(pub u32);

impl SiteId {
    /// Create a new site id.
    #[inline]
    pub const fn new(index: u32) -> Self {
        SiteId(index)
    }

    /// Get the table index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.0)
    }
}

/// A stable id assigned to a function literal by the function dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct FunId(pub u32);

impl FunId {
    /// Create a new function id.
    #[inline]
    pub const fn new(index: u32) -> Self {
        FunId(index)
    }

    /// Get the dictionary index.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

/// What a dynamic call site does, plus the static name it operates on.
///
/// The site kinds mirror the runtime linker's cache shapes: variable sites
/// guard on the resolved environment, calls on callee identity, field and
/// method sites on receiver shape, truthiness on value kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SiteKind {
    /// Chain lookup of a free name.
    Lookup {
        /// The looked-up name.
        name: Rc<str>,
    },
    /// Assignment to a name without a resolved slot.
    Store {
        /// The assigned name.
        name: Rc<str>,
        /// True when the assignment is a redeclaration-checked `var`.
        declaration: bool,
    },
    /// Unconditional registration of a named function literal.
    Register {
        /// The declared function name.
        name: Rc<str>,
    },
    /// Invocation of an arbitrary callee value.
    Call,
    /// Conversion of a condition value to a branch decision.
    Truth,
    /// Field read on a receiver object.
    GetField {
        /// The field name.
        name: Rc<str>,
    },
    /// Field write on a receiver object.
    SetField {
        /// The field name.
        name: Rc<str>,
    },
    /// Method lookup and invocation on a receiver object.
    MethodCall {
        /// The method name.
        name: Rc<str>,
    },
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lookup { name } => write!(f, "lookup {name}"),
            Self::Store {
                name,
                declaration: true,
            } => write!(f, "declare {name}"),
            Self::Store {
                name,
                declaration: false,
            } => write!(f, "store {name}"),
            Self::Register { name } => write!(f, "register {name}"),
            Self::Call => f.write_str("call"),
            Self::Truth => f.write_str("truth"),
            Self::GetField { name } => write!(f, "get .{name}"),
            Self::SetField { name } => write!(f, "set .{name}"),
            Self::MethodCall { name } => write!(f, "method .{name}"),
        }
    }
}

/// The static description of one dynamic call site.
///
/// The runtime linker pairs each descriptor with its mutable cache state;
/// the compiler only records what the site does and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteDesc {
    /// What the site does.
    pub kind: SiteKind,
    /// Source line of the originating expression, for failure attribution.
    pub line: u32,
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// `dst = constants[index]`.
    LoadConst {
        /// Destination register.
        dst: Register,
        /// Constant pool index.
        index: ConstIndex,
    },
    /// `dst = undefined`.
    LoadUndefined {
        /// Destination register.
        dst: Register,
    },
    /// `dst = src`.
    Move {
        /// Destination register.
        dst: Register,
        /// Source register.
        src: Register,
    },
    /// Unconditional jump to an absolute instruction index.
    Jump {
        /// Absolute target pc.
        target: u32,
    },
    /// Jump to `target` when `cond` holds a falsy value.
    JumpIfFalse {
        /// The tested register.
        cond: Register,
        /// Absolute target pc.
        target: u32,
    },
    /// Return `src` to the caller.
    Return {
        /// The returned register.
        src: Register,
    },
    /// `dst` = the function object materialized from dictionary entry `fun`.
    LoadFun {
        /// Destination register.
        dst: Register,
        /// Dictionary id of the literal.
        fun: FunId,
    },
    /// Dynamic chain lookup through the site's cached environment.
    LookupVar {
        /// Destination register.
        dst: Register,
        /// The lookup site.
        site: SiteId,
    },
    /// Dynamic store of `src` through a variable site.
    StoreVar {
        /// The stored register.
        src: Register,
        /// The store site.
        site: SiteId,
    },
    /// Unconditional registration of `src` under the site's name.
    RegisterVar {
        /// The registered register.
        src: Register,
        /// The register site.
        site: SiteId,
    },
    /// `dst = callee(args)` with `args` in `base .. base+argc`.
    CallFun {
        /// Destination register.
        dst: Register,
        /// Register holding the callee value.
        callee: Register,
        /// First register of the contiguous argument window.
        base: Register,
        /// Argument count.
        argc: u16,
        /// The call site.
        site: SiteId,
    },
    /// `dst = truth(src)` as integer `1`/`0` through a truthiness site.
    Truth {
        /// Destination register.
        dst: Register,
        /// The tested register.
        src: Register,
        /// The truthiness site.
        site: SiteId,
    },
    /// `dst = { keys[0]: base+0, keys[1]: base+1, ... }`.
    NewObject {
        /// Destination register.
        dst: Register,
        /// First register of the contiguous initializer-value window.
        base: Register,
        /// Initializer field names, in declaration order.
        keys: Rc<[Rc<str>]>,
    },
    /// `dst = obj.<site name>`.
    GetField {
        /// Destination register.
        dst: Register,
        /// Register holding the receiver.
        obj: Register,
        /// The field-read site.
        site: SiteId,
    },
    /// `obj.<site name> = src`.
    SetField {
        /// Register holding the receiver.
        obj: Register,
        /// The stored register.
        src: Register,
        /// The field-write site.
        site: SiteId,
    },
    /// `dst = recv.<site name>(args)` with `args` in `base .. base+argc`.
    CallMethod {
        /// Destination register.
        dst: Register,
        /// Register holding the receiver.
        recv: Register,
        /// First register of the contiguous argument window.
        base: Register,
        /// Argument count.
        argc: u16,
        /// The method-call site.
        site: SiteId,
    },
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadConst { dst, index } => write!(f, "load_const   {dst}, {index}"),
            Self::LoadUndefined { dst } => write!(f, "load_undef   {dst}"),
            Self::Move { dst, src } => write!(f, "move         {dst}, {src}"),
            Self::Jump { target } => write!(f, "jump         {target}"),
            Self::JumpIfFalse { cond, target } => write!(f, "jump_false   {cond}, {target}"),
            Self::Return { src } => write!(f, "return       {src}"),
            Self::LoadFun { dst, fun } => write!(f, "load_fun     {dst}, {fun}"),
            Self::LookupVar { dst, site } => write!(f, "lookup_var   {dst}, {site}"),
            Self::StoreVar { src, site } => write!(f, "store_var    {src}, {site}"),
            Self::RegisterVar { src, site } => write!(f, "register_var {src}, {site}"),
            Self::CallFun {
                dst,
                callee,
                base,
                argc,
                site,
            } => write!(f, "call_fun     {dst}, {callee}, {base}+{argc}, {site}"),
            Self::Truth { dst, src, site } => write!(f, "truth        {dst}, {src}, {site}"),
            Self::NewObject { dst, base, keys } => {
                write!(f, "new_object   {dst}, {base}+{}", keys.len())
            }
            Self::GetField { dst, obj, site } => write!(f, "get_field    {dst}, {obj}, {site}"),
            Self::SetField { obj, src, site } => write!(f, "set_field    {obj}, {src}, {site}"),
            Self::CallMethod {
                dst,
                recv,
                base,
                argc,
                site,
            } => write!(f, "call_method  {dst}, {recv}, {base}+{argc}, {site}"),
        }
    }
}
