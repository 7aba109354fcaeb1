//! # Jasper AST
//!
//! The abstract syntax tree consumed by both execution tiers. The tree is
//! produced by an external front end (no lexer or parser lives in this
//! repository); these are the node shapes the execution core takes as a
//! given data model.
//!
//! Every node records its 1-based source line for failure attribution.
//! Function literals are [`Rc`]-shared so the interpreter's closures, the
//! compiler's function dictionary and the loader can all hold the same
//! body without cloning the tree.
//!
//! The `Expr::*` convenience constructors exist because the repository has
//! no parser: tests and embedders build trees by hand.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::rc::Rc;

/// A literal constant embedded in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lit {
    /// Integer literal.
    Int(i64),
    /// String literal.
    Str(String),
}

/// A sequence of expressions evaluated for effect.
///
/// A block's result is always `undefined`: it sequences, it does not
/// chain expression values.
#[derive(Debug, Clone)]
pub struct Block {
    /// The contained expressions, in evaluation order.
    pub instrs: Vec<Expr>,
    /// Source line of the block opening.
    pub line: u32,
}

/// A function literal: optional name, parameters, body.
#[derive(Debug, Clone)]
pub struct FunLiteral {
    /// Declared name; named literals register themselves in their
    /// defining environment (supports self-recursion).
    pub name: Option<String>,
    /// Parameter names, in declaration order.
    pub params: Vec<String>,
    /// The function body.
    pub body: Block,
}

impl FunLiteral {
    /// The name used for diagnostics: the declared name or `"lambda"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("lambda")
    }
}

/// An expression node.
#[derive(Debug, Clone)]
pub enum Expr {
    /// A sequencing block; yields `undefined`.
    Block(Block),
    /// A literal constant.
    Literal {
        /// The constant value.
        value: Lit,
        /// Source line.
        line: u32,
    },
    /// Variable read through the environment chain.
    LocalVarAccess {
        /// Variable name.
        name: String,
        /// Source line.
        line: u32,
    },
    /// Variable declaration or assignment into the current scope.
    LocalVarAssignment {
        /// Variable name.
        name: String,
        /// The assigned expression.
        expr: Box<Expr>,
        /// True for `var` declarations (redeclaration-checked).
        declaration: bool,
        /// Source line.
        line: u32,
    },
    /// Call of an arbitrary callee expression; receiver is `undefined`.
    FunCall {
        /// The callee expression.
        qualifier: Box<Expr>,
        /// Argument expressions, evaluated left to right.
        args: Vec<Expr>,
        /// Source line.
        line: u32,
    },
    /// A function literal.
    Fun {
        /// The shared literal.
        fun: Rc<FunLiteral>,
        /// Source line.
        line: u32,
    },
    /// Non-local return to the nearest enclosing function invocation.
    Return {
        /// The returned expression.
        expr: Box<Expr>,
        /// Source line.
        line: u32,
    },
    /// Two-armed conditional; exactly one branch executes.
    If {
        /// The condition expression.
        condition: Box<Expr>,
        /// Branch taken for truthy conditions.
        true_block: Block,
        /// Branch taken for the falsy condition (integer `0`).
        false_block: Block,
        /// Source line.
        line: u32,
    },
    /// Construction of a plain object with initial fields.
    New {
        /// `(name, value)` initializers, registered in order.
        init: Vec<(String, Expr)>,
        /// Source line.
        line: u32,
    },
    /// Field read on an object; absent fields yield `undefined`.
    FieldAccess {
        /// The receiver expression.
        receiver: Box<Expr>,
        /// Field name.
        name: String,
        /// Source line.
        line: u32,
    },
    /// Field write on an object (create-or-overwrite).
    FieldAssignment {
        /// The receiver expression.
        receiver: Box<Expr>,
        /// Field name.
        name: String,
        /// The assigned expression.
        expr: Box<Expr>,
        /// Source line.
        line: u32,
    },
    /// Method call: field lookup on the receiver, invoked with the
    /// receiver bound as `this`.
    MethodCall {
        /// The receiver expression.
        receiver: Box<Expr>,
        /// Method (field) name.
        name: String,
        /// Argument expressions.
        args: Vec<Expr>,
        /// Source line.
        line: u32,
    },
}

impl Expr {
    /// Source line of this node.
    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            Self::Block(block) => block.line,
            Self::Literal { line, .. }
            | Self::LocalVarAccess { line, .. }
            | Self::LocalVarAssignment { line, .. }
            | Self::FunCall { line, .. }
            | Self::Fun { line, .. }
            | Self::Return { line, .. }
            | Self::If { line, .. }
            | Self::New { line, .. }
            | Self::FieldAccess { line, .. }
            | Self::FieldAssignment { line, .. }
            | Self::MethodCall { line, .. } => *line,
        }
    }

    // =========================================================================
    // Construction helpers (there is no parser in this repository)
    // =========================================================================

    /// Integer literal.
    #[must_use]
    pub fn int(value: i64, line: u32) -> Self {
        Self::Literal {
            value: Lit::Int(value),
            line,
        }
    }

    /// String literal.
    #[must_use]
    pub fn string(value: impl Into<String>, line: u32) -> Self {
        Self::Literal {
            value: Lit::Str(value.into()),
            line,
        }
    }

    /// Variable read.
    #[must_use]
    pub fn var(name: impl Into<String>, line: u32) -> Self {
        Self::LocalVarAccess {
            name: name.into(),
            line,
        }
    }

    /// `var name = expr` declaration.
    #[must_use]
    pub fn declare(name: impl Into<String>, expr: Expr, line: u32) -> Self {
        Self::LocalVarAssignment {
            name: name.into(),
            expr: Box::new(expr),
            declaration: true,
            line,
        }
    }

    /// `name = expr` assignment (no declaration check).
    #[must_use]
    pub fn assign(name: impl Into<String>, expr: Expr, line: u32) -> Self {
        Self::LocalVarAssignment {
            name: name.into(),
            expr: Box::new(expr),
            declaration: false,
            line,
        }
    }

    /// Call `qualifier(args...)`.
    #[must_use]
    pub fn call(qualifier: Expr, args: Vec<Expr>, line: u32) -> Self {
        Self::FunCall {
            qualifier: Box::new(qualifier),
            args,
            line,
        }
    }

    /// Call the named variable: `name(args...)`.
    #[must_use]
    pub fn call_var(name: impl Into<String>, args: Vec<Expr>, line: u32) -> Self {
        let line_ = line;
        Self::call(Self::var(name, line_), args, line)
    }

    /// Binary operator application `a <op> b` through the operator
    /// builtin registered in the global environment.
    #[must_use]
    pub fn binop(op: &str, lhs: Expr, rhs: Expr, line: u32) -> Self {
        Self::call_var(op, vec![lhs, rhs], line)
    }

    /// Function literal.
    #[must_use]
    pub fn fun(
        name: Option<&str>,
        params: &[&str],
        body: Block,
        line: u32,
    ) -> Self {
        Self::Fun {
            fun: Rc::new(FunLiteral {
                name: name.map(str::to_owned),
                params: params.iter().map(|&p| p.to_owned()).collect(),
                body,
            }),
            line,
        }
    }

    /// `return expr`.
    #[must_use]
    pub fn ret(expr: Expr, line: u32) -> Self {
        Self::Return {
            expr: Box::new(expr),
            line,
        }
    }

    /// `if (condition) { true_block } else { false_block }`.
    #[must_use]
    pub fn if_else(condition: Expr, true_block: Block, false_block: Block, line: u32) -> Self {
        Self::If {
            condition: Box::new(condition),
            true_block,
            false_block,
            line,
        }
    }

    /// `new { name: expr, ... }`.
    #[must_use]
    pub fn new_object(init: Vec<(&str, Expr)>, line: u32) -> Self {
        Self::New {
            init: init
                .into_iter()
                .map(|(name, expr)| (name.to_owned(), expr))
                .collect(),
            line,
        }
    }

    /// `receiver.name`.
    #[must_use]
    pub fn field(receiver: Expr, name: impl Into<String>, line: u32) -> Self {
        Self::FieldAccess {
            receiver: Box::new(receiver),
            name: name.into(),
            line,
        }
    }

    /// `receiver.name = expr`.
    #[must_use]
    pub fn set_field(receiver: Expr, name: impl Into<String>, expr: Expr, line: u32) -> Self {
        Self::FieldAssignment {
            receiver: Box::new(receiver),
            name: name.into(),
            expr: Box::new(expr),
            line,
        }
    }

    /// `receiver.name(args...)`.
    #[must_use]
    pub fn method(receiver: Expr, name: impl Into<String>, args: Vec<Expr>, line: u32) -> Self {
        Self::MethodCall {
            receiver: Box::new(receiver),
            name: name.into(),
            args,
            line,
        }
    }
}

impl Block {
    /// Build a block from its expressions.
    #[must_use]
    pub fn new(instrs: Vec<Expr>, line: u32) -> Self {
        Self { instrs, line }
    }

    /// An empty block.
    #[must_use]
    pub fn empty(line: u32) -> Self {
        Self {
            instrs: Vec::new(),
            line,
        }
    }
}

/// A whole script: a top-level block executed once.
#[derive(Debug, Clone)]
pub struct Script {
    /// The top-level block.
    pub body: Block,
}

impl Script {
    /// Wrap a top-level block.
    #[must_use]
    pub fn new(body: Block) -> Self {
        Self { body }
    }
}
