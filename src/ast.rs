//! The AST shape this crate consumes.
//!
//! Parsing is out of scope (§1 Non-goals): an external front end produces
//! this tree, and the type analyser both reads it and rewrites operator
//! nodes in place (§9 "Typed AST rewriting" design note) rather than
//! carrying a side table of resolved operations. Every node carries its
//! source position so diagnostics can report `line`/`col` without a
//! separate position map.

use std::sync::Arc;

use crate::operation::{BinaryOperation, Operator, UnaryOperation};

/// A 1-based source position, matching the position convention used in
/// diagnostic rendering (§6.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub col: u32,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub functions: Vec<FunctionDef>,
    pub classes: Vec<ClassDef>,
    pub events: Vec<EventDef>,
    pub globals: Vec<Assign>,
}

#[derive(Debug, Clone)]
pub struct Arg {
    pub pos: Position,
    pub name: Arc<str>,
    /// `None` when the source omitted a type hint; the analyser reports
    /// `TypeHintMissing` for this case rather than inferring one (§4.1).
    pub type_hint: Option<Arc<str>>,
}

#[derive(Debug, Clone)]
pub struct FunctionDef {
    pub pos: Position,
    pub name: Arc<str>,
    pub args: Vec<Arg>,
    pub return_hint: Option<Arc<str>>,
    pub body: Vec<Stmt>,
    pub is_public: bool,
    /// Set when the def carries whatever decorator the front end uses to
    /// mark a notification event; the analyser still type-checks the
    /// signature and then treats it as an [`EventDef`] rather than a
    /// callable method.
    pub is_event: bool,
    pub is_metadata: bool,
}

#[derive(Debug, Clone)]
pub struct EventDef {
    pub pos: Position,
    pub name: Arc<str>,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone)]
pub struct ClassDef {
    pub pos: Position,
    pub name: Arc<str>,
    pub instance_variables: Vec<Arg>,
    pub methods: Vec<FunctionDef>,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Assign(Assign),
    /// A multi-target or chained assignment (`a, b = 1, 2` or `a = b = c`).
    /// The subset has no destructuring semantics, so this carries only a
    /// position — the analyser always rejects it as `NotSupportedOperation`
    /// rather than assigning it any meaning (SPEC_FULL.md §4.1, §8 scenario 5).
    MultiAssign {
        pos: Position,
    },
    Return {
        pos: Position,
        value: Option<Expr>,
    },
    Expr(Expr),
    If {
        pos: Position,
        test: Expr,
        body: Vec<Stmt>,
        orelse: Vec<Stmt>,
    },
    While {
        pos: Position,
        test: Expr,
        body: Vec<Stmt>,
    },
    For {
        pos: Position,
        target: Arc<str>,
        iter: Expr,
        body: Vec<Stmt>,
    },
    Assert {
        pos: Position,
        test: Expr,
    },
    Raise {
        pos: Position,
        exc: Option<Expr>,
    },
    Pass,
}

#[derive(Debug, Clone)]
pub struct Assign {
    pub pos: Position,
    pub target: Arc<str>,
    pub value: Expr,
}

/// An expression node. Binary/unary/compare operator nodes start out
/// holding only the surface-syntax [`Operator`] and are annotated in place
/// with their resolved [`Type`] and [`crate::operation::BinaryOperation`]/
/// [`crate::operation::UnaryOperation`] by the type analyser — see
/// `typeanalyser.rs`'s `resolved` field.
#[derive(Debug, Clone)]
pub enum Expr {
    Num {
        pos: Position,
        value: i128,
    },
    Str {
        pos: Position,
        value: Arc<str>,
    },
    Bytes {
        pos: Position,
        value: Arc<[u8]>,
    },
    Bool {
        pos: Position,
        value: bool,
    },
    None_ {
        pos: Position,
    },
    Name {
        pos: Position,
        id: Arc<str>,
    },
    BinOp {
        pos: Position,
        op: Operator,
        left: Box<Expr>,
        right: Box<Expr>,
        /// Filled in by the type analyser once it has resolved `op` against
        /// both operands' types; `None` until then. Code generation reads
        /// this directly rather than re-resolving the operator, matching
        /// §9's "typed AST rewriting instead of mutation" design note.
        resolved: Option<BinaryOperation>,
    },
    BoolOp {
        pos: Position,
        op: Operator,
        values: Vec<Expr>,
    },
    Compare {
        pos: Position,
        left: Box<Expr>,
        /// `(operator, comparator, resolved)` triples; a chain of length > 1
        /// (`a < b < c`) is rejected by the analyser per SPEC_FULL.md §4.1.
        rest: Vec<(Operator, Expr, Option<BinaryOperation>)>,
    },
    UnaryOp {
        pos: Position,
        op: Operator,
        operand: Box<Expr>,
        resolved: Option<UnaryOperation>,
    },
    Call {
        pos: Position,
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Attribute {
        pos: Position,
        value: Box<Expr>,
        attr: Arc<str>,
    },
    Index {
        pos: Position,
        value: Box<Expr>,
        index: Box<Expr>,
    },
    Slice {
        pos: Position,
        value: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
    },
    List {
        pos: Position,
        elements: Vec<Expr>,
    },
    Dict {
        pos: Position,
        keys: Vec<Expr>,
        values: Vec<Expr>,
    },
    /// A tuple literal. The subset gives this exactly one meaning at
    /// statement level — `return a, b` — which the analyser always
    /// rejects as `TooManyReturns` before code generation ever sees it
    /// (SPEC_FULL.md §4.1); it has no lowering of its own.
    Tuple {
        pos: Position,
        elements: Vec<Expr>,
    },
}

impl Expr {
    pub fn pos(&self) -> Position {
        match self {
            Expr::Num { pos, .. }
            | Expr::Str { pos, .. }
            | Expr::Bytes { pos, .. }
            | Expr::Bool { pos, .. }
            | Expr::None_ { pos }
            | Expr::Name { pos, .. }
            | Expr::BinOp { pos, .. }
            | Expr::BoolOp { pos, .. }
            | Expr::Compare { pos, .. }
            | Expr::UnaryOp { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Attribute { pos, .. }
            | Expr::Index { pos, .. }
            | Expr::Slice { pos, .. }
            | Expr::List { pos, .. }
            | Expr::Dict { pos, .. }
            | Expr::Tuple { pos, .. } => *pos,
        }
    }
}
