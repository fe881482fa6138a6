//! Operator descriptor tables.
//!
//! The supported language subset has a small, fixed set of operators, so
//! each lookup is a `match` over `(Operator, operand type(s))` rather than a
//! table populated at startup — see SPEC_FULL.md §3.4. This mirrors what the
//! source's `BinaryOp`/`UnaryOp` registries compute (by scanning singleton
//! operation objects at call time) but makes the totality of the mapping
//! visible at the match site instead of behind a runtime loop over
//! instance attributes.
//!
//! Validation (`lookup_binary`/`lookup_unary`) is deliberately ignorant of
//! diagnostics: it returns `None` when an operator/operand combination isn't
//! supported, leaving the caller (the type analyser) to decide whether that
//! means "wrong types" or "not supported at all".

use smallvec::SmallVec;

use crate::opcode::OpCode;
use crate::types::Type;

/// A lowering for an operation: the fixed sequence of opcodes that realise
/// it once both operands are already on the evaluation stack (binary) or
/// the single operand is (unary).
pub type OpcodeSequence = SmallVec<[OpCode; 4]>;

/// Every operator the language surface can produce, arity-tagged by which
/// lookup function accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    // Arithmetic (binary)
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    Pow,
    // Bitwise (binary)
    BitAnd,
    BitOr,
    BitXor,
    LShift,
    RShift,
    // Relational (binary)
    Eq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    // Membership / identity (binary)
    In,
    NotIn,
    Is,
    IsNot,
    // Boolean (binary, short-circuiting — handled structurally in codegen)
    And,
    Or,
    // Unary
    Positive,
    Negative,
    Not,
    Invert,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        use Operator::*;
        match self {
            Add => "+",
            Sub => "-",
            Mul => "*",
            Div => "/",
            IntDiv => "//",
            Mod => "%",
            Pow => "**",
            BitAnd => "&",
            BitOr => "|",
            BitXor => "^",
            LShift => "<<",
            RShift => ">>",
            Eq => "==",
            NotEq => "!=",
            Lt => "<",
            Le => "<=",
            Gt => ">",
            Ge => ">=",
            In => "in",
            NotIn => "not in",
            Is => "is",
            IsNot => "is not",
            And => "and",
            Or => "or",
            Positive => "+",
            Negative => "-",
            Not => "not",
            Invert => "~",
        }
    }
}

/// A resolved binary operation: both operand types, the result type, and
/// the opcode sequence that implements it once both operands are pushed.
#[derive(Debug, Clone)]
pub struct BinaryOperation {
    pub operator: Operator,
    pub left: Type,
    pub right: Type,
    pub result: Type,
    pub opcodes: OpcodeSequence,
}

/// A resolved unary operation.
#[derive(Debug, Clone)]
pub struct UnaryOperation {
    pub operator: Operator,
    pub operand: Type,
    pub result: Type,
    pub opcodes: OpcodeSequence,
}

fn seq(ops: &[OpCode]) -> OpcodeSequence {
    ops.iter().copied().collect()
}

/// Resolves a binary operator against its left/right operand types.
///
/// Returns `None` when the operator is never defined for this pair of
/// types (either because the types mismatch, or because the operator is
/// unsupported for the subset entirely — e.g. `/` and `**`, both left as
/// `NotSupportedOperation` per SPEC_FULL.md Open Question (b)). The caller
/// distinguishes those two cases by first checking whether `left == right`
/// (or one of them is `Type::any()`) and only then whether the operator
/// itself is in scope.
pub fn lookup_binary(operator: Operator, left: &Type, right: &Type) -> Option<BinaryOperation> {
    use Operator::*;
    use OpCode::*;

    let int = Type::int();
    let bool_ = Type::bool();
    let str_ = Type::str();
    let bytes = Type::bytes();

    let result = |result: Type, opcodes: &[OpCode]| {
        Some(BinaryOperation {
            operator,
            left: left.clone(),
            right: right.clone(),
            result,
            opcodes: seq(opcodes),
        })
    };

    match operator {
        // int op int -> int. No implicit bool<->int coercion: a bool
        // operand is rejected here even though the VM would happily treat
        // it as 0/1, because the subset's lattice keeps bool and int
        // distinct (REDESIGN FLAG, SPEC_FULL.md §3.1).
        Add if *left == int && *right == int => result(int, &[Add]),
        Sub if *left == int && *right == int => result(int, &[Sub]),
        Mul if *left == int && *right == int => result(int, &[Mul]),
        IntDiv if *left == int && *right == int => result(int, &[Div]),
        Mod if *left == int && *right == int => result(int, &[Mod]),

        // Division and exponentiation stay unsupported: the subset has no
        // float type to hold a non-integral `/` result, and `**` has no
        // single-opcode VM lowering. Left unimplemented per Open Question (b).
        Div | Pow if *left == int && *right == int => None,

        BitAnd if *left == int && *right == int => result(int, &[And]),
        BitOr if *left == int && *right == int => result(int, &[Or]),
        BitXor if *left == int && *right == int => result(int, &[Xor]),
        LShift if *left == int && *right == int => result(int, &[Shl]),
        RShift if *left == int && *right == int => result(int, &[Shr]),

        // String concatenation. Not in spec.md's narrower description but
        // nothing in Non-goals excludes it, and the VM already has a
        // single opcode (`CAT`) that implements it directly.
        Add if *left == str_ && *right == str_ => result(str_.clone(), &[Cat]),
        Add if *left == bytes && *right == bytes => result(bytes.clone(), &[Cat]),

        // Relational comparisons over int.
        Lt if *left == int && *right == int => result(bool_.clone(), &[Lt]),
        Le if *left == int && *right == int => result(bool_.clone(), &[Le]),
        Gt if *left == int && *right == int => result(bool_.clone(), &[Gt]),
        Ge if *left == int && *right == int => result(bool_.clone(), &[Ge]),

        // Equality is homogeneous over bool, int, str, bytes, and Any: the
        // VM's EQUAL/NOTEQUAL opcodes compare stack items structurally and
        // don't care which of those four kinds they're given, as long as
        // both sides agree.
        Eq if left == right => result(bool_.clone(), &[Equal]),
        NotEq if left == right => result(bool_.clone(), &[NotEqual]),

        // `is`/`is not` — reference identity, valid for any matching
        // reference type (never primitives, which have no identity
        // distinct from value).
        Is if left == right && !left.capabilities().is_primitive => {
            result(bool_.clone(), &[Equal])
        }
        IsNot if left == right && !left.capabilities().is_primitive => {
            result(bool_.clone(), &[NotEqual])
        }

        // Membership: `x in xs` where `xs` is a sequence whose element type
        // matches (or accepts) `x`.
        In if right.capabilities().is_sequence && right.element_type().as_ref().map_or(true, |e| e.accepts(left)) => {
            result(bool_.clone(), &[HasKey])
        }
        NotIn if right.capabilities().is_sequence && right.element_type().as_ref().map_or(true, |e| e.accepts(left)) => {
            result(bool_.clone(), &[HasKey, Not])
        }

        _ => None,
    }
}

/// Resolves a unary operator against its operand type.
pub fn lookup_unary(operator: Operator, operand: &Type) -> Option<UnaryOperation> {
    use Operator::*;
    use OpCode::*;

    let int = Type::int();
    let bool_ = Type::bool();

    let result = |result: Type, opcodes: &[OpCode]| {
        Some(UnaryOperation {
            operator,
            operand: operand.clone(),
            result,
            opcodes: seq(opcodes),
        })
    };

    match operator {
        Positive if *operand == int => result(int, &[]),
        Negative if *operand == int => result(int, &[Negate]),
        Invert if *operand == int => result(int, &[Invert]),
        Not if *operand == bool_ => result(bool_, &[Not]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_arithmetic_resolves() {
        let op = lookup_binary(Operator::Add, &Type::int(), &Type::int()).unwrap();
        assert_eq!(op.result, Type::int());
        assert_eq!(op.opcodes.as_slice(), &[OpCode::Add]);
    }

    #[test]
    fn bool_is_not_accepted_for_int_arithmetic() {
        assert!(lookup_binary(Operator::Add, &Type::bool(), &Type::int()).is_none());
        assert!(lookup_binary(Operator::Add, &Type::int(), &Type::bool()).is_none());
    }

    #[test]
    fn string_concat_lowers_to_cat() {
        let op = lookup_binary(Operator::Add, &Type::str(), &Type::str()).unwrap();
        assert_eq!(op.opcodes.as_slice(), &[OpCode::Cat]);
    }

    #[test]
    fn division_and_power_remain_unsupported() {
        assert!(lookup_binary(Operator::Div, &Type::int(), &Type::int()).is_none());
        assert!(lookup_binary(Operator::Pow, &Type::int(), &Type::int()).is_none());
    }

    #[test]
    fn equality_is_homogeneous_across_kinds() {
        assert!(lookup_binary(Operator::Eq, &Type::int(), &Type::int()).is_some());
        assert!(lookup_binary(Operator::Eq, &Type::int(), &Type::str()).is_none());
    }

    #[test]
    fn unary_not_requires_bool() {
        assert!(lookup_unary(Operator::Not, &Type::bool()).is_some());
        assert!(lookup_unary(Operator::Not, &Type::int()).is_none());
    }
}
