//! Boundary behaviours named explicitly by the testable-properties list:
//! empty bodies, integer literal encoding thresholds, and string literal
//! length thresholds.

use indexmap::IndexMap;

use neo_compiler_core::ast::{Expr, FunctionDef, Module, Position, Stmt};
use neo_compiler_core::compile;
use neo_compiler_core::opcode::OpCode;
use neo_compiler_core::symbol::{Method, SymbolTable};
use neo_compiler_core::types::Type;

fn pos() -> Position {
    Position { line: 1, col: 1 }
}

fn module_with_body(body: Vec<Stmt>, return_type: Type) -> (Module, SymbolTable) {
    let mut symbols = SymbolTable::new();
    symbols.methods.insert(
        "main".into(),
        Method {
            name: "main".into(),
            arguments: vec![],
            return_type,
            locals: IndexMap::new(),
            is_public: true,
            is_metadata: false,
            is_main: false,
        },
    );
    let module = Module {
        functions: vec![FunctionDef {
            pos: pos(),
            name: "main".into(),
            args: vec![],
            return_hint: None,
            body,
            is_public: true,
            is_event: false,
            is_metadata: false,
        }],
        classes: vec![],
        events: vec![],
        globals: vec![],
    };
    (module, symbols)
}

/// Empty function body collapses to one instruction: `RET`, no `INITSLOT`
/// (a zero-argument, zero-local method has nothing to size a frame for).
#[test]
fn empty_body_is_just_ret() {
    let (mut module, mut symbols) = module_with_body(vec![], Type::none());
    let output = compile(&mut module, &mut symbols, None);
    assert!(output.succeeded(), "{:?}", output.diagnostics);
    assert_eq!(output.bytecode.unwrap(), vec![OpCode::Ret.byte()]);
}

fn int_literal_bytecode(value: i128) -> Vec<u8> {
    let body = vec![Stmt::Return {
        pos: pos(),
        value: Some(Expr::Num { pos: pos(), value }),
    }];
    let (mut module, mut symbols) = module_with_body(body, Type::int());
    let output = compile(&mut module, &mut symbols, None);
    assert!(output.succeeded(), "{value}: {:?}", output.diagnostics);
    output.bytecode.unwrap()
}

#[test]
fn minus_one_uses_pushm1() {
    assert_eq!(int_literal_bytecode(-1), vec![OpCode::PushM1.byte(), OpCode::Ret.byte()]);
}

#[test]
fn zero_uses_push0() {
    assert_eq!(int_literal_bytecode(0), vec![OpCode::Push0.byte(), OpCode::Ret.byte()]);
}

#[test]
fn sixteen_uses_push16() {
    assert_eq!(int_literal_bytecode(16), vec![OpCode::Push16.byte(), OpCode::Ret.byte()]);
}

/// 17 falls just past the fast `PUSH<n>` family and must use a sized
/// immediate push — the smallest that fits a single byte, `PUSHINT8`.
#[test]
fn seventeen_uses_pushint8() {
    let bytes = int_literal_bytecode(17);
    assert_eq!(bytes[0], OpCode::PushInt8.byte());
    assert_eq!(bytes, vec![OpCode::PushInt8.byte(), 17, OpCode::Ret.byte()]);
}

/// -2 falls just below the fast `PUSHM1` sentinel and also needs a sized
/// immediate push.
#[test]
fn minus_two_uses_pushint8() {
    let bytes = int_literal_bytecode(-2);
    assert_eq!(bytes, vec![OpCode::PushInt8.byte(), (-2i8) as u8, OpCode::Ret.byte()]);
}

#[test]
fn i32_max_uses_pushint32() {
    let value = (i32::MAX) as i128;
    let bytes = int_literal_bytecode(value);
    assert_eq!(bytes[0], OpCode::PushInt32.byte());
    assert_eq!(&bytes[1..5], &(i32::MAX).to_le_bytes());
}

/// `2^31` overflows `i32`, so it needs the next size up, `PUSHINT64`.
#[test]
fn two_to_the_31_uses_pushint64() {
    let value: i128 = 1i128 << 31;
    let bytes = int_literal_bytecode(value);
    assert_eq!(bytes[0], OpCode::PushInt64.byte());
    assert_eq!(&bytes[1..9], &(value as i64).to_le_bytes());
}

fn string_literal_bytecode(len: usize) -> Vec<u8> {
    let value: std::sync::Arc<str> = "a".repeat(len).into();
    let body = vec![Stmt::Return {
        pos: pos(),
        value: Some(Expr::Str { pos: pos(), value }),
    }];
    let (mut module, mut symbols) = module_with_body(body, Type::str());
    let output = compile(&mut module, &mut symbols, None);
    assert!(output.succeeded(), "len={len}: {:?}", output.diagnostics);
    output.bytecode.unwrap()
}

#[test]
fn string_of_255_bytes_uses_pushdata1() {
    let bytes = string_literal_bytecode(255);
    assert_eq!(bytes[0], OpCode::PushData1.byte());
    assert_eq!(bytes[1], 255);
}

/// Past 255 bytes, the one-byte `PUSHDATA1` length prefix no longer fits,
/// so the string must use `PUSHDATA2`'s two-byte length prefix.
#[test]
fn string_longer_than_255_bytes_uses_pushdata2() {
    let bytes = string_literal_bytecode(256);
    assert_eq!(bytes[0], OpCode::PushData2.byte());
    assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 256);
}

/// Past 65535 bytes, `PUSHDATA4`'s four-byte length prefix is required.
#[test]
fn string_longer_than_65535_bytes_uses_pushdata4() {
    let bytes = string_literal_bytecode(65536);
    assert_eq!(bytes[0], OpCode::PushData4.byte());
    assert_eq!(u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]), 65536);
}
