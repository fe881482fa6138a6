//! Type analyser, code generator, and instruction map for a Neo VM
//! smart-contract compiler.
//!
//! [`compile`] is the only "do everything" entry point this crate exposes;
//! everything else — [`typeanalyser::TypeAnalyser`],
//! [`codegen::MethodCodeGenerator`], [`instmap::InstructionMap`] — is a
//! public library a host can drive stage by stage, e.g. to inspect
//! diagnostics before deciding whether to generate code at all.
//!
//! Parsing, file I/O, and manifest JSON emission are a front end's
//! responsibility; this crate starts from an already-built AST and symbol
//! table and ends at in-memory script bytes plus a serialization-ready
//! [`manifest::Manifest`].

pub mod ast;
pub mod builtins;
pub mod codegen;
pub mod diagnostics;
pub mod instmap;
pub mod manifest;
pub mod opcode;
pub mod operation;
pub mod symbol;
pub mod typeanalyser;
pub mod types;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::Module;
use crate::builtins::BuiltinCatalogue;
use crate::codegen::{CodegenContext, MethodCodeGenerator};
use crate::diagnostics::Diagnostics;
use crate::instmap::{Inst, InstructionMap};
use crate::manifest::Manifest;
use crate::opcode::OpCode;
use crate::symbol::{Method, SymbolTable};
use crate::typeanalyser::TypeAnalyser;
use crate::types::Type;

/// Everything one `compile` run produces: the accumulated diagnostics plus,
/// when the run reported no errors, the finalised script and its ABI
/// surface (§7 "code generation doesn't run with any error diagnostic
/// present").
#[derive(Debug)]
pub struct CompileOutput {
    pub diagnostics: Diagnostics,
    pub bytecode: Option<Vec<u8>>,
    pub manifest: Option<Manifest>,
}

impl CompileOutput {
    pub fn succeeded(&self) -> bool {
        !self.diagnostics.has_errors()
    }
}

/// The name reserved for the synthesized static-field initializer (§4.2
/// "module-level globals"), invoked once before any public method the way
/// a real ABI's dedicated `_initialize` entry is. Not a user-declared
/// method name — the analyser never registers anything under it, so a
/// source-level method of this name would collide, which is an acceptable
/// restriction on the reserved surface rather than something this crate
/// detects itself.
const STATIC_INITIALIZER_NAME: &str = "_initialize";

/// Runs the type analyser over `module`, and — provided it reported no
/// errors — the code generator over every function and class method,
/// returning the finalised script bytes and ABI manifest.
///
/// `builtins` is optional so a host that only wants the analyser's
/// diagnostics (e.g. the subset with no interop surface at all) doesn't
/// need to construct a catalogue; passing `None` just means bare/package
/// calls against built-ins always report `UnresolvedReference`.
pub fn compile(module: &mut Module, symbols: &mut SymbolTable, builtins: Option<&BuiltinCatalogue>) -> CompileOutput {
    let mut analyser = TypeAnalyser::new(symbols);
    if let Some(catalogue) = builtins {
        analyser = analyser.with_builtins(catalogue);
    }
    let (diagnostics, calls) = analyser.analyse(module);

    if diagnostics.has_errors() {
        return CompileOutput {
            diagnostics,
            bytecode: None,
            manifest: None,
        };
    }

    let mut map = InstructionMap::new();
    let mut entries: IndexMap<Arc<str>, Inst> = IndexMap::new();
    let mut pending: Vec<(Inst, Arc<str>)> = Vec::new();

    if !module.globals.is_empty() {
        generate_static_initializer(module, symbols, &calls, &mut map, &mut entries, &mut pending);
    }

    for function in &module.functions {
        generate_function(function, symbols, &calls, &mut map, &mut entries, &mut pending);
    }
    for class in &module.classes {
        for method in &class.methods {
            generate_function(method, symbols, &calls, &mut map, &mut entries, &mut pending);
        }
    }

    resolve_pending_calls(&mut map, &entries, pending);

    if let Some(main_method) = symbols.methods.values().find(|m| m.is_main) {
        if let Some(&entry) = entries.get(main_method.name.as_ref()) {
            map.relocate_to_head(entry);
        }
    }

    map.finalise();
    let bytecode = map.serialise();
    let manifest = Manifest::build(symbols, &map, &entries);

    CompileOutput {
        diagnostics,
        bytecode: Some(bytecode),
        manifest: Some(manifest),
    }
}

/// Generates one top-level function or class method's body, registering
/// its entry instruction under its own (unqualified) name — class methods
/// resolve through the same flat [`SymbolTable::methods`] table the type
/// analyser already looks them up in (`visit_function` does the same
/// lookup regardless of whether it was reached via `visit_class`), so
/// generation mirrors that rather than introducing a qualified name of its
/// own.
///
/// A method decorated as `metadata` is consumed at compile time and
/// removed from the emitted script entirely (§6.4); one decorated as an
/// event carries no body of its own to lower (§ ast.rs `is_event` doc) —
/// both are skipped here rather than generated.
fn generate_function(
    function: &ast::FunctionDef,
    symbols: &SymbolTable,
    calls: &IndexMap<(u32, u32), typeanalyser::ResolvedCall>,
    map: &mut InstructionMap,
    entries: &mut IndexMap<Arc<str>, Inst>,
    pending: &mut Vec<(Inst, Arc<str>)>,
) {
    if function.is_metadata || function.is_event {
        return;
    }
    let Some(method) = symbols.methods.get(&function.name) else {
        return;
    };
    let ctx = CodegenContext::new(method, calls, &symbols.global_variables);
    let mut gen = MethodCodeGenerator::new(&ctx, map, entries, pending);
    let entry = gen.generate(&function.body);
    entries.insert(function.name.clone(), entry);
}

/// Generates the static-field initializer block under the reserved
/// [`STATIC_INITIALIZER_NAME`], run once a host invokes it before any
/// public method.
fn generate_static_initializer(
    module: &Module,
    symbols: &SymbolTable,
    calls: &IndexMap<(u32, u32), typeanalyser::ResolvedCall>,
    map: &mut InstructionMap,
    entries: &mut IndexMap<Arc<str>, Inst>,
    pending: &mut Vec<(Inst, Arc<str>)>,
) {
    let placeholder_method = Method {
        name: STATIC_INITIALIZER_NAME.into(),
        arguments: vec![],
        return_type: Type::none(),
        locals: IndexMap::new(),
        is_public: false,
        is_metadata: false,
        is_main: false,
    };
    let ctx = CodegenContext::new(&placeholder_method, calls, &symbols.global_variables);
    let mut gen = MethodCodeGenerator::new(&ctx, map, entries, pending);
    let entry = gen.generate_static_initializer(&module.globals);
    entries.insert(STATIC_INITIALIZER_NAME.into(), entry);
}

/// Patches every deferred `CALL` placeholder left by a forward or
/// mutually-recursive reference (§4.2.4 "pending calls") now that every
/// method has an entry. Every name here was validated against a declared
/// method by the type analyser, so a missing entry is a codegen/analyser
/// disagreement, not reachable from well-formed input.
fn resolve_pending_calls(map: &mut InstructionMap, entries: &IndexMap<Arc<str>, Inst>, pending: Vec<(Inst, Arc<str>)>) {
    for (placeholder, name) in pending {
        let target = *entries
            .get(name.as_ref())
            .unwrap_or_else(|| panic!("codegen: call to undeclared method '{name}' (analyser bug)"));
        map.patch_branch(placeholder, OpCode::Call, target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Arg, Assign, Expr, FunctionDef, Position, Stmt};
    use crate::symbol::Variable;

    fn pos() -> Position {
        Position { line: 1, col: 1 }
    }

    fn module_with(functions: Vec<FunctionDef>, globals: Vec<Assign>) -> Module {
        Module {
            functions,
            classes: vec![],
            events: vec![],
            globals,
        }
    }

    #[test]
    fn a_well_typed_module_compiles_to_nonempty_bytecode_with_no_diagnostics() {
        let mut symbols = SymbolTable::new();
        symbols.methods.insert(
            "main".into(),
            Method {
                name: "main".into(),
                arguments: vec![],
                return_type: Type::int(),
                locals: IndexMap::new(),
                is_public: true,
                is_metadata: false,
                is_main: false,
            },
        );
        let mut module = module_with(
            vec![FunctionDef {
                pos: pos(),
                name: "main".into(),
                args: vec![],
                return_hint: Some("int".into()),
                body: vec![Stmt::Return {
                    pos: pos(),
                    value: Some(Expr::Num { pos: pos(), value: 7 }),
                }],
                is_public: true,
                is_event: false,
                is_metadata: false,
            }],
            vec![],
        );

        let output = compile(&mut module, &mut symbols, None);
        assert!(output.succeeded());
        let bytecode = output.bytecode.expect("no errors means bytecode is produced");
        assert!(!bytecode.is_empty());
        let manifest = output.manifest.expect("no errors means a manifest is produced");
        assert_eq!(manifest.methods.len(), 1);
        assert_eq!(manifest.methods[0].name, "main");
    }

    #[test]
    fn a_type_error_suppresses_code_generation_entirely() {
        let mut symbols = SymbolTable::new();
        symbols.methods.insert(
            "main".into(),
            Method {
                name: "main".into(),
                arguments: vec![],
                return_type: Type::none(),
                locals: IndexMap::new(),
                is_public: true,
                is_metadata: false,
                is_main: false,
            },
        );
        let mut module = module_with(
            vec![FunctionDef {
                pos: pos(),
                name: "main".into(),
                args: vec![Arg {
                    pos: pos(),
                    name: "x".into(),
                    type_hint: None,
                }],
                return_hint: None,
                body: vec![],
                is_public: true,
                is_event: false,
                is_metadata: false,
            }],
            vec![],
        );

        let output = compile(&mut module, &mut symbols, None);
        assert!(!output.succeeded());
        assert!(output.bytecode.is_none());
        assert!(output.manifest.is_none());
    }

    #[test]
    fn a_forward_call_between_two_functions_resolves_to_the_callees_real_entry() {
        let mut symbols = SymbolTable::new();
        symbols.methods.insert(
            "first".into(),
            Method {
                name: "first".into(),
                arguments: vec![],
                return_type: Type::none(),
                locals: IndexMap::new(),
                is_public: true,
                is_metadata: false,
                is_main: false,
            },
        );
        symbols.methods.insert(
            "second".into(),
            Method {
                name: "second".into(),
                arguments: vec![],
                return_type: Type::none(),
                locals: IndexMap::new(),
                is_public: false,
                is_metadata: false,
                is_main: false,
            },
        );
        // `first` calls `second`, which is declared after it — a forward
        // reference the pending-calls mechanism must patch up.
        let mut module = module_with(
            vec![
                FunctionDef {
                    pos: pos(),
                    name: "first".into(),
                    args: vec![],
                    return_hint: None,
                    body: vec![Stmt::Expr(Expr::Call {
                        pos: pos(),
                        func: Box::new(Expr::Name {
                            pos: pos(),
                            id: "second".into(),
                        }),
                        args: vec![],
                    })],
                    is_public: true,
                    is_event: false,
                    is_metadata: false,
                },
                FunctionDef {
                    pos: pos(),
                    name: "second".into(),
                    args: vec![],
                    return_hint: None,
                    body: vec![],
                    is_public: false,
                    is_event: false,
                    is_metadata: false,
                },
            ],
            vec![],
        );

        let output = compile(&mut module, &mut symbols, None);
        assert!(output.succeeded(), "{:?}", output.diagnostics);
        assert!(output.bytecode.is_some());
    }

    #[test]
    fn module_level_globals_compile_into_a_reserved_initializer_entry() {
        let mut symbols = SymbolTable::new();
        symbols.methods.insert(
            "main".into(),
            Method {
                name: "main".into(),
                arguments: vec![],
                return_type: Type::none(),
                locals: IndexMap::new(),
                is_public: true,
                is_metadata: false,
                is_main: false,
            },
        );
        symbols.global_variables.insert(
            "owner".into(),
            Variable {
                name: "owner".into(),
                declared_type: Type::bytes(),
                is_argument: false,
            },
        );
        let mut module = module_with(
            vec![FunctionDef {
                pos: pos(),
                name: "main".into(),
                args: vec![],
                return_hint: None,
                body: vec![],
                is_public: true,
                is_event: false,
                is_metadata: false,
            }],
            vec![Assign {
                pos: pos(),
                target: "owner".into(),
                value: Expr::Bytes {
                    pos: pos(),
                    value: Arc::from(&b"\x01\x02"[..]),
                },
            }],
        );

        let output = compile(&mut module, &mut symbols, None);
        assert!(output.succeeded(), "{:?}", output.diagnostics);
        assert!(output.bytecode.is_some());
    }

    #[test]
    fn the_designated_entry_point_is_relocated_to_byte_offset_zero() {
        let mut symbols = SymbolTable::new();
        // `helper` is declared (and therefore generated) first, but `entry`
        // carries `is_main` and must still end up at offset 0.
        symbols.methods.insert(
            "helper".into(),
            Method {
                name: "helper".into(),
                arguments: vec![],
                return_type: Type::none(),
                locals: IndexMap::new(),
                is_public: false,
                is_metadata: false,
                is_main: false,
            },
        );
        symbols.methods.insert(
            "entry".into(),
            Method {
                name: "entry".into(),
                arguments: vec![],
                return_type: Type::int(),
                locals: IndexMap::new(),
                is_public: true,
                is_metadata: false,
                is_main: true,
            },
        );
        let mut module = module_with(
            vec![
                FunctionDef {
                    pos: pos(),
                    name: "helper".into(),
                    args: vec![],
                    return_hint: None,
                    body: vec![],
                    is_public: false,
                    is_event: false,
                    is_metadata: false,
                },
                FunctionDef {
                    pos: pos(),
                    name: "entry".into(),
                    args: vec![],
                    return_hint: Some("int".into()),
                    body: vec![Stmt::Return {
                        pos: pos(),
                        value: Some(Expr::Num { pos: pos(), value: 9 }),
                    }],
                    is_public: true,
                    is_event: false,
                    is_metadata: false,
                },
            ],
            vec![],
        );

        let output = compile(&mut module, &mut symbols, None);
        assert!(output.succeeded(), "{:?}", output.diagnostics);
        let bytecode = output.bytecode.unwrap();
        // `entry`'s body (`PUSH9 . RET`) must lead the script even though
        // `helper` was declared and generated first.
        assert_eq!(bytecode[0], crate::opcode::OpCode::Push9.byte());
        assert_eq!(bytecode[1], crate::opcode::OpCode::Ret.byte());
    }
}
