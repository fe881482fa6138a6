//! The type analyser: C3.
//!
//! Walks the AST, resolving every name and operator against the symbol
//! table and reporting [`Diagnostic`]s for anything that doesn't check
//! out. Operator nodes are rewritten in place (their `resolved` field is
//! filled with the looked-up [`BinaryOperation`]/[`UnaryOperation`])
//! rather than recorded in a side table — see §9's "typed AST rewriting"
//! design note and `ast.rs`'s module doc.
//!
//! Matches the source's `_log_error` behaviour of pushing onto the
//! diagnostics bag and then continuing (§7 "accumulate + abort current
//! sub-tree + continue siblings"): a type error inside one statement
//! doesn't stop the analyser from checking the rest of the method.

use indexmap::IndexMap;
use log::debug;

use crate::ast::{Arg, Assign, ClassDef, EventDef, Expr, FunctionDef, Module, Position, Stmt};
use crate::builtins::BuiltinCatalogue;
use crate::diagnostics::{Diagnostic, DiagnosticKind, Diagnostics};
use crate::operation::{self, Operator};
use crate::symbol::{BuiltinCallable, Class, Method, Symbol, SymbolTable, Variable};
use crate::types::Type;

/// What a `Call` node turned out to refer to, keyed by its source
/// position — consumed by [`crate::codegen::MethodCodeGenerator`], which
/// resolves a `UserMethod` reference against the entries generated so far
/// and defers to a pending-call patch-up when the callee hasn't been
/// generated yet (call targets can forward-reference a method declared
/// later in the same module).
#[derive(Debug, Clone)]
pub enum ResolvedCall {
    UserMethod {
        name: std::sync::Arc<str>,
        /// Carried alongside the name so the code generator can tell a
        /// value-returning call from one that pushes nothing, without
        /// needing the whole symbol table at the call site (§4.2.6
        /// "expression-statement balance").
        return_type: Type,
    },
    Builtin(BuiltinCallable),
    /// A call to a declared notification event (`Transfer(from, to, amount)`)
    /// — lowered by packing the arguments into an array and notifying under
    /// this name (§4.2 "event emission"), never through `entries`/`pending`
    /// since an event has no body of its own to generate.
    Event(std::sync::Arc<str>),
}

/// Resolves a type-hint string to a [`Type`], looking past the handful of
/// built-in spellings the subset recognises. An external front end is
/// responsible for everything else (generic parsing, forward references);
/// this crate only ever sees already-tokenised hint strings (§1 Non-goals).
fn resolve_type_hint(hint: &str, symbols: &SymbolTable) -> Option<Type> {
    match hint {
        "int" => Some(Type::int()),
        "bool" => Some(Type::bool()),
        "str" => Some(Type::str()),
        "bytes" => Some(Type::bytes()),
        "None" => Some(Type::none()),
        "Any" => Some(Type::any()),
        _ => symbols.classes.get(hint).map(Class::as_type),
    }
}

/// The analyser's working state for one translation unit.
pub struct TypeAnalyser<'a> {
    symbols: &'a mut SymbolTable,
    /// The read-only built-in/interop table calls and bare package
    /// references resolve against, alongside `symbols` (§5 "Singleton
    /// catalogues" design note — owned by the caller, shared by reference,
    /// never a process-wide singleton). `None` runs the analyser with no
    /// built-ins visible at all, which is enough for unit tests that don't
    /// exercise them.
    builtins: Option<&'a BuiltinCatalogue>,
    diagnostics: Diagnostics,
    calls: IndexMap<(u32, u32), ResolvedCall>,
    current_method: Option<std::sync::Arc<str>>,
}

impl<'a> TypeAnalyser<'a> {
    pub fn new(symbols: &'a mut SymbolTable) -> Self {
        TypeAnalyser {
            symbols,
            builtins: None,
            diagnostics: Diagnostics::new(),
            calls: IndexMap::new(),
            current_method: None,
        }
    }

    /// Shares a built-in catalogue with this analyser run so bare calls
    /// (`len(x)`) and package-attribute calls (`Storage.get(key)`) resolve
    /// instead of reporting every non-local name as `UnresolvedReference`.
    pub fn with_builtins(mut self, builtins: &'a BuiltinCatalogue) -> Self {
        self.builtins = Some(builtins);
        self
    }

    /// Runs the analyser over the whole module, mutating `module` in place
    /// to attach operator resolutions, and returns the accumulated
    /// diagnostics plus the call-target table the code generator needs.
    pub fn analyse(mut self, module: &mut Module) -> (Diagnostics, IndexMap<(u32, u32), ResolvedCall>) {
        for class in &mut module.classes {
            self.visit_class(class);
        }
        for event in &module.events {
            self.visit_event(event);
        }
        for global in &mut module.globals {
            self.visit_global_assign(global);
        }
        for function in &mut module.functions {
            self.visit_function(function);
        }
        self.diagnostics.sort_by_position();
        (self.diagnostics, self.calls)
    }

    fn error(&mut self, pos: Position, kind: DiagnosticKind) {
        self.diagnostics.push(Diagnostic::new(pos.line, pos.col, kind));
    }

    fn check_args_have_hints(&mut self, args: &[Arg]) {
        for arg in args {
            match &arg.type_hint {
                None => {
                    self.error(
                        arg.pos,
                        DiagnosticKind::TypeHintMissing {
                            symbol_id: arg.name.to_string(),
                        },
                    );
                }
                Some(hint) if resolve_type_hint(hint, self.symbols).is_none() => {
                    self.error(
                        arg.pos,
                        DiagnosticKind::InvalidType {
                            type_id: hint.to_string(),
                        },
                    );
                }
                Some(_) => {}
            }
        }
    }

    fn visit_class(&mut self, class: &mut ClassDef) {
        for method in &mut class.methods {
            self.visit_function(method);
        }
    }

    fn visit_event(&mut self, event: &EventDef) {
        self.check_args_have_hints(&event.args);
    }

    fn visit_global_assign(&mut self, assign: &mut Assign) {
        let ty = self.visit_expr(&mut assign.value);
        self.symbols.global_variables.insert(
            assign.target.clone(),
            Variable {
                name: assign.target.clone(),
                declared_type: ty,
                is_argument: false,
            },
        );
    }

    fn visit_function(&mut self, function: &mut FunctionDef) {
        self.check_args_have_hints(&function.args);

        let Some(method) = self.symbols.methods.get(&function.name) else {
            // A function with no registered symbol is itself a bug in the
            // external symbol-table builder, not something this analyser
            // can meaningfully diagnose per-statement; skip its body.
            debug!("skipping body of unregistered function '{}'", function.name);
            return;
        };
        let return_type = method.return_type.clone();
        self.current_method = Some(function.name.clone());

        for stmt in &mut function.body {
            self.visit_stmt(stmt, &return_type);
        }

        self.current_method = None;
    }

    fn declare_local(&mut self, name: &std::sync::Arc<str>, ty: Type, pos: Position) {
        let Some(method_name) = self.current_method.clone() else {
            return;
        };
        let Some(method) = self.symbols.methods.get_mut(&method_name) else {
            return;
        };
        if method.arguments.iter().any(|a| &a.name == name) {
            self.error(
                pos,
                DiagnosticKind::NameShadowing {
                    symbol_id: name.to_string(),
                },
            );
            return;
        }
        match method.locals.get(name) {
            Some(existing) if existing.declared_type != ty => {
                self.error(
                    pos,
                    DiagnosticKind::RedeclaredSymbol {
                        symbol_id: name.to_string(),
                    },
                );
            }
            Some(_) => {}
            None => {
                method.locals.insert(
                    name.clone(),
                    Variable {
                        name: name.clone(),
                        declared_type: ty,
                        is_argument: false,
                    },
                );
            }
        }
    }

    fn local_type(&self, name: &str) -> Option<Type> {
        let method_name = self.current_method.as_ref()?;
        let method = self.symbols.methods.get(method_name)?;
        method
            .arguments
            .iter()
            .find(|a| a.name.as_ref() == name)
            .or_else(|| method.locals.get(name))
            .map(|v| v.declared_type.clone())
    }

    fn visit_stmt(&mut self, stmt: &mut Stmt, return_type: &Type) {
        match stmt {
            Stmt::Assign(assign) => {
                let ty = self.visit_expr(&mut assign.value);
                self.declare_local(&assign.target, ty, assign.pos);
            }
            Stmt::MultiAssign { pos } => {
                self.error(
                    *pos,
                    DiagnosticKind::NotSupportedOperation {
                        operation: "Multiple variable assignments".to_string(),
                    },
                );
            }
            Stmt::Return { pos, value } => self.visit_return(*pos, value, return_type),
            Stmt::Expr(expr) => {
                self.visit_expr(expr);
            }
            Stmt::If {
                test, body, orelse, ..
            } => {
                self.visit_expr(test);
                for s in body {
                    self.visit_stmt(s, return_type);
                }
                for s in orelse {
                    self.visit_stmt(s, return_type);
                }
            }
            Stmt::While { test, body, .. } => {
                self.visit_expr(test);
                for s in body {
                    self.visit_stmt(s, return_type);
                }
            }
            Stmt::For {
                target, iter, body, pos,
            } => {
                let element_type = self
                    .visit_expr(iter)
                    .element_type()
                    .unwrap_or_else(Type::any);
                self.declare_local(target, element_type, *pos);
                for s in body {
                    self.visit_stmt(s, return_type);
                }
            }
            Stmt::Assert { test, .. } => {
                self.visit_expr(test);
            }
            Stmt::Raise { exc, .. } => {
                if let Some(exc) = exc {
                    self.visit_expr(exc);
                }
            }
            Stmt::Pass => {}
        }
    }

    /// Mirrors `visit_Return`: a tuple value is `TooManyReturns`; a value
    /// with no declared return type is `TypeHintMissing`; no value against
    /// a declared non-`None` return type is `MismatchedTypes`.
    fn visit_return(&mut self, pos: Position, value: &mut Option<Expr>, return_type: &Type) {
        match value {
            Some(Expr::Tuple { .. }) => {
                let method_id = self.current_method.as_deref().unwrap_or("<unknown>").to_string();
                self.error(pos, DiagnosticKind::TooManyReturns { method_id });
            }
            Some(expr) => {
                let actual = self.visit_expr(expr);
                if return_type.is_none() {
                    let symbol_id = self.current_method.as_deref().unwrap_or("<unknown>").to_string();
                    self.error(pos, DiagnosticKind::TypeHintMissing { symbol_id });
                } else if !return_type.accepts(&actual) {
                    self.error(
                        pos,
                        DiagnosticKind::MismatchedTypes {
                            expected: return_type.identifier(),
                            actual: actual.identifier(),
                        },
                    );
                }
            }
            None => {
                if !return_type.is_none() {
                    self.error(
                        pos,
                        DiagnosticKind::MismatchedTypes {
                            expected: return_type.identifier(),
                            actual: Type::none().identifier(),
                        },
                    );
                }
            }
        }
    }

    /// Returns the static type of `expr`, rewriting `BinOp`/`UnaryOp`/
    /// `Compare` nodes in place with their resolved operation as a side
    /// effect — matching `visit_BinOp`'s `bin_op.op = operation`.
    fn visit_expr(&mut self, expr: &mut Expr) -> Type {
        match expr {
            Expr::Num { .. } => Type::int(),
            Expr::Str { .. } => Type::str(),
            Expr::Bytes { .. } => Type::bytes(),
            Expr::Bool { .. } => Type::bool(),
            Expr::None_ { .. } => Type::none(),
            Expr::Name { pos, id } => self.visit_name(*pos, id),
            Expr::BinOp {
                pos,
                op,
                left,
                right,
                resolved,
            } => self.visit_binop(*pos, *op, left, right, resolved),
            Expr::BoolOp { values, .. } => {
                let mut result = Type::bool();
                for value in values {
                    result = self.visit_expr(value);
                }
                result
            }
            Expr::Compare { pos, left, rest } => self.visit_compare(*pos, left, rest),
            Expr::UnaryOp {
                pos,
                op,
                operand,
                resolved,
            } => self.visit_unaryop(*pos, *op, operand, resolved),
            Expr::Call { pos, func, args } => self.visit_call(*pos, func, args),
            Expr::Attribute { value, .. } => {
                self.visit_expr(value);
                Type::any()
            }
            Expr::Index { pos, value, index } => self.visit_index(*pos, value, index),
            Expr::Slice { value, lower, upper, .. } => {
                let ty = self.visit_expr(value);
                if let Some(lower) = lower {
                    self.visit_expr(lower);
                }
                if let Some(upper) = upper {
                    self.visit_expr(upper);
                }
                ty
            }
            Expr::List { elements, .. } => {
                let element_type = elements
                    .first_mut()
                    .map(|e| self.visit_expr(e))
                    .unwrap_or_else(Type::any);
                for element in elements.iter_mut().skip(1) {
                    self.visit_expr(element);
                }
                Type::sequence(element_type)
            }
            Expr::Dict { keys, values, .. } => {
                let key_type = keys.first_mut().map(|e| self.visit_expr(e)).unwrap_or_else(Type::any);
                let value_type = values
                    .first_mut()
                    .map(|e| self.visit_expr(e))
                    .unwrap_or_else(Type::any);
                for key in keys.iter_mut().skip(1) {
                    self.visit_expr(key);
                }
                for value in values.iter_mut().skip(1) {
                    self.visit_expr(value);
                }
                Type::mapping(key_type, value_type)
            }
            Expr::Tuple { elements, .. } => {
                for element in elements {
                    self.visit_expr(element);
                }
                Type::any()
            }
        }
    }

    fn visit_name(&mut self, pos: Position, id: &str) -> Type {
        if let Some(ty) = self.local_type(id) {
            return ty;
        }
        if let Some(symbol) = self.symbols.resolve_global(id) {
            return symbol.declared_type();
        }
        // A bare reference to a built-in family or interop package (e.g.
        // `Storage` as the receiver of `Storage.get(...)`) carries no
        // scalar type of its own; it only matters as a call target, which
        // `visit_call` resolves directly rather than through this path.
        if self.builtins.and_then(|b| b.get(id)).is_some() {
            return Type::any();
        }
        self.error(
            pos,
            DiagnosticKind::UnresolvedReference {
                symbol_id: id.to_string(),
            },
        );
        Type::none()
    }

    fn visit_index(&mut self, pos: Position, value: &mut Expr, index: &mut Expr) -> Type {
        let value_type = self.visit_expr(value);
        self.visit_expr(index);
        if !value_type.capabilities().is_sequence {
            self.error(
                pos,
                DiagnosticKind::NotSupportedOperation {
                    operation: "[]".to_string(),
                },
            );
            return Type::none();
        }
        value_type.element_type().unwrap_or_else(Type::any)
    }

    fn visit_binop(
        &mut self,
        pos: Position,
        op: Operator,
        left: &mut Expr,
        right: &mut Expr,
        resolved: &mut Option<operation::BinaryOperation>,
    ) -> Type {
        let left_type = self.visit_expr(left);
        let right_type = self.visit_expr(right);
        match operation::lookup_binary(op, &left_type, &right_type) {
            Some(operation) => {
                let result = operation.result.clone();
                *resolved = Some(operation);
                result
            }
            None => {
                self.report_binop_failure(pos, op, &left_type, &right_type);
                Type::none()
            }
        }
    }

    /// `Div`/`Pow` are recognised operators with no lowering in the
    /// current subset (Open Question (b)): reported as
    /// `NotSupportedOperation` even when both operand types are otherwise
    /// correct, distinguishing "known but unimplemented" from "wrong
    /// types entirely".
    fn report_binop_failure(&mut self, pos: Position, op: Operator, left: &Type, right: &Type) {
        let int = Type::int();
        if matches!(op, Operator::Div | Operator::Pow) && *left == int && *right == int {
            self.error(
                pos,
                DiagnosticKind::NotSupportedOperation {
                    operation: op.symbol().to_string(),
                },
            );
            return;
        }
        if left == right {
            self.error(
                pos,
                DiagnosticKind::NotSupportedOperation {
                    operation: op.symbol().to_string(),
                },
            );
        } else {
            self.error(
                pos,
                DiagnosticKind::MismatchedTypes {
                    expected: left.identifier(),
                    actual: right.identifier(),
                },
            );
        }
    }

    fn visit_unaryop(
        &mut self,
        pos: Position,
        op: Operator,
        operand: &mut Expr,
        resolved: &mut Option<operation::UnaryOperation>,
    ) -> Type {
        let operand_type = self.visit_expr(operand);
        match operation::lookup_unary(op, &operand_type) {
            Some(operation) => {
                let result = operation.result.clone();
                *resolved = Some(operation);
                result
            }
            None => {
                self.error(
                    pos,
                    DiagnosticKind::NotSupportedOperation {
                        operation: op.symbol().to_string(),
                    },
                );
                Type::none()
            }
        }
    }

    /// `a < b < c` style chains are rejected outright: the VM has no
    /// chained-comparison primitive, so anything past a single
    /// `(operator, comparator)` pair is `NotSupportedOperation`
    /// (SPEC_FULL.md §4.1), not type-checked further.
    fn visit_compare(
        &mut self,
        pos: Position,
        left: &mut Expr,
        rest: &mut [(Operator, Expr, Option<operation::BinaryOperation>)],
    ) -> Type {
        if rest.len() > 1 {
            self.error(
                pos,
                DiagnosticKind::NotSupportedOperation {
                    operation: "chained comparison".to_string(),
                },
            );
            return Type::bool();
        }
        let left_type = self.visit_expr(left);
        let Some((op, right, resolved)) = rest.first_mut() else {
            return Type::bool();
        };
        let right_type = self.visit_expr(right);
        match operation::lookup_binary(*op, &left_type, &right_type) {
            Some(operation) => {
                let result = operation.result.clone();
                *resolved = Some(operation);
                result
            }
            None => {
                self.report_binop_failure(pos, *op, &left_type, &right_type);
                Type::bool()
            }
        }
    }

    fn visit_call(&mut self, pos: Position, func: &mut Expr, args: &mut [Expr]) -> Type {
        let arg_types: Vec<Type> = args.iter_mut().map(|a| self.visit_expr(a)).collect();

        match func {
            Expr::Name { id, .. } => {
                let name = id.clone();

                if let Some(method) = self.symbols.methods.get(name.as_ref()) {
                    let expected = method.argument_count();
                    let return_type = method.return_type.clone();
                    if args.len() < expected {
                        let missing = &method.arguments[args.len()];
                        self.error(
                            pos,
                            DiagnosticKind::UnfilledArgument {
                                method_id: name.to_string(),
                                argument_id: missing.name.to_string(),
                            },
                        );
                    } else if args.len() > expected {
                        self.error(
                            pos,
                            DiagnosticKind::UnexpectedArgument {
                                method_id: name.to_string(),
                                argument_id: format!("#{}", expected + 1),
                            },
                        );
                    }
                    for (i, arg_ty) in arg_types.iter().enumerate().take(expected.min(args.len())) {
                        let declared = &method.arguments[i].declared_type;
                        if !declared.accepts(arg_ty) {
                            self.error(
                                pos,
                                DiagnosticKind::MismatchedTypes {
                                    expected: declared.identifier(),
                                    actual: arg_ty.identifier(),
                                },
                            );
                        }
                    }
                    self.calls.insert(
                        (pos.line, pos.col),
                        ResolvedCall::UserMethod {
                            name,
                            return_type: return_type.clone(),
                        },
                    );
                    return return_type;
                }

                if let Some(callable) = self.resolve_builtin_call(&name, &arg_types) {
                    let return_type = callable.return_type.clone();
                    self.calls.insert((pos.line, pos.col), ResolvedCall::Builtin(callable));
                    return return_type;
                }

                if let Some(event) = self.symbols.events.get(name.as_ref()) {
                    let expected = event.arguments.len();
                    if args.len() < expected {
                        let missing = &event.arguments[args.len()];
                        self.error(
                            pos,
                            DiagnosticKind::UnfilledArgument {
                                method_id: name.to_string(),
                                argument_id: missing.name.to_string(),
                            },
                        );
                    } else if args.len() > expected {
                        self.error(
                            pos,
                            DiagnosticKind::UnexpectedArgument {
                                method_id: name.to_string(),
                                argument_id: format!("#{}", expected + 1),
                            },
                        );
                    }
                    self.calls.insert((pos.line, pos.col), ResolvedCall::Event(name));
                    return Type::none();
                }

                self.error(
                    pos,
                    DiagnosticKind::UnresolvedReference {
                        symbol_id: name.to_string(),
                    },
                );
                Type::none()
            }
            // Interop package calls (`Storage.get(key)`, `Runtime.notify(...)`)
            // resolve through the same built-in catalogue as a bare name,
            // one level deeper — the receiver is never type-checked as an
            // ordinary expression since packages carry no runtime value.
            Expr::Attribute { value, attr, .. } => {
                let Expr::Name { id: package, .. } = value.as_ref() else {
                    self.visit_expr(value);
                    return Type::any();
                };
                if let Some(callable) = self.resolve_package_call(package, attr, &arg_types) {
                    let return_type = callable.return_type.clone();
                    self.calls.insert((pos.line, pos.col), ResolvedCall::Builtin(callable));
                    return return_type;
                }
                self.error(
                    pos,
                    DiagnosticKind::UnresolvedOperation {
                        operation: attr.to_string(),
                        type_id: package.to_string(),
                    },
                );
                Type::any()
            }
            _ => {
                self.visit_expr(func);
                Type::any()
            }
        }
    }

    fn resolve_builtin_call(&self, name: &str, arg_types: &[Type]) -> Option<BuiltinCallable> {
        match self.builtins?.get(name)? {
            Symbol::BuiltinFamily(family) => family.build(arg_types),
            _ => None,
        }
    }

    fn resolve_package_call(&self, package: &str, attr: &str, arg_types: &[Type]) -> Option<BuiltinCallable> {
        match self.builtins?.get(package)? {
            Symbol::Package(pkg) => match pkg.members.get(attr)? {
                Symbol::BuiltinFamily(family) => family.build(arg_types),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;

    fn pos() -> Position {
        Position { line: 3, col: 4 }
    }

    fn method(name: &str, args: Vec<Variable>, return_type: Type) -> Method {
        Method {
            name: name.into(),
            arguments: args,
            return_type,
            locals: IndexMap::new(),
            is_public: true,
            is_metadata: false,
            is_main: false,
        }
    }

    #[test]
    fn missing_argument_type_hint_is_reported() {
        let mut symbols = SymbolTable::new();
        symbols
            .methods
            .insert("main".into(), method("main", vec![], Type::none()));
        let mut module = Module {
            functions: vec![FunctionDef {
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
            classes: vec![],
            events: vec![],
            globals: vec![],
        };
        let (diagnostics, _) = TypeAnalyser::new(&mut symbols).analyse(&mut module);
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::TypeHintMissing { .. })));
    }

    #[test]
    fn returning_a_value_with_no_return_hint_is_reported() {
        let mut symbols = SymbolTable::new();
        symbols
            .methods
            .insert("main".into(), method("main", vec![], Type::none()));
        let mut module = Module {
            functions: vec![FunctionDef {
                pos: pos(),
                name: "main".into(),
                args: vec![],
                return_hint: None,
                body: vec![Stmt::Return {
                    pos: pos(),
                    value: Some(Expr::Num { pos: pos(), value: 1 }),
                }],
                is_public: true,
                is_event: false,
                is_metadata: false,
            }],
            classes: vec![],
            events: vec![],
            globals: vec![],
        };
        let (diagnostics, _) = TypeAnalyser::new(&mut symbols).analyse(&mut module);
        assert!(diagnostics.has_errors());
    }

    #[test]
    fn binop_resolution_is_attached_to_the_ast_node() {
        let mut symbols = SymbolTable::new();
        symbols
            .methods
            .insert("main".into(), method("main", vec![], Type::int()));
        let mut module = Module {
            functions: vec![FunctionDef {
                pos: pos(),
                name: "main".into(),
                args: vec![],
                return_hint: None,
                body: vec![Stmt::Return {
                    pos: pos(),
                    value: Some(Expr::BinOp {
                        pos: pos(),
                        op: Operator::Add,
                        left: Box::new(Expr::Num { pos: pos(), value: 1 }),
                        right: Box::new(Expr::Num { pos: pos(), value: 2 }),
                        resolved: None,
                    }),
                }],
                is_public: true,
                is_event: false,
                is_metadata: false,
            }],
            classes: vec![],
            events: vec![],
            globals: vec![],
        };
        let (diagnostics, _) = TypeAnalyser::new(&mut symbols).analyse(&mut module);
        assert!(!diagnostics.has_errors());
        let Stmt::Return {
            value: Some(Expr::BinOp { resolved, .. }),
            ..
        } = &module.functions[0].body[0]
        else {
            panic!("expected a resolved BinOp");
        };
        assert!(resolved.is_some());
    }

    #[test]
    fn division_is_reported_as_not_supported_not_mismatched_types() {
        let mut symbols = SymbolTable::new();
        symbols
            .methods
            .insert("main".into(), method("main", vec![], Type::int()));
        let mut module = Module {
            functions: vec![FunctionDef {
                pos: pos(),
                name: "main".into(),
                args: vec![],
                return_hint: None,
                body: vec![Stmt::Return {
                    pos: pos(),
                    value: Some(Expr::BinOp {
                        pos: pos(),
                        op: Operator::Div,
                        left: Box::new(Expr::Num { pos: pos(), value: 1 }),
                        right: Box::new(Expr::Num { pos: pos(), value: 2 }),
                        resolved: None,
                    }),
                }],
                is_public: true,
                is_event: false,
                is_metadata: false,
            }],
            classes: vec![],
            events: vec![],
            globals: vec![],
        };
        let (diagnostics, _) = TypeAnalyser::new(&mut symbols).analyse(&mut module);
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::NotSupportedOperation { .. })));
    }

    #[test]
    fn chained_comparison_is_rejected() {
        let mut symbols = SymbolTable::new();
        symbols
            .methods
            .insert("main".into(), method("main", vec![], Type::none()));
        let mut module = Module {
            functions: vec![FunctionDef {
                pos: pos(),
                name: "main".into(),
                args: vec![],
                return_hint: None,
                body: vec![Stmt::Expr(Expr::Compare {
                    pos: pos(),
                    left: Box::new(Expr::Num { pos: pos(), value: 1 }),
                    rest: vec![
                        (Operator::Lt, Expr::Num { pos: pos(), value: 2 }, None),
                        (Operator::Lt, Expr::Num { pos: pos(), value: 3 }, None),
                    ],
                })],
                is_public: true,
                is_event: false,
                is_metadata: false,
            }],
            classes: vec![],
            events: vec![],
            globals: vec![],
        };
        let (diagnostics, _) = TypeAnalyser::new(&mut symbols).analyse(&mut module);
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d.kind, DiagnosticKind::NotSupportedOperation { .. })));
    }
}
