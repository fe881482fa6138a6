//! The code generator: C2.
//!
//! Walks one method's (already type-checked) body and emits instructions
//! onto an [`InstructionMap`]. Runs only when the type analyser reported no
//! errors for the whole translation unit (§7) — callers are expected to
//! check `Diagnostics::has_errors` themselves before calling
//! [`MethodCodeGenerator::generate`].
//!
//! Slot numbering follows the source's convention: arguments occupy the
//! low slot indices, locals follow, and the six fast `LDARG0`..`LDARG6` /
//! `LDLOC0`..`LDLOC6` forms are used below slot 7, falling back to the
//! indexed `LDARG`/`LDLOC` forms above it.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::ast::{Assign, Expr, Stmt};
use crate::instmap::{Inst, InstructionMap};
use crate::opcode::OpCode;
use crate::operation::{self, Operator};
use crate::symbol::{Method, Variable};
use crate::typeanalyser::ResolvedCall;
use crate::types::Type;

/// Everything the code generator needs about names used in one method
/// body, keyed the same way the type analyser resolved them — this module
/// does no name resolution of its own.
pub struct CodegenContext<'a> {
    pub method: &'a Method,
    /// Slot index of each argument/local, in the order `Method::slots`
    /// yields them.
    pub slots: IndexMap<Arc<str>, (u16, Type)>,
    /// Static field index of each module-level global, in declaration
    /// order — the third of the three slot kinds name resolution can land
    /// on (argument, local, global); consulted only when a name misses
    /// `slots` entirely, since a method never shadows a global with a
    /// local of the same resolved identity (the analyser always declares
    /// an assignment target as a fresh local instead — §4.1's "no `global`
    /// keyword" design).
    pub globals: IndexMap<Arc<str>, (u16, Type)>,
    /// What every `Call` node in the whole translation unit resolved to,
    /// keyed by source position (line, col) and shared across every
    /// method's context — binary/unary operator resolutions live directly
    /// on the AST nodes instead (see `ast.rs`'s `BinOp`/`UnaryOp`/`Compare`
    /// `resolved` fields), but a call target is a symbol reference rather
    /// than a fixed operator, so it needs this side table. A `UserMethod`
    /// entry here only names the callee; its instruction handle is looked
    /// up (or deferred) at the call site via [`MethodCodeGenerator`]'s
    /// `entries`/`pending` state, since the callee may not be generated yet.
    pub calls: &'a IndexMap<(u32, u32), ResolvedCall>,
}

impl<'a> CodegenContext<'a> {
    pub fn new(
        method: &'a Method,
        calls: &'a IndexMap<(u32, u32), ResolvedCall>,
        globals: &IndexMap<Arc<str>, Variable>,
    ) -> Self {
        let mut slots = IndexMap::new();
        for (i, var) in method.slots().enumerate() {
            slots.insert(var.name.clone(), (i as u16, var.declared_type.clone()));
        }
        let globals = globals
            .iter()
            .enumerate()
            .map(|(i, (name, var))| (name.clone(), (i as u16, var.declared_type.clone())))
            .collect();
        CodegenContext {
            method,
            slots,
            globals,
            calls,
        }
    }

    fn slot_of(&self, name: &str) -> u16 {
        self.slots
            .get(name)
            .unwrap_or_else(|| panic!("codegen: unresolved slot '{name}' (analyser bug)"))
            .0
    }

    fn is_argument(&self, slot: u16) -> bool {
        (slot as usize) < self.method.argument_count()
    }

    /// The declared type of a name resolved through `slots` then `globals`,
    /// falling back to `Type::any()` for a name this context has no record
    /// of (unreachable from well-typed input, but kept total rather than
    /// panicking so a generator bug surfaces as a wrong type, not a crash).
    fn type_of(&self, name: &str) -> Type {
        self.slots
            .get(name)
            .or_else(|| self.globals.get(name))
            .map(|(_, ty)| ty.clone())
            .unwrap_or_else(Type::any)
    }
}

/// Emits one method's instructions onto a shared [`InstructionMap`],
/// threading the cross-method call patch-up state a whole translation
/// unit's worth of methods share (§4.2.4 "pending calls"): a method whose
/// callee hasn't been generated yet gets a reserved `CALL` placeholder
/// queued in `pending`, resolved once that callee's entry is known.
pub struct MethodCodeGenerator<'a, 'm, 'g> {
    ctx: &'a CodegenContext<'a>,
    map: &'m mut InstructionMap,
    entries: &'g mut IndexMap<Arc<str>, Inst>,
    pending: &'g mut Vec<(Inst, Arc<str>)>,
    /// A simulated operand stack of type descriptors, mirrored alongside
    /// every real emission. Used to pick a container-specific opcode at an
    /// index/slice site (string/bytes reads lower to `SUBSTR`, array reads
    /// to `PICKITEM`) and to assert, in debug builds, that every statement
    /// and every method body leaves it exactly as balanced as the real VM
    /// stack would be.
    stack: Vec<Type>,
}

impl<'a, 'm, 'g> MethodCodeGenerator<'a, 'm, 'g> {
    pub fn new(
        ctx: &'a CodegenContext<'a>,
        map: &'m mut InstructionMap,
        entries: &'g mut IndexMap<Arc<str>, Inst>,
        pending: &'g mut Vec<(Inst, Arc<str>)>,
    ) -> Self {
        MethodCodeGenerator {
            ctx,
            map,
            entries,
            pending,
            stack: Vec::new(),
        }
    }

    fn pop_type(&mut self) -> Type {
        self.stack
            .pop()
            .unwrap_or_else(|| panic!("codegen: simulated stack underflow (generator bug)"))
    }

    /// Emits the method prologue (`INITSLOT`, only when the method
    /// actually has locals or arguments — an entry with neither omits it,
    /// matching the VM convention of not wasting a byte on an empty
    /// frame) followed by the body, and returns the entry instruction.
    ///
    /// A body whose last statement already terminates (`return`/`raise`)
    /// needs no further `RET` appended (§4.2.6 "method boundary"); an empty
    /// body collapses to the single trailing `RET` the boundary rule
    /// always guarantees.
    pub fn generate(&mut self, body: &[Stmt]) -> Inst {
        let local_count = self.ctx.method.local_count();
        let arg_count = self.ctx.method.argument_count();
        let prologue = if local_count > 0 || arg_count > 0 {
            Some(
                self.map
                    .insert_with_bytes(OpCode::InitSlot, &[local_count as u8, arg_count as u8]),
            )
        } else {
            None
        };
        let body_start = self.map.next_index();

        let mut terminated = false;
        for stmt in body {
            terminated = self.emit_stmt(stmt);
        }
        debug_assert!(
            self.stack.is_empty(),
            "simulated stack must be empty at method end (property 5): {:?}",
            self.stack
        );
        if !terminated {
            self.map.insert(OpCode::Ret);
        }

        prologue.unwrap_or_else(|| {
            self.map
                .inst_at(body_start)
                .expect("generate always emits at least the trailing RET")
        })
    }

    /// Emits the static-field initializer block: `INITSSLOT(n)` followed by
    /// each module-level global's value expression and a store into its
    /// field slot, in declaration order, then a trailing `RET`. This is the
    /// body of the synthesized `_initialize` method a host invokes once
    /// before any public method runs, mirroring the real ABI's dedicated
    /// initializer entry rather than inlining global stores into every
    /// public method (§4.2 "module-level globals"). Callers construct this
    /// generator's [`CodegenContext`] against a placeholder method with no
    /// arguments or locals, so every name here resolves through `globals`.
    pub fn generate_static_initializer(&mut self, globals: &[Assign]) -> Inst {
        let count = self.ctx.globals.len();
        let prologue = if count > 0 {
            Some(self.map.insert_with_bytes(OpCode::InitSSlot, &[count as u8]))
        } else {
            None
        };
        let body_start = self.map.next_index();
        for assign in globals {
            self.emit_expr(&assign.value);
            let slot = *self.ctx.globals.get(assign.target.as_ref()).unwrap_or_else(|| {
                panic!("codegen: unresolved global '{}' (analyser bug)", assign.target)
            });
            self.emit_global_store(slot);
        }
        debug_assert!(
            self.stack.is_empty(),
            "simulated stack must be empty at the initializer's end (property 5): {:?}",
            self.stack
        );
        self.map.insert(OpCode::Ret);
        prologue.unwrap_or_else(|| {
            self.map
                .inst_at(body_start)
                .expect("generate_static_initializer always emits at least RET")
        })
    }

    /// Emits one statement, returning whether it always terminates
    /// execution of the method (`return`/`raise`) — used by [`Self::generate`]
    /// to decide whether the boundary `RET` is redundant.
    fn emit_stmt(&mut self, stmt: &Stmt) -> bool {
        let depth_before = self.stack.len();
        let terminated = match stmt {
            Stmt::Assign(assign) => {
                self.emit_assign(assign);
                false
            }
            Stmt::MultiAssign { .. } => {
                unreachable!("codegen: multi-assign reached codegen (analyser bug)")
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    self.emit_expr(value);
                    self.pop_type();
                }
                self.map.insert(OpCode::Ret);
                true
            }
            Stmt::Expr(expr) => {
                self.emit_expr(expr);
                if self.expr_pushes_value(expr) {
                    self.map.insert(OpCode::Drop);
                    self.pop_type();
                }
                false
            }
            Stmt::If {
                test, body, orelse, ..
            } => {
                self.emit_if(test, body, orelse);
                false
            }
            Stmt::While { test, body, .. } => {
                self.emit_while(test, body);
                false
            }
            Stmt::For {
                target, iter, body, ..
            } => {
                self.emit_for(target, iter, body);
                false
            }
            Stmt::Assert { test, .. } => {
                self.emit_expr(test);
                self.pop_type();
                self.map.insert(OpCode::Assert);
                false
            }
            Stmt::Raise { exc, .. } => {
                if let Some(exc) = exc {
                    self.emit_expr(exc);
                    self.pop_type();
                } else {
                    self.map.insert_with_bytes(OpCode::PushData1, &[0]);
                }
                self.map.insert(OpCode::Throw);
                true
            }
            Stmt::Pass => false,
        };
        debug_assert_eq!(
            self.stack.len(),
            depth_before,
            "simulated stack must return to its pre-statement depth (property 5)"
        );
        terminated
    }

    fn emit_assign(&mut self, assign: &Assign) {
        self.emit_expr(&assign.value);
        self.emit_store(&assign.target);
    }

    fn emit_store(&mut self, name: &str) {
        self.pop_type();
        let slot = self.ctx.slot_of(name);
        let (fast, wide) = if self.ctx.is_argument(slot) {
            (
                [
                    OpCode::StArg0,
                    OpCode::StArg1,
                    OpCode::StArg2,
                    OpCode::StArg3,
                    OpCode::StArg4,
                    OpCode::StArg5,
                    OpCode::StArg6,
                ],
                OpCode::StArg,
            )
        } else {
            (
                [
                    OpCode::StLoc0,
                    OpCode::StLoc1,
                    OpCode::StLoc2,
                    OpCode::StLoc3,
                    OpCode::StLoc4,
                    OpCode::StLoc5,
                    OpCode::StLoc6,
                ],
                OpCode::StLoc,
            )
        };
        self.emit_slot_access(slot, fast, wide);
    }

    fn emit_load(&mut self, name: &str) {
        let Some(&(slot, _)) = self.ctx.slots.get(name) else {
            let global_slot = self
                .ctx
                .globals
                .get(name)
                .unwrap_or_else(|| panic!("codegen: unresolved name '{name}' (analyser bug)"))
                .0;
            self.emit_global_load(global_slot);
            return;
        };
        let (fast, wide) = if self.ctx.is_argument(slot) {
            (
                [
                    OpCode::LdArg0,
                    OpCode::LdArg1,
                    OpCode::LdArg2,
                    OpCode::LdArg3,
                    OpCode::LdArg4,
                    OpCode::LdArg5,
                    OpCode::LdArg6,
                ],
                OpCode::LdArg,
            )
        } else {
            (
                [
                    OpCode::LdLoc0,
                    OpCode::LdLoc1,
                    OpCode::LdLoc2,
                    OpCode::LdLoc3,
                    OpCode::LdLoc4,
                    OpCode::LdLoc5,
                    OpCode::LdLoc6,
                ],
                OpCode::LdLoc,
            )
        };
        self.emit_slot_access(slot, fast, wide);
    }

    /// `LDSFLD0` below slot 1, else the indexed `LDSFLD` — static fields
    /// only have the one fast form, unlike the seven-wide argument/local
    /// families.
    fn emit_global_load(&mut self, slot: u16) {
        if slot == 0 {
            self.map.insert(OpCode::LdSFld0);
        } else {
            self.map.insert_with_bytes(OpCode::LdSFld, &[slot as u8]);
        }
    }

    fn emit_global_store(&mut self, slot: u16) {
        self.pop_type();
        if slot == 0 {
            self.map.insert(OpCode::StSFld0);
        } else {
            self.map.insert_with_bytes(OpCode::StSFld, &[slot as u8]);
        }
    }

    fn emit_slot_access(&mut self, slot: u16, fast: [OpCode; 7], wide: OpCode) {
        let local_slot = if self.ctx.is_argument(slot) {
            slot
        } else {
            slot - self.ctx.method.argument_count() as u16
        };
        if (local_slot as usize) < fast.len() {
            self.map.insert(fast[local_slot as usize]);
        } else {
            self.map
                .insert_with_bytes(wide, &[local_slot as u8]);
        }
    }

    fn emit_if(&mut self, test: &Expr, body: &[Stmt], orelse: &[Stmt]) {
        self.emit_expr(test);
        self.pop_type();
        let branch_to_else = self.map.reserve();
        for stmt in body {
            self.emit_stmt(stmt);
        }
        if orelse.is_empty() {
            let after = self.map.insert_marker();
            self.map.patch_branch(branch_to_else, OpCode::JmpIfNot, after);
        } else {
            let branch_over_else = self.map.reserve();
            let else_start = self.map.insert_marker();
            self.map
                .patch_branch(branch_to_else, OpCode::JmpIfNot, else_start);
            for stmt in orelse {
                self.emit_stmt(stmt);
            }
            let after = self.map.insert_marker();
            self.map
                .patch_branch(branch_over_else, OpCode::Jmp, after);
        }
    }

    /// Lowers `while test: body` as a test-at-bottom loop — an
    /// unconditional jump to the test, the body, the test, and a
    /// conditional jump back to the body's first instruction — rather than
    /// a header check, matching SPEC_FULL.md §4.2.3's mandated shape
    /// (every loop re-tests after the body, never before the first
    /// iteration's jump into it).
    fn emit_while(&mut self, test: &Expr, body: &[Stmt]) {
        let jump_to_test = self.map.reserve();
        let body_index = self.map.next_index();
        for stmt in body {
            self.emit_stmt(stmt);
        }
        let test_index = self.map.next_index();
        self.emit_expr(test);
        self.pop_type();
        let body_start = self
            .map
            .inst_at(body_index)
            .expect("a while loop's body-or-test always emits at least one instruction");
        let test_start = self
            .map
            .inst_at(test_index)
            .expect("emit_expr always emits at least one instruction");
        self.map.patch_branch(jump_to_test, OpCode::Jmp, test_start);
        self.map.insert_branch(OpCode::JmpIf, body_start);
    }

    /// Lowers `for x in xs: ...` as an index-driven loop: no VM iterator
    /// primitive exists, so iteration is index/`PICKITEM`/increment over
    /// the sequence, matching how the original targets a stack machine
    /// with no native for-each opcode. Shares `emit_while`'s test-at-bottom
    /// shape.
    fn emit_for(&mut self, target: &str, iter: &Expr, body: &[Stmt]) {
        let iter_ty = self.emit_expr(iter);
        self.pop_type();
        self.map.insert(OpCode::Push0); // index local, pushed once, kept under the sequence

        let jump_to_test = self.map.reserve();
        let body_index = self.map.next_index();

        self.map.insert(OpCode::Over); // [seq, idx] -> [seq, idx, seq]
        self.map.insert(OpCode::Over); // -> [seq, idx, seq, idx]
        self.map.insert(OpCode::PickItem); // -> [seq, idx, element]
        self.stack.push(iter_ty.element_type().unwrap_or_else(Type::any));
        self.emit_store(target);

        for stmt in body {
            self.emit_stmt(stmt);
        }

        self.map.insert(OpCode::Inc); // idx += 1, consuming/replacing top

        let test_index = self.map.next_index();
        self.map.insert(OpCode::Over); // [seq, idx] -> [seq, idx, seq]
        self.map.insert(OpCode::Over); // -> [seq, idx, seq, idx]
        self.map.insert(OpCode::Over); // -> [seq, idx, seq, idx, seq]
        self.map.insert(OpCode::Size); // -> [seq, idx, seq, idx, len]
        self.map.insert(OpCode::Lt); // idx < len? -> [seq, idx, continue]

        let body_start = self
            .map
            .inst_at(body_index)
            .expect("a for loop's body always emits at least the element load");
        let test_start = self
            .map
            .inst_at(test_index)
            .expect("the index test always emits at least one instruction");
        self.map.patch_branch(jump_to_test, OpCode::Jmp, test_start);
        self.map.insert_branch(OpCode::JmpIf, body_start);

        self.map.insert(OpCode::Drop); // discard idx
        self.map.insert(OpCode::Drop); // discard seq
    }

    /// Emits `expr`, threading its static type through the simulated stack
    /// alongside the real one (property 5): every arm returns the type it
    /// produces, and the result is pushed onto `self.stack` exactly when
    /// [`Self::expr_pushes_value`] says the real VM stack gains a value.
    fn emit_expr(&mut self, expr: &Expr) -> Type {
        let ty = match expr {
            Expr::Num { value, .. } => {
                self.emit_int_literal(*value);
                Type::int()
            }
            Expr::Bool { value, .. } => {
                self.map.insert(if *value { OpCode::PushT } else { OpCode::PushF });
                Type::bool()
            }
            Expr::None_ { .. } => {
                self.map.insert(OpCode::PushNull);
                Type::none()
            }
            Expr::Str { value, .. } => {
                self.emit_data_literal(value.as_bytes());
                Type::str()
            }
            Expr::Bytes { value, .. } => {
                self.emit_data_literal(value);
                Type::bytes()
            }
            Expr::Name { id, .. } => {
                self.emit_load(id);
                self.ctx.type_of(id)
            }
            Expr::BinOp {
                left, right, resolved, ..
            } => self.emit_binop(left, right, resolved),
            Expr::BoolOp { op, values, .. } => self.emit_boolop(*op, values),
            Expr::Compare { left, rest, .. } => self.emit_compare(left, rest),
            Expr::UnaryOp {
                operand, resolved, ..
            } => self.emit_unaryop(operand, resolved),
            Expr::Index { value, index, .. } => self.emit_index(value, index),
            Expr::Slice {
                value, lower, upper, ..
            } => self.emit_slice(value, lower.as_deref(), upper.as_deref()),
            Expr::List { elements, .. } => self.emit_list(elements),
            Expr::Dict { keys, values, .. } => self.emit_dict(keys, values),
            Expr::Call { .. } | Expr::Attribute { .. } => {
                // Resolved call targets are threaded in by the caller via
                // `CodegenContext::calls` once the analyser has decided
                // what `func` refers to; see `emit_expr_call`.
                self.emit_expr_call(expr)
            }
            Expr::Tuple { .. } => {
                panic!("codegen: bare tuple expression reached codegen (analyser bug)")
            }
        };
        if self.expr_pushes_value(expr) {
            self.stack.push(ty.clone());
        }
        ty
    }

    /// A string/bytes read lowers to `SUBSTR` with an explicit length of
    /// one (there is no VM primitive for a single-character read), while an
    /// array read uses `PICKITEM` directly — the container's static type
    /// picks the opcode, since the VM itself has no generic "index into
    /// anything" instruction.
    fn emit_index(&mut self, value: &Expr, index: &Expr) -> Type {
        let value_ty = self.emit_expr(value);
        self.pop_type();
        self.emit_expr(index);
        self.pop_type();
        if value_ty.is_str() || value_ty == Type::bytes() {
            self.emit_int_literal(1);
            self.map.insert(OpCode::Substr);
            value_ty
        } else {
            self.map.insert(OpCode::PickItem);
            value_ty.element_type().unwrap_or_else(Type::any)
        }
    }

    fn emit_list(&mut self, elements: &[Expr]) -> Type {
        let mut elem_ty = Type::any();
        for (i, element) in elements.iter().enumerate() {
            let t = self.emit_expr(element);
            self.pop_type();
            if i == 0 {
                elem_ty = t;
            }
        }
        self.emit_int_literal(elements.len() as i128);
        self.map.insert(OpCode::Pack);
        Type::sequence(elem_ty)
    }

    fn emit_dict(&mut self, keys: &[Expr], values: &[Expr]) -> Type {
        self.map.insert(OpCode::NewMap);
        let mut key_ty = Type::any();
        let mut val_ty = Type::any();
        for (i, (key, value)) in keys.iter().zip(values).enumerate() {
            self.map.insert(OpCode::Dup);
            let kt = self.emit_expr(key);
            self.pop_type();
            let vt = self.emit_expr(value);
            self.pop_type();
            self.map.insert(OpCode::SetItem);
            if i == 0 {
                key_ty = kt;
                val_ty = vt;
            }
        }
        Type::mapping(key_ty, val_ty)
    }

    /// Whether a bare expression statement leaves something on the stack
    /// that needs discarding. Every expression kind other than a call
    /// always pushes exactly one value; a call can resolve to a `None`
    /// return (a user method with no return hint, a `Storage.put`-style
    /// builtin, or an event notification), which pushes nothing at all.
    fn expr_pushes_value(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Call { .. } | Expr::Attribute { .. } => {
                let pos = expr.pos();
                match self.ctx.calls.get(&(pos.line, pos.col)) {
                    Some(ResolvedCall::UserMethod { return_type, .. }) => !return_type.is_none(),
                    Some(ResolvedCall::Builtin(callable)) => !callable.return_type.is_none(),
                    Some(ResolvedCall::Event(_)) => false,
                    None => true,
                }
            }
            _ => true,
        }
    }

    fn emit_expr_call(&mut self, expr: &Expr) -> Type {
        let pos = expr.pos();
        let Expr::Call { func: _, args, .. } = expr else {
            return Type::none();
        };
        for arg in args {
            self.emit_expr(arg);
            self.pop_type();
        }
        match self.ctx.calls.get(&(pos.line, pos.col)) {
            Some(ResolvedCall::UserMethod { name, return_type }) => {
                match self.entries.get(name.as_ref()) {
                    Some(entry) => {
                        self.map.insert_branch(OpCode::Call, *entry);
                    }
                    None => {
                        // The callee hasn't been generated yet (it's declared
                        // later in the module, or calls back into this one) —
                        // reserve a placeholder and patch it once every method
                        // has an entry, exactly like a forward branch within
                        // one method (§4.2.4).
                        let placeholder = self.map.reserve();
                        self.pending.push((placeholder, name.clone()));
                    }
                }
                return_type.clone()
            }
            Some(ResolvedCall::Builtin(callable)) => {
                if let Some(syscall) = &callable.syscall {
                    self.emit_data_literal(syscall.as_bytes());
                    self.map.insert(OpCode::Syscall);
                } else if let Some(opcode) = inline_builtin_opcode(&callable.name) {
                    self.map.insert(opcode);
                } else {
                    panic!(
                        "codegen: builtin '{}' has neither a syscall nor a known inline opcode",
                        callable.name
                    );
                }
                callable.return_type.clone()
            }
            Some(ResolvedCall::Event(name)) => {
                // args are already consumed by the loop above; pack their
                // count into a single array argument, then notify under the
                // declared event name.
                self.emit_int_literal(args.len() as i128);
                self.map.insert(OpCode::Pack);
                self.emit_data_literal(name.as_bytes());
                self.emit_data_literal(b"System.Runtime.Notify");
                self.map.insert(OpCode::Syscall);
                Type::none()
            }
            None => panic!("codegen: call at {}:{} was not resolved (analyser bug)", pos.line, pos.col),
        }
    }

    /// A bounded slice (`s[lower:upper]`) re-evaluates `lower` a second
    /// time rather than duplicating it with `OVER`: `SUBSTR` takes
    /// `(value, start, length)`, and `length = upper - lower` needs `lower`
    /// on the stack again right before the subtraction.
    fn emit_slice(&mut self, value: &Expr, lower: Option<&Expr>, upper: Option<&Expr>) -> Type {
        let value_ty = self.emit_expr(value);
        self.pop_type();
        match (lower, upper) {
            (Some(lower), Some(upper)) => {
                self.emit_expr(lower);
                self.pop_type();
                self.emit_expr(upper);
                self.pop_type();
                self.emit_expr(lower);
                self.pop_type();
                self.map.insert(OpCode::Sub);
                self.map.insert(OpCode::Substr);
            }
            (Some(lower), None) => {
                self.emit_expr(lower);
                self.pop_type();
                self.map.insert(OpCode::Right);
            }
            (None, Some(upper)) => {
                self.emit_expr(upper);
                self.pop_type();
                self.map.insert(OpCode::Left);
            }
            (None, None) => {}
        }
        value_ty
    }

    /// `and`/`or` short-circuit: the right operand is never evaluated once
    /// the left already determines the boolean result, lowered as a
    /// `JMPIFNOT`/`JMPIF` guarding a `DROP` + right-operand pair rather
    /// than always evaluating both sides and `AND`/`OR`-ing the booleans.
    fn emit_boolop(&mut self, op: Operator, values: &[Expr]) -> Type {
        debug_assert!(values.len() >= 2);
        let mut result = self.emit_expr(&values[0]);
        for next in &values[1..] {
            self.map.insert(OpCode::Dup);
            let branch = self.map.reserve();
            self.map.insert(OpCode::Drop);
            self.pop_type();
            result = self.emit_expr(next);
            let after = self.map.insert_marker();
            let guard = match op {
                Operator::And => OpCode::JmpIfNot,
                Operator::Or => OpCode::JmpIf,
                _ => unreachable!("emit_boolop called with non-boolean operator"),
            };
            self.map.patch_branch(branch, guard, after);
        }
        // The final `emit_expr` above left its result on the simulated
        // stack; the caller's `emit_expr` pushes the boolop's own result
        // once more, matching every other compound expression's net-zero
        // internal bookkeeping.
        self.pop_type();
        result
    }

    fn emit_compare(&mut self, left: &Expr, rest: &[(Operator, Expr, Option<operation::BinaryOperation>)]) -> Type {
        // Chained comparisons (`a < b < c`) are rejected by the analyser
        // before code generation ever sees them (SPEC_FULL.md §4.1).
        assert_eq!(rest.len(), 1, "codegen: chained comparison reached codegen (analyser bug)");
        let (_, right, resolved) = &rest[0];
        self.emit_expr(left);
        self.pop_type();
        self.emit_expr(right);
        self.pop_type();
        self.emit_resolved_binary(resolved)
    }

    fn emit_binop(&mut self, left: &Expr, right: &Expr, resolved: &Option<operation::BinaryOperation>) -> Type {
        self.emit_expr(left);
        self.pop_type();
        self.emit_expr(right);
        self.pop_type();
        self.emit_resolved_binary(resolved)
    }

    fn emit_unaryop(&mut self, operand: &Expr, resolved: &Option<operation::UnaryOperation>) -> Type {
        self.emit_expr(operand);
        self.pop_type();
        match resolved {
            Some(resolved) => {
                for opcode in resolved.opcodes.iter() {
                    self.map.insert(*opcode);
                }
                resolved.result.clone()
            }
            None => panic!("codegen: unresolved unary operator reached codegen (analyser bug)"),
        }
    }

    fn emit_resolved_binary(&mut self, resolved: &Option<operation::BinaryOperation>) -> Type {
        match resolved {
            Some(resolved) => {
                for opcode in resolved.opcodes.iter() {
                    self.map.insert(*opcode);
                }
                resolved.result.clone()
            }
            None => panic!("codegen: unresolved binary operator reached codegen (analyser bug)"),
        }
    }

    /// Chooses the smallest literal encoding, matching the source's
    /// `Integer.get_byte_count` driven push selection: the seven fast
    /// `PUSH<n>`/`PUSHM1` single-byte opcodes for `-1..=16`, otherwise
    /// `PUSHINT<8|16|32|64|128|256>` sized to the value's signed width.
    fn emit_int_literal(&mut self, value: i128) {
        let opcode = match value {
            -1 => Some(OpCode::PushM1),
            0 => Some(OpCode::Push0),
            1 => Some(OpCode::Push1),
            2 => Some(OpCode::Push2),
            3 => Some(OpCode::Push3),
            4 => Some(OpCode::Push4),
            5 => Some(OpCode::Push5),
            6 => Some(OpCode::Push6),
            7 => Some(OpCode::Push7),
            8 => Some(OpCode::Push8),
            9 => Some(OpCode::Push9),
            10 => Some(OpCode::Push10),
            11 => Some(OpCode::Push11),
            12 => Some(OpCode::Push12),
            13 => Some(OpCode::Push13),
            14 => Some(OpCode::Push14),
            15 => Some(OpCode::Push15),
            16 => Some(OpCode::Push16),
            _ => None,
        };
        if let Some(opcode) = opcode {
            self.map.insert(opcode);
            return;
        }
        if let Ok(v) = i8::try_from(value) {
            self.map.insert_with_bytes(OpCode::PushInt8, &v.to_le_bytes());
        } else if let Ok(v) = i16::try_from(value) {
            self.map.insert_with_bytes(OpCode::PushInt16, &v.to_le_bytes());
        } else if let Ok(v) = i32::try_from(value) {
            self.map.insert_with_bytes(OpCode::PushInt32, &v.to_le_bytes());
        } else if let Ok(v) = i64::try_from(value) {
            self.map.insert_with_bytes(OpCode::PushInt64, &v.to_le_bytes());
        } else {
            self.map.insert_with_bytes(OpCode::PushInt128, &value.to_le_bytes());
        }
    }

    /// Emits a length-prefixed data push, sized to the smallest of
    /// `PUSHDATA1`/`PUSHDATA2`/`PUSHDATA4` that fits the payload length.
    fn emit_data_literal(&mut self, data: &[u8]) {
        let len = data.len();
        let mut bytes = Vec::with_capacity(len + 4);
        let opcode = if len <= u8::MAX as usize {
            bytes.push(len as u8);
            OpCode::PushData1
        } else if len <= u16::MAX as usize {
            bytes.extend_from_slice(&(len as u16).to_le_bytes());
            OpCode::PushData2
        } else {
            bytes.extend_from_slice(&(len as u32).to_le_bytes());
            OpCode::PushData4
        };
        bytes.extend_from_slice(data);
        self.map.insert_with_bytes(opcode, &bytes);
    }
}

/// The fixed opcode a built-in family lowers to when it carries no syscall
/// identifier (`builtins.rs`'s `len`/`abs`/`sqrt`) — these are VM
/// primitives, not interop calls, so they never go through `SYSCALL`.
fn inline_builtin_opcode(name: &str) -> Option<OpCode> {
    match name {
        "len" => Some(OpCode::Size),
        "abs" => Some(OpCode::Abs),
        "sqrt" => Some(OpCode::Sqrt),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Position;
    use crate::symbol::Variable;

    fn pos() -> Position {
        Position { line: 1, col: 1 }
    }

    fn method_with_no_slots() -> Method {
        Method {
            name: "main".into(),
            arguments: vec![],
            return_type: Type::int(),
            locals: IndexMap::new(),
            is_public: true,
            is_metadata: false,
            is_main: false,
        }
    }

    #[test]
    fn empty_body_still_returns() {
        let method = method_with_no_slots();
        let calls = IndexMap::new();
        let globals = IndexMap::new();
        let ctx = CodegenContext::new(&method, &calls, &globals);
        let mut map = InstructionMap::new();
        let mut entries = IndexMap::new();
        let mut pending = Vec::new();
        let mut gen = MethodCodeGenerator::new(&ctx, &mut map, &mut entries, &mut pending);
        gen.generate(&[]);
        map.finalise();
        let bytes = map.serialise();
        assert_eq!(bytes, vec![OpCode::Ret.byte()]);
    }

    #[test]
    fn return_with_int_literal_chooses_fast_push() {
        let method = method_with_no_slots();
        let calls = IndexMap::new();
        let globals = IndexMap::new();
        let ctx = CodegenContext::new(&method, &calls, &globals);
        let mut map = InstructionMap::new();
        let mut entries = IndexMap::new();
        let mut pending = Vec::new();
        let mut gen = MethodCodeGenerator::new(&ctx, &mut map, &mut entries, &mut pending);
        gen.generate(&[Stmt::Return {
            pos: pos(),
            value: Some(Expr::Num { pos: pos(), value: 5 }),
        }]);
        map.finalise();
        let bytes = map.serialise();
        assert_eq!(bytes, vec![OpCode::Push5.byte(), OpCode::Ret.byte()]);
    }

    #[test]
    fn large_int_literal_uses_pushint32() {
        let method = method_with_no_slots();
        let calls = IndexMap::new();
        let globals = IndexMap::new();
        let ctx = CodegenContext::new(&method, &calls, &globals);
        let mut map = InstructionMap::new();
        let mut entries = IndexMap::new();
        let mut pending = Vec::new();
        let mut gen = MethodCodeGenerator::new(&ctx, &mut map, &mut entries, &mut pending);
        gen.generate(&[Stmt::Return {
            pos: pos(),
            value: Some(Expr::Num {
                pos: pos(),
                value: 100_000,
            }),
        }]);
        map.finalise();
        let bytes = map.serialise();
        assert_eq!(bytes[0], OpCode::PushInt32.byte());
    }

    #[test]
    fn argument_load_uses_fast_form_below_seven() {
        let mut method = method_with_no_slots();
        method.arguments.push(Variable {
            name: "amount".into(),
            declared_type: Type::int(),
            is_argument: true,
        });
        let calls = IndexMap::new();
        let globals = IndexMap::new();
        let ctx = CodegenContext::new(&method, &calls, &globals);
        let mut map = InstructionMap::new();
        let mut entries = IndexMap::new();
        let mut pending = Vec::new();
        let mut gen = MethodCodeGenerator::new(&ctx, &mut map, &mut entries, &mut pending);
        gen.generate(&[Stmt::Return {
            pos: pos(),
            value: Some(Expr::Name {
                pos: pos(),
                id: "amount".into(),
            }),
        }]);
        map.finalise();
        let bytes = map.serialise();
        // byte 0: INITSLOT opcode, bytes 1-2: its local/arg-count operands.
        assert_eq!(bytes[3], OpCode::LdArg0.byte());
    }
}
