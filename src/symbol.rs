//! Symbol tables: the analyser's model of everything a name can resolve to.
//!
//! Every method owns a flat table of its arguments followed by its locals,
//! in declaration order — `indexmap::IndexMap` gives us both name lookup
//! and insertion-order iteration for free, where the source keeps a
//! parallel list/dict pair to get the same two properties.

use indexmap::IndexMap;
use std::sync::Arc;

use crate::types::Type;

/// A declared variable or argument slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: Arc<str>,
    pub declared_type: Type,
    /// Arguments precede locals in a method's slot numbering; this is
    /// `true` for the former.
    pub is_argument: bool,
}

/// An instance or class method.
#[derive(Debug, Clone)]
pub struct Method {
    pub name: Arc<str>,
    pub arguments: Vec<Variable>,
    pub return_type: Type,
    /// Locals declared by assignment inside the body, in first-seen order.
    /// Populated by the type analyser as it walks the body; empty for an
    /// as-yet-unanalysed method.
    pub locals: IndexMap<Arc<str>, Variable>,
    pub is_public: bool,
    /// `True` for the method conventionally named `_deploy`/`metadata` that
    /// the external manifest builder treats specially; this crate only
    /// tracks the flag, it doesn't special-case emission beyond that.
    pub is_metadata: bool,
    /// `True` for the designated contract entry point (§3.2): `compile`
    /// relocates this method's instructions to byte offset 0 of the
    /// finalised script, ahead of every other method and the static
    /// initializer.
    pub is_main: bool,
}

impl Method {
    /// All slots (arguments then locals) in the order they occupy the
    /// method's local/argument slot space — the order §3.2 requires for
    /// `INITSLOT` sizing and `LDARG`/`LDLOC` indices.
    pub fn slots(&self) -> impl Iterator<Item = &Variable> {
        self.arguments.iter().chain(self.locals.values())
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    pub fn local_count(&self) -> usize {
        self.locals.len()
    }
}

/// A notification event declaration: signature only, no body.
#[derive(Debug, Clone)]
pub struct Event {
    pub name: Arc<str>,
    pub arguments: Vec<Variable>,
}

/// A user-defined class: instance variables plus its methods.
#[derive(Debug, Clone)]
pub struct Class {
    pub name: Arc<str>,
    pub instance_variables: IndexMap<Arc<str>, Variable>,
    pub methods: IndexMap<Arc<str>, Method>,
}

impl Class {
    pub fn as_type(&self) -> Type {
        Type::class(self.name.clone())
    }
}

/// A concrete built-in callable, already specialised to its call-site
/// argument types (the output of a [`BuiltinFamily::build`] call).
#[derive(Debug, Clone)]
pub struct BuiltinCallable {
    pub name: Arc<str>,
    pub argument_types: Vec<Type>,
    pub return_type: Type,
    /// Interop syscall identifier when the built-in lowers to `SYSCALL`
    /// rather than to an inline opcode sequence (e.g. `Storage.get`).
    pub syscall: Option<Arc<str>>,
}

/// A polymorphic built-in, modeled as a specialisation function rather
/// than as a trait-object hierarchy (§9 "Polymorphic built-ins" design
/// note) — e.g. `len()` over `str`/`bytes`/`List[T]` all resolve through
/// one `BuiltinFamily` whose `build` inspects the call-site argument types.
pub struct BuiltinFamily {
    pub name: Arc<str>,
    builder: Box<dyn Fn(&[Type]) -> Option<BuiltinCallable> + Send + Sync>,
}

impl std::fmt::Debug for BuiltinFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuiltinFamily").field("name", &self.name).finish()
    }
}

impl BuiltinFamily {
    pub fn new(
        name: impl Into<Arc<str>>,
        builder: impl Fn(&[Type]) -> Option<BuiltinCallable> + Send + Sync + 'static,
    ) -> Self {
        BuiltinFamily {
            name: name.into(),
            builder: Box::new(builder),
        }
    }

    /// Specialises this family to a concrete call with the given argument
    /// types, returning `None` when no overload matches (the call is then
    /// reported as `UnresolvedOperation` by the type analyser).
    pub fn build(&self, argument_types: &[Type]) -> Option<BuiltinCallable> {
        (self.builder)(argument_types)
    }
}

/// A package: a namespace of further symbols (e.g. `Storage`, `Runtime`),
/// never itself callable or assignable.
#[derive(Debug, Default)]
pub struct Package {
    pub name: Arc<str>,
    pub members: IndexMap<Arc<str>, Symbol>,
}

impl Package {
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Package {
            name: name.into(),
            members: IndexMap::new(),
        }
    }
}

/// Anything a name in scope can resolve to.
#[derive(Debug)]
pub enum Symbol {
    Variable(Variable),
    Method(Method),
    Event(Event),
    Class(Class),
    BuiltinFamily(BuiltinFamily),
    Package(Package),
}

impl Symbol {
    pub fn declared_type(&self) -> Type {
        match self {
            Symbol::Variable(v) => v.declared_type.clone(),
            Symbol::Method(_) => Type::none(),
            Symbol::Event(_) => Type::none(),
            Symbol::Class(c) => c.as_type(),
            Symbol::BuiltinFamily(_) => Type::none(),
            Symbol::Package(_) => Type::none(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Symbol::Variable(v) => &v.name,
            Symbol::Method(m) => &m.name,
            Symbol::Event(e) => &e.name,
            Symbol::Class(c) => &c.name,
            Symbol::BuiltinFamily(b) => &b.name,
            Symbol::Package(p) => &p.name,
        }
    }
}

/// A method's flat symbol table, shared between the type analyser (which
/// populates `locals` as it walks the body) and the code generator (which
/// reads slot order from it to size and index `INITSLOT`/`LDARG`/`LDLOC`).
#[derive(Debug, Default)]
pub struct SymbolTable {
    pub global_variables: IndexMap<Arc<str>, Variable>,
    pub methods: IndexMap<Arc<str>, Method>,
    pub events: IndexMap<Arc<str>, Event>,
    pub classes: IndexMap<Arc<str>, Class>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    pub fn resolve_global(&self, name: &str) -> Option<Symbol> {
        if let Some(v) = self.global_variables.get(name) {
            return Some(Symbol::Variable(v.clone()));
        }
        if let Some(m) = self.methods.get(name) {
            return Some(Symbol::Method(m.clone()));
        }
        if let Some(e) = self.events.get(name) {
            return Some(Symbol::Event(e.clone()));
        }
        if let Some(c) = self.classes.get(name) {
            return Some(Symbol::Class(c.clone()));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var(name: &str, ty: Type, is_argument: bool) -> Variable {
        Variable {
            name: name.into(),
            declared_type: ty,
            is_argument,
        }
    }

    #[test]
    fn method_slots_put_arguments_before_locals() {
        let mut locals = IndexMap::new();
        locals.insert("total".into(), var("total", Type::int(), false));
        let method = Method {
            name: "main".into(),
            arguments: vec![var("amount", Type::int(), true)],
            return_type: Type::int(),
            locals,
            is_public: true,
            is_metadata: false,
            is_main: false,
        };
        let names: Vec<&str> = method.slots().map(|v| v.name.as_ref()).collect();
        assert_eq!(names, vec!["amount", "total"]);
        assert_eq!(method.argument_count(), 1);
        assert_eq!(method.local_count(), 1);
    }

    #[test]
    fn builtin_family_specialises_by_argument_types() {
        let len = BuiltinFamily::new("len", |args| match args {
            [t] if t.is_sequence() => Some(BuiltinCallable {
                name: "len".into(),
                argument_types: vec![t.clone()],
                return_type: Type::int(),
                syscall: None,
            }),
            _ => None,
        });
        assert!(len.build(&[Type::str()]).is_some());
        assert!(len.build(&[Type::int()]).is_none());
    }
}
