//! A representative built-in catalogue.
//!
//! The real built-in surface (`boa3.builtin`'s free functions plus the
//! `boa3.builtin.interop` packages) is large and is the external front
//! end's concern to assemble in full (§1 Non-goals name "the built-in
//! catalogue's content" as out of scope) — this module provides enough of
//! it, built the same way, for the analyser and code generator to have
//! something real to resolve calls against, and for a host to see the
//! shape a complete catalogue would take.
//!
//! Polymorphic entries (`len`) are modeled as a [`BuiltinFamily`]; everything
//! else is a fixed-signature [`BuiltinCallable`] registered directly.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::symbol::{BuiltinCallable, BuiltinFamily, Package, Symbol};
use crate::types::Type;

/// The set of built-in names and interop packages visible to every
/// translation unit, owned by the caller and passed by shared reference
/// into the analyser — no process-wide singleton (§9 "Singleton
/// catalogues" design note; SPEC_FULL.md §5).
pub struct BuiltinCatalogue {
    entries: IndexMap<Arc<str>, Symbol>,
}

impl BuiltinCatalogue {
    /// Builds the standard catalogue. Cheap enough to call once per
    /// compilation session and share by reference; never built lazily
    /// behind a shared global.
    pub fn standard() -> Self {
        let mut entries = IndexMap::new();

        entries.insert(
            "len".into(),
            Symbol::BuiltinFamily(BuiltinFamily::new("len", |args| match args {
                [t] if t.capabilities().is_sequence => Some(BuiltinCallable {
                    name: "len".into(),
                    argument_types: vec![t.clone()],
                    return_type: Type::int(),
                    syscall: None,
                }),
                _ => None,
            })),
        );

        entries.insert(
            "abs".into(),
            Symbol::BuiltinFamily(BuiltinFamily::new("abs", |args| match args {
                [t] if t.is_int() => Some(BuiltinCallable {
                    name: "abs".into(),
                    argument_types: vec![t.clone()],
                    return_type: Type::int(),
                    syscall: None,
                }),
                _ => None,
            })),
        );

        entries.insert(
            "sqrt".into(),
            Symbol::BuiltinFamily(BuiltinFamily::new("sqrt", |args| match args {
                [t] if t.is_int() => Some(BuiltinCallable {
                    name: "sqrt".into(),
                    argument_types: vec![t.clone()],
                    return_type: Type::int(),
                    syscall: None,
                }),
                _ => None,
            })),
        );

        entries.insert(
            "to_script_hash".into(),
            Symbol::BuiltinFamily(BuiltinFamily::new("to_script_hash", |args| match args {
                [t] if t.is_str() || *t == Type::bytes() => Some(BuiltinCallable {
                    name: "to_script_hash".into(),
                    argument_types: vec![t.clone()],
                    return_type: Type::bytes(),
                    syscall: Some("System.Crypto.Hash160".into()),
                }),
                _ => None,
            })),
        );

        entries.insert("Storage".into(), Symbol::Package(storage_package()));
        entries.insert("Runtime".into(), Symbol::Package(runtime_package()));

        BuiltinCatalogue { entries }
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries.get(name)
    }
}

fn storage_package() -> Package {
    let mut pkg = Package::new("Storage");
    pkg.members.insert(
        "get".into(),
        Symbol::BuiltinFamily(BuiltinFamily::new("Storage.get", |args| match args {
            [t] if *t == Type::bytes() || t.is_str() => Some(BuiltinCallable {
                name: "Storage.get".into(),
                argument_types: vec![t.clone()],
                return_type: Type::optional(Type::bytes()),
                syscall: Some("System.Storage.Get".into()),
            }),
            _ => None,
        })),
    );
    pkg.members.insert(
        "put".into(),
        Symbol::BuiltinFamily(BuiltinFamily::new("Storage.put", |args| match args {
            [k, v]
                if (*k == Type::bytes() || k.is_str()) && (*v == Type::bytes() || v.is_str() || v.is_int()) =>
            {
                Some(BuiltinCallable {
                    name: "Storage.put".into(),
                    argument_types: vec![k.clone(), v.clone()],
                    return_type: Type::none(),
                    syscall: Some("System.Storage.Put".into()),
                })
            }
            _ => None,
        })),
    );
    pkg
}

fn runtime_package() -> Package {
    let mut pkg = Package::new("Runtime");
    pkg.members.insert(
        "check_witness".into(),
        Symbol::BuiltinFamily(BuiltinFamily::new("Runtime.check_witness", |args| match args {
            [t] if *t == Type::bytes() => Some(BuiltinCallable {
                name: "Runtime.check_witness".into(),
                argument_types: vec![t.clone()],
                return_type: Type::bool(),
                syscall: Some("System.Runtime.CheckWitness".into()),
            }),
            _ => None,
        })),
    );
    pkg.members.insert(
        "notify".into(),
        Symbol::BuiltinFamily(BuiltinFamily::new("Runtime.notify", |_args| {
            Some(BuiltinCallable {
                name: "Runtime.notify".into(),
                argument_types: vec![],
                return_type: Type::none(),
                syscall: Some("System.Runtime.Notify".into()),
            })
        })),
    );
    pkg
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn len_specialises_to_sequence_arguments_only() {
        let catalogue = BuiltinCatalogue::standard();
        let Some(Symbol::BuiltinFamily(len)) = catalogue.get("len") else {
            panic!("expected len to be registered");
        };
        assert!(len.build(&[Type::str()]).is_some());
        assert!(len.build(&[Type::int()]).is_none());
    }

    #[test]
    fn storage_package_exposes_get_and_put() {
        let catalogue = BuiltinCatalogue::standard();
        let Some(Symbol::Package(storage)) = catalogue.get("Storage") else {
            panic!("expected Storage package");
        };
        assert!(storage.members.contains_key("get"));
        assert!(storage.members.contains_key("put"));
    }
}
