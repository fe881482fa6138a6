//! The manifest/ABI data model: the shape a compiled contract's public
//! surface takes (§6.3, §6.4). Building a [`Manifest`] never writes JSON —
//! the crate's contract ends at producing serialization-ready data; an
//! external emitter turns it into the manifest document (§1 Non-goals name
//! "the manifest/ABI JSON emitter" as out of scope), the same split
//! `enable-serde` draws around the rest of this crate's data model.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::instmap::{Inst, InstructionMap};
use crate::symbol::SymbolTable;

/// One parameter's ABI-visible name and type identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParamAbi {
    pub name: String,
    pub type_id: String,
}

/// A public method's entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MethodAbi {
    pub name: String,
    pub parameters: Vec<ParamAbi>,
    pub return_type: String,
    /// Byte address of the method's first instruction in the finalised
    /// script (§6.3).
    pub offset: u32,
}

/// A declared notification event's entry in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EventAbi {
    pub name: String,
    pub parameters: Vec<ParamAbi>,
}

/// The compiled contract's ABI surface, plus the handful of free-form
/// fields a designated `metadata` method supplies (§6.3). A `metadata`
/// method is consumed at compile time rather than code-generated (§6.4):
/// evaluating its body to recover `author`/`email`/`supported_standards`
/// etc. is constant folding over an arbitrary method, which this crate
/// leaves to the external emitter that already owns manifest JSON
/// emission — these fields default empty here and are a host's to fill in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Manifest {
    pub methods: Vec<MethodAbi>,
    pub events: Vec<EventAbi>,
    pub supported_standards: Vec<String>,
    pub author: Option<String>,
    pub email: Option<String>,
    pub description: Option<String>,
    pub trusts: Vec<String>,
    pub groups: Vec<String>,
    pub extras: Vec<(String, String)>,
}

impl Manifest {
    /// Builds the ABI surface from the symbol table's public, non-metadata
    /// methods and declared events, looking up each method's final byte
    /// offset in `map`. A method with no matching `entries` slot (it was
    /// never generated — `is_metadata`, or never reached by `compile`) is
    /// silently left off the surface rather than panicking, since a method
    /// declared but unreachable is a modeling choice a host is free to
    /// make, not a compiler bug.
    pub fn build(symbols: &SymbolTable, map: &InstructionMap, entries: &IndexMap<Arc<str>, Inst>) -> Self {
        let mut methods: Vec<MethodAbi> = symbols
            .methods
            .values()
            .filter(|method| method.is_public && !method.is_metadata)
            .filter_map(|method| {
                let entry = *entries.get(method.name.as_ref())?;
                Some(MethodAbi {
                    name: method.name.to_string(),
                    parameters: method
                        .arguments
                        .iter()
                        .map(|a| ParamAbi {
                            name: a.name.to_string(),
                            type_id: a.declared_type.identifier(),
                        })
                        .collect(),
                    return_type: method.return_type.identifier(),
                    offset: map.address_of(entry),
                })
            })
            .collect();
        methods.sort_by(|a, b| a.offset.cmp(&b.offset));

        let events = symbols
            .events
            .values()
            .map(|event| EventAbi {
                name: event.name.to_string(),
                parameters: event
                    .arguments
                    .iter()
                    .map(|a| ParamAbi {
                        name: a.name.to_string(),
                        type_id: a.declared_type.identifier(),
                    })
                    .collect(),
            })
            .collect();

        Manifest {
            methods,
            events,
            ..Manifest::default()
        }
    }
}
