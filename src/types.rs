//! The type lattice used by the analyser and code generator.
//!
//! The supported language subset is closed (no floats, no generic classes,
//! no user-defined metaclasses), so the lattice is represented as a small
//! enum of constructors rather than an open class hierarchy. `Type::none()`
//! is the bottom sentinel used throughout the analyser to mean
//! "unresolved/absent", matching the source's `Type.none`.

use std::fmt;
use std::sync::Arc;

/// ABI-level classification of a type, as it would appear in a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AbiType {
    Any,
    Boolean,
    Integer,
    ByteArray,
    String,
    Hash160,
    Hash256,
    PublicKey,
    Signature,
    Array,
    Map,
    InteropInterface,
    Void,
}

/// Runtime stack-item classification, i.e. the Neo VM `StackItemType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StackItemKind {
    Any,
    Pointer,
    Boolean,
    Integer,
    ByteString,
    Buffer,
    Array,
    Struct,
    Map,
    InteropInterface,
}

/// Capability flags carried by every type descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TypeCapabilities {
    /// Whether a variable of this type can be rebound to a different value
    /// after its first assignment (every type in the subset is reassignable
    /// except `none`, which never holds a value to begin with).
    pub can_reassign_values: bool,
    /// Whether the type is one of the VM's fundamental stack-item kinds
    /// rather than a compound/sequence type.
    pub is_primitive: bool,
    /// Whether indexing and slicing apply to this type.
    pub is_sequence: bool,
}

/// The shape of a type: either a primitive, or a composite parameterised
/// over element type(s).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TypeShape {
    None,
    Bool,
    Int,
    Str,
    Bytes,
    Any,
    Sequence { element: Type },
    Mapping { key: Type, value: Type },
    Optional { inner: Type },
    Union { variants: Vec<Type> },
    Class { name: Arc<str> },
    Event { name: Arc<str> },
}

/// A resolved type descriptor.
///
/// Cloning a `Type` is cheap: composite variants box their element types so
/// the descriptor itself stays a thin handle, and equality is structural
/// (identifier plus element types), matching §3.1's "composite types are
/// compared structurally".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type(Arc<TypeShape>);

impl Type {
    fn new(shape: TypeShape) -> Self {
        Type(Arc::new(shape))
    }

    /// The bottom sentinel: "unresolved" or "absent". Matches `Type.none`
    /// in the source — used both for `-> None` return annotations and as
    /// the placeholder a failed resolution yields.
    pub fn none() -> Self {
        Type::new(TypeShape::None)
    }

    pub fn bool() -> Self {
        Type::new(TypeShape::Bool)
    }

    pub fn int() -> Self {
        Type::new(TypeShape::Int)
    }

    pub fn str() -> Self {
        Type::new(TypeShape::Str)
    }

    pub fn bytes() -> Self {
        Type::new(TypeShape::Bytes)
    }

    /// The top type: accepts anything, assignable from and to everything.
    pub fn any() -> Self {
        Type::new(TypeShape::Any)
    }

    /// `build(element_type)` for sequence types (`list`/array), per §3.1.
    pub fn sequence(element: Type) -> Self {
        Type::new(TypeShape::Sequence { element })
    }

    /// `build(element_type)` for mapping types (`dict`).
    pub fn mapping(key: Type, value: Type) -> Self {
        Type::new(TypeShape::Mapping { key, value })
    }

    /// `build(element_type)` for optional types (`Optional[T]`).
    pub fn optional(inner: Type) -> Self {
        Type::new(TypeShape::Optional { inner })
    }

    /// `build(element_type)` for union types (`Union[A, B, ...]`).
    pub fn union(variants: Vec<Type>) -> Self {
        Type::new(TypeShape::Union { variants })
    }

    pub fn class(name: impl Into<Arc<str>>) -> Self {
        Type::new(TypeShape::Class { name: name.into() })
    }

    pub fn event(name: impl Into<Arc<str>>) -> Self {
        Type::new(TypeShape::Event { name: name.into() })
    }

    /// The stable identifier string used in diagnostics and manifests
    /// (e.g. `"int"`, `"Optional[int]"`, `"MyToken"`).
    pub fn identifier(&self) -> String {
        match &*self.0 {
            TypeShape::None => "None".to_string(),
            TypeShape::Bool => "bool".to_string(),
            TypeShape::Int => "int".to_string(),
            TypeShape::Str => "str".to_string(),
            TypeShape::Bytes => "bytes".to_string(),
            TypeShape::Any => "Any".to_string(),
            TypeShape::Sequence { element } => format!("List[{}]", element.identifier()),
            TypeShape::Mapping { key, value } => {
                format!("Dict[{}, {}]", key.identifier(), value.identifier())
            }
            TypeShape::Optional { inner } => format!("Optional[{}]", inner.identifier()),
            TypeShape::Union { variants } => {
                let parts: Vec<String> = variants.iter().map(Type::identifier).collect();
                format!("Union[{}]", parts.join(", "))
            }
            TypeShape::Class { name } => name.to_string(),
            TypeShape::Event { name } => name.to_string(),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(*self.0, TypeShape::None)
    }

    pub fn is_any(&self) -> bool {
        matches!(*self.0, TypeShape::Any)
    }

    pub fn is_int(&self) -> bool {
        matches!(*self.0, TypeShape::Int)
    }

    pub fn is_bool(&self) -> bool {
        matches!(*self.0, TypeShape::Bool)
    }

    pub fn is_str(&self) -> bool {
        matches!(*self.0, TypeShape::Str)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(
            *self.0,
            TypeShape::Sequence { .. } | TypeShape::Str | TypeShape::Bytes
        )
    }

    pub fn element_type(&self) -> Option<Type> {
        match &*self.0 {
            TypeShape::Sequence { element } => Some(element.clone()),
            _ => None,
        }
    }

    /// Whether a value of type `other` can be assigned to a slot declared
    /// with this type. `Any` accepts (and is accepted by) everything;
    /// otherwise assignment requires structural equality. The subset has
    /// no numeric coercion, so there is no `int <- bool` or `bool <- int`
    /// implicit conversion (see REDESIGN FLAG in SPEC_FULL.md §3.1).
    pub fn accepts(&self, other: &Type) -> bool {
        self.is_any() || other.is_any() || self == other
    }

    pub fn capabilities(&self) -> TypeCapabilities {
        match &*self.0 {
            TypeShape::None => TypeCapabilities {
                can_reassign_values: false,
                is_primitive: true,
                is_sequence: false,
            },
            TypeShape::Bool | TypeShape::Int => TypeCapabilities {
                can_reassign_values: true,
                is_primitive: true,
                is_sequence: false,
            },
            TypeShape::Str | TypeShape::Bytes => TypeCapabilities {
                can_reassign_values: true,
                is_primitive: true,
                is_sequence: true,
            },
            TypeShape::Sequence { .. } => TypeCapabilities {
                can_reassign_values: true,
                is_primitive: false,
                is_sequence: true,
            },
            TypeShape::Mapping { .. }
            | TypeShape::Optional { .. }
            | TypeShape::Union { .. }
            | TypeShape::Class { .. }
            | TypeShape::Event { .. }
            | TypeShape::Any => TypeCapabilities {
                can_reassign_values: true,
                is_primitive: false,
                is_sequence: false,
            },
        }
    }

    pub fn abi_type(&self) -> AbiType {
        match &*self.0 {
            TypeShape::None => AbiType::Void,
            TypeShape::Bool => AbiType::Boolean,
            TypeShape::Int => AbiType::Integer,
            TypeShape::Str => AbiType::String,
            TypeShape::Bytes => AbiType::ByteArray,
            TypeShape::Sequence { .. } => AbiType::Array,
            TypeShape::Mapping { .. } => AbiType::Map,
            TypeShape::Optional { inner } => inner.abi_type(),
            TypeShape::Union { .. } | TypeShape::Any => AbiType::Any,
            TypeShape::Class { .. } => AbiType::Array,
            TypeShape::Event { .. } => AbiType::Void,
        }
    }

    pub fn stack_item_kind(&self) -> StackItemKind {
        match &*self.0 {
            TypeShape::None => StackItemKind::Any,
            TypeShape::Bool => StackItemKind::Boolean,
            TypeShape::Int => StackItemKind::Integer,
            TypeShape::Str | TypeShape::Bytes => StackItemKind::ByteString,
            TypeShape::Sequence { .. } => StackItemKind::Array,
            TypeShape::Mapping { .. } => StackItemKind::Map,
            TypeShape::Optional { inner } => inner.stack_item_kind(),
            TypeShape::Union { .. } | TypeShape::Any => StackItemKind::Any,
            TypeShape::Class { .. } => StackItemKind::Array,
            TypeShape::Event { .. } => StackItemKind::Any,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}
