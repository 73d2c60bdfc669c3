//! # Type Descriptors
//!
//! How the host describes a type to the engine.
//!
//! The engine makes no layout assumptions of its own: field offsets, byte
//! sizes, template arguments and enum members all come from the host through
//! these descriptors.

use std::fmt;

/// Opaque handle to a type known by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeHandle(pub u32);

impl fmt::Display for TypeHandle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "#{}", self.0)
    }
}

/// Built-in scalar categories
///
/// Mirrors the basic types a native debugger reports. The category decides
/// how the raw bytes of a leaf value are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind
{
    Void,
    Bool,
    Char,
    SignedChar,
    UnsignedChar,
    WChar,
    Char8,
    Char16,
    Char32,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Long,
    UnsignedLong,
    LongLong,
    UnsignedLongLong,
    Int128,
    UnsignedInt128,
    Half,
    Float,
    Double,
    LongDouble,
    NullPtr,
}

impl BasicKind
{
    /// Conventional C++ spelling of this type on an LP64 target
    #[must_use]
    pub const fn name(self) -> &'static str
    {
        match self {
            BasicKind::Void => "void",
            BasicKind::Bool => "bool",
            BasicKind::Char => "char",
            BasicKind::SignedChar => "signed char",
            BasicKind::UnsignedChar => "unsigned char",
            BasicKind::WChar => "wchar_t",
            BasicKind::Char8 => "char8_t",
            BasicKind::Char16 => "char16_t",
            BasicKind::Char32 => "char32_t",
            BasicKind::Short => "short",
            BasicKind::UnsignedShort => "unsigned short",
            BasicKind::Int => "int",
            BasicKind::UnsignedInt => "unsigned int",
            BasicKind::Long => "long",
            BasicKind::UnsignedLong => "unsigned long",
            BasicKind::LongLong => "long long",
            BasicKind::UnsignedLongLong => "unsigned long long",
            BasicKind::Int128 => "__int128",
            BasicKind::UnsignedInt128 => "unsigned __int128",
            BasicKind::Half => "_Float16",
            BasicKind::Float => "float",
            BasicKind::Double => "double",
            BasicKind::LongDouble => "long double",
            BasicKind::NullPtr => "std::nullptr_t",
        }
    }

    /// Natural byte size on an LP64 target
    #[must_use]
    pub const fn byte_size(self) -> u64
    {
        match self {
            BasicKind::Void => 0,
            BasicKind::Bool
            | BasicKind::Char
            | BasicKind::SignedChar
            | BasicKind::UnsignedChar
            | BasicKind::Char8 => 1,
            BasicKind::Char16 | BasicKind::Short | BasicKind::UnsignedShort | BasicKind::Half => 2,
            BasicKind::WChar | BasicKind::Char32 | BasicKind::Int | BasicKind::UnsignedInt | BasicKind::Float => 4,
            BasicKind::Long
            | BasicKind::UnsignedLong
            | BasicKind::LongLong
            | BasicKind::UnsignedLongLong
            | BasicKind::Double
            | BasicKind::NullPtr => 8,
            BasicKind::Int128 | BasicKind::UnsignedInt128 | BasicKind::LongDouble => 16,
        }
    }

    /// Whether the value is printed as a signed integer
    #[must_use]
    pub const fn is_signed(self) -> bool
    {
        matches!(
            self,
            BasicKind::Char
                | BasicKind::SignedChar
                | BasicKind::WChar
                | BasicKind::Short
                | BasicKind::Int
                | BasicKind::Long
                | BasicKind::LongLong
                | BasicKind::Int128
        )
    }

    /// Whether the value is an integer of any width or signedness
    #[must_use]
    pub const fn is_integer(self) -> bool
    {
        !matches!(
            self,
            BasicKind::Void
                | BasicKind::Bool
                | BasicKind::Half
                | BasicKind::Float
                | BasicKind::Double
                | BasicKind::LongDouble
                | BasicKind::NullPtr
        )
    }

    /// Whether the value is a floating point number
    #[must_use]
    pub const fn is_float(self) -> bool
    {
        matches!(self, BasicKind::Half | BasicKind::Float | BasicKind::Double | BasicKind::LongDouble)
    }

    /// Narrow character types used by C strings
    #[must_use]
    pub const fn is_narrow_char(self) -> bool
    {
        matches!(self, BasicKind::Char | BasicKind::SignedChar | BasicKind::UnsignedChar | BasicKind::Char8)
    }
}

/// A member of a struct or union
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field
{
    /// Member name (for base subobjects, the base type's name)
    pub name: String,
    /// Member type
    pub ty: TypeHandle,
    /// Byte offset from the start of the enclosing value
    pub offset: u64,
    /// Whether this member is a base-class subobject
    pub is_base: bool,
}

/// A named enumerator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumMember
{
    /// Enumerator name
    pub name: String,
    /// Enumerator value
    pub value: i64,
}

/// Structural classification of a type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind
{
    /// Scalar type printed directly
    Basic(BasicKind),
    /// Pointer (or reference) to another type
    Pointer
    {
        /// Pointed-to type
        pointee: TypeHandle,
    },
    /// Enumeration with its declared members
    Enumeration
    {
        /// Integer representation
        underlying: BasicKind,
        /// Declared enumerators in declaration order
        members: Vec<EnumMember>,
    },
    /// Fixed-length array
    Array
    {
        /// Element type
        element: TypeHandle,
        /// Number of elements
        len: u64,
    },
    /// Struct, class or union
    ///
    /// A non-empty `template_args` list marks a template instantiation.
    Struct
    {
        /// Members in declaration order (base subobjects first)
        fields: Vec<Field>,
        /// Template arguments in declaration order
        template_args: Vec<TypeHandle>,
    },
}

/// Everything the host knows about one type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeInfo
{
    /// Display name as reported by the host (may be namespace qualified)
    pub name: String,
    /// Size of one value in bytes
    pub byte_size: u64,
    /// Structural classification
    pub kind: TypeKind,
}

impl TypeInfo
{
    /// Describe a basic type with its natural name and size
    #[must_use]
    pub fn basic(kind: BasicKind) -> Self
    {
        TypeInfo { name: kind.name().to_string(), byte_size: kind.byte_size(), kind: TypeKind::Basic(kind) }
    }

    /// Basic kind, when this is a scalar
    #[must_use]
    pub fn basic_kind(&self) -> Option<BasicKind>
    {
        match self.kind {
            TypeKind::Basic(kind) => Some(kind),
            _ => None,
        }
    }

    /// Pointee handle, when this is a pointer
    #[must_use]
    pub fn pointee(&self) -> Option<TypeHandle>
    {
        match self.kind {
            TypeKind::Pointer { pointee } => Some(pointee),
            _ => None,
        }
    }

    /// Whether this type is a pointer
    #[must_use]
    pub fn is_pointer(&self) -> bool
    {
        matches!(self.kind, TypeKind::Pointer { .. })
    }

    /// Struct members, empty for non-structs
    #[must_use]
    pub fn fields(&self) -> &[Field]
    {
        match &self.kind {
            TypeKind::Struct { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Template argument at `index`
    #[must_use]
    pub fn template_arg(&self, index: usize) -> Option<TypeHandle>
    {
        match &self.kind {
            TypeKind::Struct { template_args, .. } => template_args.get(index).copied(),
            _ => None,
        }
    }

    /// Whether this is an integer-like scalar (integers, bool, characters, enums)
    #[must_use]
    pub fn is_integer_like(&self) -> bool
    {
        match self.kind {
            TypeKind::Basic(kind) => kind.is_integer() || kind == BasicKind::Bool,
            TypeKind::Enumeration { .. } => true,
            _ => false,
        }
    }
}
