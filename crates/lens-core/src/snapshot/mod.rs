//! # Memory Snapshots
//!
//! An in-process stand-in for a debugged target.
//!
//! [`MemoryImage`] implements [`Introspection`] over a private address space
//! and a private type table. Allocations are separate regions with unmapped
//! gaps in between, so reading past the end of any buffer fails exactly
//! like it would against a live process. [`RuntimeBuilder`] lays out the
//! runtime's containers on top of it.
//!
//! The image is what the test suite and the `lens demo` command inspect.

pub mod runtime;

pub use runtime::{Item, RuntimeBuilder};

use std::collections::{BTreeMap, HashMap};

use tracing::trace;

use crate::error::{InspectError, Result};
use crate::host::Introspection;
use crate::types::{normalize, Address, BasicKind, EnumMember, Field, RemoteValue, TypeHandle, TypeInfo, TypeKind};

/// First address handed out by the allocator
const HEAP_START: u64 = 0x1_0000;

/// Unmapped bytes left after every allocation
const GUARD: u64 = 0x40;

const BASIC_KINDS: [BasicKind; 24] = [
    BasicKind::Void,
    BasicKind::Bool,
    BasicKind::Char,
    BasicKind::SignedChar,
    BasicKind::UnsignedChar,
    BasicKind::WChar,
    BasicKind::Char8,
    BasicKind::Char16,
    BasicKind::Char32,
    BasicKind::Short,
    BasicKind::UnsignedShort,
    BasicKind::Int,
    BasicKind::UnsignedInt,
    BasicKind::Long,
    BasicKind::UnsignedLong,
    BasicKind::LongLong,
    BasicKind::UnsignedLongLong,
    BasicKind::Int128,
    BasicKind::UnsignedInt128,
    BasicKind::Half,
    BasicKind::Float,
    BasicKind::Double,
    BasicKind::LongDouble,
    BasicKind::NullPtr,
];

/// Type table plus sparse little-endian memory
///
/// ## Example
///
/// ```rust
/// use lens_core::host::Introspection;
/// use lens_core::snapshot::MemoryImage;
/// use lens_core::types::{Address, BasicKind};
///
/// let mut image = MemoryImage::new();
/// let int = image.basic(BasicKind::Int);
/// let point = image.define("Point").field("x", int).field("y", int).build();
/// let value = image.new_value("p", point).unwrap();
/// image.set_signed(&value, "y", -4).unwrap();
///
/// let mut buf = [0u8; 4];
/// image.read_memory(value.address() + 4, &mut buf).unwrap();
/// assert_eq!(i32::from_le_bytes(buf), -4);
/// assert!(image.read_memory(Address::new(0x10), &mut buf).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct MemoryImage
{
    types: Vec<TypeInfo>,
    by_name: HashMap<String, TypeHandle>,
    basics: HashMap<BasicKind, TypeHandle>,
    pointers: HashMap<TypeHandle, TypeHandle>,
    arrays: HashMap<(TypeHandle, u64), TypeHandle>,
    regions: BTreeMap<u64, Vec<u8>>,
    next: u64,
    globals: HashMap<String, RemoteValue>,
}

impl Default for MemoryImage
{
    fn default() -> Self
    {
        Self::new()
    }
}

impl MemoryImage
{
    /// Empty image knowing every basic type
    #[must_use]
    pub fn new() -> Self
    {
        let mut image = MemoryImage {
            types: Vec::new(),
            by_name: HashMap::new(),
            basics: HashMap::new(),
            pointers: HashMap::new(),
            arrays: HashMap::new(),
            regions: BTreeMap::new(),
            next: HEAP_START,
            globals: HashMap::new(),
        };
        for kind in BASIC_KINDS {
            let handle = image.push_type(TypeInfo::basic(kind));
            image.basics.insert(kind, handle);
        }
        image
    }

    fn push_type(&mut self, info: TypeInfo) -> TypeHandle
    {
        let handle = TypeHandle(u32::try_from(self.types.len()).unwrap_or(u32::MAX));
        self.by_name.insert(info.name.clone(), handle);
        self.types.push(info);
        handle
    }

    // ---- types ------------------------------------------------------------

    /// Handle of a basic type
    #[must_use]
    pub fn basic(&self, kind: BasicKind) -> TypeHandle
    {
        self.basics.get(&kind).copied().unwrap_or(TypeHandle(0))
    }

    /// Pointer to `pointee` (one handle per pointee)
    pub fn pointer_to(&mut self, pointee: TypeHandle) -> TypeHandle
    {
        if let Some(handle) = self.pointers.get(&pointee) {
            return *handle;
        }
        let name = format!("{} *", self.name_of(pointee));
        let handle = self.push_type(TypeInfo { name, byte_size: 8, kind: TypeKind::Pointer { pointee } });
        self.pointers.insert(pointee, handle);
        handle
    }

    /// Fixed-length array of `len` elements
    pub fn array_of(&mut self, element: TypeHandle, len: u64) -> TypeHandle
    {
        if let Some(handle) = self.arrays.get(&(element, len)) {
            return *handle;
        }
        let name = format!("{}[{len}]", self.name_of(element));
        let byte_size = self.size_of(element).saturating_mul(len);
        let handle = self.push_type(TypeInfo { name, byte_size, kind: TypeKind::Array { element, len } });
        self.arrays.insert((element, len), handle);
        handle
    }

    /// Enumeration over `underlying`
    pub fn define_enum(&mut self, name: &str, underlying: BasicKind, members: &[(&str, i64)]) -> TypeHandle
    {
        let members = members
            .iter()
            .map(|(name, value)| EnumMember { name: (*name).to_string(), value: *value })
            .collect();
        self.push_type(TypeInfo {
            name: name.to_string(),
            byte_size: underlying.byte_size(),
            kind: TypeKind::Enumeration { underlying, members },
        })
    }

    /// Forward-declare a struct so pointers to it can be formed
    ///
    /// The struct has no members and no size until [`MemoryImage::complete`]
    /// builds it.
    pub fn declare(&mut self, name: &str) -> TypeHandle
    {
        self.push_type(TypeInfo {
            name: name.to_string(),
            byte_size: 0,
            kind: TypeKind::Struct { fields: Vec::new(), template_args: Vec::new() },
        })
    }

    /// Start a new struct definition
    pub fn define(&mut self, name: &str) -> StructBuilder<'_>
    {
        let handle = self.declare(name);
        self.complete(handle)
    }

    /// Give a declared struct its members
    pub fn complete(&mut self, handle: TypeHandle) -> StructBuilder<'_>
    {
        StructBuilder { image: self, handle, members: Vec::new(), template_args: Vec::new(), union: false }
    }

    /// Display name of a handle (`?` for foreign handles)
    #[must_use]
    pub fn name_of(&self, ty: TypeHandle) -> &str
    {
        self.type_info(ty).map_or("?", |info| info.name.as_str())
    }

    /// Byte size of a handle (zero for foreign handles)
    #[must_use]
    pub fn size_of(&self, ty: TypeHandle) -> u64
    {
        self.type_info(ty).map_or(0, |info| info.byte_size)
    }

    /// Natural alignment of a handle
    #[must_use]
    pub fn align_of(&self, ty: TypeHandle) -> u64
    {
        let Some(info) = self.type_info(ty) else {
            return 1;
        };
        match &info.kind {
            TypeKind::Basic(kind) => kind.byte_size().clamp(1, 16),
            TypeKind::Enumeration { underlying, .. } => underlying.byte_size().max(1),
            TypeKind::Pointer { .. } => 8,
            TypeKind::Array { element, .. } => self.align_of(*element),
            TypeKind::Struct { fields, .. } => fields.iter().map(|f| self.align_of(f.ty)).max().unwrap_or(1),
        }
    }

    /// Offset and type of a dotted member path (`_data.size_cache`, `rows.1.x`)
    ///
    /// Base subobjects are searched like in the accessor; numeric segments
    /// index fixed-length arrays. Pointers are never followed.
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::MissingField`] for the first segment that
    /// does not resolve.
    pub fn offset_of(&self, ty: TypeHandle, path: &str) -> Result<(u64, TypeHandle)>
    {
        let mut offset = 0u64;
        let mut current = ty;
        for segment in path.split('.').filter(|s| !s.is_empty()) {
            let info = self.type_info(current).ok_or(InspectError::UnknownTypeHandle(current.0))?;
            let (delta, next) = match &info.kind {
                TypeKind::Array { element, len } => {
                    let index: u64 = segment.parse().map_err(|_| missing(info, segment))?;
                    if index >= *len {
                        return Err(missing(info, segment));
                    }
                    (index * self.size_of(*element), *element)
                }
                _ => self.find_field(current, segment).ok_or_else(|| missing(info, segment))?,
            };
            offset += delta;
            current = next;
        }
        Ok((offset, current))
    }

    fn find_field(&self, ty: TypeHandle, name: &str) -> Option<(u64, TypeHandle)>
    {
        let fields = self.type_info(ty)?.fields();
        if let Some(field) = fields.iter().find(|f| !f.is_base && f.name == name) {
            return Some((field.offset, field.ty));
        }
        fields
            .iter()
            .filter(|f| f.is_base)
            .find_map(|base| self.find_field(base.ty, name).map(|(offset, ty)| (base.offset + offset, ty)))
    }

    // ---- memory -----------------------------------------------------------

    /// Allocate `size` zeroed bytes, surrounded by unmapped guard space
    pub fn alloc(&mut self, size: u64, align: u64) -> Address
    {
        let align = align.max(8);
        let start = self.next.div_ceil(align) * align;
        let len = usize::try_from(size.max(1)).unwrap_or(1);
        self.regions.insert(start, vec![0; len]);
        self.next = start + size.max(1) + GUARD;
        trace!(start = %Address::new(start), size, "region mapped");
        Address::new(start)
    }

    /// Allocate storage for one value of type `ty`
    ///
    /// ## Errors
    ///
    /// Fails for handles this image did not issue.
    pub fn new_value(&mut self, name: &str, ty: TypeHandle) -> Result<RemoteValue>
    {
        if self.type_info(ty).is_none() {
            return Err(InspectError::UnknownTypeHandle(ty.0));
        }
        let address = self.alloc(self.size_of(ty), self.align_of(ty));
        Ok(RemoteValue::new(name, address, ty))
    }

    /// Allocate a buffer of `count` consecutive values of type `ty`
    pub fn alloc_array(&mut self, ty: TypeHandle, count: u64) -> Address
    {
        self.alloc(self.size_of(ty).saturating_mul(count), self.align_of(ty))
    }

    /// Remove the region containing `address`, making it unreadable
    ///
    /// Returns whether a region was removed.
    pub fn unmap(&mut self, address: Address) -> bool
    {
        let start = self
            .regions
            .range(..=address.value())
            .next_back()
            .filter(|(start, bytes)| address.value() < **start + bytes.len() as u64)
            .map(|(start, _)| *start);
        start.is_some_and(|start| self.regions.remove(&start).is_some())
    }

    fn region_mut(&mut self, address: Address, len: usize) -> Result<&mut [u8]>
    {
        let unreadable = InspectError::Unreadable { address, len: len as u64 };
        let (start, bytes) = self.regions.range_mut(..=address.value()).next_back().ok_or(unreadable.clone())?;
        let from = usize::try_from(address.value() - *start).map_err(|_| unreadable.clone())?;
        let to = from.checked_add(len).ok_or(unreadable.clone())?;
        bytes.get_mut(from..to).ok_or(unreadable)
    }

    /// Overwrite bytes inside a mapped region
    ///
    /// ## Errors
    ///
    /// Fails if any byte falls outside a single mapped region.
    pub fn write(&mut self, address: Address, bytes: &[u8]) -> Result<()>
    {
        self.region_mut(address, bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    /// Store the low `size` bytes of `value`
    ///
    /// ## Errors
    ///
    /// Fails if the target bytes are unmapped.
    pub fn write_unsigned(&mut self, address: Address, value: u64, size: u64) -> Result<()>
    {
        let width = usize::try_from(size.min(8)).unwrap_or(8);
        self.write(address, &value.to_le_bytes()[..width])
    }

    /// Store a pointer-sized address
    ///
    /// ## Errors
    ///
    /// Fails if the target bytes are unmapped.
    pub fn write_pointer(&mut self, address: Address, target: Address) -> Result<()>
    {
        self.write_unsigned(address, target.value(), 8)
    }

    /// Store a float with the precision implied by `size`
    ///
    /// ## Errors
    ///
    /// Fails if the target bytes are unmapped.
    #[allow(clippy::cast_possible_truncation)]
    pub fn write_float(&mut self, address: Address, value: f64, size: u64) -> Result<()>
    {
        match size {
            2 => self.write(address, &half::f16::from_f64(value).to_le_bytes()),
            4 => self.write(address, &(value as f32).to_le_bytes()),
            _ => self.write(address, &value.to_le_bytes()),
        }
    }

    /// Member of `value` at a dotted path
    ///
    /// ## Errors
    ///
    /// See [`MemoryImage::offset_of`].
    pub fn member(&self, value: &RemoteValue, path: &str) -> Result<RemoteValue>
    {
        let (offset, ty) = self.offset_of(value.type_handle(), path)?;
        let name = path.rsplit('.').next().unwrap_or(path);
        Ok(RemoteValue::new(name, value.address() + offset, ty))
    }

    /// Store an unsigned integer in the member at `path`
    ///
    /// ## Errors
    ///
    /// Fails for unknown members and unmapped targets.
    pub fn set_unsigned(&mut self, value: &RemoteValue, path: &str, n: u64) -> Result<()>
    {
        let member = self.member(value, path)?;
        self.write_unsigned(member.address(), n, self.size_of(member.type_handle()))
    }

    /// Store a signed integer in the member at `path`
    ///
    /// ## Errors
    ///
    /// Fails for unknown members and unmapped targets.
    #[allow(clippy::cast_sign_loss)]
    pub fn set_signed(&mut self, value: &RemoteValue, path: &str, n: i64) -> Result<()>
    {
        self.set_unsigned(value, path, n as u64)
    }

    /// Store a float in the member at `path`
    ///
    /// ## Errors
    ///
    /// Fails for unknown members and unmapped targets.
    pub fn set_float(&mut self, value: &RemoteValue, path: &str, x: f64) -> Result<()>
    {
        let member = self.member(value, path)?;
        self.write_float(member.address(), x, self.size_of(member.type_handle()))
    }

    /// Store an address in the pointer member at `path`
    ///
    /// ## Errors
    ///
    /// Fails for unknown members and unmapped targets.
    pub fn set_pointer(&mut self, value: &RemoteValue, path: &str, target: Address) -> Result<()>
    {
        let member = self.member(value, path)?;
        self.write_pointer(member.address(), target)
    }

    /// Make a value visible through [`Introspection::find_global`]
    pub fn define_global(&mut self, name: &str, value: RemoteValue)
    {
        self.globals.insert(name.to_string(), value);
    }
}

fn missing(info: &TypeInfo, segment: &str) -> InspectError
{
    InspectError::MissingField { type_name: info.name.clone(), field: segment.to_string() }
}

impl Introspection for MemoryImage
{
    fn type_info(&self, ty: TypeHandle) -> Option<&TypeInfo>
    {
        self.types.get(ty.0 as usize)
    }

    fn find_type(&self, name: &str) -> Option<TypeHandle>
    {
        self.by_name.get(name).or_else(|| self.by_name.get(&normalize(name))).copied()
    }

    fn basic_type(&self, kind: BasicKind) -> Option<TypeHandle>
    {
        self.basics.get(&kind).copied()
    }

    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<()>
    {
        let unreadable = || InspectError::Unreadable { address, len: buf.len() as u64 };
        let (start, bytes) = self.regions.range(..=address.value()).next_back().ok_or_else(unreadable)?;
        let from = usize::try_from(address.value() - *start).map_err(|_| unreadable())?;
        let to = from.checked_add(buf.len()).ok_or_else(unreadable)?;
        let source = bytes.get(from..to).ok_or_else(unreadable)?;
        buf.copy_from_slice(source);
        Ok(())
    }

    fn find_global(&self, name: &str) -> Option<RemoteValue>
    {
        self.globals.get(name).cloned()
    }
}

/// One member of a struct under construction
#[derive(Debug, Clone)]
struct PendingMember
{
    name: String,
    ty: TypeHandle,
    is_base: bool,
}

/// Lays out a struct or union with natural alignment
#[derive(Debug)]
pub struct StructBuilder<'a>
{
    image: &'a mut MemoryImage,
    handle: TypeHandle,
    members: Vec<PendingMember>,
    template_args: Vec<TypeHandle>,
    union: bool,
}

impl StructBuilder<'_>
{
    /// Add a base-class subobject
    #[must_use]
    pub fn base(mut self, ty: TypeHandle) -> Self
    {
        let name = self.image.name_of(ty).to_string();
        self.members.push(PendingMember { name, ty, is_base: true });
        self
    }

    /// Add a data member
    #[must_use]
    pub fn field(mut self, name: &str, ty: TypeHandle) -> Self
    {
        self.members.push(PendingMember { name: name.to_string(), ty, is_base: false });
        self
    }

    /// Record a template argument
    #[must_use]
    pub fn template_arg(mut self, ty: TypeHandle) -> Self
    {
        self.template_args.push(ty);
        self
    }

    /// Overlap every member at offset zero
    #[must_use]
    pub fn union(mut self) -> Self
    {
        self.union = true;
        self
    }

    /// Compute offsets and size, returning the struct's handle
    pub fn build(self) -> TypeHandle
    {
        let StructBuilder { image, handle, members, template_args, union } = self;
        let mut fields = Vec::with_capacity(members.len());
        let mut end = 0u64;
        let mut align = 1u64;
        for member in members {
            let member_align = image.align_of(member.ty);
            let size = image.size_of(member.ty);
            align = align.max(member_align);
            let offset = if union { 0 } else { end.div_ceil(member_align) * member_align };
            end = if union { end.max(size) } else { offset + size };
            fields.push(Field { name: member.name, ty: member.ty, offset, is_base: member.is_base });
        }
        let byte_size = end.div_ceil(align) * align;
        if let Some(info) = image.types.get_mut(handle.0 as usize) {
            info.byte_size = byte_size;
            info.kind = TypeKind::Struct { fields, template_args };
        }
        handle
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_struct_layout_uses_natural_alignment()
    {
        let mut image = MemoryImage::new();
        let int = image.basic(BasicKind::Int);
        let byte = image.basic(BasicKind::Bool);
        let ptr = image.pointer_to(int);
        let ty = image.define("Mixed").field("flag", byte).field("count", int).field("data", ptr).build();

        assert_eq!(image.offset_of(ty, "count").unwrap().0, 4);
        assert_eq!(image.offset_of(ty, "data").unwrap().0, 8);
        assert_eq!(image.size_of(ty), 16);
    }

    #[test]
    fn test_union_overlaps_members()
    {
        let mut image = MemoryImage::new();
        let int = image.basic(BasicKind::Int);
        let double = image.basic(BasicKind::Double);
        let ty = image.define("Either").field("i", int).field("d", double).union().build();

        assert_eq!(image.offset_of(ty, "d").unwrap().0, 0);
        assert_eq!(image.size_of(ty), 8);
    }

    #[test]
    fn test_reads_fail_in_guard_gaps()
    {
        let mut image = MemoryImage::new();
        let first = image.alloc(8, 8);
        let second = image.alloc(8, 8);
        let mut buf = [0u8; 8];

        assert!(image.read_memory(first, &mut buf).is_ok());
        assert!(image.read_memory(first + 4, &mut buf).is_err());
        assert!(second.value() > first.value() + 8);
    }

    #[test]
    fn test_unmap_removes_region()
    {
        let mut image = MemoryImage::new();
        let address = image.alloc(16, 8);
        assert!(image.unmap(address + 8));
        let mut buf = [0u8; 1];
        assert!(image.read_memory(address, &mut buf).is_err());
        assert!(!image.unmap(address));
    }

    #[test]
    fn test_member_paths_search_bases_and_arrays()
    {
        let mut image = MemoryImage::new();
        let float = image.basic(BasicKind::Float);
        let pair = image.define("Pair").field("x", float).field("y", float).build();
        let rows = image.array_of(pair, 3);
        let base = image.define("Base").field("rows", rows).build();
        let derived = image.define("Derived").base(base).field("tail", float).build();

        assert_eq!(image.offset_of(derived, "rows.2.y").unwrap(), (20, float));
        assert_eq!(image.offset_of(derived, "tail").unwrap().0, 24);
        assert!(image.offset_of(derived, "rows.3").is_err());
    }
}
