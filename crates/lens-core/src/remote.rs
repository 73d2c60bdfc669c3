//! # Remote Value Accessor
//!
//! Thin, fallible adapter over the host's [`Introspection`] capability.
//!
//! Everything above this module reads memory through [`Remote`]. Two flavours
//! of every lookup exist:
//!
//! - `Option` returning methods ([`Remote::read_child`], [`Remote::cast_to`],
//!   [`Remote::peek_container_size`]) where a failure simply means "invalid",
//! - `Result` returning methods ([`Remote::field`], [`Remote::deref`],
//!   [`Remote::read_unsigned`]) for code that wants `?` and a reason.
//!
//! Nothing here panics on bad memory. A corrupt count or pointer turns into
//! `None`/`Err`, never into an out-of-bounds computation.

use tracing::trace;

use crate::error::{InspectError, Result};
use crate::host::Introspection;
use crate::types::{Address, BasicKind, RemoteValue, TypeHandle, TypeInfo, TypeKind};

/// Size of the hidden header word that precedes a copy-on-write buffer
pub const COW_SIZE_OFFSET: u64 = 8;

/// A struct member resolved against a concrete value
#[derive(Debug, Clone)]
pub struct Member
{
    /// The member as a value (named after the member)
    pub value: RemoteValue,
    /// Whether the member is a base-class subobject
    pub is_base: bool,
}

/// Accessor over a borrowed host
#[derive(Clone, Copy)]
pub struct Remote<'h>
{
    host: &'h dyn Introspection,
}

impl<'h> Remote<'h>
{
    /// Wrap a host capability
    #[must_use]
    pub fn new(host: &'h dyn Introspection) -> Self
    {
        Remote { host }
    }

    /// The wrapped host
    #[must_use]
    pub fn host(&self) -> &'h dyn Introspection
    {
        self.host
    }

    /// Describe a type handle
    #[must_use]
    pub fn info(&self, ty: TypeHandle) -> Option<&'h TypeInfo>
    {
        self.host.type_info(ty)
    }

    /// Describe the declared type of `value`
    #[must_use]
    pub fn type_of(&self, value: &RemoteValue) -> Option<&'h TypeInfo>
    {
        self.host.type_info(value.type_handle())
    }

    /// Host display name of the declared type of `value`
    #[must_use]
    pub fn type_name(&self, value: &RemoteValue) -> Option<&'h str>
    {
        self.type_of(value).map(|info| info.name.as_str())
    }

    /// Byte size of a type
    #[must_use]
    pub fn byte_size(&self, ty: TypeHandle) -> Option<u64>
    {
        self.info(ty).map(|info| info.byte_size)
    }

    /// Look a type up by name
    #[must_use]
    pub fn find_type(&self, name: &str) -> Option<TypeHandle>
    {
        self.host.find_type(name)
    }

    /// Handle of a built-in scalar type
    #[must_use]
    pub fn basic_type(&self, kind: BasicKind) -> Option<TypeHandle>
    {
        self.host.basic_type(kind)
    }

    fn describe(&self, value: &RemoteValue) -> Result<&'h TypeInfo>
    {
        self.type_of(value).ok_or(InspectError::UnknownTypeHandle(value.type_handle().0))
    }

    // ---- raw memory -------------------------------------------------------

    /// Whether `len` bytes starting at `address` can be read
    ///
    /// Only the first and the last byte are read, which is what the
    /// container validators need: the implied end of a buffer must exist.
    #[must_use]
    pub fn is_readable(&self, address: Address, len: u64) -> bool
    {
        if address.is_null() {
            return false;
        }
        let mut byte = [0u8; 1];
        if self.host.read_memory(address, &mut byte).is_err() {
            return false;
        }
        if len <= 1 {
            return true;
        }
        match address.checked_add(len - 1) {
            Some(last) => self.host.read_memory(last, &mut byte).is_ok(),
            None => false,
        }
    }

    /// Read `len` bytes at `address`
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::Unreadable`] if the range cannot be read.
    pub fn read_bytes(&self, address: Address, len: usize) -> Result<Vec<u8>>
    {
        let mut buf = vec![0u8; len];
        self.host.read_memory(address, &mut buf)?;
        Ok(buf)
    }

    /// Read a pointer-sized word at `address`
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::Unreadable`] if the word cannot be read.
    pub fn read_pointer_at(&self, address: Address) -> Result<Address>
    {
        let size = usize::try_from(self.host.pointer_size().min(8)).unwrap_or(8);
        let mut buf = [0u8; 8];
        self.host.read_memory(address, &mut buf[..size])?;
        Ok(Address::new(u64::from_le_bytes(buf)))
    }

    /// Read a little-endian `u64` at `address`
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::Unreadable`] if the word cannot be read.
    pub fn read_u64_at(&self, address: Address) -> Result<u64>
    {
        let mut buf = [0u8; 8];
        self.host.read_memory(address, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    // ---- scalars ----------------------------------------------------------

    /// Raw integer bits of a scalar value and its width in bytes
    ///
    /// ## Errors
    ///
    /// Fails if the value is wider than 16 bytes or unreadable.
    pub fn read_bits(&self, value: &RemoteValue) -> Result<(u128, u64)>
    {
        let info = self.describe(value)?;
        let size = info.byte_size;
        if size == 0 || size > 16 {
            return Err(InspectError::Corrupt(format!("{size} bytes is not a scalar width")));
        }
        let width = usize::try_from(size).map_err(|_| InspectError::Corrupt(format!("{size} bytes")))?;
        let mut buf = [0u8; 16];
        self.host.read_memory(value.address(), &mut buf[..width])?;
        Ok((u128::from_le_bytes(buf), size))
    }

    /// Read a scalar as an unsigned integer (zero-extended, truncated to 64 bits)
    ///
    /// ## Errors
    ///
    /// Fails if the value is unreadable or not scalar-sized.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_unsigned(&self, value: &RemoteValue) -> Result<u64>
    {
        let (bits, _) = self.read_bits(value)?;
        Ok(bits as u64)
    }

    /// Read a scalar as a signed integer, sign-extended from its own width
    ///
    /// ## Errors
    ///
    /// Fails if the value is unreadable or not scalar-sized.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn read_signed(&self, value: &RemoteValue) -> Result<i64>
    {
        let (bits, size) = self.read_bits(value)?;
        Ok(sign_extend(bits, size) as i64)
    }

    /// Read a floating point scalar
    ///
    /// The byte width picks the precision: 2 bytes is half, up to 4 bytes is
    /// single, anything wider is read as double.
    ///
    /// ## Errors
    ///
    /// Fails if the value is unreadable or not scalar-sized.
    #[allow(clippy::cast_possible_truncation)]
    pub fn read_float(&self, value: &RemoteValue) -> Result<f64>
    {
        let (bits, size) = self.read_bits(value)?;
        Ok(match size {
            2 => f64::from(half::f16::from_bits(bits as u16)),
            0..=4 => f64::from(f32::from_bits(bits as u32)),
            _ => f64::from_bits(bits as u64),
        })
    }

    /// Read a child scalar by member name as unsigned
    ///
    /// ## Errors
    ///
    /// Fails if the member is missing or unreadable.
    pub fn field_unsigned(&self, value: &RemoteValue, name: &str) -> Result<u64>
    {
        self.read_unsigned(&self.field(value, name)?)
    }

    /// Read a child scalar by member name as signed
    ///
    /// ## Errors
    ///
    /// Fails if the member is missing or unreadable.
    pub fn field_signed(&self, value: &RemoteValue, name: &str) -> Result<i64>
    {
        self.read_signed(&self.field(value, name)?)
    }

    /// Read a child scalar by member name as float
    ///
    /// ## Errors
    ///
    /// Fails if the member is missing or unreadable.
    pub fn field_float(&self, value: &RemoteValue, name: &str) -> Result<f64>
    {
        self.read_float(&self.field(value, name)?)
    }

    // ---- pointers ---------------------------------------------------------

    /// Target address stored in a pointer value
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::NotAPointer`] for non-pointer values.
    pub fn pointer_value(&self, value: &RemoteValue) -> Result<Address>
    {
        let info = self.describe(value)?;
        if !info.is_pointer() {
            return Err(InspectError::NotAPointer(value.name().to_string()));
        }
        self.read_pointer_at(value.address())
    }

    /// Follow a pointer once
    ///
    /// The pointee must be readable for its full byte size (or one byte for
    /// incomplete types).
    ///
    /// ## Errors
    ///
    /// Fails for non-pointers, null pointers and unreadable targets.
    pub fn deref(&self, value: &RemoteValue) -> Result<RemoteValue>
    {
        let info = self.describe(value)?;
        let pointee = info.pointee().ok_or_else(|| InspectError::NotAPointer(value.name().to_string()))?;
        let target = self.read_pointer_at(value.address())?;
        if target.is_null() {
            return Err(InspectError::NullDereference(value.name().to_string()));
        }
        let size = self.byte_size(pointee).unwrap_or(0).max(1);
        if !self.is_readable(target, size) {
            return Err(InspectError::Unreadable { address: target, len: size });
        }
        Ok(RemoteValue::new(format!("*{}", value.name()), target, pointee))
    }

    /// Whether `value` is a non-null pointer whose target can be read
    ///
    /// `false` for a missing handle, a non-pointer, a zero pointer or a
    /// failing dereference.
    #[must_use]
    pub fn is_valid_pointer(&self, value: Option<&RemoteValue>) -> bool
    {
        value.is_some_and(|v| self.deref(v).is_ok())
    }

    /// Whether `value` is a readable pointer holding zero
    ///
    /// A missing handle or unreadable pointer is not considered null: callers
    /// validating list sentinels must not accept garbage as "end of list".
    #[must_use]
    pub fn is_null_pointer(&self, value: Option<&RemoteValue>) -> bool
    {
        value.is_some_and(|v| self.pointer_value(v).is_ok_and(Address::is_null))
    }

    // ---- members ----------------------------------------------------------

    /// Member `name` of `value`, following one pointer level and base classes
    #[must_use]
    pub fn read_child(&self, value: &RemoteValue, name: &str) -> Option<RemoteValue>
    {
        let info = self.type_of(value)?;
        if info.is_pointer() {
            let target = self.deref(value).ok()?;
            return self.read_child(&target, name);
        }
        self.find_member(value, info, name)
    }

    fn find_member(&self, value: &RemoteValue, info: &TypeInfo, name: &str) -> Option<RemoteValue>
    {
        let fields = info.fields();
        if let Some(field) = fields.iter().find(|f| !f.is_base && f.name == name) {
            let address = value.address().checked_add(field.offset)?;
            return Some(RemoteValue::new(name, address, field.ty));
        }
        fields.iter().filter(|f| f.is_base).find_map(|base| {
            let address = value.address().checked_add(base.offset)?;
            let base_value = RemoteValue::new(&base.name, address, base.ty);
            let base_info = self.info(base.ty)?;
            self.find_member(&base_value, base_info, name)
        })
    }

    /// Member `name` of `value`
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::MissingField`] when the member cannot be found
    /// or the enclosing pointer cannot be followed.
    pub fn field(&self, value: &RemoteValue, name: &str) -> Result<RemoteValue>
    {
        self.read_child(value, name).ok_or_else(|| InspectError::MissingField {
            type_name: self.type_name(value).unwrap_or("?").to_string(),
            field: name.to_string(),
        })
    }

    /// Follow a chain of member names
    ///
    /// ## Errors
    ///
    /// Fails at the first missing member.
    pub fn field_path(&self, value: &RemoteValue, path: &[&str]) -> Result<RemoteValue>
    {
        let mut current = value.clone();
        for name in path {
            current = self.field(&current, name)?;
        }
        Ok(current)
    }

    /// All direct members of a struct value, base subobjects first
    ///
    /// ## Errors
    ///
    /// Fails if the type cannot be described.
    pub fn members(&self, value: &RemoteValue) -> Result<Vec<Member>>
    {
        let info = self.describe(value)?;
        match &info.kind {
            TypeKind::Struct { fields, .. } => fields
                .iter()
                .map(|field| {
                    let address = value
                        .address()
                        .checked_add(field.offset)
                        .ok_or(InspectError::AddressOverflow(value.address()))?;
                    Ok(Member { value: RemoteValue::new(&field.name, address, field.ty), is_base: field.is_base })
                })
                .collect(),
            TypeKind::Array { len, .. } => (0..*len)
                .map(|i| Ok(Member { value: self.array_element(value, i)?, is_base: false }))
                .collect(),
            _ => Ok(Vec::new()),
        }
    }

    /// Element `index` of a fixed-length array value
    ///
    /// ## Errors
    ///
    /// Fails for non-arrays and out-of-range indices.
    pub fn array_element(&self, value: &RemoteValue, index: u64) -> Result<RemoteValue>
    {
        let info = self.describe(value)?;
        let TypeKind::Array { element, len } = info.kind else {
            return Err(InspectError::Corrupt(format!("{} is not an array", info.name)));
        };
        if index >= len {
            return Err(InspectError::Corrupt(format!("index {index} out of bounds for {}", info.name)));
        }
        let stride = self.byte_size(element).ok_or(InspectError::UnknownTypeHandle(element.0))?;
        let address = value
            .address()
            .element(index, stride)
            .ok_or(InspectError::AddressOverflow(value.address()))?;
        Ok(RemoteValue::new(format!("[{index}]"), address, element))
    }

    // ---- casts and synthesis ----------------------------------------------

    /// Reinterpret `value` as the named type, keeping its address
    #[must_use]
    pub fn cast_to(&self, value: &RemoteValue, type_name: &str) -> Option<RemoteValue>
    {
        let ty = self.find_type(type_name)?;
        self.value_at(value.name(), value.address(), ty)
    }

    /// Create a value of type `ty` at an arbitrary address
    ///
    /// Returns `None` when the bytes of the value are not readable.
    #[must_use]
    pub fn value_at(&self, name: &str, address: Address, ty: TypeHandle) -> Option<RemoteValue>
    {
        let size = self.byte_size(ty)?;
        if !self.is_readable(address, size.max(1)) {
            trace!(%address, size, "value_at: unreadable");
            return None;
        }
        Some(RemoteValue::new(name, address, ty))
    }

    /// Template argument `index` of the declared type of `value`
    #[must_use]
    pub fn template_arg(&self, value: &RemoteValue, index: usize) -> Option<TypeHandle>
    {
        let info = self.type_of(value)?;
        if let Some(pointee) = info.pointee() {
            return self.info(pointee)?.template_arg(index);
        }
        info.template_arg(index)
    }

    // ---- container headers ------------------------------------------------

    /// Element count of a copy-on-write buffer
    ///
    /// `cow` is the header struct holding the `_ptr` member. The count lives
    /// in the word just before the first element.
    ///
    /// - a null buffer has size `Some(0)`,
    /// - an unreadable buffer or a negative stored count is `None`,
    /// - a positive count is only trusted when the implied last element is
    ///   readable.
    #[must_use]
    pub fn peek_container_size(&self, cow: &RemoteValue) -> Option<u64>
    {
        let ptr = self.read_child(cow, "_ptr")?;
        let pointee = self.type_of(&ptr)?.pointee()?;
        let base = self.pointer_value(&ptr).ok()?;
        if base.is_null() {
            return Some(0);
        }
        if !self.is_valid_pointer(Some(&ptr)) {
            trace!(%base, "cow buffer pointer is not readable");
            return None;
        }

        let stored = self.read_u64_at(base.checked_sub(COW_SIZE_OFFSET)?).ok()?;
        if i64::try_from(stored).is_err() {
            trace!(%base, stored, "cow header holds a negative size");
            return None;
        }
        if stored > 0 {
            let item_size = self.byte_size(pointee)?;
            if item_size == 0 {
                return None;
            }
            let last = base.element(stored - 1, item_size)?;
            if !self.is_readable(last, item_size) {
                trace!(%base, stored, "cow buffer end is not readable");
                return None;
            }
        }
        Some(stored)
    }

    /// Read a NUL-terminated narrow string of at most `limit` bytes
    ///
    /// Returns the decoded text and whether the terminator was reached.
    ///
    /// ## Errors
    ///
    /// Fails if the first byte cannot be read.
    pub fn read_c_string(&self, address: Address, limit: usize) -> Result<(Vec<u8>, bool)>
    {
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        for i in 0..limit as u64 {
            let at = address.checked_add(i).ok_or(InspectError::AddressOverflow(address))?;
            if let Err(err) = self.host.read_memory(at, &mut byte) {
                if i == 0 {
                    return Err(err);
                }
                return Ok((out, false));
            }
            if byte[0] == 0 {
                return Ok((out, true));
            }
            out.push(byte[0]);
        }
        Ok((out, false))
    }
}

/// Sign-extend the low `size` bytes of `bits`
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn sign_extend(bits: u128, size: u64) -> i128
{
    let width = (size.min(16) * 8) as u32;
    if width == 0 || width >= 128 {
        return bits as i128;
    }
    let shift = 128 - width;
    ((bits << shift) as i128) >> shift
}

#[cfg(test)]
mod tests
{
    use super::sign_extend;

    #[test]
    fn test_sign_extend_widths()
    {
        assert_eq!(sign_extend(0xff, 1), -1);
        assert_eq!(sign_extend(0x7f, 1), 127);
        assert_eq!(sign_extend(0xffff_fffe, 4), -2);
        assert_eq!(sign_extend(0x8000_0000_0000_0000, 8), i128::from(i64::MIN));
    }
}
