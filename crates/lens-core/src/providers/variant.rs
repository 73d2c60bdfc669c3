//! The runtime's tagged union of dynamic values.

use tracing::debug;

use super::{Sequence, Shape};
use crate::error::{InspectError, Result};
use crate::remote::Remote;
use crate::session::Inspector;
use crate::summary::scalar::format_float;
use crate::summary::{Budget, INVALID, NIL, NULL, TRUNCATED};
use crate::types::RemoteValue;

/// Number of discriminant values; anything at or above is corrupt
pub const VARIANT_MAX: u64 = 38;

const NIL_TYPE: u64 = 0;
const BOOL: u64 = 1;
const INT: u64 = 2;
const FLOAT: u64 = 3;
const OBJECT: u64 = 24;

/// How the payload of one discriminant is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload
{
    /// No payload
    Empty,
    /// A scalar member of the `_data` union
    Inline(&'static str),
    /// A pointer member of the `_data` union to an out-of-line value
    Boxed(&'static str),
    /// The `_mem` bytes reinterpreted as the named type
    Cast(&'static str),
    /// `Variant::ObjData` in `_mem`, holding the object pointer
    Object,
    /// `packed_array` pointing at a `Variant::PackedArrayRef<T>`
    Packed(&'static [&'static str]),
}

/// Payload layout for a discriminant in `0..VARIANT_MAX`
const fn payload(kind: u64) -> Payload
{
    match kind {
        1 => Payload::Inline("_bool"),
        2 => Payload::Inline("_int"),
        3 => Payload::Inline("_float"),
        4 => Payload::Cast("String"),
        5 => Payload::Cast("Vector2"),
        6 => Payload::Cast("Vector2i"),
        7 => Payload::Cast("Rect2"),
        8 => Payload::Cast("Rect2i"),
        9 => Payload::Cast("Vector3"),
        10 => Payload::Cast("Vector3i"),
        11 => Payload::Boxed("_transform2d"),
        12 => Payload::Cast("Vector4"),
        13 => Payload::Cast("Vector4i"),
        14 => Payload::Cast("Plane"),
        15 => Payload::Cast("Quaternion"),
        16 => Payload::Boxed("_aabb"),
        17 => Payload::Boxed("_basis"),
        18 => Payload::Boxed("_transform3d"),
        19 => Payload::Boxed("_projection"),
        20 => Payload::Cast("Color"),
        21 => Payload::Cast("StringName"),
        22 => Payload::Cast("NodePath"),
        23 => Payload::Cast("RID"),
        24 => Payload::Object,
        25 => Payload::Cast("Callable"),
        26 => Payload::Cast("Signal"),
        27 => Payload::Cast("Dictionary"),
        28 => Payload::Cast("Array"),
        29 => Payload::Packed(&["unsigned char", "uint8_t"]),
        30 => Payload::Packed(&["int", "int32_t"]),
        31 => Payload::Packed(&["long long", "long", "int64_t"]),
        32 => Payload::Packed(&["float"]),
        33 => Payload::Packed(&["double"]),
        34 => Payload::Packed(&["String"]),
        35 => Payload::Packed(&["Vector2"]),
        36 => Payload::Packed(&["Vector3"]),
        37 => Payload::Packed(&["Color"]),
        _ => Payload::Empty,
    }
}

/// Provider for `Variant`
///
/// The `type` discriminant picks how `_data` is read. `NIL` is a valid
/// value without children; a discriminant out of range, or a payload that
/// cannot be reached, makes the variant invalid. A valid non-nil variant
/// has exactly one child: its payload.
#[derive(Debug)]
pub struct VariantProvider
{
    value: RemoteValue,
    kind: Option<u64>,
    payload: Option<RemoteValue>,
}

impl VariantProvider
{
    #[must_use]
    pub fn new(value: RemoteValue) -> Self
    {
        VariantProvider { value, kind: None, payload: None }
    }

    /// Discriminant read by the last update, when valid
    #[must_use]
    pub const fn discriminant(&self) -> Option<u64>
    {
        self.kind
    }

    fn resolve(&self, remote: &Remote<'_>, kind: u64) -> Result<Option<RemoteValue>>
    {
        if kind >= VARIANT_MAX {
            return Err(InspectError::Corrupt(format!("variant type {kind} is out of range")));
        }
        let data = remote.field(&self.value, "_data")?;
        let found = match payload(kind) {
            Payload::Empty => return Ok(None),
            Payload::Inline(member) => remote.field(&data, member)?,
            Payload::Boxed(member) => remote.deref(&remote.field(&data, member)?)?,
            Payload::Cast(type_name) => {
                let mem = remote.field(&data, "_mem")?;
                remote.cast_to(&mem, type_name).ok_or_else(|| InspectError::UnknownType(type_name.to_string()))?
            }
            Payload::Object => {
                let mem = remote.field(&data, "_mem")?;
                let obj_data = remote
                    .cast_to(&mem, "Variant::ObjData")
                    .ok_or_else(|| InspectError::UnknownType("Variant::ObjData".to_string()))?;
                remote.field(&obj_data, "obj")?
            }
            Payload::Packed(elements) => {
                let pointer = remote.field(&data, "packed_array")?;
                let target = remote.pointer_value(&pointer)?;
                if target.is_null() {
                    return Err(InspectError::NullDereference("packed_array".to_string()));
                }
                let reference = elements
                    .iter()
                    .find_map(|element| remote.find_type(&format!("Variant::PackedArrayRef<{element}>")))
                    .ok_or_else(|| InspectError::UnknownType(format!("Variant::PackedArrayRef<{}>", elements[0])))?;
                let reference = remote
                    .value_at("packed_array", target, reference)
                    .ok_or(InspectError::Unreadable { address: target, len: 1 })?;
                remote.field(&reference, "array")?
            }
        };
        Ok(Some(found.renamed("[value]")))
    }
}

impl Shape for VariantProvider
{
    fn update(&mut self, cx: &Inspector<'_>)
    {
        let remote = cx.remote();
        self.kind = None;
        self.payload = None;
        let kind = match remote.field_unsigned(&self.value, "type") {
            Ok(kind) => kind,
            Err(err) => {
                debug!(value = %self.value, %err, "variant type unreadable");
                return;
            }
        };
        match self.resolve(&remote, kind) {
            Ok(payload) => {
                self.kind = Some(kind);
                self.payload = payload;
            }
            Err(err) => debug!(value = %self.value, kind, %err, "variant payload unreachable"),
        }
    }

    fn is_valid(&self) -> bool
    {
        self.kind.is_some()
    }

    fn child_count(&self) -> usize
    {
        usize::from(self.payload.is_some())
    }

    fn child_at(&mut self, _cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        if index == 0 { self.payload.clone() } else { None }
    }

    fn index_of_child(&mut self, _cx: &Inspector<'_>, name: &str) -> Option<usize>
    {
        (name == "[value]" && self.payload.is_some()).then_some(0)
    }

    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String
    {
        let remote = cx.remote();
        let (Some(kind), payload) = (self.kind, self.payload.as_ref()) else {
            return INVALID.to_string();
        };
        if kind == NIL_TYPE {
            return NIL.to_string();
        }
        let Some(payload) = payload else {
            return INVALID.to_string();
        };
        let text = match kind {
            BOOL => remote.read_unsigned(payload).map(|v| (v != 0).to_string()),
            INT => remote.read_signed(payload).map(|v| v.to_string()),
            FLOAT => remote.read_float(payload).map(format_float),
            OBJECT => {
                let class = remote
                    .type_of(payload)
                    .and_then(|info| info.pointee())
                    .and_then(|ty| remote.info(ty))
                    .map_or("Object", |info| info.name.as_str());
                let inner = match remote.pointer_value(payload) {
                    Ok(address) if address.is_null() => NULL,
                    Ok(_) => TRUNCATED,
                    Err(_) => INVALID,
                };
                Ok(format!("{{{class}*:{inner}}}"))
            }
            _ => cx.try_summarize(payload, budget),
        };
        text.unwrap_or_else(|_| INVALID.to_string())
    }
}

impl Sequence for VariantProvider
{
    fn label(&self) -> &str
    {
        "Variant"
    }
}
