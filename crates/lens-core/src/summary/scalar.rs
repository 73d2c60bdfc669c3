//! Leaf formatting: integers, floats, booleans and enums.

use crate::error::{InspectError, Result};
use crate::remote::{sign_extend, Remote};
use crate::types::{BasicKind, EnumMember, RemoteValue, TypeInfo, TypeKind};

use super::{INVALID, NULL};

/// Format a scalar or enum value using its declared type
///
/// ## Errors
///
/// Fails when the bytes cannot be read or the value is not a leaf.
pub fn format_leaf(remote: &Remote<'_>, value: &RemoteValue, info: &TypeInfo) -> Result<String>
{
    match &info.kind {
        TypeKind::Basic(kind) => format_basic(remote, value, *kind),
        TypeKind::Enumeration { members, .. } => {
            let raw = remote.read_signed(value)?;
            Ok(format_enum(raw, members))
        }
        _ => Err(InspectError::Corrupt(format!("{} is not a scalar", info.name))),
    }
}

#[allow(clippy::cast_possible_truncation)]
fn format_basic(remote: &Remote<'_>, value: &RemoteValue, kind: BasicKind) -> Result<String>
{
    match kind {
        BasicKind::Void => Ok(INVALID.to_string()),
        BasicKind::NullPtr => Ok(NULL.to_string()),
        BasicKind::Bool => Ok((remote.read_unsigned(value)? != 0).to_string()),
        BasicKind::Half | BasicKind::Float | BasicKind::Double | BasicKind::LongDouble => {
            let (bits, size) = remote.read_bits(value)?;
            Ok(match size {
                2 => format_float(f64::from(half::f16::from_bits(bits as u16))),
                0..=4 => format_single(f32::from_bits(bits as u32)),
                _ => format_float(f64::from_bits(bits as u64)),
            })
        }
        _ if kind.is_signed() => {
            let (bits, size) = remote.read_bits(value)?;
            Ok(sign_extend(bits, size).to_string())
        }
        _ => {
            let (bits, _) = remote.read_bits(value)?;
            Ok(bits.to_string())
        }
    }
}

/// Shortest round-tripping form of a double (`1.0`, `0.25`, `1e20`)
#[must_use]
pub fn format_float(value: f64) -> String
{
    format!("{value:?}")
}

/// Shortest round-tripping form of a single-precision float
#[must_use]
pub fn format_single(value: f32) -> String
{
    format!("{value:?}")
}

/// Render an enum value by name
///
/// - an exact member match prints that member's name,
/// - otherwise every member sharing bits with the value is listed as a flag
///   (`A | B`), followed by the leftover bits in hex,
/// - an enum without declared members prints `<Invalid Enum> (n)`.
#[must_use]
#[allow(clippy::cast_sign_loss)]
pub fn format_enum(value: i64, members: &[EnumMember]) -> String
{
    if members.is_empty() {
        return format!("<Invalid Enum> ({value})");
    }
    if let Some(member) = members.iter().find(|m| m.value == value) {
        return member.name.clone();
    }

    let original = value as u64;
    let mut remaining = original;
    let mut flags: Vec<&str> = Vec::new();
    for member in members {
        let bits = member.value as u64;
        if bits & remaining != 0 {
            flags.push(&member.name);
            remaining &= !bits;
        }
    }
    let mut out = flags.join(" | ");
    if remaining != 0 || out.is_empty() {
        if !out.is_empty() {
            out.push_str(" | ");
        }
        out.push_str(&format!("0x{remaining:x}"));
    }
    out
}

#[cfg(test)]
mod tests
{
    use super::*;

    fn members(pairs: &[(&str, i64)]) -> Vec<EnumMember>
    {
        pairs.iter().map(|(name, value)| EnumMember { name: (*name).to_string(), value: *value }).collect()
    }

    #[test]
    fn test_enum_exact_match()
    {
        let m = members(&[("NONE", 0), ("READ", 1), ("WRITE", 2)]);
        assert_eq!(format_enum(2, &m), "WRITE");
        assert_eq!(format_enum(0, &m), "NONE");
    }

    #[test]
    fn test_enum_flag_union_with_residual()
    {
        let m = members(&[("READ", 1), ("WRITE", 2), ("EXEC", 4)]);
        assert_eq!(format_enum(3, &m), "READ | WRITE");
        assert_eq!(format_enum(0x13, &m), "READ | WRITE | 0x10");
        assert_eq!(format_enum(0x40, &m), "0x40");
    }

    #[test]
    fn test_enum_without_members()
    {
        assert_eq!(format_enum(7, &[]), "<Invalid Enum> (7)");
    }

    #[test]
    fn test_float_forms()
    {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_single(0.1), "0.1");
        assert_eq!(format_single(-2.5), "-2.5");
    }
}
