//! Summaries of the runtime's own value types.
//!
//! Strings and names are decoded from their buffers; math types print their
//! components; the key/value pair types print `key: value`. Math types call
//! each other's formatters directly instead of going back through the depth
//! budget, so a `Transform3D` always shows its full basis.

use crate::catalog::SummaryKind;
use crate::error::{InspectError, Result};
use crate::providers::{map, ArrayLayout, ArrayProvider, Shape};
use crate::remote::Remote;
use crate::session::Inspector;
use crate::types::{RemoteValue, TypeKind};

use super::scalar::format_leaf;
use super::{clip, Budget, EMPTY, INVALID, NULL, TRUNCATED};

/// Largest string size the runtime can hold when sizes are 32-bit
const MAX_32_BIT_STRING: u64 = 0x7fff_ffff;

/// Format a value bound to a builtin summary
///
/// ## Errors
///
/// Fails when a required member is missing or unreadable. Callers render
/// the failure as `<invalid>`.
pub(crate) fn summarize(cx: &Inspector<'_>, kind: SummaryKind, value: &RemoteValue, budget: Budget) -> Result<String>
{
    let remote = cx.remote();
    match kind {
        SummaryKind::String => string(cx, value, budget, Encoding::Utf32),
        SummaryKind::CharString => string(cx, value, budget, Encoding::Utf8),
        SummaryKind::StringName => string_name(cx, value, budget),
        SummaryKind::NodePath => node_path(cx, value, budget),
        SummaryKind::Ref => reference(cx, value, budget),
        SummaryKind::Vector2 | SummaryKind::Vector2i => components(&remote, value, &["x", "y"]),
        SummaryKind::Vector3 | SummaryKind::Vector3i => components(&remote, value, &["x", "y", "z"]),
        SummaryKind::Vector4 | SummaryKind::Vector4i => components(&remote, value, &["x", "y", "z", "w"]),
        SummaryKind::Rect2 | SummaryKind::Rect2i => rect(&remote, value),
        SummaryKind::Transform2D => transform_2d(&remote, value),
        SummaryKind::Transform3D => transform_3d(&remote, value),
        SummaryKind::Basis => basis(&remote, value),
        SummaryKind::Projection => projection(&remote, value),
        SummaryKind::Plane => plane(&remote, value),
        SummaryKind::Aabb => aabb(&remote, value),
        SummaryKind::Quaternion => {
            let inner = join_fields(&remote, value, &["x", "y", "z", "w"])?;
            Ok(format!("{{{inner}}}"))
        }
        SummaryKind::Color => color(cx, value),
        SummaryKind::Rid => Ok(format!("<RID={}>", remote.field_unsigned(value, "_id")?)),
        SummaryKind::ObjectId => Ok(object_id(&remote, value)),
        SummaryKind::Signal => signal(cx, value, budget),
        SummaryKind::Callable => callable(cx, value, budget),
        SummaryKind::KeyValue => key_value(cx, value, budget, false),
        SummaryKind::HashMapElement => map_element(cx, &remote.field(value, "data")?, budget),
        SummaryKind::RBMapElement => map_element(cx, &remote.field(value, "_data")?, budget),
        SummaryKind::VMapPair => vmap_pair(cx, value, budget),
    }
}

// ---- strings --------------------------------------------------------------

#[derive(Clone, Copy)]
enum Encoding
{
    Utf8,
    Utf32,
}

fn string(cx: &Inspector<'_>, value: &RemoteValue, budget: Budget, encoding: Encoding) -> Result<String>
{
    let remote = cx.remote();
    let options = cx.options();
    let cow = remote.field(value, "_cowdata")?;
    let size = remote
        .peek_container_size(&cow)
        .ok_or_else(|| InspectError::Corrupt(format!("{}: unreadable string buffer", value.name())))?;
    if size == 0 {
        return Ok(EMPTY.to_string());
    }
    if options.strings_limited_to_32_bit && size > MAX_32_BIT_STRING {
        return Err(InspectError::Corrupt(format!("{}: string size {size} out of range", value.name())));
    }

    let limit = options.max_summary_length.saturating_sub(budget.consumed).max(1);
    let base = remote.pointer_value(&remote.field(&cow, "_ptr")?)?;
    // One character past the limit tells `clip` that there was more
    let wanted = size.min(limit as u64 + 1);
    let text = match encoding {
        Encoding::Utf8 => {
            let bytes = remote.read_bytes(base, to_usize(wanted)?)?;
            String::from_utf8_lossy(&bytes).into_owned()
        }
        Encoding::Utf32 => {
            let bytes = remote.read_bytes(base, to_usize(wanted * 4)?)?;
            bytes
                .chunks_exact(4)
                .map(|unit| {
                    let code = u32::from_le_bytes([unit[0], unit[1], unit[2], unit[3]]);
                    char::from_u32(code).unwrap_or(char::REPLACEMENT_CHARACTER)
                })
                .collect()
        }
    };
    let text = text.trim_end_matches('\0');
    let shown = if options.sanitize_string_output { text.escape_debug().to_string() } else { text.to_string() };
    Ok(format!("\"{}\"", clip(&shown, limit)))
}

fn to_usize(n: u64) -> Result<usize>
{
    usize::try_from(n).map_err(|_| InspectError::Corrupt(format!("{n} bytes")))
}

fn string_name(cx: &Inspector<'_>, value: &RemoteValue, budget: Budget) -> Result<String>
{
    let remote = cx.remote();
    let data = remote.field(value, "_data")?;
    if remote.pointer_value(&data)?.is_null() {
        return Ok(NULL.to_string());
    }
    let target = remote.deref(&data)?;
    let cname = remote.field(&target, "cname")?;
    if remote.pointer_value(&cname)?.is_null() {
        let name = remote.field(&target, "name")?;
        return cx.try_summarize(&name, budget);
    }
    cx.try_summarize(&cname, budget)
}

fn node_path(cx: &Inspector<'_>, value: &RemoteValue, budget: Budget) -> Result<String>
{
    let remote = cx.remote();
    let data = remote.field(value, "data")?;
    if remote.pointer_value(&data)?.is_null() {
        return Ok(NULL.to_string());
    }
    let Ok(target) = remote.deref(&data) else {
        return Ok(INVALID.to_string());
    };

    let path = name_parts(cx, &remote.field(&target, "path")?, budget);
    let subpath = name_parts(cx, &remote.field(&target, "subpath")?, budget);
    if path.is_empty() && subpath.is_empty() {
        return Ok(EMPTY.to_string());
    }
    let absolute = remote.field_unsigned(&target, "absolute").unwrap_or(0) != 0;

    let mut out = String::new();
    if absolute {
        out.push('/');
    }
    out.push_str(&path.join("/"));
    if !subpath.is_empty() {
        out.push(':');
        out.push_str(&subpath.join(":"));
    }
    Ok(out)
}

/// Unquoted summaries of a `Vector<StringName>`
fn name_parts(cx: &Inspector<'_>, vector: &RemoteValue, budget: Budget) -> Vec<String>
{
    let mut parts = ArrayProvider::new("Vector", vector.clone(), ArrayLayout::Cow);
    parts.update(cx);
    (0..parts.child_count())
        .map(|i| {
            let text = match parts.child_at(cx, i) {
                Some(child) => cx.summarize(&child, budget.at(0)),
                None => INVALID.to_string(),
            };
            strip_quotes(&text).to_string()
        })
        .collect()
}

fn strip_quotes(text: &str) -> &str
{
    text.strip_prefix('"').and_then(|t| t.strip_suffix('"')).unwrap_or(text)
}

// ---- references -----------------------------------------------------------

fn reference(cx: &Inspector<'_>, value: &RemoteValue, budget: Budget) -> Result<String>
{
    let remote = cx.remote();
    let Some(pointer) = remote.read_child(value, "reference") else {
        return Ok(format!("{{{INVALID}}}"));
    };
    match remote.pointer_value(&pointer) {
        Ok(address) if address.is_null() => return Ok(format!("{{{NULL}}}")),
        Ok(_) => {}
        Err(_) => return Ok(format!("{{{INVALID}}}")),
    }
    let Ok(target) = remote.deref(&pointer) else {
        return Ok(format!("{{{INVALID}}}"));
    };
    let type_name = remote.type_name(&target).unwrap_or("?");
    let prefix = format!("{{[{type_name}]:");
    let inner = cx.summarize(&target, budget.child(budget.consumed + prefix.len()).skipping_bases());
    Ok(format!("{prefix}{inner}}}"))
}

// ---- math -----------------------------------------------------------------

fn leaf(remote: &Remote<'_>, value: &RemoteValue, name: &str) -> Result<String>
{
    let field = remote.field(value, name)?;
    let info = remote.type_of(&field).ok_or(InspectError::UnknownTypeHandle(field.type_handle().0))?;
    format_leaf(remote, &field, info)
}

fn join_fields(remote: &Remote<'_>, value: &RemoteValue, names: &[&str]) -> Result<String>
{
    let parts = names.iter().map(|name| leaf(remote, value, name)).collect::<Result<Vec<_>>>()?;
    Ok(parts.join(", "))
}

fn components(remote: &Remote<'_>, value: &RemoteValue, names: &[&str]) -> Result<String>
{
    Ok(format!("({})", join_fields(remote, value, names)?))
}

/// Vector members are 2, 3 or 4 components depending on their type
fn vector(remote: &Remote<'_>, value: &RemoteValue) -> Result<String>
{
    const AXES: [&str; 4] = ["x", "y", "z", "w"];
    let info = remote.type_of(value).ok_or(InspectError::UnknownTypeHandle(value.type_handle().0))?;
    let count = AXES
        .iter()
        .take_while(|axis| info.fields().iter().any(|f| f.name == **axis))
        .count();
    if count == 0 {
        return Err(InspectError::Corrupt(format!("{} has no vector components", info.name)));
    }
    components(remote, value, &AXES[..count])
}

fn rows(remote: &Remote<'_>, value: &RemoteValue, member: &str) -> Result<Vec<String>>
{
    let array = remote.field(value, member)?;
    let len = match remote.type_of(&array).map(|info| &info.kind) {
        Some(TypeKind::Array { len, .. }) => *len,
        _ => return Err(InspectError::Corrupt(format!("{member} is not an array"))),
    };
    (0..len).map(|i| vector(remote, &remote.array_element(&array, i)?)).collect()
}

fn rect(remote: &Remote<'_>, value: &RemoteValue) -> Result<String>
{
    let position = vector(remote, &remote.field(value, "position")?)?;
    let size = vector(remote, &remote.field(value, "size")?)?;
    Ok(format!("{{position: {position}, size: {size}}}"))
}

fn aabb(remote: &Remote<'_>, value: &RemoteValue) -> Result<String>
{
    rect(remote, value)
}

fn transform_2d(remote: &Remote<'_>, value: &RemoteValue) -> Result<String>
{
    match rows(remote, value, "columns")?.as_slice() {
        [x, y, o] => Ok(format!("{{x: {x}, y: {y}, o: {o}}}")),
        _ => Err(InspectError::Corrupt("Transform2D needs three columns".to_string())),
    }
}

fn basis(remote: &Remote<'_>, value: &RemoteValue) -> Result<String>
{
    Ok(format!("{{{}}}", rows(remote, value, "rows")?.join(", ")))
}

fn transform_3d(remote: &Remote<'_>, value: &RemoteValue) -> Result<String>
{
    let basis = basis(remote, &remote.field(value, "basis")?)?;
    let origin = vector(remote, &remote.field(value, "origin")?)?;
    Ok(format!("{{basis: {basis}, origin: {origin}}}"))
}

fn projection(remote: &Remote<'_>, value: &RemoteValue) -> Result<String>
{
    Ok(format!("{{columns: {{{}}}}}", rows(remote, value, "columns")?.join(", ")))
}

fn plane(remote: &Remote<'_>, value: &RemoteValue) -> Result<String>
{
    let normal = vector(remote, &remote.field(value, "normal")?)?;
    let d = leaf(remote, value, "d")?;
    Ok(format!("{{normal: {normal}, d: {d}}}"))
}

// ---- colors ---------------------------------------------------------------

/// The `r`, `g`, `b`, `a` components of a color value
pub(crate) fn color_components(remote: &Remote<'_>, value: &RemoteValue) -> Result<[f64; 4]>
{
    Ok([
        remote.field_float(value, "r")?,
        remote.field_float(value, "g")?,
        remote.field_float(value, "b")?,
        remote.field_float(value, "a")?,
    ])
}

/// `#rrggbbaa` with each channel rounded and clamped to a byte
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn color_hex(channels: [f64; 4]) -> String
{
    let mut out = String::from("#");
    for channel in channels {
        let byte = (channel * 255.0).round().clamp(0.0, 255.0) as u8;
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

fn color(cx: &Inspector<'_>, value: &RemoteValue) -> Result<String>
{
    let [r, g, b, a] = color_components(&cx.remote(), value)?;
    let hex = color_hex([r, g, b, a]);
    let label = if cx.options().named_color_annotation { cx.named_color(&hex).unwrap_or(hex) } else { hex };
    Ok(format!("{{<{label}> r:{r:.3}, g:{g:.3}, b:{b:.3}, a:{a:.3}}}"))
}

// ---- identifiers ----------------------------------------------------------

fn object_id_value(remote: &Remote<'_>, value: &RemoteValue) -> Option<u64>
{
    match remote.read_child(value, "id") {
        Some(id) => remote.read_unsigned(&id).ok(),
        None => remote.read_unsigned(value).ok(),
    }
}

fn object_id(remote: &Remote<'_>, value: &RemoteValue) -> String
{
    match object_id_value(remote, value) {
        None => format!("<ObjectID={INVALID}>"),
        Some(0) => format!("<ObjectID={NULL}>"),
        Some(id) => format!("<ObjectID={id}>"),
    }
}

fn signal(cx: &Inspector<'_>, value: &RemoteValue, budget: Budget) -> Result<String>
{
    let remote = cx.remote();
    let name = cx.summarize(&remote.field(value, "name")?, budget);
    let object = object_id(&remote, &remote.field(value, "object")?);
    if name.contains(NULL) && object.contains(NULL) {
        return Ok(format!("{{<Signal> {NULL}}}"));
    }
    Ok(format!("{{<Signal> name:{name}, object:{object}}}"))
}

fn callable(cx: &Inspector<'_>, value: &RemoteValue, budget: Budget) -> Result<String>
{
    let remote = cx.remote();
    let method = cx.summarize(&remote.field(value, "method")?, budget);
    let object = remote.read_child(value, "object").and_then(|o| object_id_value(&remote, &o)).unwrap_or(0);
    if method != NULL && method != EMPTY {
        return Ok(format!("{{<Callable> object:{object}, method:{method}}}"));
    }

    if let Some(custom) = remote.read_child(value, "custom") {
        if remote.pointer_value(&custom).is_ok_and(|address| !address.is_null()) {
            let pointee = remote
                .type_of(&custom)
                .and_then(|info| info.pointee())
                .and_then(|ty| remote.info(ty))
                .map_or(INVALID, |info| info.name.as_str());
            return Ok(format!("{{<CallableCustom> {pointee}:{TRUNCATED}}}"));
        }
    }
    if object == 0 {
        return Ok(format!("{{<Callable> {NULL}}}"));
    }
    Ok(format!("{{<Callable> object:{object}, method:{method}}}"))
}

// ---- pairs ----------------------------------------------------------------

fn key_value(cx: &Inspector<'_>, pair: &RemoteValue, budget: Budget, value_only: bool) -> Result<String>
{
    let remote = cx.remote();
    let value = remote.field(pair, "value")?;
    if value_only {
        return Ok(cx.summarize_member(&value, budget.child(budget.consumed)));
    }
    let key = cx.summarize_member(&remote.field(pair, "key")?, budget.child(budget.consumed));
    let shown = cx.summarize_member(&value, budget.child(budget.consumed + key.len() + 2));
    Ok(format!("{key}: {shown}"))
}

/// Whether a pair prints only its value under the current map style
fn value_only(cx: &Inspector<'_>, pair: &RemoteValue) -> bool
{
    let remote = cx.remote();
    remote
        .read_child(pair, "key")
        .is_some_and(|key| map::uses_keyed_style(cx, key.type_handle()))
}

fn map_element(cx: &Inspector<'_>, data: &RemoteValue, budget: Budget) -> Result<String>
{
    key_value(cx, data, budget, value_only(cx, data))
}

fn vmap_pair(cx: &Inspector<'_>, pair: &RemoteValue, budget: Budget) -> Result<String>
{
    if value_only(cx, pair) {
        return key_value(cx, pair, budget, true);
    }
    let remote = cx.remote();
    let key = cx.summarize_member(&remote.field(pair, "key")?, budget.child(budget.consumed + 1));
    let value = cx.summarize_member(&remote.field(pair, "value")?, budget.child(budget.consumed + key.len() + 4));
    Ok(format!("[{key}]: {value}"))
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_color_hex_rounds_and_clamps()
    {
        assert_eq!(color_hex([1.0, 0.0, 0.0, 1.0]), "#ff0000ff");
        assert_eq!(color_hex([0.5, 2.0, -1.0, 0.25]), "#80ff0040");
    }

    #[test]
    fn test_strip_quotes()
    {
        assert_eq!(strip_quotes("\"root\""), "root");
        assert_eq!(strip_quotes("root"), "root");
    }
}
