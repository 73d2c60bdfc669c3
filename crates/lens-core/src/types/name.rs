//! # Type Names
//!
//! Parsing and normalization of the type names reported by the host.
//!
//! Catalog patterns are matched against a normalized, namespace-stripped
//! name: `const ::engine::Vector<int>` and `Vector<int>` resolve the same
//! way. Leading namespace segments are dropped, but nested types that hang
//! off a template instantiation (`VMap<K, V>::Pair`) keep their owner.

use std::fmt;

use smallvec::SmallVec;

const QUALIFIERS: [&str; 6] = ["const ", "volatile ", "struct ", "class ", "union ", "enum "];

/// One `::`-separated component of a type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment
{
    /// Identifier without template arguments
    pub name: String,
    /// Top-level template arguments, trimmed
    pub args: SmallVec<[String; 4]>,
}

/// A parsed, normalized type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeName
{
    segments: SmallVec<[Segment; 2]>,
}

impl TypeName
{
    /// Parse and normalize a host type name
    ///
    /// Returns `None` for empty names and names with unbalanced brackets.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self>
    {
        let trimmed = strip_qualifiers(raw);
        let trimmed = trimmed.strip_prefix("::").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return None;
        }

        let mut segments: SmallVec<[Segment; 2]> = SmallVec::new();
        for part in split_top_level(trimmed, "::")? {
            segments.push(parse_segment(part)?);
        }

        // Drop namespaces, keep the owner of nested types
        while segments.len() > 1 && segments[0].args.is_empty() {
            segments.remove(0);
        }

        Some(TypeName { segments })
    }

    /// First segment's identifier (`Vector` for `Vector<int>`)
    #[must_use]
    pub fn base(&self) -> &str
    {
        &self.segments[0].name
    }

    /// First segment's template arguments
    #[must_use]
    pub fn args(&self) -> &[String]
    {
        &self.segments[0].args
    }

    /// All segments after the first
    #[must_use]
    pub fn nested(&self) -> &[Segment]
    {
        &self.segments[1..]
    }
}

impl fmt::Display for TypeName
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str("::")?;
            }
            f.write_str(&segment.name)?;
            if !segment.args.is_empty() {
                write!(f, "<{}>", segment.args.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Normalized form of a host type name
///
/// Falls back to the trimmed input when the name cannot be parsed.
#[must_use]
pub fn normalize(raw: &str) -> String
{
    TypeName::parse(raw).map_or_else(|| raw.trim().to_string(), |name| name.to_string())
}

/// Normalized name with every template argument list removed
///
/// Used as the label of container summaries: `Vector<int>` is shown as
/// `Vector[3]{...}`.
#[must_use]
pub fn without_template(raw: &str) -> String
{
    match TypeName::parse(raw) {
        Some(name) => {
            let mut out = name.base().to_string();
            for segment in name.nested() {
                out.push_str("::");
                out.push_str(&segment.name);
            }
            out
        }
        None => raw.trim().to_string(),
    }
}

fn strip_qualifiers(raw: &str) -> &str
{
    let mut current = raw.trim();
    loop {
        let Some(rest) = QUALIFIERS.iter().find_map(|q| current.strip_prefix(q)) else {
            break;
        };
        current = rest.trim_start();
    }
    current.strip_suffix(" const").unwrap_or(current).trim_end()
}

/// Split on `sep` outside of any bracket pair
fn split_top_level<'a>(text: &'a str, sep: &str) -> Option<Vec<&'a str>>
{
    let bytes = text.as_bytes();
    let mut parts = Vec::new();
    let mut depth: i32 = 0;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' | b'(' | b'[' => depth += 1,
            b'>' | b')' | b']' => {
                depth -= 1;
                if depth < 0 {
                    return None;
                }
            }
            _ => {
                if depth == 0 && bytes[i..].starts_with(sep.as_bytes()) {
                    parts.push(text[start..i].trim());
                    i += sep.len();
                    start = i;
                    continue;
                }
            }
        }
        i += 1;
    }
    if depth != 0 {
        return None;
    }
    parts.push(text[start..].trim());
    Some(parts)
}

fn parse_segment(part: &str) -> Option<Segment>
{
    if part.is_empty() {
        return None;
    }
    let Some(open) = part.find('<') else {
        return Some(Segment { name: part.to_string(), args: SmallVec::new() });
    };
    let close = part.rfind('>')?;
    if close < open {
        return None;
    }
    let inner = part[open + 1..close].trim();
    let args = if inner.is_empty() {
        SmallVec::new()
    } else {
        split_top_level(inner, ",")?.into_iter().map(str::to_string).collect()
    };
    Some(Segment { name: part[..open].trim().to_string(), args })
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_parse_simple_template()
    {
        let name = TypeName::parse("Vector<int>").unwrap();
        assert_eq!(name.base(), "Vector");
        assert_eq!(name.args(), ["int".to_string()]);
        assert!(name.nested().is_empty());
    }

    #[test]
    fn test_strips_namespaces_and_qualifiers()
    {
        assert_eq!(normalize("const ::engine::core::HashMap<String, int>"), "HashMap<String, int>");
        assert_eq!(normalize("  ::String "), "String");
    }

    #[test]
    fn test_nested_type_keeps_owner()
    {
        let name = TypeName::parse("VMap<String, Variant>::Pair").unwrap();
        assert_eq!(name.base(), "VMap");
        assert_eq!(name.args().len(), 2);
        assert_eq!(name.nested()[0].name, "Pair");
        assert_eq!(without_template("VMap<String, Variant>::Pair"), "VMap::Pair");
    }

    #[test]
    fn test_nested_template_arguments_count_once()
    {
        let name = TypeName::parse("HashMap<Vector<int>, Pair<int, float>, Hasher>").unwrap();
        assert_eq!(name.args().len(), 3);
        assert_eq!(name.args()[1], "Pair<int, float>");
    }

    #[test]
    fn test_unbalanced_name_is_rejected()
    {
        assert!(TypeName::parse("Vector<int").is_none());
        assert!(TypeName::parse("").is_none());
        assert_eq!(normalize("Vector<int"), "Vector<int");
    }
}
