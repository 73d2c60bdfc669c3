//! # Options
//!
//! Session-wide configuration, consumed as a flat key/value store.
//!
//! The command layer that edits these values lives outside the engine; it
//! hands strings over through [`Options::set`]. Keys use the camelCase
//! spelling shown by [`Options::describe`].
//!
//! ## Example
//!
//! ```rust
//! use lens_core::options::{MapDisplayStyle, Options};
//!
//! let mut options = Options::default();
//! options.set("mapDisplayStyle", "keyed").unwrap();
//! options.set("compatibilitySafeMode", "true").unwrap();
//!
//! // Compatibility mode wins over the requested style
//! assert_eq!(options.effective().map_display_style, MapDisplayStyle::Indexed);
//! ```

use std::env;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing::debug;

/// How map-like containers name their children
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MapDisplayStyle
{
    /// `[i] = [key]: value`
    #[default]
    Indexed,
    /// `[key] = value`, only for string-like or integer-like keys
    Keyed,
}

impl FromStr for MapDisplayStyle
{
    type Err = OptionsError;

    fn from_str(s: &str) -> Result<Self, Self::Err>
    {
        match s.to_lowercase().as_str() {
            "indexed" | "index" => Ok(MapDisplayStyle::Indexed),
            "keyed" | "key" | "keyval" => Ok(MapDisplayStyle::Keyed),
            _ => Err(OptionsError::InvalidValue { key: "mapDisplayStyle".to_string(), value: s.to_string() }),
        }
    }
}

impl fmt::Display for MapDisplayStyle
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            MapDisplayStyle::Indexed => f.write_str("indexed"),
            MapDisplayStyle::Keyed => f.write_str("keyed"),
        }
    }
}

/// Configuration error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OptionsError
{
    /// The key is not a recognized option
    #[error("Unknown option: {0}")]
    UnknownKey(String),

    /// The value does not parse for this key
    #[error("Invalid value for {key}: {value}")]
    InvalidValue
    {
        /// Option key
        key: String,
        /// Rejected value
        value: String,
    },
}

/// Recognized option keys with their help strings
const KEYS: [(&str, &str); 10] = [
    ("maxSummaryLength", "Maximum number of characters emitted for one summary"),
    ("maxChildrenInSummary", "Maximum number of children shown in a container summary"),
    ("maxRecursionDepth", "Maximum nesting depth the summarizer expands"),
    ("mapDisplayStyle", "Map children as `[i] = [key]: value` (indexed) or `[key] = value` (keyed)"),
    ("compatibilitySafeMode", "Force indexed maps and sanitized strings for hosts with weak summary rendering"),
    ("sanitizeStringOutput", "Escape string contents instead of decoding raw bytes"),
    ("namedColorAnnotation", "Annotate colors with a matching named color"),
    ("cachePrefetch", "Elements cached eagerly when a linked container is refreshed"),
    ("cacheFetchWindow", "Growth step and ceiling of the element cache"),
    ("stringsLimitedTo32Bit", "Treat string sizes above i32::MAX as corrupt"),
];

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct Options
{
    /// Cap on emitted summary characters
    pub max_summary_length: usize,
    /// Children shown per container level
    pub max_children_in_summary: usize,
    /// Nesting levels the summarizer expands
    pub max_recursion_depth: usize,
    /// Child naming for map-like containers
    pub map_display_style: MapDisplayStyle,
    /// Forces indexed maps and sanitized strings
    pub compatibility_safe_mode: bool,
    /// Escape (true) or raw-decode (false) string values
    pub sanitize_string_output: bool,
    /// Look colors up in the target's named color table
    pub named_color_annotation: bool,
    /// Elements cached eagerly on refresh
    pub cache_prefetch: usize,
    /// Cache growth step and ceiling
    pub cache_fetch_window: usize,
    /// String sizes above `i32::MAX` are invalid
    pub strings_limited_to_32_bit: bool,
}

impl Default for Options
{
    fn default() -> Self
    {
        Options {
            max_summary_length: 100,
            max_children_in_summary: 6,
            max_recursion_depth: 3,
            map_display_style: MapDisplayStyle::Indexed,
            compatibility_safe_mode: false,
            sanitize_string_output: true,
            named_color_annotation: true,
            cache_prefetch: 500,
            cache_fetch_window: 5000,
            strings_limited_to_32_bit: true,
        }
    }
}

impl Options
{
    /// Build options from key/value pairs on top of the defaults
    ///
    /// ## Errors
    ///
    /// Fails on the first unknown key or unparsable value.
    pub fn from_pairs<'a, I>(pairs: I) -> Result<Self, OptionsError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut options = Options::default();
        for (key, value) in pairs {
            options.set(key, value)?;
        }
        Ok(options)
    }

    /// Build options from `LENS_OPT_<KEY>` environment variables
    ///
    /// The key part is matched case-insensitively with underscores removed,
    /// so `LENS_OPT_MAX_SUMMARY_LENGTH=80` sets `maxSummaryLength`.
    ///
    /// ## Errors
    ///
    /// Fails on a variable naming an unknown option or holding a bad value.
    pub fn from_env() -> Result<Self, OptionsError>
    {
        let mut options = Options::default();
        for (name, value) in env::vars() {
            let Some(suffix) = name.strip_prefix("LENS_OPT_") else {
                continue;
            };
            let wanted = suffix.replace('_', "").to_lowercase();
            let key = KEYS
                .iter()
                .map(|(key, _)| *key)
                .find(|key| key.to_lowercase() == wanted)
                .ok_or_else(|| OptionsError::UnknownKey(name.clone()))?;
            options.set(key, &value)?;
        }
        Ok(options)
    }

    /// Set one option from its string form
    ///
    /// Booleans accept `true/false`, `1/0`, `on/off`, `yes/no`.
    ///
    /// ## Errors
    ///
    /// Returns [`OptionsError::UnknownKey`] or [`OptionsError::InvalidValue`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), OptionsError>
    {
        let value = value.trim();
        match key {
            "maxSummaryLength" => self.max_summary_length = parse_count(key, value)?,
            "maxChildrenInSummary" => self.max_children_in_summary = parse_count(key, value)?,
            "maxRecursionDepth" => self.max_recursion_depth = parse_count(key, value)?,
            "mapDisplayStyle" => self.map_display_style = value.parse()?,
            "compatibilitySafeMode" => self.compatibility_safe_mode = parse_flag(key, value)?,
            "sanitizeStringOutput" => self.sanitize_string_output = parse_flag(key, value)?,
            "namedColorAnnotation" => self.named_color_annotation = parse_flag(key, value)?,
            "cachePrefetch" => self.cache_prefetch = parse_count(key, value)?,
            "cacheFetchWindow" => self.cache_fetch_window = parse_count(key, value)?.max(1),
            "stringsLimitedTo32Bit" => self.strings_limited_to_32_bit = parse_flag(key, value)?,
            _ => return Err(OptionsError::UnknownKey(key.to_string())),
        }
        debug!(key, value, "option updated");
        Ok(())
    }

    /// Current value of one option in its string form
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String>
    {
        Some(match key {
            "maxSummaryLength" => self.max_summary_length.to_string(),
            "maxChildrenInSummary" => self.max_children_in_summary.to_string(),
            "maxRecursionDepth" => self.max_recursion_depth.to_string(),
            "mapDisplayStyle" => self.map_display_style.to_string(),
            "compatibilitySafeMode" => self.compatibility_safe_mode.to_string(),
            "sanitizeStringOutput" => self.sanitize_string_output.to_string(),
            "namedColorAnnotation" => self.named_color_annotation.to_string(),
            "cachePrefetch" => self.cache_prefetch.to_string(),
            "cacheFetchWindow" => self.cache_fetch_window.to_string(),
            "stringsLimitedTo32Bit" => self.strings_limited_to_32_bit.to_string(),
            _ => return None,
        })
    }

    /// Recognized keys and their help strings, in display order
    #[must_use]
    pub fn describe() -> &'static [(&'static str, &'static str)]
    {
        &KEYS
    }

    /// Options with compatibility mode applied
    ///
    /// Compatibility mode forces indexed maps and sanitized strings.
    #[must_use]
    pub fn effective(&self) -> Options
    {
        let mut effective = self.clone();
        if effective.compatibility_safe_mode {
            effective.map_display_style = MapDisplayStyle::Indexed;
            effective.sanitize_string_output = true;
        }
        effective
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize, OptionsError>
{
    value
        .parse()
        .map_err(|_| OptionsError::InvalidValue { key: key.to_string(), value: value.to_string() })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, OptionsError>
{
    match value.to_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(OptionsError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_defaults()
    {
        let options = Options::default();
        assert_eq!(options.max_summary_length, 100);
        assert_eq!(options.max_children_in_summary, 6);
        assert_eq!(options.max_recursion_depth, 3);
        assert_eq!(options.map_display_style, MapDisplayStyle::Indexed);
        assert!(options.sanitize_string_output);
    }

    #[test]
    fn test_set_and_get_round_trip_every_key()
    {
        let mut options = Options::default();
        for (key, _) in Options::describe() {
            let current = options.get(key).unwrap();
            options.set(key, &current).unwrap();
            assert_eq!(options.get(key).unwrap(), current);
        }
    }

    #[test]
    fn test_rejects_unknown_key_and_bad_value()
    {
        let mut options = Options::default();
        assert_eq!(options.set("colour", "1"), Err(OptionsError::UnknownKey("colour".to_string())));
        assert!(options.set("maxRecursionDepth", "-1").is_err());
        assert!(options.set("sanitizeStringOutput", "maybe").is_err());
        assert!(options.set("mapDisplayStyle", "tree").is_err());
    }

    #[test]
    fn test_from_pairs()
    {
        let options = Options::from_pairs([("maxSummaryLength", "40"), ("mapDisplayStyle", "keyed")]).unwrap();
        assert_eq!(options.max_summary_length, 40);
        assert_eq!(options.effective().map_display_style, MapDisplayStyle::Keyed);
    }

    #[test]
    fn test_compatibility_mode_overrides_style_and_sanitizing()
    {
        let options = Options::from_pairs([
            ("mapDisplayStyle", "keyed"),
            ("sanitizeStringOutput", "off"),
            ("compatibilitySafeMode", "on"),
        ])
        .unwrap();
        let effective = options.effective();
        assert_eq!(effective.map_display_style, MapDisplayStyle::Indexed);
        assert!(effective.sanitize_string_output);
        // The stored values are untouched
        assert_eq!(options.map_display_style, MapDisplayStyle::Keyed);
    }
}
