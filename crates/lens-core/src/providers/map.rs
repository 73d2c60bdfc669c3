//! Key/value projection over an array or a linked structure.
//!
//! Maps come in two display styles:
//!
//! - **indexed**: child `[i]` is the i-th key/value pair,
//! - **keyed**: child `[key]` is the value stored under that key.
//!
//! Keyed naming is only used when the key type prints as a short, unique
//! text (strings, names, paths and integers); other maps fall back to the
//! indexed style. The style changes names only, never the child count.

use super::{list_summary, ArrayLayout, ArrayProvider, LinkedListProvider, ListLayout, Sequence, Shape};
use crate::cache::KeyIndex;
use crate::options::MapDisplayStyle;
use crate::remote::Remote;
use crate::session::Inspector;
use crate::summary::{Budget, INVALID};
use crate::types::{normalize, without_template, RemoteValue, TypeHandle, TypeKind};

/// Value types whose summary is a usable key
const STRING_LIKE: [&str; 4] = ["String", "StringName", "StringBuffer", "NodePath"];

/// Whether keys of type `ty` print as short, unique text
#[must_use]
pub fn is_keyable(remote: &Remote<'_>, ty: TypeHandle) -> bool
{
    let Some(info) = remote.info(ty) else {
        return false;
    };
    if info.is_integer_like() {
        return true;
    }
    match &info.kind {
        TypeKind::Pointer { pointee } => remote
            .info(*pointee)
            .and_then(|target| target.basic_kind())
            .is_some_and(|kind| kind.is_narrow_char()),
        TypeKind::Struct { .. } => STRING_LIKE.contains(&without_template(&normalize(&info.name)).as_str()),
        _ => false,
    }
}

/// Whether maps keyed by `ty` use the keyed style right now
#[must_use]
pub fn uses_keyed_style(cx: &Inspector<'_>, ty: TypeHandle) -> bool
{
    cx.options().map_display_style == MapDisplayStyle::Keyed && is_keyable(&cx.remote(), ty)
}

/// The sequence a map adapter projects pairs out of
#[derive(Debug)]
enum MapSource
{
    Sorted(ArrayProvider),
    Linked(LinkedListProvider),
}

impl MapSource
{
    fn shape(&mut self) -> &mut dyn Shape
    {
        match self {
            MapSource::Sorted(array) => array,
            MapSource::Linked(list) => list,
        }
    }

    fn shape_ref(&self) -> &dyn Shape
    {
        match self {
            MapSource::Sorted(array) => array,
            MapSource::Linked(list) => list,
        }
    }
}

/// Map adapter for `HashMap`, `RBMap` and `VMap`
#[derive(Debug)]
pub struct MapAdapter
{
    label: String,
    value: RemoteValue,
    source: MapSource,
    keys: KeyIndex,
    keyed: bool,
    prefetch: usize,
}

impl MapAdapter
{
    /// Map threaded through linked nodes (`HashMap`, `RBMap`)
    #[must_use]
    pub fn linked(label: String, value: RemoteValue, layout: ListLayout, prefetch: usize) -> Self
    {
        let list = LinkedListProvider::new(label.clone(), value.clone(), layout, prefetch);
        Self::with_source(label, value, MapSource::Linked(list), prefetch)
    }

    /// Map stored as a sorted pair array (`VMap`)
    #[must_use]
    pub fn sorted(label: String, value: RemoteValue, prefetch: usize) -> Self
    {
        let array = ArrayProvider::new(label.clone(), value.clone(), ArrayLayout::Cow);
        Self::with_source(label, value, MapSource::Sorted(array), prefetch)
    }

    fn with_source(label: String, value: RemoteValue, source: MapSource, prefetch: usize) -> Self
    {
        MapAdapter { label, value, source, keys: KeyIndex::new(), keyed: false, prefetch }
    }

    /// Whether children are currently named by key
    #[must_use]
    pub const fn is_keyed(&self) -> bool
    {
        self.keyed
    }

    /// Number of key summaries computed so far
    #[must_use]
    pub fn indexed_keys(&self) -> usize
    {
        self.keys.len()
    }

    /// The key/value pair at `index`
    fn pair_at(source: &mut MapSource, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        source.shape().child_at(cx, index)
    }

    fn key_summary(source: &mut MapSource, cx: &Inspector<'_>, index: usize) -> Option<String>
    {
        let pair = Self::pair_at(source, cx, index)?;
        let key = cx.remote().read_child(&pair, "key")?;
        Some(cx.summarize(&key, Budget::root()))
    }

    fn ensure_keys(&mut self, cx: &Inspector<'_>, upto: usize)
    {
        let total = self.source.shape_ref().child_count();
        let MapAdapter { keys, source, .. } = self;
        keys.extend_to(upto, total, |index| Self::key_summary(source, cx, index));
    }

    /// Index of the element whose key prints as `key`
    ///
    /// Keys are indexed lazily, one fetch window at a time, until the key
    /// is found or every element was visited. Surrounding quotes are
    /// ignored, so `k3` finds the string key `"k3"`.
    pub fn lookup_by_key(&mut self, cx: &Inspector<'_>, key: &str) -> Option<usize>
    {
        if !self.is_valid() {
            return None;
        }
        let total = self.child_count();
        let window = cx.options().cache_fetch_window;
        let MapAdapter { keys, source, .. } = self;
        keys.lookup(key, total, window, |index| Self::key_summary(source, cx, index))
    }
}

impl Shape for MapAdapter
{
    fn update(&mut self, cx: &Inspector<'_>)
    {
        self.source.shape().update(cx);
        self.keys.clear();
        let remote = cx.remote();
        self.keyed = self.source.shape_ref().is_valid()
            && remote.template_arg(&self.value, 0).is_some_and(|ty| uses_keyed_style(cx, ty));
        if self.keyed {
            self.ensure_keys(cx, self.prefetch);
        }
    }

    fn is_valid(&self) -> bool
    {
        self.source.shape_ref().is_valid()
    }

    fn child_count(&self) -> usize
    {
        self.source.shape_ref().child_count()
    }

    fn child_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        let pair = Self::pair_at(&mut self.source, cx, index)?;
        if !self.keyed {
            return Some(pair);
        }
        self.ensure_keys(cx, index + 1);
        let name = match self.keys.key_at(index) {
            Some(key) => format!("[{key}]"),
            None => format!("[{index}]"),
        };
        let value = cx.remote().read_child(&pair, "value")?;
        Some(value.renamed(name))
    }

    fn index_of_child(&mut self, cx: &Inspector<'_>, name: &str) -> Option<usize>
    {
        if !self.keyed {
            return super::parse_index(name).filter(|index| *index < self.child_count());
        }
        let key = name.strip_prefix('[').and_then(|k| k.strip_suffix(']')).unwrap_or(name);
        self.lookup_by_key(cx, key)
    }

    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String
    {
        list_summary(self, cx, budget)
    }
}

impl Sequence for MapAdapter
{
    fn label(&self) -> &str
    {
        &self.label
    }

    /// `[key]: value`
    fn element_summary(&mut self, cx: &Inspector<'_>, index: usize, budget: Budget) -> String
    {
        let remote = cx.remote();
        let Some(pair) = Self::pair_at(&mut self.source, cx, index) else {
            return INVALID.to_string();
        };
        let (Some(key), Some(value)) = (remote.read_child(&pair, "key"), remote.read_child(&pair, "value")) else {
            return INVALID.to_string();
        };
        let key = cx.summarize(&key, budget.at(budget.consumed + 1));
        let value = cx.summarize(&value, budget.at(budget.consumed + key.len() + 4));
        format!("[{key}]: {value}")
    }
}
