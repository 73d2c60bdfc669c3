//! # Container Providers
//!
//! One strategy per structural shape. A provider is created for a single
//! display request, validates the container once in [`Shape::update`] and
//! then answers child and summary queries from what it derived.
//!
//! ## Validation
//!
//! A provider only reports an element count it can fully vouch for. Any
//! failed check (unreadable buffer end, broken sentinel, negative size)
//! makes the whole container invalid: zero children and an `<invalid>`
//! summary. A container that is merely empty stays valid.
//!
//! ## Dispatch
//!
//! The catalog resolves a type to a [`ShapeKind`]; [`ProviderInstance::open`]
//! turns that into one of a closed set of provider variants. There is no
//! dynamic dispatch and no "not implemented" fallback: operations a shape
//! cannot perform return [`InspectError::UnsupportedShape`].

pub mod array;
pub mod list;
pub mod map;
pub mod paged;
pub mod proxy;
pub mod ring;
pub mod variant;

pub use array::{ArrayLayout, ArrayProvider};
pub use list::{LinkedListProvider, ListLayout};
pub use map::MapAdapter;
pub use paged::PagedArrayProvider;
pub use proxy::{ProxyProvider, ProxyTarget};
pub use ring::RingBufferProvider;
pub use variant::VariantProvider;

use crate::catalog::ShapeKind;
use crate::error::{InspectError, Result};
use crate::session::Inspector;
use crate::summary::{Budget, ELLIPSIS, INVALID};
use crate::types::{normalize, without_template, RemoteValue};

/// Common lifecycle of every container provider
pub trait Shape
{
    /// Re-derive the element count and head pointers from memory
    ///
    /// Runs structural validation and discards every cache. Must be called
    /// again after the target ran.
    fn update(&mut self, cx: &Inspector<'_>);

    /// Whether the last [`Shape::update`] validated the container
    fn is_valid(&self) -> bool;

    /// Number of children (zero when invalid)
    fn child_count(&self) -> usize;

    /// Child at `index`, or `None` past the end or on a read failure
    fn child_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>;

    /// Index of the child displayed as `name`
    ///
    /// The default understands `[i]` names.
    fn index_of_child(&mut self, _cx: &Inspector<'_>, name: &str) -> Option<usize>
    {
        parse_index(name).filter(|index| *index < self.child_count())
    }

    /// Display summary within `budget`
    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String;
}

/// A shape whose children are shown inline as `Label[n]{c0, c1, ...}`
pub trait Sequence: Shape
{
    /// Type name without template arguments
    fn label(&self) -> &str;

    /// Summary of one child inside the container summary
    fn element_summary(&mut self, cx: &Inspector<'_>, index: usize, budget: Budget) -> String
    {
        match self.child_at(cx, index) {
            Some(child) => cx.summarize(&child, budget),
            None => INVALID.to_string(),
        }
    }
}

/// Why a provider is being opened
///
/// A provider created only to render a summary caches no more elements than
/// the summary can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Purpose
{
    /// Render a one-line summary
    Summary,
    /// Enumerate children for interactive expansion
    Children,
}

impl Purpose
{
    /// Elements to cache eagerly on update
    #[must_use]
    pub fn prefetch(self, cx: &Inspector<'_>) -> usize
    {
        let options = cx.options();
        match self {
            Purpose::Summary => options.max_children_in_summary,
            Purpose::Children => options.cache_prefetch,
        }
    }
}

/// `3` from `[3]`
#[must_use]
pub fn parse_index(name: &str) -> Option<usize>
{
    name.strip_prefix('[')?.strip_suffix(']')?.trim().parse().ok()
}

/// Type name of `value` without namespaces and template arguments
pub(crate) fn type_label(cx: &Inspector<'_>, value: &RemoteValue) -> String
{
    cx.remote()
        .type_name(value)
        .map_or_else(|| "?".to_string(), |name| without_template(&normalize(name)))
}

/// Inline summaries of the first children, joined by `, `
///
/// Shows at most `maxChildrenInSummary` children and stops early once the
/// running length passes `maxSummaryLength`. A trailing `, ...` marks
/// children that were left out. Children are never expanded member by
/// member here, only formatted or summarized by their own binding.
pub(crate) fn children_summary<S: Sequence + ?Sized>(shape: &mut S, cx: &Inspector<'_>, budget: Budget) -> String
{
    let options = cx.options();
    let total = shape.child_count();
    let shown = total.min(options.max_children_in_summary);

    let mut out = String::new();
    let mut emitted = 0;
    for index in 0..shown {
        let child_budget = budget.child(budget.consumed + out.len()).without_expansion();
        out.push_str(&shape.element_summary(cx, index, child_budget));
        emitted = index + 1;
        if budget.consumed + out.len() > options.max_summary_length {
            break;
        }
        if emitted < shown {
            out.push_str(", ");
        }
    }
    if total > emitted {
        out.push_str(if out.is_empty() { "..." } else { ELLIPSIS });
    }
    out
}

/// `Label[n]{children}`, or `<invalid>`
pub(crate) fn list_summary<S: Sequence + ?Sized>(shape: &mut S, cx: &Inspector<'_>, budget: Budget) -> String
{
    if !shape.is_valid() {
        return INVALID.to_string();
    }
    let prefix = format!("{}[{}]{{", shape.label(), shape.child_count());
    let children = children_summary(shape, cx, budget.at(budget.consumed + prefix.len()));
    format!("{prefix}{children}}}")
}

/// A live provider of any shape
#[derive(Debug)]
pub enum ProviderInstance
{
    Variant(VariantProvider),
    Array(ArrayProvider),
    Paged(PagedArrayProvider),
    List(LinkedListProvider),
    Map(MapAdapter),
    Proxy(ProxyProvider),
    Ring(RingBufferProvider),
}

impl ProviderInstance
{
    /// Create and validate the provider for a container of shape `kind`
    #[must_use]
    pub fn open(cx: &Inspector<'_>, kind: ShapeKind, value: &RemoteValue, purpose: Purpose) -> Self
    {
        let label = type_label(cx, value);
        let value = value.clone();
        let prefetch = purpose.prefetch(cx);
        let mut instance = match kind {
            ShapeKind::Variant => ProviderInstance::Variant(VariantProvider::new(value)),
            ShapeKind::Vector => ProviderInstance::Array(ArrayProvider::new(label, value, ArrayLayout::Cow)),
            ShapeKind::LocalVector => {
                ProviderInstance::Array(ArrayProvider::new(label, value, ArrayLayout::LOCAL_VECTOR))
            }
            ShapeKind::HashSet => ProviderInstance::Array(ArrayProvider::new(label, value, ArrayLayout::HASH_SET)),
            ShapeKind::PagedArray => ProviderInstance::Paged(PagedArrayProvider::new(label, value)),
            ShapeKind::List => {
                ProviderInstance::List(LinkedListProvider::new(label, value, ListLayout::List, prefetch))
            }
            ShapeKind::HashMap => ProviderInstance::Map(MapAdapter::linked(label, value, ListLayout::HashMap, prefetch)),
            ShapeKind::RBMap => ProviderInstance::Map(MapAdapter::linked(label, value, ListLayout::RBMap, prefetch)),
            ShapeKind::VMap => ProviderInstance::Map(MapAdapter::sorted(label, value, prefetch)),
            ShapeKind::Array => ProviderInstance::Proxy(ProxyProvider::new(label, value, ProxyTarget::Array, purpose)),
            ShapeKind::Dictionary => {
                ProviderInstance::Proxy(ProxyProvider::new(label, value, ProxyTarget::Dictionary, purpose))
            }
            ShapeKind::VSet => ProviderInstance::Proxy(ProxyProvider::new(label, value, ProxyTarget::VSet, purpose)),
            ShapeKind::RingBuffer => ProviderInstance::Ring(RingBufferProvider::new(label, value)),
        };
        instance.update(cx);
        instance
    }

    /// Short name of the provider strategy
    #[must_use]
    pub const fn shape_name(&self) -> &'static str
    {
        match self {
            ProviderInstance::Variant(_) => "variant",
            ProviderInstance::Array(_) => "array",
            ProviderInstance::Paged(_) => "paged array",
            ProviderInstance::List(_) => "linked list",
            ProviderInstance::Map(_) => "map",
            ProviderInstance::Proxy(_) => "proxy",
            ProviderInstance::Ring(_) => "ring buffer",
        }
    }

    /// Index of the element whose key summary is `key`
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::UnsupportedShape`] for shapes without keys.
    pub fn lookup_by_key(&mut self, cx: &Inspector<'_>, key: &str) -> Result<Option<usize>>
    {
        match self {
            ProviderInstance::Map(map) => Ok(map.lookup_by_key(cx, key)),
            ProviderInstance::Proxy(proxy) => proxy.lookup_by_key(cx, key),
            _ => Err(InspectError::UnsupportedShape { shape: self.shape_name(), operation: "lookup_by_key" }),
        }
    }

    fn shape_mut(&mut self) -> &mut dyn Sequence
    {
        match self {
            ProviderInstance::Variant(p) => p,
            ProviderInstance::Array(p) => p,
            ProviderInstance::Paged(p) => p,
            ProviderInstance::List(p) => p,
            ProviderInstance::Map(p) => p,
            ProviderInstance::Proxy(p) => p,
            ProviderInstance::Ring(p) => p,
        }
    }

    fn shape(&self) -> &dyn Sequence
    {
        match self {
            ProviderInstance::Variant(p) => p,
            ProviderInstance::Array(p) => p,
            ProviderInstance::Paged(p) => p,
            ProviderInstance::List(p) => p,
            ProviderInstance::Map(p) => p,
            ProviderInstance::Proxy(p) => p,
            ProviderInstance::Ring(p) => p,
        }
    }
}

impl Shape for ProviderInstance
{
    fn update(&mut self, cx: &Inspector<'_>)
    {
        self.shape_mut().update(cx);
    }

    fn is_valid(&self) -> bool
    {
        self.shape().is_valid()
    }

    fn child_count(&self) -> usize
    {
        self.shape().child_count()
    }

    fn child_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        self.shape_mut().child_at(cx, index)
    }

    fn index_of_child(&mut self, cx: &Inspector<'_>, name: &str) -> Option<usize>
    {
        self.shape_mut().index_of_child(cx, name)
    }

    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String
    {
        self.shape_mut().summary(cx, budget)
    }
}

impl Sequence for ProviderInstance
{
    fn label(&self) -> &str
    {
        self.shape().label()
    }

    fn element_summary(&mut self, cx: &Inspector<'_>, index: usize, budget: Budget) -> String
    {
        self.shape_mut().element_summary(cx, index, budget)
    }
}

#[cfg(test)]
mod tests
{
    use super::parse_index;

    #[test]
    fn test_parse_index()
    {
        assert_eq!(parse_index("[0]"), Some(0));
        assert_eq!(parse_index("[42]"), Some(42));
        assert_eq!(parse_index("42"), None);
        assert_eq!(parse_index("[k3]"), None);
    }
}
