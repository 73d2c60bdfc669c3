//! # Type Pattern Catalog
//!
//! Ordered bindings from type-name patterns to a container shape or a value
//! summary.
//!
//! Resolution walks the entries in declaration order and stops at the first
//! match. It is *not* a best-match search, so entries with overlapping
//! patterns must be declared most-specific-first. The catalog is built once
//! per session and never changes afterwards; the session memoizes the result
//! per distinct type name.
//!
//! ## Example
//!
//! ```rust
//! use lens_core::catalog::{Binding, Catalog, ShapeKind};
//!
//! let catalog = Catalog::runtime();
//! let entry = catalog.resolve("::Vector<int>").unwrap();
//! assert_eq!(entry.binding, Binding::Shape(ShapeKind::Vector));
//! assert!(catalog.resolve("Vector<int, float>").is_none());
//! ```

use crate::types::TypeName;

/// Container shapes with a dedicated provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind
{
    /// Tagged union over the runtime's dynamic value types
    Variant,
    /// Copy-on-write array
    Vector,
    /// Counted array with explicit capacity
    LocalVector,
    /// Open hash set with a dense key array
    HashSet,
    /// Array split across fixed-size pages
    PagedArray,
    /// Doubly linked list
    List,
    /// Insertion-ordered hash map (linked elements)
    HashMap,
    /// Threaded red-black tree map
    RBMap,
    /// Sorted copy-on-write pair array
    VMap,
    /// Reference-counted variant array behind a private pointer
    Array,
    /// Reference-counted variant map behind a private pointer
    Dictionary,
    /// Sorted set over a copy-on-write array
    VSet,
    /// Power-of-two ring buffer over a copy-on-write array
    RingBuffer,
}

/// Value types with a dedicated summary function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SummaryKind
{
    String,
    CharString,
    StringName,
    NodePath,
    Ref,
    Vector2,
    Vector2i,
    Vector3,
    Vector3i,
    Vector4,
    Vector4i,
    Rect2,
    Rect2i,
    Transform2D,
    Transform3D,
    Basis,
    Projection,
    Plane,
    Aabb,
    Quaternion,
    Color,
    Rid,
    ObjectId,
    Signal,
    Callable,
    KeyValue,
    HashMapElement,
    RBMapElement,
    VMapPair,
}

/// What a catalog entry binds a pattern to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Binding
{
    /// Children and summary come from a container provider
    Shape(ShapeKind),
    /// Summary comes from a value formatter; children are the plain members
    Summary(SummaryKind),
}

/// Structural pattern over a normalized type name
///
/// Matches the first segment's identifier, its template arity and,
/// optionally, one nested type segment (`Pair` in `VMap<K, V>::Pair`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern
{
    base: &'static str,
    min_args: usize,
    max_args: usize,
    nested: Option<&'static str>,
}

impl Pattern
{
    /// A plain, non-template type
    #[must_use]
    pub const fn exact(base: &'static str) -> Self
    {
        Pattern { base, min_args: 0, max_args: 0, nested: None }
    }

    /// A template taking between `min` and `max` arguments
    #[must_use]
    pub const fn template(base: &'static str, min: usize, max: usize) -> Self
    {
        Pattern { base, min_args: min, max_args: max, nested: None }
    }

    /// Require a nested type segment after the template
    #[must_use]
    pub const fn nested(mut self, name: &'static str) -> Self
    {
        self.nested = Some(name);
        self
    }

    /// Whether a parsed name satisfies this pattern
    #[must_use]
    pub fn matches(&self, name: &TypeName) -> bool
    {
        if name.base() != self.base {
            return false;
        }
        let arity = name.args().len();
        if arity < self.min_args || arity > self.max_args {
            return false;
        }
        match (self.nested, name.nested()) {
            (None, []) => true,
            (Some(wanted), [segment]) => segment.name == wanted && segment.args.is_empty(),
            _ => false,
        }
    }
}

/// One pattern binding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry
{
    /// Name used in diagnostics and fault annotations
    pub label: &'static str,
    /// Pattern matched against the normalized type name
    pub pattern: Pattern,
    /// Bound provider or formatter
    pub binding: Binding,
}

/// Ordered, immutable list of bindings
#[derive(Debug, Clone, Default)]
pub struct Catalog
{
    entries: Vec<CatalogEntry>,
}

impl Catalog
{
    /// Start an empty catalog
    #[must_use]
    pub fn builder() -> CatalogBuilder
    {
        CatalogBuilder { entries: Vec::new() }
    }

    /// Bindings for the runtime's own container and value types
    #[must_use]
    pub fn runtime() -> Self
    {
        use Binding::{Shape, Summary};

        Catalog::builder()
            // Nested element types first: their owners share the same base name
            .entry("RBMap::Element", Pattern::template("RBMap", 2, 4).nested("Element"), Summary(SummaryKind::RBMapElement))
            .entry("VMap::Pair", Pattern::template("VMap", 2, 2).nested("Pair"), Summary(SummaryKind::VMapPair))
            .entry("HashMapElement", Pattern::template("HashMapElement", 2, 2), Summary(SummaryKind::HashMapElement))
            .entry("KeyValue", Pattern::template("KeyValue", 2, 2), Summary(SummaryKind::KeyValue))
            // Containers
            .entry("Variant", Pattern::exact("Variant"), Shape(ShapeKind::Variant))
            .entry("Vector", Pattern::template("Vector", 1, 1), Shape(ShapeKind::Vector))
            .entry("LocalVector", Pattern::template("LocalVector", 1, 4), Shape(ShapeKind::LocalVector))
            .entry("HashSet", Pattern::template("HashSet", 1, 3), Shape(ShapeKind::HashSet))
            .entry("PagedArray", Pattern::template("PagedArray", 1, 1), Shape(ShapeKind::PagedArray))
            .entry("List", Pattern::template("List", 1, 2), Shape(ShapeKind::List))
            .entry("HashMap", Pattern::template("HashMap", 2, 5), Shape(ShapeKind::HashMap))
            .entry("RBMap", Pattern::template("RBMap", 2, 4), Shape(ShapeKind::RBMap))
            .entry("VMap", Pattern::template("VMap", 2, 2), Shape(ShapeKind::VMap))
            .entry("Array", Pattern::exact("Array"), Shape(ShapeKind::Array))
            .entry("TypedArray", Pattern::template("TypedArray", 1, 1), Shape(ShapeKind::Array))
            .entry("Dictionary", Pattern::exact("Dictionary"), Shape(ShapeKind::Dictionary))
            .entry("VSet", Pattern::template("VSet", 1, 1), Shape(ShapeKind::VSet))
            .entry("RingBuffer", Pattern::template("RingBuffer", 1, 1), Shape(ShapeKind::RingBuffer))
            // Values
            .entry("String", Pattern::exact("String"), Summary(SummaryKind::String))
            .entry("CharString", Pattern::exact("CharString"), Summary(SummaryKind::CharString))
            .entry("CharStringT", Pattern::template("CharStringT", 1, 1), Summary(SummaryKind::CharString))
            .entry("StringName", Pattern::exact("StringName"), Summary(SummaryKind::StringName))
            .entry("NodePath", Pattern::exact("NodePath"), Summary(SummaryKind::NodePath))
            .entry("Ref", Pattern::template("Ref", 1, 1), Summary(SummaryKind::Ref))
            .entry("Vector2", Pattern::exact("Vector2"), Summary(SummaryKind::Vector2))
            .entry("Vector2i", Pattern::exact("Vector2i"), Summary(SummaryKind::Vector2i))
            .entry("Vector3", Pattern::exact("Vector3"), Summary(SummaryKind::Vector3))
            .entry("Vector3i", Pattern::exact("Vector3i"), Summary(SummaryKind::Vector3i))
            .entry("Vector4", Pattern::exact("Vector4"), Summary(SummaryKind::Vector4))
            .entry("Vector4i", Pattern::exact("Vector4i"), Summary(SummaryKind::Vector4i))
            .entry("Rect2", Pattern::exact("Rect2"), Summary(SummaryKind::Rect2))
            .entry("Rect2i", Pattern::exact("Rect2i"), Summary(SummaryKind::Rect2i))
            .entry("Transform2D", Pattern::exact("Transform2D"), Summary(SummaryKind::Transform2D))
            .entry("Transform3D", Pattern::exact("Transform3D"), Summary(SummaryKind::Transform3D))
            .entry("Basis", Pattern::exact("Basis"), Summary(SummaryKind::Basis))
            .entry("Projection", Pattern::exact("Projection"), Summary(SummaryKind::Projection))
            .entry("Plane", Pattern::exact("Plane"), Summary(SummaryKind::Plane))
            .entry("AABB", Pattern::exact("AABB"), Summary(SummaryKind::Aabb))
            .entry("Quaternion", Pattern::exact("Quaternion"), Summary(SummaryKind::Quaternion))
            .entry("Color", Pattern::exact("Color"), Summary(SummaryKind::Color))
            .entry("RID", Pattern::exact("RID"), Summary(SummaryKind::Rid))
            .entry("ObjectID", Pattern::exact("ObjectID"), Summary(SummaryKind::ObjectId))
            .entry("Signal", Pattern::exact("Signal"), Summary(SummaryKind::Signal))
            .entry("Callable", Pattern::exact("Callable"), Summary(SummaryKind::Callable))
            .build()
    }

    /// First entry matching a host type name
    ///
    /// The name is normalized before matching. Unparsable names match nothing.
    #[must_use]
    pub fn resolve(&self, type_name: &str) -> Option<&CatalogEntry>
    {
        self.position(type_name).and_then(|index| self.entries.get(index))
    }

    /// Index of the first entry matching a host type name
    #[must_use]
    pub fn position(&self, type_name: &str) -> Option<usize>
    {
        let parsed = TypeName::parse(type_name)?;
        self.entries.iter().position(|entry| entry.pattern.matches(&parsed))
    }

    /// Entry at a position returned by [`Catalog::position`]
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&CatalogEntry>
    {
        self.entries.get(index)
    }

    /// All entries in resolution order
    #[must_use]
    pub fn entries(&self) -> &[CatalogEntry]
    {
        &self.entries
    }
}

/// Builder preserving declaration order
#[derive(Debug)]
pub struct CatalogBuilder
{
    entries: Vec<CatalogEntry>,
}

impl CatalogBuilder
{
    /// Append a binding after every previously declared one
    #[must_use]
    pub fn entry(mut self, label: &'static str, pattern: Pattern, binding: Binding) -> Self
    {
        self.entries.push(CatalogEntry { label, pattern, binding });
        self
    }

    /// Freeze the catalog
    #[must_use]
    pub fn build(self) -> Catalog
    {
        Catalog { entries: self.entries }
    }
}
