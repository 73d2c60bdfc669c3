//! Intrusive doubly linked structures.
//!
//! Three runtime containers share this provider: the plain `List<T>`, the
//! insertion-ordered `HashMap<K, V>` (its elements are threaded through a
//! list) and the `RBMap<K, V>` tree (its nodes carry in-order `_next` and
//! `_prev` links). They differ only in where the count, the ends and the
//! link members live, which [`ListLayout`] captures.

use tracing::{debug, trace};

use super::{list_summary, Sequence, Shape};
use crate::cache::ElementCache;
use crate::error::{InspectError, Result};
use crate::remote::Remote;
use crate::session::Inspector;
use crate::summary::Budget;
use crate::types::{Address, RemoteValue};

/// Member names of one linked container family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListLayout
{
    /// `List<T>`: `_data->{first, last, size_cache}`, nodes hold `value`
    List,
    /// `HashMap<K, V>`: `head_element`, `tail_element`, `num_elements`,
    /// nodes hold `data`
    HashMap,
    /// `RBMap<K, V>`: `_data.{_root, _nil, size_cache}`, nodes hold `_data`
    RBMap,
}

impl ListLayout
{
    /// Member pointing at the next node
    #[must_use]
    pub const fn next_link(self) -> &'static str
    {
        match self {
            ListLayout::List => "next_ptr",
            ListLayout::HashMap => "next",
            ListLayout::RBMap => "_next",
        }
    }

    /// Member pointing at the previous node
    #[must_use]
    pub const fn prev_link(self) -> &'static str
    {
        match self {
            ListLayout::List => "prev_ptr",
            ListLayout::HashMap => "prev",
            ListLayout::RBMap => "_prev",
        }
    }

    /// Member holding the element payload
    #[must_use]
    pub const fn payload(self) -> &'static str
    {
        match self {
            ListLayout::List => "value",
            ListLayout::HashMap => "data",
            ListLayout::RBMap => "_data",
        }
    }

    const fn name(self) -> &'static str
    {
        match self {
            ListLayout::List => "list",
            ListLayout::HashMap => "hash map",
            ListLayout::RBMap => "ordered map",
        }
    }

    /// Stored element count
    ///
    /// A list whose shared `_data` block was never allocated is empty.
    fn size(self, remote: &Remote<'_>, value: &RemoteValue) -> Result<u64>
    {
        match self {
            ListLayout::List => {
                let data = remote.field(value, "_data")?;
                if remote.pointer_value(&data)?.is_null() {
                    return Ok(0);
                }
                signed_count(remote.field_signed(&remote.deref(&data)?, "size_cache")?)
            }
            ListLayout::HashMap => remote.field_unsigned(value, "num_elements"),
            ListLayout::RBMap => signed_count(remote.field_signed(&remote.field(value, "_data")?, "size_cache")?),
        }
    }

    /// First node
    fn head(self, remote: &Remote<'_>, value: &RemoteValue) -> Result<RemoteValue>
    {
        match self {
            ListLayout::List => remote.deref(&remote.field_path(value, &["_data", "first"])?),
            ListLayout::HashMap => remote.deref(&remote.field(value, "head_element")?),
            ListLayout::RBMap => {
                let data = remote.field(value, "_data")?;
                let nil = remote.pointer_value(&remote.field(&data, "_nil")?)?;
                let root = remote.deref(&remote.field(&data, "_root")?)?;
                let mut link = remote.field(&root, "left")?;
                if remote.pointer_value(&link)? == nil {
                    return Err(InspectError::Corrupt("tree has a count but no nodes".to_string()));
                }
                // The leftmost node comes first; bounded so a cycle cannot spin forever
                for _ in 0..MAX_TREE_DEPTH {
                    let node = remote.deref(&link)?;
                    let left = remote.field(&node, "left")?;
                    if remote.pointer_value(&left)? == nil {
                        return Ok(node);
                    }
                    link = left;
                }
                Err(InspectError::Corrupt("tree is deeper than any balanced tree can be".to_string()))
            }
        }
    }

    /// Last node
    fn tail(self, remote: &Remote<'_>, value: &RemoteValue) -> Result<RemoteValue>
    {
        match self {
            ListLayout::List => remote.deref(&remote.field_path(value, &["_data", "last"])?),
            ListLayout::HashMap => remote.deref(&remote.field(value, "tail_element")?),
            ListLayout::RBMap => Err(InspectError::UnsupportedShape { shape: self.name(), operation: "tail" }),
        }
    }
}

/// A red-black tree of 2^64 nodes is at most 128 levels deep
const MAX_TREE_DEPTH: usize = 128;

fn signed_count(count: i64) -> Result<u64>
{
    u64::try_from(count).map_err(|_| InspectError::Corrupt(format!("negative element count {count}")))
}

/// Node after `node`, or `None` at a null or unreadable link
fn follow(remote: &Remote<'_>, node: &RemoteValue, link: &str) -> Option<RemoteValue>
{
    let pointer = remote.read_child(node, link)?;
    remote.deref(&pointer).ok()
}

/// Provider for linked lists and list-threaded maps
///
/// ## Validation
///
/// With a non-zero count, the head must be readable with a null `prev`
/// link and the tail readable with a null `next` link. With two or more
/// elements, `head.next` and `tail.prev` must each be readable. Layouts
/// without a tail pointer skip the tail checks.
///
/// ## Caching
///
/// Nodes are cached in an [`ElementCache`] up to `cacheFetchWindow`
/// entries. Indices past that ceiling are reached by an uncached walk that
/// resumes from the previous walk or from the last cached node.
///
/// A chain that ends before the stored count invalidates the whole list.
#[derive(Debug)]
pub struct LinkedListProvider
{
    label: String,
    value: RemoteValue,
    layout: ListLayout,
    prefetch: usize,
    head: Option<RemoteValue>,
    len: usize,
    valid: bool,
    cache: ElementCache,
    walk: Option<(usize, RemoteValue)>,
}

impl LinkedListProvider
{
    /// Provider over `value`, caching `prefetch` nodes on every update
    #[must_use]
    pub fn new(label: impl Into<String>, value: RemoteValue, layout: ListLayout, prefetch: usize) -> Self
    {
        LinkedListProvider {
            label: label.into(),
            value,
            layout,
            prefetch,
            head: None,
            len: 0,
            valid: false,
            cache: ElementCache::new(1, 0),
            walk: None,
        }
    }

    /// Family of this list
    #[must_use]
    pub const fn layout(&self) -> ListLayout
    {
        self.layout
    }

    /// Number of nodes currently cached
    #[must_use]
    pub fn cached(&self) -> usize
    {
        self.cache.len()
    }

    fn validate(&self, remote: &Remote<'_>) -> Result<(u64, Option<RemoteValue>)>
    {
        let layout = self.layout;
        let size = layout.size(remote, &self.value)?;
        if size == 0 {
            return Ok((0, None));
        }

        let head = layout.head(remote, &self.value)?;
        let prev = remote.read_child(&head, layout.prev_link());
        if !remote.is_null_pointer(prev.as_ref()) {
            return Err(InspectError::Corrupt("head.prev is not null".to_string()));
        }
        if size >= 2 && !remote.is_valid_pointer(remote.read_child(&head, layout.next_link()).as_ref()) {
            return Err(InspectError::Corrupt("head.next is not readable".to_string()));
        }

        match layout.tail(remote, &self.value) {
            Ok(tail) => {
                let next = remote.read_child(&tail, layout.next_link());
                if !remote.is_null_pointer(next.as_ref()) {
                    return Err(InspectError::Corrupt("tail.next is not null".to_string()));
                }
                if size >= 2 && !remote.is_valid_pointer(remote.read_child(&tail, layout.prev_link()).as_ref()) {
                    return Err(InspectError::Corrupt("tail.prev is not readable".to_string()));
                }
            }
            Err(InspectError::UnsupportedShape { .. }) => {}
            Err(err) => return Err(err),
        }
        Ok((size, Some(head)))
    }

    /// Node struct at `index`
    pub fn node_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        if !self.valid || index >= self.len {
            return None;
        }
        let remote = cx.remote();
        if index >= self.cache.ceiling() {
            return self.walk_to(&remote, index);
        }
        let link = self.layout.next_link();
        let head = self.head.clone();
        let node = self.cache.fetch(index, self.len, || head, |node| follow(&remote, node, link)).cloned();
        if node.is_none() {
            self.invalidate("list ends before its stored count");
        }
        node
    }

    fn walk_to(&mut self, remote: &Remote<'_>, index: usize) -> Option<RemoteValue>
    {
        let link = self.layout.next_link();
        let ceiling = self.cache.ceiling();
        let start = match self.walk.take() {
            Some((at, node)) if at <= index => Some((at, node)),
            _ if ceiling == 0 => self.head.clone().map(|head| (0, head)),
            _ => {
                let head = self.head.clone();
                let cached = self.cache.ensure_cached(ceiling, self.len, || head, |node| follow(remote, node, link));
                if cached < ceiling { None } else { self.cache.get(cached - 1).cloned().map(|node| (cached - 1, node)) }
            }
        };
        let Some((mut at, mut node)) = start else {
            self.invalidate("list ends before its stored count");
            return None;
        };

        trace!(from = at, to = index, "uncached list walk");
        while at < index {
            let Some(next) = follow(remote, &node, link) else {
                self.invalidate("list ends before its stored count");
                return None;
            };
            node = next;
            at += 1;
        }
        self.walk = Some((at, node.clone()));
        Some(node)
    }

    fn invalidate(&mut self, reason: &str)
    {
        debug!(value = %self.value, claimed = self.len, cached = self.cache.len(), reason, "list invalidated");
        self.valid = false;
        self.len = 0;
        self.head = None;
        self.walk = None;
        self.cache.clear();
    }

    /// Address of the node at `index`
    pub fn node_address(&mut self, cx: &Inspector<'_>, index: usize) -> Option<Address>
    {
        self.node_at(cx, index).map(|node| node.address())
    }
}

impl Shape for LinkedListProvider
{
    fn update(&mut self, cx: &Inspector<'_>)
    {
        let remote = cx.remote();
        let window = cx.options().cache_fetch_window;
        self.cache = ElementCache::new(window, window);
        self.head = None;
        self.len = 0;
        self.valid = false;
        self.walk = None;

        match self.validate(&remote) {
            Ok((size, head)) => match usize::try_from(size) {
                Ok(len) => {
                    self.len = len;
                    self.head = head;
                    self.valid = true;
                }
                Err(_) => debug!(value = %self.value, size, "list count does not fit"),
            },
            Err(err) => {
                debug!(value = %self.value, %err, "list validation failed");
                return;
            }
        }

        let link = self.layout.next_link();
        let head = self.head.clone();
        let wanted = self.prefetch.min(self.len).min(self.cache.ceiling());
        let cached = self.cache.ensure_cached(self.prefetch, self.len, || head, |node| follow(&remote, node, link));
        if cached < wanted {
            self.invalidate("list ends before its stored count");
        }
    }

    fn is_valid(&self) -> bool
    {
        self.valid
    }

    fn child_count(&self) -> usize
    {
        self.len
    }

    fn child_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        let node = self.node_at(cx, index)?;
        let payload = cx.remote().read_child(&node, self.layout.payload())?;
        Some(payload.renamed(format!("[{index}]")))
    }

    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String
    {
        list_summary(self, cx, budget)
    }
}

impl Sequence for LinkedListProvider
{
    fn label(&self) -> &str
    {
        &self.label
    }
}
