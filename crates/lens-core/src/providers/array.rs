//! Contiguous arrays: copy-on-write buffers and counted buffers.

use tracing::debug;

use super::{list_summary, Sequence, Shape};
use crate::error::{InspectError, Result};
use crate::remote::Remote;
use crate::session::Inspector;
use crate::summary::Budget;
use crate::types::{Address, RemoteValue, TypeHandle};

/// Where an array keeps its element count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLayout
{
    /// `_cowdata._ptr`, with the count in the header word before the buffer
    Cow,
    /// A data pointer next to an explicit count
    Counted
    {
        /// Member holding the element pointer
        data: &'static str,
        /// Member holding the element count
        count: &'static str,
        /// Member holding the allocated capacity, checked against the count
        capacity: Option<&'static str>,
    },
}

impl ArrayLayout
{
    /// `LocalVector<T>`: `data`, `count`, `capacity`
    pub const LOCAL_VECTOR: ArrayLayout = ArrayLayout::Counted { data: "data", count: "count", capacity: Some("capacity") };

    /// `HashSet<T>`: dense `keys` array of `num_elements`
    pub const HASH_SET: ArrayLayout = ArrayLayout::Counted { data: "keys", count: "num_elements", capacity: None };
}

/// Validated location of the elements
#[derive(Debug, Clone, Copy)]
struct Span
{
    base: Address,
    item_type: TypeHandle,
    item_size: u64,
    len: usize,
}

/// Provider for contiguous arrays
///
/// Element `i` lives at `base + i * size_of::<T>()`. The provider is valid
/// when the element pointer, the count and the last element's address all
/// check out; a zero count is valid even with a null buffer.
#[derive(Debug)]
pub struct ArrayProvider
{
    label: String,
    value: RemoteValue,
    layout: ArrayLayout,
    span: Option<Span>,
}

impl ArrayProvider
{
    /// Provider over `value`, not validated until [`Shape::update`]
    #[must_use]
    pub fn new(label: impl Into<String>, value: RemoteValue, layout: ArrayLayout) -> Self
    {
        ArrayProvider { label: label.into(), value, layout, span: None }
    }

    /// Address of the first element (null for an empty copy-on-write buffer)
    #[must_use]
    pub fn base(&self) -> Option<Address>
    {
        self.span.map(|span| span.base)
    }

    /// Element type
    #[must_use]
    pub fn item_type(&self) -> Option<TypeHandle>
    {
        self.span.map(|span| span.item_type)
    }

    /// Element at `index` as a value named `name`
    #[must_use]
    pub fn element_named(&self, cx: &Inspector<'_>, index: usize, name: &str) -> Option<RemoteValue>
    {
        let span = self.span?;
        if index >= span.len {
            return None;
        }
        let address = span.base.element(index as u64, span.item_size)?;
        cx.remote().value_at(name, address, span.item_type)
    }

    fn measure(&self, remote: &Remote<'_>) -> Result<Span>
    {
        let (pointer, len) = match self.layout {
            ArrayLayout::Cow => {
                let cow = remote.field(&self.value, "_cowdata")?;
                let pointer = remote.field(&cow, "_ptr")?;
                let len = remote
                    .peek_container_size(&cow)
                    .ok_or_else(|| InspectError::Corrupt("copy-on-write size is unreadable or negative".to_string()))?;
                (pointer, len)
            }
            ArrayLayout::Counted { data, count, capacity } => {
                let len = remote.field_unsigned(&self.value, count)?;
                if let Some(capacity) = capacity {
                    let capacity = remote.field_unsigned(&self.value, capacity)?;
                    if capacity < len {
                        return Err(InspectError::Corrupt(format!("capacity {capacity} is below count {len}")));
                    }
                }
                (remote.field(&self.value, data)?, len)
            }
        };

        let item_type = remote
            .type_of(&pointer)
            .and_then(|info| info.pointee())
            .ok_or_else(|| InspectError::NotAPointer(pointer.name().to_string()))?;
        let item_size = remote.byte_size(item_type).unwrap_or(0);
        let base = remote.pointer_value(&pointer)?;
        let len = usize::try_from(len).map_err(|_| InspectError::Corrupt(format!("count {len} does not fit")))?;
        if len == 0 {
            return Ok(Span { base, item_type, item_size, len });
        }

        if item_size == 0 {
            return Err(InspectError::Corrupt("element type has no size".to_string()));
        }
        if base.is_null() {
            return Err(InspectError::NullDereference(pointer.name().to_string()));
        }
        let last = base
            .element(len as u64 - 1, item_size)
            .ok_or(InspectError::AddressOverflow(base))?;
        if !remote.is_readable(last, item_size) {
            return Err(InspectError::Unreadable { address: last, len: item_size });
        }
        Ok(Span { base, item_type, item_size, len })
    }
}

impl Shape for ArrayProvider
{
    fn update(&mut self, cx: &Inspector<'_>)
    {
        self.span = match self.measure(&cx.remote()) {
            Ok(span) => Some(span),
            Err(err) => {
                debug!(value = %self.value, %err, "array validation failed");
                None
            }
        };
    }

    fn is_valid(&self) -> bool
    {
        self.span.is_some()
    }

    fn child_count(&self) -> usize
    {
        self.span.map_or(0, |span| span.len)
    }

    fn child_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        self.element_named(cx, index, &format!("[{index}]"))
    }

    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String
    {
        list_summary(self, cx, budget)
    }
}

impl Sequence for ArrayProvider
{
    fn label(&self) -> &str
    {
        &self.label
    }
}
