//! Arrays split into fixed-size pages.

use tracing::debug;

use super::{list_summary, Sequence, Shape};
use crate::error::{InspectError, Result};
use crate::remote::Remote;
use crate::session::Inspector;
use crate::summary::Budget;
use crate::types::{Address, RemoteValue, TypeHandle};

#[derive(Debug, Clone, Copy)]
struct Pages
{
    table: Address,
    shift: u32,
    mask: u64,
    item_type: TypeHandle,
    item_size: u64,
    len: usize,
}

/// Provider for `PagedArray<T>`
///
/// Element `i` is at `page_data[i >> page_size_shift] + (i & page_size_mask)
/// * size_of::<T>()`. Validation checks the page pool bookkeeping, the mask
/// against the shift and that the last element is readable.
#[derive(Debug)]
pub struct PagedArrayProvider
{
    label: String,
    value: RemoteValue,
    pages: Option<Pages>,
}

impl PagedArrayProvider
{
    #[must_use]
    pub fn new(label: impl Into<String>, value: RemoteValue) -> Self
    {
        PagedArrayProvider { label: label.into(), value, pages: None }
    }

    fn measure(&self, remote: &Remote<'_>) -> Result<Pages>
    {
        let value = &self.value;
        let count = remote.field_unsigned(value, "count")?;
        let shift = remote.field_unsigned(value, "page_size_shift")?;
        let mask = remote.field_unsigned(value, "page_size_mask")?;
        let page_data = remote.field(value, "page_data")?;
        let table = remote.pointer_value(&page_data)?;

        let item_type = remote
            .type_of(&page_data)
            .and_then(|info| info.pointee())
            .and_then(|page| remote.info(page))
            .and_then(|page| page.pointee())
            .ok_or_else(|| InspectError::NotAPointer("page_data".to_string()))?;
        let item_size = remote.byte_size(item_type).unwrap_or(0);
        let len = usize::try_from(count).map_err(|_| InspectError::Corrupt(format!("count {count} does not fit")))?;

        let shift = u32::try_from(shift).ok().filter(|s| *s < 64).ok_or_else(|| {
            InspectError::Corrupt(format!("page shift {shift} is out of range"))
        })?;
        if mask != (1u64 << shift) - 1 {
            return Err(InspectError::Corrupt(format!("page mask {mask:#x} does not match shift {shift}")));
        }
        let pages = Pages { table, shift, mask, item_type, item_size, len };
        if len == 0 {
            return Ok(pages);
        }

        let pool = remote.field(value, "page_pool")?;
        if !remote.is_valid_pointer(Some(&pool)) {
            return Err(InspectError::NullDereference("page_pool".to_string()));
        }
        let allocated = remote.field_unsigned(&pool, "pages_allocated")?;
        let available = remote.field_unsigned(&pool, "pages_available")?;
        if allocated < available {
            return Err(InspectError::Corrupt(format!("{available} pages available out of {allocated} allocated")));
        }
        if item_size == 0 {
            return Err(InspectError::Corrupt("element type has no size".to_string()));
        }
        if !remote.is_valid_pointer(Some(&page_data)) {
            return Err(InspectError::NullDereference("page_data".to_string()));
        }
        let last = element_address(remote, &pages, len - 1)?;
        if !remote.is_readable(last, item_size) {
            return Err(InspectError::Unreadable { address: last, len: item_size });
        }
        Ok(pages)
    }
}

fn element_address(remote: &Remote<'_>, pages: &Pages, index: usize) -> Result<Address>
{
    let index = index as u64;
    let slot = pages
        .table
        .element(index >> pages.shift, remote.host().pointer_size())
        .ok_or(InspectError::AddressOverflow(pages.table))?;
    let page = remote.read_pointer_at(slot)?;
    if page.is_null() {
        return Err(InspectError::NullDereference(format!("page {}", index >> pages.shift)));
    }
    page.element(index & pages.mask, pages.item_size)
        .ok_or(InspectError::AddressOverflow(page))
}

impl Shape for PagedArrayProvider
{
    fn update(&mut self, cx: &Inspector<'_>)
    {
        self.pages = match self.measure(&cx.remote()) {
            Ok(pages) => Some(pages),
            Err(err) => {
                debug!(value = %self.value, %err, "paged array validation failed");
                None
            }
        };
    }

    fn is_valid(&self) -> bool
    {
        self.pages.is_some()
    }

    fn child_count(&self) -> usize
    {
        self.pages.map_or(0, |pages| pages.len)
    }

    fn child_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        let pages = self.pages?;
        if index >= pages.len {
            return None;
        }
        let remote = cx.remote();
        let address = element_address(&remote, &pages, index).ok()?;
        remote.value_at(&format!("[{index}]"), address, pages.item_type)
    }

    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String
    {
        list_summary(self, cx, budget)
    }
}

impl Sequence for PagedArrayProvider
{
    fn label(&self) -> &str
    {
        &self.label
    }
}
