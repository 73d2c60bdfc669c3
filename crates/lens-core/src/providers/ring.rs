//! Power-of-two ring buffers.

use tracing::debug;

use super::{children_summary, parse_index, ArrayLayout, ArrayProvider, Sequence, Shape};
use crate::error::Result;
use crate::remote::Remote;
use crate::session::Inspector;
use crate::summary::{Budget, INVALID};
use crate::types::{Address, BasicKind, RemoteValue};

/// Children placed before the elements
const CURSORS: usize = 2;

#[derive(Debug, Clone, Copy, Default)]
struct Cursors
{
    read: u64,
    write: u64,
    mask: u64,
}

/// Provider for `RingBuffer<T>`
///
/// Wraps the backing `Vector<T>` and shows two extra children first:
/// `[read_pos p]` and `[write_pos p]`, the elements the cursors point at
/// (`p = pos & size_mask`). A cursor pointing outside the buffer shows as
/// a null placeholder instead of failing.
#[derive(Debug)]
pub struct RingBufferProvider
{
    label: String,
    value: RemoteValue,
    data: Option<ArrayProvider>,
    cursors: Cursors,
}

impl RingBufferProvider
{
    #[must_use]
    pub fn new(label: impl Into<String>, value: RemoteValue) -> Self
    {
        RingBufferProvider { label: label.into(), value, data: None, cursors: Cursors::default() }
    }

    /// Read cursor, already masked
    #[must_use]
    pub const fn read_position(&self) -> u64
    {
        self.cursors.read & self.cursors.mask
    }

    /// Write cursor, already masked
    #[must_use]
    pub const fn write_position(&self) -> u64
    {
        self.cursors.write & self.cursors.mask
    }

    fn read_cursors(&self, remote: &Remote<'_>) -> Result<Cursors>
    {
        Ok(Cursors {
            read: remote.field_unsigned(&self.value, "read_pos")?,
            write: remote.field_unsigned(&self.value, "write_pos")?,
            mask: remote.field_unsigned(&self.value, "size_mask")?,
        })
    }

    fn cursor_child(&self, cx: &Inspector<'_>, cursor: &str, position: u64) -> Option<RemoteValue>
    {
        let name = format!("[{cursor} {position}]");
        let element = usize::try_from(position)
            .ok()
            .and_then(|index| self.data.as_ref()?.element_named(cx, index, &name));
        match element {
            Some(element) => Some(element),
            None => {
                let null = cx.remote().basic_type(BasicKind::NullPtr)?;
                Some(RemoteValue::new(name, Address::ZERO, null))
            }
        }
    }

    fn elements(&self) -> usize
    {
        self.data.as_ref().map_or(0, Shape::child_count)
    }
}

impl Shape for RingBufferProvider
{
    fn update(&mut self, cx: &Inspector<'_>)
    {
        let remote = cx.remote();
        self.data = None;
        let cursors = match self.read_cursors(&remote) {
            Ok(cursors) => cursors,
            Err(err) => {
                debug!(value = %self.value, %err, "ring buffer cursors unreadable");
                return;
            }
        };
        let Some(vector) = remote.read_child(&self.value, "data") else {
            debug!(value = %self.value, "ring buffer has no data member");
            return;
        };
        let mut data = ArrayProvider::new("Vector", vector, ArrayLayout::Cow);
        data.update(cx);
        // Cursors past the data are shown as null children, not rejected
        if data.is_valid() {
            self.cursors = cursors;
            self.data = Some(data);
        } else {
            debug!(value = %self.value, "ring buffer data failed validation");
        }
    }

    fn is_valid(&self) -> bool
    {
        self.data.is_some()
    }

    fn child_count(&self) -> usize
    {
        if self.is_valid() { self.elements() + CURSORS } else { 0 }
    }

    fn child_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        if !self.is_valid() {
            return None;
        }
        match index {
            0 => self.cursor_child(cx, "read_pos", self.read_position()),
            1 => self.cursor_child(cx, "write_pos", self.write_position()),
            _ => self.data.as_mut()?.child_at(cx, index - CURSORS),
        }
    }

    fn index_of_child(&mut self, _cx: &Inspector<'_>, name: &str) -> Option<usize>
    {
        if name.starts_with("[read_pos") {
            return Some(0);
        }
        if name.starts_with("[write_pos") {
            return Some(1);
        }
        parse_index(name).filter(|index| *index < self.elements()).map(|index| index + CURSORS)
    }

    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String
    {
        let (read, write) = (self.read_position(), self.write_position());
        let Some(data) = self.data.as_mut() else {
            return INVALID.to_string();
        };
        let count = data.child_count();
        let prefix = if count == 0 {
            format!("{}[0]{{", self.label)
        } else {
            format!("{}[{count}]{{<read_pos:{read}> <write_pos:{write}> ", self.label)
        };
        let children = children_summary(data, cx, budget.at(budget.consumed + prefix.len()));
        format!("{prefix}{children}}}")
    }
}

impl Sequence for RingBufferProvider
{
    fn label(&self) -> &str
    {
        &self.label
    }

    fn element_summary(&mut self, cx: &Inspector<'_>, index: usize, budget: Budget) -> String
    {
        match self.data.as_mut() {
            Some(data) => data.element_summary(cx, index, budget),
            None => INVALID.to_string(),
        }
    }
}
