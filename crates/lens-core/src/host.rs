//! # Introspection Trait
//!
//! The capability the host debugger lends to the engine.
//!
//! The engine never talks to a process directly. Everything it knows about
//! memory and types comes through this trait, implemented by the embedding
//! debugger (or by [`MemoryImage`](crate::snapshot::MemoryImage) in tests).
//!
//! ## Contract
//!
//! - Every method is synchronous and may fail at any time: the target may
//!   have exited, the page may be unmapped, the value may be optimized out.
//! - Implementations must never write to inspected memory.
//! - Type handles are only meaningful for the implementation that issued
//!   them.

use crate::error::Result;
use crate::types::{Address, BasicKind, RemoteValue, TypeHandle, TypeInfo};

/// Host type and memory introspection
///
/// ## Thread Safety
///
/// Calls arrive on the host's UI thread one at a time. Implementations do
/// not need interior synchronization.
pub trait Introspection
{
    /// Describe a type previously handed out by this host
    fn type_info(&self, ty: TypeHandle) -> Option<&TypeInfo>;

    /// Look a type up by its fully spelled name (for example `String` or
    /// `Variant::ObjData`)
    fn find_type(&self, name: &str) -> Option<TypeHandle>;

    /// Handle of a built-in scalar type
    fn basic_type(&self, kind: BasicKind) -> Option<TypeHandle>;

    /// Fill `buf` with the bytes at `address`
    ///
    /// ## Errors
    ///
    /// Returns [`InspectError::Unreadable`](crate::error::InspectError::Unreadable)
    /// if any byte of the range is not readable.
    fn read_memory(&self, address: Address, buf: &mut [u8]) -> Result<()>;

    /// Look up a global variable of the target
    ///
    /// The default implementation knows no globals.
    fn find_global(&self, _name: &str) -> Option<RemoteValue>
    {
        None
    }

    /// Size of a data pointer in bytes
    fn pointer_size(&self) -> u64
    {
        8
    }
}
