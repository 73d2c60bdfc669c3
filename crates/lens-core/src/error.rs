//! # Error Types
//!
//! Error handling for the introspection engine.
//!
//! Remote memory may be unmapped, half-written or plain garbage at any point,
//! so almost every read in this crate can fail. Internal layers return
//! [`Result`] and use `?` freely; the session facade is the only place where an
//! [`InspectError`] is turned into a displayable sentinel string.

use thiserror::Error;

use crate::types::Address;

/// Main error type for inspection operations
///
/// ## Error Categories
///
/// 1. **Memory errors**: `Unreadable`, `NullDereference`, `AddressOverflow`
/// 2. **Type errors**: `UnknownType`, `MissingField`, `NotAPointer`
/// 3. **Structure errors**: `Corrupt`, `UnsupportedShape`
/// 4. **Configuration errors**: `Options`
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InspectError
{
    /// The host refused to read `len` bytes at `address`
    ///
    /// Happens when the target exited, the page was unmapped, or the value
    /// was optimized out and the host handed back a bogus location.
    #[error("Memory at {address} is unreadable ({len} bytes)")]
    Unreadable
    {
        /// First byte that was requested
        address: Address,
        /// Requested length
        len: u64,
    },

    /// A pointer that had to be followed was zero
    #[error("Null pointer dereference while reading {0}")]
    NullDereference(String),

    /// Address arithmetic left the 64-bit address space
    #[error("Address arithmetic overflowed at {0}")]
    AddressOverflow(Address),

    /// The host does not know a type by this name
    #[error("Unknown type: {0}")]
    UnknownType(String),

    /// The type handle could not be described by the host
    #[error("Type handle {0} is not described by the host")]
    UnknownTypeHandle(u32),

    /// A struct does not contain the requested member
    #[error("Type {type_name} has no member `{field}`")]
    MissingField
    {
        /// Display name of the inspected type
        type_name: String,
        /// Requested member name
        field: String,
    },

    /// A pointer operation was attempted on a non-pointer value
    #[error("Value `{0}` is not a pointer")]
    NotAPointer(String),

    /// Structural validation rejected the container layout
    ///
    /// The string describes the invariant that failed (for example
    /// "head.prev is not null").
    #[error("Corrupt structure: {0}")]
    Corrupt(String),

    /// The operation is not available for this container shape
    #[error("Operation `{operation}` is not supported by the {shape} shape")]
    UnsupportedShape
    {
        /// Shape label
        shape: &'static str,
        /// Operation that was requested
        operation: &'static str,
    },

    /// A configuration key or value was rejected
    #[error(transparent)]
    Options(#[from] crate::options::OptionsError),
}

/// Result type alias for inspection operations
pub type Result<T> = std::result::Result<T, InspectError>;
