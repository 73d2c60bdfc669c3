//! Remote value handles.

use std::fmt;

use super::{Address, TypeHandle};

/// A typed value living at an address in the inspected process
///
/// This is only a handle: it carries no bytes. Reading goes through
/// [`Remote`](crate::remote::Remote), which may fail at any time because the
/// target can change underneath us. Handles are valid for the current
/// inspection step only and are cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteValue
{
    name: String,
    address: Address,
    ty: TypeHandle,
}

impl RemoteValue
{
    /// Create a handle for a value of type `ty` at `address`
    #[must_use]
    pub fn new(name: impl Into<String>, address: Address, ty: TypeHandle) -> Self
    {
        RemoteValue { name: name.into(), address, ty }
    }

    /// Display name of the value (field name, `[i]`, `[key]`, ...)
    #[must_use]
    pub fn name(&self) -> &str
    {
        &self.name
    }

    /// Location of the first byte
    #[must_use]
    pub const fn address(&self) -> Address
    {
        self.address
    }

    /// Declared type
    #[must_use]
    pub const fn type_handle(&self) -> TypeHandle
    {
        self.ty
    }

    /// Same value under a different display name
    #[must_use]
    pub fn renamed(mut self, name: impl Into<String>) -> Self
    {
        self.name = name.into();
        self
    }
}

impl fmt::Display for RemoteValue
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} @ {} ({})", self.name, self.address, self.ty)
    }
}
