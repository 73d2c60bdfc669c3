//! Remote memory address type.

use std::fmt;
use std::ops::{Add, Sub};

/// Address in the inspected process
///
/// Every location handed out by the host or computed by a provider is an
/// `Address`, never a bare `u64`, so element counts and byte sizes cannot be
/// mixed up with locations.
///
/// Provider arithmetic goes through [`Address::element`] and
/// [`Address::checked_add`]: a corrupt count can produce offsets far outside
/// the address space and those must surface as `None`, not wrap around.
///
/// ## Example
///
/// ```rust
/// use lens_core::types::Address;
///
/// let base = Address::new(0x1000);
/// assert_eq!(base.element(3, 8), Some(Address::new(0x1018)));
/// assert_eq!(base.element(u64::MAX, 8), None);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(u64);

impl Address
{
    /// The zero address, used as the null pointer value
    pub const ZERO: Self = Address(0);

    /// Create an address from a raw value
    #[must_use]
    pub const fn new(value: u64) -> Self
    {
        Address(value)
    }

    /// Raw value of this address
    #[must_use]
    pub const fn value(self) -> u64
    {
        self.0
    }

    /// Whether this is the zero address
    #[must_use]
    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    /// Add a byte offset, returning `None` on overflow
    #[must_use]
    pub fn checked_add(self, offset: u64) -> Option<Self>
    {
        self.0.checked_add(offset).map(Address)
    }

    /// Subtract a byte offset, returning `None` on underflow
    #[must_use]
    pub fn checked_sub(self, offset: u64) -> Option<Self>
    {
        self.0.checked_sub(offset).map(Address)
    }

    /// Address of element `index` in a contiguous buffer starting here
    ///
    /// Computes `self + index * stride` with overflow checks on both the
    /// multiplication and the addition.
    #[must_use]
    pub fn element(self, index: u64, stride: u64) -> Option<Self>
    {
        index.checked_mul(stride).and_then(|offset| self.checked_add(offset))
    }
}

impl From<u64> for Address
{
    fn from(value: u64) -> Self
    {
        Address(value)
    }
}

impl From<Address> for u64
{
    fn from(address: Address) -> Self
    {
        address.0
    }
}

impl fmt::Display for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "0x{:016x}", self.0)
    }
}

impl fmt::LowerHex for Address
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl Add<u64> for Address
{
    type Output = Address;

    fn add(self, offset: u64) -> Self::Output
    {
        Address(self.0.wrapping_add(offset))
    }
}

impl Sub<u64> for Address
{
    type Output = Address;

    fn sub(self, offset: u64) -> Self::Output
    {
        Address(self.0.wrapping_sub(offset))
    }
}
