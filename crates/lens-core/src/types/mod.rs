//! # Types
//!
//! Vocabulary shared by every layer of the engine: addresses, value handles,
//! host type descriptors and normalized type names.

pub mod address;
pub mod descriptor;
pub mod name;
pub mod value;

// Re-export all public types
pub use address::Address;
pub use descriptor::{BasicKind, EnumMember, Field, TypeHandle, TypeInfo, TypeKind};
pub use name::{normalize, without_template, TypeName};
pub use value::RemoteValue;
