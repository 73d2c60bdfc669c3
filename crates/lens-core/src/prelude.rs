//! Common module for library exports

pub use crate::catalog::{Binding, Catalog, ShapeKind, SummaryKind};
pub use crate::error::{InspectError, Result};
pub use crate::host::Introspection;
pub use crate::options::{MapDisplayStyle, Options, OptionsError};
pub use crate::remote::Remote;
pub use crate::session::{Inspector, ProviderHandle, ProviderId, Session, OBJECT_ID_CHILD};
pub use crate::snapshot::{Item, MemoryImage, RuntimeBuilder};
pub use crate::summary::{Budget, EMPTY, INVALID, NIL, NULL, SUMMARY_SLACK, TRUNCATED};
pub use crate::types::{Address, BasicKind, RemoteValue, TypeHandle, TypeInfo, TypeKind};
