//! # lens-core
//!
//! Container introspection engine for a native game-engine runtime.
//!
//! A debugger shows a `HashMap<String, int>` as a tangle of buckets, hash
//! arrays and element pointers. This crate turns the raw memory of such a
//! value back into what the programmer wrote: an element count, a list of
//! children and a short one-line summary. It provides:
//! - A remote value accessor over the host debugger's type and memory API
//! - An ordered catalog binding type-name patterns to container shapes
//! - One validating provider per container shape (arrays, lists, maps, ...)
//! - Bounded recursive summaries that never fail and never run away
//!
//! ## Failure model
//!
//! Inspected memory may be corrupt, half-initialized or freed. Every layer
//! returns [`Result`]; the [`session`] facade is the boundary that turns
//! errors and panics into `<invalid>` so the host never sees a failure.
//!
//! ## No unsafe code
//!
//! All target access goes through the host's [`host::Introspection`]
//! implementation; this crate never touches foreign memory itself.

pub mod cache;
pub mod catalog;
pub mod error;
pub mod host;
pub mod options;
pub mod prelude;
pub mod providers;
pub mod remote;
pub mod session;
pub mod snapshot;
pub mod summary;
pub mod types;

// Re-export commonly used types
pub use catalog::{Binding, Catalog, ShapeKind, SummaryKind};
pub use error::{InspectError, Result};
pub use host::Introspection;
pub use options::{MapDisplayStyle, Options, OptionsError};
pub use session::{Inspector, ProviderHandle, ProviderId, Session};
pub use types::{Address, RemoteValue, TypeHandle};
