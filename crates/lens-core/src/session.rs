//! # Session and Dispatch Facade
//!
//! A [`Session`] lives as long as the debugging session. It owns the
//! read-only catalog, the configuration, a memo of catalog resolutions and
//! the weak registry of live providers. Nothing in it is global: the host
//! creates one and passes it around by reference.
//!
//! Every request from the host goes through an [`Inspector`], a cheap
//! per-call view pairing the session with the host's introspection
//! capability. The `Inspector` facade methods ([`Inspector::summary`],
//! [`Inspector::open`], [`Inspector::children`]) and every
//! [`ProviderHandle`] method are failure boundaries: errors and panics
//! raised anywhere below are logged and turned into `<invalid>` (annotated
//! with the failing entry and operation) or into an empty result.
//!
//! ## Example
//!
//! ```rust
//! use lens_core::prelude::*;
//!
//! let mut image = MemoryImage::new();
//! let mut rt = RuntimeBuilder::new(&mut image);
//! let int = rt.int();
//! let list = rt.new_list("numbers", int, [1, 2, 3]).unwrap();
//!
//! let session = Session::new(Options::default());
//! let cx = session.inspector(&image);
//! assert_eq!(cx.summary(&list), "List[3]{1, 2, 3}");
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use once_cell::unsync::OnceCell;
use tracing::{debug, trace, warn};

use crate::catalog::{Binding, Catalog, CatalogEntry};
use crate::error::Result;
use crate::host::Introspection;
use crate::options::{Options, OptionsError};
use crate::providers::{Purpose, ProviderInstance, Shape};
use crate::remote::Remote;
use crate::summary::builtin::{color_components, color_hex};
use crate::summary::{clip, Budget, INVALID, SUMMARY_SLACK};
use crate::types::{normalize, RemoteValue};

/// Child name that resolves to a provider's registry id
pub const OBJECT_ID_CHILD: &str = "$$object-id$$";

/// Global table of named colors in the target
const NAMED_COLORS_GLOBAL: &str = "named_colors";

/// Longest color name read from the target
const MAX_COLOR_NAME: usize = 64;

/// Request-scoped identity of a live provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProviderId(pub u64);

impl fmt::Display for ProviderId
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        write!(f, "provider#{}", self.0)
    }
}

/// Weak map from provider id to live provider
///
/// Holding an entry never keeps a provider alive. Dead entries are pruned
/// whenever a new provider registers.
#[derive(Debug, Default)]
struct Registry
{
    next: u64,
    live: HashMap<ProviderId, (&'static str, Weak<RefCell<ProviderInstance>>)>,
}

impl Registry
{
    fn register(&mut self, label: &'static str, instance: &Rc<RefCell<ProviderInstance>>) -> ProviderId
    {
        self.live.retain(|_, (_, weak)| weak.strong_count() > 0);
        let id = ProviderId(self.next);
        self.next += 1;
        self.live.insert(id, (label, Rc::downgrade(instance)));
        trace!(%id, label, live = self.live.len(), "provider registered");
        id
    }

    fn lookup(&self, id: ProviderId) -> Option<(&'static str, Rc<RefCell<ProviderInstance>>)>
    {
        let (label, weak) = self.live.get(&id)?;
        Some((label, weak.upgrade()?))
    }
}

/// Long-lived state of one debugging session
pub struct Session
{
    catalog: Catalog,
    options: Options,
    effective: Options,
    resolved: RefCell<HashMap<String, Option<usize>>>,
    registry: RefCell<Registry>,
    named_colors: OnceCell<HashMap<String, String>>,
}

impl fmt::Debug for Session
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Session")
            .field("entries", &self.catalog.entries().len())
            .field("options", &self.options)
            .field("resolved", &self.resolved.borrow().len())
            .field("live_providers", &self.live_providers())
            .finish_non_exhaustive()
    }
}

impl Session
{
    /// Session over the runtime catalog
    #[must_use]
    pub fn new(options: Options) -> Self
    {
        Self::with_catalog(Catalog::runtime(), options)
    }

    /// Session over a custom catalog
    #[must_use]
    pub fn with_catalog(catalog: Catalog, options: Options) -> Self
    {
        let effective = options.effective();
        debug!(entries = catalog.entries().len(), "session started");
        Session {
            catalog,
            options,
            effective,
            resolved: RefCell::new(HashMap::new()),
            registry: RefCell::new(Registry::default()),
            named_colors: OnceCell::new(),
        }
    }

    /// Options as configured (before compatibility mode is applied)
    #[must_use]
    pub fn options(&self) -> &Options
    {
        &self.options
    }

    /// Change one option from its string form
    ///
    /// ## Errors
    ///
    /// Rejects unknown keys and unparsable values; the session is unchanged
    /// on error.
    pub fn set_option(&mut self, key: &str, value: &str) -> std::result::Result<(), OptionsError>
    {
        let mut options = self.options.clone();
        options.set(key, value)?;
        self.effective = options.effective();
        self.options = options;
        Ok(())
    }

    /// The bindings used by this session
    #[must_use]
    pub fn catalog(&self) -> &Catalog
    {
        &self.catalog
    }

    /// Per-call view over a host
    #[must_use]
    pub fn inspector<'a>(&'a self, host: &'a dyn Introspection) -> Inspector<'a>
    {
        Inspector { session: self, remote: Remote::new(host) }
    }

    /// A provider that is still alive, by id
    ///
    /// Never extends the provider's lifetime: once every handle is dropped
    /// the lookup fails.
    #[must_use]
    pub fn lookup_provider(&self, id: ProviderId) -> Option<ProviderHandle>
    {
        let (label, instance) = self.registry.borrow().lookup(id)?;
        Some(ProviderHandle { id, label, instance })
    }

    /// Number of registered providers that are still alive
    #[must_use]
    pub fn live_providers(&self) -> usize
    {
        self.registry
            .borrow()
            .live
            .values()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    /// Number of distinct type names resolved so far
    #[must_use]
    pub fn resolved_types(&self) -> usize
    {
        self.resolved.borrow().len()
    }

    fn position(&self, type_name: &str) -> Option<usize>
    {
        if let Some(position) = self.resolved.borrow().get(type_name) {
            return *position;
        }
        let position = self.catalog.position(type_name);
        trace!(type_name, ?position, "catalog resolved");
        self.resolved.borrow_mut().insert(type_name.to_string(), position);
        position
    }
}

/// Per-call context: the session plus the host being inspected
#[derive(Clone, Copy)]
pub struct Inspector<'a>
{
    session: &'a Session,
    remote: Remote<'a>,
}

impl fmt::Debug for Inspector<'_>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.debug_struct("Inspector").field("session", self.session).finish_non_exhaustive()
    }
}

impl<'a> Inspector<'a>
{
    /// Accessor over the host
    #[must_use]
    pub fn remote(&self) -> Remote<'a>
    {
        self.remote
    }

    /// Effective options (compatibility mode applied)
    #[must_use]
    pub fn options(&self) -> &'a Options
    {
        &self.session.effective
    }

    /// The owning session
    #[must_use]
    pub fn session(&self) -> &'a Session
    {
        self.session
    }

    /// Catalog entry for a host type name, memoized per distinct name
    #[must_use]
    pub fn entry_for(&self, type_name: &str) -> Option<&'a CatalogEntry>
    {
        self.session.position(type_name).and_then(|index| self.session.catalog.get(index))
    }

    /// Binding for a host type name
    #[must_use]
    pub fn binding_for(&self, type_name: &str) -> Option<Binding>
    {
        self.entry_for(type_name).map(|entry| entry.binding)
    }

    /// Name of a named color with this `#rrggbbaa` value
    ///
    /// The table is read from the target's `named_colors` global the first
    /// time it is found and kept for the rest of the session.
    #[must_use]
    pub fn named_color(&self, hex: &str) -> Option<String>
    {
        if let Some(table) = self.session.named_colors.get() {
            return table.get(hex).cloned();
        }
        let global = self.remote.host().find_global(NAMED_COLORS_GLOBAL)?;
        let table = self.session.named_colors.get_or_init(|| self.read_named_colors(&global));
        table.get(hex).cloned()
    }

    fn read_named_colors(&self, table: &RemoteValue) -> HashMap<String, String>
    {
        let remote = self.remote;
        let mut colors = HashMap::new();
        let Ok(entries) = remote.members(table) else {
            return colors;
        };
        for entry in entries {
            let Some(name) = remote.read_child(&entry.value, "name") else {
                break;
            };
            let address = match remote.pointer_value(&name) {
                Ok(address) if !address.is_null() => address,
                _ => break,
            };
            let Ok((bytes, _)) = remote.read_c_string(address, MAX_COLOR_NAME) else {
                break;
            };
            let Some(color) = remote.read_child(&entry.value, "color") else {
                break;
            };
            if let Ok(channels) = color_components(&remote, &color) {
                colors
                    .entry(color_hex(channels))
                    .or_insert_with(|| String::from_utf8_lossy(&bytes).into_owned());
            }
        }
        debug!(colors = colors.len(), "named color table loaded");
        colors
    }

    /// Run `body` behind the failure boundary
    ///
    /// Errors and panics are logged with the entry and operation name and
    /// replaced by `fallback`.
    pub fn guard<T, F>(&self, entry: &str, operation: &str, fallback: T, body: F) -> T
    where
        F: FnOnce() -> Result<T>,
    {
        match panic::catch_unwind(AssertUnwindSafe(body)) {
            Ok(Ok(value)) => value,
            Ok(Err(err)) => {
                warn!(entry, operation, %err, "inspection failed");
                fallback
            }
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(ToString::to_string)
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                warn!(entry, operation, message, "inspection panicked");
                fallback
            }
        }
    }

    fn entry_label(&self, value: &RemoteValue) -> String
    {
        let Some(name) = self.remote.type_name(value) else {
            return "value".to_string();
        };
        match self.entry_for(name) {
            Some(entry) => entry.label.to_string(),
            None => normalize(name),
        }
    }

    /// Summary of any value, never failing
    ///
    /// The result is at most `maxSummaryLength` plus [`SUMMARY_SLACK`]
    /// characters long.
    #[must_use]
    pub fn summary(&self, value: &RemoteValue) -> String
    {
        let label = self.entry_label(value);
        let fallback = annotated(&label, "summary");
        let text = self.guard(&label, "summary", fallback, || self.try_summarize(value, Budget::root()));
        let limit = self.options().max_summary_length + SUMMARY_SLACK;
        if text.chars().count() > limit {
            clip(&text, limit.saturating_sub(3))
        } else {
            text
        }
    }

    /// Open the container provider for `value`
    ///
    /// Returns `None` for values without a container binding and when the
    /// provider could not be created.
    #[must_use]
    pub fn open(&self, value: &RemoteValue) -> Option<ProviderHandle>
    {
        let type_name = self.remote.type_name(value)?;
        let entry = self.entry_for(type_name)?;
        let Binding::Shape(kind) = entry.binding else {
            return None;
        };
        let instance = self.guard(entry.label, "open", None, || {
            Ok(Some(ProviderInstance::open(self, kind, value, Purpose::Children)))
        })?;
        let instance = Rc::new(RefCell::new(instance));
        let id = self.session.registry.borrow_mut().register(entry.label, &instance);
        Some(ProviderHandle { id, label: entry.label, instance })
    }

    /// Children of any value, never failing
    ///
    /// Containers list their elements; other structs list their members.
    #[must_use]
    pub fn children(&self, value: &RemoteValue) -> Vec<RemoteValue>
    {
        if let Some(handle) = self.open(value) {
            return handle.children(self);
        }
        let label = self.entry_label(value);
        self.guard(&label, "children", Vec::new(), || {
            Ok(self.remote.members(value)?.into_iter().map(|member| member.value).collect())
        })
    }
}

fn annotated(entry: &str, operation: &str) -> String
{
    format!("{INVALID} ({entry}.{operation})")
}

/// Shared handle to a registered provider
///
/// Cloning the handle keeps the provider alive; the session registry only
/// holds a weak reference. Every method is a failure boundary.
#[derive(Debug, Clone)]
pub struct ProviderHandle
{
    id: ProviderId,
    label: &'static str,
    instance: Rc<RefCell<ProviderInstance>>,
}

impl ProviderHandle
{
    /// Registry id of this provider
    #[must_use]
    pub const fn id(&self) -> ProviderId
    {
        self.id
    }

    /// Catalog label the provider was opened for
    #[must_use]
    pub const fn label(&self) -> &'static str
    {
        self.label
    }

    fn with<T, F>(&self, cx: &Inspector<'_>, operation: &str, fallback: T, body: F) -> T
    where
        F: FnOnce(&mut ProviderInstance) -> Result<T>,
    {
        let Ok(mut instance) = self.instance.try_borrow_mut() else {
            warn!(entry = self.label, operation, "provider is already in use");
            return fallback;
        };
        cx.guard(self.label, operation, fallback, || body(&mut instance))
    }

    /// Re-derive the container from memory
    pub fn update(&self, cx: &Inspector<'_>)
    {
        self.with(cx, "update", (), |instance| {
            instance.update(cx);
            Ok(())
        });
    }

    /// Whether the container validated
    #[must_use]
    pub fn is_valid(&self) -> bool
    {
        self.instance.try_borrow().is_ok_and(|instance| instance.is_valid())
    }

    /// Number of children
    #[must_use]
    pub fn child_count(&self) -> usize
    {
        self.instance.try_borrow().map_or(0, |instance| instance.child_count())
    }

    /// Child at `index`
    #[must_use]
    pub fn child_at(&self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        self.with(cx, "child_at", None, |instance| Ok(instance.child_at(cx, index)))
    }

    /// Index of the child displayed as `name`
    ///
    /// [`OBJECT_ID_CHILD`] resolves to this provider's registry id.
    #[must_use]
    pub fn index_of_child(&self, cx: &Inspector<'_>, name: &str) -> Option<usize>
    {
        if name == OBJECT_ID_CHILD {
            return usize::try_from(self.id.0).ok();
        }
        self.with(cx, "index_of_child", None, |instance| Ok(instance.index_of_child(cx, name)))
    }

    /// Index of the element whose key prints as `key`
    #[must_use]
    pub fn lookup_by_key(&self, cx: &Inspector<'_>, key: &str) -> Option<usize>
    {
        self.with(cx, "lookup_by_key", None, |instance| instance.lookup_by_key(cx, key))
    }

    /// Container summary
    #[must_use]
    pub fn summary(&self, cx: &Inspector<'_>) -> String
    {
        self.with(cx, "summary", annotated(self.label, "summary"), |instance| {
            Ok(instance.summary(cx, Budget::root()))
        })
    }

    /// Every child in order
    ///
    /// Stops at the first child that cannot be produced; the provider has
    /// invalidated itself by then.
    #[must_use]
    pub fn children(&self, cx: &Inspector<'_>) -> Vec<RemoteValue>
    {
        self.with(cx, "children", Vec::new(), |instance| {
            let count = instance.child_count();
            Ok((0..count).map_while(|index| instance.child_at(cx, index)).collect())
        })
    }
}
