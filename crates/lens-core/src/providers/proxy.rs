//! Containers that forward to an inner container.
//!
//! `Array` and `Dictionary` are reference-counted handles around a private
//! block (`_p`) that owns the real `Vector<Variant>` or `HashMap<Variant,
//! Variant>`. `VSet` wraps a sorted `Vector`. The proxy resolves that
//! indirection once per update and delegates everything else.

use tracing::debug;

use super::{children_summary, Purpose, ProviderInstance, Sequence, Shape};
use crate::catalog::ShapeKind;
use crate::error::{InspectError, Result};
use crate::session::Inspector;
use crate::summary::{Budget, INVALID};
use crate::types::RemoteValue;

/// Which wrapper a proxy unwraps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyTarget
{
    /// `Array` and `TypedArray<T>`: `_p->array`
    Array,
    /// `Dictionary`: `_p->variant_map`
    Dictionary,
    /// `VSet<T>`: `_data`
    VSet,
}

impl ProxyTarget
{
    /// Member path to the inner container and the inner container's shape
    const fn route(self) -> (&'static [&'static str], ShapeKind)
    {
        match self {
            ProxyTarget::Array => (&["_p", "array"], ShapeKind::Vector),
            ProxyTarget::Dictionary => (&["_p", "variant_map"], ShapeKind::HashMap),
            ProxyTarget::VSet => (&["_data"], ShapeKind::Vector),
        }
    }
}

/// Provider delegating to the container behind a wrapper
///
/// When the indirection is broken the proxy is invalid and no inner
/// provider is constructed.
#[derive(Debug)]
pub struct ProxyProvider
{
    label: String,
    value: RemoteValue,
    target: ProxyTarget,
    purpose: Purpose,
    inner: Option<Box<ProviderInstance>>,
}

impl ProxyProvider
{
    #[must_use]
    pub fn new(label: impl Into<String>, value: RemoteValue, target: ProxyTarget, purpose: Purpose) -> Self
    {
        ProxyProvider { label: label.into(), value, target, purpose, inner: None }
    }

    /// Provider of the wrapped container, when the indirection resolved
    #[must_use]
    pub fn inner(&self) -> Option<&ProviderInstance>
    {
        self.inner.as_deref()
    }

    /// Key lookup on the wrapped container
    ///
    /// ## Errors
    ///
    /// Fails when the wrapped container has no keys.
    pub fn lookup_by_key(&mut self, cx: &Inspector<'_>, key: &str) -> Result<Option<usize>>
    {
        match self.inner.as_deref_mut() {
            Some(inner) => inner.lookup_by_key(cx, key),
            None => Ok(None),
        }
    }

    fn resolve(&self, cx: &Inspector<'_>) -> Result<RemoteValue>
    {
        let remote = cx.remote();
        let (path, _) = self.target.route();
        let mut current = self.value.clone();
        for member in path {
            let next = remote.field(&current, member)?;
            // Pointers must be followable before anything is built on them
            let is_pointer = remote.type_of(&next).is_some_and(|info| info.is_pointer());
            current = if is_pointer {
                remote.deref(&next)?
            } else {
                next
            };
        }
        if remote.type_of(&current).is_none() {
            return Err(InspectError::UnknownTypeHandle(current.type_handle().0));
        }
        Ok(current)
    }
}

impl Shape for ProxyProvider
{
    fn update(&mut self, cx: &Inspector<'_>)
    {
        self.inner = match self.resolve(cx) {
            Ok(target) => {
                let (_, kind) = self.target.route();
                Some(Box::new(ProviderInstance::open(cx, kind, &target, self.purpose)))
            }
            Err(err) => {
                debug!(value = %self.value, %err, "proxy indirection is broken");
                None
            }
        };
    }

    fn is_valid(&self) -> bool
    {
        self.inner.as_ref().is_some_and(|inner| inner.is_valid())
    }

    fn child_count(&self) -> usize
    {
        self.inner.as_ref().map_or(0, |inner| inner.child_count())
    }

    fn child_at(&mut self, cx: &Inspector<'_>, index: usize) -> Option<RemoteValue>
    {
        self.inner.as_mut()?.child_at(cx, index)
    }

    fn index_of_child(&mut self, cx: &Inspector<'_>, name: &str) -> Option<usize>
    {
        self.inner.as_mut()?.index_of_child(cx, name)
    }

    fn summary(&mut self, cx: &Inspector<'_>, budget: Budget) -> String
    {
        let Some(inner) = self.inner.as_deref_mut().filter(|inner| inner.is_valid()) else {
            return INVALID.to_string();
        };
        let prefix = format!("{}[{}]{{", self.label, inner.child_count());
        let children = children_summary(inner, cx, budget.at(budget.consumed + prefix.len()));
        format!("{prefix}{children}}}")
    }
}

impl Sequence for ProxyProvider
{
    fn label(&self) -> &str
    {
        &self.label
    }

    fn element_summary(&mut self, cx: &Inspector<'_>, index: usize, budget: Budget) -> String
    {
        match self.inner.as_deref_mut() {
            Some(inner) => inner.element_summary(cx, index, budget),
            None => INVALID.to_string(),
        }
    }
}
