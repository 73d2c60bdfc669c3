//! # Bounded Recursive Summarizer
//!
//! Turns any typed remote value into a short display string.
//!
//! Every call walks the same small state machine:
//!
//! 1. **Enter**: bail out with [`TRUNCATED`] once the length or depth budget
//!    is spent.
//! 2. **Classify**: scalars and enums are printed directly; pointers are
//!    followed once; the two "any object" base types render as an opaque
//!    placeholder, which breaks reference cycles without tracking visited
//!    addresses.
//! 3. **Delegate**: types bound in the catalog use their formatter or
//!    container provider.
//! 4. **Expand**: anything else is rendered member by member as
//!    `{name:value, ...}`, each member with one more level of depth and a
//!    budget reduced by what was already emitted.
//!
//! The two budgets are independent, so termination holds even for
//! self-referential or enormous structures.

pub mod builtin;
pub mod scalar;

use tracing::debug;

use crate::catalog::Binding;
use crate::error::{InspectError, Result};
use crate::providers::{Purpose, ProviderInstance, Shape};
use crate::session::Inspector;
use crate::types::{normalize, RemoteValue, TypeHandle, TypeKind};

/// Pointer is zero
pub const NULL: &str = "<null>";
/// Empty dynamic value
pub const NIL: &str = "<nil>";
/// Well-formed but zero-length
pub const EMPTY: &str = "<empty>";
/// Could not be determined, or corrupt
pub const INVALID: &str = "<invalid>";
/// Budget exhausted or cyclic branch
pub const TRUNCATED: &str = "{...}";
/// Appended when some children were left out
pub const ELLIPSIS: &str = ", ...";

/// Budget held back for the closing of enclosing levels
pub const CHILD_RESERVE: usize = 20;

/// Characters a facade summary may exceed `maxSummaryLength` by
pub const SUMMARY_SLACK: usize = 32;

/// Type names that every object derives from; expanding them loops back
const CYCLIC_BASES: [&str; 2] = ["Object", "RefCounted"];

/// Remaining budget of one summarizer call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Budget
{
    /// Characters already emitted by enclosing levels
    pub consumed: usize,
    /// Nesting level of this call (0 at the top)
    pub depth: usize,
    /// Whether plain structs may be expanded member by member
    pub expand: bool,
    /// Whether base-class subobjects are left out of an expansion
    pub skip_bases: bool,
}

impl Budget
{
    /// Budget of a top-level summary
    #[must_use]
    pub const fn root() -> Self
    {
        Budget { consumed: 0, depth: 0, expand: true, skip_bases: false }
    }

    /// Budget for a nested value starting after `consumed` characters
    #[must_use]
    pub const fn child(self, consumed: usize) -> Self
    {
        Budget { consumed, depth: self.depth + 1, expand: self.expand, skip_bases: false }
    }

    /// Same level, starting after `consumed` characters
    #[must_use]
    pub const fn at(self, consumed: usize) -> Self
    {
        Budget { consumed, ..self }
    }

    /// Forbid member-by-member expansion of unbound structs
    #[must_use]
    pub const fn without_expansion(self) -> Self
    {
        Budget { expand: false, ..self }
    }

    /// Leave base-class subobjects out
    #[must_use]
    pub const fn skipping_bases(self) -> Self
    {
        Budget { skip_bases: true, ..self }
    }
}

/// Cut `text` to `limit` characters, marking the cut with `...`
#[must_use]
pub fn clip(text: &str, limit: usize) -> String
{
    match text.char_indices().nth(limit) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.to_string(),
    }
}

impl Inspector<'_>
{
    /// Summarize a value, rendering any failure as [`INVALID`]
    #[must_use]
    pub fn summarize(&self, value: &RemoteValue, budget: Budget) -> String
    {
        self.try_summarize(value, budget).unwrap_or_else(|err| {
            debug!(value = %value, %err, "summary failed");
            INVALID.to_string()
        })
    }

    /// Summarize a value, reporting why a summary could not be produced
    ///
    /// ## Errors
    ///
    /// Fails when the value's type is unknown or when the bound formatter
    /// cannot read what it needs. Failures of nested members are rendered
    /// inline and do not fail the whole summary.
    pub fn try_summarize(&self, value: &RemoteValue, budget: Budget) -> Result<String>
    {
        let options = self.options();
        if budget.consumed > options.max_summary_length || budget.depth >= options.max_recursion_depth {
            return Ok(TRUNCATED.to_string());
        }

        let remote = self.remote();
        let info = remote.type_of(value).ok_or(InspectError::UnknownTypeHandle(value.type_handle().0))?;
        let target = match &info.kind {
            TypeKind::Basic(_) | TypeKind::Enumeration { .. } => return scalar::format_leaf(&remote, value, info),
            TypeKind::Pointer { pointee } => match self.classify_pointer(value, *pointee, budget)? {
                Classified::Leaf(text) => return Ok(text),
                Classified::Composite(target) => target,
            },
            TypeKind::Array { .. } | TypeKind::Struct { .. } => value.clone(),
        };
        let target_info = remote.type_of(&target).ok_or(InspectError::UnknownTypeHandle(target.type_handle().0))?;

        let name = normalize(&target_info.name);
        if CYCLIC_BASES.contains(&name.as_str()) {
            return Ok(TRUNCATED.to_string());
        }

        match self.binding_for(&target_info.name) {
            Some(Binding::Summary(kind)) => builtin::summarize(self, kind, &target, budget),
            Some(Binding::Shape(kind)) => {
                let mut provider = ProviderInstance::open(self, kind, &target, Purpose::Summary);
                Ok(provider.summary(self, budget))
            }
            None if budget.expand => Ok(self.expand_members(&target, budget)),
            None => Ok(TRUNCATED.to_string()),
        }
    }

    /// Leaf formatting or a summary, for a nested member
    pub(crate) fn summarize_member(&self, member: &RemoteValue, budget: Budget) -> String
    {
        let remote = self.remote();
        match remote.type_of(member) {
            Some(info) if matches!(info.kind, TypeKind::Basic(_) | TypeKind::Enumeration { .. }) => {
                scalar::format_leaf(&remote, member, info).unwrap_or_else(|_| INVALID.to_string())
            }
            Some(_) => self.summarize(member, budget),
            None => INVALID.to_string(),
        }
    }

    fn classify_pointer(&self, value: &RemoteValue, pointee: TypeHandle, budget: Budget) -> Result<Classified>
    {
        let remote = self.remote();
        let address = remote.pointer_value(value)?;
        if address.is_null() {
            return Ok(Classified::Leaf(NULL.to_string()));
        }
        let pointee_info = remote.info(pointee).ok_or(InspectError::UnknownTypeHandle(pointee.0))?;
        match &pointee_info.kind {
            TypeKind::Basic(kind) if kind.is_narrow_char() => {
                let limit = self.options().max_summary_length.saturating_sub(budget.consumed).max(1);
                let (bytes, _) = remote.read_c_string(address, limit + 1)?;
                let text = String::from_utf8_lossy(&bytes);
                Ok(Classified::Leaf(format!("\"{}\"", clip(&text, limit))))
            }
            TypeKind::Basic(_) | TypeKind::Enumeration { .. } | TypeKind::Pointer { .. } => {
                Ok(Classified::Leaf(format!("0x{:x}", address.value())))
            }
            TypeKind::Array { .. } | TypeKind::Struct { .. } => match remote.deref(value) {
                Ok(target) => Ok(Classified::Composite(target)),
                Err(_) => Ok(Classified::Leaf(INVALID.to_string())),
            },
        }
    }

    fn expand_members(&self, value: &RemoteValue, budget: Budget) -> String
    {
        let Ok(members) = self.remote().members(value) else {
            return INVALID.to_string();
        };
        let max = self.options().max_summary_length;
        let limit = if budget.consumed == 0 { max } else { max.saturating_sub(CHILD_RESERVE) };

        let mut out = String::from("{");
        let mut skipped_base = false;
        let count = members.len();
        for (i, member) in members.iter().enumerate() {
            if budget.skip_bases && member.is_base {
                skipped_base = true;
                continue;
            }
            let last = i + 1 == count;
            out.push_str(member.value.name());
            out.push(':');
            let piece = self.summarize_member(&member.value, budget.child(budget.consumed + out.len()));
            out.push_str(&piece);
            if budget.consumed + out.len() > limit {
                if !last {
                    out.push_str(ELLIPSIS);
                }
                break;
            }
            if !last {
                out.push_str(", ");
            }
        }
        if out == "{" {
            out.push_str("...");
        } else if skipped_base && !out.ends_with(ELLIPSIS) {
            out.push_str(ELLIPSIS);
        }
        out.push('}');
        out
    }
}

enum Classified
{
    Leaf(String),
    Composite(RemoteValue),
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_clip()
    {
        assert_eq!(clip("hello", 10), "hello");
        assert_eq!(clip("hello", 3), "hel...");
        assert_eq!(clip("héllo", 2), "hé...");
    }

    #[test]
    fn test_budget_steps()
    {
        let root = Budget::root();
        let child = root.child(12);
        assert_eq!(child.depth, 1);
        assert_eq!(child.consumed, 12);
        assert!(!child.without_expansion().expand);
        assert!(root.skipping_bases().skip_bases);
        assert_eq!(root.at(5).depth, 0);
    }
}
