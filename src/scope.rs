//! OID ranges with an optional context.
//!
//! A [`Scope`] is both the key a managed object is registered under and the
//! bound a query searches within. Each end of the range is either included
//! or excluded; the upper end may be absent, meaning "no upper bound".
//!
//! Contexts partition the OID space. `None` is the wildcard context: a
//! scope without a context overlaps scopes of every context.

use std::cmp::Ordering;
use std::fmt;

use bytes::Bytes;

use crate::oid::Oid;

/// A half-open-or-closed OID range, optionally qualified by a context.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Scope {
    lower: Oid,
    lower_included: bool,
    upper: Option<Oid>,
    upper_included: bool,
    context: Option<Bytes>,
}

impl Scope {
    /// Create a scope from explicit bounds.
    ///
    /// A scope whose lower bound lies above its upper bound is valid but
    /// empty: it contains and overlaps nothing.
    pub fn new(lower: Oid, lower_included: bool, upper: Option<Oid>, upper_included: bool) -> Self {
        Self {
            lower,
            lower_included,
            upper,
            upper_included,
            context: None,
        }
    }

    /// The single-point range `[oid, oid]`.
    pub fn point(oid: Oid) -> Self {
        Self::new(oid.clone(), true, Some(oid), true)
    }

    /// The open range `(oid, +inf)`: everything lexicographically after `oid`.
    pub fn after(oid: Oid) -> Self {
        Self::new(oid, false, None, false)
    }

    /// Every OID starting with `prefix`: `[prefix, prefix.next_peer())`.
    pub fn subtree(prefix: Oid) -> Self {
        let upper = prefix.next_peer();
        Self::new(prefix, true, upper, false)
    }

    /// Qualify this scope with a context.
    ///
    /// `Some` of an empty context names the default context: it matches
    /// wildcard scopes but not scopes of a named context.
    pub fn with_context(mut self, context: Option<Bytes>) -> Self {
        self.context = context;
        self
    }

    /// Lower bound.
    pub fn lower_bound(&self) -> &Oid {
        &self.lower
    }

    /// Whether the lower bound itself is part of the range.
    pub fn is_lower_included(&self) -> bool {
        self.lower_included
    }

    /// Upper bound, or `None` when unbounded.
    pub fn upper_bound(&self) -> Option<&Oid> {
        self.upper.as_ref()
    }

    /// Whether the upper bound itself is part of the range.
    pub fn is_upper_included(&self) -> bool {
        self.upper_included
    }

    /// Context, or `None` for the wildcard.
    pub fn context(&self) -> Option<&Bytes> {
        self.context.as_ref()
    }

    /// True when the range is a single included point.
    pub fn is_point(&self) -> bool {
        self.lower_included && self.upper_included && self.upper.as_ref() == Some(&self.lower)
    }

    /// True when no OID lies within the range.
    pub fn is_empty(&self) -> bool {
        match &self.upper {
            None => false,
            Some(upper) => {
                !lower_reaches_upper(&self.lower, self.lower_included, upper, self.upper_included)
            }
        }
    }

    /// Check whether `oid` lies within the range.
    pub fn contains(&self, oid: &Oid) -> bool {
        let above_lower = match oid.cmp(&self.lower) {
            Ordering::Greater => true,
            Ordering::Equal => self.lower_included,
            Ordering::Less => false,
        };
        if !above_lower {
            return false;
        }
        match &self.upper {
            None => true,
            Some(upper) => match oid.cmp(upper) {
                Ordering::Less => true,
                Ordering::Equal => self.upper_included,
                Ordering::Greater => false,
            },
        }
    }

    /// Check whether two contexts can see each other.
    pub fn contexts_match(a: Option<&Bytes>, b: Option<&Bytes>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }

    /// Check whether the OID ranges intersect, ignoring contexts.
    pub fn overlaps_range(&self, other: &Scope) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        starts_before_end(self, other) && starts_before_end(other, self)
    }

    /// Check whether the ranges intersect and the contexts match.
    pub fn overlaps(&self, other: &Scope) -> bool {
        Self::contexts_match(self.context(), other.context()) && self.overlaps_range(other)
    }

    /// Check whether `other` lies entirely within this range (contexts ignored).
    pub fn covers(&self, other: &Scope) -> bool {
        if other.is_empty() {
            return true;
        }
        let lower_ok = match self.lower.cmp(&other.lower) {
            Ordering::Less => true,
            Ordering::Equal => self.lower_included || !other.lower_included,
            Ordering::Greater => false,
        };
        let upper_ok = match (&self.upper, &other.upper) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(mine), Some(theirs)) => match mine.cmp(theirs) {
                Ordering::Greater => true,
                Ordering::Equal => self.upper_included || !other.upper_included,
                Ordering::Less => false,
            },
        };
        lower_ok && upper_ok
    }

    /// Narrow this range to what lies above `other`.
    ///
    /// The new lower bound is `other`'s upper bound, excluded if `other`
    /// included it. Returns `false` when nothing remains, either because
    /// `other` is unbounded above or because the narrowed range is empty.
    pub fn subtract(&mut self, other: &Scope) -> bool {
        let Some(upper) = other.upper.as_ref() else {
            // Nothing can lie above an unbounded range.
            self.lower_included = false;
            self.upper = Some(self.lower.clone());
            self.upper_included = false;
            return false;
        };
        let advances = match upper.cmp(&self.lower) {
            Ordering::Greater => true,
            Ordering::Equal => self.lower_included && other.upper_included,
            Ordering::Less => false,
        };
        if advances {
            self.lower = upper.clone();
            self.lower_included = !other.upper_included;
        }
        !self.is_empty()
    }

    /// Move the lower bound to just past `oid`.
    pub fn exclude_through(&mut self, oid: Oid) {
        self.lower = oid;
        self.lower_included = false;
    }
}

/// Does a range starting at (`lower`, `lower_included`) reach an upper end
/// at (`upper`, `upper_included`)?
fn lower_reaches_upper(
    lower: &Oid,
    lower_included: bool,
    upper: &Oid,
    upper_included: bool,
) -> bool {
    match lower.cmp(upper) {
        Ordering::Less => {
            // (L, L.0) holds no OID: L.0 is L's immediate successor.
            lower_included || upper_included || *upper != lower.successor()
        }
        Ordering::Equal => lower_included && upper_included,
        Ordering::Greater => false,
    }
}

fn starts_before_end(a: &Scope, b: &Scope) -> bool {
    match &b.upper {
        None => true,
        Some(upper) => lower_reaches_upper(&a.lower, a.lower_included, upper, b.upper_included),
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{}@", String::from_utf8_lossy(context))?;
        }
        write!(f, "{}{}, ", if self.lower_included { '[' } else { '(' }, self.lower)?;
        match &self.upper {
            Some(upper) => write!(f, "{}", upper)?,
            None => write!(f, "+inf")?,
        }
        write!(f, "{}", if self.upper_included { ']' } else { ')' })
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Scope({})", self)
    }
}
