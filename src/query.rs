//! Registry queries.
//!
//! A [`Query`] bounds a registry walk with a [`Scope`], states whether the
//! caller intends to write, names the transaction that would own any lock,
//! and optionally restricts matches to an access-control view.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::access::AccessControl;
use crate::object::ManagedObject;
use crate::oid::Oid;
use crate::request::TransactionId;
use crate::scope::Scope;

/// A search bound plus the authorization applied to each candidate.
#[derive(Clone)]
pub struct Query {
    scope: Scope,
    write_intent: bool,
    owner: Option<TransactionId>,
    view: Option<ViewFilter>,
}

#[derive(Clone)]
struct ViewFilter {
    view_name: Bytes,
    access: Arc<dyn AccessControl>,
}

impl Query {
    /// Query `scope` without an owner or view restriction.
    pub fn new(scope: Scope, write_intent: bool) -> Self {
        Self {
            scope,
            write_intent,
            owner: None,
            view: None,
        }
    }

    /// Set the transaction that owns locks taken on behalf of this query.
    pub fn with_owner(mut self, owner: TransactionId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Only match objects whose instances are visible in `view_name`.
    pub fn with_view(mut self, view_name: Bytes, access: Arc<dyn AccessControl>) -> Self {
        self.view = Some(ViewFilter { view_name, access });
        self
    }

    /// The bounded range.
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Whether a match will be written to.
    pub fn is_write_intent(&self) -> bool {
        self.write_intent
    }

    /// Lock owner, if any.
    pub fn owner(&self) -> Option<TransactionId> {
        self.owner
    }

    /// View the query is restricted to, if any.
    pub fn view_name(&self) -> Option<&Bytes> {
        self.view.as_ref().map(|v| &v.view_name)
    }

    /// A search query looks for the first instance after its lower bound
    /// instead of addressing a single OID.
    pub fn is_search(&self) -> bool {
        !self.scope.is_lower_included()
            && self.scope.upper_bound() != Some(self.scope.lower_bound())
    }

    /// Check whether `object` can serve this query.
    ///
    /// Search queries authorize the first instance the object holds within
    /// the scope; point queries authorize the addressed OID.
    pub fn matches(&self, object: &dyn ManagedObject) -> bool {
        if self.is_search() {
            match object.find(&self.scope) {
                Some(first) => self.is_access_allowed(&first),
                None => false,
            }
        } else {
            self.is_access_allowed(self.scope.lower_bound())
        }
    }

    /// Check `oid` against the view. Always true without a view restriction.
    pub fn is_access_allowed(&self, oid: &Oid) -> bool {
        match &self.view {
            Some(filter) => filter.access.is_access_allowed(&filter.view_name, oid),
            None => true,
        }
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("scope", &self.scope)
            .field("write_intent", &self.write_intent)
            .field("owner", &self.owner)
            .field("view_name", &self.view_name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{VacmBuilder, ViewType};
    use crate::message::{SecurityLevel, SecurityModel};
    use crate::object::Scalar;
    use crate::oid;
    use crate::value::Value;

    fn system_only_access() -> Arc<dyn AccessControl> {
        Arc::new(
            VacmBuilder::new()
                .group("public", SecurityModel::V2c, "readers")
                .access("readers", |a| a.read_view("system"))
                .view("system", |v| v.include(oid!(1, 3, 6, 1, 2, 1, 1)))
                .build(),
        )
    }

    #[test]
    fn test_search_query_detection() {
        assert!(Query::new(Scope::after(oid!(1, 3)), false).is_search());
        assert!(!Query::new(Scope::point(oid!(1, 3)), false).is_search());
        assert!(!Query::new(Scope::subtree(oid!(1, 3)), false).is_search());
    }

    #[test]
    fn test_matches_without_view() {
        let scalar = Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0), Value::from("router"));
        let query = Query::new(Scope::after(oid!(1, 3, 6, 1, 2, 1, 1)), false);
        assert!(query.matches(&scalar));

        let past = Query::new(Scope::after(oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)), false);
        assert!(!past.matches(&scalar));
    }

    #[test]
    fn test_matches_with_view() {
        let access = system_only_access();
        let view = access
            .view_name(
                b"",
                b"public",
                SecurityModel::V2c,
                SecurityLevel::NoAuthNoPriv,
                ViewType::Read,
            )
            .unwrap();

        let inside = Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), Value::from("name"));
        let outside = Scalar::read_only(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(2));

        let query = Query::new(Scope::after(oid!(1, 3, 6, 1)), false).with_view(view, access);
        assert!(query.matches(&inside));
        assert!(!query.matches(&outside));
        assert!(query.is_access_allowed(&oid!(1, 3, 6, 1, 2, 1, 1, 9, 1)));
    }
}
