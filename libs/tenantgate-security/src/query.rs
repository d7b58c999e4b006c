use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tenant::TenantId;

/// Well-known property names.
///
/// Shared by the scoping engine, the condition compiler and the row policy so
/// that the tenant predicate always lands on the same column.
pub mod properties {
    /// Tenant-affinity property. Maps to the `tenant_id` column.
    pub const TENANT_ID: &str = "tenant_id";

    /// Resource identity property. Typically maps to the primary key column.
    pub const RESOURCE_ID: &str = "id";
}

/// A single condition on a named field.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FieldPredicate {
    /// `field = value` (`field IS NULL` when `value` is null).
    Eq { field: String, value: Value },
    /// `field IN (values)`.
    In { field: String, values: Vec<Value> },
    /// `field IS NULL`.
    IsNull { field: String },
}

impl FieldPredicate {
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            field: field.into(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn is_in(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::In {
            field: field.into(),
            values,
        }
    }

    #[must_use]
    pub fn is_null(field: impl Into<String>) -> Self {
        Self::IsNull {
            field: field.into(),
        }
    }

    /// `tenant_id = tenant`.
    #[must_use]
    pub fn tenant_eq(tenant: TenantId) -> Self {
        Self::equals(properties::TENANT_ID, tenant.to_string())
    }

    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Eq { field, .. } | Self::In { field, .. } | Self::IsNull { field } => field,
        }
    }

    /// Evaluate against a field value; `None` means the field is absent.
    #[must_use]
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let actual = actual.filter(|v| !v.is_null());
        match self {
            Self::Eq { value, .. } if value.is_null() => actual.is_none(),
            Self::Eq { value, .. } => actual == Some(value),
            Self::In { values, .. } => actual.is_some_and(|a| values.contains(a)),
            Self::IsNull { .. } => actual.is_none(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Query specification passed through the scoping engine.
///
/// Only the `where` slot is touched by access control: predicates are AND-ed
/// and access control only ever appends. Sort, pagination and include lists
/// are opaque here and carried through untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySpec {
    #[serde(default, rename = "where")]
    filter: Vec<FieldPredicate>,
    #[serde(default)]
    order_by: Vec<SortKey>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    offset: Option<u64>,
    #[serde(default)]
    include: Vec<String>,
}

impl QuerySpec {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`QuerySpec::and_where`].
    #[must_use]
    pub fn with_where(mut self, predicate: FieldPredicate) -> Self {
        self.and_where(predicate);
        self
    }

    /// Builder shorthand for `field = value`.
    #[must_use]
    pub fn where_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.with_where(FieldPredicate::equals(field, value))
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order_by.push(SortKey {
            field: field.into(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn include(mut self, relation: impl Into<String>) -> Self {
        self.include.push(relation.into());
        self
    }

    /// Conjoin a predicate. An identical predicate already present is not
    /// added again, so repeated scoping converges.
    pub fn and_where(&mut self, predicate: FieldPredicate) {
        if !self.filter.contains(&predicate) {
            self.filter.push(predicate);
        }
    }

    /// The conjunction in the `where` slot.
    #[inline]
    #[must_use]
    pub fn predicates(&self) -> &[FieldPredicate] {
        &self.filter
    }

    #[inline]
    #[must_use]
    pub fn sort_keys(&self) -> &[SortKey] {
        &self.order_by
    }

    #[inline]
    #[must_use]
    pub fn limit_value(&self) -> Option<u64> {
        self.limit
    }

    #[inline]
    #[must_use]
    pub fn offset_value(&self) -> Option<u64> {
        self.offset
    }

    #[inline]
    #[must_use]
    pub fn includes(&self) -> &[String] {
        &self.include
    }

    /// Check if any predicate references the given field.
    #[must_use]
    pub fn has_field(&self, field: &str) -> bool {
        self.filter.iter().any(|p| p.field() == field)
    }

    /// Evaluate the `where` slot in-process; `lookup` yields a field's value.
    #[must_use]
    pub fn matches<F>(&self, lookup: F) -> bool
    where
        F: Fn(&str) -> Option<Value>,
    {
        self.filter
            .iter()
            .all(|p| p.matches(lookup(p.field()).as_ref()))
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn and_where_is_idempotent() {
        let mut q = QuerySpec::new().where_eq("status", "active");
        q.and_where(FieldPredicate::equals("status", "active"));
        assert_eq!(q.predicates().len(), 1);
    }

    #[test]
    fn and_where_keeps_caller_filters_and_paging() {
        let mut q = QuerySpec::new()
            .where_eq("status", "active")
            .order_by("email", SortDirection::Desc)
            .limit(20)
            .offset(40)
            .include("roles");
        q.and_where(FieldPredicate::is_null("deleted_at"));

        assert_eq!(q.predicates().len(), 2);
        assert_eq!(q.sort_keys()[0].field, "email");
        assert_eq!(q.limit_value(), Some(20));
        assert_eq!(q.offset_value(), Some(40));
        assert_eq!(q.includes(), ["roles".to_owned()]);
    }

    #[test]
    fn predicates_evaluate_in_process() {
        let row = json!({"status": "active", "tenant_id": null, "kind": "admin"});
        let lookup = |f: &str| row.get(f).cloned();

        assert!(QuerySpec::new().where_eq("status", "active").matches(lookup));
        assert!(
            QuerySpec::new()
                .with_where(FieldPredicate::is_null("tenant_id"))
                .matches(lookup)
        );
        assert!(
            QuerySpec::new()
                .with_where(FieldPredicate::is_in("kind", vec![json!("admin"), json!("ops")]))
                .matches(lookup)
        );
        assert!(!QuerySpec::new().where_eq("status", "disabled").matches(lookup));
        assert!(!QuerySpec::new().where_eq("missing", "x").matches(lookup));
    }

    #[test]
    fn where_slot_serializes_under_where_key() {
        let q = QuerySpec::new().where_eq("status", "active");
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json["where"][0]["op"], "eq");
        assert_eq!(json["where"][0]["field"], "status");

        let back: QuerySpec = serde_json::from_value(json!({
            "where": [{"op": "is_null", "field": "tenant_id"}]
        }))
        .unwrap();
        assert!(back.has_field("tenant_id"));
    }
}
