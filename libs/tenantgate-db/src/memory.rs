//! In-memory store enforcing the same tenant isolation as the Postgres
//! policy. Used by tests and by embedders without a database.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use tenantgate_security::{
    QuerySpec, SortDirection, TenantId, TenantOwned, display_affinity, properties,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::DbError;
use crate::policy::row_visible;
use crate::session::TenantSession;

/// A stored row: identity, tenant affinity and free-form attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRow {
    pub id: Uuid,
    pub tenant: Option<TenantId>,
    pub attrs: Map<String, Value>,
}

impl MemoryRow {
    #[must_use]
    pub fn new(id: Uuid, tenant: Option<TenantId>) -> Self {
        Self {
            id,
            tenant,
            attrs: Map::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(field.into(), value.into());
        self
    }

    /// Property lookup matching the column naming of SQL tables.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<Value> {
        match field {
            properties::RESOURCE_ID => Some(Value::String(self.id.to_string())),
            properties::TENANT_ID => self.tenant.map(|t| Value::String(t.to_string())),
            other => self.attrs.get(other).cloned(),
        }
    }
}

impl TenantOwned for MemoryRow {
    fn tenant_affinity(&self) -> Option<TenantId> {
        self.tenant
    }
}

type Tables = HashMap<String, Vec<MemoryRow>>;

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert rows without any policy check, as a migration or owner would.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = MemoryRow>) {
        self.tables
            .write()
            .entry(table.to_owned())
            .or_default()
            .extend(rows);
    }

    /// A session with no tenant context. Every data access fails until
    /// [`TenantSession::set_tenant`] has run.
    #[must_use]
    pub fn session(&self) -> MemorySession {
        MemorySession {
            tables: Arc::clone(&self.tables),
            context: None,
        }
    }

    /// A session with `tenant` already bound.
    #[must_use]
    pub fn bound_session(&self, tenant: Option<TenantId>) -> MemorySession {
        MemorySession {
            tables: Arc::clone(&self.tables),
            context: Some(tenant),
        }
    }
}

/// One storage session. The context lives in the session and goes away
/// with it.
#[derive(Debug)]
pub struct MemorySession {
    tables: Arc<RwLock<Tables>>,
    context: Option<Option<TenantId>>,
}

impl MemorySession {
    /// Bind the context. A session is bound once; binding the same value
    /// again is a no-op.
    ///
    /// # Errors
    /// Returns [`DbError::ContextMismatch`] when a different context is
    /// already bound. The existing binding is kept.
    pub fn bind(&mut self, tenant: Option<TenantId>) -> Result<(), DbError> {
        match self.context {
            Some(bound) if bound != tenant => {
                warn!(
                    bound = %display_affinity(bound),
                    requested = %display_affinity(tenant),
                    "rebinding tenant context rejected"
                );
                Err(DbError::ContextMismatch {
                    bound: display_affinity(bound),
                    expected: display_affinity(tenant),
                })
            }
            _ => {
                self.context = Some(tenant);
                Ok(())
            }
        }
    }

    /// Bound context; `Ok(None)` is the global context.
    ///
    /// # Errors
    /// Returns [`DbError::ContextNotEstablished`] before any binding.
    pub fn context(&self) -> Result<Option<TenantId>, DbError> {
        self.context.ok_or(DbError::ContextNotEstablished)
    }

    /// Visible rows of `table` matching the `where` slot, then sorted and
    /// paged.
    ///
    /// # Errors
    /// Returns [`DbError::ContextNotEstablished`] on an unbound session.
    pub fn select(&self, table: &str, spec: &QuerySpec) -> Result<Vec<MemoryRow>, DbError> {
        let ctx = self.context()?;
        let tables = self.tables.read();
        let mut rows: Vec<MemoryRow> = tables
            .get(table)
            .into_iter()
            .flatten()
            .filter(|row| row_visible(row.tenant, ctx))
            .filter(|row| spec.matches(|f| row.get(f)))
            .cloned()
            .collect();
        drop(tables);

        for key in spec.sort_keys().iter().rev() {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(&key.field).as_ref(), b.get(&key.field).as_ref());
                match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            });
        }

        let offset = usize::try_from(spec.offset_value().unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = spec
            .limit_value()
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    /// Visible row by id.
    ///
    /// # Errors
    /// Returns [`DbError::ContextNotEstablished`] on an unbound session.
    pub fn find(&self, table: &str, id: Uuid) -> Result<Option<MemoryRow>, DbError> {
        let ctx = self.context()?;
        Ok(self
            .tables
            .read()
            .get(table)
            .and_then(|rows| rows.iter().find(|r| r.id == id))
            .filter(|row| row_visible(row.tenant, ctx))
            .cloned())
    }

    /// # Errors
    /// Returns [`DbError::PolicyViolation`] when the row would be invisible
    /// to the bound context, [`DbError::Conflict`] on a duplicate id.
    pub fn insert(&self, table: &str, row: MemoryRow) -> Result<(), DbError> {
        let ctx = self.context()?;
        check_write(table, &row, ctx)?;

        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_owned()).or_default();
        if rows.iter().any(|r| r.id == row.id) {
            return Err(DbError::Conflict {
                table: table.to_owned(),
                id: row.id,
            });
        }
        rows.push(row);
        Ok(())
    }

    /// Apply `change` to a visible row. Returns `false` when no visible row
    /// has that id. The change is discarded if its result would be
    /// invisible to the bound context.
    ///
    /// # Errors
    /// Returns [`DbError::PolicyViolation`] for a rejected change.
    pub fn update<F>(&self, table: &str, id: Uuid, change: F) -> Result<bool, DbError>
    where
        F: FnOnce(&mut MemoryRow),
    {
        let ctx = self.context()?;
        let mut tables = self.tables.write();
        let Some(slot) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|r| r.id == id))
            .filter(|row| row_visible(row.tenant, ctx))
        else {
            return Ok(false);
        };

        let mut updated = slot.clone();
        change(&mut updated);
        updated.id = id;
        check_write(table, &updated, ctx)?;
        *slot = updated;
        Ok(true)
    }

    /// Delete a visible row. Returns `false` when no visible row has that id.
    ///
    /// # Errors
    /// Returns [`DbError::ContextNotEstablished`] on an unbound session.
    pub fn delete(&self, table: &str, id: Uuid) -> Result<bool, DbError> {
        let ctx = self.context()?;
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(false);
        };
        let before = rows.len();
        rows.retain(|r| r.id != id || !row_visible(r.tenant, ctx));
        Ok(rows.len() < before)
    }
}

#[async_trait]
impl TenantSession for MemorySession {
    async fn set_tenant(&mut self, tenant: Option<TenantId>) -> Result<(), DbError> {
        self.bind(tenant)?;
        debug!("tenant context bound");
        Ok(())
    }
}

fn check_write(table: &str, row: &MemoryRow, ctx: Option<TenantId>) -> Result<(), DbError> {
    if row_visible(row.tenant, ctx) {
        Ok(())
    } else {
        warn!(table, "write rejected by tenant isolation policy");
        Err(DbError::PolicyViolation {
            table: table.to_owned(),
        })
    }
}

/// Total order for sorting: absent first, then by value.
fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}
