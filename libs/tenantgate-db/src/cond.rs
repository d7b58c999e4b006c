use sea_orm::sea_query::{ColumnType, Expr, SimpleExpr};
use sea_orm::{
    ColumnTrait, Condition, EntityTrait, Order, QueryFilter, QueryOrder, QuerySelect, Select, Value,
};
use serde_json::Value as JsonValue;
use tenantgate_security::{FieldPredicate, QuerySpec, SortDirection};
use uuid::Uuid;

use crate::error::DbError;

/// Maps query property names to entity columns.
///
/// Properties that do not resolve make compilation fail; a scoped query never
/// silently loses a predicate.
pub trait ScopableEntity: EntityTrait {
    fn resolve_property(property: &str) -> Option<Self::Column>;
}

/// Build a `SeaORM` `Condition` from the `where` slot of a [`QuerySpec`].
///
/// Predicates are AND-ed and every column is qualified with the entity's
/// table, so a join bringing in another `tenant_id` cannot capture them.
/// An empty slot yields an empty condition.
///
/// # Errors
/// Returns [`DbError::UnknownProperty`] for an unresolvable property and
/// [`DbError::InvalidValue`] for a value the column cannot hold.
pub fn build_condition<E>(spec: &QuerySpec) -> Result<Condition, DbError>
where
    E: ScopableEntity,
    E::Column: ColumnTrait + Copy,
{
    let mut and_cond = Condition::all();
    for predicate in spec.predicates() {
        let field = predicate.field();
        let col = E::resolve_property(field)
            .ok_or_else(|| DbError::UnknownProperty(field.to_owned()))?;
        let column = Expr::col((E::default(), col));
        let expr = match predicate {
            FieldPredicate::Eq { value, .. } if value.is_null() => column.is_null(),
            FieldPredicate::Eq { value, .. } => column.eq(to_value(col, field, value)?),
            FieldPredicate::In { values, .. } => {
                let values = values
                    .iter()
                    .map(|v| to_value(col, field, v).map(SimpleExpr::from))
                    .collect::<Result<Vec<_>, _>>()?;
                column.is_in(values)
            }
            FieldPredicate::IsNull { .. } => column.is_null(),
        };
        and_cond = and_cond.add(expr);
    }
    Ok(and_cond)
}

/// Apply filter, sort and pagination of `spec` to a select.
///
/// The include list is left to the caller.
///
/// # Errors
/// Same as [`build_condition`], plus [`DbError::UnknownProperty`] for an
/// unresolvable sort key.
pub fn apply_query<E>(select: Select<E>, spec: &QuerySpec) -> Result<Select<E>, DbError>
where
    E: ScopableEntity,
    E::Column: ColumnTrait + Copy,
{
    let cond = build_condition::<E>(spec)?;
    let mut select = if cond.is_empty() {
        select
    } else {
        select.filter(cond)
    };
    for key in spec.sort_keys() {
        let col = E::resolve_property(&key.field)
            .ok_or_else(|| DbError::UnknownProperty(key.field.clone()))?;
        let order = match key.direction {
            SortDirection::Asc => Order::Asc,
            SortDirection::Desc => Order::Desc,
        };
        select = select.order_by(col, order);
    }
    if let Some(limit) = spec.limit_value() {
        select = select.limit(limit);
    }
    if let Some(offset) = spec.offset_value() {
        select = select.offset(offset);
    }
    Ok(select)
}

fn to_value<C: ColumnTrait>(col: C, field: &str, value: &JsonValue) -> Result<Value, DbError> {
    let invalid = || DbError::InvalidValue {
        field: field.to_owned(),
    };
    match (col.def().get_column_type(), value) {
        (ColumnType::Uuid, JsonValue::String(s)) => {
            Uuid::parse_str(s).map(Value::from).map_err(|_| invalid())
        }
        (_, JsonValue::String(s)) => Ok(Value::from(s.clone())),
        (_, JsonValue::Bool(b)) => Ok(Value::from(*b)),
        (_, JsonValue::Number(n)) => n
            .as_i64()
            .map(Value::from)
            .or_else(|| n.as_f64().map(Value::from))
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}
