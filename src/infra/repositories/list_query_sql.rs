use crate::domain::services::api_features::{Condition, FilterValue, ListQuery, Predicate};
use chrono::{DateTime, Utc};
use sqlx::{Database, Encode, QueryBuilder, Type};

/// Appends the predicates, ordering and page window of a [`ListQuery`] to
/// a statement that already ends in a `WHERE` clause. Column names come
/// from the resources' field allow-lists; every value is a bind parameter.
pub fn push_list_query<'a, DB>(builder: &mut QueryBuilder<'a, DB>, query: &ListQuery)
where
    DB: Database,
    String: Encode<'a, DB> + Type<DB>,
    i64: Encode<'a, DB> + Type<DB>,
    f64: Encode<'a, DB> + Type<DB>,
    bool: Encode<'a, DB> + Type<DB>,
    DateTime<Utc>: Encode<'a, DB> + Type<DB>,
{
    for Predicate { column, condition } in &query.predicates {
        builder.push(" AND ").push(*column);
        match condition {
            Condition::Compare(comparison, value) => {
                builder.push(" ").push(comparison.as_sql()).push(" ");
                push_value(builder, value);
            }
            Condition::AnyOf(values) => {
                builder.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        builder.push(", ");
                    }
                    push_value(builder, value);
                }
                builder.push(")");
            }
        }
    }

    if !query.sort.is_empty() {
        let order = query
            .sort
            .iter()
            .map(|key| format!("{} {}", key.column, if key.descending { "DESC" } else { "ASC" }))
            .collect::<Vec<_>>()
            .join(", ");
        builder.push(" ORDER BY ").push(order);
    }

    builder.push(" LIMIT ").push_bind(query.limit);
    builder.push(" OFFSET ").push_bind(query.skip);
}

fn push_value<'a, DB>(builder: &mut QueryBuilder<'a, DB>, value: &FilterValue)
where
    DB: Database,
    String: Encode<'a, DB> + Type<DB>,
    i64: Encode<'a, DB> + Type<DB>,
    f64: Encode<'a, DB> + Type<DB>,
    bool: Encode<'a, DB> + Type<DB>,
    DateTime<Utc>: Encode<'a, DB> + Type<DB>,
{
    match value {
        FilterValue::Text(v) => builder.push_bind(v.clone()),
        FilterValue::Integer(v) => builder.push_bind(*v),
        FilterValue::Number(v) => builder.push_bind(*v),
        FilterValue::Boolean(v) => builder.push_bind(*v),
        FilterValue::Timestamp(v) => builder.push_bind(*v),
    };
}
