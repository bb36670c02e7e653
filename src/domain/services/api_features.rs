//! Turns the flat key/value pairs of a list request into a typed
//! [`ListQuery`]: filter predicates, sort order, projection and
//! pagination, applied in that order.
//!
//! Only fields declared by the resource can be filtered or sorted on, and
//! every value is parsed into its declared kind before it reaches SQL.

use crate::error::AppError;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];
pub const DEFAULT_LIMIT: i64 = 100;

pub type QueryParams = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Number,
    Boolean,
    Timestamp,
}

/// A field a resource exposes to filtering and sorting.
#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub column: &'static str,
    pub kind: FieldKind,
    /// Repeated `?field=a&field=b` becomes "any of" instead of last-wins.
    pub repeatable: bool,
}

impl FieldSpec {
    pub const fn new(name: &'static str, column: &'static str, kind: FieldKind) -> Self {
        Self { name, column, kind, repeatable: false }
    }

    pub const fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
    Timestamp(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn parse(op: &str) -> Option<Self> {
        match op {
            "gt" => Some(Comparison::Gt),
            "gte" => Some(Comparison::Gte),
            "lt" => Some(Comparison::Lt),
            "lte" => Some(Comparison::Lte),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Gt => ">",
            Comparison::Gte => ">=",
            Comparison::Lt => "<",
            Comparison::Lte => "<=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Compare(Comparison, FilterValue),
    AnyOf(Vec<FilterValue>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub column: &'static str,
    pub condition: Condition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub predicates: Vec<Predicate>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: i64,
    pub limit: i64,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            predicates: Vec::new(),
            sort: Vec::new(),
            projection: Projection::All,
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl ListQuery {
    /// Restricts the query to children of a parent document, e.g. the
    /// reviews of one tour.
    pub fn scoped_to(mut self, column: &'static str, id: &str) -> Self {
        self.predicates.push(Predicate {
            column,
            condition: Condition::Compare(Comparison::Eq, FilterValue::Text(id.to_string())),
        });
        self
    }
}

pub struct ApiFeatures<'a> {
    params: &'a [(String, String)],
    fields: &'static [FieldSpec],
    query: ListQuery,
}

impl<'a> ApiFeatures<'a> {
    pub fn new(params: &'a [(String, String)], fields: &'static [FieldSpec]) -> Self {
        Self { params, fields, query: ListQuery::default() }
    }

    pub fn filter(mut self) -> Result<Self, AppError> {
        // Keyed by the raw query key so `price[gte]` and `price[lte]` coexist.
        let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
        for (key, value) in self.params {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            match grouped.iter_mut().find(|(k, _)| *k == key.as_str()) {
                Some((_, values)) => values.push(value.as_str()),
                None => grouped.push((key.as_str(), vec![value.as_str()])),
            }
        }

        for (key, values) in grouped {
            let (name, comparison) = split_operator(key)?;
            let spec = self.field(name)?;

            let condition = if comparison == Comparison::Eq && spec.repeatable && values.len() > 1 {
                let parsed = values
                    .iter()
                    .map(|raw| parse_value(spec, raw))
                    .collect::<Result<Vec<_>, _>>()?;
                Condition::AnyOf(parsed)
            } else {
                let last = values.last().copied().unwrap_or_default();
                if spec.kind == FieldKind::Boolean && comparison != Comparison::Eq {
                    return Err(AppError::Validation(format!("Field '{}' only supports equality", spec.name)));
                }
                Condition::Compare(comparison, parse_value(spec, last)?)
            };

            self.query.predicates.push(Predicate { column: spec.column, condition });
        }

        Ok(self)
    }

    pub fn sort(mut self) -> Result<Self, AppError> {
        let raw = self.last_value("sort").unwrap_or("-created_at");

        let mut keys = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (name, descending) = match part.strip_prefix('-') {
                Some(rest) => (rest, true),
                None => (part, false),
            };
            let spec = self.field(name)?;
            keys.push(SortKey { column: spec.column, descending });
        }

        self.query.sort = keys;
        Ok(self)
    }

    pub fn limit_fields(mut self) -> Result<Self, AppError> {
        let Some(raw) = self.last_value("fields") else {
            return Ok(self);
        };

        let parts: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
        if parts.is_empty() {
            return Ok(self);
        }

        let excluded = parts.iter().filter(|p| p.starts_with('-')).count();
        self.query.projection = if excluded == parts.len() {
            Projection::Exclude(parts.iter().map(|p| p[1..].to_string()).collect())
        } else if excluded == 0 {
            Projection::Include(parts.iter().map(|p| p.to_string()).collect())
        } else {
            return Err(AppError::Validation(
                "Projection cannot mix included and excluded fields".to_string(),
            ));
        };

        Ok(self)
    }

    pub fn paginate(mut self) -> Result<Self, AppError> {
        let page = self.positive("page", 1)?;
        let limit = self.positive("limit", DEFAULT_LIMIT)?;

        self.query.skip = (page - 1).saturating_mul(limit);
        self.query.limit = limit;
        Ok(self)
    }

    pub fn into_query(self) -> ListQuery {
        self.query
    }

    fn field(&self, name: &str) -> Result<&'static FieldSpec, AppError> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| AppError::Validation(format!("Unknown field '{}'", name)))
    }

    fn last_value(&self, key: &str) -> Option<&'a str> {
        self.params.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    fn positive(&self, key: &str, default: i64) -> Result<i64, AppError> {
        match self.last_value(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(n) if n >= 1 => Ok(n),
                _ => Err(AppError::Validation(format!("'{}' must be a positive integer, got '{}'", key, raw))),
            },
        }
    }
}

/// Runs the four refinement steps in their fixed order.
pub fn build_list_query(params: &[(String, String)], fields: &'static [FieldSpec]) -> Result<ListQuery, AppError> {
    Ok(ApiFeatures::new(params, fields)
        .filter()?
        .sort()?
        .limit_fields()?
        .paginate()?
        .into_query())
}

fn split_operator(key: &str) -> Result<(&str, Comparison), AppError> {
    let Some(open) = key.find('[') else {
        return Ok((key, Comparison::Eq));
    };

    let op = key[open + 1..]
        .strip_suffix(']')
        .ok_or_else(|| AppError::Validation(format!("Malformed filter key '{}'", key)))?;
    let comparison = Comparison::parse(op)
        .ok_or_else(|| AppError::Validation(format!("Unsupported filter operator '{}'", op)))?;

    Ok((&key[..open], comparison))
}

fn parse_value(spec: &FieldSpec, raw: &str) -> Result<FilterValue, AppError> {
    let invalid = || AppError::Validation(format!("Invalid value for '{}': '{}'", spec.name, raw));
    let trimmed = raw.trim();

    match spec.kind {
        FieldKind::Text => Ok(FilterValue::Text(raw.to_string())),
        FieldKind::Integer => trimmed.parse().map(FilterValue::Integer).map_err(|_| invalid()),
        FieldKind::Number => match trimmed.parse::<f64>() {
            Ok(n) if n.is_finite() => Ok(FilterValue::Number(n)),
            _ => Err(invalid()),
        },
        FieldKind::Boolean => match trimmed {
            "true" => Ok(FilterValue::Boolean(true)),
            "false" => Ok(FilterValue::Boolean(false)),
            _ => Err(invalid()),
        },
        FieldKind::Timestamp => {
            if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
                return Ok(FilterValue::Timestamp(ts.with_timezone(&Utc)));
            }
            NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(|dt| FilterValue::Timestamp(dt.and_utc()))
                .ok_or_else(invalid)
        }
    }
}

/// Applies a projection to a serialized document. `id` always survives.
pub fn project(value: Value, projection: &Projection) -> Value {
    let Value::Object(map) = value else {
        return value;
    };

    let map = match projection {
        Projection::All => map,
        Projection::Include(fields) => map
            .into_iter()
            .filter(|(k, _)| k == "id" || fields.iter().any(|f| f == k))
            .collect(),
        Projection::Exclude(fields) => map
            .into_iter()
            .filter(|(k, _)| k == "id" || !fields.iter().any(|f| f == k))
            .collect(),
    };

    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const FIELDS: &[FieldSpec] = &[
        FieldSpec::new("name", "name", FieldKind::Text),
        FieldSpec::new("price", "price", FieldKind::Number).repeatable(),
        FieldSpec::new("duration", "duration", FieldKind::Integer).repeatable(),
        FieldSpec::new("secret", "secret", FieldKind::Boolean),
        FieldSpec::new("created_at", "created_at", FieldKind::Timestamp),
    ];

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn reserved_keys_never_become_predicates() {
        let q = build_list_query(&params(&[("page", "2"), ("sort", "price"), ("limit", "5"), ("fields", "name")]), FIELDS).unwrap();
        assert!(q.predicates.is_empty());
    }

    #[test]
    fn comparison_suffixes_become_typed_predicates() {
        let q = build_list_query(&params(&[("price[gte]", "100"), ("duration[lt]", "7"), ("name", "Forest")]), FIELDS).unwrap();

        assert_eq!(
            q.predicates,
            vec![
                Predicate { column: "price", condition: Condition::Compare(Comparison::Gte, FilterValue::Number(100.0)) },
                Predicate { column: "duration", condition: Condition::Compare(Comparison::Lt, FilterValue::Integer(7)) },
                Predicate { column: "name", condition: Condition::Compare(Comparison::Eq, FilterValue::Text("Forest".into())) },
            ]
        );
    }

    #[test]
    fn repeated_keys_on_repeatable_fields_become_any_of() {
        let q = build_list_query(&params(&[("duration", "5"), ("duration", "9")]), FIELDS).unwrap();
        assert_eq!(
            q.predicates[0].condition,
            Condition::AnyOf(vec![FilterValue::Integer(5), FilterValue::Integer(9)])
        );
    }

    #[test]
    fn repeated_keys_on_other_fields_keep_the_last_value() {
        let q = build_list_query(&params(&[("name", "a"), ("name", "b")]), FIELDS).unwrap();
        assert_eq!(
            q.predicates[0].condition,
            Condition::Compare(Comparison::Eq, FilterValue::Text("b".into()))
        );
    }

    #[test]
    fn malformed_numbers_and_unknown_fields_are_rejected() {
        assert!(build_list_query(&params(&[("price[gte]", "cheap")]), FIELDS).is_err());
        assert!(build_list_query(&params(&[("password", "x")]), FIELDS).is_err());
        assert!(build_list_query(&params(&[("price[ne]", "5")]), FIELDS).is_err());
        assert!(build_list_query(&params(&[("secret[gt]", "true")]), FIELDS).is_err());
    }

    #[test]
    fn sort_defaults_to_newest_first() {
        let q = build_list_query(&[], FIELDS).unwrap();
        assert_eq!(q.sort, vec![SortKey { column: "created_at", descending: true }]);

        let q = build_list_query(&params(&[("sort", "-price,name")]), FIELDS).unwrap();
        assert_eq!(
            q.sort,
            vec![SortKey { column: "price", descending: true }, SortKey { column: "name", descending: false }]
        );
    }

    #[test]
    fn skip_is_derived_from_page_and_limit() {
        for (page, limit) in [(1, 10), (3, 10), (7, 3)] {
            let q = build_list_query(&params(&[("page", &page.to_string()), ("limit", &limit.to_string())]), FIELDS).unwrap();
            assert_eq!(q.skip, (page - 1) * limit);
            assert_eq!(q.limit, limit);
        }

        let q = build_list_query(&[], FIELDS).unwrap();
        assert_eq!((q.skip, q.limit), (0, DEFAULT_LIMIT));
    }

    #[test]
    fn non_positive_pagination_is_rejected() {
        assert!(build_list_query(&params(&[("page", "0")]), FIELDS).is_err());
        assert!(build_list_query(&params(&[("limit", "abc")]), FIELDS).is_err());
    }

    #[test]
    fn timestamps_accept_dates_and_rfc3339() {
        let q = build_list_query(&params(&[("created_at[gte]", "2024-03-01")]), FIELDS).unwrap();
        let Condition::Compare(_, FilterValue::Timestamp(ts)) = &q.predicates[0].condition else {
            panic!("expected a timestamp predicate");
        };
        assert_eq!(ts.to_rfc3339(), "2024-03-01T00:00:00+00:00");
    }

    #[test]
    fn projection_keeps_id_and_selected_fields() {
        let doc = json!({ "id": "1", "name": "Forest", "price": 10, "summary": "x" });

        let included = project(doc.clone(), &Projection::Include(vec!["name".into()]));
        assert_eq!(included, json!({ "id": "1", "name": "Forest" }));

        let excluded = project(doc, &Projection::Exclude(vec!["summary".into(), "id".into()]));
        assert_eq!(excluded, json!({ "id": "1", "name": "Forest", "price": 10 }));
    }

    #[test]
    fn mixed_projection_is_rejected() {
        assert!(build_list_query(&params(&[("fields", "name,-price")]), FIELDS).is_err());
    }
}
