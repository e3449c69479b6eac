//! Execution of [`ListingParams`] against an entity table.
//!
//! Listing is schema driven: every entity describes its listable columns in an
//! [`EntitySchema`], and all field names coming from a request are checked
//! against it before they get anywhere near SQL. Values are always bound.

use std::fmt::Display;

use serde_json::{Map, Value};
use sqlx::{QueryBuilder, Row as _};
use tracing::debug;

use crate::{
    error::{Error, Result},
    Batch, ChosenDB, ChosenRow, ListingParams,
};

/// One listed record - projected fields only
pub type Record = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
}

impl Comparison {
    fn sql(&self) -> &'static str {
        match self {
            Comparison::Eq => " = ",
            Comparison::Gt => " > ",
            Comparison::Gte => " >= ",
            Comparison::Lt => " < ",
            Comparison::Lte => " <= ",
            Comparison::In => " IN ",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Types raw query value. Numbers and booleans are recognized only when
    /// they print back exactly as given, anything else stays text verbatim.
    pub fn parse(raw: &str) -> Self {
        if let Ok(i) = raw.parse::<i64>() {
            if i.to_string() == raw {
                return FilterValue::Integer(i);
            }
        }
        if let Ok(f) = raw.parse::<f64>() {
            if f.is_finite() && f.to_string() == raw {
                return FilterValue::Float(f);
            }
        }
        match raw {
            "true" => FilterValue::Bool(true),
            "false" => FilterValue::Bool(false),
            _ => FilterValue::Text(raw.to_string()),
        }
    }

    /// Value as compared with a column of given kind, text columns take it as printed
    fn coerced(&self, kind: FieldKind) -> FilterValue {
        match (kind, self) {
            (_, FilterValue::List(values)) => {
                FilterValue::List(values.iter().map(|v| v.coerced(kind)).collect())
            }
            (FieldKind::Text, FilterValue::Text(_)) => self.clone(),
            (FieldKind::Text, v) => FilterValue::Text(v.to_string()),
            _ => self.clone(),
        }
    }

    fn push_bind(&self, qb: &mut QueryBuilder<'_, ChosenDB>) {
        match self {
            FilterValue::Integer(i) => {
                qb.push_bind(*i);
            }
            FilterValue::Float(f) => {
                qb.push_bind(*f);
            }
            FilterValue::Bool(b) => {
                qb.push_bind(*b);
            }
            FilterValue::Text(s) => {
                qb.push_bind(s.clone());
            }
            FilterValue::List(values) => {
                qb.push("(");
                for (idx, v) in values.iter().enumerate() {
                    if idx > 0 {
                        qb.push(", ");
                    }
                    v.push_bind(qb);
                }
                qb.push(")");
            }
        }
    }
}

impl Display for FilterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FilterValue::Integer(i) => write!(f, "{i}"),
            FilterValue::Float(v) => write!(f, "{v}"),
            FilterValue::Bool(b) => write!(f, "{b}"),
            FilterValue::Text(s) => f.write_str(s),
            FilterValue::List(values) => {
                let items = values.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                f.write_str(&items.join(","))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub op: Comparison,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(field: impl Into<String>, op: Comparison, value: FilterValue) -> Self {
        Filter {
            field: field.into(),
            op,
            value,
        }
    }

    pub fn eq(field: impl Into<String>, value: FilterValue) -> Self {
        Self::new(field, Comparison::Eq, value)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Projection {
    /// All fields except hidden ones
    #[default]
    Default,
    /// Only these fields plus `id`
    Include(Vec<String>),
    /// All fields except these and hidden ones
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Integer,
    Float,
    Text,
    Bool,
    DateTime,
    /// JSON document stored as text, can be projected, but not filtered or sorted
    Json,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

pub const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

#[derive(Debug)]
pub struct EntitySchema {
    pub table: &'static str,
    pub fields: &'static [FieldSpec],
    pub hidden: &'static [&'static str],
}

impl EntitySchema {
    fn field(&self, name: &str) -> Result<&FieldSpec> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| Error::InvalidQuery(format!("Unknown field {name}")))
    }

    fn comparable_field(&self, name: &str) -> Result<&FieldSpec> {
        let field = self.field(name)?;
        if field.kind == FieldKind::Json {
            Err(Error::InvalidQuery(format!(
                "Field {name} cannot be used for filtering or sorting"
            )))
        } else {
            Ok(field)
        }
    }

    fn sortable_fields(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .filter(|f| f.kind != FieldKind::Json)
            .map(|f| f.name)
            .collect()
    }

    fn projected_fields(&self, projection: &Projection) -> Result<Vec<&FieldSpec>> {
        match projection {
            Projection::Default => Ok(self
                .fields
                .iter()
                .filter(|f| !self.hidden.contains(&f.name))
                .collect()),
            Projection::Include(names) => {
                let mut fields = vec![self.field("id")?];
                for name in names {
                    let field = self.field(name)?;
                    if !fields.iter().any(|f| f.name == field.name) {
                        fields.push(field);
                    }
                }
                Ok(fields)
            }
            Projection::Exclude(names) => {
                for name in names {
                    self.field(name)?;
                }
                Ok(self
                    .fields
                    .iter()
                    .filter(|f| !self.hidden.contains(&f.name))
                    .filter(|f| !names.iter().any(|n| n == f.name))
                    .collect())
            }
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, ChosenDB>, filters: &[Filter]) -> Result<()> {
        for (idx, filter) in filters.iter().enumerate() {
            let field = self.comparable_field(&filter.field)?;
            let list_value = matches!(filter.value, FilterValue::List(_));
            if list_value != (filter.op == Comparison::In) {
                return Err(Error::InvalidQuery(format!(
                    "Invalid value for field {}",
                    filter.field
                )));
            }
            qb.push(if idx == 0 { " WHERE " } else { " AND " });
            qb.push(field.name);
            qb.push(filter.op.sql());
            filter.value.coerced(field.kind).push_bind(qb);
        }
        Ok(())
    }
}

fn column_value(row: &ChosenRow, field: &FieldSpec) -> Result<Value> {
    let name = field.name;
    let value = match field.kind {
        FieldKind::Integer => row
            .try_get::<Option<i64>, _>(name)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        FieldKind::Float => row
            .try_get::<Option<f64>, _>(name)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        FieldKind::Text => row
            .try_get::<Option<String>, _>(name)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        FieldKind::Bool => row
            .try_get::<Option<bool>, _>(name)?
            .map(Value::from)
            .unwrap_or(Value::Null),
        FieldKind::DateTime => row
            .try_get::<Option<time::PrimitiveDateTime>, _>(name)?
            .map(serde_json::to_value)
            .transpose()
            .map_err(|e| Error::InvalidValue(format!("{name}: {e}")))?
            .unwrap_or(Value::Null),
        FieldKind::Json => row
            .try_get::<Option<String>, _>(name)?
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| Error::InvalidValue(format!("{name}: {e}")))?
            .unwrap_or(Value::Null),
    };
    Ok(value)
}

/// Counts records matching the filter and fetches the requested window of them.
///
/// Fails with [`Error::PageNotFound`] when a requested window, or any window
/// past the first one, starts at or beyond the number of matching records.
pub async fn list_records<'c, E>(
    executor: E,
    schema: &EntitySchema,
    params: &ListingParams,
) -> Result<Batch<Record>>
where
    E: sqlx::Executor<'c, Database = ChosenDB> + Copy,
{
    let fields = schema.projected_fields(&params.projection)?;
    let ordering = params.ordering(&schema.sortable_fields())?;
    let limit = params.limit.clamp(0, crate::MAX_LIMIT as i64);
    let offset = params.offset.max(0);

    let mut count_query = QueryBuilder::<ChosenDB>::new("SELECT count(*) FROM ");
    count_query.push(schema.table);
    schema.push_where(&mut count_query, &params.filter)?;
    let total: i64 = count_query
        .build_query_scalar()
        .fetch_one(executor)
        .await?;
    let total = total as u64;

    if (params.page_requested || offset > 0) && offset as u64 >= total {
        debug!("Requested offset {offset} is behind {total} records");
        return Err(Error::PageNotFound {
            page: params.page(),
        });
    }

    let columns = fields.iter().map(|f| f.name).collect::<Vec<_>>().join(", ");
    let mut query = QueryBuilder::<ChosenDB>::new("SELECT ");
    query.push(columns);
    query.push(" FROM ");
    query.push(schema.table);
    schema.push_where(&mut query, &params.filter)?;
    query.push(" ORDER BY ");
    query.push(ordering);
    query.push(" LIMIT ");
    query.push_bind(limit);
    query.push(" OFFSET ");
    query.push_bind(offset);
    debug!("Listing query: {}", query.sql());

    let rows = query.build().fetch_all(executor).await?;
    let rows = rows
        .iter()
        .map(|row| {
            fields
                .iter()
                .map(|f| Ok((f.name.to_string(), column_value(row, f)?)))
                .collect::<Result<Record>>()
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Batch {
        offset,
        limit,
        total,
        rows,
    })
}
