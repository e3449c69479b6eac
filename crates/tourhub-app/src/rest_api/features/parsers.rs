use serde_json::Value;
use tourhub_dal::{Comparison, Filter, FilterValue, Order};

use crate::error::{ApiError, ApiResult};

const MAX_NAME_LENGTH: usize = 100;

pub(super) fn parse_ordering(orderings: &str) -> ApiResult<Vec<Order>> {
    orderings
        .split(',')
        .map(|name| {
            let (field_name, descending) = match name.trim() {
                "" => return Err(ApiError::InvalidQuery("Empty ordering name".to_string())),
                name if name.len() > MAX_NAME_LENGTH => {
                    return Err(ApiError::InvalidQuery("Ordering name too long".to_string()))
                }
                name if name.starts_with('+') => (&name[1..], false),
                name if name.starts_with('-') => (&name[1..], true),
                name => (name, false),
            };

            let order = if descending {
                Order::Desc(field_name.to_string())
            } else {
                Order::Asc(field_name.to_string())
            };

            Ok(order)
        })
        .collect::<Result<Vec<_>, _>>()
}

/// `name,price` is include list, `-summary,-description` exclude list.
/// Returns `(include, names)`
pub(super) fn parse_fields(fields: &str) -> ApiResult<Option<(bool, Vec<String>)>> {
    let mut include = None;
    let mut names = Vec::new();
    for name in fields.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        if name.len() > MAX_NAME_LENGTH {
            return Err(ApiError::InvalidQuery("Field name too long".to_string()));
        }
        let (is_include, name) = match name.strip_prefix('-') {
            Some(rest) => (false, rest),
            None => (true, name),
        };
        match include {
            None => include = Some(is_include),
            Some(previous) if previous != is_include => {
                return Err(ApiError::InvalidQuery(
                    "Cannot mix included and excluded fields".to_string(),
                ))
            }
            _ => (),
        }
        names.push(name.to_string());
    }
    Ok(include.map(|include| (include, names)))
}

pub(super) fn parse_operator(op: &str) -> ApiResult<Comparison> {
    match op.strip_prefix('$').unwrap_or(op) {
        "gte" => Ok(Comparison::Gte),
        "gt" => Ok(Comparison::Gt),
        "lte" => Ok(Comparison::Lte),
        "lt" => Ok(Comparison::Lt),
        other => Err(ApiError::InvalidQuery(format!("Unknown operator {other}"))),
    }
}

/// Splits `price[gte]` into field and operator, plain key has no operator
pub(super) fn parse_key(key: &str) -> ApiResult<(&str, Option<Comparison>)> {
    let malformed = || ApiError::InvalidQuery(format!("Malformed filter key {key}"));
    match key.find('[') {
        None if key.contains(']') => Err(malformed()),
        None => Ok((key, None)),
        Some(start) => {
            let field = &key[..start];
            let op = key[start + 1..].strip_suffix(']').ok_or_else(malformed)?;
            if field.is_empty() || op.contains(['[', ']']) || field.contains(']') {
                return Err(malformed());
            }
            Ok((field, Some(parse_operator(op)?)))
        }
    }
}

fn json_value(field: &str, value: &Value) -> ApiResult<FilterValue> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .map(FilterValue::Integer)
            .or_else(|| n.as_f64().map(FilterValue::Float))
            .ok_or_else(|| ApiError::InvalidQuery(format!("Invalid number for {field}"))),
        Value::Bool(b) => Ok(FilterValue::Bool(*b)),
        Value::String(s) => Ok(FilterValue::parse(s)),
        _ => Err(ApiError::InvalidQuery(format!(
            "Invalid value for {field}, expected scalar"
        ))),
    }
}

/// Conditions from value written as JSON object, e.g. `{"gte": 100, "lt": 500}`
pub(super) fn parse_json_conditions(field: &str, raw: &str) -> ApiResult<Vec<Filter>> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| ApiError::InvalidQuery(format!("Invalid JSON value of {field}: {e}")))?;
    let Value::Object(conditions) = value else {
        return Err(ApiError::InvalidQuery(format!(
            "Invalid JSON value of {field}, expected object"
        )));
    };
    if conditions.is_empty() {
        return Err(ApiError::InvalidQuery(format!("No condition for {field}")));
    }
    conditions
        .iter()
        .map(|(op, value)| {
            Ok(Filter::new(
                field,
                parse_operator(op)?,
                json_value(field, value)?,
            ))
        })
        .collect()
}

/// Positive integer, anything else is `None`
pub(super) fn parse_positive(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok().filter(|n| *n > 0)
}
