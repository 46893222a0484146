// ABOUTME: Tagged row-value representation and the type-aware Value Comparator (C1)
// ABOUTME: Dispatches on tag for ordering/equality instead of relying on driver type erasure

use std::cmp::Ordering;

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use tokio_postgres::types::{FromSql, IsNull, ToSql, Type};
use tokio_postgres::Row;
use uuid::Uuid;

use crate::error::SyncError;

/// A single column value read from a cursor, tagged with the SQL type it came
/// from. `Null` carries the column's type so a later INSERT/UPDATE can still
/// bind a correctly-typed NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null(Type),
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
    Numeric(Decimal),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Uuid(Uuid),
    Json(serde_json::Value),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null(_))
    }

    /// The SQL type this value was read as, used to bind a typed NULL on the
    /// write-back side even when the value itself is absent.
    pub fn sql_type(&self) -> Type {
        match self {
            Value::Null(t) => t.clone(),
            Value::Bool(_) => Type::BOOL,
            Value::Int16(_) => Type::INT2,
            Value::Int32(_) => Type::INT4,
            Value::Int64(_) => Type::INT8,
            Value::Float32(_) => Type::FLOAT4,
            Value::Float64(_) => Type::FLOAT8,
            Value::Text(_) => Type::TEXT,
            Value::Bytes(_) => Type::BYTEA,
            Value::Numeric(_) => Type::NUMERIC,
            Value::Date(_) => Type::DATE,
            Value::Timestamp(_) => Type::TIMESTAMP,
            Value::TimestampTz(_) => Type::TIMESTAMPTZ,
            Value::Uuid(_) => Type::UUID,
            Value::Json(_) => Type::JSONB,
        }
    }
}

/// Reads the value at `idx` out of `row` using the dialect-resolved SQL type
/// code `ty`, producing a tagged [`Value`]. Mirrors the narrow set of types
/// the catalog can describe; an unrecognized type is a configuration error
/// surfaced by the `Dialect`/`Catalog` collaborators, not by this function.
pub fn read_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, SyncError> {
    fn get<'a, T: FromSql<'a>>(row: &'a Row, idx: usize) -> Option<T> {
        row.get::<_, Option<T>>(idx)
    }

    let value = match *ty {
        Type::BOOL => get::<bool>(row, idx).map(Value::Bool),
        Type::INT2 => get::<i16>(row, idx).map(Value::Int16),
        Type::INT4 => get::<i32>(row, idx).map(Value::Int32),
        Type::INT8 => get::<i64>(row, idx).map(Value::Int64),
        Type::FLOAT4 => get::<f32>(row, idx).map(Value::Float32),
        Type::FLOAT8 => get::<f64>(row, idx).map(Value::Float64),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            get::<String>(row, idx).map(Value::Text)
        }
        Type::BYTEA => get::<Vec<u8>>(row, idx).map(Value::Bytes),
        Type::NUMERIC => get::<Decimal>(row, idx).map(Value::Numeric),
        Type::DATE => get::<NaiveDate>(row, idx).map(Value::Date),
        Type::TIMESTAMP => get::<NaiveDateTime>(row, idx).map(Value::Timestamp),
        Type::TIMESTAMPTZ => get::<DateTime<Utc>>(row, idx).map(Value::TimestampTz),
        Type::UUID => get::<Uuid>(row, idx).map(Value::Uuid),
        Type::JSON | Type::JSONB => get::<serde_json::Value>(row, idx).map(Value::Json),
        ref other => {
            return Err(SyncError::IncomparableValues {
                table: String::new(),
                column: String::new(),
                detail: format!("unsupported SQL type {other}"),
            })
        }
    };

    Ok(value.unwrap_or_else(|| Value::Null(ty.clone())))
}

/// Normalizes a pair of integral values (any mix of `Int16`/`Int32`/`Int64`)
/// to `i64` without going through a lossy floating-point conversion. This is
/// the exact path for same-width or mixed-width integer comparisons; `BIGINT`
/// values beyond 2^53 must never be routed through `as_f64_pair`, which loses
/// precision there.
fn as_i64_pair(a: &Value, b: &Value) -> Option<(i64, i64)> {
    fn to_i64(v: &Value) -> Option<i64> {
        match v {
            Value::Int16(n) => Some(*n as i64),
            Value::Int32(n) => Some(*n as i64),
            Value::Int64(n) => Some(*n),
            _ => None,
        }
    }
    match (to_i64(a), to_i64(b)) {
        (Some(x), Some(y)) => Some((x, y)),
        _ => None,
    }
}

/// Normalizes a pair of values to a common numeric representation when their
/// tags differ but both are numeric, per the "implementation MUST normalize
/// before comparing" rule. Returns `None` when the pair can't be normalized.
/// Only reached once the exact-integer path (`as_i64_pair`) doesn't apply, so
/// this is for genuinely mixed int/float/numeric pairs.
fn as_f64_pair(a: &Value, b: &Value) -> Option<(f64, f64)> {
    fn to_f64(v: &Value) -> Option<f64> {
        match v {
            Value::Int16(n) => Some(*n as f64),
            Value::Int32(n) => Some(*n as f64),
            Value::Int64(n) => Some(*n as f64),
            Value::Float32(n) => Some(*n as f64),
            Value::Float64(n) => Some(*n),
            Value::Numeric(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }
    match (to_f64(a), to_f64(b)) {
        (Some(x), Some(y)) => Some((x, y)),
        _ => None,
    }
}

/// `order(a, b)` on primary-key values. Both values MUST be non-null — a NULL
/// primary key is rejected earlier, by the merge driver, as
/// [`SyncError::NullPrimaryKey`] rather than being given an arbitrary order here.
pub fn order(a: &Value, b: &Value) -> Result<Ordering, SyncError> {
    use Value::*;
    let ord = match (a, b) {
        (Bool(x), Bool(y)) => x.cmp(y),
        (Text(x), Text(y)) => x.cmp(y),
        (Bytes(x), Bytes(y)) => x.cmp(y),
        (Date(x), Date(y)) => x.cmp(y),
        (Timestamp(x), Timestamp(y)) => x.cmp(y),
        (TimestampTz(x), TimestampTz(y)) => x.cmp(y),
        (Uuid(x), Uuid(y)) => x.cmp(y),
        (Numeric(x), Numeric(y)) => x.cmp(y),
        _ if as_i64_pair(a, b).is_some() => {
            let (x, y) = as_i64_pair(a, b).unwrap();
            x.cmp(&y)
        }
        (Int16(_) | Int32(_) | Int64(_) | Float32(_) | Float64(_) | Numeric(_), _)
        | (_, Int16(_) | Int32(_) | Int64(_) | Float32(_) | Float64(_) | Numeric(_))
            if as_f64_pair(a, b).is_some() =>
        {
            let (x, y) = as_f64_pair(a, b).unwrap();
            x.partial_cmp(&y).ok_or_else(|| SyncError::IncomparableValues {
                table: String::new(),
                column: String::new(),
                detail: "NaN in primary-key comparison".to_string(),
            })?
        }
        _ => {
            return Err(SyncError::IncomparableValues {
                table: String::new(),
                column: String::new(),
                detail: format!("cannot order {a:?} against {b:?}"),
            })
        }
    };
    Ok(ord)
}

/// `equal(a, b)` on value columns. Byte arrays compare length-then-contents;
/// everything else delegates to the normalized/deserialized type's equality.
/// The caller (the merge's UPDATE branch) only ever invokes this on non-null
/// pairs; null handling lives in the merge, not here.
pub fn equal(a: &Value, b: &Value) -> Result<bool, SyncError> {
    use Value::*;
    match (a, b) {
        (Bytes(x), Bytes(y)) => Ok(x.len() == y.len() && x == y),
        (Bool(x), Bool(y)) => Ok(x == y),
        (Text(x), Text(y)) => Ok(x == y),
        (Date(x), Date(y)) => Ok(x == y),
        (Timestamp(x), Timestamp(y)) => Ok(x == y),
        (TimestampTz(x), TimestampTz(y)) => Ok(x == y),
        (Uuid(x), Uuid(y)) => Ok(x == y),
        (Json(x), Json(y)) => Ok(x == y),
        (Numeric(x), Numeric(y)) => Ok(x == y),
        _ => match as_i64_pair(a, b) {
            Some((x, y)) => Ok(x == y),
            None => match as_f64_pair(a, b) {
                Some((x, y)) => Ok(x == y),
                None => Err(SyncError::IncomparableValues {
                    table: String::new(),
                    column: String::new(),
                    detail: format!("cannot compare {a:?} with {b:?}"),
                }),
            },
        },
    }
}

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null(_) => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql(ty, out),
            Value::Int16(v) => v.to_sql(ty, out),
            Value::Int32(v) => v.to_sql(ty, out),
            Value::Int64(v) => v.to_sql(ty, out),
            Value::Float32(v) => v.to_sql(ty, out),
            Value::Float64(v) => v.to_sql(ty, out),
            Value::Text(v) => v.to_sql(ty, out),
            Value::Bytes(v) => v.to_sql(ty, out),
            Value::Numeric(v) => v.to_sql(ty, out),
            Value::Date(v) => v.to_sql(ty, out),
            Value::Timestamp(v) => v.to_sql(ty, out),
            Value::TimestampTz(v) => v.to_sql(ty, out),
            Value::Uuid(v) => v.to_sql(ty, out),
            Value::Json(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_same_tag() {
        assert_eq!(order(&Value::Int32(1), &Value::Int32(2)).unwrap(), Ordering::Less);
        assert_eq!(order(&Value::Text("a".into()), &Value::Text("b".into())).unwrap(), Ordering::Less);
    }

    #[test]
    fn order_normalizes_mixed_integral_widths() {
        assert_eq!(order(&Value::Int16(5), &Value::Int64(5)).unwrap(), Ordering::Equal);
        assert_eq!(order(&Value::Int32(1), &Value::Int64(2)).unwrap(), Ordering::Less);
    }

    #[test]
    fn order_rejects_incomparable_tags() {
        assert!(order(&Value::Text("a".into()), &Value::Bytes(vec![1])).is_err());
    }

    #[test]
    fn order_distinguishes_bigints_beyond_f64_precision() {
        let x = 1i64 << 60;
        let y = x + 1;
        assert_eq!(order(&Value::Int64(x), &Value::Int64(y)).unwrap(), Ordering::Less);
        assert_ne!(order(&Value::Int64(x), &Value::Int64(y)).unwrap(), Ordering::Equal);
        assert!(!equal(&Value::Int64(x), &Value::Int64(y)).unwrap());
    }

    #[test]
    fn equal_bytes_by_length_and_content() {
        assert!(equal(&Value::Bytes(vec![0, 1]), &Value::Bytes(vec![0, 1])).unwrap());
        assert!(!equal(&Value::Bytes(vec![0, 1]), &Value::Bytes(vec![0, 2])).unwrap());
        assert!(!equal(&Value::Bytes(vec![0, 1]), &Value::Bytes(vec![0, 1, 2])).unwrap());
    }

    #[test]
    fn equal_numeric_normalization() {
        assert!(equal(&Value::Int32(5), &Value::Float64(5.0)).unwrap());
        assert!(!equal(&Value::Int32(5), &Value::Float64(5.5)).unwrap());
    }
}
