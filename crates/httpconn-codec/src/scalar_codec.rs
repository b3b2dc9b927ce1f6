//! Scalar stringify/parse shared by the parameter encoder, the JSON
//! decoder, and the XML encoder/decoder (§4.1.1, §4.1.3, §4.1.4).

use httpconn_schema::{ScalarRepresentation, Value};

use crate::error::{CodecError, CodecResult, FieldPath};

/// Render a scalar `Value` as the wire string its representation demands.
/// This is the "stringify per representation" step used by the parameter
/// encoder and by text/XML output.
pub fn stringify_scalar(
    repr: &ScalarRepresentation,
    value: &Value,
    path: &FieldPath,
) -> CodecResult<String> {
    match repr {
        ScalarRepresentation::Boolean => match value {
            Value::Bool(b) => Ok(b.to_string()),
            other => Ok(other.stringify()),
        },
        ScalarRepresentation::Int8
        | ScalarRepresentation::Int16
        | ScalarRepresentation::Int32
        | ScalarRepresentation::Int64
        | ScalarRepresentation::BigInteger => match value {
            Value::Int(i) => Ok(i.to_string()),
            Value::String(s) => {
                s.parse::<i128>()
                    .map_err(|_| CodecError::invalid(path.clone(), format!("{s} is not a valid integer")))?;
                Ok(s.clone())
            }
            other => Ok(other.stringify()),
        },
        ScalarRepresentation::Float32 | ScalarRepresentation::Float64 | ScalarRepresentation::BigDecimal => {
            match value {
                Value::Float(f) => Ok(shortest_float(*f)),
                Value::Int(i) => Ok(i.to_string()),
                Value::String(s) => {
                    s.parse::<f64>()
                        .map_err(|_| CodecError::invalid(path.clone(), format!("{s} is not a valid number")))?;
                    Ok(s.clone())
                }
                other => Ok(other.stringify()),
            }
        }
        ScalarRepresentation::Date => match value {
            Value::String(s) => {
                validate_date(s).map_err(|e| CodecError::invalid(path.clone(), e))?;
                Ok(s.clone())
            }
            other => Ok(other.stringify()),
        },
        ScalarRepresentation::Timestamp | ScalarRepresentation::TimestampTz => match value {
            Value::String(s) => {
                validate_rfc3339(s).map_err(|e| CodecError::invalid(path.clone(), e))?;
                Ok(s.clone())
            }
            other => Ok(other.stringify()),
        },
        ScalarRepresentation::Uuid => match value {
            Value::String(s) => {
                uuid::Uuid::parse_str(s)
                    .map_err(|_| CodecError::invalid(path.clone(), format!("{s} is not a valid UUID")))?;
                Ok(s.clone())
            }
            other => Ok(other.stringify()),
        },
        ScalarRepresentation::Enum { one_of } => match value {
            Value::String(s) => {
                if one_of.iter().any(|allowed| allowed == s) {
                    Ok(s.clone())
                } else {
                    Err(CodecError::invalid(
                        path.clone(),
                        format!("{s} is not one of the declared enum values: {one_of:?}"),
                    ))
                }
            }
            other => Err(CodecError::invalid(
                path.clone(),
                format!("expected an enum string, got {other:?}"),
            )),
        },
        ScalarRepresentation::String | ScalarRepresentation::Json => Ok(value.stringify()),
        ScalarRepresentation::Bytes => match value {
            Value::Bytes(bytes) => Ok(base64_encode(bytes)),
            Value::String(s) => Ok(s.clone()),
            other => Ok(other.stringify()),
        },
        ScalarRepresentation::Geography | ScalarRepresentation::Geometry => Ok(value.stringify()),
    }
}

/// Coerce a raw decoded value (from JSON/XML) to the declared
/// representation's natural `Value` variant. Used by the schema-aware
/// decoders to turn "number or numeric string" into the right shape.
pub fn coerce_scalar(repr: &ScalarRepresentation, value: Value, path: &FieldPath) -> CodecResult<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }
    match repr {
        ScalarRepresentation::Boolean => match value {
            Value::Bool(_) => Ok(value),
            Value::String(s) => match s.as_str() {
                "true" => Ok(Value::Bool(true)),
                "false" => Ok(Value::Bool(false)),
                _ => Err(CodecError::invalid(path.clone(), format!("{s} is not a boolean"))),
            },
            other => Ok(other),
        },
        ScalarRepresentation::Int8
        | ScalarRepresentation::Int16
        | ScalarRepresentation::Int32
        | ScalarRepresentation::Int64
        | ScalarRepresentation::BigInteger => match value {
            Value::Int(_) => Ok(value),
            Value::Float(f) if f.fract() == 0.0 => Ok(Value::Int(f as i64)),
            Value::String(s) => s
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| CodecError::invalid(path.clone(), format!("{s} is not a valid integer"))),
            other => Ok(other),
        },
        ScalarRepresentation::Float32 | ScalarRepresentation::Float64 | ScalarRepresentation::BigDecimal => {
            match value {
                Value::Float(_) => Ok(value),
                Value::Int(i) => Ok(Value::Float(i as f64)),
                Value::String(s) => s
                    .parse::<f64>()
                    .map(Value::Float)
                    .map_err(|_| CodecError::invalid(path.clone(), format!("{s} is not a valid number"))),
                other => Ok(other),
            }
        }
        ScalarRepresentation::Enum { one_of } => match &value {
            Value::String(s) if one_of.iter().any(|allowed| allowed == s) => Ok(value),
            other => Err(CodecError::invalid(
                path.clone(),
                format!("{other:?} is not one of the declared enum values: {one_of:?}"),
            )),
        },
        ScalarRepresentation::Uuid => match &value {
            Value::String(s) => {
                uuid::Uuid::parse_str(s)
                    .map_err(|_| CodecError::invalid(path.clone(), format!("{s} is not a valid UUID")))?;
                Ok(value)
            }
            other => Err(CodecError::invalid(path.clone(), format!("expected a UUID string, got {other:?}"))),
        },
        _ => Ok(value),
    }
}

fn shortest_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{f:.0}")
    } else {
        format!("{f}")
    }
}

fn validate_date(s: &str) -> Result<(), String> {
    let parts: Vec<&str> = s.split('-').collect();
    if parts.len() != 3 || parts[0].len() != 4 || parts[1].len() != 2 || parts[2].len() != 2 {
        return Err(format!("{s} is not a YYYY-MM-DD date"));
    }
    if parts.iter().any(|p| p.parse::<u32>().is_err()) {
        return Err(format!("{s} is not a YYYY-MM-DD date"));
    }
    Ok(())
}

fn validate_rfc3339(s: &str) -> Result<(), String> {
    time::OffsetDateTime::parse(s, &time::format_description::well_known::Rfc3339)
        .map(|_| ())
        .map_err(|_| format!("{s} is not an RFC3339 timestamp"))
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
