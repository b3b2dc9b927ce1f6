use serde::{Deserialize, Serialize};

/// The 18 primitive representations a scalar type can declare.
///
/// This is a closed tagged union, not an open string: codecs match on it
/// exhaustively so a newly added representation fails to compile every
/// encoder/decoder that needs updating, rather than silently falling back
/// to string handling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScalarRepresentation {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    BigInteger,
    BigDecimal,
    String,
    Bytes,
    Date,
    Timestamp,
    TimestampTz,
    Uuid,
    Enum { one_of: Vec<String> },
    Json,
    Geography,
    Geometry,
}

impl ScalarRepresentation {
    pub fn name(&self) -> &'static str {
        match self {
            ScalarRepresentation::Boolean => "Boolean",
            ScalarRepresentation::Int8 => "Int8",
            ScalarRepresentation::Int16 => "Int16",
            ScalarRepresentation::Int32 => "Int32",
            ScalarRepresentation::Int64 => "Int64",
            ScalarRepresentation::Float32 => "Float32",
            ScalarRepresentation::Float64 => "Float64",
            ScalarRepresentation::BigInteger => "BigInteger",
            ScalarRepresentation::BigDecimal => "BigDecimal",
            ScalarRepresentation::String => "String",
            ScalarRepresentation::Bytes => "Bytes",
            ScalarRepresentation::Date => "Date",
            ScalarRepresentation::Timestamp => "Timestamp",
            ScalarRepresentation::TimestampTz => "TimestampTZ",
            ScalarRepresentation::Uuid => "UUID",
            ScalarRepresentation::Enum { .. } => "Enum",
            ScalarRepresentation::Json => "JSON",
            ScalarRepresentation::Geography => "Geography",
            ScalarRepresentation::Geometry => "Geometry",
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            ScalarRepresentation::Int8
                | ScalarRepresentation::Int16
                | ScalarRepresentation::Int32
                | ScalarRepresentation::Int64
                | ScalarRepresentation::BigInteger
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(
            self,
            ScalarRepresentation::Float32 | ScalarRepresentation::Float64 | ScalarRepresentation::BigDecimal
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarType {
    pub representation: ScalarRepresentation,
}
