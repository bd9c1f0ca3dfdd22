// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Translation between structured ("connect-style") schemas and SQL types.
//!
//! Inbound translation is lenient below the root: a struct field whose
//! schema cannot be represented is logged and dropped, so that one exotic
//! column does not make an entire topic unusable. Failures at the root are
//! fatal.

use rill_repr::adt::decimal::{self, DecimalError, DEFAULT_CONNECT_PRECISION, SCALE_FIELD};
use rill_repr::{Field, PrimitiveType, Schema, SchemaKind, StructType, Type};
use tracing::error;

/// A schema, or part of one, that has no SQL representation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct UnsupportedType(String);

impl UnsupportedType {
    fn new(msg: impl Into<String>) -> UnsupportedType {
        UnsupportedType(msg.into())
    }
}

/// An error that prevents a schema from being used as a row schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TranslateError {
    #[error("stream/table schema must be structured, but found {0}")]
    NotStructured(SchemaKind),
    #[error("Unsupported type at root of schema: {0}")]
    UnsupportedRoot(UnsupportedType),
}

/// Translates the schema of a record into a SQL row schema.
///
/// Field names are upper cased. Fields that cannot be translated are
/// omitted, preserving the relative order of the rest.
pub fn to_sql_schema(schema: &Schema) -> Result<StructType, TranslateError> {
    match to_sql_type(schema) {
        Ok(Type::Struct(desc)) => Ok(desc),
        Ok(_) => Err(TranslateError::NotStructured(schema.kind())),
        Err(e) => Err(TranslateError::UnsupportedRoot(e)),
    }
}

/// Translates a single schema into a SQL type.
pub fn to_sql_type(schema: &Schema) -> Result<Type, UnsupportedType> {
    match schema.kind() {
        SchemaKind::Array => {
            let element = sub_schema(schema, schema.value_schema())?;
            Ok(Type::array(to_sql_type(element)?))
        }
        SchemaKind::Map => to_sql_map(schema),
        SchemaKind::Struct => Ok(Type::Struct(to_sql_struct(schema))),
        _ => Ok(Type::Primitive(to_sql_primitive(schema)?)),
    }
}

fn sub_schema<'a>(
    schema: &Schema,
    sub_schema: Option<&'a Schema>,
) -> Result<&'a Schema, UnsupportedType> {
    sub_schema.ok_or_else(|| UnsupportedType::new(format!("Incomplete {} schema", schema.kind())))
}

fn to_sql_primitive(schema: &Schema) -> Result<PrimitiveType, UnsupportedType> {
    match schema.kind() {
        SchemaKind::Int8 | SchemaKind::Int16 | SchemaKind::Int32 => Ok(PrimitiveType::INTEGER),
        SchemaKind::Int64 => Ok(PrimitiveType::BIGINT),
        SchemaKind::Float32 | SchemaKind::Float64 => Ok(PrimitiveType::DOUBLE),
        SchemaKind::Boolean => Ok(PrimitiveType::BOOLEAN),
        SchemaKind::String => Ok(PrimitiveType::STRING),
        SchemaKind::Bytes if decimal::is_decimal(schema) => to_sql_decimal(schema),
        kind => Err(UnsupportedType::new(format!("Unsupported type: {}", kind))),
    }
}

fn to_sql_decimal(schema: &Schema) -> Result<PrimitiveType, UnsupportedType> {
    let name = schema.name().unwrap_or_default();
    if schema.parameters().is_none() {
        return Err(UnsupportedType::new(format!(
            "Unknown decimal parameters: {}",
            name
        )));
    }
    let scale = schema
        .parameter(SCALE_FIELD)
        .ok_or_else(|| UnsupportedType::new(format!("Unknown decimal scale: {}", name)))?;
    let invalid = |detail: String| {
        UnsupportedType::new(format!("Invalid decimal parameters: {}: {}", name, detail))
    };
    let scale: i32 = scale
        .parse()
        .map_err(|_| invalid(format!("scale '{}' is not an integer", scale)))?;
    let precision: i32 = match decimal::precision_parameter(schema) {
        None => DEFAULT_CONNECT_PRECISION,
        Some(p) => p
            .parse()
            .map_err(|_| invalid(format!("precision '{}' is not an integer", p)))?,
    };
    PrimitiveType::decimal(precision, scale).map_err(|e| invalid(e.to_string()))
}

fn to_sql_map(schema: &Schema) -> Result<Type, UnsupportedType> {
    let key_schema = sub_schema(schema, schema.key_schema())?;
    let value_schema = sub_schema(schema, schema.value_schema())?;
    let key_allowed = match key_schema.kind() {
        SchemaKind::Int8
        | SchemaKind::Int16
        | SchemaKind::Int32
        | SchemaKind::Int64
        | SchemaKind::Boolean
        | SchemaKind::String => true,
        SchemaKind::Bytes => decimal::is_decimal(key_schema),
        _ => false,
    };
    if !key_allowed {
        return Err(UnsupportedType::new(format!(
            "Unsupported type for map key: {}",
            key_schema.kind()
        )));
    }
    let key = to_sql_primitive(key_schema)?;
    let value = to_sql_type(value_schema)?;
    Ok(Type::map(key, value))
}

fn to_sql_struct(schema: &Schema) -> StructType {
    let mut fields = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        match to_sql_type(&field.schema) {
            Ok(typ) => fields.push(Field::new(field.name.to_uppercase(), typ)),
            Err(e) => error!("Error inferring schema at field {}: {}", field.name, e),
        }
    }
    StructType::new(fields)
}

/// Translates a SQL row schema into a structured schema.
///
/// The root is required. Every nested schema is optional, as SQL values are
/// always nullable.
pub fn from_sql_schema(desc: &StructType) -> Result<Schema, DecimalError> {
    Ok(Schema::structure(
        desc.iter()
            .map(|f| Ok((f.name.clone(), from_sql_type(&f.typ)?)))
            .collect::<Result<Vec<_>, DecimalError>>()?,
    ))
}

/// Translates a SQL type into an optional structured schema.
pub fn from_sql_type(typ: &Type) -> Result<Schema, DecimalError> {
    let schema = match typ {
        Type::Primitive(p) => return from_sql_primitive(p),
        Type::Array { element } => Schema::array(from_sql_type(element)?),
        Type::Map { key, value } => Schema::map(from_sql_primitive(key)?, from_sql_type(value)?),
        Type::Struct(desc) => from_sql_schema(desc)?,
    };
    Ok(schema.optional())
}

fn from_sql_primitive(p: &PrimitiveType) -> Result<Schema, DecimalError> {
    use rill_repr::SqlType;

    let schema = match p.sql_type() {
        SqlType::Boolean => Schema::boolean(),
        SqlType::Integer => Schema::int32(),
        SqlType::Bigint => Schema::int64(),
        SqlType::Double => Schema::float64(),
        SqlType::String => Schema::string(),
        SqlType::Decimal => {
            return decimal::schema(
                p.precision().unwrap_or_default(),
                p.scale().unwrap_or_default(),
            )
        }
        SqlType::Array | SqlType::Map | SqlType::Struct => {
            unreachable!("PrimitiveType cannot carry {}", p.sql_type())
        }
    };
    Ok(schema.optional())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_widths_collapse() {
        let schema = Schema::structure([
            ("a", Schema::int8()),
            ("b", Schema::int16()),
            ("c", Schema::int32()),
            ("d", Schema::int64()),
            ("e", Schema::float32()),
        ]);
        let desc = to_sql_schema(&schema).unwrap();
        assert_eq!(
            desc.to_string(),
            "STRUCT<A INT, B INT, C INT, D BIGINT, E DOUBLE>"
        );
    }

    #[test]
    fn test_decimal_precision_defaults() {
        let schema = Schema::bytes()
            .with_name(decimal::LOGICAL_NAME)
            .with_parameter("scale", "3");
        assert_eq!(
            to_sql_type(&schema),
            Ok(Type::decimal(64, 3).unwrap())
        );

        let schema = schema.with_parameter(decimal::CONNECT_PRECISION_FIELD, "10");
        assert_eq!(
            to_sql_type(&schema),
            Ok(Type::decimal(10, 3).unwrap())
        );
    }

    #[test]
    fn test_decimal_errors() {
        let bare = Schema::bytes().with_name(decimal::LOGICAL_NAME);
        assert_eq!(
            to_sql_type(&bare).unwrap_err().to_string(),
            format!("Unknown decimal parameters: {}", decimal::LOGICAL_NAME)
        );

        let no_scale = bare.clone().with_parameter("precision", "4");
        assert_eq!(
            to_sql_type(&no_scale).unwrap_err().to_string(),
            format!("Unknown decimal scale: {}", decimal::LOGICAL_NAME)
        );

        let bad_precision = bare
            .clone()
            .with_parameter("scale", "2")
            .with_parameter(decimal::CONNECT_PRECISION_FIELD, "x");
        assert!(to_sql_type(&bad_precision)
            .unwrap_err()
            .to_string()
            .starts_with("Invalid decimal parameters"));

        let invalid = bare
            .with_parameter("scale", "5")
            .with_parameter(decimal::CONNECT_PRECISION_FIELD, "2");
        assert!(to_sql_type(&invalid)
            .unwrap_err()
            .to_string()
            .contains("DECIMAL precision must be >= scale"));

        assert_eq!(
            to_sql_type(&Schema::bytes()).unwrap_err().to_string(),
            "Unsupported type: BYTES"
        );
    }

    #[test]
    fn test_map_keys() {
        let ok = Schema::map(Schema::int64(), Schema::string());
        assert_eq!(
            to_sql_type(&ok),
            Ok(Type::map(PrimitiveType::BIGINT, PrimitiveType::STRING.into()))
        );

        let bad = Schema::map(Schema::float64(), Schema::string());
        assert_eq!(
            to_sql_type(&bad).unwrap_err().to_string(),
            "Unsupported type for map key: FLOAT64"
        );
    }

    #[test]
    fn test_root_errors() {
        assert_eq!(
            to_sql_schema(&Schema::int32()),
            Err(TranslateError::NotStructured(SchemaKind::Int32))
        );
        assert_eq!(
            to_sql_schema(&Schema::bytes()).unwrap_err().to_string(),
            "Unsupported type at root of schema: Unsupported type: BYTES"
        );
        assert!(matches!(
            to_sql_schema(&Schema::map(Schema::array(Schema::int32()), Schema::int32())),
            Err(TranslateError::UnsupportedRoot(_))
        ));
    }
}
