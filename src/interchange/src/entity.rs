// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Serializable descriptions of source schemas, as returned by `DESCRIBE`.

use rill_repr::adt::decimal;
use rill_repr::{Schema, SchemaKind};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntityError {
    #[error("Invalid type in schema: {0}")]
    InvalidType(SchemaKind),
    #[error("Root schema should contain fields: {0}")]
    NoFields(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaInfoType {
    Integer,
    Bigint,
    Double,
    Boolean,
    String,
    Decimal,
    Array,
    Map,
    Struct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaInfo {
    #[serde(rename = "type")]
    pub typ: SchemaInfoType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<FieldInfo>>,
    /// The element type of an array or the value type of a map.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_schema: Option<Box<SchemaInfo>>,
    /// Type parameters, in declaration order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub schema: SchemaInfo,
}

/// Describes the fields of a source's value schema.
pub fn build_source_schema_entity(schema: &Schema) -> Result<Vec<FieldInfo>, EntityError> {
    let info = build_schema_info(schema)?;
    match info.fields {
        Some(fields) if !fields.is_empty() => Ok(fields),
        _ => Err(EntityError::NoFields(schema.to_string())),
    }
}

fn build_schema_info(schema: &Schema) -> Result<SchemaInfo, EntityError> {
    let leaf = |typ: SchemaInfoType| SchemaInfo {
        typ,
        fields: None,
        member_schema: None,
        parameters: vec![],
    };
    Ok(match schema.kind() {
        SchemaKind::Int32 => leaf(SchemaInfoType::Integer),
        SchemaKind::Int64 => leaf(SchemaInfoType::Bigint),
        SchemaKind::Float32 | SchemaKind::Float64 => leaf(SchemaInfoType::Double),
        SchemaKind::Boolean => leaf(SchemaInfoType::Boolean),
        SchemaKind::String => leaf(SchemaInfoType::String),
        SchemaKind::Bytes if decimal::is_decimal(schema) => SchemaInfo {
            parameters: schema
                .parameters()
                .into_iter()
                .flatten()
                .map(|(_, v)| v.clone())
                .collect(),
            ..leaf(SchemaInfoType::Decimal)
        },
        SchemaKind::Array | SchemaKind::Map => {
            let member = schema
                .value_schema()
                .ok_or(EntityError::InvalidType(schema.kind()))?;
            SchemaInfo {
                member_schema: Some(Box::new(build_schema_info(member)?)),
                ..leaf(if schema.kind() == SchemaKind::Array {
                    SchemaInfoType::Array
                } else {
                    SchemaInfoType::Map
                })
            }
        }
        SchemaKind::Struct => SchemaInfo {
            fields: Some(
                schema
                    .fields()
                    .iter()
                    .map(|f| {
                        Ok(FieldInfo {
                            name: f.name.clone(),
                            schema: build_schema_info(&f.schema)?,
                        })
                    })
                    .collect::<Result<_, EntityError>>()?,
            ),
            ..leaf(SchemaInfoType::Struct)
        },
        kind => return Err(EntityError::InvalidType(kind)),
    })
}

#[cfg(test)]
mod tests {
    use rill_repr::{PrimitiveType, StructType, Type};
    use serde_json::json;

    use super::*;
    use crate::connect;

    #[test]
    fn test_source_schema_entity() {
        let desc = StructType::empty()
            .with_field("ID", PrimitiveType::BIGINT)
            .with_field("PRICE", Type::decimal(6, 2).unwrap())
            .with_field("TAGS", Type::array(PrimitiveType::STRING.into()));
        let schema = connect::from_sql_schema(&desc).unwrap();
        let entity = build_source_schema_entity(&schema).unwrap();
        assert_eq!(
            serde_json::to_value(&entity).unwrap(),
            json!([
                {"name": "ID", "schema": {"type": "BIGINT"}},
                {"name": "PRICE", "schema": {"type": "DECIMAL", "parameters": ["6", "2"]}},
                {"name": "TAGS", "schema": {"type": "ARRAY", "memberSchema": {"type": "STRING"}}},
            ])
        );
    }

    #[test]
    fn test_float_widths_describe_as_double() {
        let schema = Schema::structure([("F", Schema::float32()), ("D", Schema::float64())]);
        let entity = build_source_schema_entity(&schema).unwrap();
        let types: Vec<_> = entity.iter().map(|f| f.schema.typ).collect();
        assert_eq!(types, vec![SchemaInfoType::Double, SchemaInfoType::Double]);
    }

    #[test]
    fn test_source_schema_entity_errors() {
        assert_eq!(
            build_source_schema_entity(&Schema::structure([("A", Schema::int8())])),
            Err(EntityError::InvalidType(SchemaKind::Int8))
        );
        assert!(matches!(
            build_source_schema_entity(&Schema::int32()),
            Err(EntityError::NoFields(_))
        ));
        assert!(matches!(
            build_source_schema_entity(&Schema::structure(Vec::<(String, Schema)>::new())),
            Err(EntityError::NoFields(_))
        ));
    }
}
