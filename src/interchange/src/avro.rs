// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Avro schemas, as stored in the schema registry.

use std::collections::{BTreeMap, BTreeSet};

use rill_repr::adt::decimal::{self, DecimalError, CONNECT_PRECISION_FIELD, SCALE_FIELD};
use rill_repr::{Schema, SchemaKind, StructType};
use serde_json::{json, Map, Value};

use crate::connect::{self, TranslateError};

/// The namespace of generated record schemas.
pub const DEFAULT_NAMESPACE: &str = "rill";

/// The name of the top-level record of generated schemas.
pub const DEFAULT_RECORD_NAME: &str = "RillDataSourceSchema";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AvroSchemaError {
    #[error("Unsupported AVRO type: {0}")]
    UnsupportedKind(SchemaKind),
    #[error("Unsupported Avro type: {0}")]
    UnsupportedAvroType(String),
    #[error("invalid Avro schema: {0}")]
    Invalid(String),
    #[error(transparent)]
    Translate(#[from] TranslateError),
    #[error(transparent)]
    Decimal(#[from] DecimalError),
}

/// Rewrites `name` into a valid Avro name.
pub fn avroify_name(name: &str) -> String {
    name.replace(['.', '-'], "_")
}

/// Builds an Avro record schema that corresponds to the struct `schema`.
///
/// The returned schema has some special properties to ease encoding:
///
///   * Union schemas are only used to represent nullability. The first
///     variant is always the null variant, and the second and last variant
///     is the non-null variant.
///   * Every field defaults to null.
///   * Nested records are named after their field and namespaced beneath
///     their parent record, keeping full names unique.
pub fn build_schema(schema: &Schema, name: &str) -> Result<Value, AvroSchemaError> {
    if schema.kind() != SchemaKind::Struct {
        return Err(TranslateError::NotStructured(schema.kind()).into());
    }
    build_record(schema, &avroify_name(name), DEFAULT_NAMESPACE)
}

/// Builds the Avro schema for a SQL row schema.
pub fn build_row_schema(desc: &StructType, name: &str) -> Result<Value, AvroSchemaError> {
    build_schema(&connect::from_sql_schema(desc)?, name)
}

fn build_record(schema: &Schema, name: &str, namespace: &str) -> Result<Value, AvroSchemaError> {
    let nested_namespace = format!("{}.{}", namespace, name);
    let mut fields = Vec::with_capacity(schema.fields().len());
    for field in schema.fields() {
        let field_name = avroify_name(&field.name);
        let field_type = build_type(&field.schema, &field_name, &nested_namespace)?;
        fields.push(json!({
            "name": field_name,
            "type": ["null", field_type],
            "default": null,
        }));
    }
    Ok(json!({
        "type": "record",
        "name": name,
        "namespace": namespace,
        "fields": fields,
    }))
}

fn build_type(schema: &Schema, name: &str, namespace: &str) -> Result<Value, AvroSchemaError> {
    Ok(match schema.kind() {
        SchemaKind::Boolean => json!("boolean"),
        SchemaKind::Int32 => json!("int"),
        SchemaKind::Int64 => json!("long"),
        SchemaKind::Float64 => json!("double"),
        SchemaKind::String => json!("string"),
        SchemaKind::Bytes if decimal::is_decimal(schema) => {
            let (Some(precision), Some(scale)) =
                (decimal::precision_of(schema), decimal::scale_of(schema))
            else {
                return Err(AvroSchemaError::UnsupportedKind(SchemaKind::Bytes));
            };
            decimal::validate_parameters(precision, scale)?;
            json!({
                "type": "bytes",
                "logicalType": "decimal",
                "precision": precision,
                "scale": scale,
            })
        }
        SchemaKind::Array => {
            let items = schema
                .value_schema()
                .ok_or(AvroSchemaError::UnsupportedKind(SchemaKind::Array))?;
            json!({
                "type": "array",
                "items": ["null", build_type(items, name, namespace)?],
            })
        }
        SchemaKind::Map => {
            // Avro map keys are always strings, whatever the source key type.
            let values = schema
                .value_schema()
                .ok_or(AvroSchemaError::UnsupportedKind(SchemaKind::Map))?;
            json!({
                "type": "map",
                "values": ["null", build_type(values, name, namespace)?],
            })
        }
        SchemaKind::Struct => build_record(schema, name, namespace)?,
        kind @ (SchemaKind::Int8
        | SchemaKind::Int16
        | SchemaKind::Float32
        | SchemaKind::Bytes) => return Err(AvroSchemaError::UnsupportedKind(kind)),
    })
}

/// Parses an Avro schema and converts it into the structured schema that the
/// registry converter would attach to decoded records.
pub fn parse_schema(schema: &str) -> Result<Schema, AvroSchemaError> {
    let value: Value =
        serde_json::from_str(schema).map_err(|e| AvroSchemaError::Invalid(e.to_string()))?;
    to_connect_schema(&value)
}

/// Converts an Avro schema into a structured schema.
///
/// Named types may be referenced after their definition. Recursive types are
/// rejected, as are unions other than `["null", T]`.
pub fn to_connect_schema(schema: &Value) -> Result<Schema, AvroSchemaError> {
    let mut converter = Converter::default();
    converter.convert(schema, None)
}

/// Parses an Avro value schema all the way into a SQL row schema.
pub fn translate_value_schema(schema: &str) -> Result<StructType, AvroSchemaError> {
    Ok(connect::to_sql_schema(&parse_schema(schema)?)?)
}

#[derive(Default)]
struct Converter {
    /// Named types defined so far, by full name.
    named: BTreeMap<String, Schema>,
    /// Named types whose definitions are being converted.
    in_progress: BTreeSet<String>,
}

impl Converter {
    fn convert(
        &mut self,
        schema: &Value,
        namespace: Option<&str>,
    ) -> Result<Schema, AvroSchemaError> {
        match schema {
            Value::String(name) => self.convert_name(name, namespace),
            Value::Array(variants) => self.convert_union(variants, namespace),
            Value::Object(map) => self.convert_object(map, namespace),
            other => Err(AvroSchemaError::Invalid(format!(
                "unexpected schema {}",
                other
            ))),
        }
    }

    fn convert_name(
        &mut self,
        name: &str,
        namespace: Option<&str>,
    ) -> Result<Schema, AvroSchemaError> {
        Ok(match name {
            "boolean" => Schema::boolean(),
            "int" => Schema::int32(),
            "long" => Schema::int64(),
            "float" => Schema::float32(),
            "double" => Schema::float64(),
            "bytes" => Schema::bytes(),
            "string" => Schema::string(),
            "null" => return Err(AvroSchemaError::UnsupportedAvroType("null".into())),
            other => {
                let full_name = full_name(other, namespace);
                if self.in_progress.contains(&full_name) {
                    return Err(AvroSchemaError::UnsupportedAvroType(format!(
                        "recursive type {}",
                        full_name
                    )));
                }
                match self.named.get(&full_name).or_else(|| self.named.get(other)) {
                    Some(schema) => schema.clone(),
                    None => {
                        return Err(AvroSchemaError::Invalid(format!(
                            "unknown type {}",
                            other
                        )))
                    }
                }
            }
        })
    }

    fn convert_union(
        &mut self,
        variants: &[Value],
        namespace: Option<&str>,
    ) -> Result<Schema, AvroSchemaError> {
        let is_null = |v: &Value| v.as_str() == Some("null");
        let non_null: Vec<_> = variants.iter().filter(|v| !is_null(v)).collect();
        match non_null[..] {
            [variant] => {
                let schema = self.convert(variant, namespace)?;
                if non_null.len() < variants.len() {
                    Ok(schema.optional())
                } else {
                    Ok(schema)
                }
            }
            _ => Err(AvroSchemaError::UnsupportedAvroType(format!(
                "union {}",
                Value::Array(variants.to_vec())
            ))),
        }
    }

    fn convert_object(
        &mut self,
        map: &Map<String, Value>,
        namespace: Option<&str>,
    ) -> Result<Schema, AvroSchemaError> {
        let typ = map
            .get("type")
            .ok_or_else(|| AvroSchemaError::Invalid("schema object without type".into()))?;
        let Some(typ) = typ.as_str() else {
            // A wrapped schema, e.g. `{"type": {"type": "array", ...}}`.
            return self.convert(typ, namespace);
        };
        match typ {
            "record" => {
                let (full_name, namespace) = self.declare(map, namespace)?;
                let fields = map
                    .get("fields")
                    .and_then(Value::as_array)
                    .ok_or_else(|| AvroSchemaError::Invalid(format!("record {} has no fields", full_name)))?;
                let mut converted = Vec::with_capacity(fields.len());
                for field in fields {
                    let name = field
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| AvroSchemaError::Invalid("field without name".into()))?;
                    let field_type = field
                        .get("type")
                        .ok_or_else(|| AvroSchemaError::Invalid(format!("field {} has no type", name)))?;
                    converted.push((name.to_string(), self.convert(field_type, namespace.as_deref())?));
                }
                let schema = Schema::structure(converted).with_name(full_name.clone());
                self.define(full_name, &schema);
                Ok(schema)
            }
            "enum" => {
                let (full_name, _) = self.declare(map, namespace)?;
                let schema = Schema::string();
                self.define(full_name, &schema);
                Ok(schema)
            }
            "fixed" => {
                let (full_name, _) = self.declare(map, namespace)?;
                let schema = convert_bytes(map);
                self.define(full_name, &schema);
                Ok(schema)
            }
            "bytes" => Ok(convert_bytes(map)),
            "array" => {
                let items = map
                    .get("items")
                    .ok_or_else(|| AvroSchemaError::Invalid("array without items".into()))?;
                Ok(Schema::array(self.convert(items, namespace)?))
            }
            "map" => {
                let values = map
                    .get("values")
                    .ok_or_else(|| AvroSchemaError::Invalid("map without values".into()))?;
                Ok(Schema::map(Schema::string(), self.convert(values, namespace)?))
            }
            // Logical types over other primitives decode as their underlying
            // type.
            primitive => self.convert_name(primitive, namespace),
        }
    }

    /// Marks the named type described by `map` as under construction,
    /// returning its full name and the namespace its members resolve in.
    fn declare(
        &mut self,
        map: &Map<String, Value>,
        namespace: Option<&str>,
    ) -> Result<(String, Option<String>), AvroSchemaError> {
        let name = map
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| AvroSchemaError::Invalid("named type without name".into()))?;
        let namespace = map
            .get("namespace")
            .and_then(Value::as_str)
            .or(namespace);
        let full_name = full_name(name, namespace);
        if self.named.contains_key(&full_name) || !self.in_progress.insert(full_name.clone()) {
            return Err(AvroSchemaError::Invalid(format!(
                "duplicate definition of {}",
                full_name
            )));
        }
        let member_namespace = full_name.rsplit_once('.').map(|(ns, _)| ns.to_string());
        Ok((full_name, member_namespace))
    }

    fn define(&mut self, full_name: String, schema: &Schema) {
        self.in_progress.remove(&full_name);
        self.named.insert(full_name, schema.clone());
    }
}

fn full_name(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !name.contains('.') && !ns.is_empty() => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

fn convert_bytes(map: &Map<String, Value>) -> Schema {
    if map.get("logicalType").and_then(Value::as_str) != Some("decimal") {
        return Schema::bytes();
    }
    let mut schema = Schema::bytes().with_name(decimal::LOGICAL_NAME);
    if let Some(scale) = map.get("scale").and_then(Value::as_i64) {
        schema = schema.with_parameter(SCALE_FIELD, scale.to_string());
    }
    if let Some(precision) = map.get("precision").and_then(Value::as_i64) {
        schema = schema.with_parameter(CONNECT_PRECISION_FIELD, precision.to_string());
    }
    schema
}
