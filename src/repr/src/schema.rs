// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Structured schemas as exchanged with the serialization layer.
//!
//! A [`Schema`] is the "connect-style" description of a record that the
//! converters for the log store's wire formats produce and consume. It is
//! deliberately richer than [`Type`](crate::Type): it distinguishes integer
//! widths, carries logical type names and free-form parameters, and tracks
//! optionality. Translation between the two lives in `rill-interchange`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The physical kind of a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SchemaKind {
    Int8,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Boolean,
    String,
    Bytes,
    Array,
    Map,
    Struct,
}

impl SchemaKind {
    /// Reports whether schemas of this kind have no sub-schemas.
    pub fn is_primitive(self) -> bool {
        !matches!(self, SchemaKind::Array | SchemaKind::Map | SchemaKind::Struct)
    }

    pub fn name(self) -> &'static str {
        match self {
            SchemaKind::Int8 => "INT8",
            SchemaKind::Int16 => "INT16",
            SchemaKind::Int32 => "INT32",
            SchemaKind::Int64 => "INT64",
            SchemaKind::Float32 => "FLOAT32",
            SchemaKind::Float64 => "FLOAT64",
            SchemaKind::Boolean => "BOOLEAN",
            SchemaKind::String => "STRING",
            SchemaKind::Bytes => "BYTES",
            SchemaKind::Array => "ARRAY",
            SchemaKind::Map => "MAP",
            SchemaKind::Struct => "STRUCT",
        }
    }
}

impl fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A named member of a struct [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    pub name: String,
    pub schema: Schema,
}

/// A structured schema.
///
/// Schemas are built with the kind-specific constructors and refined with
/// the `with_*` and [`optional`](Schema::optional) combinators:
///
/// ```
/// use rill_repr::{Schema, SchemaKind};
///
/// let schema = Schema::structure([
///     ("id", Schema::int64()),
///     ("tags", Schema::array(Schema::string().optional()).optional()),
/// ]);
/// assert_eq!(schema.kind(), SchemaKind::Struct);
/// assert_eq!(schema.fields().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    kind: SchemaKind,
    optional: bool,
    name: Option<String>,
    /// Ordered free-form parameters. `None` is distinct from an empty list:
    /// the former means the producer attached no parameter map at all.
    parameters: Option<Vec<(String, String)>>,
    fields: Vec<SchemaField>,
    key: Option<Box<Schema>>,
    value: Option<Box<Schema>>,
}

impl Schema {
    fn leaf(kind: SchemaKind) -> Schema {
        Schema {
            kind,
            optional: false,
            name: None,
            parameters: None,
            fields: vec![],
            key: None,
            value: None,
        }
    }

    pub fn int8() -> Schema {
        Schema::leaf(SchemaKind::Int8)
    }

    pub fn int16() -> Schema {
        Schema::leaf(SchemaKind::Int16)
    }

    pub fn int32() -> Schema {
        Schema::leaf(SchemaKind::Int32)
    }

    pub fn int64() -> Schema {
        Schema::leaf(SchemaKind::Int64)
    }

    pub fn float32() -> Schema {
        Schema::leaf(SchemaKind::Float32)
    }

    pub fn float64() -> Schema {
        Schema::leaf(SchemaKind::Float64)
    }

    pub fn boolean() -> Schema {
        Schema::leaf(SchemaKind::Boolean)
    }

    pub fn string() -> Schema {
        Schema::leaf(SchemaKind::String)
    }

    pub fn bytes() -> Schema {
        Schema::leaf(SchemaKind::Bytes)
    }

    /// Constructs an array schema whose elements are described by `value`.
    pub fn array(value: Schema) -> Schema {
        Schema {
            value: Some(Box::new(value)),
            ..Schema::leaf(SchemaKind::Array)
        }
    }

    pub fn map(key: Schema, value: Schema) -> Schema {
        Schema {
            key: Some(Box::new(key)),
            value: Some(Box::new(value)),
            ..Schema::leaf(SchemaKind::Map)
        }
    }

    /// Constructs a struct schema from `(name, schema)` pairs, preserving
    /// their order.
    pub fn structure<I, N>(fields: I) -> Schema
    where
        I: IntoIterator<Item = (N, Schema)>,
        N: Into<String>,
    {
        Schema {
            fields: fields
                .into_iter()
                .map(|(name, schema)| SchemaField {
                    name: name.into(),
                    schema,
                })
                .collect(),
            ..Schema::leaf(SchemaKind::Struct)
        }
    }

    /// Marks the schema as admitting absent values.
    pub fn optional(mut self) -> Schema {
        self.optional = true;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Schema {
        self.name = Some(name.into());
        self
    }

    /// Appends a parameter, creating the parameter list if necessary.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Schema {
        self.parameters
            .get_or_insert_with(Vec::new)
            .push((key.into(), value.into()));
        self
    }

    pub fn kind(&self) -> SchemaKind {
        self.kind
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parameters(&self) -> Option<&[(String, String)]> {
        self.parameters.as_deref()
    }

    /// Looks up a parameter by key. The first occurrence wins.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .flatten()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn fields(&self) -> &[SchemaField] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&SchemaField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The key schema of a map.
    pub fn key_schema(&self) -> Option<&Schema> {
        self.key.as_deref()
    }

    /// The element schema of an array or the value schema of a map.
    pub fn value_schema(&self) -> Option<&Schema> {
        self.value.as_deref()
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "Schema{{{}:{}}}", name, self.kind),
            None => write!(f, "Schema{{{}}}", self.kind),
        }
    }
}
