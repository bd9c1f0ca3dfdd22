// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The SQL type model.

use std::fmt;
use std::str::FromStr;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::adt::decimal::{self, DecimalError};

/// The closed set of SQL type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SqlType {
    Boolean,
    Integer,
    Bigint,
    Double,
    String,
    Decimal,
    Array,
    Map,
    Struct,
}

impl SqlType {
    /// Reports whether the type is built from other types.
    pub fn is_complex(self) -> bool {
        matches!(self, SqlType::Array | SqlType::Map | SqlType::Struct)
    }

    pub fn name(self) -> &'static str {
        match self {
            SqlType::Boolean => "BOOLEAN",
            SqlType::Integer => "INTEGER",
            SqlType::Bigint => "BIGINT",
            SqlType::Double => "DOUBLE",
            SqlType::String => "STRING",
            SqlType::Decimal => "DECIMAL",
            SqlType::Array => "ARRAY",
            SqlType::Map => "MAP",
            SqlType::Struct => "STRUCT",
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SqlType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<SqlType, TypeError> {
        const ALL: [SqlType; 9] = [
            SqlType::Boolean,
            SqlType::Integer,
            SqlType::Bigint,
            SqlType::Double,
            SqlType::String,
            SqlType::Decimal,
            SqlType::Array,
            SqlType::Map,
            SqlType::Struct,
        ];
        ALL.into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| TypeError::UnknownPrimitiveType(s.to_string()))
    }
}

/// An error produced while constructing or parsing a type.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    #[error("Unknown primitive type: {0}")]
    UnknownPrimitiveType(String),
    #[error("Invalid primitive type: {0}")]
    InvalidPrimitiveType(SqlType),
    #[error("Invalid number of DECIMAL type parameters: {0}")]
    DecimalParameterCount(usize),
    #[error(transparent)]
    Decimal(#[from] DecimalError),
    #[error("invalid type {input:?}: {detail}")]
    Parse { input: String, detail: String },
}

/// A non-composite SQL type, optionally qualified by integer parameters.
///
/// Only `DECIMAL` carries parameters, always exactly `[precision, scale]`.
/// Two primitive types are equal when their tags and parameter lists are.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawPrimitiveType")]
pub struct PrimitiveType {
    sql_type: SqlType,
    parameters: Option<Vec<i32>>,
}

/// The unvalidated serialized form of a [`PrimitiveType`].
#[derive(Deserialize)]
struct RawPrimitiveType {
    sql_type: SqlType,
    parameters: Option<Vec<i32>>,
}

impl TryFrom<RawPrimitiveType> for PrimitiveType {
    type Error = TypeError;

    fn try_from(raw: RawPrimitiveType) -> Result<PrimitiveType, TypeError> {
        PrimitiveType::with_parameters(raw.sql_type, raw.parameters.unwrap_or_default())
    }
}

impl PrimitiveType {
    pub const BOOLEAN: PrimitiveType = PrimitiveType::unparameterized(SqlType::Boolean);
    pub const INTEGER: PrimitiveType = PrimitiveType::unparameterized(SqlType::Integer);
    pub const BIGINT: PrimitiveType = PrimitiveType::unparameterized(SqlType::Bigint);
    pub const DOUBLE: PrimitiveType = PrimitiveType::unparameterized(SqlType::Double);
    pub const STRING: PrimitiveType = PrimitiveType::unparameterized(SqlType::String);

    const fn unparameterized(sql_type: SqlType) -> PrimitiveType {
        PrimitiveType {
            sql_type,
            parameters: None,
        }
    }

    /// Returns the primitive type for a tag that needs no parameters.
    ///
    /// Fails for the composite tags and for `DECIMAL`.
    pub fn of(sql_type: SqlType) -> Result<PrimitiveType, TypeError> {
        PrimitiveType::with_parameters(sql_type, vec![])
    }

    /// Returns the primitive type for `sql_type` qualified by `parameters`.
    ///
    /// `DECIMAL` requires exactly two valid parameters. Other primitive tags
    /// ignore their parameters.
    pub fn with_parameters(
        sql_type: SqlType,
        parameters: Vec<i32>,
    ) -> Result<PrimitiveType, TypeError> {
        match sql_type {
            SqlType::Array | SqlType::Map | SqlType::Struct => {
                Err(TypeError::InvalidPrimitiveType(sql_type))
            }
            SqlType::Decimal => match parameters[..] {
                [precision, scale] => Ok(PrimitiveType::decimal(precision, scale)?),
                _ => Err(TypeError::DecimalParameterCount(parameters.len())),
            },
            _ => Ok(PrimitiveType::unparameterized(sql_type)),
        }
    }

    /// Resolves a type name, case insensitively.
    ///
    /// `VARCHAR` and `STRING` name the same type, as do `INT` and `INTEGER`.
    pub fn from_name(name: &str, parameters: Option<Vec<i32>>) -> Result<PrimitiveType, TypeError> {
        let sql_type = match name.to_ascii_uppercase().as_str() {
            "BOOLEAN" => SqlType::Boolean,
            "INT" | "INTEGER" => SqlType::Integer,
            "VARCHAR" | "STRING" => SqlType::String,
            "DECIMAL" => {
                let parameters = parameters.unwrap_or_default();
                if parameters.len() != 2 {
                    return Err(TypeError::DecimalParameterCount(parameters.len()));
                }
                return PrimitiveType::with_parameters(SqlType::Decimal, parameters);
            }
            _ => name.parse()?,
        };
        PrimitiveType::with_parameters(sql_type, parameters.unwrap_or_default())
    }

    pub fn decimal(precision: i32, scale: i32) -> Result<PrimitiveType, DecimalError> {
        decimal::validate_parameters(precision, scale)?;
        Ok(PrimitiveType {
            sql_type: SqlType::Decimal,
            parameters: Some(vec![precision, scale]),
        })
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn parameters(&self) -> Option<&[i32]> {
        self.parameters.as_deref()
    }

    /// The precision of a `DECIMAL`, or `None` for other types.
    pub fn precision(&self) -> Option<i32> {
        self.parameters.as_ref().map(|p| p[0])
    }

    /// The scale of a `DECIMAL`, or `None` for other types.
    pub fn scale(&self) -> Option<i32> {
        self.parameters.as_ref().map(|p| p[1])
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.sql_type {
            SqlType::Integer => f.write_str("INT"),
            SqlType::String => f.write_str("VARCHAR"),
            SqlType::Decimal => match &self.parameters {
                Some(p) => write!(f, "DECIMAL({},{})", p[0], p[1]),
                None => f.write_str("DECIMAL"),
            },
            other => f.write_str(other.name()),
        }
    }
}

/// A SQL type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    Primitive(PrimitiveType),
    /// A variable-length list of elements of a single type.
    Array { element: Box<Type> },
    /// A mapping from primitive keys to values of a single type.
    Map { key: PrimitiveType, value: Box<Type> },
    Struct(StructType),
}

impl Type {
    pub fn array(element: Type) -> Type {
        Type::Array {
            element: Box::new(element),
        }
    }

    pub fn map(key: PrimitiveType, value: Type) -> Type {
        Type::Map {
            key,
            value: Box::new(value),
        }
    }

    pub fn decimal(precision: i32, scale: i32) -> Result<Type, DecimalError> {
        Ok(Type::Primitive(PrimitiveType::decimal(precision, scale)?))
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            Type::Primitive(p) => p.sql_type(),
            Type::Array { .. } => SqlType::Array,
            Type::Map { .. } => SqlType::Map,
            Type::Struct(_) => SqlType::Struct,
        }
    }
}

impl From<PrimitiveType> for Type {
    fn from(p: PrimitiveType) -> Type {
        Type::Primitive(p)
    }
}

impl From<StructType> for Type {
    fn from(s: StructType) -> Type {
        Type::Struct(s)
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Type::Primitive(p) => p.fmt(f),
            Type::Array { element } => write!(f, "ARRAY<{}>", element),
            Type::Map { key, value } => write!(f, "MAP<{},{}>", key, value),
            Type::Struct(s) => s.fmt(f),
        }
    }
}

impl FromStr for Type {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Type, TypeError> {
        let mut parser = TypeParser { input: s, pos: 0 };
        let typ = parser.parse_type()?;
        parser.skip_whitespace();
        if parser.pos != s.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(typ)
    }
}

/// A named, typed member of a [`StructType`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub typ: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, typ: impl Into<Type>) -> Field {
        Field {
            name: name.into(),
            typ: typ.into(),
        }
    }
}

/// An ordered sequence of fields.
///
/// Field order is significant and duplicate names are preserved as given.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StructType {
    fields: Vec<Field>,
}

impl StructType {
    pub fn new(fields: Vec<Field>) -> StructType {
        StructType { fields }
    }

    pub fn empty() -> StructType {
        StructType::default()
    }

    /// Appends a field, builder style.
    pub fn with_field(mut self, name: impl Into<String>, typ: impl Into<Type>) -> StructType {
        self.fields.push(Field::new(name, typ));
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Returns the first field named `name`.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl fmt::Display for StructType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "STRUCT<{}>",
            self.fields
                .iter()
                .format_with(", ", |field, f| f(&format_args!(
                    "{} {}",
                    field.name, field.typ
                )))
        )
    }
}

/// Recursive-descent parser for the textual type surface.
struct TypeParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn error(&self, detail: impl Into<String>) -> TypeError {
        TypeError::Parse {
            input: self.input.to_string(),
            detail: detail.into(),
        }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        let rest = self.rest();
        self.pos += rest.len() - rest.trim_start().len();
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_whitespace();
        self.rest().chars().next()
    }

    fn consume(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), TypeError> {
        if self.consume(c) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{}' at position {}", c, self.pos)))
        }
    }

    fn parse_identifier(&mut self) -> Result<&'a str, TypeError> {
        self.skip_whitespace();
        let rest = self.rest();
        if let Some(quoted) = rest.strip_prefix('`') {
            let end = quoted
                .find('`')
                .ok_or_else(|| self.error("unterminated quoted identifier"))?;
            self.pos += end + 2;
            return Ok(&quoted[..end]);
        }
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error(format!("expected identifier at position {}", self.pos)));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn parse_integer(&mut self) -> Result<i32, TypeError> {
        self.skip_whitespace();
        let rest = self.rest();
        let len = rest
            .char_indices()
            .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && *c == '-')))
            .map_or(rest.len(), |(i, _)| i);
        let n = rest[..len]
            .parse()
            .map_err(|_| self.error(format!("expected integer at position {}", self.pos)))?;
        self.pos += len;
        Ok(n)
    }

    fn parse_type(&mut self) -> Result<Type, TypeError> {
        let name = self.parse_identifier()?;
        match name.to_ascii_uppercase().as_str() {
            "ARRAY" => {
                self.expect('<')?;
                let element = self.parse_type()?;
                self.expect('>')?;
                Ok(Type::array(element))
            }
            "MAP" => {
                self.expect('<')?;
                let key = match self.parse_type()? {
                    Type::Primitive(key) => key,
                    other => {
                        return Err(self.error(format!("map key must be primitive, got {}", other)))
                    }
                };
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect('>')?;
                Ok(Type::map(key, value))
            }
            "STRUCT" => {
                self.expect('<')?;
                let mut fields = vec![];
                if !self.consume('>') {
                    loop {
                        let name = self.parse_identifier()?;
                        let typ = self.parse_type()?;
                        fields.push(Field::new(name, typ));
                        if self.consume('>') {
                            break;
                        }
                        self.expect(',')?;
                    }
                }
                Ok(Type::Struct(StructType::new(fields)))
            }
            upper => {
                let parameters = if self.consume('(') {
                    let mut parameters = vec![self.parse_integer()?];
                    while self.consume(',') {
                        parameters.push(self.parse_integer()?);
                    }
                    self.expect(')')?;
                    Some(parameters)
                } else {
                    None
                };
                let canonical = match upper {
                    "BOOL" => "BOOLEAN",
                    "LONG" => "BIGINT",
                    "DEC" => "DECIMAL",
                    other => other,
                };
                Ok(Type::Primitive(PrimitiveType::from_name(
                    canonical, parameters,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_deserialize_validates() {
        let decimal: PrimitiveType =
            serde_json::from_str(r#"{"sql_type":"Decimal","parameters":[6,2]}"#).unwrap();
        assert_eq!(decimal, PrimitiveType::decimal(6, 2).unwrap());
        assert_eq!(
            serde_json::to_string(&decimal).unwrap(),
            r#"{"sql_type":"Decimal","parameters":[6,2]}"#
        );

        for invalid in [
            r#"{"sql_type":"Decimal","parameters":[6]}"#,
            r#"{"sql_type":"Decimal","parameters":null}"#,
            r#"{"sql_type":"Decimal","parameters":[2,6]}"#,
            r#"{"sql_type":"Array","parameters":null}"#,
        ] {
            assert!(
                serde_json::from_str::<PrimitiveType>(invalid).is_err(),
                "{invalid} deserialized"
            );
        }

        // Parameters on a non-decimal tag are dropped, as by `with_parameters`.
        let bigint: PrimitiveType =
            serde_json::from_str(r#"{"sql_type":"Bigint","parameters":[1]}"#).unwrap();
        assert_eq!(bigint, PrimitiveType::BIGINT);
    }

    #[test]
    fn test_primitive_of_rejects_composites() {
        for sql_type in [SqlType::Array, SqlType::Map, SqlType::Struct] {
            assert_eq!(
                PrimitiveType::of(sql_type),
                Err(TypeError::InvalidPrimitiveType(sql_type))
            );
        }
        assert_eq!(
            PrimitiveType::of(SqlType::Decimal),
            Err(TypeError::DecimalParameterCount(0))
        );
        assert_eq!(
            PrimitiveType::of(SqlType::Bigint),
            Ok(PrimitiveType::BIGINT)
        );
    }

    #[test]
    fn test_decimal_equality() {
        let a = PrimitiveType::with_parameters(SqlType::Decimal, vec![6, 2]).unwrap();
        let b = PrimitiveType::decimal(6, 2).unwrap();
        let c = PrimitiveType::decimal(6, 3).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.precision(), Some(6));
        assert_eq!(a.scale(), Some(2));
        assert_eq!(
            PrimitiveType::with_parameters(SqlType::Decimal, vec![6]),
            Err(TypeError::DecimalParameterCount(1))
        );
        assert!(matches!(
            PrimitiveType::with_parameters(SqlType::Decimal, vec![2, 3]),
            Err(TypeError::Decimal(DecimalError::PrecisionLessThanScale { .. }))
        ));
    }

    #[test]
    fn test_non_decimal_ignores_parameters() {
        assert_eq!(
            PrimitiveType::with_parameters(SqlType::Integer, vec![1, 2, 3]),
            Ok(PrimitiveType::INTEGER)
        );
    }

    #[test]
    fn test_from_name() {
        assert_eq!(
            PrimitiveType::from_name("varchar", None),
            Ok(PrimitiveType::STRING)
        );
        assert_eq!(
            PrimitiveType::from_name("String", None),
            Ok(PrimitiveType::STRING)
        );
        assert_eq!(
            PrimitiveType::from_name("int", None),
            Ok(PrimitiveType::INTEGER)
        );
        assert_eq!(
            PrimitiveType::from_name("double", None),
            Ok(PrimitiveType::DOUBLE)
        );
        assert_eq!(
            PrimitiveType::from_name("decimal", Some(vec![4, 1])),
            PrimitiveType::decimal(4, 1).map_err(TypeError::from)
        );
        assert_eq!(
            PrimitiveType::from_name("DECIMAL", None),
            Err(TypeError::DecimalParameterCount(0))
        );
        assert_eq!(
            PrimitiveType::from_name("blob", None).unwrap_err().to_string(),
            "Unknown primitive type: blob"
        );
        assert_eq!(
            PrimitiveType::from_name("array", None).unwrap_err().to_string(),
            "Invalid primitive type: ARRAY"
        );
    }

    #[test]
    fn test_display() {
        let typ = Type::Struct(
            StructType::empty()
                .with_field("ID", PrimitiveType::BIGINT)
                .with_field("PRICE", Type::decimal(10, 2).unwrap())
                .with_field(
                    "TAGS",
                    Type::map(PrimitiveType::STRING, Type::array(PrimitiveType::INTEGER.into())),
                ),
        );
        assert_eq!(
            typ.to_string(),
            "STRUCT<ID BIGINT, PRICE DECIMAL(10,2), TAGS MAP<VARCHAR,ARRAY<INT>>>"
        );
    }

    #[test]
    fn test_parse() {
        let cases = [
            ("bool", "BOOLEAN"),
            ("INTEGER", "INT"),
            ("long", "BIGINT"),
            ("STRING", "VARCHAR"),
            ("dec(4, 2)", "DECIMAL(4,2)"),
            ("ARRAY<DOUBLE>", "ARRAY<DOUBLE>"),
            ("map<varchar, array<int>>", "MAP<VARCHAR,ARRAY<INT>>"),
            (
                "STRUCT<a INT, `b c` STRUCT<d DECIMAL(3,1)>>",
                "STRUCT<a INT, b c STRUCT<d DECIMAL(3,1)>>",
            ),
            ("STRUCT<>", "STRUCT<>"),
        ];
        for (input, expected) in cases {
            let typ: Type = input.parse().unwrap();
            assert_eq!(typ.to_string(), expected, "parsing {}", input);
        }
    }

    #[test]
    fn test_parse_errors() {
        for input in [
            "DECIMAL",
            "DECIMAL(1)",
            "DECIMAL(a,b)",
            "ARRAY<INT",
            "MAP<ARRAY<INT>,INT>",
            "INT extra",
            "",
        ] {
            assert!(input.parse::<Type>().is_err(), "parsing {:?}", input);
        }
        assert!(matches!(
            "DECIMAL(2,3)".parse::<Type>(),
            Err(TypeError::Decimal(_))
        ));
    }
}
