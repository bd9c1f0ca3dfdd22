// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use itertools::Itertools;

use crate::adt::decimal::{self, DecimalError, Numeric};
use crate::scalar::{StructType, Type};

/// A single value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    String(String),
    Decimal(Numeric),
    Array(Vec<Datum>),
    /// Entries in insertion order.
    Map(Vec<(Datum, Datum)>),
    Struct(Vec<Datum>),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    /// Coerces the decimals within this datum to the bounds declared by
    /// `typ`, recursing through composite values.
    pub fn enforce_decimals(self, typ: &Type) -> Result<Datum, DecimalError> {
        match (self, typ) {
            (Datum::Decimal(n), Type::Primitive(p)) => {
                let (Some(precision), Some(scale)) = (p.precision(), p.scale()) else {
                    return Ok(Datum::Decimal(n));
                };
                Ok(decimal::enforce_precision_scale(Some(n), precision, scale)?
                    .map_or(Datum::Null, Datum::Decimal))
            }
            (Datum::Array(elems), Type::Array { element }) => Ok(Datum::Array(
                elems
                    .into_iter()
                    .map(|d| d.enforce_decimals(element))
                    .collect::<Result<_, _>>()?,
            )),
            (Datum::Map(entries), Type::Map { value, .. }) => Ok(Datum::Map(
                entries
                    .into_iter()
                    .map(|(k, v)| Ok((k, v.enforce_decimals(value)?)))
                    .collect::<Result<_, DecimalError>>()?,
            )),
            (Datum::Struct(datums), Type::Struct(typ)) => {
                Ok(Datum::Struct(enforce_fields(datums, typ)?))
            }
            (datum, _) => Ok(datum),
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Datum::Null => f.write_str("null"),
            Datum::Boolean(b) => write!(f, "{}", b),
            Datum::Int32(i) => write!(f, "{}", i),
            Datum::Int64(i) => write!(f, "{}", i),
            Datum::Float64(x) => write!(f, "{}", x),
            Datum::String(s) => f.write_str(s),
            Datum::Decimal(n) => f.write_str(&n.to_standard_notation_string()),
            Datum::Array(elems) => write!(f, "[{}]", elems.iter().join(", ")),
            Datum::Map(entries) => write!(
                f,
                "{{{}}}",
                entries
                    .iter()
                    .format_with(", ", |(k, v), f| f(&format_args!("{}={}", k, v)))
            ),
            Datum::Struct(datums) => write!(f, "{{{}}}", datums.iter().join(", ")),
        }
    }
}

fn enforce_fields(datums: Vec<Datum>, typ: &StructType) -> Result<Vec<Datum>, DecimalError> {
    datums
        .into_iter()
        .zip_longest(typ.iter())
        .filter_map(|pair| match pair {
            itertools::EitherOrBoth::Both(datum, field) => Some(datum.enforce_decimals(&field.typ)),
            itertools::EitherOrBoth::Left(datum) => Some(Ok(datum)),
            itertools::EitherOrBoth::Right(_) => None,
        })
        .collect()
}

/// A row of values produced by a query, in column order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    datums: Vec<Datum>,
}

impl Row {
    pub fn new(datums: Vec<Datum>) -> Row {
        Row { datums }
    }

    pub fn get(&self, idx: usize) -> Option<&Datum> {
        self.datums.get(idx)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Datum> {
        self.datums.iter()
    }

    pub fn len(&self) -> usize {
        self.datums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datums.is_empty()
    }

    pub fn into_datums(self) -> Vec<Datum> {
        self.datums
    }

    /// Coerces every decimal column to the precision and scale that `desc`
    /// declares for it.
    pub fn enforce_decimals(self, desc: &StructType) -> Result<Row, DecimalError> {
        Ok(Row::new(enforce_fields(self.datums, desc)?))
    }
}

impl FromIterator<Datum> for Row {
    fn from_iter<I: IntoIterator<Item = Datum>>(iter: I) -> Row {
        Row::new(iter.into_iter().collect())
    }
}

impl fmt::Display for Row {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}]", self.datums.iter().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::PrimitiveType;

    #[test]
    fn test_enforce_decimals() {
        let desc = StructType::empty()
            .with_field("ID", PrimitiveType::BIGINT)
            .with_field("PRICE", Type::decimal(6, 2).unwrap())
            .with_field("HISTORY", Type::array(Type::decimal(4, 1).unwrap()));
        let row = Row::new(vec![
            Datum::Int64(1),
            Datum::Decimal(decimal::parse("10.019").unwrap()),
            Datum::Array(vec![
                Datum::Decimal(decimal::parse("1.25").unwrap()),
                Datum::Null,
            ]),
        ]);
        let row = row.enforce_decimals(&desc).unwrap();
        assert_eq!(row.to_string(), "[1, 10.02, [1.3, null]]");

        let too_big = Row::new(vec![
            Datum::Int64(1),
            Datum::Decimal(decimal::parse("12345").unwrap()),
        ]);
        assert!(matches!(
            too_big.enforce_decimals(&desc),
            Err(DecimalError::OutOfRange { .. })
        ));
    }
}
