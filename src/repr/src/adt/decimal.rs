// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Functions related to the `DECIMAL(p,s)` type, whose values are largely a
//! wrapper around [`rust-dec`].
//!
//! Precision and scale follow the usual arbitrary-precision conventions: the
//! precision of a value is the number of digits in its unscaled coefficient
//! and its scale is the number of those digits to the right of the decimal
//! point. `10.012` therefore has precision 5 and scale 3.
//!
//! [`rust-dec`]: https://github.com/MaterializeInc/rust-dec/

use dec::{Context, Decimal, Rounding};

use crate::schema::{Schema, SchemaKind};

/// The logical name attached to byte schemas that carry decimals.
pub const LOGICAL_NAME: &str = "org.apache.kafka.connect.data.Decimal";

/// The schema parameter holding a decimal's precision.
pub const PRECISION_FIELD: &str = "precision";

/// The schema parameter holding a decimal's scale.
pub const SCALE_FIELD: &str = "scale";

/// The alternate schema parameter some converters use for precision.
pub const CONNECT_PRECISION_FIELD: &str = "connect.decimal.precision";

/// The precision assumed when a decimal schema does not declare one.
pub const DEFAULT_CONNECT_PRECISION: i32 = 64;

/// The number of internal decimal units in a [`Numeric`] value.
pub const NUMERIC_WIDTH: usize = 27;

/// A decimal value.
///
/// Wide enough to hold values of the default connector precision without
/// loss.
pub type Numeric = Decimal<NUMERIC_WIDTH>;

/// An error produced while validating or coercing decimals.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecimalError {
    #[error("DECIMAL precision must be >= 1: DECIMAL({precision},{scale})")]
    PrecisionTooSmall { precision: i32, scale: i32 },
    #[error("DECIMAL scale must be >= 0: DECIMAL({precision},{scale})")]
    NegativeScale { precision: i32, scale: i32 },
    #[error("DECIMAL precision must be >= scale: DECIMAL({precision},{scale})")]
    PrecisionLessThanScale { precision: i32, scale: i32 },
    #[error(
        "Decimal precision/scale for value '{value}' does not fit into destination precision/scale: {precision},{scale}"
    )]
    OutOfRange {
        value: String,
        precision: i32,
        scale: i32,
    },
    #[error("invalid DECIMAL value '{0}'")]
    InvalidValue(String),
}

/// Checks that `precision` and `scale` describe a valid `DECIMAL(p,s)`.
pub fn validate_parameters(precision: i32, scale: i32) -> Result<(), DecimalError> {
    if precision < 1 {
        return Err(DecimalError::PrecisionTooSmall { precision, scale });
    }
    if scale < 0 {
        return Err(DecimalError::NegativeScale { precision, scale });
    }
    if precision < scale {
        return Err(DecimalError::PrecisionLessThanScale { precision, scale });
    }
    Ok(())
}

/// Builds the optional byte schema that describes `DECIMAL(precision,scale)`.
///
/// The parameters are recorded with precision ahead of scale.
pub fn schema(precision: i32, scale: i32) -> Result<Schema, DecimalError> {
    validate_parameters(precision, scale)?;
    Ok(Schema::bytes()
        .with_name(LOGICAL_NAME)
        .with_parameter(PRECISION_FIELD, precision.to_string())
        .with_parameter(SCALE_FIELD, scale.to_string())
        .optional())
}

/// Reports whether `schema` is a byte schema carrying the decimal logical
/// name. The name comparison is case insensitive.
pub fn is_decimal(schema: &Schema) -> bool {
    schema.kind() == SchemaKind::Bytes
        && schema
            .name()
            .map_or(false, |name| name.eq_ignore_ascii_case(LOGICAL_NAME))
}

/// Returns the raw declared precision of a decimal schema. The converter
/// parameter takes priority over the canonical one.
pub fn precision_parameter(schema: &Schema) -> Option<&str> {
    schema
        .parameter(CONNECT_PRECISION_FIELD)
        .or_else(|| schema.parameter(PRECISION_FIELD))
}

/// Returns the declared precision of a decimal schema, if present and
/// numeric.
pub fn precision_of(schema: &Schema) -> Option<i32> {
    precision_parameter(schema).and_then(|p| p.parse().ok())
}

pub fn scale_of(schema: &Schema) -> Option<i32> {
    schema.parameter(SCALE_FIELD).and_then(|s| s.parse().ok())
}

/// Parses a decimal from its textual representation.
pub fn parse(s: &str) -> Result<Numeric, DecimalError> {
    let mut cx = Context::<Numeric>::default();
    match cx.parse(s) {
        Ok(n) if n.is_finite() && !cx.status().inexact() => Ok(n),
        _ => Err(DecimalError::InvalidValue(s.to_string())),
    }
}

/// Returns the number of digits in the unscaled coefficient of `n`.
pub fn get_precision(n: &Numeric) -> i32 {
    i32::try_from(n.digits()).unwrap_or(i32::MAX)
}

/// Returns the number of digits to the right of the decimal point, which is
/// negative for values with trailing zeros elided into the exponent.
pub fn get_scale(n: &Numeric) -> i32 {
    -n.exponent()
}

/// Coerces `value` into `DECIMAL(max_precision,max_scale)`.
///
/// Absent values pass through. Values whose integer part needs more digits
/// than `max_precision - max_scale` are rejected. Values whose scale is
/// already within `max_scale` are returned as is; others are rounded half up
/// to `max_scale` digits.
pub fn enforce_precision_scale(
    value: Option<Numeric>,
    max_precision: i32,
    max_scale: i32,
) -> Result<Option<Numeric>, DecimalError> {
    let Some(mut value) = value else {
        return Ok(None);
    };
    validate_parameters(max_precision, max_scale)?;

    let out_of_range = |value: &Numeric| DecimalError::OutOfRange {
        value: value.to_standard_notation_string(),
        precision: max_precision,
        scale: max_scale,
    };

    if !value.is_finite() {
        return Err(out_of_range(&value));
    }
    let integer_digits = |n: &Numeric| get_precision(n).saturating_sub(get_scale(n));
    if integer_digits(&value) > max_precision - max_scale {
        return Err(out_of_range(&value));
    }
    if get_scale(&value) <= max_scale {
        return Ok(Some(value));
    }

    let original = value;
    let mut cx = Context::<Numeric>::default();
    cx.set_rounding(Rounding::HalfUp);
    cx.rescale(&mut value, &Numeric::from(-max_scale));
    // Rounding can carry into a new integer digit, e.g. 99.995 at scale 2.
    if cx.status().invalid_operation() || integer_digits(&value) > max_precision - max_scale {
        return Err(out_of_range(&original));
    }
    Ok(Some(value))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn enforce(s: &str, precision: i32, scale: i32) -> Result<String, DecimalError> {
        let n = parse(s).unwrap();
        enforce_precision_scale(Some(n), precision, scale)
            .map(|n| n.unwrap().to_standard_notation_string())
    }

    #[test]
    fn test_validate_parameters() {
        assert!(validate_parameters(1, 0).is_ok());
        assert!(validate_parameters(6, 6).is_ok());
        assert_eq!(
            validate_parameters(0, 0).unwrap_err().to_string(),
            "DECIMAL precision must be >= 1: DECIMAL(0,0)"
        );
        assert_eq!(
            validate_parameters(6, -1).unwrap_err().to_string(),
            "DECIMAL scale must be >= 0: DECIMAL(6,-1)"
        );
        assert_eq!(
            validate_parameters(2, 3).unwrap_err().to_string(),
            "DECIMAL precision must be >= scale: DECIMAL(2,3)"
        );
    }

    #[test]
    fn test_enforce_precision_scale() {
        assert_eq!(enforce("10.012", 6, 2).unwrap(), "10.01");
        assert_eq!(enforce("10.019", 6, 2).unwrap(), "10.02");
        assert_eq!(enforce("10.015", 6, 2).unwrap(), "10.02");
        assert_eq!(enforce("-10.015", 6, 2).unwrap(), "-10.02");
        assert_eq!(enforce("1.5", 6, 2).unwrap(), "1.5");
        assert_eq!(enforce("0.001", 2, 2).unwrap(), "0.00");
        assert_eq!(
            enforce("12345", 6, 2).unwrap_err().to_string(),
            "Decimal precision/scale for value '12345' does not fit into destination precision/scale: 6,2"
        );
        assert!(matches!(
            enforce("99.995", 4, 2),
            Err(DecimalError::OutOfRange { .. })
        ));
        assert_eq!(enforce_precision_scale(None, 6, 2), Ok(None));
    }

    #[test]
    fn test_enforce_validates_bounds() {
        let n = parse("1").unwrap();
        assert!(matches!(
            enforce_precision_scale(Some(n), 2, 3),
            Err(DecimalError::PrecisionLessThanScale { .. })
        ));
    }

    #[test]
    fn test_schema() {
        let schema = schema(6, 2).unwrap();
        assert!(is_decimal(&schema));
        assert!(schema.is_optional());
        assert_eq!(
            schema.parameters().unwrap(),
            [
                ("precision".to_string(), "6".to_string()),
                ("scale".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(precision_of(&schema), Some(6));
        assert_eq!(scale_of(&schema), Some(2));
        assert!(!is_decimal(&Schema::bytes()));
        assert!(is_decimal(
            &Schema::bytes().with_name(LOGICAL_NAME.to_lowercase())
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse("ten").is_err());
        assert!(parse("NaN").is_err());
    }

    proptest! {
        #[test]
        fn validate_parameters_matches_rules(precision in -5..40i32, scale in -5..40i32) {
            let valid = precision >= 1 && scale >= 0 && precision >= scale;
            prop_assert_eq!(validate_parameters(precision, scale).is_ok(), valid);
        }

        #[test]
        fn enforced_values_fit(unscaled in -10_000_000i64..10_000_000, exp in 0u32..6, scale in 0i32..4) {
            let s = format!("{}E-{}", unscaled, exp);
            let n = parse(&s).unwrap();
            match enforce_precision_scale(Some(n), 8, scale) {
                Ok(Some(out)) => {
                    prop_assert!(get_scale(&out) <= scale);
                    prop_assert!(get_precision(&out) - get_scale(&out) <= 8 - scale);
                }
                Ok(None) => prop_assert!(false, "present value became absent"),
                Err(e) => {
                    let is_out_of_range = matches!(e, DecimalError::OutOfRange { .. });
                    prop_assert!(is_out_of_range)
                }
            }
        }
    }
}
