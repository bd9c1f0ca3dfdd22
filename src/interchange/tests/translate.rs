// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use rill_interchange::avro::build_row_schema;
use rill_interchange::connect::{from_sql_schema, from_sql_type, to_sql_schema, to_sql_type};
use rill_repr::adt::decimal;
use rill_repr::{PrimitiveType, Schema, SchemaKind, StructType, Type};
use serde_json::json;

fn kinds(schema: &Schema) -> Vec<SchemaKind> {
    schema.fields().iter().map(|f| f.schema.kind()).collect()
}

#[test]
fn test_external_round_trip() {
    let external = Schema::structure([
        ("ID", Schema::int64()),
        ("QTY", Schema::int32().optional()),
        ("RATIO", Schema::float64()),
        ("NAME", Schema::string()),
        ("ACTIVE", Schema::boolean()),
        ("PRICE", decimal::schema(12, 3).unwrap()),
        ("HISTORY", Schema::array(Schema::float64())),
        ("ATTRS", Schema::map(Schema::string(), Schema::int64())),
        (
            "ADDRESS",
            Schema::structure([("CITY", Schema::string()), ("ZIP", Schema::int32())]),
        ),
    ]);

    let internal = to_sql_schema(&external).unwrap();
    let round_tripped = from_sql_schema(&internal).unwrap();

    assert_eq!(round_tripped.fields().len(), external.fields().len());
    let names: Vec<_> = round_tripped.fields().iter().map(|f| &f.name).collect();
    let expected: Vec<_> = external.fields().iter().map(|f| &f.name).collect();
    assert_eq!(names, expected);
    assert_eq!(kinds(&round_tripped), kinds(&external));

    let price = &round_tripped.field("PRICE").unwrap().schema;
    assert_eq!(decimal::precision_of(price), Some(12));
    assert_eq!(decimal::scale_of(price), Some(3));

    let address = &round_tripped.field("ADDRESS").unwrap().schema;
    assert_eq!(kinds(address), [SchemaKind::String, SchemaKind::Int32]);
}

#[test]
fn test_internal_round_trip() {
    let internal = StructType::empty()
        .with_field("A", PrimitiveType::BOOLEAN)
        .with_field("B", Type::decimal(1, 0).unwrap())
        .with_field(
            "C",
            Type::map(
                PrimitiveType::decimal(5, 5).unwrap(),
                Type::array(Type::Struct(
                    StructType::empty().with_field("D", PrimitiveType::DOUBLE),
                )),
            ),
        );
    let external = from_sql_schema(&internal).unwrap();
    assert_eq!(to_sql_schema(&external).unwrap(), internal);

    for field in internal.iter() {
        let schema = from_sql_type(&field.typ).unwrap();
        assert!(schema.is_optional());
        assert_eq!(to_sql_type(&schema).unwrap(), field.typ);
    }
}

#[test]
fn test_unsupported_field_is_dropped() {
    let external = Schema::structure([
        ("first", Schema::string()),
        ("blob", Schema::bytes()),
        ("second", Schema::int64()),
        ("bad_map", Schema::map(Schema::float32(), Schema::string())),
    ]);
    let internal = to_sql_schema(&external).unwrap();
    assert_eq!(
        internal,
        StructType::empty()
            .with_field("FIRST", PrimitiveType::STRING)
            .with_field("SECOND", PrimitiveType::BIGINT)
    );
}

#[test]
fn test_nested_unsupported_field_is_dropped() {
    let external = Schema::structure([(
        "outer",
        Schema::array(Schema::structure([
            ("keep", Schema::boolean()),
            ("drop", Schema::bytes()),
        ])),
    )]);
    let internal = to_sql_schema(&external).unwrap();
    assert_eq!(internal.to_string(), "STRUCT<OUTER ARRAY<STRUCT<KEEP BOOLEAN>>>");
}

#[test]
fn test_non_string_map_key_reaches_avro() {
    let external = Schema::structure([("attrs", Schema::map(Schema::int64(), Schema::string()))]);
    let internal = to_sql_schema(&external).unwrap();
    assert_eq!(internal.to_string(), "STRUCT<ATTRS MAP<BIGINT,VARCHAR>>");

    let avro = build_row_schema(&internal, "events").unwrap();
    assert_eq!(
        avro["fields"][0],
        json!({
            "name": "ATTRS",
            "type": ["null", {"type": "map", "values": ["null", "string"]}],
            "default": null,
        })
    );
}
