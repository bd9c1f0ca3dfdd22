// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::fmt;

use rill_repr::StructType;
use serde::{Deserialize, Serialize};

/// The serialization format of a topic's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Format {
    Json,
    Avro,
    Delimited,
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Format::Json => "JSON",
            Format::Avro => "AVRO",
            Format::Delimited => "DELIMITED",
        })
    }
}

/// A topic registered with the catalog.
///
/// `name` is the catalog's name for the topic, while `kafka_topic_name` is
/// the name of the log the broker knows it by. Authorization is always
/// checked against the latter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Topic {
    pub name: String,
    pub kafka_topic_name: String,
    pub format: Format,
    /// Whether the log retains only the latest value per key.
    pub compacted: bool,
}

impl Topic {
    pub fn new(
        name: impl Into<String>,
        kafka_topic_name: impl Into<String>,
        format: Format,
    ) -> Topic {
        Topic {
            name: name.into(),
            kafka_topic_name: kafka_topic_name.into(),
            format,
            compacted: false,
        }
    }

    pub fn compacted(mut self) -> Topic {
        self.compacted = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataSourceKind {
    Stream,
    Table,
}

impl fmt::Display for DataSourceKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataSourceKind::Stream => f.write_str("STREAM"),
            DataSourceKind::Table => f.write_str("TABLE"),
        }
    }
}

/// How event time is assigned to the rows of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampPolicy {
    /// Use the timestamp the log store attached to the record.
    Metadata,
    /// Read event time from a column, optionally parsing it with a format
    /// string.
    Column {
        column: String,
        format: Option<String>,
    },
}

/// A named stream or table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSource {
    pub name: String,
    pub kind: DataSourceKind,
    pub schema: StructType,
    pub key_field: Option<String>,
    pub timestamp_policy: TimestampPolicy,
    pub topic: Topic,
    /// The statement that created the source.
    pub sql: String,
}

impl DataSource {
    /// Constructs a source with no key field, metadata timestamps and an
    /// empty creation statement.
    pub fn new(
        name: impl Into<String>,
        kind: DataSourceKind,
        schema: StructType,
        topic: Topic,
    ) -> DataSource {
        DataSource {
            name: name.into(),
            kind,
            schema,
            key_field: None,
            timestamp_policy: TimestampPolicy::Metadata,
            topic,
            sql: String::new(),
        }
    }

    /// The name of the broker-level topic backing this source.
    pub fn kafka_topic_name(&self) -> &str {
        &self.topic.kafka_topic_name
    }
}
