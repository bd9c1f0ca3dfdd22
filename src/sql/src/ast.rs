// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! SQL Abstract Syntax Tree (AST) types.

use std::fmt;

use rill_catalog::{DataSourceKind, Format};
use rill_repr::Type;

struct DisplaySeparated<'a, T>
where
    T: fmt::Display,
{
    slice: &'a [T],
    sep: &'static str,
}

impl<'a, T> fmt::Display for DisplaySeparated<'a, T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut delim = "";
        for t in self.slice {
            write!(f, "{}", delim)?;
            delim = self.sep;
            write!(f, "{}", t)?;
        }
        Ok(())
    }
}

fn display_comma_separated<T>(slice: &[T]) -> DisplaySeparated<'_, T>
where
    T: fmt::Display,
{
    DisplaySeparated { slice, sep: ", " }
}

/// A top-level statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    /// `SELECT`
    Query(Query),
    /// `INSERT INTO ... SELECT`
    InsertInto(InsertInto),
    /// `CREATE STREAM|TABLE ... AS SELECT`
    CreateAsSelect(CreateAsSelect),
    /// `CREATE STREAM|TABLE ... WITH (...)`
    CreateSource(CreateSource),
    /// `PRINT`
    PrintTopic(PrintTopic),
    /// `DROP STREAM|TABLE`
    DropSource {
        kind: DataSourceKind,
        name: String,
        if_exists: bool,
        delete_topic: bool,
    },
    /// `SHOW TOPICS`
    ListTopics,
    /// `SHOW STREAMS` / `SHOW TABLES`
    ListSources { kind: DataSourceKind },
    /// `TERMINATE`
    TerminateQuery { query_id: String },
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Statement::Query(query) => write!(f, "{}", query),
            Statement::InsertInto(insert) => write!(f, "{}", insert),
            Statement::CreateAsSelect(create) => write!(f, "{}", create),
            Statement::CreateSource(create) => write!(f, "{}", create),
            Statement::PrintTopic(print) => write!(f, "{}", print),
            Statement::DropSource {
                kind,
                name,
                if_exists,
                delete_topic,
            } => {
                write!(f, "DROP {} ", kind)?;
                if *if_exists {
                    write!(f, "IF EXISTS ")?;
                }
                write!(f, "{}", name)?;
                if *delete_topic {
                    write!(f, " DELETE TOPIC")?;
                }
                Ok(())
            }
            Statement::ListTopics => write!(f, "SHOW TOPICS"),
            Statement::ListSources { kind } => write!(f, "SHOW {}S", kind),
            Statement::TerminateQuery { query_id } => write!(f, "TERMINATE {}", query_id),
        }
    }
}

/// A possibly source-qualified column reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub source: Option<String>,
    pub column: String,
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{}.", source)?;
        }
        write!(f, "{}", self.column)
    }
}

/// One item of the comma-separated list following `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SelectItem {
    /// `*`
    Wildcard,
    Column {
        column: ColumnRef,
        alias: Option<String>,
    },
}

impl fmt::Display for SelectItem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SelectItem::Wildcard => write!(f, "*"),
            SelectItem::Column {
                column,
                alias: Some(alias),
            } => write!(f, "{} AS {}", column, alias),
            SelectItem::Column {
                column,
                alias: None,
            } => write!(f, "{}", column),
        }
    }
}

/// A `SELECT` query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query {
    pub projection: Vec<SelectItem>,
    pub from: Relation,
    pub limit: Option<u64>,
}

impl Query {
    /// Constructs `SELECT * FROM <from>`.
    pub fn select_star(from: Relation) -> Query {
        Query {
            projection: vec![SelectItem::Wildcard],
            from,
            limit: None,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "SELECT {} FROM {}",
            display_comma_separated(&self.projection),
            self.from
        )?;
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

/// A relation in a `FROM` clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Relation {
    Aliased(AliasedRelation),
    Join(Box<Join>),
}

impl Relation {
    /// References the source `name` without an alias.
    pub fn named(name: impl Into<String>) -> Relation {
        Relation::Aliased(AliasedRelation {
            name: name.into(),
            alias: None,
        })
    }

    /// Joins `self` with `right`.
    pub fn join(self, kind: JoinKind, right: Relation, criteria: Option<JoinCriteria>) -> Relation {
        Relation::Join(Box::new(Join {
            kind,
            left: self,
            right,
            criteria,
        }))
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Relation::Aliased(relation) => write!(f, "{}", relation),
            Relation::Join(join) => write!(f, "{}", join),
        }
    }
}

/// A reference to a catalog source, optionally renamed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliasedRelation {
    pub name: String,
    pub alias: Option<String>,
}

impl fmt::Display for AliasedRelation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(alias) = &self.alias {
            write!(f, " {}", alias)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
    Outer,
}

/// An equi-join condition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JoinCriteria {
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Join {
    pub kind: JoinKind,
    pub left: Relation,
    pub right: Relation,
    pub criteria: Option<JoinCriteria>,
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let op = match self.kind {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
            JoinKind::Outer => "FULL OUTER JOIN",
        };
        write!(f, "{} {} {}", self.left, op, self.right)?;
        if let Some(criteria) = &self.criteria {
            write!(f, " ON {} = {}", criteria.left, criteria.right)?;
        }
        Ok(())
    }
}

/// The `WITH (...)` options of statements that create sources.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceProperties {
    pub kafka_topic: Option<String>,
    pub value_format: Option<Format>,
    pub key: Option<String>,
    pub timestamp: Option<String>,
    pub partitions: Option<u32>,
    pub replicas: Option<u16>,
}

impl SourceProperties {
    pub fn is_empty(&self) -> bool {
        *self == SourceProperties::default()
    }
}

impl fmt::Display for SourceProperties {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut options = vec![];
        if let Some(topic) = &self.kafka_topic {
            options.push(format!("KAFKA_TOPIC='{}'", topic));
        }
        if let Some(format) = &self.value_format {
            options.push(format!("VALUE_FORMAT='{}'", format));
        }
        if let Some(key) = &self.key {
            options.push(format!("KEY='{}'", key));
        }
        if let Some(timestamp) = &self.timestamp {
            options.push(format!("TIMESTAMP='{}'", timestamp));
        }
        if let Some(partitions) = self.partitions {
            options.push(format!("PARTITIONS={}", partitions));
        }
        if let Some(replicas) = self.replicas {
            options.push(format!("REPLICAS={}", replicas));
        }
        write!(f, "WITH ({})", display_comma_separated(&options))
    }
}

/// `INSERT INTO <target> <query>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertInto {
    pub target: String,
    pub query: Query,
}

impl fmt::Display for InsertInto {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "INSERT INTO {} {}", self.target, self.query)
    }
}

/// `CREATE STREAM|TABLE <name> [WITH (...)] AS <query>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateAsSelect {
    pub kind: DataSourceKind,
    pub name: String,
    pub query: Query,
    pub properties: SourceProperties,
}

impl fmt::Display for CreateAsSelect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CREATE {} {} ", self.kind, self.name)?;
        if !self.properties.is_empty() {
            write!(f, "{} ", self.properties)?;
        }
        write!(f, "AS {}", self.query)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub typ: Type,
}

impl fmt::Display for ColumnDef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.name, self.typ)
    }
}

/// `CREATE STREAM|TABLE [IF NOT EXISTS] <name> (<columns>) WITH (...)`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateSource {
    pub kind: DataSourceKind,
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub if_not_exists: bool,
    pub properties: SourceProperties,
}

impl fmt::Display for CreateSource {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "CREATE {} ", self.kind)?;
        if self.if_not_exists {
            write!(f, "IF NOT EXISTS ")?;
        }
        write!(f, "{} ", self.name)?;
        if !self.columns.is_empty() {
            write!(f, "({}) ", display_comma_separated(&self.columns))?;
        }
        write!(f, "{}", self.properties)
    }
}

/// `PRINT <topic> [FROM BEGINNING] [INTERVAL <n>] [LIMIT <n>]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintTopic {
    /// The broker-level name of the topic to print.
    pub topic: String,
    pub from_beginning: bool,
    pub interval: Option<u32>,
    pub limit: Option<u32>,
}

impl fmt::Display for PrintTopic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "PRINT '{}'", self.topic)?;
        if self.from_beginning {
            write!(f, " FROM BEGINNING")?;
        }
        if let Some(interval) = self.interval {
            write!(f, " INTERVAL {}", interval)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " LIMIT {}", limit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rill_repr::PrimitiveType;

    use super::*;

    #[test]
    fn test_display() {
        let query = Query {
            projection: vec![
                SelectItem::Column {
                    column: ColumnRef {
                        source: Some("O".into()),
                        column: "ID".into(),
                    },
                    alias: Some("ORDER_ID".into()),
                },
                SelectItem::Wildcard,
            ],
            from: Relation::Aliased(AliasedRelation {
                name: "ORDERS".into(),
                alias: Some("O".into()),
            })
            .join(
                JoinKind::Left,
                Relation::named("USERS"),
                Some(JoinCriteria {
                    left: ColumnRef {
                        source: Some("O".into()),
                        column: "USERID".into(),
                    },
                    right: ColumnRef {
                        source: Some("USERS".into()),
                        column: "USERID".into(),
                    },
                }),
            ),
            limit: Some(10),
        };
        assert_eq!(
            query.to_string(),
            "SELECT O.ID AS ORDER_ID, * FROM ORDERS O LEFT JOIN USERS ON O.USERID = USERS.USERID LIMIT 10"
        );

        let create = Statement::CreateAsSelect(CreateAsSelect {
            kind: DataSourceKind::Stream,
            name: "ENRICHED".into(),
            query: Query::select_star(Relation::named("ORDERS")),
            properties: SourceProperties {
                kafka_topic: Some("enriched".into()),
                partitions: Some(4),
                ..Default::default()
            },
        });
        assert_eq!(
            create.to_string(),
            "CREATE STREAM ENRICHED WITH (KAFKA_TOPIC='enriched', PARTITIONS=4) AS SELECT * FROM ORDERS"
        );

        let source = Statement::CreateSource(CreateSource {
            kind: DataSourceKind::Table,
            name: "USERS".into(),
            columns: vec![ColumnDef {
                name: "USERID".into(),
                typ: PrimitiveType::STRING.into(),
            }],
            if_not_exists: true,
            properties: SourceProperties {
                kafka_topic: Some("users".into()),
                value_format: Some(Format::Json),
                ..Default::default()
            },
        });
        assert_eq!(
            source.to_string(),
            "CREATE TABLE IF NOT EXISTS USERS (USERID VARCHAR) WITH (KAFKA_TOPIC='users', VALUE_FORMAT='JSON')"
        );

        assert_eq!(
            Statement::ListSources {
                kind: DataSourceKind::Table
            }
            .to_string(),
            "SHOW TABLES"
        );
    }
}
