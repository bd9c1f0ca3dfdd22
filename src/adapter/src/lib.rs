// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Statement admission and result delivery.
//!
//! The adapter sits between clients and the catalog. It authorizes
//! statements against topic ACLs, registers and removes sources, and hands
//! out the queues through which transient query results reach clients.

#![warn(missing_debug_implementations)]

use std::sync::Arc;

use rill_catalog::{
    Catalog, CatalogError, DataSource, Format, MetaStore, MutableMetaStore, TimestampPolicy,
    Topic,
};
use rill_interchange::entity::{self, FieldInfo};
use rill_interchange::{avro, connect};
use rill_repr::StructType;
use rill_sql::ast::{CreateSource, Statement};
use rill_sql::ResolutionError;
use tracing::info;

pub mod authz;
pub mod config;
pub mod error;
pub mod queue;

pub use crate::authz::{AuthorizationValidator, SecurityContext};
pub use crate::config::AdapterConfig;
pub use crate::error::AdapterError;
pub use crate::queue::{QueryId, TransientQueryQueue};

/// The state shared by every statement a server executes.
#[derive(Debug, Clone)]
pub struct ServerContext {
    catalog: Arc<Catalog>,
    config: AdapterConfig,
    authorizer: Option<Arc<dyn AuthorizationValidator>>,
}

impl ServerContext {
    pub fn new(config: AdapterConfig) -> ServerContext {
        ServerContext::with_catalog(config, Arc::new(Catalog::new()))
    }

    pub fn with_catalog(config: AdapterConfig, catalog: Arc<Catalog>) -> ServerContext {
        let authorizer = authz::authorization_validator(&config);
        ServerContext {
            catalog,
            config,
            authorizer,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    /// Checks that `ctx` may execute `statement`.
    ///
    /// Always succeeds when authorization is disabled.
    pub fn validate_statement(
        &self,
        ctx: &SecurityContext,
        statement: &Statement,
    ) -> Result<(), AdapterError> {
        match &self.authorizer {
            Some(authorizer) => authorizer.check_authorization(ctx, &*self.catalog, statement),
            None => Ok(()),
        }
    }

    /// Registers the stream or table that `stmt` declares.
    ///
    /// Columns come from the statement when it lists any, and otherwise from
    /// `registry_schema`, the Avro value schema registered for the topic.
    /// Returns `None` if the source already existed and `stmt` says
    /// `IF NOT EXISTS`.
    pub fn create_source(
        &self,
        stmt: &CreateSource,
        registry_schema: Option<&str>,
    ) -> Result<Option<Arc<DataSource>>, AdapterError> {
        if stmt.if_not_exists && self.catalog.get_source(&stmt.name).is_some() {
            info!(source = %stmt.name, "source already exists, skipping");
            return Ok(None);
        }
        let kafka_topic = stmt
            .properties
            .kafka_topic
            .as_deref()
            .ok_or(AdapterError::MissingProperty("KAFKA_TOPIC"))?;
        let format = stmt.properties.value_format.unwrap_or(Format::Json);

        let schema = if !stmt.columns.is_empty() {
            stmt.columns
                .iter()
                .fold(StructType::empty(), |schema, column| {
                    schema.with_field(column.name.clone(), column.typ.clone())
                })
        } else {
            match (format, registry_schema) {
                (Format::Avro, Some(registry_schema)) => {
                    avro::translate_value_schema(registry_schema)?
                }
                _ => return Err(AdapterError::MissingSchema(stmt.name.clone())),
            }
        };

        let check_column = |column: &String| match schema.field(column) {
            Some(_) => Ok(column.clone()),
            None => Err(AdapterError::UnknownColumn {
                source_name: stmt.name.clone(),
                column: column.clone(),
            }),
        };
        let key_field = stmt.properties.key.as_ref().map(&check_column).transpose()?;
        let timestamp_policy = match &stmt.properties.timestamp {
            Some(column) => TimestampPolicy::Column {
                column: check_column(column)?,
                format: None,
            },
            None => TimestampPolicy::Metadata,
        };

        let topic = Topic::new(stmt.name.clone(), kafka_topic, format);
        let source = DataSource {
            key_field,
            timestamp_policy,
            sql: stmt.to_string(),
            ..DataSource::new(stmt.name.clone(), stmt.kind, schema, topic)
        };
        match self.catalog.register_source(source) {
            Ok(source) => {
                info!(source = %stmt.name, kind = %stmt.kind, kafka_topic, "created source");
                Ok(Some(source))
            }
            // Lost a race with a concurrent create of the same name.
            Err(CatalogError::SourceAlreadyExists(_)) if stmt.if_not_exists => {
                info!(source = %stmt.name, "source already exists, skipping");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Removes the named source, and its topic if no other source uses it.
    ///
    /// Dropping a missing source is an error unless `if_exists` is set.
    pub fn drop_source(&self, name: &str, if_exists: bool) -> Result<(), AdapterError> {
        match self.catalog.remove_source(name) {
            Some(_) => {
                info!(source = %name, "dropped source");
                Ok(())
            }
            None if if_exists => Ok(()),
            None => Err(ResolutionError::UnknownSource(name.to_string()).into()),
        }
    }

    /// Describes the columns of the named source.
    pub fn describe_source(&self, name: &str) -> Result<Vec<FieldInfo>, AdapterError> {
        let source = self
            .catalog
            .get_source(name)
            .ok_or_else(|| ResolutionError::UnknownSource(name.to_string()))?;
        let schema = connect::from_sql_schema(&source.schema)?;
        Ok(entity::build_source_schema_entity(&schema)?)
    }

    /// Constructs the result queue for a new transient query.
    pub fn new_transient_queue(&self, limit: Option<usize>) -> TransientQueryQueue {
        TransientQueryQueue::with_capacity(
            limit,
            self.config.queue_capacity,
            self.config.queue_offer_timeout(),
        )
        .with_query_id(QueryId::transient())
    }
}
