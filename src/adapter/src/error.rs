// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use rill_catalog::CatalogError;
use rill_interchange::avro::AvroSchemaError;
use rill_interchange::connect::TranslateError;
use rill_interchange::entity::EntityError;
use rill_repr::adt::decimal::DecimalError;
use rill_repr::TypeError;
use rill_sql::ResolutionError;

use crate::authz::TopicAuthorizationError;

/// Errors that can occur while admitting or planning a statement.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error(transparent)]
    Authorization(#[from] TopicAuthorizationError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Translation(#[from] TranslateError),
    #[error(transparent)]
    Avro(#[from] AvroSchemaError),
    #[error(transparent)]
    Entity(#[from] EntityError),
    #[error(transparent)]
    Decimal(#[from] DecimalError),
    #[error(transparent)]
    Type(#[from] TypeError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error("missing required property: {0}")]
    MissingProperty(&'static str),
    #[error("{0} has no columns and no schema was supplied")]
    MissingSchema(String),
    #[error("column {column} does not exist in {source_name}")]
    UnknownColumn { source_name: String, column: String },
}

impl AdapterError {
    /// Reports whether the error is an access denial rather than a failure.
    pub fn is_authorization_denied(&self) -> bool {
        matches!(self, AdapterError::Authorization(_))
    }
}
