// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! SQL statements and their resolution against the catalog.
//!
//! Only the parts of the statement tree that name catalog objects are
//! modeled; expressions are carried as already-resolved column references.

#![warn(missing_debug_implementations)]

pub mod ast;
pub mod topics;

/// An error resolving a name against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("{0} does not exist.")]
    UnknownSource(String),
    #[error("Cannot validate for topic access from an unknown stream/table: {0}")]
    UnknownTarget(String),
}
