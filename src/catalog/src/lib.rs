// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! The catalog of streams, tables and the topics that back them.

#![warn(missing_debug_implementations)]

mod catalog;
mod source;

pub use crate::catalog::{Catalog, CatalogError, MetaStore, MutableMetaStore};
pub use crate::source::{DataSource, DataSourceKind, Format, TimestampPolicy, Topic};
