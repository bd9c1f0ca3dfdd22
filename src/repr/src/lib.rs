// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Fundamental data representation.
//!
//! This module contains the types for representing data in Rill that all
//! layers of the stack can understand. Think of it as the _lingua franca_:
//! individual layers may use different representations internally, but they
//! all agree to use this representation at their boundaries.
//!
//! * The core value type is the [`Datum`] enum, and rows are [`Row`]s.
//! * The SQL type of a datum is described by [`Type`], whose leaves are
//!   [`PrimitiveType`]s.
//! * The structured schemas exchanged with the serialization layer are
//!   described by [`Schema`].

#![warn(missing_debug_implementations)]

pub mod adt;
pub mod row;
pub mod scalar;
pub mod schema;

pub use crate::row::{Datum, Row};
pub use crate::scalar::{Field, PrimitiveType, SqlType, StructType, Type, TypeError};
pub use crate::schema::{Schema, SchemaField, SchemaKind};
