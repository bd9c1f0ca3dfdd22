// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Translations between Rill's type model and the schema formats spoken by
//! the log store's converters and schema registry.

#![warn(missing_debug_implementations)]

pub mod avro;
pub mod connect;
pub mod entity;
