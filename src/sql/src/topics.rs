// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Discovery of the topics a query reads from.

use std::collections::BTreeSet;

use rill_catalog::{MetaStore, Topic};

use crate::ast::{Query, Relation};
use crate::ResolutionError;

/// The topics underlying the sources of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTopics {
    /// The topic of the first source in the `FROM` clause, reading joins left
    /// to right. Sinks created from the query default to its placement.
    pub primary: Topic,
    pub topics: BTreeSet<Topic>,
}

impl SourceTopics {
    /// The broker-level names of all source topics.
    pub fn kafka_topic_names(&self) -> BTreeSet<&str> {
        self.topics
            .iter()
            .map(|t| t.kafka_topic_name.as_str())
            .collect()
    }
}

/// Resolves every source named in `query` against `catalog`.
///
/// Fails on the first name that does not resolve.
pub fn extract_source_topics(
    catalog: &dyn MetaStore,
    query: &Query,
) -> Result<SourceTopics, ResolutionError> {
    let mut topics = BTreeSet::new();
    let primary = visit_relation(catalog, &query.from, &mut topics)?;
    Ok(SourceTopics { primary, topics })
}

/// Adds the topics of the sources under `relation` to `topics`, returning the
/// topic of the leftmost one.
fn visit_relation(
    catalog: &dyn MetaStore,
    relation: &Relation,
    topics: &mut BTreeSet<Topic>,
) -> Result<Topic, ResolutionError> {
    match relation {
        Relation::Aliased(relation) => {
            let source = catalog
                .get_source(&relation.name)
                .ok_or_else(|| ResolutionError::UnknownSource(relation.name.clone()))?;
            topics.insert(source.topic.clone());
            Ok(source.topic.clone())
        }
        Relation::Join(join) => {
            let primary = visit_relation(catalog, &join.left, topics)?;
            visit_relation(catalog, &join.right, topics)?;
            Ok(primary)
        }
    }
}
