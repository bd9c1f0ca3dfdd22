// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Topic-level authorization of statements.
//!
//! Before a statement runs, the topics it reads and writes are checked
//! against the ACLs the broker reports for the requesting principal. Checks
//! fail closed: if the broker cannot be asked, access is denied.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use itertools::Itertools;
use moka::sync::Cache;
use rill_catalog::MetaStore;
use rill_sql::ast::{Query, Statement};
use rill_sql::topics;
use rill_sql::ResolutionError;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::AdapterConfig;
use crate::error::AdapterError;

/// The principal name used when a request carries no user.
pub const UNKNOWN_USER: &str = "";

/// An operation that an ACL can grant on a topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AclOperation {
    All,
    Read,
    Write,
    Create,
    Delete,
    Alter,
    Describe,
    ClusterAction,
    DescribeConfigs,
    AlterConfigs,
    IdempotentWrite,
}

impl fmt::Display for AclOperation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            AclOperation::All => "ALL",
            AclOperation::Read => "READ",
            AclOperation::Write => "WRITE",
            AclOperation::Create => "CREATE",
            AclOperation::Delete => "DELETE",
            AclOperation::Alter => "ALTER",
            AclOperation::Describe => "DESCRIBE",
            AclOperation::ClusterAction => "CLUSTER_ACTION",
            AclOperation::DescribeConfigs => "DESCRIBE_CONFIGS",
            AclOperation::AlterConfigs => "ALTER_CONFIGS",
            AclOperation::IdempotentWrite => "IDEMPOTENT_WRITE",
        })
    }
}

/// Broker metadata about one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicDescription {
    pub name: String,
    /// The operations the requesting principal may perform, or `None` if the
    /// broker is too old to report them.
    pub authorized_operations: Option<BTreeSet<AclOperation>>,
}

/// A client for the broker's topic metadata.
pub trait TopicClient: fmt::Debug + Send + Sync {
    fn describe_topic(&self, name: &str) -> Result<TopicDescription, anyhow::Error>;
}

/// The identity a statement executes under.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    user: Option<String>,
    topic_client: Arc<dyn TopicClient>,
}

impl SecurityContext {
    pub fn new(user: Option<String>, topic_client: Arc<dyn TopicClient>) -> SecurityContext {
        SecurityContext { user, topic_client }
    }

    /// The user name, or [`UNKNOWN_USER`] for anonymous requests.
    pub fn principal(&self) -> &str {
        self.user.as_deref().unwrap_or(UNKNOWN_USER)
    }

    pub fn topic_client(&self) -> &dyn TopicClient {
        &*self.topic_client
    }
}

/// Access to a set of topics was denied.
///
/// The message mirrors the broker's own authorization error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Authorization denied to {operation} on topic(s): [{}]", .topics.iter().join(", "))]
pub struct TopicAuthorizationError {
    pub operation: AclOperation,
    pub topics: BTreeSet<String>,
}

/// Checks whether a statement may execute.
pub trait AuthorizationValidator: fmt::Debug + Send + Sync {
    fn check_authorization(
        &self,
        ctx: &SecurityContext,
        catalog: &dyn MetaStore,
        statement: &Statement,
    ) -> Result<(), AdapterError>;
}

/// Returns the validator `config` calls for, if any.
pub fn authorization_validator(config: &AdapterConfig) -> Option<Arc<dyn AuthorizationValidator>> {
    if !config.authorization_enabled {
        return None;
    }
    Some(Arc::new(TopicAuthorizer::new(
        config.auth_cache_expiry(),
        config.auth_cache_max_entries,
    )))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    principal: String,
    topic: String,
    operation: AclOperation,
}

/// Authorizes statements by asking the broker which operations the principal
/// may perform on each topic involved.
///
/// Decisions, including denials caused by broker errors, are cached per
/// principal, topic and operation. Concurrent checks of the same uncached
/// key share a single broker request.
pub struct TopicAuthorizer {
    cache: Cache<CacheKey, bool>,
}

impl fmt::Debug for TopicAuthorizer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("TopicAuthorizer")
            .field("cached_decisions", &self.cache.entry_count())
            .finish()
    }
}

impl TopicAuthorizer {
    pub fn new(expiry: Duration, max_entries: u64) -> TopicAuthorizer {
        TopicAuthorizer {
            cache: Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(expiry)
                .build(),
        }
    }

    /// Returns the number of cached decisions, after applying any pending
    /// evictions.
    pub fn cached_decisions(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Checks that the principal of `ctx` may perform `operation` on the
    /// broker-level topic `topic`.
    pub fn check_topic_access(
        &self,
        ctx: &SecurityContext,
        topic: &str,
        operation: AclOperation,
    ) -> Result<(), TopicAuthorizationError> {
        let key = CacheKey {
            principal: ctx.principal().to_string(),
            topic: topic.to_string(),
            operation,
        };
        if self.cache.get_with(key, || ask_broker(ctx, topic, operation)) {
            Ok(())
        } else {
            debug!(
                principal = ctx.principal(),
                topic,
                %operation,
                "topic access denied"
            );
            Err(TopicAuthorizationError {
                operation,
                topics: BTreeSet::from([topic.to_string()]),
            })
        }
    }

    /// Checks READ access to every topic `query` reads from.
    fn check_query(
        &self,
        ctx: &SecurityContext,
        catalog: &dyn MetaStore,
        query: &Query,
    ) -> Result<(), AdapterError> {
        let source_topics = topics::extract_source_topics(catalog, query)?;
        for topic in source_topics.kafka_topic_names() {
            self.check_topic_access(ctx, topic, AclOperation::Read)?;
        }
        Ok(())
    }

    /// Checks WRITE access to the topic of an existing source.
    fn check_target(
        &self,
        ctx: &SecurityContext,
        catalog: &dyn MetaStore,
        target: &str,
    ) -> Result<(), AdapterError> {
        let source = catalog
            .get_source(target)
            .ok_or_else(|| ResolutionError::UnknownTarget(target.to_string()))?;
        self.check_topic_access(ctx, source.kafka_topic_name(), AclOperation::Write)?;
        Ok(())
    }
}

impl AuthorizationValidator for TopicAuthorizer {
    fn check_authorization(
        &self,
        ctx: &SecurityContext,
        catalog: &dyn MetaStore,
        statement: &Statement,
    ) -> Result<(), AdapterError> {
        match statement {
            Statement::Query(query) => self.check_query(ctx, catalog, query),
            Statement::InsertInto(insert) => {
                self.check_query(ctx, catalog, &insert.query)?;
                self.check_target(ctx, catalog, &insert.target)
            }
            Statement::CreateAsSelect(create) => {
                self.check_query(ctx, catalog, &create.query)?;
                // The sink topic has been provisioned by now, so WRITE is the
                // only permission left to check.
                match &create.properties.kafka_topic {
                    Some(topic) => Ok(self.check_topic_access(ctx, topic, AclOperation::Write)?),
                    None => self.check_target(ctx, catalog, &create.name),
                }
            }
            Statement::PrintTopic(print) => {
                Ok(self.check_topic_access(ctx, &print.topic, AclOperation::Read)?)
            }
            Statement::CreateSource(create) => match &create.properties.kafka_topic {
                Some(topic) => Ok(self.check_topic_access(ctx, topic, AclOperation::Read)?),
                None => Ok(()),
            },
            Statement::DropSource { .. }
            | Statement::ListTopics
            | Statement::ListSources { .. }
            | Statement::TerminateQuery { .. } => Ok(()),
        }
    }
}

/// Asks the broker whether the principal of `ctx` may perform `operation` on
/// `topic`.
fn ask_broker(ctx: &SecurityContext, topic: &str, operation: AclOperation) -> bool {
    match ctx.topic_client().describe_topic(topic) {
        // Brokers that predate authorized-operations reporting leave
        // enforcement to the produce and fetch paths.
        Ok(TopicDescription {
            authorized_operations: None,
            ..
        }) => true,
        Ok(TopicDescription {
            authorized_operations: Some(ops),
            ..
        }) => ops.contains(&operation),
        Err(e) => {
            warn!(
                principal = ctx.principal(),
                topic,
                %operation,
                "failed to describe topic, denying access: {:#}",
                e
            );
            false
        }
    }
}
