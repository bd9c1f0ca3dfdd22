// Copyright Materialize, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::source::{DataSource, Topic};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error(
        "Cannot add the new data source. Another data source with the same name already exists: {0}"
    )]
    SourceAlreadyExists(String),
}

/// Read access to the catalog.
pub trait MetaStore: Send + Sync {
    /// Looks up a source by name.
    fn get_source(&self, name: &str) -> Option<Arc<DataSource>>;

    /// Looks up a topic by its catalog name.
    fn get_topic(&self, name: &str) -> Option<Topic>;

    /// Looks up the source most recently registered against the named topic.
    fn get_source_for_topic(&self, topic_name: &str) -> Option<Arc<DataSource>>;
}

/// Write access to the catalog.
pub trait MutableMetaStore: MetaStore {
    fn put_source(&self, source: DataSource) -> Result<(), CatalogError>;

    /// Removes the named source, returning it if it was present.
    fn delete_source(&self, name: &str) -> Option<Arc<DataSource>>;

    /// Registers `topic`, replacing any topic of the same name.
    fn put_topic(&self, topic: Topic);

    fn delete_topic(&self, name: &str) -> Option<Topic>;

    /// Registers `source` together with its topic.
    ///
    /// A duplicate source name fails before the catalog is changed.
    fn register_source(&self, source: DataSource) -> Result<Arc<DataSource>, CatalogError>;

    /// Removes the named source, and its topic if no remaining source uses
    /// that topic.
    fn remove_source(&self, name: &str) -> Option<Arc<DataSource>>;
}

#[derive(Debug, Default)]
struct CatalogState {
    sources: BTreeMap<String, Arc<DataSource>>,
    topics: BTreeMap<String, Topic>,
    /// Topic name to the name of the source last registered against it.
    sources_by_topic: BTreeMap<String, String>,
}

impl CatalogState {
    fn remove_source(&mut self, name: &str) -> Option<Arc<DataSource>> {
        let source = self.sources.remove(name)?;
        // A later registration may have claimed the topic.
        if self.sources_by_topic.get(&source.topic.name).map(String::as_str) == Some(name) {
            self.sources_by_topic.remove(&source.topic.name);
        }
        Some(source)
    }
}

/// An in-memory catalog.
///
/// All state lives behind a single lock, so a reader never observes a source
/// that is present in one index but absent from another.
#[derive(Debug, Default)]
pub struct Catalog {
    state: RwLock<CatalogState>,
}

impl Catalog {
    pub fn new() -> Catalog {
        Catalog::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CatalogState> {
        self.state.read().expect("lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write().expect("lock poisoned")
    }

    /// Returns all sources, ordered by name.
    pub fn list_sources(&self) -> Vec<Arc<DataSource>> {
        self.read().sources.values().cloned().collect()
    }

    /// Returns all topics, ordered by name.
    pub fn list_topics(&self) -> Vec<Topic> {
        self.read().topics.values().cloned().collect()
    }
}

impl MetaStore for Catalog {
    fn get_source(&self, name: &str) -> Option<Arc<DataSource>> {
        self.read().sources.get(name).cloned()
    }

    fn get_topic(&self, name: &str) -> Option<Topic> {
        self.read().topics.get(name).cloned()
    }

    fn get_source_for_topic(&self, topic_name: &str) -> Option<Arc<DataSource>> {
        let state = self.read();
        state
            .sources_by_topic
            .get(topic_name)
            .and_then(|name| state.sources.get(name))
            .cloned()
    }
}

impl MutableMetaStore for Catalog {
    fn put_source(&self, source: DataSource) -> Result<(), CatalogError> {
        let mut state = self.write();
        if state.sources.contains_key(&source.name) {
            return Err(CatalogError::SourceAlreadyExists(source.name));
        }
        debug!(source = %source.name, topic = %source.topic.name, "registering source");
        state
            .sources_by_topic
            .insert(source.topic.name.clone(), source.name.clone());
        state.sources.insert(source.name.clone(), Arc::new(source));
        Ok(())
    }

    fn delete_source(&self, name: &str) -> Option<Arc<DataSource>> {
        let source = self.write().remove_source(name)?;
        debug!(source = %name, "deleted source");
        Some(source)
    }

    fn put_topic(&self, topic: Topic) {
        self.write().topics.insert(topic.name.clone(), topic);
    }

    fn delete_topic(&self, name: &str) -> Option<Topic> {
        self.write().topics.remove(name)
    }

    fn register_source(&self, source: DataSource) -> Result<Arc<DataSource>, CatalogError> {
        let mut state = self.write();
        if state.sources.contains_key(&source.name) {
            return Err(CatalogError::SourceAlreadyExists(source.name));
        }
        debug!(source = %source.name, topic = %source.topic.name, "registering source and topic");
        state
            .topics
            .insert(source.topic.name.clone(), source.topic.clone());
        state
            .sources_by_topic
            .insert(source.topic.name.clone(), source.name.clone());
        let source = Arc::new(source);
        state
            .sources
            .insert(source.name.clone(), Arc::clone(&source));
        Ok(source)
    }

    fn remove_source(&self, name: &str) -> Option<Arc<DataSource>> {
        let mut state = self.write();
        let source = state.remove_source(name)?;
        let topic = &source.topic.name;
        if !state.sources.values().any(|s| &s.topic.name == topic) {
            state.topics.remove(topic);
        }
        debug!(source = %name, topic = %topic, "removed source");
        Some(source)
    }
}

#[cfg(test)]
mod tests {
    use rill_repr::{PrimitiveType, StructType};

    use super::*;
    use crate::source::{DataSourceKind, Format};

    fn source(name: &str, topic: &str) -> DataSource {
        DataSource::new(
            name,
            DataSourceKind::Stream,
            StructType::empty().with_field("ID", PrimitiveType::BIGINT),
            Topic::new(topic, topic.to_lowercase(), Format::Json),
        )
    }

    #[test]
    fn test_put_get_delete_source() {
        let catalog = Catalog::new();
        let s = source("ORDERS", "ORDERS_TOPIC");
        catalog.put_source(s.clone()).unwrap();
        assert_eq!(catalog.get_source("ORDERS").as_deref(), Some(&s));
        assert_eq!(
            catalog.get_source_for_topic("ORDERS_TOPIC").as_deref(),
            Some(&s)
        );

        assert_eq!(catalog.delete_source("ORDERS").as_deref(), Some(&s));
        assert_eq!(catalog.get_source("ORDERS"), None);
        assert_eq!(catalog.get_source_for_topic("ORDERS_TOPIC"), None);
        assert_eq!(catalog.delete_source("ORDERS"), None);
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let catalog = Catalog::new();
        catalog.put_source(source("A", "T")).unwrap();
        assert_eq!(
            catalog.put_source(source("A", "U")),
            Err(CatalogError::SourceAlreadyExists("A".into()))
        );
        assert_eq!(catalog.get_source("A").unwrap().topic.name, "T");
    }

    #[test]
    fn test_topic_index_last_writer_wins() {
        let catalog = Catalog::new();
        catalog.put_source(source("A", "T")).unwrap();
        catalog.put_source(source("B", "T")).unwrap();
        assert_eq!(catalog.get_source_for_topic("T").unwrap().name, "B");

        // Deleting the displaced source leaves the newer mapping intact.
        catalog.delete_source("A");
        assert_eq!(catalog.get_source_for_topic("T").unwrap().name, "B");
        catalog.delete_source("B");
        assert_eq!(catalog.get_source_for_topic("T"), None);
    }

    #[test]
    fn test_register_source_adds_topic() {
        let catalog = Catalog::new();
        let s = source("ORDERS", "ORDERS");
        let registered = catalog.register_source(s.clone()).unwrap();
        assert_eq!(*registered, s);
        assert_eq!(catalog.get_topic("ORDERS"), Some(s.topic.clone()));
        assert_eq!(catalog.get_source_for_topic("ORDERS").as_deref(), Some(&s));
    }

    #[test]
    fn test_register_duplicate_changes_nothing() {
        let catalog = Catalog::new();
        catalog.register_source(source("ORDERS", "ORDERS")).unwrap();

        let mut replacement = source("ORDERS", "ORDERS");
        replacement.topic = Topic::new("ORDERS", "other_topic", Format::Avro);
        assert_eq!(
            catalog.register_source(replacement),
            Err(CatalogError::SourceAlreadyExists("ORDERS".into()))
        );

        let topic = catalog.get_topic("ORDERS").unwrap();
        assert_eq!(topic.kafka_topic_name, "orders");
        assert_eq!(topic.format, Format::Json);
        assert_eq!(catalog.get_source("ORDERS").unwrap().topic, topic);
    }

    #[test]
    fn test_remove_source_keeps_shared_topic() {
        let catalog = Catalog::new();
        catalog.register_source(source("A", "T")).unwrap();
        catalog.register_source(source("B", "T")).unwrap();

        assert_eq!(catalog.remove_source("B").unwrap().name, "B");
        assert!(catalog.get_topic("T").is_some());
        assert_eq!(catalog.remove_source("A").unwrap().name, "A");
        assert_eq!(catalog.get_topic("T"), None);
        assert_eq!(catalog.get_source_for_topic("T"), None);
        assert_eq!(catalog.remove_source("A"), None);
    }

    #[test]
    fn test_topics() {
        let catalog = Catalog::new();
        let topic = Topic::new("PAGEVIEWS", "pageviews", Format::Avro).compacted();
        catalog.put_topic(topic.clone());
        assert_eq!(catalog.get_topic("PAGEVIEWS"), Some(topic.clone()));
        assert_eq!(catalog.get_topic("pageviews"), None);
        assert_eq!(catalog.list_topics(), vec![topic.clone()]);
        assert_eq!(catalog.delete_topic("PAGEVIEWS"), Some(topic));
        assert_eq!(catalog.get_topic("PAGEVIEWS"), None);
    }
}
