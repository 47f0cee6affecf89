//! Graph fixtures seeded identically into both store implementations.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::Value;
use tempfile::TempDir;
use uuid::Uuid;

use crate::db::{migrate, Db};
use crate::graph::Entity;
use crate::store::{MemoryStore, SqliteStore};
use crate::GraphscopeError;

struct FixtureEntity {
    entity: Entity,
    created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct GraphFixture {
    entities: Vec<FixtureEntity>,
    edges: Vec<(String, String, String)>,
}

impl GraphFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity(self, id: &str, name: &str, labels: &[&str]) -> Self {
        let seq = self.entities.len() as i64;
        let created_at = DateTime::from_timestamp(1_700_000_000 + seq * 60, 0).unwrap();
        self.entity_created_at(id, name, labels, created_at)
    }

    pub fn entity_created_at(
        mut self,
        id: &str,
        name: &str,
        labels: &[&str],
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut entity = Entity::new(id, name);
        for label in labels {
            entity = entity.with_label(*label);
        }
        self.entities.push(FixtureEntity { entity, created_at });
        self
    }

    pub fn attribute(mut self, id: &str, key: &str, value: Value) -> Self {
        if let Some(fixture) = self.entities.iter_mut().find(|f| f.entity.id == id) {
            fixture.entity.attributes.insert(key.to_string(), value);
        }
        self
    }

    pub fn edge(mut self, source: &str, relationship_type: &str, target: &str) -> Self {
        self.edges.push((
            source.to_string(),
            relationship_type.to_string(),
            target.to_string(),
        ));
        self
    }

    /// `hub` linked to `count` leaf entities named `leaf-0..count`.
    pub fn star(mut self, hub: &str, relationship_type: &str, count: usize) -> Self {
        self = self.entity(hub, hub, &["Hub"]);
        for i in 0..count {
            let leaf = format!("leaf-{}", i);
            self = self
                .entity(&leaf, &leaf, &["Leaf"])
                .edge(hub, relationship_type, &leaf);
        }
        self
    }

    pub fn memory_store(&self) -> MemoryStore {
        let mut store = MemoryStore::new();
        for fixture in &self.entities {
            store.add_entity_created_at(fixture.entity.clone(), fixture.created_at);
        }
        for (source, rel, target) in &self.edges {
            store.add_edge(source, rel, target);
        }
        store
    }
}

/// Fresh migrated SQLite database seeded from `fixture`.
pub async fn sqlite_store(fixture: &GraphFixture) -> (SqliteStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Db::new(temp_dir.path().join("graph.db"));
    let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");

    let entities: Vec<(String, String, String, String, String)> = fixture
        .entities
        .iter()
        .map(|f| {
            (
                f.entity.id.clone(),
                f.entity.name.clone(),
                serde_json::to_string(&f.entity.labels).unwrap(),
                serde_json::to_string(&f.entity.attributes).unwrap(),
                f.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            )
        })
        .collect();
    let edges = fixture.edges.clone();

    db.with_connection(move |conn| {
        migrate::run_migrations(conn, &migrations_dir)?;
        let tx = conn.transaction()?;
        for (id, name, labels, attributes, created_at) in &entities {
            tx.execute(
                "INSERT INTO entities (entity_id, name, labels_json, attributes_json, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, name, labels, attributes, created_at],
            )?;
        }
        for (source, rel, target) in &edges {
            tx.execute(
                "INSERT INTO entity_relations (relation_id, source_entity, relation_type, target_entity) \
                 VALUES (?1, ?2, ?3, ?4)",
                params![Uuid::new_v4().to_string(), source, rel, target],
            )?;
        }
        tx.commit()?;
        Ok::<(), GraphscopeError>(())
    })
    .await
    .unwrap();

    (SqliteStore::new(db), temp_dir)
}
