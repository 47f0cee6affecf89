//! SQLite-backed store. Answers variable-length path queries natively with a recursive CTE.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{parse_timestamp, EntityStore, MatchKind, StartCandidate, StoreCapabilities};
use crate::db::Db;
use crate::graph::{Depth, Direction, Edge, Entity, HopEdge, RelationshipFilter};
use crate::{GraphscopeError, Result};

const ENTITY_COLUMNS: &str = "entity_id, name, labels_json, attributes_json, created_at";

const NEIGHBORS_SQL: &str = r#"
    SELECT source_entity, target_entity, relation_type, 'outgoing' AS direction,
           0 AS side, rowid AS rid
    FROM entity_relations
    WHERE source_entity = ?1
      AND (?2 IS NULL OR relation_type IN (SELECT value FROM json_each(?2)))
    UNION ALL
    SELECT source_entity, target_entity, relation_type, 'incoming', 1, rowid
    FROM entity_relations
    WHERE target_entity = ?1 AND source_entity <> ?1
      AND (?2 IS NULL OR relation_type IN (SELECT value FROM json_each(?2)))
    ORDER BY side, rid
"#;

// Each entity gets its shortest hop from the start; an edge is then first reached one hop past
// its nearer endpoint and is oriented away from that endpoint (ties go to the source side).
const PATHS_SQL: &str = r#"
    WITH RECURSIVE walk(entity_id, hop) AS (
        SELECT ?1, 0
        UNION
        SELECT CASE WHEN r.source_entity = w.entity_id THEN r.target_entity
                    ELSE r.source_entity END,
               w.hop + 1
        FROM walk w
        JOIN entity_relations r
          ON r.source_entity = w.entity_id OR r.target_entity = w.entity_id
        WHERE w.hop < ?2
          AND (?3 IS NULL OR r.relation_type IN (SELECT value FROM json_each(?3)))
    ),
    nearest(entity_id, hop) AS (
        SELECT entity_id, MIN(hop) FROM walk GROUP BY entity_id
    ),
    scored AS (
        SELECT r.rowid AS rid,
               r.source_entity, r.target_entity, r.relation_type,
               CASE WHEN s.hop IS NOT NULL AND (t.hop IS NULL OR s.hop <= t.hop)
                    THEN 'outgoing' ELSE 'incoming' END AS direction,
               MIN(IFNULL(s.hop, ?2), IFNULL(t.hop, ?2)) AS near_hop
        FROM entity_relations r
        LEFT JOIN nearest s ON s.entity_id = r.source_entity
        LEFT JOIN nearest t ON t.entity_id = r.target_entity
        WHERE (?3 IS NULL OR r.relation_type IN (SELECT value FROM json_each(?3)))
    )
    SELECT source_entity, target_entity, relation_type, direction, near_hop + 1 AS hop_distance
    FROM scored
    WHERE near_hop < ?2
    GROUP BY source_entity, target_entity, relation_type, direction, near_hop
    ORDER BY hop_distance, MIN(rid)
"#;

/// Graph store over the `entities` / `entity_relations` tables.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db: Db,
}

impl SqliteStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

/// Raw `entities` row before JSON columns are decoded.
struct EntityRow {
    id: String,
    name: String,
    labels_json: String,
    attributes_json: String,
    created_at: String,
}

impl EntityRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            labels_json: row.get(2)?,
            attributes_json: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn decode(self) -> Result<(Entity, Option<DateTime<Utc>>)> {
        let entity = Entity {
            labels: serde_json::from_str(&self.labels_json)?,
            attributes: serde_json::from_str(&self.attributes_json)?,
            id: self.id,
            name: self.name,
        };
        Ok((entity, parse_timestamp(&self.created_at)))
    }
}

fn filter_json(filter: &RelationshipFilter) -> Result<Option<String>> {
    if filter.is_empty() {
        return Ok(None);
    }
    let types: Vec<&str> = filter.types().collect();
    Ok(Some(serde_json::to_string(&types)?))
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn edge_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

#[async_trait]
impl EntityStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn capabilities(&self) -> StoreCapabilities {
        StoreCapabilities {
            native_path_query: true,
        }
    }

    async fn find_start_candidates(
        &self,
        query: &str,
        allow_partial: bool,
    ) -> Result<Vec<StartCandidate>> {
        let query_owned = query.to_string();
        let rows = self
            .db
            .with_connection(move |conn| {
                let sql = format!(
                    r#"
                    SELECT {ENTITY_COLUMNS}
                    FROM entities
                    WHERE entity_id = ?1
                       OR name = ?1 COLLATE NOCASE
                       OR (?2 AND name LIKE '%' || ?3 || '%' ESCAPE '\')
                    "#
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(
                        params![query_owned, allow_partial, escape_like(&query_owned)],
                        EntityRow::from_row,
                    )?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok::<_, GraphscopeError>(rows)
            })
            .await?;

        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            let (entity, created_at) = row.decode()?;
            let Some(match_kind) = MatchKind::classify(&entity, query) else {
                continue;
            };
            if match_kind == MatchKind::PartialName && !allow_partial {
                continue;
            }
            candidates.push(StartCandidate {
                entity,
                match_kind,
                created_at,
            });
        }
        Ok(candidates)
    }

    async fn neighbors(&self, entity_id: &str, filter: &RelationshipFilter) -> Result<Vec<Edge>> {
        let entity_id = entity_id.to_string();
        let types = filter_json(filter)?;
        let rows = self
            .db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare_cached(NEIGHBORS_SQL)?;
                let rows = stmt
                    .query_map(params![entity_id, types], edge_from_row)?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok::<_, GraphscopeError>(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(source, target, rel_type, direction)| {
                Ok(Edge::new(source, target, rel_type, Direction::parse(&direction)?))
            })
            .collect()
    }

    async fn fetch_entities(&self, ids: &[String]) -> Result<Vec<Entity>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids_json = serde_json::to_string(ids)?;
        let rows = self
            .db
            .with_connection(move |conn| {
                let sql = format!(
                    "SELECT {ENTITY_COLUMNS} FROM entities \
                     WHERE entity_id IN (SELECT value FROM json_each(?1))"
                );
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![ids_json], EntityRow::from_row)?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok::<_, GraphscopeError>(rows)
            })
            .await?;

        rows.into_iter()
            .map(|row| row.decode().map(|(entity, _)| entity))
            .collect()
    }

    async fn paths_from(
        &self,
        start_id: &str,
        depth: Depth,
        filter: &RelationshipFilter,
    ) -> Result<Vec<HopEdge>> {
        let start_id = start_id.to_string();
        let types = filter_json(filter)?;
        let max_hops = depth.get() as i64;
        let rows = self
            .db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare_cached(PATHS_SQL)?;
                let rows = stmt
                    .query_map(params![start_id, max_hops, types], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok::<_, GraphscopeError>(rows)
            })
            .await?;

        rows.into_iter()
            .map(|(source, target, rel_type, direction, hop)| {
                let hop = u8::try_from(hop).map_err(|_| {
                    GraphscopeError::BackendUnavailable(format!(
                        "path query returned out-of-range hop {}",
                        hop
                    ))
                })?;
                Ok(HopEdge {
                    edge: Edge::new(source, target, rel_type, Direction::parse(&direction)?),
                    hop,
                })
            })
            .collect()
    }

    async fn relationship_types(&self) -> Result<Vec<String>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT relation_type FROM entity_relations ORDER BY relation_type",
                )?;
                let types = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok::<_, GraphscopeError>(types)
            })
            .await
    }

    async fn labels(&self) -> Result<Vec<String>> {
        self.db
            .with_connection(|conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT label.value FROM entities, json_each(entities.labels_json) AS label \
                     ORDER BY label.value",
                )?;
                let labels = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok::<_, GraphscopeError>(labels)
            })
            .await
    }
}
