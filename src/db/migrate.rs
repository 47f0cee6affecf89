use rusqlite::{Connection, params};
use std::fs;
use std::path::Path;
use crate::error::{Result, GraphscopeError};

/// Tables every graph database must carry after migrations.
pub const REQUIRED_TABLES: &[&str] = &["entities", "entity_relations", "schema_migrations"];

/// Indexes the adjacency and name lookups rely on.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_entities_name",
    "idx_relations_source_type",
    "idx_relations_target_type",
];

/// Migration metadata
struct Migration {
    version: u32,
    name: String,
    sql: String,
}

/// Create schema_migrations table if it doesn't exist
fn ensure_migrations_table(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get list of applied migrations
pub fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM schema_migrations ORDER BY version")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

/// Load `NNN_name.sql` files from the migrations directory, ordered by version
fn load_migrations(migrations_dir: &Path) -> Result<Vec<Migration>> {
    let mut migrations = Vec::new();

    let mut files: Vec<_> = fs::read_dir(migrations_dir)?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("sql"))
        .collect();
    files.sort_by_key(|e| e.file_name());

    for entry in files {
        let path = entry.path();
        let filename = path.file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| GraphscopeError::Config("Invalid migration filename".to_string()))?;

        let version_str = filename
            .split('_')
            .next()
            .ok_or_else(|| GraphscopeError::Config(format!("Invalid migration filename: {}", filename)))?;
        let version: u32 = version_str.parse()
            .map_err(|_| GraphscopeError::Config(format!("Invalid migration version: {}", version_str)))?;

        let sql = fs::read_to_string(&path)?;
        let name = filename.trim_end_matches(".sql").to_string();

        migrations.push(Migration { version, name, sql });
    }

    migrations.sort_by_key(|m| m.version);
    Ok(migrations)
}

/// Run all pending migrations
pub fn run_migrations(conn: &mut Connection, migrations_dir: &Path) -> Result<()> {
    ensure_migrations_table(conn)?;

    let applied = get_applied_migrations(conn)?;
    let migrations = load_migrations(migrations_dir)?;

    for migration in migrations {
        if applied.contains(&migration.name) {
            log::debug!("Migration {} already applied, skipping", migration.name);
            continue;
        }

        log::info!("Applying migration: {} (version {})", migration.name, migration.version);

        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql).map_err(|e| {
            GraphscopeError::Config(format!("Failed to execute migration {}: {}", migration.name, e))
        })?;
        tx.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![migration.version, migration.name],
        )?;
        tx.commit()?;

        log::info!("Migration {} applied successfully", migration.name);
    }

    log::info!("All migrations completed");
    Ok(())
}

/// Names of objects of `kind` ("table", "index", ...) present in the schema
pub fn schema_objects(conn: &Connection, kind: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = ?1 ORDER BY name")?;
    let names = stmt
        .query_map([kind], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(names)
}

/// Check that a migrated database carries the graph schema and healthy pragmas.
///
/// Missing tables, WAL being off or a failed integrity check are errors; missing lookup indexes
/// only slow queries down and are logged as warnings.
pub fn verify_schema(conn: &Connection) -> Result<()> {
    let tables = schema_objects(conn, "table")?;
    let missing: Vec<&str> = REQUIRED_TABLES
        .iter()
        .copied()
        .filter(|table| !tables.iter().any(|t| t == table))
        .collect();
    if !missing.is_empty() {
        return Err(GraphscopeError::Config(format!(
            "Missing tables: {}",
            missing.join(", ")
        )));
    }
    log::debug!("✓ {} required tables exist", REQUIRED_TABLES.len());

    let indexes = schema_objects(conn, "index")?;
    for index_name in REQUIRED_INDEXES {
        if indexes.iter().any(|i| i == index_name) {
            log::debug!("✓ Lookup index exists: {}", index_name);
        } else {
            log::warn!("Lookup index not found: {} (traversals will scan)", index_name);
        }
    }

    let applied = get_applied_migrations(conn)?;
    if applied.is_empty() {
        return Err(GraphscopeError::Config("No migrations applied".to_string()));
    }
    log::debug!("✓ {} migrations applied", applied.len());

    let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
    if !journal_mode.eq_ignore_ascii_case("wal") {
        return Err(GraphscopeError::Config(format!(
            "Journal mode is not WAL: {}",
            journal_mode
        )));
    }

    let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    if integrity != "ok" {
        return Err(GraphscopeError::Config(format!(
            "Database integrity check failed: {}",
            integrity
        )));
    }
    log::info!("✓ Database integrity: OK");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_migration_tracking() {
        let temp_dir = TempDir::new().unwrap();
        let conn = Connection::open(temp_dir.path().join("test.db")).unwrap();

        ensure_migrations_table(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
            params![1, "001_test"],
        ).unwrap();

        let applied = get_applied_migrations(&conn).unwrap();
        assert!(applied.contains(&"001_test".to_string()));
    }

    #[test]
    fn test_load_migrations_ordered() {
        let temp_dir = TempDir::new().unwrap();
        let migrations_dir = temp_dir.path().join("migrations");
        fs::create_dir(&migrations_dir).unwrap();
        fs::write(migrations_dir.join("002_another.sql"), "CREATE TABLE another (id INTEGER);").unwrap();
        fs::write(migrations_dir.join("001_test.sql"), "CREATE TABLE test (id INTEGER);").unwrap();
        fs::write(migrations_dir.join("README.md"), "not a migration").unwrap();

        let migrations = load_migrations(&migrations_dir).unwrap();
        assert_eq!(migrations.len(), 2);
        assert_eq!(migrations[0].version, 1);
        assert_eq!(migrations[1].name, "002_another");
    }

    #[test]
    fn test_full_migration_schema() {
        let temp_dir = TempDir::new().unwrap();
        let mut conn = Connection::open(temp_dir.path().join("test.db")).unwrap();
        let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");

        run_migrations(&mut conn, &migrations_dir).unwrap();
        // Second run is a no-op
        run_migrations(&mut conn, &migrations_dir).unwrap();

        let tables = schema_objects(&conn, "table").unwrap();
        for table in REQUIRED_TABLES {
            assert!(tables.iter().any(|t| t == table), "missing table {}", table);
        }
        let indexes = schema_objects(&conn, "index").unwrap();
        for index in REQUIRED_INDEXES {
            assert!(indexes.iter().any(|i| i == index), "missing index {}", index);
        }
    }

    #[test]
    fn test_verify_schema() {
        let temp_dir = TempDir::new().unwrap();
        let db = crate::db::Db::new(temp_dir.path().join("graph.db"));
        let mut conn = db.open_connection().unwrap();

        let err = verify_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("entities"));

        let migrations_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations");
        run_migrations(&mut conn, &migrations_dir).unwrap();
        verify_schema(&conn).unwrap();
    }
}
