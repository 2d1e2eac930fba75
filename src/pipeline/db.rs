//! SQLite connection setup and schema migration loader

use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};

/// Open a connection with the pragmas every store connection needs
///
/// Missing parent directories are created. Foreign keys are enforced per
/// connection in SQLite, so they are switched on here rather than in the
/// schema files.
pub fn open_connection(db_path: &str) -> Result<Connection, rusqlite::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = fs::create_dir_all(parent) {
                log::warn!("⚠️  Could not create database directory {}: {}", parent.display(), e);
            }
        }
    }

    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(conn)
}

/// `*.sql` files of a schema directory, in file-name order
pub fn schema_files(schema_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(schema_dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Apply every schema file in `schema_dir` (`00_`, `01_`, ...)
///
/// Files use `IF NOT EXISTS` throughout, so this runs on every startup. All
/// files are applied in one transaction: a broken file leaves the database
/// as it was. Returns the number of files applied.
///
/// ```no_run
/// let mut conn = idolrank::pipeline::db::open_connection("data/idolrank.db").unwrap();
/// idolrank::pipeline::db::run_schema_migrations(&mut conn, "sql").unwrap();
/// ```
pub fn run_schema_migrations(
    conn: &mut Connection,
    schema_dir: &str,
) -> Result<usize, Box<dyn std::error::Error>> {
    let dir = Path::new(schema_dir);
    if !dir.is_dir() {
        return Err(format!("Schema directory not found: {}", schema_dir).into());
    }
    let files = schema_files(dir)?;

    // journal_mode cannot change inside a transaction
    conn.pragma_update(None, "journal_mode", "WAL")?;

    log::info!("🔧 Applying {} schema files from {}", files.len(), schema_dir);

    let tx = conn.transaction()?;
    for path in &files {
        let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
        let sql = fs::read_to_string(path)?;
        tx.execute_batch(&sql)
            .map_err(|e| format!("Schema file {} failed: {}", name, e))?;
        log::debug!("   ├─ {}", name);
    }
    tx.commit()?;

    log::info!("✅ Schema up to date (WAL mode)");
    Ok(files.len())
}
