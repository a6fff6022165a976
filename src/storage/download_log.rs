//! Per-file download log kept in a separate SQLite database.
//!
//! Each file gets its own table `log_<file id>`, created on first write and
//! dropped together with the file.

use rusqlite::Result;

use super::db::DbConnection;

/// One recorded download.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadEntry {
    pub id: i64,
    pub created_at: String,
    pub ip: String,
    pub city: String,
    pub country: String,
    pub platform: String,
    pub model: String,
    pub os_name: String,
    pub os_version: String,
    pub browser_name: String,
    pub browser_version: String,
}

fn table_name(file_id: i64) -> String {
    format!("log_{file_id}")
}

fn ensure_table(conn: &DbConnection, file_id: i64) -> Result<()> {
    conn.execute_batch(&format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            ip TEXT NOT NULL DEFAULT '',
            city TEXT NOT NULL DEFAULT '',
            country TEXT NOT NULL DEFAULT '',
            platform TEXT NOT NULL DEFAULT '',
            model TEXT NOT NULL DEFAULT '',
            os_name TEXT NOT NULL DEFAULT '',
            os_version TEXT NOT NULL DEFAULT '',
            browser_name TEXT NOT NULL DEFAULT '',
            browser_ver TEXT NOT NULL DEFAULT ''
        );",
        table_name(file_id)
    ))
}

fn table_exists(conn: &DbConnection, file_id: i64) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?1",
        [table_name(file_id)],
        |row| Ok(row.get::<_, i64>(0)? > 0),
    )
}

/// Appends a download entry for the file. `id` and `created_at` are assigned here.
pub fn add_entry(conn: &DbConnection, file_id: i64, entry: &DownloadEntry) -> Result<()> {
    ensure_table(conn, file_id)?;
    conn.execute(
        &format!(
            "INSERT INTO {} (ip, city, country, platform, model, os_name, os_version, browser_name, browser_ver)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            table_name(file_id)
        ),
        rusqlite::params![
            entry.ip,
            entry.city,
            entry.country,
            entry.platform,
            entry.model,
            entry.os_name,
            entry.os_version,
            entry.browser_name,
            entry.browser_version,
        ],
    )?;
    Ok(())
}

/// All entries for the file, oldest first. A file never downloaded has none.
pub fn list_entries(conn: &DbConnection, file_id: i64) -> Result<Vec<DownloadEntry>> {
    if !table_exists(conn, file_id)? {
        return Ok(Vec::new());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT id, created_at, ip, city, country, platform, model, os_name, os_version, browser_name, browser_ver
         FROM {} ORDER BY created_at ASC, id ASC",
        table_name(file_id)
    ))?;
    let rows = stmt.query_map([], |row| {
        Ok(DownloadEntry {
            id: row.get(0)?,
            created_at: row.get(1)?,
            ip: row.get(2)?,
            city: row.get(3)?,
            country: row.get(4)?,
            platform: row.get(5)?,
            model: row.get(6)?,
            os_name: row.get(7)?,
            os_version: row.get(8)?,
            browser_name: row.get(9)?,
            browser_version: row.get(10)?,
        })
    })?;
    rows.collect()
}

/// Drops the file's log table if it exists.
pub fn drop_log(conn: &DbConnection, file_id: i64) -> Result<()> {
    conn.execute_batch(&format!("DROP TABLE IF EXISTS {};", table_name(file_id)))
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Renders entries as CSV with a header row.
pub fn to_csv(entries: &[DownloadEntry]) -> String {
    let mut out = String::from("time,ip,city,country,platform,model,os,os_version,browser,browser_version\n");
    for e in entries {
        let fields = [
            &e.created_at,
            &e.ip,
            &e.city,
            &e.country,
            &e.platform,
            &e.model,
            &e.os_name,
            &e.os_version,
            &e.browser_name,
            &e.browser_version,
        ];
        let line: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
        out.push_str(&line.join(","));
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db;
    use tempfile::TempDir;

    fn pool() -> (TempDir, db::DbPool) {
        let dir = TempDir::new().unwrap();
        let pool = db::create_log_pool(dir.path().join("logs.db").to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn missing_table_lists_nothing() {
        let (_dir, pool) = pool();
        let conn = db::get_connection(&pool).unwrap();
        assert!(list_entries(&conn, 5).unwrap().is_empty());
    }

    #[test]
    fn add_list_drop() {
        let (_dir, pool) = pool();
        let conn = db::get_connection(&pool).unwrap();
        let entry = DownloadEntry {
            ip: "1.2.3.4".into(),
            city: "Berlin".into(),
            ..Default::default()
        };
        add_entry(&conn, 3, &entry).unwrap();
        add_entry(&conn, 3, &entry).unwrap();

        let entries = list_entries(&conn, 3).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].city, "Berlin");
        assert!(!entries[0].created_at.is_empty());

        drop_log(&conn, 3).unwrap();
        assert!(list_entries(&conn, 3).unwrap().is_empty());
    }

    #[test]
    fn csv_quotes_special_fields() {
        let entry = DownloadEntry {
            created_at: "2024-01-01 10:00:00".into(),
            city: "Washington, D.C.".into(),
            browser_name: "Say \"hi\"".into(),
            ..Default::default()
        };
        let csv = to_csv(&[entry]);
        let line = csv.lines().nth(1).unwrap();
        assert!(line.contains("\"Washington, D.C.\""));
        assert!(line.contains("\"Say \"\"hi\"\"\""));
        assert!(csv.starts_with("time,ip,"));
    }
}
