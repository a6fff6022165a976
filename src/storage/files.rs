//! File registry: uploaded files, their public links and notify flags.

use rusqlite::{OptionalExtension, Result};
use thiserror::Error;

use super::db::DbConnection;

/// A stored file as seen by its owner.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRecord {
    pub id: i64,
    /// Internal id of the owner
    pub user_id: i64,
    /// Display name chosen by the user
    pub local_name: String,
    /// Random at-rest filename, never shown to users
    pub storage_name: String,
    /// Full public URL (domain + slug)
    pub link: String,
    pub notify: bool,
    pub size: i64,
    pub created_at: String,
}

/// Parameters for registering a new file
#[derive(Debug)]
pub struct NewFile<'a> {
    pub user_id: i64,
    pub local_name: &'a str,
    pub storage_name: &'a str,
    pub link: &'a str,
    pub notify: bool,
    pub size: i64,
}

/// Failure to write a row that carries a public link.
#[derive(Error, Debug)]
pub enum FileInsertError {
    /// Another file already owns this link
    #[error("link is already taken")]
    LinkTaken,

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

impl From<FileInsertError> for crate::core::error::AppError {
    fn from(err: FileInsertError) -> Self {
        match err {
            FileInsertError::LinkTaken => Self::Validation("link is already taken".to_string()),
            FileInsertError::Database(e) => Self::Database(e),
        }
    }
}

fn classify(err: rusqlite::Error) -> FileInsertError {
    // `link` is the only UNIQUE column on `files`
    if let rusqlite::Error::SqliteFailure(ref e, _) = err {
        if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return FileInsertError::LinkTaken;
        }
    }
    FileInsertError::Database(err)
}

const SELECT_COLUMNS: &str = "SELECT id, user_id, local_name, storage_name, link, notify, size, created_at FROM files";

fn map_file(row: &rusqlite::Row<'_>) -> Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        local_name: row.get(2)?,
        storage_name: row.get(3)?,
        link: row.get(4)?,
        notify: row.get::<_, i64>(5)? != 0,
        size: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn insert_row(conn: &rusqlite::Connection, file: &NewFile) -> Result<i64, FileInsertError> {
    conn.execute(
        "INSERT INTO files (user_id, local_name, storage_name, link, notify, size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            file.user_id,
            file.local_name,
            file.storage_name,
            file.link,
            file.notify as i64,
            file.size,
        ],
    )
    .map_err(classify)?;
    Ok(conn.last_insert_rowid())
}

/// Inserts a file row and returns its id.
///
/// A duplicate link is reported as [`FileInsertError::LinkTaken`].
pub fn insert_file(conn: &DbConnection, file: &NewFile) -> Result<i64, FileInsertError> {
    insert_row(conn, file)
}

/// Registers a file and debits its owner by `cost` in one transaction.
///
/// Either both the row and the debit are committed or neither is.
pub fn insert_paid_file(conn: &mut DbConnection, file: &NewFile, cost: f64) -> Result<i64, FileInsertError> {
    let tx = conn.transaction()?;
    let file_id = insert_row(&tx, file)?;
    tx.execute(
        "UPDATE users SET balance = balance - ?1 WHERE id = ?2",
        rusqlite::params![cost, file.user_id],
    )?;
    tx.commit()?;
    Ok(file_id)
}

pub fn list_files(conn: &DbConnection, user_id: i64) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} WHERE user_id = ?1 ORDER BY id DESC"))?;
    let rows = stmt.query_map([user_id], map_file)?;
    rows.collect()
}

/// Every file in the registry, newest first.
pub fn list_all_files(conn: &DbConnection) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY id DESC"))?;
    let rows = stmt.query_map([], map_file)?;
    rows.collect()
}

pub fn count_files(conn: &DbConnection, user_id: i64) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM files WHERE user_id = ?1", [user_id], |row| {
        row.get(0)
    })
}

pub fn get_file_by_storage_name(conn: &DbConnection, storage_name: &str) -> Result<Option<FileRecord>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE storage_name = ?1"),
        [storage_name],
        map_file,
    )
    .optional()
}

/// Finds an owner's file by its display name (first match wins).
pub fn get_file_by_local_name(conn: &DbConnection, user_id: i64, local_name: &str) -> Result<Option<FileRecord>> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE user_id = ?1 AND local_name = ?2 ORDER BY id LIMIT 1"),
        rusqlite::params![user_id, local_name],
        map_file,
    )
    .optional()
}

pub fn get_file_by_link(conn: &DbConnection, link: &str) -> Result<Option<FileRecord>> {
    conn.query_row(&format!("{SELECT_COLUMNS} WHERE link = ?1"), [link], map_file)
        .optional()
}

/// Points the file at a new public link.
pub fn update_link(conn: &DbConnection, file_id: i64, link: &str) -> Result<(), FileInsertError> {
    conn.execute(
        "UPDATE files SET link = ?1 WHERE id = ?2",
        rusqlite::params![link, file_id],
    )
    .map_err(classify)?;
    Ok(())
}

pub fn set_notify(conn: &DbConnection, file_id: i64, notify: bool) -> Result<()> {
    conn.execute(
        "UPDATE files SET notify = ?1 WHERE id = ?2",
        rusqlite::params![notify as i64, file_id],
    )?;
    Ok(())
}

/// Removes the file row. Returns whether a row was deleted.
pub fn delete_file(conn: &DbConnection, file_id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM files WHERE id = ?1", [file_id])?;
    Ok(affected > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::db;
    use tempfile::TempDir;

    fn setup() -> (TempDir, db::DbPool, i64) {
        let dir = TempDir::new().unwrap();
        let pool = db::create_pool(dir.path().join("files.db").to_str().unwrap()).unwrap();
        let conn = db::get_connection(&pool).unwrap();
        let user = db::get_or_create_user(&conn, 100).unwrap();
        (dir, pool, user.id)
    }

    fn new_file<'a>(user_id: i64, storage: &'a str, link: &'a str) -> NewFile<'a> {
        NewFile {
            user_id,
            local_name: "report",
            storage_name: storage,
            link,
            notify: false,
            size: 10,
        }
    }

    #[test]
    fn duplicate_link_is_link_taken() {
        let (_dir, pool, user_id) = setup();
        let conn = db::get_connection(&pool).unwrap();

        insert_file(&conn, &new_file(user_id, "a", "http://x/one")).unwrap();
        let err = insert_file(&conn, &new_file(user_id, "b", "http://x/one")).unwrap_err();
        assert!(matches!(err, FileInsertError::LinkTaken));
        assert_eq!(count_files(&conn, user_id).unwrap(), 1);
    }

    #[test]
    fn paid_insert_commits_row_and_debit_together() {
        let (_dir, pool, user_id) = setup();
        let mut conn = db::get_connection(&pool).unwrap();
        db::set_balance(&conn, user_id, 5.0).unwrap();

        insert_paid_file(&mut conn, &new_file(user_id, "a", "http://x/one"), 2.0).unwrap();
        assert_eq!(db::get_balance(&conn, user_id).unwrap(), 3.0);

        let err = insert_paid_file(&mut conn, &new_file(user_id, "b", "http://x/one"), 2.0).unwrap_err();
        assert!(matches!(err, FileInsertError::LinkTaken));
        assert_eq!(db::get_balance(&conn, user_id).unwrap(), 3.0);
        assert_eq!(count_files(&conn, user_id).unwrap(), 1);
    }

    #[test]
    fn lookup_by_each_key() {
        let (_dir, pool, user_id) = setup();
        let conn = db::get_connection(&pool).unwrap();
        let id = insert_file(&conn, &new_file(user_id, "s1", "http://x/s")).unwrap();

        assert_eq!(get_file_by_storage_name(&conn, "s1").unwrap().unwrap().id, id);
        assert_eq!(get_file_by_link(&conn, "http://x/s").unwrap().unwrap().id, id);
        assert_eq!(get_file_by_local_name(&conn, user_id, "report").unwrap().unwrap().id, id);
        assert!(get_file_by_local_name(&conn, user_id + 1, "report").unwrap().is_none());
    }

    #[test]
    fn rename_into_taken_link_fails() {
        let (_dir, pool, user_id) = setup();
        let conn = db::get_connection(&pool).unwrap();
        insert_file(&conn, &new_file(user_id, "s1", "http://x/a")).unwrap();
        let second = insert_file(&conn, &new_file(user_id, "s2", "http://x/b")).unwrap();

        assert!(matches!(
            update_link(&conn, second, "http://x/a"),
            Err(FileInsertError::LinkTaken)
        ));
        update_link(&conn, second, "http://x/c").unwrap();
        assert!(get_file_by_link(&conn, "http://x/c").unwrap().is_some());
    }

    #[test]
    fn notify_toggle_and_delete() {
        let (_dir, pool, user_id) = setup();
        let conn = db::get_connection(&pool).unwrap();
        let id = insert_file(&conn, &new_file(user_id, "s1", "http://x/a")).unwrap();

        set_notify(&conn, id, true).unwrap();
        assert!(get_file_by_storage_name(&conn, "s1").unwrap().unwrap().notify);

        assert!(delete_file(&conn, id).unwrap());
        assert!(!delete_file(&conn, id).unwrap());
        assert!(list_files(&conn, user_id).unwrap().is_empty());
    }
}
