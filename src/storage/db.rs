use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, Result};

use crate::core::error::AppResult;
use crate::storage::migrations;

/// Пользователь бота и его баланс.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// Внутренний ID (назначается при первом обращении)
    pub id: i64,
    /// Telegram ID пользователя
    pub telegram_id: i64,
    /// Текущий баланс
    pub balance: f64,
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create the main connection pool and bring the schema up to date.
///
/// # Arguments
///
/// * `database_path` - Path to the SQLite database file
///
/// # Example
///
/// ```no_run
/// use filedrop::storage::db;
///
/// let pool = db::create_pool("filestorage.db").unwrap();
/// let conn = db::get_connection(&pool).unwrap();
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder().max_size(10).build(manager)?;

    let mut conn = pool.get()?;
    migrations::run_migrations(&mut conn)?;

    Ok(pool)
}

/// Create the pool for the download-log database.
///
/// Its tables are created on demand, one per file, so no migrations run here.
pub fn create_log_pool(database_path: &str) -> Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(database_path);
    Pool::builder().max_size(4).build(manager)
}

/// Get a connection from the pool. It returns to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

fn map_user(row: &rusqlite::Row<'_>) -> Result<User> {
    Ok(User {
        id: row.get(0)?,
        telegram_id: row.get(1)?,
        balance: row.get(2)?,
    })
}

/// Возвращает пользователя, создавая его при первом обращении.
pub fn get_or_create_user(conn: &DbConnection, telegram_id: i64) -> Result<User> {
    conn.execute(
        "INSERT OR IGNORE INTO users (telegram_id, balance) VALUES (?1, 0)",
        [telegram_id],
    )?;
    conn.query_row(
        "SELECT id, telegram_id, balance FROM users WHERE telegram_id = ?1",
        [telegram_id],
        map_user,
    )
}

/// Looks a user up by Telegram id without creating one.
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, telegram_id, balance FROM users WHERE telegram_id = ?1",
        [telegram_id],
        map_user,
    )
    .optional()
}

/// Looks a user up by internal id.
pub fn get_user_by_id(conn: &DbConnection, user_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT id, telegram_id, balance FROM users WHERE id = ?1",
        [user_id],
        map_user,
    )
    .optional()
}

/// Returns the Telegram id behind an internal user id.
pub fn get_telegram_id(conn: &DbConnection, user_id: i64) -> Result<Option<i64>> {
    conn.query_row("SELECT telegram_id FROM users WHERE id = ?1", [user_id], |row| {
        row.get(0)
    })
    .optional()
}

/// Текущий баланс пользователя (0, если пользователя нет).
pub fn get_balance(conn: &DbConnection, user_id: i64) -> Result<f64> {
    Ok(conn
        .query_row("SELECT balance FROM users WHERE id = ?1", [user_id], |row| row.get(0))
        .optional()?
        .unwrap_or(0.0))
}

/// Adds `delta` to the balance in a single statement. Negative deltas debit.
pub fn adjust_balance(conn: &DbConnection, user_id: i64, delta: f64) -> Result<()> {
    conn.execute(
        "UPDATE users SET balance = balance + ?1 WHERE id = ?2",
        rusqlite::params![delta, user_id],
    )?;
    Ok(())
}

/// Overwrites the balance with an absolute value.
pub fn set_balance(conn: &DbConnection, user_id: i64, value: f64) -> Result<()> {
    conn.execute(
        "UPDATE users SET balance = ?1 WHERE id = ?2",
        rusqlite::params![value, user_id],
    )?;
    Ok(())
}

/// Credits a confirmed top-up and records it in one transaction.
///
/// Returns the balance after the credit. Nothing is committed on error.
pub fn credit_payment(conn: &mut DbConnection, user_id: i64, amount: f64) -> Result<f64> {
    let tx = conn.transaction()?;
    tx.execute(
        "UPDATE users SET balance = balance + ?1 WHERE id = ?2",
        rusqlite::params![amount, user_id],
    )?;
    tx.execute(
        "INSERT INTO payments (user_id, amount) VALUES (?1, ?2)",
        rusqlite::params![user_id, amount],
    )?;
    let balance = tx.query_row("SELECT balance FROM users WHERE id = ?1", [user_id], |row| row.get(0))?;
    tx.commit()?;
    Ok(balance)
}

/// Sum of every confirmed top-up for the user.
pub fn total_payments(conn: &DbConnection, user_id: i64) -> Result<f64> {
    conn.query_row(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE user_id = ?1",
        [user_id],
        |row| row.get(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pool() -> (TempDir, DbPool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.db");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn get_or_create_user_is_stable() {
        let (_dir, pool) = pool();
        let conn = get_connection(&pool).unwrap();

        let first = get_or_create_user(&conn, 42).unwrap();
        let second = get_or_create_user(&conn, 42).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.balance, 0.0);
    }

    #[test]
    fn adjust_and_set_balance() {
        let (_dir, pool) = pool();
        let conn = get_connection(&pool).unwrap();
        let user = get_or_create_user(&conn, 7).unwrap();

        adjust_balance(&conn, user.id, 5.0).unwrap();
        adjust_balance(&conn, user.id, -1.5).unwrap();
        assert_eq!(get_balance(&conn, user.id).unwrap(), 3.5);

        set_balance(&conn, user.id, 50.0).unwrap();
        assert_eq!(get_balance(&conn, user.id).unwrap(), 50.0);
    }

    #[test]
    fn unknown_user_has_zero_balance() {
        let (_dir, pool) = pool();
        let conn = get_connection(&pool).unwrap();
        assert_eq!(get_balance(&conn, 999).unwrap(), 0.0);
        assert!(get_user(&conn, 999).unwrap().is_none());
    }

    #[test]
    fn payments_are_summed() {
        let (_dir, pool) = pool();
        let mut conn = get_connection(&pool).unwrap();
        let user = get_or_create_user(&conn, 1).unwrap();

        credit_payment(&mut conn, user.id, 2.0).unwrap();
        credit_payment(&mut conn, user.id, 3.25).unwrap();
        assert_eq!(total_payments(&conn, user.id).unwrap(), 5.25);
    }

    #[test]
    fn credit_payment_commits_balance_and_log_together() {
        let (_dir, pool) = pool();
        let mut conn = get_connection(&pool).unwrap();
        let user = get_or_create_user(&conn, 3).unwrap();

        assert_eq!(credit_payment(&mut conn, user.id, 4.0).unwrap(), 4.0);
        assert_eq!(total_payments(&conn, user.id).unwrap(), 4.0);

        conn.execute_batch(
            "CREATE TRIGGER payments_closed BEFORE INSERT ON payments
             BEGIN SELECT RAISE(ABORT, 'payments closed'); END;",
        )
        .unwrap();
        assert!(credit_payment(&mut conn, user.id, 4.0).is_err());
        assert_eq!(get_balance(&conn, user.id).unwrap(), 4.0);
        assert_eq!(total_payments(&conn, user.id).unwrap(), 4.0);
    }
}
