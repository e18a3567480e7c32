mod migrations;

pub mod areas;
pub mod arrivals;
pub mod products;
pub mod users;

use anyhow::Context;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

use crate::config::Config;
use crate::error::AppResult;

pub type DbPool = Pool<SqliteConnectionManager>;

const MIN_IDLE: u32 = 2;

pub fn create_pool(config: &Config) -> anyhow::Result<DbPool> {
    let sqlite_path = &config.sqlite_path;
    if let Some(parent) = Path::new(sqlite_path).parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let manager = SqliteConnectionManager::file(sqlite_path)
        .with_flags(
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_FULL_MUTEX,
        )
        .with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA foreign_keys = ON;
                 PRAGMA busy_timeout = 5000;",
            )
        });

    let max_size = config.db_pool_size.max(1);
    let pool = Pool::builder()
        .max_size(max_size)
        .min_idle(Some(MIN_IDLE.min(max_size)))
        .build(manager)
        .context("Failed to create database pool")?;

    let conn = pool.get().context("Failed to get connection for migrations")?;
    migrations::run(&conn).context("Failed to run migrations")?;

    if let (Some(name), Some(password)) = (&config.admin_name, &config.admin_password) {
        if users::seed_super_user(&conn, name, password)? {
            tracing::info!("Seeded super-user account {name}");
        }
    }

    Ok(pool)
}

/// Timestamp format shared by every table; lexically ordered so the
/// `start_time`/`end_time` filters can compare it as text.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Deletes `ids` from `table`, limited to rows the caller created unless the
/// caller is the super-user.
pub(crate) fn delete_owned(
    conn: &Connection,
    table: &str,
    ids: &[i64],
    caller_id: i64,
) -> AppResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }

    let placeholders = (2..ids.len() + 2)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let owner_clause = if crate::auth::is_super_user(caller_id) {
        "?1 = ?1"
    } else {
        "user_id = ?1"
    };
    let sql = format!("DELETE FROM {table} WHERE {owner_clause} AND id IN ({placeholders})");

    let mut params: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
    params.push(&caller_id);
    params.extend(ids.iter().map(|id| id as &dyn rusqlite::ToSql));
    Ok(conn.execute(&sql, rusqlite::params_from_iter(params))?)
}

#[cfg(test)]
pub fn test_connection() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    migrations::run(&conn).expect("migrate");
    conn
}
