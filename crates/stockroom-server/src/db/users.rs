use rusqlite::{Connection, OptionalExtension};

use crate::auth::{password, SUPER_USER_ID};
use crate::error::{not_found, AppError, AppResult};
use crate::models::User;

const USER_COLS: &str = "id, name, password_hash, created_at";

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        name: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
    })
}

pub fn find_by_name(conn: &Connection, name: &str) -> AppResult<Option<User>> {
    Ok(conn
        .query_row(
            &format!("SELECT {USER_COLS} FROM users WHERE name = ?1"),
            rusqlite::params![name],
            row_to_user,
        )
        .optional()?)
}

pub fn get(conn: &Connection, id: i64) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {USER_COLS} FROM users WHERE id = ?1"),
        rusqlite::params![id],
        row_to_user,
    )
    .map_err(not_found("User"))
}

pub fn create(conn: &Connection, name: &str, plain_password: &str) -> AppResult<User> {
    let password_hash = password::hash_password(plain_password)?;
    let result = conn.execute(
        "INSERT INTO users (name, password_hash) VALUES (?1, ?2)",
        rusqlite::params![name, password_hash],
    );

    match result {
        Ok(_) => {}
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            return Err(AppError::Conflict(format!("User {name} already exists")));
        }
        Err(e) => return Err(AppError::Database(e)),
    }

    get(conn, conn.last_insert_rowid())
}

/// Creates the super-user as row 1 when the table is still empty.
/// Returns whether an account was inserted.
pub fn seed_super_user(conn: &Connection, name: &str, plain_password: &str) -> AppResult<bool> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
    if count > 0 {
        return Ok(false);
    }
    let password_hash = password::hash_password(plain_password)?;
    conn.execute(
        "INSERT INTO users (id, name, password_hash) VALUES (?1, ?2, ?3)",
        rusqlite::params![SUPER_USER_ID, name, password_hash],
    )?;
    Ok(true)
}

/// Looks the user up by name and checks the password. `None` covers both an
/// unknown name and a wrong password.
pub fn authenticate(conn: &Connection, name: &str, plain_password: &str) -> AppResult<Option<User>> {
    let Some(user) = find_by_name(conn, name)? else {
        return Ok(None);
    };
    if password::verify_password(plain_password, &user.password_hash)? {
        Ok(Some(user))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;

    #[test]
    fn seeds_once_with_id_one() {
        let conn = test_connection();
        assert!(seed_super_user(&conn, "admin", "secret").unwrap());
        assert!(!seed_super_user(&conn, "other", "secret").unwrap());
        assert_eq!(get(&conn, SUPER_USER_ID).unwrap().name, "admin");
    }

    #[test]
    fn authenticate_checks_password() {
        let conn = test_connection();
        let staff = create(&conn, "staff", "pw-123").unwrap();
        assert_eq!(authenticate(&conn, "staff", "pw-123").unwrap().unwrap().id, staff.id);
        assert!(authenticate(&conn, "staff", "nope").unwrap().is_none());
        assert!(authenticate(&conn, "ghost", "pw-123").unwrap().is_none());
    }

    #[test]
    fn duplicate_name_conflicts() {
        let conn = test_connection();
        create(&conn, "staff", "a").unwrap();
        assert!(matches!(create(&conn, "staff", "b"), Err(AppError::Conflict(_))));
    }
}
