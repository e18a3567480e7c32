use rusqlite::Connection;

use crate::auth::is_super_user;
use crate::db::now_timestamp;
use crate::error::{not_found, AppError, AppResult};
use crate::models::{Area, AreaInput, AreaList};

const AREA_COLS: &str = "id, user_id, name, description, created_at, updated_at";

fn row_to_area(row: &rusqlite::Row) -> rusqlite::Result<Area> {
    Ok(Area {
        id: row.get(0)?,
        user_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn list(conn: &Connection) -> AppResult<AreaList> {
    let mut stmt = conn.prepare(&format!("SELECT {AREA_COLS} FROM areas ORDER BY id ASC"))?;
    let rows = stmt.query_map([], row_to_area)?;
    let list: Result<Vec<_>, _> = rows.collect();
    let list = list?;
    Ok(AreaList {
        total: list.len() as i64,
        list,
    })
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Area> {
    conn.query_row(
        &format!("SELECT {AREA_COLS} FROM areas WHERE id = ?1"),
        rusqlite::params![id],
        row_to_area,
    )
    .map_err(not_found("Area"))
}

pub fn create(conn: &Connection, user_id: i64, input: AreaInput) -> AppResult<Area> {
    let name = validated_name(&input.name)?;
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO areas (user_id, name, description, created_at, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![user_id, name, input.description, now, now],
    )?;

    Ok(Area {
        id: conn.last_insert_rowid(),
        user_id,
        name,
        description: input.description,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn update(conn: &Connection, id: i64, input: AreaInput) -> AppResult<Area> {
    let name = validated_name(&input.name)?;
    let existing = get(conn, id)?;
    let now = now_timestamp();

    conn.execute(
        "UPDATE areas SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
        rusqlite::params![name, input.description, now, id],
    )?;

    Ok(Area {
        name,
        description: input.description,
        updated_at: now,
        ..existing
    })
}

/// Products keep their `area_id` after the area is gone.
pub fn delete(conn: &Connection, id: i64, caller_id: i64) -> AppResult<()> {
    let area = get(conn, id)?;
    if area.user_id != caller_id && !is_super_user(caller_id) {
        return Err(AppError::Forbidden(
            "Only the creator or the super-user may delete this area".into(),
        ));
    }
    conn.execute("DELETE FROM areas WHERE id = ?1", rusqlite::params![id])?;
    Ok(())
}

fn validated_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Name is required".into()));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SUPER_USER_ID;
    use crate::db::{products, test_connection};
    use crate::models::ProductInput;

    fn area(name: &str) -> AreaInput {
        AreaInput {
            name: name.into(),
            description: "north wall".into(),
        }
    }

    #[test]
    fn list_is_ordered_by_id() {
        let conn = test_connection();
        create(&conn, 2, area("B")).unwrap();
        create(&conn, 3, area("A")).unwrap();
        let all = list(&conn).unwrap();
        assert_eq!(all.total, 2);
        assert_eq!(
            all.list.iter().map(|a| a.name.as_str()).collect::<Vec<_>>(),
            vec!["B", "A"]
        );
    }

    #[test]
    fn blank_name_is_rejected() {
        let conn = test_connection();
        assert!(matches!(create(&conn, 2, area("  ")), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn delete_leaves_products_pointing_at_the_area() {
        let conn = test_connection();
        let zone = create(&conn, 2, area("Zone 1")).unwrap();
        let p = products::create(
            &conn,
            SUPER_USER_ID,
            ProductInput {
                area_id: Some(zone.id),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(matches!(delete(&conn, zone.id, 3), Err(AppError::Forbidden(_))));
        delete(&conn, zone.id, 2).unwrap();
        assert!(matches!(get(&conn, zone.id), Err(AppError::NotFound(_))));
        assert_eq!(products::get(&conn, p.id).unwrap().area_id, Some(zone.id));
    }
}
