use rusqlite::Connection;

use crate::db::now_timestamp;
use crate::error::{not_found, AppError, AppResult};
use crate::models::{Arrival, ArrivalInput, ListPage};
use crate::services::listing::{self, ListParams, ListShape};

const ARRIVAL_COLS: &str = "id, user_id, arrival_photo, quantity, brand, box_number, arrival_date, confirm_person, revision, created_at, updated_at";

pub const LIST_SHAPE: ListShape = ListShape {
    table: "arrivals",
    columns: ARRIVAL_COLS,
    orderable: &[
        "id",
        "quantity",
        "brand",
        "box_number",
        "arrival_date",
        "confirm_person",
        "created_at",
        "updated_at",
    ],
    keyword_columns: &["quantity", "brand", "box_number", "confirm_person"],
    date_column: "arrival_date",
    area_column: None,
};

fn row_to_arrival(row: &rusqlite::Row) -> rusqlite::Result<Arrival> {
    Ok(Arrival {
        id: row.get(0)?,
        user_id: row.get(1)?,
        arrival_photo: row.get(2)?,
        quantity: row.get(3)?,
        brand: row.get(4)?,
        box_number: row.get(5)?,
        arrival_date: row.get(6)?,
        confirm_person: row.get(7)?,
        revision: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Arrival> {
    conn.query_row(
        &format!("SELECT {ARRIVAL_COLS} FROM arrivals WHERE id = ?1"),
        rusqlite::params![id],
        row_to_arrival,
    )
    .map_err(not_found("Arrival"))
}

pub fn create(conn: &Connection, user_id: i64, input: ArrivalInput) -> AppResult<Arrival> {
    let now = now_timestamp();
    conn.execute(
        "INSERT INTO arrivals (user_id, arrival_photo, quantity, brand, box_number, arrival_date, confirm_person, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        rusqlite::params![
            user_id, input.arrival_photo, input.quantity, input.brand, input.box_number,
            input.arrival_date, input.confirm_person, now, now
        ],
    )?;

    Ok(Arrival {
        id: conn.last_insert_rowid(),
        user_id,
        arrival_photo: input.arrival_photo,
        quantity: input.quantity,
        brand: input.brand,
        box_number: input.box_number,
        arrival_date: input.arrival_date,
        confirm_person: input.confirm_person,
        revision: 0,
        created_at: now.clone(),
        updated_at: now,
    })
}

pub fn update(conn: &Connection, id: i64, input: ArrivalInput) -> AppResult<Arrival> {
    let existing = get(conn, id)?;
    let arrival = Arrival {
        revision: input.revision.unwrap_or(existing.revision),
        arrival_photo: input.arrival_photo,
        quantity: input.quantity,
        brand: input.brand,
        box_number: input.box_number,
        arrival_date: input.arrival_date,
        confirm_person: input.confirm_person,
        ..existing
    };
    save(conn, &arrival)
}

/// Writes the full row if `arrival.revision` is still current.
pub fn save(conn: &Connection, arrival: &Arrival) -> AppResult<Arrival> {
    let now = now_timestamp();
    let a = arrival;
    let affected = conn.execute(
        "UPDATE arrivals SET arrival_photo = ?1, quantity = ?2, brand = ?3, box_number = ?4, arrival_date = ?5,
                confirm_person = ?6, revision = revision + 1, updated_at = ?7
         WHERE id = ?8 AND revision = ?9",
        rusqlite::params![
            a.arrival_photo, a.quantity, a.brand, a.box_number, a.arrival_date,
            a.confirm_person, now, a.id, a.revision
        ],
    )?;

    if affected == 0 {
        get(conn, a.id)?;
        return Err(AppError::Conflict(
            "Arrival was modified by another request; reload and retry".into(),
        ));
    }

    Ok(Arrival {
        revision: a.revision + 1,
        updated_at: now,
        ..a.clone()
    })
}

pub fn delete_many(conn: &Connection, ids: &[i64], caller_id: i64) -> AppResult<usize> {
    super::delete_owned(conn, "arrivals", ids, caller_id)
}

pub fn list(conn: &Connection, params: &ListParams) -> AppResult<ListPage<Arrival>> {
    listing::fetch_page(conn, &LIST_SHAPE, params, row_to_arrival)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_connection;
    use crate::services::listing::ListQuery;

    fn input(brand: &str, date: &str) -> ArrivalInput {
        ArrivalInput {
            quantity: "3箱".into(),
            brand: brand.into(),
            box_number: "B-7".into(),
            arrival_date: date.into(),
            confirm_person: "Zhang".into(),
            ..Default::default()
        }
    }

    #[test]
    fn create_then_update_round_trip() {
        let conn = test_connection();
        let a = create(&conn, 2, input("Acme", "2024-05-01")).unwrap();
        assert_eq!(get(&conn, a.id).unwrap(), a);

        let updated = update(&conn, a.id, input("Globex", "2024-05-02")).unwrap();
        assert_eq!(updated.brand, "Globex");
        assert_eq!(updated.revision, 1);
        assert_eq!(updated.user_id, 2);
        assert_eq!(get(&conn, a.id).unwrap(), updated);
    }

    #[test]
    fn list_filters_on_arrival_date_and_has_no_summary() {
        let conn = test_connection();
        for day in 1..=6 {
            create(&conn, 2, input("Acme", &format!("2024-05-0{day}"))).unwrap();
        }
        let params = ListParams::from_query(
            &LIST_SHAPE,
            ListQuery {
                start_time: Some("2024-05-02".into()),
                end_time: Some("2024-05-04".into()),
                page_size: Some("500".into()),
                ..Default::default()
            },
        );
        let page = list(&conn, &params).unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.page_size, 20);
        assert!(page.summary.is_none());
    }

    #[test]
    fn delete_is_owner_scoped() {
        let conn = test_connection();
        let a = create(&conn, 2, input("Acme", "2024-05-01")).unwrap();
        assert_eq!(delete_many(&conn, &[a.id], 3).unwrap(), 0);
        assert_eq!(delete_many(&conn, &[a.id], 2).unwrap(), 1);
        assert!(matches!(get(&conn, a.id), Err(AppError::NotFound(_))));
    }
}
