use rusqlite::Connection;

use crate::auth::is_super_user;
use crate::db::now_timestamp;
use crate::error::{not_found, AppError, AppResult};
use crate::models::{ListPage, Product, ProductInput, ProductSummary};
use crate::services::calculator::derive_fields;
use crate::services::listing::{self, ListParams, ListShape};

const PRODUCT_COLS: &str = "id, user_id, area_id, photo, customer_name, brand, size, quantity, address, mark, status_note_photo, cost_eur, exchange_rate, cost_rmb, price_rmb, shipping_fee, total_cost, profit, revision, created_at, updated_at";

pub const LIST_SHAPE: ListShape = ListShape {
    table: "products",
    columns: PRODUCT_COLS,
    orderable: &[
        "id",
        "customer_name",
        "size",
        "quantity",
        "cost_eur",
        "exchange_rate",
        "cost_rmb",
        "price_rmb",
        "shipping_fee",
        "total_cost",
        "profit",
        "created_at",
        "updated_at",
    ],
    keyword_columns: &[
        "customer_name",
        "size",
        "address",
        "mark",
        "brand",
        "cost_eur",
        "cost_rmb",
        "price_rmb",
        "shipping_fee",
        "total_cost",
        "profit",
    ],
    date_column: "updated_at",
    area_column: Some("area_id"),
};

fn row_to_product(row: &rusqlite::Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        user_id: row.get(1)?,
        area_id: row.get(2)?,
        photo: row.get(3)?,
        customer_name: row.get(4)?,
        brand: row.get(5)?,
        size: row.get(6)?,
        quantity: row.get(7)?,
        address: row.get(8)?,
        mark: row.get(9)?,
        status_note_photo: row.get(10)?,
        cost_eur: row.get(11)?,
        exchange_rate: row.get(12)?,
        cost_rmb: row.get(13)?,
        price_rmb: row.get(14)?,
        shipping_fee: row.get(15)?,
        total_cost: row.get(16)?,
        profit: row.get(17)?,
        revision: row.get(18)?,
        created_at: row.get(19)?,
        updated_at: row.get(20)?,
    })
}

pub fn get(conn: &Connection, id: i64) -> AppResult<Product> {
    conn.query_row(
        &format!("SELECT {PRODUCT_COLS} FROM products WHERE id = ?1"),
        rusqlite::params![id],
        row_to_product,
    )
    .map_err(not_found("Product"))
}

pub fn create(conn: &Connection, user_id: i64, input: ProductInput) -> AppResult<Product> {
    let now = now_timestamp();
    let mut p = Product {
        user_id,
        area_id: input.area_id,
        photo: input.photo,
        customer_name: input.customer_name,
        brand: input.brand,
        size: input.size,
        address: input.address,
        mark: input.mark,
        status_note_photo: input.status_note_photo,
        cost_eur: input.cost_eur,
        exchange_rate: input.exchange_rate,
        price_rmb: input.price_rmb,
        shipping_fee: input.shipping_fee,
        created_at: now.clone(),
        updated_at: now,
        ..Default::default()
    };
    derive_fields(&mut p);

    conn.execute(
        "INSERT INTO products (user_id, area_id, photo, customer_name, brand, size, quantity, address, mark, status_note_photo,
                               cost_eur, exchange_rate, cost_rmb, price_rmb, shipping_fee, total_cost, profit, revision, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, 0, ?18, ?19)",
        rusqlite::params![
            p.user_id, p.area_id, p.photo, p.customer_name, p.brand, p.size, p.quantity,
            p.address, p.mark, p.status_note_photo, p.cost_eur, p.exchange_rate, p.cost_rmb,
            p.price_rmb, p.shipping_fee, p.total_cost, p.profit, p.created_at, p.updated_at
        ],
    )?;
    p.id = conn.last_insert_rowid();
    Ok(p)
}

/// Replaces every editable field. Callers other than the super-user may only
/// change `photo`, `mark` and `status_note_photo`, the same fields they can patch.
pub fn update(conn: &Connection, id: i64, caller_id: i64, input: ProductInput) -> AppResult<Product> {
    let existing = get(conn, id)?;
    let revision = input.revision.unwrap_or(existing.revision);

    let mut p = if is_super_user(caller_id) {
        Product {
            area_id: input.area_id,
            photo: input.photo,
            customer_name: input.customer_name,
            brand: input.brand,
            size: input.size,
            address: input.address,
            mark: input.mark,
            status_note_photo: input.status_note_photo,
            cost_eur: input.cost_eur,
            exchange_rate: input.exchange_rate,
            price_rmb: input.price_rmb,
            shipping_fee: input.shipping_fee,
            revision,
            ..existing
        }
    } else {
        Product {
            photo: input.photo,
            mark: input.mark,
            status_note_photo: input.status_note_photo,
            revision,
            ..existing
        }
    };
    derive_fields(&mut p);
    save(conn, &p)
}

/// Persists the whole row if `product.revision` is still current, bumping
/// the revision. Derived fields are written as given.
pub fn save(conn: &Connection, product: &Product) -> AppResult<Product> {
    let now = now_timestamp();
    let p = product;
    let affected = conn.execute(
        "UPDATE products SET area_id = ?1, photo = ?2, customer_name = ?3, brand = ?4, size = ?5, quantity = ?6,
                address = ?7, mark = ?8, status_note_photo = ?9, cost_eur = ?10, exchange_rate = ?11, cost_rmb = ?12,
                price_rmb = ?13, shipping_fee = ?14, total_cost = ?15, profit = ?16,
                revision = revision + 1, updated_at = ?17
         WHERE id = ?18 AND revision = ?19",
        rusqlite::params![
            p.area_id, p.photo, p.customer_name, p.brand, p.size, p.quantity,
            p.address, p.mark, p.status_note_photo, p.cost_eur, p.exchange_rate, p.cost_rmb,
            p.price_rmb, p.shipping_fee, p.total_cost, p.profit, now, p.id, p.revision
        ],
    )?;

    if affected == 0 {
        // Either the row vanished or someone else wrote first.
        get(conn, p.id)?;
        return Err(AppError::Conflict(
            "Product was modified by another request; reload and retry".into(),
        ));
    }

    Ok(Product {
        revision: p.revision + 1,
        updated_at: now,
        ..p.clone()
    })
}

/// Deletes the listed products. Only the super-user may delete products
/// created by someone else; other ids are skipped. Returns the count removed.
pub fn delete_many(conn: &Connection, ids: &[i64], caller_id: i64) -> AppResult<usize> {
    super::delete_owned(conn, "products", ids, caller_id)
}

pub fn list(conn: &Connection, params: &ListParams) -> AppResult<ListPage<Product>> {
    let mut page = listing::fetch_page(conn, &LIST_SHAPE, params, row_to_product)?;
    page.summary = Some(summary(conn, params)?);
    Ok(page)
}

/// Totals over the same filter as the list, ignoring pagination.
pub fn summary(conn: &Connection, params: &ListParams) -> AppResult<ProductSummary> {
    let pred = listing::predicate(&LIST_SHAPE, params);
    let sql = format!(
        "SELECT COALESCE(SUM(cost_eur), 0), COALESCE(SUM(cost_rmb), 0), COALESCE(SUM(price_rmb), 0),
                COALESCE(SUM(shipping_fee), 0), COALESCE(SUM(total_cost), 0), COALESCE(SUM(profit), 0),
                COALESCE(SUM(quantity), 0)
         FROM products {}",
        pred.clause
    );
    Ok(conn.query_row(&sql, rusqlite::params_from_iter(pred.params()), |row| {
        Ok(ProductSummary {
            total_cost_eur: row.get(0)?,
            total_cost_rmb: row.get(1)?,
            total_price_rmb: row.get(2)?,
            total_shipping_fee: row.get(3)?,
            total_cost: row.get(4)?,
            total_profit: row.get(5)?,
            total_quantity: row.get(6)?,
        })
    })?)
}
