//! Single-field updates.
//!
//! A `{field, value}` request is parsed into a typed patch up front, so an
//! unknown field or an uncoercible value is rejected before anything is read.
//! Applying a patch loads the record, mutates it, recomputes derived fields
//! and writes the whole row back, all inside one `BEGIN IMMEDIATE`
//! transaction guarded by the record's revision.

use rusqlite::{Connection, TransactionBehavior};
use serde_json::Value;

use crate::auth::is_super_user;
use crate::error::{AppError, AppResult};
use crate::models::{Arrival, Product};
use crate::services::calculator;

/// A record type that can be patched one field at a time.
pub trait Patchable: Sized {
    type Patch: FieldPatch<Record = Self>;

    fn load(conn: &Connection, id: i64) -> AppResult<Self>;

    /// Writes the full record, failing with `Conflict` if the stored
    /// revision no longer matches `self.revision`.
    fn store(conn: &Connection, record: &Self) -> AppResult<Self>;

    fn recompute(&mut self) {}
}

pub trait FieldPatch: Sized {
    type Record;

    fn parse(field: &str, value: &Value) -> AppResult<Self>;

    fn apply(self, record: &mut Self::Record);
}

pub fn apply_patch<R: Patchable>(conn: &mut Connection, id: i64, patch: R::Patch) -> AppResult<R> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut record = R::load(&tx, id)?;
    patch.apply(&mut record);
    record.recompute();
    let saved = R::store(&tx, &record)?;
    tx.commit()?;
    Ok(saved)
}

#[derive(Debug)]
pub enum PatchOutcome<T> {
    Applied(T),
    /// The caller may not touch this field; nothing was written.
    Denied,
}

/// Parses and applies a product patch on behalf of `caller_id`.
pub fn patch_product(
    conn: &mut Connection,
    id: i64,
    caller_id: i64,
    field: &str,
    value: &Value,
) -> AppResult<PatchOutcome<Product>> {
    let patch = ProductPatch::parse(field, value)?;
    if !is_super_user(caller_id) && !patch.is_presentation() {
        tracing::warn!(product_id = id, caller_id, field, "Denied product field patch");
        return Ok(PatchOutcome::Denied);
    }
    let product = apply_patch::<Product>(conn, id, patch)?;
    tracing::info!(product_id = id, caller_id, field, "Patched product field");
    Ok(PatchOutcome::Applied(product))
}

pub fn patch_arrival(
    conn: &mut Connection,
    id: i64,
    caller_id: i64,
    field: &str,
    value: &Value,
) -> AppResult<Arrival> {
    let patch = ArrivalPatch::parse(field, value)?;
    let arrival = apply_patch::<Arrival>(conn, id, patch)?;
    tracing::info!(arrival_id = id, caller_id, field, "Patched arrival field");
    Ok(arrival)
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProductPatch {
    AreaId(Option<i64>),
    Photo(String),
    CustomerName(String),
    Brand(String),
    Size(String),
    Address(String),
    Mark(String),
    StatusNotePhoto(String),
    CostEur(f64),
    ExchangeRate(f64),
    PriceRmb(f64),
    ShippingFee(f64),
}

impl ProductPatch {
    /// Fields any signed-in user may change.
    pub fn is_presentation(&self) -> bool {
        matches!(
            self,
            ProductPatch::Photo(_) | ProductPatch::Mark(_) | ProductPatch::StatusNotePhoto(_)
        )
    }
}

impl FieldPatch for ProductPatch {
    type Record = Product;

    fn parse(field: &str, value: &Value) -> AppResult<Self> {
        Ok(match field {
            "area_id" => ProductPatch::AreaId(optional_id(field, value)?),
            "photo" => ProductPatch::Photo(text(field, value)?),
            "customer_name" => ProductPatch::CustomerName(text(field, value)?),
            "brand" => ProductPatch::Brand(text(field, value)?),
            "size" => ProductPatch::Size(text(field, value)?),
            "address" => ProductPatch::Address(text(field, value)?),
            "mark" => ProductPatch::Mark(text(field, value)?),
            "status_note_photo" => ProductPatch::StatusNotePhoto(text(field, value)?),
            "cost_eur" => ProductPatch::CostEur(number(field, value)?),
            "exchange_rate" => ProductPatch::ExchangeRate(number(field, value)?),
            "price_rmb" => ProductPatch::PriceRmb(number(field, value)?),
            "shipping_fee" => ProductPatch::ShippingFee(number(field, value)?),
            other => return Err(AppError::UnknownField(other.to_string())),
        })
    }

    fn apply(self, p: &mut Product) {
        match self {
            ProductPatch::AreaId(v) => p.area_id = v,
            ProductPatch::Photo(v) => p.photo = v,
            ProductPatch::CustomerName(v) => p.customer_name = v,
            ProductPatch::Brand(v) => p.brand = v,
            ProductPatch::Size(v) => p.size = v,
            ProductPatch::Address(v) => p.address = v,
            ProductPatch::Mark(v) => p.mark = v,
            ProductPatch::StatusNotePhoto(v) => p.status_note_photo = v,
            ProductPatch::CostEur(v) => p.cost_eur = v,
            ProductPatch::ExchangeRate(v) => p.exchange_rate = v,
            ProductPatch::PriceRmb(v) => p.price_rmb = v,
            ProductPatch::ShippingFee(v) => p.shipping_fee = v,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArrivalPatch {
    ArrivalPhoto(String),
    Quantity(String),
    Brand(String),
    BoxNumber(String),
    ArrivalDate(String),
    ConfirmPerson(String),
}

impl FieldPatch for ArrivalPatch {
    type Record = Arrival;

    fn parse(field: &str, value: &Value) -> AppResult<Self> {
        let v = || text(field, value);
        Ok(match field {
            "arrival_photo" => ArrivalPatch::ArrivalPhoto(v()?),
            "quantity" => ArrivalPatch::Quantity(v()?),
            "brand" => ArrivalPatch::Brand(v()?),
            "box_number" => ArrivalPatch::BoxNumber(v()?),
            "arrival_date" => ArrivalPatch::ArrivalDate(v()?),
            "confirm_person" => ArrivalPatch::ConfirmPerson(v()?),
            other => return Err(AppError::UnknownField(other.to_string())),
        })
    }

    fn apply(self, a: &mut Arrival) {
        match self {
            ArrivalPatch::ArrivalPhoto(v) => a.arrival_photo = v,
            ArrivalPatch::Quantity(v) => a.quantity = v,
            ArrivalPatch::Brand(v) => a.brand = v,
            ArrivalPatch::BoxNumber(v) => a.box_number = v,
            ArrivalPatch::ArrivalDate(v) => a.arrival_date = v,
            ArrivalPatch::ConfirmPerson(v) => a.confirm_person = v,
        }
    }
}

impl Patchable for Product {
    type Patch = ProductPatch;

    fn load(conn: &Connection, id: i64) -> AppResult<Self> {
        crate::db::products::get(conn, id)
    }

    fn store(conn: &Connection, record: &Self) -> AppResult<Self> {
        crate::db::products::save(conn, record)
    }

    fn recompute(&mut self) {
        calculator::derive_fields(self);
    }
}

impl Patchable for Arrival {
    type Patch = ArrivalPatch;

    fn load(conn: &Connection, id: i64) -> AppResult<Self> {
        crate::db::arrivals::get(conn, id)
    }

    fn store(conn: &Connection, record: &Self) -> AppResult<Self> {
        crate::db::arrivals::save(conn, record)
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> AppError {
    AppError::InvalidFieldValue {
        field: field.to_string(),
        reason: reason.into(),
    }
}

fn number(field: &str, value: &Value) -> AppResult<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| invalid(field, format!("expected a number, got {value}")))
}

fn text(field: &str, value: &Value) -> AppResult<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        _ => Err(invalid(field, format!("expected text, got {value}"))),
    }
}

fn optional_id(field: &str, value: &Value) -> AppResult<Option<i64>> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(field, format!("expected an integer id, got {n}"))),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| invalid(field, format!("expected an integer id, got {s:?}"))),
        other => Err(invalid(field, format!("expected an integer id, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_accept_native_and_string() {
        assert_eq!(
            ProductPatch::parse("cost_eur", &json!(12.5)).unwrap(),
            ProductPatch::CostEur(12.5)
        );
        assert_eq!(
            ProductPatch::parse("shipping_fee", &json!(" 7 ")).unwrap(),
            ProductPatch::ShippingFee(7.0)
        );
    }

    #[test]
    fn bad_number_is_an_error_not_a_no_op() {
        for bad in [json!("abc"), json!(null), json!(true), json!([1]), json!("NaN")] {
            let err = ProductPatch::parse("price_rmb", &bad).unwrap_err();
            assert!(matches!(err, AppError::InvalidFieldValue { .. }), "{bad}");
        }
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(matches!(
            ProductPatch::parse("profit", &json!(1)),
            Err(AppError::UnknownField(f)) if f == "profit"
        ));
        assert!(matches!(
            ArrivalPatch::parse("cost_eur", &json!(1)),
            Err(AppError::UnknownField(_))
        ));
    }

    #[test]
    fn area_id_accepts_null_int_and_string() {
        assert_eq!(ProductPatch::parse("area_id", &json!(null)).unwrap(), ProductPatch::AreaId(None));
        assert_eq!(ProductPatch::parse("area_id", &json!(3)).unwrap(), ProductPatch::AreaId(Some(3)));
        assert_eq!(ProductPatch::parse("area_id", &json!("4")).unwrap(), ProductPatch::AreaId(Some(4)));
        assert_eq!(ProductPatch::parse("area_id", &json!("")).unwrap(), ProductPatch::AreaId(None));
        assert!(ProductPatch::parse("area_id", &json!(2.5)).is_err());
    }

    #[test]
    fn text_fields_stringify_numbers() {
        assert_eq!(
            ArrivalPatch::parse("quantity", &json!(12)).unwrap(),
            ArrivalPatch::Quantity("12".into())
        );
        assert!(ArrivalPatch::parse("brand", &json!({"a": 1})).is_err());
    }

    #[test]
    fn only_presentation_fields_are_open_to_staff() {
        let open: Vec<_> = ["photo", "mark", "status_note_photo"]
            .iter()
            .map(|f| ProductPatch::parse(f, &json!("x")).unwrap())
            .collect();
        assert!(open.iter().all(ProductPatch::is_presentation));

        for f in ["customer_name", "brand", "size", "address"] {
            assert!(!ProductPatch::parse(f, &json!("x")).unwrap().is_presentation());
        }
        assert!(!ProductPatch::parse("cost_eur", &json!(1)).unwrap().is_presentation());
        assert!(!ProductPatch::parse("area_id", &json!(1)).unwrap().is_presentation());
    }
}
