use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPublic {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

impl From<User> for UserPublic {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            name: u.name,
            created_at: u.created_at,
        }
    }
}

/// Identity carried by a request, decoded from its token. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Area {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Deserialize)]
pub struct AreaInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct AreaList {
    pub total: i64,
    pub list: Vec<Area>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub user_id: i64,
    pub area_id: Option<i64>,
    pub photo: String,
    pub customer_name: String,
    pub brand: String,
    pub size: String,
    pub quantity: i64,
    pub address: String,
    pub mark: String,
    pub status_note_photo: String,
    pub cost_eur: f64,
    pub exchange_rate: f64,
    pub cost_rmb: f64,
    pub price_rmb: f64,
    pub shipping_fee: f64,
    pub total_cost: f64,
    pub profit: f64,
    pub revision: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Body of product create and full update. Derived fields are never read
/// from the client; `revision`, when present, must match the stored one.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductInput {
    pub area_id: Option<i64>,
    pub photo: String,
    pub customer_name: String,
    pub brand: String,
    pub size: String,
    pub address: String,
    pub mark: String,
    pub status_note_photo: String,
    pub cost_eur: f64,
    pub exchange_rate: f64,
    pub price_rmb: f64,
    pub shipping_fee: f64,
    pub revision: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductSummary {
    pub total_cost_eur: f64,
    pub total_cost_rmb: f64,
    pub total_price_rmb: f64,
    pub total_shipping_fee: f64,
    pub total_cost: f64,
    pub total_profit: f64,
    pub total_quantity: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Arrival {
    pub id: i64,
    pub user_id: i64,
    pub arrival_photo: String,
    pub quantity: String,
    pub brand: String,
    pub box_number: String,
    pub arrival_date: String,
    pub confirm_person: String,
    pub revision: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ArrivalInput {
    pub arrival_photo: String,
    pub quantity: String,
    pub brand: String,
    pub box_number: String,
    pub arrival_date: String,
    pub confirm_person: String,
    pub revision: Option<i64>,
}

/// A list row plus its 1-based position across the whole filtered result.
#[derive(Debug, Clone, Serialize)]
pub struct Listed<T> {
    pub sid: i64,
    #[serde(flatten)]
    pub item: T,
}

#[derive(Debug, Serialize)]
pub struct ListPage<T> {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub list: Vec<Listed<T>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<ProductSummary>,
}
