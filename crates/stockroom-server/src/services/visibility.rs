//! Masks financial figures for everyone except the super-user.
//!
//! Values are fetched unredacted and zeroed just before serialization, so
//! the same query serves both roles.

use crate::auth::is_super_user;
use crate::models::{ListPage, Listed, Product, ProductSummary};

pub trait Redact {
    fn redact(&mut self);
}

impl Redact for Product {
    fn redact(&mut self) {
        self.cost_eur = 0.0;
        self.exchange_rate = 0.0;
        self.cost_rmb = 0.0;
        self.total_cost = 0.0;
        self.profit = 0.0;
        self.shipping_fee = 0.0;
    }
}

impl Redact for ProductSummary {
    fn redact(&mut self) {
        self.total_cost_eur = 0.0;
        self.total_cost_rmb = 0.0;
        self.total_price_rmb = 0.0;
        self.total_shipping_fee = 0.0;
        self.total_cost = 0.0;
        self.total_profit = 0.0;
    }
}

impl<T: Redact> Redact for Listed<T> {
    fn redact(&mut self) {
        self.item.redact();
    }
}

impl<T: Redact> Redact for ListPage<T> {
    fn redact(&mut self) {
        self.list.iter_mut().for_each(Redact::redact);
        if let Some(summary) = self.summary.as_mut() {
            summary.redact();
        }
    }
}

/// Returns `value` as the given viewer is allowed to see it.
pub fn for_viewer<T: Redact>(viewer_id: i64, mut value: T) -> T {
    if !is_super_user(viewer_id) {
        value.redact();
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SUPER_USER_ID;

    fn priced() -> Product {
        Product {
            cost_eur: 10.0,
            exchange_rate: 7.8,
            cost_rmb: 78.0,
            price_rmb: 100.0,
            shipping_fee: 5.0,
            total_cost: 83.0,
            profit: 17.0,
            quantity: 4,
            ..Default::default()
        }
    }

    #[test]
    fn super_user_sees_everything() {
        assert_eq!(for_viewer(SUPER_USER_ID, priced()), priced());
    }

    #[test]
    fn staff_sees_zeroed_costs() {
        let p = for_viewer(7, priced());
        assert_eq!(
            (p.cost_eur, p.exchange_rate, p.cost_rmb, p.total_cost, p.profit, p.shipping_fee),
            (0.0, 0.0, 0.0, 0.0, 0.0, 0.0)
        );
        assert_eq!(p.price_rmb, 100.0);
        assert_eq!(p.quantity, 4);
    }

    #[test]
    fn page_masks_items_and_summary() {
        let page = ListPage {
            total: 1,
            page: 1,
            page_size: 20,
            list: vec![Listed { sid: 1, item: priced() }],
            summary: Some(ProductSummary {
                total_cost_eur: 10.0,
                total_cost_rmb: 78.0,
                total_price_rmb: 100.0,
                total_shipping_fee: 5.0,
                total_cost: 83.0,
                total_profit: 17.0,
                total_quantity: 4,
            }),
        };
        let page = for_viewer(2, page);
        assert_eq!(page.list[0].item.profit, 0.0);
        let summary = page.summary.unwrap();
        assert_eq!(summary.total_profit, 0.0);
        assert_eq!(summary.total_price_rmb, 0.0);
        assert_eq!(summary.total_quantity, 4);
    }
}
