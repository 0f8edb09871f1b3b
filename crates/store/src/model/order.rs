use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::round_money;
use crate::RecordId;

/// An order together with the line items it exclusively owns.
///
/// The order and its items are written as one unit: once the order is
/// persisted, every item's `order_id` equals the order's `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: RecordId,
    pub payment_method: String,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Items in the order the caller supplied them; this is also the insert order.
    pub items: Vec<OrderItem>,
}

impl Order {
    /// Creates an order with no items that has not been persisted yet.
    pub fn new(
        payment_method: impl Into<String>,
        tax_price: Decimal,
        shipping_price: Decimal,
        total_price: Decimal,
    ) -> Self {
        Self {
            id: RecordId::UNSET,
            payment_method: payment_method.into(),
            tax_price,
            shipping_price,
            total_price,
            created_at: Utc::now(),
            updated_at: None,
            items: Vec::new(),
        }
    }

    /// Appends an item, keeping caller order.
    pub fn with_item(mut self, item: OrderItem) -> Self {
        self.items.push(item);
        self
    }

    /// Returns true if every item points back at this order.
    pub fn items_belong_to_order(&self) -> bool {
        self.id.is_set() && self.items.iter().all(|item| item.order_id == self.id)
    }

    /// Rounds the order prices and every item price to the stored money scale.
    pub fn round_money(&mut self) {
        self.tax_price = round_money(self.tax_price);
        self.shipping_price = round_money(self.shipping_price);
        self.total_price = round_money(self.total_price);
        for item in &mut self.items {
            item.price = round_money(item.price);
        }
    }
}

/// A line of an order, referencing (but not owning) a product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: RecordId,
    pub name: String,
    pub quantity: i32,
    pub image: String,
    pub price: Decimal,
    pub product_id: RecordId,
    /// Set by the order writer, never by the caller.
    pub order_id: RecordId,
}

impl OrderItem {
    /// Creates an item that has not been persisted yet.
    pub fn new(
        name: impl Into<String>,
        quantity: i32,
        price: Decimal,
        product_id: RecordId,
    ) -> Self {
        Self {
            id: RecordId::UNSET,
            name: name.into(),
            quantity,
            image: String::new(),
            price,
            product_id,
            order_id: RecordId::UNSET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_order_is_unidentified() {
        let order = Order::new(
            "card",
            Decimal::new(500, 2),
            Decimal::new(1000, 2),
            Decimal::new(11500, 2),
        )
        .with_item(OrderItem::new(
            "Widget",
            2,
            Decimal::new(5000, 2),
            RecordId::new(7),
        ));

        assert!(!order.id.is_set());
        assert_eq!(order.items.len(), 1);
        assert!(!order.items[0].id.is_set());
        assert!(!order.items[0].order_id.is_set());
        assert!(!order.items_belong_to_order());
    }

    #[test]
    fn items_belong_once_identities_are_propagated() {
        let mut order = Order::new("card", Decimal::ZERO, Decimal::ZERO, Decimal::ZERO)
            .with_item(OrderItem::new("A", 1, Decimal::ONE, RecordId::new(1)))
            .with_item(OrderItem::new("B", 1, Decimal::ONE, RecordId::new(2)));

        order.id = RecordId::new(10);
        for item in &mut order.items {
            item.order_id = order.id;
        }
        assert!(order.items_belong_to_order());

        order.items[1].order_id = RecordId::new(11);
        assert!(!order.items_belong_to_order());
    }

    #[test]
    fn round_money_covers_order_and_items() {
        let mut order = Order::new(
            "card",
            Decimal::new(1005, 3),
            Decimal::new(4, 0),
            Decimal::new(25555, 3),
        )
        .with_item(OrderItem::new("A", 1, Decimal::new(19999, 3), RecordId::new(1)));

        order.round_money();

        assert_eq!(order.tax_price.to_string(), "1.01");
        assert_eq!(order.shipping_price.to_string(), "4.00");
        assert_eq!(order.total_price.to_string(), "25.56");
        assert_eq!(order.items[0].price.to_string(), "20.00");
    }
}
