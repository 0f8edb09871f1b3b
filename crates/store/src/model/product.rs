use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::round_money;
use crate::RecordId;

/// A catalogue product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Generated identity; unset until the product is created.
    pub id: RecordId,
    pub name: String,
    pub image: String,
    pub category: String,
    pub description: String,
    pub rating: f64,
    pub num_reviews: i64,
    pub price: Decimal,
    pub count_in_stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Product {
    /// Creates a product that has not been persisted yet.
    pub fn new(name: impl Into<String>, category: impl Into<String>, price: Decimal) -> Self {
        Self {
            id: RecordId::UNSET,
            name: name.into(),
            image: String::new(),
            category: category.into(),
            description: String::new(),
            rating: 0.0,
            num_reviews: 0,
            price,
            count_in_stock: 0,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    /// Rounds `price` to the stored money scale.
    pub fn round_money(&mut self) {
        self.price = round_money(self.price);
    }
}
