//! Order endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{Order, OrderItem, RecordId, Store};

use super::{AppState, parse_record_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub payment_method: String,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub name: String,
    pub quantity: i32,
    #[serde(default)]
    pub image: String,
    pub price: Decimal,
    pub product_id: i64,
}

/// Partial update of the order row; items cannot be changed.
#[derive(Deserialize, Default)]
pub struct PatchOrderRequest {
    pub payment_method: Option<String>,
    pub tax_price: Option<Decimal>,
    pub shipping_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: i64,
    pub payment_method: String,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub total_price: Decimal,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub id: i64,
    pub order_id: i64,
    pub name: String,
    pub quantity: i32,
    pub image: String,
    pub price: Decimal,
    pub product_id: i64,
}

impl From<Order> for OrderResponse {
    fn from(o: Order) -> Self {
        Self {
            id: o.id.as_i64(),
            payment_method: o.payment_method,
            tax_price: o.tax_price,
            shipping_price: o.shipping_price,
            total_price: o.total_price,
            items: o
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    id: item.id.as_i64(),
                    order_id: item.order_id.as_i64(),
                    name: item.name,
                    quantity: item.quantity,
                    image: item.image,
                    price: item.price,
                    product_id: item.product_id.as_i64(),
                })
                .collect(),
            created_at: o.created_at,
            updated_at: o.updated_at,
        }
    }
}

fn require_non_negative(field: &str, amount: Decimal) -> Result<(), ApiError> {
    if amount < Decimal::ZERO {
        return Err(ApiError::BadRequest(format!("{field} cannot be negative")));
    }
    Ok(())
}

impl CreateOrderRequest {
    fn into_order(self) -> Result<Order, ApiError> {
        if self.payment_method.trim().is_empty() {
            return Err(ApiError::BadRequest(
                "payment_method is required".to_string(),
            ));
        }
        require_non_negative("tax_price", self.tax_price)?;
        require_non_negative("shipping_price", self.shipping_price)?;
        require_non_negative("total_price", self.total_price)?;

        let mut order = Order::new(
            self.payment_method,
            self.tax_price,
            self.shipping_price,
            self.total_price,
        );
        for (index, item) in self.items.into_iter().enumerate() {
            if item.quantity <= 0 {
                return Err(ApiError::BadRequest(format!(
                    "item {index}: quantity must be positive"
                )));
            }
            if item.product_id <= 0 {
                return Err(ApiError::BadRequest(format!(
                    "item {index}: product_id must be positive"
                )));
            }
            require_non_negative(&format!("item {index}: price"), item.price)?;

            let mut line = OrderItem::new(
                item.name,
                item.quantity,
                item.price,
                RecordId::new(item.product_id),
            );
            line.image = item.image;
            order = order.with_item(line);
        }
        Ok(order)
    }
}

impl PatchOrderRequest {
    fn apply(self, order: &mut Order) -> Result<(), ApiError> {
        if let Some(tax_price) = self.tax_price {
            require_non_negative("tax_price", tax_price)?;
            order.tax_price = tax_price;
        }
        if let Some(shipping_price) = self.shipping_price {
            require_non_negative("shipping_price", shipping_price)?;
            order.shipping_price = shipping_price;
        }
        if let Some(total_price) = self.total_price {
            require_non_negative("total_price", total_price)?;
            order.total_price = total_price;
        }
        if let Some(payment_method) = self.payment_method.filter(|p| !p.is_empty()) {
            order.payment_method = payment_method;
        }
        Ok(())
    }
}

// -- Handlers --

/// POST /orders — create an order together with its items.
#[tracing::instrument(skip(state, req), fields(items = req.items.len()))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    let order = state.store.create_order(req.into_order()?).await?;
    metrics::counter!("orders_created_total").increment(1);
    tracing::info!(order_id = %order.id, "order created");
    Ok((StatusCode::CREATED, Json(order.into())))
}

/// GET /orders/:id — fetch an order with its items.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id = parse_record_id(&id)?;
    let order = state.store.get_order(id).await?;
    Ok(Json(order.into()))
}

/// GET /orders — list all orders.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let orders = state.store.list_orders().await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// PATCH /orders/:id — update payment method or prices.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<PatchOrderRequest>,
) -> Result<Json<OrderResponse>, ApiError> {
    let id = parse_record_id(&id)?;
    let mut order = state.store.get_order(id).await?;
    req.apply(&mut order)?;

    let updated = state.store.update_order(order).await?;
    Ok(Json(updated.into()))
}

/// DELETE /orders/:id — remove an order and its items.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_record_id(&id)?;
    state.store.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
