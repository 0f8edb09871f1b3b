//! Product CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use store::{Product, Store};

use super::{AppState, parse_record_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub image: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub num_reviews: i64,
    pub price: Decimal,
    #[serde(default)]
    pub count_in_stock: i64,
}

/// Partial update; absent fields keep their stored value.
#[derive(Deserialize, Default)]
pub struct PatchProductRequest {
    pub name: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub rating: Option<f64>,
    pub num_reviews: Option<i64>,
    pub price: Option<Decimal>,
    pub count_in_stock: Option<i64>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: i64,
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

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id.as_i64(),
            name: p.name,
            image: p.image,
            category: p.category,
            description: p.description,
            rating: p.rating,
            num_reviews: p.num_reviews,
            price: p.price,
            count_in_stock: p.count_in_stock,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

impl CreateProductRequest {
    fn into_product(self) -> Result<Product, ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::BadRequest("name is required".to_string()));
        }
        if self.price.is_sign_negative() {
            return Err(ApiError::BadRequest("price cannot be negative".to_string()));
        }

        let mut product = Product::new(self.name, self.category, self.price);
        product.image = self.image;
        product.description = self.description;
        product.rating = self.rating;
        product.num_reviews = self.num_reviews;
        product.count_in_stock = self.count_in_stock;
        Ok(product)
    }
}

impl PatchProductRequest {
    fn apply(self, product: &mut Product) -> Result<(), ApiError> {
        if let Some(price) = self.price {
            if price.is_sign_negative() {
                return Err(ApiError::BadRequest("price cannot be negative".to_string()));
            }
            product.price = price;
        }
        if let Some(name) = self.name.filter(|n| !n.is_empty()) {
            product.name = name;
        }
        if let Some(image) = self.image {
            product.image = image;
        }
        if let Some(category) = self.category.filter(|c| !c.is_empty()) {
            product.category = category;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(rating) = self.rating {
            product.rating = rating;
        }
        if let Some(num_reviews) = self.num_reviews {
            product.num_reviews = num_reviews;
        }
        if let Some(count_in_stock) = self.count_in_stock {
            product.count_in_stock = count_in_stock;
        }
        Ok(())
    }
}

// -- Handlers --

/// POST /products — create a product.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    let product = state.store.create_product(req.into_product()?).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// GET /products/:id — fetch a product.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id = parse_record_id(&id)?;
    let product = state.store.get_product(id).await?;
    Ok(Json(product.into()))
}

/// GET /products — list all products.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let products = state.store.list_products().await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// PATCH /products/:id — update the given fields of a product.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    Json(req): Json<PatchProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let id = parse_record_id(&id)?;
    let mut product = state.store.get_product(id).await?;
    req.apply(&mut product)?;
    let updated = state.store.update_product(product).await?;
    Ok(Json(updated.into()))
}

/// DELETE /products/:id — remove a product.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_record_id(&id)?;
    state.store.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_keeps_absent_fields() {
        let mut product = Product::new("Widget", "tools", Decimal::new(1000, 2));
        product.count_in_stock = 3;

        PatchProductRequest {
            price: Some(Decimal::new(1250, 2)),
            name: Some(String::new()),
            ..Default::default()
        }
        .apply(&mut product)
        .unwrap();

        assert_eq!(product.price, Decimal::new(1250, 2));
        assert_eq!(product.name, "Widget");
        assert_eq!(product.category, "tools");
        assert_eq!(product.count_in_stock, 3);
    }

    #[test]
    fn patch_rejects_negative_price() {
        let mut product = Product::new("Widget", "tools", Decimal::ONE);

        let result = PatchProductRequest {
            price: Some(Decimal::new(-1, 0)),
            ..Default::default()
        }
        .apply(&mut product);

        assert!(matches!(result, Err(ApiError::BadRequest(_))));
        assert_eq!(product.price, Decimal::ONE);
    }
}
