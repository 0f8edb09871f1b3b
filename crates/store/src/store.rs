use async_trait::async_trait;

use crate::{Order, Product, RecordId, Result, User};

/// Persistence operations on products.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// Inserts a product and returns it with its generated identity and
    /// creation timestamp.
    async fn create_product(&self, product: Product) -> Result<Product>;

    /// Fetches a product, failing with `NotFound` if it does not exist.
    async fn get_product(&self, id: RecordId) -> Result<Product>;

    /// Lists every product, ascending by identity. Empty when there are none.
    async fn list_products(&self) -> Result<Vec<Product>>;

    /// Overwrites a persisted product and refreshes `updated_at`.
    ///
    /// Fails with `NotFound` if no row has the product's identity.
    async fn update_product(&self, product: Product) -> Result<Product>;

    /// Removes a product. Deleting a missing identity succeeds.
    async fn delete_product(&self, id: RecordId) -> Result<()>;
}

/// Persistence operations on orders and their items.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Writes an order and all of its items atomically.
    ///
    /// On success every row is committed, and the returned order carries its
    /// identity while each item carries its own identity and `order_id`.
    /// On failure nothing is committed and the input aggregate is consumed,
    /// so no caller can observe an identity that was rolled back.
    async fn create_order(&self, order: Order) -> Result<Order>;

    /// Fetches an order with its items in insertion order.
    async fn get_order(&self, id: RecordId) -> Result<Order>;

    /// Lists every order with its items, ascending by identity.
    async fn list_orders(&self) -> Result<Vec<Order>>;

    /// Overwrites the order row and refreshes `updated_at`. Items are not
    /// touched: they are immutable once written.
    async fn update_order(&self, order: Order) -> Result<Order>;

    /// Removes an order together with its items. Deleting a missing
    /// identity succeeds.
    async fn delete_order(&self, id: RecordId) -> Result<()>;
}

/// Persistence operations on users.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: User) -> Result<User>;

    async fn get_user(&self, id: RecordId) -> Result<User>;

    /// Fetches the first user registered with `email`.
    async fn get_user_by_email(&self, email: &str) -> Result<User>;

    async fn list_users(&self) -> Result<Vec<User>>;

    async fn update_user(&self, user: User) -> Result<User>;

    /// Removes a user. Deleting a missing identity succeeds.
    async fn delete_user(&self, id: RecordId) -> Result<()>;
}

/// The full storage contract the request layer depends on.
pub trait Store: ProductStore + OrderStore + UserStore {}

impl<T: ProductStore + OrderStore + UserStore + ?Sized> Store for T {}

/// Fails with `MissingIdentity` unless `id` has been assigned.
pub(crate) fn require_identity(
    id: RecordId,
    entity: &'static str,
    operation: &'static str,
) -> Result<()> {
    if id.is_set() {
        Ok(())
    } else {
        Err(crate::StoreError::MissingIdentity { entity, operation })
    }
}
