use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    BackendError, Order, OrderItem, Product, RecordId, Result, StoreError, User,
    store::{OrderStore, ProductStore, UserStore, require_identity},
    writer::{InsertedOrder, OrderTransaction, TransactionalBackend, write_order},
};

#[derive(Default)]
struct Tables {
    products: BTreeMap<RecordId, Product>,
    /// Order rows; `items` is always empty here, items live in `order_items`.
    orders: BTreeMap<RecordId, Order>,
    order_items: BTreeMap<RecordId, OrderItem>,
    users: BTreeMap<RecordId, User>,
}

impl Tables {
    fn assemble_order(&self, row: &Order) -> Order {
        let mut order = row.clone();
        order.items = self
            .order_items
            .values()
            .filter(|item| item.order_id == row.id)
            .cloned()
            .collect();
        order
    }
}

/// Identity sequences. Like database sequences, values handed out inside a
/// transaction that later rolls back are not reused.
#[derive(Default)]
struct Sequences {
    products: AtomicI64,
    orders: AtomicI64,
    order_items: AtomicI64,
    users: AtomicI64,
}

fn next_id(sequence: &AtomicI64) -> RecordId {
    RecordId::new(sequence.fetch_add(1, Ordering::SeqCst) + 1)
}

/// In-memory store implementation.
///
/// Provides the same interface and transactional order semantics as the
/// PostgreSQL implementation; used for tests and for running the service
/// without a database.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of committed order rows.
    pub async fn order_count(&self) -> usize {
        self.tables.read().await.orders.len()
    }

    /// Returns the number of committed order item rows.
    pub async fn order_item_count(&self) -> usize {
        self.tables.read().await.order_items.len()
    }

    /// Clears every table. Sequences keep counting.
    pub async fn clear(&self) {
        let mut tables = self.tables.write().await;
        *tables = Tables::default();
    }
}

#[async_trait]
impl ProductStore for InMemoryStore {
    #[tracing::instrument(skip_all, fields(name = %product.name))]
    async fn create_product(&self, mut product: Product) -> Result<Product> {
        product.round_money();
        let mut tables = self.tables.write().await;
        product.id = next_id(&self.sequences.products);
        product.created_at = Utc::now();
        product.updated_at = None;
        tables.products.insert(product.id, product.clone());
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    async fn get_product(&self, id: RecordId) -> Result<Product> {
        self.tables
            .read()
            .await
            .products
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("product", id))
    }

    #[tracing::instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.tables.read().await.products.values().cloned().collect())
    }

    #[tracing::instrument(skip_all, fields(id = %product.id))]
    async fn update_product(&self, mut product: Product) -> Result<Product> {
        require_identity(product.id, "product", "update")?;
        product.round_money();

        let mut tables = self.tables.write().await;
        let Some(stored) = tables.products.get_mut(&product.id) else {
            return Err(StoreError::not_found("product", product.id));
        };
        product.created_at = stored.created_at;
        product.updated_at = Some(Utc::now());
        *stored = product.clone();
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_product(&self, id: RecordId) -> Result<()> {
        self.tables.write().await.products.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryStore {
    #[tracing::instrument(skip_all, fields(backend = "memory"))]
    async fn create_order(&self, order: Order) -> Result<Order> {
        write_order(self, order).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_order(&self, id: RecordId) -> Result<Order> {
        let tables = self.tables.read().await;
        tables
            .orders
            .get(&id)
            .map(|row| tables.assemble_order(row))
            .ok_or_else(|| StoreError::not_found("order", id))
    }

    #[tracing::instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .values()
            .map(|row| tables.assemble_order(row))
            .collect())
    }

    #[tracing::instrument(skip_all, fields(id = %order.id))]
    async fn update_order(&self, mut order: Order) -> Result<Order> {
        require_identity(order.id, "order", "update")?;
        order.round_money();

        let mut tables = self.tables.write().await;
        let Some(stored) = tables.orders.get_mut(&order.id) else {
            return Err(StoreError::not_found("order", order.id));
        };
        stored.payment_method = order.payment_method.clone();
        stored.tax_price = order.tax_price;
        stored.shipping_price = order.shipping_price;
        stored.total_price = order.total_price;
        stored.updated_at = Some(Utc::now());

        order.created_at = stored.created_at;
        order.updated_at = stored.updated_at;
        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_order(&self, id: RecordId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.orders.remove(&id);
        tables.order_items.retain(|_, item| item.order_id != id);
        Ok(())
    }
}

#[async_trait]
impl UserStore for InMemoryStore {
    #[tracing::instrument(skip_all, fields(email = %user.email))]
    async fn create_user(&self, mut user: User) -> Result<User> {
        let mut tables = self.tables.write().await;
        user.id = next_id(&self.sequences.users);
        user.created_at = Utc::now();
        user.updated_at = None;
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn get_user(&self, id: RecordId) -> Result<User> {
        self.tables
            .read()
            .await
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", id))
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        self.tables
            .read()
            .await
            .users
            .values()
            .find(|user| user.email == email)
            .cloned()
            .ok_or_else(|| StoreError::not_found("user", email))
    }

    #[tracing::instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().await.users.values().cloned().collect())
    }

    #[tracing::instrument(skip_all, fields(id = %user.id))]
    async fn update_user(&self, mut user: User) -> Result<User> {
        require_identity(user.id, "user", "update")?;

        let mut tables = self.tables.write().await;
        let Some(stored) = tables.users.get_mut(&user.id) else {
            return Err(StoreError::not_found("user", user.id));
        };
        user.created_at = stored.created_at;
        user.updated_at = Some(Utc::now());
        *stored = user.clone();
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user(&self, id: RecordId) -> Result<()> {
        self.tables.write().await.users.remove(&id);
        Ok(())
    }
}

/// Staged order writes, applied to the tables only on commit.
///
/// Dropping the transaction discards the staged rows.
pub struct InMemoryOrderTransaction {
    tables: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
    orders: Vec<Order>,
    items: Vec<OrderItem>,
}

#[async_trait]
impl OrderTransaction for InMemoryOrderTransaction {
    async fn insert_order(
        &mut self,
        order: &Order,
    ) -> std::result::Result<InsertedOrder, BackendError> {
        let mut row = order.clone();
        row.id = next_id(&self.sequences.orders);
        row.created_at = Utc::now();
        row.updated_at = None;
        row.items.clear();

        let inserted = InsertedOrder {
            id: row.id,
            created_at: row.created_at,
        };
        self.orders.push(row);
        Ok(inserted)
    }

    async fn insert_order_item(
        &mut self,
        item: &OrderItem,
    ) -> std::result::Result<RecordId, BackendError> {
        // Same constraints the SQL schema enforces.
        if item.quantity <= 0 {
            return Err(BackendError::Rejected(format!(
                "order item quantity must be positive, got {}",
                item.quantity
            )));
        }
        if !self.orders.iter().any(|order| order.id == item.order_id) {
            return Err(BackendError::Rejected(format!(
                "order item references unknown order {}",
                item.order_id
            )));
        }

        let mut row = item.clone();
        row.id = next_id(&self.sequences.order_items);
        let id = row.id;
        self.items.push(row);
        Ok(id)
    }

    async fn commit(self) -> std::result::Result<(), BackendError> {
        let mut tables = self.tables.write().await;
        for order in self.orders {
            tables.orders.insert(order.id, order);
        }
        for item in self.items {
            tables.order_items.insert(item.id, item);
        }
        Ok(())
    }

    async fn rollback(self) -> std::result::Result<(), BackendError> {
        Ok(())
    }
}

#[async_trait]
impl TransactionalBackend for InMemoryStore {
    type Transaction = InMemoryOrderTransaction;

    async fn begin(&self) -> std::result::Result<InMemoryOrderTransaction, BackendError> {
        Ok(InMemoryOrderTransaction {
            tables: Arc::clone(&self.tables),
            sequences: Arc::clone(&self.sequences),
            orders: Vec::new(),
            items: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn widget_order() -> Order {
        Order::new(
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
        ))
    }

    #[tokio::test]
    async fn create_order_assigns_identities() {
        let store = InMemoryStore::new();

        let order = store.create_order(widget_order()).await.unwrap();

        assert!(order.id.is_set());
        assert!(order.items[0].id.is_set());
        assert_eq!(order.items[0].order_id, order.id);

        let orders = store.list_orders().await.unwrap();
        assert_eq!(orders.iter().filter(|o| o.id == order.id).count(), 1);
        assert_eq!(orders[0], order);
    }

    #[tokio::test]
    async fn failed_item_leaves_no_rows() {
        let store = InMemoryStore::new();
        let mut order = widget_order();
        order.items[0].quantity = 0;

        let err = store.create_order(order).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Transaction(crate::TransactionError::ItemInsert { position: 0, .. })
        ));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);
    }

    #[tokio::test]
    async fn failure_on_later_item_discards_earlier_rows() {
        let store = InMemoryStore::new();
        let order = widget_order()
            .with_item(OrderItem::new("Gadget", 1, Decimal::ONE, RecordId::new(8)))
            .with_item(OrderItem::new("Broken", -1, Decimal::ONE, RecordId::new(9)));

        let err = store.create_order(order).await.unwrap_err();

        assert!(matches!(
            err,
            StoreError::Transaction(crate::TransactionError::ItemInsert { position: 2, .. })
        ));
        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);
    }

    #[tokio::test]
    async fn dropped_transaction_is_not_visible() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let inserted = tx.insert_order(&widget_order()).await.unwrap();
        assert!(store.get_order(inserted.id).await.unwrap_err().is_not_found());
        drop(tx);

        assert_eq!(store.order_count().await, 0);
    }

    #[tokio::test]
    async fn identities_are_not_reused_after_rollback() {
        let store = InMemoryStore::new();
        let mut bad = widget_order();
        bad.items[0].quantity = 0;
        store.create_order(bad).await.unwrap_err();

        let order = store.create_order(widget_order()).await.unwrap();

        assert_eq!(order.id, RecordId::new(2));
    }

    #[tokio::test]
    async fn product_round_trip() {
        let store = InMemoryStore::new();
        let mut product = Product::new("Widget", "tools", Decimal::new(1999, 2));
        product.count_in_stock = 4;

        let created = store.create_product(product.clone()).await.unwrap();
        let fetched = store.get_product(created.id).await.unwrap();

        assert!(created.id.is_set());
        assert_eq!(fetched, created);
        assert_eq!(fetched.name, product.name);
        assert_eq!(fetched.price, product.price);
        assert_eq!(fetched.count_in_stock, 4);
    }

    #[tokio::test]
    async fn sub_cent_prices_are_rounded_like_numeric_columns() {
        let store = InMemoryStore::new();

        let created = store
            .create_product(Product::new("Widget", "tools", Decimal::new(19999, 3)))
            .await
            .unwrap();
        let fetched = store.get_product(created.id).await.unwrap();
        assert_eq!(created.price.to_string(), "20.00");
        assert_eq!(fetched, created);

        let order = Order::new(
            "card",
            Decimal::new(1005, 3),
            Decimal::new(4, 0),
            Decimal::new(25555, 3),
        )
        .with_item(OrderItem::new(
            "Widget",
            1,
            Decimal::new(19999, 3),
            RecordId::new(7),
        ));
        let created = store.create_order(order).await.unwrap();
        let fetched = store.get_order(created.id).await.unwrap();

        assert_eq!(created.tax_price.to_string(), "1.01");
        assert_eq!(created.total_price.to_string(), "25.56");
        assert_eq!(created.items[0].price.to_string(), "20.00");
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn update_missing_product_is_not_found() {
        let store = InMemoryStore::new();
        let mut product = Product::new("Ghost", "none", Decimal::ONE);
        product.id = RecordId::new(99);

        let err = store.update_product(product).await.unwrap_err();

        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn update_requires_identity() {
        let store = InMemoryStore::new();

        let err = store
            .update_user(User::new("a", "a@example.com", "hash"))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::MissingIdentity { .. }));
    }

    #[tokio::test]
    async fn update_order_keeps_items() {
        let store = InMemoryStore::new();
        let mut order = store.create_order(widget_order()).await.unwrap();
        order.payment_method = "paypal".into();

        let updated = store.update_order(order).await.unwrap();
        let fetched = store.get_order(updated.id).await.unwrap();

        assert_eq!(fetched.payment_method, "paypal");
        assert!(fetched.updated_at.is_some());
        assert_eq!(fetched.items.len(), 1);
    }

    #[tokio::test]
    async fn delete_order_removes_items() {
        let store = InMemoryStore::new();
        let order = store.create_order(widget_order()).await.unwrap();

        store.delete_order(order.id).await.unwrap();

        assert_eq!(store.order_count().await, 0);
        assert_eq!(store.order_item_count().await, 0);
    }

    #[tokio::test]
    async fn delete_missing_identity_succeeds() {
        let store = InMemoryStore::new();

        assert!(store.delete_product(RecordId::new(404)).await.is_ok());
        assert!(store.delete_order(RecordId::new(404)).await.is_ok());
        assert!(store.delete_user(RecordId::new(404)).await.is_ok());
    }

    #[tokio::test]
    async fn user_lookup_by_email() {
        let store = InMemoryStore::new();
        let user = store
            .create_user(User::new("Ada", "ada@example.com", "$argon2id$hash"))
            .await
            .unwrap();

        let found = store.get_user_by_email("ada@example.com").await.unwrap();
        assert_eq!(found.id, user.id);

        let missing = store.get_user_by_email("nobody@example.com").await;
        assert!(missing.unwrap_err().is_not_found());
    }
}
