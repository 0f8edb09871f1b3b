use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use crate::{
    BackendError, Order, OrderItem, Product, RecordId, Result, StoreError, User,
    store::{OrderStore, ProductStore, UserStore, require_identity},
    writer::{InsertedOrder, OrderTransaction, TransactionalBackend, write_order},
};

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store on an already connected pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_product(row: &PgRow) -> std::result::Result<Product, sqlx::Error> {
        Ok(Product {
            id: RecordId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            image: row.try_get("image")?,
            category: row.try_get("category")?,
            description: row.try_get("description")?,
            rating: row.try_get("rating")?,
            num_reviews: row.try_get("num_reviews")?,
            price: row.try_get("price")?,
            count_in_stock: row.try_get("count_in_stock")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn row_to_order(row: &PgRow) -> std::result::Result<Order, sqlx::Error> {
        Ok(Order {
            id: RecordId::new(row.try_get("id")?),
            payment_method: row.try_get("payment_method")?,
            tax_price: row.try_get("tax_price")?,
            shipping_price: row.try_get("shipping_price")?,
            total_price: row.try_get("total_price")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            items: Vec::new(),
        })
    }

    fn row_to_order_item(row: &PgRow) -> std::result::Result<OrderItem, sqlx::Error> {
        Ok(OrderItem {
            id: RecordId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            quantity: row.try_get("quantity")?,
            image: row.try_get("image")?,
            price: row.try_get("price")?,
            product_id: RecordId::new(row.try_get("product_id")?),
            order_id: RecordId::new(row.try_get("order_id")?),
        })
    }

    fn row_to_user(row: &PgRow) -> std::result::Result<User, sqlx::Error> {
        Ok(User {
            id: RecordId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_admin: row.try_get("is_admin")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    async fn fetch_order_items(
        &self,
        order_ids: &[i64],
    ) -> std::result::Result<Vec<OrderItem>, sqlx::Error> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, quantity, image, price, product_id, order_id
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id ASC
            "#,
        )
        .bind(order_ids)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_order_item).collect()
    }
}

#[async_trait]
impl ProductStore for PostgresStore {
    #[tracing::instrument(skip_all, fields(name = %product.name))]
    async fn create_product(&self, mut product: Product) -> Result<Product> {
        product.round_money();
        let row = sqlx::query(
            r#"
            INSERT INTO products (name, image, category, description, rating, num_reviews, price, count_in_stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, created_at
            "#,
        )
        .bind(&product.name)
        .bind(&product.image)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.rating)
        .bind(product.num_reviews)
        .bind(product.price)
        .bind(product.count_in_stock)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("product", "create", e))?;

        product.id = RecordId::new(
            row.try_get("id")
                .map_err(|e| StoreError::persistence("product", "create", e))?,
        );
        product.created_at = row
            .try_get("created_at")
            .map_err(|e| StoreError::persistence("product", "create", e))?;
        product.updated_at = None;

        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    async fn get_product(&self, id: RecordId) -> Result<Product> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, image, category, description, rating, num_reviews, price,
                   count_in_stock, created_at, updated_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("product", "get", e))?;

        match row {
            Some(row) => {
                Self::row_to_product(&row).map_err(|e| StoreError::persistence("product", "get", e))
            }
            None => Err(StoreError::not_found("product", id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, image, category, description, rating, num_reviews, price,
                   count_in_stock, created_at, updated_at
            FROM products
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("product", "list", e))?;

        rows.iter()
            .map(Self::row_to_product)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| StoreError::persistence("product", "list", e))
    }

    #[tracing::instrument(skip_all, fields(id = %product.id))]
    async fn update_product(&self, mut product: Product) -> Result<Product> {
        require_identity(product.id, "product", "update")?;
        product.round_money();

        let updated_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE products
            SET name = $1, image = $2, category = $3, description = $4, rating = $5,
                num_reviews = $6, price = $7, count_in_stock = $8, updated_at = NOW()
            WHERE id = $9
            RETURNING updated_at
            "#,
        )
        .bind(&product.name)
        .bind(&product.image)
        .bind(&product.category)
        .bind(&product.description)
        .bind(product.rating)
        .bind(product.num_reviews)
        .bind(product.price)
        .bind(product.count_in_stock)
        .bind(product.id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("product", "update", e))?;

        match updated_at {
            Some(ts) => {
                product.updated_at = Some(ts);
                Ok(product)
            }
            None => Err(StoreError::not_found("product", product.id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_product(&self, id: RecordId) -> Result<()> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::persistence("product", "delete", e))?;

        if result.rows_affected() == 0 {
            tracing::debug!("no product to delete");
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    #[tracing::instrument(skip_all, fields(backend = "postgres"))]
    async fn create_order(&self, order: Order) -> Result<Order> {
        write_order(self, order).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_order(&self, id: RecordId) -> Result<Order> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, payment_method, tax_price, shipping_price, total_price, created_at, updated_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("order", "get", e))?;

        let Some(row) = row else {
            return Err(StoreError::not_found("order", id));
        };

        let mut order =
            Self::row_to_order(&row).map_err(|e| StoreError::persistence("order", "get", e))?;
        order.items = self
            .fetch_order_items(&[id.as_i64()])
            .await
            .map_err(|e| StoreError::persistence("order", "get", e))?;

        Ok(order)
    }

    #[tracing::instrument(skip(self))]
    async fn list_orders(&self) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, payment_method, tax_price, shipping_price, total_price, created_at, updated_at
            FROM orders
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("order", "list", e))?;

        let mut orders: Vec<Order> = rows
            .iter()
            .map(Self::row_to_order)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| StoreError::persistence("order", "list", e))?;

        if orders.is_empty() {
            return Ok(orders);
        }

        let ids: Vec<i64> = orders.iter().map(|o| o.id.as_i64()).collect();
        let mut items_by_order: HashMap<RecordId, Vec<OrderItem>> = HashMap::new();
        for item in self
            .fetch_order_items(&ids)
            .await
            .map_err(|e| StoreError::persistence("order", "list", e))?
        {
            items_by_order.entry(item.order_id).or_default().push(item);
        }

        for order in &mut orders {
            order.items = items_by_order.remove(&order.id).unwrap_or_default();
        }

        Ok(orders)
    }

    #[tracing::instrument(skip_all, fields(id = %order.id))]
    async fn update_order(&self, mut order: Order) -> Result<Order> {
        require_identity(order.id, "order", "update")?;
        order.round_money();

        let updated_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE orders
            SET payment_method = $1, tax_price = $2, shipping_price = $3, total_price = $4,
                updated_at = NOW()
            WHERE id = $5
            RETURNING updated_at
            "#,
        )
        .bind(&order.payment_method)
        .bind(order.tax_price)
        .bind(order.shipping_price)
        .bind(order.total_price)
        .bind(order.id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("order", "update", e))?;

        match updated_at {
            Some(ts) => {
                order.updated_at = Some(ts);
                Ok(order)
            }
            None => Err(StoreError::not_found("order", order.id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_order(&self, id: RecordId) -> Result<()> {
        // order_items rows go with it (ON DELETE CASCADE)
        let result = sqlx::query("DELETE FROM orders WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::persistence("order", "delete", e))?;

        if result.rows_affected() == 0 {
            tracing::debug!("no order to delete");
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for PostgresStore {
    #[tracing::instrument(skip_all, fields(email = %user.email))]
    async fn create_user(&self, mut user: User) -> Result<User> {
        let row = sqlx::query(
            r#"
            INSERT INTO users (name, email, password_hash, is_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("user", "create", e))?;

        user.id = RecordId::new(
            row.try_get("id")
                .map_err(|e| StoreError::persistence("user", "create", e))?,
        );
        user.created_at = row
            .try_get("created_at")
            .map_err(|e| StoreError::persistence("user", "create", e))?;
        user.updated_at = None;

        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    async fn get_user(&self, id: RecordId) -> Result<User> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, is_admin, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("user", "get", e))?;

        match row {
            Some(row) => {
                Self::row_to_user(&row).map_err(|e| StoreError::persistence("user", "get", e))
            }
            None => Err(StoreError::not_found("user", id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn get_user_by_email(&self, email: &str) -> Result<User> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, is_admin, created_at, updated_at
            FROM users
            WHERE email = $1
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("user", "get", e))?;

        match row {
            Some(row) => {
                Self::row_to_user(&row).map_err(|e| StoreError::persistence("user", "get", e))
            }
            None => Err(StoreError::not_found("user", email)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn list_users(&self) -> Result<Vec<User>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, email, password_hash, is_admin, created_at, updated_at
            FROM users
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("user", "list", e))?;

        rows.iter()
            .map(Self::row_to_user)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| StoreError::persistence("user", "list", e))
    }

    #[tracing::instrument(skip_all, fields(id = %user.id))]
    async fn update_user(&self, mut user: User) -> Result<User> {
        require_identity(user.id, "user", "update")?;

        let updated_at: Option<DateTime<Utc>> = sqlx::query_scalar(
            r#"
            UPDATE users
            SET name = $1, email = $2, password_hash = $3, is_admin = $4, updated_at = NOW()
            WHERE id = $5
            RETURNING updated_at
            "#,
        )
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .bind(user.id.as_i64())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::persistence("user", "update", e))?;

        match updated_at {
            Some(ts) => {
                user.updated_at = Some(ts);
                Ok(user)
            }
            None => Err(StoreError::not_found("user", user.id)),
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete_user(&self, id: RecordId) -> Result<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_i64())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::persistence("user", "delete", e))?;

        if result.rows_affected() == 0 {
            tracing::debug!("no user to delete");
        }
        Ok(())
    }
}

/// An order transaction on one pooled connection.
///
/// sqlx rolls the transaction back and returns the connection to the pool
/// when this is dropped without `commit`.
pub struct PgOrderTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl OrderTransaction for PgOrderTransaction {
    async fn insert_order(
        &mut self,
        order: &Order,
    ) -> std::result::Result<InsertedOrder, BackendError> {
        let row = sqlx::query(
            r#"
            INSERT INTO orders (payment_method, tax_price, shipping_price, total_price)
            VALUES ($1, $2, $3, $4)
            RETURNING id, created_at
            "#,
        )
        .bind(&order.payment_method)
        .bind(order.tax_price)
        .bind(order.shipping_price)
        .bind(order.total_price)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(InsertedOrder {
            id: RecordId::new(row.try_get("id")?),
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_order_item(
        &mut self,
        item: &OrderItem,
    ) -> std::result::Result<RecordId, BackendError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO order_items (name, quantity, image, price, product_id, order_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(&item.name)
        .bind(item.quantity)
        .bind(&item.image)
        .bind(item.price)
        .bind(item.product_id.as_i64())
        .bind(item.order_id.as_i64())
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(RecordId::new(id))
    }

    async fn commit(self) -> std::result::Result<(), BackendError> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> std::result::Result<(), BackendError> {
        self.tx.rollback().await?;
        Ok(())
    }
}

#[async_trait]
impl TransactionalBackend for PostgresStore {
    type Transaction = PgOrderTransaction;

    async fn begin(&self) -> std::result::Result<PgOrderTransaction, BackendError> {
        let tx = self.pool.begin().await?;
        Ok(PgOrderTransaction { tx })
    }
}
