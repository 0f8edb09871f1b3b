//! Atomic write of an order aggregate.
//!
//! The writer only talks to a [`TransactionalBackend`], so any engine that can
//! hand out a scoped transaction can persist orders without changes here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{BackendError, Order, OrderItem, RecordId, Result, StoreError, TransactionError};

/// Values the backend generated for an inserted order row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InsertedOrder {
    pub id: RecordId,
    pub created_at: DateTime<Utc>,
}

/// A scoped, single-use transaction bound to one connection.
///
/// `commit` and `rollback` consume the handle, so neither can run twice or
/// after the other. Dropping a handle that was neither committed nor rolled
/// back must discard its writes and release the connection.
#[async_trait]
pub trait OrderTransaction: Send {
    /// Inserts the order row and returns the generated values.
    async fn insert_order(
        &mut self,
        order: &Order,
    ) -> std::result::Result<InsertedOrder, BackendError>;

    /// Inserts an item row (with `order_id` already set) and returns its identity.
    async fn insert_order_item(
        &mut self,
        item: &OrderItem,
    ) -> std::result::Result<RecordId, BackendError>;

    async fn commit(self) -> std::result::Result<(), BackendError>;

    async fn rollback(self) -> std::result::Result<(), BackendError>;
}

/// A backend able to open order transactions.
#[async_trait]
pub trait TransactionalBackend: Send + Sync {
    type Transaction: OrderTransaction;

    /// Acquires a connection and starts a transaction on it.
    async fn begin(&self) -> std::result::Result<Self::Transaction, BackendError>;
}

/// Persists `order` and its items as one unit.
///
/// The order row is inserted first, then each item in caller order with its
/// `order_id` set to the new order identity. Monetary amounts are rounded to
/// [`MONEY_SCALE`](crate::MONEY_SCALE) first, so the returned order matches
/// what a later read yields. Any failed insert stops the
/// write and rolls the transaction back; a failed rollback is reported as
/// [`TransactionError::RollbackFailed`]. Dropping the returned future before
/// it completes drops the open transaction, which rolls it back.
#[tracing::instrument(skip_all, fields(items = order.items.len()))]
pub async fn write_order<B>(backend: &B, mut order: Order) -> Result<Order>
where
    B: TransactionalBackend + ?Sized,
{
    metrics::counter!("order_writes_total").increment(1);
    order.round_money();

    let mut tx = backend
        .begin()
        .await
        .map_err(|e| StoreError::persistence("order", "begin transaction", e))?;

    if let Err(cause) = insert_aggregate(&mut tx, &mut order).await {
        metrics::counter!("order_write_failures_total").increment(1);

        return match tx.rollback().await {
            Ok(()) => {
                tracing::warn!(error = %cause, "order write rolled back");
                Err(cause.into())
            }
            Err(rollback) => {
                metrics::counter!("order_write_rollback_failures_total").increment(1);
                tracing::error!(
                    error = %cause,
                    rollback_error = %rollback,
                    "order rollback failed, database state unknown"
                );
                Err(TransactionError::RollbackFailed {
                    cause: Box::new(cause),
                    rollback,
                }
                .into())
            }
        };
    }

    if let Err(e) = tx.commit().await {
        metrics::counter!("order_write_failures_total").increment(1);
        tracing::warn!(error = %e, "order commit failed");
        return Err(TransactionError::Commit(e).into());
    }

    tracing::debug!(order_id = %order.id, "order committed");
    Ok(order)
}

async fn insert_aggregate<T: OrderTransaction>(
    tx: &mut T,
    order: &mut Order,
) -> std::result::Result<(), TransactionError> {
    let inserted = tx
        .insert_order(order)
        .await
        .map_err(TransactionError::OrderInsert)?;
    order.id = inserted.id;
    order.created_at = inserted.created_at;

    let order_id = order.id;
    for (position, item) in order.items.iter_mut().enumerate() {
        item.order_id = order_id;
        item.id = tx
            .insert_order_item(item)
            .await
            .map_err(|source| TransactionError::ItemInsert { position, source })?;
    }

    Ok(())
}
