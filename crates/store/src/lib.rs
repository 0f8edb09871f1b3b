//! Storage layer of the ecommerce service.
//!
//! Defines the storage contract ([`Store`]), the atomic order writer and two
//! backends: PostgreSQL and in-memory.

pub mod error;
pub mod memory;
pub mod model;
pub mod postgres;
pub mod store;
pub mod writer;

pub use common::RecordId;
pub use error::{BackendError, Result, StoreError, TransactionError};
pub use memory::InMemoryStore;
pub use model::{MONEY_SCALE, Order, OrderItem, Product, User, round_money};
pub use postgres::PostgresStore;
pub use store::{OrderStore, ProductStore, Store, UserStore};
pub use writer::{InsertedOrder, OrderTransaction, TransactionalBackend, write_order};
