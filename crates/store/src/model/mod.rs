//! In-memory representations of the persisted entities.

mod money;
mod order;
mod product;
mod user;

pub use money::{MONEY_SCALE, round_money};
pub use order::{Order, OrderItem};
pub use product::Product;
pub use user::User;
