//! Types shared across the ecommerce storage workspace.

mod types;

pub use types::RecordId;
