use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RecordId;

/// A registered user.
///
/// Only the password hash reaches this layer; hashing happens in the caller.
/// Email is expected to be unique but that is not enforced here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: RecordId,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Creates a user that has not been persisted yet.
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            id: RecordId::UNSET,
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            is_admin: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }
}
