//! User endpoints. Password hashes never leave this module.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use store::{Store, User};

use super::{AppState, parse_record_id};
use crate::error::ApiError;
use crate::password::hash_password;

// -- Request types --

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// Updates the user registered with `email`.
#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub email: String,
    pub name: Option<String>,
    pub password: Option<String>,
    pub is_admin: Option<bool>,
}

// -- Response types --

#[derive(Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ListUsersResponse {
    pub users: Vec<UserResponse>,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id.as_i64(),
            name: u.name,
            email: u.email,
            is_admin: u.is_admin,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ApiError::BadRequest(format!("Invalid email: {email}"))),
    }
}

// -- Handlers --

/// POST /users — register a user.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    validate_email(&req.email)?;
    let password_hash = hash_password(&req.password)?;

    let mut user = User::new(req.name, req.email, password_hash);
    user.is_admin = req.is_admin;

    let user = state.store.create_user(user).await?;
    tracing::info!(user_id = %user.id, "user created");
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// GET /users/:id — fetch a user.
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_record_id(&id)?;
    let user = state.store.get_user(id).await?;
    Ok(Json(user.into()))
}

/// GET /users — list all users.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<ListUsersResponse>, ApiError> {
    let users = state.store.list_users().await?;
    Ok(Json(ListUsersResponse {
        users: users.into_iter().map(Into::into).collect(),
    }))
}

/// PATCH /users — update the user identified by the request's email.
#[tracing::instrument(skip(state, req))]
pub async fn update<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let mut user = state.store.get_user_by_email(&req.email).await?;

    if let Some(name) = req.name.filter(|n| !n.is_empty()) {
        user.name = name;
    }
    if let Some(password) = req.password.filter(|p| !p.is_empty()) {
        user.password_hash = hash_password(&password)?;
    }
    if let Some(is_admin) = req.is_admin {
        user.is_admin = is_admin;
    }

    let updated = state.store.update_user(user).await?;
    Ok(Json(updated.into()))
}

/// DELETE /users/:id — remove a user.
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_record_id(&id)?;
    state.store.delete_user(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_needs_local_part_and_domain() {
        assert!(validate_email("ada@example.com").is_ok());
        assert!(validate_email("ada").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("ada@").is_err());
    }
}
