//! JSON REST handlers for users.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use visionhub_app::ports::{DeviceRepository, UserRepository};
use visionhub_app::services::CreateUser;
use visionhub_domain::error::VisionHubError;
use visionhub_domain::user::{User, UserRole};

use super::parse_user_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating a user.
#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub credential: String,
    pub full_name: Option<String>,
    pub role: Option<String>,
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<User>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the create endpoint.
pub enum CreateResponse {
    Created(Json<User>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// `GET /api/v1/users`
pub async fn list<DR, UR>(
    State(state): State<AppState<DR, UR>>,
) -> Result<Json<Vec<User>>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let users = state.user_service.list_users().await?;
    Ok(Json(users))
}

/// `GET /api/v1/users/{id}`
pub async fn get<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let user_id = parse_user_id(&id)?;
    let user = state
        .user_service
        .get_user(user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User", &id))?;
    Ok(GetResponse::Ok(Json(user)))
}

/// `POST /api/v1/users`
pub async fn create<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Json(req): Json<CreateUserRequest>,
) -> Result<CreateResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let role = req
        .role
        .as_deref()
        .map(UserRole::from_str)
        .transpose()
        .map_err(VisionHubError::from)?;

    let created = state
        .user_service
        .create_user(CreateUser {
            username: req.username,
            email: req.email,
            credential: req.credential,
            full_name: req.full_name,
            role,
        })
        .await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `DELETE /api/v1/users/{id}`
pub async fn delete<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let user_id = parse_user_id(&id)?;
    state.user_service.delete_user(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
