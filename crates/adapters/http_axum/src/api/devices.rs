//! JSON REST handlers for devices.

use std::str::FromStr;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

use visionhub_app::ports::{DeviceRepository, UserRepository};
use visionhub_app::services::{CreateDevice, DeviceStatistics, UpdateDeviceStatus};
use visionhub_domain::device::{Device, DeviceConfig, DeviceStatus, DeviceType};
use visionhub_domain::error::{ValidationError, VisionHubError};
use visionhub_domain::time::{minutes_before, now};

use super::parse_device_id;
use crate::error::ApiError;
use crate::state::AppState;

/// Request body for creating a device.
#[derive(Deserialize)]
pub struct CreateDeviceRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    pub location: String,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    #[serde(default)]
    pub config: DeviceConfig,
    pub status: Option<String>,
}

/// Request body for changing one device's status.
#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    pub reason: Option<String>,
}

/// Request body for changing the status of several devices.
#[derive(Deserialize)]
pub struct BatchStatusRequest {
    pub device_ids: Vec<String>,
    pub status: String,
    pub reason: Option<String>,
}

/// Optional filters of the list endpoint. All given filters must match.
#[derive(Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    #[serde(rename = "type")]
    pub device_type: Option<String>,
    /// Only devices whose last heartbeat is older than this many minutes.
    pub stale_minutes: Option<u32>,
    /// Keyword matched against name, location, IP address and id.
    pub q: Option<String>,
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Device>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<Device>),
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
    Created(Json<Device>),
}

impl IntoResponse for CreateResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Created(json) => (StatusCode::CREATED, json).into_response(),
        }
    }
}

/// Possible responses from the delete endpoint.
pub enum DeleteResponse {
    NoContent,
}

impl IntoResponse for DeleteResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NoContent => StatusCode::NO_CONTENT.into_response(),
        }
    }
}

fn parse_type(raw: &str) -> Result<DeviceType, ApiError> {
    DeviceType::from_str(raw).map_err(|err| ApiError::from(VisionHubError::from(err)))
}

fn parse_status(raw: &str) -> Result<DeviceStatus, ApiError> {
    DeviceStatus::from_str(raw).map_err(|err| ApiError::from(VisionHubError::from(err)))
}

/// `GET /api/v1/devices`, optionally filtered by `?status=`, `?type=`,
/// `?stale_minutes=` and `?q=`.
///
/// The most selective filter runs in storage; the others are applied to its
/// result.
pub async fn list<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Query(query): Query<ListQuery>,
) -> Result<ListResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let device_type = query.device_type.as_deref().map(parse_type).transpose()?;
    let status = query.status.as_deref().map(parse_status).transpose()?;
    let service = &state.device_service;

    let mut devices = if let Some(keyword) = query.q.as_deref() {
        let mut devices = service.search_devices(keyword).await?;
        if let Some(minutes) = query.stale_minutes {
            let threshold = minutes_before(now(), minutes);
            devices.retain(|d| d.is_heartbeat_older_than(threshold));
        }
        devices
    } else if let Some(minutes) = query.stale_minutes {
        service.list_stale_devices(minutes).await?
    } else if let Some(status) = status {
        service.list_devices_by_status(status).await?
    } else if let Some(device_type) = device_type {
        service.list_devices_by_type(device_type).await?
    } else {
        service.list_devices().await?
    };

    devices.retain(|d| {
        status.is_none_or(|status| d.status == status)
            && device_type.is_none_or(|device_type| d.device_type == device_type)
    });
    Ok(ListResponse::Ok(Json(devices)))
}

/// `GET /api/v1/devices/{id}`
pub async fn get<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let device = state
        .device_service
        .get_device(device_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Device", &id))?;
    Ok(GetResponse::Ok(Json(device)))
}

/// `POST /api/v1/devices`
pub async fn create<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Json(req): Json<CreateDeviceRequest>,
) -> Result<CreateResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let Some(device_type) = req.device_type.as_deref() else {
        return Err(VisionHubError::from(ValidationError::MissingDeviceType).into());
    };
    let device_type = parse_type(device_type)?;
    let status = req.status.as_deref().map(parse_status).transpose()?;

    let created = state
        .device_service
        .create_device(CreateDevice {
            name: req.name,
            device_type,
            location: req.location,
            ip_address: req.ip_address,
            mac_address: req.mac_address,
            config: req.config,
            status,
        })
        .await?;
    Ok(CreateResponse::Created(Json(created)))
}

/// `PATCH /api/v1/devices/{id}/status`
pub async fn update_status<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<GetResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let device = state
        .device_service
        .update_device_status(UpdateDeviceStatus {
            device_id: id,
            status: req.status,
            reason: req.reason,
        })
        .await?;
    Ok(GetResponse::Ok(Json(device)))
}

/// `PATCH /api/v1/devices/batch/status`
pub async fn update_statuses<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Json(req): Json<BatchStatusRequest>,
) -> Result<ListResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let ids = req
        .device_ids
        .iter()
        .map(|id| parse_device_id(id))
        .collect::<Result<Vec<_>, _>>()?;
    let devices = state
        .device_service
        .update_device_statuses(&ids, &req.status, req.reason)
        .await?;
    Ok(ListResponse::Ok(Json(devices)))
}

/// `POST /api/v1/devices/{id}/heartbeat`
pub async fn heartbeat<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Path(id): Path<String>,
) -> Result<GetResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    let device = state.device_service.record_heartbeat(device_id).await?;
    Ok(GetResponse::Ok(Json(device)))
}

/// `GET /api/v1/devices/statistics`
pub async fn statistics<DR, UR>(
    State(state): State<AppState<DR, UR>>,
) -> Result<Json<DeviceStatistics>, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let stats = state.device_service.device_statistics().await?;
    Ok(Json(stats))
}

/// `DELETE /api/v1/devices/{id}`
pub async fn delete<DR, UR>(
    State(state): State<AppState<DR, UR>>,
    Path(id): Path<String>,
) -> Result<DeleteResponse, ApiError>
where
    DR: DeviceRepository + Send + Sync + 'static,
    UR: UserRepository + Send + Sync + 'static,
{
    let device_id = parse_device_id(&id)?;
    state.device_service.delete_device(device_id).await?;
    Ok(DeleteResponse::NoContent)
}
