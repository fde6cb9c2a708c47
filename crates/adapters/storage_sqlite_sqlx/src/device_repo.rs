//! `SQLite` implementation of [`DeviceRepository`].

use std::future::Future;
use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use visionhub_app::ports::DeviceRepository;
use visionhub_domain::device::{Device, DeviceConfig, DeviceStatus, DeviceType};
use visionhub_domain::error::{NotFoundError, VisionHubError};
use visionhub_domain::id::DeviceId;
use visionhub_domain::time::{Timestamp, parse_rfc3339};

use crate::error::{StorageError, decode_error};

/// Wrapper for converting database rows into domain types without polluting
/// domain structs with database concerns.
struct Wrapper(Device);

impl Wrapper {
    fn maybe(value: Option<Self>) -> Option<Device> {
        value.map(|w| w.0)
    }

    fn unwrap_all(rows: Vec<Self>) -> Vec<Device> {
        rows.into_iter().map(|w| w.0).collect()
    }
}

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let id: String = row.try_get("id")?;
        let device_type: String = row.try_get("device_type")?;
        let config: String = row.try_get("config")?;
        let status: String = row.try_get("status")?;
        let status_changed_at: String = row.try_get("status_changed_at")?;
        let last_heartbeat: Option<String> = row.try_get("last_heartbeat")?;
        let created_at: String = row.try_get("created_at")?;
        let updated_at: String = row.try_get("updated_at")?;

        let config: DeviceConfig = serde_json::from_str(&config).map_err(decode_error)?;
        let last_heartbeat = last_heartbeat
            .as_deref()
            .map(parse_rfc3339)
            .transpose()
            .map_err(decode_error)?;

        Ok(Self(Device {
            id: DeviceId::from_str(&id).map_err(decode_error)?,
            name: row.try_get("name")?,
            device_type: DeviceType::from_str(&device_type).map_err(decode_error)?,
            location: row.try_get("location")?,
            ip_address: row.try_get("ip_address")?,
            mac_address: row.try_get("mac_address")?,
            config,
            status: DeviceStatus::from_str(&status).map_err(decode_error)?,
            status_reason: row.try_get("status_reason")?,
            status_changed_at: parse_rfc3339(&status_changed_at).map_err(decode_error)?,
            last_heartbeat,
            created_at: parse_rfc3339(&created_at).map_err(decode_error)?,
            updated_at: parse_rfc3339(&updated_at).map_err(decode_error)?,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO devices (id, name, device_type, location, ip_address, mac_address, config,
                         status, status_reason, status_changed_at, last_heartbeat,
                         created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
    ON CONFLICT(id) DO UPDATE SET
        name = excluded.name,
        device_type = excluded.device_type,
        location = excluded.location,
        ip_address = excluded.ip_address,
        mac_address = excluded.mac_address,
        config = excluded.config,
        status = excluded.status,
        status_reason = excluded.status_reason,
        status_changed_at = excluded.status_changed_at,
        last_heartbeat = excluded.last_heartbeat,
        updated_at = excluded.updated_at
";

const SELECT_BY_ID: &str = "SELECT * FROM devices WHERE id = ?";
const SELECT_ALL: &str = "SELECT * FROM devices ORDER BY created_at, id";
const SELECT_BY_STATUS: &str = "SELECT * FROM devices WHERE status = ? ORDER BY created_at, id";
const SELECT_BY_TYPE: &str =
    "SELECT * FROM devices WHERE device_type = ? ORDER BY created_at, id";
const SELECT_STALE: &str = r"
    SELECT * FROM devices
    WHERE last_heartbeat IS NOT NULL AND julianday(last_heartbeat) < julianday(?)
    ORDER BY last_heartbeat, id
";
const SEARCH: &str = r"
    SELECT * FROM devices
    WHERE name LIKE ? ESCAPE '\'
       OR location LIKE ? ESCAPE '\'
       OR ip_address LIKE ? ESCAPE '\'
       OR id LIKE ? ESCAPE '\'
    ORDER BY created_at, id
";
const DELETE_BY_ID: &str = "DELETE FROM devices WHERE id = ?";

/// `%keyword%` with the `LIKE` wildcards of `keyword` escaped.
fn contains_pattern(keyword: &str) -> String {
    let mut pattern = String::with_capacity(keyword.len() + 2);
    pattern.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// `SQLite`-backed device repository.
#[derive(Clone)]
pub struct SqliteDeviceRepository {
    pool: SqlitePool,
}

impl SqliteDeviceRepository {
    /// Create a new repository using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn select_where(&self, query: &str, value: &str) -> Result<Vec<Device>, VisionHubError> {
        let rows: Vec<Wrapper> = sqlx::query_as(query)
            .bind(value)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Wrapper::unwrap_all(rows))
    }
}

impl DeviceRepository for SqliteDeviceRepository {
    fn save(&self, device: &Device) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        let pool = self.pool.clone();
        let device = device.clone();
        async move {
            let config = serde_json::to_string(&device.config).map_err(StorageError::from)?;
            sqlx::query(UPSERT)
                .bind(device.id.to_string())
                .bind(&device.name)
                .bind(device.device_type.as_str())
                .bind(&device.location)
                .bind(&device.ip_address)
                .bind(&device.mac_address)
                .bind(config)
                .bind(device.status.as_str())
                .bind(&device.status_reason)
                .bind(device.status_changed_at.to_rfc3339())
                .bind(device.last_heartbeat.map(|ts| ts.to_rfc3339()))
                .bind(device.created_at.to_rfc3339())
                .bind(device.updated_at.to_rfc3339())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(())
        }
    }

    fn find_by_id(
        &self,
        id: DeviceId,
    ) -> impl Future<Output = Result<Option<Device>, VisionHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let row: Option<Wrapper> = sqlx::query_as(SELECT_BY_ID)
                .bind(id.to_string())
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::maybe(row))
        }
    }

    fn find_all(&self) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SELECT_ALL)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::unwrap_all(rows))
        }
    }

    fn find_by_status(
        &self,
        status: DeviceStatus,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        async move { self.select_where(SELECT_BY_STATUS, status.as_str()).await }
    }

    fn find_by_type(
        &self,
        device_type: DeviceType,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        async move { self.select_where(SELECT_BY_TYPE, device_type.as_str()).await }
    }

    fn find_stale(
        &self,
        threshold: Timestamp,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        async move { self.select_where(SELECT_STALE, &threshold.to_rfc3339()).await }
    }

    fn search(
        &self,
        keyword: &str,
    ) -> impl Future<Output = Result<Vec<Device>, VisionHubError>> + Send {
        let pool = self.pool.clone();
        let pattern = contains_pattern(keyword);
        async move {
            let rows: Vec<Wrapper> = sqlx::query_as(SEARCH)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .bind(&pattern)
                .fetch_all(&pool)
                .await
                .map_err(StorageError::from)?;

            Ok(Wrapper::unwrap_all(rows))
        }
    }

    fn delete(&self, id: DeviceId) -> impl Future<Output = Result<(), VisionHubError>> + Send {
        let pool = self.pool.clone();
        async move {
            let result = sqlx::query(DELETE_BY_ID)
                .bind(id.to_string())
                .execute(&pool)
                .await
                .map_err(StorageError::from)?;

            if result.rows_affected() == 0 {
                return Err(NotFoundError {
                    entity: "Device",
                    id: id.to_string(),
                }
                .into());
            }
            Ok(())
        }
    }
}
