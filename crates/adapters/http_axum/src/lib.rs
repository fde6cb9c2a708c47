//! # visionhub-adapter-http-axum
//!
//! HTTP adapter built on [axum](https://docs.rs/axum).
//!
//! ## Responsibilities
//! - Serve a **JSON API** under `/api/v1` for devices and users
//! - Stream live device status snapshots over **Server-Sent Events**
//!   (`/api/v1/devices/stream`) and **WebSocket** (`/ws/devices`)
//! - Map HTTP requests into application service calls (driving adapter)
//! - Map application results and errors into HTTP responses
//!
//! ## Dependency rule
//! Depends on `visionhub-app` (for port traits and services) and
//! `visionhub-domain` (for domain types used in request/response mapping).
//! Never leaks axum types into the domain.

pub mod api;
pub mod error;
pub mod router;
pub mod state;
pub mod ws;

#[cfg(test)]
mod test_support;
