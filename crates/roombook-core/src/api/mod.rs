//! REST API client module for the reservation service.
//!
//! This module provides the `ApiClient` for talking to the reservation API:
//! logging in, listing rooms, and managing reservations.
//!
//! The API uses JWT bearer authentication. Access tokens are renewed
//! transparently through the refresh endpoint when the server rejects them.

pub mod client;
mod endpoints;
pub mod error;
pub mod transport;

#[cfg(test)]
mod testing;

pub use client::ApiClient;
pub use error::{ApiError, FieldError, ValidationErrors};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
