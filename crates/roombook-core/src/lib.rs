//! Client library for the conference room reservation API.
//!
//! - [`api`]: the authenticated `ApiClient`, with bearer injection and
//!   transparent, single-flight access-token renewal
//! - [`auth`]: token stores, session state and session events
//! - [`models`]: rooms, reservations and user profiles
//! - [`config`]: persisted client configuration

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{Session, SessionEvent, SessionState, TokenKind, TokenStore};
pub use config::Config;
