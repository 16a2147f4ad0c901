//! Configuration modules for the Tokengate API.
//!
//! Each submodule handles one aspect of configuration, loaded from
//! environment variables with sensible defaults:
//!
//! - [`api`]: API key expected by the `api_key` middleware
//! - [`cors`]: CORS allowed origins
//! - [`database`]: PostgreSQL connection pool initialization
//! - [`jwt`]: JWT signing key and token expiry

pub mod api;
pub mod cors;
pub mod database;
pub mod jwt;
