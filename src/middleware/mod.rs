//! The middleware pipeline: a named, composable chain of handlers that
//! runs ahead of a route handler and short-circuits on the first failure.
//!
//! # Modules
//!
//! - [`context`]: per-request state shared across the chain
//! - [`error`]: how a handler signals failure
//! - [`registry`]: alias → handler mapping and the innate list
//! - [`chain`]: the dispatch engine
//! - [`pipeline`]: axum adapter wiring the chain ahead of route handlers
//! - [`handlers`]: the built-in handlers (`jwt`, `api_key`, `group`,
//!   `logger`) and their registration
//!
//! # Flow
//!
//! 1. The pipeline parses the request into a [`context::RequestContext`]
//! 2. The chain runs the innate handlers, then the route-declared list
//! 3. The first failure is shaped for the inbound protocol and returned;
//!    otherwise the route handler runs with the scratch map in scope
//! 4. End hooks fire once with the final response either way

pub mod chain;
pub mod context;
pub mod error;
pub mod handlers;
pub mod pipeline;
pub mod registry;

pub use chain::MiddlewareChain;
pub use context::{RequestContext, ScratchData};
pub use error::{MiddlewareError, Rejection};
pub use registry::{Middleware, MiddlewareRef, MiddlewareRegistry};
