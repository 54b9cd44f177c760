//! Clinic management API.
//!
//! Multi-tenant clinic management with a role/clinic-scoped authorization
//! core and subscription gating in front of every mutating route.
//!
//! # Architecture Layers
//!
//! - **cli**: Command-line interface
//! - **commands**: CLI command implementations
//! - **config**: Application configuration and constants
//! - **domain**: Core business entities and the pure authorization logic
//! - **services**: Application use cases (session codec, auth, projector,
//!   subscription gate, staff, clinics, super admin, patients)
//! - **infra**: Infrastructure (database, repositories, unit of work, cache)
//! - **api**: HTTP handlers, middleware, and routes
//! - **jobs**: Background email jobs
//! - **types**: Shared response types
//! - **errors**: Centralized error handling
//!
//! # CLI Usage
//!
//! ```bash
//! # Start the server
//! cargo run -- serve
//!
//! # Run migrations
//! cargo run -- migrate up
//!
//! # Start the email job worker
//! cargo run -- jobs work
//! ```

pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infra;
pub mod jobs;
pub mod services;
pub mod types;

// Re-export commonly used types at crate root
pub use api::AppState;
pub use config::Config;
pub use domain::{Principal, Requirement, RoleName};
pub use errors::{AppError, AppResult};
