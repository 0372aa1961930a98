//! Middleware components
//!
//! This module contains middleware for:
//! - Authentication (JWT)
//! - Burst limiting of the sign-in endpoints

pub mod auth;
pub mod rate_limit;

pub use auth::{auth_middleware, AuthUser, Claims};
pub use rate_limit::{burst_limit_middleware, spawn_burst_limit_cleanup, BurstLimitState};
