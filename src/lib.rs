//! Test Platform Server library.
//!
//! Case library, test jobs and per-case results, with database access,
//! requesting-user identification and the HTTP API.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
