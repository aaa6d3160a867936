//! # Cotisations API Server Library
//!
//! HTTP API and navigation shell of the community contribution tracker.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: API route handlers
//! - `shell`: Router, base view and the application screens

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod shell;
