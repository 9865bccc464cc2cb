//! wallshare: a wallpaper-sharing server on top of a backend-as-a-service.
//!
//! ARCHITECTURE
//! ============
//! `routes` holds thin axum handlers. `services` holds the domain rules and
//! talks to the backend only through the `baas` traits carried in
//! [`state::AppState`]. Accounts, sessions, documents, and files all live in
//! the backend; this process keeps no durable state of its own.

pub mod baas;
pub mod config;
pub mod error;
pub mod routes;
pub mod services;
pub mod state;
