//! Common library for the ClipVault application
//!
//! This crate provides shared functionality used across the ClipVault
//! services, including configuration, database connectivity, error
//! handling, and best-effort background tasks.

pub mod background;
pub mod config;
pub mod database;
pub mod error;
