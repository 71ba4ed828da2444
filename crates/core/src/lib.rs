//! Listkeeper Core - Shared types library.
//!
//! This crate provides common types used across all Listkeeper components:
//! - `server` - The subscription engine HTTP service
//! - `cli` - Command-line tools for migrations and list management
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, contact addresses, and
//!   subscription statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
