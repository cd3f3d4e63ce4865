//! Sugbo Core - Shared types library.
//!
//! This crate provides common types used across all Sugbo Trails components:
//! - `sync` - Content sync & cache core embedded in the mobile client
//! - `cli` - Command-line tools for migrations and maintenance
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no network clients, no
//! storage access. This keeps it lightweight and allows it to be used
//! anywhere, including inside test harnesses.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, catalog entities, user-scoped records,
//!   settings schema, language tags, and realtime change events

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
