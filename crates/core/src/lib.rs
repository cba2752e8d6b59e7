//! Novare Core - Shared domain types and checkout rules.
//!
//! This crate provides the types shared by every Novare component:
//! - `api` - Public REST API (storefront and admin endpoints)
//! - `cli` - Command-line tools for migrations, seeding, and admin accounts
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. The checkout rules live here so that every store
//! implementation (`PostgreSQL` in production, in-memory in tests) validates and
//! snapshots carts the same way.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, prices, emails, statuses, and catalog enums
//! - [`checkout`] - Stock validation, price snapshots, and order totals

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod checkout;
pub mod types;

pub use types::*;
