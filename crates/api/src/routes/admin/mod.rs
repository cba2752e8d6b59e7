//! Admin route handlers. Every handler requires [`RequireAdmin`].
//!
//! [`RequireAdmin`]: crate::middleware::RequireAdmin

pub mod form;
pub mod lookbooks;
pub mod products;
pub mod users;
