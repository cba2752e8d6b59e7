//! Business logic and outbound clients.
//!
//! - [`auth`] - Password and Google sign-in, JWTs, profile and password reset
//! - [`checkout`] - Order placement from a cart
//! - [`payments`] - Payment initialization and verification against a gateway
//! - [`paystack`] - Paystack HTTP client
//! - [`assets`] - Cloudinary image upload and deletion
//! - [`email`] - Transactional e-mail over SMTP
//! - [`google`] - Google OAuth client

pub mod assets;
pub mod auth;
pub mod checkout;
pub mod email;
pub mod google;
pub mod payments;
pub mod paystack;
