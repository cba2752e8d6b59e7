//! Domain models for the API.
//!
//! These are validated domain objects, separate from the database row types in
//! [`crate::db`]. They serialize with camelCase keys for the JSON API.

pub mod cart;
pub mod image;
pub mod lookbook;
pub mod order;
pub mod product;
pub mod review;
pub mod user;

pub use cart::{Cart, CartLine};
pub use image::HostedImage;
pub use lookbook::{Lookbook, LookbookInput, LookbookWithProducts};
pub use order::{NewOrder, Order, PaymentResult, ShippingAddress};
pub use product::{Product, ProductFilter, ProductInput, ProductPage};
pub use review::{Review, ReviewInput};
pub use user::{CurrentUser, SavedAddress, User};
