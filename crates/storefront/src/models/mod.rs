//! Domain models for storefront.
//!
//! Row types double as domain types where every column maps onto a validated
//! core type; `sqlx` rejects rows that fail validation at decode time.

pub mod order;
pub mod product;
pub mod session;
pub mod user;

pub use order::{DeliveryDetails, DeliveryForm, Order, OrderItem};
pub use product::{Category, Product, ProductFilter};
pub use session::{CurrentUser, session_keys};
pub use user::User;
