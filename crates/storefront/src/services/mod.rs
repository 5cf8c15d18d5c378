//! Business logic services for storefront.
//!
//! # Services
//!
//! - `auth` - Email and password accounts
//! - `cart` - Cart container bridged onto the session and saved carts
//! - `catalog` - Product and category reads with caching
//! - `checkout` - Transactional order placement

pub mod auth;
pub mod cart;
pub mod catalog;
pub mod checkout;
