//! Shopfront Core - Shared types and cart state.
//!
//! This crate provides the pieces shared by every Shopfront component:
//! - `storefront` - Public-facing JSON API
//! - `cli` - Command-line tools for migrations and catalog seeding
//!
//! # Architecture
//!
//! The core crate contains only types, traits and in-memory state - no
//! database access, no HTTP. The cart container talks to storage through the
//! [`cart::CartStorage`] trait so the server can back it with whatever it has.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for ids, prices, emails, phone numbers and statuses
//! - [`cart`] - The cart state container and its storage abstraction

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;

pub use cart::{
    CART_STORAGE_KEY, CartContainer, CartError, CartStorage, LineItem, LoginPolicy,
    MemoryStorage, ProductRef, StagedChange, StorageMode,
};
pub use types::*;
