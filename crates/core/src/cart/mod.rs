//! Cart state container.
//!
//! A [`CartContainer`] holds the line items of one browsing context and
//! mirrors them, after every mutation, into one of two [`CartStorage`]
//! backends:
//!
//! - **session** - scoped to the browsing session, used while the visitor is a
//!   guest ([`StorageMode::Guest`], the initial state)
//! - **durable** - survives across sessions, used once the visitor has logged
//!   in ([`StorageMode::Authenticated`])
//!
//! [`CartContainer::set_authenticated`] is the only way to move between the
//! two. Logging in copies the guest cart into durable storage; logging out
//! wipes both backends and the in-memory cart.
//!
//! Both backends hold the same JSON document under [`CART_STORAGE_KEY`]:
//!
//! ```json
//! {"items": [{"id": "mug", "name": "Mug", "price": "12.50", "quantity": 2}]}
//! ```
//!
//! Everything here is synchronous and infallible from the caller's point of
//! view except [`CartContainer::add_item`], which rejects degenerate products.

mod container;
mod item;
mod storage;

pub use container::{CartContainer, LoginPolicy, StorageMode};
pub use item::{LineItem, ProductRef};
pub use storage::{CartStorage, MemoryStorage, StagedChange};

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ProductId;

/// Key the serialized cart is stored under in either backend.
pub const CART_STORAGE_KEY: &str = "cart";

/// Caller misuse rejected by the cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    /// The product has no display name.
    #[error("product {id} has an empty name")]
    MissingName {
        /// Offending product.
        id: ProductId,
    },

    /// The product price is below zero.
    #[error("product {id} has a negative price ({price})")]
    NegativePrice {
        /// Offending product.
        id: ProductId,
        /// The rejected price.
        price: Decimal,
    },
}
