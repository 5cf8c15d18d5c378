//! The cart container and its guest/authenticated storage switch.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::item::{decode_items, encode_items};
use super::{CART_STORAGE_KEY, CartError, CartStorage, LineItem, ProductRef};
use crate::ProductId;

/// Which backend the container writes through to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// Session-scoped storage. Initial state.
    #[default]
    Guest,
    /// Durable cross-session storage.
    Authenticated,
}

/// What happens to an existing durable cart when a guest with a cart logs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoginPolicy {
    /// Replace the durable document with the guest document, byte for byte.
    #[default]
    Overwrite,
    /// Fold the guest items into the durable cart by product id, summing
    /// quantities. Guest display fields (name, price, image) win.
    Merge,
}

impl std::str::FromStr for LoginPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "merge" => Ok(Self::Merge),
            other => Err(format!("invalid cart login policy: {other}")),
        }
    }
}

/// In-memory cart for one browsing context, mirrored into storage.
///
/// `S` is the session-scoped backend and `D` the durable one. Every mutation
/// re-serializes the whole cart into whichever of the two is active.
///
/// ```
/// use rust_decimal::Decimal;
/// use shopfront_core::{CartContainer, MemoryStorage, ProductId, ProductRef};
///
/// let mut cart = CartContainer::new(MemoryStorage::new(), MemoryStorage::new());
/// let mug = ProductRef::new(ProductId::parse("mug").unwrap(), "Mug", Decimal::new(12, 0));
///
/// cart.add_item(&mug).unwrap();
/// cart.add_item(&mug).unwrap();
/// assert_eq!(cart.total_items(), 2);
/// assert_eq!(cart.total_price(), Decimal::new(24, 0));
/// ```
#[derive(Debug)]
pub struct CartContainer<S, D> {
    items: Vec<LineItem>,
    mode: StorageMode,
    login_policy: LoginPolicy,
    session: S,
    durable: D,
}

impl<S: CartStorage, D: CartStorage> CartContainer<S, D> {
    /// A guest container, rehydrated from the session backend.
    pub fn new(session: S, durable: D) -> Self {
        Self::with_mode(session, durable, StorageMode::Guest)
    }

    /// A container in `mode`, rehydrated from that mode's backend.
    ///
    /// A missing document gives an empty cart; a malformed one is logged and
    /// also gives an empty cart.
    pub fn with_mode(session: S, durable: D, mode: StorageMode) -> Self {
        let mut container = Self {
            items: Vec::new(),
            mode,
            login_policy: LoginPolicy::default(),
            session,
            durable,
        };
        container.items = container.read(mode);
        container
    }

    /// Set the policy applied by the next login transition.
    #[must_use]
    pub fn with_login_policy(mut self, policy: LoginPolicy) -> Self {
        self.login_policy = policy;
        self
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// The line item for `id`, if present.
    #[must_use]
    pub fn get(&self, id: &ProductId) -> Option<&LineItem> {
        self.items.iter().find(|item| &item.id == id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn mode(&self) -> StorageMode {
        self.mode
    }

    #[must_use]
    pub const fn login_policy(&self) -> LoginPolicy {
        self.login_policy
    }

    /// Add one unit of `product`.
    ///
    /// Increments the existing line for the same id, or appends a new line
    /// with quantity 1.
    ///
    /// # Errors
    ///
    /// Returns [`CartError`] if the product has an empty name or a negative
    /// price. The cart is left untouched.
    pub fn add_item(&mut self, product: &ProductRef) -> Result<(), CartError> {
        product.validate()?;

        match self.items.iter_mut().find(|item| item.id == product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(1),
            None => self.items.push(LineItem::from_product(product)),
        }
        self.persist();
        Ok(())
    }

    /// Remove the line for `id`. Unknown ids are ignored.
    pub fn remove_item(&mut self, id: &ProductId) {
        let before = self.items.len();
        self.items.retain(|item| &item.id != id);
        if self.items.len() != before {
            self.persist();
        }
    }

    /// Replace the quantity of the line for `id`.
    ///
    /// Zero or negative removes the line. Values above `u32::MAX` saturate.
    /// Unknown ids are ignored. Stock is not consulted here; checkout is
    /// where quantities are checked against inventory.
    pub fn update_quantity(&mut self, id: &ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove_item(id);
            return;
        }

        let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        if let Some(item) = self.items.iter_mut().find(|item| &item.id == id)
            && item.quantity != quantity
        {
            item.quantity = quantity;
            self.persist();
        }
    }

    /// Remove every line.
    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.persist();
    }

    /// Sum of quantities across all lines.
    #[must_use]
    pub fn total_items(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// Sum of `price * quantity` across all lines. No rounding is applied.
    #[must_use]
    pub fn total_price(&self) -> Decimal {
        self.items
            .iter()
            .fold(Decimal::ZERO, |total, item| total.saturating_add(item.line_total()))
    }

    /// React to the visitor logging in (`true`) or out (`false`).
    ///
    /// Login copies the session document into durable storage (or merges,
    /// under [`LoginPolicy::Merge`]) and switches to durable. Without a
    /// session document the durable cart is left alone and loaded instead.
    ///
    /// Logout deletes both documents, switches back to session storage and
    /// empties the cart.
    ///
    /// Calls that do not change the mode do nothing.
    pub fn set_authenticated(&mut self, authenticated: bool) {
        match (self.mode, authenticated) {
            (StorageMode::Guest, true) => self.log_in(),
            (StorageMode::Authenticated, false) => self.log_out(),
            _ => {}
        }
    }

    /// The session-scoped backend.
    pub const fn session_storage(&self) -> &S {
        &self.session
    }

    /// The durable backend.
    pub const fn durable_storage(&self) -> &D {
        &self.durable
    }

    /// Mutable access to the session-scoped backend.
    pub const fn session_storage_mut(&mut self) -> &mut S {
        &mut self.session
    }

    /// Mutable access to the durable backend.
    pub const fn durable_storage_mut(&mut self) -> &mut D {
        &mut self.durable
    }

    /// Give back both backends.
    pub fn into_storage(self) -> (S, D) {
        (self.session, self.durable)
    }

    fn log_in(&mut self) {
        let Some(guest_document) = self.session.get(CART_STORAGE_KEY) else {
            self.items = self.read(StorageMode::Authenticated);
            self.mode = StorageMode::Authenticated;
            debug!(items = self.items.len(), "login with empty guest cart, loaded saved cart");
            return;
        };

        match self.login_policy {
            LoginPolicy::Overwrite => {
                self.durable.set(CART_STORAGE_KEY, &guest_document);
                self.mode = StorageMode::Authenticated;
                debug!(items = self.items.len(), "login copied guest cart to saved cart");
            }
            LoginPolicy::Merge => {
                let saved = self.read(StorageMode::Authenticated);
                self.items = merge_items(saved, std::mem::take(&mut self.items));
                self.mode = StorageMode::Authenticated;
                self.persist();
                debug!(items = self.items.len(), "login merged guest cart into saved cart");
            }
        }
    }

    fn log_out(&mut self) {
        self.durable.remove(CART_STORAGE_KEY);
        self.session.remove(CART_STORAGE_KEY);
        self.items.clear();
        self.mode = StorageMode::Guest;
        debug!("logout cleared cart storage");
    }

    fn read(&self, mode: StorageMode) -> Vec<LineItem> {
        let raw = match mode {
            StorageMode::Guest => self.session.get(CART_STORAGE_KEY),
            StorageMode::Authenticated => self.durable.get(CART_STORAGE_KEY),
        };
        raw.map(|raw| decode_items(&raw)).unwrap_or_default()
    }

    fn persist(&mut self) {
        let Some(document) = encode_items(&self.items) else {
            return;
        };
        match self.mode {
            StorageMode::Guest => self.session.set(CART_STORAGE_KEY, &document),
            StorageMode::Authenticated => self.durable.set(CART_STORAGE_KEY, &document),
        }
    }
}

fn merge_items(saved: Vec<LineItem>, guest: Vec<LineItem>) -> Vec<LineItem> {
    let mut merged = saved;
    for item in guest {
        match merged.iter_mut().find(|existing| existing.id == item.id) {
            Some(existing) => {
                let quantity = existing.quantity.saturating_add(item.quantity);
                *existing = LineItem { quantity, ..item };
            }
            None => merged.push(item),
        }
    }
    merged
}
