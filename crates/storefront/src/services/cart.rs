//! Cart service: runs the synchronous cart container against the session
//! and the `saved_cart` table.
//!
//! Each call hydrates one [`MemoryStorage`] per backend, runs the container
//! on them, then writes back only what the container changed.

use sqlx::PgPool;
use thiserror::Error;
use tower_sessions::Session;
use tracing::{debug, info, instrument, warn};

use shopfront_core::{
    CART_STORAGE_KEY, CartContainer, LoginPolicy, MemoryStorage, StagedChange, StorageMode, UserId,
};

use crate::db::RepositoryError;
use crate::db::saved_carts::SavedCartRepository;

/// A cart container over staged copies of both backends.
pub type StagedCart = CartContainer<MemoryStorage, MemoryStorage>;

/// Errors loading or saving cart storage.
#[derive(Debug, Error)]
pub enum CartServiceError {
    #[error("session error: {0}")]
    Session(#[from] tower_sessions::session::Error),

    #[error("saved cart error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Cart access for one request.
pub struct CartService<'a> {
    pool: &'a PgPool,
    session: &'a Session,
    login_policy: LoginPolicy,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, session: &'a Session, login_policy: LoginPolicy) -> Self {
        Self {
            pool,
            session,
            login_policy,
        }
    }

    /// Load the cart of `owner` (or the guest cart), without saving anything.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if a backend cannot be read.
    pub async fn load(&self, owner: Option<UserId>) -> Result<StagedCart, CartServiceError> {
        let mode = if owner.is_some() {
            StorageMode::Authenticated
        } else {
            StorageMode::Guest
        };
        self.open(owner, mode).await
    }

    /// Run `f` on the cart of `owner` and save whatever it changed.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if a backend cannot be read or written.
    pub async fn update<T>(
        &self,
        owner: Option<UserId>,
        f: impl FnOnce(&mut StagedCart) -> T,
    ) -> Result<(StagedCart, T), CartServiceError> {
        let mut cart = self.load(owner).await?;
        let output = f(&mut cart);
        self.commit(&mut cart, owner).await?;
        Ok((cart, output))
    }

    /// Switch to the saved cart of `user` after a successful login.
    ///
    /// `previous` is the user the session was already logged in as. Logging
    /// in again as that user leaves the saved cart untouched; logging in as
    /// someone else logs `previous` out first.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if a backend cannot be read or written.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn login(
        &self,
        previous: Option<UserId>,
        user: UserId,
    ) -> Result<StagedCart, CartServiceError> {
        let mode = match previous {
            Some(current) if current == user => {
                debug!("already logged in");
                StorageMode::Authenticated
            }
            Some(current) => {
                info!(previous_user_id = %current, "switching user");
                self.logout(current).await?;
                StorageMode::Guest
            }
            None => StorageMode::Guest,
        };

        let mut cart = self.open(Some(user), mode).await?;
        cart.set_authenticated(true);
        self.commit(&mut cart, Some(user)).await?;
        Ok(cart)
    }

    /// Wipe the session and saved carts of `user` on logout.
    ///
    /// # Errors
    ///
    /// Returns `CartServiceError` if a backend cannot be read or written.
    #[instrument(skip(self), fields(user_id = %user))]
    pub async fn logout(&self, user: UserId) -> Result<(), CartServiceError> {
        let mut cart = self.open(Some(user), StorageMode::Authenticated).await?;
        cart.set_authenticated(false);
        self.commit(&mut cart, Some(user)).await
    }

    async fn open(
        &self,
        owner: Option<UserId>,
        mode: StorageMode,
    ) -> Result<StagedCart, CartServiceError> {
        let session = self.session_storage().await?;
        let durable = self.durable_storage(owner).await?;
        Ok(CartContainer::with_mode(session, durable, mode).with_login_policy(self.login_policy))
    }

    async fn session_storage(&self) -> Result<MemoryStorage, CartServiceError> {
        let mut storage = MemoryStorage::new();
        match self.session.get::<String>(CART_STORAGE_KEY).await {
            Ok(Some(document)) => storage.preload(CART_STORAGE_KEY, document),
            Ok(None) => {}
            Err(tower_sessions::session::Error::SerdeJson(e)) => {
                warn!(error = %e, "ignoring unreadable session cart");
            }
            Err(e) => return Err(e.into()),
        }
        Ok(storage)
    }

    async fn durable_storage(&self, owner: Option<UserId>) -> Result<MemoryStorage, CartServiceError> {
        let mut storage = MemoryStorage::new();
        if let Some(user) = owner {
            for (key, document) in SavedCartRepository::new(self.pool).entries(user).await? {
                storage.preload(key, document);
            }
        }
        Ok(storage)
    }

    async fn commit(
        &self,
        cart: &mut StagedCart,
        owner: Option<UserId>,
    ) -> Result<(), CartServiceError> {
        for change in cart.session_storage_mut().drain_changes() {
            self.apply_session(change).await?;
        }

        let durable = cart.durable_storage_mut().drain_changes();
        match owner {
            Some(user) => {
                let saved = SavedCartRepository::new(self.pool);
                for change in durable {
                    match change.value {
                        Some(document) => saved.upsert(user, &change.key, &document).await?,
                        None => saved.delete(user, &change.key).await?,
                    }
                }
            }
            None if !durable.is_empty() => {
                warn!(changes = durable.len(), "dropping saved cart changes without an owner");
            }
            None => {}
        }
        Ok(())
    }

    async fn apply_session(&self, change: StagedChange) -> Result<(), CartServiceError> {
        debug!(key = %change.key, removed = change.value.is_none(), "saving session cart");
        match change.value {
            Some(document) => self.session.insert(&change.key, document).await?,
            None => {
                self.session.remove_value(&change.key).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use rust_decimal::Decimal;
    use sqlx::postgres::PgPoolOptions;
    use tower_sessions::MemoryStore;

    use shopfront_core::{ProductId, ProductRef};

    use super::*;
    use crate::routes::test_support::{create_user, database_pool};

    fn lazy_pool() -> PgPool {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/shopfront_test")
            .unwrap()
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn mug() -> ProductRef {
        product("mug")
    }

    fn product(id: &str) -> ProductRef {
        ProductRef::new(ProductId::parse(id).unwrap(), id, Decimal::new(12, 0))
    }

    fn ids(cart: &StagedCart) -> Vec<String> {
        cart.items().iter().map(|item| item.id.to_string()).collect()
    }

    /// The saved cart of `user`, as a new session would see it.
    async fn saved_ids(pool: &PgPool, user: UserId) -> Vec<String> {
        let session = session();
        let cart = CartService::new(pool, &session, LoginPolicy::Overwrite)
            .load(Some(user))
            .await
            .unwrap();
        ids(&cart)
    }

    #[tokio::test]
    async fn test_guest_cart_lives_in_session() {
        let pool = lazy_pool();
        let session = session();
        let service = CartService::new(&pool, &session, LoginPolicy::Overwrite);

        let (cart, added) = service.update(None, |cart| cart.add_item(&mug())).await.unwrap();
        assert!(added.is_ok());
        assert_eq!(cart.total_items(), 1);

        let stored: Option<String> = session.get(CART_STORAGE_KEY).await.unwrap();
        assert!(stored.unwrap().contains("\"mug\""));

        let reloaded = service.load(None).await.unwrap();
        assert_eq!(reloaded.total_items(), 1);
    }

    #[tokio::test]
    async fn test_guest_clear_keeps_empty_document() {
        let pool = lazy_pool();
        let session = session();
        let service = CartService::new(&pool, &session, LoginPolicy::Overwrite);

        service.update(None, |cart| cart.add_item(&mug())).await.unwrap();
        service.update(None, StagedCart::clear_cart).await.unwrap();

        let stored: Option<String> = session.get(CART_STORAGE_KEY).await.unwrap();
        assert_eq!(stored.as_deref(), Some(r#"{"items":[]}"#));
    }

    #[tokio::test]
    async fn test_unreadable_session_cart_is_empty() {
        let pool = lazy_pool();
        let session = session();
        session.insert(CART_STORAGE_KEY, 42).await.unwrap();
        let service = CartService::new(&pool, &session, LoginPolicy::Overwrite);

        let cart = service.load(None).await.unwrap();
        assert!(cart.is_empty());
    }

    // =========================================================================
    // Login and logout against Postgres
    // =========================================================================

    #[tokio::test]
    async fn test_login_copies_guest_cart() {
        let Some(pool) = database_pool().await else {
            return;
        };
        let user = create_user(&pool).await;
        let session = session();
        let service = CartService::new(&pool, &session, LoginPolicy::Overwrite);

        service.update(None, |cart| cart.add_item(&mug())).await.unwrap();
        let cart = service.login(None, user.id).await.unwrap();

        assert_eq!(ids(&cart), ["mug"]);
        assert_eq!(cart.mode(), StorageMode::Authenticated);
        assert_eq!(saved_ids(&pool, user.id).await, ["mug"]);
        let entries = SavedCartRepository::new(&pool).entries(user.id).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, CART_STORAGE_KEY);
    }

    #[tokio::test]
    async fn test_logout_wipes_both_stores() {
        let Some(pool) = database_pool().await else {
            return;
        };
        let user = create_user(&pool).await;
        let session = session();
        let service = CartService::new(&pool, &session, LoginPolicy::Overwrite);

        service.update(None, |cart| cart.add_item(&mug())).await.unwrap();
        service.login(None, user.id).await.unwrap();
        service.logout(user.id).await.unwrap();

        let stored: Option<String> = session.get(CART_STORAGE_KEY).await.unwrap();
        assert!(stored.is_none());
        let entries = SavedCartRepository::new(&pool).entries(user.id).await.unwrap();
        assert!(entries.is_empty());
        assert!(service.load(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_login_again_keeps_items_added_since() {
        let Some(pool) = database_pool().await else {
            return;
        };
        let user = create_user(&pool).await;
        let session = session();
        let service = CartService::new(&pool, &session, LoginPolicy::Overwrite);

        service.update(None, |cart| cart.add_item(&product("x"))).await.unwrap();
        service.login(None, user.id).await.unwrap();
        service
            .update(Some(user.id), |cart| cart.add_item(&product("y")))
            .await
            .unwrap();

        let cart = service.login(Some(user.id), user.id).await.unwrap();

        assert_eq!(ids(&cart), ["x", "y"]);
        assert_eq!(saved_ids(&pool, user.id).await, ["x", "y"]);
    }

    #[tokio::test]
    async fn test_login_as_other_user_keeps_their_saved_cart() {
        let Some(pool) = database_pool().await else {
            return;
        };
        let first = create_user(&pool).await;
        let second = create_user(&pool).await;

        let other_session = session();
        let other = CartService::new(&pool, &other_session, LoginPolicy::Overwrite);
        other.login(None, second.id).await.unwrap();
        other
            .update(Some(second.id), |cart| cart.add_item(&product("kettle")))
            .await
            .unwrap();

        let session = session();
        let service = CartService::new(&pool, &session, LoginPolicy::Overwrite);
        service.update(None, |cart| cart.add_item(&mug())).await.unwrap();
        service.login(None, first.id).await.unwrap();

        let cart = service.login(Some(first.id), second.id).await.unwrap();

        assert_eq!(ids(&cart), ["kettle"]);
        assert_eq!(saved_ids(&pool, second.id).await, ["kettle"]);
        assert!(saved_ids(&pool, first.id).await.is_empty());
    }
}
